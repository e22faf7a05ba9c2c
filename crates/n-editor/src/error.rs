//! Bounds errors shared by the buffer, history and document.
//!
//! The other error types live next to the code that raises them
//! ([`QueryError`](crate::search::QueryError),
//! [`EncodingError`](crate::encoding::EncodingError),
//! [`RecoveryError`](crate::recovery::RecoveryError), ...).

use thiserror::Error;

use crate::position::{Position, Range};

/// A position or range that does not fit the current document.
///
/// Always the caller's mistake, and always recoverable: the call that
/// produced it changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("line {line} is out of bounds (document has {count} lines)")]
    Line { line: usize, count: usize },

    #[error("column {} is past the end of line {} ({len} chars)", .pos.col, .pos.line)]
    Position { pos: Position, len: usize },

    #[error("range {0:?} ends before it starts")]
    Reversed(Range),
}
