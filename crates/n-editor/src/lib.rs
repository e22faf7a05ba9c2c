//! # n-editor — Editing engine for n-notepad
//!
//! Everything below the window: the text, its history, and what is derived
//! from it. No rendering and no platform UI; a shell drives a [`Session`]
//! and repaints from the [`Update`]s it returns.
//!
//! - **[`position`]** — `Position` (line, col) and `Range`, 0-indexed, columns in chars
//! - **[`buffer`]** — `Buffer` wrapping a rope, with a generation counter
//! - **[`change`]** — `ChangeDescriptor`, the line span an edit touched
//! - **[`history`]** — coalescing transactions, undo and redo
//! - **[`encoding`]** — decoding on open, strict or lossy encoding on save
//! - **[`files`]** — atomic writes and rotating backups
//! - **[`document`]** — a buffer plus its history, path, encoding and dirty state
//! - **[`highlight`]** — incremental, line-state tokenization over `n-syntax` grammars
//! - **[`search`]** — literal and regex queries, find, replace, incremental find-all
//! - **[`recovery`]** — on-disk crash-recovery snapshots
//! - **[`autosave`]** — the background snapshot worker
//! - **[`config`]** — `config.toml` and the platform directories
//! - **[`session`]** — the facade tying the above together

pub mod autosave;
pub mod buffer;
pub mod change;
pub mod config;
pub mod document;
pub mod encoding;
pub mod error;
pub mod files;
pub mod highlight;
pub mod history;
pub mod position;
pub mod recovery;
pub mod search;
pub mod session;

pub use buffer::{Buffer, LineEnding};
pub use change::ChangeDescriptor;
pub use config::EditorConfig;
pub use document::{Document, DocumentError};
pub use encoding::{Encoding, SaveMode};
pub use error::RangeError;
pub use highlight::{Highlighter, TokenSpan};
pub use history::{History, HistoryStep, Operation};
pub use position::{Position, Range};
pub use recovery::{RecoveryHandle, RecoveryStore};
pub use search::{Found, Match, Query, QueryError, SearchOptions};
pub use session::{Session, SessionError, Update};
