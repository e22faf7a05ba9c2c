//! Positions and ranges in a document.
//!
//! Coordinates are **0-indexed** `(line, col)` pairs. Columns count Unicode
//! scalar values, the same unit `ropey` indexes by and the unit the tokenizer
//! reports. Tabs and wide glyphs are a rendering concern and never change a
//! column here.
//!
//! Nothing in this module knows about a particular document, so nothing here
//! can say whether a position is *valid*. That check lives in
//! [`Buffer`](crate::buffer::Buffer), which reports a
//! [`RangeError`](crate::error::RangeError) instead of clamping.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A `(line, col)` location. Ordered line first, then column.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub const ZERO: Self = Self { line: 0, col: 0 };

    #[inline]
    #[must_use]
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// The position just past `text` if it were inserted here.
    ///
    /// `text` is expected to use `\n` line breaks, as everything stored in a
    /// buffer does.
    #[must_use]
    pub fn after(self, text: &str) -> Self {
        let newlines = text.matches('\n').count();
        if newlines == 0 {
            Self::new(self.line, self.col + text.chars().count())
        } else {
            let tail = text.rsplit('\n').next().unwrap_or("");
            Self::new(self.line + newlines, tail.chars().count())
        }
    }
}

impl Ord for Position {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.line.cmp(&other.line).then(self.col.cmp(&other.col))
    }
}

impl PartialOrd for Position {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({}:{})", self.line, self.col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1-indexed, the way a status bar shows it.
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

/// A half-open span `[start, end)`.
///
/// `Range::new` does not check ordering; a reversed range is rejected by the
/// buffer with [`RangeError::Reversed`](crate::error::RangeError::Reversed).
/// Use [`Range::ordered`] for a selection dragged backwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[inline]
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Swap the endpoints if needed so that `start <= end`.
    #[must_use]
    pub fn ordered(a: Position, b: Position) -> Self {
        if a <= b { Self::new(a, b) } else { Self::new(b, a) }
    }

    /// A zero-width range at `pos`.
    #[inline]
    #[must_use]
    pub const fn point(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start.line == self.end.line && self.start.col == self.end.col
    }

    #[inline]
    #[must_use]
    pub fn is_reversed(self) -> bool {
        self.start > self.end
    }

    #[inline]
    #[must_use]
    pub const fn is_single_line(self) -> bool {
        self.start.line == self.end.line
    }

    /// True when `pos` falls in `[start, end)`.
    #[inline]
    #[must_use]
    pub fn contains(self, pos: Position) -> bool {
        pos >= self.start && pos < self.end
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Range({}:{} .. {}:{})",
            self.start.line, self.start.col, self.end.line, self.end.col
        )
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Position -------------------------------------------------------------

    #[test]
    fn ordering_is_line_then_col() {
        let positions = [
            Position::ZERO,
            Position::new(0, 1),
            Position::new(0, 100),
            Position::new(1, 0),
            Position::new(10, 0),
        ];
        for pair in positions.windows(2) {
            assert!(pair[0] < pair[1], "{:?} < {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn after_single_line_text() {
        assert_eq!(Position::new(2, 3).after("abc"), Position::new(2, 6));
        assert_eq!(Position::new(2, 3).after(""), Position::new(2, 3));
    }

    #[test]
    fn after_counts_chars_not_bytes() {
        assert_eq!(Position::new(0, 0).after("café"), Position::new(0, 4));
    }

    #[test]
    fn after_multiline_text() {
        assert_eq!(Position::new(1, 5).after("x\nyz"), Position::new(2, 2));
        assert_eq!(Position::new(1, 5).after("\n"), Position::new(2, 0));
    }

    #[test]
    fn display_is_one_indexed() {
        assert_eq!(Position::new(9, 14).to_string(), "10:15");
        assert_eq!(format!("{:?}", Position::new(2, 5)), "Pos(2:5)");
    }

    // -- Range ----------------------------------------------------------------

    #[test]
    fn ordered_swaps_reversed_endpoints() {
        let a = Position::new(5, 0);
        let b = Position::new(2, 3);
        assert!(Range::new(a, b).is_reversed());
        assert_eq!(Range::ordered(a, b), Range::new(b, a));
    }

    #[test]
    fn point_is_empty_and_contains_nothing() {
        let r = Range::point(Position::new(5, 5));
        assert!(r.is_empty());
        assert!(!r.contains(Position::new(5, 5)));
    }

    #[test]
    fn contains_is_half_open() {
        let r = Range::new(Position::new(1, 0), Position::new(3, 0));
        assert!(r.contains(Position::new(1, 0)));
        assert!(r.contains(Position::new(2, 50)));
        assert!(!r.contains(Position::new(3, 0)));
        assert!(!r.contains(Position::new(0, 9)));
    }

    #[test]
    fn single_line() {
        assert!(Range::new(Position::new(3, 0), Position::new(3, 9)).is_single_line());
        assert!(!Range::new(Position::new(3, 0), Position::new(4, 0)).is_single_line());
    }

    #[test]
    fn range_formats() {
        let r = Range::new(Position::new(0, 0), Position::new(2, 5));
        assert_eq!(r.to_string(), "1:1-3:6");
        assert_eq!(format!("{r:?}"), "Range(0:0 .. 2:5)");
    }

    #[test]
    fn serde_shape() {
        let r = Range::new(Position::new(1, 2), Position::new(3, 4));
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"start":{"line":1,"col":2},"end":{"line":3,"col":4}}"#);
        assert_eq!(serde_json::from_str::<Range>(&json).unwrap(), r);
    }
}
