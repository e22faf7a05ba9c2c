//! Document buffer: the authoritative text of one document.
//!
//! A `Buffer` wraps a [`ropey::Rope`] and is the only place text is mutated.
//! Line boundaries are derived from the rope, never stored beside it, so
//! there is nothing to drift out of sync.
//!
//! # Design choices
//!
//! - **Positions are checked, never clamped.** Every operation that takes a
//!   [`Position`] or [`Range`] validates it and returns a [`RangeError`] when
//!   it does not fit. [`clamp_position`](Buffer::clamp_position) exists for
//!   callers that *want* clamping.
//!
//! - **`\n` only.** Text is normalised on the way in (construction and
//!   insert); the on-disk style lives in [`LineEnding`] and is restored by
//!   the document on save. A valid column on a line is `0..=len` where `len`
//!   excludes the line break.
//!
//! - **A generation counter** increments on every mutation. Search scans and
//!   autosave snapshots capture it to detect that the text moved under them.
//!
//! - **No undo here.** [`History`](crate::history::History) wraps these
//!   operations with transaction tracking.

use std::borrow::Cow;
use std::fmt;

use ropey::{Rope, RopeSlice};

use crate::change::ChangeDescriptor;
use crate::error::RangeError;
use crate::position::{Position, Range};

// ---------------------------------------------------------------------------
// Line endings
// ---------------------------------------------------------------------------

/// Line ending style of a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineEnding {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    CrLf,
    /// `\r` (classic Mac)
    Cr,
}

impl LineEnding {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Style of the first line break in `text`; `Lf` when there is none.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        let bytes = text.as_bytes();
        match bytes.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(i) if bytes[i] == b'\n' => Self::Lf,
            Some(i) if bytes.get(i + 1) == Some(&b'\n') => Self::CrLf,
            Some(_) => Self::Cr,
            None => Self::Lf,
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lf => "LF",
            Self::CrLf => "CRLF",
            Self::Cr => "CR",
        })
    }
}

/// Rewrite every `\r\n`, `\r` and `\n` in `text` as `ending`.
///
/// Borrows when nothing needs rewriting.
#[must_use]
pub fn normalize_line_endings(text: &str, ending: LineEnding) -> Cow<'_, str> {
    let clean = match ending {
        LineEnding::Lf => !text.contains('\r'),
        LineEnding::CrLf | LineEnding::Cr => !text.contains(['\r', '\n']),
    };
    if clean {
        return Cow::Borrowed(text);
    }

    let target = ending.as_str();
    let mut out = String::with_capacity(text.len() + text.len() / 16);
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(target);
            }
            '\n' => out.push_str(target),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// The text of one document, backed by a rope.
///
/// Never empty in the line sense: an empty buffer is one empty line.
#[derive(Clone)]
pub struct Buffer {
    rope: Rope,
    generation: u64,
}

impl Buffer {
    // -- Construction -------------------------------------------------------

    #[must_use]
    pub fn new() -> Self {
        Self {
            rope: Rope::new(),
            generation: 0,
        }
    }

    /// Build a buffer from `text`, normalising its line breaks to `\n`.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(&normalize_line_endings(text, LineEnding::Lf)),
            generation: 0,
        }
    }

    // -- Text access --------------------------------------------------------

    /// The underlying rope. Cloning it is O(1) and shares structure, which is
    /// what autosave snapshots rely on.
    #[inline]
    #[must_use]
    pub const fn rope(&self) -> &Rope {
        &self.rope
    }

    /// Bumped by every mutation, including ones that restore earlier text.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of lines. At least 1; a trailing `\n` adds an empty last line.
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    #[inline]
    #[must_use]
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Line `line` without its trailing `\n`, borrowed from the rope.
    ///
    /// # Errors
    ///
    /// [`RangeError::Line`] when `line >= line_count()`.
    pub fn line_slice(&self, line: usize) -> Result<RopeSlice<'_>, RangeError> {
        self.check_line(line)?;
        let slice = self.rope.line(line);
        let len = slice.len_chars();
        if len > 0 && slice.char(len - 1) == '\n' {
            Ok(slice.slice(..len - 1))
        } else {
            Ok(slice)
        }
    }

    /// Line `line` without its trailing `\n`.
    ///
    /// # Errors
    ///
    /// [`RangeError::Line`] when `line >= line_count()`.
    pub fn line_text(&self, line: usize) -> Result<String, RangeError> {
        self.line_slice(line).map(String::from)
    }

    /// Chars on `line`, excluding the line break.
    ///
    /// # Errors
    ///
    /// [`RangeError::Line`] when `line >= line_count()`.
    pub fn line_len(&self, line: usize) -> Result<usize, RangeError> {
        self.line_slice(line).map(|s| s.len_chars())
    }

    /// The text in `range`.
    ///
    /// # Errors
    ///
    /// Any [`RangeError`] from validating `range`.
    pub fn read(&self, range: Range) -> Result<String, RangeError> {
        let (start, end) = self.char_span(range)?;
        Ok(self.rope.slice(start..end).to_string())
    }

    /// The whole text (`\n` line breaks).
    #[must_use]
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Position just past the last char.
    #[must_use]
    pub fn end(&self) -> Position {
        let last = self.line_count() - 1;
        Position::new(last, self.line_len(last).unwrap_or(0))
    }

    /// Range covering the whole text.
    #[must_use]
    pub fn full_range(&self) -> Range {
        Range::new(Position::ZERO, self.end())
    }

    // -- Coordinates --------------------------------------------------------

    /// Absolute char index of `pos`.
    ///
    /// # Errors
    ///
    /// [`RangeError::Line`] or [`RangeError::Position`] when `pos` is outside
    /// the text. `col == line_len` is valid.
    pub fn char_index(&self, pos: Position) -> Result<usize, RangeError> {
        let len = self.line_len(pos.line)?;
        if pos.col > len {
            return Err(RangeError::Position { pos, len });
        }
        Ok(self.rope.line_to_char(pos.line) + pos.col)
    }

    /// Position of an absolute char index, or `None` past the end.
    #[must_use]
    pub fn position_of(&self, char_idx: usize) -> Option<Position> {
        if char_idx > self.rope.len_chars() {
            return None;
        }
        let line = self.rope.char_to_line(char_idx);
        Some(Position::new(line, char_idx - self.rope.line_to_char(line)))
    }

    /// The nearest valid position: the line is clamped to the last line and
    /// the column to that line's length.
    #[must_use]
    pub fn clamp_position(&self, pos: Position) -> Position {
        let line = pos.line.min(self.line_count() - 1);
        let len = self.line_len(line).unwrap_or(0);
        Position::new(line, pos.col.min(len))
    }

    fn check_line(&self, line: usize) -> Result<(), RangeError> {
        let count = self.line_count();
        if line >= count {
            return Err(RangeError::Line { line, count });
        }
        Ok(())
    }

    fn char_span(&self, range: Range) -> Result<(usize, usize), RangeError> {
        if range.is_reversed() {
            return Err(RangeError::Reversed(range));
        }
        Ok((self.char_index(range.start)?, self.char_index(range.end)?))
    }

    // -- Editing ------------------------------------------------------------

    /// Insert `text` at `pos`. Line breaks in `text` are normalised to `\n`.
    ///
    /// # Errors
    ///
    /// A [`RangeError`] when `pos` is outside the text; nothing changes.
    pub fn insert(&mut self, pos: Position, text: &str) -> Result<ChangeDescriptor, RangeError> {
        let idx = self.char_index(pos)?;
        let text = normalize_line_endings(text, LineEnding::Lf);
        if text.is_empty() {
            return Ok(ChangeDescriptor::new(pos.line, pos.line, pos.line, self.generation));
        }
        self.rope.insert(idx, &text);
        self.generation += 1;
        let end = pos.after(&text);
        Ok(ChangeDescriptor::new(pos.line, pos.line, end.line, self.generation))
    }

    /// Remove the text in `range` and return it.
    ///
    /// # Errors
    ///
    /// A [`RangeError`] when `range` is reversed or outside the text; nothing
    /// changes.
    pub fn delete(&mut self, range: Range) -> Result<(String, ChangeDescriptor), RangeError> {
        let (start, end) = self.char_span(range)?;
        let line = range.start.line;
        if start == end {
            return Ok((String::new(), ChangeDescriptor::new(line, line, line, self.generation)));
        }
        let removed = self.rope.slice(start..end).to_string();
        self.rope.remove(start..end);
        self.generation += 1;
        Ok((removed, ChangeDescriptor::new(line, range.end.line, line, self.generation)))
    }

    /// Replace the text in `range` with `text`, returning what was removed.
    /// One generation step, one descriptor.
    ///
    /// # Errors
    ///
    /// A [`RangeError`] when `range` is reversed or outside the text; nothing
    /// changes.
    pub fn replace(&mut self, range: Range, text: &str) -> Result<(String, ChangeDescriptor), RangeError> {
        let (start, end) = self.char_span(range)?;
        let text = normalize_line_endings(text, LineEnding::Lf);
        let removed = self.rope.slice(start..end).to_string();
        let line = range.start.line;
        if removed.is_empty() && text.is_empty() {
            return Ok((removed, ChangeDescriptor::new(line, line, line, self.generation)));
        }
        self.rope.remove(start..end);
        self.rope.insert(start, &text);
        self.generation += 1;
        let new_end = range.start.after(&text);
        Ok((
            removed,
            ChangeDescriptor::new(line, range.end.line, new_end.line, self.generation),
        ))
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("lines", &self.line_count())
            .field("chars", &self.len_chars())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn p(line: usize, col: usize) -> Position {
        Position::new(line, col)
    }

    fn r(a: (usize, usize), b: (usize, usize)) -> Range {
        Range::new(p(a.0, a.1), p(b.0, b.1))
    }

    // -- LineEnding ---------------------------------------------------------

    #[test]
    fn detect_first_break_wins() {
        assert_eq!(LineEnding::detect("a\nb\r\nc"), LineEnding::Lf);
        assert_eq!(LineEnding::detect("a\r\nb\nc"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect("a\rb"), LineEnding::Cr);
        assert_eq!(LineEnding::detect("none"), LineEnding::Lf);
        assert_eq!(LineEnding::detect(""), LineEnding::Lf);
    }

    #[test]
    fn line_ending_display() {
        assert_eq!(LineEnding::CrLf.to_string(), "CRLF");
    }

    #[test]
    fn normalize_mixed() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n", LineEnding::Lf), "a\nb\nc\n");
        assert_eq!(normalize_line_endings("a\nb\rc\r\n", LineEnding::CrLf), "a\r\nb\r\nc\r\n");
        assert_eq!(normalize_line_endings("café\nnaïve", LineEnding::Cr), "café\rnaïve");
    }

    #[test]
    fn normalize_borrows_clean_text() {
        assert!(matches!(normalize_line_endings("a\nb", LineEnding::Lf), Cow::Borrowed(_)));
        assert!(matches!(normalize_line_endings("ab", LineEnding::CrLf), Cow::Borrowed(_)));
    }

    // -- Construction and access --------------------------------------------

    #[test]
    fn empty_buffer_is_one_empty_line() {
        let buf = Buffer::new();
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line_text(0).unwrap(), "");
        assert_eq!(buf.end(), Position::ZERO);
    }

    #[test]
    fn from_text_normalises_crlf() {
        let buf = Buffer::from_text("hello\r\nworld\r\n");
        assert_eq!(buf.text(), "hello\nworld\n");
        assert_eq!(buf.line_count(), 3);
        assert_eq!(buf.line_text(1).unwrap(), "world");
        assert_eq!(buf.line_text(2).unwrap(), "");
    }

    #[test]
    fn line_out_of_bounds_is_an_error() {
        let buf = Buffer::from_text("a\nb");
        assert_eq!(buf.line_text(2), Err(RangeError::Line { line: 2, count: 2 }));
    }

    #[test]
    fn read_range_across_lines() {
        let buf = Buffer::from_text("first\nsecond\nthird");
        assert_eq!(buf.read(r((0, 3), (2, 2))).unwrap(), "st\nsecond\nth");
        assert_eq!(buf.read(r((1, 6), (2, 0))).unwrap(), "\n");
    }

    #[test]
    fn columns_count_chars() {
        let buf = Buffer::from_text("café\n你好");
        assert_eq!(buf.line_len(0).unwrap(), 4);
        assert_eq!(buf.line_len(1).unwrap(), 2);
        assert_eq!(buf.read(r((0, 3), (0, 4))).unwrap(), "é");
        assert_eq!(buf.char_index(p(1, 1)).unwrap(), 6);
    }

    // -- Coordinates --------------------------------------------------------

    #[test]
    fn column_past_line_end_is_rejected() {
        let buf = Buffer::from_text("abc\ndef");
        assert!(buf.char_index(p(0, 3)).is_ok());
        assert_eq!(
            buf.char_index(p(0, 4)),
            Err(RangeError::Position { pos: p(0, 4), len: 3 })
        );
    }

    #[test]
    fn reversed_range_is_rejected() {
        let buf = Buffer::from_text("abc");
        let bad = r((0, 2), (0, 1));
        assert_eq!(buf.read(bad), Err(RangeError::Reversed(bad)));
    }

    #[test]
    fn position_of_roundtrips() {
        let buf = Buffer::from_text("ab\ncd\n");
        for idx in 0..=buf.len_chars() {
            let pos = buf.position_of(idx).unwrap();
            assert_eq!(buf.char_index(pos).unwrap(), idx);
        }
        assert_eq!(buf.position_of(buf.len_chars() + 1), None);
    }

    #[test]
    fn clamp_is_explicit() {
        let buf = Buffer::from_text("hello\nhi");
        assert_eq!(buf.clamp_position(p(0, 99)), p(0, 5));
        assert_eq!(buf.clamp_position(p(9, 9)), p(1, 2));
        assert_eq!(Buffer::new().clamp_position(p(3, 3)), Position::ZERO);
    }

    // -- Editing ------------------------------------------------------------

    #[test]
    fn insert_reports_touched_lines() {
        let mut buf = Buffer::from_text("ab\ncd");
        let change = buf.insert(p(0, 1), "X").unwrap();
        assert_eq!(buf.text(), "aXb\ncd");
        assert_eq!(change, ChangeDescriptor::new(0, 0, 0, 1));

        let change = buf.insert(p(1, 2), "\nef\ngh").unwrap();
        assert_eq!(buf.text(), "aXb\ncd\nef\ngh");
        assert_eq!(change, ChangeDescriptor::new(1, 1, 3, 2));
    }

    #[test]
    fn insert_normalises_pasted_crlf() {
        let mut buf = Buffer::new();
        buf.insert(Position::ZERO, "a\r\nb").unwrap();
        assert_eq!(buf.text(), "a\nb");
    }

    #[test]
    fn only_newline_breaks_lines() {
        let mut buf = Buffer::from_text("ab");
        let change = buf.insert(p(0, 1), "x\u{0C}y\u{2028}z\u{85}\u{0B}").unwrap();
        assert_eq!(change, ChangeDescriptor::new(0, 0, 0, 1));
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line_len(0).unwrap(), 8);
        assert_eq!(buf.end(), p(0, 8));
    }

    #[test]
    fn insert_out_of_bounds_changes_nothing() {
        let mut buf = Buffer::from_text("ab");
        assert!(buf.insert(p(0, 3), "x").is_err());
        assert!(buf.insert(p(1, 0), "x").is_err());
        assert_eq!(buf.text(), "ab");
        assert_eq!(buf.generation(), 0);
    }

    #[test]
    fn empty_insert_does_not_bump_generation() {
        let mut buf = Buffer::from_text("ab");
        let change = buf.insert(p(0, 1), "").unwrap();
        assert_eq!(change.generation, 0);
        assert_eq!(buf.generation(), 0);
    }

    #[test]
    fn delete_returns_removed_text() {
        let mut buf = Buffer::from_text("one\ntwo\nthree");
        let (removed, change) = buf.delete(r((0, 2), (2, 1))).unwrap();
        assert_eq!(removed, "e\ntwo\nt");
        assert_eq!(buf.text(), "onhree");
        assert_eq!(change, ChangeDescriptor::new(0, 2, 0, 1));
    }

    #[test]
    fn delete_line_break_joins_lines() {
        let mut buf = Buffer::from_text("ab\ncd");
        let (removed, _) = buf.delete(r((0, 2), (1, 0))).unwrap();
        assert_eq!(removed, "\n");
        assert_eq!(buf.text(), "abcd");
        assert_eq!(buf.line_count(), 1);
    }

    #[test]
    fn delete_everything_leaves_one_empty_line() {
        let mut buf = Buffer::from_text("a\nb\nc");
        buf.delete(buf.full_range()).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.line_count(), 1);
    }

    #[test]
    fn replace_is_one_generation_step() {
        let mut buf = Buffer::from_text("the quick fox");
        let (old, change) = buf.replace(r((0, 4), (0, 9)), "lazy\nold").unwrap();
        assert_eq!(old, "quick");
        assert_eq!(buf.text(), "the lazy\nold fox");
        assert_eq!(change, ChangeDescriptor::new(0, 0, 1, 1));
        assert_eq!(buf.generation(), 1);
    }

    #[test]
    fn insert_delete_roundtrip() {
        let mut buf = Buffer::from_text("hello world");
        let (removed, _) = buf.delete(r((0, 6), (0, 11))).unwrap();
        buf.insert(p(0, 6), &removed).unwrap();
        assert_eq!(buf.text(), "hello world");
        assert_eq!(buf.generation(), 2);
    }

    #[test]
    fn debug_format() {
        let buf = Buffer::from_text("hello\nworld\n");
        let debug = format!("{buf:?}");
        assert!(debug.contains("lines: 3"));
        assert!(debug.contains("chars: 12"));
    }
}
