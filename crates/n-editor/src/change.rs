//! Change descriptors.
//!
//! Every mutation reports the line span it touched, in two coordinate
//! systems: `start_line..=old_end_line` is the span *before* the edit and
//! `start_line..=new_end_line` is the span that replaced it. Lines above
//! `start_line` are untouched; lines below `old_end_line` moved by
//! [`line_delta`](ChangeDescriptor::line_delta) but their text is unchanged.
//!
//! The highlighter uses this to splice its per-line cache, the search engine
//! to decide whether a match set went stale, and the shell to repaint.

/// The minimal line span a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeDescriptor {
    pub start_line: usize,
    /// Last touched line, in pre-edit coordinates (inclusive).
    pub old_end_line: usize,
    /// Last touched line, in post-edit coordinates (inclusive).
    pub new_end_line: usize,
    /// Buffer generation after the edit.
    pub generation: u64,
}

impl ChangeDescriptor {
    #[must_use]
    pub const fn new(start_line: usize, old_end_line: usize, new_end_line: usize, generation: u64) -> Self {
        Self {
            start_line,
            old_end_line,
            new_end_line,
            generation,
        }
    }

    /// Lines added (positive) or removed (negative).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn line_delta(&self) -> isize {
        self.new_end_line as isize - self.old_end_line as isize
    }

    /// Compose `self` followed by `next` into one descriptor covering both.
    ///
    /// `next` is expressed in the coordinates produced by `self`. The result
    /// is expressed against the text before `self` and after `next`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn merge(self, next: Self) -> Self {
        let start = self.start_line.min(next.start_line);
        // Bottom of the combined span in the intermediate coordinates.
        let mid = self.new_end_line.max(next.old_end_line);

        let old_end = if mid == self.new_end_line {
            self.old_end_line
        } else {
            (mid as isize - self.line_delta()) as usize
        };
        let new_end = if mid == next.old_end_line {
            next.new_end_line
        } else {
            (mid as isize + next.line_delta()) as usize
        };

        Self::new(start, old_end.max(start), new_end.max(start), next.generation)
    }
}
