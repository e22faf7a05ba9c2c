//! Incremental syntax highlighting.
//!
//! The [`Highlighter`] keeps, for every buffer line, the tokens produced for
//! it together with the tokenizer state the line was entered in and the
//! state it exits in. Lines `0..frontier` are always valid; everything past
//! the frontier has not been tokenized yet.
//!
//! # Re-tokenizing after an edit
//!
//! 1. The cache entries for the touched lines are spliced out and replaced
//!    by empty slots for the new lines (rows below shift with the edit).
//! 2. Tokenizing restarts at the first touched line, entered in the exit
//!    state of the line above.
//! 3. Past the touched span, each following line is re-tokenized only while
//!    the state flowing into it differs from the entry state it was cached
//!    with. The first line whose cached entry still matches, and every line
//!    below it, is left alone.
//!
//! So an edit inside one line costs one line, and typing `/*` costs every
//! line down to the next `*/`.
//!
//! # Full passes
//!
//! Switching language discards the cache. [`Highlighter::tokenize_pending`]
//! advances the frontier by a bounded number of lines per call so the shell
//! can interleave a full pass with rendering.

use std::borrow::Cow;

use n_syntax::{Grammar, Language, LineState, LineTokens, Token, TokenKind};

use crate::buffer::Buffer;
use crate::change::ChangeDescriptor;
use crate::position::Position;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A classified span in document coordinates. Never crosses a line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: Position,
    pub end: Position,
    pub kind: TokenKind,
}

impl TokenSpan {
    fn on_line(line: usize, token: Token) -> Self {
        Self {
            start: Position::new(line, token.start),
            end: Position::new(line, token.end),
            kind: token.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LineCache {
    entry: LineState,
    exit: LineState,
    tokens: Vec<Token>,
}

/// Per-document highlighting state.
#[derive(Debug)]
pub struct Highlighter {
    language: Language,
    /// `None` for plain text.
    grammar: Option<&'static Grammar>,
    lines: Vec<Option<LineCache>>,
    frontier: usize,
}

impl Highlighter {
    /// A highlighter for `buf` in `language`. Nothing is tokenized yet.
    #[must_use]
    pub fn new(language: Language, buf: &Buffer) -> Self {
        let mut hl = Self {
            language,
            grammar: None,
            lines: Vec::new(),
            frontier: 0,
        };
        hl.set_language(language, buf);
        hl
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// Select a grammar and discard every cached line.
    ///
    /// A language whose built-in grammar failed to compile highlights as
    /// plain text.
    pub fn set_language(&mut self, language: Language, buf: &Buffer) {
        self.language = language;
        self.grammar = Grammar::builtin(language);
        self.reset(buf.line_count());
        log::debug!(
            "highlight: language {language} ({} lines queued)",
            self.lines.len()
        );
    }

    /// Lines `0..frontier` are tokenized.
    #[must_use]
    pub const fn frontier(&self) -> usize {
        self.frontier
    }

    /// True once every line has been tokenized.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.frontier >= self.lines.len()
    }

    // -- Reading ------------------------------------------------------------

    /// Spans of `line`, or `None` if the line is past the frontier.
    #[must_use]
    pub fn spans(&self, line: usize) -> Option<Vec<TokenSpan>> {
        let cache = self.lines.get(line)?.as_ref()?;
        Some(
            cache
                .tokens
                .iter()
                .map(|&t| TokenSpan::on_line(line, t))
                .collect(),
        )
    }

    /// Raw tokens of `line` (char columns), or `None` past the frontier.
    #[must_use]
    pub fn tokens(&self, line: usize) -> Option<&[Token]> {
        self.lines.get(line)?.as_ref().map(|c| c.tokens.as_slice())
    }

    /// The state `line` exits in, or `None` past the frontier.
    #[must_use]
    pub fn exit_state(&self, line: usize) -> Option<LineState> {
        self.lines.get(line)?.as_ref().map(|c| c.exit)
    }

    // -- Full pass ----------------------------------------------------------

    /// Tokenize up to `budget` lines past the frontier. Returns their spans
    /// in document order; an empty result with [`is_complete`] true means
    /// the pass is done.
    ///
    /// [`is_complete`]: Self::is_complete
    pub fn tokenize_pending(&mut self, buf: &Buffer, budget: usize) -> Vec<TokenSpan> {
        if self.lines.len() != buf.line_count() {
            log::debug!("highlight: cache size mismatch, restarting full pass");
            self.reset(buf.line_count());
        }

        let end = self.frontier.saturating_add(budget).min(self.lines.len());
        let mut spans = Vec::new();
        let mut state = self.entry_state(self.frontier);
        for line in self.frontier..end {
            let cache = self.tokenize(buf, line, state);
            state = cache.exit;
            spans.extend(cache.tokens.iter().map(|&t| TokenSpan::on_line(line, t)));
            self.lines[line] = Some(cache);
        }
        self.frontier = end;
        spans
    }

    /// Tokenize everything still pending.
    pub fn tokenize_all(&mut self, buf: &Buffer) -> Vec<TokenSpan> {
        self.tokenize_pending(buf, usize::MAX)
    }

    // -- Incremental --------------------------------------------------------

    /// Bring the cache up to date with an edit described by `change`, which
    /// has already been applied to `buf`.
    ///
    /// Returns the spans of every re-tokenized line, in document order.
    /// Lines past the frontier are left for [`tokenize_pending`].
    ///
    /// [`tokenize_pending`]: Self::tokenize_pending
    pub fn on_change(&mut self, change: &ChangeDescriptor, buf: &Buffer) -> Vec<TokenSpan> {
        let ChangeDescriptor {
            start_line: start,
            old_end_line: old_end,
            new_end_line: new_end,
            ..
        } = *change;

        if !self.splice(change, buf.line_count()) {
            log::debug!("highlight: change {change:?} does not fit the cache, restarting full pass");
            self.reset(buf.line_count());
            return Vec::new();
        }

        self.frontier = if self.frontier > old_end {
            self.frontier.saturating_add_signed(change.line_delta())
        } else {
            self.frontier.min(start)
        };
        if start > self.frontier {
            return Vec::new();
        }

        let mut spans = Vec::new();
        let mut state = self.entry_state(start);
        let mut line = start;
        while line < self.lines.len() {
            if line > new_end {
                match &self.lines[line] {
                    Some(cached) if cached.entry != state => {}
                    _ => break,
                }
            }
            let cache = self.tokenize(buf, line, state);
            state = cache.exit;
            spans.extend(cache.tokens.iter().map(|&t| TokenSpan::on_line(line, t)));
            self.lines[line] = Some(cache);
            line += 1;
        }
        self.frontier = self.frontier.max(line);

        log::debug!(
            "highlight: re-tokenized lines {start}..{line} for edit {start}..={new_end}"
        );
        spans
    }

    // -- Internals ----------------------------------------------------------

    fn reset(&mut self, line_count: usize) {
        self.lines = vec![None; line_count];
        self.frontier = 0;
    }

    /// Replace the slots of the touched lines. False when the change does
    /// not line up with the cache (an edit the highlighter never saw).
    fn splice(&mut self, change: &ChangeDescriptor, line_count: usize) -> bool {
        let (start, old_end, new_end) = (change.start_line, change.old_end_line, change.new_end_line);
        if start > old_end || start > new_end || old_end >= self.lines.len() {
            return false;
        }
        let after = self.lines.len() - (old_end - start + 1) + (new_end - start + 1);
        if after != line_count {
            return false;
        }
        self.lines
            .splice(start..=old_end, std::iter::repeat_n(None, new_end - start + 1));
        true
    }

    fn entry_state(&self, line: usize) -> LineState {
        line.checked_sub(1)
            .and_then(|above| self.exit_state(above))
            .unwrap_or(LineState::INITIAL)
    }

    fn tokenize(&self, buf: &Buffer, line: usize, entry: LineState) -> LineCache {
        let text: Cow<'_, str> = buf.line_slice(line).map(Cow::from).unwrap_or_default();
        match self.grammar {
            Some(grammar) => {
                let LineTokens { tokens, exit } = grammar.tokenize_line(&text, entry);
                LineCache { entry, exit, tokens }
            }
            None => {
                let len = text.chars().count();
                let tokens = if len == 0 {
                    Vec::new()
                } else {
                    vec![Token::new(0, len, TokenKind::Plain)]
                };
                LineCache {
                    entry,
                    exit: entry,
                    tokens,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Range;

    fn full(lang: Language, text: &str) -> (Buffer, Highlighter) {
        let buf = Buffer::from_text(text);
        let mut hl = Highlighter::new(lang, &buf);
        hl.tokenize_all(&buf);
        assert!(hl.is_complete());
        (buf, hl)
    }

    fn snapshot(hl: &Highlighter, buf: &Buffer) -> Vec<Option<Vec<TokenSpan>>> {
        (0..buf.line_count()).map(|l| hl.spans(l)).collect()
    }

    fn lines_of(spans: &[TokenSpan]) -> Vec<usize> {
        let mut lines: Vec<usize> = spans.iter().map(|s| s.start.line).collect();
        lines.dedup();
        lines
    }

    /// Matches a highlighter that tokenized `buf` from scratch.
    fn assert_matches_fresh(hl: &Highlighter, buf: &Buffer) {
        let (_, fresh) = full(hl.language(), &buf.text());
        assert_eq!(snapshot(hl, buf), snapshot(&fresh, buf));
    }

    // -- plain ----------------------------------------------------------------

    #[test]
    fn plain_is_one_span_per_line() {
        let (buf, hl) = full(Language::Plain, "def x:\n\n  /* y");
        assert_eq!(
            hl.spans(0).unwrap(),
            vec![TokenSpan {
                start: Position::new(0, 0),
                end: Position::new(0, 6),
                kind: TokenKind::Plain,
            }]
        );
        assert_eq!(hl.spans(1).unwrap(), vec![]);
        assert_eq!(hl.spans(2).unwrap().len(), 1);
        assert_eq!(buf.line_count(), 3);
    }

    #[test]
    fn plain_edit_touches_only_edited_line() {
        let (mut buf, mut hl) = full(Language::Plain, "a\nb\nc");
        let change = buf.insert(Position::new(1, 1), "/*").unwrap();
        let spans = hl.on_change(&change, &buf);
        assert_eq!(lines_of(&spans), vec![1]);
    }

    // -- full pass ------------------------------------------------------------

    #[test]
    fn pending_pass_is_resumable() {
        let text = (0..10).map(|i| format!("x = {i}")).collect::<Vec<_>>().join("\n");
        let buf = Buffer::from_text(&text);
        let mut hl = Highlighter::new(Language::Python, &buf);
        assert_eq!(hl.frontier(), 0);
        assert!(hl.spans(0).is_none());

        let first = hl.tokenize_pending(&buf, 4);
        assert_eq!(lines_of(&first), vec![0, 1, 2, 3]);
        assert_eq!(hl.frontier(), 4);
        assert!(!hl.is_complete());

        hl.tokenize_pending(&buf, 100);
        assert!(hl.is_complete());
        assert!(hl.tokenize_pending(&buf, 100).is_empty());
        assert_matches_fresh(&hl, &buf);
    }

    #[test]
    fn set_language_discards_cache() {
        let (buf, mut hl) = full(Language::Python, "def f():\n    pass");
        hl.set_language(Language::Plain, &buf);
        assert_eq!(hl.frontier(), 0);
        assert!(hl.spans(0).is_none());
        hl.tokenize_all(&buf);
        assert_eq!(hl.spans(0).unwrap()[0].kind, TokenKind::Plain);
    }

    // -- locality -------------------------------------------------------------

    #[test]
    fn edit_within_line_leaves_neighbours() {
        let text = "let a = 1;\nlet b = 2;\nlet c = 3;\nlet d = 4;";
        let (mut buf, mut hl) = full(Language::JavaScript, text);
        let before = snapshot(&hl, &buf);

        let change = buf.insert(Position::new(2, 9), "00").unwrap();
        let spans = hl.on_change(&change, &buf);

        assert_eq!(lines_of(&spans), vec![2]);
        let after = snapshot(&hl, &buf);
        assert_eq!(after[..2], before[..2]);
        assert_eq!(after[3], before[3]);
        assert_matches_fresh(&hl, &buf);
    }

    #[test]
    fn opening_comment_flows_down_until_closed() {
        let text = "a;\nb;\nc;\nd; */ e;\nf;";
        let (mut buf, mut hl) = full(Language::JavaScript, text);
        let before = snapshot(&hl, &buf);

        let change = buf.insert(Position::new(1, 0), "/* ").unwrap();
        let spans = hl.on_change(&change, &buf);

        // Line 3 closes the comment; its exit state is unchanged so line 4
        // is not revisited.
        assert_eq!(lines_of(&spans), vec![1, 2, 3]);
        let after = snapshot(&hl, &buf);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[4], before[4]);
        assert_eq!(hl.spans(2).unwrap()[0].kind, TokenKind::Comment);
        assert_matches_fresh(&hl, &buf);
    }

    #[test]
    fn closing_comment_restores_downstream() {
        let text = "/* a\nb\nc */ x\ny";
        let (mut buf, mut hl) = full(Language::JavaScript, text);

        let change = buf.insert(Position::new(0, 4), " */").unwrap();
        hl.on_change(&change, &buf);

        assert_ne!(hl.spans(1).unwrap()[0].kind, TokenKind::Comment);
        assert_matches_fresh(&hl, &buf);
    }

    #[test]
    fn multi_line_insert_and_delete_shift_cache() {
        let text = "x = 1\ny = '''doc\nmore'''\nz = 3";
        let (mut buf, mut hl) = full(Language::Python, text);

        let change = buf.insert(Position::new(0, 5), "\nw = 2\nv = 4").unwrap();
        let spans = hl.on_change(&change, &buf);
        assert_eq!(lines_of(&spans), vec![0, 1, 2]);
        assert_matches_fresh(&hl, &buf);

        let (_, change) = buf
            .delete(Range::new(Position::new(1, 0), Position::new(3, 0)))
            .unwrap();
        hl.on_change(&change, &buf);
        assert_eq!(buf.line_count(), 4);
        assert_matches_fresh(&hl, &buf);
    }

    #[test]
    fn replace_spanning_lines() {
        let text = "<div>\n<!-- a\nb -->\n<p>";
        let (mut buf, mut hl) = full(Language::Html, text);
        let (_, change) = buf
            .replace(Range::new(Position::new(1, 0), Position::new(2, 4)), "<br>")
            .unwrap();
        hl.on_change(&change, &buf);
        assert_matches_fresh(&hl, &buf);
        assert_eq!(hl.spans(1).unwrap()[0].kind, TokenKind::Tag);
    }

    // -- frontier -------------------------------------------------------------

    #[test]
    fn edit_past_frontier_waits_for_pass() {
        let text = (0..20).map(|_| "a = 1").collect::<Vec<_>>().join("\n");
        let mut buf = Buffer::from_text(&text);
        let mut hl = Highlighter::new(Language::Python, &buf);
        hl.tokenize_pending(&buf, 5);

        let change = buf.insert(Position::new(15, 0), "'''").unwrap();
        assert!(hl.on_change(&change, &buf).is_empty());
        assert_eq!(hl.frontier(), 5);

        hl.tokenize_all(&buf);
        assert_matches_fresh(&hl, &buf);
    }

    #[test]
    fn edit_at_frontier_extends_it() {
        let text = "a\nb\nc\nd";
        let mut buf = Buffer::from_text(text);
        let mut hl = Highlighter::new(Language::Python, &buf);
        hl.tokenize_pending(&buf, 2);

        let change = buf.insert(Position::new(2, 0), "q").unwrap();
        let spans = hl.on_change(&change, &buf);
        assert_eq!(lines_of(&spans), vec![2]);
        assert_eq!(hl.frontier(), 3);
    }

    #[test]
    fn unseen_change_restarts_pass() {
        let (mut buf, mut hl) = full(Language::Json, "{}\n[]");
        buf.insert(Position::new(1, 2), "\n\n").unwrap();
        let change = buf.insert(Position::new(0, 0), " ").unwrap();
        assert!(hl.on_change(&change, &buf).is_empty());
        assert_eq!(hl.frontier(), 0);
        hl.tokenize_all(&buf);
        assert_matches_fresh(&hl, &buf);
    }
}
