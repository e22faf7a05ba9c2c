//! Line tokenizer.
//!
//! [`Grammar::tokenize_line`] turns one line of text plus the state it was
//! entered in into a list of [`Token`]s plus the state it exits in. Feeding
//! each line's exit state in as the next line's entry state tokenizes a whole
//! document; caching both states per line is what lets the editor re-tokenize
//! incrementally.
//!
//! Token columns count Unicode scalar values, matching the editor's
//! `Position` columns. Lines are passed **without** their line ending.

use regex_automata::{Anchored, Input, PatternSet};

use crate::grammar::Grammar;
use crate::kind::TokenKind;

// ---------------------------------------------------------------------------
// LineState
// ---------------------------------------------------------------------------

/// Tokenizer context carried across a line boundary — an index into the
/// grammar's states.
///
/// Small and `Copy` so it can be cached per line and compared cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LineState(u8);

impl LineState {
    /// The state every document starts in.
    pub const INITIAL: Self = Self(0);

    /// Index into the grammar's state list.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// True for the initial ("clean") state.
    #[inline]
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A classified span of a single line: `[start, end)` in char columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub kind: TokenKind,
}

impl Token {
    #[inline]
    #[must_use]
    pub const fn new(start: usize, end: usize, kind: TokenKind) -> Self {
        Self { start, end, kind }
    }

    /// Width in chars.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.end - self.start
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// Result of tokenizing one line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineTokens {
    /// Non-overlapping, ordered, adjacent same-kind tokens merged.
    pub tokens: Vec<Token>,
    /// State the next line starts in.
    pub exit: LineState,
}

// ---------------------------------------------------------------------------
// Tokenizing
// ---------------------------------------------------------------------------

impl Grammar {
    /// Tokenize one line entered in state `entry`.
    ///
    /// An `entry` that does not belong to this grammar (stale cache after a
    /// language switch) is treated as [`LineState::INITIAL`].
    #[must_use]
    pub fn tokenize_line(&self, line: &str, entry: LineState) -> LineTokens {
        let mut state = if entry.index() < self.states.len() {
            entry.index()
        } else {
            0
        };
        let mut tokens: Vec<Token> = Vec::new();
        let mut matching = PatternSet::new(self.max_rules);
        let mut pos = 0;
        let mut col = 0;

        while pos < line.len() {
            let current = &self.states[state];
            let input = Input::new(line).range(pos..).anchored(Anchored::Yes);

            matching.clear();
            current.matcher.which_overlapping_matches(&input, &mut matching);

            // Longest anchored match; earliest rule on ties. Ids come out in
            // rule order.
            let mut best: Option<(usize, usize)> = None;
            for id in matching.iter() {
                let i = id.as_usize();
                if let Some(m) = current.rules[i].regex.find(input.clone()) {
                    let len = m.len();
                    if len > 0 && best.is_none_or(|(best_len, _)| len > best_len) {
                        best = Some((len, i));
                    }
                }
            }

            let (end, kind) = match best {
                Some((len, i)) => {
                    let r = &current.rules[i];
                    if let Some(next) = r.next {
                        state = usize::from(next);
                    }
                    (pos + len, r.kind)
                }
                None => {
                    let width = line[pos..].chars().next().map_or(1, char::len_utf8);
                    (pos + width, current.fallback)
                }
            };

            let width = line[pos..end].chars().count();
            push_merged(&mut tokens, Token::new(col, col + width, kind));
            pos = end;
            col += width;
        }

        LineTokens {
            tokens,
            // `state` is always a valid index, and indices fit in a u8.
            exit: LineState(u8::try_from(state).unwrap_or(0)),
        }
    }

    /// Tokenize a sequence of lines from the initial state. Convenience for
    /// tests and one-shot highlighting.
    #[must_use]
    pub fn tokenize_lines<'a>(&self, lines: impl IntoIterator<Item = &'a str>) -> Vec<LineTokens> {
        let mut state = LineState::INITIAL;
        lines
            .into_iter()
            .map(|line| {
                let result = self.tokenize_line(line, state);
                state = result.exit;
                result
            })
            .collect()
    }
}

/// Append `token`, extending the previous one when kinds match.
fn push_merged(tokens: &mut Vec<Token>, token: Token) {
    if let Some(last) = tokens.last_mut() {
        if last.kind == token.kind && last.end == token.start {
            last.end = token.end;
            return;
        }
    }
    tokens.push(token);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
