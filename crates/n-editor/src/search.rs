//! Search and replace.
//!
//! A pattern is compiled once into a [`Query`] (literal text is escaped, so
//! both modes run on the same regex engine) and then driven against a
//! [`Buffer`] in one of three ways:
//!
//! - [`Query::matches`], a lazy iterator over every match in document order;
//! - [`Scan`], an owned cursor that scans a bounded number of lines per
//!   [`step`](Scan::step) and notices when the buffer changed under it;
//! - [`Query::find_next`] / [`Query::find_prev`], for "find next" navigation
//!   with optional wrap-around.
//!
//! Matches never span a line break. Empty matches (`a*` between letters)
//! are skipped; whole-word mode rejects a match whose neighbours are word
//! characters.
//!
//! Replacing never touches the buffer: [`Query::replace`] and
//! [`Query::replace_all`] build [`Operation`]s for the edit history.

use std::borrow::Cow;
use std::collections::VecDeque;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::Buffer;
use crate::change::ChangeDescriptor;
use crate::history::Operation;
use crate::position::{Position, Range};

// ---------------------------------------------------------------------------
// Options and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    #[serde(rename = "regex")]
    pub use_regex: bool,
    /// Find next/previous continue from the other end of the document.
    pub wrap_around: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            whole_word: false,
            use_regex: false,
            wrap_around: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("search pattern is empty")]
    Empty,

    #[error("invalid pattern `{pattern}`: {message}")]
    Invalid { pattern: String, message: String },

    #[error("invalid replacement: {message}")]
    Replacement { message: String },
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// One occurrence, within a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub range: Range,
    /// Group texts; index 0 is the whole match. Unmatched groups are `None`.
    pub captures: Vec<Option<String>>,
}

impl Match {
    /// The matched text.
    #[must_use]
    pub fn text(&self) -> &str {
        self.captures.first().and_then(Option::as_deref).unwrap_or("")
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        self.range.start.line
    }
}

/// Result of find next/previous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub matched: Match,
    /// The search ran off one end of the document and continued from the
    /// other.
    pub wrapped: bool,
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A compiled search.
#[derive(Debug, Clone)]
pub struct Query {
    pattern: String,
    options: SearchOptions,
    regex: Regex,
}

impl Query {
    /// Compile `pattern` under `options`.
    ///
    /// # Errors
    ///
    /// [`QueryError::Empty`] for an empty pattern; [`QueryError::Invalid`]
    /// when a regex does not parse.
    pub fn compile(pattern: &str, options: SearchOptions) -> Result<Self, QueryError> {
        if pattern.is_empty() {
            return Err(QueryError::Empty);
        }
        let source: Cow<'_, str> = if options.use_regex {
            Cow::Borrowed(pattern)
        } else {
            Cow::Owned(regex::escape(pattern))
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|e| QueryError::Invalid {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        log::debug!("search: compiled {pattern:?} with {options:?}");
        Ok(Self {
            pattern: pattern.to_string(),
            options,
            regex,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub const fn options(&self) -> SearchOptions {
        self.options
    }

    // -- Scanning -----------------------------------------------------------

    /// Every match in `buf`, lazily, in document order.
    #[must_use]
    pub fn matches<'a>(&'a self, buf: &'a Buffer) -> MatchIter<'a> {
        self.matches_from(buf, Position::ZERO)
    }

    /// Matches starting at or after `from`, lazily, in document order.
    #[must_use]
    pub fn matches_from<'a>(&'a self, buf: &'a Buffer, from: Position) -> MatchIter<'a> {
        MatchIter {
            query: self,
            buf,
            line: from.line,
            min_col: from.col,
            pending: VecDeque::new(),
        }
    }

    /// Matches on one line of `buf`. Out-of-range lines have none.
    #[must_use]
    pub fn matches_on_line(&self, buf: &Buffer, line: usize) -> Vec<Match> {
        self.matches_on_line_from(buf, line, 0)
    }

    /// Matches on one line starting at or after char column `col`. The
    /// search itself starts at `col`, so a match overlapping `col` does not
    /// hide one starting inside it; text before `col` still counts as
    /// context for `^`, `\b` and the whole-word check.
    fn matches_on_line_from(&self, buf: &Buffer, line: usize, col: usize) -> Vec<Match> {
        let Ok(slice) = buf.line_slice(line) else {
            return Vec::new();
        };
        let text = Cow::<str>::from(slice);
        let from_byte = text.char_indices().nth(col).map_or(text.len(), |(byte, _)| byte);
        self.find_in_line(line, &text, from_byte)
    }

    fn find_in_line(&self, line: usize, text: &str, from_byte: usize) -> Vec<Match> {
        let mut out = Vec::new();
        // Byte offsets grow monotonically, so char columns are counted
        // incrementally from the previous match.
        let (mut seen_byte, mut seen_col) = (0, 0);
        let mut col_of = |byte: usize| {
            seen_col += text[seen_byte..byte].chars().count();
            seen_byte = byte;
            seen_col
        };

        let mut at = from_byte;
        while at <= text.len() {
            let Some(caps) = self.regex.captures_at(text, at) else { break };
            let Some(whole) = caps.get(0) else { break };
            if whole.is_empty() {
                // Step over one char; empty matches are never reported.
                at = text[whole.end()..]
                    .chars()
                    .next()
                    .map_or(text.len() + 1, |ch| whole.end() + ch.len_utf8());
                continue;
            }
            at = whole.end();
            if self.options.whole_word && !is_whole_word(text, whole.start(), whole.end()) {
                continue;
            }
            let start = col_of(whole.start());
            let end = col_of(whole.end());
            out.push(Match {
                range: Range::new(Position::new(line, start), Position::new(line, end)),
                captures: caps
                    .iter()
                    .map(|g| g.map(|g| g.as_str().to_string()))
                    .collect(),
            });
        }
        out
    }

    // -- Navigation ---------------------------------------------------------

    /// The first match starting at or after `from`. With wrap-around on, a
    /// miss continues from the top of the document and the result is
    /// flagged `wrapped`.
    #[must_use]
    pub fn find_next(&self, buf: &Buffer, from: Position) -> Option<Found> {
        let from = buf.clamp_position(from);
        if let Some(matched) = self.matches_from(buf, from).next() {
            return Some(Found {
                matched,
                wrapped: false,
            });
        }
        if !self.options.wrap_around {
            return None;
        }
        self.matches(buf)
            .take_while(|m| m.range.start < from)
            .next()
            .map(|matched| Found {
                matched,
                wrapped: true,
            })
    }

    /// The last match starting before `from`. With wrap-around on, a miss
    /// continues from the bottom of the document and the result is flagged
    /// `wrapped`.
    #[must_use]
    pub fn find_prev(&self, buf: &Buffer, from: Position) -> Option<Found> {
        let from = buf.clamp_position(from);
        for line in (0..=from.line).rev() {
            let hit = self
                .matches_on_line(buf, line)
                .into_iter()
                .rfind(|m| m.range.start < from);
            if let Some(matched) = hit {
                return Some(Found {
                    matched,
                    wrapped: false,
                });
            }
        }
        if !self.options.wrap_around {
            return None;
        }
        for line in (from.line..buf.line_count()).rev() {
            let hit = self
                .matches_on_line(buf, line)
                .into_iter()
                .rfind(|m| m.range.start >= from);
            if let Some(matched) = hit {
                return Some(Found {
                    matched,
                    wrapped: true,
                });
            }
        }
        None
    }

    // -- Replacing ----------------------------------------------------------

    /// The edit replacing `m` with `template`. In regex mode `$N`, `${N}`
    /// substitute capture groups and `$$` is a literal dollar; otherwise the
    /// template is inserted as-is.
    ///
    /// # Errors
    ///
    /// [`QueryError::Replacement`] for a malformed `${...}` reference.
    pub fn replace(&self, m: &Match, template: &str) -> Result<Operation, QueryError> {
        let text = if self.options.use_regex {
            expand(template, &m.captures)?
        } else {
            template.to_string()
        };
        Ok(Operation::replace(m.range, text))
    }

    /// Replacements for every match in `buf`, highest position first, ready
    /// to be applied as one transaction. Positions are computed against the
    /// buffer as it is now.
    ///
    /// # Errors
    ///
    /// [`QueryError::Replacement`] for a malformed template, before any
    /// operation is built.
    pub fn replace_all(&self, buf: &Buffer, template: &str) -> Result<Vec<Operation>, QueryError> {
        if self.options.use_regex {
            expand(template, &[])?;
        }
        let mut ops = self
            .matches(buf)
            .map(|m| self.replace(&m, template))
            .collect::<Result<Vec<_>, _>>()?;
        ops.reverse();
        Ok(ops)
    }
}

/// Neither neighbour of `text[start..end]` is a word character.
fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let word = |c: char| c.is_alphanumeric() || c == '_';
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(word) && !after.is_some_and(word)
}

/// Substitute group references in `template`. Missing groups expand to
/// nothing.
fn expand(template: &str, captures: &[Option<String>]) -> Result<String, QueryError> {
    let group = |n: usize| captures.get(n).and_then(Option::as_deref).unwrap_or("");
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        rest = &rest[at + 1..];

        if let Some(after) = rest.strip_prefix('$') {
            out.push('$');
            rest = after;
        } else if let Some(braced) = rest.strip_prefix('{') {
            let close = braced.find('}').ok_or_else(|| QueryError::Replacement {
                message: "unclosed `${`".to_string(),
            })?;
            let name = &braced[..close];
            let n = name.parse::<usize>().map_err(|_| QueryError::Replacement {
                message: format!("`${{{name}}}` is not a group number"),
            })?;
            out.push_str(group(n));
            rest = &braced[close + 1..];
        } else {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                out.push('$');
            } else {
                let n = rest[..digits].parse::<usize>().unwrap_or(usize::MAX);
                out.push_str(group(n));
                rest = &rest[digits..];
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Lazy iteration
// ---------------------------------------------------------------------------

/// Lazy, borrowing iterator over matches; one line is searched at a time.
#[derive(Debug)]
pub struct MatchIter<'a> {
    query: &'a Query,
    buf: &'a Buffer,
    line: usize,
    /// Only applies to the first line.
    min_col: usize,
    pending: VecDeque<Match>,
}

impl Iterator for MatchIter<'_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        loop {
            if let Some(m) = self.pending.pop_front() {
                return Some(m);
            }
            if self.line >= self.buf.line_count() {
                return None;
            }
            let min_col = std::mem::take(&mut self.min_col);
            self.pending
                .extend(self.query.matches_on_line_from(self.buf, self.line, min_col));
            self.line += 1;
        }
    }
}

/// What one [`Scan::step`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStep {
    /// Matches from the lines just scanned; more lines remain.
    Partial(Vec<Match>),
    /// Matches from the last lines; the scan is finished.
    Done(Vec<Match>),
    /// The buffer changed since the scan started. Earlier results are stale.
    Stale,
}

/// A resumable whole-document scan that owns its position, so the shell can
/// keep it between events and drop it to cancel.
#[derive(Debug, Clone)]
pub struct Scan {
    query: Query,
    generation: u64,
    line: usize,
}

impl Scan {
    /// Start scanning `buf` from the top.
    #[must_use]
    pub fn new(query: Query, buf: &Buffer) -> Self {
        Self {
            query,
            generation: buf.generation(),
            line: 0,
        }
    }

    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// The buffer generation the scan belongs to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Search up to `budget` more lines (at least one).
    pub fn step(&mut self, buf: &Buffer, budget: usize) -> ScanStep {
        if buf.generation() != self.generation {
            log::debug!(
                "search: scan for generation {} is stale (now {})",
                self.generation,
                buf.generation()
            );
            return ScanStep::Stale;
        }
        let end = self.line.saturating_add(budget.max(1)).min(buf.line_count());
        let mut found = Vec::new();
        for line in self.line..end {
            found.extend(self.query.matches_on_line(buf, line));
        }
        self.line = end;
        if self.line >= buf.line_count() {
            ScanStep::Done(found)
        } else {
            ScanStep::Partial(found)
        }
    }
}

// ---------------------------------------------------------------------------
// MatchSet
// ---------------------------------------------------------------------------

/// Matches delivered to the shell, tagged with the generation they were
/// computed against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    pub generation: u64,
    pub matches: Vec<Match>,
}

impl MatchSet {
    /// Every match of `query` in `buf`.
    #[must_use]
    pub fn collect(query: &Query, buf: &Buffer) -> Self {
        Self {
            generation: buf.generation(),
            matches: query.matches(buf).collect(),
        }
    }

    /// True when `change` touched a line holding a match, or moved one.
    #[must_use]
    pub fn is_invalidated_by(&self, change: &ChangeDescriptor) -> bool {
        self.matches.iter().any(|m| {
            let line = m.line();
            (change.start_line..=change.old_end_line).contains(&line)
                || (line > change.old_end_line && change.line_delta() != 0)
        })
    }

    /// Bring the set up to date with `change` (already applied to `buf`):
    /// matches on touched lines are recomputed, those below are shifted.
    /// Returns true if the set changed.
    pub fn update(&mut self, change: &ChangeDescriptor, query: &Query, buf: &Buffer) -> bool {
        let before_len = self.matches.len();
        let delta = change.line_delta();
        let first_below = self
            .matches
            .partition_point(|m| m.line() <= change.old_end_line);
        let first_touched = self.matches.partition_point(|m| m.line() < change.start_line);

        let mut below = self.matches.split_off(first_below);
        let removed = self.matches.len() - first_touched;
        self.matches.truncate(first_touched);

        let mut fresh = Vec::new();
        for line in change.start_line..=change.new_end_line {
            fresh.extend(query.matches_on_line(buf, line));
        }
        let added = fresh.len();
        self.matches.extend(fresh);

        if delta != 0 {
            for m in &mut below {
                m.range.start.line = m.range.start.line.saturating_add_signed(delta);
                m.range.end.line = m.range.end.line.saturating_add_signed(delta);
            }
        }
        let moved = delta != 0 && !below.is_empty();
        self.matches.append(&mut below);
        self.generation = buf.generation();

        removed > 0 || added > 0 || moved || before_len != self.matches.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
