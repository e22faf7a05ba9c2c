//! Undo/redo history: transaction-based edit tracking.
//!
//! Every mutation goes through [`History::apply`], which performs an
//! [`Operation`] (the caller's intent) on the buffer and records the
//! resulting reversible [`Edit`]. Edits are grouped into [`Transaction`]s,
//! the unit of undo/redo.
//!
//! # Grouping
//!
//! At most one transaction is *open*, and when there is one it is the top of
//! the done stack. An edit joins the open transaction when it is the same
//! kind as the previous edit, starts where that one ended, and arrives
//! within the idle gap; otherwise the open transaction is committed and a new
//! one opened. So typing a word is one transaction, and so is a run of
//! backspaces. Cursor movement, search jumps and the like call
//! [`History::commit`].
//!
//! ```text
//! Idle --apply--> Open(kind, last_at) --apply (contiguous, same kind, in gap)--> Open
//!                   |  \--apply (otherwise)--> commit, Open(new)
//!                   \--commit / expire / undo--> Idle
//! ```
//!
//! Edits that change nothing (empty insert, empty delete) are not recorded.
//! The stacks are unbounded; [`History::clear`] is the only eviction.

use std::time::{Duration, Instant};

use crate::buffer::{Buffer, LineEnding, normalize_line_endings};
use crate::change::ChangeDescriptor;
use crate::error::RangeError;
use crate::position::{Position, Range};

/// Default idle gap after which an open transaction closes.
pub const DEFAULT_COALESCE_GAP: Duration = Duration::from_millis(1000);

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// An edit intent, as the shell expresses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert { pos: Position, text: String },
    Delete { range: Range },
    Replace { range: Range, text: String },
}

impl Operation {
    #[must_use]
    pub fn insert(pos: Position, text: impl Into<String>) -> Self {
        Self::Insert {
            pos,
            text: text.into(),
        }
    }

    #[must_use]
    pub const fn delete(range: Range) -> Self {
        Self::Delete { range }
    }

    #[must_use]
    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        Self::Replace {
            range,
            text: text.into(),
        }
    }

    /// Perform the intent on `buf`, returning the recorded edit (`None` when
    /// nothing changed) and the change descriptor.
    fn perform(&self, buf: &mut Buffer) -> Result<(Option<Edit>, ChangeDescriptor), RangeError> {
        match self {
            Self::Insert { pos, text } => {
                let change = buf.insert(*pos, text)?;
                let edit = (!text.is_empty()).then(|| Edit::Insert {
                    pos: *pos,
                    // Record the text as the buffer stored it.
                    text: normalize_line_endings(text, LineEnding::Lf).into_owned(),
                });
                Ok((edit, change))
            }
            Self::Delete { range } => {
                let (removed, change) = buf.delete(*range)?;
                let edit = (!removed.is_empty()).then(|| Edit::Delete {
                    pos: range.start,
                    text: removed,
                });
                Ok((edit, change))
            }
            Self::Replace { range, text } => {
                let (old, change) = buf.replace(*range, text)?;
                let new = normalize_line_endings(text, LineEnding::Lf).into_owned();
                let edit = (old != new).then(|| Edit::Replace {
                    pos: range.start,
                    old,
                    new,
                });
                Ok((edit, change))
            }
        }
    }

    const fn kind(&self) -> Kind {
        match self {
            Self::Insert { .. } => Kind::Insert,
            Self::Delete { .. } => Kind::Delete,
            Self::Replace { .. } => Kind::Replace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Insert,
    Delete,
    Replace,
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// A recorded, reversible buffer edit.
///
/// Each variant carries the text on both sides of the change, so its inverse
/// needs no access to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Insert { pos: Position, text: String },
    Delete { pos: Position, text: String },
    Replace { pos: Position, old: String, new: String },
}

impl Edit {
    /// The edit that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::Insert { pos, text } => Self::Delete {
                pos: *pos,
                text: text.clone(),
            },
            Self::Delete { pos, text } => Self::Insert {
                pos: *pos,
                text: text.clone(),
            },
            Self::Replace { pos, old, new } => Self::Replace {
                pos: *pos,
                old: new.clone(),
                new: old.clone(),
            },
        }
    }

    fn apply(&self, buf: &mut Buffer) -> Result<ChangeDescriptor, RangeError> {
        match self {
            Self::Insert { pos, text } => buf.insert(*pos, text),
            Self::Delete { pos, text } => buf.delete(Range::new(*pos, pos.after(text))).map(|(_, c)| c),
            Self::Replace { pos, old, new } => {
                buf.replace(Range::new(*pos, pos.after(old)), new).map(|(_, c)| c)
            }
        }
    }

    /// Fold `next` into `self` when it continues it: typing after an insert,
    /// or a backspace / forward delete next to a delete.
    fn absorb(&mut self, next: &Self) -> bool {
        match (self, next) {
            (Self::Insert { pos, text }, Self::Insert { pos: at, text: more }) => {
                if *at != pos.after(text) {
                    return false;
                }
                text.push_str(more);
                true
            }
            (Self::Delete { pos, text }, Self::Delete { pos: at, text: more }) => {
                if *at == *pos {
                    // forward delete
                    text.push_str(more);
                    true
                } else if at.after(more) == *pos {
                    // backspace
                    text.insert_str(0, more);
                    *pos = *at;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A non-empty group of edits that undo and redo as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    id: u64,
    edits: Vec<Edit>,
}

impl Transaction {
    /// Unique within one history; never reused.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Apply the inverse of each edit, last first.
    fn revert(&self, buf: &mut Buffer) -> Result<ChangeDescriptor, RangeError> {
        let inverses: Vec<Edit> = self.edits.iter().rev().map(Edit::inverse).collect();
        apply_all(buf, &inverses)
    }

    fn reapply(&self, buf: &mut Buffer) -> Result<ChangeDescriptor, RangeError> {
        apply_all(buf, &self.edits)
    }
}

/// Apply `edits` in order. On failure the ones already applied are rolled
/// back, so the buffer is left as it was.
fn apply_all(buf: &mut Buffer, edits: &[Edit]) -> Result<ChangeDescriptor, RangeError> {
    let mut merged: Option<ChangeDescriptor> = None;
    for (i, edit) in edits.iter().enumerate() {
        match edit.apply(buf) {
            Ok(change) => merged = Some(merged.map_or(change, |m| m.merge(change))),
            Err(e) => {
                roll_back(buf, &edits[..i]);
                return Err(e);
            }
        }
    }
    let fallback = ChangeDescriptor::new(0, 0, 0, buf.generation());
    Ok(merged.unwrap_or(fallback))
}

fn roll_back(buf: &mut Buffer, applied: &[Edit]) {
    for edit in applied.iter().rev() {
        if let Err(e) = edit.inverse().apply(buf) {
            log::error!("history: rollback failed, buffer may be inconsistent: {e}");
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Outcome of undo/redo. An empty stack is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum HistoryStep {
    Changed(ChangeDescriptor),
    NoOp,
}

impl HistoryStep {
    #[must_use]
    pub const fn change(self) -> Option<ChangeDescriptor> {
        match self {
            Self::Changed(c) => Some(c),
            Self::NoOp => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Group {
    Idle,
    Open { kind: Kind, last_at: Instant },
}

/// Undo/redo stacks for one buffer.
#[derive(Debug)]
pub struct History {
    done: Vec<Transaction>,
    undone: Vec<Transaction>,
    group: Group,
    gap: Duration,
    next_id: u64,
}

impl History {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_coalesce_gap(DEFAULT_COALESCE_GAP)
    }

    /// A history whose open transaction closes after `gap` without edits.
    #[must_use]
    pub const fn with_coalesce_gap(gap: Duration) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            group: Group::Idle,
            gap,
            next_id: 1,
        }
    }

    #[must_use]
    pub const fn coalesce_gap(&self) -> Duration {
        self.gap
    }

    // -- Applying -----------------------------------------------------------

    /// Apply `op` now. See [`apply_at`](Self::apply_at).
    ///
    /// # Errors
    ///
    /// A [`RangeError`] when `op` does not fit the buffer; nothing changes.
    pub fn apply(&mut self, buf: &mut Buffer, op: &Operation) -> Result<ChangeDescriptor, RangeError> {
        self.apply_at(buf, op, Instant::now())
    }

    /// Apply `op` to `buf` at time `now`, joining or opening a transaction.
    ///
    /// # Errors
    ///
    /// A [`RangeError`] when `op` does not fit the buffer; neither the buffer
    /// nor the history changes.
    pub fn apply_at(
        &mut self,
        buf: &mut Buffer,
        op: &Operation,
        now: Instant,
    ) -> Result<ChangeDescriptor, RangeError> {
        self.expire(now);
        let (edit, change) = op.perform(buf)?;
        let Some(edit) = edit else {
            return Ok(change);
        };
        self.undone.clear();

        let kind = op.kind();
        if let Group::Open { kind: open_kind, .. } = self.group {
            if open_kind == kind && kind != Kind::Replace {
                let absorbed = self
                    .done
                    .last_mut()
                    .and_then(|txn| txn.edits.last_mut())
                    .is_some_and(|last| last.absorb(&edit));
                if absorbed {
                    log::debug!("history: coalesced {kind:?} into transaction {}", self.revision());
                    self.group = Group::Open { kind, last_at: now };
                    return Ok(change);
                }
            }
        }

        self.commit();
        let id = self.next_id;
        self.next_id += 1;
        self.done.push(Transaction { id, edits: vec![edit] });
        self.group = Group::Open { kind, last_at: now };
        log::debug!("history: opened transaction {id} ({kind:?})");
        Ok(change)
    }

    /// Apply `ops` in order as one committed transaction (replace-all).
    ///
    /// Any open transaction is committed first. If an operation fails, the
    /// ones before it are rolled back and the history is unchanged.
    ///
    /// # Errors
    ///
    /// The [`RangeError`] of the first operation that does not fit.
    pub fn apply_transaction(&mut self, buf: &mut Buffer, ops: &[Operation]) -> Result<HistoryStep, RangeError> {
        self.commit();
        let mut edits = Vec::with_capacity(ops.len());
        let mut merged: Option<ChangeDescriptor> = None;
        for op in ops {
            match op.perform(buf) {
                Ok((edit, change)) => {
                    edits.extend(edit);
                    merged = Some(merged.map_or(change, |m| m.merge(change)));
                }
                Err(e) => {
                    roll_back(buf, &edits);
                    return Err(e);
                }
            }
        }
        if edits.is_empty() {
            return Ok(HistoryStep::NoOp);
        }

        self.undone.clear();
        let id = self.next_id;
        self.next_id += 1;
        log::debug!("history: transaction {id} with {} edits", edits.len());
        self.done.push(Transaction { id, edits });
        Ok(merged.map_or(HistoryStep::NoOp, HistoryStep::Changed))
    }

    // -- Grouping -----------------------------------------------------------

    /// Close the open transaction. Returns whether one was open; calling it
    /// again is a no-op that leaves both stacks alone.
    pub fn commit(&mut self) -> bool {
        match self.group {
            Group::Idle => false,
            Group::Open { .. } => {
                self.group = Group::Idle;
                log::debug!("history: committed transaction {}", self.revision());
                true
            }
        }
    }

    /// Commit the open transaction if it has been idle longer than the gap.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.group {
            Group::Open { last_at, .. } if now.saturating_duration_since(last_at) > self.gap => self.commit(),
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.group, Group::Open { .. })
    }

    // -- Undo / redo --------------------------------------------------------

    /// Revert the most recent transaction, committing it first if open.
    ///
    /// # Errors
    ///
    /// A [`RangeError`] if the buffer no longer matches the recorded edits
    /// (it was mutated behind the history's back). Stacks are unchanged.
    pub fn undo(&mut self, buf: &mut Buffer) -> Result<HistoryStep, RangeError> {
        self.commit();
        let Some(txn) = self.done.pop() else {
            return Ok(HistoryStep::NoOp);
        };
        match txn.revert(buf) {
            Ok(change) => {
                log::debug!("history: undo transaction {}", txn.id);
                self.undone.push(txn);
                Ok(HistoryStep::Changed(change))
            }
            Err(e) => {
                self.done.push(txn);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone transaction.
    ///
    /// # Errors
    ///
    /// As for [`undo`](Self::undo).
    pub fn redo(&mut self, buf: &mut Buffer) -> Result<HistoryStep, RangeError> {
        self.commit();
        let Some(txn) = self.undone.pop() else {
            return Ok(HistoryStep::NoOp);
        };
        match txn.reapply(buf) {
            Ok(change) => {
                log::debug!("history: redo transaction {}", txn.id);
                self.done.push(txn);
                Ok(HistoryStep::Changed(change))
            }
            Err(e) => {
                self.undone.push(txn);
                Err(e)
            }
        }
    }

    // -- Inspection ---------------------------------------------------------

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    #[must_use]
    pub fn undo_count(&self) -> usize {
        self.done.len()
    }

    #[must_use]
    pub fn redo_count(&self) -> usize {
        self.undone.len()
    }

    /// Id of the transaction the text currently reflects; 0 for none.
    ///
    /// Equal revisions mean equal text, which is how the document tracks
    /// dirtiness across undo and redo.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.done.last().map_or(0, Transaction::id)
    }

    /// The most recent transaction, open or not.
    #[must_use]
    pub fn last(&self) -> Option<&Transaction> {
        self.done.last()
    }

    /// Drop both stacks. The manual "clear history" action.
    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
        self.group = Group::Idle;
        log::debug!("history: cleared");
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
