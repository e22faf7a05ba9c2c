//! One editing session: the boundary the shell talks to.
//!
//! A [`Session`] owns a [`Document`] and keeps everything derived from it in
//! step: the highlighter cache, the active search and its match set, and the
//! state published to the autosave worker. Every mutating call returns an
//! [`Update`] describing what the shell has to repaint.
//!
//! All calls happen on the shell's thread. The only other thread is the
//! autosave worker, which sees the document through the [`Snapshotter`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use n_syntax::Language;
use thiserror::Error;

use crate::autosave::{Autosave, AutosaveEvent, SnapshotOutcome, Snapshotter};
use crate::buffer::LineEnding;
use crate::change::ChangeDescriptor;
use crate::config::EditorConfig;
use crate::document::{Document, DocumentError};
use crate::encoding::{Encoding, SaveMode};
use crate::error::RangeError;
use crate::files::Backups;
use crate::highlight::{Highlighter, TokenSpan};
use crate::history::{History, HistoryStep, Operation};
use crate::position::Position;
use crate::recovery::{RecoveryError, RecoveryHandle, RecoveryStore};
use crate::search::{Found, Match, MatchSet, Query, QueryError, Scan, ScanStep, SearchOptions};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error("no active search")]
    NoSearch,

    #[error("match at {0} no longer matches the text")]
    StaleMatch(Position),
}

/// What a call changed, for the shell to act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    /// The span the text changed in; `None` when nothing changed.
    pub change: Option<ChangeDescriptor>,
    /// Re-tokenized spans, in document order.
    pub tokens: Vec<TokenSpan>,
    /// The new dirty state, when it flipped.
    pub dirty_changed: Option<bool>,
    /// The active search's matches changed.
    pub matches_invalidated: bool,
}

#[derive(Debug)]
struct ActiveSearch {
    query: Query,
    /// Running find-all; `None` once finished.
    scan: Option<Scan>,
    matches: MatchSet,
}

#[derive(Debug)]
pub struct Session {
    doc: Document,
    config: EditorConfig,
    highlighter: Option<Highlighter>,
    search: Option<ActiveSearch>,
    snapshotter: Arc<Snapshotter>,
    autosave: Option<Autosave>,
    backups: Option<Backups>,
    /// Identity of a recovery record restored into this document.
    recovered_from: Option<String>,
}

impl Session {
    /// Start a session over `doc`.
    ///
    /// Starts the autosave worker when enabled; failing to start it is
    /// logged and the session runs without background snapshots.
    #[must_use]
    pub fn new(mut doc: Document, config: EditorConfig) -> Self {
        if !doc.history().can_undo() && !doc.history().can_redo() {
            *doc.history_mut() = History::with_coalesce_gap(config.coalesce_gap());
        }

        let highlighter = config
            .highlight
            .enabled
            .then(|| Highlighter::new(doc.language(), doc.buffer()));
        let store = RecoveryStore::new(config.recovery_dir());
        let snapshotter = Arc::new(Snapshotter::new(store, &doc));

        let autosave = if config.autosave.enabled {
            match Autosave::spawn(Arc::clone(&snapshotter), config.autosave_interval()) {
                Ok(worker) => Some(worker),
                Err(e) => {
                    log::warn!("autosave: worker did not start: {e}");
                    None
                }
            }
        } else {
            None
        };

        let backups = config
            .files
            .backup_on_save
            .then(|| Backups::new(config.backup_dir(), config.files.max_backups));

        Self {
            doc,
            config,
            highlighter,
            search: None,
            snapshotter,
            autosave,
            backups,
            recovered_from: None,
        }
    }

    /// A session over a new, empty document.
    #[must_use]
    pub fn untitled(config: EditorConfig) -> Self {
        let doc = Document::new(config.files.default_encoding);
        Self::new(doc, config)
    }

    /// A session over the file at `path`.
    ///
    /// # Errors
    ///
    /// See [`Document::open`].
    pub fn open(path: &Path, config: EditorConfig) -> Result<Self, DocumentError> {
        let doc = Document::open(path, config.files.default_encoding)?;
        Ok(Self::new(doc, config))
    }

    // -- Accessors ----------------------------------------------------------

    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.doc
    }

    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[must_use]
    pub const fn highlighter(&self) -> Option<&Highlighter> {
        self.highlighter.as_ref()
    }

    /// The active query, if a search was started.
    #[must_use]
    pub fn query(&self) -> Option<&Query> {
        self.search.as_ref().map(|s| &s.query)
    }

    /// Matches of the active search found so far.
    #[must_use]
    pub fn matches(&self) -> &[Match] {
        self.search.as_ref().map_or(&[], |s| s.matches.matches.as_slice())
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.doc.is_dirty()
    }

    // -- Editing ------------------------------------------------------------

    /// Apply an edit intent, joining the open transaction when it continues
    /// it.
    ///
    /// # Errors
    ///
    /// [`RangeError`] when the intent does not fit the text; nothing changes.
    pub fn apply_edit(&mut self, op: &Operation) -> Result<Update, RangeError> {
        self.apply_edit_at(op, Instant::now())
    }

    /// [`apply_edit`](Self::apply_edit) with an explicit clock.
    ///
    /// # Errors
    ///
    /// As for [`apply_edit`](Self::apply_edit).
    pub fn apply_edit_at(&mut self, op: &Operation, now: Instant) -> Result<Update, RangeError> {
        let was_dirty = self.doc.is_dirty();
        let open = self.open_transaction();
        let result = self.doc.apply_at(op, now);
        // The idle gap or a jump to a new spot closes the open transaction
        // inside the history.
        let update = result.map(|change| self.after_change(Some(change), was_dirty));
        if self.closed_since(open) {
            self.after_commit();
        }
        update
    }

    /// Close the open transaction. Returns false (and changes nothing) when
    /// none was open.
    pub fn commit_transaction(&mut self) -> bool {
        let committed = self.doc.commit();
        if committed {
            self.after_commit();
        }
        committed
    }

    /// Commit the open transaction if it has been idle past the configured
    /// gap. Call from the shell's idle timer.
    pub fn idle(&mut self, now: Instant) -> bool {
        let committed = self.doc.history_mut().expire(now);
        if committed {
            self.after_commit();
        }
        committed
    }

    /// # Errors
    ///
    /// See [`History::undo`].
    pub fn undo(&mut self) -> Result<Update, RangeError> {
        let was_dirty = self.doc.is_dirty();
        let open = self.open_transaction();
        let update = self.doc.undo().map(|step| self.after_step(step, was_dirty));
        if self.closed_since(open) {
            self.after_commit();
        }
        update
    }

    /// # Errors
    ///
    /// See [`History::redo`].
    pub fn redo(&mut self) -> Result<Update, RangeError> {
        let was_dirty = self.doc.is_dirty();
        let open = self.open_transaction();
        let update = self.doc.redo().map(|step| self.after_step(step, was_dirty));
        if self.closed_since(open) {
            self.after_commit();
        }
        update
    }

    /// Drop undo/redo history. The text and dirty state are unchanged.
    pub fn clear_history(&mut self) {
        self.doc.clear_history();
    }

    pub fn set_encoding(&mut self, encoding: Encoding) -> Update {
        let was_dirty = self.doc.is_dirty();
        self.doc.set_encoding(encoding);
        self.after_change(None, was_dirty)
    }

    pub fn set_line_ending(&mut self, ending: LineEnding) -> Update {
        let was_dirty = self.doc.is_dirty();
        self.doc.set_line_ending(ending);
        self.after_change(None, was_dirty)
    }

    // -- Highlighting -------------------------------------------------------

    /// Select a grammar. The cache is discarded; drive the full pass with
    /// [`highlight_step`](Self::highlight_step).
    pub fn set_language(&mut self, language: Language) {
        self.doc.set_language(language);
        if let Some(hl) = &mut self.highlighter {
            hl.set_language(language, self.doc.buffer());
        }
    }

    /// Tokenize up to `budget` lines of the pending full pass.
    pub fn highlight_step(&mut self, budget: usize) -> Vec<TokenSpan> {
        self.highlighter
            .as_mut()
            .map(|hl| hl.tokenize_pending(self.doc.buffer(), budget))
            .unwrap_or_default()
    }

    /// Spans of `line`, or `None` if it has not been tokenized (or
    /// highlighting is off).
    #[must_use]
    pub fn line_tokens(&self, line: usize) -> Option<Vec<TokenSpan>> {
        self.highlighter.as_ref()?.spans(line)
    }

    // -- Search -------------------------------------------------------------

    /// Compile `pattern` and make it the active search. The find-all scan
    /// starts empty; drive it with [`search_step`](Self::search_step).
    ///
    /// # Errors
    ///
    /// [`QueryError`] for an empty or malformed pattern; the previous search
    /// stays active.
    pub fn compile_and_search(&mut self, pattern: &str, options: SearchOptions) -> Result<&Query, QueryError> {
        let query = Query::compile(pattern, options)?;
        let scan = Scan::new(query.clone(), self.doc.buffer());
        let search = self.search.insert(ActiveSearch {
            query,
            scan: Some(scan),
            matches: MatchSet {
                generation: self.doc.buffer().generation(),
                matches: Vec::new(),
            },
        });
        Ok(&search.query)
    }

    /// Compile `pattern` with the configured search options.
    ///
    /// # Errors
    ///
    /// As for [`compile_and_search`](Self::compile_and_search).
    pub fn search(&mut self, pattern: &str) -> Result<&Query, QueryError> {
        self.compile_and_search(pattern, self.config.search)
    }

    /// Advance the find-all scan by up to `budget` lines. A stale scan (the
    /// text changed) is restarted from the top and reported as such; the
    /// shell drops the matches it was showing.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSearch`] without an active search.
    pub fn search_step(&mut self, budget: usize) -> Result<ScanStep, SessionError> {
        let search = self.search.as_mut().ok_or(SessionError::NoSearch)?;
        let Some(scan) = &mut search.scan else {
            return Ok(ScanStep::Done(Vec::new()));
        };

        let step = scan.step(self.doc.buffer(), budget);
        match &step {
            ScanStep::Partial(found) => search.matches.matches.extend_from_slice(found),
            ScanStep::Done(found) => {
                search.matches.matches.extend_from_slice(found);
                search.matches.generation = self.doc.buffer().generation();
                search.scan = None;
            }
            ScanStep::Stale => {
                search.matches = MatchSet {
                    generation: self.doc.buffer().generation(),
                    matches: Vec::new(),
                };
                search.scan = Some(Scan::new(search.query.clone(), self.doc.buffer()));
            }
        }
        Ok(step)
    }

    /// Run the find-all scan to the end and return every match.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSearch`] without an active search.
    pub fn find_all(&mut self) -> Result<&[Match], SessionError> {
        while let ScanStep::Partial(_) | ScanStep::Stale = self.search_step(usize::MAX)? {}
        Ok(self.matches())
    }

    /// Next match of the active search from `from`. Commits the open
    /// transaction first, since the shell is about to move the cursor.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSearch`] without an active search.
    pub fn find_next(&mut self, from: Position) -> Result<Option<Found>, SessionError> {
        self.commit_transaction();
        let search = self.search.as_ref().ok_or(SessionError::NoSearch)?;
        Ok(search.query.find_next(self.doc.buffer(), from))
    }

    /// Previous match of the active search before `from`.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSearch`] without an active search.
    pub fn find_prev(&mut self, from: Position) -> Result<Option<Found>, SessionError> {
        self.commit_transaction();
        let search = self.search.as_ref().ok_or(SessionError::NoSearch)?;
        Ok(search.query.find_prev(self.doc.buffer(), from))
    }

    /// Replace one match as its own undo step.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSearch`], [`SessionError::StaleMatch`] when the
    /// text under `m` changed since it was found, or a malformed template.
    pub fn replace(&mut self, m: &Match, template: &str) -> Result<Update, SessionError> {
        let search = self.search.as_ref().ok_or(SessionError::NoSearch)?;
        if self.doc.buffer().read(m.range).ok().as_deref() != Some(m.text()) {
            return Err(SessionError::StaleMatch(m.range.start));
        }
        let op = search.query.replace(m, template)?;
        let was_dirty = self.doc.is_dirty();
        let step = self.doc.apply_transaction(&[op])?;
        let update = self.after_step(step, was_dirty);
        self.after_commit();
        Ok(update)
    }

    /// Replace every match of the active search as one undo step. Returns the
    /// number of replacements.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSearch`] or a malformed template; nothing changes.
    pub fn replace_all(&mut self, template: &str) -> Result<(usize, Update), SessionError> {
        let search = self.search.as_ref().ok_or(SessionError::NoSearch)?;
        let ops = search.query.replace_all(self.doc.buffer(), template)?;
        if ops.is_empty() {
            return Ok((0, Update::default()));
        }
        let was_dirty = self.doc.is_dirty();
        let step = self.doc.apply_transaction(&ops)?;
        log::debug!("session: replaced {} matches", ops.len());
        let update = self.after_step(step, was_dirty);
        self.after_commit();
        Ok((ops.len(), update))
    }

    // -- Recovery -----------------------------------------------------------

    /// Ask for a snapshot soon. Goes through the worker when it runs, else
    /// snapshots on this thread; failures are logged.
    pub fn request_snapshot_now(&self) {
        if let Some(worker) = &self.autosave {
            worker.request();
        } else if let Err(e) = self.snapshotter.snapshot() {
            log::warn!("autosave: snapshot failed: {e}");
        }
    }

    /// Snapshot on this thread and report the outcome.
    ///
    /// # Errors
    ///
    /// Whatever the recovery store reports.
    pub fn snapshot_now(&self) -> Result<SnapshotOutcome, RecoveryError> {
        self.snapshotter.snapshot()
    }

    /// Notifications from the autosave worker since the last call.
    #[must_use]
    pub fn autosave_events(&self) -> Vec<AutosaveEvent> {
        self.autosave.as_ref().map(Autosave::events).unwrap_or_default()
    }

    /// Snapshots left behind by earlier sessions (or this one), newest first.
    ///
    /// # Errors
    ///
    /// [`RecoveryError::Io`] if the recovery directory cannot be read.
    pub fn list_pending_recoveries(&self) -> Result<Vec<RecoveryHandle>, RecoveryError> {
        self.snapshotter.store().list_pending()
    }

    /// Replace the document's text with a snapshot's, as one undo step, and
    /// mark the document dirty. The snapshot stays on disk until the document
    /// is saved or closed.
    ///
    /// # Errors
    ///
    /// Any [`RecoveryError`] reading the snapshot.
    pub fn accept_recovery(&mut self, handle: &RecoveryHandle) -> Result<Update, SessionError> {
        let record = self.snapshotter.store().load(handle)?;
        let was_dirty = self.doc.is_dirty();

        let full = self.doc.buffer().full_range();
        let step = self.doc.apply_transaction(&[Operation::replace(full, record.content)])?;
        self.doc.set_encoding(record.encoding);
        self.doc.mark_dirty();
        if record.identity != self.doc.identity() {
            self.recovered_from = Some(record.identity);
        }
        log::info!("recovered {} from snapshot of {}", self.doc.identity(), handle.identity);

        let mut update = self.after_step(step, was_dirty);
        if update.change.is_none() {
            // Same text; only the dirty flag moved.
            update.dirty_changed = (!was_dirty).then_some(true);
        }
        Ok(update)
    }

    /// Delete a pending snapshot without restoring it.
    ///
    /// # Errors
    ///
    /// [`RecoveryError::Io`] if the record cannot be removed.
    pub fn discard_recovery(&self, handle: &RecoveryHandle) -> Result<bool, RecoveryError> {
        self.snapshotter.discard(&handle.identity)
    }

    // -- Saving and closing -------------------------------------------------

    /// Save to the document's path and drop its recovery snapshot.
    ///
    /// # Errors
    ///
    /// See [`Document::save`].
    pub fn save(&mut self, mode: SaveMode) -> Result<Update, SessionError> {
        let was_dirty = self.doc.is_dirty();
        self.doc.save(mode, self.backups.as_ref())?;
        self.after_save(None, was_dirty)
    }

    /// Save to `path`, adopting it as the document's path.
    ///
    /// # Errors
    ///
    /// See [`Document::save_as`].
    pub fn save_as(&mut self, path: &Path, mode: SaveMode) -> Result<Update, SessionError> {
        let was_dirty = self.doc.is_dirty();
        let old_identity = self.doc.identity().to_string();
        let old_language = self.doc.language();
        self.doc.save_as(path, mode, self.backups.as_ref())?;

        if self.doc.language() != old_language {
            if let Some(hl) = &mut self.highlighter {
                hl.set_language(self.doc.language(), self.doc.buffer());
            }
        }
        let old = (old_identity != self.doc.identity()).then_some(old_identity);
        self.after_save(old, was_dirty)
    }

    /// End the session normally: stop autosave and drop the snapshot.
    ///
    /// # Errors
    ///
    /// [`RecoveryError::Io`] if the snapshot cannot be removed.
    pub fn close(mut self) -> Result<(), RecoveryError> {
        if let Some(mut worker) = self.autosave.take() {
            worker.stop();
        }
        self.snapshotter.discard(self.doc.identity())?;
        if let Some(identity) = self.recovered_from.take() {
            self.snapshotter.discard(&identity)?;
        }
        log::info!("closed {}", self.doc.identity());
        Ok(())
    }

    // -- Internals ----------------------------------------------------------

    fn after_step(&mut self, step: HistoryStep, was_dirty: bool) -> Update {
        self.after_change(step.change(), was_dirty)
    }

    fn after_change(&mut self, change: Option<ChangeDescriptor>, was_dirty: bool) -> Update {
        let mut update = Update {
            change,
            ..Update::default()
        };

        if let Some(change) = &change {
            if let Some(hl) = &mut self.highlighter {
                update.tokens = hl.on_change(change, self.doc.buffer());
            }
            if let Some(search) = &mut self.search {
                update.matches_invalidated = if search.scan.is_some() {
                    // Mid-scan: the scan will report itself stale.
                    !search.matches.matches.is_empty()
                } else {
                    search.matches.update(change, &search.query, self.doc.buffer())
                };
            }
        }

        self.snapshotter.publish(&self.doc);
        let dirty = self.doc.is_dirty();
        if dirty != was_dirty {
            update.dirty_changed = Some(dirty);
            if !dirty {
                // Back at the saved text: nothing left to recover.
                self.discard_snapshot(self.doc.identity().to_string());
            }
        }
        update
    }

    /// Revision of the open transaction, if one is open.
    fn open_transaction(&self) -> Option<u64> {
        let history = self.doc.history();
        history.is_open().then_some(history.revision())
    }

    /// True if the transaction that was `open` has since been committed.
    fn closed_since(&self, open: Option<u64>) -> bool {
        open.is_some() && self.open_transaction() != open
    }

    fn after_commit(&self) {
        if self.config.autosave.snapshot_on_commit && self.doc.is_dirty() {
            self.request_snapshot_now();
        }
    }

    fn after_save(&mut self, old_identity: Option<String>, was_dirty: bool) -> Result<Update, SessionError> {
        self.snapshotter.publish(&self.doc);
        self.snapshotter.discard(self.doc.identity())?;
        if let Some(old) = old_identity {
            self.snapshotter.discard(&old)?;
        }
        if let Some(identity) = self.recovered_from.take() {
            self.snapshotter.discard(&identity)?;
        }
        let dirty = self.doc.is_dirty();
        Ok(Update {
            dirty_changed: (dirty != was_dirty).then_some(dirty),
            ..Update::default()
        })
    }

    fn discard_snapshot(&self, identity: String) {
        if let Err(e) = self.snapshotter.discard(&identity) {
            log::warn!("recovery: could not discard snapshot of {identity}: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
