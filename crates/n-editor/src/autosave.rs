//! Background autosave into the recovery store.
//!
//! The editing timeline never blocks on disk. After every change it
//! *publishes* the document into a [`Snapshotter`]: an O(1) rope clone plus
//! the generation, dirty flag, identity and encoding, swapped in under a
//! short write lock. The worker thread wakes on a timer tick or on request,
//! reads the published state (never a half-applied edit) and writes it to
//! the [`RecoveryStore`].
//!
//! A second lock serialises store writes with discards, so a snapshot that
//! was already in flight when the user saved cannot resurrect the record
//! the save deleted.
//!
//! Failures are reported once per run of failures (a `warn!` and one
//! [`AutosaveEvent::Failed`]); the worker keeps its schedule and does not
//! retry in between.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use ropey::Rope;

use crate::document::Document;
use crate::encoding::Encoding;
use crate::recovery::{RecoveryError, RecoveryHandle, RecoveryStore};

/// Room for events the shell has not drained yet. Later events are dropped.
const EVENT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Published state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Published {
    rope: Rope,
    generation: u64,
    dirty: bool,
    identity: String,
    encoding: Encoding,
}

impl Published {
    fn of(doc: &Document) -> Self {
        Self {
            rope: doc.buffer().rope().clone(),
            generation: doc.buffer().generation(),
            dirty: doc.is_dirty(),
            identity: doc.identity().to_string(),
            encoding: doc.encoding(),
        }
    }
}

/// What was last written, so an unchanged buffer is not written twice.
#[derive(Debug, Default)]
struct Persisted {
    identity: String,
    generation: Option<u64>,
}

/// Outcome of one snapshot attempt.
#[derive(Debug)]
pub enum SnapshotOutcome {
    Written(RecoveryHandle),
    /// The document has no unsaved changes.
    Clean,
    /// This generation is already on disk.
    Unchanged,
}

/// The document state shared between the editing timeline and the worker.
#[derive(Debug)]
pub struct Snapshotter {
    store: RecoveryStore,
    published: RwLock<Published>,
    persisted: Mutex<Persisted>,
}

impl Snapshotter {
    #[must_use]
    pub fn new(store: RecoveryStore, doc: &Document) -> Self {
        Self {
            store,
            published: RwLock::new(Published::of(doc)),
            persisted: Mutex::new(Persisted::default()),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &RecoveryStore {
        &self.store
    }

    /// Replace the published state with `doc` as it is now.
    pub fn publish(&self, doc: &Document) {
        *self.published.write() = Published::of(doc);
    }

    /// Write the published state if it is dirty and not already on disk.
    ///
    /// # Errors
    ///
    /// Whatever the store reports.
    pub fn snapshot(&self) -> Result<SnapshotOutcome, RecoveryError> {
        let mut persisted = self.persisted.lock();
        let published = self.published.read().clone();

        if !published.dirty {
            return Ok(SnapshotOutcome::Clean);
        }
        if persisted.identity == published.identity && persisted.generation == Some(published.generation) {
            return Ok(SnapshotOutcome::Unchanged);
        }

        let content = published.rope.to_string();
        let handle = self
            .store
            .snapshot(&published.identity, published.encoding, &content)?;
        persisted.identity = published.identity;
        persisted.generation = Some(published.generation);
        Ok(SnapshotOutcome::Written(handle))
    }

    /// Delete the record for `identity`, waiting for any write in flight.
    ///
    /// # Errors
    ///
    /// Whatever the store reports.
    pub fn discard(&self, identity: &str) -> Result<bool, RecoveryError> {
        let mut persisted = self.persisted.lock();
        if persisted.identity == identity {
            persisted.generation = None;
        }
        self.store.discard(identity)
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Reported by the worker; drain with [`Autosave::events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveEvent {
    Saved(RecoveryHandle),
    /// First failure after a success (or since start).
    Failed(String),
}

#[derive(Debug)]
enum Command {
    Snapshot,
    Stop,
}

/// The autosave worker thread. Stops when dropped.
#[derive(Debug)]
pub struct Autosave {
    handle: Option<JoinHandle<()>>,
    commands: Sender<Command>,
    events: Receiver<AutosaveEvent>,
}

impl Autosave {
    /// Start a worker that snapshots `shared` every `interval`.
    ///
    /// # Errors
    ///
    /// The OS refused to spawn a thread.
    pub fn spawn(shared: Arc<Snapshotter>, interval: Duration) -> io::Result<Self> {
        let (commands, command_rx) = channel::unbounded();
        let (event_tx, events) = channel::bounded(EVENT_CAPACITY);

        let handle = thread::Builder::new()
            .name("n-notepad-autosave".into())
            .spawn(move || run(&shared, interval, &command_rx, &event_tx))?;

        log::info!("autosave: started, every {}s", interval.as_secs_f32());
        Ok(Self {
            handle: Some(handle),
            commands,
            events,
        })
    }

    /// Ask for a snapshot now rather than at the next tick. Never blocks.
    pub fn request(&self) {
        let _ = self.commands.send(Command::Snapshot);
    }

    /// Events reported since the last call.
    pub fn events(&self) -> Vec<AutosaveEvent> {
        self.events.try_iter().collect()
    }

    /// Stop the worker and wait for it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.commands.send(Command::Stop);
            if handle.join().is_err() {
                log::error!("autosave: worker panicked");
            }
            log::info!("autosave: stopped");
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Snapshotter, interval: Duration, commands: &Receiver<Command>, events: &Sender<AutosaveEvent>) {
    let ticker = channel::tick(interval);
    let mut failing = false;

    loop {
        channel::select! {
            recv(ticker) -> _ => {}
            recv(commands) -> command => match command {
                Ok(Command::Snapshot) => {}
                Ok(Command::Stop) | Err(_) => return,
            },
        }

        match shared.snapshot() {
            Ok(SnapshotOutcome::Written(handle)) => {
                if failing {
                    log::info!("autosave: snapshots succeeding again");
                    failing = false;
                }
                send(events, AutosaveEvent::Saved(handle));
            }
            Ok(SnapshotOutcome::Clean | SnapshotOutcome::Unchanged) => {}
            Err(e) => {
                if !failing {
                    log::warn!("autosave: snapshot failed: {e}");
                    send(events, AutosaveEvent::Failed(e.to_string()));
                    failing = true;
                }
            }
        }
    }
}

fn send(events: &Sender<AutosaveEvent>, event: AutosaveEvent) {
    if let Err(TrySendError::Full(event)) = events.try_send(event) {
        log::debug!("autosave: event queue full, dropping {event:?}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::history::Operation;
    use crate::position::Position;

    fn setup() -> (tempfile::TempDir, Document, Arc<Snapshotter>) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecoveryStore::new(dir.path().join("recovery"));
        let doc = Document::untitled("hello", Encoding::Utf8);
        let shared = Arc::new(Snapshotter::new(store, &doc));
        (dir, doc, shared)
    }

    fn wait_for(autosave: &Autosave, mut pred: impl FnMut(&AutosaveEvent) -> bool) -> AutosaveEvent {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(event) = autosave.events().into_iter().find(|e| pred(e)) {
                return event;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("no matching autosave event");
    }

    // -- snapshotter ----------------------------------------------------------

    #[test]
    fn clean_document_is_not_written() {
        let (_dir, _doc, shared) = setup();
        assert!(matches!(shared.snapshot().unwrap(), SnapshotOutcome::Clean));
        assert!(shared.store().list_pending().unwrap().is_empty());
    }

    #[test]
    fn dirty_document_is_written_once_per_generation() {
        let (_dir, mut doc, shared) = setup();
        doc.apply(&Operation::insert(Position::new(0, 5), "!")).unwrap();
        shared.publish(&doc);

        let SnapshotOutcome::Written(handle) = shared.snapshot().unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(shared.store().load(&handle).unwrap().content, "hello!");
        assert!(matches!(shared.snapshot().unwrap(), SnapshotOutcome::Unchanged));

        doc.apply(&Operation::insert(Position::new(0, 6), "?")).unwrap();
        shared.publish(&doc);
        assert!(matches!(shared.snapshot().unwrap(), SnapshotOutcome::Written(_)));
    }

    #[test]
    fn discard_allows_rewrite_of_same_generation() {
        let (_dir, mut doc, shared) = setup();
        doc.mark_dirty();
        shared.publish(&doc);
        shared.snapshot().unwrap();
        assert!(shared.discard(doc.identity()).unwrap());
        assert!(matches!(shared.snapshot().unwrap(), SnapshotOutcome::Written(_)));
    }

    #[test]
    fn unpublished_edits_are_not_seen() {
        let (_dir, mut doc, shared) = setup();
        doc.mark_dirty();
        shared.publish(&doc);
        doc.apply(&Operation::insert(Position::ZERO, "later ")).unwrap();

        let SnapshotOutcome::Written(handle) = shared.snapshot().unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(shared.store().load(&handle).unwrap().content, "hello");
    }

    // -- worker ---------------------------------------------------------------

    #[test]
    fn worker_writes_on_request() {
        let (_dir, mut doc, shared) = setup();
        let autosave = Autosave::spawn(Arc::clone(&shared), Duration::from_secs(3600)).unwrap();

        doc.apply(&Operation::insert(Position::ZERO, "> ")).unwrap();
        shared.publish(&doc);
        autosave.request();

        let AutosaveEvent::Saved(handle) = wait_for(&autosave, |e| matches!(e, AutosaveEvent::Saved(_))) else {
            unreachable!();
        };
        assert_eq!(shared.store().load(&handle).unwrap().content, "> hello");
    }

    #[test]
    fn worker_writes_on_tick() {
        let (_dir, mut doc, shared) = setup();
        doc.mark_dirty();
        shared.publish(&doc);
        let autosave = Autosave::spawn(Arc::clone(&shared), Duration::from_millis(10)).unwrap();
        wait_for(&autosave, |e| matches!(e, AutosaveEvent::Saved(_)));
    }

    #[test]
    fn failure_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the recovery directory should be.
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();
        let mut doc = Document::untitled("x", Encoding::Utf8);
        doc.mark_dirty();
        let shared = Arc::new(Snapshotter::new(RecoveryStore::new(blocker), &doc));

        let mut autosave = Autosave::spawn(Arc::clone(&shared), Duration::from_millis(5)).unwrap();
        wait_for(&autosave, |e| matches!(e, AutosaveEvent::Failed(_)));
        thread::sleep(Duration::from_millis(60));
        autosave.stop();
        assert!(autosave.events().iter().all(|e| !matches!(e, AutosaveEvent::Failed(_))));
    }

    #[test]
    fn stop_is_idempotent() {
        let (_dir, _doc, shared) = setup();
        let mut autosave = Autosave::spawn(shared, Duration::from_secs(60)).unwrap();
        assert!(autosave.is_running());
        autosave.stop();
        autosave.stop();
        assert!(!autosave.is_running());
    }
}
