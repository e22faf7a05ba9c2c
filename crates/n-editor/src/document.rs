//! A document: buffer, history, and everything that ties them to a file.
//!
//! The document owns the encoding (fixed at load, re-checked at save), the
//! on-disk line ending, the language used for highlighting, and the dirty
//! flag. Dirtiness is derived rather than toggled: the document remembers
//! which history revision was last written, so undoing back to the saved
//! text makes it clean again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use n_syntax::Language;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::buffer::{Buffer, LineEnding, normalize_line_endings};
use crate::change::ChangeDescriptor;
use crate::encoding::{self, Encoding, EncodingError, SaveMode};
use crate::error::RangeError;
use crate::files::{self, Backups};
use crate::history::{History, HistoryStep, Operation};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("document has no file path")]
    NoPath,
}

/// Status-bar counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentStats {
    pub lines: usize,
    pub chars: usize,
    pub words: usize,
}

/// One open document.
#[derive(Debug)]
pub struct Document {
    buffer: Buffer,
    history: History,
    path: Option<PathBuf>,
    identity: String,
    encoding: Encoding,
    line_ending: LineEnding,
    language: Language,
    saved_revision: u64,
    force_dirty: bool,
}

impl Document {
    // -- Construction -------------------------------------------------------

    /// An empty, untitled document.
    #[must_use]
    pub fn new(encoding: Encoding) -> Self {
        Self::untitled("", encoding)
    }

    /// An untitled document holding `text`. Starts clean.
    #[must_use]
    pub fn untitled(text: &str, encoding: Encoding) -> Self {
        Self {
            line_ending: LineEnding::detect(text),
            buffer: Buffer::from_text(text),
            history: History::new(),
            path: None,
            identity: untitled_identity(),
            encoding,
            language: Language::Plain,
            saved_revision: 0,
            force_dirty: false,
        }
    }

    /// Load `path`, detecting encoding, line ending and language.
    ///
    /// `default_encoding` applies only to an empty file.
    ///
    /// # Errors
    ///
    /// [`DocumentError::Io`] when the file cannot be read and
    /// [`DocumentError::Encoding`] when its bytes cannot be decoded.
    pub fn open(path: &Path, default_encoding: Encoding) -> Result<Self, DocumentError> {
        let bytes = fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (text, encoding) = encoding::decode(&bytes, default_encoding)?;
        let line_ending = LineEnding::detect(&text);
        let language = Language::from_path(path);
        log::info!(
            "opened {} ({encoding}, {line_ending}, {language}, {} bytes)",
            path.display(),
            bytes.len()
        );
        Ok(Self {
            buffer: Buffer::from_text(&text),
            history: History::new(),
            path: Some(path.to_path_buf()),
            identity: identity_for(path),
            encoding,
            line_ending,
            language,
            saved_revision: 0,
            force_dirty: false,
        })
    }

    // -- Accessors ----------------------------------------------------------

    #[must_use]
    pub const fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Key for recovery snapshots: the canonical path, or
    /// `untitled-<millis>-<n>`.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Change the encoding used by the next save. The document becomes dirty
    /// when the encoding actually changes.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        if encoding != self.encoding {
            self.encoding = encoding;
            self.force_dirty = true;
        }
    }

    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn set_line_ending(&mut self, ending: LineEnding) {
        if ending != self.line_ending {
            self.line_ending = ending;
            self.force_dirty = true;
        }
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    pub const fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// True iff the text differs from what was last written (or, for an
    /// untitled document, from what it was created with).
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.force_dirty || self.history.revision() != self.saved_revision
    }

    /// Mark dirty regardless of history, e.g. after restoring a recovery
    /// snapshot. Cleared by the next save.
    pub const fn mark_dirty(&mut self) {
        self.force_dirty = true;
    }

    #[must_use]
    pub fn stats(&self) -> DocumentStats {
        let text = self.buffer.text();
        DocumentStats {
            lines: self.buffer.line_count(),
            chars: self.buffer.len_chars(),
            words: text.unicode_words().count(),
        }
    }

    // -- Editing ------------------------------------------------------------

    /// Apply an edit intent through the history.
    ///
    /// # Errors
    ///
    /// A [`RangeError`] when the intent does not fit the text.
    pub fn apply(&mut self, op: &Operation) -> Result<ChangeDescriptor, RangeError> {
        self.history.apply(&mut self.buffer, op)
    }

    /// [`apply`](Self::apply) with an explicit clock, for coalescing.
    ///
    /// # Errors
    ///
    /// A [`RangeError`] when the intent does not fit the text.
    pub fn apply_at(&mut self, op: &Operation, now: Instant) -> Result<ChangeDescriptor, RangeError> {
        self.history.apply_at(&mut self.buffer, op, now)
    }

    /// Apply `ops` as one transaction.
    ///
    /// # Errors
    ///
    /// A [`RangeError`] from the first operation that does not fit; the text
    /// is left unchanged.
    pub fn apply_transaction(&mut self, ops: &[Operation]) -> Result<HistoryStep, RangeError> {
        self.history.apply_transaction(&mut self.buffer, ops)
    }

    pub fn commit(&mut self) -> bool {
        self.history.commit()
    }

    /// # Errors
    ///
    /// See [`History::undo`].
    pub fn undo(&mut self) -> Result<HistoryStep, RangeError> {
        self.history.undo(&mut self.buffer)
    }

    /// # Errors
    ///
    /// See [`History::redo`].
    pub fn redo(&mut self) -> Result<HistoryStep, RangeError> {
        self.history.redo(&mut self.buffer)
    }

    /// Drop undo/redo history without changing whether the document is dirty.
    pub fn clear_history(&mut self) {
        let dirty = self.is_dirty();
        self.history.clear();
        self.saved_revision = 0;
        self.force_dirty = dirty;
    }

    // -- Saving -------------------------------------------------------------

    /// Encode the text as it would be written, without writing it.
    ///
    /// # Errors
    ///
    /// [`EncodingError::Unrepresentable`] in strict mode.
    pub fn encode(&self, mode: SaveMode) -> Result<Vec<u8>, EncodingError> {
        let text = self.buffer.text();
        let body = normalize_line_endings(&text, self.line_ending);
        encoding::encode(&body, self.encoding, mode)
    }

    /// Write to the document's path.
    ///
    /// Commits any open transaction, encodes (failing before touching the
    /// disk if the text does not fit the encoding), backs up the old file when
    /// `backups` is given, and writes atomically.
    ///
    /// # Errors
    ///
    /// [`DocumentError::NoPath`] for an untitled document, otherwise encoding
    /// or I/O errors. A failed backup is logged and does not stop the save.
    pub fn save(&mut self, mode: SaveMode, backups: Option<&Backups>) -> Result<(), DocumentError> {
        let path = self.path.clone().ok_or(DocumentError::NoPath)?;
        self.write_to(&path, mode, backups)
    }

    /// Write to `path` and adopt it as the document's path and identity.
    ///
    /// # Errors
    ///
    /// As for [`save`](Self::save), minus `NoPath`.
    pub fn save_as(&mut self, path: &Path, mode: SaveMode, backups: Option<&Backups>) -> Result<(), DocumentError> {
        self.write_to(path, mode, backups)?;
        self.path = Some(path.to_path_buf());
        self.identity = identity_for(path);
        if self.language == Language::Plain {
            self.language = Language::from_path(path);
        }
        Ok(())
    }

    fn write_to(&mut self, path: &Path, mode: SaveMode, backups: Option<&Backups>) -> Result<(), DocumentError> {
        self.history.commit();
        let bytes = self.encode(mode)?;

        if let Some(backups) = backups {
            if let Err(e) = backups.create(path) {
                log::warn!("backup of {} failed: {e}", path.display());
            }
        }

        files::write_atomic(path, &bytes).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.saved_revision = self.history.revision();
        self.force_dirty = false;
        log::info!("saved {} ({}, {} bytes)", path.display(), self.encoding, bytes.len());
        Ok(())
    }
}

/// Canonical path as a string, falling back to the path as given when it
/// cannot be canonicalized (not yet created, permissions).
fn untitled_identity() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    format!("untitled-{}-{}", files::now_millis(), NEXT.fetch_add(1, Ordering::Relaxed))
}

fn identity_for(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
