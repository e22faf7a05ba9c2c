//! Crash-recovery snapshots.
//!
//! One JSON record per document identity, named after the SHA-256 of the
//! identity so any path or `untitled-*` name maps to a safe file name.
//! Writing a snapshot for an identity replaces the previous one. A record
//! with empty `content` is a recovery of an empty document, distinct from
//! there being no record at all.
//!
//! ```json
//! {"version":1,"identity":"/home/me/notes.txt","encoding":"utf-8",
//!  "timestamp_ms":1760000000000,"content":"..."}
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::encoding::Encoding;
use crate::files;

/// Format version written into every record.
pub const RECORD_VERSION: u32 = 1;

const SUFFIX: &str = ".recovery.json";

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: malformed recovery record: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: unsupported recovery record version {version}", path.display())]
    UnsupportedVersion { path: PathBuf, version: u32 },
}

/// A persisted snapshot, as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub version: u32,
    pub identity: String,
    pub encoding: Encoding,
    pub timestamp_ms: u64,
    pub content: String,
}

/// A pending recovery, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryHandle {
    pub identity: String,
    pub encoding: Encoding,
    pub timestamp_ms: u64,
    pub path: PathBuf,
}

/// The directory holding recovery records.
#[derive(Debug, Clone)]
pub struct RecoveryStore {
    dir: PathBuf,
}

impl RecoveryStore {
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record file for `identity`.
    #[must_use]
    pub fn path_for(&self, identity: &str) -> PathBuf {
        let digest = Sha256::digest(identity.as_bytes());
        self.dir.join(format!("{digest:x}{SUFFIX}"))
    }

    /// Persist `content` for `identity`, replacing any earlier snapshot.
    ///
    /// # Errors
    ///
    /// [`RecoveryError::Io`] if the directory or file cannot be written.
    pub fn snapshot(&self, identity: &str, encoding: Encoding, content: &str) -> Result<RecoveryHandle, RecoveryError> {
        let record = RecoveryRecord {
            version: RECORD_VERSION,
            identity: identity.to_string(),
            encoding,
            timestamp_ms: files::now_millis(),
            content: content.to_string(),
        };
        let path = self.path_for(identity);
        let bytes = serde_json::to_vec(&record).map_err(|source| RecoveryError::Format {
            path: path.clone(),
            source,
        })?;

        fs::create_dir_all(&self.dir).map_err(|source| RecoveryError::Io {
            path: self.dir.clone(),
            source,
        })?;
        files::write_atomic(&path, &bytes).map_err(|source| RecoveryError::Io {
            path: path.clone(),
            source,
        })?;

        log::debug!("recovery: snapshot of {identity} ({} bytes)", bytes.len());
        Ok(RecoveryHandle {
            identity: record.identity,
            encoding,
            timestamp_ms: record.timestamp_ms,
            path,
        })
    }

    /// Every readable record, newest first. Unreadable or malformed files are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// [`RecoveryError::Io`] if the directory exists but cannot be listed.
    pub fn list_pending(&self) -> Result<Vec<RecoveryHandle>, RecoveryError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(RecoveryError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut handles = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(source) => {
                    return Err(RecoveryError::Io {
                        path: self.dir.clone(),
                        source,
                    });
                }
            };
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(SUFFIX));
            if !is_record {
                continue;
            }
            match read_record(&path) {
                Ok(record) => handles.push(RecoveryHandle {
                    identity: record.identity,
                    encoding: record.encoding,
                    timestamp_ms: record.timestamp_ms,
                    path,
                }),
                Err(e) => log::warn!("recovery: skipping {e}"),
            }
        }
        handles.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        Ok(handles)
    }

    /// The pending record for `identity`, if any.
    ///
    /// # Errors
    ///
    /// As for [`load`](Self::load), except that a missing record is `None`.
    pub fn find(&self, identity: &str) -> Result<Option<RecoveryRecord>, RecoveryError> {
        let path = self.path_for(identity);
        match read_record(&path) {
            Ok(record) => Ok(Some(record)),
            Err(RecoveryError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read the full record behind `handle`.
    ///
    /// # Errors
    ///
    /// Any [`RecoveryError`]: the file vanished, is not JSON, or has a
    /// version this build does not understand.
    pub fn load(&self, handle: &RecoveryHandle) -> Result<RecoveryRecord, RecoveryError> {
        read_record(&handle.path)
    }

    /// Delete the snapshot for `identity`. Returns false when there was none.
    ///
    /// # Errors
    ///
    /// [`RecoveryError::Io`] if the file exists but cannot be removed.
    pub fn discard(&self, identity: &str) -> Result<bool, RecoveryError> {
        let path = self.path_for(identity);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("recovery: discarded snapshot of {identity}");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(RecoveryError::Io { path, source }),
        }
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

fn read_record(path: &Path) -> Result<RecoveryRecord, RecoveryError> {
    let bytes = fs::read(path).map_err(|source| RecoveryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    // Version first, so a future format is reported as such.
    let header: VersionHeader = serde_json::from_slice(&bytes).map_err(|source| RecoveryError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    if header.version != RECORD_VERSION {
        return Err(RecoveryError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: header.version,
        });
    }

    serde_json::from_slice(&bytes).map_err(|source| RecoveryError::Format {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, RecoveryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecoveryStore::new(dir.path().join("recovery"));
        (dir, store)
    }

    #[test]
    fn empty_store_has_nothing_pending() {
        let (_dir, store) = store();
        assert!(store.list_pending().unwrap().is_empty());
        assert_eq!(store.find("x").unwrap(), None);
        assert!(!store.discard("x").unwrap());
    }

    #[test]
    fn snapshot_then_load() {
        let (_dir, store) = store();
        let handle = store.snapshot("/tmp/a.txt", Encoding::Utf16, "hello\nworld").unwrap();
        assert_eq!(store.list_pending().unwrap(), vec![handle.clone()]);

        let record = store.load(&handle).unwrap();
        assert_eq!(record.identity, "/tmp/a.txt");
        assert_eq!(record.encoding, Encoding::Utf16);
        assert_eq!(record.content, "hello\nworld");
        assert_eq!(record.version, RECORD_VERSION);
    }

    #[test]
    fn snapshot_supersedes() {
        let (_dir, store) = store();
        store.snapshot("doc", Encoding::Utf8, "one").unwrap();
        store.snapshot("doc", Encoding::Utf8, "two").unwrap();
        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(store.load(&pending[0]).unwrap().content, "two");
    }

    #[test]
    fn empty_document_is_still_a_recovery() {
        let (_dir, store) = store();
        store.snapshot("untitled-1", Encoding::Utf8, "").unwrap();
        let record = store.find("untitled-1").unwrap().unwrap();
        assert_eq!(record.content, "");
    }

    #[test]
    fn discard_removes_only_that_identity() {
        let (_dir, store) = store();
        store.snapshot("a", Encoding::Utf8, "a").unwrap();
        store.snapshot("b", Encoding::Utf8, "b").unwrap();
        assert!(store.discard("a").unwrap());
        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].identity, "b");
    }

    #[test]
    fn file_names_are_hashed() {
        let (_dir, store) = store();
        let path = store.path_for("/some/dir/../weird name?.txt");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64 + SUFFIX.len());
        assert!(name.ends_with(SUFFIX));
        assert_ne!(store.path_for("a"), store.path_for("b"));
    }

    #[test]
    fn file_name_is_lowercase_sha256_hex() {
        let (_dir, store) = store();
        let path = store.path_for("abc");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.recovery.json"
        );
    }

    #[test]
    fn malformed_and_foreign_files_are_skipped() {
        let (_dir, store) = store();
        store.snapshot("good", Encoding::Utf8, "ok").unwrap();
        fs::write(store.dir().join(format!("bad{SUFFIX}")), b"{not json").unwrap();
        fs::write(store.dir().join("notes.txt"), b"ignored").unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].identity, "good");
    }

    #[test]
    fn future_version_is_reported() {
        let (_dir, store) = store();
        let path = store.path_for("doc");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(&path, br#"{"version":2,"whatever":true}"#).unwrap();
        assert!(matches!(
            store.find("doc"),
            Err(RecoveryError::UnsupportedVersion { version: 2, .. })
        ));
        assert!(store.list_pending().unwrap().is_empty());
    }
}
