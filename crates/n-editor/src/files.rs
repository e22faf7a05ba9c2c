//! File helpers shared by saving and recovery: atomic writes and rotating
//! backups.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::NamedTempFile;

/// Write `bytes` to `path` through a temp file in the same directory and a
/// rename, so readers see either the old file or the new one.
///
/// # Errors
///
/// Any I/O error creating, writing, syncing or renaming the temp file. The
/// target is untouched on failure.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Milliseconds since the Unix epoch. Saturates rather than failing on a
/// clock set before 1970.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------------

/// Copies of a file taken just before it is overwritten, kept as
/// `<name>.<millis>.bak` in one directory, newest `keep` per name.
#[derive(Debug, Clone)]
pub struct Backups {
    dir: PathBuf,
    keep: usize,
}

impl Backups {
    #[must_use]
    pub const fn new(dir: PathBuf, keep: usize) -> Self {
        Self { dir, keep }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `file` into the backup directory and prune old copies. Returns
    /// the backup path, or `None` when `file` does not exist yet.
    ///
    /// # Errors
    ///
    /// I/O errors creating the directory, copying, or pruning.
    pub fn create(&self, file: &Path) -> io::Result<Option<PathBuf>> {
        if !file.is_file() {
            return Ok(None);
        }
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        fs::create_dir_all(&self.dir)?;

        // Stamps stay strictly increasing even for saves in the same
        // millisecond, so name order is age order.
        let newest = self.stamped(name)?.first().map_or(0, |(stamp, _)| stamp + 1);
        let stamp = now_millis().max(newest);
        let target = self.dir.join(format!("{name}.{stamp}.bak"));
        fs::copy(file, &target)?;
        log::debug!("backup: {} -> {}", file.display(), target.display());

        self.prune(name)?;
        Ok(Some(target))
    }

    /// Backups of `name`, newest first.
    ///
    /// # Errors
    ///
    /// I/O errors reading the directory. A missing directory is empty.
    pub fn list(&self, name: &str) -> io::Result<Vec<PathBuf>> {
        Ok(self.stamped(name)?.into_iter().map(|(_, p)| p).collect())
    }

    fn stamped(&self, name: &str) -> io::Result<Vec<(u64, PathBuf)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let stamp = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(name))
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|rest| rest.strip_suffix(".bak"))
                .and_then(|digits| digits.parse::<u64>().ok());
            if let Some(stamp) = stamp {
                found.push((stamp, path));
            }
        }
        found.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(found)
    }

    fn prune(&self, name: &str) -> io::Result<()> {
        for old in self.list(name)?.into_iter().skip(self.keep) {
            fs::remove_file(&old)?;
        }
        Ok(())
    }
}
