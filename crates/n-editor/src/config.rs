//! Editor configuration, read from `config.toml`.
//!
//! Every key is optional; a missing file is the default configuration.
//!
//! ```toml
//! [history]
//! coalesce_idle_ms = 1000
//!
//! [autosave]
//! enabled = true
//! interval_secs = 300
//! snapshot_on_commit = true
//! # directory = "/custom/recovery"
//!
//! [files]
//! default_encoding = "utf-8"
//! backup_on_save = true
//! max_backups = 10
//!
//! [search]
//! case_sensitive = false
//! whole_word = false
//! regex = false
//! wrap_around = true
//!
//! [highlight]
//! enabled = true
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use serde::Deserialize;
use thiserror::Error;

use crate::encoding::Encoding;
use crate::search::SearchOptions;

/// Shortest autosave interval accepted; lower values are raised to it.
pub const MIN_AUTOSAVE_INTERVAL_SECS: u64 = 30;

const APP_DIR: &str = "n-notepad";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    pub history: HistoryConfig,
    pub autosave: AutosaveConfig,
    pub files: FilesConfig,
    pub search: SearchOptions,
    pub highlight: HighlightConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Idle gap, in milliseconds, after which typing starts a new undo step.
    pub coalesce_idle_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { coalesce_idle_ms: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Also snapshot whenever a transaction is committed.
    pub snapshot_on_commit: bool,
    /// Recovery directory; defaults to [`default_recovery_dir`].
    pub directory: Option<PathBuf>,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            snapshot_on_commit: true,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Encoding for new and empty documents.
    pub default_encoding: Encoding,
    pub backup_on_save: bool,
    pub max_backups: usize,
    /// Backup directory; defaults to [`default_backup_dir`].
    pub backup_directory: Option<PathBuf>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            default_encoding: Encoding::Utf8,
            backup_on_save: true,
            max_backups: 10,
            backup_directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightConfig {
    pub enabled: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl EditorConfig {
    /// Read and validate `path`. A missing file gives the defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file exists but cannot be read,
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("config: {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("config: loaded {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// The TOML parse error.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(text)?;
        config.validate();
        Ok(config)
    }

    /// Raise out-of-range values to their minimum.
    pub fn validate(&mut self) {
        if self.autosave.interval_secs < MIN_AUTOSAVE_INTERVAL_SECS {
            log::warn!(
                "config: autosave.interval_secs = {} is below {MIN_AUTOSAVE_INTERVAL_SECS}, using {MIN_AUTOSAVE_INTERVAL_SECS}",
                self.autosave.interval_secs
            );
            self.autosave.interval_secs = MIN_AUTOSAVE_INTERVAL_SECS;
        }
        if self.files.max_backups == 0 && self.files.backup_on_save {
            log::warn!("config: files.max_backups = 0 disables backups");
            self.files.backup_on_save = false;
        }
    }

    #[must_use]
    pub const fn coalesce_gap(&self) -> Duration {
        Duration::from_millis(self.history.coalesce_idle_ms)
    }

    #[must_use]
    pub const fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave.interval_secs)
    }

    /// The configured recovery directory, or the default one.
    #[must_use]
    pub fn recovery_dir(&self) -> PathBuf {
        self.autosave.directory.clone().unwrap_or_else(default_recovery_dir)
    }

    /// The configured backup directory, or the default one.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.files.backup_directory.clone().unwrap_or_else(default_backup_dir)
    }
}

// ---------------------------------------------------------------------------
// Directories
// ---------------------------------------------------------------------------

/// `$N_NOTEPAD_CONFIG_DIR`, else the platform config dir + `n-notepad`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("N_NOTEPAD_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match choose_base_strategy() {
        Ok(strategy) => strategy.config_dir().join(APP_DIR),
        Err(e) => {
            log::warn!("config: no home directory ({e}), using the working directory");
            PathBuf::from(".").join(APP_DIR)
        }
    }
}

/// `$N_NOTEPAD_DATA_DIR`, else the platform data dir + `n-notepad`.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("N_NOTEPAD_DATA_DIR") {
        return PathBuf::from(dir);
    }
    match choose_base_strategy() {
        Ok(strategy) => strategy.data_dir().join(APP_DIR),
        Err(e) => {
            log::warn!("config: no home directory ({e}), using the working directory");
            PathBuf::from(".").join(APP_DIR)
        }
    }
}

#[must_use]
pub fn default_config_file() -> PathBuf {
    config_dir().join("config.toml")
}

#[must_use]
pub fn default_recovery_dir() -> PathBuf {
    data_dir().join("recovery")
}

#[must_use]
pub fn default_backup_dir() -> PathBuf {
    data_dir().join("backups")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
