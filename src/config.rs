//! File-based configuration for the `contentgraph` binary.
//!
//! ```toml
//! [store]
//! backend = "sqlite"
//! path = "/var/lib/contentgraph/graph.db"
//! synchronous = "NORMAL"
//!
//! [log]
//! filter = "contentgraph=debug"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StoreOptions;

/// Backend named in the `[store]` section.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-memory tables.
    #[default]
    Memory,
    /// SQLite file at `store.path`.
    Sqlite,
}

/// `[store]` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Backend to open.
    pub backend: BackendKind,
    /// Database file for the SQLite backend.
    pub path: Option<PathBuf>,
    /// SQLite `synchronous` pragma.
    pub synchronous: Option<String>,
    /// SQLite `journal_mode` pragma.
    pub journal_mode: Option<String>,
}

/// `[log]` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// `tracing-subscriber` filter directive used when no env filter is set.
    pub filter: Option<String>,
}

/// Parsed configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentGraphConfig {
    /// Storage settings.
    pub store: StoreSection,
    /// Logging settings.
    pub log: LogSection,
}

impl ContentGraphConfig {
    /// Loads `explicit`, or the default location when `None`.
    ///
    /// A missing file at the default location yields the default config; a
    /// missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => read_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parses a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Store options described by the `[store]` section.
    pub fn store_options(&self) -> Result<StoreOptions, ConfigError> {
        let mut options = match self.store.backend {
            BackendKind::Memory => StoreOptions::memory(),
            BackendKind::Sqlite => {
                let path = self.store.path.as_ref().ok_or(ConfigError::MissingStorePath)?;
                StoreOptions::sqlite(path)
            }
        };
        if let Some(synchronous) = &self.store.synchronous {
            options = options.synchronous(synchronous.as_str());
        }
        if let Some(journal_mode) = &self.store.journal_mode {
            options = options.journal_mode(journal_mode.as_str());
        }
        Ok(options)
    }
}

fn read_file(path: &Path) -> Result<ContentGraphConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ContentGraphConfig::from_toml(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },
    /// `backend = "sqlite"` without `path`.
    #[error("store.backend is sqlite but store.path is not set")]
    MissingStorePath,
}

/// `<config dir>/contentgraph/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("contentgraph").join("config.toml"))
}
