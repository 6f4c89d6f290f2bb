use std::path::{Path, PathBuf};

/// Where the projected graph lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local tables, discarded on drop.
    Memory,
    /// SQLite database file.
    Sqlite(PathBuf),
}

/// Configuration options supplied when opening a store.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Backend to open.
    pub backend: StoreBackend,
    /// SQLite `synchronous` pragma.
    pub synchronous: String,
    /// SQLite `journal_mode` pragma.
    pub journal_mode: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            synchronous: "FULL".to_owned(),
            journal_mode: "WAL".to_owned(),
        }
    }
}

impl StoreOptions {
    /// Options for an in-memory store.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Options for a SQLite store at `path`.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            backend: StoreBackend::Sqlite(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Sets the SQLite `synchronous` pragma.
    pub fn synchronous(mut self, value: impl Into<String>) -> Self {
        self.synchronous = value.into();
        self
    }

    /// Sets the SQLite `journal_mode` pragma.
    pub fn journal_mode(mut self, value: impl Into<String>) -> Self {
        self.journal_mode = value.into();
        self
    }
}
