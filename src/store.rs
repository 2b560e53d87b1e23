//! Persistent state: the settings file and the tagged-files ledger.
//!
//! The ledger maps vault-relative paths to the Unix milliseconds of their last
//! successful annotation. It is the only state the engine keeps between runs,
//! and the engine reaches it only through [`TaggedFileStore`].

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::models::Settings;
use crate::utils::write_atomically;

/// Errors reading or writing the settings file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access settings file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Get/set/persist access to the tagged-files ledger.
pub trait TaggedFileStore {
    /// When `path` was last annotated, in Unix milliseconds.
    fn last_tagged(&self, path: &str) -> Option<i64>;

    /// Records a successful annotation of `path`.
    fn mark_tagged(&mut self, path: &str, at_ms: i64);

    /// Drops the record for `path`.
    fn forget(&mut self, path: &str);

    /// Makes all recorded changes durable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be written.
    fn persist(&mut self) -> Result<(), StoreError>;
}

/// Settings loaded from, and saved back to, a JSON file.
///
/// The ledger lives in [`Settings::tagged_files`], so persisting the ledger
/// rewrites the whole file.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
    settings: Settings,
}

impl SettingsFile {
    /// Loads settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "settings file not found, using defaults");
                Settings::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, settings })
    }

    /// Wraps already-built settings that will be saved to `path`.
    pub fn new(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Writes the settings as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the atomic write fails.
    pub fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.settings).map_err(|source| {
            StoreError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        write_atomically(&self.path, &json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl TaggedFileStore for SettingsFile {
    fn last_tagged(&self, path: &str) -> Option<i64> {
        self.settings.tagged_files.get(path).copied()
    }

    fn mark_tagged(&mut self, path: &str, at_ms: i64) {
        self.settings.tagged_files.insert(path.to_string(), at_ms);
    }

    fn forget(&mut self, path: &str) {
        self.settings.tagged_files.remove(path);
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.save()
    }
}

/// Ledger kept in memory. `persist` only counts calls.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, i64>,
    persist_count: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times [`TaggedFileStore::persist`] was called.
    pub fn persist_count(&self) -> usize {
        self.persist_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TaggedFileStore for MemoryStore {
    fn last_tagged(&self, path: &str) -> Option<i64> {
        self.entries.get(path).copied()
    }

    fn mark_tagged(&mut self, path: &str, at_ms: i64) {
        self.entries.insert(path.to_string(), at_ms);
    }

    fn forget(&mut self, path: &str) {
        self.entries.remove(path);
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.persist_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = SettingsFile::load(dir.path().join("settings.json")).unwrap();
        assert!(!file.exists());
        assert_eq!(file.settings(), &Settings::default());
    }

    #[test]
    fn ledger_survives_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vellum").join("settings.json");

        let mut file = SettingsFile::load(&path).unwrap();
        file.settings_mut().selected_model = Some("gemma3:4b".to_string());
        file.mark_tagged("notes/a.md", 1_700_000_000_000);
        file.mark_tagged("b.md", 5);
        file.forget("b.md");
        file.persist().unwrap();

        let reloaded = SettingsFile::load(&path).unwrap();
        assert!(reloaded.exists());
        assert_eq!(reloaded.last_tagged("notes/a.md"), Some(1_700_000_000_000));
        assert_eq!(reloaded.last_tagged("b.md"), None);
        assert_eq!(
            reloaded.settings().selected_model.as_deref(),
            Some("gemma3:4b")
        );
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = SettingsFile::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
        assert!(err.to_string().contains("settings.json"));
    }

    #[test]
    fn memory_store_tracks_entries_and_persists() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());

        store.mark_tagged("a.md", 10);
        store.mark_tagged("a.md", 20);
        assert_eq!(store.last_tagged("a.md"), Some(20));
        assert_eq!(store.len(), 1);

        store.forget("a.md");
        store.persist().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.persist_count(), 1);
    }
}
