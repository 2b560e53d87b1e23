//! Document storage.
//!
//! The engine only needs to list, stat, read and write documents by
//! vault-relative path. [`FsVault`] serves a directory of markdown files;
//! [`MemoryVault`] keeps everything in memory for tests and embedding.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use time::OffsetDateTime;

use crate::models::Document;
use crate::utils::{unix_millis, write_atomically};

/// File extension of the documents a vault serves.
pub const DOCUMENT_EXTENSION: &str = "md";

/// Host storage for documents.
///
/// Implementations take `&self` for writes: storage is a shared resource that
/// may also be edited from outside the engine.
pub trait DocumentStore: Send + Sync {
    /// Lists every document, ordered by path.
    fn list(&self) -> io::Result<Vec<Document>>;

    /// Returns the descriptor of one document.
    fn stat(&self, path: &str) -> io::Result<Document>;

    /// Reads the full content of a document.
    fn read(&self, path: &str) -> io::Result<String>;

    /// Replaces the full content of a document.
    fn write(&self, path: &str, content: &str) -> io::Result<()>;
}

/// A directory of markdown files.
///
/// Hidden files and directories (leading `.`) are ignored, which keeps
/// `.git`, `.obsidian` and similar folders out of every listing.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    /// Opens the vault rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("vault directory not found: {}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Converts a filesystem path inside the vault to a vault-relative path.
    ///
    /// Returns `None` for paths outside the vault.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }

    fn full_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |full, part| full.join(part))
    }

    fn collect(&self, dir: &Path, documents: &mut Vec<Document>) -> io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }

            let entry_path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.collect(&entry_path, documents)?;
            } else if file_type.is_file()
                && entry_path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION)
                && let Some(relative) = self.relative_path(&entry_path)
            {
                let modified = entry.metadata()?.modified()?;
                documents.push(Document::new(
                    relative,
                    unix_millis(OffsetDateTime::from(modified)),
                ));
            }
        }
        Ok(())
    }
}

impl DocumentStore for FsVault {
    fn list(&self) -> io::Result<Vec<Document>> {
        let mut documents = Vec::new();
        self.collect(&self.root, &mut documents)?;
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(documents)
    }

    fn stat(&self, path: &str) -> io::Result<Document> {
        let modified = std::fs::metadata(self.full_path(path))?.modified()?;
        Ok(Document::new(path, unix_millis(OffsetDateTime::from(modified))))
    }

    fn read(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.full_path(path))
    }

    fn write(&self, path: &str, content: &str) -> io::Result<()> {
        write_atomically(&self.full_path(path), content)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<String, (String, i64)>,
    clock: i64,
    writes: usize,
}

/// In-memory document storage.
///
/// Every write advances an internal clock by one millisecond and stamps the
/// document with it, so modification times behave like a real filesystem.
#[derive(Debug, Default)]
pub struct MemoryVault {
    state: Mutex<MemoryState>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a document with an explicit modification time.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>, modified_ms: i64) {
        let mut state = self.lock();
        state.clock = state.clock.max(modified_ms);
        state
            .documents
            .insert(path.into(), (content.into(), modified_ms));
    }

    /// Current content of a document, if it exists.
    pub fn content(&self, path: &str) -> Option<String> {
        self.lock()
            .documents
            .get(path)
            .map(|(content, _)| content.clone())
    }

    /// Number of writes performed through [`DocumentStore::write`].
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("document not found: {path}"))
}

impl DocumentStore for MemoryVault {
    fn list(&self) -> io::Result<Vec<Document>> {
        Ok(self
            .lock()
            .documents
            .iter()
            .map(|(path, (_, modified))| Document::new(path.clone(), *modified))
            .collect())
    }

    fn stat(&self, path: &str) -> io::Result<Document> {
        self.lock()
            .documents
            .get(path)
            .map(|(_, modified)| Document::new(path, *modified))
            .ok_or_else(|| not_found(path))
    }

    fn read(&self, path: &str) -> io::Result<String> {
        self.content(path).ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &str, content: &str) -> io::Result<()> {
        let mut state = self.lock();
        state.clock += 1;
        state.writes += 1;
        let stamp = state.clock;
        state
            .documents
            .insert(path.to_string(), (content.to_string(), stamp));
        Ok(())
    }
}
