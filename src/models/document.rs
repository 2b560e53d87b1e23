use serde::{Deserialize, Serialize};

/// A document known to the host storage layer.
///
/// Paths are vault-relative and always use `/` as the separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Vault-relative path, unique per document.
    pub path: String,
    /// Last modification time in Unix milliseconds.
    pub modified_ms: i64,
}

impl Document {
    /// Creates a document descriptor.
    pub fn new(path: impl Into<String>, modified_ms: i64) -> Self {
        Self {
            path: path.into(),
            modified_ms,
        }
    }

    /// File name including its extension, e.g. `note.md`.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// File name without its extension, e.g. `note`.
    pub fn basename(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(dot) => &name[..dot],
        }
    }

    /// Parent folder path, or `""` for documents at the vault root.
    pub fn parent(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(parent, _)| parent)
    }
}
