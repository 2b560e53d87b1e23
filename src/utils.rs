//! Shared filesystem and clock helpers.
//!
//! These functions are reused by the vault, the settings file and the CLI.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::NamedTempFile;
use time::OffsetDateTime;

/// Gets the cross-platform settings file path.
///
/// Returns the path as `{config_dir}/vellum/settings.json` where `config_dir` is:
/// - Linux: `~/.config`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the config directory cannot be determined.
pub fn settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to determine config directory"))?;

    Ok(config_dir.join("vellum").join("settings.json"))
}

/// Replaces the file at `path` with `contents` without exposing a partial write.
///
/// The data is written to a temporary file in the same directory, synced, and
/// renamed over the target. Missing parent directories are created.
///
/// # Errors
///
/// Returns any I/O error from creating, writing or renaming the temporary file.
pub fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Unix milliseconds of an instant, the unit of the tagged-files ledger.
pub fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}
