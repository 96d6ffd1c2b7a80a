//! Atomic file output.
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! failed run never leaves a truncated script behind.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::OutputError;

/// Writes `contents` to `path`, replacing any existing file atomically.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), OutputError> {
    let io_error = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
    file.write_all(contents.as_bytes()).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;
    file.persist(path).map_err(|e| io_error(e.error))?;

    info!(path = %path.display(), bytes = contents.len(), "Wrote file");
    Ok(())
}

/// Serializes `value` as pretty JSON and writes it atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let mut json = serde_json::to_string_pretty(value).map_err(|source| OutputError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');
    write_atomic(path, &json)
}
