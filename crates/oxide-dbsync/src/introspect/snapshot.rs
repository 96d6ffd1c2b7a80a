//! JSON schema snapshots.
//!
//! A snapshot is the serialized form of a [`Schema`]. Loading one goes
//! through the same validation as building a schema in code, so a hand
//! edited file cannot smuggle in an inconsistent model.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use oxide_schema::introspect::Introspect;
use oxide_schema::schema::Schema;

use crate::error::{IntrospectError, OutputError};
use crate::output::write_json;

/// A schema snapshot stored on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Refers to the snapshot at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `schema` to this snapshot's path.
    pub fn save(&self, schema: &Schema) -> Result<(), OutputError> {
        write_json(&self.path, schema)
    }
}

impl Introspect for SnapshotFile {
    type Error = IntrospectError;

    fn introspect_schema(&self) -> Result<Schema, Self::Error> {
        let contents =
            fs::read_to_string(&self.path).map_err(|source| IntrospectError::SnapshotIo {
                path: self.path.clone(),
                source,
            })?;
        let schema: Schema =
            serde_json::from_str(&contents).map_err(|source| IntrospectError::SnapshotFormat {
                path: self.path.clone(),
                source,
            })?;
        schema.validate_references()?;
        debug!(path = %self.path.display(), tables = schema.len(), "Loaded snapshot");
        Ok(schema)
    }
}
