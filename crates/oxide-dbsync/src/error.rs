//! Error types for the synchronization tool.

use std::path::PathBuf;

use oxide_schema::error::SchemaError;

/// Errors loading the credentials file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The credentials file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A required key is absent or empty.
    #[error("{0} is required in config file")]
    Missing(String),

    /// A port value is not a valid TCP port.
    #[error("Invalid port for {key}: '{value}'")]
    InvalidPort {
        /// The offending key, e.g. `SOURCE_PORT`.
        key: String,
        /// The raw value.
        value: String,
    },

    /// The file is not valid dotenv syntax.
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        /// Path to the credentials file.
        path: PathBuf,
        /// Parser error.
        source: dotenvy::Error,
    },
}

/// Errors producing a schema snapshot.
#[derive(Debug, thiserror::Error)]
pub enum IntrospectError {
    /// Could not connect to the database.
    #[error("Failed to connect to {database}: {source}")]
    Connection {
        /// Display identifier of the database.
        database: String,
        /// Driver error.
        source: sqlx::Error,
    },

    /// A catalog query failed.
    #[error("Failed to read {table} from information_schema: {source}")]
    Introspection {
        /// The catalog table being read.
        table: &'static str,
        /// Driver error.
        source: sqlx::Error,
    },

    /// A snapshot file could not be read or written.
    #[error("Snapshot file '{path}': {source}")]
    SnapshotIo {
        /// Path to the snapshot file.
        path: PathBuf,
        /// I/O error.
        source: std::io::Error,
    },

    /// A snapshot file is not a valid schema document.
    #[error("Invalid snapshot '{path}': {source}")]
    SnapshotFormat {
        /// Path to the snapshot file.
        path: PathBuf,
        /// JSON error.
        source: serde_json::Error,
    },

    /// The catalog describes a schema the model rejects.
    #[error("Malformed schema: {0}")]
    MalformedSchema(#[from] SchemaError),
}

/// Errors writing output files.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Writing or renaming the file failed.
    #[error("Failed to write '{path}': {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// I/O error.
        source: std::io::Error,
    },

    /// Serializing the document failed.
    #[error("Failed to serialize '{path}': {source}")]
    Json {
        /// Destination path.
        path: PathBuf,
        /// JSON error.
        source: serde_json::Error,
    },
}
