//! Schema snapshot sources.
//!
//! A snapshot comes either from a live server ([`MySqlIntrospector`]) or
//! from a JSON file written by an earlier run ([`SnapshotFile`]).

pub mod column_type;
pub mod mysql;
pub mod snapshot;

pub use mysql::MySqlIntrospector;
pub use snapshot::SnapshotFile;

use oxide_schema::introspect::Introspect;
use oxide_schema::schema::Schema;

use crate::config::DatabaseConfig;
use crate::error::IntrospectError;

/// Where one side of the comparison comes from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Connect and read `information_schema`.
    Live(DatabaseConfig),
    /// Read a saved snapshot.
    Snapshot(SnapshotFile),
}

impl SchemaSource {
    /// Identifier used in logs and the script header.
    pub fn display_name(&self) -> String {
        match self {
            Self::Live(config) => config.display_name(),
            Self::Snapshot(file) => format!("snapshot {}", file.path().display()),
        }
    }

    /// Produces the snapshot.
    pub async fn load(&self) -> Result<Schema, IntrospectError> {
        match self {
            Self::Live(config) => {
                let introspector = MySqlIntrospector::connect(config).await?;
                let schema = introspector.introspect().await;
                introspector.close().await;
                schema
            }
            Self::Snapshot(file) => file.introspect_schema(),
        }
    }
}
