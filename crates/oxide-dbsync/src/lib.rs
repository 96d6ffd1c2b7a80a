//! Structure synchronization between two MySQL/MariaDB databases.
//!
//! `oxide-dbsync` reads the schema of a *source* and a *target* database,
//! plans the DDL that turns the target into the source with
//! [`oxide_schema`], and writes the result as a reviewable SQL script.
//!
//! # Components
//!
//! - **Config** - dotenv-style credentials for both sides
//! - **Introspect** - live `information_schema` reader and JSON snapshots
//! - **Output** - atomic script and report writing
//!
//! # CLI Usage
//!
//! ```bash
//! # Compare two live databases
//! oxide-dbsync --config db.env --output sync_queries.sql
//!
//! # Keep the snapshots, then re-plan offline
//! oxide-dbsync --config db.env --save-snapshots snapshots/
//! oxide-dbsync --source-snapshot snapshots/source.json \
//!     --target-snapshot snapshots/target.json
//!
//! # Refuse to write a script that drops data
//! oxide-dbsync --config db.env --fail-on-destructive
//! ```

pub mod config;
pub mod error;
pub mod introspect;
pub mod output;

pub use config::{DatabaseConfig, SyncConfig};
pub use error::{ConfigError, IntrospectError, OutputError};
pub use introspect::{MySqlIntrospector, SchemaSource, SnapshotFile};
