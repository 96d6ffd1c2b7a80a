//! Schema comparison and synchronization planning for MySQL-family databases.
//!
//! `oxide-schema` compares two immutable schema snapshots and produces an
//! ordered, dependency-safe list of DDL operations that turns the *target*
//! into the *source*, together with a report of everything that can lose
//! data.
//!
//! # Architecture
//!
//! - **Schema** - validated snapshot of tables, columns, indexes and foreign keys
//! - **Diff** - computes the unordered [`ChangeSet`](operations::ChangeSet)
//! - **Resolver** - orders it into phases and annotates destructive operations
//! - **State** - replays operations to prove each step is applicable
//! - **Dialect** - renders operations to SQL text
//! - **Report** - read-only summary for review before execution
//!
//! # Example
//!
//! ```rust
//! use oxide_schema::prelude::{plan, Column, MySqlDialect, Schema, SqlType, Table};
//!
//! let source = Schema::builder()
//!     .table(
//!         Table::new("users")
//!             .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
//!             .column(Column::new("name", SqlType::Varchar(255)).not_null())
//!             .primary_key(["id"]),
//!     )
//!     .build()?;
//! let target = Schema::empty();
//!
//! let plan = plan(&source, &target)?;
//! assert!(!plan.report.requires_confirmation());
//!
//! let statements = plan.statements(&MySqlDialect::mysql());
//! assert!(statements[0].starts_with("CREATE TABLE `users`"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod dialect;
pub mod diff;
pub mod error;
pub mod introspect;
pub mod operations;
pub mod plan;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod state;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{render, render_script, Dialect, MySqlDialect, ScriptHeader};
    pub use crate::diff::diff;
    pub use crate::error::{Result, SchemaError, StateError, SyncError};
    pub use crate::introspect::Introspect;
    pub use crate::operations::{
        ChangeSet, ColumnPosition, DestructiveReason, DiffWarning, Operation, OperationKind,
    };
    pub use crate::plan::{plan, Plan};
    pub use crate::report::{ReportEntry, TableSummary, ValidationReport};
    pub use crate::resolver::{resolve, OperationList, Phase, PlannedOperation};
    pub use crate::schema::{
        Column, DanglingReference, DefaultValue, ForeignKey, ForeignKeyAction, Index, NameCase,
        Schema, SchemaBuilder, SqlType, Table,
    };
    pub use crate::state::SchemaState;
}
