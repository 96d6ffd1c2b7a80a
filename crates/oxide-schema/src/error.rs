//! Error types for schema modelling, diffing and ordering.

/// Invariant violations detected while building a [`Schema`](crate::schema::Schema).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two tables normalize to the same name.
    #[error("Duplicate table '{table}'")]
    DuplicateTable {
        /// Table name.
        table: String,
    },

    /// Two columns of a table share a name.
    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Two indexes of a table share a name.
    #[error("Duplicate index '{index}' in table '{table}'")]
    DuplicateIndex {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },

    /// Two foreign keys of a table share a name.
    #[error("Duplicate foreign key '{foreign_key}' in table '{table}'")]
    DuplicateForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        foreign_key: String,
    },

    /// A primary key, index or foreign key names a column the table lacks.
    #[error("{owner} of table '{table}' references unknown column '{column}'")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// What references the column, e.g. `index 'idx_email'`.
        owner: String,
        /// The missing column.
        column: String,
    },

    /// A primary key, index or foreign key has no columns.
    #[error("{owner} of table '{table}' has no columns")]
    EmptyColumnList {
        /// Table name.
        table: String,
        /// What has the empty column list.
        owner: String,
    },

    /// A foreign key's local and referenced column lists differ in length.
    #[error(
        "Foreign key '{foreign_key}' of table '{table}' maps {local} column(s) onto {referenced}"
    )]
    ColumnCountMismatch {
        /// Table name.
        table: String,
        /// Constraint name.
        foreign_key: String,
        /// Number of local columns.
        local: usize,
        /// Number of referenced columns.
        referenced: usize,
    },

    /// A foreign key points at a table or column absent from the snapshot.
    #[error("Foreign key '{foreign_key}' of table '{table}' references missing {}", describe_target(.referenced_table, .column.as_deref()))]
    DanglingReference {
        /// Table owning the foreign key.
        table: String,
        /// Constraint name.
        foreign_key: String,
        /// Referenced table.
        referenced_table: String,
        /// The missing referenced column, when the table itself exists.
        column: Option<String>,
    },
}

fn describe_target(table: &str, column: Option<&str>) -> String {
    match column {
        Some(column) => format!("column '{}.{}'", table, column),
        None => format!("table '{}'", table),
    }
}

/// Errors produced by the diff, resolve and plan stages.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// One of the input snapshots violates a model invariant.
    #[error("Malformed schema: {0}")]
    MalformedSchema(#[from] SchemaError),

    /// New tables reference each other in a cycle.
    #[error(
        "Cyclic foreign-key dependency between new tables: {}; resolve manually",
        .tables.join(", ")
    )]
    CyclicDependency {
        /// Tables on (or between) the cycle, sorted.
        tables: Vec<String>,
    },

    /// An operation names an entity present in neither snapshot.
    #[error("Operation #{index} ({operation}) references {entity}, which exists in neither schema")]
    UnresolvableReference {
        /// Position of the operation in the change set.
        index: usize,
        /// Operation description.
        operation: String,
        /// The unresolvable entity.
        entity: String,
    },

    /// Replaying the ordered operations against the target failed.
    #[error("Operation #{index} ({operation}) cannot be applied in sequence: {source}")]
    InvariantViolation {
        /// Position of the operation in the operation list.
        index: usize,
        /// Operation description.
        operation: String,
        /// Why the operation is not applicable at that point.
        source: StateError,
    },

    /// The replayed target does not match the source.
    #[error("Applying the plan leaves {remaining} structural difference(s) against the source")]
    Divergence {
        /// Number of operations a fresh diff still finds.
        remaining: usize,
    },
}

/// Precondition failures while replaying operations on a [`SchemaState`](crate::state::SchemaState).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Table does not exist.
    #[error("table '{0}' does not exist")]
    MissingTable(String),

    /// Table already exists.
    #[error("table '{0}' already exists")]
    TableExists(String),

    /// Column does not exist.
    #[error("column '{table}.{column}' does not exist")]
    MissingColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Column already exists.
    #[error("column '{table}.{column}' already exists")]
    ColumnExists {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Index does not exist.
    #[error("index '{index}' does not exist on '{table}'")]
    MissingIndex {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },

    /// Index name already taken.
    #[error("index '{index}' already exists on '{table}'")]
    IndexExists {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },

    /// Foreign key does not exist.
    #[error("foreign key '{foreign_key}' does not exist on '{table}'")]
    MissingForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        foreign_key: String,
    },

    /// Foreign key name already taken.
    #[error("foreign key '{foreign_key}' already exists on '{table}'")]
    ForeignKeyExists {
        /// Table name.
        table: String,
        /// Constraint name.
        foreign_key: String,
    },

    /// A foreign key still points at the table or column being removed.
    #[error("'{target}' is still referenced by foreign key '{foreign_key}' of '{table}'")]
    StillReferenced {
        /// The table or `table.column` being removed.
        target: String,
        /// Table owning the foreign key.
        table: String,
        /// Constraint name.
        foreign_key: String,
    },

    /// The column is still part of an index or foreign key of its table.
    #[error("column '{table}.{column}' is still used by {owner}")]
    ColumnInUse {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// The index or foreign key using it.
        owner: String,
    },

    /// The index is the last one a foreign key can use.
    #[error("index '{index}' on '{table}' is still needed by foreign key '{foreign_key}' of '{owner}'")]
    IndexInUse {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
        /// Table owning the foreign key.
        owner: String,
        /// Constraint name.
        foreign_key: String,
    },

    /// A foreign key would reference something that does not exist yet.
    #[error("foreign key '{foreign_key}' of '{table}' references missing {}", describe_target(.referenced_table, .column.as_deref()))]
    MissingReference {
        /// Table owning the foreign key.
        table: String,
        /// Constraint name.
        foreign_key: String,
        /// Referenced table.
        referenced_table: String,
        /// Referenced column, when the table exists.
        column: Option<String>,
    },
}

/// Result type for diff, resolve and plan operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_reference_message() {
        let err = SchemaError::DanglingReference {
            table: "orders".to_string(),
            foreign_key: "fk_orders_customer".to_string(),
            referenced_table: "customers".to_string(),
            column: Some("id".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Foreign key 'fk_orders_customer' of table 'orders' references missing column 'customers.id'"
        );
    }

    #[test]
    fn test_cycle_message_lists_tables() {
        let err = SyncError::CyclicDependency {
            tables: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().contains("a, b"));
    }
}
