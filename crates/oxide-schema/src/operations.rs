//! Structural change operations.
//!
//! An [`Operation`] is a single DDL-level change that moves the target
//! schema one step toward the source. Operations that remove something carry
//! the removed entity so that every operation has an exact inverse.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{Column, ForeignKey, Index, SqlType, Table};

/// Where an added column is placed among the existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColumnPosition {
    /// Before every other column.
    First,
    /// Directly after the named column.
    After(String),
    /// After every other column.
    #[default]
    Last,
}

/// A single structural change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a new table, including its inline indexes and foreign keys.
    CreateTable {
        /// Full table definition.
        table: Table,
    },
    /// Drop a table.
    DropTable {
        /// Definition of the dropped table.
        table: Table,
    },
    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: Column,
        /// Placement of the new column.
        position: ColumnPosition,
    },
    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Definition of the dropped column.
        column: Column,
    },
    /// Change a column's definition in place.
    AlterColumn {
        /// Table name.
        table: String,
        /// Current definition.
        from: Column,
        /// Desired definition.
        to: Column,
    },
    /// Create an index on an existing table.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: Index,
    },
    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Definition of the dropped index.
        index: Index,
    },
    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Constraint definition.
        foreign_key: ForeignKey,
    },
    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Table name.
        table: String,
        /// Definition of the dropped constraint.
        foreign_key: ForeignKey,
    },
    /// Change the referential actions of a foreign key.
    AlterForeignKey {
        /// Table name.
        table: String,
        /// Current definition.
        from: ForeignKey,
        /// Desired definition.
        to: ForeignKey,
    },
}

/// Discriminant of an [`Operation`], used for grouping and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// See [`Operation::CreateTable`].
    CreateTable,
    /// See [`Operation::DropTable`].
    DropTable,
    /// See [`Operation::AddColumn`].
    AddColumn,
    /// See [`Operation::DropColumn`].
    DropColumn,
    /// See [`Operation::AlterColumn`].
    AlterColumn,
    /// See [`Operation::CreateIndex`].
    CreateIndex,
    /// See [`Operation::DropIndex`].
    DropIndex,
    /// See [`Operation::AddForeignKey`].
    AddForeignKey,
    /// See [`Operation::DropForeignKey`].
    DropForeignKey,
    /// See [`Operation::AlterForeignKey`].
    AlterForeignKey,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateTable => "CreateTable",
            Self::DropTable => "DropTable",
            Self::AddColumn => "AddColumn",
            Self::DropColumn => "DropColumn",
            Self::AlterColumn => "AlterColumn",
            Self::CreateIndex => "CreateIndex",
            Self::DropIndex => "DropIndex",
            Self::AddForeignKey => "AddForeignKey",
            Self::DropForeignKey => "DropForeignKey",
            Self::AlterForeignKey => "AlterForeignKey",
        };
        f.write_str(name)
    }
}

/// Why an operation can lose or reject existing data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestructiveReason {
    /// The table and all its rows are removed.
    DropsTable,
    /// The column and its values are removed.
    DropsColumn,
    /// The column type cannot hold every value of the old type.
    NarrowsType {
        /// Old type.
        from: SqlType,
        /// New type.
        to: SqlType,
    },
    /// A nullable column becomes NOT NULL with no default to fill existing NULLs.
    AddsNotNullWithoutDefault,
}

impl fmt::Display for DestructiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropsTable => f.write_str("drops the table and its data"),
            Self::DropsColumn => f.write_str("drops the column and its data"),
            Self::NarrowsType { from, to } => write!(f, "narrows type {} to {}", from, to),
            Self::AddsNotNullWithoutDefault => {
                f.write_str("makes the column NOT NULL without a default")
            }
        }
    }
}

impl Operation {
    /// Returns the operation kind.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateTable { .. } => OperationKind::CreateTable,
            Self::DropTable { .. } => OperationKind::DropTable,
            Self::AddColumn { .. } => OperationKind::AddColumn,
            Self::DropColumn { .. } => OperationKind::DropColumn,
            Self::AlterColumn { .. } => OperationKind::AlterColumn,
            Self::CreateIndex { .. } => OperationKind::CreateIndex,
            Self::DropIndex { .. } => OperationKind::DropIndex,
            Self::AddForeignKey { .. } => OperationKind::AddForeignKey,
            Self::DropForeignKey { .. } => OperationKind::DropForeignKey,
            Self::AlterForeignKey { .. } => OperationKind::AlterForeignKey,
        }
    }

    /// Returns the name of the table this operation changes.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::CreateTable { table } | Self::DropTable { table } => &table.name,
            Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::AlterColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. }
            | Self::AlterForeignKey { table, .. } => table,
        }
    }

    /// Returns the operation that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::CreateTable { table } => Self::DropTable {
                table: table.clone(),
            },
            Self::DropTable { table } => Self::CreateTable {
                table: table.clone(),
            },
            Self::AddColumn { table, column, .. } => Self::DropColumn {
                table: table.clone(),
                column: column.clone(),
            },
            // The original position is not recorded, so the column returns at the end.
            Self::DropColumn { table, column } => Self::AddColumn {
                table: table.clone(),
                column: column.clone(),
                position: ColumnPosition::Last,
            },
            Self::AlterColumn { table, from, to } => Self::AlterColumn {
                table: table.clone(),
                from: to.clone(),
                to: from.clone(),
            },
            Self::CreateIndex { table, index } => Self::DropIndex {
                table: table.clone(),
                index: index.clone(),
            },
            Self::DropIndex { table, index } => Self::CreateIndex {
                table: table.clone(),
                index: index.clone(),
            },
            Self::AddForeignKey { table, foreign_key } => Self::DropForeignKey {
                table: table.clone(),
                foreign_key: foreign_key.clone(),
            },
            Self::DropForeignKey { table, foreign_key } => Self::AddForeignKey {
                table: table.clone(),
                foreign_key: foreign_key.clone(),
            },
            Self::AlterForeignKey { table, from, to } => Self::AlterForeignKey {
                table: table.clone(),
                from: to.clone(),
                to: from.clone(),
            },
        }
    }

    /// Returns why this operation can lose data, or `None` if it cannot.
    #[must_use]
    pub fn destructive_reason(&self) -> Option<DestructiveReason> {
        match self {
            Self::DropTable { .. } => Some(DestructiveReason::DropsTable),
            Self::DropColumn { .. } => Some(DestructiveReason::DropsColumn),
            Self::AlterColumn { from, to, .. } => {
                if from.sql_type.is_narrowing_to(&to.sql_type) {
                    Some(DestructiveReason::NarrowsType {
                        from: from.sql_type.clone(),
                        to: to.sql_type.clone(),
                    })
                } else if from.nullable && !to.nullable && to.default.is_none() {
                    Some(DestructiveReason::AddsNotNullWithoutDefault)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Returns `true` if this operation can lose data.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.destructive_reason().is_some()
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { table } => format!("Create table '{}'", table.name),
            Self::DropTable { table } => format!("Drop table '{}'", table.name),
            Self::AddColumn { table, column, .. } => {
                format!("Add column '{}' to table '{}'", column.name, table)
            }
            Self::DropColumn { table, column } => {
                format!("Drop column '{}' from table '{}'", column.name, table)
            }
            Self::AlterColumn { table, to, .. } => {
                format!("Alter column '{}' in table '{}'", to.name, table)
            }
            Self::CreateIndex { table, index } => {
                format!("Create index '{}' on table '{}'", index.name, table)
            }
            Self::DropIndex { table, index } => {
                format!("Drop index '{}' from table '{}'", index.name, table)
            }
            Self::AddForeignKey { table, foreign_key } => format!(
                "Add foreign key '{}' to table '{}'",
                foreign_key.name, table
            ),
            Self::DropForeignKey { table, foreign_key } => format!(
                "Drop foreign key '{}' from table '{}'",
                foreign_key.name, table
            ),
            Self::AlterForeignKey { table, to, .. } => format!(
                "Alter foreign key '{}' on table '{}'",
                to.name, table
            ),
        }
    }
}

/// A difference that is reported but produces no DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffWarning {
    /// The primary key differs; changing it is left to the operator.
    PrimaryKeyChanged {
        /// Table name.
        table: String,
        /// Primary key in the target.
        from: Option<Vec<String>>,
        /// Primary key in the source.
        to: Option<Vec<String>>,
    },
    /// Shared columns appear in a different order.
    ColumnOrderChanged {
        /// Table name.
        table: String,
        /// Order of the shared columns in the target.
        old_order: Vec<String>,
        /// Order of the shared columns in the source.
        new_order: Vec<String>,
    },
}

impl DiffWarning {
    /// Returns the table the warning is about.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::PrimaryKeyChanged { table, .. } | Self::ColumnOrderChanged { table, .. } => {
                table
            }
        }
    }

    /// Returns the same warning seen from the other side.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::PrimaryKeyChanged { table, from, to } => Self::PrimaryKeyChanged {
                table: table.clone(),
                from: to.clone(),
                to: from.clone(),
            },
            Self::ColumnOrderChanged {
                table,
                old_order,
                new_order,
            } => Self::ColumnOrderChanged {
                table: table.clone(),
                old_order: new_order.clone(),
                new_order: old_order.clone(),
            },
        }
    }
}

fn describe_key(key: &Option<Vec<String>>) -> String {
    match key {
        Some(columns) => format!("({})", columns.join(", ")),
        None => "none".to_string(),
    }
}

impl fmt::Display for DiffWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryKeyChanged { table, from, to } => write!(
                f,
                "Primary key of '{}' changes from {} to {}; not altered automatically",
                table,
                describe_key(from),
                describe_key(to)
            ),
            Self::ColumnOrderChanged {
                table,
                old_order,
                new_order,
            } => write!(
                f,
                "Column order of '{}' differs ({} vs {}); not altered automatically",
                table,
                old_order.join(", "),
                new_order.join(", ")
            ),
        }
    }
}

/// The unordered result of a diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Structural changes.
    pub operations: Vec<Operation>,
    /// Differences that produce no DDL.
    pub warnings: Vec<DiffWarning>,
}

impl ChangeSet {
    /// Returns `true` if there are no operations.
    ///
    /// Warnings alone do not make a change set non-empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns the change set that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            operations: self.operations.iter().rev().map(Operation::inverse).collect(),
            warnings: self.warnings.iter().map(DiffWarning::inverse).collect(),
        }
    }
}
