//! Schema state simulation.
//!
//! Replays operations against a mutable copy of a snapshot, checking the
//! preconditions a real server would enforce at every step: objects must
//! exist before they are changed, names must be free before they are used,
//! and foreign keys may only point at tables and columns that exist at that
//! moment. The planner uses this to prove an [`OperationList`] is safe to
//! execute in order.

use std::collections::BTreeMap;

use crate::error::{Result, SchemaError, StateError, SyncError};
use crate::operations::{ColumnPosition, Operation};
use crate::resolver::OperationList;
use crate::schema::{ForeignKey, NameCase, Schema, Table};

/// A mutable working copy of a schema.
#[derive(Debug, Clone)]
pub struct SchemaState {
    name_case: NameCase,
    tables: BTreeMap<String, Table>,
}

impl SchemaState {
    /// Starts from a snapshot.
    #[must_use]
    pub fn new(schema: &Schema) -> Self {
        let name_case = schema.name_case();
        Self {
            name_case,
            tables: schema
                .tables()
                .map(|t| (name_case.key(&t.name), t.clone()))
                .collect(),
        }
    }

    /// Re-keys the state under another table-name policy.
    #[must_use]
    pub fn with_name_case(self, name_case: NameCase) -> Self {
        Self {
            name_case,
            tables: self
                .tables
                .into_values()
                .map(|t| (name_case.key(&t.name), t))
                .collect(),
        }
    }

    /// Gets a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&self.name_case.key(name))
    }

    /// Converts the state back into a validated snapshot.
    pub fn into_schema(self) -> std::result::Result<Schema, SchemaError> {
        Schema::new(self.name_case, self.tables.into_values())
    }

    /// Applies every operation of a plan in order.
    pub fn apply_all(&mut self, operations: &OperationList) -> Result<()> {
        for (index, planned) in operations.iter().enumerate() {
            self.apply(&planned.operation)
                .map_err(|source| SyncError::InvariantViolation {
                    index,
                    operation: planned.operation.description(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Applies a single operation.
    pub fn apply(&mut self, operation: &Operation) -> std::result::Result<(), StateError> {
        match operation {
            Operation::CreateTable { table } => {
                let key = self.name_case.key(&table.name);
                if self.tables.contains_key(&key) {
                    return Err(StateError::TableExists(table.name.clone()));
                }
                for fk in &table.foreign_keys {
                    if self.name_case.key(&fk.referenced_table) == key {
                        check_referenced_columns(table, &table.name, fk)?;
                    } else {
                        self.check_reference(&table.name, fk)?;
                    }
                }
                self.tables.insert(key, table.clone());
            }

            Operation::DropTable { table } => {
                let key = self.name_case.key(&table.name);
                if !self.tables.contains_key(&key) {
                    return Err(StateError::MissingTable(table.name.clone()));
                }
                for (other_key, other) in &self.tables {
                    if *other_key == key {
                        continue;
                    }
                    if let Some(fk) = other
                        .foreign_keys
                        .iter()
                        .find(|fk| self.name_case.key(&fk.referenced_table) == key)
                    {
                        return Err(StateError::StillReferenced {
                            target: table.name.clone(),
                            table: other.name.clone(),
                            foreign_key: fk.name.clone(),
                        });
                    }
                }
                self.tables.remove(&key);
            }

            Operation::AddColumn {
                table,
                column,
                position,
            } => {
                let t = self.table_mut(table)?;
                if t.get_column(&column.name).is_some() {
                    return Err(StateError::ColumnExists {
                        table: table.clone(),
                        column: column.name.clone(),
                    });
                }
                let at = match position {
                    ColumnPosition::First => 0,
                    ColumnPosition::Last => t.columns.len(),
                    ColumnPosition::After(previous) => {
                        t.column_position(previous)
                            .ok_or_else(|| StateError::MissingColumn {
                                table: table.clone(),
                                column: previous.clone(),
                            })?
                            + 1
                    }
                };
                t.columns.insert(at, column.clone());
            }

            Operation::DropColumn { table, column } => {
                self.check_column_unused(table, &column.name)?;
                let t = self.table_mut(table)?;
                let at = t
                    .column_position(&column.name)
                    .ok_or_else(|| StateError::MissingColumn {
                        table: table.clone(),
                        column: column.name.clone(),
                    })?;
                t.columns.remove(at);
                if let Some(primary_key) = &mut t.primary_key {
                    primary_key.retain(|c| *c != column.name);
                    if primary_key.is_empty() {
                        t.primary_key = None;
                    }
                }
            }

            Operation::AlterColumn { table, from, to } => {
                if from.sql_type != to.sql_type {
                    self.check_column_unconstrained(table, &from.name)?;
                }
                let t = self.table_mut(table)?;
                let at = t
                    .column_position(&from.name)
                    .ok_or_else(|| StateError::MissingColumn {
                        table: table.clone(),
                        column: from.name.clone(),
                    })?;
                t.columns[at] = to.clone();
            }

            Operation::CreateIndex { table, index } => {
                let t = self.table_mut(table)?;
                if t.get_index(&index.name).is_some() {
                    return Err(StateError::IndexExists {
                        table: table.clone(),
                        index: index.name.clone(),
                    });
                }
                if let Some(missing) = index.columns.iter().find(|c| t.get_column(c).is_none()) {
                    return Err(StateError::MissingColumn {
                        table: table.clone(),
                        column: missing.clone(),
                    });
                }
                t.indexes.push(index.clone());
            }

            Operation::DropIndex { table, index } => {
                self.check_index_unneeded(table, &index.name)?;
                let t = self.table_mut(table)?;
                let at = t
                    .indexes
                    .iter()
                    .position(|i| i.name == index.name)
                    .ok_or_else(|| StateError::MissingIndex {
                        table: table.clone(),
                        index: index.name.clone(),
                    })?;
                t.indexes.remove(at);
            }

            Operation::AddForeignKey { table, foreign_key } => {
                self.add_foreign_key(table, foreign_key)?;
            }

            Operation::DropForeignKey { table, foreign_key } => {
                self.drop_foreign_key(table, &foreign_key.name)?;
            }

            Operation::AlterForeignKey { table, from, to } => {
                self.drop_foreign_key(table, &from.name)?;
                self.add_foreign_key(table, to)?;
            }
        }
        Ok(())
    }

    fn table_mut(&mut self, name: &str) -> std::result::Result<&mut Table, StateError> {
        self.tables
            .get_mut(&self.name_case.key(name))
            .ok_or_else(|| StateError::MissingTable(name.to_string()))
    }

    /// Checks that a foreign key owned by `table` points at an existing
    /// table and columns.
    fn check_reference(&self, table: &str, fk: &ForeignKey) -> std::result::Result<(), StateError> {
        let referenced = self
            .table(&fk.referenced_table)
            .ok_or_else(|| StateError::MissingReference {
                table: table.to_string(),
                foreign_key: fk.name.clone(),
                referenced_table: fk.referenced_table.clone(),
                column: None,
            })?;
        check_referenced_columns(referenced, table, fk)
    }

    fn add_foreign_key(&mut self, table: &str, fk: &ForeignKey) -> std::result::Result<(), StateError> {
        self.check_reference(table, fk)?;
        let t = self.table_mut(table)?;
        if t.get_foreign_key(&fk.name).is_some() {
            return Err(StateError::ForeignKeyExists {
                table: table.to_string(),
                foreign_key: fk.name.clone(),
            });
        }
        if let Some(missing) = fk.columns.iter().find(|c| t.get_column(c).is_none()) {
            return Err(StateError::MissingColumn {
                table: table.to_string(),
                column: missing.clone(),
            });
        }
        t.foreign_keys.push(fk.clone());
        Ok(())
    }

    fn drop_foreign_key(&mut self, table: &str, name: &str) -> std::result::Result<(), StateError> {
        let t = self.table_mut(table)?;
        let at = t
            .foreign_keys
            .iter()
            .position(|fk| fk.name == name)
            .ok_or_else(|| StateError::MissingForeignKey {
                table: table.to_string(),
                foreign_key: name.to_string(),
            })?;
        t.foreign_keys.remove(at);
        Ok(())
    }

    /// A column can only be dropped once no index or foreign key uses it.
    fn check_column_unused(&self, table: &str, column: &str) -> std::result::Result<(), StateError> {
        let key = self.name_case.key(table);
        let t = self
            .tables
            .get(&key)
            .ok_or_else(|| StateError::MissingTable(table.to_string()))?;

        let in_use = |owner: String| StateError::ColumnInUse {
            table: table.to_string(),
            column: column.to_string(),
            owner,
        };
        if let Some(index) = t.indexes.iter().find(|i| i.columns.iter().any(|c| c == column)) {
            return Err(in_use(format!("index '{}'", index.name)));
        }
        self.check_column_unconstrained(table, column)
    }

    /// A column's type can only change while no foreign key uses it, on
    /// either end.
    fn check_column_unconstrained(
        &self,
        table: &str,
        column: &str,
    ) -> std::result::Result<(), StateError> {
        let key = self.name_case.key(table);
        let t = self
            .tables
            .get(&key)
            .ok_or_else(|| StateError::MissingTable(table.to_string()))?;

        if let Some(fk) = t.foreign_keys.iter().find(|fk| fk.columns.iter().any(|c| c == column)) {
            return Err(StateError::ColumnInUse {
                table: table.to_string(),
                column: column.to_string(),
                owner: format!("foreign key '{}'", fk.name),
            });
        }

        for other in self.tables.values() {
            let referencing = other.foreign_keys.iter().find(|fk| {
                self.name_case.key(&fk.referenced_table) == key
                    && fk.referenced_columns.iter().any(|c| c == column)
            });
            if let Some(fk) = referencing {
                return Err(StateError::StillReferenced {
                    target: format!("{}.{}", table, column),
                    table: other.name.clone(),
                    foreign_key: fk.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// An index can only be dropped while every foreign key it backs, on
    /// either end, still has another index to use.
    fn check_index_unneeded(&self, table: &str, index: &str) -> std::result::Result<(), StateError> {
        let key = self.name_case.key(table);
        let t = self
            .tables
            .get(&key)
            .ok_or_else(|| StateError::MissingTable(table.to_string()))?;
        let loses = |columns: &[String]| {
            t.has_leading_index(columns, &[]) && !t.has_leading_index(columns, &[index])
        };

        for owner in self.tables.values() {
            let owned = self.name_case.key(&owner.name) == key;
            let needing = owner.foreign_keys.iter().find(|fk| {
                (owned && loses(&fk.columns))
                    || (self.name_case.key(&fk.referenced_table) == key
                        && loses(&fk.referenced_columns))
            });
            if let Some(fk) = needing {
                return Err(StateError::IndexInUse {
                    table: table.to_string(),
                    index: index.to_string(),
                    owner: owner.name.clone(),
                    foreign_key: fk.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn check_referenced_columns(
    referenced: &Table,
    table: &str,
    fk: &ForeignKey,
) -> std::result::Result<(), StateError> {
    match fk
        .referenced_columns
        .iter()
        .find(|c| referenced.get_column(c).is_none())
    {
        Some(missing) => Err(StateError::MissingReference {
            table: table.to_string(),
            foreign_key: fk.name.clone(),
            referenced_table: fk.referenced_table.clone(),
            column: Some(missing.clone()),
        }),
        None => Ok(()),
    }
}
