//! Ordering and safety resolver.
//!
//! Turns an unordered [`ChangeSet`] into an [`OperationList`] whose
//! statements can be executed strictly in sequence without ever violating
//! referential integrity. Operations are grouped into eight fixed phases;
//! inside the table phases a topological sort over foreign-key references
//! decides the order.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diff::keyed;
use crate::error::{Result, SyncError};
use crate::operations::{ChangeSet, DestructiveReason, Operation};
use crate::schema::{ForeignKey, Index, NameCase, Schema, Table};

/// Execution phase of a planned operation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Foreign keys are dropped before the structures they reference.
    DropForeignKeys,
    /// Indexes are dropped.
    DropIndexes,
    /// Columns of retained tables are dropped.
    DropColumns,
    /// Tables are dropped, referencing tables first.
    DropTables,
    /// Tables are created, referenced tables first.
    CreateTables,
    /// Columns are added or changed.
    AlterColumns,
    /// Indexes are created.
    CreateIndexes,
    /// Foreign keys are added once everything they reference exists.
    AddForeignKeys,
}

impl Phase {
    /// Returns the 1-based position of the phase.
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::DropForeignKeys => 1,
            Self::DropIndexes => 2,
            Self::DropColumns => 3,
            Self::DropTables => 4,
            Self::CreateTables => 5,
            Self::AlterColumns => 6,
            Self::CreateIndexes => 7,
            Self::AddForeignKeys => 8,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DropForeignKeys => "drop foreign keys",
            Self::DropIndexes => "drop indexes",
            Self::DropColumns => "drop columns",
            Self::DropTables => "drop tables",
            Self::CreateTables => "create tables",
            Self::AlterColumns => "add/alter columns",
            Self::CreateIndexes => "create indexes",
            Self::AddForeignKeys => "add foreign keys",
        };
        write!(f, "{}. {}", self.number(), label)
    }
}

/// An operation with its place in the plan and its safety annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedOperation {
    /// The operation to execute.
    pub operation: Operation,
    /// Phase the operation belongs to.
    pub phase: Phase,
    /// Whether the operation can lose or reject existing data.
    pub destructive: bool,
    /// Why the operation is destructive.
    pub reason: Option<DestructiveReason>,
}

impl PlannedOperation {
    fn new(operation: Operation, phase: Phase) -> Self {
        let reason = operation.destructive_reason();
        Self {
            operation,
            phase,
            destructive: reason.is_some(),
            reason,
        }
    }
}

/// Dependency-ordered operations, ready for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationList {
    operations: Vec<PlannedOperation>,
}

impl OperationList {
    /// Iterates operations in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, PlannedOperation> {
        self.operations.iter()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if there is nothing to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Iterates the destructive operations.
    pub fn destructive(&self) -> impl Iterator<Item = &PlannedOperation> {
        self.operations.iter().filter(|op| op.destructive)
    }

    /// Returns the planned operations as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[PlannedOperation] {
        &self.operations
    }
}

impl<'a> IntoIterator for &'a OperationList {
    type Item = &'a PlannedOperation;
    type IntoIter = std::slice::Iter<'a, PlannedOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Orders `changes` (computed as `diff(source, target)`) for execution
/// against `target`.
///
/// Fails with [`SyncError::CyclicDependency`] when new tables reference each
/// other in a cycle, and with [`SyncError::UnresolvableReference`] when an
/// operation names something neither snapshot contains.
pub fn resolve(changes: &ChangeSet, source: &Schema, target: &Schema) -> Result<OperationList> {
    let name_case = source.name_case().combine(target.name_case());
    let source_tables = keyed(source, name_case);
    let target_tables = keyed(target, name_case);
    check_references(changes, &source_tables, &target_tables, name_case)?;

    let mut dropped: BTreeMap<String, &Table> = BTreeMap::new();
    let mut created: BTreeMap<String, &Table> = BTreeMap::new();
    let mut touched_columns: HashSet<(String, &str)> = HashSet::new();
    let mut new_indexes: Vec<(String, &Index)> = Vec::new();
    for op in &changes.operations {
        match op {
            Operation::DropTable { table } => {
                dropped.insert(name_case.key(&table.name), table);
            }
            Operation::CreateTable { table } => {
                created.insert(name_case.key(&table.name), table);
            }
            Operation::AddColumn { table, column, .. } => {
                touched_columns.insert((name_case.key(table), column.name.as_str()));
            }
            Operation::AlterColumn { table, to, .. } => {
                touched_columns.insert((name_case.key(table), to.name.as_str()));
            }
            Operation::CreateIndex { table, index } => {
                new_indexes.push((name_case.key(table), index));
            }
            _ => {}
        }
    }

    let mut blocking = blocking_foreign_keys(changes, &target_tables, name_case);

    let mut drop_foreign_keys = Vec::new();
    let mut drop_indexes = Vec::new();
    let mut drop_columns = Vec::new();
    let mut alter_columns = Vec::new();
    let mut create_indexes = Vec::new();
    let mut add_foreign_keys = Vec::new();

    for op in &changes.operations {
        match op {
            Operation::DropForeignKey { .. } => {
                drop_foreign_keys.push(PlannedOperation::new(op.clone(), Phase::DropForeignKeys));
            }
            Operation::DropIndex { .. } => {
                drop_indexes.push(PlannedOperation::new(op.clone(), Phase::DropIndexes));
            }
            Operation::DropColumn { table, column } => {
                if dropped.contains_key(&name_case.key(table)) {
                    debug!(table = %table, column = %column.name, "Folding column drop into table drop");
                    continue;
                }
                drop_columns.push(PlannedOperation::new(op.clone(), Phase::DropColumns));
            }
            Operation::AddColumn { .. } | Operation::AlterColumn { .. } => {
                alter_columns.push(PlannedOperation::new(op.clone(), Phase::AlterColumns));
            }
            Operation::CreateIndex { .. } => {
                create_indexes.push(PlannedOperation::new(op.clone(), Phase::CreateIndexes));
            }
            Operation::AddForeignKey { .. } => {
                add_foreign_keys.push(PlannedOperation::new(op.clone(), Phase::AddForeignKeys));
            }
            Operation::AlterForeignKey { table, from, to } => {
                // The old definition goes early when it would block an
                // index drop or a column change.
                let early = blocking
                    .remove(&(name_case.key(table), from.name.clone()))
                    .is_some();
                let release = Operation::DropForeignKey {
                    table: table.clone(),
                    foreign_key: from.clone(),
                };
                if early {
                    drop_foreign_keys.push(PlannedOperation::new(release, Phase::DropForeignKeys));
                } else {
                    add_foreign_keys.push(PlannedOperation::new(release, Phase::AddForeignKeys));
                }
                add_foreign_keys.push(PlannedOperation::new(
                    Operation::AddForeignKey {
                        table: table.clone(),
                        foreign_key: to.clone(),
                    },
                    Phase::AddForeignKeys,
                ));
            }
            Operation::DropTable { .. } | Operation::CreateTable { .. } => {}
        }
    }

    // Dropping tables: referencing before referenced.
    let (drop_order, cycle_foreign_keys) = order_dropped_tables(&dropped, name_case);
    if !cycle_foreign_keys.is_empty() {
        warn!(
            foreign_keys = cycle_foreign_keys.len(),
            "Dropped tables reference each other in a cycle; dropping their foreign keys first"
        );
    }
    for (table, foreign_key) in cycle_foreign_keys {
        blocking.remove(&(name_case.key(&table), foreign_key.name.clone()));
        drop_foreign_keys.push(PlannedOperation::new(
            Operation::DropForeignKey { table, foreign_key },
            Phase::DropForeignKeys,
        ));
    }

    // Unchanged foreign keys in the way are dropped and re-added around
    // the change. Those of dropped tables are not re-added.
    let mut restored_foreign_keys = Vec::new();
    for ((key, _), (table, foreign_key)) in blocking {
        debug!(
            table = %table,
            foreign_key = %foreign_key.name,
            "Dropping foreign key while its index or columns change"
        );
        drop_foreign_keys.push(PlannedOperation::new(
            Operation::DropForeignKey {
                table: table.to_string(),
                foreign_key: foreign_key.clone(),
            },
            Phase::DropForeignKeys,
        ));
        if !dropped.contains_key(&key) {
            restored_foreign_keys.push(PlannedOperation::new(
                Operation::AddForeignKey {
                    table: table.to_string(),
                    foreign_key: foreign_key.clone(),
                },
                Phase::AddForeignKeys,
            ));
        }
    }
    let drop_tables: Vec<PlannedOperation> = drop_order
        .iter()
        .filter_map(|key| dropped.get(key))
        .map(|table| {
            PlannedOperation::new(
                Operation::DropTable {
                    table: (*table).clone(),
                },
                Phase::DropTables,
            )
        })
        .collect();

    // Creating tables: referenced before referencing.
    let create_order = order_created_tables(&created, name_case)?;
    let defer = |fk: &ForeignKey| {
        let referenced = name_case.key(&fk.referenced_table);
        fk.referenced_columns
            .iter()
            .any(|c| touched_columns.contains(&(referenced.clone(), c.as_str())))
            || new_indexes.iter().any(|(t, index)| {
                *t == referenced && index.columns.starts_with(&fk.referenced_columns)
            })
    };
    let mut create_tables = Vec::new();
    let mut deferred_foreign_keys = Vec::new();
    for key in &create_order {
        let Some(table) = created.get(key) else {
            continue;
        };
        let mut inline = (*table).clone();
        let (late, kept): (Vec<ForeignKey>, Vec<ForeignKey>) =
            inline.foreign_keys.into_iter().partition(|fk| {
                !created.contains_key(&name_case.key(&fk.referenced_table)) && defer(fk)
            });
        inline.foreign_keys = kept;
        for foreign_key in late {
            debug!(
                table = %inline.name,
                foreign_key = %foreign_key.name,
                "Deferring foreign key until referenced columns are in place"
            );
            deferred_foreign_keys.push(PlannedOperation::new(
                Operation::AddForeignKey {
                    table: inline.name.clone(),
                    foreign_key,
                },
                Phase::AddForeignKeys,
            ));
        }
        create_tables.push(PlannedOperation::new(
            Operation::CreateTable { table: inline },
            Phase::CreateTables,
        ));
    }
    deferred_foreign_keys.append(&mut add_foreign_keys);
    deferred_foreign_keys.append(&mut restored_foreign_keys);

    let phases = [
        drop_foreign_keys,
        drop_indexes,
        drop_columns,
        drop_tables,
        create_tables,
        alter_columns,
        create_indexes,
        deferred_foreign_keys,
    ];
    let mut operations = Vec::new();
    for phase in phases {
        if let Some(first) = phase.first() {
            debug!(phase = %first.phase, operations = phase.len(), "Resolved phase");
        }
        operations.extend(phase);
    }

    Ok(OperationList { operations })
}

/// Foreign keys of `target` that stay in place through the drop phase but
/// would make an index drop or a column type change fail: the index is
/// the last one covering either end of the key, or the column is one of
/// its columns or referenced columns. Keyed by table key and constraint
/// name.
fn blocking_foreign_keys<'a>(
    changes: &ChangeSet,
    target: &BTreeMap<String, &'a Table>,
    name_case: NameCase,
) -> BTreeMap<(String, String), (&'a str, &'a ForeignKey)> {
    let mut dropped_indexes: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    let mut retyped: HashSet<(String, &str)> = HashSet::new();
    let mut released: HashSet<(String, &str)> = HashSet::new();
    for op in &changes.operations {
        match op {
            Operation::DropIndex { table, index } => {
                dropped_indexes
                    .entry(name_case.key(table))
                    .or_default()
                    .push(index.name.as_str());
            }
            Operation::AlterColumn { table, from, to } if from.sql_type != to.sql_type => {
                retyped.insert((name_case.key(table), from.name.as_str()));
            }
            Operation::DropForeignKey { table, foreign_key } => {
                released.insert((name_case.key(table), foreign_key.name.as_str()));
            }
            _ => {}
        }
    }

    let loses_index = |key: &str, columns: &[String]| {
        let (Some(table), Some(dropped)) = (target.get(key), dropped_indexes.get(key)) else {
            return false;
        };
        table.has_leading_index(columns, &[]) && !table.has_leading_index(columns, dropped)
    };
    let retypes = |key: &str, columns: &[String]| {
        columns
            .iter()
            .any(|c| retyped.contains(&(key.to_string(), c.as_str())))
    };

    let mut blocking = BTreeMap::new();
    for (key, &table) in target {
        for fk in &table.foreign_keys {
            if released.contains(&(key.clone(), fk.name.as_str())) {
                continue;
            }
            let referenced = name_case.key(&fk.referenced_table);
            if loses_index(key, &fk.columns)
                || loses_index(&referenced, &fk.referenced_columns)
                || retypes(key, &fk.columns)
                || retypes(&referenced, &fk.referenced_columns)
            {
                blocking.insert((key.clone(), fk.name.clone()), (table.name.as_str(), fk));
            }
        }
    }
    blocking
}

/// Verifies every operation names entities present in the snapshots.
fn check_references(
    changes: &ChangeSet,
    source: &BTreeMap<String, &Table>,
    target: &BTreeMap<String, &Table>,
    name_case: NameCase,
) -> Result<()> {
    for (index, op) in changes.operations.iter().enumerate() {
        let table = name_case.key(op.table_name());
        let table_entity = || format!("table '{}'", op.table_name());
        let missing = match op {
            Operation::CreateTable { .. } => (!source.contains_key(&table)).then(table_entity),
            Operation::DropTable { .. } => (!target.contains_key(&table)).then(table_entity),
            _ => match target.get(&table) {
                Some(tgt) => {
                    let src = source.get(&table).copied();
                    missing_entity(op, src, tgt, source, target, name_case)
                }
                None => Some(table_entity()),
            },
        };
        if let Some(entity) = missing {
            return Err(SyncError::UnresolvableReference {
                index,
                operation: op.description(),
                entity,
            });
        }
    }
    Ok(())
}

/// Returns the first entity an operation on an existing table references
/// that is missing from the side it should come from. Drops only need the
/// target; the table may be gone from the source entirely.
fn missing_entity(
    op: &Operation,
    src: Option<&Table>,
    tgt: &Table,
    source: &BTreeMap<String, &Table>,
    target: &BTreeMap<String, &Table>,
    name_case: NameCase,
) -> Option<String> {
    let column = |t: &Table, name: &str| {
        t.get_column(name)
            .is_none()
            .then(|| format!("column '{}.{}'", t.name, name))
    };
    let index = |t: &Table, name: &str| {
        t.get_index(name)
            .is_none()
            .then(|| format!("index '{}' on '{}'", name, t.name))
    };
    let foreign_key = |t: &Table, name: &str| {
        t.get_foreign_key(name)
            .is_none()
            .then(|| format!("foreign key '{}' on '{}'", name, t.name))
    };
    let referenced = |fk: &ForeignKey| {
        let key = name_case.key(&fk.referenced_table);
        (!source.contains_key(&key) && !target.contains_key(&key))
            .then(|| format!("table '{}'", fk.referenced_table))
    };

    match op {
        Operation::DropColumn { column: c, .. } => return column(tgt, &c.name),
        Operation::DropIndex { index: i, .. } => return index(tgt, &i.name),
        Operation::DropForeignKey { foreign_key: fk, .. } => return foreign_key(tgt, &fk.name),
        Operation::CreateTable { .. } | Operation::DropTable { .. } => return None,
        _ => {}
    }

    let Some(src) = src else {
        return Some(format!("table '{}'", tgt.name));
    };
    match op {
        Operation::AddColumn { column: c, .. } => column(src, &c.name),
        Operation::AlterColumn { from, to, .. } => {
            column(tgt, &from.name).or_else(|| column(src, &to.name))
        }
        Operation::CreateIndex { index: i, .. } => index(src, &i.name),
        Operation::AddForeignKey { foreign_key: fk, .. } => {
            foreign_key(src, &fk.name).or_else(|| referenced(fk))
        }
        Operation::AlterForeignKey { from, to, .. } => {
            foreign_key(tgt, &from.name).or_else(|| referenced(to))
        }
        _ => None,
    }
}

/// Kahn's algorithm over `prerequisites` (node -> nodes that must come
/// first). Ties are broken by name. Returns the order and the nodes left on
/// or behind a cycle.
fn topological_order(
    prerequisites: &BTreeMap<String, BTreeSet<String>>,
) -> (Vec<String>, BTreeSet<String>) {
    let mut in_degree: BTreeMap<&String, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&String, Vec<&String>> = BTreeMap::new();
    for (node, before) in prerequisites {
        in_degree.insert(node, before.len());
        for prerequisite in before {
            dependents.entry(prerequisite).or_default().push(node);
        }
    }

    let mut ready: BTreeSet<&String> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| *node)
        .collect();
    let mut order = Vec::new();
    while let Some(node) = ready.pop_first() {
        order.push(node.clone());
        for dependent in dependents.get(node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    let placed: HashSet<&String> = order.iter().collect();
    let leftover = prerequisites
        .keys()
        .filter(|node| !placed.contains(node))
        .cloned()
        .collect();
    (order, leftover)
}

/// Orders tables being dropped so that no table is dropped while another
/// dropped table still references it. Foreign keys between tables stuck in
/// a cycle are returned so they can be dropped up front.
fn order_dropped_tables(
    dropped: &BTreeMap<String, &Table>,
    name_case: NameCase,
) -> (Vec<String>, Vec<(String, ForeignKey)>) {
    let mut prerequisites: BTreeMap<String, BTreeSet<String>> =
        dropped.keys().map(|key| (key.clone(), BTreeSet::new())).collect();
    for (key, table) in dropped {
        for fk in &table.foreign_keys {
            let referenced = name_case.key(&fk.referenced_table);
            if referenced != *key {
                if let Some(before) = prerequisites.get_mut(&referenced) {
                    before.insert(key.clone());
                }
            }
        }
    }

    let (mut order, leftover) = topological_order(&prerequisites);
    let mut cycle_foreign_keys = Vec::new();
    for key in &leftover {
        let Some(table) = dropped.get(key) else {
            continue;
        };
        for fk in &table.foreign_keys {
            let referenced = name_case.key(&fk.referenced_table);
            if referenced != *key && leftover.contains(&referenced) {
                cycle_foreign_keys.push((table.name.clone(), fk.clone()));
            }
        }
    }
    order.extend(leftover);
    (order, cycle_foreign_keys)
}

/// Orders new tables so every referenced new table is created first.
fn order_created_tables(
    created: &BTreeMap<String, &Table>,
    name_case: NameCase,
) -> Result<Vec<String>> {
    let prerequisites: BTreeMap<String, BTreeSet<String>> = created
        .iter()
        .map(|(key, table)| {
            let before = table
                .foreign_keys
                .iter()
                .map(|fk| name_case.key(&fk.referenced_table))
                .filter(|referenced| referenced != key && created.contains_key(referenced))
                .collect();
            (key.clone(), before)
        })
        .collect();

    let (order, mut stuck) = topological_order(&prerequisites);
    if stuck.is_empty() {
        return Ok(order);
    }

    // Drop tables that merely depend on a cycle: nothing still stuck needs them.
    loop {
        let needed: BTreeSet<&String> = stuck
            .iter()
            .filter_map(|node| prerequisites.get(node))
            .flatten()
            .filter(|prerequisite| stuck.contains(*prerequisite))
            .collect();
        let unneeded: Vec<String> = stuck
            .iter()
            .filter(|node| !needed.contains(node))
            .cloned()
            .collect();
        if unneeded.is_empty() {
            break;
        }
        for node in unneeded {
            stuck.remove(&node);
        }
    }

    let mut tables: Vec<String> = stuck
        .iter()
        .filter_map(|key| created.get(key))
        .map(|table| table.name.clone())
        .collect();
    tables.sort();
    Err(SyncError::CyclicDependency { tables })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diff::diff;
    use crate::operations::OperationKind;
    use crate::schema::{Column, SqlType};

    fn table(name: &str) -> Table {
        Table::new(name)
            .column(Column::new("id", SqlType::BIGINT).not_null())
            .primary_key(["id"])
    }

    fn referencing(name: &str, referenced: &str) -> Table {
        table(name)
            .column(Column::new(format!("{}_id", referenced), SqlType::BIGINT))
            .foreign_key(ForeignKey::new(
                format!("fk_{}_{}", name, referenced),
                [format!("{}_id", referenced)],
                referenced,
                ["id"],
            ))
    }

    fn schema(tables: Vec<Table>) -> Schema {
        Schema::new(NameCase::Sensitive, tables).unwrap()
    }

    fn plan(source: &Schema, target: &Schema) -> Result<OperationList> {
        resolve(&diff(source, target)?, source, target)
    }

    fn summary(list: &OperationList) -> Vec<(OperationKind, String)> {
        list.iter()
            .map(|p| (p.operation.kind(), p.operation.table_name().to_string()))
            .collect()
    }

    #[test]
    fn test_created_tables_referenced_first() {
        let source = schema(vec![
            referencing("a_orders", "z_customers"),
            table("z_customers"),
        ]);
        let list = plan(&source, &Schema::empty()).unwrap();
        assert_eq!(
            summary(&list),
            vec![
                (OperationKind::CreateTable, "z_customers".to_string()),
                (OperationKind::CreateTable, "a_orders".to_string()),
            ]
        );
    }

    #[test]
    fn test_dropped_tables_referencing_first() {
        let target = schema(vec![
            referencing("a_orders", "z_customers"),
            table("z_customers"),
        ]);
        let reversed = schema(vec![table("a_orders"), referencing("z_customers", "a_orders")]);

        let list = plan(&Schema::empty(), &target).unwrap();
        assert_eq!(
            summary(&list),
            vec![
                (OperationKind::DropTable, "a_orders".to_string()),
                (OperationKind::DropTable, "z_customers".to_string()),
            ]
        );

        let list = plan(&Schema::empty(), &reversed).unwrap();
        assert_eq!(list.as_slice()[0].operation.table_name(), "z_customers");
        assert!(list.iter().all(|p| p.destructive));
    }

    #[test]
    fn test_mutual_references_between_new_tables_fail() {
        let source = schema(vec![referencing("a", "b"), referencing("b", "a")]);
        let err = plan(&source, &Schema::empty()).unwrap_err();
        match err {
            SyncError::CyclicDependency { tables } => assert_eq!(tables, vec!["a", "b"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cycle_report_excludes_dependents() {
        let source = schema(vec![
            referencing("a", "b"),
            referencing("b", "a"),
            referencing("c", "a"),
            table("d"),
        ]);
        let err = plan(&source, &Schema::empty()).unwrap_err();
        assert!(matches!(err, SyncError::CyclicDependency { ref tables } if tables == &["a", "b"]));
    }

    #[test]
    fn test_self_reference_stays_inline() {
        let source = schema(vec![referencing("employees", "employees")]);
        let list = plan(&source, &Schema::empty()).unwrap();
        assert_eq!(list.len(), 1);
        match &list.as_slice()[0].operation {
            Operation::CreateTable { table } => assert_eq!(table.foreign_keys.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dropped_cycle_is_broken_by_dropping_foreign_keys() {
        let target = schema(vec![referencing("a", "b"), referencing("b", "a")]);
        let list = plan(&Schema::empty(), &target).unwrap();
        assert_eq!(
            summary(&list),
            vec![
                (OperationKind::DropForeignKey, "a".to_string()),
                (OperationKind::DropForeignKey, "b".to_string()),
                (OperationKind::DropTable, "a".to_string()),
                (OperationKind::DropTable, "b".to_string()),
            ]
        );
        assert_eq!(list.as_slice()[0].phase, Phase::DropForeignKeys);
        assert!(!list.as_slice()[0].destructive);
    }

    #[test]
    fn test_inline_foreign_key_deferred_when_referenced_column_is_new() {
        let existing = Table::new("users").column(Column::new("id", SqlType::BIGINT).not_null());
        let extended = existing
            .clone()
            .column(Column::new("uuid", SqlType::Char(36)).not_null())
            .index(Index::new("uq_users_uuid", ["uuid"]).unique());
        let sessions = Table::new("sessions")
            .column(Column::new("user_uuid", SqlType::Char(36)).not_null())
            .foreign_key(ForeignKey::new("fk_sessions_user", ["user_uuid"], "users", ["uuid"]));

        let source = schema(vec![extended, sessions]);
        let target = schema(vec![existing]);
        let list = plan(&source, &target).unwrap();
        assert_eq!(
            list.iter().map(|p| p.phase).collect::<Vec<_>>(),
            vec![
                Phase::CreateTables,
                Phase::AlterColumns,
                Phase::CreateIndexes,
                Phase::AddForeignKeys
            ]
        );
        match &list.as_slice()[0].operation {
            Operation::CreateTable { table } => assert!(table.foreign_keys.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_alter_foreign_key_split_into_drop_and_add() {
        let parent = table("parent");
        let child = referencing("child", "parent");
        let mut altered = child.clone();
        altered.foreign_keys[0].on_delete = crate::schema::ForeignKeyAction::Cascade;

        let list = plan(
            &schema(vec![parent.clone(), altered]),
            &schema(vec![parent, child]),
        )
        .unwrap();
        assert_eq!(
            list.iter().map(|p| (p.operation.kind(), p.phase)).collect::<Vec<_>>(),
            vec![
                (OperationKind::DropForeignKey, Phase::AddForeignKeys),
                (OperationKind::AddForeignKey, Phase::AddForeignKeys),
            ]
        );
    }

    #[test]
    fn test_foreign_key_lifted_around_index_rebuild() {
        let customers = table("customers");
        let orders = referencing("orders", "customers");
        let unique = orders
            .clone()
            .index(Index::new("idx_customer", ["customers_id"]).unique());
        let plain = orders.index(Index::new("idx_customer", ["customers_id"]));

        let list = plan(
            &schema(vec![customers.clone(), unique]),
            &schema(vec![customers, plain]),
        )
        .unwrap();
        assert_eq!(
            list.iter().map(|p| (p.operation.kind(), p.phase)).collect::<Vec<_>>(),
            vec![
                (OperationKind::DropForeignKey, Phase::DropForeignKeys),
                (OperationKind::DropIndex, Phase::DropIndexes),
                (OperationKind::CreateIndex, Phase::CreateIndexes),
                (OperationKind::AddForeignKey, Phase::AddForeignKeys),
            ]
        );
        assert!(list.iter().all(|p| !p.destructive));
    }

    #[test]
    fn test_foreign_key_kept_when_another_index_covers_it() {
        let customers = table("customers");
        let orders = referencing("orders", "customers")
            .index(Index::new("idx_customer_created", ["customers_id", "id"]));
        let indexed = orders
            .clone()
            .index(Index::new("idx_customer", ["customers_id"]));

        let list = plan(
            &schema(vec![customers.clone(), orders]),
            &schema(vec![customers, indexed]),
        )
        .unwrap();
        assert_eq!(
            summary(&list),
            vec![(OperationKind::DropIndex, "orders".to_string())]
        );
    }

    #[test]
    fn test_inbound_foreign_key_lifted_when_referenced_index_goes() {
        let users = |index: Index| {
            table("users")
                .column(Column::new("email", SqlType::Varchar(255)).not_null())
                .index(index)
        };
        let invites = table("invites")
            .column(Column::new("email", SqlType::Varchar(255)).not_null())
            .foreign_key(ForeignKey::new("fk_invites_user", ["email"], "users", ["email"]));

        let list = plan(
            &schema(vec![users(Index::new("uq_email", ["email"]).unique()), invites.clone()]),
            &schema(vec![users(Index::new("uq_email", ["email"])), invites]),
        )
        .unwrap();
        assert_eq!(
            summary(&list),
            vec![
                (OperationKind::DropForeignKey, "invites".to_string()),
                (OperationKind::DropIndex, "users".to_string()),
                (OperationKind::CreateIndex, "users".to_string()),
                (OperationKind::AddForeignKey, "invites".to_string()),
            ]
        );
    }

    #[test]
    fn test_foreign_key_lifted_around_column_widening() {
        let narrow = |name: &str| {
            Table::new(name)
                .column(Column::new("id", SqlType::INT).not_null())
                .primary_key(["id"])
        };
        let wide = |name: &str| {
            Table::new(name)
                .column(Column::new("id", SqlType::BIGINT).not_null())
                .primary_key(["id"])
        };
        let orders = |id: SqlType| {
            wide("orders")
                .column(Column::new("customer_id", id).not_null())
                .foreign_key(ForeignKey::new(
                    "fk_orders_customer",
                    ["customer_id"],
                    "customers",
                    ["id"],
                ))
        };

        let list = plan(
            &schema(vec![wide("customers"), orders(SqlType::BIGINT)]),
            &schema(vec![narrow("customers"), orders(SqlType::INT)]),
        )
        .unwrap();
        assert_eq!(
            summary(&list),
            vec![
                (OperationKind::DropForeignKey, "orders".to_string()),
                (OperationKind::AlterColumn, "customers".to_string()),
                (OperationKind::AlterColumn, "orders".to_string()),
                (OperationKind::AddForeignKey, "orders".to_string()),
            ]
        );
    }

    #[test]
    fn test_altered_foreign_key_dropped_early_when_in_the_way() {
        let parent = table("parent");
        let child = referencing("child", "parent").index(Index::new("idx_parent", ["parent_id"]));
        let mut altered = referencing("child", "parent")
            .index(Index::new("idx_parent", ["parent_id"]).unique());
        altered.foreign_keys[0].on_delete = crate::schema::ForeignKeyAction::Cascade;

        let list = plan(
            &schema(vec![parent.clone(), altered]),
            &schema(vec![parent, child]),
        )
        .unwrap();
        assert_eq!(
            list.iter().map(|p| (p.operation.kind(), p.phase)).collect::<Vec<_>>(),
            vec![
                (OperationKind::DropForeignKey, Phase::DropForeignKeys),
                (OperationKind::DropIndex, Phase::DropIndexes),
                (OperationKind::CreateIndex, Phase::CreateIndexes),
                (OperationKind::AddForeignKey, Phase::AddForeignKeys),
            ]
        );
    }

    #[test]
    fn test_foreign_key_of_dropped_table_not_restored() {
        let users = |index: Index| {
            table("users")
                .column(Column::new("email", SqlType::Varchar(255)).not_null())
                .index(index)
        };
        let invites = table("invites")
            .column(Column::new("email", SqlType::Varchar(255)).not_null())
            .foreign_key(ForeignKey::new("fk_invites_user", ["email"], "users", ["email"]));

        let list = plan(
            &schema(vec![users(Index::new("idx_email", ["email"]))]),
            &schema(vec![users(Index::new("uq_email", ["email"]).unique()), invites]),
        )
        .unwrap();
        assert_eq!(
            summary(&list),
            vec![
                (OperationKind::DropForeignKey, "invites".to_string()),
                (OperationKind::DropIndex, "users".to_string()),
                (OperationKind::DropTable, "invites".to_string()),
                (OperationKind::CreateIndex, "users".to_string()),
            ]
        );
    }

    #[test]
    fn test_column_drop_folded_into_table_drop() {
        let target = schema(vec![table("legacy").column(Column::new("note", SqlType::Text))]);
        let changes = ChangeSet {
            operations: vec![
                Operation::DropColumn {
                    table: "legacy".to_string(),
                    column: Column::new("id", SqlType::BIGINT).not_null(),
                },
                Operation::DropTable {
                    table: target.table("legacy").unwrap().clone(),
                },
            ],
            warnings: Vec::new(),
        };
        let list = resolve(&changes, &Schema::empty(), &target).unwrap();
        assert_eq!(
            summary(&list),
            vec![(OperationKind::DropTable, "legacy".to_string())]
        );
    }

    #[test]
    fn test_unresolvable_reference() {
        let changes = ChangeSet {
            operations: vec![Operation::DropIndex {
                table: "ghost".to_string(),
                index: Index::new("idx", ["id"]),
            }],
            warnings: Vec::new(),
        };
        let err = resolve(&changes, &Schema::empty(), &Schema::empty()).unwrap_err();
        assert!(matches!(
            err,
            SyncError::UnresolvableReference { index: 0, ref entity, .. } if entity == "table 'ghost'"
        ));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::CreateIndexes.to_string(), "7. create indexes");
        assert!(Phase::DropForeignKeys < Phase::AddForeignKeys);
    }
}
