//! Schema diff engine.
//!
//! Compares a `source` snapshot (the desired structure) with a `target`
//! snapshot (the database to update) and produces the unordered
//! [`ChangeSet`] that turns the target into the source. Ordering is the
//! resolver's job; this stage is a pure function of its two inputs.
//!
//! Identity rules:
//!
//! - tables and columns are matched by name only, so a rename shows up as
//!   a drop plus an add;
//! - indexes are matched by `(columns, unique)`, since their names are
//!   often generated;
//! - foreign keys are matched by `(columns, referenced table, referenced
//!   columns)`; a matched pair with different actions is an
//!   [`Operation::AlterForeignKey`].
//!
//! Retained indexes and foreign keys keep the name they have in the target.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::error::Result;
use crate::operations::{ChangeSet, ColumnPosition, DiffWarning, Operation};
use crate::schema::{ForeignKey, Index, NameCase, Schema, Table};

/// Computes the changes that turn `target` into `source`.
///
/// Both snapshots must be free of dangling foreign-key references.
pub fn diff(source: &Schema, target: &Schema) -> Result<ChangeSet> {
    source.validate_references()?;
    target.validate_references()?;

    let name_case = source.name_case().combine(target.name_case());
    let source_tables = keyed(source, name_case);
    let target_tables = keyed(target, name_case);
    let keys: BTreeSet<&String> = source_tables.keys().chain(target_tables.keys()).collect();

    let mut changes = ChangeSet::default();
    for key in keys {
        match (source_tables.get(key), target_tables.get(key)) {
            (Some(source_table), None) => changes.operations.push(Operation::CreateTable {
                table: (*source_table).clone(),
            }),
            (None, Some(target_table)) => changes.operations.push(Operation::DropTable {
                table: (*target_table).clone(),
            }),
            (Some(source_table), Some(target_table)) => {
                diff_table(source_table, target_table, name_case, &mut changes);
            }
            (None, None) => {}
        }
    }

    debug!(
        operations = changes.operations.len(),
        warnings = changes.warnings.len(),
        "Computed schema diff"
    );
    Ok(changes)
}

pub(crate) fn keyed(schema: &Schema, name_case: NameCase) -> BTreeMap<String, &Table> {
    schema
        .tables()
        .map(|table| (name_case.key(&table.name), table))
        .collect()
}

/// Diffs a table present in both snapshots. Operations are addressed by the
/// target's spelling of the table name.
fn diff_table(source: &Table, target: &Table, name_case: NameCase, changes: &mut ChangeSet) {
    let table = target.name.clone();

    if source.primary_key != target.primary_key {
        changes.warnings.push(DiffWarning::PrimaryKeyChanged {
            table: table.clone(),
            from: target.primary_key.clone(),
            to: source.primary_key.clone(),
        });
    }

    diff_columns(&table, source, target, changes);

    let indexes = pair_up(&source.indexes, &target.indexes, |i| &i.name, Index::same_key);
    for index in indexes.dropped {
        changes.operations.push(Operation::DropIndex {
            table: table.clone(),
            index: index.clone(),
        });
    }
    for index in indexes.created {
        changes.operations.push(Operation::CreateIndex {
            table: table.clone(),
            index: index.clone(),
        });
    }

    let same_reference = |a: &ForeignKey, b: &ForeignKey| {
        a.columns == b.columns
            && a.referenced_columns == b.referenced_columns
            && name_case.key(&a.referenced_table) == name_case.key(&b.referenced_table)
    };
    let foreign_keys = pair_up(
        &source.foreign_keys,
        &target.foreign_keys,
        |fk| &fk.name,
        same_reference,
    );
    for fk in foreign_keys.dropped {
        changes.operations.push(Operation::DropForeignKey {
            table: table.clone(),
            foreign_key: fk.clone(),
        });
    }
    for fk in foreign_keys.created {
        changes.operations.push(Operation::AddForeignKey {
            table: table.clone(),
            foreign_key: fk.clone(),
        });
    }
    for (source_fk, target_fk) in foreign_keys.matched {
        if source_fk.on_delete != target_fk.on_delete || source_fk.on_update != target_fk.on_update
        {
            let mut to = source_fk.clone();
            to.name = target_fk.name.clone();
            to.referenced_table = target_fk.referenced_table.clone();
            changes.operations.push(Operation::AlterForeignKey {
                table: table.clone(),
                from: target_fk.clone(),
                to,
            });
        }
    }
}

fn diff_columns(table: &str, source: &Table, target: &Table, changes: &mut ChangeSet) {
    for (position, column) in source.columns.iter().enumerate() {
        match target.get_column(&column.name) {
            None => {
                let position = match position.checked_sub(1) {
                    Some(previous) => ColumnPosition::After(source.columns[previous].name.clone()),
                    None => ColumnPosition::First,
                };
                changes.operations.push(Operation::AddColumn {
                    table: table.to_string(),
                    column: column.clone(),
                    position,
                });
            }
            Some(existing) if existing != column => {
                changes.operations.push(Operation::AlterColumn {
                    table: table.to_string(),
                    from: existing.clone(),
                    to: column.clone(),
                });
            }
            Some(_) => {}
        }
    }

    for column in &target.columns {
        if source.get_column(&column.name).is_none() {
            changes.operations.push(Operation::DropColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }
    }

    let shared: HashSet<&str> = source
        .columns
        .iter()
        .filter(|c| target.get_column(&c.name).is_some())
        .map(|c| c.name.as_str())
        .collect();
    let order = |t: &Table| -> Vec<String> {
        t.columns
            .iter()
            .filter(|c| shared.contains(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect()
    };
    let old_order = order(target);
    let new_order = order(source);
    if old_order != new_order {
        changes.warnings.push(DiffWarning::ColumnOrderChanged {
            table: table.to_string(),
            old_order,
            new_order,
        });
    }
}

/// Outcome of matching two lists of keyed objects.
struct Pairing<'a, T> {
    /// `(source, target)` pairs describing the same object.
    matched: Vec<(&'a T, &'a T)>,
    /// Source objects with no counterpart.
    created: Vec<&'a T>,
    /// Target objects with no counterpart.
    dropped: Vec<&'a T>,
}

/// Matches source objects to target objects by key.
///
/// Pairs with identical names are preferred, then any object with the same
/// key. A retained target object whose name is claimed by a created object
/// is recreated instead, since both cannot coexist under one name.
fn pair_up<'a, T>(
    source: &'a [T],
    target: &'a [T],
    name: impl Fn(&T) -> &String,
    same_key: impl Fn(&T, &T) -> bool,
) -> Pairing<'a, T> {
    let mut partner: Vec<Option<usize>> = vec![None; source.len()];
    let mut taken = vec![false; target.len()];

    for (i, s) in source.iter().enumerate() {
        let found = target
            .iter()
            .enumerate()
            .position(|(j, t)| !taken[j] && name(s) == name(t) && same_key(s, t));
        if let Some(j) = found {
            partner[i] = Some(j);
            taken[j] = true;
        }
    }
    for (i, s) in source.iter().enumerate() {
        if partner[i].is_some() {
            continue;
        }
        let found = target
            .iter()
            .enumerate()
            .position(|(j, t)| !taken[j] && same_key(s, t));
        if let Some(j) = found {
            partner[i] = Some(j);
            taken[j] = true;
        }
    }

    loop {
        let claimed: HashSet<&String> = source
            .iter()
            .zip(&partner)
            .filter(|(_, p)| p.is_none())
            .map(|(s, _)| name(s))
            .collect();
        let clash = partner
            .iter()
            .position(|p| matches!(p, Some(j) if claimed.contains(name(&target[*j]))));
        match clash {
            Some(i) => {
                if let Some(j) = partner[i].take() {
                    taken[j] = false;
                }
            }
            None => break,
        }
    }

    let mut matched = Vec::new();
    let mut created = Vec::new();
    for (s, p) in source.iter().zip(&partner) {
        match p {
            Some(j) => matched.push((s, &target[*j])),
            None => created.push(s),
        }
    }
    let dropped = target
        .iter()
        .zip(&taken)
        .filter(|(_, t)| !**t)
        .map(|(t, _)| t)
        .collect();

    Pairing {
        matched,
        created,
        dropped,
    }
}
