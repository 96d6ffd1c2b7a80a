//! End-to-end planning.
//!
//! [`plan`] runs the whole pipeline for two snapshots: diff, resolve,
//! replay the result against the target to prove every step is applicable,
//! and summarize. A plan that comes back `Ok` renders to a script that
//! turns the target into the source.

use serde::Serialize;
use tracing::{debug, info};

use crate::dialect::{render, render_script, Dialect, ScriptHeader};
use crate::diff::diff;
use crate::error::{Result, SyncError};
use crate::operations::ChangeSet;
use crate::report::ValidationReport;
use crate::resolver::{resolve, OperationList};
use crate::schema::Schema;
use crate::state::SchemaState;

/// The outcome of planning a synchronization.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Unordered differences, including warnings.
    pub changes: ChangeSet,
    /// Ordered operations to execute against the target.
    pub operations: OperationList,
    /// Summary of the operations.
    pub report: ValidationReport,
}

impl Plan {
    /// Returns `true` if the schemas are already in sync.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Renders one statement per operation, without terminators.
    pub fn statements(&self, dialect: &impl Dialect) -> Vec<String> {
        render(&self.operations, dialect)
    }

    /// Renders the full script with its header.
    pub fn script(&self, dialect: &impl Dialect, header: &ScriptHeader) -> String {
        render_script(&self.operations, dialect, header)
    }
}

/// Plans the changes that bring `target` in line with `source`.
pub fn plan(source: &Schema, target: &Schema) -> Result<Plan> {
    let changes = diff(source, target)?;
    let operations = resolve(&changes, source, target)?;

    let name_case = source.name_case().combine(target.name_case());
    let mut state = SchemaState::new(target).with_name_case(name_case);
    state.apply_all(&operations)?;
    let reached = state.into_schema()?;
    let remaining = diff(source, &reached)?.len();
    if remaining > 0 {
        return Err(SyncError::Divergence { remaining });
    }
    debug!("Replayed plan against target without violations");

    let report = ValidationReport::new(&operations, &changes.warnings);
    info!(
        operations = report.total,
        destructive = report.destructive.len(),
        warnings = report.warnings.len(),
        "Planned schema synchronization"
    );

    Ok(Plan {
        changes,
        operations,
        report,
    })
}
