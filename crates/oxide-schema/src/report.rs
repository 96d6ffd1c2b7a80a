//! Validation report.
//!
//! A read-only summary of what a plan will do, grouped by destructiveness
//! and by table. Building it never touches the operation list.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::operations::{DiffWarning, OperationKind};
use crate::resolver::{OperationList, Phase};

/// One operation as it appears in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Position in the operation list.
    pub index: usize,
    /// Execution phase.
    pub phase: Phase,
    /// Operation kind.
    pub kind: OperationKind,
    /// Table the operation changes.
    pub table: String,
    /// Human-readable description.
    pub description: String,
    /// Why the operation needs confirmation, if it does.
    pub reason: Option<String>,
}

/// Per-table counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    /// Operations touching the table.
    pub operations: usize,
    /// How many of them are destructive.
    pub destructive: usize,
}

/// Summary of a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Number of operations.
    pub total: usize,
    /// Operations that can lose or reject data.
    pub destructive: Vec<ReportEntry>,
    /// Everything else.
    pub safe: Vec<ReportEntry>,
    /// Counts per table.
    pub tables: BTreeMap<String, TableSummary>,
    /// Differences not handled by the script.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Builds the report for an operation list.
    #[must_use]
    pub fn new(operations: &OperationList, warnings: &[DiffWarning]) -> Self {
        let mut report = Self {
            total: operations.len(),
            warnings: warnings.iter().map(ToString::to_string).collect(),
            ..Self::default()
        };

        for (index, planned) in operations.iter().enumerate() {
            let table = planned.operation.table_name().to_string();
            let entry = ReportEntry {
                index,
                phase: planned.phase,
                kind: planned.operation.kind(),
                table: table.clone(),
                description: planned.operation.description(),
                reason: planned.reason.as_ref().map(ToString::to_string),
            };

            let summary = report.tables.entry(table).or_default();
            summary.operations += 1;
            if planned.destructive {
                summary.destructive += 1;
                report.destructive.push(entry);
            } else {
                report.safe.push(entry);
            }
        }
        report
    }

    /// Returns `true` if the plan should not run without explicit
    /// confirmation.
    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        !self.destructive.is_empty()
    }

    /// Returns `true` if the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            writeln!(f, "Schemas are in sync; no operations needed.")?;
        } else {
            writeln!(
                f,
                "{} operation(s): {} safe, {} destructive",
                self.total,
                self.safe.len(),
                self.destructive.len()
            )?;
        }

        if !self.destructive.is_empty() {
            writeln!(f, "\nDestructive operations (require confirmation):")?;
            for entry in &self.destructive {
                write!(f, "  #{} {}", entry.index + 1, entry.description)?;
                if let Some(reason) = &entry.reason {
                    write!(f, " ({})", reason)?;
                }
                writeln!(f)?;
            }
        }

        if !self.safe.is_empty() {
            writeln!(f, "\nSafe operations:")?;
            for entry in &self.safe {
                writeln!(f, "  #{} {}", entry.index + 1, entry.description)?;
            }
        }

        if !self.tables.is_empty() {
            writeln!(f, "\nBy table:")?;
            for (table, summary) in &self.tables {
                writeln!(
                    f,
                    "  {}: {} operation(s), {} destructive",
                    table, summary.operations, summary.destructive
                )?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "\nWarnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  {}", warning)?;
            }
        }
        Ok(())
    }
}
