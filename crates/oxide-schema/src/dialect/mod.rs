//! DDL rendering.
//!
//! A [`Dialect`] turns each resolved operation into SQL text. Everything
//! engine specific (identifier quoting, type names, referential action
//! keywords) lives behind this trait; the diff and resolver never look at
//! it. Rendering preserves the order of the [`OperationList`] exactly.

mod mysql;

pub use mysql::MySqlDialect;

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::operations::{ColumnPosition, Operation};
use crate::resolver::OperationList;
use crate::schema::{Column, ForeignKey, ForeignKeyAction, Index, SqlType, Table};

/// Trait for database-specific SQL generation.
pub trait Dialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Quotes an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Returns the keyword for a referential action.
    fn foreign_key_action(&self, action: ForeignKeyAction) -> &'static str {
        match action {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Returns whether `ADD COLUMN` accepts `FIRST` / `AFTER`.
    fn supports_column_position(&self) -> bool;

    /// Generates SQL for an operation. Every operation maps to a single
    /// statement except [`Operation::AlterForeignKey`], which needs two.
    fn generate_sql(&self, operation: &Operation) -> Vec<String> {
        match operation {
            Operation::CreateTable { table } => vec![self.create_table(table)],
            Operation::DropTable { table } => vec![self.drop_table(&table.name)],
            Operation::AddColumn {
                table,
                column,
                position,
            } => vec![self.add_column(table, column, position)],
            Operation::DropColumn { table, column } => vec![self.drop_column(table, &column.name)],
            Operation::AlterColumn { table, to, .. } => vec![self.alter_column(table, to)],
            Operation::CreateIndex { table, index } => vec![self.create_index(table, index)],
            Operation::DropIndex { table, index } => vec![self.drop_index(table, &index.name)],
            Operation::AddForeignKey { table, foreign_key } => {
                vec![self.add_foreign_key(table, foreign_key)]
            }
            Operation::DropForeignKey { table, foreign_key } => {
                vec![self.drop_foreign_key(table, &foreign_key.name)]
            }
            Operation::AlterForeignKey { table, from, to } => vec![
                self.drop_foreign_key(table, &from.name),
                self.add_foreign_key(table, to),
            ],
        }
    }

    /// Generates column definition SQL.
    fn column_definition(&self, column: &Column) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(&column.sql_type),
        ];
        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default.to_sql()));
        }
        if column.auto_increment {
            parts.push("AUTO_INCREMENT".to_string());
        }
        if let Some(on_update) = &column.on_update {
            parts.push(format!("ON UPDATE {}", on_update));
        }
        if let Some(comment) = &column.comment {
            parts.push(format!("COMMENT {}", quote_string(comment)));
        }
        parts.join(" ")
    }

    /// Quotes and joins a column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates the body of a foreign key constraint.
    fn foreign_key_clause(&self, fk: &ForeignKey) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.quote_identifier(&fk.name),
            self.column_list(&fk.columns),
            self.quote_identifier(&fk.referenced_table),
            self.column_list(&fk.referenced_columns),
            self.foreign_key_action(fk.on_delete),
            self.foreign_key_action(fk.on_update)
        )
    }

    /// Generates SQL for creating a table with its keys inline.
    fn create_table(&self, table: &Table) -> String {
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        if let Some(primary_key) = &table.primary_key {
            lines.push(format!("PRIMARY KEY ({})", self.column_list(primary_key)));
        }
        for index in &table.indexes {
            lines.push(format!(
                "{}KEY {} ({})",
                if index.unique { "UNIQUE " } else { "" },
                self.quote_identifier(&index.name),
                self.column_list(&index.columns)
            ));
        }
        for fk in &table.foreign_keys {
            lines.push(self.foreign_key_clause(fk));
        }
        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(&table.name),
            lines.join(",\n  ")
        )
    }

    /// Generates SQL for dropping a table.
    fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(name))
    }

    /// Generates SQL for adding a column.
    fn add_column(&self, table: &str, column: &Column, position: &ColumnPosition) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        );
        if self.supports_column_position() {
            match position {
                ColumnPosition::First => sql.push_str(" FIRST"),
                ColumnPosition::After(previous) => {
                    sql.push_str(" AFTER ");
                    sql.push_str(&self.quote_identifier(previous));
                }
                ColumnPosition::Last => {}
            }
        }
        sql
    }

    /// Generates SQL for dropping a column.
    fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Generates SQL for redefining a column.
    fn alter_column(&self, table: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )
    }

    /// Generates SQL for creating an index.
    fn create_index(&self, table: &str, index: &Index) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            self.column_list(&index.columns)
        )
    }

    /// Generates SQL for dropping an index.
    fn drop_index(&self, table: &str, name: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }

    /// Generates SQL for adding a foreign key.
    fn add_foreign_key(&self, table: &str, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_clause(fk)
        )
    }

    /// Generates SQL for dropping a foreign key.
    fn drop_foreign_key(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )
    }
}

/// Quotes a string literal, escaping backslashes and doubling single quotes.
#[must_use]
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Renders each operation to SQL, in order, without terminators.
pub fn render(operations: &OperationList, dialect: &impl Dialect) -> Vec<String> {
    operations
        .iter()
        .flat_map(|planned| dialect.generate_sql(&planned.operation))
        .collect()
}

/// Identifies the databases a script was generated for.
#[derive(Debug, Clone)]
pub struct ScriptHeader {
    /// Source database identifier.
    pub source: String,
    /// Target database identifier.
    pub target: String,
    /// Generation time.
    pub generated_at: DateTime<Utc>,
}

impl ScriptHeader {
    /// Creates a header stamped with the current time.
    #[must_use]
    pub fn now(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            generated_at: Utc::now(),
        }
    }
}

/// Renders the complete script: a comment header, then one
/// `;`-terminated statement per operation.
pub fn render_script(
    operations: &OperationList,
    dialect: &impl Dialect,
    header: &ScriptHeader,
) -> String {
    let destructive = operations.destructive().count();
    let mut script = String::new();
    let _ = writeln!(script, "-- Schema synchronization script");
    let _ = writeln!(script, "-- Source: {}", header.source);
    let _ = writeln!(script, "-- Target: {}", header.target);
    let _ = writeln!(
        script,
        "-- Generated: {}",
        header.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(script, "-- Dialect: {}", dialect.name());
    let _ = writeln!(
        script,
        "-- Operations: {} ({} destructive)",
        operations.len(),
        destructive
    );

    if operations.is_empty() {
        let _ = writeln!(script, "\n-- No structural differences found.");
        return script;
    }

    for planned in operations {
        script.push('\n');
        let _ = writeln!(
            script,
            "-- [{}] {}",
            planned.phase,
            planned.operation.description()
        );
        if let Some(reason) = &planned.reason {
            let _ = writeln!(script, "-- DESTRUCTIVE: {}", reason);
        }
        for statement in dialect.generate_sql(&planned.operation) {
            let _ = writeln!(script, "{};", statement);
        }
    }
    script
}
