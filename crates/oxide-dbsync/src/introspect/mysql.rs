//! Live MySQL/MariaDB introspection through `information_schema`.

use std::collections::BTreeMap;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::{debug, info, warn};

use oxide_schema::schema::{
    Column, ForeignKey, ForeignKeyAction, Index, NameCase, Schema, Table,
};

use crate::config::DatabaseConfig;
use crate::error::IntrospectError;

use super::column_type::{parse_column_type, parse_default, parse_extra};

const TABLES_SQL: &str = r#"
SELECT CAST(TABLE_NAME AS CHAR)
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME
"#;

const COLUMNS_SQL: &str = r#"
SELECT CAST(TABLE_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR),
       CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_DEFAULT AS CHAR), CAST(EXTRA AS CHAR),
       CAST(COLUMN_COMMENT AS CHAR)
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = ?
ORDER BY TABLE_NAME, ORDINAL_POSITION
"#;

const STATISTICS_SQL: &str = r#"
SELECT CAST(TABLE_NAME AS CHAR), CAST(INDEX_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR),
       CAST(NON_UNIQUE AS SIGNED)
FROM information_schema.STATISTICS
WHERE TABLE_SCHEMA = ?
ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX
"#;

const FOREIGN_KEYS_SQL: &str = r#"
SELECT CAST(k.TABLE_NAME AS CHAR), CAST(k.CONSTRAINT_NAME AS CHAR), CAST(k.COLUMN_NAME AS CHAR),
       CAST(k.REFERENCED_TABLE_SCHEMA AS CHAR), CAST(k.REFERENCED_TABLE_NAME AS CHAR),
       CAST(k.REFERENCED_COLUMN_NAME AS CHAR),
       CAST(r.DELETE_RULE AS CHAR), CAST(r.UPDATE_RULE AS CHAR)
FROM information_schema.KEY_COLUMN_USAGE k
JOIN information_schema.REFERENTIAL_CONSTRAINTS r
  ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA
 AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
 AND r.TABLE_NAME = k.TABLE_NAME
WHERE k.TABLE_SCHEMA = ? AND k.REFERENCED_TABLE_NAME IS NOT NULL
ORDER BY k.TABLE_NAME, k.CONSTRAINT_NAME, k.ORDINAL_POSITION
"#;

/// One row of `information_schema.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub table: String,
    pub name: String,
    pub column_type: String,
    pub is_nullable: String,
    pub default: Option<String>,
    pub extra: String,
    pub comment: String,
}

/// One row of `information_schema.STATISTICS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub table: String,
    pub index: String,
    /// `None` for functional key parts.
    pub column: Option<String>,
    pub non_unique: i64,
}

/// One column of a foreign key, from `KEY_COLUMN_USAGE` joined with
/// `REFERENTIAL_CONSTRAINTS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRow {
    pub table: String,
    pub constraint: String,
    pub column: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub delete_rule: String,
    pub update_rule: String,
}

/// Catalog rows for one database.
#[derive(Debug, Clone, Default)]
pub struct CatalogRows {
    pub database: String,
    pub name_case: NameCase,
    pub mariadb: bool,
    pub tables: Vec<String>,
    pub columns: Vec<ColumnRow>,
    pub indexes: Vec<IndexRow>,
    pub foreign_keys: Vec<ForeignKeyRow>,
}

/// Reads schema snapshots from a live server.
pub struct MySqlIntrospector {
    pool: MySqlPool,
    database: String,
    display_name: String,
}

impl MySqlIntrospector {
    /// Connects to the database described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, IntrospectError> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|source| IntrospectError::Connection {
                database: config.display_name(),
                source,
            })?;
        debug!(database = %config.display_name(), "Connected");

        Ok(Self {
            pool,
            database: config.database.clone(),
            display_name: config.display_name(),
        })
    }

    /// Reads the full catalog and builds a validated snapshot.
    pub async fn introspect(&self) -> Result<Schema, IntrospectError> {
        let rows = self.read_catalog().await?;
        let schema = assemble(rows)?;
        info!(
            database = %self.display_name,
            tables = schema.len(),
            "Introspected schema"
        );
        Ok(schema)
    }

    /// Closes the connection pool.
    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn read_catalog(&self) -> Result<CatalogRows, IntrospectError> {
        let failed = |table: &'static str| {
            move |source| IntrospectError::Introspection { table, source }
        };

        let (lower_case_table_names,): (i64,) =
            sqlx::query_as("SELECT CAST(@@lower_case_table_names AS SIGNED)")
                .fetch_one(&self.pool)
                .await
                .map_err(failed("@@lower_case_table_names"))?;
        let (version,): (String,) = sqlx::query_as("SELECT CAST(VERSION() AS CHAR)")
            .fetch_one(&self.pool)
            .await
            .map_err(failed("VERSION()"))?;

        let tables: Vec<(String,)> = sqlx::query_as(TABLES_SQL)
            .bind(&self.database)
            .fetch_all(&self.pool)
            .await
            .map_err(failed("TABLES"))?;

        #[allow(clippy::type_complexity)]
        let columns: Vec<(String, String, String, String, Option<String>, String, String)> =
            sqlx::query_as(COLUMNS_SQL)
                .bind(&self.database)
                .fetch_all(&self.pool)
                .await
                .map_err(failed("COLUMNS"))?;

        let indexes: Vec<(String, String, Option<String>, i64)> = sqlx::query_as(STATISTICS_SQL)
            .bind(&self.database)
            .fetch_all(&self.pool)
            .await
            .map_err(failed("STATISTICS"))?;

        #[allow(clippy::type_complexity)]
        let foreign_keys: Vec<(String, String, String, String, String, String, String, String)> =
            sqlx::query_as(FOREIGN_KEYS_SQL)
                .bind(&self.database)
                .fetch_all(&self.pool)
                .await
                .map_err(failed("KEY_COLUMN_USAGE"))?;

        debug!(
            database = %self.display_name,
            %version,
            tables = tables.len(),
            columns = columns.len(),
            "Read catalog"
        );

        Ok(CatalogRows {
            database: self.database.clone(),
            name_case: if lower_case_table_names == 0 {
                NameCase::Sensitive
            } else {
                NameCase::Insensitive
            },
            mariadb: version.to_ascii_lowercase().contains("mariadb"),
            tables: tables.into_iter().map(|(name,)| name).collect(),
            columns: columns
                .into_iter()
                .map(
                    |(table, name, column_type, is_nullable, default, extra, comment)| ColumnRow {
                        table,
                        name,
                        column_type,
                        is_nullable,
                        default,
                        extra,
                        comment,
                    },
                )
                .collect(),
            indexes: indexes
                .into_iter()
                .map(|(table, index, column, non_unique)| IndexRow {
                    table,
                    index,
                    column,
                    non_unique,
                })
                .collect(),
            foreign_keys: foreign_keys
                .into_iter()
                .map(
                    |(
                        table,
                        constraint,
                        column,
                        referenced_schema,
                        referenced_table,
                        referenced_column,
                        delete_rule,
                        update_rule,
                    )| ForeignKeyRow {
                        table,
                        constraint,
                        column,
                        referenced_schema,
                        referenced_table,
                        referenced_column,
                        delete_rule,
                        update_rule,
                    },
                )
                .collect(),
        })
    }
}

/// Parses a `DELETE_RULE` / `UPDATE_RULE` value.
pub fn parse_rule(rule: &str) -> ForeignKeyAction {
    match rule.to_ascii_uppercase().as_str() {
        "CASCADE" => ForeignKeyAction::Cascade,
        "SET NULL" => ForeignKeyAction::SetNull,
        "SET DEFAULT" => ForeignKeyAction::SetDefault,
        "RESTRICT" => ForeignKeyAction::Restrict,
        _ => ForeignKeyAction::NoAction,
    }
}

/// Builds a snapshot from catalog rows.
///
/// Rows for tables missing from `rows.tables` (views, tables created
/// between queries) are ignored. Functional indexes and foreign keys into
/// other databases have no model representation and are skipped with a
/// warning.
pub fn assemble(rows: CatalogRows) -> Result<Schema, IntrospectError> {
    let mut tables: BTreeMap<String, Table> = rows
        .tables
        .iter()
        .map(|name| (name.clone(), Table::new(name.clone())))
        .collect();

    for row in rows.columns {
        let Some(table) = tables.remove(&row.table) else {
            continue;
        };
        let sql_type = parse_column_type(&row.column_type);
        let extra = parse_extra(&row.extra);
        let mut column = Column::new(row.name, sql_type.clone());
        if row.is_nullable.eq_ignore_ascii_case("NO") {
            column = column.not_null();
        }
        column.default = parse_default(row.default.as_deref(), &sql_type, &extra, rows.mariadb);
        column.auto_increment = extra.auto_increment;
        column.on_update = extra.on_update;
        if !row.comment.is_empty() {
            column.comment = Some(row.comment);
        }
        tables.insert(row.table, table.column(column));
    }

    let mut indexes: Vec<(String, String, bool, Option<Vec<String>>)> = Vec::new();
    for row in rows.indexes {
        let same = indexes
            .last()
            .is_some_and(|(t, i, _, _)| *t == row.table && *i == row.index);
        if !same {
            indexes.push((
                row.table.clone(),
                row.index.clone(),
                row.non_unique == 0,
                Some(Vec::new()),
            ));
        }
        if let Some((_, _, _, columns)) = indexes.last_mut() {
            match row.column {
                Some(column) => {
                    if let Some(columns) = columns {
                        columns.push(column);
                    }
                }
                None => *columns = None,
            }
        }
    }
    for (table_name, index_name, unique, columns) in indexes {
        let Some(table) = tables.remove(&table_name) else {
            continue;
        };
        let table = match columns {
            None => {
                warn!(table = %table_name, index = %index_name, "Skipping functional index");
                table
            }
            Some(columns) if index_name == "PRIMARY" => table.primary_key(columns),
            Some(columns) => {
                let index = Index::new(index_name, columns);
                table.index(if unique { index.unique() } else { index })
            }
        };
        tables.insert(table_name, table);
    }

    let mut foreign_keys: Vec<(String, ForeignKeyRow, Vec<String>, Vec<String>)> = Vec::new();
    for row in rows.foreign_keys {
        let same = foreign_keys
            .last()
            .is_some_and(|(t, fk, _, _)| *t == row.table && fk.constraint == row.constraint);
        if same {
            if let Some((_, _, columns, referenced)) = foreign_keys.last_mut() {
                columns.push(row.column);
                referenced.push(row.referenced_column);
            }
        } else {
            let columns = vec![row.column.clone()];
            let referenced = vec![row.referenced_column.clone()];
            foreign_keys.push((row.table.clone(), row, columns, referenced));
        }
    }
    for (table_name, first, columns, referenced) in foreign_keys {
        if first.referenced_schema != rows.database {
            warn!(
                table = %table_name,
                foreign_key = %first.constraint,
                referenced_schema = %first.referenced_schema,
                "Skipping foreign key into another database"
            );
            continue;
        }
        let Some(table) = tables.remove(&table_name) else {
            continue;
        };
        let fk = ForeignKey::new(first.constraint, columns, first.referenced_table, referenced)
            .on_delete(parse_rule(&first.delete_rule))
            .on_update(parse_rule(&first.update_rule));
        tables.insert(table_name, table.foreign_key(fk));
    }

    let schema = Schema::new(rows.name_case, tables.into_values())?;
    schema.validate_references()?;
    Ok(schema)
}
