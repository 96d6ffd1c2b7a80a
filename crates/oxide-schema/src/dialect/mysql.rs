//! MySQL and MariaDB dialect.
//!
//! Both engines share one syntax family; the differences that matter for
//! DDL (native UUID support, quoting under `ANSI_QUOTES`) are captured as
//! configuration rather than separate implementations.

use std::collections::HashMap;

use crate::schema::SqlType;

use super::{quote_string, Dialect};

/// Server flavor of the MySQL family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    MySql,
    MariaDb,
}

/// Formatting table for the MySQL family.
#[derive(Debug, Clone)]
pub struct MySqlDialect {
    flavor: Flavor,
    ansi_quotes: bool,
    type_names: HashMap<SqlType, String>,
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::mysql()
    }
}

impl MySqlDialect {
    /// Creates the MySQL dialect.
    #[must_use]
    pub fn mysql() -> Self {
        Self {
            flavor: Flavor::MySql,
            ansi_quotes: false,
            type_names: HashMap::new(),
        }
    }

    /// Creates the MariaDB dialect.
    #[must_use]
    pub fn mariadb() -> Self {
        Self {
            flavor: Flavor::MariaDb,
            ..Self::mysql()
        }
    }

    /// Quotes identifiers with double quotes, for servers running with
    /// `sql_mode=ANSI_QUOTES`.
    #[must_use]
    pub fn with_ansi_quotes(mut self) -> Self {
        self.ansi_quotes = true;
        self
    }

    /// Overrides the rendered name of a type.
    #[must_use]
    pub fn with_type_name(mut self, sql_type: SqlType, name: impl Into<String>) -> Self {
        self.type_names.insert(sql_type, name.into());
        self
    }
}

fn with_sign(name: &str, unsigned: bool) -> String {
    if unsigned {
        format!("{} UNSIGNED", name)
    } else {
        name.to_string()
    }
}

fn member_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| quote_string(v))
        .collect::<Vec<_>>()
        .join(",")
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        match self.flavor {
            Flavor::MySql => "mysql",
            Flavor::MariaDb => "mariadb",
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        if self.ansi_quotes {
            format!("\"{}\"", name.replace('"', "\"\""))
        } else {
            format!("`{}`", name.replace('`', "``"))
        }
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        if let Some(name) = self.type_names.get(sql_type) {
            return name.clone();
        }
        match sql_type {
            SqlType::TinyInt { unsigned } => with_sign("TINYINT", *unsigned),
            SqlType::SmallInt { unsigned } => with_sign("SMALLINT", *unsigned),
            SqlType::MediumInt { unsigned } => with_sign("MEDIUMINT", *unsigned),
            SqlType::Integer { unsigned } => with_sign("INT", *unsigned),
            SqlType::BigInt { unsigned } => with_sign("BIGINT", *unsigned),
            SqlType::Boolean => "TINYINT(1)".to_string(),
            SqlType::Decimal(p, s) => format!("DECIMAL({},{})", p, s),
            SqlType::Float => "FLOAT".to_string(),
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Char(n) => format!("CHAR({})", n),
            SqlType::Varchar(n) => format!("VARCHAR({})", n),
            SqlType::TinyText => "TINYTEXT".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::MediumText => "MEDIUMTEXT".to_string(),
            SqlType::LongText => "LONGTEXT".to_string(),
            SqlType::Binary(n) => format!("BINARY({})", n),
            SqlType::VarBinary(n) => format!("VARBINARY({})", n),
            SqlType::TinyBlob => "TINYBLOB".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::MediumBlob => "MEDIUMBLOB".to_string(),
            SqlType::LongBlob => "LONGBLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Year => "YEAR".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Uuid => match self.flavor {
                // MySQL has no native UUID type.
                Flavor::MySql => "CHAR(36)".to_string(),
                Flavor::MariaDb => "UUID".to_string(),
            },
            SqlType::Enum(values) => format!("ENUM({})", member_list(values)),
            SqlType::Set(values) => format!("SET({})", member_list(values)),
            SqlType::Custom(raw) => raw.clone(),
        }
    }

    fn supports_column_position(&self) -> bool {
        true
    }
}
