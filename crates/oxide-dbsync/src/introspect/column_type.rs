//! Parsing of `information_schema.COLUMNS` text into the schema model.
//!
//! MySQL and MariaDB disagree on how they spell the same thing: MariaDB
//! quotes string defaults and reports `NULL` as text, MySQL 8 hides display
//! widths and marks expression defaults with `DEFAULT_GENERATED`. Everything
//! here normalizes to one spelling so equal columns compare equal across
//! servers.

use std::iter::Peekable;
use std::str::Chars;

use oxide_schema::schema::{DefaultValue, SqlType};

/// Parses a `COLUMN_TYPE` value such as `int(10) unsigned` or
/// `enum('a','b')`.
pub fn parse_column_type(raw: &str) -> SqlType {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    let open = lower.find('(');
    let close = lower.rfind(')');

    let (base, args, modifiers) = match (open, close) {
        (Some(open), Some(close)) if close > open => {
            (&lower[..open], Some(&raw[open + 1..close]), &lower[close + 1..])
        }
        _ => match lower.split_once(' ') {
            Some((base, rest)) => (base, None, rest),
            None => (lower.as_str(), None, ""),
        },
    };
    let base = base.trim();
    let mut unsigned = false;
    for modifier in modifiers.split_whitespace() {
        match modifier {
            "unsigned" => unsigned = true,
            "signed" => {}
            _ => return custom(raw),
        }
    }

    let parsed = match base {
        "tinyint" if args == Some("1") && !unsigned => Some(SqlType::Boolean),
        "tinyint" => Some(SqlType::TinyInt { unsigned }),
        "smallint" => Some(SqlType::SmallInt { unsigned }),
        "mediumint" => Some(SqlType::MediumInt { unsigned }),
        "int" | "integer" => Some(SqlType::Integer { unsigned }),
        "bigint" => Some(SqlType::BigInt { unsigned }),
        _ if unsigned => None,
        "bool" | "boolean" => Some(SqlType::Boolean),
        "decimal" | "numeric" | "dec" | "fixed" => decimal(args),
        "float" if args.is_none() => Some(SqlType::Float),
        "double" | "real" if args.is_none() => Some(SqlType::Double),
        "char" => length(args, 1).map(SqlType::Char),
        "varchar" => args.and_then(|a| a.trim().parse().ok()).map(SqlType::Varchar),
        "binary" => length(args, 1).map(SqlType::Binary),
        "varbinary" => args.and_then(|a| a.trim().parse().ok()).map(SqlType::VarBinary),
        "tinytext" => Some(SqlType::TinyText),
        "text" => Some(SqlType::Text),
        "mediumtext" => Some(SqlType::MediumText),
        "longtext" => Some(SqlType::LongText),
        "tinyblob" => Some(SqlType::TinyBlob),
        "blob" => Some(SqlType::Blob),
        "mediumblob" => Some(SqlType::MediumBlob),
        "longblob" => Some(SqlType::LongBlob),
        "date" => Some(SqlType::Date),
        // Fractional-second precision has no model variant.
        "time" | "datetime" | "timestamp" if args.is_some() => None,
        "time" => Some(SqlType::Time),
        "datetime" => Some(SqlType::DateTime),
        "timestamp" => Some(SqlType::Timestamp),
        "year" => Some(SqlType::Year),
        "json" => Some(SqlType::Json),
        "uuid" => Some(SqlType::Uuid),
        "enum" => args.map(|a| SqlType::Enum(parse_members(a))),
        "set" => args.map(|a| SqlType::Set(parse_members(a))),
        _ => None,
    };
    parsed.unwrap_or_else(|| custom(raw))
}

fn custom(raw: &str) -> SqlType {
    SqlType::Custom(raw.to_ascii_uppercase())
}

fn length(args: Option<&str>, default: u32) -> Option<u32> {
    match args {
        Some(a) => a.trim().parse().ok(),
        None => Some(default),
    }
}

fn decimal(args: Option<&str>) -> Option<SqlType> {
    let Some(args) = args else {
        return Some(SqlType::Decimal(10, 0));
    };
    let (precision, scale) = match args.split_once(',') {
        Some((p, s)) => (p.trim().parse().ok()?, s.trim().parse().ok()?),
        None => (args.trim().parse().ok()?, 0),
    };
    Some(SqlType::Decimal(precision, scale))
}

/// Splits `'a','it''s'` into its members.
fn parse_members(args: &str) -> Vec<String> {
    let mut members = Vec::new();
    let mut chars = args.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            members.push(read_quoted(&mut chars));
        }
    }
    members
}

/// Reads a quoted literal up to its closing quote, which has already been
/// opened. Handles doubled quotes and backslash escapes.
fn read_quoted(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut literal = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                literal.push('\'');
            }
            '\'' => break,
            '\\' => match chars.next() {
                Some('n') => literal.push('\n'),
                Some('r') => literal.push('\r'),
                Some('t') => literal.push('\t'),
                Some('0') => literal.push('\0'),
                Some(escaped) => literal.push(escaped),
                None => {}
            },
            _ => literal.push(c),
        }
    }
    literal
}

/// Flags found in the `EXTRA` column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnExtra {
    /// `auto_increment`.
    pub auto_increment: bool,
    /// Normalized `ON UPDATE` expression.
    pub on_update: Option<String>,
    /// MySQL 8 marks expression defaults with `DEFAULT_GENERATED`.
    pub default_generated: bool,
}

/// Parses an `EXTRA` value such as
/// `DEFAULT_GENERATED on update CURRENT_TIMESTAMP`.
pub fn parse_extra(raw: &str) -> ColumnExtra {
    let lower = raw.to_ascii_lowercase();
    let on_update = lower.find("on update ").map(|at| {
        let expr = raw[at + "on update ".len()..]
            .split_whitespace()
            .next()
            .unwrap_or_default();
        normalize_timestamp(expr).unwrap_or_else(|| expr.to_string())
    });
    ColumnExtra {
        auto_increment: lower.contains("auto_increment"),
        on_update,
        default_generated: lower.contains("default_generated"),
    }
}

/// Maps every spelling of the current-timestamp function to
/// `CURRENT_TIMESTAMP` (keeping any precision).
fn normalize_timestamp(expr: &str) -> Option<String> {
    let lower = expr.trim().to_ascii_lowercase();
    let (name, args) = match lower.split_once('(') {
        Some((name, rest)) => (name, rest.trim_end_matches(')')),
        None => (lower.as_str(), ""),
    };
    match name {
        "current_timestamp" | "now" | "localtimestamp" | "localtime" => {
            if args.is_empty() {
                Some("CURRENT_TIMESTAMP".to_string())
            } else {
                Some(format!("CURRENT_TIMESTAMP({})", args))
            }
        }
        _ => None,
    }
}

/// Parses a `COLUMN_DEFAULT` value.
///
/// `mariadb` selects MariaDB's convention of reporting defaults as SQL
/// literals; MySQL reports the raw value.
pub fn parse_default(
    raw: Option<&str>,
    sql_type: &SqlType,
    extra: &ColumnExtra,
    mariadb: bool,
) -> Option<DefaultValue> {
    let raw = raw?;
    if let Some(expr) = normalize_timestamp(raw) {
        return Some(DefaultValue::Expression(expr));
    }

    if mariadb {
        if raw.eq_ignore_ascii_case("null") {
            return None;
        }
        if let Some(quoted) = raw.strip_prefix('\'').filter(|r| r.ends_with('\'')) {
            return Some(DefaultValue::String(read_quoted(&mut quoted.chars().peekable())));
        }
        if let Some(number) = literal_number(raw, sql_type) {
            return Some(number);
        }
        if is_bit_literal(raw) {
            return Some(DefaultValue::Expression(raw.to_string()));
        }
        return Some(DefaultValue::Expression(format!("({})", raw)));
    }

    if extra.default_generated {
        return Some(DefaultValue::Expression(format!("({})", raw)));
    }
    if let Some(number) = literal_number(raw, sql_type) {
        return Some(number);
    }
    match sql_type {
        SqlType::Custom(_) if is_bit_literal(raw) => Some(DefaultValue::Expression(raw.to_string())),
        _ => Some(DefaultValue::String(raw.to_string())),
    }
}

fn is_bit_literal(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.starts_with("b'") || lower.starts_with("x'") || lower.starts_with("0x")
}

/// Numeric defaults of numeric columns. Integers keep their value, other
/// numbers keep their exact text.
fn literal_number(raw: &str, sql_type: &SqlType) -> Option<DefaultValue> {
    match sql_type {
        SqlType::TinyInt { .. }
        | SqlType::SmallInt { .. }
        | SqlType::MediumInt { .. }
        | SqlType::Integer { .. }
        | SqlType::BigInt { .. }
        | SqlType::Boolean
        | SqlType::Year => raw.parse().ok().map(DefaultValue::Integer),
        SqlType::Decimal(..) | SqlType::Float | SqlType::Double => raw
            .parse::<f64>()
            .ok()
            .map(|_| DefaultValue::Expression(raw.to_string())),
        _ => None,
    }
}
