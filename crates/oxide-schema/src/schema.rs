//! Schema representation types.
//!
//! These types describe the structure of a database (tables, columns,
//! indexes and foreign keys) independently of the connection that produced
//! them. A [`Schema`] is an immutable snapshot: it can only be obtained
//! through validated construction, and nothing in this crate mutates one.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// SQL data types of the MySQL/MariaDB family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// 8-bit integer.
    TinyInt {
        /// Whether the column is UNSIGNED.
        unsigned: bool,
    },
    /// 16-bit integer.
    SmallInt {
        /// Whether the column is UNSIGNED.
        unsigned: bool,
    },
    /// 24-bit integer.
    MediumInt {
        /// Whether the column is UNSIGNED.
        unsigned: bool,
    },
    /// 32-bit integer.
    Integer {
        /// Whether the column is UNSIGNED.
        unsigned: bool,
    },
    /// 64-bit integer.
    BigInt {
        /// Whether the column is UNSIGNED.
        unsigned: bool,
    },
    /// Boolean (stored as a 1-digit TINYINT).
    Boolean,
    /// Fixed-point number with precision and scale.
    Decimal(u8, u8),
    /// Single-precision floating point.
    Float,
    /// Double-precision floating point.
    Double,
    /// Fixed-length character string.
    Char(u32),
    /// Variable-length character string.
    Varchar(u32),
    /// Text up to 255 bytes.
    TinyText,
    /// Text up to 64 KiB.
    Text,
    /// Text up to 16 MiB.
    MediumText,
    /// Text up to 4 GiB.
    LongText,
    /// Fixed-length binary string.
    Binary(u32),
    /// Variable-length binary string.
    VarBinary(u32),
    /// Blob up to 255 bytes.
    TinyBlob,
    /// Blob up to 64 KiB.
    Blob,
    /// Blob up to 16 MiB.
    MediumBlob,
    /// Blob up to 4 GiB.
    LongBlob,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time.
    DateTime,
    /// Timestamp (UTC-converted date and time).
    Timestamp,
    /// Year.
    Year,
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
    /// Enumeration of allowed string values.
    Enum(Vec<String>),
    /// Set of allowed string values.
    Set(Vec<String>),
    /// Any type the model has no dedicated variant for, kept verbatim.
    Custom(String),
}

/// Coarse grouping of types used to decide whether a change loses data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Integer { rank: u8, unsigned: bool },
    Decimal { precision: u8, scale: u8 },
    Float { double: bool },
    Text { capacity: u64 },
    Binary { capacity: u64 },
    Temporal,
    Members,
    Other,
}

impl SqlType {
    /// Signed 32-bit integer.
    pub const INT: Self = Self::Integer { unsigned: false };
    /// Signed 64-bit integer.
    pub const BIGINT: Self = Self::BigInt { unsigned: false };
    /// Signed 16-bit integer.
    pub const SMALLINT: Self = Self::SmallInt { unsigned: false };
    /// Signed 8-bit integer.
    pub const TINYINT: Self = Self::TinyInt { unsigned: false };

    fn family(&self) -> Family {
        match self {
            Self::Boolean => Family::Integer {
                rank: 0,
                unsigned: false,
            },
            Self::TinyInt { unsigned } => Family::Integer {
                rank: 1,
                unsigned: *unsigned,
            },
            Self::SmallInt { unsigned } => Family::Integer {
                rank: 2,
                unsigned: *unsigned,
            },
            Self::MediumInt { unsigned } => Family::Integer {
                rank: 3,
                unsigned: *unsigned,
            },
            Self::Integer { unsigned } => Family::Integer {
                rank: 4,
                unsigned: *unsigned,
            },
            Self::BigInt { unsigned } => Family::Integer {
                rank: 5,
                unsigned: *unsigned,
            },
            Self::Decimal(precision, scale) => Family::Decimal {
                precision: *precision,
                scale: *scale,
            },
            Self::Float => Family::Float { double: false },
            Self::Double => Family::Float { double: true },
            Self::Char(n) | Self::Varchar(n) => Family::Text {
                capacity: u64::from(*n),
            },
            Self::TinyText => Family::Text { capacity: 255 },
            Self::Text => Family::Text { capacity: 65_535 },
            Self::MediumText => Family::Text {
                capacity: 16_777_215,
            },
            Self::LongText => Family::Text {
                capacity: 4_294_967_295,
            },
            Self::Binary(n) | Self::VarBinary(n) => Family::Binary {
                capacity: u64::from(*n),
            },
            Self::TinyBlob => Family::Binary { capacity: 255 },
            Self::Blob => Family::Binary { capacity: 65_535 },
            Self::MediumBlob => Family::Binary {
                capacity: 16_777_215,
            },
            Self::LongBlob => Family::Binary {
                capacity: 4_294_967_295,
            },
            Self::Date | Self::Time | Self::DateTime | Self::Timestamp | Self::Year => {
                Family::Temporal
            }
            Self::Enum(_) | Self::Set(_) => Family::Members,
            Self::Json | Self::Uuid | Self::Custom(_) => Family::Other,
        }
    }

    /// Returns `true` if converting a column from `self` to `to` can lose or
    /// reject existing values.
    ///
    /// Changes between unrelated type families are treated as narrowing.
    #[must_use]
    pub fn is_narrowing_to(&self, to: &Self) -> bool {
        if self == to {
            return false;
        }
        match (self.family(), to.family()) {
            (
                Family::Integer {
                    rank: from_rank,
                    unsigned: from_unsigned,
                },
                Family::Integer {
                    rank: to_rank,
                    unsigned: to_unsigned,
                },
            ) => match (from_unsigned, to_unsigned) {
                // Negative values are lost.
                (false, true) => true,
                // The top half of the unsigned range needs a wider type.
                (true, false) => to_rank <= from_rank,
                _ => to_rank < from_rank,
            },
            (Family::Integer { rank, unsigned }, Family::Decimal { precision, scale }) => {
                integer_digits(rank, unsigned) > precision.saturating_sub(scale)
            }
            (Family::Integer { rank, .. }, Family::Float { double }) => {
                // FLOAT holds 24 significand bits, DOUBLE 53.
                if double {
                    rank >= 5
                } else {
                    rank >= 4
                }
            }
            (
                Family::Decimal {
                    precision: from_precision,
                    scale: from_scale,
                },
                Family::Decimal {
                    precision: to_precision,
                    scale: to_scale,
                },
            ) => {
                to_scale < from_scale
                    || to_precision.saturating_sub(to_scale)
                        < from_precision.saturating_sub(from_scale)
            }
            (Family::Float { double: from }, Family::Float { double: to }) => from && !to,
            (Family::Text { capacity: from }, Family::Text { capacity: to })
            | (Family::Binary { capacity: from }, Family::Binary { capacity: to }) => to < from,
            (Family::Temporal, Family::Temporal) => !matches!(
                (self, to),
                (Self::Date, Self::DateTime | Self::Timestamp)
                    | (Self::Timestamp, Self::DateTime)
            ),
            (Family::Members, Family::Members) => match (self, to) {
                (Self::Enum(from), Self::Enum(to)) | (Self::Set(from), Self::Set(to)) => {
                    from.iter().any(|value| !to.contains(value))
                }
                _ => true,
            },
            _ => true,
        }
    }
}

/// Maximum decimal digits of an integer type by rank.
fn integer_digits(rank: u8, unsigned: bool) -> u8 {
    match (rank, unsigned) {
        (0, _) => 1,
        (1, _) => 3,
        (2, _) => 5,
        (3, false) => 7,
        (3, true) => 8,
        (4, _) => 10,
        (_, false) => 19,
        (_, true) => 20,
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unsigned_suffix = |unsigned: &bool| if *unsigned { " UNSIGNED" } else { "" };
        match self {
            Self::TinyInt { unsigned } => write!(f, "TINYINT{}", unsigned_suffix(unsigned)),
            Self::SmallInt { unsigned } => write!(f, "SMALLINT{}", unsigned_suffix(unsigned)),
            Self::MediumInt { unsigned } => write!(f, "MEDIUMINT{}", unsigned_suffix(unsigned)),
            Self::Integer { unsigned } => write!(f, "INT{}", unsigned_suffix(unsigned)),
            Self::BigInt { unsigned } => write!(f, "BIGINT{}", unsigned_suffix(unsigned)),
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::Decimal(p, s) => write!(f, "DECIMAL({}, {})", p, s),
            Self::Float => f.write_str("FLOAT"),
            Self::Double => f.write_str("DOUBLE"),
            Self::Char(n) => write!(f, "CHAR({})", n),
            Self::Varchar(n) => write!(f, "VARCHAR({})", n),
            Self::TinyText => f.write_str("TINYTEXT"),
            Self::Text => f.write_str("TEXT"),
            Self::MediumText => f.write_str("MEDIUMTEXT"),
            Self::LongText => f.write_str("LONGTEXT"),
            Self::Binary(n) => write!(f, "BINARY({})", n),
            Self::VarBinary(n) => write!(f, "VARBINARY({})", n),
            Self::TinyBlob => f.write_str("TINYBLOB"),
            Self::Blob => f.write_str("BLOB"),
            Self::MediumBlob => f.write_str("MEDIUMBLOB"),
            Self::LongBlob => f.write_str("LONGBLOB"),
            Self::Date => f.write_str("DATE"),
            Self::Time => f.write_str("TIME"),
            Self::DateTime => f.write_str("DATETIME"),
            Self::Timestamp => f.write_str("TIMESTAMP"),
            Self::Year => f.write_str("YEAR"),
            Self::Json => f.write_str("JSON"),
            Self::Uuid => f.write_str("UUID"),
            Self::Enum(values) => write!(f, "ENUM({})", values.join(", ")),
            Self::Set(values) => write!(f, "SET({})", values.join(", ")),
            Self::Custom(raw) => f.write_str(raw),
        }
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => crate::dialect::quote_string(s),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// SQL data type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Default value; `None` means no DEFAULT clause.
    #[serde(default)]
    pub default: Option<DefaultValue>,
    /// Whether this column auto-increments.
    #[serde(default)]
    pub auto_increment: bool,
    /// ON UPDATE expression (e.g. `CURRENT_TIMESTAMP`).
    #[serde(default)]
    pub on_update: Option<String>,
    /// Column comment.
    #[serde(default)]
    pub comment: Option<String>,
}

impl Column {
    /// Creates a new nullable column without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: None,
            auto_increment: false,
            on_update: None,
            comment: None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the ON UPDATE expression.
    #[must_use]
    pub fn on_update(mut self, expr: impl Into<String>) -> Self {
        self.on_update = Some(expr.into());
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Columns included in the index, in order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    /// Creates a new non-unique index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Returns `true` if both indexes cover the same columns with the same
    /// uniqueness, regardless of name.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.columns == other.columns && self.unique == other.unique
    }
}

/// Schema definition for a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub referenced_table: String,
    /// Referenced column(s).
    pub referenced_columns: Vec<String>,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    /// Creates a foreign key with `NO ACTION` on delete and update.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        referenced_table: impl Into<String>,
        referenced_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            referenced_table: referenced_table.into(),
            referenced_columns: referenced_columns.into_iter().map(Into::into).collect(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }
}

/// Complete schema definition for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Column definitions, in declaration order.
    pub columns: Vec<Column>,
    /// Primary key column(s), if the table has one.
    #[serde(default)]
    pub primary_key: Option<Vec<String>>,
    /// Secondary index definitions.
    #[serde(default)]
    pub indexes: Vec<Index>,
    /// Foreign key definitions.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Creates a new empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.primary_key = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the position of a column.
    #[must_use]
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Gets an index by name.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Gets a foreign key by constraint name.
    #[must_use]
    pub fn get_foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }

    /// Returns `true` if the primary key or an index not named in `excluding`
    /// starts with `columns`. InnoDB needs such an index on both ends of a
    /// foreign key.
    #[must_use]
    pub fn has_leading_index(&self, columns: &[String], excluding: &[&str]) -> bool {
        self.primary_key
            .as_ref()
            .is_some_and(|pk| pk.starts_with(columns))
            || self
                .indexes
                .iter()
                .any(|i| !excluding.contains(&i.name.as_str()) && i.columns.starts_with(columns))
    }

    /// Checks the invariants that only involve this table.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        if let Some(primary_key) = &self.primary_key {
            self.check_columns("primary key", primary_key)?;
        }

        let mut index_names = HashSet::new();
        for index in &self.indexes {
            if !index_names.insert(index.name.as_str()) {
                return Err(SchemaError::DuplicateIndex {
                    table: self.name.clone(),
                    index: index.name.clone(),
                });
            }
            self.check_columns(&format!("index '{}'", index.name), &index.columns)?;
        }

        let mut fk_names = HashSet::new();
        for fk in &self.foreign_keys {
            if !fk_names.insert(fk.name.as_str()) {
                return Err(SchemaError::DuplicateForeignKey {
                    table: self.name.clone(),
                    foreign_key: fk.name.clone(),
                });
            }
            self.check_columns(&format!("foreign key '{}'", fk.name), &fk.columns)?;
            if fk.columns.len() != fk.referenced_columns.len() {
                return Err(SchemaError::ColumnCountMismatch {
                    table: self.name.clone(),
                    foreign_key: fk.name.clone(),
                    local: fk.columns.len(),
                    referenced: fk.referenced_columns.len(),
                });
            }
        }

        Ok(())
    }

    fn check_columns(&self, owner: &str, columns: &[String]) -> Result<(), SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::EmptyColumnList {
                table: self.name.clone(),
                owner: owner.to_string(),
            });
        }
        match columns.iter().find(|c| self.get_column(c).is_none()) {
            Some(missing) => Err(SchemaError::UnknownColumn {
                table: self.name.clone(),
                owner: owner.to_string(),
                column: missing.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// How table names are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NameCase {
    /// Names match only when byte-identical.
    #[default]
    Sensitive,
    /// Names match ignoring ASCII case.
    Insensitive,
}

impl NameCase {
    /// Returns the lookup key for a table name.
    #[must_use]
    pub fn key(self, name: &str) -> String {
        match self {
            Self::Sensitive => name.to_string(),
            Self::Insensitive => name.to_ascii_lowercase(),
        }
    }

    /// Returns the policy to use when comparing two snapshots: insensitive
    /// wins, since a case-insensitive server cannot hold both spellings.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        if self == Self::Insensitive || other == Self::Insensitive {
            Self::Insensitive
        } else {
            Self::Sensitive
        }
    }
}

/// A foreign key whose referenced table or column is absent from its snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingReference {
    /// Table owning the foreign key.
    pub table: String,
    /// Constraint name.
    pub foreign_key: String,
    /// Referenced table.
    pub referenced_table: String,
    /// Missing referenced column, when the table itself exists.
    pub column: Option<String>,
}

impl From<DanglingReference> for SchemaError {
    fn from(dangling: DanglingReference) -> Self {
        Self::DanglingReference {
            table: dangling.table,
            foreign_key: dangling.foreign_key,
            referenced_table: dangling.referenced_table,
            column: dangling.column,
        }
    }
}

/// An immutable, validated snapshot of a database schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef", into = "SchemaDef")]
pub struct Schema {
    name_case: NameCase,
    tables: BTreeMap<String, Table>,
}

/// Serialized form of a [`Schema`].
#[derive(Serialize, Deserialize)]
struct SchemaDef {
    #[serde(default)]
    name_case: NameCase,
    tables: Vec<Table>,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = SchemaError;

    fn try_from(def: SchemaDef) -> Result<Self, Self::Error> {
        Self::new(def.name_case, def.tables)
    }
}

impl From<Schema> for SchemaDef {
    fn from(schema: Schema) -> Self {
        Self {
            name_case: schema.name_case,
            tables: schema.tables.into_values().collect(),
        }
    }
}

impl Schema {
    /// Builds a schema, validating every table.
    ///
    /// Foreign keys pointing outside the snapshot are accepted here; see
    /// [`Schema::dangling_references`].
    pub fn new(
        name_case: NameCase,
        tables: impl IntoIterator<Item = Table>,
    ) -> Result<Self, SchemaError> {
        let mut map = BTreeMap::new();
        for table in tables {
            table.validate()?;
            let key = name_case.key(&table.name);
            if map.contains_key(&key) {
                return Err(SchemaError::DuplicateTable { table: table.name });
            }
            map.insert(key, table);
        }
        Ok(Self {
            name_case,
            tables: map,
        })
    }

    /// Creates an empty schema.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts building a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Returns the table-name comparison policy.
    #[must_use]
    pub fn name_case(&self) -> NameCase {
        self.name_case
    }

    /// Gets a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&self.name_case.key(name))
    }

    /// Returns `true` if the schema contains the table.
    #[must_use]
    pub fn contains_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Iterates tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Returns table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.values().map(|t| t.name.as_str())
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if the schema has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Lists foreign keys whose referenced table or columns are missing.
    ///
    /// Partial introspection can legitimately produce these, so they are
    /// reported rather than rejected at construction.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        for table in self.tables.values() {
            for fk in &table.foreign_keys {
                let missing = match self.table(&fk.referenced_table) {
                    None => Some(None),
                    Some(referenced) => fk
                        .referenced_columns
                        .iter()
                        .find(|c| referenced.get_column(c).is_none())
                        .map(|c| Some(c.clone())),
                };
                if let Some(column) = missing {
                    dangling.push(DanglingReference {
                        table: table.name.clone(),
                        foreign_key: fk.name.clone(),
                        referenced_table: fk.referenced_table.clone(),
                        column,
                    });
                }
            }
        }
        dangling
    }

    /// Fails on the first dangling foreign-key reference.
    pub fn validate_references(&self) -> Result<(), SchemaError> {
        match self.dangling_references().into_iter().next() {
            Some(dangling) => Err(dangling.into()),
            None => Ok(()),
        }
    }
}

/// Incremental constructor for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    name_case: NameCase,
    tables: Vec<Table>,
}

impl SchemaBuilder {
    /// Sets the table-name comparison policy.
    #[must_use]
    pub fn name_case(mut self, name_case: NameCase) -> Self {
        self.name_case = name_case;
        self
    }

    /// Adds a table.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Validates and builds the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        Schema::new(self.name_case, self.tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
            .column(Column::new("name", SqlType::Varchar(255)).not_null())
            .column(Column::new("email", SqlType::Varchar(255)))
            .primary_key(["id"])
    }

    #[test]
    fn test_table_builder() {
        let table = users();
        assert_eq!(table.name, "users");
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.primary_key, Some(vec!["id".to_string()]));
        assert_eq!(table.column_position("email"), Some(2));
        assert!(table.get_column("missing").is_none());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let table = users().column(Column::new("name", SqlType::Text));
        let err = Schema::new(NameCase::Sensitive, [table]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn { ref column, .. } if column == "name"));
    }

    #[test]
    fn test_unknown_primary_key_column_rejected() {
        let table = Table::new("t")
            .column(Column::new("a", SqlType::INT))
            .primary_key(["b"]);
        let err = Schema::new(NameCase::Sensitive, [table]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownColumn {
                table: "t".to_string(),
                owner: "primary key".to_string(),
                column: "b".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_index_column_rejected() {
        let table = users().index(Index::new("idx_phone", ["phone"]));
        let err = Schema::builder().table(table).build().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownColumn { ref owner, .. } if owner == "index 'idx_phone'"));
    }

    #[test]
    fn test_foreign_key_column_count_mismatch() {
        let table = Table::new("orders")
            .column(Column::new("user_id", SqlType::BIGINT))
            .foreign_key(ForeignKey::new("fk", ["user_id"], "users", ["id", "name"]));
        let err = Schema::builder().table(table).build().unwrap_err();
        assert!(matches!(err, SchemaError::ColumnCountMismatch { local: 1, referenced: 2, .. }));
    }

    #[test]
    fn test_duplicate_table_case_insensitive() {
        let err = Schema::builder()
            .name_case(NameCase::Insensitive)
            .table(users())
            .table(Table::new("USERS").column(Column::new("id", SqlType::INT)))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateTable { .. }));

        let schema = Schema::builder()
            .table(users())
            .table(Table::new("USERS").column(Column::new("id", SqlType::INT)))
            .build()
            .unwrap();
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn test_lookup_respects_name_case() {
        let schema = Schema::builder()
            .name_case(NameCase::Insensitive)
            .table(users())
            .build()
            .unwrap();
        assert!(schema.table("Users").is_some());
        assert!(schema.table("accounts").is_none());
    }

    #[test]
    fn test_dangling_references_are_flagged_not_rejected() {
        let orders = Table::new("orders")
            .column(Column::new("id", SqlType::BIGINT))
            .column(Column::new("user_id", SqlType::BIGINT))
            .foreign_key(ForeignKey::new("fk_user", ["user_id"], "users", ["id"]));
        let schema = Schema::builder().table(orders).build().unwrap();

        let dangling = schema.dangling_references();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].referenced_table, "users");
        assert_eq!(dangling[0].column, None);
        assert!(matches!(
            schema.validate_references(),
            Err(SchemaError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_missing_referenced_column_is_dangling() {
        let orders = Table::new("orders")
            .column(Column::new("user_id", SqlType::BIGINT))
            .foreign_key(ForeignKey::new("fk_user", ["user_id"], "users", ["uuid"]));
        let schema = Schema::builder().table(users()).table(orders).build().unwrap();
        let dangling = schema.dangling_references();
        assert_eq!(dangling[0].column.as_deref(), Some("uuid"));
    }

    #[test]
    fn test_integer_narrowing() {
        assert!(SqlType::BIGINT.is_narrowing_to(&SqlType::INT));
        assert!(!SqlType::INT.is_narrowing_to(&SqlType::BIGINT));
        assert!(SqlType::INT.is_narrowing_to(&SqlType::Integer { unsigned: true }));
        assert!(SqlType::Integer { unsigned: true }.is_narrowing_to(&SqlType::INT));
        assert!(!SqlType::Integer { unsigned: true }.is_narrowing_to(&SqlType::BIGINT));
        assert!(!SqlType::Boolean.is_narrowing_to(&SqlType::TINYINT));
    }

    #[test]
    fn test_string_and_decimal_narrowing() {
        assert!(SqlType::Varchar(255).is_narrowing_to(&SqlType::Varchar(100)));
        assert!(!SqlType::Varchar(100).is_narrowing_to(&SqlType::Text));
        assert!(SqlType::Text.is_narrowing_to(&SqlType::Varchar(255)));
        assert!(!SqlType::Char(10).is_narrowing_to(&SqlType::Varchar(10)));
        assert!(SqlType::Decimal(10, 2).is_narrowing_to(&SqlType::Decimal(10, 1)));
        assert!(SqlType::Decimal(10, 2).is_narrowing_to(&SqlType::Decimal(8, 2)));
        assert!(!SqlType::Decimal(10, 2).is_narrowing_to(&SqlType::Decimal(12, 3)));
        assert!(!SqlType::INT.is_narrowing_to(&SqlType::Decimal(12, 2)));
        assert!(SqlType::Double.is_narrowing_to(&SqlType::Float));
    }

    #[test]
    fn test_enum_and_cross_family_narrowing() {
        let abc = SqlType::Enum(vec!["a".into(), "b".into(), "c".into()]);
        let ab = SqlType::Enum(vec!["a".into(), "b".into()]);
        assert!(abc.is_narrowing_to(&ab));
        assert!(!ab.is_narrowing_to(&abc));
        assert!(SqlType::Varchar(36).is_narrowing_to(&SqlType::Uuid));
        assert!(!SqlType::Date.is_narrowing_to(&SqlType::DateTime));
        assert!(SqlType::DateTime.is_narrowing_to(&SqlType::Date));
        assert!(!SqlType::Json.is_narrowing_to(&SqlType::Json));
    }

    #[test]
    fn test_default_value_to_sql() {
        assert_eq!(DefaultValue::Null.to_sql(), "NULL");
        assert_eq!(DefaultValue::Integer(42).to_sql(), "42");
        assert_eq!(DefaultValue::String("it's".to_string()).to_sql(), "'it''s'");
        assert_eq!(
            DefaultValue::Expression("CURRENT_TIMESTAMP".to_string()).to_sql(),
            "CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_schema_deserialization_is_validated() {
        let json = r#"{"tables":[{"name":"t","columns":[{"name":"a","sql_type":"Json","nullable":true}],"primary_key":["missing"]}]}"#;
        let result: Result<Schema, _> = serde_json::from_str(json);
        assert!(result.is_err());

        let json = r#"{"name_case":"Insensitive","tables":[{"name":"t","columns":[{"name":"a","sql_type":"Json","nullable":true}]}]}"#;
        let schema: Schema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.name_case(), NameCase::Insensitive);
        assert!(schema.table("T").is_some());
    }
}
