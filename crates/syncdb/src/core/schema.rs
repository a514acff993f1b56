//! Schema types for tables and columns.
//!
//! Every dialect translates its native column metadata into these types, and
//! the planner and copier only ever look at the canonical form. Column order is
//! significant: it follows the source table's physical order.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Dialect-neutral column type used as the pivot for cross-dialect mapping.
///
/// ```text
/// SQLite INTEGER  ->  BigInt  ->  MySQL BIGINT
/// MySQL tinyint(1) -> Boolean ->  PostgreSQL BOOLEAN
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalType {
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    BigInt,
    /// Single precision floating point.
    Float,
    /// Double precision floating point.
    Double,
    /// Unbounded character data.
    Text,
    /// Bounded character data with a maximum length.
    Varchar(u32),
    /// True/false.
    Boolean,
    /// Date and time without timezone.
    DateTime,
    /// Date only.
    Date,
    /// Binary data.
    Blob,
    /// Exact decimal. A precision of 0 means the source declared no precision.
    Decimal { precision: u16, scale: u16 },
    /// A native type with no canonical equivalent. Keeps the native name for
    /// error messages.
    Unknown(String),
}

impl CanonicalType {
    /// Whether the type is one of the integer types.
    pub fn is_integer(&self) -> bool {
        matches!(self, CanonicalType::Integer | CanonicalType::BigInt)
    }

    /// Whether values of this type are character data.
    pub fn is_textual(&self) -> bool {
        matches!(self, CanonicalType::Text | CanonicalType::Varchar(_))
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalType::Integer => write!(f, "integer"),
            CanonicalType::BigInt => write!(f, "bigint"),
            CanonicalType::Float => write!(f, "float"),
            CanonicalType::Double => write!(f, "double"),
            CanonicalType::Text => write!(f, "text"),
            CanonicalType::Varchar(n) => write!(f, "varchar({})", n),
            CanonicalType::Boolean => write!(f, "boolean"),
            CanonicalType::DateTime => write!(f, "datetime"),
            CanonicalType::Date => write!(f, "date"),
            CanonicalType::Blob => write!(f, "blob"),
            CanonicalType::Decimal { precision, scale } => {
                write!(f, "decimal({},{})", precision, scale)
            }
            CanonicalType::Unknown(name) => write!(f, "{}", name),
        }
    }
}

/// Extra metadata a dialect may use when resolving a native type.
///
/// Network dialects report length and precision in separate catalog columns;
/// SQLite reports a boolean emulated through `CHECK (col IN (0, 1))`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeHints {
    /// Character maximum length, when reported separately from the type name.
    pub max_length: Option<u32>,
    /// Numeric precision.
    pub precision: Option<u16>,
    /// Numeric scale.
    pub scale: Option<u16>,
    /// The column is constrained to the values 0 and 1.
    pub boolean_check: bool,
}

impl TypeHints {
    /// Hints carrying only the 0/1 check flag.
    pub fn boolean_check(flag: bool) -> Self {
        Self {
            boolean_check: flag,
            ..Self::default()
        }
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name, unique within its table.
    pub name: String,

    /// Canonical column type.
    pub canonical_type: CanonicalType,

    /// Type name as reported by the database that owns the column.
    pub native_type: String,

    /// Whether the column accepts NULL.
    pub nullable: bool,

    /// Whether the column is the table's designated primary key.
    pub is_primary_key: bool,
}

impl ColumnDefinition {
    /// Create a nullable, non-key column.
    pub fn new(name: impl Into<String>, canonical_type: CanonicalType) -> Self {
        let native_type = canonical_type.to_string();
        Self {
            name: name.into(),
            canonical_type,
            native_type,
            nullable: true,
            is_primary_key: false,
        }
    }

    /// Set the native type name.
    pub fn with_native_type(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = native_type.into();
        self
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark the column as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Columns in physical order.
    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    /// Build a table schema.
    ///
    /// A table needs at least one column and unique column names. When more
    /// than one column carries the primary key flag the flags are cleared:
    /// only single-column keys are tracked.
    pub fn new(name: impl Into<String>, mut columns: Vec<ColumnDefinition>) -> Result<Self> {
        let name = name.into();

        if columns.is_empty() {
            return Err(SyncError::Introspection(format!(
                "table {} has no columns",
                name
            )));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(SyncError::Introspection(format!(
                    "table {} has duplicate column {}",
                    name, col.name
                )));
            }
        }

        if columns.iter().filter(|c| c.is_primary_key).count() > 1 {
            for col in &mut columns {
                col.is_primary_key = false;
            }
        }

        Ok(Self { name, columns })
    }

    /// The designated primary key column, if the table has exactly one.
    pub fn primary_key(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    /// Look up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Split a native type like `DECIMAL(10, 2) UNSIGNED` into its lowercase base
/// name (`decimal`) and numeric parameters (`[10, 2]`).
///
/// Modifiers after the parameter list are dropped. Parameters that are not
/// numbers (enum labels) are ignored.
pub fn split_native_type(native: &str) -> (String, Vec<u32>) {
    let lower = native.trim().to_lowercase();
    match (lower.find('('), lower.rfind(')')) {
        (Some(open), Some(close)) if close > open => {
            let base = lower[..open].trim().to_string();
            let params = lower[open + 1..close]
                .split(',')
                .filter_map(|p| p.trim().parse::<u32>().ok())
                .collect();
            (base, params)
        }
        _ => (lower, Vec::new()),
    }
}
