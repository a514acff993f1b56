//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Native types are identified by `udt_name` (`int4`, `varchar`, `timestamptz`).
//! Parameters are always bound as text and cast server-side to the target
//! column's type, so one encoding path serves every column type.

use crate::config::DialectKind;
use crate::core::identifier::quote_double;
use crate::core::schema::{ColumnDefinition, CanonicalType, TypeHints};
use crate::core::traits::{Dialect, TypeMapping};
use crate::error::{Result, SyncError};

/// Largest declarable VARCHAR length.
const MAX_VARCHAR: u32 = 10_485_760;

/// Largest declarable NUMERIC precision.
const MAX_NUMERIC_PRECISION: u16 = 1_000;

/// Native types the reader decodes directly; anything else is selected as text.
const DECODABLE_TYPES: &[&str] = &[
    "bool",
    "int2",
    "int4",
    "int8",
    "float4",
    "float8",
    "numeric",
    "text",
    "varchar",
    "bpchar",
    "name",
    "timestamp",
    "timestamptz",
    "date",
    "bytea",
    "uuid",
    "json",
    "jsonb",
];

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgresql"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Postgresql
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_double(name)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn max_params(&self) -> usize {
        // Bind message parameter count is an Int16
        65_535
    }

    fn native_type_to_canonical(&self, native: &str, hints: &TypeHints) -> CanonicalType {
        match native.trim().to_lowercase().as_str() {
            "int2" | "int4" | "smallint" | "integer" => CanonicalType::Integer,
            "int8" | "bigint" => CanonicalType::BigInt,
            "float4" | "real" => CanonicalType::Float,
            "float8" | "double precision" => CanonicalType::Double,
            "numeric" | "decimal" => CanonicalType::Decimal {
                precision: hints.precision.unwrap_or(0),
                scale: hints.scale.unwrap_or(0),
            },
            "bool" | "boolean" => CanonicalType::Boolean,
            "varchar" | "character varying" => match hints.max_length {
                Some(n) if n > 0 => CanonicalType::Varchar(n),
                _ => CanonicalType::Text,
            },
            "bpchar" | "character" | "char" => {
                CanonicalType::Varchar(hints.max_length.filter(|n| *n > 0).unwrap_or(1))
            }
            "text" | "name" | "json" | "jsonb" => CanonicalType::Text,
            "uuid" => CanonicalType::Varchar(36),
            "timestamp" | "timestamptz" => CanonicalType::DateTime,
            "date" => CanonicalType::Date,
            "bytea" => CanonicalType::Blob,
            _ => CanonicalType::Unknown(native.trim().to_string()),
        }
    }

    fn canonical_to_native_ddl(&self, canonical: &CanonicalType) -> Result<TypeMapping> {
        let mapping = match canonical {
            CanonicalType::Integer => TypeMapping::lossless("INTEGER"),
            CanonicalType::BigInt => TypeMapping::lossless("BIGINT"),
            CanonicalType::Float => TypeMapping::lossless("REAL"),
            CanonicalType::Double => TypeMapping::lossless("DOUBLE PRECISION"),
            CanonicalType::Text => TypeMapping::lossless("TEXT"),
            CanonicalType::Varchar(n) if *n <= MAX_VARCHAR => {
                TypeMapping::lossless(format!("VARCHAR({})", n))
            }
            CanonicalType::Varchar(_) => TypeMapping::lossless("TEXT"),
            CanonicalType::Boolean => TypeMapping::lossless("BOOLEAN"),
            CanonicalType::DateTime => TypeMapping::lossless("TIMESTAMP"),
            CanonicalType::Date => TypeMapping::lossless("DATE"),
            CanonicalType::Blob => TypeMapping::lossless("BYTEA"),
            CanonicalType::Decimal { precision, scale }
                if *precision > 0 && *precision <= MAX_NUMERIC_PRECISION =>
            {
                TypeMapping::lossless(format!("NUMERIC({},{})", precision, scale))
            }
            CanonicalType::Decimal { .. } => TypeMapping::lossless("NUMERIC"),
            CanonicalType::Unknown(name) => {
                return Err(SyncError::UnsupportedType {
                    type_name: name.clone(),
                    dialect: self.name().to_string(),
                })
            }
        };
        Ok(mapping)
    }

    fn select_expr(&self, col: &ColumnDefinition) -> String {
        let native = col.native_type.to_lowercase();
        if DECODABLE_TYPES.contains(&native.as_str()) {
            self.quote_ident(&col.name)
        } else {
            format!("{}::text", self.quote_ident(&col.name))
        }
    }

    fn insert_placeholder(&self, index: usize, col: &ColumnDefinition) -> String {
        if col.native_type.is_empty() {
            return self.param_placeholder(index);
        }
        format!(
            "{}::text::{}",
            self.param_placeholder(index),
            self.quote_ident(&col.native_type)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::TableSchema;

    fn canon(native: &str, hints: TypeHints) -> CanonicalType {
        PostgresDialect::new().native_type_to_canonical(native, &hints)
    }

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("users"), "\"users\"");
        assert_eq!(dialect.quote_ident("my\"table"), "\"my\"\"table\"");
    }

    #[test]
    fn test_param_placeholder() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.param_placeholder(1), "$1");
        assert_eq!(dialect.param_placeholder(10), "$10");
    }

    #[test]
    fn test_udt_names() {
        assert_eq!(canon("int4", TypeHints::default()), CanonicalType::Integer);
        assert_eq!(canon("int8", TypeHints::default()), CanonicalType::BigInt);
        assert_eq!(canon("float8", TypeHints::default()), CanonicalType::Double);
        assert_eq!(canon("bool", TypeHints::default()), CanonicalType::Boolean);
        assert_eq!(canon("jsonb", TypeHints::default()), CanonicalType::Text);
        assert_eq!(canon("uuid", TypeHints::default()), CanonicalType::Varchar(36));
        assert_eq!(canon("timestamptz", TypeHints::default()), CanonicalType::DateTime);
        assert_eq!(canon("bytea", TypeHints::default()), CanonicalType::Blob);
        assert_eq!(
            canon("tsvector", TypeHints::default()),
            CanonicalType::Unknown("tsvector".into())
        );
    }

    #[test]
    fn test_length_and_precision_hints() {
        let varchar = TypeHints {
            max_length: Some(80),
            ..Default::default()
        };
        assert_eq!(canon("varchar", varchar), CanonicalType::Varchar(80));
        assert_eq!(canon("varchar", TypeHints::default()), CanonicalType::Text);

        let numeric = TypeHints {
            precision: Some(12),
            scale: Some(3),
            ..Default::default()
        };
        assert_eq!(
            canon("numeric", numeric),
            CanonicalType::Decimal {
                precision: 12,
                scale: 3
            }
        );
    }

    #[test]
    fn test_decimal_ddl() {
        let dialect = PostgresDialect::new();
        let ddl = |p, s| {
            dialect
                .canonical_to_native_ddl(&CanonicalType::Decimal {
                    precision: p,
                    scale: s,
                })
                .unwrap()
                .target_type
        };
        assert_eq!(ddl(10, 2), "NUMERIC(10,2)");
        assert_eq!(ddl(0, 0), "NUMERIC");
    }

    #[test]
    fn test_huge_varchar_becomes_text() {
        let mapping = PostgresDialect::new()
            .canonical_to_native_ddl(&CanonicalType::Varchar(20_000_000))
            .unwrap();
        assert_eq!(mapping.target_type, "TEXT");
    }

    #[test]
    fn test_unknown_is_unsupported() {
        let err = PostgresDialect::new()
            .canonical_to_native_ddl(&CanonicalType::Unknown("geometry".into()))
            .unwrap_err();
        assert!(err.to_string().contains("geometry"));
        assert!(err.to_string().contains("postgresql"));
    }

    #[test]
    fn test_select_expr_casts_exotic_types() {
        let dialect = PostgresDialect::new();
        let plain = ColumnDefinition::new("id", CanonicalType::Integer).with_native_type("int4");
        let exotic =
            ColumnDefinition::new("tags", CanonicalType::Unknown("_text".into())).with_native_type("_text");
        assert_eq!(dialect.select_expr(&plain), "\"id\"");
        assert_eq!(dialect.select_expr(&exotic), "\"tags\"::text");
    }

    #[test]
    fn test_build_insert_casts_through_text() {
        let cols = vec![
            ColumnDefinition::new("id", CanonicalType::BigInt).with_native_type("int8"),
            ColumnDefinition::new("active", CanonicalType::Boolean).with_native_type("bool"),
        ];
        assert_eq!(
            PostgresDialect::new().build_insert("users", &cols, 2),
            "INSERT INTO \"users\" (\"id\", \"active\") VALUES \
             ($1::text::\"int8\", $2::text::\"bool\"), ($3::text::\"int8\", $4::text::\"bool\")"
        );
    }

    #[test]
    fn test_generate_create_table() {
        let table = TableSchema::new(
            "users",
            vec![
                ColumnDefinition::new("id", CanonicalType::BigInt).primary_key(),
                ColumnDefinition::new("name", CanonicalType::Text).not_null(),
                ColumnDefinition::new("active", CanonicalType::Boolean),
            ],
        )
        .unwrap();
        let ddl = PostgresDialect::new().generate_create_table(&table).unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE \"users\" (\n    \"id\" BIGINT PRIMARY KEY,\n    \"name\" TEXT NOT NULL,\n    \"active\" BOOLEAN\n)"
        );
    }

    #[test]
    fn test_max_rows_per_insert() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.max_rows_per_insert(5), 13_107);
        assert_eq!(dialect.max_rows_per_insert(0), 0);
    }
}
