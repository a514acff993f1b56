//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Provides MySQL-specific identifier quoting, type vocabulary and table
//! options. Compatible with MySQL 5.7+, 8.0+ and MariaDB 10.2+.

use crate::config::DialectKind;
use crate::core::identifier::quote_backtick;
use crate::core::schema::{split_native_type, CanonicalType, TypeHints};
use crate::core::traits::{Dialect, TypeMapping};
use crate::error::{Result, SyncError};

/// Longest VARCHAR that fits a utf8mb4 row (65535 bytes / 4).
const MAX_VARCHAR: u32 = 16_383;

/// MEDIUMTEXT capacity in bytes.
const MAX_MEDIUMTEXT: u32 = 16_777_215;

const MAX_DECIMAL_PRECISION: u16 = 65;
const MAX_DECIMAL_SCALE: u16 = 30;

/// MySQL/MariaDB dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_backtick(name)
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn max_params(&self) -> usize {
        65_535
    }

    fn create_table_suffix(&self) -> &str {
        " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
    }

    /// `native` is `COLUMN_TYPE`, e.g. `int(10) unsigned` or `tinyint(1)`.
    fn native_type_to_canonical(&self, native: &str, hints: &TypeHints) -> CanonicalType {
        let (base, params) = split_native_type(native);
        let base = base.trim_end_matches(" unsigned").trim_end_matches(" zerofill");
        let unsigned = native.to_lowercase().contains("unsigned");
        let first = params.first().copied();

        match base {
            "bool" | "boolean" => CanonicalType::Boolean,
            "tinyint" if first == Some(1) => CanonicalType::Boolean,
            "bit" if first.unwrap_or(1) == 1 => CanonicalType::Boolean,
            "int" | "integer" if unsigned => CanonicalType::BigInt,
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "year" => {
                CanonicalType::Integer
            }
            "bigint" => CanonicalType::BigInt,
            "float" => CanonicalType::Float,
            "double" | "double precision" | "real" => CanonicalType::Double,
            "decimal" | "numeric" | "dec" | "fixed" => CanonicalType::Decimal {
                precision: params
                    .first()
                    .map(|p| *p as u16)
                    .or(hints.precision)
                    .unwrap_or(10),
                scale: params
                    .get(1)
                    .map(|s| *s as u16)
                    .or(hints.scale)
                    .unwrap_or(0),
            },
            "char" | "varchar" => match first.or(hints.max_length) {
                Some(n) if n > 0 => CanonicalType::Varchar(n),
                _ => CanonicalType::Text,
            },
            "tinytext" | "text" | "mediumtext" | "longtext" | "enum" | "set" | "json" => {
                CanonicalType::Text
            }
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                CanonicalType::Blob
            }
            "datetime" | "timestamp" => CanonicalType::DateTime,
            "date" => CanonicalType::Date,
            _ => CanonicalType::Unknown(native.trim().to_string()),
        }
    }

    fn canonical_to_native_ddl(&self, canonical: &CanonicalType) -> Result<TypeMapping> {
        let mapping = match canonical {
            CanonicalType::Integer => TypeMapping::lossless("INT"),
            CanonicalType::BigInt => TypeMapping::lossless("BIGINT"),
            CanonicalType::Float => TypeMapping::lossless("FLOAT"),
            CanonicalType::Double => TypeMapping::lossless("DOUBLE"),
            CanonicalType::Text => TypeMapping::lossy(
                "VARCHAR(255)",
                "text narrowed to VARCHAR(255) on mysql; longer values will be rejected",
            ),
            CanonicalType::Varchar(n) if *n <= MAX_VARCHAR => {
                TypeMapping::lossless(format!("VARCHAR({})", n))
            }
            CanonicalType::Varchar(n) if *n <= MAX_MEDIUMTEXT => TypeMapping::lossless("MEDIUMTEXT"),
            CanonicalType::Varchar(_) => TypeMapping::lossless("LONGTEXT"),
            CanonicalType::Boolean => TypeMapping::lossless("BOOLEAN"),
            CanonicalType::DateTime => TypeMapping::lossless("DATETIME"),
            CanonicalType::Date => TypeMapping::lossless("DATE"),
            CanonicalType::Blob => TypeMapping::lossless("LONGBLOB"),
            CanonicalType::Decimal { precision: 0, .. } => TypeMapping::lossy(
                format!("DECIMAL({},{})", MAX_DECIMAL_PRECISION, MAX_DECIMAL_SCALE),
                "unconstrained decimal capped at DECIMAL(65,30) on mysql",
            ),
            CanonicalType::Decimal { precision, scale }
                if *precision <= MAX_DECIMAL_PRECISION && *scale <= MAX_DECIMAL_SCALE =>
            {
                TypeMapping::lossless(format!("DECIMAL({},{})", precision, scale))
            }
            CanonicalType::Decimal { .. } => TypeMapping::lossy(
                "DOUBLE",
                format!("{} exceeds mysql DECIMAL limits; stored as DOUBLE", canonical),
            ),
            CanonicalType::Unknown(name) => {
                return Err(SyncError::UnsupportedType {
                    type_name: name.clone(),
                    dialect: self.name().to_string(),
                })
            }
        };
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDefinition, TableSchema};

    fn canon(native: &str) -> CanonicalType {
        MysqlDialect::new().native_type_to_canonical(native, &TypeHints::default())
    }

    #[test]
    fn test_quote_ident() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.quote_ident("users"), "`users`");
        assert_eq!(dialect.quote_ident("my`table"), "`my``table`");
    }

    #[test]
    fn test_param_placeholder() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.param_placeholder(1), "?");
        assert_eq!(dialect.param_placeholder(10), "?");
    }

    #[test]
    fn test_boolean_detection() {
        assert_eq!(canon("tinyint(1)"), CanonicalType::Boolean);
        assert_eq!(canon("bit(1)"), CanonicalType::Boolean);
        assert_eq!(canon("tinyint(4)"), CanonicalType::Integer);
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(canon("int(11)"), CanonicalType::Integer);
        assert_eq!(canon("int(10) unsigned"), CanonicalType::BigInt);
        assert_eq!(canon("bigint(20)"), CanonicalType::BigInt);
        assert_eq!(canon("year"), CanonicalType::Integer);
    }

    #[test]
    fn test_text_and_binary() {
        assert_eq!(canon("varchar(120)"), CanonicalType::Varchar(120));
        assert_eq!(canon("longtext"), CanonicalType::Text);
        assert_eq!(canon("enum('a','b')"), CanonicalType::Text);
        assert_eq!(canon("varbinary(16)"), CanonicalType::Blob);
        assert_eq!(canon("geometry"), CanonicalType::Unknown("geometry".into()));
    }

    #[test]
    fn test_decimal_from_column_type() {
        assert_eq!(
            canon("decimal(12,4)"),
            CanonicalType::Decimal {
                precision: 12,
                scale: 4
            }
        );
    }

    #[test]
    fn test_text_maps_to_varchar_255_lossy() {
        let mapping = MysqlDialect::new()
            .canonical_to_native_ddl(&CanonicalType::Text)
            .unwrap();
        assert_eq!(mapping.target_type, "VARCHAR(255)");
        assert!(mapping.is_lossy);
    }

    #[test]
    fn test_wide_varchar_widens_to_text_types() {
        let dialect = MysqlDialect::new();
        let ddl = |n| {
            dialect
                .canonical_to_native_ddl(&CanonicalType::Varchar(n))
                .unwrap()
                .target_type
        };
        assert_eq!(ddl(16_383), "VARCHAR(16383)");
        assert_eq!(ddl(16_384), "MEDIUMTEXT");
        assert_eq!(ddl(20_000_000), "LONGTEXT");
    }

    #[test]
    fn test_oversized_decimal_falls_back_to_double() {
        let mapping = MysqlDialect::new()
            .canonical_to_native_ddl(&CanonicalType::Decimal {
                precision: 80,
                scale: 2,
            })
            .unwrap();
        assert_eq!(mapping.target_type, "DOUBLE");
        assert!(mapping.is_lossy);
    }

    #[test]
    fn test_generate_create_table_example() {
        let table = TableSchema::new(
            "users",
            vec![
                ColumnDefinition::new("id", CanonicalType::BigInt).primary_key(),
                ColumnDefinition::new("name", CanonicalType::Text),
                ColumnDefinition::new("active", CanonicalType::Boolean),
            ],
        )
        .unwrap();
        let ddl = MysqlDialect::new().generate_create_table(&table).unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE `users` (\n    `id` BIGINT PRIMARY KEY,\n    `name` VARCHAR(255),\n    `active` BOOLEAN\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        );
    }
}
