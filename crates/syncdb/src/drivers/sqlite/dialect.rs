//! SQLite SQL dialect (Strategy pattern).
//!
//! SQLite declares column types loosely: any string is accepted and the
//! storage class is derived from it by affinity rules. Canonical types are
//! recovered from the declared name the same way.

use crate::config::DialectKind;
use crate::core::identifier::quote_double;
use crate::core::schema::{split_native_type, CanonicalType, TypeHints};
use crate::core::traits::{Dialect, TypeMapping};
use crate::error::{Result, SyncError};

/// SQLite dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Create a new SQLite dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_double(name)
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn max_params(&self) -> usize {
        // SQLITE_MAX_VARIABLE_NUMBER since 3.32
        32_766
    }

    fn truncate_statement(&self, table: &str) -> String {
        format!("DELETE FROM {}", self.quote_ident(table))
    }

    fn native_type_to_canonical(&self, native: &str, hints: &TypeHints) -> CanonicalType {
        let (base, params) = split_native_type(native);

        if hints.boolean_check || base == "boolean" || base == "bool" {
            return CanonicalType::Boolean;
        }

        match base.as_str() {
            // Declared-empty columns have BLOB affinity
            "" | "blob" => CanonicalType::Blob,
            "integer" | "bigint" | "int8" | "unsigned big int" => CanonicalType::BigInt,
            "int" | "int2" | "smallint" | "tinyint" | "mediumint" => CanonicalType::Integer,
            "real" | "double" | "double precision" => CanonicalType::Double,
            "float" => CanonicalType::Float,
            "text" | "clob" => CanonicalType::Text,
            "decimal" | "numeric" => match params.as_slice() {
                [p, s, ..] => decimal(*p, *s),
                [p] => decimal(*p, 0),
                [] => CanonicalType::Decimal {
                    precision: 0,
                    scale: 0,
                },
            },
            "datetime" | "timestamp" => CanonicalType::DateTime,
            "date" => CanonicalType::Date,
            b if b.contains("char") => match params.first() {
                Some(n) if *n > 0 => CanonicalType::Varchar(*n),
                _ => CanonicalType::Text,
            },
            _ => CanonicalType::Unknown(native.trim().to_string()),
        }
    }

    fn canonical_to_native_ddl(&self, canonical: &CanonicalType) -> Result<TypeMapping> {
        let mapping = match canonical {
            CanonicalType::Integer | CanonicalType::BigInt => TypeMapping::lossless("INTEGER"),
            CanonicalType::Float | CanonicalType::Double => TypeMapping::lossless("REAL"),
            CanonicalType::Text => TypeMapping::lossless("TEXT"),
            CanonicalType::Varchar(n) => TypeMapping::lossless(format!("VARCHAR({})", n)),
            CanonicalType::Boolean => TypeMapping::lossless("BOOLEAN"),
            CanonicalType::DateTime => TypeMapping::lossless("DATETIME"),
            CanonicalType::Date => TypeMapping::lossless("DATE"),
            CanonicalType::Blob => TypeMapping::lossless("BLOB"),
            CanonicalType::Decimal { .. } => TypeMapping::lossy(
                "REAL",
                format!("{} stored as REAL on sqlite; exactness is lost", canonical),
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

fn decimal(precision: u32, scale: u32) -> CanonicalType {
    CanonicalType::Decimal {
        precision: u16::try_from(precision).unwrap_or(u16::MAX),
        scale: u16::try_from(scale).unwrap_or(u16::MAX),
    }
}

/// Whether a table's DDL constrains `column` to the values 0 and 1.
///
/// ORMs emulate booleans on SQLite with `CHECK (col IN (0, 1))`. The match is
/// done on a normalized copy of the DDL with case, whitespace and identifier
/// quotes removed.
pub fn has_boolean_check(create_sql: &str, column: &str) -> bool {
    let normalize = |s: &str| {
        s.chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '"' | '`' | '[' | ']'))
            .flat_map(char::to_lowercase)
            .collect::<String>()
    };
    let ddl = normalize(create_sql);
    let col = normalize(column);
    ddl.contains(&format!("check({}in(0,1))", col))
        || ddl.contains(&format!("check({}in(1,0))", col))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDefinition, TableSchema};

    fn canon(native: &str) -> CanonicalType {
        SqliteDialect::new().native_type_to_canonical(native, &TypeHints::default())
    }

    #[test]
    fn test_quote_ident() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.quote_ident("users"), "\"users\"");
        assert_eq!(dialect.quote_ident("my\"table"), "\"my\"\"table\"");
    }

    #[test]
    fn test_truncate_is_delete() {
        assert_eq!(
            SqliteDialect::new().truncate_statement("users"),
            "DELETE FROM \"users\""
        );
    }

    #[test]
    fn test_native_integer_is_64_bit() {
        assert_eq!(canon("INTEGER"), CanonicalType::BigInt);
        assert_eq!(canon("int"), CanonicalType::Integer);
        assert_eq!(canon("SMALLINT"), CanonicalType::Integer);
    }

    #[test]
    fn test_native_text_types() {
        assert_eq!(canon("TEXT"), CanonicalType::Text);
        assert_eq!(canon("VARCHAR(50)"), CanonicalType::Varchar(50));
        assert_eq!(canon("NVARCHAR(10)"), CanonicalType::Varchar(10));
        assert_eq!(canon("CHARACTER"), CanonicalType::Text);
    }

    #[test]
    fn test_native_misc_types() {
        assert_eq!(canon(""), CanonicalType::Blob);
        assert_eq!(canon("REAL"), CanonicalType::Double);
        assert_eq!(canon("FLOAT"), CanonicalType::Float);
        assert_eq!(canon("BOOLEAN"), CanonicalType::Boolean);
        assert_eq!(canon("DATETIME"), CanonicalType::DateTime);
        assert_eq!(canon("DATE"), CanonicalType::Date);
        assert_eq!(
            canon("DECIMAL(10,2)"),
            CanonicalType::Decimal {
                precision: 10,
                scale: 2
            }
        );
        assert_eq!(canon("GEOMETRY"), CanonicalType::Unknown("GEOMETRY".into()));
    }

    #[test]
    fn test_boolean_hint_overrides_integer() {
        let dialect = SqliteDialect::new();
        assert_eq!(
            dialect.native_type_to_canonical("INTEGER", &TypeHints::boolean_check(true)),
            CanonicalType::Boolean
        );
    }

    #[test]
    fn test_has_boolean_check() {
        let ddl = "CREATE TABLE users (id INTEGER PRIMARY KEY, active INTEGER CHECK (\"active\" IN (0, 1)))";
        assert!(has_boolean_check(ddl, "active"));
        assert!(!has_boolean_check(ddl, "id"));
        assert!(has_boolean_check("create table t (flag int check(flag in (1,0)))", "FLAG"));
    }

    #[test]
    fn test_generate_create_table() {
        let table = TableSchema::new(
            "users",
            vec![
                ColumnDefinition::new("id", CanonicalType::BigInt).primary_key(),
                ColumnDefinition::new("name", CanonicalType::Varchar(100)).not_null(),
                ColumnDefinition::new("score", CanonicalType::Double),
            ],
        )
        .unwrap();
        let ddl = SqliteDialect::new().generate_create_table(&table).unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE \"users\" (\n    \"id\" INTEGER PRIMARY KEY,\n    \"name\" VARCHAR(100) NOT NULL,\n    \"score\" REAL\n)"
        );
    }

    #[test]
    fn test_decimal_is_lossy() {
        let mapping = SqliteDialect::new()
            .canonical_to_native_ddl(&CanonicalType::Decimal {
                precision: 10,
                scale: 2,
            })
            .unwrap();
        assert_eq!(mapping.target_type, "REAL");
        assert!(mapping.is_lossy);
    }

    #[test]
    fn test_build_insert_uses_question_marks() {
        let cols = vec![
            ColumnDefinition::new("a", CanonicalType::Integer),
            ColumnDefinition::new("b", CanonicalType::Text),
        ];
        assert_eq!(
            SqliteDialect::new().build_insert("t", &cols, 2),
            "INSERT INTO \"t\" (\"a\", \"b\") VALUES (?, ?), (?, ?)"
        );
    }
}
