/// Target SQL dialects and their function-lowering tables.
///
/// Each dialect owns a map from canonical formula function name to a
/// `DialectEntry`. Entries shared by every back end live in `common` and
/// are merged first; a dialect's own entries override them. Tables are
/// built once on first use and never mutated.
mod common;
mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::compiler::Lowering;
use super::fragment::SqlFragment;
use super::types::Expr;

/// A lowering routine: receives the call arguments and a `Lowering`
/// handle used to compile them recursively.
pub type LowerFn = fn(&mut Lowering<'_>, &[Expr]) -> SqlFragment;

/// How a canonical function is expressed in one dialect.
#[derive(Clone, Copy)]
pub enum DialectEntry {
    /// Same arguments, different native name.
    Rename(&'static str),
    /// Custom SQL shape.
    Lower(LowerFn),
}

impl fmt::Debug for DialectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectEntry::Rename(name) => write!(f, "Rename({})", name),
            DialectEntry::Lower(_) => f.write_str("Lower(..)"),
        }
    }
}

pub type DialectTable = HashMap<&'static str, DialectEntry>;

/// Supported SQL back ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Mysql,
    Postgres,
    Mssql,
    Sqlite,
    Oracle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown SQL dialect '{0}' (expected mysql, postgres, mssql, sqlite, or oracle)")]
pub struct UnknownDialect(pub String);

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::Mysql,
        Dialect::Postgres,
        Dialect::Mssql,
        Dialect::Sqlite,
        Dialect::Oracle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Mssql => "mssql",
            Dialect::Sqlite => "sqlite",
            Dialect::Oracle => "oracle",
        }
    }

    /// Quote an identifier, doubling any embedded closing quote.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
            Dialect::Mssql => format!("[{}]", name.replace(']', "]]")),
            Dialect::Postgres | Dialect::Sqlite | Dialect::Oracle => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
        }
    }

    /// Type used for the float cast inserted before division.
    pub fn float_type(self) -> &'static str {
        match self {
            Dialect::Mysql => "DOUBLE",
            Dialect::Postgres => "DOUBLE PRECISION",
            Dialect::Mssql => "FLOAT",
            Dialect::Sqlite => "REAL",
            Dialect::Oracle => "FLOAT",
        }
    }

    pub fn text_type(self) -> &'static str {
        match self {
            Dialect::Mysql => "CHAR",
            Dialect::Postgres | Dialect::Sqlite => "TEXT",
            Dialect::Mssql => "NVARCHAR(MAX)",
            Dialect::Oracle => "VARCHAR2(4000)",
        }
    }

    /// Whether a predicate can be used directly as a value.
    pub fn has_boolean_values(self) -> bool {
        !matches!(self, Dialect::Mssql | Dialect::Oracle)
    }

    /// Whether `%` is available as the modulo operator.
    pub fn has_modulo_operator(self) -> bool {
        !matches!(self, Dialect::Oracle)
    }

    /// The lowering table for this dialect.
    pub fn table(self) -> &'static DialectTable {
        match self {
            Dialect::Mysql => &MYSQL,
            Dialect::Postgres => &POSTGRES,
            Dialect::Mssql => &MSSQL,
            Dialect::Sqlite => &SQLITE,
            Dialect::Oracle => &ORACLE,
        }
    }

    /// Look up the entry for an upper-case function name.
    pub fn entry(self, name: &str) -> Option<&'static DialectEntry> {
        self.table().get(name)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mysql2" | "mariadb" => Ok(Dialect::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mssql" | "sqlserver" | "tsql" => Ok(Dialect::Mssql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "oracle" | "oracledb" => Ok(Dialect::Oracle),
            other => Err(UnknownDialect(other.to_string())),
        }
    }
}

fn build_table(overrides: Vec<(&'static str, DialectEntry)>) -> DialectTable {
    let mut table: DialectTable = common::entries().into_iter().collect();
    table.extend(overrides);
    table
}

static MYSQL: LazyLock<DialectTable> = LazyLock::new(|| build_table(mysql::entries()));
static POSTGRES: LazyLock<DialectTable> = LazyLock::new(|| build_table(postgres::entries()));
static MSSQL: LazyLock<DialectTable> = LazyLock::new(|| build_table(mssql::entries()));
static SQLITE: LazyLock<DialectTable> = LazyLock::new(|| build_table(sqlite::entries()));
static ORACLE: LazyLock<DialectTable> = LazyLock::new(|| build_table(oracle::entries()));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::registry;

    #[test]
    fn test_every_registered_function_lowers_everywhere() {
        for dialect in Dialect::ALL {
            for sig in registry::functions() {
                assert!(
                    dialect.entry(sig.name).is_some(),
                    "{} has no lowering for {}",
                    dialect,
                    sig.name
                );
            }
        }
    }

    #[test]
    fn test_value_strips_number_formatting_everywhere() {
        use crate::formula::compiler::compile;
        use crate::formula::fragment::SqlValue;
        use crate::formula::parser::parse_formula;

        let expr = parse_formula("VALUE('$1,200.50')").unwrap();
        for dialect in Dialect::ALL {
            let fragment = compile(&expr, dialect, None);
            assert_eq!(
                fragment.bindings,
                vec![SqlValue::Text("$1,200.50".to_string())],
                "{}",
                dialect
            );
            let regex_strip = fragment.text.contains("'[^0-9.-]'");
            let replace_strip = ["'$'", "','", "'%'"]
                .iter()
                .all(|ch| fragment.text.contains(&format!("{}, '')", ch)));
            assert!(regex_strip || replace_strip, "{}: {}", dialect, fragment.text);
        }

        // The REPLACE chain leaves only digits, the point and the sign.
        let stripped = super::common::NUMBER_FORMATTING
            .iter()
            .fold("$1,200.50".to_string(), |s, ch| s.replace(ch, ""));
        assert_eq!(stripped.parse::<f64>(), Ok(1200.5));
        let stripped = super::common::NUMBER_FORMATTING
            .iter()
            .fold("€ -3 %".to_string(), |s, ch| s.replace(ch, ""));
        assert_eq!(stripped, "-3");
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("PG".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert_eq!("sqlserver".parse::<Dialect>(), Ok(Dialect::Mssql));
        assert_eq!("sqlite3".parse::<Dialect>(), Ok(Dialect::Sqlite));
        assert!("db2".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::Mysql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(Dialect::Mssql.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(Dialect::Postgres.quote_identifier("Unit Price"), "\"Unit Price\"");
    }

    #[test]
    fn test_overrides_replace_common_entries() {
        assert!(matches!(
            Dialect::Mssql.entry("LEN"),
            Some(DialectEntry::Rename("LEN"))
        ));
        assert!(matches!(
            Dialect::Postgres.entry("LEN"),
            Some(DialectEntry::Rename("LENGTH"))
        ));
        assert!(matches!(
            Dialect::Mysql.entry("LEN"),
            Some(DialectEntry::Rename("CHAR_LENGTH"))
        ));
    }
}
