/// Syntax check for compiled fragments.
///
/// Renders the bindings inline and parses `SELECT <fragment>` with
/// `sqlparser` for the target dialect. Oracle has no dedicated sqlparser
/// dialect and is checked with the generic one.
use anyhow::{anyhow, Result};
use sqlparser::dialect::{
    Dialect as SqlDialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
    SQLiteDialect,
};
use sqlparser::parser::Parser as SqlParser;
use tracing::debug;

use super::dialect::Dialect;
use super::fragment::SqlFragment;

fn parser_dialect(dialect: Dialect) -> Box<dyn SqlDialect> {
    match dialect {
        Dialect::Mysql => Box::new(MySqlDialect {}),
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::Mssql => Box::new(MsSqlDialect {}),
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::Oracle => Box::new(GenericDialect {}),
    }
}

/// Check that `fragment` parses as a select-list expression in `dialect`.
pub fn verify(fragment: &SqlFragment, dialect: Dialect) -> Result<()> {
    verify_sql(&fragment.to_inline_sql(dialect), dialect)
}

/// Check that `expression` parses as a select-list expression in `dialect`.
pub fn verify_sql(expression: &str, dialect: Dialect) -> Result<()> {
    let sql = format!("SELECT {}", expression);
    let parser_dialect = parser_dialect(dialect);
    let statements = SqlParser::parse_sql(parser_dialect.as_ref(), &sql).map_err(|e| {
        debug!(dialect = %dialect, error = %e, "compiled SQL failed to parse");
        anyhow!("{} SQL parse error: {}", dialect, e)
    })?;
    if statements.len() != 1 {
        return Err(anyhow!("Expected 1 statement, found {}", statements.len()));
    }
    Ok(())
}
