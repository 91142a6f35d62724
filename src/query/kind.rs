//! Query kinds and their inference from SQL text.
//!
//! Uses sqlparser-rs with the DuckDB dialect to tell row-returning
//! statements from side-effecting ones.

use std::fmt;
use std::str::FromStr;

use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

/// The representation a caller wants back from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    /// Run for side effects; no data is returned.
    Exec,
    /// A columnar Arrow table.
    Arrow,
    /// Rows of JSON-like records.
    #[default]
    Json,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exec => "exec",
            Self::Arrow => "arrow",
            Self::Json => "json",
        }
    }

    /// Picks a kind for `sql`: `Exec` for statements that return no rows,
    /// `Json` otherwise.
    ///
    /// SQL that cannot be parsed is assumed to return rows; the engine will
    /// report the real error.
    pub fn infer(sql: &str) -> Self {
        let Ok(statements) = Parser::parse_sql(&DuckDbDialect {}, sql) else {
            return Self::Json;
        };
        match statements.last() {
            Some(statement) if returns_rows(statement) => Self::Json,
            Some(_) => Self::Exec,
            None => Self::Json,
        }
    }
}

/// Returns true for statements whose result is a table of rows.
fn returns_rows(statement: &Statement) -> bool {
    matches!(
        statement,
        Statement::Query(_)
            | Statement::ShowTables { .. }
            | Statement::ShowColumns { .. }
            | Statement::ShowVariable { .. }
            | Statement::ExplainTable { .. }
            | Statement::Explain { .. }
            | Statement::Pragma { .. }
    )
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exec" => Ok(Self::Exec),
            "arrow" => Ok(Self::Arrow),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid query kind: {s}. Expected: exec, arrow, or json"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_select_is_json() {
        assert_eq!(QueryKind::infer("SELECT 1 AS x"), QueryKind::Json);
        assert_eq!(
            QueryKind::infer("with t as (select 1) select * from t"),
            QueryKind::Json
        );
    }

    #[test]
    fn test_infer_side_effects_are_exec() {
        assert_eq!(
            QueryKind::infer("create or replace table complaints as select 1 as Year"),
            QueryKind::Exec
        );
        assert_eq!(QueryKind::infer("INSERT INTO t VALUES (1)"), QueryKind::Exec);
        assert_eq!(QueryKind::infer("DROP TABLE t"), QueryKind::Exec);
    }

    #[test]
    fn test_infer_unparseable_defaults_to_json() {
        assert_eq!(
            QueryKind::infer("from sample_data.nyc.service_requests select 1"),
            QueryKind::Json
        );
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("ARROW".parse::<QueryKind>(), Ok(QueryKind::Arrow));
        assert!("csv".parse::<QueryKind>().is_err());
    }
}
