//! Query execution over a managed connection.
//!
//! Provides the connector seam used by consumers that just want data back
//! in a given shape, and can be tested independently of the UI.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::kind::QueryKind;
use crate::connection::Connection;
use crate::error::{ExploreError, Result};
use crate::result::{adapt, adapt_as, drain_as, ResultKind, RowSet, Table};

/// A SQL statement and the shape its result should come back in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub sql: String,
    pub kind: QueryKind,
}

impl Query {
    pub fn new(sql: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            sql: sql.into(),
            kind,
        }
    }

    /// A query whose kind is inferred from the SQL text.
    pub fn infer(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let kind = QueryKind::infer(&sql);
        Self { sql, kind }
    }

    pub fn exec(sql: impl Into<String>) -> Self {
        Self::new(sql, QueryKind::Exec)
    }

    pub fn arrow(sql: impl Into<String>) -> Self {
        Self::new(sql, QueryKind::Arrow)
    }

    pub fn json(sql: impl Into<String>) -> Self {
        Self::new(sql, QueryKind::Json)
    }
}

/// Data returned by a [`Connector`].
#[derive(Debug)]
pub enum QueryData {
    /// The statement ran for its side effects.
    None,
    /// A columnar table.
    Arrow(Table),
    /// JSON-like rows.
    Rows(RowSet),
}

impl QueryData {
    /// Number of rows carried, zero for `None`.
    pub fn num_rows(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Arrow(table) => table.num_rows(),
            Self::Rows(rows) => rows.len(),
        }
    }

    pub fn into_rows(self) -> Option<RowSet> {
        match self {
            Self::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            Self::Arrow(table) => Some(table),
            _ => None,
        }
    }
}

/// Something that can answer queries.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn query(&self, query: Query) -> Result<QueryData>;
}

/// Runs queries against a [`Connection`].
///
/// Connector queries always use the streaming evaluation path and drain it
/// in full before returning.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    connection: Connection,
}

impl QueryExecutor {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Evaluates `sql` with the materialized path and adapts it into rows.
    pub async fn fetch_rows(&self, sql: &str) -> Result<RowSet> {
        let start = Instant::now();
        let outcome = match self.connection.evaluate_query(sql).await {
            Ok(result) => adapt(result).await,
            Err(e) => Err(e),
        };
        log_outcome(sql, "rows", start, outcome.as_ref().map(RowSet::len));
        outcome
    }

    async fn run(&self, query: &Query) -> Result<QueryData> {
        let result = self.connection.evaluate_streaming_query(&query.sql).await?;
        match query.kind {
            QueryKind::Exec => {
                drain_as(result, ResultKind::Streaming).await?;
                Ok(QueryData::None)
            }
            QueryKind::Arrow => Ok(QueryData::Arrow(
                drain_as(result, ResultKind::Streaming).await?,
            )),
            QueryKind::Json => Ok(QueryData::Rows(
                adapt_as(result, ResultKind::Streaming).await?,
            )),
        }
    }
}

#[async_trait]
impl Connector for QueryExecutor {
    async fn query(&self, query: Query) -> Result<QueryData> {
        let start = Instant::now();
        let outcome = self.run(&query).await;
        log_outcome(
            &query.sql,
            query.kind.as_str(),
            start,
            outcome.as_ref().map(QueryData::num_rows),
        );
        outcome
    }
}

fn log_outcome(
    sql: &str,
    kind: &str,
    start: Instant,
    rows: std::result::Result<usize, &ExploreError>,
) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match rows {
        Ok(rows) => debug!(kind, rows, elapsed_ms, "Query finished: {}", sql),
        Err(e) => warn!(kind, elapsed_ms, "Query failed: {} ({})", sql, e),
    }
}
