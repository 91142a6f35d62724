//! DuckDB engine backend.
//!
//! Opens MotherDuck (`md:`) or local DuckDB databases through the `duckdb`
//! crate and returns results as Arrow batches. DuckDB calls block, so they
//! run on tokio's blocking pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use duckdb::Connection;
use tokio::sync::{mpsc, oneshot};

use super::{EngineSession, QueryEngine};
use crate::auth::Credential;
use crate::error::{ExploreError, Result};
use crate::result::{BatchStream, QueryResult, Table};

/// Batches buffered between the DuckDB thread and the consumer.
const STREAM_BUFFER: usize = 4;

/// Engine backed by DuckDB.
pub struct DuckDbEngine {
    database: Option<String>,
    next_session: AtomicU64,
}

impl DuckDbEngine {
    /// Creates an engine for `database`.
    ///
    /// `None` or an `md:` URI connects to MotherDuck with the session's
    /// token; anything else is treated as a local database file.
    pub fn new(database: Option<&str>) -> Self {
        Self {
            database: database.map(str::to_string),
            next_session: AtomicU64::new(1),
        }
    }

    fn database_path(&self, credential: &Credential) -> String {
        match self.database.as_deref() {
            Some(path) if !path.starts_with("md:") => path.to_string(),
            other => {
                let base = other.unwrap_or("md:");
                let separator = if base.contains('?') { '&' } else { '?' };
                format!("{base}{separator}motherduck_token={}", credential.expose())
            }
        }
    }
}

impl QueryEngine for DuckDbEngine {
    fn create_session(
        &self,
        credential: &Credential,
        endpoint: Option<&str>,
    ) -> Arc<dyn EngineSession> {
        // The md: URI selects the service; the endpoint is informational.
        if let Some(endpoint) = endpoint {
            tracing::debug!("DuckDB backend ignores endpoint {}", endpoint);
        }
        let n = self.next_session.fetch_add(1, Ordering::SeqCst);
        Arc::new(DuckDbSession {
            id: format!("duckdb-session-{n}"),
            path: self.database_path(credential),
            conn: Arc::new(Mutex::new(None)),
        })
    }

    fn name(&self) -> &'static str {
        "duckdb"
    }
}

/// A DuckDB connection opened lazily by [`EngineSession::initialize`].
pub struct DuckDbSession {
    id: String,
    path: String,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl DuckDbSession {
    /// Runs `f` with the open connection on the blocking pool.
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ExploreError::internal("DuckDB connection lock poisoned"))?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| ExploreError::connection("Session is not initialized"))?;
            f(conn)
        })
        .await
        .map_err(|e| ExploreError::internal(format!("DuckDB task failed: {e}")))?
    }
}

#[async_trait]
impl EngineSession for DuckDbSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self) -> Result<()> {
        let path = self.path.clone();
        let opened = tokio::task::spawn_blocking(move || Connection::open(path))
            .await
            .map_err(|e| ExploreError::internal(format!("DuckDB task failed: {e}")))?
            .map_err(|e| ExploreError::initialization(e.to_string()))?;

        let mut guard = self
            .conn
            .lock()
            .map_err(|_| ExploreError::internal("DuckDB connection lock poisoned"))?;
        *guard = Some(opened);
        Ok(())
    }

    async fn evaluate_query(&self, sql: &str) -> Result<QueryResult> {
        let sql = sql.to_string();
        let table = self
            .with_connection(move |conn| {
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| ExploreError::from_engine_message(e.to_string()))?;
                let arrow = stmt
                    .query_arrow([])
                    .map_err(|e| ExploreError::from_engine_message(e.to_string()))?;
                let schema = arrow.get_schema();
                let batches: Vec<RecordBatch> = arrow.collect();
                Ok(Table::new(schema, batches))
            })
            .await?;
        Ok(QueryResult::Materialized(table))
    }

    async fn evaluate_streaming_query(&self, sql: &str) -> Result<QueryResult> {
        let sql = sql.to_string();
        let conn = Arc::clone(&self.conn);
        let (schema_tx, schema_rx) = oneshot::channel();
        let (batch_tx, batch_rx) = mpsc::channel::<Result<RecordBatch>>(STREAM_BUFFER);

        // The stream runs on its own clone of the connection, so the shared
        // lock is only held while cloning and an undrained stream never
        // blocks other queries on this session.
        tokio::task::spawn_blocking(move || {
            let run = || -> Result<()> {
                let conn = {
                    let guard = conn
                        .lock()
                        .map_err(|_| ExploreError::internal("DuckDB connection lock poisoned"))?;
                    guard
                        .as_ref()
                        .ok_or_else(|| ExploreError::connection("Session is not initialized"))?
                        .try_clone()
                        .map_err(|e| ExploreError::connection(format!("Failed to clone connection: {e}")))?
                };
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| ExploreError::from_engine_message(e.to_string()))?;
                let arrow = stmt
                    .query_arrow([])
                    .map_err(|e| ExploreError::from_engine_message(e.to_string()))?;
                if schema_tx.send(Ok(arrow.get_schema())).is_err() {
                    return Ok(());
                }
                for batch in arrow {
                    if batch_tx.blocking_send(Ok(batch)).is_err() {
                        break;
                    }
                }
                Ok(())
            };
            // Errors raised before the schema was sent reach the consumer here.
            if let Err(e) = run() {
                let _ = batch_tx.blocking_send(Err(e));
            }
        });

        let schema = match schema_rx.await {
            Ok(Ok(schema)) => schema,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(next_error(batch_rx).await),
        };

        let stream = futures::stream::unfold(batch_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(QueryResult::Streaming(BatchStream::new(schema, stream)))
    }
}

/// Returns the error the blocking task reported before sending a schema.
async fn next_error(mut rx: mpsc::Receiver<Result<RecordBatch>>) -> ExploreError {
    match rx.recv().await {
        Some(Err(e)) => e,
        _ => ExploreError::internal("DuckDB query ended without a result"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::adapt;

    #[test]
    fn test_database_path_motherduck() {
        let engine = DuckDbEngine::new(None);
        assert_eq!(
            engine.database_path(&Credential::new("tok")),
            "md:?motherduck_token=tok"
        );

        let engine = DuckDbEngine::new(Some("md:sample_data"));
        assert_eq!(
            engine.database_path(&Credential::new("tok")),
            "md:sample_data?motherduck_token=tok"
        );
    }

    #[test]
    fn test_database_path_local() {
        let engine = DuckDbEngine::new(Some(":memory:"));
        assert_eq!(engine.database_path(&Credential::new("tok")), ":memory:");
    }

    #[tokio::test]
    async fn test_local_streaming_query() {
        let engine = DuckDbEngine::new(Some(":memory:"));
        let session = engine.create_session(&Credential::new("unused"), None);
        session.initialize().await.unwrap();

        let result = session
            .evaluate_streaming_query("select range::int as n from range(3)")
            .await
            .unwrap();
        let rows = adapt(result).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.columns, vec!["n"]);
    }

    #[tokio::test]
    async fn test_undrained_stream_does_not_block_other_queries() {
        let engine = DuckDbEngine::new(Some(":memory:"));
        let session = engine.create_session(&Credential::new("unused"), None);
        session.initialize().await.unwrap();

        // Far more batches than the channel buffers, left unread.
        let pending = session
            .evaluate_streaming_query("select range as n from range(500000)")
            .await
            .unwrap();

        let second = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            session.evaluate_query("select 42 as answer"),
        )
        .await
        .expect("second query blocked behind the open stream")
        .unwrap();
        assert_eq!(adapt(second).await.unwrap().len(), 1);
        drop(pending);
    }
}
