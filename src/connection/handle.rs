//! Handle to one engine session.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::Credential;
use crate::engine::EngineSession;
use crate::error::{ExploreError, Result};
use crate::result::QueryResult;

/// Initialization state of a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// The engine is still setting up the session.
    Initializing,
    /// The session can serve queries.
    Ready,
    /// Initialization failed with the given message.
    Failed(String),
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

struct Inner {
    session: Arc<dyn EngineSession>,
    credential: Credential,
    endpoint: Option<String>,
    state: watch::Receiver<ConnectionState>,
}

/// A live (or still initializing) session with the query engine.
///
/// Clones share the same session; use [`Connection::ptr_eq`] to compare
/// identity.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Wraps `session` and starts its initialization in the background.
    ///
    /// Returns immediately. The initialization task runs to completion even
    /// if every handle is dropped; its outcome is then discarded.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub(crate) fn start(
        session: Arc<dyn EngineSession>,
        credential: Credential,
        endpoint: Option<String>,
    ) -> Self {
        let (tx, rx) = watch::channel(ConnectionState::Initializing);
        let started = Instant::now();
        let task_session = Arc::clone(&session);

        tokio::spawn(async move {
            let session_id = task_session.session_id().to_string();
            let state = match task_session.initialize().await {
                Ok(()) => {
                    info!(
                        session = %session_id,
                        "Connection completed in {:.3} seconds",
                        started.elapsed().as_secs_f64()
                    );
                    ConnectionState::Ready
                }
                Err(e) => {
                    warn!(session = %session_id, "Connection failed: {}", e);
                    ConnectionState::Failed(match e {
                        ExploreError::ConnectionInitialization(msg) => msg,
                        other => other.to_string(),
                    })
                }
            };
            // Nobody may be listening anymore.
            let _ = tx.send(state);
        });

        Self {
            inner: Arc::new(Inner {
                session,
                credential,
                endpoint,
                state: rx,
            }),
        }
    }

    /// Engine-assigned session identifier.
    pub fn session_id(&self) -> &str {
        self.inner.session.session_id()
    }

    /// The credential this connection was established with.
    pub fn credential(&self) -> &Credential {
        &self.inner.credential
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.inner.endpoint.as_deref()
    }

    /// Current initialization state, without waiting.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Returns true if both handles refer to the same session.
    pub fn ptr_eq(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Waits until initialization has finished.
    ///
    /// Any number of callers may wait. Dropping the returned future does not
    /// cancel initialization.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.inner.state.clone();
        let state = rx
            .wait_for(|s| *s != ConnectionState::Initializing)
            .await
            .map_err(|_| ExploreError::initialization("Initialization ended without a result"))?
            .clone();

        match state {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Failed(msg) => Err(ExploreError::initialization(msg)),
            ConnectionState::Initializing => Err(ExploreError::internal(
                "Connection still initializing after wait",
            )),
        }
    }

    /// Evaluates `sql` into a materialized result, once the session is ready.
    pub async fn evaluate_query(&self, sql: &str) -> Result<QueryResult> {
        self.wait_ready().await?;
        self.inner.session.evaluate_query(sql).await
    }

    /// Evaluates `sql` into a batch stream, once the session is ready.
    pub async fn evaluate_streaming_query(&self, sql: &str) -> Result<QueryResult> {
        self.wait_ready().await?;
        self.inner.session.evaluate_streaming_query(sql).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id())
            .field("endpoint", &self.endpoint())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngine, QueryEngine};
    use crate::result::ResultKind;
    use crate::sql;
    use std::time::Duration;

    fn start(engine: &MockEngine, token: &str) -> Connection {
        let credential = Credential::new(token);
        let session = engine.create_session(&credential, None);
        Connection::start(session, credential, None)
    }

    #[tokio::test]
    async fn test_starts_initializing_then_ready() {
        let engine = MockEngine::new().with_init_delay(Duration::from_millis(50));
        let conn = start(&engine, "token");

        assert_eq!(conn.state(), ConnectionState::Initializing);
        conn.wait_ready().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_failed_initialization() {
        let engine = MockEngine::new().with_valid_token("good");
        let conn = start(&engine, "bad");

        let err = conn.wait_ready().await.unwrap_err();
        assert_eq!(err, ExploreError::initialization("Invalid token"));
        assert_eq!(conn.state(), ConnectionState::Failed("Invalid token".to_string()));

        // Queries surface the same failure.
        let err = conn.evaluate_query("select 1").await.unwrap_err();
        assert!(matches!(err, ExploreError::ConnectionInitialization(_)));
    }

    #[tokio::test]
    async fn test_many_waiters() {
        let engine = MockEngine::new().with_init_delay(Duration::from_millis(20));
        let conn = start(&engine, "token");

        let other = conn.clone();
        let (a, b) = tokio::join!(conn.wait_ready(), other.wait_ready());
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_handle_still_initializes() {
        let engine = MockEngine::new().with_init_delay(Duration::from_millis(20));
        let conn = start(&engine, "token");
        let mut observer = conn.inner.state.clone();
        drop(conn);

        let state = observer
            .wait_for(|s| *s != ConnectionState::Initializing)
            .await
            .unwrap()
            .clone();
        assert_eq!(state, ConnectionState::Ready);
        assert_eq!(engine.sessions_created(), 1);
    }

    #[tokio::test]
    async fn test_queries_wait_for_initialization() {
        let engine = MockEngine::with_sample_data().with_init_delay(Duration::from_millis(30));
        let conn = start(&engine, "token");

        let result = conn
            .evaluate_streaming_query(sql::COMPLAINTS_BY_YEAR_SQL)
            .await
            .unwrap();
        assert_eq!(result.kind(), ResultKind::Streaming);
    }
}
