//! Query engine abstraction.
//!
//! The engine is an external collaborator: it opens sessions for a
//! credential and evaluates SQL into Arrow results. Backends implement
//! [`QueryEngine`] and [`EngineSession`] so they can be swapped freely.

mod mock;

#[cfg(feature = "duckdb")]
mod duckdb;

#[cfg(feature = "duckdb")]
pub use self::duckdb::DuckDbEngine;
pub use mock::{MockEngine, MockSession};

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::Credential;
use crate::error::Result;
use crate::result::QueryResult;

/// Creates engine sessions.
pub trait QueryEngine: Send + Sync {
    /// Creates a session for `credential`.
    ///
    /// Returns immediately; the session is not usable until
    /// [`EngineSession::initialize`] has completed.
    fn create_session(
        &self,
        credential: &Credential,
        endpoint: Option<&str>,
    ) -> Arc<dyn EngineSession>;

    /// Short backend name for logs and the UI header.
    fn name(&self) -> &'static str;
}

/// One live session with the engine.
///
/// All operations are async and return Results with ExploreError.
#[async_trait]
pub trait EngineSession: Send + Sync {
    /// Engine-assigned identifier of this session.
    fn session_id(&self) -> &str;

    /// Performs session setup (authentication, runtime start-up).
    async fn initialize(&self) -> Result<()>;

    /// Evaluates a query into a fully materialized result.
    async fn evaluate_query(&self, sql: &str) -> Result<QueryResult>;

    /// Evaluates a query into a stream of record batches.
    async fn evaluate_streaming_query(&self, sql: &str) -> Result<QueryResult>;
}

/// Supported engine backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// In-memory engine with the bundled sample data.
    #[default]
    Mock,
    /// DuckDB / MotherDuck (requires the `duckdb` feature).
    Duckdb,
}

impl EngineBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Duckdb => "duckdb",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mock" => Some(Self::Mock),
            "duckdb" | "motherduck" | "md" => Some(Self::Duckdb),
            _ => None,
        }
    }
}

/// Creates the engine for the given backend.
///
/// `database` is only used by the DuckDB backend.
pub fn create_engine(
    backend: EngineBackend,
    database: Option<&str>,
) -> Result<Arc<dyn QueryEngine>> {
    match backend {
        EngineBackend::Mock => Ok(Arc::new(MockEngine::with_sample_data())),
        #[cfg(feature = "duckdb")]
        EngineBackend::Duckdb => Ok(Arc::new(DuckDbEngine::new(database))),
        #[cfg(not(feature = "duckdb"))]
        EngineBackend::Duckdb => {
            let _ = database;
            Err(crate::error::ExploreError::config(
                "the duckdb backend is not compiled in; rebuild with --features duckdb",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(EngineBackend::parse("MOCK"), Some(EngineBackend::Mock));
        assert_eq!(EngineBackend::parse("md"), Some(EngineBackend::Duckdb));
        assert_eq!(EngineBackend::parse("postgres"), None);
    }

    #[test]
    fn test_create_mock_engine() {
        let engine = create_engine(EngineBackend::Mock, None).unwrap();
        assert_eq!(engine.name(), "mock");
    }
}
