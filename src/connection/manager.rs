//! Connection manager enforcing a single connection per session.

use std::sync::Arc;

use tracing::{info, warn};

use super::handle::{Connection, ConnectionState};
use crate::auth::Credential;
use crate::engine::QueryEngine;

/// Lifecycle of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// `connect` has not been called yet.
    Absent,
    /// A connection exists and is still initializing.
    Initializing,
    /// The connection is ready to serve queries.
    Ready,
    /// Initialization failed; the session has no usable connection.
    Failed,
}

/// What a call to [`ConnectionManager::connect`] did.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// A new connection was created and is initializing.
    Started(Connection),
    /// A connection already existed; nothing changed.
    AlreadyConnected(Connection),
}

impl ConnectOutcome {
    /// The connection that is current after the call.
    pub fn connection(&self) -> &Connection {
        match self {
            Self::Started(conn) | Self::AlreadyConnected(conn) => conn,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Owns the one connection of an application session.
///
/// Construct one per session (or per test). The first `connect` wins; later
/// calls are logged and ignored whatever state the connection is in. After
/// a failed connection, [`ConnectionManager::new_session`] starts over.
pub struct ConnectionManager {
    engine: Arc<dyn QueryEngine>,
    endpoint: Option<String>,
    current: Option<Connection>,
}

impl ConnectionManager {
    /// Creates a manager for `engine`, connecting to `endpoint` when set.
    pub fn new(engine: Arc<dyn QueryEngine>, endpoint: Option<String>) -> Self {
        Self {
            engine,
            endpoint,
            current: None,
        }
    }

    /// A manager for a new session against the same engine and endpoint.
    ///
    /// This is how a session whose connection failed starts over: the old
    /// manager keeps its failed connection, the new one has none.
    pub fn new_session(&self) -> Self {
        info!(engine = self.engine.name(), "Starting a new session");
        Self::new(Arc::clone(&self.engine), self.endpoint.clone())
    }

    /// Connects with `credential` unless a connection already exists.
    ///
    /// Returns as soon as the session has been created; initialization
    /// continues in the background (see [`Connection::wait_ready`]).
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn connect(&mut self, credential: Credential) -> ConnectOutcome {
        if let Some(existing) = &self.current {
            warn!(
                session = %existing.session_id(),
                "Already connected! Ignoring connect request"
            );
            return ConnectOutcome::AlreadyConnected(existing.clone());
        }

        info!(
            engine = self.engine.name(),
            endpoint = self.endpoint.as_deref().unwrap_or("default"),
            "Connection starting"
        );
        let session = self
            .engine
            .create_session(&credential, self.endpoint.as_deref());
        let connection = Connection::start(session, credential, self.endpoint.clone());
        self.current = Some(connection.clone());

        ConnectOutcome::Started(connection)
    }

    /// The current connection, if `connect` has been called.
    pub fn connection(&self) -> Option<Connection> {
        self.current.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ManagerState {
        match self.current.as_ref().map(Connection::state) {
            None => ManagerState::Absent,
            Some(ConnectionState::Initializing) => ManagerState::Initializing,
            Some(ConnectionState::Ready) => ManagerState::Ready,
            Some(ConnectionState::Failed(_)) => ManagerState::Failed,
        }
    }

    /// Check if a connection exists (in any state).
    pub fn is_connected(&self) -> bool {
        self.current.is_some()
    }

    /// Name of the engine backend.
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}
