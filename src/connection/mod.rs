//! Connection management for duck-explore.
//!
//! Centralizes the connection lifecycle: one connection per session,
//! initialized in the background.

pub mod handle;
pub mod manager;

pub use handle::{Connection, ConnectionState};
pub use manager::{ConnectOutcome, ConnectionManager, ManagerState};
