//! Query execution for duck-explore.
//!
//! Isolates SQL execution and result shaping from the UI.

pub mod executor;
pub mod kind;

pub use executor::{Connector, Query, QueryData, QueryExecutor};
pub use kind::QueryKind;
