//! duck-explore - explore the NYPD complaints sample data from the terminal.
//!
//! This library exposes the core modules for the binary and for
//! integration tests.

pub mod auth;
pub mod cli;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod logging;
pub mod output;
pub mod query;
pub mod result;
pub mod sql;
pub mod tui;
pub mod viz;
