//! Integration tests for duck-explore.
//!
//! Everything runs against the in-memory mock engine, so no account or
//! network access is needed.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
