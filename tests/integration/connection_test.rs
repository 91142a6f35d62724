//! Connection manager integration tests.
//!
//! Tests the one-connection-per-session lifecycle.

use duck_explore::auth::Credential;
use duck_explore::connection::{ConnectionManager, ConnectionState, ManagerState};
use duck_explore::engine::MockEngine;
use duck_explore::error::ExploreError;
use std::sync::Arc;
use std::time::Duration;

fn manager(engine: &MockEngine) -> ConnectionManager {
    ConnectionManager::new(Arc::new(engine.clone()), None)
}

#[tokio::test]
async fn test_only_first_connect_creates_a_session() {
    let engine = MockEngine::new().with_init_delay(Duration::from_millis(10));
    let mut manager = manager(&engine);

    let first = manager.connect(Credential::new("c1"));
    assert!(first.is_started());
    for token in ["c2", "c3", "c4"] {
        let outcome = manager.connect(Credential::new(token));
        assert!(!outcome.is_started());
    }

    let conn = manager.connection().unwrap();
    assert_eq!(conn.credential().expose(), "c1");
    assert_eq!(engine.sessions_created(), 1);

    conn.wait_ready().await.unwrap();
    manager.connect(Credential::new("c5"));
    assert_eq!(engine.sessions_created(), 1);
}

#[tokio::test]
async fn test_stored_credential_is_the_one_given() {
    let engine = MockEngine::new();
    let mut manager = manager(&engine);

    let c1 = Credential::new(" c1\t\n");
    manager.connect(c1.clone());

    let conn = manager.connection().unwrap();
    assert_eq!(conn.credential(), &c1);
    assert_eq!(conn.credential().expose(), " c1\t\n");
}

#[tokio::test]
async fn test_noop_connect_keeps_reference_identity() {
    let engine = MockEngine::new();
    let mut manager = manager(&engine);

    let started = manager.connect(Credential::new("c1"));
    let before = manager.connection().unwrap();
    let again = manager.connect(Credential::new("c2"));
    let after = manager.connection().unwrap();

    assert!(before.ptr_eq(&after));
    assert!(started.connection().ptr_eq(again.connection()));
    assert_eq!(before.session_id(), after.session_id());
}

#[tokio::test]
async fn test_connection_is_stored_before_initialization_completes() {
    let engine = MockEngine::new().with_init_delay(Duration::from_millis(100));
    let mut manager = manager(&engine);

    manager.connect(Credential::new("c1"));
    let conn = manager.connection().unwrap();
    assert_eq!(conn.state(), ConnectionState::Initializing);
    assert_eq!(manager.state(), ManagerState::Initializing);

    conn.wait_ready().await.unwrap();
    assert_eq!(manager.state(), ManagerState::Ready);
}

#[tokio::test]
async fn test_initialization_failure_is_reported() {
    let engine = MockEngine::new().with_init_error("Invalid MotherDuck token");
    let mut manager = manager(&engine);

    manager.connect(Credential::new("expired"));
    let conn = manager.connection().unwrap();
    let err = conn.wait_ready().await.unwrap_err();

    assert_eq!(
        err,
        ExploreError::ConnectionInitialization("Invalid MotherDuck token".to_string())
    );
    assert_eq!(manager.state(), ManagerState::Failed);
}

#[tokio::test]
async fn test_credential_is_redacted_in_debug_output() {
    let engine = MockEngine::new();
    let mut manager = manager(&engine);
    manager.connect(Credential::new("super-secret"));

    let conn = manager.connection().unwrap();
    let debug = format!("{:?} {:?}", conn, conn.credential());
    assert!(!debug.contains("super-secret"));
}
