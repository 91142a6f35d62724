//! Query executor integration tests.
//!
//! Runs the full connect, query and adapt flow over the mock engine.

use super::two_year_table;
use duck_explore::auth::Credential;
use duck_explore::connection::ConnectionManager;
use duck_explore::engine::MockEngine;
use duck_explore::query::{Connector, Query, QueryData, QueryExecutor};
use duck_explore::result::{adapt, ResultKind, Row, Value};
use duck_explore::sql;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn connect(engine: MockEngine) -> QueryExecutor {
    let mut manager = ConnectionManager::new(Arc::new(engine), None);
    let outcome = manager.connect(Credential::new("token"));
    QueryExecutor::new(outcome.connection().clone())
}

fn row_pairs(row: &Row) -> Vec<(String, Value)> {
    row.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn test_complaints_by_year_end_to_end() {
    let engine = MockEngine::new()
        .with_init_delay(Duration::from_millis(20))
        .with_batch_size(1)
        .with_result(sql::COMPLAINTS_BY_YEAR_SQL, two_year_table());
    let executor = connect(engine);

    let data = executor
        .query(Query::json(sql::COMPLAINTS_BY_YEAR_SQL))
        .await
        .unwrap();
    let rows = data.into_rows().unwrap();

    assert_eq!(rows.columns, vec!["Year", "Complaints"]);
    assert_eq!(
        rows.iter().map(row_pairs).collect::<Vec<_>>(),
        vec![
            vec![
                ("Year".to_string(), Value::Int(2021)),
                ("Complaints".to_string(), Value::Int(5)),
            ],
            vec![
                ("Year".to_string(), Value::Int(2022)),
                ("Complaints".to_string(), Value::Int(9)),
            ],
        ]
    );
}

#[tokio::test]
async fn test_complaints_by_year_materialized_then_adapted() {
    let engine = MockEngine::new().with_result(sql::COMPLAINTS_BY_YEAR_SQL, two_year_table());
    let executor = connect(engine);

    let result = executor
        .connection()
        .evaluate_query(sql::COMPLAINTS_BY_YEAR_SQL)
        .await
        .unwrap();
    assert_eq!(result.kind(), ResultKind::Materialized);
    let adapted = adapt(result).await.unwrap();

    let fetched = executor.fetch_rows(sql::COMPLAINTS_BY_YEAR_SQL).await.unwrap();
    assert_eq!(fetched, adapted);

    assert_eq!(fetched.columns, vec!["Year", "Complaints"]);
    assert_eq!(
        fetched.iter().map(row_pairs).collect::<Vec<_>>(),
        vec![
            vec![
                ("Year".to_string(), Value::Int(2021)),
                ("Complaints".to_string(), Value::Int(5)),
            ],
            vec![
                ("Year".to_string(), Value::Int(2022)),
                ("Complaints".to_string(), Value::Int(9)),
            ],
        ]
    );
}

#[tokio::test]
async fn test_preload_then_select() {
    let executor = connect(MockEngine::with_sample_data());

    let created = executor
        .query(Query::infer(sql::CREATE_COMPLAINTS_TABLE_SQL))
        .await
        .unwrap();
    assert!(matches!(created, QueryData::None));

    let table = executor
        .query(Query::arrow(sql::SELECT_COMPLAINTS_TABLE_SQL))
        .await
        .unwrap()
        .into_table()
        .unwrap();
    assert_eq!(table.num_rows(), 13);
}

#[tokio::test]
async fn test_missing_share_is_classified() {
    let engine = MockEngine::new().with_error(
        sql::COMPLAINTS_BY_YEAR_SQL,
        "Catalog Error: Table with name service_requests does not exist!",
    );
    let executor = connect(engine);

    let err = executor
        .fetch_rows(sql::COMPLAINTS_BY_YEAR_SQL)
        .await
        .unwrap_err();
    assert!(err.is_missing_data_source());
    assert!(err.attach_hint().is_some());
}

#[tokio::test]
async fn test_failed_connection_fails_queries() {
    let engine = MockEngine::with_sample_data().with_valid_token("other");
    let executor = connect(engine.clone());

    let err = executor
        .query(Query::json(sql::COMPLAINTS_BY_YEAR_SQL))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Connection Error");
    assert_eq!(engine.queries_evaluated(), 0);
}
