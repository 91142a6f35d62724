//! Result adapter integration tests.
//!
//! Tests draining streams into rows and the shape checks.

use super::{year_batch, year_schema};
use duck_explore::error::ExploreError;
use duck_explore::result::{adapt, adapt_as, drain_as, BatchStream, QueryResult, ResultKind, Table, Value};
use futures::stream;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_streaming_adapter_is_complete_and_ordered() {
    let batches = vec![
        year_batch(vec![2010, 2011, 2012], vec![1, 2, 3]),
        year_batch(vec![2013], vec![4]),
        year_batch(vec![2014, 2015], vec![5, 6]),
    ];
    let result = QueryResult::Streaming(BatchStream::from_batches(year_schema(), batches));

    let rows = adapt_as(result, ResultKind::Streaming).await.unwrap();

    assert_eq!(rows.len(), 6);
    assert_eq!(rows.columns, vec!["Year", "Complaints"]);
    let years: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.get("Year").and_then(Value::as_i64))
        .collect();
    assert_eq!(years, vec![2010, 2011, 2012, 2013, 2014, 2015]);
    for row in &rows {
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["Year", "Complaints"]);
    }
}

#[tokio::test]
async fn test_zero_rows_yield_empty_columns() {
    let result = QueryResult::Streaming(BatchStream::from_batches(year_schema(), vec![]));
    let rows = adapt(result).await.unwrap();

    assert!(rows.is_empty());
    assert!(rows.columns.is_empty());
}

#[tokio::test]
async fn test_shape_mismatch_is_rejected() {
    let table = Table::from_batch(year_batch(vec![2021], vec![5]));
    let err = adapt_as(QueryResult::Materialized(table), ResultKind::Streaming)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExploreError::ResultShape {
            expected: ResultKind::Streaming,
            actual: ResultKind::Materialized,
        }
    );

    let stream = BatchStream::from_batches(year_schema(), vec![year_batch(vec![2021], vec![5])]);
    let err = drain_as(QueryResult::Streaming(stream), ResultKind::Materialized)
        .await
        .unwrap_err();
    assert!(matches!(err, ExploreError::ResultShape { .. }));
}

#[tokio::test]
async fn test_failing_stream_yields_no_partial_rows() {
    let items = vec![
        Ok(year_batch(vec![2021], vec![5])),
        Err(ExploreError::query("connection reset mid-stream")),
    ];
    let result = QueryResult::Streaming(BatchStream::new(year_schema(), stream::iter(items)));

    let err = adapt(result).await.unwrap_err();
    assert_eq!(err, ExploreError::query("connection reset mid-stream"));
}

#[tokio::test]
async fn test_rows_serialize_as_json_objects() {
    let result = QueryResult::Materialized(Table::from_batch(year_batch(
        vec![2021, 2022],
        vec![5, 9],
    )));
    let rows = adapt(result).await.unwrap();

    let json: serde_json::Value = serde_json::from_str(&rows.to_json().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"Year": 2021, "Complaints": 5},
            {"Year": 2022, "Complaints": 9}
        ])
    );
}
