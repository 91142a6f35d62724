//! Integration tests for duck-explore.

pub mod adapter_test;
pub mod connection_test;
pub mod executor_test;

use arrow::array::{ArrayRef, Int32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use duck_explore::result::Table;
use std::sync::Arc;

pub fn year_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("Year", DataType::Int32, false),
        Field::new("Complaints", DataType::Int32, false),
    ]))
}

pub fn year_batch(years: Vec<i32>, counts: Vec<i32>) -> RecordBatch {
    RecordBatch::try_new(
        year_schema(),
        vec![
            Arc::new(Int32Array::from(years)) as ArrayRef,
            Arc::new(Int32Array::from(counts)) as ArrayRef,
        ],
    )
    .unwrap()
}

/// The two-row complaints table used by the end-to-end tests.
pub fn two_year_table() -> Table {
    Table::from_batch(year_batch(vec![2021, 2022], vec![5, 9]))
}
