//! Adapts engine results into row-oriented data.
//!
//! Streaming results are drained completely before any row is produced; a
//! stream that fails halfway never yields a partial [`RowSet`].

use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::{ArrayFormatter, FormatOptions};

use super::{QueryResult, ResultKind, Row, RowSet, Table, Value};
use crate::error::{ExploreError, Result};

/// Adapts a result of either shape into rows.
pub async fn adapt(result: QueryResult) -> Result<RowSet> {
    let table = drain(result).await?;
    rows_from_table(&table)
}

/// Adapts a result into rows, requiring it to have the `expected` shape.
pub async fn adapt_as(result: QueryResult, expected: ResultKind) -> Result<RowSet> {
    ensure_kind(&result, expected)?;
    adapt(result).await
}

/// Materializes a result into a single in-memory table.
pub async fn drain(result: QueryResult) -> Result<Table> {
    match result {
        QueryResult::Materialized(table) => Ok(table),
        QueryResult::Streaming(stream) => stream.read_all().await,
    }
}

/// Materializes a result, requiring it to have the `expected` shape.
pub async fn drain_as(result: QueryResult, expected: ResultKind) -> Result<Table> {
    ensure_kind(&result, expected)?;
    drain(result).await
}

fn ensure_kind(result: &QueryResult, expected: ResultKind) -> Result<()> {
    let actual = result.kind();
    if actual == expected {
        Ok(())
    } else {
        Err(ExploreError::ResultShape { expected, actual })
    }
}

/// Converts a materialized table into rows, preserving batch and row order.
///
/// The column list is taken from the first row; a table without rows yields
/// an empty column list even if its schema names columns.
pub fn rows_from_table(table: &Table) -> Result<RowSet> {
    let columns: Arc<[String]> = table.column_names().into();
    let mut rows = Vec::with_capacity(table.num_rows());

    for batch in table.batches() {
        let values_by_column = batch
            .columns()
            .iter()
            .map(|array| column_values(array.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut iters: Vec<_> = values_by_column.into_iter().map(Vec::into_iter).collect();
        for _ in 0..batch.num_rows() {
            let values = iters
                .iter_mut()
                .map(|it| it.next().unwrap_or_default())
                .collect();
            rows.push(Row::new(columns.clone(), values));
        }
    }

    let columns = rows
        .first()
        .map(|row| row.keys().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(RowSet { columns, rows })
}

/// Converts one Arrow column into scalar values.
fn column_values(array: &dyn Array) -> Result<Vec<Value>> {
    let len = array.len();
    let mut out = Vec::with_capacity(len);

    macro_rules! primitive {
        ($arrow_type:ty, $variant:ident, $convert:expr) => {{
            let typed = array.as_primitive::<$arrow_type>();
            for i in 0..len {
                out.push(if typed.is_null(i) {
                    Value::Null
                } else {
                    Value::$variant($convert(typed.value(i)))
                });
            }
        }};
    }

    match array.data_type() {
        DataType::Null => out.resize(len, Value::Null),
        DataType::Boolean => {
            let typed = array.as_boolean();
            for i in 0..len {
                out.push(if typed.is_null(i) {
                    Value::Null
                } else {
                    Value::Bool(typed.value(i))
                });
            }
        }
        DataType::Int8 => primitive!(Int8Type, Int, i64::from),
        DataType::Int16 => primitive!(Int16Type, Int, i64::from),
        DataType::Int32 => primitive!(Int32Type, Int, i64::from),
        DataType::Int64 => primitive!(Int64Type, Int, i64::from),
        DataType::UInt8 => primitive!(UInt8Type, Int, i64::from),
        DataType::UInt16 => primitive!(UInt16Type, Int, i64::from),
        DataType::UInt32 => primitive!(UInt32Type, Int, i64::from),
        DataType::UInt64 => primitive!(UInt64Type, UInt, u64::from),
        DataType::Float32 => primitive!(Float32Type, Float, f64::from),
        DataType::Float64 => primitive!(Float64Type, Float, f64::from),
        DataType::Utf8 => {
            let typed = array.as_string::<i32>();
            for i in 0..len {
                out.push(if typed.is_null(i) {
                    Value::Null
                } else {
                    Value::String(typed.value(i).to_string())
                });
            }
        }
        DataType::LargeUtf8 => {
            let typed = array.as_string::<i64>();
            for i in 0..len {
                out.push(if typed.is_null(i) {
                    Value::Null
                } else {
                    Value::String(typed.value(i).to_string())
                });
            }
        }
        DataType::Binary => {
            let typed = array.as_binary::<i32>();
            for i in 0..len {
                out.push(if typed.is_null(i) {
                    Value::Null
                } else {
                    Value::Bytes(typed.value(i).to_vec())
                });
            }
        }
        DataType::LargeBinary => {
            let typed = array.as_binary::<i64>();
            for i in 0..len {
                out.push(if typed.is_null(i) {
                    Value::Null
                } else {
                    Value::Bytes(typed.value(i).to_vec())
                });
            }
        }
        DataType::Date32 | DataType::Date64 => formatted(array, &mut out, Value::Date)?,
        DataType::Timestamp(_, _) => formatted(array, &mut out, Value::Timestamp)?,
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => {
            formatted(array, &mut out, |s| match s.parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(s),
            })?
        }
        _ => formatted(array, &mut out, Value::String)?,
    }

    Ok(out)
}

/// Renders each non-null cell with Arrow's display formatter.
fn formatted(array: &dyn Array, out: &mut Vec<Value>, wrap: impl Fn(String) -> Value) -> Result<()> {
    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array, &options)?;
    for i in 0..array.len() {
        out.push(if array.is_null(i) {
            Value::Null
        } else {
            wrap(formatter.value(i).to_string())
        });
    }
    Ok(())
}
