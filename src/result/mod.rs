//! Query results and their adaptation into rows.
//!
//! The engine hands back either a fully materialized Arrow table or a stream
//! of record batches. [`adapter`] turns both into a [`RowSet`].

pub mod adapter;
mod types;

pub use adapter::{adapt, adapt_as, drain, drain_as, rows_from_table};
pub use types::{Row, RowSet, Value};

use std::fmt;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use futures::Stream;

use crate::error::Result;

/// Which representation a query result arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    /// Fully materialized tabular data.
    Materialized,
    /// A sequence of columnar batches that must be drained.
    Streaming,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Materialized => "materialized",
            Self::Streaming => "streaming",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine's response to a query.
pub enum QueryResult {
    Materialized(Table),
    Streaming(BatchStream),
}

impl QueryResult {
    /// Returns the representation of this result.
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Materialized(_) => ResultKind::Materialized,
            Self::Streaming(_) => ResultKind::Streaming,
        }
    }

    /// Returns the schema reported by the engine.
    pub fn schema(&self) -> SchemaRef {
        match self {
            Self::Materialized(table) => table.schema(),
            Self::Streaming(stream) => stream.schema(),
        }
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Materialized(table) => f.debug_tuple("Materialized").field(table).finish(),
            Self::Streaming(stream) => f.debug_tuple("Streaming").field(stream).finish(),
        }
    }
}

/// An in-memory Arrow table: a schema plus zero or more batches sharing it.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    /// Creates a table from batches that all carry `schema`.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// Creates a table holding a single batch.
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    /// Creates a table with the given schema and no rows.
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows across all batches.
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Concatenates all batches into one.
    pub fn concat(&self) -> Result<RecordBatch> {
        Ok(arrow::compute::concat_batches(&self.schema, &self.batches)?)
    }

    /// Renders the table with Arrow's pretty printer.
    pub fn pretty(&self) -> Result<String> {
        Ok(arrow::util::pretty::pretty_format_batches(&self.batches)?.to_string())
    }
}

/// A stream of record batches delivered incrementally by the engine.
pub struct BatchStream {
    schema: SchemaRef,
    inner: BoxStream<'static, Result<RecordBatch>>,
}

impl BatchStream {
    /// Wraps a batch stream with its schema.
    pub fn new(
        schema: SchemaRef,
        stream: impl Stream<Item = Result<RecordBatch>> + Send + 'static,
    ) -> Self {
        Self {
            schema,
            inner: stream.boxed(),
        }
    }

    /// Builds a stream that yields already-available batches in order.
    pub fn from_batches(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self::new(schema, futures::stream::iter(batches.into_iter().map(Ok)))
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Reads the stream to completion and concatenates it into one table.
    ///
    /// Fails as a whole if any batch fails; nothing read so far is returned.
    pub async fn read_all(self) -> Result<Table> {
        let schema = self.schema;
        let batches: Vec<RecordBatch> = self.inner.try_collect().await?;
        if batches.is_empty() {
            return Ok(Table::empty(schema));
        }
        let combined = arrow::compute::concat_batches(&schema, &batches)?;
        Ok(Table::new(schema, vec![combined]))
    }
}

impl fmt::Debug for BatchStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchStream")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
