//! Mock query engine for testing.
//!
//! Provides an in-memory engine that answers registered SQL with canned
//! Arrow tables, for headless testing and the `--mock` demo.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arrow::array::{ArrayRef, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use super::{EngineSession, QueryEngine};
use crate::auth::Credential;
use crate::error::{ExploreError, Result};
use crate::result::{BatchStream, QueryResult, Table};
use crate::sql::{self, FlightsField, FlightsTable};

/// Canned answer for one statement.
#[derive(Debug, Clone)]
enum MockResponse {
    Rows(Table),
    Error(String),
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, MockResponse>,
    valid_tokens: Option<HashSet<String>>,
    init_delay: Duration,
    init_error: Option<String>,
    batch_size: usize,
    sessions_created: AtomicU64,
    queries_evaluated: AtomicU64,
}

/// An in-memory engine returning predefined results.
///
/// Cloning shares the registered results and counters, so tests can keep a
/// handle after giving the engine to a connection manager.
#[derive(Debug, Clone)]
pub struct MockEngine {
    state: Arc<MockState>,
}

impl MockEngine {
    /// Creates an engine with no registered results that accepts any non-empty token.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                batch_size: 1024,
                ..Default::default()
            }),
        }
    }

    /// Creates an engine preloaded with the sample data every viz reads:
    /// the NYPD complaints, the `md` demo table and both flights tables.
    pub fn with_sample_data() -> Self {
        let mut engine = Self::new()
            .with_result(sql::COMPLAINTS_BY_YEAR_SQL, sample_complaints_by_year())
            .with_result(sql::SELECT_COMPLAINTS_TABLE_SQL, sample_complaints_by_year())
            .with_result(sql::CREATE_COMPLAINTS_TABLE_SQL, statement_done())
            .with_result(sql::CREATE_COMPLAINTS_DETAILS_SQL, statement_done())
            .with_result(&sql::complaint_details_sql(None), sample_complaint_details(None))
            .with_result(sql::CREATE_MARK_TYPES_SQL, statement_done())
            .with_result(sql::SELECT_MARK_TYPES_SQL, sample_mark_types());
        for year in SAMPLE_YEARS {
            engine = engine
                .with_result(
                    &sql::complaint_types_for_year_sql(year),
                    sample_complaint_types(year),
                )
                .with_result(
                    &sql::complaint_details_sql(Some(year)),
                    sample_complaint_details(Some(year)),
                );
        }
        for table in [FlightsTable::Flights200k, FlightsTable::Flights10m] {
            engine = engine
                .with_result(&sql::create_flights_view_sql(table), statement_done())
                .with_result(
                    &sql::flights_histogram_sql(table, FlightsField::Delay, None),
                    sample_flights_histogram(FlightsField::Delay, None),
                );
            let delay_bins = std::iter::once(None).chain(histogram_bins(FlightsField::Delay).map(Some));
            for delay_bin in delay_bins {
                for field in [FlightsField::Time, FlightsField::Distance] {
                    engine = engine.with_result(
                        &sql::flights_histogram_sql(table, field, delay_bin),
                        sample_flights_histogram(field, delay_bin),
                    );
                }
            }
        }
        engine
    }

    /// Registers the table returned for `sql`.
    pub fn with_result(self, sql: &str, table: Table) -> Self {
        self.update(|state| {
            state
                .responses
                .insert(normalize_sql(sql), MockResponse::Rows(table));
        })
    }

    /// Registers an engine error message returned for `sql`.
    pub fn with_error(self, sql: &str, message: impl Into<String>) -> Self {
        self.update(|state| {
            state
                .responses
                .insert(normalize_sql(sql), MockResponse::Error(message.into()));
        })
    }

    /// Only accept the given token (may be called repeatedly).
    pub fn with_valid_token(self, token: &str) -> Self {
        self.update(|state| {
            state
                .valid_tokens
                .get_or_insert_with(HashSet::new)
                .insert(token.to_string());
        })
    }

    /// Delays session initialization.
    pub fn with_init_delay(self, delay: Duration) -> Self {
        self.update(|state| state.init_delay = delay)
    }

    /// Makes every session initialization fail with `message`.
    pub fn with_init_error(self, message: impl Into<String>) -> Self {
        self.update(|state| state.init_error = Some(message.into()))
    }

    /// Maximum rows per streamed batch.
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        self.update(|state| state.batch_size = batch_size.max(1))
    }

    /// Number of sessions created so far.
    pub fn sessions_created(&self) -> u64 {
        self.state.sessions_created.load(Ordering::SeqCst)
    }

    /// Number of queries evaluated so far, across sessions.
    pub fn queries_evaluated(&self) -> u64 {
        self.state.queries_evaluated.load(Ordering::SeqCst)
    }

    /// Builder mutations only happen before the engine is shared.
    fn update(mut self, f: impl FnOnce(&mut MockState)) -> Self {
        match Arc::get_mut(&mut self.state) {
            Some(state) => f(state),
            None => tracing::warn!("MockEngine configured after being shared; change ignored"),
        }
        self
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine for MockEngine {
    fn create_session(
        &self,
        credential: &Credential,
        _endpoint: Option<&str>,
    ) -> Arc<dyn EngineSession> {
        let n = self.state.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Arc::new(MockSession {
            id: format!("mock-session-{n}"),
            credential: credential.clone(),
            state: Arc::clone(&self.state),
            initialized: AtomicBool::new(false),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A session of [`MockEngine`].
pub struct MockSession {
    id: String,
    credential: Credential,
    state: Arc<MockState>,
    initialized: AtomicBool,
}

impl MockSession {
    fn lookup(&self, sql: &str) -> Result<Table> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(ExploreError::connection("Session is not initialized"));
        }
        self.state.queries_evaluated.fetch_add(1, Ordering::SeqCst);

        match self.state.responses.get(&normalize_sql(sql)) {
            Some(MockResponse::Rows(table)) => Ok(table.clone()),
            Some(MockResponse::Error(message)) => Err(ExploreError::from_engine_message(message.clone())),
            None => Err(ExploreError::from_engine_message(unknown_query_message(sql))),
        }
    }
}

#[async_trait]
impl EngineSession for MockSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self) -> Result<()> {
        if !self.state.init_delay.is_zero() {
            tokio::time::sleep(self.state.init_delay).await;
        }
        if let Some(message) = &self.state.init_error {
            return Err(ExploreError::initialization(message.clone()));
        }
        if self.credential.is_empty() {
            return Err(ExploreError::initialization("No token provided"));
        }
        if let Some(valid) = &self.state.valid_tokens {
            if !valid.contains(self.credential.expose()) {
                return Err(ExploreError::initialization("Invalid token"));
            }
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn evaluate_query(&self, sql: &str) -> Result<QueryResult> {
        Ok(QueryResult::Materialized(self.lookup(sql)?))
    }

    async fn evaluate_streaming_query(&self, sql: &str) -> Result<QueryResult> {
        let table = self.lookup(sql)?;
        let batch_size = self.state.batch_size;
        let batches = table
            .batches()
            .iter()
            .flat_map(|batch| split_batch(batch, batch_size))
            .collect();
        Ok(QueryResult::Streaming(BatchStream::from_batches(
            table.schema(),
            batches,
        )))
    }
}

fn split_batch(batch: &RecordBatch, batch_size: usize) -> Vec<RecordBatch> {
    (0..batch.num_rows())
        .step_by(batch_size)
        .map(|offset| batch.slice(offset, batch_size.min(batch.num_rows() - offset)))
        .collect()
}

/// Lowercases and collapses whitespace so formatting differences don't matter.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(';')
        .trim()
        .to_lowercase()
}

/// Mimics the engine's catalog error for an unknown relation.
fn unknown_query_message(sql: &str) -> String {
    let mut words = sql.split_whitespace();
    let relation = words
        .by_ref()
        .find(|w| w.eq_ignore_ascii_case("from"))
        .and_then(|_| words.next())
        .map(|w| w.trim_end_matches(';'));

    match relation {
        Some(name) => format!("Catalog Error: Table with name {name} does not exist!"),
        None => format!("Mock engine has no result for query: {}", sql.trim()),
    }
}

const SAMPLE_YEARS: std::ops::RangeInclusive<i32> = 2010..=2022;

const SAMPLE_COMPLAINT_TYPES: [(&str, i32); 8] = [
    ("Noise - Residential", 34),
    ("Illegal Parking", 22),
    ("Blocked Driveway", 15),
    ("Noise - Street/Sidewalk", 10),
    ("Noise - Commercial", 7),
    ("Noise - Vehicle", 5),
    ("Non-Emergency Police Matter", 4),
    ("Abandoned Vehicle", 3),
];

fn sample_total(year: i32) -> i32 {
    // Steady growth with a bump in 2020.
    let base = 120_000 + (year - 2010) * 45_000;
    if year == 2020 {
        base + 90_000
    } else {
        base
    }
}

/// Builds a single-batch table; an inconsistent batch yields an empty table.
fn sample_table(fields: Vec<Field>, columns: Vec<ArrayRef>) -> Table {
    let schema = Arc::new(Schema::new(fields));
    match RecordBatch::try_new(schema.clone(), columns) {
        Ok(batch) => Table::new(schema, vec![batch]),
        Err(_) => Table::empty(schema),
    }
}

/// Result of a statement that returns no rows.
fn statement_done() -> Table {
    Table::empty(Arc::new(Schema::empty()))
}

fn sample_complaints_by_year() -> Table {
    let years: Vec<i32> = SAMPLE_YEARS.collect();
    let totals: Vec<i32> = years.iter().copied().map(sample_total).collect();
    sample_table(
        vec![
            Field::new(sql::YEAR_COLUMN, DataType::Int32, false),
            Field::new(sql::COMPLAINTS_COLUMN, DataType::Int32, false),
        ],
        vec![
            Arc::new(Int32Array::from(years)) as ArrayRef,
            Arc::new(Int32Array::from(totals)) as ArrayRef,
        ],
    )
}

fn type_count(year: i32, pct: i32) -> i32 {
    sample_total(year) / 100 * pct
}

fn sample_complaint_types(year: i32) -> Table {
    let names: Vec<&str> = SAMPLE_COMPLAINT_TYPES.iter().map(|(name, _)| *name).collect();
    let counts: Vec<i32> = SAMPLE_COMPLAINT_TYPES
        .iter()
        .map(|(_, pct)| type_count(year, *pct))
        .collect();
    sample_table(
        vec![
            Field::new(sql::TYPE_COLUMN, DataType::Utf8, false),
            Field::new(sql::COMPLAINTS_COLUMN, DataType::Int32, false),
        ],
        vec![
            Arc::new(StringArray::from(names)) as ArrayRef,
            Arc::new(Int32Array::from(counts)) as ArrayRef,
        ],
    )
}

/// Rows of `complaints_details`, capped like the real query.
fn sample_complaint_details(year: Option<i32>) -> Table {
    let rows: Vec<(i32, &str, i32)> = SAMPLE_YEARS
        .filter(|y| year.map_or(true, |year| year == *y))
        .flat_map(|y| {
            SAMPLE_COMPLAINT_TYPES
                .iter()
                .map(move |(name, pct)| (y, *name, type_count(y, *pct)))
        })
        .take(sql::DETAILS_LIMIT)
        .collect();
    sample_table(
        vec![
            Field::new(sql::YEAR_COLUMN, DataType::Int32, false),
            Field::new(sql::TYPE_COLUMN, DataType::Utf8, false),
            Field::new(sql::COMPLAINTS_COLUMN, DataType::Int32, false),
        ],
        vec![
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.0))) as ArrayRef,
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.1))) as ArrayRef,
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.2))) as ArrayRef,
        ],
    )
}

fn sample_mark_types() -> Table {
    sample_table(
        vec![
            Field::new("u", DataType::Utf8, false),
            Field::new("v", DataType::Int32, false),
        ],
        vec![
            Arc::new(StringArray::from(vec!["A", "B", "C", "D", "E", "F", "G", "H"])) as ArrayRef,
            Arc::new(Int32Array::from(vec![2, 8, 3, 7, 5, 4, 6, 1])) as ArrayRef,
        ],
    )
}

/// Lower bounds of the histogram bins for `field`.
fn histogram_bins(field: FlightsField) -> impl Iterator<Item = i64> {
    let (start, end) = match field {
        FlightsField::Delay => (-60, 180),
        FlightsField::Time => (0, 23),
        FlightsField::Distance => (0, 2750),
    };
    (start..=end).step_by(field.bin_width() as usize)
}

/// A unimodal histogram. A delay bin keeps a share of each bin that shrinks
/// with the bin's distance from on-time arrivals.
fn sample_flights_histogram(field: FlightsField, delay_bin: Option<i64>) -> Table {
    let peak = match field {
        FlightsField::Delay => 0,
        FlightsField::Time => 14,
        FlightsField::Distance => 500,
    };
    let width = field.bin_width();
    let share = delay_bin.map_or(1.0, |bin| 0.4 / (1.0 + (bin.abs() / 20) as f64));

    let (bins, counts): (Vec<i32>, Vec<i32>) = histogram_bins(field)
        .map(|bin| {
            let steps = ((bin - peak) / width).abs() as f64;
            let count = 20_000.0 / (1.0 + steps) * share;
            (bin as i32, count.round() as i32)
        })
        .unzip();
    sample_table(
        vec![
            Field::new(sql::BIN_COLUMN, DataType::Int32, false),
            Field::new(sql::FLIGHTS_COLUMN, DataType::Int32, false),
        ],
        vec![
            Arc::new(Int32Array::from(bins)) as ArrayRef,
            Arc::new(Int32Array::from(counts)) as ArrayRef,
        ],
    )
}
