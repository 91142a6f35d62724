//! SQL for the bundled explorations.
//!
//! The complaints queries read `sample_data.nyc.service_requests`, which
//! MotherDuck accounts have attached by default. The flights queries need
//! the `mosaic_examples` share:
//! `ATTACH 'md:_share/mosaic_examples/b01cfda8-239e-4148-a228-054b94cdc3b4'`.

/// Column holding the complaint year.
pub const YEAR_COLUMN: &str = "Year";

/// Column holding a complaint count.
pub const COMPLAINTS_COLUMN: &str = "Complaints";

/// Column holding the complaint type.
pub const TYPE_COLUMN: &str = "Type";

/// Lower bound of a histogram bin.
pub const BIN_COLUMN: &str = "Bin";

/// Number of flights in a histogram bin.
pub const FLIGHTS_COLUMN: &str = "Flights";

/// Rows shown in the complaint details table.
pub const DETAILS_LIMIT: usize = 100;

/// Complaints received by the NYPD per year, before 2023.
pub const COMPLAINTS_BY_YEAR_SQL: &str = "
from sample_data.nyc.service_requests
select year(created_date)::int as Year, count(*)::int as Complaints
where Year < 2023
and agency_name = 'New York City Police Department'
group by 1
order by 1
";

/// Materializes the per-year counts into a session-local `complaints` table.
pub const CREATE_COMPLAINTS_TABLE_SQL: &str = "
create or replace temp table complaints as
select year(created_date)::int as Year, count(*)::int as Complaints
from sample_data.nyc.service_requests
where Year < 2023
and agency_name = 'New York City Police Department'
group by 1
order by 1;
";

/// Materializes per-year, per-type counts into `complaints_details`.
pub const CREATE_COMPLAINTS_DETAILS_SQL: &str = "
create or replace temp table complaints_details as
select year(created_date)::int as Year, complaint_type as Type, count(*)::int as Complaints
from sample_data.nyc.service_requests
where Year < 2023
and agency_name = 'New York City Police Department'
group by 1, 2
order by 1, 3 desc;
";

/// Reads back the table created by [`CREATE_COMPLAINTS_TABLE_SQL`].
pub const SELECT_COMPLAINTS_TABLE_SQL: &str = "select Year, Complaints from complaints order by Year";

/// Complaint types for one year, most frequent first.
///
/// `year` is an integer, so interpolating it cannot inject SQL.
pub fn complaint_types_for_year_sql(year: i32) -> String {
    format!(
        "
from sample_data.nyc.service_requests
select complaint_type as Type, count(*)::int as Complaints
where year(created_date) < 2023
and agency_name = 'New York City Police Department'
and year(created_date) = {year}
group by 1
order by 2 desc
"
    )
}

/// Rows of `complaints_details`, restricted to `year` when given.
pub fn complaint_details_sql(year: Option<i32>) -> String {
    let filter = year
        .map(|year| format!("where Year = {year} "))
        .unwrap_or_default();
    format!(
        "select Year, Type, Complaints from complaints_details {filter}order by Year, Complaints desc limit {DETAILS_LIMIT}"
    )
}

/// Creates the eight-row `md` table used by the mark types viz.
pub const CREATE_MARK_TYPES_SQL: &str = "
create or replace temp table md as
select * from (values
  (0, 'A', 2), (1, 'B', 8), (2, 'C', 3), (3, 'D', 7),
  (4, 'E', 5), (5, 'F', 4), (6, 'G', 6), (7, 'H', 1)
) t(i, u, v);
";

/// Reads the `md` table in insertion order.
pub const SELECT_MARK_TYPES_SQL: &str = "select u, v from md order by i";

/// Flights tables in the `mosaic_examples` share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightsTable {
    Flights200k,
    Flights10m,
}

impl FlightsTable {
    /// Fully qualified source table.
    pub fn source(self) -> &'static str {
        match self {
            Self::Flights200k => "mosaic_examples.main.flights_200k",
            Self::Flights10m => "mosaic_examples.main.flights_10m",
        }
    }

    /// Session-local view with `delay`, `time` and `distance` columns.
    pub fn view(self) -> &'static str {
        match self {
            Self::Flights200k => "flights_200k_viz",
            Self::Flights10m => "flights_10m_viz",
        }
    }
}

/// Histogrammed flight attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightsField {
    /// Arrival delay in minutes.
    Delay,
    /// Departure time in hours.
    Time,
    /// Distance in miles.
    Distance,
}

impl FlightsField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Delay => "delay",
            Self::Time => "time",
            Self::Distance => "distance",
        }
    }

    pub fn bin_width(self) -> i64 {
        match self {
            Self::Delay => 20,
            Self::Time => 1,
            Self::Distance => 250,
        }
    }
}

/// Creates the view the flights histograms read.
///
/// The 10M table has raw column names and unbounded delays, so its view
/// renames them and clamps delays to [-60, 180].
pub fn create_flights_view_sql(table: FlightsTable) -> String {
    let view = table.view();
    let source = table.source();
    match table {
        FlightsTable::Flights200k => {
            format!("create temp view if not exists {view} as select * from {source}")
        }
        FlightsTable::Flights10m => format!(
            "create temp view if not exists {view} as \
             select GREATEST(-60, LEAST(ARR_DELAY, 180))::DOUBLE as delay, \
             DISTANCE as distance, DEP_TIME as time from {source}"
        ),
    }
}

/// Histogram of `field`, restricted to one delay bin when `delay_bin` is set.
pub fn flights_histogram_sql(table: FlightsTable, field: FlightsField, delay_bin: Option<i64>) -> String {
    let column = field.column();
    let width = field.bin_width();
    let view = table.view();
    let filter = delay_bin
        .map(|bin| {
            let end = bin + FlightsField::Delay.bin_width();
            format!("and delay >= {bin} and delay < {end} ")
        })
        .unwrap_or_default();
    format!(
        "select (floor({column} / {width}) * {width})::int as Bin, count(*)::int as Flights \
         from {view} where {column} is not null {filter}group by 1 order by 1"
    )
}
