//! Visualizations offered by the explorer.
//!
//! A [`Viz`] is a fixed recipe: setup statements that prepare session-local
//! tables, a primary bar chart, and detail panels that follow the bar
//! selected on the primary chart. Loading runs everything through a
//! [`QueryExecutor`], so the UI only ever sees finished [`VizData`].

use crate::error::{ExploreError, Result};
use crate::query::{Connector, Query, QueryExecutor};
use crate::result::RowSet;
use crate::sql::{self, FlightsField, FlightsTable};

/// One bar of a chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarDatum {
    pub label: String,
    pub value: u64,
}

/// Builds chart bars from two columns of a row set.
///
/// Negative or non-numeric values count as zero.
pub fn bars_from_rows(rows: &RowSet, label_column: &str, value_column: &str) -> Result<Vec<BarDatum>> {
    rows.iter()
        .map(|row| {
            let label = row.get(label_column).ok_or_else(|| {
                ExploreError::query(format!("Result has no column {label_column}"))
            })?;
            let value = row.get(value_column).ok_or_else(|| {
                ExploreError::query(format!("Result has no column {value_column}"))
            })?;
            Ok(BarDatum {
                label: label.to_display_string(),
                value: value
                    .as_i64()
                    .and_then(|v| u64::try_from(v).ok())
                    .unwrap_or(0),
            })
        })
        .collect()
}

/// The explorations, in selector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viz {
    /// Complaints per year with a per-year drill-down chart.
    #[default]
    ComplaintsByYear,
    /// The eight-row `md` demo table.
    MarkTypes,
    /// Complaints per year over temp tables, filtering a details table.
    NypdComplaints,
    /// Delay, departure time and distance histograms over 200K flights.
    Flights200k,
    /// The same histograms over 10M flights.
    Flights10m,
}

impl Viz {
    pub const ALL: [Viz; 5] = [
        Viz::ComplaintsByYear,
        Viz::MarkTypes,
        Viz::NypdComplaints,
        Viz::Flights200k,
        Viz::Flights10m,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ComplaintsByYear => "Complaints by Year",
            Self::MarkTypes => "Mark Types",
            Self::NypdComplaints => "NYPD Complaints",
            Self::Flights200k => "Flights 200K",
            Self::Flights10m => "Flights 10M",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|v| *v == self).unwrap_or(0)
    }

    /// The viz after this one, wrapping around.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// The viz before this one, wrapping around.
    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn flights_table(self) -> Option<FlightsTable> {
        match self {
            Self::Flights200k => Some(FlightsTable::Flights200k),
            Self::Flights10m => Some(FlightsTable::Flights10m),
            _ => None,
        }
    }

    /// Statements run, in order, before the charts are queried.
    pub fn setup_sql(self) -> Vec<String> {
        match self {
            Self::ComplaintsByYear => Vec::new(),
            Self::MarkTypes => vec![sql::CREATE_MARK_TYPES_SQL.to_string()],
            Self::NypdComplaints => vec![
                sql::CREATE_COMPLAINTS_TABLE_SQL.to_string(),
                sql::CREATE_COMPLAINTS_DETAILS_SQL.to_string(),
            ],
            Self::Flights200k | Self::Flights10m => self
                .flights_table()
                .map(sql::create_flights_view_sql)
                .into_iter()
                .collect(),
        }
    }

    /// The chart whose bars can be selected.
    pub fn primary(self) -> Panel {
        match self {
            Self::ComplaintsByYear => Panel::bars(
                "Complaints by year",
                sql::COMPLAINTS_BY_YEAR_SQL,
                sql::YEAR_COLUMN,
                sql::COMPLAINTS_COLUMN,
            ),
            Self::MarkTypes => Panel::bars("md: v by u", sql::SELECT_MARK_TYPES_SQL, "u", "v"),
            Self::NypdComplaints => Panel::bars(
                "Complaints by year",
                sql::SELECT_COMPLAINTS_TABLE_SQL,
                sql::YEAR_COLUMN,
                sql::COMPLAINTS_COLUMN,
            ),
            Self::Flights200k | Self::Flights10m => {
                flights_panel(self.flights_table(), FlightsField::Delay, None, "Arrival delay (min)")
            }
        }
    }

    /// Whether selecting a bar on the primary chart filters the details.
    pub fn is_selectable(self) -> bool {
        self != Self::MarkTypes
    }

    /// Detail panels for the current selection (a bar label parsed as an integer).
    pub fn details(self, selection: Option<i64>) -> Vec<Panel> {
        match self {
            Self::ComplaintsByYear => selection
                .and_then(|year| i32::try_from(year).ok())
                .map(|year| {
                    vec![Panel::bars(
                        format!("Complaint types in {year}"),
                        sql::complaint_types_for_year_sql(year),
                        sql::TYPE_COLUMN,
                        sql::COMPLAINTS_COLUMN,
                    )
                    .horizontal()]
                })
                .unwrap_or_default(),
            Self::MarkTypes => Vec::new(),
            Self::NypdComplaints => {
                let year = selection.and_then(|year| i32::try_from(year).ok());
                let title = match year {
                    Some(year) => format!("complaints_details │ Year = {year}"),
                    None => "complaints_details".to_string(),
                };
                vec![Panel::table(title, sql::complaint_details_sql(year))]
            }
            Self::Flights200k | Self::Flights10m => {
                let table = self.flights_table();
                vec![
                    flights_panel(table, FlightsField::Time, selection, "Departure time (h)"),
                    flights_panel(table, FlightsField::Distance, selection, "Distance (mi)"),
                ]
            }
        }
    }
}

fn flights_panel(
    table: Option<FlightsTable>,
    field: FlightsField,
    delay_bin: Option<i64>,
    title: &str,
) -> Panel {
    let table = table.unwrap_or(FlightsTable::Flights200k);
    let title = match delay_bin {
        Some(bin) if field != FlightsField::Delay => {
            let end = bin + FlightsField::Delay.bin_width();
            format!("{title} │ delay {bin}..{end}")
        }
        _ => title.to_string(),
    };
    Panel::bars(
        title,
        sql::flights_histogram_sql(table, field, delay_bin),
        sql::BIN_COLUMN,
        sql::FLIGHTS_COLUMN,
    )
}

/// How a panel presents its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelKind {
    Bars {
        label_column: &'static str,
        value_column: &'static str,
        horizontal: bool,
    },
    Table,
}

/// A query plus how to show its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub title: String,
    pub sql: String,
    pub kind: PanelKind,
}

impl Panel {
    pub fn bars(
        title: impl Into<String>,
        sql: impl Into<String>,
        label_column: &'static str,
        value_column: &'static str,
    ) -> Self {
        Self {
            title: title.into(),
            sql: sql.into(),
            kind: PanelKind::Bars {
                label_column,
                value_column,
                horizontal: false,
            },
        }
    }

    pub fn table(title: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sql: sql.into(),
            kind: PanelKind::Table,
        }
    }

    fn horizontal(mut self) -> Self {
        if let PanelKind::Bars { horizontal, .. } = &mut self.kind {
            *horizontal = true;
        }
        self
    }

    /// Shapes a query result for this panel.
    pub fn load(&self, rows: RowSet) -> Result<LoadedPanel> {
        let content = match self.kind {
            PanelKind::Bars {
                label_column,
                value_column,
                horizontal,
            } => PanelContent::Bars {
                bars: bars_from_rows(&rows, label_column, value_column)?,
                horizontal,
            },
            PanelKind::Table => PanelContent::Table(rows),
        };
        Ok(LoadedPanel {
            title: self.title.clone(),
            content,
        })
    }
}

/// What a loaded panel shows.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelContent {
    Bars { bars: Vec<BarDatum>, horizontal: bool },
    Table(RowSet),
}

/// A panel with its data.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPanel {
    pub title: String,
    pub content: PanelContent,
}

/// Everything a viz shows right after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct VizData {
    pub title: String,
    pub primary: Vec<BarDatum>,
    pub details: Vec<LoadedPanel>,
}

async fn fetch_panel(executor: &QueryExecutor, panel: &Panel) -> Result<LoadedPanel> {
    let rows = executor.fetch_rows(&panel.sql).await?;
    panel.load(rows)
}

/// Runs the setup statements, then loads the primary chart and the
/// unfiltered details.
pub async fn load(executor: &QueryExecutor, viz: Viz) -> Result<VizData> {
    for statement in viz.setup_sql() {
        executor.query(Query::exec(statement)).await?;
    }

    let primary = viz.primary();
    let loaded = fetch_panel(executor, &primary).await?;
    let bars = match loaded.content {
        PanelContent::Bars { bars, .. } => bars,
        PanelContent::Table(_) => Vec::new(),
    };

    Ok(VizData {
        title: loaded.title,
        primary: bars,
        details: load_details(executor, viz, None).await?,
    })
}

/// Loads the detail panels for `selection`.
pub async fn load_details(
    executor: &QueryExecutor,
    viz: Viz,
    selection: Option<i64>,
) -> Result<Vec<LoadedPanel>> {
    let mut panels = Vec::new();
    for panel in viz.details(selection) {
        panels.push(fetch_panel(executor, &panel).await?);
    }
    Ok(panels)
}
