//! UI rendering for the TUI.
//!
//! Defines the layout and renders each pane.

use super::app::{App, Screen};
use crate::result::RowSet;
use crate::viz::{BarDatum, LoadedPanel, PanelContent, Viz};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};

/// Renders the entire UI.
pub fn render(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(3),    // Pane
            Constraint::Length(1), // Status
        ])
        .split(frame.area());

    render_header(frame, main_layout[0], app);
    match app.screen {
        Screen::Connect => render_connect(frame, main_layout[1], app),
        Screen::Loading => render_loading(frame, main_layout[1], app),
        Screen::Charts => render_charts(frame, main_layout[1], app),
        Screen::Error => render_error(frame, main_layout[1], app),
    }
    render_status(frame, main_layout[2], app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let style = Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let text = format!(
        " duck-explore v{} │ {} │ {}",
        env!("CARGO_PKG_VERSION"),
        app.viz.name(),
        app.engine_info
    );
    frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_connect(frame: &mut Frame, area: Rect, app: &App) {
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from("Paste or type your access token:"),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Cyan)),
            Span::raw(app.token_input.masked()),
        ]),
        Line::from(""),
    ];
    if let Some(url) = &app.token_url {
        lines.push(Line::from(vec![
            Span::styled("Get a token: ", dim),
            Span::styled(url.as_str(), Style::default().fg(Color::Blue)),
        ]));
        lines.push(Line::from(""));
    }
    let enter_style = if app.can_connect() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        dim
    };
    lines.push(Line::from(vec![
        Span::styled("Enter", enter_style),
        Span::styled(": connect   ", dim),
        Span::styled("Ctrl+V", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(": paste   ", dim),
        Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(": quit", dim),
    ]));

    let block = Block::default().borders(Borders::ALL).title(" Connect ");
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );

    // Border (1) and prompt "> " (2)
    let cursor_x = area.x + 1 + 2 + app.token_input.cursor as u16;
    frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(2)), area.y + 2));
}

fn render_loading(frame: &mut Frame, area: Rect, app: &App) {
    let lines = vec![
        Line::from(Span::styled(
            format!("Connecting and loading {}...", app.viz.name()),
            Style::default().fg(Color::Yellow),
        )),
        Line::from(Span::styled(
            app.engine_info.as_str(),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let block = Block::default().borders(Borders::ALL).title(" Loading ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_charts(frame: &mut Frame, area: Rect, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(area);

    render_selector(frame, layout[0], app);

    if app.loading_viz {
        frame.render_widget(
            Paragraph::new("Loading, please wait…")
                .block(Block::default().borders(Borders::ALL).title(format!(" {} ", app.viz.name()))),
            layout[1],
        );
        return;
    }

    let show_details = !app.details.is_empty() || app.details_loading;
    let constraints = if show_details {
        [Constraint::Percentage(50), Constraint::Percentage(50)]
    } else {
        [Constraint::Percentage(100), Constraint::Length(0)]
    };
    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(layout[1]);

    render_primary(frame, body[0], app);
    if show_details {
        render_details(frame, body[1], app);
    }
}

fn render_selector(frame: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = Viz::ALL
        .iter()
        .enumerate()
        .map(|(i, viz)| Line::from(format!("{} {}", i + 1, viz.name())))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.viz.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .divider("│");
    frame.render_widget(tabs, area);
}

fn render_primary(frame: &mut Frame, area: Rect, app: &App) {
    let mut title = format!(" {}", app.title);
    if let Some(bar) = app.bars.get(app.cursor) {
        title.push_str(&format!(" │ {}: {}", bar.label, bar.value));
    }
    if let Some(selection) = app.selection {
        title.push_str(&format!(" │ selected {selection}"));
    }
    if app.viz.is_selectable() {
        title.push_str(" │ ←/→ move, Enter select ");
    } else {
        title.push(' ');
    }

    if app.bars.is_empty() {
        frame.render_widget(
            Paragraph::new("No data").block(Block::default().borders(Borders::ALL).title(title)),
            area,
        );
        return;
    }

    let bars: Vec<Bar> = app
        .bars
        .iter()
        .enumerate()
        .map(|(i, datum)| {
            let selected = app.selection.is_some_and(|s| datum.label == s.to_string());
            let color = if i == app.cursor {
                Color::Yellow
            } else if selected {
                Color::Green
            } else {
                Color::Cyan
            };
            bar(datum, Style::default().fg(color))
        })
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width(area, app.bars.len()))
        .bar_gap(1)
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    frame.render_widget(chart, area);
}

fn render_details(frame: &mut Frame, area: Rect, app: &App) {
    if app.details.is_empty() {
        frame.render_widget(
            Paragraph::new("Loading details...").block(Block::default().borders(Borders::ALL)),
            area,
        );
        return;
    }

    let count = app.details.len() as u32;
    let constraints: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count)).collect();
    let areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (panel, area) in app.details.iter().zip(areas.iter()) {
        render_panel(frame, *area, panel, app.details_loading);
    }
}

fn render_panel(frame: &mut Frame, area: Rect, panel: &LoadedPanel, stale: bool) {
    let suffix = if stale { " (updating)" } else { "" };
    match &panel.content {
        PanelContent::Bars { bars, horizontal } => {
            let block = Block::default()
                .borders(Borders::ALL)
                .title(format!(" {}{} ", panel.title, suffix));
            let style = Style::default().fg(Color::Magenta);
            let bars: Vec<Bar> = bars.iter().map(|datum| bar(datum, style)).collect();
            let chart = BarChart::default().block(block).data(BarGroup::default().bars(&bars));
            let chart = if *horizontal {
                chart.direction(Direction::Horizontal).bar_width(1).bar_gap(0)
            } else {
                chart.bar_width(bar_width(area, bars.len())).bar_gap(1)
            };
            frame.render_widget(chart, area);
        }
        PanelContent::Table(rows) => {
            let title = format!(" {} │ {} rows{} ", panel.title, rows.len(), suffix);
            frame.render_widget(rows_table(rows, title), area);
        }
    }
}

fn rows_table(rows: &RowSet, title: String) -> Table<'static> {
    let count = rows.columns.len().max(1) as u32;
    let widths: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count)).collect();
    let header = Row::new(rows.columns.iter().map(|c| Cell::from(c.clone())))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let body: Vec<Row> = rows
        .iter()
        .map(|row| Row::new(row.values().iter().map(|v| Cell::from(v.to_display_string()))))
        .collect();
    Table::new(body, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
}

/// Widest bar that still fits `count` bars in `area`, between 1 and 8.
fn bar_width(area: Rect, count: usize) -> u16 {
    let count = count.max(1) as u16;
    (area.width.saturating_sub(2) / count)
        .saturating_sub(1)
        .clamp(1, 8)
}

fn bar(datum: &BarDatum, style: Style) -> Bar<'_> {
    Bar::default()
        .label(Line::from(datum.label.as_str()))
        .value(datum.value)
        .text_value(abbreviate(datum.value))
        .style(style)
}

/// Short form of a count for bar labels: 950, 12k, 1.3M.
fn abbreviate(value: u64) -> String {
    match value {
        v if v >= 1_000_000 => format!("{:.1}M", v as f64 / 1_000_000.0),
        v if v >= 10_000 => format!("{}k", v / 1_000),
        v => v.to_string(),
    }
}

fn render_error(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();
    let mut footer = "q: quit";
    if let Some(error) = &app.error {
        lines.push(Line::from(Span::styled(
            error.category,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(error.message.as_str()));
        if let Some(hint) = &error.hint {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                hint.as_str(),
                Style::default().fg(Color::Yellow),
            )));
        }
        if error.can_reenter {
            footer = "Enter/Esc: enter a new token   q: quit";
        } else if app.connect_requested {
            footer = "Esc: back to charts   q: quit";
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        footer,
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Error ");
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let default = match app.screen {
        Screen::Charts => "Tab/1-5: switch viz   Esc: clear selection   q: quit",
        _ => "Ctrl+C: quit",
    };
    let text = app.status.as_deref().unwrap_or(default);
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use crate::error::ExploreError;
    use crate::result::{Row as DataRow, Value};
    use crate::viz::VizData;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn draw(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn bar(label: &str, value: u64) -> BarDatum {
        BarDatum {
            label: label.to_string(),
            value,
        }
    }

    fn charts_app(viz: Viz, details: Vec<LoadedPanel>) -> App {
        let mut app = App::new("mock", None);
        app.connect_with(Credential::new("t"));
        app.viz = viz;
        app.on_viz_loaded(
            viz,
            Ok(VizData {
                title: "Complaints by year".to_string(),
                primary: vec![bar("2021", 5), bar("2022", 9)],
                details,
            }),
        );
        app
    }

    #[test]
    fn test_connect_pane_masks_token() {
        let mut app = App::new(
            "mock",
            Some("https://app.motherduck.com/token-request?appName=x".to_string()),
        );
        app.token_input.set("secret");

        let screen = draw(&app);
        assert!(screen.contains("Connect"));
        assert!(screen.contains("••••••"));
        assert!(!screen.contains("secret"));
        assert!(screen.contains("token-request"));
    }

    #[test]
    fn test_charts_pane_shows_selector_and_bars() {
        let app = charts_app(Viz::ComplaintsByYear, Vec::new());

        let screen = draw(&app);
        assert!(screen.contains("1 Complaints by Year"));
        assert!(screen.contains("5 Flights 10M"));
        assert!(screen.contains("2021"));
        assert!(screen.contains("2022: 9"));
    }

    #[test]
    fn test_details_table_is_rendered() {
        let columns: Arc<[String]> =
            vec!["Year".to_string(), "Type".to_string(), "Complaints".to_string()].into();
        let rows = RowSet {
            columns: columns.to_vec(),
            rows: vec![DataRow::new(
                columns,
                vec![Value::Int(2021), Value::from("Illegal Parking"), Value::Int(3)],
            )],
        };
        let app = charts_app(
            Viz::NypdComplaints,
            vec![LoadedPanel {
                title: "complaints_details".to_string(),
                content: PanelContent::Table(rows),
            }],
        );

        let screen = draw(&app);
        assert!(screen.contains("complaints_details │ 1 rows"));
        assert!(screen.contains("Illegal Parking"));
    }

    #[test]
    fn test_loading_viz_shows_placeholder() {
        let mut app = charts_app(Viz::ComplaintsByYear, Vec::new());
        app.loading_viz = true;
        assert!(draw(&app).contains("Loading, please wait"));
    }

    #[test]
    fn test_error_pane_shows_hint() {
        let mut app = App::new("mock", None);
        app.show_error(&ExploreError::from_engine_message(
            "Catalog Error: Table with name sample_data.nyc.service_requests does not exist!",
        ));

        let screen = draw(&app);
        assert!(screen.contains("Missing Data Source"));
        assert!(screen.contains("ATTACH"));
    }

    #[test]
    fn test_connection_error_offers_new_token() {
        let mut app = App::new("mock", None);
        app.show_error(&ExploreError::initialization("Invalid token"));
        assert!(draw(&app).contains("enter a new token"));
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate(950), "950");
        assert_eq!(abbreviate(705_000), "705k");
        assert_eq!(abbreviate(1_300_000), "1.3M");
    }
}
