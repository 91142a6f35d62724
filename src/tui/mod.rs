//! Terminal User Interface for duck-explore.
//!
//! Provides the main TUI application loop using ratatui and crossterm.
//! Queries run on tokio tasks and report back over a channel, so the UI
//! keeps drawing while the connection initializes.

pub mod app;
mod events;
mod ui;

pub use app::{Action, App, Screen};
pub use events::{Event, EventHandler};

use crate::auth::{credential_from_clipboard, Credential};
use crate::connection::{ConnectionManager, ManagerState};
use crate::error::{ExploreError, Result};
use crate::query::QueryExecutor;
use crate::viz::{self, LoadedPanel, Viz, VizData};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Messages sent from background tasks to the main loop.
#[derive(Debug)]
pub enum AsyncMessage {
    /// A viz finished its setup and first queries.
    VizLoaded(Viz, Result<VizData>),
    /// Detail panels for a selection finished loading.
    DetailsLoaded(Viz, Option<i64>, Result<Vec<LoadedPanel>>),
    /// The clipboard was read.
    Pasted(Result<Credential>),
}

impl AsyncMessage {
    /// Applies the message to the application state.
    pub fn apply(self, app: &mut App) {
        match self {
            Self::VizLoaded(viz, result) => app.on_viz_loaded(viz, result),
            Self::DetailsLoaded(viz, selection, result) => {
                app.on_details_loaded(viz, selection, result)
            }
            Self::Pasted(result) => app.on_paste(result),
        }
    }
}

/// Everything the TUI needs to run a session.
pub struct TuiContext {
    pub manager: ConnectionManager,
    /// Shown on the connect pane.
    pub token_url: Option<String>,
    /// Connect immediately with this credential.
    pub initial_credential: Option<Credential>,
}

/// Starts background work for UI actions.
struct Dispatcher {
    manager: ConnectionManager,
    executor: Option<QueryExecutor>,
    tx: mpsc::Sender<AsyncMessage>,
}

impl Dispatcher {
    fn dispatch(&mut self, action: Action) {
        match action {
            Action::Connect(credential, viz) => self.connect(credential, viz),
            Action::Paste => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = tokio::task::spawn_blocking(credential_from_clipboard)
                        .await
                        .map_err(|e| ExploreError::internal(format!("Clipboard task failed: {e}")))
                        .and_then(|r| r);
                    let _ = tx.send(AsyncMessage::Pasted(result)).await;
                });
            }
            Action::LoadViz(viz) => self.load_viz(viz),
            Action::Select(viz, selection) => {
                let Some(executor) = self.executor.clone() else {
                    debug!("Selection changed without a connection");
                    return;
                };
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = viz::load_details(&executor, viz, selection).await;
                    let _ = tx
                        .send(AsyncMessage::DetailsLoaded(viz, selection, result))
                        .await;
                });
            }
        }
    }

    /// Connects, starting a new session first if the last connection failed.
    fn connect(&mut self, credential: Credential, viz: Viz) {
        if self.manager.state() == ManagerState::Failed {
            self.manager = self.manager.new_session();
            self.executor = None;
        }

        let outcome = self.manager.connect(credential);
        if !outcome.is_started() {
            return;
        }
        self.executor = Some(QueryExecutor::new(outcome.connection().clone()));
        self.load_viz(viz);
    }

    fn load_viz(&self, viz: Viz) {
        let Some(executor) = self.executor.clone() else {
            debug!("Viz {} requested without a connection", viz.name());
            return;
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = viz::load(&executor, viz).await;
            let _ = tx.send(AsyncMessage::VizLoaded(viz, result)).await;
        });
    }
}

/// The main TUI application runner.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    event_handler: EventHandler,
    /// Stops the event reader thread.
    shutdown_flag: Arc<AtomicBool>,
}

impl Tui {
    /// Creates a new TUI instance, initializing the terminal.
    pub fn new() -> Result<Self> {
        let terminal = Self::setup_terminal()?;
        Ok(Self {
            terminal,
            event_handler: EventHandler::new(),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()
            .map_err(|e| ExploreError::internal(format!("Failed to enable raw mode: {e}")))?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)
            .map_err(|e| ExploreError::internal(format!("Failed to enter alternate screen: {e}")))?;

        Terminal::new(CrosstermBackend::new(stdout))
            .map_err(|e| ExploreError::internal(format!("Failed to create terminal: {e}")))
    }

    fn restore_terminal(&mut self) -> Result<()> {
        disable_raw_mode()
            .map_err(|e| ExploreError::internal(format!("Failed to disable raw mode: {e}")))?;

        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(|e| ExploreError::internal(format!("Failed to leave alternate screen: {e}")))?;

        self.terminal
            .show_cursor()
            .map_err(|e| ExploreError::internal(format!("Failed to show cursor: {e}")))
    }

    /// Runs the event loop until the user quits.
    pub async fn run(&mut self, ctx: TuiContext) -> Result<()> {
        let original_hook = panic::take_hook();
        let shutdown_flag = Arc::clone(&self.shutdown_flag);
        panic::set_hook(Box::new(move |panic_info| {
            shutdown_flag.store(true, Ordering::SeqCst);
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            original_hook(panic_info);
        }));

        let engine_info = match ctx.manager.endpoint() {
            Some(endpoint) => format!("{} @ {}", ctx.manager.engine_name(), endpoint),
            None => ctx.manager.engine_name().to_string(),
        };
        let mut app = App::new(engine_info, ctx.token_url);

        let (tx, rx) = mpsc::channel::<AsyncMessage>(32);
        let mut dispatcher = Dispatcher {
            manager: ctx.manager,
            executor: None,
            tx,
        };
        if let Some(credential) = ctx.initial_credential {
            if let Some(action) = app.connect_with(credential) {
                dispatcher.dispatch(action);
            }
        }

        let result = self.run_event_loop(&mut app, &mut dispatcher, rx).await;

        self.shutdown_flag.store(true, Ordering::SeqCst);
        let _ = panic::take_hook();
        result
    }

    async fn run_event_loop(
        &mut self,
        app: &mut App,
        dispatcher: &mut Dispatcher,
        mut rx: mpsc::Receiver<AsyncMessage>,
    ) -> Result<()> {
        let mut events = self.spawn_event_reader();

        loop {
            self.terminal
                .draw(|frame| ui::render(frame, app))
                .map_err(|e| ExploreError::internal(format!("Failed to draw: {e}")))?;

            if !app.running {
                break;
            }

            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(Ok(event)) => {
                            if let Some(action) = app.handle_event(event) {
                                dispatcher.dispatch(action);
                            }
                        }
                        Some(Err(e)) => {
                            error!("Terminal event error: {}", e);
                            return Err(e);
                        }
                        None => break,
                    }
                }
                Some(msg) = rx.recv() => {
                    msg.apply(app);
                }
            }
        }

        info!("Exiting");
        Ok(())
    }

    /// Reads terminal events on the blocking pool until shutdown.
    fn spawn_event_reader(&self) -> mpsc::Receiver<Result<Event>> {
        let (tx, rx) = mpsc::channel(64);
        let handler = self.event_handler;
        let shutdown = Arc::clone(&self.shutdown_flag);
        tokio::task::spawn_blocking(move || {
            while !shutdown.load(Ordering::SeqCst) {
                let event = handler.next();
                let failed = event.is_err();
                if matches!(event, Ok(Event::Tick)) {
                    continue;
                }
                if tx.blocking_send(event).is_err() || failed {
                    break;
                }
            }
        });
        rx
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        let _ = self.restore_terminal();
    }
}

/// Runs the TUI application.
pub async fn run(ctx: TuiContext) -> Result<()> {
    let mut tui = Tui::new()?;
    tui.run(ctx).await
}
