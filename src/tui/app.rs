//! Application state for the TUI.
//!
//! `App` is a plain state machine: key events and background results go in,
//! [`Action`]s for the runner come out. Nothing here touches the terminal
//! or spawns tasks, so it is tested directly.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::Event;
use crate::auth::Credential;
use crate::error::{ExploreError, Result};
use crate::viz::{BarDatum, LoadedPanel, Viz, VizData};

/// Which pane is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    /// Token entry.
    #[default]
    Connect,
    /// Waiting for the connection and the first viz.
    Loading,
    /// The current viz, with the selector.
    Charts,
    /// Something failed; see [`App::error`].
    Error,
}

/// Work the runner must start on behalf of the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Connect with this credential, then load the viz.
    Connect(Credential, Viz),
    /// Read a token from the clipboard.
    Paste,
    /// Run a viz's setup and load its charts.
    LoadViz(Viz),
    /// Reload a viz's detail panels for a selection.
    Select(Viz, Option<i64>),
}

/// Single-line text input. The cursor is a character index.
#[derive(Debug, Default)]
pub struct InputState {
    pub text: String,
    pub cursor: usize,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    fn byte_index(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor)
            .map_or(self.text.len(), |(i, _)| i)
    }

    /// Inserts a character at the cursor position.
    pub fn insert(&mut self, c: char) {
        let at = self.byte_index();
        self.text.insert(at, c);
        self.cursor += 1;
    }

    /// Inserts a string at the cursor position.
    pub fn insert_str(&mut self, s: &str) {
        let at = self.byte_index();
        self.text.insert_str(at, s);
        self.cursor += s.chars().count();
    }

    /// Deletes the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index();
            self.text.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.len() {
            self.cursor += 1;
        }
    }

    /// Replaces the whole text, moving the cursor to the end.
    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.len();
    }

    /// Clears the input and returns the previous text.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// The text with every character replaced by a bullet.
    pub fn masked(&self) -> String {
        "•".repeat(self.len())
    }
}

/// What the error pane shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorView {
    pub category: &'static str,
    pub message: String,
    pub hint: Option<String>,
    /// The connection failed and a new token may be entered.
    pub can_reenter: bool,
}

impl From<&ExploreError> for ErrorView {
    fn from(err: &ExploreError) -> Self {
        Self {
            category: err.category(),
            message: err.to_string(),
            hint: err.attach_hint(),
            can_reenter: matches!(err, ExploreError::ConnectionInitialization(_)),
        }
    }
}

/// Main application state.
pub struct App {
    /// Whether the application is still running.
    pub running: bool,
    pub screen: Screen,
    /// Token being typed on the connect pane.
    pub token_input: InputState,
    /// Where to get a token, shown on the connect pane.
    pub token_url: Option<String>,
    /// Engine and endpoint, for the header.
    pub engine_info: String,
    /// Set once a connection has been requested; cleared if it fails.
    pub connect_requested: bool,
    /// The viz shown on the charts pane.
    pub viz: Viz,
    /// The current viz is running its setup and first queries.
    pub loading_viz: bool,
    /// Title of the primary chart.
    pub title: String,
    /// Bars of the primary chart.
    pub bars: Vec<BarDatum>,
    /// Index into `bars`.
    pub cursor: usize,
    /// The bar value the details are filtered by.
    pub selection: Option<i64>,
    pub details: Vec<LoadedPanel>,
    /// Detail panels for `selection` are being loaded.
    pub details_loading: bool,
    pub error: Option<ErrorView>,
    /// One-line status message.
    pub status: Option<String>,
}

impl App {
    pub fn new(engine_info: impl Into<String>, token_url: Option<String>) -> Self {
        Self {
            running: true,
            screen: Screen::Connect,
            token_input: InputState::new(),
            token_url,
            engine_info: engine_info.into(),
            connect_requested: false,
            viz: Viz::default(),
            loading_viz: false,
            title: String::new(),
            bars: Vec::new(),
            cursor: 0,
            selection: None,
            details: Vec::new(),
            details_loading: false,
            error: None,
            status: None,
        }
    }

    /// Starts connecting with `credential`, unless a connection was
    /// already requested or the credential is empty.
    pub fn connect_with(&mut self, credential: Credential) -> Option<Action> {
        if self.connect_requested {
            self.status = Some("Already connected".to_string());
            return None;
        }
        if credential.is_empty() {
            self.status = Some("Enter a token first".to_string());
            return None;
        }
        self.connect_requested = true;
        self.loading_viz = true;
        self.screen = Screen::Loading;
        self.status = Some("Connecting...".to_string());
        Some(Action::Connect(credential, self.viz))
    }

    /// Whether Enter on the connect pane would connect.
    pub fn can_connect(&self) -> bool {
        !self.connect_requested && !self.token_input.is_empty()
    }

    /// The value of the bar under the cursor, when it is numeric.
    pub fn cursor_value(&self) -> Option<i64> {
        self.bars.get(self.cursor)?.label.parse().ok()
    }

    /// Handles an event and returns work for the runner, if any.
    pub fn handle_event(&mut self, event: Event) -> Option<Action> {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Resize(_, _) | Event::Tick => None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
                self.running = false;
                return None;
            }
            _ => {}
        }

        match self.screen {
            Screen::Connect => self.handle_connect_key(key, ctrl),
            Screen::Loading => {
                if key.code == KeyCode::Char('q') {
                    self.running = false;
                }
                None
            }
            Screen::Charts => self.handle_charts_key(key),
            Screen::Error => {
                self.handle_error_key(key);
                None
            }
        }
    }

    fn handle_connect_key(&mut self, key: KeyEvent, ctrl: bool) -> Option<Action> {
        match key.code {
            KeyCode::Char('v') if ctrl => return Some(Action::Paste),
            KeyCode::Char(c) if !ctrl => self.token_input.insert(c),
            KeyCode::Backspace => self.token_input.backspace(),
            KeyCode::Left => self.token_input.move_left(),
            KeyCode::Right => self.token_input.move_right(),
            KeyCode::Esc => self.running = false,
            KeyCode::Enter if self.can_connect() => {
                let token = self.token_input.take();
                return self.connect_with(Credential::new(token.trim()));
            }
            _ => {}
        }
        None
    }

    fn handle_charts_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Tab => return self.switch_viz(self.viz.next()),
            KeyCode::BackTab => return self.switch_viz(self.viz.prev()),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                let viz = Viz::ALL.get(index).copied()?;
                return self.switch_viz(viz);
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => {
                if self.cursor + 1 < self.bars.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => return self.toggle_selection(),
            KeyCode::Esc if self.selection.is_some() => return self.select(None),
            _ => {}
        }
        None
    }

    fn handle_error_key(&mut self, key: KeyEvent) {
        let can_reenter = self.error.as_ref().is_some_and(|e| e.can_reenter);
        match key.code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Esc | KeyCode::Enter if can_reenter => {
                self.error = None;
                self.connect_requested = false;
                self.screen = Screen::Connect;
                self.status = Some("Enter a new token to reconnect".to_string());
            }
            KeyCode::Esc if self.connect_requested => {
                self.error = None;
                self.screen = Screen::Charts;
            }
            _ => {}
        }
    }

    fn switch_viz(&mut self, viz: Viz) -> Option<Action> {
        if viz == self.viz && !self.bars.is_empty() {
            return None;
        }
        self.viz = viz;
        self.loading_viz = true;
        self.title.clear();
        self.bars.clear();
        self.cursor = 0;
        self.selection = None;
        self.details.clear();
        self.details_loading = false;
        self.status = Some(format!("Loading {}...", viz.name()));
        Some(Action::LoadViz(viz))
    }

    fn toggle_selection(&mut self) -> Option<Action> {
        if !self.viz.is_selectable() || self.loading_viz {
            return None;
        }
        let value = self.cursor_value()?;
        if self.selection == Some(value) {
            self.select(None)
        } else {
            self.select(Some(value))
        }
    }

    fn select(&mut self, selection: Option<i64>) -> Option<Action> {
        self.selection = selection;
        self.details_loading = true;
        self.status = selection.map(|value| format!("Filtering by {value}..."));
        Some(Action::Select(self.viz, selection))
    }

    /// Applies a finished viz load. Loads for another viz are dropped.
    pub fn on_viz_loaded(&mut self, viz: Viz, result: Result<VizData>) {
        if viz != self.viz {
            return;
        }
        self.loading_viz = false;
        match result {
            Ok(data) => {
                self.cursor = data.primary.len().saturating_sub(1);
                self.title = data.title;
                self.bars = data.primary;
                self.details = data.details;
                self.selection = None;
                self.details_loading = false;
                self.screen = Screen::Charts;
                self.status = None;
            }
            Err(e) => self.show_error(&e),
        }
    }

    /// Applies reloaded detail panels.
    ///
    /// Results for a viz or selection other than the current one are dropped.
    pub fn on_details_loaded(
        &mut self,
        viz: Viz,
        selection: Option<i64>,
        result: Result<Vec<LoadedPanel>>,
    ) {
        if viz != self.viz || selection != self.selection {
            return;
        }
        self.details_loading = false;
        match result {
            Ok(details) => {
                self.details = details;
                self.status = None;
            }
            Err(e) => self.show_error(&e),
        }
    }

    /// Applies a clipboard read.
    pub fn on_paste(&mut self, result: Result<Credential>) {
        match result {
            Ok(credential) => {
                self.token_input.set(credential.expose());
                self.status = Some("Token pasted; press Enter to connect".to_string());
            }
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    pub fn show_error(&mut self, err: &ExploreError) {
        self.loading_viz = false;
        self.details_loading = false;
        self.error = Some(ErrorView::from(err));
        self.screen = Screen::Error;
        self.status = None;
    }
}
