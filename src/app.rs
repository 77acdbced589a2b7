//! Application state for the chat interface.
//!
//! `App` owns the [`Session`] plus everything the terminal needs around it:
//! the input line, the current overlay, the table sort and a status line.
//! Backend calls are queued as [`PendingWork`] by the key handlers and run
//! by the event loop after the loading state has been drawn.

use std::cell::Cell;

use crate::backend::{Backend, HttpBackend};
use crate::core::{Config, QueryHistory, SIDEBAR_LIMIT};
use crate::report::table::{infer_columns, SortState};
use crate::session::{Message, MessageId, PendingQuery, Session, WorkflowError, WorkflowState};
use crate::tui::Theme;

/// Main application state.
pub struct App {
    /// Current chat input
    pub input: String,

    /// Cursor position in the input, in characters
    pub cursor_position: usize,

    /// Project title being typed in the finalize prompt
    pub title_input: String,

    /// Whether the application should quit
    pub should_quit: bool,

    /// Application configuration
    pub config: Config,

    /// Current mode of the application
    pub mode: AppMode,

    /// Status message to display (if any)
    pub status_message: Option<String>,

    /// Conversation, workflow and backend
    pub session: Session<Box<dyn Backend>>,

    /// Color theme
    pub theme: Theme,

    /// Sort of the latest result table
    pub sort: SortState,

    /// Message whose table `sort` applies to
    sorted_message: Option<MessageId>,

    /// Lines scrolled up from the bottom of the chat
    pub chat_scroll: u16,

    /// Furthest the chat can scroll up, measured at the last draw
    chat_scroll_limit: Cell<u16>,

    /// Selected entry in the history overlay
    pub history_selected: usize,

    /// Backend call waiting to run
    pending: Option<PendingWork>,

    runtime: tokio::runtime::Runtime,
}

/// Application modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppMode {
    /// Typing questions
    #[default]
    Chat,

    /// Asking for a project title before finalizing
    TitlePrompt,

    /// Showing per-claim validation results
    ValidationDetails,

    /// Showing recent queries
    History,

    /// Showing help screen with keyboard shortcuts
    Help,
}

/// Backend work queued by a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWork {
    Query(PendingQuery),
    Finalize(String),
    Revalidate,
    Publish,
}

impl App {
    /// Create the application from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let backend = match config.backend_timeout() {
            Some(timeout) => HttpBackend::with_timeout(&config.backend.url, timeout)?,
            None => HttpBackend::new(&config.backend.url),
        };

        let history = QueryHistory::open(config.history_path()?)
            .with_max_entries(config.history.max_entries);

        let session = Session::new(Box::new(backend) as Box<dyn Backend>)
            .with_settings(config.session_settings())
            .with_history(history);

        Self::with_session(config, session)
    }

    /// Create the application around an existing session.
    pub fn with_session(config: Config, session: Session<Box<dyn Backend>>) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let theme = Theme::from_config(&config.ui.theme);

        Ok(Self {
            input: String::new(),
            cursor_position: 0,
            title_input: String::new(),
            should_quit: false,
            config,
            mode: AppMode::default(),
            status_message: None,
            session,
            theme,
            sort: SortState::default(),
            sorted_message: None,
            chat_scroll: 0,
            chat_scroll_limit: Cell::new(0),
            history_selected: 0,
            pending: None,
            runtime,
        })
    }

    /// Create a new application instance for testing, backed by a fake.
    #[cfg(test)]
    pub fn new_test() -> Self {
        Self::new_test_with(crate::backend::fake::FakeBackend::new())
    }

    #[cfg(test)]
    pub fn new_test_with(backend: crate::backend::fake::FakeBackend) -> Self {
        let session = Session::new(Box::new(backend) as Box<dyn Backend>);
        Self::with_session(Config::default(), session).unwrap()
    }

    fn byte_index(&self) -> usize {
        self.input.char_indices().nth(self.cursor_position).map_or(self.input.len(), |(i, _)| i)
    }

    /// Handle a character input.
    pub fn enter_char(&mut self, c: char) {
        let index = self.byte_index();
        self.input.insert(index, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor (backspace).
    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let index = self.byte_index();
            self.input.remove(index);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }

    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input.chars().count();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.move_cursor_end();
    }

    /// Set a status message to display.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Request the application to quit.
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    fn report_error(&mut self, error: &WorkflowError) {
        tracing::debug!(error = %error, "action rejected");
        self.set_status(error.to_string());
    }

    /// Submit the chat input as a question.
    pub fn submit_input(&mut self) {
        let prompt = self.input.clone();
        self.submit_prompt(&prompt);
    }

    /// Queue a question for the backend.
    pub fn submit_prompt(&mut self, prompt: &str) {
        match self.session.begin_query(prompt) {
            Ok(pending) => {
                self.clear_input();
                self.chat_scroll = 0;
                self.set_status("Analyzing...");
                self.pending = Some(PendingWork::Query(pending));
            }
            Err(e) => self.report_error(&e),
        }
    }

    /// Open the title prompt, if finalizing is possible.
    pub fn request_finalize(&mut self) {
        if self.session.can_finalize() {
            self.title_input.clear();
            self.mode = AppMode::TitlePrompt;
        } else if self.session.state() == WorkflowState::Exploring {
            self.set_status("Ask at least one question before finalizing");
        } else {
            self.set_status(format!("Cannot finalize while {}", self.session.state()));
        }
    }

    /// Confirm the title prompt.
    pub fn confirm_title(&mut self) {
        let title = self.title_input.trim().to_string();
        if title.is_empty() {
            self.report_error(&WorkflowError::EmptyTitle);
            return;
        }
        self.mode = AppMode::Chat;
        self.set_status("Creating your analysis...");
        self.pending = Some(PendingWork::Finalize(title));
    }

    pub fn cancel_title(&mut self) {
        self.title_input.clear();
        self.mode = AppMode::Chat;
    }

    pub fn request_publish(&mut self) {
        if self.session.state() != WorkflowState::Validated {
            self.set_status(format!("Cannot publish while {}", self.session.state()));
            return;
        }
        if !self.session.can_publish() {
            let recommendation = self
                .session
                .workflow()
                .validation()
                .map(|v| v.recommendation.clone())
                .unwrap_or_default();
            self.report_error(&WorkflowError::NotReady { recommendation });
            return;
        }
        self.set_status("Publishing...");
        self.pending = Some(PendingWork::Publish);
    }

    /// Re-run validation after a failed attempt, or toggle the claim list.
    pub fn validation_key(&mut self) {
        match self.session.state() {
            WorkflowState::Finalized => {
                self.set_status("Validation agent checking claims...");
                self.pending = Some(PendingWork::Revalidate);
            }
            _ if self.session.workflow().validation().is_some() => {
                self.mode = AppMode::ValidationDetails;
            }
            _ => self.set_status("No validation results yet"),
        }
    }

    pub fn continue_exploring(&mut self) {
        match self.session.continue_exploring() {
            Ok(()) => self.set_status("Back to exploring"),
            Err(e) => self.report_error(&e),
        }
    }

    /// Start a fresh conversation.
    pub fn new_conversation(&mut self) {
        if self.session.is_analyzing() || self.session.state().is_busy() {
            self.report_error(&WorkflowError::Analyzing);
            return;
        }
        self.session.reset();
        self.sort = SortState::default();
        self.sorted_message = None;
        self.chat_scroll = 0;
        self.set_status("New conversation");
    }

    pub fn has_pending_work(&self) -> bool {
        self.pending.is_some()
    }

    /// Run queued backend work, blocking until it finishes.
    pub fn run_pending_work(&mut self) {
        let Some(work) = self.pending.take() else {
            return;
        };

        let status = match work {
            PendingWork::Query(pending) => {
                match self.runtime.block_on(self.session.complete_query(pending)) {
                    Some(message) if message.error.is_some() => "Query failed".to_string(),
                    Some(message) => match message.rows() {
                        Some(rows) => format!("{} rows", rows.len()),
                        None => "Answer received".to_string(),
                    },
                    None => String::new(),
                }
            }
            PendingWork::Finalize(title) => {
                match self.runtime.block_on(self.session.finalize(&title)) {
                    Ok(validation) => format!("Validated: {}", validation.score_line()),
                    Err(e) => e.to_string(),
                }
            }
            PendingWork::Revalidate => match self.runtime.block_on(self.session.revalidate()) {
                Ok(validation) => format!("Validated: {}", validation.score_line()),
                Err(e) => e.to_string(),
            },
            PendingWork::Publish => match self.runtime.block_on(self.session.publish()) {
                Ok(receipt) => format!("Published to {}", receipt.project_path),
                Err(e) => e.to_string(),
            },
        };

        if status.is_empty() {
            self.clear_status();
        } else {
            self.set_status(status);
        }
    }

    /// Latest message with a result table.
    pub fn latest_table(&self) -> Option<&Message> {
        self.session.conversation().latest_rows()
    }

    /// Sort that applies to the latest table.
    pub fn table_sort(&self) -> SortState {
        match (self.latest_table(), self.sorted_message) {
            (Some(message), Some(id)) if message.id == id => self.sort.clone(),
            _ => SortState::default(),
        }
    }

    /// Move the latest table's sort to the next column or direction.
    pub fn cycle_sort(&mut self) {
        let Some(message) = self.latest_table() else {
            self.set_status("No table to sort");
            return;
        };
        let id = message.id;
        let columns = infer_columns(message.rows().unwrap_or_default());

        let mut sort = self.table_sort();
        sort.cycle(&columns);
        let label = match &sort.key {
            Some(key) => format!("Sorted by {} {}", key.replace('_', " "), sort.direction.arrow()),
            None => String::new(),
        };

        self.sort = sort;
        self.sorted_message = Some(id);
        self.set_status(label);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.chat_scroll_limit.get());
    }

    /// Record how far the rendered chat can scroll.
    pub fn set_scroll_limit(&self, limit: u16) {
        self.chat_scroll_limit.set(limit);
    }

    /// Scroll offset clamped to the last measured limit.
    pub fn effective_scroll(&self) -> u16 {
        self.chat_scroll.min(self.chat_scroll_limit.get())
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.effective_scroll().saturating_sub(lines);
    }

    pub fn show_help(&mut self) {
        self.mode = AppMode::Help;
    }

    pub fn show_history(&mut self) {
        self.history_selected = 0;
        self.mode = AppMode::History;
    }

    /// Return to the chat from any overlay.
    pub fn dismiss_overlay(&mut self) {
        self.mode = AppMode::Chat;
    }

    /// Queries shown in the history overlay.
    pub fn recent_queries(&self) -> Vec<&str> {
        self.session
            .history()
            .map(|h| h.recent(SIDEBAR_LIMIT).iter().map(|item| item.query.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn history_next(&mut self) {
        let count = self.recent_queries().len();
        if count > 0 {
            self.history_selected = (self.history_selected + 1).min(count - 1);
        }
    }

    pub fn history_previous(&mut self) {
        self.history_selected = self.history_selected.saturating_sub(1);
    }

    /// Copy the selected history entry into the input.
    pub fn use_history_entry(&mut self) {
        let selected = self.recent_queries().get(self.history_selected).map(|q| (*q).to_string());
        if let Some(query) = selected {
            self.set_input(&query);
        }
        self.mode = AppMode::Chat;
    }

    pub fn clear_history(&mut self) {
        let result = self.session.history_mut().map(QueryHistory::clear);
        match result {
            Some(Ok(())) => self.set_status("History cleared"),
            Some(Err(e)) => self.set_status(format!("Failed to clear history: {e}")),
            None => {}
        }
        self.history_selected = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::backend::{Endpoint, Recommendation};

    #[test]
    fn test_app_creation() {
        let app = App::new_test();
        assert!(app.input.is_empty());
        assert!(!app.should_quit);
        assert_eq!(app.mode, AppMode::Chat);
    }

    #[test]
    fn test_char_input() {
        let mut app = App::new_test();
        for c in "runs".chars() {
            app.enter_char(c);
        }
        assert_eq!(app.input, "runs");
        assert_eq!(app.cursor_position, 4);
    }

    #[test]
    fn test_multibyte_editing() {
        let mut app = App::new_test();
        app.set_input("café");
        app.delete_char();
        assert_eq!(app.input, "caf");
        app.move_cursor_start();
        app.enter_char('¿');
        assert_eq!(app.input, "¿caf");
    }

    #[test]
    fn test_submit_runs_after_draw() {
        let mut app = App::new_test();
        app.set_input("Most sixes in 2019");
        app.submit_input();

        assert!(app.input.is_empty());
        assert!(app.has_pending_work());
        assert!(app.session.conversation().has_pending());

        app.run_pending_work();
        assert!(!app.has_pending_work());
        assert!(!app.session.is_analyzing());
        assert_eq!(app.status_message.as_deref(), Some("2 rows"));
        assert!(app.latest_table().is_some());
    }

    #[test]
    fn test_empty_submit_sets_status() {
        let mut app = App::new_test();
        app.submit_input();
        assert!(!app.has_pending_work());
        assert_eq!(app.status_message.as_deref(), Some("Enter a question first"));
    }

    #[test]
    fn test_finalize_flow() {
        let mut app = App::new_test();
        app.request_finalize();
        assert_eq!(app.mode, AppMode::Chat);

        app.set_input("Nervous nineties");
        app.submit_input();
        app.run_pending_work();

        app.request_finalize();
        assert_eq!(app.mode, AppMode::TitlePrompt);
        app.confirm_title();
        assert_eq!(app.mode, AppMode::TitlePrompt);

        app.title_input = "Nervous Nineties".to_string();
        app.confirm_title();
        app.run_pending_work();
        assert_eq!(app.session.state(), WorkflowState::Validated);
        assert_eq!(
            app.status_message.as_deref(),
            Some("Validated: 4/4 claims verified (100.0%)")
        );

        app.request_publish();
        app.run_pending_work();
        assert_eq!(app.session.state(), WorkflowState::Published);
        assert_eq!(app.status_message.as_deref(), Some("Published to outputs/nervous-nineties"));
    }

    #[test]
    fn test_not_ready_publish_shows_error() {
        let backend = FakeBackend::new().with_recommendation(Recommendation::NeedsRevision);
        let mut app = App::new_test_with(backend);
        app.submit_prompt("question");
        app.run_pending_work();
        app.request_finalize();
        app.title_input = "Draft".to_string();
        app.confirm_title();
        app.run_pending_work();

        app.request_publish();
        assert!(!app.has_pending_work());
        assert_eq!(
            app.status_message.as_deref(),
            Some("Cannot publish: validation recommends NEEDS_REVISION. Fix issues and re-finalize.")
        );
        app.run_pending_work();
        assert_eq!(app.session.state(), WorkflowState::Validated);

        app.continue_exploring();
        assert_eq!(app.session.state(), WorkflowState::Exploring);
    }

    #[test]
    fn test_validation_key_revalidates_after_failure() {
        let mut app = App::new_test_with(FakeBackend::new().failing(Endpoint::Validate));
        app.submit_prompt("question");
        app.run_pending_work();
        app.request_finalize();
        app.title_input = "Draft".to_string();
        app.confirm_title();
        app.run_pending_work();
        assert_eq!(app.session.state(), WorkflowState::Finalized);

        app.validation_key();
        assert!(app.has_pending_work());
        assert_eq!(app.mode, AppMode::Chat);
    }

    #[test]
    fn test_cycle_sort() {
        let mut app = App::new_test();
        app.cycle_sort();
        assert_eq!(app.status_message.as_deref(), Some("No table to sort"));

        app.submit_prompt("top scorers");
        app.run_pending_work();
        app.cycle_sort();
        assert_eq!(app.table_sort().key.as_deref(), Some("player"));
        app.cycle_sort();
        app.cycle_sort();
        assert_eq!(app.table_sort().key.as_deref(), Some("runs"));

        app.submit_prompt("another");
        app.run_pending_work();
        assert_eq!(app.table_sort(), SortState::default());
    }

    #[test]
    fn test_new_conversation() {
        let mut app = App::new_test();
        app.submit_prompt("question");
        app.run_pending_work();
        app.new_conversation();
        assert!(app.session.conversation().is_empty());
        assert!(app.latest_table().is_none());
    }

    #[test]
    fn test_history_overlay_without_store() {
        let mut app = App::new_test();
        app.show_history();
        assert!(app.recent_queries().is_empty());
        app.use_history_entry();
        assert_eq!(app.mode, AppMode::Chat);
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_scroll_respects_limit() {
        let mut app = App::new_test();
        app.scroll_up(3);
        assert_eq!(app.chat_scroll, 0);

        app.set_scroll_limit(4);
        app.scroll_up(10);
        assert_eq!(app.chat_scroll, 4);

        // The conversation got shorter since the last scroll
        app.set_scroll_limit(2);
        assert_eq!(app.effective_scroll(), 2);
        app.scroll_down(1);
        assert_eq!(app.chat_scroll, 1);
    }
}
