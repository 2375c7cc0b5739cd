//! Application state and event handling.
//!
//! This module implements the Elm Architecture pattern for state management:
//! a centralized App struct owns the project store, the paginator and the
//! hours form, turns key presses into API commands and folds API messages
//! back into the store.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiCommand, ApiMessage};
use crate::error::ApiError;
use crate::models::{HoursUpdate, Project, ProjectId, ValidationErrors};
use crate::pagination::Paginator;
use crate::store::{LoadStatus, ProjectStore, StoreAction};

/// Input mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Table navigation
    #[default]
    Normal,
    /// Editing the hours form
    Editing,
}

/// Fields of the hours form, in focus order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoursField {
    Design,
    Development,
    Testing,
    SubmitButton,
    CancelButton,
}

impl HoursField {
    pub fn all() -> &'static [HoursField] {
        &[
            HoursField::Design,
            HoursField::Development,
            HoursField::Testing,
            HoursField::SubmitButton,
            HoursField::CancelButton,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            HoursField::Design => "Design:",
            HoursField::Development => "Development:",
            HoursField::Testing => "Testing:",
            HoursField::SubmitButton => "Save",
            HoursField::CancelButton => "Cancel",
        }
    }

    /// Name of the matching field in the API payload
    pub fn api_name(&self) -> Option<&'static str> {
        match self {
            HoursField::Design => Some("actual_design"),
            HoursField::Development => Some("actual_development"),
            HoursField::Testing => Some("actual_testing"),
            _ => None,
        }
    }

    pub fn is_text_input(&self) -> bool {
        self.api_name().is_some()
    }
}

/// State of the "add hours" modal
#[derive(Debug, Clone)]
pub struct HoursForm {
    pub project_id: ProjectId,
    pub project_title: String,
    pub focused_field: usize,
    pub design: String,
    pub development: String,
    pub testing: String,
    /// Client-side or transport error shown under the inputs
    pub error: Option<String>,
    /// Field-level messages from the last rejected submit
    pub validation: Option<ValidationErrors>,
    /// A submit is in flight
    pub submitting: bool,
}

impl HoursForm {
    pub fn new(project: &Project) -> Self {
        Self {
            project_id: project.id,
            project_title: project.display_title().to_string(),
            focused_field: 0,
            design: String::new(),
            development: String::new(),
            testing: String::new(),
            error: None,
            validation: None,
            submitting: false,
        }
    }

    pub fn current_field(&self) -> HoursField {
        HoursField::all()[self.focused_field]
    }

    pub fn next_field(&mut self) {
        self.focused_field = (self.focused_field + 1) % HoursField::all().len();
    }

    pub fn prev_field(&mut self) {
        self.focused_field = self
            .focused_field
            .checked_sub(1)
            .unwrap_or(HoursField::all().len() - 1);
    }

    pub fn value(&self, field: HoursField) -> &str {
        match field {
            HoursField::Design => &self.design,
            HoursField::Development => &self.development,
            HoursField::Testing => &self.testing,
            _ => "",
        }
    }

    fn current_text_mut(&mut self) -> Option<&mut String> {
        match self.current_field() {
            HoursField::Design => Some(&mut self.design),
            HoursField::Development => Some(&mut self.development),
            HoursField::Testing => Some(&mut self.testing),
            _ => None,
        }
    }

    /// Accept digits and a single decimal point
    pub fn handle_char(&mut self, c: char) {
        if let Some(text) = self.current_text_mut() {
            if c.is_ascii_digit() || (c == '.' && !text.contains('.')) {
                text.push(c);
            }
        }
    }

    pub fn handle_backspace(&mut self) {
        if let Some(text) = self.current_text_mut() {
            text.pop();
        }
    }

    /// Messages the server reported for `field`
    pub fn field_errors(&self, field: HoursField) -> Vec<String> {
        match (&self.validation, field.api_name()) {
            (Some(errors), Some(name)) => errors.messages_for(name),
            _ => Vec::new(),
        }
    }

    /// Parse the inputs into a delta; empty inputs count as zero
    pub fn build_update(&self) -> Result<HoursUpdate, String> {
        fn parse(label: &str, value: &str) -> Result<f64, String> {
            let value = value.trim();
            if value.is_empty() {
                return Ok(0.0);
            }
            value
                .parse::<f64>()
                .map_err(|_| format!("{} '{}' is not a number", label.trim_end_matches(':'), value))
        }

        let update = HoursUpdate::new(
            parse(HoursField::Design.label(), &self.design)?,
            parse(HoursField::Development.label(), &self.development)?,
            parse(HoursField::Testing.label(), &self.testing)?,
        );
        update.validate().map_err(str::to_string)?;
        if update == HoursUpdate::default() {
            return Err("Enter hours for at least one field".to_string());
        }
        Ok(update)
    }
}

/// Error popup state
#[derive(Debug, Clone)]
pub struct ErrorPopup {
    pub title: String,
    pub message: String,
    /// When the error was shown
    pub shown_at: Instant,
    /// Auto-dismiss duration (None for manual dismiss)
    pub auto_dismiss: Option<Duration>,
}

impl ErrorPopup {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            shown_at: Instant::now(),
            auto_dismiss: Some(Duration::from_secs(5)),
        }
    }

    pub fn should_dismiss(&self) -> bool {
        self.auto_dismiss
            .is_some_and(|duration| self.shown_at.elapsed() > duration)
    }
}

/// Log entry for the message area
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub message: String,
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: LogLevel::Info,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: LogLevel::Success,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: LogLevel::Warning,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: LogLevel::Error,
        }
    }
}

/// Main application state
#[derive(Debug)]
pub struct App {
    /// Whether the application should quit
    pub should_quit: bool,

    pub input_mode: InputMode,

    /// Projects and their load status
    pub store: ProjectStore,

    pub paginator: Paginator,

    /// Selected row, relative to the current page
    pub selected_row: usize,

    /// Open hours form (if any)
    pub hours_form: Option<HoursForm>,

    /// Current error popup (if any)
    pub error_popup: Option<ErrorPopup>,

    /// Log messages
    pub logs: Vec<LogEntry>,
    /// Maximum number of log entries to keep
    max_logs: usize,

    /// Token of the outstanding fetch; cancelled when superseded
    fetch_token: Option<CancellationToken>,
    /// Token of the outstanding update
    update_token: Option<CancellationToken>,

    /// Last successful refresh
    pub last_refresh: Option<Instant>,

    pub show_help: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new(crate::pagination::DEFAULT_PAGE_SIZE)
    }
}

impl App {
    pub fn new(page_size: usize) -> Self {
        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            store: ProjectStore::new(),
            paginator: Paginator::new(page_size),
            selected_row: 0,
            hours_form: None,
            error_popup: None,
            logs: Vec::new(),
            max_logs: 100,
            fetch_token: None,
            update_token: None,
            last_refresh: None,
            show_help: false,
        };

        app.log(LogEntry::info("Projement dashboard initialized"));
        app
    }

    pub fn log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
        if self.logs.len() > self.max_logs {
            self.logs.remove(0);
        }
    }

    pub fn show_error(&mut self, title: impl Into<String>, message: impl Into<String>) {
        let title = title.into();
        let message = message.into();
        self.log(LogEntry::error(format!("{}: {}", title, message)));
        self.error_popup = Some(ErrorPopup::new(title, message));
    }

    pub fn dismiss_error(&mut self) {
        self.error_popup = None;
    }

    /// Rows on the current page
    pub fn visible_projects(&self) -> &[Project] {
        self.paginator.page_items(self.store.projects())
    }

    pub fn selected_project(&self) -> Option<&Project> {
        self.visible_projects().get(self.selected_row)
    }

    /// Start a (re)fetch of the project list, superseding any outstanding one
    pub fn begin_fetch(&mut self) -> ApiCommand {
        if let Some(previous) = self.fetch_token.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.fetch_token = Some(token.clone());
        self.store.apply(StoreAction::FetchStarted);
        self.log(LogEntry::info("Loading projects..."));
        ApiCommand::FetchProjects(token)
    }

    /// Cancel outstanding requests and ask the worker to stop
    pub fn quit(&mut self) -> ApiCommand {
        self.should_quit = true;
        for token in [self.fetch_token.take(), self.update_token.take()]
            .into_iter()
            .flatten()
        {
            token.cancel();
        }
        ApiCommand::Shutdown
    }

    pub fn open_hours_form(&mut self) {
        if let Some(project) = self.selected_project() {
            self.hours_form = Some(HoursForm::new(project));
            self.input_mode = InputMode::Editing;
        }
    }

    pub fn close_form(&mut self) {
        if let Some(token) = self.update_token.take() {
            token.cancel();
        }
        self.hours_form = None;
        self.input_mode = InputMode::Normal;
    }

    fn clamp_selection(&mut self) {
        let rows = self.visible_projects().len();
        self.selected_row = self.selected_row.min(rows.saturating_sub(1));
    }

    pub fn handle_api_message(&mut self, message: ApiMessage) {
        match message {
            ApiMessage::ProjectsLoaded { projects, token } => {
                if token.is_cancelled() {
                    debug!(event = "app.fetch.discarded_late_result");
                    return;
                }
                self.fetch_token = None;
                let count = projects.len();
                self.store.apply(StoreAction::ProjectsReceived(projects));
                self.paginator.clamp_to(count);
                self.clamp_selection();
                self.last_refresh = Some(Instant::now());
                self.log(LogEntry::success(format!("Loaded {} projects", count)));
            }
            ApiMessage::ProjectsFailed { error, token } => {
                if token.is_cancelled() || matches!(error, ApiError::Cancelled) {
                    debug!(event = "app.fetch.discarded_late_failure");
                    return;
                }
                self.fetch_token = None;
                self.store.apply(StoreAction::FetchFailed(error.to_string()));
                self.show_error("API Error", error.to_string());
            }
            ApiMessage::ProjectUpdated { project, token } => {
                if token.is_cancelled() {
                    debug!(event = "app.update.discarded_late_result", project_id = project.id);
                    return;
                }
                self.update_token = None;
                let title = project.display_title().to_string();
                if self.store.project(project.id).is_none() {
                    warn!(event = "app.update.unknown_project", project_id = project.id);
                }
                info!(event = "app.update.applied", project_id = project.id);
                let form_open = self
                    .hours_form
                    .as_ref()
                    .is_some_and(|form| form.project_id == project.id);
                self.store.apply(StoreAction::ProjectUpdated(project));
                if form_open {
                    self.hours_form = None;
                    self.input_mode = InputMode::Normal;
                }
                self.log(LogEntry::success(format!("Hours recorded for {}", title)));
            }
            ApiMessage::UpdateFailed { id, error, token } => {
                if token.is_cancelled() || matches!(error, ApiError::Cancelled) {
                    debug!(event = "app.update.discarded_late_failure", project_id = id);
                    return;
                }
                self.update_token = None;

                let form_open = self
                    .hours_form
                    .as_ref()
                    .is_some_and(|form| form.project_id == id);
                match error {
                    ApiError::Validation(errors) if form_open => {
                        let summary = errors.summary();
                        if let Some(form) = self.hours_form.as_mut() {
                            form.submitting = false;
                            form.error = None;
                            form.validation = Some(errors);
                        }
                        self.log(LogEntry::warning(format!("Update rejected: {}", summary)));
                    }
                    error => {
                        if let Some(form) = self.hours_form.as_mut().filter(|_| form_open) {
                            form.submitting = false;
                            form.error = Some(error.to_string());
                        }
                        self.show_error("Update Failed", error.to_string());
                    }
                }
            }
        }
    }

    /// Handle key events and return optional API command
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(self.quit());
        }

        if self.error_popup.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ')) {
                self.dismiss_error();
            }
            return None;
        }

        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter) {
                self.show_help = false;
            }
            return None;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Editing => self.handle_editing_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return Some(self.quit()),
            KeyCode::Char('?') => {
                self.show_help = true;
                return None;
            }
            KeyCode::Char('r') => return Some(self.begin_fetch()),
            _ => {}
        }

        if self.store.status() != &LoadStatus::Ready {
            return None;
        }

        let count = self.store.projects().len();
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                if self.paginator.previous() {
                    self.selected_row = 0;
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.paginator.next(count) {
                    self.selected_row = 0;
                }
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.paginator.go_to(1, count);
                self.selected_row = 0;
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.paginator.go_to(self.paginator.total_pages(count), count);
                self.selected_row = 0;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_row = self.selected_row.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected_row += 1;
                self.clamp_selection();
            }
            KeyCode::Enter | KeyCode::Char('e') => self.open_hours_form(),
            _ => {}
        }

        None
    }

    fn handle_editing_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        let Some(form) = self.hours_form.as_mut() else {
            self.input_mode = InputMode::Normal;
            return None;
        };

        match key.code {
            KeyCode::Esc => self.close_form(),
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Backspace => form.handle_backspace(),
            KeyCode::Char(c) => form.handle_char(c),
            KeyCode::Enter => return self.handle_form_submit(),
            _ => {}
        }

        None
    }

    /// Enter on a text field moves on; on the buttons it submits or cancels
    fn handle_form_submit(&mut self) -> Option<ApiCommand> {
        let form = self.hours_form.as_mut()?;

        match form.current_field() {
            HoursField::CancelButton => {
                self.close_form();
                None
            }
            HoursField::SubmitButton => {
                if form.submitting {
                    return None;
                }
                match form.build_update() {
                    Ok(hours) => {
                        form.error = None;
                        form.validation = None;
                        form.submitting = true;
                        let id = form.project_id;
                        let token = CancellationToken::new();
                        // At most one update in flight; any reply to an older one is stale
                        if let Some(previous) = self.update_token.replace(token.clone()) {
                            previous.cancel();
                        }
                        self.log(LogEntry::info(format!("Recording hours for project {}...", id)));
                        Some(ApiCommand::UpdateProject { id, hours, token })
                    }
                    Err(message) => {
                        form.error = Some(message);
                        None
                    }
                }
            }
            _ => {
                form.next_field();
                None
            }
        }
    }

    /// Update timers (called every frame)
    pub fn tick(&mut self) {
        if self
            .error_popup
            .as_ref()
            .is_some_and(|popup| popup.should_dismiss())
        {
            self.error_popup = None;
        }
    }

    /// Get the status bar text
    pub fn status_text(&self) -> String {
        let count = self.store.projects().len();
        let status = match self.store.status() {
            LoadStatus::Loading => " [Loading...]".to_string(),
            LoadStatus::Failed(_) => " [Fetch failed]".to_string(),
            LoadStatus::Idle => String::new(),
            LoadStatus::Ready => format!(
                " | Page {}/{} | {} projects",
                self.paginator.current_page(),
                self.paginator.total_pages(count).max(1),
                count
            ),
        };

        let last_refresh = self
            .last_refresh
            .map(|t| {
                let secs = t.elapsed().as_secs();
                if secs < 60 {
                    format!(" ({}s ago)", secs)
                } else {
                    format!(" ({}m ago)", secs / 60)
                }
            })
            .unwrap_or_default();

        format!(
            "Projects{}{} | ?: Help | Enter: Add hours | r: Refresh | q: Quit",
            status, last_refresh
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use serde_json::json;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn loaded_app(count: i64) -> App {
        let mut app = App::new(10);
        let ApiCommand::FetchProjects(token) = app.begin_fetch() else {
            panic!("expected a fetch command");
        };
        app.handle_api_message(ApiMessage::ProjectsLoaded {
            projects: fixtures::projects(count),
            token,
        });
        app
    }

    fn visible_ids(app: &App) -> Vec<ProjectId> {
        app.visible_projects().iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_begin_fetch_marks_loading() {
        let mut app = App::new(10);
        assert_eq!(app.store.status(), &LoadStatus::Idle);
        app.begin_fetch();
        assert!(app.store.is_loading());
    }

    #[test]
    fn test_refresh_cancels_previous_fetch_and_discards_its_result() {
        let mut app = loaded_app(3);

        let ApiCommand::FetchProjects(first) = app.begin_fetch() else {
            panic!("expected a fetch command");
        };
        let second = app.handle_key(key(KeyCode::Char('r')));
        assert!(first.is_cancelled());

        app.handle_api_message(ApiMessage::ProjectsLoaded {
            projects: fixtures::projects(20),
            token: first,
        });
        assert!(app.store.is_loading());
        assert_eq!(app.store.projects().len(), 3);

        let Some(ApiCommand::FetchProjects(second)) = second else {
            panic!("expected a fetch command");
        };
        app.handle_api_message(ApiMessage::ProjectsLoaded {
            projects: fixtures::projects(20),
            token: second,
        });
        assert_eq!(app.store.status(), &LoadStatus::Ready);
        assert_eq!(app.store.projects().len(), 20);
    }

    #[test]
    fn test_fetch_failure_is_not_stuck_loading() {
        let mut app = App::new(10);
        let ApiCommand::FetchProjects(token) = app.begin_fetch() else {
            panic!("expected a fetch command");
        };

        app.handle_api_message(ApiMessage::ProjectsFailed {
            error: ApiError::Decode {
                endpoint: "/api/projects".to_string(),
                message: "expected value at line 1 column 1".to_string(),
            },
            token,
        });

        assert!(matches!(app.store.status(), LoadStatus::Failed(_)));
        assert!(app.error_popup.is_some());
    }

    #[test]
    fn test_paging_through_twenty_projects() {
        let mut app = loaded_app(20);
        assert_eq!(visible_ids(&app), (1..=10).collect::<Vec<_>>());

        app.handle_key(key(KeyCode::Right));
        assert_eq!(visible_ids(&app), (11..=20).collect::<Vec<_>>());

        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.paginator.current_page(), 2);

        app.handle_key(key(KeyCode::Left));
        assert_eq!(visible_ids(&app), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_navigation_ignored_while_loading() {
        let mut app = loaded_app(20);
        app.begin_fetch();
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.paginator.current_page(), 1);
    }

    #[test]
    fn test_refresh_clamps_page_when_list_shrinks() {
        let mut app = loaded_app(30);
        app.handle_key(key(KeyCode::End));
        assert_eq!(app.paginator.current_page(), 3);

        let ApiCommand::FetchProjects(token) = app.begin_fetch() else {
            panic!("expected a fetch command");
        };
        app.handle_api_message(ApiMessage::ProjectsLoaded {
            projects: fixtures::projects(12),
            token,
        });
        assert_eq!(app.paginator.current_page(), 2);
        assert_eq!(visible_ids(&app), vec![11, 12]);
    }

    #[test]
    fn test_selection_stays_on_page() {
        let mut app = loaded_app(12);
        app.handle_key(key(KeyCode::Right));
        for _ in 0..5 {
            app.handle_key(key(KeyCode::Down));
        }
        assert_eq!(app.selected_row, 1);
        assert_eq!(app.selected_project().map(|p| p.id), Some(12));
    }

    #[test]
    fn test_hours_form_submit_builds_update_command() {
        let mut app = loaded_app(3);
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.hours_form.as_ref().map(|f| f.project_id), Some(2));

        for c in "1.5".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Tab));
        for c in "2x".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Tab));

        match app.handle_key(key(KeyCode::Enter)) {
            Some(ApiCommand::UpdateProject { id, hours, .. }) => {
                assert_eq!(id, 2);
                assert_eq!(hours, HoursUpdate::new(1.5, 0.0, 2.0));
            }
            other => panic!("expected update command, got {:?}", other),
        }
        assert!(app.hours_form.as_ref().unwrap().submitting);
    }

    #[test]
    fn test_hours_form_rejects_empty_submit() {
        let mut app = loaded_app(1);
        app.handle_key(key(KeyCode::Enter));
        app.handle_key(key(KeyCode::BackTab));
        app.handle_key(key(KeyCode::BackTab));
        assert_eq!(
            app.hours_form.as_ref().unwrap().current_field(),
            HoursField::SubmitButton
        );

        assert!(app.handle_key(key(KeyCode::Enter)).is_none());
        assert!(app.hours_form.as_ref().unwrap().error.is_some());
    }

    #[test]
    fn test_validation_failure_keeps_form_and_store() {
        let mut app = loaded_app(2);
        app.handle_key(key(KeyCode::Enter));
        let before = app.store.projects().to_vec();

        app.handle_api_message(ApiMessage::UpdateFailed {
            id: 1,
            error: ApiError::Validation(ValidationErrors(json!({
                "actual_design": ["Ensure this value is less than or equal to 9999.99."]
            }))),
            token: CancellationToken::new(),
        });

        let form = app.hours_form.as_ref().unwrap();
        assert!(!form.submitting);
        assert_eq!(
            form.field_errors(HoursField::Design),
            vec!["Ensure this value is less than or equal to 9999.99.".to_string()]
        );
        assert!(form.field_errors(HoursField::Testing).is_empty());
        assert_eq!(app.store.projects(), before.as_slice());
        assert!(app.error_popup.is_none());
    }

    #[test]
    fn test_update_success_replaces_row_and_closes_form() {
        let mut app = loaded_app(3);
        app.handle_key(key(KeyCode::Enter));

        let mut updated = fixtures::project(1);
        updated.actual_design = 9.0;
        updated.total_actual_hours = 12.5;
        app.handle_api_message(ApiMessage::ProjectUpdated {
            project: updated.clone(),
            token: CancellationToken::new(),
        });

        assert!(app.hours_form.is_none());
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.store.projects()[0], updated);
    }

    /// Type `hours` into the design field of the open form and submit it
    fn submit_hours(app: &mut App, hours: &str) -> CancellationToken {
        for c in hours.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::BackTab));
        app.handle_key(key(KeyCode::BackTab));
        match app.handle_key(key(KeyCode::Enter)) {
            Some(ApiCommand::UpdateProject { token, .. }) => token,
            other => panic!("expected update command, got {:?}", other),
        }
    }

    #[test]
    fn test_late_reply_from_abandoned_form_keeps_new_request_cancellable() {
        let mut app = loaded_app(3);
        app.handle_key(key(KeyCode::Enter));
        let first = submit_hours(&mut app, "1");
        app.handle_key(key(KeyCode::Esc));
        assert!(first.is_cancelled());

        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));
        let second = submit_hours(&mut app, "2");

        app.handle_api_message(ApiMessage::UpdateFailed {
            id: 1,
            error: ApiError::Cancelled,
            token: first,
        });
        let form = app.hours_form.as_ref().unwrap();
        assert_eq!(form.project_id, 2);
        assert!(form.submitting);

        app.handle_key(key(KeyCode::Esc));
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_late_success_from_abandoned_form_is_discarded() {
        let mut app = loaded_app(3);
        app.handle_key(key(KeyCode::Enter));
        let first = submit_hours(&mut app, "1");
        app.handle_key(key(KeyCode::Esc));

        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));
        let second = submit_hours(&mut app, "2");
        let before = app.store.projects().to_vec();

        let mut late = fixtures::project(1);
        late.actual_design = 42.0;
        app.handle_api_message(ApiMessage::ProjectUpdated {
            project: late,
            token: first,
        });

        assert_eq!(app.hours_form.as_ref().map(|f| f.project_id), Some(2));
        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.store.projects(), before.as_slice());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_update_for_other_project_leaves_open_form() {
        let mut app = loaded_app(3);
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));

        let mut updated = fixtures::project(1);
        updated.actual_design = 9.0;
        app.handle_api_message(ApiMessage::ProjectUpdated {
            project: updated.clone(),
            token: CancellationToken::new(),
        });

        assert_eq!(app.hours_form.as_ref().map(|f| f.project_id), Some(2));
        assert_eq!(app.store.projects()[0], updated);
    }

    #[test]
    fn test_refresh_logs_once() {
        let mut app = loaded_app(3);
        let before = app.logs.len();
        app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(app.logs.len(), before + 1);
        assert_eq!(app.logs.last().unwrap().message, "Loading projects...");
    }

    #[test]
    fn test_quit_cancels_outstanding_fetch() {
        let mut app = App::new(10);
        let ApiCommand::FetchProjects(token) = app.begin_fetch() else {
            panic!("expected a fetch command");
        };

        let command = app.handle_key(key(KeyCode::Char('q')));

        assert!(matches!(command, Some(ApiCommand::Shutdown)));
        assert!(app.should_quit);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_error_popup_swallows_keys_until_dismissed() {
        let mut app = loaded_app(20);
        app.show_error("API Error", "boom");

        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.paginator.current_page(), 1);

        app.handle_key(key(KeyCode::Esc));
        assert!(app.error_popup.is_none());
    }

    #[test]
    fn test_log_is_bounded() {
        let mut app = App::new(10);
        for i in 0..250 {
            app.log(LogEntry::info(format!("entry {}", i)));
        }
        assert_eq!(app.logs.len(), 100);
        assert_eq!(app.logs.last().unwrap().message, "entry 249");
    }
}
