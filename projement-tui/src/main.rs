//! Projement TUI - terminal dashboard for the Projement project-management API
//!
//! Lists projects with pagination, highlights ended and over-budget ones,
//! and records additional hours against a project.

mod api;
mod app;
mod config;
mod error;
mod logging;
mod models;
mod pagination;
mod store;
mod theme;
mod ui;

use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{info, warn};

use api::{ApiClient, ApiCommand, ApiMessage, ProjectsApi};
use app::App;
use config::Config;

/// Redraw interval (approximately 30 FPS)
const FRAME_DURATION: Duration = Duration::from_millis(33);

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().ok();

    let config = Config::parse();
    logging::init_logging(&config.log_path(), config.quiet)?;

    info!(
        event = "projement.startup",
        api_url = %config.api_url,
        page_size = config.page_size
    );
    if config.csrf_token.is_empty() {
        warn!(event = "projement.csrf_token_missing");
    }

    run_tui(&config).await
}

/// Run the TUI application
async fn run_tui(config: &Config) -> Result<()> {
    let api_client = ApiClient::new(&config.api_url, &config.csrf_token)?;

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let (api_tx, mut api_rx) = mpsc::channel::<ApiMessage>(32);
    let (cmd_tx, cmd_rx) = mpsc::channel::<ApiCommand>(32);

    let api: Arc<dyn ProjectsApi> = Arc::new(api_client);
    let api_task = tokio::spawn(run_api_worker(api, api_tx, cmd_rx));

    let mut app = App::new(config.page_size);
    cmd_tx.send(app.begin_fetch()).await.ok();

    let result = run_event_loop(&mut terminal, &mut app, &mut api_rx, &cmd_tx).await;

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    api_task.abort();
    info!(event = "projement.shutdown");

    result
}

/// Run the API worker task
///
/// Every request runs on its own task so a slow list fetch never holds up an
/// hours update. Each command carries its cancellation token.
async fn run_api_worker(
    api: Arc<dyn ProjectsApi>,
    tx: mpsc::Sender<ApiMessage>,
    mut rx: mpsc::Receiver<ApiCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            ApiCommand::FetchProjects(token) => {
                let api = Arc::clone(&api);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let message = match store::fetch_projects(api.as_ref(), &token).await {
                        Ok(projects) => ApiMessage::ProjectsLoaded { projects, token },
                        Err(error) => ApiMessage::ProjectsFailed { error, token },
                    };
                    tx.send(message).await.ok();
                });
            }
            ApiCommand::UpdateProject { id, hours, token } => {
                let api = Arc::clone(&api);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let message = match store::update_project(api.as_ref(), id, hours, &token).await {
                        Ok(project) => ApiMessage::ProjectUpdated { project, token },
                        Err(error) => ApiMessage::UpdateFailed { id, error, token },
                    };
                    tx.send(message).await.ok();
                });
            }
            ApiCommand::Shutdown => break,
        }
    }
}

/// Run the main event loop
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    api_rx: &mut mpsc::Receiver<ApiMessage>,
    cmd_tx: &mpsc::Sender<ApiCommand>,
) -> Result<()> {
    loop {
        app.tick();

        terminal.draw(|frame| ui::render(frame, app))?;

        // Check for API messages (non-blocking)
        while let Ok(msg) = api_rx.try_recv() {
            app.handle_api_message(msg);
        }

        if event::poll(FRAME_DURATION)? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (not release)
                if key.kind == KeyEventKind::Press {
                    if let Some(cmd) = app.handle_key(key) {
                        cmd_tx.send(cmd).await.ok();
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
