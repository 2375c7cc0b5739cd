//! Command line and environment configuration.

use std::path::PathBuf;

use clap::Parser;

use crate::api::DEFAULT_BASE_URL;
use crate::pagination::DEFAULT_PAGE_SIZE;

/// Terminal dashboard for the Projement project-management API
#[derive(Debug, Clone, Parser)]
#[command(name = "projement-tui", version, about)]
pub struct Config {
    /// Base URL of the backend (without the /api suffix)
    #[arg(long, env = "PROJEMENT_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Anti-forgery token sent as X-CSRFToken on updates
    #[arg(long, env = "PROJEMENT_CSRF_TOKEN", default_value = "", hide_env_values = true)]
    pub csrf_token: String,

    /// Rows per page in the project table
    #[arg(
        long,
        env = "PROJEMENT_PAGE_SIZE",
        default_value_t = DEFAULT_PAGE_SIZE,
        value_parser = parse_page_size
    )]
    pub page_size: usize,

    /// Where to write the JSON log (the terminal is owned by the UI)
    #[arg(long, env = "PROJEMENT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Only log errors
    #[arg(long, short)]
    pub quiet: bool,
}

impl Config {
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("projement-tui.log"))
    }
}

fn parse_page_size(value: &str) -> Result<usize, String> {
    let size: usize = value
        .parse()
        .map_err(|_| format!("'{}' is not a positive number", value))?;
    if size == 0 {
        return Err("page size must be at least 1".to_string());
    }
    Ok(size)
}
