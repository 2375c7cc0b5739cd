//! Tracing setup: JSON events into a log file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for the given quiet flag
pub fn default_directive(quiet: bool) -> &'static str {
    if quiet {
        "projement_tui=error"
    } else {
        "projement_tui=info"
    }
}

/// Initialize JSON logging into `path`.
///
/// The terminal belongs to the UI, so events never go to stdout/stderr.
/// `RUST_LOG` directives are honored; the quiet flag sets the crate's level.
pub fn init_logging(path: &Path, quiet: bool) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let directive = default_directive(quiet)
        .parse()
        .context("Invalid log directive")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_current_span(false)
                .with_span_list(false),
        )
        .with(EnvFilter::from_default_env().add_directive(directive))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
