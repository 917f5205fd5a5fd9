//! Tracing setup: append to the XDG state log, or write to stderr.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,codesync_core=debug,code_sync=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `$XDG_STATE_HOME/code-sync/code-sync.log`; the directory is created on demand.
pub fn log_path() -> Result<PathBuf> {
    let log_dir = xdg::BaseDirectories::with_prefix("code-sync")?.get_state_home();
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir.join("code-sync.log"))
}

/// Send tracing output to the state log file. Returns the file path.
///
/// Errors when the file cannot be opened or a subscriber is already set;
/// callers fall back to [`init_logging_stderr`].
pub fn init_logging() -> Result<PathBuf> {
    let path = log_path()?;
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!("code-sync logging to {}", path.display());
    Ok(path)
}

pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
