//! CLI for code-sync.

mod commands;

use anyhow::Result;
use clap::Parser;
use codesync_core::{config, logging, manifest};
use std::path::PathBuf;

use commands::{plan_sync, run_sync};

/// Download remote archives listed in the project manifest and unpack them in place.
#[derive(Debug, Parser)]
#[command(name = "code-sync", version)]
#[command(about = "Pull prebuilt code and assets into the current project", long_about = None)]
pub struct Cli {
    /// Run only the task(s) with this name; all tasks run when omitted.
    pub task: Option<String>,

    /// Manifest file to read tasks from (default: package.json in the current directory).
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Manifest key holding the task list (default: code-sync).
    #[arg(long, value_name = "KEY")]
    pub section: Option<String>,

    /// Settings file to use instead of ~/.config/code-sync/config.toml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub async fn run_from_args() -> Result<()> {
        Cli::parse().run().await
    }

    /// Task filter; an empty name selects every task.
    pub fn task_filter(&self) -> Option<&str> {
        self.task.as_deref().filter(|name| !name.is_empty())
    }

    pub async fn run(self) -> Result<()> {
        let cfg = match &self.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load()?,
        };

        let cwd = std::env::current_dir()?;
        let manifest_path = match &self.manifest {
            Some(path) => cwd.join(path),
            None => manifest::manifest_path(&cwd, &cfg.manifest_file),
        };
        let section = self.section.clone().unwrap_or_else(|| cfg.section.clone());
        let tasks = plan_sync(&manifest_path, &section, self.task_filter())?;

        // The log file is opened only once there is work to do.
        if logging::init_logging().is_err() {
            logging::init_logging_stderr();
        }
        tracing::debug!("loaded config: {:?}", cfg);

        run_sync(&cfg, &manifest_path, tasks).await
    }
}
