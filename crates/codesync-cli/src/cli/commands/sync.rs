//! `code-sync [TASK]` – run the configured download/extract tasks in order.

use anyhow::Result;
use codesync_core::config::SyncConfig;
use codesync_core::manifest::{self, Task};
use codesync_core::{RunOptions, TaskEvent, TaskRunner, TaskState};
use std::path::{Path, PathBuf};

/// Prints the banner, loads the manifest and picks the tasks to run.
///
/// Touches nothing on disk; a bad manifest or unknown task stops here.
pub fn plan_sync(manifest_path: &Path, section: &str, task: Option<&str>) -> Result<Vec<Task>> {
    println!("Code Sync Tool\n");

    let tasks = manifest::load_tasks(manifest_path, section)?;
    let tasks = manifest::select_tasks(tasks, task)?;
    match task {
        Some(name) => println!("Running task: {}", name),
        None => println!("Running {} tasks", tasks.len()),
    }
    Ok(tasks)
}

/// Runs `tasks` with destinations relative to the manifest's directory.
pub async fn run_sync(cfg: &SyncConfig, manifest_path: &Path, tasks: Vec<Task>) -> Result<()> {
    let project_root = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let runner = TaskRunner::new(RunOptions::from_config(cfg, project_root));

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel::<TaskEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            println!("{}", describe(&event));
        }
    });

    // The runner (and its sender) is dropped when the blocking task ends, which closes the printer.
    let runner = runner.with_events(events_tx);
    let result = tokio::task::spawn_blocking(move || runner.run_all(&tasks)).await?;
    let _ = printer.await;
    let summary = result?;

    println!(
        "\nAll tasks completed! {} task(s), {:.2} MiB in {:.1}s",
        summary.tasks,
        summary.bytes as f64 / 1_048_576.0,
        summary.elapsed.as_secs_f64()
    );
    tracing::info!("sync completed {} task(s)", summary.tasks);
    Ok(())
}

/// Human-readable narration line(s) for one runner event.
pub(crate) fn describe(event: &TaskEvent) -> String {
    match event {
        TaskEvent::Started {
            task,
            url,
            destination,
        } => format!(
            "\n[Task: {}] Starting...\n  URL: {}\n  Destination: {}",
            task,
            url,
            destination.display()
        ),
        TaskEvent::Stage { state, .. } => match state {
            TaskState::Downloading => "  Downloading...".to_string(),
            TaskState::Verifying => "  Verifying checksum...".to_string(),
            TaskState::Cleaning => "  Cleaning target directory...".to_string(),
            TaskState::Extracting => "  Extracting...".to_string(),
            other => format!("  {}", other),
        },
        TaskEvent::StageDone { state, .. } => match state {
            TaskState::Downloading => "  Downloaded".to_string(),
            TaskState::Verifying => "  Verified".to_string(),
            TaskState::Cleaning => "  Cleaned".to_string(),
            TaskState::Extracting => "  Extracted".to_string(),
            other => format!("  {} finished", other),
        },
        TaskEvent::Completed { task, report } => format!(
            "[Task: {}] Completed ({} bytes, {} entries)",
            task, report.bytes, report.entries
        ),
        TaskEvent::Failed { task, state } => {
            format!("[Task: {}] Failed while {}", task, state)
        }
    }
}
