//! Sequential task runner: download, verify, clean, extract.
//!
//! Each task walks `Pending -> Downloading -> [Verifying] -> [Cleaning] ->
//! Extracting -> Done`, or stops in `Failed`. The downloaded archive lives in
//! a scratch file owned by [`TransferState`], which removes it on every exit
//! path. The first failing task aborts the run.

use crate::checksum;
use crate::config::SyncConfig;
use crate::downloader::{self, TransferOptions};
use crate::error::SyncError;
use crate::extract;
use crate::interpolate;
use crate::manifest::Task;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tempfile::TempPath;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Downloading,
    Verifying,
    Cleaning,
    Extracting,
    Done,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Downloading => "downloading",
            TaskState::Verifying => "verifying",
            TaskState::Cleaning => "cleaning",
            TaskState::Extracting => "extracting",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress notifications sent to an optional listener (the CLI prints them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Started {
        task: String,
        url: String,
        destination: PathBuf,
    },
    /// A stage began.
    Stage { task: String, state: TaskState },
    /// The stage that last began finished successfully.
    StageDone { task: String, state: TaskState },
    Completed { task: String, report: TaskReport },
    /// `state` is the stage that was active when the task failed.
    Failed { task: String, state: TaskState },
}

/// What one successful task did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    pub bytes: u64,
    /// Digest computed during verification, when the task has a checksum.
    pub checksum: Option<String>,
    pub entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tasks: usize,
    pub bytes: u64,
    pub entries: usize,
    pub elapsed: Duration,
}

/// Scratch file holding one in-flight download. Deleted on drop; failures to
/// delete are logged and otherwise ignored.
pub struct TransferState {
    path: Option<TempPath>,
}

impl TransferState {
    /// Creates `scratch_dir` if needed and reserves a fresh
    /// `temp-<unix millis>-<random>.zip` file inside it.
    pub fn acquire(scratch_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(scratch_dir)?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let prefix = format!("temp-{}-", millis);
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".zip")
            .rand_bytes(8)
            .tempfile_in(scratch_dir)?;
        Ok(Self {
            path: Some(file.into_temp_path()),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for TransferState {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let shown = path.to_path_buf();
        match path.close() {
            Ok(()) => tracing::debug!("removed scratch file {}", shown.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("cleanup failed for {}: {}", shown.display(), e),
        }
    }
}

/// Everything a run needs besides the task list.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Relative task destinations are resolved against this directory.
    pub project_root: PathBuf,
    pub scratch_dir: PathBuf,
    pub transfer: TransferOptions,
    pub extract_timeout: Option<Duration>,
}

impl RunOptions {
    pub fn from_config(cfg: &SyncConfig, project_root: PathBuf) -> Self {
        Self {
            project_root,
            scratch_dir: cfg.scratch_dir(),
            transfer: cfg.transfer_options(),
            extract_timeout: cfg.extract_timeout(),
        }
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct TaskRunner {
    options: RunOptions,
    events: Option<UnboundedSender<TaskEvent>>,
    env: EnvLookup,
}

impl TaskRunner {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            events: None,
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Send progress events to `tx`. A closed receiver is ignored.
    pub fn with_events(mut self, tx: UnboundedSender<TaskEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Replace the process environment as the source for `auth` interpolation.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// Runs `tasks` in order, stopping at the first failure.
    pub fn run_all(&self, tasks: &[Task]) -> Result<RunSummary, SyncError> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        for task in tasks {
            let report = self.run_task(task)?;
            summary.tasks += 1;
            summary.bytes += report.bytes;
            summary.entries += report.entries;
        }
        summary.elapsed = started.elapsed();
        tracing::info!(
            "run finished: {} task(s), {} bytes in {:.2}s",
            summary.tasks,
            summary.bytes,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    pub fn run_task(&self, task: &Task) -> Result<TaskReport, SyncError> {
        let destination = task.destination_in(&self.options.project_root);
        tracing::info!(task = %task.name, url = %task.source_url, "starting, destination {}", destination.display());
        self.emit(TaskEvent::Started {
            task: task.name.clone(),
            url: task.source_url.clone(),
            destination: destination.clone(),
        });

        let mut state = TaskState::Pending;
        match self.run_stages(task, &destination, &mut state) {
            Ok(report) => {
                tracing::info!(task = %task.name, "{} -> {}", state, TaskState::Done);
                self.emit(TaskEvent::Completed {
                    task: task.name.clone(),
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(err) => {
                tracing::error!(task = %task.name, "{} -> {}: {}", state, TaskState::Failed, err);
                self.emit(TaskEvent::Failed {
                    task: task.name.clone(),
                    state,
                });
                Err(err)
            }
        }
    }

    fn run_stages(
        &self,
        task: &Task,
        destination: &Path,
        state: &mut TaskState,
    ) -> Result<TaskReport, SyncError> {
        let (transfer, bytes) = self.step(task, state, TaskState::Downloading, || {
            let transfer = TransferState::acquire(&self.options.scratch_dir).map_err(|source| {
                SyncError::Scratch {
                    task: task.name.clone(),
                    path: self.options.scratch_dir.clone(),
                    source,
                }
            })?;
            let authorization = task
                .authorization
                .as_deref()
                .map(|template| interpolate::expand_env(template, |name| (self.env)(name)));
            let bytes = downloader::download(
                &task.source_url,
                transfer.path(),
                authorization.as_deref(),
                &self.options.transfer,
            )
            .map_err(|source| SyncError::DownloadFailed {
                task: task.name.clone(),
                source,
            })?;
            Ok((transfer, bytes))
        })?;

        let checksum = match &task.expected_checksum {
            Some(expected) => Some(self.step(task, state, TaskState::Verifying, || {
                verify_archive(task, transfer.path(), expected)
            })?),
            None => None,
        };

        if task.clean {
            self.step(task, state, TaskState::Cleaning, || {
                extract::clean_destination(destination).map_err(|source| SyncError::CleanFailed {
                    task: task.name.clone(),
                    path: destination.to_path_buf(),
                    source,
                })
            })?;
        }

        let entries = self.step(task, state, TaskState::Extracting, || {
            extract::extract_archive(transfer.path(), destination, self.options.extract_timeout)
                .map_err(|source| SyncError::ExtractionFailed {
                    task: task.name.clone(),
                    source,
                })
        })?;

        drop(transfer);
        Ok(TaskReport {
            bytes,
            checksum,
            entries,
        })
    }

    /// Enter `next`, run it, and report the stage as finished on success.
    fn step<T>(
        &self,
        task: &Task,
        state: &mut TaskState,
        next: TaskState,
        run: impl FnOnce() -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        tracing::info!(task = %task.name, "{} -> {}", state, next);
        *state = next;
        self.emit(TaskEvent::Stage {
            task: task.name.clone(),
            state: next,
        });
        let out = run()?;
        self.emit(TaskEvent::StageDone {
            task: task.name.clone(),
            state: next,
        });
        Ok(out)
    }

    fn emit(&self, event: TaskEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

fn verify_archive(task: &Task, archive: &Path, expected: &str) -> Result<String, SyncError> {
    let v = checksum::verify(archive, expected).map_err(|source| SyncError::ChecksumFailed {
        task: task.name.clone(),
        source,
    })?;
    if !v.matches {
        return Err(SyncError::ChecksumMismatch {
            task: task.name.clone(),
            algorithm: v.algorithm,
            expected: expected.to_string(),
            actual: v.actual,
        });
    }
    tracing::debug!(task = %task.name, "{} checksum ok: {}", v.algorithm, v.actual);
    Ok(v.actual)
}
