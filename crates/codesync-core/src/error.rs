//! Run-level error type.
//!
//! Every failure that aborts a sync run ends up as a [`SyncError`]. Component
//! errors ([`DownloadError`], [`ExtractError`]) are kept as `#[source]` so the
//! CLI can print the whole chain.

use crate::checksum::ChecksumAlgorithm;
use crate::downloader::DownloadError;
use crate::extract::ExtractError;
use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("manifest not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("failed to read manifest {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse manifest {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{section} configuration not found in {} or format is incorrect", path.display())]
    ConfigInvalid { path: PathBuf, section: String },

    #[error("{section}[{index}] in {} is invalid: {reason}", path.display())]
    TaskInvalid {
        path: PathBuf,
        section: String,
        index: usize,
        reason: String,
    },

    #[error("task \"{name}\" not found in configuration")]
    TaskNotFound { name: String },

    #[error("[{task}] cannot prepare scratch file in {}", path.display())]
    Scratch {
        task: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("[{task}] download failed")]
    DownloadFailed {
        task: String,
        #[source]
        source: DownloadError,
    },

    #[error("[{task}] cannot compute checksum of downloaded archive")]
    ChecksumFailed {
        task: String,
        #[source]
        source: io::Error,
    },

    #[error("[{task}] {algorithm} checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        task: String,
        algorithm: ChecksumAlgorithm,
        expected: String,
        actual: String,
    },

    #[error("[{task}] failed to clean {}", path.display())]
    CleanFailed {
        task: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("[{task}] extraction failed")]
    ExtractionFailed {
        task: String,
        #[source]
        source: ExtractError,
    },
}

impl SyncError {
    /// Name of the task the error belongs to, if it happened while running one.
    pub fn task(&self) -> Option<&str> {
        match self {
            SyncError::Scratch { task, .. }
            | SyncError::DownloadFailed { task, .. }
            | SyncError::ChecksumFailed { task, .. }
            | SyncError::ChecksumMismatch { task, .. }
            | SyncError::CleanFailed { task, .. }
            | SyncError::ExtractionFailed { task, .. } => Some(task),
            _ => None,
        }
    }
}
