//! Pull prebuilt archives into a project: download, verify, clean, extract.

pub mod checksum;
pub mod config;
pub mod downloader;
pub mod error;
pub mod extract;
pub mod interpolate;
pub mod logging;
pub mod manifest;
pub mod runner;

pub use error::SyncError;
pub use manifest::Task;
pub use runner::{RunOptions, RunSummary, TaskEvent, TaskReport, TaskRunner, TaskState};
