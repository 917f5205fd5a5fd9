//! Task list loading from the project manifest and task selection.
//!
//! The manifest is a JSON document (normally `package.json`) whose
//! `code-sync` section is an array of tasks:
//!
//! ```json
//! { "code-sync": [
//!     { "name": "assets", "zipUrl": "https://host/a.zip", "unzipPath": "public/assets",
//!       "crc64": "…", "auth": "Bearer ${TOKEN}", "clean": true }
//! ] }
//! ```

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Manifest file looked up in the project root.
pub const DEFAULT_MANIFEST_FILE: &str = "package.json";
/// Key of the task array inside the manifest.
pub const DEFAULT_SECTION: &str = "code-sync";

/// One download-and-extract unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(rename = "zipUrl")]
    pub source_url: String,
    #[serde(rename = "unzipPath")]
    pub destination: PathBuf,
    /// Expected archive digest (hex). See [`crate::checksum`].
    #[serde(rename = "crc64", default, skip_serializing_if = "Option::is_none")]
    pub expected_checksum: Option<String>,
    /// `Authorization` header template; may reference environment variables.
    #[serde(rename = "auth", default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
    #[serde(default)]
    pub clean: bool,
}

impl Task {
    /// Destination resolved against the project root (absolute paths win).
    pub fn destination_in(&self, root: &Path) -> PathBuf {
        root.join(&self.destination)
    }

    fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.destination.as_os_str().is_empty() {
            return Err("unzipPath must not be empty".to_string());
        }
        let url = url::Url::parse(&self.source_url)
            .map_err(|e| format!("zipUrl {:?} is not a valid URL: {}", self.source_url, e))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(format!("zipUrl scheme {:?} is not supported", other)),
        }
    }
}

/// Path of the manifest inside `project_dir`.
pub fn manifest_path(project_dir: &Path, file_name: &str) -> PathBuf {
    project_dir.join(file_name)
}

/// Load the task array stored under `section` in the manifest at `path`.
///
/// Tasks are returned in file order.
pub fn load_tasks(path: &Path, section: &str) -> Result<Vec<Task>, SyncError> {
    let data = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            SyncError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            SyncError::ConfigRead {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let doc: serde_json::Value =
        serde_json::from_str(&data).map_err(|source| SyncError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

    let entries = doc
        .get(section)
        .and_then(|v| v.as_array())
        .ok_or_else(|| SyncError::ConfigInvalid {
            path: path.to_path_buf(),
            section: section.to_string(),
        })?;

    let invalid = |index: usize, reason: String| SyncError::TaskInvalid {
        path: path.to_path_buf(),
        section: section.to_string(),
        index,
        reason,
    };

    let mut tasks = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let task = Task::deserialize(entry).map_err(|e| invalid(index, e.to_string()))?;
        task.check().map_err(|reason| invalid(index, reason))?;
        tasks.push(task);
    }

    tracing::debug!("loaded {} task(s) from {}", tasks.len(), path.display());
    Ok(tasks)
}

/// Keep every task named `name` (all of them when `name` is `None`).
///
/// Order is preserved. Fails with `TaskNotFound` when a name matches nothing.
pub fn select_tasks(tasks: Vec<Task>, name: Option<&str>) -> Result<Vec<Task>, SyncError> {
    let Some(name) = name else {
        return Ok(tasks);
    };
    let selected: Vec<Task> = tasks.into_iter().filter(|t| t.name == name).collect();
    if selected.is_empty() {
        return Err(SyncError::TaskNotFound {
            name: name.to_string(),
        });
    }
    Ok(selected)
}
