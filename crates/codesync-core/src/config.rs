use crate::downloader::TransferOptions;
use crate::manifest::{DEFAULT_MANIFEST_FILE, DEFAULT_SECTION};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tool settings loaded from `~/.config/code-sync/config.toml`.
///
/// Every key is optional; missing keys take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Manifest file name, relative to the working directory.
    pub manifest_file: String,
    /// Key of the task array inside the manifest.
    pub section: String,
    /// TCP connect timeout per download, in seconds.
    pub connect_timeout_secs: u64,
    /// Deadline for one whole download, in seconds.
    pub transfer_timeout_secs: u64,
    /// Abort a download slower than this many bytes/s for `low_speed_time_secs`.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time_secs: u64,
    /// Maximum redirect hops followed per download.
    pub max_redirects: u32,
    /// Deadline for one archive extraction, in seconds (0 = none).
    pub extract_timeout_secs: u64,
    /// Where in-flight downloads are stored (default: `<system temp>/code-sync`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    pub user_agent: String,
    /// Hosts that bypass any proxy configured in the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let transfer = TransferOptions::default();
        Self {
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            section: DEFAULT_SECTION.to_string(),
            connect_timeout_secs: transfer.connect_timeout.as_secs(),
            transfer_timeout_secs: transfer.timeout.as_secs(),
            low_speed_limit_bytes: transfer.low_speed_limit,
            low_speed_time_secs: transfer.low_speed_time.as_secs(),
            max_redirects: transfer.max_redirects,
            extract_timeout_secs: 600,
            scratch_dir: None,
            user_agent: transfer.user_agent,
            no_proxy: transfer.no_proxy,
        }
    }
}

impl SyncConfig {
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: Duration::from_secs(self.transfer_timeout_secs),
            low_speed_limit: self.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            max_redirects: self.max_redirects,
            user_agent: self.user_agent.clone(),
            no_proxy: self.no_proxy.clone(),
        }
    }

    pub fn extract_timeout(&self) -> Option<Duration> {
        (self.extract_timeout_secs > 0).then(|| Duration::from_secs(self.extract_timeout_secs))
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("code-sync"))
    }
}

/// Location of the user config file, if one exists.
pub fn config_path() -> Result<Option<PathBuf>> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("code-sync")?;
    Ok(xdg_dirs.find_config_file("config.toml"))
}

/// Load the user config, falling back to defaults when there is none.
///
/// Never writes to disk.
pub fn load() -> Result<SyncConfig> {
    match config_path()? {
        Some(path) => load_from_path(&path),
        None => Ok(SyncConfig::default()),
    }
}

pub fn load_from_path(path: &Path) -> Result<SyncConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SyncConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.manifest_file, "package.json");
        assert_eq!(cfg.section, "code-sync");
        assert_eq!(cfg.max_redirects, 10);
        assert_eq!(cfg.connect_timeout_secs, 30);
        assert_eq!(cfg.extract_timeout(), Some(Duration::from_secs(600)));
        assert!(cfg.scratch_dir().ends_with("code-sync"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SyncConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SyncConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.manifest_file, cfg.manifest_file);
        assert_eq!(parsed.transfer_timeout_secs, cfg.transfer_timeout_secs);
        assert_eq!(parsed.user_agent, cfg.user_agent);
        assert!(parsed.scratch_dir.is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml = r#"
            section = "vendor-sync"
            max_redirects = 3
            extract_timeout_secs = 0
            scratch_dir = "/var/tmp/cs"
        "#;
        let cfg: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.section, "vendor-sync");
        assert_eq!(cfg.manifest_file, "package.json");
        assert_eq!(cfg.transfer_options().max_redirects, 3);
        assert_eq!(cfg.transfer_options().connect_timeout, Duration::from_secs(30));
        assert_eq!(cfg.extract_timeout(), None);
        assert_eq!(cfg.scratch_dir(), PathBuf::from("/var/tmp/cs"));
    }

    #[test]
    fn load_from_path_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_redirects = \"many\"").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("config.toml"));
    }
}
