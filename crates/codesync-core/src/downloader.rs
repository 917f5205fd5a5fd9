//! Single-stream HTTP GET of an archive into a local file.
//!
//! Uses a blocking libcurl `Easy` handle. Redirects are followed up to a
//! configured hop limit and the authorization header travels with them.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Transfer limits applied to every download.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    /// Deadline for the whole transfer, redirects included.
    pub timeout: Duration,
    /// Abort when the rate stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub max_redirects: u32,
    pub user_agent: String,
    /// Hosts reached without the proxy from the environment (curl `noproxy` syntax).
    pub no_proxy: Option<String>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(3600),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            max_redirects: 10,
            user_agent: concat!("code-sync/", env!("CARGO_PKG_VERSION")).to_string(),
            no_proxy: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("cannot configure request for {url}")]
    Setup {
        url: String,
        #[source]
        source: curl::Error,
    },

    #[error("cannot create {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("GET {url} returned HTTP {code}")]
    Status { url: String, code: u32 },

    #[error("GET {url} exceeded {limit} redirects")]
    TooManyRedirects { url: String, limit: u32 },

    #[error("GET {url} failed")]
    Transfer {
        url: String,
        #[source]
        source: curl::Error,
    },

    #[error("writing {} failed", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    /// HTTP status of the final response, when the failure was a status error.
    pub fn status(&self) -> Option<u32> {
        match self {
            DownloadError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Downloads `url` into `dest`, optionally sending `authorization` as the
/// `Authorization` header. Returns the number of body bytes written.
///
/// On any failure the partially written file is removed (best-effort).
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
pub fn download(
    url: &str,
    dest: &Path,
    authorization: Option<&str>,
    opts: &TransferOptions,
) -> Result<u64, DownloadError> {
    let file = File::create(dest).map_err(|source| DownloadError::Open {
        path: dest.to_path_buf(),
        source,
    })?;

    let result = fetch_into(url, dest, file, authorization, opts);
    if result.is_err() {
        if let Err(e) = fs::remove_file(dest) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::debug!("could not remove partial download {}: {}", dest.display(), e);
            }
        }
    }
    result
}

fn fetch_into(
    url: &str,
    dest: &Path,
    file: File,
    authorization: Option<&str>,
    opts: &TransferOptions,
) -> Result<u64, DownloadError> {
    let setup = |source| DownloadError::Setup {
        url: url.to_string(),
        source,
    };

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(setup)?;
    easy.follow_location(true).map_err(setup)?;
    easy.max_redirections(opts.max_redirects).map_err(setup)?;
    easy.unrestricted_auth(true).map_err(setup)?;
    easy.useragent(&opts.user_agent).map_err(setup)?;
    easy.connect_timeout(opts.connect_timeout).map_err(setup)?;
    easy.low_speed_limit(opts.low_speed_limit).map_err(setup)?;
    easy.low_speed_time(opts.low_speed_time).map_err(setup)?;
    easy.timeout(opts.timeout).map_err(setup)?;
    if let Some(hosts) = &opts.no_proxy {
        easy.noproxy(hosts).map_err(setup)?;
    }

    if let Some(auth) = authorization {
        let mut list = curl::easy::List::new();
        list.append(&format!("Authorization: {}", auth))
            .map_err(setup)?;
        easy.http_headers(list).map_err(setup)?;
    }

    let mut writer = BufWriter::new(file);
    let mut written = 0u64;
    let mut write_error: Option<io::Error> = None;

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match writer.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    write_error = Some(e);
                    Ok(0) // abort transfer
                }
            })
            .map_err(setup)?;
        transfer.perform()
    };

    let write_failed = |source| DownloadError::Write {
        path: dest.to_path_buf(),
        source,
    };
    if let Some(e) = write_error {
        return Err(write_failed(e));
    }
    if let Err(source) = performed {
        if source.is_too_many_redirects() {
            return Err(DownloadError::TooManyRedirects {
                url: url.to_string(),
                limit: opts.max_redirects,
            });
        }
        return Err(DownloadError::Transfer {
            url: url.to_string(),
            source,
        });
    }

    let code = easy.response_code().map_err(|source| DownloadError::Transfer {
        url: url.to_string(),
        source,
    })?;
    if !(200..300).contains(&code) {
        return Err(DownloadError::Status {
            url: url.to_string(),
            code,
        });
    }

    let file = writer
        .into_inner()
        .map_err(|e| write_failed(e.into_error()))?;
    file.sync_all().map_err(write_failed)?;

    if let Ok(Some(effective)) = easy.effective_url() {
        if effective != url {
            tracing::debug!("{} redirected to {}", url, effective);
        }
    }
    tracing::debug!("downloaded {} bytes from {} to {}", written, url, dest.display());
    Ok(written)
}
