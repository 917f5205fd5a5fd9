//! ZIP extraction into a destination directory, plus the destination cleaner.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot open archive {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("cannot read archive entry #{index}")]
    Entry {
        index: usize,
        #[source]
        source: ZipError,
    },

    #[error("archive entry {name:?} escapes the destination directory")]
    UnsafePath { name: String },

    #[error("cannot write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("extraction did not finish within {}s", limit.as_secs())]
    TimedOut { limit: Duration },
}

/// Unpacks every entry of the ZIP at `archive` under `dest`.
///
/// Creates `dest` (and parents) when missing. Existing files at an entry's
/// path are overwritten; files not in the archive are left alone. Entries
/// whose name is absolute or climbs out of `dest` fail the whole extraction.
/// When `timeout` is set it is checked between entries.
///
/// Returns the number of entries processed.
pub fn extract_archive(
    archive: &Path,
    dest: &Path,
    timeout: Option<Duration>,
) -> Result<usize, ExtractError> {
    let started = Instant::now();
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ExtractError::Io { path, source }
    };

    let file = File::open(archive).map_err(|e| ExtractError::Open {
        path: archive.to_path_buf(),
        source: ZipError::Io(e),
    })?;
    let mut zip = ZipArchive::new(file).map_err(|source| ExtractError::Open {
        path: archive.to_path_buf(),
        source,
    })?;

    fs::create_dir_all(dest).map_err(io_err(dest))?;

    for index in 0..zip.len() {
        if let Some(limit) = timeout {
            if started.elapsed() > limit {
                return Err(ExtractError::TimedOut { limit });
            }
        }

        let mut entry = zip
            .by_index(index)
            .map_err(|source| ExtractError::Entry { index, source })?;
        let relative = entry.enclosed_name().ok_or_else(|| ExtractError::UnsafePath {
            name: entry.name().to_string(),
        })?;
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(io_err(&outpath))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        // A read-only file from an earlier sync cannot be truncated in place.
        match fs::remove_file(&outpath) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                return Err(io_err(&outpath)(e));
            }
            _ => {}
        }
        let mut outfile = File::create(&outpath).map_err(io_err(&outpath))?;
        io::copy(&mut entry, &mut outfile).map_err(io_err(&outpath))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))
                    .map_err(io_err(&outpath))?;
            }
        }
    }

    tracing::debug!(
        "extracted {} entries from {} into {}",
        zip.len(),
        archive.display(),
        dest.display()
    );
    Ok(zip.len())
}

/// Removes `path` recursively. A missing path is not an error.
pub fn clean_destination(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
