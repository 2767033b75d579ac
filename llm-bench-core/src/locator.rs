//! Locating an installed localscore executable.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::expand_tilde;
use crate::error::BenchError;

/// Searches `PATH` and then the working directory for the binary.
#[derive(Debug, Clone)]
pub struct BinaryLocator {
    search_path: Option<OsString>,
    working_dir: PathBuf,
    binary_name: String,
}

impl BinaryLocator {
    pub fn new(
        search_path: Option<OsString>,
        working_dir: impl Into<PathBuf>,
        binary_name: impl Into<String>,
    ) -> Self {
        Self {
            search_path,
            working_dir: working_dir.into(),
            binary_name: binary_name.into(),
        }
    }

    /// Locator over the process `PATH`.
    pub fn from_env(working_dir: impl Into<PathBuf>, binary_name: impl Into<String>) -> Self {
        Self::new(std::env::var_os("PATH"), working_dir, binary_name)
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// Return the first executable match, `PATH` entries first.
    pub fn find(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.search_path {
            for dir in std::env::split_paths(path) {
                let dir = expand_tilde(&dir);
                if !dir.is_dir() {
                    continue;
                }
                let candidate = dir.join(&self.binary_name);
                if is_executable(&candidate) {
                    debug!(path = %candidate.display(), "Found binary on PATH");
                    return Some(absolute(&candidate));
                }
            }
        }

        let local = self.working_dir.join(&self.binary_name);
        if is_executable(&local) {
            debug!(path = %local.display(), "Found binary in working directory");
            return Some(absolute(&local));
        }
        None
    }

    /// Like [`find`](Self::find), but a miss is an error.
    pub fn locate(&self) -> Result<PathBuf, BenchError> {
        self.find().ok_or_else(|| BenchError::NotFound {
            binary: self.binary_name.clone(),
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
