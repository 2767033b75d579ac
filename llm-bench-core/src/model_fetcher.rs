//! Model download with a local cache check, and model path resolution.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{BenchError, DownloadError};
use crate::fetch::Fetcher;
use crate::hub::RemoteFile;

/// A model file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    /// True when the file was already present and nothing was transferred.
    pub cached: bool,
}

/// Downloads selected files into the model directory.
pub struct ModelFetcher {
    fetcher: Arc<dyn Fetcher>,
    model_dir: PathBuf,
}

impl ModelFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            model_dir: model_dir.into(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Where `file` lives locally.
    ///
    /// Filenames must stay below the model directory: absolute paths and
    /// `..` segments are rejected.
    pub fn local_path(&self, file: &RemoteFile) -> Result<PathBuf, DownloadError> {
        let relative = Path::new(&file.filename);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || file.filename.is_empty() {
            return Err(DownloadError::InvalidResponse {
                url: file.url.clone(),
                message: format!("refusing to store {:?} outside the model directory", file.filename),
            });
        }
        Ok(self.model_dir.join(relative))
    }

    /// Return the local copy of `file`, downloading it only when absent.
    pub async fn fetch(&self, file: &RemoteFile) -> Result<LocalArtifact, BenchError> {
        let dest = self.local_path(file)?;
        if dest.is_file() {
            info!(path = %dest.display(), "Model already present, skipping download");
            return Ok(LocalArtifact {
                path: dest,
                cached: true,
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(
            repo_id = %file.repo_id,
            filename = %file.filename,
            url = %file.url,
            size = file.size,
            "Downloading model"
        );

        let partial = part_path(&dest);
        match self.fetcher.download(&file.url, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &dest).await?;
                info!(path = %dest.display(), bytes, "Model downloaded");
                Ok(LocalArtifact {
                    path: dest,
                    cached: false,
                })
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&partial).await
                    && rm.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(path = %partial.display(), error = %rm, "Failed to remove partial download");
                }
                Err(e.into())
            }
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Resolve the model path given on the command line.
///
/// An existing path is used as is. A relative path that does not exist is
/// retried under `model_dir`. Relative paths are taken against `cwd`.
pub fn resolve_model_path(
    model: &Path,
    cwd: &Path,
    model_dir: &Path,
) -> Result<PathBuf, BenchError> {
    let direct = if model.is_absolute() {
        model.to_path_buf()
    } else {
        cwd.join(model)
    };
    if direct.is_file() {
        return Ok(canonical(&direct));
    }

    let mut tried = vec![direct];
    if !model.is_absolute() {
        let under_model_dir = model_dir.join(model);
        if under_model_dir.is_file() {
            return Ok(canonical(&under_model_dir));
        }
        tried.push(under_model_dir);
    }

    Err(BenchError::ModelNotFound {
        tried,
        model_dir: model_dir.to_path_buf(),
    })
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
