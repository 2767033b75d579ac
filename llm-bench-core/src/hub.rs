//! Hugging Face Hub client: repository listing and resolve URLs.

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{BenchError, DownloadError};
use crate::fetch::Fetcher;
use crate::platform::Platform;

/// A file in a remote model repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub repo_id: String,
    /// Path of the file within the repository.
    pub filename: String,
    pub size: Option<u64>,
    pub url: String,
}

/// Subset of the `api/models/{repo}` response.
#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
    #[serde(default)]
    size: Option<u64>,
}

/// Thin client over the two hub endpoints llm-bench needs.
pub struct HubClient {
    fetcher: Arc<dyn Fetcher>,
    endpoint: String,
    revision: String,
}

impl HubClient {
    pub fn new(fetcher: Arc<dyn Fetcher>, endpoint: impl Into<String>) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            revision: "main".into(),
        }
    }

    /// Pin listings and downloads to a branch, tag or commit.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// URL that serves the raw content of `filename`.
    pub fn file_url(&self, repo_id: &str, filename: &str) -> String {
        let path = filename
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint,
            repo_id,
            urlencoding::encode(&self.revision),
            path
        )
    }

    fn info_url(&self, repo_id: &str) -> String {
        format!(
            "{}/api/models/{}/revision/{}?blobs=true",
            self.endpoint,
            repo_id,
            urlencoding::encode(&self.revision)
        )
    }

    /// A remote file handle without consulting the listing.
    pub fn remote_file(&self, repo_id: &str, filename: &str) -> RemoteFile {
        RemoteFile {
            repo_id: repo_id.to_string(),
            filename: filename.to_string(),
            size: None,
            url: self.file_url(repo_id, filename),
        }
    }

    /// List every file in `repo_id`, in the order the hub returns them.
    pub async fn list_files(&self, repo_id: &str) -> Result<Vec<RemoteFile>, BenchError> {
        let url = self.info_url(repo_id);
        let body = self.fetcher.get(&url).await?;
        let info: ModelInfo =
            serde_json::from_slice(&body).map_err(|e| DownloadError::InvalidResponse {
                url: url.clone(),
                message: e.to_string(),
            })?;

        debug!(repo_id, files = info.siblings.len(), "Listed repository");
        Ok(info
            .siblings
            .into_iter()
            .map(|s| RemoteFile {
                url: self.file_url(repo_id, &s.rfilename),
                repo_id: repo_id.to_string(),
                filename: s.rfilename,
                size: s.size,
            })
            .collect())
    }
}

/// User agent for hub requests.
///
/// With telemetry enabled the host platform is reported as well.
pub fn hub_user_agent(telemetry_disabled: bool) -> String {
    let base = format!("llm-bench/{}", env!("CARGO_PKG_VERSION"));
    if telemetry_disabled {
        base
    } else {
        let platform = Platform::current();
        format!("{base}; os/{}; arch/{}", platform.os, platform.arch)
    }
}
