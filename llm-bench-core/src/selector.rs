//! Choosing a GGUF file from a repository listing.
//!
//! Keep `.gguf` files in listing order, take the first whose name contains
//! the preferred quantization marker (case-insensitive), otherwise the first
//! file.

use tracing::info;

use crate::error::BenchError;
use crate::hub::{HubClient, RemoteFile};

/// The only model format llm-bench handles.
pub const MODEL_EXTENSION: &str = ".gguf";

/// Ordered quantization markers, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantPreference {
    markers: Vec<String>,
}

impl QuantPreference {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Whether `filename` carries `marker`.
    fn matches(marker: &str, filename: &str) -> bool {
        filename.to_lowercase().contains(marker)
    }
}

impl Default for QuantPreference {
    fn default() -> Self {
        Self::new(["q4"])
    }
}

/// Whether `filename` has the model extension.
pub fn is_model_file(filename: &str) -> bool {
    filename.to_lowercase().ends_with(MODEL_EXTENSION)
}

/// Pick a name from `candidates`, which must already be model files.
///
/// Returns the index of the chosen candidate, or `None` when empty.
pub fn select_index<S: AsRef<str>>(candidates: &[S], preference: &QuantPreference) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    preference
        .markers()
        .iter()
        .find_map(|marker| {
            candidates
                .iter()
                .position(|c| QuantPreference::matches(marker, c.as_ref()))
        })
        .or(Some(0))
}

/// Filter a listing to model files and pick one.
pub fn select_model(
    repo_id: &str,
    files: &[RemoteFile],
    preference: &QuantPreference,
) -> Result<RemoteFile, BenchError> {
    let candidates: Vec<&RemoteFile> = files.iter().filter(|f| is_model_file(&f.filename)).collect();
    let names: Vec<&str> = candidates.iter().map(|f| f.filename.as_str()).collect();

    let index = select_index(&names, preference).ok_or_else(|| BenchError::NoModelFiles {
        repo_id: repo_id.to_string(),
    })?;
    Ok(candidates[index].clone())
}

/// Lists a repository and applies the selection heuristic.
pub struct ModelSelector<'a> {
    hub: &'a HubClient,
    preference: QuantPreference,
}

impl<'a> ModelSelector<'a> {
    pub fn new(hub: &'a HubClient, preference: QuantPreference) -> Self {
        Self { hub, preference }
    }

    pub async fn select(&self, repo_id: &str) -> Result<RemoteFile, BenchError> {
        let files = self.hub.list_files(repo_id).await?;
        let chosen = select_model(repo_id, &files, &self.preference)?;
        info!(repo_id, filename = %chosen.filename, "Found GGUF file");
        Ok(chosen)
    }
}
