//! Error types for llm-bench.
//!
//! Uses `thiserror` for a single top-level error covering binary lookup,
//! downloads, model selection and the benchmark process itself. Every
//! variant is terminal for a run and maps to a process exit code.

use std::path::PathBuf;

/// Top-level error type for the llm-bench core library.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error(
        "{binary} not found in PATH or current directory. Run with --download-localscore first."
    )]
    NotFound { binary: String },

    #[error("Model file not found. Looked for: {}. MODEL_DIR is set to: {}", display_paths(.tried), .model_dir.display())]
    ModelNotFound {
        tried: Vec<PathBuf>,
        model_dir: PathBuf,
    },

    #[error("No localscore release for platform {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("No GGUF files found in repository {repo_id}")]
    NoModelFiles { repo_id: String },

    #[error("localscore exited with status {code}")]
    BenchmarkFailed { code: i32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Process exit code for this error.
    ///
    /// A failed benchmark propagates the child's own status; everything else
    /// gets a fixed code per variant.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BenchmarkFailed { code } if *code > 0 => *code,
            Self::BenchmarkFailed { .. } => 1,
            Self::NotFound { .. } => 2,
            Self::ModelNotFound { .. } => 3,
            Self::UnsupportedPlatform { .. } => 4,
            Self::Download(_) => 5,
            Self::NoModelFiles { .. } => 6,
            Self::Config(_) => 7,
            Self::Io(_) => 8,
        }
    }
}

/// Errors from network transfers and archive handling.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("archive error: {message}")]
    Archive { message: String },

    #[error("IO error during transfer: {0}")]
    Io(#[from] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, BenchError>;
