//! # llm-bench core
//!
//! Library behind the `llm-bench` command: finds or installs the LocalScore
//! binary, picks and downloads a GGUF model from the Hugging Face hub and
//! runs the benchmark against it with the output streamed to the console.

pub mod config;
pub mod error;
pub mod fetch;
pub mod hub;
pub mod installer;
pub mod locator;
pub mod model_fetcher;
pub mod orchestrator;
pub mod platform;
pub mod runner;
pub mod selector;

// Re-export commonly used types at the crate root.
pub use config::{BenchConfig, load_config};
pub use error::{BenchError, DownloadError, Result};
pub use fetch::{Fetcher, HttpFetcher, MockFetcher};
pub use hub::{HubClient, RemoteFile};
pub use installer::{BinaryFetcher, ReleaseAsset};
pub use locator::BinaryLocator;
pub use model_fetcher::{LocalArtifact, ModelFetcher, resolve_model_path};
pub use orchestrator::{Orchestrator, RunOutcome, RunRequest, RunState};
pub use platform::Platform;
pub use runner::{
    BenchmarkInvocation, BenchmarkRunner, MockProcessRunner, ProcessOutcome, ProcessRunner,
    SystemProcessRunner,
};
pub use selector::{ModelSelector, QuantPreference, select_model};
