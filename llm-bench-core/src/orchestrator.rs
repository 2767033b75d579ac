//! Run sequencing.
//!
//! An [`Orchestrator`] walks one run through `Idle -> BinaryReady ->
//! ModelReady -> Running -> Done`. Each step awaits the previous one and any
//! error aborts the run where it happened; the state reached is kept so the
//! caller can report how far the run got.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::hub::{HubClient, hub_user_agent};
use crate::installer::BinaryFetcher;
use crate::locator::BinaryLocator;
use crate::model_fetcher::{ModelFetcher, resolve_model_path};
use crate::platform::Platform;
use crate::runner::{BenchmarkInvocation, BenchmarkRunner, ProcessRunner, SystemProcessRunner};
use crate::selector::{ModelSelector, QuantPreference};

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    BinaryReady,
    ModelReady,
    Running,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::BinaryReady => "binary-ready",
            Self::ModelReady => "model-ready",
            Self::Running => "running",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// What the user asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Model path, or repository id when `download_model` is set.
    pub model: Option<String>,
    pub download_localscore: bool,
    pub download_model: bool,
    /// Download localscore even when one is already available.
    pub force: bool,
    /// Exact file to download instead of selecting one.
    pub filename: Option<String>,
    /// Extra arguments for localscore.
    pub passthrough: Vec<String>,
}

impl RunRequest {
    /// Whether this request leads to a benchmark run.
    pub fn wants_benchmark(&self) -> bool {
        self.model.is_some() || self.download_model
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The benchmark ran and exited successfully.
    Completed { binary: PathBuf, model: PathBuf },
    /// No model was given or requested; only the binary step ran.
    NothingToRun,
}

pub struct Orchestrator {
    config: BenchConfig,
    workspace: PathBuf,
    platform: Platform,
    release_fetcher: Arc<dyn Fetcher>,
    hub_fetcher: Arc<dyn Fetcher>,
    process: Arc<dyn ProcessRunner>,
    locator: BinaryLocator,
    state: RunState,
}

impl Orchestrator {
    /// Orchestrator over the real network, process table and `PATH`.
    pub fn new(config: BenchConfig, workspace: impl Into<PathBuf>) -> Result<Self, BenchError> {
        let workspace = workspace.into();
        let platform = Platform::current();

        let release_fetcher = HttpFetcher::new(format!("llm-bench/{}", env!("CARGO_PKG_VERSION")))?;
        let mut hub_fetcher = HttpFetcher::new(hub_user_agent(config.hf_hub_disable_telemetry))?;
        if let Some(token) = config.token() {
            hub_fetcher = hub_fetcher.with_bearer_token(token);
        }

        Ok(Self {
            locator: BinaryLocator::from_env(&workspace, platform.binary_name()),
            release_fetcher: Arc::new(release_fetcher),
            hub_fetcher: Arc::new(hub_fetcher),
            process: Arc::new(SystemProcessRunner::new()),
            platform,
            workspace,
            config,
            state: RunState::Idle,
        })
    }

    /// Route every request, release and hub alike, through `fetcher`.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.release_fetcher = fetcher.clone();
        self.hub_fetcher = fetcher;
        self
    }

    pub fn with_process_runner(mut self, process: Arc<dyn ProcessRunner>) -> Self {
        self.process = process;
        self
    }

    pub fn with_locator(mut self, locator: BinaryLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    fn advance(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    /// Execute one run.
    pub async fn run(&mut self, request: RunRequest) -> Result<RunOutcome, BenchError> {
        self.state = RunState::Idle;

        if request.download_localscore {
            self.ensure_binary(request.force).await?;
        }
        if !request.wants_benchmark() {
            info!("No model given; nothing to benchmark");
            return Ok(RunOutcome::NothingToRun);
        }

        let binary = self.locator.locate()?;
        info!(path = %binary.display(), "Using localscore");
        self.advance(RunState::BinaryReady);

        let model = self.prepare_model(&request).await?;
        self.advance(RunState::ModelReady);

        let invocation =
            BenchmarkInvocation::new(&binary, &model).with_passthrough(request.passthrough);
        self.advance(RunState::Running);
        BenchmarkRunner::new(self.process.as_ref())
            .run(&invocation)
            .await?;
        self.advance(RunState::Done);

        Ok(RunOutcome::Completed { binary, model })
    }

    /// Download localscore unless one is already available.
    async fn ensure_binary(&self, force: bool) -> Result<PathBuf, BenchError> {
        if !force && let Some(existing) = self.locator.find() {
            info!(
                path = %existing.display(),
                "localscore is already available. Use --force to download anyway."
            );
            return Ok(existing);
        }

        BinaryFetcher::new(
            self.release_fetcher.clone(),
            self.platform.clone(),
            &self.workspace,
            self.config.localscore_url.as_str(),
        )
        .install(&self.config.localscore_version)
        .await
    }

    async fn prepare_model(&self, request: &RunRequest) -> Result<PathBuf, BenchError> {
        if !request.download_model {
            if request.filename.is_some() {
                warn!("--file only applies together with --download-model; ignoring it");
            }
            // wants_benchmark() guarantees a model here
            let model = request.model.as_deref().unwrap_or_default();
            return resolve_model_path(Path::new(model), &self.workspace, &self.config.model_dir);
        }

        let repo_id = request
            .model
            .as_deref()
            .unwrap_or(self.config.hf_repo_id.as_str());
        info!(repo_id, "Downloading model");

        let hub = HubClient::new(self.hub_fetcher.clone(), self.config.hf_endpoint.as_str());
        let file = match request.filename.as_deref() {
            Some(filename) => hub.remote_file(repo_id, filename),
            None => {
                let preference = QuantPreference::new([self.config.quant_marker.as_str()]);
                ModelSelector::new(&hub, preference).select(repo_id).await?
            }
        };
        info!(url = %file.url, "Downloading from");

        let artifact = ModelFetcher::new(self.hub_fetcher.clone(), &self.config.model_dir)
            .fetch(&file)
            .await?;
        info!(path = %artifact.path.display(), cached = artifact.cached, "Model ready");
        Ok(artifact.path)
    }
}
