//! llm-bench CLI: benchmark GGUF models with localscore.
//!
//! Downloads the localscore binary and Hugging Face models on request, then
//! runs the benchmark with the console attached to its output.

use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use llm_bench_core::config::{absolutize, expand_tilde, load_config};
use llm_bench_core::{BenchConfig, BenchError, Orchestrator, RunOutcome, RunRequest};

const AFTER_HELP: &str = "After downloading, copy or symlink llm-bench to a location in your PATH \
(e.g., ~/.local/bin/llm-bench) for easier access.";

/// Benchmark GGUF models with localscore
#[derive(Parser, Debug)]
#[command(name = "llm-bench", version, about, long_about = None, after_help = AFTER_HELP)]
struct Cli {
    /// Path to the GGUF model file, or the repository id with --download-model
    model: Option<String>,

    /// Download the localscore binary
    #[arg(long)]
    download_localscore: bool,

    /// Download a model from Hugging Face (repository defaults to HF_REPO_ID)
    #[arg(long)]
    download_model: bool,

    /// Download localscore even if it is already available
    #[arg(short, long)]
    force: bool,

    /// Exact file to download from the repository, skipping selection
    #[arg(long, value_name = "FILENAME")]
    file: Option<String>,

    /// Preferred quantization marker in the model filename
    #[arg(long, value_name = "MARKER")]
    quant: Option<String>,

    /// Directory for downloaded models (overrides MODEL_DIR)
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Arguments forwarded to localscore
    #[arg(last = true, value_name = "ARGS")]
    passthrough: Vec<String>,
}

impl Cli {
    fn request(&self) -> RunRequest {
        RunRequest {
            model: self.model.clone(),
            download_localscore: self.download_localscore,
            download_model: self.download_model,
            force: self.force,
            filename: self.file.clone(),
            passthrough: self.passthrough.clone(),
        }
    }

    /// Apply command-line flags on top of the loaded configuration.
    fn apply_overrides(&self, config: &mut BenchConfig, workspace: &Path) {
        if let Some(quant) = &self.quant {
            config.quant_marker = quant.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = absolutize(&expand_tilde(dir), workspace);
        }
    }

    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(cli.log_filter()));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "llm-bench", "llm-bench")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "llm-bench.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = std::env::current_dir()?;
    debug!(workspace = %workspace.display(), "Starting llm-bench");

    let result = tokio::select! {
        result = execute(&cli, &workspace) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nBye!");
            return Ok(ExitCode::SUCCESS);
        }
    };

    match result {
        Ok(RunOutcome::Completed { .. }) => Ok(ExitCode::SUCCESS),
        Ok(RunOutcome::NothingToRun) => {
            Cli::command().print_help()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            Ok(ExitCode::from(exit_status(&e)))
        }
    }
}

/// Load configuration, apply flags and run once.
async fn execute(cli: &Cli, workspace: &Path) -> Result<RunOutcome, BenchError> {
    let mut config = load_config(workspace)?;
    cli.apply_overrides(&mut config, workspace);
    debug!(
        version = %config.localscore_version,
        repo_id = %config.hf_repo_id,
        model_dir = %config.model_dir.display(),
        "Loaded configuration"
    );

    let mut orchestrator = Orchestrator::new(config, workspace)?;
    orchestrator.run(cli.request()).await
}

/// Process exit status for `err`, clamped to the portable range.
fn exit_status(err: &BenchError) -> u8 {
    u8::try_from(err.exit_code()).unwrap_or(1)
}
