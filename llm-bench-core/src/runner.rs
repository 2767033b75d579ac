//! Benchmark invocation with streamed output.
//!
//! The localscore process is spawned through the [`ProcessRunner`] trait.
//! `SystemProcessRunner` pipes the child's stdout and stderr and copies both
//! to the console as bytes arrive; `MockProcessRunner` records invocations
//! and returns a fixed exit code.

use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::BenchError;

/// One run of the benchmark binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkInvocation {
    pub binary: PathBuf,
    pub model: PathBuf,
    /// Forwarded verbatim after the model flag.
    pub passthrough: Vec<String>,
}

impl BenchmarkInvocation {
    pub fn new(binary: impl Into<PathBuf>, model: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
            passthrough: Vec::new(),
        }
    }

    pub fn with_passthrough(mut self, args: Vec<String>) -> Self {
        self.passthrough = args;
        self
    }

    /// Arguments passed to the binary.
    pub fn args(&self) -> Vec<OsString> {
        let mut args = vec![OsString::from("-m"), self.model.clone().into_os_string()];
        args.extend(self.passthrough.iter().map(OsString::from));
        args
    }
}

impl fmt::Display for BenchmarkInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary.display())?;
        for arg in self.args() {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Result of a finished process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, or -1 when terminated by a signal.
    pub code: i32,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Trait for spawning processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` to completion.
    async fn run(&self, program: &Path, args: &[OsString]) -> Result<ProcessOutcome, BenchError>;
}

/// Runs real processes, forwarding their output to this process's console.
#[derive(Debug, Default, Clone)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, program: &Path, args: &[OsString]) -> Result<ProcessOutcome, BenchError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(forward(pipe, tokio::io::stdout())));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(forward(pipe, tokio::io::stderr())));

        let status = child.wait().await?;

        for task in [stdout_task, stderr_task].into_iter().flatten() {
            match task.await {
                Ok(Ok(bytes)) => debug!(bytes, "Forwarded child output"),
                Ok(Err(e)) => warn!(error = %e, "Failed to forward child output"),
                Err(e) => warn!(error = %e, "Output forwarding task panicked"),
            }
        }

        Ok(ProcessOutcome {
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Copy a child pipe to a console stream until EOF.
async fn forward<R, W>(mut from: R, mut to: W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = tokio::io::copy(&mut from, &mut to).await?;
    to.flush().await?;
    Ok(copied)
}

/// A mock process runner for testing.
pub struct MockProcessRunner {
    code: i32,
    invocations: Mutex<Vec<(PathBuf, Vec<OsString>)>>,
}

impl MockProcessRunner {
    /// A runner whose processes exit with `code`.
    pub fn with_exit_code(code: i32) -> Self {
        Self {
            code,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Program and arguments of every run so far.
    pub fn invocations(&self) -> Vec<(PathBuf, Vec<OsString>)> {
        self.invocations.lock().unwrap().clone()
    }
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::with_exit_code(0)
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, program: &Path, args: &[OsString]) -> Result<ProcessOutcome, BenchError> {
        self.invocations
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        Ok(ProcessOutcome { code: self.code })
    }
}

/// Runs an invocation and turns a non-zero exit into an error.
pub struct BenchmarkRunner<'a> {
    process: &'a dyn ProcessRunner,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(process: &'a dyn ProcessRunner) -> Self {
        Self { process }
    }

    pub async fn run(&self, invocation: &BenchmarkInvocation) -> Result<ProcessOutcome, BenchError> {
        info!("Running: {invocation}");
        let outcome = self
            .process
            .run(&invocation.binary, &invocation.args())
            .await?;

        if outcome.success() {
            Ok(outcome)
        } else {
            Err(BenchError::BenchmarkFailed { code: outcome.code })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invocation_args() {
        let inv = BenchmarkInvocation::new("/bin/localscore", "/models/m.gguf")
            .with_passthrough(vec!["--cpu".into(), "-y".into()]);
        let args: Vec<String> = inv
            .args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-m", "/models/m.gguf", "--cpu", "-y"]);
        assert_eq!(
            inv.to_string(),
            "/bin/localscore -m /models/m.gguf --cpu -y"
        );
    }

    #[tokio::test]
    async fn test_runner_success_with_mock() {
        let mock = MockProcessRunner::default();
        let runner = BenchmarkRunner::new(&mock);
        let inv = BenchmarkInvocation::new("localscore", "m.gguf");

        let outcome = runner.run(&inv).await.unwrap();
        assert_eq!(outcome.code, 0);
        assert_eq!(mock.invocations().len(), 1);
        assert_eq!(mock.invocations()[0].0, PathBuf::from("localscore"));
    }

    #[tokio::test]
    async fn test_runner_failure_carries_status() {
        let mock = MockProcessRunner::with_exit_code(42);
        let runner = BenchmarkRunner::new(&mock);
        let err = runner
            .run(&BenchmarkInvocation::new("localscore", "m.gguf"))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::BenchmarkFailed { code: 42 }));
        assert_eq!(err.exit_code(), 42);
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-localscore");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_reports_zero() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo benchmarking \"$2\"\nexit 0");
        let outcome = SystemProcessRunner::new()
            .run(&program, &["-m".into(), "m.gguf".into()])
            .await
            .unwrap();
        assert_eq!(outcome.code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_reports_nonzero() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo failing >&2\nexit 7");
        let outcome = SystemProcessRunner::new().run(&program, &[]).await.unwrap();
        assert_eq!(outcome.code, 7);

        let err = BenchmarkRunner::new(&SystemProcessRunner::new())
            .run(&BenchmarkInvocation::new(&program, "m.gguf"))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::BenchmarkFailed { code: 7 }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_passes_arguments_through() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("args.txt");
        let program = script(
            dir.path(),
            &format!("printf '%s\\n' \"$@\" > '{}'", out.display()),
        );
        let inv = BenchmarkInvocation::new(&program, "/models/m.gguf")
            .with_passthrough(vec!["--gpu".into(), "two words".into()]);

        BenchmarkRunner::new(&SystemProcessRunner::new())
            .run(&inv)
            .await
            .unwrap();
        let recorded = std::fs::read_to_string(out).unwrap();
        assert_eq!(recorded, "-m\n/models/m.gguf\n--gpu\ntwo words\n");
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let err = SystemProcessRunner::new()
            .run(Path::new("/definitely/not/here/localscore"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::Io(_)));
    }
}
