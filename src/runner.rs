//! External model runtime invocation.
//!
//! The model runs as a child process (`ollama run <model> <prompt>` by
//! default). [`ModelRunner`] is the seam the enhancer talks to, so tests can
//! swap in a fake instead of spawning a real executable.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::RuntimeConfig;

/// What the child process produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, absent if the process was terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
impl ProcessOutput {
    /// A zero-exit result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Failures to get any output from the runtime at all.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("model did not respond within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("failed to run `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Something that can answer a prompt.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    /// Run the model once on `prompt`.
    async fn run(&self, prompt: &str) -> Result<ProcessOutput, RunnerError>;

    /// Human-readable description for logs and the status line.
    fn describe(&self) -> String;
}

/// Runs the model as `<command> <subcommand> <model> <prompt>`.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    pub command: String,
    pub subcommand: String,
    pub model: String,
    timeout: Duration,
}

impl CommandRunner {
    /// Create a runner.
    pub fn new(
        command: impl Into<String>,
        subcommand: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            subcommand: subcommand.into(),
            model: model.into(),
            timeout,
        }
    }

    /// Create a runner from configuration.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            config.command.clone(),
            config.subcommand.clone(),
            config.model.clone(),
            config.timeout(),
        )
    }
}

#[async_trait]
impl ModelRunner for CommandRunner {
    async fn run(&self, prompt: &str) -> Result<ProcessOutput, RunnerError> {
        debug!("Spawning {} {} {}", self.command, self.subcommand, self.model);

        let child = Command::new(&self.command)
            .arg(&self.subcommand)
            .arg(&self.model)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait below on timeout kills the child.
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Launch {
                program: self.command.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| RunnerError::Launch {
                program: self.command.clone(),
                source,
            })?,
            Err(_) => {
                warn!(
                    "{} did not finish within {}s, killed",
                    self.command,
                    self.timeout.as_secs()
                );
                return Err(RunnerError::Timeout(self.timeout));
            }
        };

        debug!("{} exited with {:?}", self.command, output.status.code());

        Ok(ProcessOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn describe(&self) -> String {
        format!("{} {} {}", self.command, self.subcommand, self.model)
    }
}
