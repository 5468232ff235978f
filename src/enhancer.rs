//! Sentence enhancement: prompt, run the model, clean the answer.
//!
//! [`Enhancer::enhance`] is the whole surface a front end needs. It never
//! fails: every outcome, including a broken runtime, comes back as text
//! suitable for display.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::prompt::PromptBuilder;
use crate::runner::{CommandRunner, ModelRunner, RunnerError};
use crate::sanitize::Sanitizer;

/// Shown when there is nothing to send.
pub const EMPTY_INPUT_MESSAGE: &str = "Please enter some text.";

/// Why a dispatched model call produced no answer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelFailure {
    #[error("Error: the model took too long to respond (over {}s).", .0.as_secs())]
    Timeout(Duration),
    #[error("Error: {0}")]
    ProcessError(String),
    #[error("Error: {0}")]
    UnexpectedError(String),
}

impl From<RunnerError> for ModelFailure {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Timeout(limit) => ModelFailure::Timeout(limit),
            other => ModelFailure::UnexpectedError(other.to_string()),
        }
    }
}

/// Why a sentence could not be enhanced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnhanceError {
    /// Rejected before anything was dispatched.
    #[error("{}", EMPTY_INPUT_MESSAGE)]
    EmptyInput,
    #[error(transparent)]
    Model(#[from] ModelFailure),
}

/// Terminal state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    ProcessError,
    Timeout,
    UnexpectedError,
}

/// One request and what came back.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub input_text: String,
    pub prompt: String,
    /// Captured stdout; empty unless the process exited cleanly.
    pub raw_output: String,
    /// Cleaned answer, or the failure.
    pub outcome: Result<String, ModelFailure>,
}

impl Exchange {
    pub fn status(&self) -> Status {
        match &self.outcome {
            Ok(_) => Status::Success,
            Err(ModelFailure::Timeout(_)) => Status::Timeout,
            Err(ModelFailure::ProcessError(_)) => Status::ProcessError,
            Err(ModelFailure::UnexpectedError(_)) => Status::UnexpectedError,
        }
    }

    /// The sanitized answer on success.
    pub fn cleaned_output(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    /// Text for the output box: the answer or the error message.
    pub fn display(&self) -> String {
        match &self.outcome {
            Ok(text) => text.clone(),
            Err(e) => e.to_string(),
        }
    }
}

/// Turns sentences into improved sentences using a model runner.
pub struct Enhancer {
    runner: Arc<dyn ModelRunner>,
    prompt: PromptBuilder,
    sanitizer: Sanitizer,
}

impl Enhancer {
    /// Create an enhancer around any runner.
    pub fn new(runner: Arc<dyn ModelRunner>, prompt: PromptBuilder, sanitizer: Sanitizer) -> Self {
        Self {
            runner,
            prompt,
            sanitizer,
        }
    }

    /// Create an enhancer that spawns the configured runtime.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(CommandRunner::from_config(&config.runtime)),
            PromptBuilder::new(config.prompt.escape_quotes),
            Sanitizer::new(&config.sanitizer.reasoning_tag),
        )
    }

    /// Describe the runner behind this enhancer.
    pub fn describe(&self) -> String {
        self.runner.describe()
    }

    /// Run one request. Rejects blank input without touching the runner.
    pub async fn request(&self, text: &str) -> Result<Exchange, EnhanceError> {
        let input_text = text.trim();
        if input_text.is_empty() {
            return Err(EnhanceError::EmptyInput);
        }

        let prompt = self.prompt.build(input_text);
        debug!("Prompt: {}", prompt);

        let mut raw_output = String::new();
        let outcome = match self.runner.run(&prompt).await {
            Ok(output) if output.success => {
                let cleaned = self.sanitizer.clean(&output.stdout);
                info!("Model answered ({} chars)", cleaned.len());
                raw_output = output.stdout;
                Ok(cleaned)
            }
            Ok(output) => {
                let stderr = output.stderr.trim();
                warn!("Model exited with {:?}: {}", output.code, stderr);
                let detail = if stderr.is_empty() {
                    match output.code {
                        Some(code) => format!("model exited with status {}", code),
                        None => "model was terminated by a signal".to_string(),
                    }
                } else {
                    stderr.to_string()
                };
                Err(ModelFailure::ProcessError(detail))
            }
            Err(e) => {
                warn!("Model call failed: {}", e);
                Err(e.into())
            }
        };

        let exchange = Exchange {
            input_text: input_text.to_string(),
            prompt,
            raw_output,
            outcome,
        };
        Ok(exchange)
    }

    /// Enhance a sentence and return text for display, whatever happened.
    pub async fn enhance(&self, text: &str) -> String {
        match self.request(text).await {
            Ok(exchange) => exchange.display(),
            Err(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ProcessOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a canned result and records the prompts it saw.
    struct FakeRunner {
        result: fn() -> Result<ProcessOutput, RunnerError>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        fn new(result: fn() -> Result<ProcessOutput, RunnerError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelRunner for FakeRunner {
        async fn run(&self, prompt: &str) -> Result<ProcessOutput, RunnerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.result)()
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    fn enhancer(runner: Arc<FakeRunner>) -> Enhancer {
        Enhancer::new(runner, PromptBuilder::default(), Sanitizer::default())
    }

    #[tokio::test]
    async fn test_success_is_sanitized() {
        let runner = FakeRunner::new(|| {
            Ok(ProcessOutput::ok(
                "<think>\ngrammar check\n</think>\n\nHe and I went to the store.\n",
            ))
        });
        let exchange = enhancer(runner.clone())
            .request("me and him goes to store")
            .await
            .unwrap();

        assert_eq!(exchange.status(), Status::Success);
        assert_eq!(exchange.cleaned_output(), Some("He and I went to the store."));
        assert!(exchange.raw_output.contains("<think>"));
        assert_eq!(exchange.input_text, "me and him goes to store");
        assert_eq!(
            exchange.prompt,
            "Improve the following sentence: 'me and him goes to store'"
        );
        assert_eq!(
            runner.prompts.lock().unwrap().as_slice(),
            ["Improve the following sentence: 'me and him goes to store'"]
        );
    }

    #[tokio::test]
    async fn test_blank_input_never_dispatches() {
        let runner = FakeRunner::new(|| Ok(ProcessOutput::ok("unused")));
        let enhancer = enhancer(runner.clone());

        assert_eq!(enhancer.enhance("").await, EMPTY_INPUT_MESSAGE);
        assert_eq!(enhancer.enhance("  \n\t ").await, EMPTY_INPUT_MESSAGE);
        assert!(matches!(
            enhancer.request("   ").await,
            Err(EnhanceError::EmptyInput)
        ));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_process_error_carries_stderr() {
        let runner = FakeRunner::new(|| Ok(ProcessOutput::failed(1, "model not found\n")));
        let enhancer = enhancer(runner);

        let exchange = enhancer.request("hello").await.unwrap();
        assert_eq!(exchange.status(), Status::ProcessError);
        assert!(exchange.raw_output.is_empty());
        assert_eq!(
            exchange.outcome,
            Err(ModelFailure::ProcessError("model not found".to_string()))
        );

        let message = enhancer.enhance("hello").await;
        assert!(message.contains("model not found"));
    }

    #[tokio::test]
    async fn test_silent_failure_reports_exit_status() {
        let runner = FakeRunner::new(|| Ok(ProcessOutput::failed(7, "  ")));
        let message = enhancer(runner).enhance("hello").await;
        assert_eq!(message, "Error: model exited with status 7");
    }

    #[tokio::test]
    async fn test_timeout_is_distinct_from_process_error() {
        let runner = FakeRunner::new(|| Err(RunnerError::Timeout(Duration::from_secs(30))));
        let enhancer = enhancer(runner);

        let exchange = enhancer.request("hello").await.unwrap();
        assert_eq!(exchange.status(), Status::Timeout);

        let timeout_message = enhancer.enhance("hello").await;
        let process_message = ModelFailure::ProcessError(String::new()).to_string();
        assert!(timeout_message.contains("took too long"));
        assert!(timeout_message.contains("30s"));
        assert_ne!(timeout_message, process_message);
    }

    #[test]
    fn test_model_failure_displays_unwrapped() {
        let err = EnhanceError::from(ModelFailure::ProcessError("model not found".to_string()));
        assert_eq!(err.to_string(), "Error: model not found");
        assert_eq!(EnhanceError::EmptyInput.to_string(), EMPTY_INPUT_MESSAGE);
    }

    #[tokio::test]
    async fn test_launch_failure_is_unexpected() {
        let runner = FakeRunner::new(|| {
            Err(RunnerError::Launch {
                program: "ollama".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            })
        });
        let enhancer = enhancer(runner.clone());

        let exchange = enhancer.request("hello").await.unwrap();
        assert_eq!(exchange.status(), Status::UnexpectedError);
        let message = exchange.display();
        assert!(message.starts_with("Error: "));
        assert!(message.contains("ollama"));
        assert!(message.contains("No such file or directory"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_input_is_trimmed_before_prompting() {
        let runner = FakeRunner::new(|| Ok(ProcessOutput::ok("Fine.")));
        let enhancer = enhancer(runner.clone());

        assert_eq!(enhancer.enhance("  its fine \n").await, "Fine.");
        assert_eq!(
            runner.prompts.lock().unwrap()[0],
            "Improve the following sentence: 'its fine'"
        );
    }

    #[tokio::test]
    async fn test_one_process_per_call() {
        let runner = FakeRunner::new(|| Ok(ProcessOutput::failed(2, "boom")));
        let enhancer = enhancer(runner.clone());

        enhancer.enhance("a").await;
        enhancer.enhance("b").await;
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_subprocess_end_to_end() {
        let runner = CommandRunner::new(
            "sh",
            "-c",
            "printf '<think>%s</think>\\n  Better sentence.\\n' \"$0\"",
            Duration::from_secs(5),
        );
        let enhancer = Enhancer::new(Arc::new(runner), PromptBuilder::default(), Sanitizer::default());
        assert_eq!(enhancer.enhance("bad sentence").await, "Better sentence.");
    }
}
