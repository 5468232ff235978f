//! Model management through the Ollama HTTP API.
//!
//! The enhancer itself only ever talks to the runtime executable; this module
//! backs the `models` and `status` subcommands so a missing model can be
//! pulled without leaving echopp.

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::io::Write;
use std::time::Duration;
use tracing::debug;

/// Client for the runtime's model store.
pub struct ModelStore {
    host: String,
    client: Client,
}

/// A locally installed model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// One line of the streamed pull progress.
#[derive(Debug, Deserialize)]
struct PullProgress {
    #[serde(default)]
    status: String,
    completed: Option<u64>,
    total: Option<u64>,
    error: Option<String>,
}

impl ModelStore {
    /// Create a store client for an Ollama host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    /// List locally available models.
    pub async fn list(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("Failed to connect to Ollama. Is it running?")?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama model list")?;
        Ok(tags.models)
    }

    /// Check the runtime is reachable and report whether `model` is installed.
    pub async fn has_model(&self, model: &str) -> Result<bool> {
        let models = self.list().await?;
        Ok(models.iter().any(|m| model_matches(&m.name, model)))
    }

    /// Pull a model, printing progress to stdout.
    pub async fn pull(&self, model: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/pull"))
            .json(&serde_json::json!({ "name": model, "stream": true }))
            .timeout(Duration::from_secs(3600)) // large models take a while
            .send()
            .await
            .context("Failed to connect to Ollama. Is it running?")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to pull model: {} - {}", status, body));
        }

        let mut stream = response.bytes_stream();
        let mut pending = String::new();
        let mut last_status = String::new();

        while let Some(chunk) = stream.next().await {
            pending.push_str(&String::from_utf8_lossy(&chunk?));
            // Progress objects are newline-delimited and may straddle chunks.
            while let Some(newline) = pending.find('\n') {
                let line: String = pending.drain(..=newline).collect();
                let Some(progress) = parse_progress(&line) else {
                    continue;
                };
                if let Some(error) = progress.error {
                    println!();
                    return Err(anyhow!("Failed to pull model: {}", error));
                }
                match (progress.completed, progress.total) {
                    (Some(completed), Some(total)) if total > 0 => {
                        print!(
                            "\r{}: {}% ({}/{})",
                            progress.status,
                            completed * 100 / total,
                            format_size(completed),
                            format_size(total)
                        );
                        std::io::stdout().flush()?;
                    }
                    _ if progress.status != last_status => println!("{}", progress.status),
                    _ => {}
                }
                last_status = progress.status;
            }
        }

        println!();
        Ok(())
    }

    /// Remove a model from local storage.
    pub async fn remove(&self, model: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url("/api/delete"))
            .json(&serde_json::json!({ "name": model }))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .context("Failed to connect to Ollama. Is it running?")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to remove model: {} - {}", status, body));
        }

        debug!("Removed {}", model);
        Ok(())
    }
}

fn parse_progress(line: &str) -> Option<PullProgress> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}

/// `deepseek-r1` is installed as `deepseek-r1:latest`.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted || (!wanted.contains(':') && installed == format!("{}:latest", wanted))
}

/// Format bytes to human-readable size.
pub fn format_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;

    if bytes >= GB {
        format!("{:.1}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.0}MB", bytes as f64 / MB as f64)
    } else {
        format!("{}B", bytes)
    }
}
