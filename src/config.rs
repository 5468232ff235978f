//! Configuration management for echopp.
//!
//! Configuration is loaded from `~/.config/echopp/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// External model runtime settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Prompt construction settings.
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Output sanitizer settings.
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
}

/// How the model runtime executable is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Executable name or path (default: ollama).
    #[serde(default = "default_command")]
    pub command: String,
    /// Runtime selector passed before the model (default: run).
    #[serde(default = "default_subcommand")]
    pub subcommand: String,
    /// Model identifier (default: deepseek-r1).
    #[serde(default = "default_model")]
    pub model: String,
    /// Upper bound on a single model call, in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ollama HTTP API, used by `models` and `status` (default: http://localhost:11434).
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            subcommand: default_subcommand(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            host: default_host(),
        }
    }
}

impl RuntimeConfig {
    /// The wait bound as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_command() -> String {
    "ollama".to_string()
}

fn default_subcommand() -> String {
    "run".to_string()
}

fn default_model() -> String {
    "deepseek-r1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_host() -> String {
    "http://localhost:11434".to_string()
}

/// Prompt construction preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Escape single quotes in the user's text as `\'`.
    #[serde(default)]
    pub escape_quotes: bool,
}

/// Output sanitizer preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// Tag name of the reasoning block to strip (default: think).
    #[serde(default = "default_reasoning_tag")]
    pub reasoning_tag: String,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            reasoning_tag: default_reasoning_tag(),
        }
    }
}

fn default_reasoning_tag() -> String {
    "think".to_string()
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("echopp"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the log file used while the TUI owns the terminal.
    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("echopp.log"))
    }

    /// Load configuration from file, using defaults if not found.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        anyhow::ensure!(
            config.runtime.timeout_secs > 0,
            "runtime.timeout_secs must be at least 1"
        );
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply command-line overrides on top of the file settings.
    pub fn with_overrides(mut self, model: Option<String>, timeout_secs: Option<u64>) -> Self {
        if let Some(model) = model {
            self.runtime.model = model;
        }
        if let Some(secs) = timeout_secs {
            self.runtime.timeout_secs = secs;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.runtime.command, "ollama");
        assert_eq!(config.runtime.subcommand, "run");
        assert_eq!(config.runtime.model, "deepseek-r1");
        assert_eq!(config.runtime.timeout(), Duration::from_secs(30));
        assert!(!config.prompt.escape_quotes);
        assert_eq!(config.sanitizer.reasoning_tag, "think");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("deepseek-r1"));
        assert!(toml.contains("[sanitizer]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
[runtime]
model = "llama3.2:3b"
timeout_secs = 90

[prompt]
escape_quotes = true
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.runtime.model, "llama3.2:3b");
        assert_eq!(config.runtime.timeout_secs, 90);
        assert_eq!(config.runtime.command, "ollama");
        assert!(config.prompt.escape_quotes);
        assert_eq!(config.sanitizer.reasoning_tag, "think");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.runtime.host, "http://localhost:11434");
    }

    #[test]
    fn test_overrides() {
        let config = Config::default().with_overrides(Some("qwen2.5:7b".to_string()), Some(5));
        assert_eq!(config.runtime.model, "qwen2.5:7b");
        assert_eq!(config.runtime.timeout_secs, 5);

        let untouched = Config::default().with_overrides(None, None);
        assert_eq!(untouched.runtime.model, "deepseek-r1");
    }

    #[test]
    fn test_zero_timeout_is_an_error() {
        assert!(Config::parse("[runtime]\ntimeout_secs = 0\n").is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("[runtime\nmodel = ").is_err());
    }
}
