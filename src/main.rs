//! echopp - a terminal sentence coach.
//!
//! Sends a sentence to a locally installed language model (via the model
//! runtime's command line), strips the model's reasoning trace and shows the
//! improved sentence, either in a small TUI or on stdout for scripting.

mod config;
mod enhancer;
mod models;
mod prompt;
mod runner;
mod sanitize;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::process::Command as ProcessCommand;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use enhancer::{EnhanceError, Enhancer};
use models::ModelStore;

#[derive(Parser)]
#[command(name = "echopp")]
#[command(author, version, about = "A terminal sentence coach backed by a local language model")]
#[command(long_about = "Type a sentence, get a better one.\n\nRuns the configured model runtime (ollama by default) and hides the model's <think> trace.")]
struct Cli {
    /// Sentence to improve (prefills the TUI, or is sent directly with --pipe)
    #[arg(value_name = "TEXT")]
    text: Option<String>,

    /// No TUI: print the result to stdout (reads stdin when TEXT is omitted)
    #[arg(long)]
    pipe: bool,

    /// Override the model from config
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,

    /// Override the model timeout, in seconds
    #[arg(short = 't', long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the prompt that would be sent for TEXT
    Prompt {
        /// Sentence to wrap
        text: String,
    },
    /// Manage Ollama models (list, pull, remove)
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// Check that the runtime is reachable and the model is installed
    Status,
    /// Open configuration file in $EDITOR
    Config,
}

#[derive(Subcommand)]
enum ModelsAction {
    /// List locally available models
    List,
    /// Pull/download a model from the Ollama registry
    Pull {
        /// Model name (e.g., deepseek-r1, llama3.2:3b)
        model: String,
    },
    /// Remove a model from local storage
    Remove {
        /// Model name to remove
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?.with_overrides(cli.model.clone(), cli.timeout);

    match cli.command {
        Some(Commands::Prompt { text }) => {
            println!("{}", prompt_preview(&config, &text)?);
            Ok(())
        }
        Some(Commands::Models { action }) => {
            init_logging(cli.verbose, false)?;
            handle_models(&config, action).await
        }
        Some(Commands::Status) => {
            init_logging(cli.verbose, false)?;
            handle_status(&config).await
        }
        Some(Commands::Config) => handle_config(),
        None => {
            let interactive = !cli.pipe && atty::is(atty::Stream::Stdin);
            init_logging(cli.verbose, interactive)?;
            if interactive {
                handle_tui(config, cli.text).await
            } else {
                handle_pipe(config, cli.text).await
            }
        }
    }
}

/// Initialize logging. While the TUI owns the terminal, logs go to a file.
fn init_logging(verbose: bool, to_file: bool) -> Result<()> {
    // Handled model failures are logged at warn; on stderr they would
    // duplicate the message the user already gets.
    let level = match (verbose, to_file) {
        (true, _) => "echopp=debug",
        (false, true) => "echopp=info",
        (false, false) => "echopp=error",
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(level.parse()?)
        .add_directive("reqwest=warn".parse()?);

    if to_file {
        let path = Config::log_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(atty::is(atty::Stream::Stderr))
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// The prompt that would be sent for `text`.
fn prompt_preview(config: &Config, text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EnhanceError::EmptyInput.into());
    }
    let builder = prompt::PromptBuilder::new(config.prompt.escape_quotes);
    Ok(builder.build(text))
}

/// Run the interactive TUI.
async fn handle_tui(config: Config, initial: Option<String>) -> Result<()> {
    let enhancer = Arc::new(Enhancer::from_config(&config));
    info!("Starting TUI with {}", enhancer.describe());

    let handle = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || tui::run_tui(enhancer, handle, initial))
        .await
        .context("TUI thread panicked")?
}

/// Enhance one sentence without a TUI.
async fn handle_pipe(config: Config, text: Option<String>) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
    };

    let enhancer = Enhancer::from_config(&config);
    debug!("Using {}", enhancer.describe());

    let output = run_pipe(&enhancer, &text).await;
    if let Some(stdout) = output.stdout {
        println!("{}", stdout);
    }
    if let Some(stderr) = output.stderr {
        eprintln!("{}", stderr);
    }
    if output.code != 0 {
        std::process::exit(output.code);
    }
    Ok(())
}

/// What pipe mode writes and how it exits.
#[derive(Debug)]
struct PipeOutput {
    stdout: Option<String>,
    stderr: Option<String>,
    code: i32,
}

/// Enhance `text` and decide what pipe mode prints.
async fn run_pipe(enhancer: &Enhancer, text: &str) -> PipeOutput {
    let failed = |message: String| PipeOutput {
        stdout: None,
        stderr: Some(message),
        code: 1,
    };

    match enhancer.request(text).await {
        Ok(exchange) => {
            debug!(
                "{:?} for {:?} via {:?} ({} bytes of raw output)",
                exchange.status(),
                exchange.input_text,
                exchange.prompt,
                exchange.raw_output.len()
            );
            match exchange.cleaned_output() {
                Some(cleaned) => PipeOutput {
                    stdout: Some(cleaned.to_string()),
                    stderr: None,
                    code: 0,
                },
                None => failed(exchange.display()),
            }
        }
        Err(e) => failed(e.to_string()),
    }
}

/// Handle models subcommand.
async fn handle_models(config: &Config, action: ModelsAction) -> Result<()> {
    let store = ModelStore::new(&config.runtime.host);

    match action {
        ModelsAction::List => {
            let installed = store.list().await?;

            println!("Available Models");
            println!("================\n");

            if installed.is_empty() {
                println!("No models installed.");
                println!("\nPull a model with: echopp models pull <model>");
                println!("Example: echopp models pull {}", config.runtime.model);
            }
            for model in installed {
                let size = model
                    .size
                    .map(models::format_size)
                    .unwrap_or_else(|| "?".to_string());
                let modified = model
                    .modified_at
                    .as_deref()
                    .map(|s| s.split('T').next().unwrap_or(s))
                    .unwrap_or("?");
                println!("  {} ({}) - {}", model.name, size, modified);
            }
            Ok(())
        }
        ModelsAction::Pull { model } => {
            println!("Pulling model: {}", model);
            println!("This may take a while depending on model size...\n");
            store.pull(&model).await?;
            println!("\nModel '{}' pulled successfully!", model);
            Ok(())
        }
        ModelsAction::Remove { model } => {
            store.remove(&model).await?;
            println!("Model '{}' removed successfully.", model);
            Ok(())
        }
    }
}

/// Show runtime status.
async fn handle_status(config: &Config) -> Result<()> {
    let runtime = &config.runtime;
    println!(
        "Runtime: {} {} {}",
        runtime.command, runtime.subcommand, runtime.model
    );
    println!("Timeout: {}s", runtime.timeout_secs);
    println!("Config: {}", Config::config_path()?.display());

    let store = ModelStore::new(&runtime.host);
    match store.has_model(&runtime.model).await {
        Ok(true) => println!("Model: installed"),
        Ok(false) => {
            println!("Model: not installed");
            println!("Pull it with: echopp models pull {}", runtime.model);
        }
        Err(e) => println!("Ollama API ({}): unreachable ({})", runtime.host, e),
    }
    Ok(())
}

/// Handle the config command.
fn handle_config() -> Result<()> {
    let config_path = Config::config_path()?;

    // Create default config if it doesn't exist
    if !config_path.exists() {
        Config::default().save()?;
        println!("Created default config at {}", config_path.display());
    }

    // Open in editor
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = ProcessCommand::new(&editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        eprintln!("Editor exited with non-zero status");
    }

    Ok(())
}
