//! enhance - turn a short prompt into a detailed one.
//!
//! Wraps the prompt in a style template, streams an enhanced version from a
//! local Ollama model, and copies the result to the clipboard.

mod clipboard;
mod config;
mod diff;
mod enhancer;
mod history;
mod interactive;
mod llm;
mod render;
mod templates;
mod tui;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use config::{Config, Overrides, RECOMMENDED_MODELS};
use enhancer::{resolve_model, EnhancementRequest, Enhancer};
use history::History;
use llm::{LlmError, ModelService, OllamaClient, PullProgress};
use render::StreamPrinter;
use std::path::PathBuf;
use templates::{Style, TemplateSet};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "enhance")]
#[command(author, version, about = "Enhance a simple prompt using a local Ollama model")]
#[command(long_about = "Enhances a simple prompt using Ollama AI models, displays the enhanced \
version, and automatically copies it to the clipboard.")]
struct Cli {
    /// The prompt to enhance
    #[arg(value_name = "PROMPT")]
    prompt: Option<String>,

    /// Ollama model to use (auto-selects if not specified)
    #[arg(short = 'm', long = "model", value_name = "MODEL")]
    model: Option<String>,

    /// Temperature for generation (0.0-2.0)
    #[arg(short = 't', long, value_name = "TEMP", value_parser = parse_temperature)]
    temperature: Option<f32>,

    /// Max tokens for the enhancement
    #[arg(short = 'l', long = "length", value_name = "TOKENS",
          value_parser = clap::value_parser!(u32).range(1..))]
    max_tokens: Option<u32>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Don't copy to clipboard
    #[arg(short = 'n', long)]
    no_copy: bool,

    /// Save enhanced prompt to file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enhancement style
    #[arg(short = 's', long, value_enum)]
    style: Option<Style>,

    /// Show a diff between the original and enhanced prompt
    #[arg(long)]
    diff: bool,

    /// List available Ollama models
    #[arg(long)]
    list_models: bool,

    /// Download a specific model from Ollama
    #[arg(long = "download-model", value_name = "NAME")]
    download_model: Option<String>,

    /// Automatically set up Ollama with a recommended model
    #[arg(long)]
    auto_setup: bool,

    /// Show enhancement history
    #[arg(long = "history")]
    show_history: bool,

    /// Start an interactive enhancement session
    #[arg(long)]
    interactive: bool,

    /// Preload a model to keep it in memory for faster responses
    #[arg(long)]
    preload_model: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            model: self.model.clone(),
            style: self.style,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            no_copy: self.no_copy,
        }
    }
}

fn parse_temperature(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=2.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} is not in the range 0.0-2.0", value))
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{}={},reqwest=warn", env!("CARGO_CRATE_NAME"), level))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    render::init();

    if let Err(e) = run(cli).await {
        render::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let client = OllamaClient::new(config.ollama_host.clone(), config.request_timeout())
        .context("Failed to create HTTP client")?;
    let templates = TemplateSet::with_overrides(&config.templates);
    let history = History::new(config.history_path()?);
    let overrides = cli.overrides();

    if cli.preload_model {
        return handle_preload(&client, &config, &overrides).await;
    }
    if cli.show_history {
        return handle_history(&history);
    }
    if cli.interactive {
        return handle_interactive(&client, &config, &overrides, &templates, &history).await;
    }

    if cli.config.is_none() {
        if let Some(path) = Config::create_default_if_missing()? {
            info!("Created default config at {}", path.display());
        }
    }

    ensure_running(&client).await?;

    if cli.list_models {
        render::models_table(&client.list_models().await?);
        return Ok(());
    }

    if let Some(name) = &cli.download_model {
        render::info(&format!("📥 Starting download for '{}'...", name));
        if !download(&client, name).await? {
            return Err(anyhow!("Failed to download model '{}'", name));
        }
        render::success(&format!("Model '{}' downloaded.", name));
        return Ok(());
    }

    let mut available = client.list_models().await?;
    if cli.auto_setup || available.is_empty() {
        if available.is_empty() {
            render::warning("No models found. Starting auto-setup.");
        } else {
            render::info("Starting auto-setup...");
        }
        auto_setup(&client, &mut available).await?;
        if cli.auto_setup {
            return Ok(());
        }
    }

    let Some(prompt) = cli.prompt.clone() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    handle_enhance(&cli, prompt, &client, &config, &overrides, &templates, &history, &available).await
}

async fn ensure_running<S: ModelService + ?Sized>(service: &S) -> Result<()> {
    if service.is_running().await {
        Ok(())
    } else {
        Err(LlmError::ServerNotRunning(service.host().to_string()).into())
    }
}

/// Pull a model with a progress bar.
async fn download<S: ModelService + ?Sized>(service: &S, name: &str) -> Result<bool> {
    let bar = render::pull_progress_bar();
    let mut on_progress = |update: &PullProgress| {
        bar.set_message(update.status.clone());
        if let Some(total) = update.total {
            bar.set_length(total);
        }
        if let Some(completed) = update.completed {
            bar.set_position(completed);
        }
    };
    let outcome = service.download_model(name, &mut on_progress).await;
    bar.finish_and_clear();
    Ok(outcome?)
}

/// Make sure one recommended model is installed.
async fn auto_setup<S: ModelService + ?Sized>(
    service: &S,
    available: &mut Vec<String>,
) -> Result<()> {
    for model in RECOMMENDED_MODELS {
        if available.iter().any(|m| m == model) {
            render::success(&format!("Recommended model '{}' is already available.", model));
            return Ok(());
        }
        render::info(&format!("📥 Downloading recommended model: {}", model));
        if download(service, model).await? {
            render::success(&format!("Model '{}' is ready.", model));
            available.push(model.to_string());
            return Ok(());
        }
        warn!("Could not download {}, trying the next recommended model", model);
    }
    Err(anyhow!(
        "Auto-setup failed. Could not download any of: {}",
        RECOMMENDED_MODELS.join(", ")
    ))
}

async fn handle_preload<S: ModelService + ?Sized>(
    service: &S,
    config: &Config,
    overrides: &Overrides,
) -> Result<()> {
    let available = service.list_models().await?;
    if available.is_empty() {
        return Err(anyhow!(
            "No models available to preload. Please run `enhance --auto-setup` first."
        ));
    }
    let model = resolve_model(overrides.model.as_deref(), config, &available)?;

    let spinner = render::spinner(&format!("Preloading model '{}'...", model));
    let outcome = service.preload_model(&model).await;
    spinner.finish_and_clear();
    outcome?;
    render::success(&format!("Model '{}' preloaded successfully!", model));
    Ok(())
}

fn handle_history(history: &History) -> Result<()> {
    let entries = history.load()?;
    if entries.is_empty() {
        render::warning("No history found.");
        return Ok(());
    }
    let Some(index) = tui::pick_history(&entries)? else {
        return Ok(());
    };
    let entry = &entries[index];
    render::history_details(entry);

    if tui::confirm("Copy enhanced prompt to clipboard?")? {
        match clipboard::copy_to_clipboard(&entry.result.enhanced_prompt) {
            Ok(()) => render::success("Copied to clipboard."),
            Err(e) => render::warning(&format!("Could not copy to clipboard: {:#}", e)),
        }
    }
    Ok(())
}

async fn handle_interactive<S: ModelService + ?Sized>(
    service: &S,
    config: &Config,
    overrides: &Overrides,
    templates: &TemplateSet,
    history: &History,
) -> Result<()> {
    ensure_running(service).await?;
    let available = service.list_models().await?;
    let model = resolve_model(overrides.model.as_deref(), config, &available)?;

    let settings = interactive::SessionSettings {
        model,
        style: overrides.resolve_style(config),
        temperature: overrides.resolve_temperature(config),
        max_tokens: overrides.resolve_max_tokens(config),
    };
    interactive::run(service, templates, history, settings).await
}

#[allow(clippy::too_many_arguments)]
async fn handle_enhance<S: ModelService + ?Sized>(
    cli: &Cli,
    prompt: String,
    service: &S,
    config: &Config,
    overrides: &Overrides,
    templates: &TemplateSet,
    history: &History,
    available: &[String],
) -> Result<()> {
    let model = resolve_model(overrides.model.as_deref(), config, available)?;
    if overrides.model.is_none() && cli.verbose {
        render::info(&format!("No model specified. Using best available model: {}", model));
    }

    let request = EnhancementRequest {
        original_prompt: prompt,
        style: overrides.resolve_style(config),
        model_name: model,
        temperature: overrides.resolve_temperature(config),
        max_tokens: overrides.resolve_max_tokens(config),
    };
    debug!("Request: {:?}", request);

    let enhancer = Enhancer::new(service, templates);
    if cli.verbose {
        render::panel("🔧 System Prompt", &enhancer.system_prompt(&request));
    }

    let mut printer = StreamPrinter::start("Enhancing your prompt...", "✨ Your Enhanced Prompt ✨");
    let outcome = enhancer.enhance(&request, |f| printer.fragment(f)).await;
    printer.finish();
    let result = outcome.context("Enhancement failed")?;

    if let Err(e) = history.append(&result) {
        warn!("Could not save history to {}: {:#}", history.path().display(), e);
    }
    render::success(&format!(
        "Your prompt has been successfully enhanced! Style: {} | Model: {}",
        result.style, result.model_name
    ));

    if cli.diff {
        render::diff(&diff::unified_diff(
            &result.original_prompt,
            &result.enhanced_prompt,
            "Original",
            "Enhanced",
        ));
    }

    if let Some(path) = &cli.output {
        std::fs::write(path, &result.enhanced_prompt)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        render::success(&format!("Saved to {}", path.display()));
    }

    if overrides.auto_copy(config) {
        match clipboard::copy_to_clipboard(&result.enhanced_prompt) {
            Ok(()) => render::success("Enhanced prompt copied to clipboard."),
            Err(e) => render::warning(&format!("Could not copy to clipboard: {:#}", e)),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "enhance", "write a poem", "-m", "mistral", "-t", "1.2", "-l", "500", "-s", "json", "-n",
            "--diff",
        ])
        .unwrap();
        assert_eq!(cli.prompt.as_deref(), Some("write a poem"));
        let overrides = cli.overrides();
        assert_eq!(overrides.model.as_deref(), Some("mistral"));
        assert_eq!(overrides.temperature, Some(1.2));
        assert_eq!(overrides.max_tokens, Some(500));
        assert_eq!(overrides.style, Some(Style::Json));
        assert!(overrides.no_copy);
        assert!(cli.diff);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(Cli::try_parse_from(["enhance", "x", "-t", "2.5"]).is_err());
        assert!(Cli::try_parse_from(["enhance", "x", "-l", "0"]).is_err());
        assert!(Cli::try_parse_from(["enhance", "x", "-s", "pirate"]).is_err());
    }

    #[tokio::test]
    async fn test_auto_setup_keeps_installed_model() {
        let service = enhancer::tests::FakeService::replying(&[]);
        let mut available = vec!["llama3".to_string()];
        auto_setup(&service, &mut available).await.unwrap();
        assert_eq!(available, vec!["llama3"]);
    }

    #[tokio::test]
    async fn test_auto_setup_downloads_first_recommended() {
        let service = enhancer::tests::FakeService::replying(&[]);
        let mut available = Vec::new();
        auto_setup(&service, &mut available).await.unwrap();
        assert_eq!(available, vec!["llama3.1:8b"]);
    }
}
