//! Configuration management for enhance-this.
//!
//! Configuration is loaded from `~/.config/enhance-this/config.toml` unless
//! `--config` points elsewhere. Missing keys take their defaults.

use crate::templates::Style;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Models tried in order when none is requested.
pub const RECOMMENDED_MODELS: [&str; 3] = ["llama3.1:8b", "llama3", "mistral"];

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ollama host URL.
    pub ollama_host: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    pub default_temperature: f32,
    pub max_tokens: u32,
    /// Copy the enhanced prompt to the clipboard after each run.
    pub auto_copy: bool,
    /// Style used when `--style` is not given.
    pub default_style: String,
    /// Model used when `--model` is not given, if installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Fallback order when neither `--model` nor `default_model` applies.
    pub preferred_models: Vec<String>,
    /// Override for the history file location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,
    /// Per-style template overrides.
    pub templates: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_host: "http://localhost:11434".to_string(),
            timeout: 120,
            default_temperature: 0.7,
            max_tokens: 2000,
            auto_copy: true,
            default_style: Style::default().to_string(),
            default_model: None,
            preferred_models: RECOMMENDED_MODELS.iter().map(|m| m.to_string()).collect(),
            history_file: None,
            templates: HashMap::new(),
        }
    }
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("enhance-this"))
            .context("Could not determine config directory")
    }

    /// Get the default config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the data directory, home of the history file.
    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|p| p.join("enhance-this"))
            .context("Could not determine data directory")
    }

    /// History file location, honoring `history_file`.
    pub fn history_path(&self) -> Result<PathBuf> {
        match &self.history_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("history.jsonl")),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Load configuration from `path` (or the default location), using
    /// defaults if the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            bail!(
                "default_temperature must be between 0.0 and 2.0, got {}",
                self.default_temperature
            );
        }
        if self.max_tokens == 0 {
            bail!("max_tokens must be at least 1");
        }
        if self.timeout == 0 {
            bail!("timeout must be at least 1 second");
        }
        Ok(())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Write the default config to the default location if nothing is there.
    /// Returns the path when a file was created.
    pub fn create_default_if_missing() -> Result<Option<PathBuf>> {
        let path = Self::config_path()?;
        if path.exists() {
            return Ok(None);
        }
        Self::default().save_to(&path)?;
        Ok(Some(path))
    }
}

/// Settings given on the command line, layered over the config.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub style: Option<Style>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub no_copy: bool,
}

impl Overrides {
    /// Flag, then `default_style`, then the built-in default.
    pub fn resolve_style(&self, config: &Config) -> Style {
        if let Some(style) = self.style {
            return style;
        }
        Style::parse_or_default(&config.default_style)
    }

    pub fn resolve_temperature(&self, config: &Config) -> f32 {
        self.temperature.unwrap_or(config.default_temperature)
    }

    pub fn resolve_max_tokens(&self, config: &Config) -> u32 {
        self.max_tokens.unwrap_or(config.max_tokens)
    }

    pub fn auto_copy(&self, config: &Config) -> bool {
        !self.no_copy && config.auto_copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ollama_host, "http://localhost:11434");
        assert_eq!(config.default_style, "detailed");
        assert_eq!(config.preferred_models, vec!["llama3.1:8b", "llama3", "mistral"]);
        assert!(config.auto_copy);
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.templates.insert("json".to_string(), "JSON please: {user_prompt}".to_string());
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
default_style = "concise"
max_tokens = 500

[templates]
concise = "Be brief: {user_prompt}"
"#,
        )
        .unwrap();
        assert_eq!(config.default_style, "concise");
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.default_temperature, 0.7);
        assert_eq!(config.templates["concise"], "Be brief: {user_prompt}");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_toml("default_temperature = 3.5").is_err());
        assert!(Config::from_toml("max_tokens = 0").is_err());
    }

    #[test]
    fn test_load_from_path_and_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert_eq!(Config::load(Some(&path)).unwrap(), Config::default());

        let mut config = Config::default();
        config.default_model = Some("mistral".to_string());
        config.save_to(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().default_model.as_deref(), Some("mistral"));
    }

    #[test]
    fn test_history_path_override() {
        let mut config = Config::default();
        config.history_file = Some(PathBuf::from("/tmp/h.jsonl"));
        assert_eq!(config.history_path().unwrap(), PathBuf::from("/tmp/h.jsonl"));
    }

    #[test]
    fn test_style_precedence() {
        let mut config = Config::default();
        let none = Overrides::default();
        assert_eq!(none.resolve_style(&config), Style::Detailed);

        config.default_style = "formal".to_string();
        assert_eq!(none.resolve_style(&config), Style::Formal);

        let flag = Overrides {
            style: Some(Style::Json),
            ..Default::default()
        };
        assert_eq!(flag.resolve_style(&config), Style::Json);

        config.default_style = "loud".to_string();
        assert_eq!(none.resolve_style(&config), Style::Detailed);
    }

    #[test]
    fn test_temperature_and_tokens_precedence() {
        let mut config = Config::default();
        let none = Overrides::default();
        assert_eq!(none.resolve_temperature(&config), 0.7);
        assert_eq!(none.resolve_max_tokens(&config), 2000);

        config.default_temperature = 0.2;
        config.max_tokens = 300;
        assert_eq!(none.resolve_temperature(&config), 0.2);
        assert_eq!(none.resolve_max_tokens(&config), 300);

        let flags = Overrides {
            temperature: Some(1.5),
            max_tokens: Some(42),
            ..Default::default()
        };
        assert_eq!(flags.resolve_temperature(&config), 1.5);
        assert_eq!(flags.resolve_max_tokens(&config), 42);
    }

    #[test]
    fn test_auto_copy() {
        let mut config = Config::default();
        assert!(Overrides::default().auto_copy(&config));
        let no_copy = Overrides {
            no_copy: true,
            ..Default::default()
        };
        assert!(!no_copy.auto_copy(&config));
        config.auto_copy = false;
        assert!(!Overrides::default().auto_copy(&config));
    }
}
