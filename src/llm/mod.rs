//! Client side of the local model service.
//!
//! [`ModelService`] is the seam the orchestrator talks to. [`OllamaClient`]
//! implements it against the Ollama REST API.

pub mod ollama;
pub mod stream;

pub use ollama::OllamaClient;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use thiserror::Error;

/// Errors from the model service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Ollama service is not running or is unreachable at {0}. Start it with: ollama serve")]
    ServerNotRunning(String),
    #[error("Model '{0}' not found. Pull it with: enhance --download-model {0}")]
    ModelNotFound(String),
    #[error("Ollama request failed with status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Generation failed: {0}")]
    Stream(String),
}

/// Ordered, finite sequence of generated text fragments.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// One progress line reported while pulling a model.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullProgress {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Operations the enhancer needs from a model server.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Where the service lives, for error messages.
    fn host(&self) -> &str;

    /// Names of locally installed models.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;

    /// Whether the service answers at all.
    async fn is_running(&self) -> bool;

    /// Pull a model, reporting progress. Returns `true` once the server
    /// reports success.
    async fn download_model(
        &self,
        name: &str,
        progress: &mut (dyn for<'p> FnMut(&'p PullProgress) + Send),
    ) -> Result<bool, LlmError>;

    /// Load a model into memory and keep it resident.
    async fn preload_model(&self, name: &str) -> Result<(), LlmError>;

    /// Start a generation and return its fragments as they arrive.
    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<FragmentStream, LlmError>;
}
