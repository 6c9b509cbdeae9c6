//! Enhancement orchestration.
//!
//! Picks the model, builds the system prompt from the style template, streams
//! the generation and gathers the fragments into an [`EnhancementResult`].

use crate::config::Config;
use crate::llm::{LlmError, ModelService};
use crate::templates::{Style, TemplateSet};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error("Model '{requested}' not found. Available models: {}", .available.join(", "))]
    ModelNotFound {
        requested: String,
        available: Vec<String>,
    },
    #[error(
        "No models available. Download one with `enhance --download-model llama3.1:8b` \
         or run `enhance --auto-setup`"
    )]
    NoModels,
    #[error("The model returned an empty response")]
    EmptyResponse,
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Everything needed for one enhancement.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementRequest {
    pub original_prompt: String,
    pub style: Style,
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Outcome of a successful enhancement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementResult {
    pub original_prompt: String,
    pub enhanced_prompt: String,
    pub style: Style,
    #[serde(rename = "model")]
    pub model_name: String,
}

/// Choose the model for a run.
///
/// An explicit request must be installed. Otherwise `default_model` wins if
/// installed, then the first installed entry of `preferred_models`, then
/// whatever is installed first. A name without a tag also matches its
/// `:latest` install, and the installed name is returned.
pub fn resolve_model(
    requested: Option<&str>,
    config: &Config,
    available: &[String],
) -> Result<String, EnhanceError> {
    let installed = |name: &str| {
        available
            .iter()
            .find(|m| m.as_str() == name)
            .or_else(|| {
                available
                    .iter()
                    .find(|m| m.strip_suffix(":latest") == Some(name))
            })
            .cloned()
    };

    if let Some(name) = requested {
        if let Some(model) = installed(name) {
            return Ok(model);
        }
        return Err(EnhanceError::ModelNotFound {
            requested: name.to_string(),
            available: available.to_vec(),
        });
    }

    if let Some(name) = config.default_model.as_deref() {
        if let Some(model) = installed(name) {
            return Ok(model);
        }
        debug!("default_model '{}' is not installed", name);
    }

    config
        .preferred_models
        .iter()
        .find_map(|m| installed(m.as_str()))
        .or_else(|| available.first().cloned())
        .ok_or(EnhanceError::NoModels)
}

/// Runs enhancements against a model service.
pub struct Enhancer<'a, S: ModelService + ?Sized> {
    service: &'a S,
    templates: &'a TemplateSet,
}

impl<'a, S: ModelService + ?Sized> Enhancer<'a, S> {
    pub fn new(service: &'a S, templates: &'a TemplateSet) -> Self {
        Self { service, templates }
    }

    pub fn system_prompt(&self, request: &EnhancementRequest) -> String {
        self.templates
            .build_system_prompt(&request.original_prompt, request.style)
    }

    /// Stream an enhancement, handing each fragment to `on_fragment` as it
    /// arrives. A failure mid-stream discards everything received so far.
    pub async fn enhance<F>(
        &self,
        request: &EnhancementRequest,
        mut on_fragment: F,
    ) -> Result<EnhancementResult, EnhanceError>
    where
        F: FnMut(&str),
    {
        let system_prompt = self.system_prompt(request);
        let mut stream = self
            .service
            .generate_stream(
                &request.model_name,
                &system_prompt,
                request.temperature,
                request.max_tokens,
            )
            .await?;

        let mut enhanced = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            on_fragment(&fragment);
            enhanced.push_str(&fragment);
        }

        if enhanced.trim().is_empty() {
            return Err(EnhanceError::EmptyResponse);
        }
        info!(
            "Enhanced {} chars into {} chars with {} ({})",
            request.original_prompt.len(),
            enhanced.len(),
            request.model_name,
            request.style
        );

        Ok(EnhancementResult {
            original_prompt: request.original_prompt.clone(),
            enhanced_prompt: enhanced,
            style: request.style,
            model_name: request.model_name.clone(),
        })
    }
}
