//! Ollama backend implementation.
//!
//! Ollama is a local LLM server; everything here talks to its REST API on
//! `ollama_host`.

use super::stream::{FragmentDecoder, PullDecoder};
use super::{FragmentStream, LlmError, ModelService, PullProgress};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a preloaded model stays resident.
const PRELOAD_KEEP_ALIVE: &str = "30m";

/// Client for a local Ollama server.
pub struct OllamaClient {
    host: String,
    timeout: Duration,
    client: Client,
}

impl OllamaClient {
    /// Create a new client. `timeout` bounds connection setup, whole
    /// non-streaming requests, and each wait for the next streamed chunk.
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            host: host.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() || e.is_timeout() {
            LlmError::ServerNotRunning(self.host.clone())
        } else {
            LlmError::Http(e)
        }
    }

    async fn check_status(response: Response, model: Option<&str>) -> Result<Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(model) = model {
                return Err(LlmError::ModelNotFound(model.to_string()));
            }
        }
        let body = response.text().await.unwrap_or_default();
        Err(LlmError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

type Body = BoxStream<'static, Result<Vec<u8>, reqwest::Error>>;

fn body_chunks(response: Response) -> Body {
    response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
        .boxed()
}

/// Next body chunk. A server that stays silent for `idle` fails the read.
async fn next_chunk(body: &mut Body, idle: Duration) -> Result<Option<Vec<u8>>, LlmError> {
    match tokio::time::timeout(idle, body.next()).await {
        Ok(Some(chunk)) => Ok(Some(chunk?)),
        Ok(None) => Ok(None),
        Err(_) => Err(LlmError::Stream(format!(
            "no data from Ollama for {:?}",
            idle
        ))),
    }
}

/// State threaded through the generation stream.
struct GenerateState {
    body: Body,
    idle: Duration,
    decoder: FragmentDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

impl GenerateState {
    fn fail(&mut self, error: LlmError) {
        self.pending.push_back(Err(error));
        self.finished = true;
    }
}

fn fragment_stream(response: Response, idle: Duration) -> FragmentStream {
    let state = GenerateState {
        body: body_chunks(response),
        idle,
        decoder: FragmentDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match next_chunk(&mut state.body, state.idle).await {
                Ok(Some(chunk)) => match state.decoder.push(&chunk) {
                    Ok(fragments) => {
                        state.pending.extend(fragments.into_iter().map(Ok));
                        state.finished = state.decoder.is_done();
                    }
                    Err(e) => state.fail(e),
                },
                Err(e) => state.fail(e),
                Ok(None) => {
                    match state.decoder.finish() {
                        Ok(Some(fragment)) => state.pending.push_back(Ok(fragment)),
                        Ok(None) => {}
                        Err(e) => state.pending.push_back(Err(e)),
                    }
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl ModelService for OllamaClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response, None).await?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn is_running(&self) -> bool {
        let result = self
            .client
            .get(self.url("/api/tags"))
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }

    async fn download_model(
        &self,
        name: &str,
        progress: &mut (dyn for<'p> FnMut(&'p PullProgress) + Send),
    ) -> Result<bool, LlmError> {
        info!("Pulling model {}", name);
        let response = self
            .client
            .post(self.url("/api/pull"))
            .json(&PullRequest { name, stream: true })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response, None).await?;

        let mut body = body_chunks(response);
        let mut decoder = PullDecoder::new();
        while let Some(chunk) = next_chunk(&mut body, self.timeout).await? {
            for update in decoder.push(&chunk)? {
                progress(&update);
            }
            if decoder.failure().is_some() {
                break;
            }
        }
        if let Some(update) = decoder.finish()? {
            progress(&update);
        }

        if let Some(error) = decoder.failure() {
            warn!("Pull of {} failed: {}", name, error);
            return Ok(false);
        }
        debug!("Pull of {} ended with status '{}'", name, decoder.last_status());
        Ok(decoder.succeeded())
    }

    async fn preload_model(&self, name: &str) -> Result<(), LlmError> {
        let request = GenerateRequest {
            model: name,
            prompt: "",
            stream: false,
            options: None,
            keep_alive: Some(PRELOAD_KEEP_ALIVE),
        };
        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::check_status(response, Some(name)).await?;
        info!("Model {} loaded (keep_alive {})", name, PRELOAD_KEEP_ALIVE);
        Ok(())
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<FragmentStream, LlmError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: true,
            options: Some(GenerateOptions {
                temperature,
                num_predict: max_tokens,
            }),
            keep_alive: None,
        };
        debug!(
            "Generating with {} (temperature {}, max tokens {})",
            model, temperature, max_tokens
        );
        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response, Some(model)).await?;
        Ok(fragment_stream(response, self.timeout))
    }
}
