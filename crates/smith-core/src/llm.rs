//! Generation backends
//!
//! The relay only needs "text in, text out". [`OllamaClient`] talks to a local
//! Ollama server through `/api/generate`; [`GenaiClient`] reaches hosted
//! providers through the `genai` crate.

use anyhow::{Error, anyhow};
use async_trait::async_trait;
use genai::Client as GenaiInner;
use genai::chat::{ChatMessage as GenaiChatMessage, ChatRequest, MessageContent};
use serde::{Deserialize, Serialize};
use smith_common::{BackendConfig, BackendKind, SmithError};
use std::sync::Arc;
use tracing::{debug, info};

/// A service that turns one prompt into one generated text
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Model identifier sent with each request
    fn model(&self) -> &str;

    /// Generate a complete (non-streaming) response
    async fn generate(&self, prompt: &str) -> Result<String, Error>;
}

/// Build the client selected by the configuration
pub fn client_from_config(
    config: &BackendConfig,
) -> smith_common::Result<Arc<dyn GenerationClient>> {
    if config.model.trim().is_empty() {
        return Err(SmithError::Backend("No model configured".to_string()));
    }
    let client: Arc<dyn GenerationClient> = match config.kind {
        BackendKind::Ollama => Arc::new(
            OllamaClient::new(config.generate_url(), &config.model)
                .map_err(|e| SmithError::Backend(e.to_string()))?,
        ),
        BackendKind::Genai => Arc::new(GenaiClient::new(&config.model)),
    };
    info!("Using {} backend with model: {}", config.kind, config.model);
    Ok(client)
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for Ollama's generate API
pub struct OllamaClient {
    http: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            http,
            url: url.into(),
            model: model.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        debug!("Sending prompt to Ollama (length: {} chars)", prompt.len());

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Request to {} failed: {}", self.url, e))?
            .error_for_status()
            .map_err(|e| anyhow!("Ollama returned an error: {}", e))?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid Ollama response: {}", e))?;

        debug!(
            "Received response from Ollama (length: {} chars)",
            body.response.len()
        );
        Ok(body.response)
    }
}

/// Client for any provider supported by genai, addressed by model name
pub struct GenaiClient {
    client: GenaiInner,
    model: String,
}

impl GenaiClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: GenaiInner::builder().build(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl GenerationClient for GenaiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        debug!("Sending prompt to {} (length: {} chars)", self.model, prompt.len());

        let chat_req = ChatRequest::new(vec![GenaiChatMessage::user(prompt.to_string())]);
        let response = self
            .client
            .exec_chat(&self.model, chat_req, None)
            .await
            .map_err(|e| anyhow!("GenAI API error: {}", e))?;

        match response.content.first() {
            Some(MessageContent::Text(text)) => {
                debug!("Received response from {} (length: {} chars)", self.model, text.len());
                Ok(text.clone())
            }
            Some(_) => Err(anyhow!("GenAI response did not contain text")),
            None => Err(anyhow!("No content in chat response")),
        }
    }
}
