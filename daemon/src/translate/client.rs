//! Translation service client
//!
//! Talks to an Ollama-compatible HTTP API: `POST /api/generate` for a
//! single non-streamed completion and `GET /api/tags` for the installed
//! models.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors at the translation request boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("translation service unreachable: {0}")]
    Unreachable(String),

    #[error("translation service returned HTTP {status}")]
    Service { status: u16 },

    #[error("translation service returned an unusable response")]
    InvalidResponse,
}

impl TranslateError {
    /// Short status line shown to the user
    pub fn status_text(&self) -> &'static str {
        match self {
            TranslateError::Unreachable(_) => "Translation service unreachable",
            TranslateError::Service { .. } | TranslateError::InvalidResponse => {
                "Translation failed"
            }
        }
    }
}

/// The external language model service
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Run one prompt and return the model's text
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, TranslateError>;

    /// Installed model identifiers, in the service's order
    async fn list_models(&self) -> Result<Vec<String>, TranslateError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP client for a local Ollama server
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn transport_error(e: reqwest::Error) -> TranslateError {
    if e.is_decode() {
        TranslateError::InvalidResponse
    } else {
        TranslateError::Unreachable(e.to_string())
    }
}

#[async_trait]
impl TranslationService for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, TranslateError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let resp = self
            .http
            .post(self.endpoint("api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(TranslateError::Service {
                status: resp.status().as_u16(),
            });
        }

        let parsed: GenerateResponse = resp.json().await.map_err(transport_error)?;
        let text = parsed
            .response
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(TranslateError::InvalidResponse)?;

        debug!(model, chars = text.chars().count(), "generate completed");
        Ok(text)
    }

    async fn list_models(&self) -> Result<Vec<String>, TranslateError> {
        let resp = self
            .http
            .get(self.endpoint("api/tags"))
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(TranslateError::Service {
                status: resp.status().as_u16(),
            });
        }

        let parsed: TagsResponse = resp.json().await.map_err(transport_error)?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}
