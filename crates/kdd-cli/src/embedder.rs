//! HTTP embedding adapter.
//!
//! Talks to an OpenAI-compatible `/embeddings` endpoint. Configuration
//! comes from two optional environment variables; when neither is set the
//! engine runs at L1.

use kdd_domain::{DomainError, EmbeddingModel};
use std::time::Duration;

pub const API_KEY_VAR: &str = "KDD_EMBEDDING_API_KEY";
pub const BASE_URL_VAR: &str = "KDD_EMBEDDING_BASE_URL";

const DEFAULT_MODEL: &str = "nomic-embed-text-v1.5";
const DEFAULT_DIMENSIONS: usize = 768;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpEmbedder {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    /// Build the adapter from the environment; `None` when no endpoint is
    /// configured.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var(API_KEY_VAR).ok().filter(|k| !k.is_empty());
        let base_url = std::env::var(BASE_URL_VAR).ok().filter(|u| !u.is_empty());
        if api_key.is_none() && base_url.is_none() {
            return None;
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .ok()?;

        Some(Self {
            client,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    fn request(&self, text: &str) -> kdd_domain::Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&serde_json::json!({
            "input": text,
            "model": self.model,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    DomainError::EmbeddingTimeout(REQUEST_TIMEOUT.as_millis() as u64)
                } else {
                    DomainError::EmbeddingFailed(e.to_string())
                }
            })?
            .error_for_status()
            .map_err(|e| DomainError::EmbeddingFailed(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .map_err(|e| DomainError::EmbeddingFailed(e.to_string()))?;
        let vector: Vec<f32> = body
            .pointer("/data/0/embedding")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|x| x.as_f64().map(|f| f as f32))
                    .collect()
            })
            .ok_or_else(|| {
                DomainError::EmbeddingFailed("response missing data[0].embedding".to_string())
            })?;
        Ok(vector)
    }
}

impl EmbeddingModel for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> kdd_domain::Result<Vec<f32>> {
        // The blocking client must not run directly on an async worker.
        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::task::block_in_place(|| self.request(text))
        } else {
            self.request(text)
        }
    }
}
