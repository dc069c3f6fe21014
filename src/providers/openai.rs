//! OpenAI-backed embedding and completion provider.
//!
//! One client serves both contracts: `POST /embeddings` for
//! [`EmbeddingProvider`] and `POST /chat/completions` for
//! [`GenerativeProvider`]. Requests carry a bounded timeout; a missing API
//! key surfaces as [`ProviderError::NotConfigured`] so a keyless deployment
//! degrades to static answers instead of erroring per request.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{EmbeddingProvider, GenerativeProvider, ProviderError};

/// Default public API base.
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Configuration for the OpenAI client.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key; empty means "not configured".
    pub api_key: String,
    /// API base URL, overridable for proxies and test servers.
    pub api_base: String,
    /// Chat model for generative summarization.
    pub chat_model: String,
    /// Embedding model; its dimensionality must match the knowledge base.
    pub embedding_model: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl OpenAiConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Reads `OPENAI_API_KEY`, `OPENAI_API_BASE`, `OPENAI_CHAT_MODEL`,
    /// `OPENAI_EMBEDDING_MODEL` and `OPENAI_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            api_base: std::env::var("OPENAI_API_BASE").unwrap_or(defaults.api_base),
            chat_model: std::env::var("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: std::env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            request_timeout: std::env::var("OPENAI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

/// Reqwest-based OpenAI client implementing both provider contracts.
pub struct OpenAiClient {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    /// Build a client with a bounded-timeout HTTP connection pool.
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("OPENAI_API_KEY is not set".into()));
        }
        Ok(&self.config.api_key)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let key = self.require_key()?;
        let resp = self
            .http
            .post(format!("{}{}", self.config.api_base, path))
            .bearer_auth(key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("{path}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!("{path} returned {status}: {text}")));
        }

        resp.json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("{path}: {e}")))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = serde_json::json!({
            "model": self.config.embedding_model,
            "input": text.trim(),
        });
        let json = self.post_json("/embeddings", &body).await?;

        json["data"][0]["embedding"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .map(|v| v as f32)
                    .collect::<Vec<f32>>()
            })
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::Malformed("embeddings response had no vector".into()))
    }
}

#[async_trait]
impl GenerativeProvider for OpenAiClient {
    async fn complete(
        &self,
        system_persona: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": self.config.chat_model,
            "messages": [
                { "role": "system", "content": system_persona },
                { "role": "user", "content": prompt },
            ],
            "temperature": temperature,
        });
        let json = self.post_json("/chat/completions", &body).await?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::Malformed("completion response had no content".into()))
    }
}
