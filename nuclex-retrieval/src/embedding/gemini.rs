//! Gemini embeddings over HTTP
//!
//! Calls the `batchEmbedContents` endpoint of the Generative Language API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::provider::EmbeddingProvider;
use crate::config::DEFAULT_DIMENSION;
use crate::error::{Result, RetrievalError};

/// Default embedding model
pub const DEFAULT_GEMINI_MODEL: &str = "models/text-embedding-004";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Fully qualified model name (default: models/text-embedding-004)
    pub model: String,
    pub base_url: String,
    /// Embedding size the model produces (default: 768)
    pub dimension: usize,
    pub timeout: Duration,
    /// Attempts per request, including the first (default: 3)
    pub max_retries: usize,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            dimension: DEFAULT_DIMENSION,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    /// Read `GEMINI_API_KEY` and the optional `GEMINI_EMBEDDING_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| RetrievalError::config("GEMINI_API_KEY is not set"))?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_EMBEDDING_MODEL") {
            config.model = qualify_model(&model);
        }
        Ok(config)
    }
}

fn qualify_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// Embedding provider backed by the Gemini API
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    max_retries: usize,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RetrievalError::config("missing Gemini API key"));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(config.api_key.trim())
                .map_err(|_| RetrievalError::config("invalid Gemini API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        let model = qualify_model(&config.model);
        let endpoint = format!(
            "{}/{}:batchEmbedContents",
            config.base_url.trim_end_matches('/'),
            model
        );
        log::info!("Gemini embeddings: {} ({}d)", model, config.dimension);

        Ok(Self {
            client,
            endpoint,
            model,
            dimension: config.dimension,
            max_retries: config.max_retries.max(1),
        })
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(500 * (1 << capped))
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        };

        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: BatchEmbedResponse = resp.json().await.map_err(|e| {
                            RetrievalError::provider(format!("malformed embedding response: {}", e))
                        })?;
                        return Ok(parsed
                            .embeddings
                            .into_iter()
                            .map(|e| e.values)
                            .collect());
                    }

                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if Self::should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        log::debug!("Gemini returned {}, retry {}", status, attempt);
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(RetrievalError::provider(format!(
                        "Gemini embeddings request failed ({}): {}",
                        status, body
                    )));
                }
                Err(err) => {
                    if Self::is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        log::debug!("Gemini request error: {}, retry {}", err, attempt);
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default, deserialize_with = "lenient_values")]
    values: Vec<f32>,
}

/// Missing, null or non-numeric `values` decode to an empty vector
fn lenient_values<'de, D>(deserializer: D) -> std::result::Result<Vec<f32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}
