use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::domain::embedding_provider::EmbeddingProvider;
use crate::error::SearchError;

/// Embedding provider backed by an OpenAI-compatible `/v1/embeddings`
/// endpoint.
///
/// One outbound request per invocation, no internal retries: the provider
/// and the vector store have independent rate-limit characteristics, so
/// retry timing is left to the caller.
#[derive(Debug)]
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Fails with a configuration error when no credential is present;
    /// a provider without a key could never produce anything but auth
    /// failures at call time.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, SearchError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                SearchError::Configuration("embedding API key is not configured".to_string())
            })?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        if text.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        log::debug!(
            "Requesting embedding for {} chars with model '{}'",
            text.len(),
            self.model
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: text,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| SearchError::Provider {
                status: 0,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string();
            log::warn!("Embedding request rejected: {} {}", status.as_u16(), message);
            return Err(SearchError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse =
            response.json().await.map_err(|e| SearchError::Provider {
                status: status.as_u16(),
                message: format!("malformed embedding response: {}", e),
            })?;

        body.data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| SearchError::Provider {
                status: status.as_u16(),
                message: "embedding response contained no data".to_string(),
            })
    }
}

/// Degenerate provider producing uniformly random components of a fixed
/// dimension. Interchangeable with [`OpenAiEmbedder`] behind the trait,
/// which lets the rest of the pipeline run without a live embedding
/// service.
pub struct SyntheticEmbedder {
    dimension: usize,
}

impl SyntheticEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for SyntheticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        if text.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let mut rng = rand::thread_rng();
        Ok((0..self.dimension).map(|_| rng.gen::<f32>()).collect())
    }
}
