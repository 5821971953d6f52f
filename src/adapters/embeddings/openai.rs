//! Embeddings from an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::EmbeddingConfig;
use crate::domain::ports::EmbeddingProvider;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Remote embedding provider. Every returned vector must have the configured
/// dimension, otherwise the call fails as an index error.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingProvider {
    /// Resolve the API key (config, then `OPENAI_API_KEY`) and build the client.
    pub fn from_config(config: &EmbeddingConfig) -> DomainResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!(
                    "{API_KEY_ENV} not set. Set the env var or embeddings.api_key."
                ))
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::RedundancyIndex(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    async fn request(&self, texts: &[String]) -> DomainResult<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| DomainError::RedundancyIndex(format!("Embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::RedundancyIndex(format!(
                "Embedding endpoint returned {status}: {body}"
            )));
        }

        let mut data = response
            .json::<EmbeddingsResponse>()
            .await
            .map_err(|e| DomainError::SerializationError(format!("Invalid embedding response: {e}")))?
            .data;
        if data.len() != texts.len() {
            return Err(DomainError::RedundancyIndex(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(DomainError::RedundancyIndex(format!(
                "embedding dimension {} does not match configured {}",
                bad.len(),
                self.dimension
            )));
        }
        debug!(count = vectors.len(), model = %self.model, "Embeddings fetched");
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        self.request(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| DomainError::RedundancyIndex("Empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> DomainResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EmbeddingProviderKind;

    fn config(base_url: String, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: EmbeddingProviderKind::Openai,
            api_key: Some("test-key".to_string()),
            base_url,
            dimension,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let config = EmbeddingConfig {
            api_key: None,
            ..Default::default()
        };
        let result = temp_env::with_var_unset(API_KEY_ENV, || OpenAiEmbeddingProvider::from_config(&config));
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_batch_is_reordered_by_index() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(
                r#"{"data":[{"embedding":[0.0,1.0,0.0],"index":1},{"embedding":[1.0,0.0,0.0],"index":0}]}"#,
            )
            .create_async()
            .await;

        let provider = OpenAiEmbeddingProvider::from_config(&config(server.url(), 3)).unwrap();
        let vectors = provider
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_index_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[0.5,0.5],"index":0}]}"#)
            .create_async()
            .await;

        let provider = OpenAiEmbeddingProvider::from_config(&config(server.url(), 3)).unwrap();
        let err = provider.embed("x").await.unwrap_err();
        assert!(matches!(err, DomainError::RedundancyIndex(msg) if msg.contains("dimension")));
    }

    #[tokio::test]
    async fn test_error_status_is_index_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let provider = OpenAiEmbeddingProvider::from_config(&config(server.url(), 3)).unwrap();
        let err = provider.embed("x").await.unwrap_err();
        assert!(matches!(err, DomainError::RedundancyIndex(msg) if msg.contains("500")));
    }
}
