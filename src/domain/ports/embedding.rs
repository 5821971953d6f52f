//! Embedding provider port.
//!
//! Converts test bodies into dense vectors for the redundancy index.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "openai", "lexical").
    fn name(&self) -> &'static str;

    /// Embedding dimension for this provider/model.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>>;

    /// Generate embeddings for several texts, preserving input order.
    ///
    /// The default implementation embeds one text at a time.
    async fn embed_batch(&self, texts: &[String]) -> DomainResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
