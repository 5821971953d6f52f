//! Embedding provider adapters.

pub mod lexical;
pub mod openai;

use std::sync::Arc;

pub use lexical::LexicalEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EmbeddingConfig, EmbeddingProviderKind};
use crate::domain::ports::EmbeddingProvider;

/// Build the configured embedding provider.
pub fn build_provider(config: &EmbeddingConfig) -> DomainResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::Lexical => Arc::new(LexicalEmbeddingProvider::new(config.dimension)?),
        EmbeddingProviderKind::Openai => Arc::new(OpenAiEmbeddingProvider::from_config(config)?),
    };
    Ok(provider)
}
