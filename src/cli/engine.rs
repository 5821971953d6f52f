//! Wiring of concrete adapters into generation controllers.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::{
    build_provider, AnthropicClient, AnthropicConfig, AnthropicSmellClassifier,
    AnthropicSynthesis, InMemoryRedundancyIndex, PythonTraceExecutor,
};
use crate::domain::models::Config;
use crate::domain::ports::{EmbeddingProvider, SmellClassifier, SynthesisService, TestExecutor};
use crate::services::{GenerationController, RetryPolicy};

/// Adapters shared by every session of one CLI invocation.
///
/// Sessions share no mutable state: each controller gets its own
/// redundancy index.
#[derive(Clone)]
pub struct Engine {
    executor: Arc<dyn TestExecutor>,
    synthesis: Arc<dyn SynthesisService>,
    classifier: Arc<dyn SmellClassifier>,
    embeddings: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
}

impl Engine {
    /// Build the production stack: Python executor, Anthropic synthesis and
    /// classification, configured embedding provider.
    pub fn from_config(config: &Config) -> Result<Self> {
        let executor = Arc::new(PythonTraceExecutor::from_config(&config.executor));
        let anthropic = AnthropicConfig::from_settings(&config.synthesis)
            .context("Synthesis service is not configured")?;
        let client = Arc::new(AnthropicClient::new(anthropic).context("Failed to build HTTP client")?);
        let embeddings = build_provider(&config.embeddings)
            .context("Failed to build embedding provider")?;

        Ok(Self {
            executor,
            synthesis: Arc::new(AnthropicSynthesis::new(client.clone())),
            classifier: Arc::new(AnthropicSmellClassifier::new(client)),
            embeddings,
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    pub fn with_adapters(
        executor: Arc<dyn TestExecutor>,
        synthesis: Arc<dyn SynthesisService>,
        classifier: Arc<dyn SmellClassifier>,
        embeddings: Arc<dyn EmbeddingProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            executor,
            synthesis,
            classifier,
            embeddings,
            retry,
        }
    }

    pub fn executor(&self) -> &Arc<dyn TestExecutor> {
        &self.executor
    }

    /// A controller for one session, with a fresh redundancy index.
    pub fn controller(&self) -> GenerationController {
        let index = Arc::new(InMemoryRedundancyIndex::new(self.embeddings.clone()));
        GenerationController::new(
            self.executor.clone(),
            self.synthesis.clone(),
            self.classifier.clone(),
            index,
        )
        .with_retry(self.retry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SynthesisConfig;

    #[test]
    fn test_from_config_requires_api_key() {
        let config = Config {
            synthesis: SynthesisConfig {
                api_key: None,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = temp_env::with_var_unset("ANTHROPIC_API_KEY", || Engine::from_config(&config));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_config_with_key() {
        let config = Config {
            synthesis: SynthesisConfig {
                api_key: Some("test-key".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = Engine::from_config(&config).unwrap();
        assert_eq!(engine.executor().name(), "python-trace");
    }
}
