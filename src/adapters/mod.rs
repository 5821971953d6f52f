//! Infrastructure adapters for external systems.

pub mod embeddings;
pub mod executor;
pub mod llm;
pub mod mock;
pub mod redundancy;

pub use embeddings::{build_provider, LexicalEmbeddingProvider, OpenAiEmbeddingProvider};
pub use executor::PythonTraceExecutor;
pub use llm::{AnthropicClient, AnthropicConfig, AnthropicSmellClassifier, AnthropicSynthesis};
pub use redundancy::InMemoryRedundancyIndex;
