//! LLM-backed synthesis and classification adapters.

pub mod anthropic;
pub mod prompts;

pub use anthropic::{
    parse_classification, AnthropicClient, AnthropicConfig, AnthropicSmellClassifier,
    AnthropicSynthesis,
};
