//! Offline lexical embedding provider.
//!
//! Feature-hashes identifier, number and string-literal tokens (plus token
//! bigrams) into a fixed number of buckets and L2-normalises the result.
//! Deterministic across runs and platforms.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::EmbeddingProvider;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[A-Za-z_][A-Za-z0-9_]*|\d+(?:\.\d+)?|"[^"\n]*"|'[^'\n]*'|[-+*/%<>=!]=?"#)
        .expect("valid regex")
});

/// Tokens present in nearly every unittest method; they carry no signal.
const STOP_TOKENS: &[&str] = &["def", "self", "assert", "return", "None", "True", "False"];

const BIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct LexicalEmbeddingProvider {
    dimension: usize,
}

impl LexicalEmbeddingProvider {
    pub fn new(dimension: usize) -> DomainResult<Self> {
        if dimension == 0 {
            return Err(DomainError::ValidationFailed(
                "lexical embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn bucket(&self, token: &str) -> usize {
        let hash = fnv1a(token.as_bytes());
        usize::try_from(hash % self.dimension as u64).unwrap_or(0)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let tokens: Vec<&str> = TOKEN_RE
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|token| !STOP_TOKENS.contains(token))
            .collect();

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            vector[self.bucket(token)] += 1.0;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            vector[self.bucket(&bigram)] += BIGRAM_WEIGHT;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

#[async_trait]
impl EmbeddingProvider for LexicalEmbeddingProvider {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        Ok(self.vectorize(text))
    }
}
