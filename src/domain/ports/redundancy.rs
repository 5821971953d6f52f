//! Semantic redundancy index port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;

/// A previously accepted test and its similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbour {
    pub body: String,
    /// Cosine similarity in [-1, 1]; higher is more similar.
    pub similarity: f32,
}

/// Similarity search over accepted tests.
#[async_trait]
pub trait RedundancyIndex: Send + Sync {
    /// Index an accepted test body.
    async fn add(&self, test_body: &str) -> DomainResult<()>;

    /// Up to `k` indexed tests nearest to `text`, most similar first.
    async fn query_nearest(&self, text: &str, k: usize) -> DomainResult<Vec<Neighbour>>;

    /// Number of indexed tests.
    async fn indexed_count(&self) -> usize;
}
