//! In-memory semantic redundancy index.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{EmbeddingProvider, Neighbour, RedundancyIndex};

/// Cosine similarity of two vectors; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

struct IndexedTest {
    body: String,
    vector: Vec<f32>,
}

/// Session-scoped index of accepted tests, searched by brute-force cosine
/// similarity over provider embeddings.
pub struct InMemoryRedundancyIndex {
    provider: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<IndexedTest>>,
}

impl InMemoryRedundancyIndex {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RedundancyIndex for InMemoryRedundancyIndex {
    async fn add(&self, test_body: &str) -> DomainResult<()> {
        let vector = self.provider.embed(test_body).await?;
        let mut entries = self.entries.write().await;
        if let Some(first) = entries.first() {
            if first.vector.len() != vector.len() {
                return Err(DomainError::RedundancyIndex(format!(
                    "embedding dimension {} does not match indexed dimension {}",
                    vector.len(),
                    first.vector.len()
                )));
            }
        }
        entries.push(IndexedTest {
            body: test_body.to_string(),
            vector,
        });
        debug!(indexed = entries.len(), provider = self.provider.name(), "Test indexed");
        Ok(())
    }

    async fn query_nearest(&self, text: &str, k: usize) -> DomainResult<Vec<Neighbour>> {
        if k == 0 || self.entries.read().await.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.provider.embed(text).await?;
        let entries = self.entries.read().await;
        let mut neighbours: Vec<Neighbour> = entries
            .iter()
            .map(|entry| Neighbour {
                body: entry.body.clone(),
                similarity: cosine_similarity(&query, &entry.vector),
            })
            .collect();

        neighbours.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        neighbours.truncate(k);
        Ok(neighbours)
    }

    async fn indexed_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::embeddings::LexicalEmbeddingProvider;

    fn index() -> InMemoryRedundancyIndex {
        InMemoryRedundancyIndex::new(Arc::new(LexicalEmbeddingProvider::new(128).unwrap()))
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_neighbours() {
        let index = index();
        assert!(index.query_nearest("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nearest_first_and_truncated_to_k() {
        let index = index();
        index.add("def test_add(self):\n    self.assertEqual(add(1, 2), 3)").await.unwrap();
        index
            .add("def test_div(self):\n    with self.assertRaises(ZeroDivisionError):\n        divide(1, 0)")
            .await
            .unwrap();
        index.add("def test_upper(self):\n    self.assertEqual(shout('a'), 'A')").await.unwrap();

        let hits = index
            .query_nearest("def test_add_more(self):\n    self.assertEqual(add(2, 2), 4)", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].body.contains("add(1, 2)"));
        assert!(hits[0].similarity >= hits[1].similarity);
        assert_eq!(index.indexed_count().await, 3);
    }

    #[tokio::test]
    async fn test_identical_body_has_similarity_one() {
        let index = index();
        let body = "def test_x(self):\n    self.assertTrue(check(5))";
        index.add(body).await.unwrap();
        let hits = index.query_nearest(body, 1).await.unwrap();
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
    }
}
