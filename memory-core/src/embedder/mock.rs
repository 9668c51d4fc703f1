//! Deterministic, non-semantic embedder for tests and demos.
//!
//! Mirrors the teacher's `MockLocalModel`: a hash-seeded PRNG over the
//! text produces a stable vector, normalized so cosine similarity behaves
//! sanely. Not intended for production use — it carries no semantic signal.

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use super::{Embedder, SimilarityMetric};
use crate::error::Result;

/// A deterministic embedder for tests: same text always yields the same
/// vector, and dimension/metric are configurable.
pub struct MockEmbedder {
    dimension: usize,
    metric: SimilarityMetric,
}

impl MockEmbedder {
    /// Construct a mock embedder with the given dimension and metric.
    #[must_use]
    pub fn new(dimension: usize, metric: SimilarityMetric) -> Self {
        Self { dimension, metric }
    }

    fn hash_embed(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut out = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let value = ((seed >> 33) as f32) / (u32::MAX as f32) * 2.0 - 1.0;
            out.push(value);
        }
        let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(16, SimilarityMetric::Cosine)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("goodbye").await.unwrap();
        assert_ne!(a, b);
    }
}
