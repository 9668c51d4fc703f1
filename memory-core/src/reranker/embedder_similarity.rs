//! Embedder-similarity reranker: embeds query and candidates, scores under
//! the embedder's declared metric.

use std::sync::Arc;

use async_trait::async_trait;

use super::Reranker;
use crate::embedder::Embedder;
use crate::error::Result;

/// Embeds the query and every candidate, then scores under the embedder's
/// declared similarity metric. For metrics where larger-is-better (cosine,
/// dot) scores are returned as-is; for distance metrics (Euclidean,
/// Manhattan) scores are negated so "larger = more relevant" holds
/// invariantly across rerankers (spec.md §4.6).
pub struct EmbedderSimilarityReranker {
    embedder: Arc<dyn Embedder>,
}

impl EmbedderSimilarityReranker {
    /// Construct a reranker around the given embedder.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Reranker for EmbedderSimilarityReranker {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let candidate_embeddings = self.embedder.embed_batch(candidates).await?;
        let metric = self.embedder.metric();

        let scores = candidate_embeddings
            .iter()
            .map(|emb| {
                let raw = f64::from(metric.score(&query_embedding, emb));
                if metric.larger_is_better() {
                    raw
                } else {
                    -raw
                }
            })
            .collect();

        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::{MockEmbedder, SimilarityMetric};
    use crate::reranker::length_preservation::{assert_empty_on_empty, assert_length_preserved};

    #[tokio::test]
    async fn length_is_preserved() {
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(8, SimilarityMetric::Cosine));
        let reranker = EmbedderSimilarityReranker::new(embedder);
        let candidates = vec!["hello".to_string(), "world".to_string()];
        assert_length_preserved(&reranker, "hello", &candidates).await;
        assert_empty_on_empty(&reranker, "hello").await;
    }

    #[tokio::test]
    async fn distance_metrics_are_negated() {
        let embedder: Arc<dyn Embedder> =
            Arc::new(MockEmbedder::new(8, SimilarityMetric::Euclidean));
        let reranker = EmbedderSimilarityReranker::new(embedder);
        let candidates = vec!["same text".to_string()];
        let scores = reranker.score("same text", &candidates).await.unwrap();
        // identical text -> distance 0 -> negated score 0 (the best possible).
        assert!((scores[0]).abs() < 1e-4);
    }
}
