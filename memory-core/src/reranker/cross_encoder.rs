//! Cross-encoder reranker: delegates to a pairwise sequence model producing
//! one scalar per (query, candidate).

use async_trait::async_trait;

use super::Reranker;
use crate::error::Result;

/// A pairwise sequence-scoring model, injected into [`CrossEncoderReranker`].
#[async_trait]
pub trait CrossEncoderModel: Send + Sync {
    /// Score a single (query, candidate) pair.
    async fn score_pair(&self, query: &str, candidate: &str) -> Result<f64>;
}

/// Reranks by delegating each (query, candidate) pair to an injected
/// cross-encoder model.
pub struct CrossEncoderReranker<M: CrossEncoderModel> {
    model: M,
}

impl<M: CrossEncoderModel> CrossEncoderReranker<M> {
    /// Construct a reranker around the given model.
    #[must_use]
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M: CrossEncoderModel> Reranker for CrossEncoderReranker<M> {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>> {
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            scores.push(self.model.score_pair(query, candidate).await?);
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reranker::length_preservation::{assert_empty_on_empty, assert_length_preserved};

    struct LengthModel;

    #[async_trait]
    impl CrossEncoderModel for LengthModel {
        async fn score_pair(&self, query: &str, candidate: &str) -> Result<f64> {
            let overlap = candidate
                .split_whitespace()
                .filter(|w| query.contains(w))
                .count();
            Ok(overlap as f64)
        }
    }

    #[tokio::test]
    async fn length_is_preserved() {
        let reranker = CrossEncoderReranker::new(LengthModel);
        let candidates = vec!["cat sat".to_string(), "dog ran".to_string()];
        assert_length_preserved(&reranker, "cat", &candidates).await;
        assert_empty_on_empty(&reranker, "cat").await;
    }
}
