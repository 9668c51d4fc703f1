//! Rerankers: a family of scorers mapping (query, candidate strings) to
//! per-candidate scores (spec.md §4.6).

pub mod bm25;
pub mod cross_encoder;
pub mod embedder_similarity;
pub mod identity;
pub mod rrf;

pub use bm25::Bm25Reranker;
pub use cross_encoder::{CrossEncoderModel, CrossEncoderReranker};
pub use embedder_similarity::EmbedderSimilarityReranker;
pub use identity::IdentityReranker;
pub use rrf::RrfReranker;

use async_trait::async_trait;

use crate::error::Result;

/// Maps a query and a list of candidate strings to one score per candidate.
///
/// Property (spec.md §8): for every reranker `R` and every `(query,
/// candidates)` with `|candidates| == n`, `|R.score(query, candidates)| ==
/// n`; and `R.score(query, []) == []`.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score each candidate against `query`. Higher scores are always more
    /// relevant, regardless of the underlying metric (distance-based
    /// sub-scorers negate before returning).
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>>;
}

#[cfg(test)]
pub(crate) mod length_preservation {
    use super::*;

    pub(crate) async fn assert_length_preserved(reranker: &dyn Reranker, query: &str, candidates: &[String]) {
        let scores = reranker.score(query, candidates).await.unwrap();
        assert_eq!(scores.len(), candidates.len());
    }

    pub(crate) async fn assert_empty_on_empty(reranker: &dyn Reranker, query: &str) {
        let scores = reranker.score(query, &[]).await.unwrap();
        assert!(scores.is_empty());
    }
}
