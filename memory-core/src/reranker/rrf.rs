//! Reciprocal-rank fusion hybrid reranker.

use async_trait::async_trait;
use futures::future::try_join_all;

use super::Reranker;
use crate::error::Result;

/// The default RRF constant, matching common practice (and spec.md §4.6).
pub const DEFAULT_K: f64 = 60.0;

/// Runs a configured list of sub-rerankers, converts each sub-score list to
/// a rank, then sums `1 / (k + rank_i)`.
///
/// The hybrid is commutative over its sub-rerankers (summing is
/// order-independent) and monotone in any one component's rank
/// improvement. Output preserves input order.
pub struct RrfReranker {
    sub_rerankers: Vec<Box<dyn Reranker>>,
    k: f64,
}

impl RrfReranker {
    /// Construct an RRF reranker over `sub_rerankers` with the default `k`.
    #[must_use]
    pub fn new(sub_rerankers: Vec<Box<dyn Reranker>>) -> Self {
        Self {
            sub_rerankers,
            k: DEFAULT_K,
        }
    }

    /// Construct an RRF reranker with a custom `k`.
    #[must_use]
    pub fn with_k(sub_rerankers: Vec<Box<dyn Reranker>>, k: f64) -> Self {
        Self { sub_rerankers, k }
    }
}

/// Convert a list of scores (higher = better) to 1-indexed ranks (1 = best).
/// Ties receive the same rank family by stable order of first occurrence.
fn scores_to_ranks(scores: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut ranks = vec![0usize; scores.len()];
    for (rank, &idx) in indices.iter().enumerate() {
        ranks[idx] = rank + 1;
    }
    ranks
}

#[async_trait]
impl Reranker for RrfReranker {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let futures = self
            .sub_rerankers
            .iter()
            .map(|r| r.score(query, candidates));
        let sub_scores = try_join_all(futures).await?;

        let mut fused = vec![0.0_f64; candidates.len()];
        for scores in &sub_scores {
            let ranks = scores_to_ranks(scores);
            for (i, rank) in ranks.into_iter().enumerate() {
                fused[i] += 1.0 / (self.k + rank as f64);
            }
        }

        Ok(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reranker::length_preservation::{assert_empty_on_empty, assert_length_preserved};

    struct FixedReranker(Vec<f64>);

    #[async_trait]
    impl Reranker for FixedReranker {
        async fn score(&self, _query: &str, candidates: &[String]) -> Result<Vec<f64>> {
            Ok(self.0[..candidates.len()].to_vec())
        }
    }

    #[tokio::test]
    async fn length_is_preserved() {
        let reranker = RrfReranker::new(vec![Box::new(FixedReranker(vec![1.0, 2.0, 3.0]))]);
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_length_preserved(&reranker, "q", &candidates).await;
        assert_empty_on_empty(&reranker, "q").await;
    }

    #[tokio::test]
    async fn tie_scenario_from_spec() {
        // Sub-rerankers produce [1.0, 2.0, 4.0] and [2.0, 1.0, 4.0] for three
        // candidates; RRF output must satisfy scores[0] == scores[1] < scores[2].
        let reranker = RrfReranker::new(vec![
            Box::new(FixedReranker(vec![1.0, 2.0, 4.0])),
            Box::new(FixedReranker(vec![2.0, 1.0, 4.0])),
        ]);
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let scores = reranker.score("q", &candidates).await.unwrap();
        assert!((scores[0] - scores[1]).abs() < 1e-9);
        assert!(scores[0] < scores[2]);
    }

    #[tokio::test]
    async fn commutative_over_sub_reranker_order() {
        let a = RrfReranker::new(vec![
            Box::new(FixedReranker(vec![1.0, 5.0, 3.0])),
            Box::new(FixedReranker(vec![5.0, 1.0, 3.0])),
        ]);
        let b = RrfReranker::new(vec![
            Box::new(FixedReranker(vec![5.0, 1.0, 3.0])),
            Box::new(FixedReranker(vec![1.0, 5.0, 3.0])),
        ]);
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let scores_a = a.score("q", &candidates).await.unwrap();
        let scores_b = b.score("q", &candidates).await.unwrap();
        assert_eq!(scores_a, scores_b);
    }
}
