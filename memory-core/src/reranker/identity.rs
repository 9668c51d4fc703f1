//! The identity reranker: a no-op baseline.

use async_trait::async_trait;

use super::Reranker;
use crate::error::Result;

/// Returns a strictly decreasing sequence (`N, N-1, ..., 1`) preserving
/// input order. Higher index in input always yields lower score — useful
/// as a baseline that preserves whatever order candidates arrived in.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityReranker;

#[async_trait]
impl Reranker for IdentityReranker {
    async fn score(&self, _query: &str, candidates: &[String]) -> Result<Vec<f64>> {
        let n = candidates.len();
        Ok((0..n).map(|i| (n - i) as f64).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reranker::length_preservation::{assert_empty_on_empty, assert_length_preserved};

    #[tokio::test]
    async fn strictly_decreasing() {
        let reranker = IdentityReranker;
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let scores = reranker.score("q", &candidates).await.unwrap();
        assert_eq!(scores, vec![3.0, 2.0, 1.0]);
        for window in scores.windows(2) {
            assert!(window[0] > window[1]);
        }
    }

    #[tokio::test]
    async fn length_is_preserved() {
        let reranker = IdentityReranker;
        let candidates = vec!["a".to_string(), "b".to_string()];
        assert_length_preserved(&reranker, "q", &candidates).await;
        assert_empty_on_empty(&reranker, "q").await;
    }
}
