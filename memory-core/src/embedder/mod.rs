//! Embedder: dense vectors for ingestion and query (spec.md §4.2 of the
//! system overview).

mod mock;

pub use mock::MockEmbedder;

use async_trait::async_trait;

use crate::error::Result;

/// The similarity metric an embedder's vector space is declared under.
///
/// Rerankers that compute embedder similarity must negate distance metrics
/// so that "larger score = more relevant" holds invariantly (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    /// Cosine similarity; larger is more similar.
    Cosine,
    /// Dot product; larger is more similar.
    Dot,
    /// Euclidean distance; smaller is more similar.
    Euclidean,
    /// Manhattan distance; smaller is more similar.
    Manhattan,
}

impl SimilarityMetric {
    /// Whether a larger raw score under this metric means "more similar".
    #[must_use]
    pub fn larger_is_better(self) -> bool {
        matches!(self, SimilarityMetric::Cosine | SimilarityMetric::Dot)
    }

    /// Score two vectors under this metric.
    #[must_use]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => cosine(a, b),
            SimilarityMetric::Dot => dot(a, b),
            SimilarityMetric::Euclidean => euclidean(a, b),
            SimilarityMetric::Manhattan => manhattan(a, b),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot(a, b) / denom
    }
}

fn norm(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

fn manhattan(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Yields dense vectors for text content, for both ingestion and query.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. Default implementation embeds sequentially;
    /// implementations backed by a batching API should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// The fixed dimension of vectors this embedder produces.
    fn dimension(&self) -> usize;

    /// The similarity metric this embedder's vector space is declared under.
    fn metric(&self) -> SimilarityMetric;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn euclidean_of_identical_vectors_is_zero() {
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(euclidean(&v, &v), 0.0);
    }

    #[test]
    fn metric_larger_is_better_flags() {
        assert!(SimilarityMetric::Cosine.larger_is_better());
        assert!(SimilarityMetric::Dot.larger_is_better());
        assert!(!SimilarityMetric::Euclidean.larger_is_better());
        assert!(!SimilarityMetric::Manhattan.larger_is_better());
    }
}
