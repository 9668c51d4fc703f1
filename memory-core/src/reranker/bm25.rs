//! Classic BM25 over a tokenized document set built from the candidates at
//! call time.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::Reranker;
use crate::error::Result;

fn default_tokenizer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("static regex"))
}

/// Lowercases and splits on non-word boundaries. The default tokenizer used
/// by [`Bm25Reranker`] when none is injected.
#[must_use]
pub fn default_tokenizer(text: &str) -> Vec<String> {
    default_tokenizer_re()
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// BM25 term-frequency/document-length scorer.
///
/// The tokenizer is injected; the default is `default_tokenizer`
/// (lowercasing + non-word split), matching spec.md §4.6.
pub struct Bm25Reranker {
    k1: f64,
    b: f64,
    tokenizer: Box<dyn Fn(&str) -> Vec<String> + Send + Sync>,
}

impl Bm25Reranker {
    /// Construct with BM25's standard defaults (`k1 = 1.2`, `b = 0.75`) and
    /// the default tokenizer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            tokenizer: Box::new(default_tokenizer),
        }
    }

    /// Construct with a custom tokenizer.
    pub fn with_tokenizer(tokenizer: impl Fn(&str) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            tokenizer: Box::new(tokenizer),
        }
    }
}

impl Default for Bm25Reranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reranker for Bm25Reranker {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_terms = (self.tokenizer)(query);
        if query_terms.is_empty() {
            return Ok(vec![0.0; candidates.len()]);
        }

        let docs: Vec<Vec<String>> = candidates.iter().map(|c| (self.tokenizer)(c)).collect();
        let n = docs.len() as f64;
        let avg_len = docs.iter().map(|d| d.len() as f64).sum::<f64>() / n;

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for term in &query_terms {
            let df = docs
                .iter()
                .filter(|d| d.iter().any(|t| t == term))
                .count();
            doc_freq.insert(term.as_str(), df);
        }

        let scores = docs
            .iter()
            .map(|doc| {
                let doc_len = doc.len() as f64;
                query_terms
                    .iter()
                    .map(|term| {
                        let df = *doc_freq.get(term.as_str()).unwrap_or(&0);
                        if df == 0 {
                            return 0.0;
                        }
                        let idf = ((n - df as f64 + 0.5) / (df as f64 + 0.5) + 1.0).ln();
                        let tf = doc.iter().filter(|t| *t == term).count() as f64;
                        let denom = tf + self.k1 * (1.0 - self.b + self.b * doc_len / avg_len);
                        if denom == 0.0 {
                            0.0
                        } else {
                            idf * (tf * (self.k1 + 1.0)) / denom
                        }
                    })
                    .sum()
            })
            .collect();

        Ok(scores)
    }
}
