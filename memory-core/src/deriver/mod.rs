//! Derivative Deriver: transforms an episode cluster into zero-or-more
//! derivative seeds (spec.md, Derivative Deriver component).

pub mod concatenation;
pub mod identity;
pub mod llm_summary;
pub mod sentence_split;

pub use concatenation::ConcatenationDeriver;
pub use identity::IdentityDeriver;
pub use llm_summary::LanguageModelSummaryDeriver;
pub use sentence_split::SentenceSplitDeriver;

use async_trait::async_trait;

use crate::episode::EpisodeCluster;
use crate::derivative::Derivative;
use crate::error::Result;

/// Consumes an [`EpisodeCluster`] and returns an ordered list of derivative
/// seeds (without embeddings — the embedder runs as a later, batched step).
#[async_trait]
pub trait DerivativeDeriver: Send + Sync {
    /// Derive zero-or-more seed derivatives from `cluster`.
    async fn derive(&self, cluster: &EpisodeCluster) -> Result<Vec<Derivative>>;
}
