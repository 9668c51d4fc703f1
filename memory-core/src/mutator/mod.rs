//! Derivative Mutator: rewrites or annotates a derivative given its source
//! cluster (spec.md §4.3).

pub mod identity;
pub mod llm_rewrite;
pub mod metadata_templated;

pub use identity::IdentityMutator;
pub use llm_rewrite::LanguageModelRewriteMutator;
pub use metadata_templated::MetadataTemplatedMutator;

use async_trait::async_trait;

use crate::derivative::Derivative;
use crate::episode::EpisodeCluster;
use crate::error::Result;

/// Consumes `(derivative, source_cluster)` and yields one-or-more rewritten
/// derivatives.
#[async_trait]
pub trait DerivativeMutator: Send + Sync {
    /// Mutate `derivative` using `source_cluster` as context.
    async fn mutate(
        &self,
        derivative: &Derivative,
        source_cluster: &EpisodeCluster,
    ) -> Result<Vec<Derivative>>;
}
