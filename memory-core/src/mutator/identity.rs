//! Identity mutator: passthrough.

use async_trait::async_trait;

use super::DerivativeMutator;
use crate::derivative::Derivative;
use crate::episode::EpisodeCluster;
use crate::error::Result;

/// Returns `derivative` unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityMutator;

#[async_trait]
impl DerivativeMutator for IdentityMutator {
    async fn mutate(
        &self,
        derivative: &Derivative,
        _source_cluster: &EpisodeCluster,
    ) -> Result<Vec<Derivative>> {
        Ok(vec![derivative.clone()])
    }
}
