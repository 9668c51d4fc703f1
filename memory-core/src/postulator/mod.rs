//! Related-Episode Postulator: picks prior episodes in the same scope to
//! link to a new episode (spec.md §4.4).

pub mod null;
pub mod previous_n;

pub use null::NullPostulator;
pub use previous_n::PreviousNPostulator;

use async_trait::async_trait;

use crate::episode::Episode;
use crate::error::Result;
use crate::store::VectorGraphStore;

/// Picks prior episodes related to `episode`, to be linked via `FOLLOWS`
/// edges and folded into its `EpisodeCluster`.
#[async_trait]
pub trait RelatedEpisodePostulator: Send + Sync {
    /// Postulate related prior episodes for `episode`, reading from `store`.
    async fn postulate(
        &self,
        episode: &Episode,
        store: &(dyn VectorGraphStore + Send + Sync),
    ) -> Result<Vec<Episode>>;
}
