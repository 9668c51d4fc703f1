//! Null postulator: never links any prior episode.

use async_trait::async_trait;

use super::RelatedEpisodePostulator;
use crate::episode::Episode;
use crate::error::Result;
use crate::store::VectorGraphStore;

/// Always returns the empty list.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPostulator;

#[async_trait]
impl RelatedEpisodePostulator for NullPostulator {
    async fn postulate(
        &self,
        _episode: &Episode,
        _store: &(dyn VectorGraphStore + Send + Sync),
    ) -> Result<Vec<Episode>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::InMemoryStore;
    use crate::types::ContentType;

    #[tokio::test]
    async fn always_empty() {
        let store = InMemoryStore::new();
        let episode = Episode::new(
            "chat",
            ContentType::String,
            "hi",
            chrono::Utc::now(),
            "u1",
            Default::default(),
            serde_json::Value::Null,
        );
        let related = NullPostulator.postulate(&episode, &store).await.unwrap();
        assert!(related.is_empty());
    }
}
