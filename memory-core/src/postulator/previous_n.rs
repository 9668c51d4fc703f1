//! Previous-N postulator: the N most recent prior episodes in the same
//! scope, strictly earlier than the triggering episode.

use async_trait::async_trait;

use super::RelatedEpisodePostulator;
use crate::episode::Episode;
use crate::error::Result;
use crate::store::{Direction, OrderValue, VectorGraphStore};
use crate::types::FilterableProperties;

/// Selects the `n` most recent prior episodes (strictly earlier timestamp)
/// within the scope defined by `scope_keys`, a configurable subset of
/// filterable-property keys (e.g. `["user_id"]`).
///
/// Uses the store's directional search with the triggering episode's
/// timestamp as an exclusive upper cursor; ties on equal timestamps are
/// broken by the store's own stable order (node ID, ascending), which is
/// applied consistently across calls.
pub struct PreviousNPostulator {
    n: usize,
    scope_keys: Vec<String>,
}

impl PreviousNPostulator {
    /// Construct a postulator selecting up to `n` prior episodes that match
    /// `episode`'s values for each key in `scope_keys`.
    #[must_use]
    pub fn new(n: usize, scope_keys: Vec<String>) -> Self {
        Self { n, scope_keys }
    }

    fn scope_filter(&self, episode: &Episode) -> FilterableProperties {
        self.scope_keys
            .iter()
            .filter_map(|key| {
                episode
                    .filterable_properties
                    .get(key)
                    .map(|v| (key.clone(), v.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl RelatedEpisodePostulator for PreviousNPostulator {
    async fn postulate(
        &self,
        episode: &Episode,
        store: &(dyn VectorGraphStore + Send + Sync),
    ) -> Result<Vec<Episode>> {
        if self.n == 0 {
            return Ok(Vec::new());
        }
        let required = self.scope_filter(episode);
        let nodes = store
            .search_directional_nodes(
                &["Episode".to_string()],
                &required,
                "timestamp",
                Direction::Descending,
                Some(OrderValue::Int(episode.timestamp.timestamp_millis())),
                self.n,
            )
            .await?;

        nodes.iter().map(Episode::try_from_node).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::InMemoryStore;
    use crate::types::ContentType;
    use chrono::{Duration, Utc};

    async fn seed_episode(
        store: &InMemoryStore,
        content: &str,
        user_id: &str,
        timestamp: chrono::DateTime<Utc>,
    ) {
        let mut props = FilterableProperties::new();
        props.insert("user_id".to_string(), user_id.into());
        let episode = Episode::new(
            "chat",
            ContentType::String,
            content,
            timestamp,
            user_id,
            props,
            serde_json::Value::Null,
        );
        store
            .add_node(
                episode.id,
                &["Episode".to_string()],
                episode.to_node_properties(),
                Some(episode.user_metadata.clone()),
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn scope_filtered_previous_n_scenario_from_spec() {
        let store = InMemoryStore::new();
        let t0 = Utc::now();
        seed_episode(&store, "e1", "u1", t0).await;
        seed_episode(&store, "e2", "u2", t0 + Duration::seconds(1)).await;
        seed_episode(&store, "e3", "u1", t0 + Duration::seconds(2)).await;

        let mut trigger_props = FilterableProperties::new();
        trigger_props.insert("user_id".to_string(), "u1".into());
        let trigger = Episode::new(
            "chat",
            ContentType::String,
            "e4",
            t0 + Duration::seconds(3),
            "u1",
            trigger_props,
            serde_json::Value::Null,
        );

        let postulator = PreviousNPostulator::new(2, vec!["user_id".to_string()]);
        let related = postulator.postulate(&trigger, &store).await.unwrap();

        assert_eq!(related.len(), 2);
        assert_eq!(related[0].content, "e3");
        assert_eq!(related[1].content, "e1");
    }

    #[tokio::test]
    async fn zero_n_yields_nothing() {
        let store = InMemoryStore::new();
        let episode = Episode::new(
            "chat",
            ContentType::String,
            "hi",
            Utc::now(),
            "u1",
            Default::default(),
            serde_json::Value::Null,
        );
        let postulator = PreviousNPostulator::new(0, vec![]);
        let related = postulator.postulate(&episode, &store).await.unwrap();
        assert!(related.is_empty());
    }
}
