//! Spec.md §8: every persisted derivative carries a `DERIVED_FROM` edge back
//! to the episode(s) it was derived from, and `query` resolves those edges
//! into the returned `episodes` list.

use std::collections::HashSet;

use memory_core::store::Direction;
use memory_core::types::FilterableProperties;
use test_utils::{declarative_memory_with_store, test_episode};

use std::sync::Arc;
use memory_core::store::mem::InMemoryStore;
use memory_core::store::VectorGraphStore;

#[tokio::test]
async fn query_resolves_derived_from_edges_back_to_source_episodes() {
    let store: Arc<dyn VectorGraphStore> = Arc::new(InMemoryStore::new());
    let memory = declarative_memory_with_store(Arc::clone(&store));

    let episode = test_episode("the quick brown fox", "user-1", "sess-1");
    let episode_id = episode.id;
    memory.ingest(episode).await.unwrap();

    let outcome = memory.query("fox", &FilterableProperties::new(), 5).await.unwrap();
    assert!(!outcome.derivatives.is_empty());

    let returned_ids: HashSet<_> = outcome.episodes.iter().map(|e| e.id).collect();
    assert!(returned_ids.contains(&episode_id));

    for derivative in &outcome.derivatives {
        let sources = store.traverse_edges(derivative.id, "DERIVED_FROM", Direction::Descending).await.unwrap();
        assert!(!sources.is_empty(), "derivative {} has no DERIVED_FROM edge", derivative.id);
        assert!(sources.iter().any(|n| n.id == episode_id));
    }
}
