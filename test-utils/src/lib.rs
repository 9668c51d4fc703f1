//! Shared test fixtures for the conversational memory engine's crates.
//!
//! Provides small, deterministic builders for [`Episode`]s and a fully
//! wired in-memory [`DeclarativeMemory`]/[`ProfileMemory`] pair, so
//! integration tests in `tests/` and doc examples in `demos/` don't each
//! re-derive the same plumbing.

use std::sync::Arc;

use chrono::Utc;
use memory_core::declarative::DeclarativeMemory;
use memory_core::deriver::sentence_split::SentenceSplitDeriver;
use memory_core::embedder::{Embedder, MockEmbedder, SimilarityMetric};
use memory_core::episode::Episode;
use memory_core::llm::MockLanguageModel;
use memory_core::mutator::identity::IdentityMutator;
use memory_core::postulator::previous_n::PreviousNPostulator;
use memory_core::reranker::embedder_similarity::EmbedderSimilarityReranker;
use memory_core::store::mem::InMemoryStore;
use memory_core::store::VectorGraphStore;
use memory_core::types::{ContentType, FilterableProperties, ScalarValue};
use memory_profile::{InMemoryProfileStorage, ProfileMemory, ProfilePrompt};

/// Build a chat episode with one `session_id` filterable property.
#[must_use]
pub fn test_episode(content: &str, producer_id: &str, session_id: &str) -> Episode {
    let mut props = FilterableProperties::new();
    props.insert("session_id".to_string(), ScalarValue::String(session_id.to_string()));
    Episode::new(
        "chat",
        ContentType::String,
        content,
        Utc::now(),
        producer_id,
        props,
        serde_json::Value::Null,
    )
}

/// Build `count` chat episodes sharing one `session_id`, content
/// `"{label} {i}"` for `i` in `0..count`.
#[must_use]
pub fn test_episodes(label: &str, producer_id: &str, session_id: &str, count: usize) -> Vec<Episode> {
    (0..count)
        .map(|i| test_episode(&format!("{label} {i}"), producer_id, session_id))
        .collect()
}

/// A [`DeclarativeMemory`] over a fresh [`InMemoryStore`], wired with the
/// same default pipeline `memory-cli` uses: a 32-dimensional
/// [`MockEmbedder`], a previous-5 postulator scoped by `session_id`, the
/// sentence-split deriver, the identity mutator, and an embedder-similarity
/// reranker.
#[must_use]
pub fn declarative_memory() -> DeclarativeMemory {
    let store: Arc<dyn VectorGraphStore> = Arc::new(InMemoryStore::new());
    declarative_memory_with_store(store)
}

/// As [`declarative_memory`], but over a caller-supplied store.
#[must_use]
pub fn declarative_memory_with_store(store: Arc<dyn VectorGraphStore>) -> DeclarativeMemory {
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(32, SimilarityMetric::Cosine));
    DeclarativeMemory::new(
        store,
        Arc::clone(&embedder),
        Arc::new(PreviousNPostulator::new(5, vec!["session_id".to_string()])),
        Arc::new(SentenceSplitDeriver),
        Arc::new(IdentityMutator),
        Arc::new(EmbedderSimilarityReranker::new(embedder)),
    )
}

/// A [`ProfileMemory`] over a fresh [`InMemoryProfileStorage`], wired with a
/// fixed-response mock language model and a 32-dimensional mock embedder.
/// `response` is the JSON the mock model returns from every `generate`
/// call — pass a `[{"command": "add", ...}]`-shaped string to exercise
/// extraction.
#[must_use]
pub fn profile_memory(response: &str) -> Arc<ProfileMemory> {
    Arc::new(ProfileMemory::with_config(
        Arc::new(MockLanguageModel::fixed("test-utils-mock", response)),
        Arc::new(MockEmbedder::new(32, SimilarityMetric::Cosine)),
        ProfilePrompt::default(),
        Arc::new(InMemoryProfileStorage::new()),
        10,
        300.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_carries_session_scope() {
        let episode = test_episode("hello", "user-1", "sess-1");
        assert_eq!(episode.content, "hello");
        assert_eq!(episode.producer_id, "user-1");
        assert_eq!(
            episode.filterable_properties.get("session_id"),
            Some(&ScalarValue::String("sess-1".to_string()))
        );
    }

    #[test]
    fn test_episodes_share_session_and_index_content() {
        let episodes = test_episodes("msg", "user-1", "sess-1", 3);
        assert_eq!(episodes.len(), 3);
        assert_eq!(episodes[1].content, "msg 1");
        assert!(episodes.iter().all(|e| e.filterable_properties.get("session_id")
            == Some(&ScalarValue::String("sess-1".to_string()))));
    }

    #[tokio::test]
    async fn declarative_memory_ingests_and_queries() {
        let memory = declarative_memory();
        memory.ingest(test_episode("remember the onions", "user-1", "sess-1")).await.unwrap();
        let outcome = memory.query("onions", &FilterableProperties::new(), 5).await.unwrap();
        assert!(!outcome.derivatives.is_empty());
    }

    #[tokio::test]
    async fn profile_memory_accepts_persona_messages() {
        let memory = profile_memory("[]");
        memory.add_persona_message("I like tea", "user-1", None, None).await.unwrap();
        assert_eq!(memory.uningested_message_count().await.unwrap(), 1);
    }
}
