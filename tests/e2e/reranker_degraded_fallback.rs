//! Spec.md §8 scenario 6: a reranker failure degrades the query outcome to
//! raw similarity order rather than failing the whole query.

use std::sync::Arc;

use async_trait::async_trait;
use memory_core::declarative::DeclarativeMemory;
use memory_core::deriver::sentence_split::SentenceSplitDeriver;
use memory_core::embedder::{Embedder, MockEmbedder, SimilarityMetric};
use memory_core::error::{Error, Result};
use memory_core::mutator::identity::IdentityMutator;
use memory_core::postulator::previous_n::PreviousNPostulator;
use memory_core::reranker::Reranker;
use memory_core::store::mem::InMemoryStore;
use memory_core::store::VectorGraphStore;
use memory_core::types::FilterableProperties;
use test_utils::test_episode;

struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn score(&self, _query: &str, _candidates: &[String]) -> Result<Vec<f64>> {
        Err(Error::ExternalServiceAPIError("reranker unavailable".to_string()))
    }
}

#[tokio::test]
async fn failing_reranker_degrades_instead_of_failing_the_query() {
    let store: Arc<dyn VectorGraphStore> = Arc::new(InMemoryStore::new());
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(32, SimilarityMetric::Cosine));
    let memory = DeclarativeMemory::new(
        store,
        embedder,
        Arc::new(PreviousNPostulator::new(5, vec!["session_id".to_string()])),
        Arc::new(SentenceSplitDeriver),
        Arc::new(IdentityMutator),
        Arc::new(FailingReranker),
    );

    memory.ingest(test_episode("the cat sat on the mat", "user-1", "sess-1")).await.unwrap();

    let outcome = memory.query("cat", &FilterableProperties::new(), 5).await.unwrap();
    assert!(outcome.degraded);
    assert!(!outcome.derivatives.is_empty());
}
