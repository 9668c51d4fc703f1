//! Ingests a handful of chat episodes into an in-memory `DeclarativeMemory`
//! and runs one query against them, printing the reranked derivatives.
//!
//! Run with: `cargo run -p memory-demos --bin episode_ingest_and_query`

use std::sync::Arc;

use chrono::Utc;
use memory_core::declarative::DeclarativeMemory;
use memory_core::deriver::sentence_split::SentenceSplitDeriver;
use memory_core::embedder::{Embedder, MockEmbedder, SimilarityMetric};
use memory_core::episode::Episode;
use memory_core::mutator::identity::IdentityMutator;
use memory_core::postulator::previous_n::PreviousNPostulator;
use memory_core::reranker::embedder_similarity::EmbedderSimilarityReranker;
use memory_core::store::mem::InMemoryStore;
use memory_core::store::VectorGraphStore;
use memory_core::types::{ContentType, FilterableProperties, ScalarValue};

fn episode(content: &str, session_id: &str) -> Episode {
    let mut scope = FilterableProperties::new();
    scope.insert("session_id".to_string(), ScalarValue::String(session_id.to_string()));
    Episode::new("chat", ContentType::String, content, Utc::now(), "user-1", scope, serde_json::Value::Null)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let store: Arc<dyn VectorGraphStore> = Arc::new(InMemoryStore::new());
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(32, SimilarityMetric::Cosine));
    let memory = DeclarativeMemory::new(
        store,
        Arc::clone(&embedder),
        Arc::new(PreviousNPostulator::new(5, vec!["session_id".to_string()])),
        Arc::new(SentenceSplitDeriver),
        Arc::new(IdentityMutator),
        Arc::new(EmbedderSimilarityReranker::new(embedder)),
    );

    for content in [
        "I'm planning a trip to Lisbon next spring.",
        "I want to avoid the tourist traps and eat where locals eat.",
        "Also I need a hotel near the river, budget under 150 euros a night.",
    ] {
        memory.ingest(episode(content, "trip-planning")).await?;
    }

    let outcome = memory.query("hotel budget", &FilterableProperties::new(), 3).await?;
    println!("degraded: {}", outcome.degraded);
    for derivative in &outcome.derivatives {
        let score = outcome.score_map.get(&derivative.id).copied().unwrap_or(0.0);
        println!("{score:.4}  {}", derivative.content);
    }
    Ok(())
}
