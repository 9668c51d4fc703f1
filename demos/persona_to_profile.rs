//! Feeds a few persona messages into an in-memory `ProfileMemory`, runs the
//! background extraction loop for a short window with a fixed-response mock
//! model, then reads back the user's profile.
//!
//! Run with: `cargo run -p memory-demos --bin persona_to_profile`

use std::sync::Arc;
use std::time::Duration;

use memory_core::embedder::{MockEmbedder, SimilarityMetric};
use memory_core::llm::MockLanguageModel;
use memory_profile::{InMemoryProfileStorage, ProfileMemory, ProfilePrompt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let extraction_response = serde_json::json!([
        {"command": "add", "tag": "preferences", "feature": "diet", "value": "vegetarian"},
        {"command": "add", "tag": "preferences", "feature": "favorite_drink", "value": "oolong tea"},
    ])
    .to_string();

    // A message_limit of 2 means the second persona message is enough to
    // mark this user due for extraction, without waiting on the time limit.
    let memory = Arc::new(
        ProfileMemory::with_config(
            Arc::new(MockLanguageModel::fixed("demo-model", extraction_response)),
            Arc::new(MockEmbedder::new(32, SimilarityMetric::Cosine)),
            ProfilePrompt::default(),
            Arc::new(InMemoryProfileStorage::new()),
            2,
            300.0,
        )
        .with_intervals(Duration::from_millis(20), Duration::from_secs(60)),
    );

    memory.add_persona_message("I don't eat meat.", "user-1", None, None).await?;
    memory.add_persona_message("I usually drink oolong tea in the afternoon.", "user-1", None, None).await?;
    println!("uningested before extraction: {}", memory.uningested_message_count().await?);

    memory.startup().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    memory.cleanup().await;

    println!("uningested after extraction: {}", memory.uningested_message_count().await?);
    let profile = memory.get_user_profile("user-1", None).await?;
    println!("profile after extraction: {profile:?}");

    Ok(())
}
