//! Wires `memory-core`, `memory-session`, and `memory-profile` together
//! through one shared config shape, the way `memory-cli` does, and
//! exercises the full group → session → episode → persona-message flow in
//! one scenario.

use memory_session::SessionManager;
use test_utils::{declarative_memory, profile_memory, test_episode};

#[tokio::test]
async fn group_session_episode_and_profile_flow() {
    // Session manager: one group with a user and an agent, one session.
    let sessions = SessionManager::open(":memory:", "").await.unwrap();
    sessions
        .create_group("group-1", &["agent-1".to_string()], &["user-1".to_string()], serde_json::json!({}))
        .await
        .unwrap();
    let session = sessions.create_session("group-1", "session-1", serde_json::json!({})).await.unwrap();
    assert_eq!(session.user_ids, vec!["user-1".to_string()]);
    assert_eq!(session.agent_ids, vec!["agent-1".to_string()]);

    // Episodic memory: ingest a couple of turns scoped to that session.
    let memory = declarative_memory();
    memory
        .ingest(test_episode("I need a flight to Lisbon", "user-1", "session-1"))
        .await
        .unwrap();
    memory
        .ingest(test_episode("Economy is fine, window seat please", "user-1", "session-1"))
        .await
        .unwrap();

    let outcome = memory
        .query("flight", &[("session_id".to_string(), "session-1".into())].into_iter().collect(), 5)
        .await
        .unwrap();
    assert!(!outcome.derivatives.is_empty());
    assert!(!outcome.degraded);

    // Profile memory: a persona message lands in the same user's history.
    let profile = profile_memory("[]");
    profile.add_persona_message("I prefer window seats.", "user-1", None, None).await.unwrap();
    assert_eq!(profile.uningested_message_count().await.unwrap(), 1);

    sessions.delete_session("group-1", "session-1").await.unwrap();
    sessions.delete_group("group-1").await.unwrap();
}
