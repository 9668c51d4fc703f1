//! The profile store: an append-only history log plus a (user, isolations,
//! tag, feature) -> value knowledge base (spec.md §4.8, §9).
//!
//! `InMemoryProfileStorage` is the reference implementation, mirroring
//! `memory_core::store::mem::InMemoryStore`'s single-`RwLock`,
//! linear-scan-over-a-small-table idiom. A durable backend would implement
//! the same trait over the SQL schema named in spec.md §6.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use memory_core::error::Result;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{HistoryEntry, Isolations, ProfileEntry, ProfileValue, SingleOrList};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Storage backend for profile history and entries.
#[async_trait]
pub trait ProfileStorage: Send + Sync {
    /// Append one history entry for `user_id` with the current timestamp.
    async fn add_history(
        &self,
        user_id: &str,
        content: &str,
        metadata: serde_json::Value,
        isolations: &Isolations,
    ) -> Result<HistoryEntry>;

    /// The last `k` not-yet-consumed history entries for `user_id` within
    /// `isolations`, most recent first.
    async fn uningested_history(
        &self,
        user_id: &str,
        isolations: &Isolations,
        k: usize,
    ) -> Result<Vec<HistoryEntry>>;

    /// Mark the given history entries as consumed by an extraction job.
    async fn mark_ingested(&self, ids: &[Uuid]) -> Result<()>;

    /// Total unconsumed history entries across every user, used by tests
    /// and operators to observe extraction backlog draining.
    async fn total_uningested_count(&self) -> Result<usize>;

    /// Resolve history entry IDs to their stored content, in input order.
    async fn resolve_citations(&self, ids: &[Uuid]) -> Result<Vec<String>>;

    /// Insert a new profile entry.
    #[allow(clippy::too_many_arguments)]
    async fn add_profile_entry(
        &self,
        user_id: &str,
        tag: &str,
        feature: &str,
        value: &str,
        embedding: Vec<f32>,
        isolations: &Isolations,
        citations: Vec<Uuid>,
    ) -> Result<ProfileEntry>;

    /// Locate an entry by exact (tag, feature, value) match, or by
    /// embedding similarity above `similarity_threshold` if no exact match
    /// exists.
    #[allow(clippy::too_many_arguments)]
    async fn find_matching_entry(
        &self,
        user_id: &str,
        tag: &str,
        feature: &str,
        value: &str,
        embedding: &[f32],
        isolations: &Isolations,
        similarity_threshold: f32,
    ) -> Result<Option<ProfileEntry>>;

    /// Replace an entry's value, embedding, and citations in place.
    async fn update_profile_entry(
        &self,
        id: Uuid,
        value: &str,
        embedding: Vec<f32>,
        citations: Vec<Uuid>,
    ) -> Result<()>;

    /// Remove an entry by ID.
    async fn delete_profile_entry(&self, id: Uuid) -> Result<()>;

    /// The full `{tag -> {feature -> value(s)}}` profile for a user.
    async fn get_profile(
        &self,
        user_id: &str,
        isolations: &Isolations,
    ) -> Result<BTreeMap<String, BTreeMap<String, SingleOrList<ProfileValue>>>>;

    /// Delete every entry for (user, tag, feature).
    async fn delete_profile_feature(
        &self,
        user_id: &str,
        tag: &str,
        feature: &str,
        isolations: &Isolations,
    ) -> Result<()>;

    /// Delete every entry for (user, isolations).
    async fn delete_profile(&self, user_id: &str, isolations: &Isolations) -> Result<()>;

    /// Entries ranked by cosine similarity to `query_embedding`, filtered
    /// to those at or above `min_similarity`, truncated to `k`.
    #[allow(clippy::too_many_arguments)]
    async fn semantic_search(
        &self,
        user_id: &str,
        query_embedding: &[f32],
        k: usize,
        min_similarity: f32,
        isolations: &Isolations,
        include_citations: bool,
    ) -> Result<Vec<ProfileValue>>;

    /// Groups of entries for (user, isolations, tag, feature) whose size
    /// exceeds `threshold`, candidates for consolidation.
    #[allow(clippy::type_complexity)]
    async fn large_profile_sections(
        &self,
        threshold: usize,
    ) -> Result<Vec<(String, Isolations, String, String, Vec<ProfileEntry>)>>;

    /// Replace a group of entries (by ID) with a consolidated replacement
    /// set, used by the consolidation job.
    async fn replace_entries(&self, remove: &[Uuid], add: Vec<ProfileEntry>) -> Result<()>;

    /// Wipe all history and profile entries. Used by test teardown and
    /// `delete_user_profile`'s whole-store variant.
    async fn delete_all(&self) -> Result<()>;
}

#[derive(Default)]
struct State {
    history: Vec<HistoryEntry>,
    entries: Vec<ProfileEntry>,
}

/// The reference `ProfileStorage`: an in-memory, non-durable store guarded
/// by a single `RwLock` over two flat vectors.
#[derive(Default)]
pub struct InMemoryProfileStorage {
    state: RwLock<State>,
}

impl InMemoryProfileStorage {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn isolations_match(a: &Isolations, b: &Isolations) -> bool {
    a == b
}

#[async_trait]
impl ProfileStorage for InMemoryProfileStorage {
    async fn add_history(
        &self,
        user_id: &str,
        content: &str,
        metadata: serde_json::Value,
        isolations: &Isolations,
    ) -> Result<HistoryEntry> {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            metadata,
            isolations: isolations.clone(),
            timestamp: Utc::now().timestamp_millis(),
            consumed: false,
        };
        self.state.write().history.push(entry.clone());
        Ok(entry)
    }

    async fn uningested_history(
        &self,
        user_id: &str,
        isolations: &Isolations,
        k: usize,
    ) -> Result<Vec<HistoryEntry>> {
        let state = self.state.read();
        let mut matches: Vec<HistoryEntry> = state
            .history
            .iter()
            .filter(|h| h.user_id == user_id && !h.consumed && isolations_match(&h.isolations, isolations))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(k);
        Ok(matches)
    }

    async fn mark_ingested(&self, ids: &[Uuid]) -> Result<()> {
        let mut state = self.state.write();
        for entry in &mut state.history {
            if ids.contains(&entry.id) {
                entry.consumed = true;
            }
        }
        Ok(())
    }

    async fn total_uningested_count(&self) -> Result<usize> {
        Ok(self.state.read().history.iter().filter(|h| !h.consumed).count())
    }

    async fn resolve_citations(&self, ids: &[Uuid]) -> Result<Vec<String>> {
        let state = self.state.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.history.iter().find(|h| h.id == *id).map(|h| h.content.clone()))
            .collect())
    }

    async fn add_profile_entry(
        &self,
        user_id: &str,
        tag: &str,
        feature: &str,
        value: &str,
        embedding: Vec<f32>,
        isolations: &Isolations,
        citations: Vec<Uuid>,
    ) -> Result<ProfileEntry> {
        let entry = ProfileEntry {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            isolations: isolations.clone(),
            tag: tag.to_string(),
            feature: feature.to_string(),
            value: value.to_string(),
            embedding,
            citations,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.state.write().entries.push(entry.clone());
        Ok(entry)
    }

    async fn find_matching_entry(
        &self,
        user_id: &str,
        tag: &str,
        feature: &str,
        value: &str,
        embedding: &[f32],
        isolations: &Isolations,
        similarity_threshold: f32,
    ) -> Result<Option<ProfileEntry>> {
        let state = self.state.read();
        let candidates: Vec<&ProfileEntry> = state
            .entries
            .iter()
            .filter(|e| {
                e.user_id == user_id
                    && e.tag == tag
                    && e.feature == feature
                    && isolations_match(&e.isolations, isolations)
            })
            .collect();

        if let Some(exact) = candidates.iter().find(|e| e.value == value) {
            return Ok(Some((*exact).clone()));
        }

        Ok(candidates
            .into_iter()
            .map(|e| (e, cosine(&e.embedding, embedding)))
            .filter(|(_, sim)| *sim >= similarity_threshold)
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(e, _)| e.clone()))
    }

    async fn update_profile_entry(
        &self,
        id: Uuid,
        value: &str,
        embedding: Vec<f32>,
        citations: Vec<Uuid>,
    ) -> Result<()> {
        let mut state = self.state.write();
        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == id) {
            entry.value = value.to_string();
            entry.embedding = embedding;
            entry.citations = citations;
            entry.timestamp = Utc::now().timestamp_millis();
        }
        Ok(())
    }

    async fn delete_profile_entry(&self, id: Uuid) -> Result<()> {
        self.state.write().entries.retain(|e| e.id != id);
        Ok(())
    }

    async fn get_profile(
        &self,
        user_id: &str,
        isolations: &Isolations,
    ) -> Result<BTreeMap<String, BTreeMap<String, SingleOrList<ProfileValue>>>> {
        let state = self.state.read();
        let mut by_tag_feature: BTreeMap<String, BTreeMap<String, Vec<ProfileValue>>> = BTreeMap::new();

        for entry in state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && isolations_match(&e.isolations, isolations))
        {
            by_tag_feature
                .entry(entry.tag.clone())
                .or_default()
                .entry(entry.feature.clone())
                .or_default()
                .push(ProfileValue::bare(entry.value.clone()));
        }

        Ok(by_tag_feature
            .into_iter()
            .map(|(tag, features)| {
                let features = features
                    .into_iter()
                    .map(|(feature, values)| (feature, SingleOrList::from_vec(values)))
                    .collect();
                (tag, features)
            })
            .collect())
    }

    async fn delete_profile_feature(
        &self,
        user_id: &str,
        tag: &str,
        feature: &str,
        isolations: &Isolations,
    ) -> Result<()> {
        self.state.write().entries.retain(|e| {
            !(e.user_id == user_id
                && e.tag == tag
                && e.feature == feature
                && isolations_match(&e.isolations, isolations))
        });
        Ok(())
    }

    async fn delete_profile(&self, user_id: &str, isolations: &Isolations) -> Result<()> {
        self.state
            .write()
            .entries
            .retain(|e| !(e.user_id == user_id && isolations_match(&e.isolations, isolations)));
        Ok(())
    }

    async fn semantic_search(
        &self,
        user_id: &str,
        query_embedding: &[f32],
        k: usize,
        min_similarity: f32,
        isolations: &Isolations,
        include_citations: bool,
    ) -> Result<Vec<ProfileValue>> {
        let state = self.state.read();
        let mut scored: Vec<(f32, &ProfileEntry)> = state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && isolations_match(&e.isolations, isolations))
            .map(|e| (cosine(&e.embedding, query_embedding), e))
            .filter(|(sim, _)| *sim >= min_similarity)
            .collect();
        scored.sort_by(|(a, _), (b, _)| b.total_cmp(a));
        scored.truncate(k);

        let mut out = Vec::with_capacity(scored.len());
        for (sim, entry) in scored {
            let citations = if include_citations {
                let ids: Vec<String> = entry
                    .citations
                    .iter()
                    .filter_map(|id| state.history.iter().find(|h| h.id == *id).map(|h| h.content.clone()))
                    .collect();
                Some(ids)
            } else {
                None
            };
            out.push(ProfileValue {
                value: entry.value.clone(),
                citations,
                similarity: Some(sim),
            });
        }
        Ok(out)
    }

    async fn large_profile_sections(
        &self,
        threshold: usize,
    ) -> Result<Vec<(String, Isolations, String, String, Vec<ProfileEntry>)>> {
        let state = self.state.read();
        type Key = (String, Isolations, String, String);
        let mut groups: BTreeMap<Key, Vec<ProfileEntry>> = BTreeMap::new();
        for entry in &state.entries {
            let key = (entry.user_id.clone(), entry.isolations.clone(), entry.tag.clone(), entry.feature.clone());
            groups.entry(key).or_default().push(entry.clone());
        }
        Ok(groups
            .into_iter()
            .filter(|(_, entries)| entries.len() > threshold)
            .map(|((user_id, isolations, tag, feature), entries)| (user_id, isolations, tag, feature, entries))
            .collect())
    }

    async fn replace_entries(&self, remove: &[Uuid], add: Vec<ProfileEntry>) -> Result<()> {
        let mut state = self.state.write();
        state.entries.retain(|e| !remove.contains(&e.id));
        state.entries.extend(add);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut state = self.state.write();
        state.history.clear();
        state.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_isolations() -> Isolations {
        Isolations::new()
    }

    #[tokio::test]
    async fn add_get_and_delete_profile_entries() {
        let storage = InMemoryProfileStorage::new();
        storage
            .add_profile_entry("user", "food", "likes", "pizza", vec![1.0, 0.0], &no_isolations(), vec![])
            .await
            .unwrap();
        storage
            .add_profile_entry("user", "food", "likes", "sushi", vec![1.0, 0.0], &no_isolations(), vec![])
            .await
            .unwrap();

        let profile = storage.get_profile("user", &no_isolations()).await.unwrap();
        let likes = &profile["food"]["likes"];
        match likes {
            SingleOrList::List(values) => {
                let names: std::collections::HashSet<_> = values.iter().map(|v| v.value.clone()).collect();
                assert_eq!(names, std::collections::HashSet::from(["pizza".to_string(), "sushi".to_string()]));
            }
            SingleOrList::Single(_) => panic!("expected a list of two values"),
        }

        storage.delete_profile_feature("user", "food", "likes", &no_isolations()).await.unwrap();
        let profile = storage.get_profile("user", &no_isolations()).await.unwrap();
        assert!(profile.is_empty());
    }

    #[tokio::test]
    async fn isolations_partition_profiles() {
        let storage = InMemoryProfileStorage::new();
        let mut tenant_a = Isolations::new();
        tenant_a.insert("tenant".to_string(), "A".to_string());

        storage
            .add_profile_entry("user", "prefs", "color", "blue", vec![1.0, 0.0], &tenant_a, vec![])
            .await
            .unwrap();

        assert!(storage.get_profile("user", &no_isolations()).await.unwrap().is_empty());
        let tenant_profile = storage.get_profile("user", &tenant_a).await.unwrap();
        assert_eq!(tenant_profile["prefs"]["color"], SingleOrList::Single(ProfileValue::bare("blue")));
    }

    #[tokio::test]
    async fn semantic_search_orders_by_similarity_and_resolves_citations() {
        let storage = InMemoryProfileStorage::new();
        let history = storage
            .add_history("user", "context note", serde_json::json!({}), &no_isolations())
            .await
            .unwrap();

        storage
            .add_profile_entry("user", "facts", "topic", "ai", vec![1.0, 0.0], &no_isolations(), vec![history.id])
            .await
            .unwrap();
        storage
            .add_profile_entry("user", "facts", "topic", "music", vec![0.0, 1.0], &no_isolations(), vec![])
            .await
            .unwrap();

        let results = storage
            .semantic_search("user", &[1.0, 0.1], 10, -1.0, &no_isolations(), true)
            .await
            .unwrap();
        assert_eq!(results.iter().map(|r| r.value.clone()).collect::<Vec<_>>(), vec!["ai", "music"]);
        assert!(results[0].similarity.unwrap() > results[1].similarity.unwrap());
        assert_eq!(results[0].citations.as_ref().unwrap(), &vec!["context note".to_string()]);
    }

    #[tokio::test]
    async fn uningested_history_respects_k_and_consumption() {
        let storage = InMemoryProfileStorage::new();
        for content in ["first", "second", "third"] {
            storage.add_history("user", content, serde_json::json!({}), &no_isolations()).await.unwrap();
        }
        let last_two = storage.uningested_history("user", &no_isolations(), 2).await.unwrap();
        assert_eq!(last_two.len(), 2);

        let ids: Vec<Uuid> = last_two.iter().map(|h| h.id).collect();
        storage.mark_ingested(&ids).await.unwrap();

        let remaining = storage.uningested_history("user", &no_isolations(), 5).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(storage.total_uningested_count().await.unwrap(), 1);
    }
}
