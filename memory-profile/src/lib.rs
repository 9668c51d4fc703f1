//! # Memory Profile
//!
//! Profile memory (spec.md §4.8): a persona-message history log, an
//! asynchronous per-user extraction/consolidation pipeline driven by an
//! injected [`LanguageModel`] and [`Embedder`], and a semantically
//! searchable profile store.

pub mod prompts;
pub mod storage;
pub mod tracker;
pub mod types;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use memory_core::embedder::Embedder;
use memory_core::error::{Error, Result};
use memory_core::llm::LanguageModel;
use memory_core::util;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use prompts::ProfilePrompt;
pub use storage::{InMemoryProfileStorage, ProfileStorage};
pub use tracker::{ProfileUpdateTracker, ProfileUpdateTrackerManager};
pub use types::{HistoryEntry, Isolations, ProfileCommand, ProfileEntry, ProfileValue, SingleOrList};

/// Default interval between tracker sweeps.
pub const PROFILE_UPDATE_TRACKER_INTERVAL_SEC: u64 = 30;
/// Default interval between consolidation passes.
pub const PROFILE_UPDATE_INTERVAL_SEC: u64 = 300;
/// Default per-user message-count threshold before extraction is due.
pub const PROFILE_UPDATE_MESSAGE_LIMIT: u32 = 10;
/// Default uningested-history window read per extraction job.
const EXTRACTION_HISTORY_WINDOW: usize = 20;
/// Default similarity floor for matching an `update`/`delete` command to
/// an existing entry when no exact (tag, feature, value) match exists.
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;
/// Default entry-count threshold above which a (tag, feature) group is
/// considered for consolidation.
const DEFAULT_CONSOLIDATION_THRESHOLD: usize = 10;
/// Caps how many per-user extraction jobs run concurrently.
const MAX_CONCURRENT_EXTRACTIONS: usize = 4;

fn empty_isolations() -> Isolations {
    Isolations::new()
}

/// Profile memory: ingests persona messages, maintains the per-user
/// profile through background LLM-driven extraction and consolidation,
/// and answers profile reads and semantic searches.
pub struct ProfileMemory {
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    prompt: ProfilePrompt,
    storage: Arc<dyn ProfileStorage>,
    tracker_manager: Arc<ProfileUpdateTrackerManager>,
    extraction_semaphore: Arc<Semaphore>,
    /// Per-user critical-section locks guarding `run_extraction`, so an
    /// overrunning job can never race a second sweep's job for the same
    /// user (spec.md §5: at most one concurrent extraction per user).
    extraction_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    history_window: usize,
    similarity_threshold: f32,
    consolidation_threshold: usize,
    tracker_interval: Duration,
    update_interval: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ProfileMemory {
    /// Construct a profile memory with default thresholds and intervals.
    #[must_use]
    pub fn new(
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        prompt: ProfilePrompt,
        storage: Arc<dyn ProfileStorage>,
    ) -> Self {
        Self::with_config(
            model,
            embedder,
            prompt,
            storage,
            PROFILE_UPDATE_MESSAGE_LIMIT,
            PROFILE_UPDATE_TRACKER_INTERVAL_SEC as f64,
        )
    }

    /// Construct a profile memory with an explicit tracker message limit
    /// and time limit (seconds); all other thresholds keep their defaults.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn with_config(
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        prompt: ProfilePrompt,
        storage: Arc<dyn ProfileStorage>,
        message_limit: u32,
        time_limit_sec: f64,
    ) -> Self {
        Self {
            model,
            embedder,
            prompt,
            storage,
            tracker_manager: Arc::new(ProfileUpdateTrackerManager::new(message_limit, time_limit_sec)),
            extraction_semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_EXTRACTIONS)),
            extraction_locks: Mutex::new(HashMap::new()),
            history_window: EXTRACTION_HISTORY_WINDOW,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            consolidation_threshold: DEFAULT_CONSOLIDATION_THRESHOLD,
            tracker_interval: Duration::from_secs(PROFILE_UPDATE_TRACKER_INTERVAL_SEC),
            update_interval: Duration::from_secs(PROFILE_UPDATE_INTERVAL_SEC),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Override the tracker-sweep and consolidation-pass intervals. Intended
    /// for tests; production callers should keep the defaults.
    #[must_use]
    pub fn with_intervals(mut self, tracker_interval: Duration, update_interval: Duration) -> Self {
        self.tracker_interval = tracker_interval;
        self.update_interval = update_interval;
        self
    }

    /// Start the background tracker-sweep and consolidation loops. Safe to
    /// call once; calling again before `cleanup` leaks the prior tasks.
    pub async fn startup(self: &Arc<Self>) {
        let tracker_task = {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(this.tracker_interval);
                loop {
                    ticker.tick().await;
                    this.run_tracker_sweep().await;
                }
            })
        };
        let consolidation_task = {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(this.update_interval);
                loop {
                    ticker.tick().await;
                    this.run_consolidation_sweep().await;
                }
            })
        };
        self.tasks.lock().await.extend([tracker_task, consolidation_task]);
    }

    /// Abort the background loops. In-flight jobs are abandoned; their
    /// history entries remain unmarked and retry on the next `startup`.
    pub async fn cleanup(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }

    async fn run_tracker_sweep(self: &Arc<Self>) {
        for user_id in self.tracker_manager.get_users_to_update().await {
            let this = Arc::clone(self);
            let permit = Arc::clone(&self.extraction_semaphore);
            tokio::spawn(async move {
                let _permit = permit.acquire_owned().await;
                if let Err(err) = this.run_extraction(&user_id).await {
                    tracing::warn!(error = %err, user_id, "profile extraction job failed, will retry next cycle");
                }
            });
        }
    }

    async fn run_consolidation_sweep(self: &Arc<Self>) {
        let sections = match self.storage.large_profile_sections(self.consolidation_threshold).await {
            Ok(sections) => sections,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list large profile sections");
                return;
            }
        };
        for (user_id, isolations, tag, feature, entries) in sections {
            if let Err(err) = self.run_consolidation(&user_id, &isolations, &tag, &feature, entries).await {
                tracing::warn!(error = %err, user_id, tag, feature, "profile consolidation job failed");
            }
        }
    }

    /// The lock guarding `user_id`'s extraction critical section, creating
    /// one on first use.
    async fn user_extraction_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.extraction_locks.lock().await;
        Arc::clone(locks.entry(user_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))))
    }

    async fn run_extraction(&self, user_id: &str) -> Result<()> {
        let lock = self.user_extraction_lock(user_id).await;
        util::locked(&*lock, self.run_extraction_locked(user_id)).await
    }

    async fn run_extraction_locked(&self, user_id: &str) -> Result<()> {
        let isolations = empty_isolations();
        let history = self.storage.uningested_history(user_id, &isolations, self.history_window).await?;
        if history.is_empty() {
            return Ok(());
        }
        let citation_ids: Vec<Uuid> = history.iter().map(|h| h.id).collect();
        let contents: Vec<String> = history.iter().map(|h| h.content.clone()).rev().collect();

        let prompt_text = self.prompt.update_prompt(&contents);
        let generation = self.model.generate(&prompt_text).await?;

        let commands: BTreeMap<String, ProfileCommand> = serde_json::from_str(&generation.text)
            .map_err(|err| Error::InvalidArgument(format!("extraction response was not a valid command map: {err}")))?;

        for command in commands.into_values() {
            self.apply_command(user_id, &isolations, command, &citation_ids).await?;
        }

        self.storage.mark_ingested(&citation_ids).await?;
        Ok(())
    }

    async fn apply_command(
        &self,
        user_id: &str,
        isolations: &Isolations,
        command: ProfileCommand,
        citation_ids: &[Uuid],
    ) -> Result<()> {
        match command {
            ProfileCommand::Add { feature, value, tag, .. } => {
                let embedding = self.embedder.embed(&format!("{feature}: {value}")).await?;
                self.storage
                    .add_profile_entry(user_id, &tag, &feature, &value, embedding, isolations, citation_ids.to_vec())
                    .await?;
            }
            ProfileCommand::Update { feature, value, tag, .. } => {
                let embedding = self.embedder.embed(&format!("{feature}: {value}")).await?;
                let existing = self
                    .storage
                    .find_matching_entry(user_id, &tag, &feature, &value, &embedding, isolations, self.similarity_threshold)
                    .await?;
                match existing {
                    Some(entry) => {
                        self.storage.update_profile_entry(entry.id, &value, embedding, citation_ids.to_vec()).await?;
                    }
                    None => {
                        self.storage
                            .add_profile_entry(user_id, &tag, &feature, &value, embedding, isolations, citation_ids.to_vec())
                            .await?;
                    }
                }
            }
            ProfileCommand::Delete { feature, value, tag, .. } => {
                let embedding = self.embedder.embed(&format!("{feature}: {value}")).await?;
                let existing = self
                    .storage
                    .find_matching_entry(user_id, &tag, &feature, &value, &embedding, isolations, self.similarity_threshold)
                    .await?;
                if let Some(entry) = existing {
                    self.storage.delete_profile_entry(entry.id).await?;
                }
            }
        }
        Ok(())
    }

    async fn run_consolidation(
        &self,
        user_id: &str,
        isolations: &Isolations,
        tag: &str,
        feature: &str,
        entries: Vec<ProfileEntry>,
    ) -> Result<()> {
        let values: Vec<String> = entries.iter().map(|e| e.value.clone()).collect();
        let prompt_text = self.prompt.consolidation_prompt(&values);
        let generation = self.model.generate(&prompt_text).await?;

        let reduced: Vec<String> = match serde_json::from_str(&generation.text) {
            Ok(reduced) => reduced,
            Err(err) => {
                tracing::warn!(error = %err, user_id, tag, feature, "consolidation response was not a JSON string array");
                return Ok(());
            }
        };

        let mut merged_citations: Vec<Uuid> = entries.iter().flat_map(|e| e.citations.clone()).collect();
        merged_citations.sort_unstable();
        merged_citations.dedup();

        let mut replacements = Vec::with_capacity(reduced.len());
        for value in reduced {
            let embedding = self.embedder.embed(&format!("{feature}: {value}")).await?;
            replacements.push(ProfileEntry {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                isolations: isolations.clone(),
                tag: tag.to_string(),
                feature: feature.to_string(),
                value,
                embedding,
                citations: merged_citations.clone(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            });
        }

        let remove: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        self.storage.replace_entries(&remove, replacements).await
    }

    /// Ingest a persona message: prepend a speaker prefix if
    /// `metadata["speaker"]` is set, append to the history log, and mark the
    /// user for extraction. Returns immediately; extraction is out-of-band.
    pub async fn add_persona_message(
        &self,
        content: &str,
        user_id: &str,
        metadata: Option<serde_json::Value>,
        isolations: Option<Isolations>,
    ) -> Result<()> {
        let metadata = metadata.unwrap_or(serde_json::Value::Null);
        let isolations = isolations.unwrap_or_else(empty_isolations);

        let stored_content = match metadata.get("speaker").and_then(|v| v.as_str()) {
            Some(speaker) => format!("{speaker} sends '{content}'"),
            None => content.to_string(),
        };

        self.storage.add_history(user_id, &stored_content, metadata, &isolations).await?;
        self.tracker_manager.mark_update(user_id).await;
        Ok(())
    }

    /// The full `{tag -> {feature -> value(s)}}` profile for a user.
    pub async fn get_user_profile(
        &self,
        user_id: &str,
        isolations: Option<Isolations>,
    ) -> Result<BTreeMap<String, BTreeMap<String, SingleOrList<ProfileValue>>>> {
        self.storage.get_profile(user_id, &isolations.unwrap_or_else(empty_isolations)).await
    }

    /// Semantic profile search: embed `query`, rank entries by cosine
    /// similarity, truncate to `k`, at or above `min_similarity`.
    #[allow(clippy::too_many_arguments)]
    pub async fn semantic_search(
        &self,
        user_id: &str,
        query: &str,
        k: usize,
        min_similarity: f32,
        isolations: Option<Isolations>,
        include_citations: bool,
    ) -> Result<Vec<ProfileValue>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("semantic_search query must not be empty".to_string()));
        }
        let embedding = self.embedder.embed(query).await?;
        self.storage
            .semantic_search(user_id, &embedding, k, min_similarity, &isolations.unwrap_or_else(empty_isolations), include_citations)
            .await
    }

    /// Manually insert one profile entry, bypassing extraction.
    pub async fn add_new_profile(
        &self,
        user_id: &str,
        feature: &str,
        value: &str,
        tag: &str,
        isolations: Option<Isolations>,
    ) -> Result<()> {
        let embedding = self.embedder.embed(&format!("{feature}: {value}")).await?;
        self.storage
            .add_profile_entry(user_id, tag, feature, value, embedding, &isolations.unwrap_or_else(empty_isolations), Vec::new())
            .await?;
        Ok(())
    }

    /// Delete every entry for (user, tag, feature).
    pub async fn delete_user_profile_feature(
        &self,
        user_id: &str,
        feature: &str,
        tag: &str,
        isolations: Option<Isolations>,
    ) -> Result<()> {
        self.storage
            .delete_profile_feature(user_id, tag, feature, &isolations.unwrap_or_else(empty_isolations))
            .await
    }

    /// Delete every entry for a user's profile within `isolations`.
    pub async fn delete_user_profile(&self, user_id: &str, isolations: Option<Isolations>) -> Result<()> {
        self.storage.delete_profile(user_id, &isolations.unwrap_or_else(empty_isolations)).await
    }

    /// Total unconsumed history entries across every user. Primarily useful
    /// in tests to observe the extraction backlog draining to zero.
    pub async fn uningested_message_count(&self) -> Result<usize> {
        self.storage.total_uningested_count().await
    }

    /// Wipe all history and profile entries across every user.
    pub async fn delete_all(&self) -> Result<()> {
        self.storage.delete_all().await
    }
}
