//! Declarative Memory: the central orchestrator for episode ingestion and
//! hybrid-ranked retrieval (spec.md §4.5).

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::deriver::DerivativeDeriver;
use crate::derivative::Derivative;
use crate::embedder::Embedder;
use crate::episode::{Episode, EpisodeCluster};
use crate::error::{Error, Result};
use crate::mutator::DerivativeMutator;
use crate::postulator::RelatedEpisodePostulator;
use crate::reranker::Reranker;
use crate::store::{Direction, VectorGraphStore};
use crate::types::{FilterableProperties, ScalarValue};

/// How many candidates `query` over-fetches per requested result, before
/// reranking narrows back down to `limit` (spec.md §4.5 step 2).
const DEFAULT_OVERFETCH_FACTOR: usize = 4;

const LABEL_EPISODE: &str = "Episode";
const LABEL_DERIVATIVE: &str = "Derivative";
const EDGE_DERIVED_FROM: &str = "DERIVED_FROM";
const EDGE_FOLLOWS: &str = "FOLLOWS";

/// Result of [`DeclarativeMemory::query`]: ranked derivatives, their
/// deduplicated source episodes, and a per-derivative score map.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    /// Top `limit` derivatives, descending by reranked score.
    pub derivatives: Vec<Derivative>,
    /// Deduplicated episodes reachable from the returned derivatives via
    /// `DERIVED_FROM`.
    pub episodes: Vec<Episode>,
    /// Best score observed for each returned derivative's ID.
    pub score_map: HashMap<Uuid, f64>,
    /// Set when the reranker failed and the response fell back to raw
    /// similarity order (spec.md §8 scenario 6).
    pub degraded: bool,
}

/// Orchestrates episode ingestion (episode → cluster → derivatives →
/// mutations → persisted nodes/edges) and querying (embed → retrieve →
/// rerank → assemble).
pub struct DeclarativeMemory {
    store: Arc<dyn VectorGraphStore>,
    embedder: Arc<dyn Embedder>,
    postulator: Arc<dyn RelatedEpisodePostulator>,
    deriver: Arc<dyn DerivativeDeriver>,
    mutator: Arc<dyn DerivativeMutator>,
    reranker: Arc<dyn Reranker>,
    overfetch_factor: usize,
}

impl DeclarativeMemory {
    /// Construct a declarative memory from its injected components.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn VectorGraphStore>,
        embedder: Arc<dyn Embedder>,
        postulator: Arc<dyn RelatedEpisodePostulator>,
        deriver: Arc<dyn DerivativeDeriver>,
        mutator: Arc<dyn DerivativeMutator>,
        reranker: Arc<dyn Reranker>,
    ) -> Self {
        Self {
            store,
            embedder,
            postulator,
            deriver,
            mutator,
            reranker,
            overfetch_factor: DEFAULT_OVERFETCH_FACTOR,
        }
    }

    /// Override the default candidate over-fetch multiplier used by `query`.
    #[must_use]
    pub fn with_overfetch_factor(mut self, factor: usize) -> Self {
        self.overfetch_factor = factor.max(1);
        self
    }

    /// Ingest one episode end to end (spec.md §4.5 steps 1-7).
    ///
    /// The episode-write step (1) must succeed before any derivation is
    /// attempted. If later steps fail, the episode remains persisted with
    /// `derivations_complete = false`; [`DeclarativeMemory::replay_incomplete`]
    /// re-runs steps 2-6 for it.
    pub async fn ingest(&self, mut episode: Episode) -> Result<()> {
        let embedding = if episode.content_type.is_textual() {
            Some(self.embedder.embed(&episode.content).await?)
        } else {
            None
        };

        self.store
            .add_node(
                episode.id,
                &[LABEL_EPISODE.to_string()],
                episode.to_node_properties(),
                Some(episode.user_metadata.clone()),
                embedding,
            )
            .await?;

        self.derive_and_persist(&mut episode).await
    }

    /// Steps 2-6 of ingest, replayable for any episode whose
    /// `derivations_complete` flag is still `false`.
    async fn derive_and_persist(&self, episode: &mut Episode) -> Result<()> {
        // Postulators return related episodes newest-first (e.g. previous-N);
        // `EpisodeCluster` expects members ordered earliest-first, while the
        // `FOLLOWS` edges added below preserve the postulator's own order.
        let related = self
            .postulator
            .postulate(episode, self.store.as_ref())
            .await?;

        let mut members: Vec<Episode> = related.iter().rev().cloned().collect();
        members.push(episode.clone());
        let cluster = EpisodeCluster::new(members);

        let seeds = self.deriver.derive(&cluster).await?;
        let mut finals = Vec::with_capacity(seeds.len());
        for seed in &seeds {
            finals.extend(self.mutator.mutate(seed, &cluster).await?);
        }

        let contents: Vec<String> = finals.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&contents).await?;

        let embedded: Vec<Derivative> = finals
            .into_iter()
            .zip(embeddings)
            .map(|(derivative, embedding)| derivative.with_embedding(embedding))
            .collect();

        for derivative in &embedded {
            self.store
                .add_node(
                    derivative.id,
                    &[LABEL_DERIVATIVE.to_string()],
                    derivative.to_node_properties(),
                    Some(derivative.user_metadata.clone()),
                    derivative.embedding.clone(),
                )
                .await?;
            for member in &cluster.episodes {
                self.store
                    .add_edge(derivative.id, EDGE_DERIVED_FROM, member.id, None)
                    .await?;
            }
        }

        for related_episode in &related {
            self.store
                .add_edge(episode.id, EDGE_FOLLOWS, related_episode.id, None)
                .await?;
        }

        episode.derivations_complete = true;
        self.store
            .update_node(
                episode.id,
                episode.to_node_properties(),
                Some(episode.user_metadata.clone()),
                None,
            )
            .await?;

        Ok(())
    }

    /// Re-runs derivation for every episode whose `derivations_complete`
    /// flag is `false`. Each episode is retried independently; one
    /// episode's failure does not block the rest of the sweep.
    ///
    /// Returns the number of episodes successfully replayed.
    pub async fn replay_incomplete(&self) -> Result<usize> {
        let mut pending = FilterableProperties::new();
        pending.insert("__derivations_complete".to_string(), ScalarValue::Bool(false));

        let nodes = self
            .store
            .search_directional_nodes(
                &[LABEL_EPISODE.to_string()],
                &pending,
                "timestamp",
                Direction::Ascending,
                None,
                usize::MAX,
            )
            .await?;

        let mut replayed = 0;
        for node in nodes {
            let mut episode = match Episode::try_from_node(&node) {
                Ok(episode) => episode,
                Err(err) => {
                    tracing::warn!(error = %err, node_id = %node.id, "skipping malformed episode node during replay");
                    continue;
                }
            };
            match self.derive_and_persist(&mut episode).await {
                Ok(()) => replayed += 1,
                Err(err) => {
                    tracing::warn!(error = %err, episode_id = %episode.id, "replay failed, will retry next sweep");
                }
            }
        }
        Ok(replayed)
    }

    /// Spawn a background task that calls [`DeclarativeMemory::replay_incomplete`]
    /// on a fixed interval, logging (never panicking) on failure.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = this.replay_incomplete().await {
                    tracing::warn!(error = %err, "replay sweep failed, will retry next tick");
                }
            }
        })
    }

    /// Embed → over-fetch similarity search → traverse `DERIVED_FROM` →
    /// rerank → top-`limit` assembly (spec.md §4.5 query steps 1-5).
    pub async fn query(
        &self,
        query_text: &str,
        scope_filter: &FilterableProperties,
        limit: usize,
    ) -> Result<QueryOutcome> {
        if query_text.trim().is_empty() {
            return Err(Error::InvalidArgument("query text must not be empty".to_string()));
        }
        if limit == 0 {
            return Ok(QueryOutcome::default());
        }

        let query_embedding = self
            .embedder
            .embed(query_text)
            .await
            .map_err(|err| Error::QueryDegraded(format!("embedding failed: {err}")))?;

        let candidate_limit = limit.saturating_mul(self.overfetch_factor).max(limit);
        let candidates = self
            .store
            .search_similar_nodes(
                &query_embedding,
                &[LABEL_DERIVATIVE.to_string()],
                scope_filter,
                candidate_limit,
            )
            .await?;

        if candidates.is_empty() {
            return Ok(QueryOutcome::default());
        }

        let mut derivatives = Vec::with_capacity(candidates.len());
        let mut similarity_scores = Vec::with_capacity(candidates.len());
        for (node, similarity) in candidates {
            derivatives.push(Derivative::try_from_node(&node)?);
            similarity_scores.push(f64::from(similarity));
        }

        let contents: Vec<String> = derivatives.iter().map(|d| d.content.clone()).collect();
        let (scores, degraded) = match self.reranker.score(query_text, &contents).await {
            Ok(scores) => (scores, false),
            Err(err) => {
                tracing::warn!(error = %err, "reranker failed, falling back to raw similarity order");
                (similarity_scores, true)
            }
        };

        let mut scored: Vec<(Derivative, f64)> = derivatives.into_iter().zip(scores).collect();
        scored.sort_by(|(a_deriv, a_score), (b_deriv, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b_deriv.timestamp.cmp(&a_deriv.timestamp))
                .then_with(|| a_deriv.id.cmp(&b_deriv.id))
        });
        scored.truncate(limit);

        let mut score_map = HashMap::with_capacity(scored.len());
        let mut seen_episodes = HashSet::new();
        let mut episodes = Vec::new();
        for (derivative, score) in &scored {
            score_map.insert(derivative.id, *score);
            let members = self
                .store
                .traverse_edges(derivative.id, EDGE_DERIVED_FROM, Direction::Descending)
                .await?;
            for node in members {
                if seen_episodes.insert(node.id) {
                    episodes.push(Episode::try_from_node(&node)?);
                }
            }
        }

        Ok(QueryOutcome {
            derivatives: scored.into_iter().map(|(d, _)| d).collect(),
            episodes,
            score_map,
            degraded,
        })
    }

    /// Purge every node (episode or derivative) whose filterable properties
    /// equal `scope_filter` exactly, and all edges touching them.
    pub async fn delete_data(&self, scope_filter: &FilterableProperties) -> Result<()> {
        self.store.delete_subgraph(scope_filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deriver::IdentityDeriver;
    use crate::embedder::MockEmbedder;
    use crate::mutator::IdentityMutator;
    use crate::postulator::NullPostulator;
    use crate::reranker::IdentityReranker;
    use crate::store::mem::InMemoryStore;
    use crate::types::ContentType;

    fn memory() -> DeclarativeMemory {
        DeclarativeMemory::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockEmbedder::default()),
            Arc::new(NullPostulator),
            Arc::new(IdentityDeriver),
            Arc::new(IdentityMutator),
            Arc::new(IdentityReranker),
        )
    }

    fn episode(content: &str) -> Episode {
        Episode::new(
            "chat",
            ContentType::String,
            content,
            chrono::Utc::now(),
            "u1",
            Default::default(),
            serde_json::Value::Null,
        )
    }

    #[tokio::test]
    async fn ingest_then_query_retrieves_the_episode() {
        let memory = memory();
        memory.ingest(episode("the quick brown fox")).await.unwrap();

        let outcome = memory
            .query("the quick brown fox", &FilterableProperties::new(), 5)
            .await
            .unwrap();

        assert_eq!(outcome.derivatives.len(), 1);
        assert_eq!(outcome.derivatives[0].content, "the quick brown fox");
        assert_eq!(outcome.episodes.len(), 1);
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn delete_data_empties_subsequent_queries() {
        let memory = memory();
        let mut scope = FilterableProperties::new();
        scope.insert("user_id".to_string(), "u1".into());
        let mut ep = episode("hello world");
        ep.filterable_properties = scope.clone();
        memory.ingest(ep).await.unwrap();

        memory.delete_data(&scope).await.unwrap();

        let outcome = memory.query("hello world", &scope, 5).await.unwrap();
        assert!(outcome.derivatives.is_empty());
        assert!(outcome.episodes.is_empty());
    }

    #[tokio::test]
    async fn empty_query_text_is_invalid_argument() {
        let memory = memory();
        let err = memory
            .query("   ", &FilterableProperties::new(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn replay_incomplete_recovers_a_stalled_episode() {
        let memory = memory();
        let mut stalled = episode("stalled derivation");
        // Simulate a crash right after step 1: persisted episode, no
        // derivatives, derivations_complete left false.
        memory
            .store
            .add_node(
                stalled.id,
                &[LABEL_EPISODE.to_string()],
                stalled.to_node_properties(),
                Some(stalled.user_metadata.clone()),
                Some(vec![0.0; 16]),
            )
            .await
            .unwrap();
        stalled.derivations_complete = false;

        let replayed = memory.replay_incomplete().await.unwrap();
        assert_eq!(replayed, 1);

        let outcome = memory
            .query("stalled derivation", &FilterableProperties::new(), 5)
            .await
            .unwrap();
        assert_eq!(outcome.derivatives.len(), 1);
    }
}
