//! Episodes and episode clusters (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Node;
use crate::types::{intersect_all, ContentType, FilterableProperties, ScalarValue, UserMetadata};

/// Reserved property keys an [`Episode`] is flattened under at the storage
/// boundary, namespaced with a `__` prefix so they never collide with a
/// caller's own `filterable_properties` keys (e.g. `user_id`).
mod sys_keys {
    pub const EPISODE_TYPE: &str = "__episode_type";
    pub const CONTENT: &str = "__content";
    pub const CONTENT_TYPE: &str = "__content_type";
    pub const PRODUCER_ID: &str = "__producer_id";
    /// Unprefixed: the store's directional search and similarity tie-break
    /// recognize a property literally named `timestamp`.
    pub const TIMESTAMP: &str = "timestamp";
    pub const DERIVATIONS_COMPLETE: &str = "__derivations_complete";
}

/// An atomic user- or agent-produced message.
///
/// Episodes are immutable once created; they are deleted only through an
/// explicit scope purge (`delete_data` / `delete_subgraph`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Unique identity.
    pub id: Uuid,
    /// Free-string classification supplied by the caller (e.g. "chat", "tool_call").
    pub episode_type: String,
    /// The medium `content` is expressed in.
    pub content_type: ContentType,
    /// The message payload.
    pub content: String,
    /// Wall-clock time of production.
    pub timestamp: DateTime<Utc>,
    /// ID of the user or agent that produced this episode.
    pub producer_id: String,
    /// Scalar properties used as exact-match retrieval filters.
    pub filterable_properties: FilterableProperties,
    /// Opaque caller-supplied JSON.
    pub user_metadata: UserMetadata,
    /// Set once derivation (postulate → derive → mutate → embed → persist)
    /// has completed for this episode. A background sweeper replays
    /// derivation for episodes where this remains `false`, so ingest can be
    /// atomic with respect to observable state without blocking on the
    /// embedder/LLM (spec.md §4.5).
    pub derivations_complete: bool,
}

impl Episode {
    /// Construct a new episode with `derivations_complete = false`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        episode_type: impl Into<String>,
        content_type: ContentType,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        producer_id: impl Into<String>,
        filterable_properties: FilterableProperties,
        user_metadata: UserMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            episode_type: episode_type.into(),
            content_type,
            content: content.into(),
            timestamp,
            producer_id: producer_id.into(),
            filterable_properties,
            user_metadata,
            derivations_complete: false,
        }
    }

    /// Flatten this episode into store properties: the caller's
    /// `filterable_properties` plus the episode's own fields under reserved
    /// `__`-prefixed keys, so the node round-trips through
    /// [`Episode::try_from_node`].
    #[must_use]
    pub fn to_node_properties(&self) -> FilterableProperties {
        let mut props = self.filterable_properties.clone();
        props.insert(
            sys_keys::EPISODE_TYPE.to_string(),
            ScalarValue::String(self.episode_type.clone()),
        );
        props.insert(
            sys_keys::CONTENT.to_string(),
            ScalarValue::String(self.content.clone()),
        );
        props.insert(
            sys_keys::CONTENT_TYPE.to_string(),
            ScalarValue::String(self.content_type.storage_tag().to_string()),
        );
        props.insert(
            sys_keys::PRODUCER_ID.to_string(),
            ScalarValue::String(self.producer_id.clone()),
        );
        props.insert(
            sys_keys::TIMESTAMP.to_string(),
            ScalarValue::Int(self.timestamp.timestamp_millis()),
        );
        props.insert(
            sys_keys::DERIVATIONS_COMPLETE.to_string(),
            ScalarValue::Bool(self.derivations_complete),
        );
        props
    }

    /// Reconstruct an episode from a persisted [`Node`], inverting
    /// [`Episode::to_node_properties`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreConstraintViolation`] if `node` is
    /// missing one of the reserved system properties.
    pub fn try_from_node(node: &Node) -> crate::error::Result<Self> {
        let get_string = |key: &str| -> crate::error::Result<String> {
            match node.properties.get(key) {
                Some(ScalarValue::String(s)) => Ok(s.clone()),
                _ => Err(crate::error::Error::StoreConstraintViolation(format!(
                    "episode node {} missing property {key}",
                    node.id
                ))),
            }
        };
        let timestamp_millis = match node.properties.get(sys_keys::TIMESTAMP) {
            Some(ScalarValue::Int(ms)) => *ms,
            _ => {
                return Err(crate::error::Error::StoreConstraintViolation(format!(
                    "episode node {} missing property {}",
                    node.id,
                    sys_keys::TIMESTAMP
                )))
            }
        };
        let derivations_complete = matches!(
            node.properties.get(sys_keys::DERIVATIONS_COMPLETE),
            Some(ScalarValue::Bool(true))
        );

        let mut filterable_properties = node.properties.clone();
        filterable_properties.remove(sys_keys::EPISODE_TYPE);
        filterable_properties.remove(sys_keys::CONTENT);
        filterable_properties.remove(sys_keys::CONTENT_TYPE);
        filterable_properties.remove(sys_keys::PRODUCER_ID);
        filterable_properties.remove(sys_keys::TIMESTAMP);
        filterable_properties.remove(sys_keys::DERIVATIONS_COMPLETE);

        Ok(Self {
            id: node.id,
            episode_type: get_string(sys_keys::EPISODE_TYPE)?,
            content_type: ContentType::from_storage_tag(&get_string(sys_keys::CONTENT_TYPE)?),
            content: get_string(sys_keys::CONTENT)?,
            timestamp: DateTime::from_timestamp_millis(timestamp_millis).unwrap_or_else(Utc::now),
            producer_id: get_string(sys_keys::PRODUCER_ID)?,
            filterable_properties,
            user_metadata: node.user_metadata.clone().unwrap_or(serde_json::Value::Null),
            derivations_complete,
        })
    }
}

/// A group of episodes treated as one derivation unit.
///
/// Invariant: non-empty; `filterable_properties` is the subset of keys whose
/// value is identical across all member episodes (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeCluster {
    /// Unique identity.
    pub id: Uuid,
    /// Ordered member episodes, earliest first.
    pub episodes: Vec<Episode>,
    /// Intersection of member episodes' filterable properties.
    pub filterable_properties: FilterableProperties,
    /// Opaque caller-supplied JSON, inherited from the triggering episode.
    pub user_metadata: UserMetadata,
}

impl EpisodeCluster {
    /// Build a cluster from a non-empty ordered list of episodes, computing
    /// `filterable_properties` as the intersection over all members.
    ///
    /// # Panics
    ///
    /// Panics if `episodes` is empty — clusters are non-empty by invariant
    /// and callers are expected to special-case the single-episode case
    /// rather than construct an empty cluster.
    #[must_use]
    pub fn new(episodes: Vec<Episode>) -> Self {
        assert!(!episodes.is_empty(), "EpisodeCluster must be non-empty");
        let shared = intersect_all(episodes.iter().map(|e| &e.filterable_properties));
        let user_metadata = episodes
            .last()
            .map(|e| e.user_metadata.clone())
            .unwrap_or(serde_json::Value::Null);
        Self {
            id: Uuid::new_v4(),
            episodes,
            filterable_properties: shared,
            user_metadata,
        }
    }

    /// The union of filterable-property keys across all member episodes.
    ///
    /// Used to validate the invariant that a persisted derivative's
    /// properties are a subset of the union over its cluster's members
    /// (spec.md §8).
    #[must_use]
    pub fn union_property_keys(&self) -> std::collections::BTreeSet<String> {
        self.episodes
            .iter()
            .flat_map(|e| e.filterable_properties.keys().cloned())
            .collect()
    }

    /// IDs of the member episodes, in cluster order.
    #[must_use]
    pub fn episode_ids(&self) -> Vec<Uuid> {
        self.episodes.iter().map(|e| e.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(content: &str, user_id: &str) -> Episode {
        let mut props = FilterableProperties::new();
        props.insert("user_id".to_string(), user_id.into());
        Episode::new(
            "chat",
            ContentType::String,
            content,
            Utc::now(),
            user_id,
            props,
            serde_json::Value::Null,
        )
    }

    #[test]
    fn cluster_is_non_empty_and_computes_intersection() {
        let cluster = EpisodeCluster::new(vec![episode("hi", "u1"), episode("there", "u1")]);
        assert_eq!(cluster.episodes.len(), 2);
        assert_eq!(
            cluster.filterable_properties.get("user_id").unwrap().to_string(),
            "u1"
        );
    }

    #[test]
    fn cluster_intersection_drops_divergent_keys() {
        let cluster = EpisodeCluster::new(vec![episode("hi", "u1"), episode("there", "u2")]);
        assert!(cluster.filterable_properties.is_empty());
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn cluster_rejects_empty_input() {
        let _ = EpisodeCluster::new(vec![]);
    }

    #[test]
    fn episode_round_trips_through_node_properties() {
        let original = episode("hello there", "u1");
        let node = Node {
            id: original.id,
            labels: vec!["Episode".to_string()],
            properties: original.to_node_properties(),
            user_metadata: Some(original.user_metadata.clone()),
            embedding: None,
        };
        let restored = Episode::try_from_node(&node).unwrap();
        assert_eq!(restored.content, original.content);
        assert_eq!(restored.episode_type, original.episode_type);
        assert_eq!(restored.producer_id, original.producer_id);
        assert_eq!(restored.timestamp.timestamp_millis(), original.timestamp.timestamp_millis());
        assert_eq!(restored.filterable_properties.get("user_id"), original.filterable_properties.get("user_id"));
        assert!(!restored.filterable_properties.contains_key("__episode_type"));
    }
}
