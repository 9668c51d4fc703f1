//! Derivatives: derived searchable artifacts linked to a source cluster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Node;
use crate::types::{ContentType, FilterableProperties, ScalarValue, UserMetadata};

/// Reserved property keys a [`Derivative`] is flattened under at the storage
/// boundary, `__`-prefixed to avoid colliding with caller-chosen
/// `filterable_properties` keys. `timestamp` is unprefixed: the store
/// recognizes it for similarity-search tie-breaking.
mod sys_keys {
    pub const DERIVATIVE_TYPE: &str = "__derivative_type";
    pub const CONTENT: &str = "__content";
    pub const CONTENT_TYPE: &str = "__content_type";
    pub const SOURCE_CLUSTER_ID: &str = "__source_cluster_id";
    pub const TIMESTAMP: &str = "timestamp";
}

/// A derived searchable artifact (sentence, summary, rewrite).
///
/// Invariants (spec.md §3, §8): each derivative links back to exactly one
/// source cluster via a `DERIVED_FROM` edge once persisted, and its
/// `filterable_properties` are a subset of the cluster's member union.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Derivative {
    /// Unique identity.
    pub id: Uuid,
    /// Free-string classification (e.g. "sentence", "summary", "rewrite").
    pub derivative_type: String,
    /// The medium `content` is expressed in.
    pub content_type: ContentType,
    /// The derived text.
    pub content: String,
    /// Inherited from the source cluster's triggering episode.
    pub timestamp: DateTime<Utc>,
    /// Scalar properties used as exact-match retrieval filters.
    pub filterable_properties: FilterableProperties,
    /// Opaque caller-supplied JSON.
    pub user_metadata: UserMetadata,
    /// Dense embedding, set once the embedder has run. `None` for seeds
    /// produced by a deriver/mutator before the batched embed step.
    pub embedding: Option<Vec<f32>>,
    /// ID of the `EpisodeCluster` this derivative was derived from.
    pub source_cluster_id: Uuid,
}

impl Derivative {
    /// Construct a derivative seed (no embedding yet).
    #[must_use]
    pub fn seed(
        derivative_type: impl Into<String>,
        content_type: ContentType,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        filterable_properties: FilterableProperties,
        user_metadata: UserMetadata,
        source_cluster_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            derivative_type: derivative_type.into(),
            content_type,
            content: content.into(),
            timestamp,
            filterable_properties,
            user_metadata,
            embedding: None,
            source_cluster_id,
        }
    }

    /// Attach an embedding vector, as produced by the batched embed step.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Flatten this derivative into store properties: `filterable_properties`
    /// plus the derivative's own fields under reserved keys, so the node
    /// round-trips through [`Derivative::try_from_node`].
    #[must_use]
    pub fn to_node_properties(&self) -> FilterableProperties {
        let mut props = self.filterable_properties.clone();
        props.insert(
            sys_keys::DERIVATIVE_TYPE.to_string(),
            ScalarValue::String(self.derivative_type.clone()),
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
            sys_keys::SOURCE_CLUSTER_ID.to_string(),
            ScalarValue::String(self.source_cluster_id.to_string()),
        );
        props.insert(
            sys_keys::TIMESTAMP.to_string(),
            ScalarValue::Int(self.timestamp.timestamp_millis()),
        );
        props
    }

    /// Reconstruct a derivative from a persisted [`Node`], inverting
    /// [`Derivative::to_node_properties`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreConstraintViolation`] if `node` is
    /// missing a reserved system property or carries a malformed
    /// `source_cluster_id`.
    pub fn try_from_node(node: &Node) -> crate::error::Result<Self> {
        let get_string = |key: &str| -> crate::error::Result<String> {
            match node.properties.get(key) {
                Some(ScalarValue::String(s)) => Ok(s.clone()),
                _ => Err(crate::error::Error::StoreConstraintViolation(format!(
                    "derivative node {} missing property {key}",
                    node.id
                ))),
            }
        };
        let timestamp_millis = match node.properties.get(sys_keys::TIMESTAMP) {
            Some(ScalarValue::Int(ms)) => *ms,
            _ => {
                return Err(crate::error::Error::StoreConstraintViolation(format!(
                    "derivative node {} missing property {}",
                    node.id,
                    sys_keys::TIMESTAMP
                )))
            }
        };
        let source_cluster_id = get_string(sys_keys::SOURCE_CLUSTER_ID)?
            .parse()
            .map_err(|_| {
                crate::error::Error::StoreConstraintViolation(format!(
                    "derivative node {} has malformed source_cluster_id",
                    node.id
                ))
            })?;

        let mut filterable_properties = node.properties.clone();
        filterable_properties.remove(sys_keys::DERIVATIVE_TYPE);
        filterable_properties.remove(sys_keys::CONTENT);
        filterable_properties.remove(sys_keys::CONTENT_TYPE);
        filterable_properties.remove(sys_keys::SOURCE_CLUSTER_ID);
        filterable_properties.remove(sys_keys::TIMESTAMP);

        Ok(Self {
            id: node.id,
            derivative_type: get_string(sys_keys::DERIVATIVE_TYPE)?,
            content_type: ContentType::from_storage_tag(&get_string(sys_keys::CONTENT_TYPE)?),
            content: get_string(sys_keys::CONTENT)?,
            timestamp: DateTime::from_timestamp_millis(timestamp_millis).unwrap_or_else(Utc::now),
            filterable_properties,
            user_metadata: node.user_metadata.clone().unwrap_or(serde_json::Value::Null),
            embedding: node.embedding.clone(),
            source_cluster_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_round_trips_through_node_properties() {
        let cluster_id = Uuid::new_v4();
        let mut props = FilterableProperties::new();
        props.insert("user_id".to_string(), "u1".into());
        let original = Derivative::seed(
            "sentence",
            ContentType::String,
            "hello",
            Utc::now(),
            props,
            serde_json::Value::Null,
            cluster_id,
        )
        .with_embedding(vec![1.0, 2.0]);

        let node = Node {
            id: original.id,
            labels: vec!["Derivative".to_string()],
            properties: original.to_node_properties(),
            user_metadata: Some(original.user_metadata.clone()),
            embedding: original.embedding.clone(),
        };
        let restored = Derivative::try_from_node(&node).unwrap();
        assert_eq!(restored.content, original.content);
        assert_eq!(restored.derivative_type, original.derivative_type);
        assert_eq!(restored.source_cluster_id, cluster_id);
        assert_eq!(restored.embedding, original.embedding);
        assert!(!restored.filterable_properties.contains_key("__content"));
    }
}
