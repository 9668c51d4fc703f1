//! Row <-> `Node` conversions and the brute-force scan predicates shared by
//! every `VectorGraphStore` method, mirroring
//! `memory_core::store::mem::InMemoryStore`'s reference semantics.

use memory_core::store::{Direction, Node, OrderValue};
use memory_core::types::{FilterableProperties, ScalarValue, UserMetadata};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct StoredNode {
    pub id: Uuid,
    pub labels: Vec<String>,
    pub properties: FilterableProperties,
    pub user_metadata: Option<UserMetadata>,
    pub embedding: Option<Vec<f32>>,
}

impl StoredNode {
    pub fn encode_labels(&self) -> String {
        serde_json::to_string(&self.labels).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn encode_properties(&self) -> String {
        serde_json::to_string(&self.properties).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn encode_user_metadata(&self) -> Option<String> {
        self.user_metadata.as_ref().map(|v| v.to_string())
    }

    pub fn encode_embedding(&self) -> Option<String> {
        self.embedding.as_ref().and_then(|e| serde_json::to_string(e).ok())
    }

    pub fn decode(
        id: &str,
        labels: &str,
        properties: &str,
        user_metadata: Option<&str>,
        embedding: Option<&str>,
    ) -> Option<Self> {
        Some(Self {
            id: id.parse().ok()?,
            labels: serde_json::from_str(labels).ok()?,
            properties: serde_json::from_str(properties).ok()?,
            user_metadata: user_metadata.and_then(|m| serde_json::from_str(m).ok()),
            embedding: embedding.and_then(|e| serde_json::from_str(e).ok()),
        })
    }
}

impl From<StoredNode> for Node {
    fn from(stored: StoredNode) -> Self {
        Node {
            id: stored.id,
            labels: stored.labels,
            properties: stored.properties,
            user_metadata: stored.user_metadata,
            embedding: stored.embedding,
        }
    }
}

pub(crate) fn matches_required(node: &StoredNode, required: &FilterableProperties) -> bool {
    required
        .iter()
        .all(|(k, v)| node.properties.get(k) == Some(v))
}

pub(crate) fn has_any_label(node: &StoredNode, labels: &[String]) -> bool {
    labels.is_empty() || node.labels.iter().any(|l| labels.contains(l))
}

pub(crate) fn order_key(node: &StoredNode, key: &str) -> Option<OrderValue> {
    match node.properties.get(key)? {
        ScalarValue::Int(i) => Some(OrderValue::Int(*i)),
        ScalarValue::String(s) => Some(OrderValue::String(s.clone())),
        ScalarValue::Float(f) => Some(OrderValue::Int(*f as i64)),
        ScalarValue::Bool(b) => Some(OrderValue::Int(i64::from(*b))),
    }
}

pub(crate) fn cmp_order(a: &OrderValue, b: &OrderValue) -> std::cmp::Ordering {
    match (a, b) {
        (OrderValue::Int(x), OrderValue::Int(y)) => x.cmp(y),
        (OrderValue::String(x), OrderValue::String(y)) => x.cmp(y),
        _ => std::cmp::Ordering::Equal,
    }
}

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

pub(crate) fn passes_cursor(
    node: &StoredNode,
    order_by: &str,
    direction: Direction,
    start_at_value: Option<&OrderValue>,
) -> bool {
    let Some(cursor) = start_at_value else {
        return true;
    };
    let Some(key) = order_key(node, order_by) else {
        return false;
    };
    match direction {
        Direction::Descending => cmp_order(&key, cursor) == std::cmp::Ordering::Less,
        Direction::Ascending => cmp_order(&key, cursor) == std::cmp::Ordering::Greater,
    }
}
