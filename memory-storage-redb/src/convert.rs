//! Serializable mirrors of `memory_core::store::Node`/edges, plus the
//! label/property/ordering predicates the scans in `lib.rs` share with
//! `memory-core`'s own in-memory reference store.

use memory_core::store::{Direction, Node, OrderValue};
use memory_core::types::{FilterableProperties, ScalarValue, UserMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredNode {
    pub id: Uuid,
    pub labels: Vec<String>,
    pub properties: FilterableProperties,
    pub user_metadata: Option<UserMetadata>,
    pub embedding: Option<Vec<f32>>,
}

impl From<Node> for StoredNode {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            labels: node.labels,
            properties: node.properties,
            user_metadata: node.user_metadata,
            embedding: node.embedding,
        }
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredEdge {
    pub from: Uuid,
    pub to: Uuid,
    pub label: String,
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
