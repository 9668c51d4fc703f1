//! An in-process, brute-force `VectorGraphStore` used by tests, demos, and
//! as a reference implementation the `redb`/`turso` backends are checked
//! against.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{Direction, Node, OrderValue, VectorGraphStore};
use crate::error::{Error, Result};
use crate::types::{FilterableProperties, ScalarValue, UserMetadata};

#[derive(Debug, Clone)]
struct Edge {
    from: Uuid,
    to: Uuid,
    label: String,
}

/// An in-memory store guarded by a single `RwLock`. Not durable; intended
/// for tests, demos, and as the default backend when no persistence is
/// configured.
#[derive(Default)]
pub struct InMemoryStore {
    nodes: RwLock<HashMap<Uuid, Node>>,
    edges: RwLock<Vec<Edge>>,
}

impl InMemoryStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_required(node: &Node, required: &FilterableProperties) -> bool {
    required
        .iter()
        .all(|(k, v)| node.properties.get(k) == Some(v))
}

fn has_any_label(node: &Node, labels: &[String]) -> bool {
    labels.is_empty() || node.labels.iter().any(|l| labels.contains(l))
}

fn order_key(node: &Node, key: &str) -> Option<OrderValue> {
    match node.properties.get(key)? {
        ScalarValue::Int(i) => Some(OrderValue::Int(*i)),
        ScalarValue::String(s) => Some(OrderValue::String(s.clone())),
        ScalarValue::Float(f) => Some(OrderValue::Int(*f as i64)),
        ScalarValue::Bool(b) => Some(OrderValue::Int(i64::from(*b))),
    }
}

fn cmp_order(a: &OrderValue, b: &OrderValue) -> std::cmp::Ordering {
    match (a, b) {
        (OrderValue::Int(x), OrderValue::Int(y)) => x.cmp(y),
        (OrderValue::String(x), OrderValue::String(y)) => x.cmp(y),
        _ => std::cmp::Ordering::Equal,
    }
}

#[async_trait]
impl VectorGraphStore for InMemoryStore {
    async fn add_node(
        &self,
        id: Uuid,
        labels: &[String],
        properties: FilterableProperties,
        user_metadata: Option<UserMetadata>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Uuid> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&id) {
            return Err(Error::StoreConstraintViolation(format!(
                "node {id} already exists"
            )));
        }
        let node = Node {
            id,
            labels: labels.to_vec(),
            properties,
            user_metadata,
            embedding,
        };
        nodes.insert(id, node);
        Ok(id)
    }

    async fn add_edge(
        &self,
        from: Uuid,
        label: &str,
        to: Uuid,
        _properties: Option<FilterableProperties>,
    ) -> Result<()> {
        if !self.nodes.read().contains_key(&from) {
            return Err(Error::StoreNotFound(from.to_string()));
        }
        if !self.nodes.read().contains_key(&to) {
            return Err(Error::StoreNotFound(to.to_string()));
        }
        self.edges.write().push(Edge {
            from,
            to,
            label: label.to_string(),
        });
        Ok(())
    }

    async fn search_similar_nodes(
        &self,
        query_embedding: &[f32],
        labels: &[String],
        required_properties: &FilterableProperties,
        limit: usize,
    ) -> Result<Vec<(Node, f32)>> {
        let nodes = self.nodes.read();
        let mut scored: Vec<(Node, f32)> = nodes
            .values()
            .filter(|n| has_any_label(n, labels) && matches_required(n, required_properties))
            .filter_map(|n| {
                n.embedding
                    .as_ref()
                    .map(|emb| (n.clone(), cosine(query_embedding, emb)))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ta = order_key(&a.0, "timestamp");
                    let tb = order_key(&b.0, "timestamp");
                    match (ta, tb) {
                        (Some(x), Some(y)) => cmp_order(&y, &x),
                        _ => std::cmp::Ordering::Equal,
                    }
                })
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn search_directional_nodes(
        &self,
        labels: &[String],
        required_properties: &FilterableProperties,
        order_by: &str,
        direction: Direction,
        start_at_value: Option<OrderValue>,
        limit: usize,
    ) -> Result<Vec<Node>> {
        let nodes = self.nodes.read();
        let mut matching: Vec<Node> = nodes
            .values()
            .filter(|n| has_any_label(n, labels) && matches_required(n, required_properties))
            .filter(|n| {
                let Some(cursor) = &start_at_value else {
                    return true;
                };
                let Some(key) = order_key(n, order_by) else {
                    return false;
                };
                match direction {
                    Direction::Descending => cmp_order(&key, cursor) == std::cmp::Ordering::Less,
                    Direction::Ascending => cmp_order(&key, cursor) == std::cmp::Ordering::Greater,
                }
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ka = order_key(a, order_by);
            let kb = order_key(b, order_by);
            let ordering = match (&ka, &kb) {
                (Some(x), Some(y)) => cmp_order(x, y),
                _ => std::cmp::Ordering::Equal,
            };
            match direction {
                Direction::Descending => ordering.reverse().then_with(|| a.id.cmp(&b.id)),
                Direction::Ascending => ordering.then_with(|| a.id.cmp(&b.id)),
            }
        });
        matching.truncate(limit);
        Ok(matching)
    }

    async fn traverse_edges(
        &self,
        from: Uuid,
        edge_label: &str,
        direction: Direction,
    ) -> Result<Vec<Node>> {
        let edges = self.edges.read();
        let nodes = self.nodes.read();
        let ids: Vec<Uuid> = edges
            .iter()
            .filter(|e| e.label == edge_label)
            .filter_map(|e| match direction {
                Direction::Descending if e.from == from => Some(e.to),
                Direction::Ascending if e.to == from => Some(e.from),
                _ => None,
            })
            .collect();
        Ok(ids.into_iter().filter_map(|id| nodes.get(&id).cloned()).collect())
    }

    async fn delete_subgraph(&self, required_properties: &FilterableProperties) -> Result<()> {
        let mut nodes = self.nodes.write();
        let to_remove: Vec<Uuid> = nodes
            .values()
            .filter(|n| matches_required(n, required_properties))
            .map(|n| n.id)
            .collect();
        for id in &to_remove {
            nodes.remove(id);
        }
        drop(nodes);
        let mut edges = self.edges.write();
        edges.retain(|e| !to_remove.contains(&e.from) && !to_remove.contains(&e.to));
        Ok(())
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        Ok(self.nodes.read().get(&id).cloned())
    }

    async fn update_node(
        &self,
        id: Uuid,
        properties: FilterableProperties,
        user_metadata: Option<UserMetadata>,
        embedding: Option<Vec<f32>>,
    ) -> Result<()> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .get_mut(&id)
            .ok_or_else(|| Error::StoreNotFound(id.to_string()))?;
        node.properties = properties;
        if user_metadata.is_some() {
            node.user_metadata = user_metadata;
        }
        if embedding.is_some() {
            node.embedding = embedding;
        }
        Ok(())
    }

    async fn delete_node(&self, id: Uuid) -> Result<()> {
        self.nodes.write().remove(&id);
        self.edges
            .write()
            .retain(|e| e.from != id && e.to != id);
        Ok(())
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> FilterableProperties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ScalarValue::from(*v)))
            .collect()
    }

    #[tokio::test]
    async fn add_and_search_similar_orders_by_cosine() {
        let store = InMemoryStore::new();
        let id_a = store
            .add_node(
                Uuid::new_v4(),
                &["Derivative".to_string()],
                props(&[]),
                None,
                Some(vec![1.0, 0.0]),
            )
            .await
            .unwrap();
        let _id_b = store
            .add_node(
                Uuid::new_v4(),
                &["Derivative".to_string()],
                props(&[]),
                None,
                Some(vec![0.0, 1.0]),
            )
            .await
            .unwrap();

        let results = store
            .search_similar_nodes(&[1.0, 0.0], &["Derivative".to_string()], &props(&[]), 10)
            .await
            .unwrap();
        assert_eq!(results[0].0.id, id_a);
        assert!(results[0].1 > results[1].1);
    }

    #[tokio::test]
    async fn required_properties_filter_exact_match() {
        let store = InMemoryStore::new();
        store
            .add_node(
                Uuid::new_v4(),
                &["Episode".to_string()],
                props(&[("user_id", "u1")]),
                None,
                Some(vec![1.0]),
            )
            .await
            .unwrap();
        store
            .add_node(
                Uuid::new_v4(),
                &["Episode".to_string()],
                props(&[("user_id", "u2")]),
                None,
                Some(vec![1.0]),
            )
            .await
            .unwrap();

        let results = store
            .search_similar_nodes(&[1.0], &["Episode".to_string()], &props(&[("user_id", "u1")]), 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn delete_subgraph_cascades_edges() {
        let store = InMemoryStore::new();
        let a = store
            .add_node(Uuid::new_v4(), &[], props(&[]), None, None)
            .await
            .unwrap();
        let b = store
            .add_node(Uuid::new_v4(), &[], props(&[("scope", "x")]), None, None)
            .await
            .unwrap();
        store.add_edge(a, "FOLLOWS", b, None).await.unwrap();

        store.delete_subgraph(&props(&[("scope", "x")])).await.unwrap();
        assert!(store.get_node(b).await.unwrap().is_none());
        let traversed = store.traverse_edges(a, "FOLLOWS", Direction::Descending).await.unwrap();
        assert!(traversed.is_empty());
    }

    #[tokio::test]
    async fn duplicate_id_is_a_constraint_violation() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        store.add_node(id, &[], props(&[]), None, None).await.unwrap();
        let err = store.add_node(id, &[], props(&[]), None, None).await.unwrap_err();
        assert!(matches!(err, Error::StoreConstraintViolation(_)));
    }
}
