#![allow(clippy::module_name_repetitions)]

//! # Memory Storage - redb
//!
//! An embedded, brute-force [`memory_core::store::VectorGraphStore`]
//! backed by [`redb`]. This is the default local/test backend: every scan
//! (similarity search, directional search, edge traversal) loads the
//! relevant table fully into memory and filters in a blocking task, the
//! same way `memory_core::store::mem::InMemoryStore` does it, except nodes
//! and edges survive process restarts.
//!
//! ## Example
//!
//! ```no_run
//! use memory_storage_redb::RedbStore;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = RedbStore::open(Path::new("./memory.redb")).await?;
//! # Ok(())
//! # }
//! ```

mod convert;
mod tables;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use memory_core::error::{Error, Result};
use memory_core::store::{Direction, Node, OrderValue, VectorGraphStore};
use memory_core::types::{FilterableProperties, UserMetadata};
use redb::{Database, ReadableTable};
use tracing::info;
use uuid::Uuid;

use convert::{
    cmp_order, cosine, has_any_label, matches_required, order_key, passes_cursor, StoredEdge,
    StoredNode,
};
use tables::{EDGES_TABLE, NODES_TABLE};

/// Timeout for a single blocking redb operation.
const DB_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs a synchronous redb operation on the blocking pool, with a timeout
/// so a wedged database surfaces as [`Error::StoreUnavailable`] rather than
/// hanging the caller forever.
async fn with_db_timeout<T, F>(operation: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(DB_OPERATION_TIMEOUT, tokio::task::spawn_blocking(operation)).await
    {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(Error::StoreUnavailable(format!("task join error: {join_err}"))),
        Err(_) => Err(Error::StoreUnavailable(format!(
            "redb operation timed out after {DB_OPERATION_TIMEOUT:?}"
        ))),
    }
}

fn encode_node(node: &StoredNode) -> Result<Vec<u8>> {
    serde_json::to_vec(node).map_err(|e| Error::StoreUnavailable(format!("node encode failed: {e}")))
}

fn decode_node(bytes: &[u8]) -> Result<StoredNode> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::StoreUnavailable(format!("node decode failed: {e}")))
}

fn encode_edge(edge: &StoredEdge) -> Result<Vec<u8>> {
    serde_json::to_vec(edge).map_err(|e| Error::StoreUnavailable(format!("edge encode failed: {e}")))
}

fn decode_edge(bytes: &[u8]) -> Result<StoredEdge> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::StoreUnavailable(format!("edge decode failed: {e}")))
}

/// An embedded, durable `VectorGraphStore` over a single `redb` database
/// file. Every operation opens its own transaction; callers share one
/// `RedbStore` (it's cheap to clone via [`RedbStore::db`]'s `Arc`).
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) the database at `path` and ensure its tables exist.
    pub async fn open(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "opening redb store");
        let path_buf = path.to_path_buf();
        let db = with_db_timeout(move || {
            Database::create(&path_buf)
                .map_err(|e| Error::StoreUnavailable(format!("failed to open redb database: {e}")))
        })
        .await?;

        let store = Self { db: Arc::new(db) };
        store.initialize_tables().await?;
        Ok(store)
    }

    async fn initialize_tables(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
            {
                let _nodes = write_txn
                    .open_table(NODES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open nodes table failed: {e}")))?;
                let _edges = write_txn
                    .open_table(EDGES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open edges table failed: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
            Ok(())
        })
        .await
    }

    fn load_all_nodes(db: &Database) -> Result<HashMap<Uuid, StoredNode>> {
        let read_txn = db
            .begin_read()
            .map_err(|e| Error::StoreUnavailable(format!("begin_read failed: {e}")))?;
        let table = read_txn
            .open_table(NODES_TABLE)
            .map_err(|e| Error::StoreUnavailable(format!("open nodes table failed: {e}")))?;
        let mut out = HashMap::new();
        for row in table
            .iter()
            .map_err(|e| Error::StoreUnavailable(format!("iterate nodes failed: {e}")))?
        {
            let (_, value) = row.map_err(|e| Error::StoreUnavailable(format!("row read failed: {e}")))?;
            let node = decode_node(value.value())?;
            out.insert(node.id, node);
        }
        Ok(out)
    }

    fn load_all_edges(db: &Database) -> Result<Vec<StoredEdge>> {
        let read_txn = db
            .begin_read()
            .map_err(|e| Error::StoreUnavailable(format!("begin_read failed: {e}")))?;
        let table = read_txn
            .open_table(EDGES_TABLE)
            .map_err(|e| Error::StoreUnavailable(format!("open edges table failed: {e}")))?;
        let mut out = Vec::new();
        for row in table
            .iter()
            .map_err(|e| Error::StoreUnavailable(format!("iterate edges failed: {e}")))?
        {
            let (_, value) = row.map_err(|e| Error::StoreUnavailable(format!("row read failed: {e}")))?;
            out.push(decode_edge(value.value())?);
        }
        Ok(out)
    }
}

#[async_trait]
impl VectorGraphStore for RedbStore {
    async fn add_node(
        &self,
        id: Uuid,
        labels: &[String],
        properties: FilterableProperties,
        user_metadata: Option<UserMetadata>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Uuid> {
        let db = Arc::clone(&self.db);
        let labels = labels.to_vec();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(NODES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open nodes table failed: {e}")))?;
                let key = id.to_string();
                if table
                    .get(key.as_str())
                    .map_err(|e| Error::StoreUnavailable(format!("get failed: {e}")))?
                    .is_some()
                {
                    return Err(Error::StoreConstraintViolation(format!(
                        "node {id} already exists"
                    )));
                }
                let stored = StoredNode {
                    id,
                    labels,
                    properties,
                    user_metadata,
                    embedding,
                };
                let bytes = encode_node(&stored)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| Error::StoreUnavailable(format!("insert failed: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
            Ok(id)
        })
        .await
    }

    async fn add_edge(
        &self,
        from: Uuid,
        label: &str,
        to: Uuid,
        _properties: Option<FilterableProperties>,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        let label = label.to_string();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::StoreUnavailable(format!("begin_read failed: {e}")))?;
            {
                let nodes = read_txn
                    .open_table(NODES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open nodes table failed: {e}")))?;
                if nodes
                    .get(from.to_string().as_str())
                    .map_err(|e| Error::StoreUnavailable(format!("get failed: {e}")))?
                    .is_none()
                {
                    return Err(Error::StoreNotFound(from.to_string()));
                }
                if nodes
                    .get(to.to_string().as_str())
                    .map_err(|e| Error::StoreUnavailable(format!("get failed: {e}")))?
                    .is_none()
                {
                    return Err(Error::StoreNotFound(to.to_string()));
                }
            }
            drop(read_txn);

            let write_txn = db
                .begin_write()
                .map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
            {
                let mut edges = write_txn
                    .open_table(EDGES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open edges table failed: {e}")))?;
                let edge = StoredEdge { from, to, label };
                let bytes = encode_edge(&edge)?;
                edges
                    .insert(Uuid::new_v4().to_string().as_str(), bytes.as_slice())
                    .map_err(|e| Error::StoreUnavailable(format!("insert failed: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn search_similar_nodes(
        &self,
        query_embedding: &[f32],
        labels: &[String],
        required_properties: &FilterableProperties,
        limit: usize,
    ) -> Result<Vec<(Node, f32)>> {
        let db = Arc::clone(&self.db);
        let query_embedding = query_embedding.to_vec();
        let labels = labels.to_vec();
        let required_properties = required_properties.clone();
        with_db_timeout(move || {
            let nodes = Self::load_all_nodes(&db)?;
            let mut scored: Vec<(StoredNode, f32)> = nodes
                .into_values()
                .filter(|n| has_any_label(n, &labels) && matches_required(n, &required_properties))
                .filter_map(|n| {
                    n.embedding
                        .as_ref()
                        .map(|emb| (cosine(&query_embedding, emb)))
                        .map(|score| (n, score))
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
            Ok(scored.into_iter().map(|(n, s)| (Node::from(n), s)).collect())
        })
        .await
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
        let db = Arc::clone(&self.db);
        let labels = labels.to_vec();
        let required_properties = required_properties.clone();
        let order_by = order_by.to_string();
        with_db_timeout(move || {
            let nodes = Self::load_all_nodes(&db)?;
            let mut matching: Vec<StoredNode> = nodes
                .into_values()
                .filter(|n| has_any_label(n, &labels) && matches_required(n, &required_properties))
                .filter(|n| passes_cursor(n, &order_by, direction, start_at_value.as_ref()))
                .collect();

            matching.sort_by(|a, b| {
                let ka = order_key(a, &order_by);
                let kb = order_key(b, &order_by);
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
            Ok(matching.into_iter().map(Node::from).collect())
        })
        .await
    }

    async fn traverse_edges(
        &self,
        from: Uuid,
        edge_label: &str,
        direction: Direction,
    ) -> Result<Vec<Node>> {
        let db = Arc::clone(&self.db);
        let edge_label = edge_label.to_string();
        with_db_timeout(move || {
            let edges = Self::load_all_edges(&db)?;
            let nodes = Self::load_all_nodes(&db)?;
            let ids: Vec<Uuid> = edges
                .into_iter()
                .filter(|e| e.label == edge_label)
                .filter_map(|e| match direction {
                    Direction::Descending if e.from == from => Some(e.to),
                    Direction::Ascending if e.to == from => Some(e.from),
                    _ => None,
                })
                .collect();
            Ok(ids
                .into_iter()
                .filter_map(|id| nodes.get(&id).cloned().map(Node::from))
                .collect())
        })
        .await
    }

    async fn delete_subgraph(&self, required_properties: &FilterableProperties) -> Result<()> {
        let db = Arc::clone(&self.db);
        let required_properties = required_properties.clone();
        with_db_timeout(move || {
            let to_remove: Vec<Uuid> = Self::load_all_nodes(&db)?
                .into_values()
                .filter(|n| matches_required(n, &required_properties))
                .map(|n| n.id)
                .collect();

            let write_txn = db
                .begin_write()
                .map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
            {
                let mut nodes = write_txn
                    .open_table(NODES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open nodes table failed: {e}")))?;
                for id in &to_remove {
                    nodes
                        .remove(id.to_string().as_str())
                        .map_err(|e| Error::StoreUnavailable(format!("remove failed: {e}")))?;
                }

                let mut edges = write_txn
                    .open_table(EDGES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open edges table failed: {e}")))?;
                let stale: Vec<(String, StoredEdge)> = edges
                    .iter()
                    .map_err(|e| Error::StoreUnavailable(format!("iterate edges failed: {e}")))?
                    .filter_map(|row| row.ok())
                    .map(|(k, v)| (k.value().to_string(), v.value().to_vec()))
                    .filter_map(|(k, v)| decode_edge(&v).ok().map(|e| (k, e)))
                    .filter(|(_, e)| to_remove.contains(&e.from) || to_remove.contains(&e.to))
                    .collect();
                for (key, _) in stale {
                    edges
                        .remove(key.as_str())
                        .map_err(|e| Error::StoreUnavailable(format!("remove failed: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::StoreUnavailable(format!("begin_read failed: {e}")))?;
            let table = read_txn
                .open_table(NODES_TABLE)
                .map_err(|e| Error::StoreUnavailable(format!("open nodes table failed: {e}")))?;
            match table
                .get(id.to_string().as_str())
                .map_err(|e| Error::StoreUnavailable(format!("get failed: {e}")))?
            {
                Some(value) => Ok(Some(Node::from(decode_node(value.value())?))),
                None => Ok(None),
            }
        })
        .await
    }

    async fn update_node(
        &self,
        id: Uuid,
        properties: FilterableProperties,
        user_metadata: Option<UserMetadata>,
        embedding: Option<Vec<f32>>,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(NODES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open nodes table failed: {e}")))?;
                let key = id.to_string();
                let existing = table
                    .get(key.as_str())
                    .map_err(|e| Error::StoreUnavailable(format!("get failed: {e}")))?
                    .ok_or_else(|| Error::StoreNotFound(id.to_string()))?;
                let mut node = decode_node(existing.value())?;
                drop(existing);
                node.properties = properties;
                if user_metadata.is_some() {
                    node.user_metadata = user_metadata;
                }
                if embedding.is_some() {
                    node.embedding = embedding;
                }
                let bytes = encode_node(&node)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| Error::StoreUnavailable(format!("insert failed: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn delete_node(&self, id: Uuid) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
            {
                let mut nodes = write_txn
                    .open_table(NODES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open nodes table failed: {e}")))?;
                nodes
                    .remove(id.to_string().as_str())
                    .map_err(|e| Error::StoreUnavailable(format!("remove failed: {e}")))?;

                let mut edges = write_txn
                    .open_table(EDGES_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("open edges table failed: {e}")))?;
                let stale: Vec<String> = edges
                    .iter()
                    .map_err(|e| Error::StoreUnavailable(format!("iterate edges failed: {e}")))?
                    .filter_map(|row| row.ok())
                    .map(|(k, v)| (k.value().to_string(), v.value().to_vec()))
                    .filter_map(|(k, v)| decode_edge(&v).ok().map(|e| (k, e)))
                    .filter(|(_, e)| e.from == id || e.to == id)
                    .map(|(k, _)| k)
                    .collect();
                for key in stale {
                    edges
                        .remove(key.as_str())
                        .map_err(|e| Error::StoreUnavailable(format!("remove failed: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::types::ScalarValue;
    use tempfile::tempdir;

    fn props(pairs: &[(&str, &str)]) -> FilterableProperties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ScalarValue::from(*v)))
            .collect()
    }

    #[tokio::test]
    async fn round_trips_a_node_through_a_fresh_database_file() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("memory.redb")).await.unwrap();

        let id = Uuid::new_v4();
        store
            .add_node(id, &["Episode".to_string()], props(&[("user_id", "u1")]), None, Some(vec![1.0, 0.0]))
            .await
            .unwrap();

        let fetched = store.get_node(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.properties.get("user_id"), Some(&ScalarValue::from("u1")));
    }

    #[tokio::test]
    async fn duplicate_id_is_a_constraint_violation() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("memory.redb")).await.unwrap();
        let id = Uuid::new_v4();
        store.add_node(id, &[], props(&[]), None, None).await.unwrap();
        let err = store.add_node(id, &[], props(&[]), None, None).await.unwrap_err();
        assert!(matches!(err, Error::StoreConstraintViolation(_)));
    }

    #[tokio::test]
    async fn similarity_search_orders_by_cosine_and_respects_labels() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("memory.redb")).await.unwrap();

        let id_a = Uuid::new_v4();
        store
            .add_node(id_a, &["Derivative".to_string()], props(&[]), None, Some(vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .add_node(Uuid::new_v4(), &["Derivative".to_string()], props(&[]), None, Some(vec![0.0, 1.0]))
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
    async fn delete_subgraph_cascades_edges_and_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.redb");
        let a;
        let b;
        {
            let store = RedbStore::open(&path).await.unwrap();
            a = store.add_node(Uuid::new_v4(), &[], props(&[]), None, None).await.unwrap();
            b = store
                .add_node(Uuid::new_v4(), &[], props(&[("scope", "x")]), None, None)
                .await
                .unwrap();
            store.add_edge(a, "FOLLOWS", b, None).await.unwrap();
        }

        let store = RedbStore::open(&path).await.unwrap();
        assert!(store.get_node(b).await.unwrap().is_some());
        store.delete_subgraph(&props(&[("scope", "x")])).await.unwrap();
        assert!(store.get_node(b).await.unwrap().is_none());
        let traversed = store.traverse_edges(a, "FOLLOWS", Direction::Descending).await.unwrap();
        assert!(traversed.is_empty());
    }
}
