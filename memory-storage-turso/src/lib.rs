//! # Memory Storage - Turso
//!
//! A [`libsql`]-backed [`memory_core::store::VectorGraphStore`] for durable,
//! server-deployable persistence. Like `memory-storage-redb`, this is a
//! brute-force implementation: every scan loads the matching rows and
//! filters/sorts them in Rust, rather than pushing predicates into SQL —
//! there is no native vector index to lean on here.
//!
//! ## Example
//!
//! ```no_run
//! use memory_storage_turso::TursoStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = TursoStore::open("file:memory.db", "").await?;
//! # Ok(())
//! # }
//! ```

mod convert;
mod schema;

use std::collections::HashMap;

use async_trait::async_trait;
use libsql::{params, Builder, Connection, Database};
use memory_core::error::{Error, Result};
use memory_core::store::{Direction, Node, OrderValue, VectorGraphStore};
use memory_core::types::{FilterableProperties, UserMetadata};
use tracing::info;
use uuid::Uuid;

use convert::{cmp_order, cosine, has_any_label, matches_required, order_key, passes_cursor, StoredNode};

fn storage_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::StoreUnavailable(format!("{context}: {err}"))
}

/// A durable `VectorGraphStore` over a libSQL database: a local file, an
/// in-memory database, or a remote Turso endpoint.
pub struct TursoStore {
    db: Database,
}

impl TursoStore {
    /// Open (or create) the database at `url` and ensure its schema exists.
    ///
    /// `url` must be `libsql://...` (remote, requiring a non-empty `token`),
    /// `file:...` (local file), or `:memory:`. Any other scheme is rejected
    /// as an [`Error::InvalidConfig`].
    pub async fn open(url: &str, token: &str) -> Result<Self> {
        info!(url, "opening turso store");

        if !url.starts_with("libsql://") && !url.starts_with("file:") && url != ":memory:" {
            return Err(Error::InvalidConfig(format!(
                "unsupported database url scheme: {url} (expected libsql://, file:, or :memory:)"
            )));
        }
        if url.starts_with("libsql://") && token.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "authentication token required for remote libsql:// connections".to_string(),
            ));
        }

        let db = if let Some(stripped) = url.strip_prefix("libsql://") {
            Builder::new_remote(format!("libsql://{stripped}"), token.to_string())
                .build()
                .await
                .map_err(|e| storage_err("failed to connect to turso", e))?
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path)
                .build()
                .await
                .map_err(|e| storage_err("failed to open local libsql database", e))?
        };

        let store = Self { db };
        store.initialize_schema().await?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| storage_err("failed to open connection", e))
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(schema::CREATE_NODES_TABLE, ())
            .await
            .map_err(|e| storage_err("create nodes table failed", e))?;
        conn.execute(schema::CREATE_EDGES_TABLE, ())
            .await
            .map_err(|e| storage_err("create edges table failed", e))?;
        conn.execute(schema::CREATE_EDGES_FROM_INDEX, ())
            .await
            .map_err(|e| storage_err("create edges-from index failed", e))?;
        conn.execute(schema::CREATE_EDGES_TO_INDEX, ())
            .await
            .map_err(|e| storage_err("create edges-to index failed", e))?;
        Ok(())
    }

    async fn node_exists(&self, conn: &Connection, id: Uuid) -> Result<bool> {
        let mut rows = conn
            .query("SELECT id FROM nodes WHERE id = ?", params![id.to_string()])
            .await
            .map_err(|e| storage_err("select node failed", e))?;
        Ok(rows.next().await.map_err(|e| storage_err("row read failed", e))?.is_some())
    }

    async fn fetch_node(&self, conn: &Connection, id: Uuid) -> Result<Option<StoredNode>> {
        let mut rows = conn
            .query(
                "SELECT id, labels, properties, user_metadata, embedding FROM nodes WHERE id = ?",
                params![id.to_string()],
            )
            .await
            .map_err(|e| storage_err("select node failed", e))?;
        let Some(row) = rows.next().await.map_err(|e| storage_err("row read failed", e))? else {
            return Ok(None);
        };
        Ok(Self::decode_row(&row))
    }

    async fn load_all_nodes(&self, conn: &Connection) -> Result<Vec<StoredNode>> {
        let mut rows = conn
            .query("SELECT id, labels, properties, user_metadata, embedding FROM nodes", ())
            .await
            .map_err(|e| storage_err("select nodes failed", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| storage_err("row read failed", e))? {
            if let Some(node) = Self::decode_row(&row) {
                out.push(node);
            }
        }
        Ok(out)
    }

    fn decode_row(row: &libsql::Row) -> Option<StoredNode> {
        let id: String = row.get(0).ok()?;
        let labels: String = row.get(1).ok()?;
        let properties: String = row.get(2).ok()?;
        let user_metadata: Option<String> = row.get(3).ok();
        let embedding: Option<String> = row.get(4).ok();
        StoredNode::decode(
            &id,
            &labels,
            &properties,
            user_metadata.as_deref(),
            embedding.as_deref(),
        )
    }
}

#[async_trait]
impl VectorGraphStore for TursoStore {
    async fn add_node(
        &self,
        id: Uuid,
        labels: &[String],
        properties: FilterableProperties,
        user_metadata: Option<UserMetadata>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Uuid> {
        let conn = self.connect()?;
        if self.node_exists(&conn, id).await? {
            return Err(Error::StoreConstraintViolation(format!("node {id} already exists")));
        }

        let stored = StoredNode {
            id,
            labels: labels.to_vec(),
            properties,
            user_metadata,
            embedding,
        };
        conn.execute(
            "INSERT INTO nodes (id, labels, properties, user_metadata, embedding) VALUES (?, ?, ?, ?, ?)",
            params![
                id.to_string(),
                stored.encode_labels(),
                stored.encode_properties(),
                stored.encode_user_metadata(),
                stored.encode_embedding(),
            ],
        )
        .await
        .map_err(|e| storage_err("insert node failed", e))?;
        Ok(id)
    }

    async fn add_edge(
        &self,
        from: Uuid,
        label: &str,
        to: Uuid,
        _properties: Option<FilterableProperties>,
    ) -> Result<()> {
        let conn = self.connect()?;
        if !self.node_exists(&conn, from).await? {
            return Err(Error::StoreNotFound(from.to_string()));
        }
        if !self.node_exists(&conn, to).await? {
            return Err(Error::StoreNotFound(to.to_string()));
        }
        conn.execute(
            "INSERT INTO edges (id, from_id, to_id, label) VALUES (?, ?, ?, ?)",
            params![Uuid::new_v4().to_string(), from.to_string(), to.to_string(), label.to_string()],
        )
        .await
        .map_err(|e| storage_err("insert edge failed", e))?;
        Ok(())
    }

    async fn search_similar_nodes(
        &self,
        query_embedding: &[f32],
        labels: &[String],
        required_properties: &FilterableProperties,
        limit: usize,
    ) -> Result<Vec<(Node, f32)>> {
        let conn = self.connect()?;
        let nodes = self.load_all_nodes(&conn).await?;

        let mut scored: Vec<(StoredNode, f32)> = nodes
            .into_iter()
            .filter(|n| has_any_label(n, labels) && matches_required(n, required_properties))
            .filter_map(|n| n.embedding.as_ref().map(|emb| cosine(query_embedding, emb)).map(|s| (n, s)))
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
        let conn = self.connect()?;
        let nodes = self.load_all_nodes(&conn).await?;

        let mut matching: Vec<StoredNode> = nodes
            .into_iter()
            .filter(|n| has_any_label(n, labels) && matches_required(n, required_properties))
            .filter(|n| passes_cursor(n, order_by, direction, start_at_value.as_ref()))
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
        Ok(matching.into_iter().map(Node::from).collect())
    }

    async fn traverse_edges(&self, from: Uuid, edge_label: &str, direction: Direction) -> Result<Vec<Node>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT from_id, to_id, label FROM edges WHERE label = ?", params![edge_label.to_string()])
            .await
            .map_err(|e| storage_err("select edges failed", e))?;

        let mut target_ids = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| storage_err("row read failed", e))? {
            let from_id: String = row.get(0).map_err(|e| storage_err("column read failed", e))?;
            let to_id: String = row.get(1).map_err(|e| storage_err("column read failed", e))?;
            let (Ok(from_id), Ok(to_id)) = (from_id.parse::<Uuid>(), to_id.parse::<Uuid>()) else {
                continue;
            };
            match direction {
                Direction::Descending if from_id == from => target_ids.push(to_id),
                Direction::Ascending if to_id == from => target_ids.push(from_id),
                _ => {}
            }
        }

        let mut out = Vec::with_capacity(target_ids.len());
        for id in target_ids {
            if let Some(node) = self.fetch_node(&conn, id).await? {
                out.push(Node::from(node));
            }
        }
        Ok(out)
    }

    async fn delete_subgraph(&self, required_properties: &FilterableProperties) -> Result<()> {
        let conn = self.connect()?;
        let nodes = self.load_all_nodes(&conn).await?;
        let to_remove: Vec<Uuid> = nodes
            .into_iter()
            .filter(|n| matches_required(n, required_properties))
            .map(|n| n.id)
            .collect();

        for id in &to_remove {
            conn.execute("DELETE FROM nodes WHERE id = ?", params![id.to_string()])
                .await
                .map_err(|e| storage_err("delete node failed", e))?;
            conn.execute(
                "DELETE FROM edges WHERE from_id = ? OR to_id = ?",
                params![id.to_string(), id.to_string()],
            )
            .await
            .map_err(|e| storage_err("delete edges failed", e))?;
        }
        Ok(())
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        let conn = self.connect()?;
        Ok(self.fetch_node(&conn, id).await?.map(Node::from))
    }

    async fn update_node(
        &self,
        id: Uuid,
        properties: FilterableProperties,
        user_metadata: Option<UserMetadata>,
        embedding: Option<Vec<f32>>,
    ) -> Result<()> {
        let conn = self.connect()?;
        let mut node = self
            .fetch_node(&conn, id)
            .await?
            .ok_or_else(|| Error::StoreNotFound(id.to_string()))?;

        node.properties = properties;
        if user_metadata.is_some() {
            node.user_metadata = user_metadata;
        }
        if embedding.is_some() {
            node.embedding = embedding;
        }

        conn.execute(
            "UPDATE nodes SET properties = ?, user_metadata = ?, embedding = ? WHERE id = ?",
            params![
                node.encode_properties(),
                node.encode_user_metadata(),
                node.encode_embedding(),
                id.to_string(),
            ],
        )
        .await
        .map_err(|e| storage_err("update node failed", e))?;
        Ok(())
    }

    async fn delete_node(&self, id: Uuid) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM nodes WHERE id = ?", params![id.to_string()])
            .await
            .map_err(|e| storage_err("delete node failed", e))?;
        conn.execute(
            "DELETE FROM edges WHERE from_id = ? OR to_id = ?",
            params![id.to_string(), id.to_string()],
        )
        .await
        .map_err(|e| storage_err("delete edges failed", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::types::ScalarValue;

    fn props(pairs: &[(&str, &str)]) -> FilterableProperties {
        pairs.iter().map(|(k, v)| (k.to_string(), ScalarValue::from(*v))).collect()
    }

    #[tokio::test]
    async fn round_trips_a_node_through_an_in_memory_database() {
        let store = TursoStore::open(":memory:", "").await.unwrap();
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
        let store = TursoStore::open(":memory:", "").await.unwrap();
        let id = Uuid::new_v4();
        store.add_node(id, &[], props(&[]), None, None).await.unwrap();
        let err = store.add_node(id, &[], props(&[]), None, None).await.unwrap_err();
        assert!(matches!(err, Error::StoreConstraintViolation(_)));
    }

    #[tokio::test]
    async fn similarity_search_orders_by_cosine_and_respects_labels() {
        let store = TursoStore::open(":memory:", "").await.unwrap();
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
    async fn delete_subgraph_cascades_edges() {
        let store = TursoStore::open(":memory:", "").await.unwrap();
        let a = store.add_node(Uuid::new_v4(), &[], props(&[]), None, None).await.unwrap();
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
    async fn rejects_insecure_url_schemes() {
        let err = TursoStore::open("http://example.com", "").await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
