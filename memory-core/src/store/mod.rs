//! Vector-Graph Store adapter: a uniform interface to a backing store
//! holding typed nodes with vector-embedded properties and directed labeled
//! edges (spec.md §4.1).
//!
//! Properties are flattened at the storage boundary: filterable keys are
//! stored under a mangled `filterable.<key>` namespace so that
//! `required_properties` filters can be applied as indexable equality
//! predicates, while free-form `user_metadata` is serialized as a single
//! JSON string property.

pub mod mem;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{FilterableProperties, UserMetadata};

/// Prefix every filterable property key is mangled with at the storage
/// boundary, keeping it distinct from the serialized `user_metadata` blob.
pub const FILTERABLE_PREFIX: &str = "filterable.";

/// The property key the serialized `user_metadata` JSON blob is stored
/// under.
pub const USER_METADATA_KEY: &str = "user_metadata";

/// A node persisted in the store: one or more labels, its flattened
/// properties, and an optional embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Store-assigned identity.
    pub id: Uuid,
    /// Labels this node was created with (e.g. `["Episode"]`).
    pub labels: Vec<String>,
    /// Filterable properties (unmangled — the adapter handles the
    /// `filterable.` prefix internally).
    pub properties: FilterableProperties,
    /// Opaque user metadata, if any was supplied.
    pub user_metadata: Option<UserMetadata>,
    /// The node's embedding vector, if it has one.
    pub embedding: Option<Vec<f32>>,
}

/// Direction to traverse an edge or order a directional search in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Traverse/order ascending.
    Ascending,
    /// Traverse/order descending.
    Descending,
}

/// A scalar ordering key used by [`VectorGraphStore::search_directional_nodes`].
#[derive(Debug, Clone, PartialEq)]
pub enum OrderValue {
    /// Order by an integer (e.g. a Unix timestamp).
    Int(i64),
    /// Order by a string.
    String(String),
}

/// Uniform interface to a backing store holding typed nodes with
/// vector-embedded properties and directed labeled edges.
///
/// All operations fail with [`crate::error::Error::StoreUnavailable`] on
/// transport loss, [`crate::error::Error::StoreConstraintViolation`] on
/// uniqueness breaches, and [`crate::error::Error::StoreNotFound`] on
/// missing IDs.
#[async_trait]
pub trait VectorGraphStore: Send + Sync {
    /// Add a node under caller-supplied `id`, with the given labels,
    /// properties, and optional embedding.
    ///
    /// The caller (not the store) assigns identity: episodes and derivatives
    /// already carry a UUID from construction, and callers need that same ID
    /// back out of the store (e.g. to add `DERIVED_FROM`/`FOLLOWS` edges).
    /// Fails with [`crate::error::Error::StoreConstraintViolation`] if `id`
    /// already exists.
    async fn add_node(
        &self,
        id: Uuid,
        labels: &[String],
        properties: FilterableProperties,
        user_metadata: Option<UserMetadata>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Uuid>;

    /// Add a directed, labeled edge between two existing nodes.
    async fn add_edge(
        &self,
        from: Uuid,
        label: &str,
        to: Uuid,
        properties: Option<FilterableProperties>,
    ) -> Result<()>;

    /// Similarity search over nodes carrying any of `labels`, restricted to
    /// nodes whose filterable properties equal `required_properties`
    /// exactly, ordered by the embedder's similarity metric descending
    /// (higher = more similar). Ties are broken by newer timestamp first,
    /// where the store recognizes a `timestamp` filterable property.
    async fn search_similar_nodes(
        &self,
        query_embedding: &[f32],
        labels: &[String],
        required_properties: &FilterableProperties,
        limit: usize,
    ) -> Result<Vec<(Node, f32)>>;

    /// Strict ordering search on a chosen filterable property.
    /// `start_at_value` is an exclusive cursor.
    async fn search_directional_nodes(
        &self,
        labels: &[String],
        required_properties: &FilterableProperties,
        order_by: &str,
        direction: Direction,
        start_at_value: Option<OrderValue>,
        limit: usize,
    ) -> Result<Vec<Node>>;

    /// Traverse edges of `edge_label` from `from` in the given direction,
    /// returning the nodes on the other end.
    async fn traverse_edges(
        &self,
        from: Uuid,
        edge_label: &str,
        direction: Direction,
    ) -> Result<Vec<Node>>;

    /// Cascading delete of every node (and its edges) whose filterable
    /// properties equal `required_properties` exactly.
    async fn delete_subgraph(&self, required_properties: &FilterableProperties) -> Result<()>;

    /// Fetch a single node by ID, if present.
    async fn get_node(&self, id: Uuid) -> Result<Option<Node>>;

    /// Update an existing node in place (used to flip `derivations_complete`
    /// after replay, and by the profile store for update/delete commands).
    async fn update_node(
        &self,
        id: Uuid,
        properties: FilterableProperties,
        user_metadata: Option<UserMetadata>,
        embedding: Option<Vec<f32>>,
    ) -> Result<()>;

    /// Delete a single node (and any edges touching it).
    async fn delete_node(&self, id: Uuid) -> Result<()>;
}
