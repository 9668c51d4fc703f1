//! Table definitions for the redb-backed store.

use redb::TableDefinition;

/// Node rows, keyed by the node's UUID (as a string) and holding a
/// `serde_json`-encoded [`crate::StoredNode`].
pub(crate) const NODES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Edge rows, keyed by a store-internal edge UUID (as a string) and holding
/// a `serde_json`-encoded [`crate::StoredEdge`]. Edges have no identity of
/// their own at the `VectorGraphStore` layer, so the key only needs to be
/// unique, not meaningful.
pub(crate) const EDGES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("edges");
