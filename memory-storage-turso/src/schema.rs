//! Database schema for the libSQL-backed store.

/// Nodes table: one row per `VectorGraphStore` node. `labels`, `properties`,
/// and `embedding` are stored as JSON text — this backend is brute-force,
/// scanning and filtering in Rust rather than pushing predicates into SQL.
pub const CREATE_NODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY NOT NULL,
    labels TEXT NOT NULL,
    properties TEXT NOT NULL,
    user_metadata TEXT,
    embedding TEXT
)
"#;

/// Edges table: one row per directed, labeled edge between two nodes.
pub const CREATE_EDGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS edges (
    id TEXT PRIMARY KEY NOT NULL,
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    label TEXT NOT NULL
)
"#;

/// Index on edges by source node, since `traverse_edges` filters on it.
pub const CREATE_EDGES_FROM_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_id)
"#;

/// Index on edges by target node, for the ascending traversal direction.
pub const CREATE_EDGES_TO_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id)
"#;
