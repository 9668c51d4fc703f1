//! Error kinds shared across the memory engine.

/// Result type alias used throughout `memory-core` and its sibling crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error kinds surfaced to callers of the in-process API.
///
/// Every failure carries one of these kinds plus a human-readable string;
/// callers are never expected to match on anything beyond this enum.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad configuration at construction time.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A resource definition referenced an ID the initializer could not resolve.
    #[error("unresolved dependency: {0}")]
    UnresolvedDependency(String),

    /// The resource dependency graph contains a cycle.
    #[error("cyclic dependency detected among resources: {0:?}")]
    CyclicDependency(Vec<String>),

    /// The backing vector-graph store is unreachable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A required node/edge was not found in the store.
    #[error("store entity not found: {0}")]
    StoreNotFound(String),

    /// A uniqueness or referential constraint was violated.
    #[error("store constraint violation: {0}")]
    StoreConstraintViolation(String),

    /// An external LLM/embedder call returned an API-level error.
    #[error("external service API error: {0}")]
    ExternalServiceAPIError(String),

    /// An external LLM/embedder/store call exceeded its per-call deadline.
    #[error("external service timed out: {0}")]
    ExternalServiceTimeout(String),

    /// Caller supplied an invalid argument (empty query, malformed command, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A query was answered with reduced fidelity (e.g. the reranker fell back).
    ///
    /// Only raised as an `Err` when the degradation also means the result is
    /// empty (e.g. embedding failure); reranker-only degradation is instead
    /// reported as a warning alongside a normal successful response — see
    /// [`crate::declarative::QueryOutcome`].
    #[error("query degraded: {0}")]
    QueryDegraded(String),

    /// `create_session` was called for a `(group_id, session_id)` that already exists.
    #[error("session already exists: group={group_id} session={session_id}")]
    SessionAlreadyExists {
        /// Group ID of the conflicting session.
        group_id: String,
        /// Session ID of the conflicting session.
        session_id: String,
    },

    /// A session lookup found no matching row.
    #[error("session not found: group={group_id} session={session_id}")]
    SessionNotFound {
        /// Group ID that was looked up.
        group_id: String,
        /// Session ID that was looked up.
        session_id: String,
    },

    /// `delete_group` was called on a group that still has live sessions.
    #[error("group has sessions: {group_id}")]
    GroupHasSessions {
        /// Group ID that still has sessions attached.
        group_id: String,
    },
}

impl Error {
    /// Whether this error reflects a transient condition worth retrying.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_)
                | Error::ExternalServiceTimeout(_)
                | Error::ExternalServiceAPIError(_)
        )
    }
}
