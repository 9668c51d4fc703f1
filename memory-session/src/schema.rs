//! Relational schema for the session registry (spec.md §4.7).

/// A group: the top-level scope a session is created under.
pub const CREATE_GROUPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS groups (
    group_id TEXT PRIMARY KEY NOT NULL,
    configuration TEXT NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

/// A session, uniquely identified by `(group_id, session_id)`.
pub const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    group_id TEXT NOT NULL REFERENCES groups(group_id),
    session_id TEXT NOT NULL,
    configuration TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (group_id, session_id)
)
"#;

/// Participant link table: which users belong to a group, optionally
/// narrowed to one session. A row with `session_id = ''` records a
/// group-level participant (carried over from `create_group`); a row with a
/// real `session_id` records a session-level participant.
pub const CREATE_SESSION_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS session_users (
    group_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    PRIMARY KEY (group_id, session_id, user_id)
)
"#;

/// Same shape as `session_users`, for agent participants.
pub const CREATE_SESSION_AGENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS session_agents (
    group_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    PRIMARY KEY (group_id, session_id, agent_id)
)
"#;

/// Index used by `get_session_by_group`/`delete_group`'s liveness check.
pub const CREATE_SESSION_GROUPS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sessions_group ON sessions(group_id)
"#;

/// Sentinel `session_id` used for group-level (not-yet-session-scoped)
/// participant rows in `session_users`/`session_agents`.
pub const GROUP_SCOPE_SESSION_ID: &str = "";
