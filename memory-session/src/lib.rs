//! # Memory Session
//!
//! The session manager (spec.md §4.7): groups, sessions, and the
//! participant link tables that back `get_session_by_{group,user,agent}`,
//! over a [`libsql`] relational schema.

mod schema;

use libsql::{params, Builder, Connection, Database};
use memory_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use schema::GROUP_SCOPE_SESSION_ID;

/// A resolved session: its identity, participants, and configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// The owning group.
    pub group_id: String,
    /// This session's ID, unique within its group.
    pub session_id: String,
    /// Users participating in this session.
    pub user_ids: Vec<String>,
    /// Agents participating in this session.
    pub agent_ids: Vec<String>,
    /// Caller-supplied configuration, as passed to `create_session`.
    pub configuration: serde_json::Value,
}

fn storage_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::StoreUnavailable(format!("{context}: {err}"))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Groups, sessions, and participant link tables over a libSQL database.
pub struct SessionManager {
    db: Database,
}

impl SessionManager {
    /// Build a manager from a resource-initializer-style config map. Expects
    /// a non-empty `uri` string; an optional `token` for remote connections.
    /// Missing or empty `uri` fails with [`Error::InvalidConfig`].
    pub async fn from_config(config: &serde_json::Value) -> Result<Self> {
        let uri = config
            .get("uri")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidConfig("session manager config requires a non-empty `uri`".to_string())
            })?;
        let token = config.get("token").and_then(|v| v.as_str()).unwrap_or("");
        Self::open(uri, token).await
    }

    /// Open (or create) the database at `url` and ensure its schema exists.
    pub async fn open(url: &str, token: &str) -> Result<Self> {
        info!(url, "opening session manager store");
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

        let manager = Self { db };
        manager.initialize_schema().await?;
        Ok(manager)
    }

    fn connect(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| storage_err("failed to open connection", e))
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        for stmt in [
            schema::CREATE_GROUPS_TABLE,
            schema::CREATE_SESSIONS_TABLE,
            schema::CREATE_SESSION_USERS_TABLE,
            schema::CREATE_SESSION_AGENTS_TABLE,
            schema::CREATE_SESSION_GROUPS_INDEX,
        ] {
            conn.execute(stmt, ())
                .await
                .map_err(|e| storage_err("schema initialization failed", e))?;
        }
        Ok(())
    }

    async fn group_exists(&self, conn: &Connection, group_id: &str) -> Result<bool> {
        let mut rows = conn
            .query("SELECT group_id FROM groups WHERE group_id = ?", params![group_id])
            .await
            .map_err(|e| storage_err("select group failed", e))?;
        Ok(rows.next().await.map_err(|e| storage_err("row read failed", e))?.is_some())
    }

    async fn session_exists(&self, conn: &Connection, group_id: &str, session_id: &str) -> Result<bool> {
        let mut rows = conn
            .query(
                "SELECT session_id FROM sessions WHERE group_id = ? AND session_id = ?",
                params![group_id, session_id],
            )
            .await
            .map_err(|e| storage_err("select session failed", e))?;
        Ok(rows.next().await.map_err(|e| storage_err("row read failed", e))?.is_some())
    }

    async fn participants(
        &self,
        conn: &Connection,
        table: &str,
        column: &str,
        group_id: &str,
        session_id: &str,
    ) -> Result<Vec<String>> {
        let sql = format!("SELECT {column} FROM {table} WHERE group_id = ? AND session_id = ?");
        let mut rows = conn
            .query(&sql, params![group_id, session_id])
            .await
            .map_err(|e| storage_err("select participants failed", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| storage_err("row read failed", e))? {
            let value: String = row.get(0).map_err(|e| storage_err("column read failed", e))?;
            out.push(value);
        }
        Ok(out)
    }

    async fn insert_participants(
        &self,
        conn: &Connection,
        table: &str,
        column: &str,
        group_id: &str,
        session_id: &str,
        ids: &[String],
    ) -> Result<()> {
        let sql = format!(
            "INSERT OR IGNORE INTO {table} (group_id, session_id, {column}) VALUES (?, ?, ?)"
        );
        for id in ids {
            conn.execute(&sql, params![group_id, session_id, id.clone()])
                .await
                .map_err(|e| storage_err("insert participant failed", e))?;
        }
        Ok(())
    }

    /// Create a new group with its initial participants. Fails with
    /// [`Error::InvalidArgument`] if both `agent_ids` and `user_ids` are
    /// empty, or [`Error::StoreConstraintViolation`] if `group_id` exists.
    pub async fn create_group(
        &self,
        group_id: &str,
        agent_ids: &[String],
        user_ids: &[String],
        configuration: serde_json::Value,
    ) -> Result<()> {
        if agent_ids.is_empty() && user_ids.is_empty() {
            return Err(Error::InvalidArgument(
                "create_group requires at least one agent or user id".to_string(),
            ));
        }
        let conn = self.connect()?;
        if self.group_exists(&conn, group_id).await? {
            return Err(Error::StoreConstraintViolation(format!("group {group_id} already exists")));
        }

        conn.execute(
            "INSERT INTO groups (group_id, configuration, created_at) VALUES (?, ?, ?)",
            params![group_id, configuration.to_string(), now_millis()],
        )
        .await
        .map_err(|e| storage_err("insert group failed", e))?;

        self.insert_participants(
            &conn, "session_users", "user_id", group_id, GROUP_SCOPE_SESSION_ID, user_ids,
        )
        .await?;
        self.insert_participants(
            &conn, "session_agents", "agent_id", group_id, GROUP_SCOPE_SESSION_ID, agent_ids,
        )
        .await?;
        Ok(())
    }

    /// Create a session under an existing group. Fails with
    /// [`Error::StoreNotFound`] if `group_id` doesn't exist, or
    /// [`Error::SessionAlreadyExists`] if `(group_id, session_id)` does.
    pub async fn create_session(
        &self,
        group_id: &str,
        session_id: &str,
        configuration: serde_json::Value,
    ) -> Result<SessionInfo> {
        let conn = self.connect()?;
        if !self.group_exists(&conn, group_id).await? {
            return Err(Error::StoreNotFound(group_id.to_string()));
        }
        if self.session_exists(&conn, group_id, session_id).await? {
            return Err(Error::SessionAlreadyExists {
                group_id: group_id.to_string(),
                session_id: session_id.to_string(),
            });
        }

        conn.execute(
            "INSERT INTO sessions (group_id, session_id, configuration, created_at) VALUES (?, ?, ?, ?)",
            params![group_id, session_id, configuration.to_string(), now_millis()],
        )
        .await
        .map_err(|e| storage_err("insert session failed", e))?;

        let group_user_ids = self
            .participants(&conn, "session_users", "user_id", group_id, GROUP_SCOPE_SESSION_ID)
            .await?;
        let group_agent_ids = self
            .participants(&conn, "session_agents", "agent_id", group_id, GROUP_SCOPE_SESSION_ID)
            .await?;
        self.insert_participants(&conn, "session_users", "user_id", group_id, session_id, &group_user_ids)
            .await?;
        self.insert_participants(&conn, "session_agents", "agent_id", group_id, session_id, &group_agent_ids)
            .await?;

        Ok(SessionInfo {
            group_id: group_id.to_string(),
            session_id: session_id.to_string(),
            user_ids: group_user_ids,
            agent_ids: group_agent_ids,
            configuration,
        })
    }

    /// Idempotent `create_group` + `create_session`: creates whichever of
    /// the group/session is missing, then returns the resulting
    /// [`SessionInfo`] unchanged if both already existed.
    pub async fn create_session_if_not_exist(
        &self,
        group_id: &str,
        session_id: &str,
        agent_ids: &[String],
        user_ids: &[String],
        configuration: serde_json::Value,
    ) -> Result<SessionInfo> {
        let conn = self.connect()?;
        if !self.group_exists(&conn, group_id).await? {
            self.create_group(group_id, agent_ids, user_ids, configuration.clone()).await?;
        }
        if self.session_exists(&conn, group_id, session_id).await? {
            return self.open_session(group_id, session_id).await;
        }
        self.create_session(group_id, session_id, configuration).await
    }

    /// Look up an existing session. Fails with [`Error::SessionNotFound`]
    /// if absent.
    pub async fn open_session(&self, group_id: &str, session_id: &str) -> Result<SessionInfo> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT configuration FROM sessions WHERE group_id = ? AND session_id = ?",
                params![group_id, session_id],
            )
            .await
            .map_err(|e| storage_err("select session failed", e))?;
        let Some(row) = rows.next().await.map_err(|e| storage_err("row read failed", e))? else {
            return Err(Error::SessionNotFound {
                group_id: group_id.to_string(),
                session_id: session_id.to_string(),
            });
        };
        let configuration_text: String = row.get(0).map_err(|e| storage_err("column read failed", e))?;
        let configuration = serde_json::from_str(&configuration_text).unwrap_or(serde_json::Value::Null);

        let user_ids = self.participants(&conn, "session_users", "user_id", group_id, session_id).await?;
        let agent_ids = self.participants(&conn, "session_agents", "agent_id", group_id, session_id).await?;

        Ok(SessionInfo {
            group_id: group_id.to_string(),
            session_id: session_id.to_string(),
            user_ids,
            agent_ids,
            configuration,
        })
    }

    async fn sessions_where(&self, column: &str, table: &str, id: &str) -> Result<Vec<SessionInfo>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT DISTINCT group_id, session_id FROM {table} WHERE {column} = ? AND session_id != ?"
        );
        let mut rows = conn
            .query(&sql, params![id, GROUP_SCOPE_SESSION_ID])
            .await
            .map_err(|e| storage_err("select sessions failed", e))?;
        let mut pairs = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| storage_err("row read failed", e))? {
            let group_id: String = row.get(0).map_err(|e| storage_err("column read failed", e))?;
            let session_id: String = row.get(1).map_err(|e| storage_err("column read failed", e))?;
            pairs.push((group_id, session_id));
        }
        let mut out = Vec::with_capacity(pairs.len());
        for (group_id, session_id) in pairs {
            out.push(self.open_session(&group_id, &session_id).await?);
        }
        Ok(out)
    }

    /// All sessions under `group_id`.
    pub async fn get_session_by_group(&self, group_id: &str) -> Result<Vec<SessionInfo>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT session_id FROM sessions WHERE group_id = ?", params![group_id])
            .await
            .map_err(|e| storage_err("select sessions failed", e))?;
        let mut session_ids = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| storage_err("row read failed", e))? {
            session_ids.push(row.get::<String>(0).map_err(|e| storage_err("column read failed", e))?);
        }
        let mut out = Vec::with_capacity(session_ids.len());
        for session_id in session_ids {
            out.push(self.open_session(group_id, &session_id).await?);
        }
        Ok(out)
    }

    /// All sessions `user_id` participates in.
    pub async fn get_session_by_user(&self, user_id: &str) -> Result<Vec<SessionInfo>> {
        self.sessions_where("user_id", "session_users", user_id).await
    }

    /// All sessions `agent_id` participates in.
    pub async fn get_session_by_agent(&self, agent_id: &str) -> Result<Vec<SessionInfo>> {
        self.sessions_where("agent_id", "session_agents", agent_id).await
    }

    /// Delete a session and its participant link rows. Fails with
    /// [`Error::SessionNotFound`] if absent.
    pub async fn delete_session(&self, group_id: &str, session_id: &str) -> Result<()> {
        let conn = self.connect()?;
        if !self.session_exists(&conn, group_id, session_id).await? {
            return Err(Error::SessionNotFound {
                group_id: group_id.to_string(),
                session_id: session_id.to_string(),
            });
        }
        conn.execute(
            "DELETE FROM session_users WHERE group_id = ? AND session_id = ?",
            params![group_id, session_id],
        )
        .await
        .map_err(|e| storage_err("delete session_users failed", e))?;
        conn.execute(
            "DELETE FROM session_agents WHERE group_id = ? AND session_id = ?",
            params![group_id, session_id],
        )
        .await
        .map_err(|e| storage_err("delete session_agents failed", e))?;
        conn.execute(
            "DELETE FROM sessions WHERE group_id = ? AND session_id = ?",
            params![group_id, session_id],
        )
        .await
        .map_err(|e| storage_err("delete session failed", e))?;
        Ok(())
    }

    /// Delete a group. Fails with [`Error::GroupHasSessions`] if any
    /// session still exists under it.
    pub async fn delete_group(&self, group_id: &str) -> Result<()> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT session_id FROM sessions WHERE group_id = ? LIMIT 1", params![group_id])
            .await
            .map_err(|e| storage_err("select sessions failed", e))?;
        if rows.next().await.map_err(|e| storage_err("row read failed", e))?.is_some() {
            return Err(Error::GroupHasSessions { group_id: group_id.to_string() });
        }

        conn.execute(
            "DELETE FROM session_users WHERE group_id = ? AND session_id = ?",
            params![group_id, GROUP_SCOPE_SESSION_ID],
        )
        .await
        .map_err(|e| storage_err("delete session_users failed", e))?;
        conn.execute(
            "DELETE FROM session_agents WHERE group_id = ? AND session_id = ?",
            params![group_id, GROUP_SCOPE_SESSION_ID],
        )
        .await
        .map_err(|e| storage_err("delete session_agents failed", e))?;
        conn.execute("DELETE FROM groups WHERE group_id = ?", params![group_id])
            .await
            .map_err(|e| storage_err("delete group failed", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_lifecycle_scenario_from_spec() {
        let manager = SessionManager::open(":memory:", "").await.unwrap();

        manager
            .create_group("g1", &["a1".to_string()], &["u1".to_string()], serde_json::json!({}))
            .await
            .unwrap();
        manager.create_session("g1", "s1", serde_json::json!({})).await.unwrap();

        let err = manager.create_session("g1", "s1", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::SessionAlreadyExists { .. }));

        let err = manager.delete_group("g1").await.unwrap_err();
        assert!(matches!(err, Error::GroupHasSessions { .. }));

        manager.delete_session("g1", "s1").await.unwrap();
        manager.delete_group("g1").await.unwrap();
    }

    #[tokio::test]
    async fn create_group_rejects_empty_participants() {
        let manager = SessionManager::open(":memory:", "").await.unwrap();
        let err = manager.create_group("g1", &[], &[], serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_session_if_not_exist_is_idempotent() {
        let manager = SessionManager::open(":memory:", "").await.unwrap();
        let first = manager
            .create_session_if_not_exist(
                "g1", "s1", &["a1".to_string()], &["u1".to_string()], serde_json::json!({"k": 1}),
            )
            .await
            .unwrap();
        let second = manager
            .create_session_if_not_exist(
                "g1", "s1", &["a1".to_string()], &["u1".to_string()], serde_json::json!({"k": 1}),
            )
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.get_session_by_group("g1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_session_by_user_finds_sessions_created_from_group_participants() {
        let manager = SessionManager::open(":memory:", "").await.unwrap();
        manager
            .create_group("g1", &[], &["u1".to_string()], serde_json::json!({}))
            .await
            .unwrap();
        manager.create_session("g1", "s1", serde_json::json!({})).await.unwrap();

        let sessions = manager.get_session_by_user("u1").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "s1");
    }

    #[tokio::test]
    async fn from_config_rejects_missing_uri() {
        let err = SessionManager::from_config(&serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
