//! CLI-level configuration: which backing store to open and where the
//! session/profile registries live. Mirrors spec.md §6's "declarative map
//! with keys `profile_memory`, `model`, `embedder`, `storage`" — this is
//! the thin on-disk TOML shape the CLI consumes before handing resolved
//! values to the resource initializer's config map.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level CLI configuration, loaded from a TOML file or defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Vector-graph store backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Session manager database settings.
    #[serde(default)]
    pub session: DatabaseConfig,
    /// Profile memory database settings (currently always in-memory).
    #[serde(default)]
    pub profile: ProfileConfig,
}

/// Where episode/derivative nodes and edges are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `"memory"`, `"redb"`, or `"turso"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Filesystem path (redb) or connection URL (turso).
    #[serde(default)]
    pub uri: String,
    /// Auth token, for remote turso connections.
    #[serde(default)]
    pub token: String,
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            uri: String::new(),
            token: String::new(),
        }
    }
}

/// A libSQL-backed database connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL: `:memory:`, `file:...`, or `libsql://...`.
    #[serde(default = "default_session_uri")]
    pub uri: String,
    /// Auth token, for remote connections.
    #[serde(default)]
    pub token: String,
}

fn default_session_uri() -> String {
    ":memory:".to_string()
}

/// Profile memory tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Marks before a user's profile is due for extraction.
    #[serde(default = "default_message_limit")]
    pub message_limit: u32,
    /// Seconds before a user's profile is due for extraction regardless of
    /// mark count.
    #[serde(default = "default_time_limit_sec")]
    pub time_limit_sec: f64,
}

fn default_message_limit() -> u32 {
    10
}

fn default_time_limit_sec() -> f64 {
    300.0
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            message_limit: default_message_limit(),
            time_limit_sec: default_time_limit_sec(),
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            session: DatabaseConfig::default(),
            profile: ProfileConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any key the file omits.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Defaults, suitable for `memory-cli` invocations with no `--config`.
    #[must_use]
    pub fn defaults() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_in_memory_everything() {
        let config = CliConfig::defaults();
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.session.uri, ":memory:");
    }

    #[test]
    fn load_fills_in_missing_keys_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\nbackend = \"redb\"\nuri = \"./data.redb\"\n").unwrap();

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.storage.backend, "redb");
        assert_eq!(config.storage.uri, "./data.redb");
        assert_eq!(config.profile.message_limit, 10);
    }
}
