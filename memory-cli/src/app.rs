//! Subcommand definitions and dispatch. Each subcommand wires a fresh
//! `DeclarativeMemory`/`SessionManager`/`ProfileMemory` from `CliConfig`,
//! runs one operation, and prints the result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use memory_core::declarative::DeclarativeMemory;
use memory_core::deriver::sentence_split::SentenceSplitDeriver;
use memory_core::embedder::{Embedder, MockEmbedder, SimilarityMetric};
use memory_core::episode::Episode;
use memory_core::mutator::identity::IdentityMutator;
use memory_core::postulator::previous_n::PreviousNPostulator;
use memory_core::reranker::embedder_similarity::EmbedderSimilarityReranker;
use memory_core::store::mem::InMemoryStore;
use memory_core::store::VectorGraphStore;
use memory_core::types::{ContentType, FilterableProperties, ScalarValue};
use memory_profile::{InMemoryProfileStorage, ProfileMemory, ProfilePrompt};
use memory_session::SessionManager;

use crate::config::CliConfig;
use crate::output::{emit, OutputFormat};

/// The conversational memory engine's command-line interface.
#[derive(Debug, Parser)]
#[command(name = "memory-cli", about = "Episodes, sessions, and profiles over the conversational memory engine")]
pub struct Cli {
    /// Path to a TOML config file; defaults to in-memory everything.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Episodic memory: ingest and query.
    #[command(subcommand)]
    Episode(EpisodeCommand),
    /// Session manager: groups and sessions.
    #[command(subcommand)]
    Session(SessionCommand),
    /// Profile memory: persona messages and profile reads.
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Debug, Subcommand)]
pub enum EpisodeCommand {
    /// Ingest one episode.
    Add {
        /// Message content.
        content: String,
        /// Producer (user or agent) ID.
        #[arg(long)]
        producer_id: String,
        /// Free-string episode classification.
        #[arg(long, default_value = "chat")]
        episode_type: String,
        /// `session_id=value` filterable properties, repeatable.
        #[arg(long = "scope", value_parser = parse_key_value)]
        scope: Vec<(String, String)>,
    },
    /// Query episodic memory.
    Query {
        /// Query text.
        query: String,
        /// Maximum derivatives to return.
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// `session_id=value` filterable properties, repeatable.
        #[arg(long = "scope", value_parser = parse_key_value)]
        scope: Vec<(String, String)>,
    },
    /// Delete every episode/derivative matching a scope filter.
    Delete {
        /// `session_id=value` filterable properties, repeatable.
        #[arg(long = "scope", value_parser = parse_key_value)]
        scope: Vec<(String, String)>,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Create a group with its initial participants.
    CreateGroup {
        group_id: String,
        #[arg(long = "agent")]
        agent_ids: Vec<String>,
        #[arg(long = "user")]
        user_ids: Vec<String>,
    },
    /// Create a session under an existing group.
    CreateSession { group_id: String, session_id: String },
    /// Look up a session.
    Get { group_id: String, session_id: String },
    /// Delete a session.
    DeleteSession { group_id: String, session_id: String },
    /// Delete a group (fails if it still has sessions).
    DeleteGroup { group_id: String },
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Ingest a persona message.
    AddMessage {
        content: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        speaker: Option<String>,
    },
    /// Read a user's full profile.
    Get { user_id: String },
    /// Semantic profile search.
    Search {
        user_id: String,
        query: String,
        #[arg(long, default_value_t = 5)]
        k: usize,
        #[arg(long, default_value_t = 0.0)]
        min_similarity: f32,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn scope_filter(pairs: &[(String, String)]) -> FilterableProperties {
    pairs.iter().map(|(k, v)| (k.clone(), ScalarValue::String(v.clone()))).collect()
}

async fn open_store(config: &CliConfig) -> Result<Arc<dyn VectorGraphStore>> {
    match config.storage.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "redb")]
        "redb" => {
            let store = memory_storage_redb::RedbStore::open(std::path::Path::new(&config.storage.uri))
                .await
                .context("opening redb store")?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "turso")]
        "turso" => {
            let store = memory_storage_turso::TursoStore::open(&config.storage.uri, &config.storage.token)
                .await
                .context("opening turso store")?;
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("unknown storage backend `{other}`"),
    }
}

fn build_declarative_memory(store: Arc<dyn VectorGraphStore>) -> DeclarativeMemory {
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(32, SimilarityMetric::Cosine));
    DeclarativeMemory::new(
        store,
        Arc::clone(&embedder),
        Arc::new(PreviousNPostulator::new(5, vec!["session_id".to_string()])),
        Arc::new(SentenceSplitDeriver),
        Arc::new(IdentityMutator),
        Arc::new(EmbedderSimilarityReranker::new(embedder)),
    )
}

/// Run the parsed CLI invocation.
pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::defaults(),
    };

    match cli.command {
        Command::Episode(cmd) => run_episode(cmd, &config, cli.format).await,
        Command::Session(cmd) => run_session(cmd, &config, cli.format).await,
        Command::Profile(cmd) => run_profile(cmd, &config, cli.format).await,
    }
}

async fn run_episode(cmd: EpisodeCommand, config: &CliConfig, format: OutputFormat) -> Result<()> {
    let store = open_store(config).await?;
    let memory = build_declarative_memory(store);

    match cmd {
        EpisodeCommand::Add { content, producer_id, episode_type, scope } => {
            let episode = Episode::new(
                episode_type,
                ContentType::String,
                content,
                Utc::now(),
                producer_id,
                scope_filter(&scope),
                serde_json::Value::Null,
            );
            memory.ingest(episode.clone()).await.context("ingesting episode")?;
            emit(&serde_json::json!({"episode_id": episode.id}), format);
        }
        EpisodeCommand::Query { query, limit, scope } => {
            let outcome = memory.query(&query, &scope_filter(&scope), limit).await.context("querying memory")?;
            emit(&outcome_as_json(&outcome), format);
        }
        EpisodeCommand::Delete { scope } => {
            memory.delete_data(&scope_filter(&scope)).await.context("deleting scoped data")?;
            emit(&serde_json::json!({"deleted": true}), format);
        }
    }
    Ok(())
}

fn outcome_as_json(outcome: &memory_core::declarative::QueryOutcome) -> serde_json::Value {
    serde_json::json!({
        "derivatives": outcome.derivatives.iter().map(|d| serde_json::json!({
            "id": d.id,
            "content": d.content,
        })).collect::<Vec<_>>(),
        "episodes": outcome.episodes.iter().map(|e| serde_json::json!({
            "id": e.id,
            "content": e.content,
        })).collect::<Vec<_>>(),
        "degraded": outcome.degraded,
    })
}

async fn open_session_manager(config: &CliConfig) -> Result<SessionManager> {
    SessionManager::open(&config.session.uri, &config.session.token).await.context("opening session manager")
}

async fn run_session(cmd: SessionCommand, config: &CliConfig, format: OutputFormat) -> Result<()> {
    let manager = open_session_manager(config).await?;

    match cmd {
        SessionCommand::CreateGroup { group_id, agent_ids, user_ids } => {
            manager.create_group(&group_id, &agent_ids, &user_ids, serde_json::json!({})).await?;
            emit(&serde_json::json!({"group_id": group_id}), format);
        }
        SessionCommand::CreateSession { group_id, session_id } => {
            let info = manager.create_session(&group_id, &session_id, serde_json::json!({})).await?;
            emit(&info, format);
        }
        SessionCommand::Get { group_id, session_id } => {
            let info = manager.open_session(&group_id, &session_id).await?;
            emit(&info, format);
        }
        SessionCommand::DeleteSession { group_id, session_id } => {
            manager.delete_session(&group_id, &session_id).await?;
            emit(&serde_json::json!({"deleted": true}), format);
        }
        SessionCommand::DeleteGroup { group_id } => {
            manager.delete_group(&group_id).await?;
            emit(&serde_json::json!({"deleted": true}), format);
        }
    }
    Ok(())
}

fn build_profile_memory(config: &CliConfig) -> Arc<ProfileMemory> {
    Arc::new(ProfileMemory::with_config(
        Arc::new(memory_core::llm::MockLanguageModel::fixed("memory-cli-mock", "{}")),
        Arc::new(MockEmbedder::new(32, SimilarityMetric::Cosine)),
        ProfilePrompt::default(),
        Arc::new(InMemoryProfileStorage::new()),
        config.profile.message_limit,
        config.profile.time_limit_sec,
    ))
}

async fn run_profile(cmd: ProfileCommand, config: &CliConfig, format: OutputFormat) -> Result<()> {
    let memory = build_profile_memory(config);

    match cmd {
        ProfileCommand::AddMessage { content, user_id, speaker } => {
            let metadata = speaker.map(|s| serde_json::json!({"speaker": s}));
            memory.add_persona_message(&content, &user_id, metadata, None).await?;
            emit(&serde_json::json!({"accepted": true}), format);
        }
        ProfileCommand::Get { user_id } => {
            let profile = memory.get_user_profile(&user_id, None).await?;
            emit(&profile, format);
        }
        ProfileCommand::Search { user_id, query, k, min_similarity } => {
            let results = memory.semantic_search(&user_id, &query, k, min_similarity, None, true).await?;
            emit(&results, format);
        }
    }
    Ok(())
}
