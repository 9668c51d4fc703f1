#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

//! # Memory Core
//!
//! Core data structures and orchestration for a conversational memory
//! engine: episodic memory (ingest, derive, rerank), the components it is
//! built from, and the resource initializer that wires them together.
//!
//! ## Module Organization
//!
//! ### Primary APIs
//! - [`declarative`]: [`declarative::DeclarativeMemory`], the ingest/query orchestrator
//! - [`episode`]: [`episode::Episode`] and [`episode::EpisodeCluster`]
//! - [`derivative`]: [`derivative::Derivative`], the indexed artifact
//! - [`resource_init`]: declarative resource wiring (spec.md §4.9)
//!
//! ### Pipeline stages
//! - [`postulator`]: related-episode selection
//! - [`deriver`]: cluster → derivative seeds
//! - [`mutator`]: derivative rewriting
//! - [`reranker`]: query-time candidate scoring
//!
//! ### Collaborators
//! - [`store`]: the [`store::VectorGraphStore`] adapter
//! - [`embedder`]: the [`embedder::Embedder`] trait and mock
//! - [`llm`]: the [`llm::LanguageModel`] trait and mock
//!
//! ### Support
//! - [`types`]: scalar types shared across episodes/derivatives/scope
//! - [`error`]: the stable [`error::Error`] kind enum
//! - [`util`]: async concurrency helpers

pub mod declarative;
pub mod derivative;
pub mod deriver;
pub mod embedder;
pub mod episode;
pub mod error;
pub mod llm;
pub mod mutator;
pub mod postulator;
pub mod reranker;
pub mod resource_init;
pub mod store;
pub mod types;
pub mod util;

pub use declarative::{DeclarativeMemory, QueryOutcome};
pub use derivative::Derivative;
pub use episode::{Episode, EpisodeCluster};
pub use error::{Error, Result};
pub use types::{ContentType, FilterableProperties, ScalarValue, Scope, UserMetadata};
