//! Language model: single operation, generate a response from a prompt.

mod mock;

pub use mock::MockLanguageModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Token-usage statistics reported alongside a generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens produced in the completion.
    pub completion_tokens: u32,
}

impl UsageStats {
    /// Total tokens consumed by this generation.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// The result of one generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The model's textual response.
    pub text: String,
    /// Usage statistics for the call.
    pub usage: UsageStats,
}

/// A language model capable of generating a response from a prompt.
///
/// This is the full contract the memory engine relies on: derivers,
/// mutators, and the profile extraction/consolidation pipeline all go
/// through this single operation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a response to `prompt`.
    async fn generate(&self, prompt: &str) -> Result<Generation>;

    /// A stable name for this model, used in observability.
    fn model_name(&self) -> &str;
}
