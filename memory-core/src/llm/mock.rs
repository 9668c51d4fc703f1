//! A deterministic language model for tests and demos.

use async_trait::async_trait;

use super::{Generation, LanguageModel, UsageStats};
use crate::error::Result;

/// Echoes a templated response derived from the prompt. Useful for testing
/// the deriver/mutator/extraction pipelines without a real LLM dependency.
pub struct MockLanguageModel {
    name: String,
    responder: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl MockLanguageModel {
    /// Construct a mock model that always returns the given fixed response.
    #[must_use]
    pub fn fixed(name: impl Into<String>, response: impl Into<String>) -> Self {
        let response = response.into();
        Self {
            name: name.into(),
            responder: Box::new(move |_| response.clone()),
        }
    }

    /// Construct a mock model whose response is computed from the prompt.
    pub fn with_responder(
        name: impl Into<String>,
        responder: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            responder: Box::new(responder),
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let text = (self.responder)(prompt);
        Ok(Generation {
            usage: UsageStats {
                prompt_tokens: prompt.split_whitespace().count() as u32,
                completion_tokens: text.split_whitespace().count() as u32,
            },
            text,
        })
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_model_always_returns_same_text() {
        let model = MockLanguageModel::fixed("mock", "a summary");
        let result = model.generate("anything").await.unwrap();
        assert_eq!(result.text, "a summary");
        assert!(result.usage.total() > 0);
    }
}
