//! Language-model summary deriver: asks an injected language model to
//! summarize a cluster's episodes into a single derivative.

use std::sync::Arc;

use async_trait::async_trait;

use super::DerivativeDeriver;
use crate::derivative::Derivative;
use crate::episode::EpisodeCluster;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::types::ContentType;

const DEFAULT_TEMPLATE: &str = "Summarize the following in one paragraph:\n\n{episodes}";

/// Prompts an injected [`LanguageModel`] with the cluster's episode contents
/// joined by newlines, substituted into a configurable `{episodes}`
/// template, and emits one derivative from the response.
///
/// Fails soft: if the underlying model call errors, no derivative is
/// emitted and the failure is logged rather than propagated, so a flaky
/// summarizer never blocks ingestion of the episodes it was meant to
/// summarize.
pub struct LanguageModelSummaryDeriver {
    model: Arc<dyn LanguageModel>,
    template: String,
}

impl LanguageModelSummaryDeriver {
    /// Construct a summary deriver using the default template.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// Construct a summary deriver with a custom `{episodes}` template.
    #[must_use]
    pub fn with_template(model: Arc<dyn LanguageModel>, template: impl Into<String>) -> Self {
        Self {
            model,
            template: template.into(),
        }
    }

    fn prompt(&self, cluster: &EpisodeCluster) -> String {
        let episodes = cluster
            .episodes
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.template.replace("{episodes}", &episodes)
    }
}

#[async_trait]
impl DerivativeDeriver for LanguageModelSummaryDeriver {
    async fn derive(&self, cluster: &EpisodeCluster) -> Result<Vec<Derivative>> {
        let prompt = self.prompt(cluster);
        let timestamp = cluster
            .episodes
            .last()
            .map(|e| e.timestamp)
            .unwrap_or_else(chrono::Utc::now);

        match self.model.generate(&prompt).await {
            Ok(generation) => Ok(vec![Derivative::seed(
                "llm_summary",
                ContentType::String,
                generation.text,
                timestamp,
                cluster.filterable_properties.clone(),
                cluster.user_metadata.clone(),
                cluster.id,
            )]),
            Err(err) => {
                tracing::warn!(error = %err, cluster_id = %cluster.id, "summary model call failed, skipping derivation");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::Episode;
    use crate::llm::MockLanguageModel;

    fn episode(content: &str) -> Episode {
        Episode::new(
            "chat",
            ContentType::String,
            content,
            chrono::Utc::now(),
            "u1",
            Default::default(),
            serde_json::Value::Null,
        )
    }

    #[tokio::test]
    async fn emits_one_derivative_from_model_response() {
        let model = Arc::new(MockLanguageModel::fixed("mock", "a tidy summary"));
        let deriver = LanguageModelSummaryDeriver::new(model);
        let cluster = EpisodeCluster::new(vec![episode("hello"), episode("world")]);

        let derivatives = deriver.derive(&cluster).await.unwrap();
        assert_eq!(derivatives.len(), 1);
        assert_eq!(derivatives[0].content, "a tidy summary");
    }

    #[tokio::test]
    async fn model_failure_yields_no_derivatives() {
        struct FailingModel;

        #[async_trait]
        impl LanguageModel for FailingModel {
            async fn generate(&self, _prompt: &str) -> Result<crate::llm::Generation> {
                Err(crate::error::Error::ExternalServiceAPIError("boom".to_string()))
            }

            fn model_name(&self) -> &str {
                "failing"
            }
        }

        let deriver = LanguageModelSummaryDeriver::new(Arc::new(FailingModel));
        let cluster = EpisodeCluster::new(vec![episode("hello")]);

        let derivatives = deriver.derive(&cluster).await.unwrap();
        assert!(derivatives.is_empty());
    }
}
