//! Language-model rewrite mutator: prompts the LLM with the original
//! derivative and cluster context, taking the response as new content.

use std::sync::Arc;

use async_trait::async_trait;

use super::DerivativeMutator;
use crate::derivative::Derivative;
use crate::episode::EpisodeCluster;
use crate::error::Result;
use crate::llm::LanguageModel;

const DEFAULT_TEMPLATE: &str = "Rewrite the following for clarity, using the surrounding context:\n\nContext:\n{context}\n\nText to rewrite:\n{content}";

/// Rewrites a derivative's content via an injected [`LanguageModel`].
///
/// By default, `filterable_properties` on the rewritten derivative are
/// narrowed to the source cluster's *shared* properties, so a rewrite that
/// blends multiple episodes' content doesn't keep a single episode's
/// per-derivative scope labels. Construct with
/// [`LanguageModelRewriteMutator::preserving_properties`] to instead keep
/// the original derivative's properties — this is an intentional asymmetry
/// with [`super::metadata_templated::MetadataTemplatedMutator`], which
/// always preserves them.
pub struct LanguageModelRewriteMutator {
    model: Arc<dyn LanguageModel>,
    template: String,
    preserve_properties: bool,
}

impl LanguageModelRewriteMutator {
    /// Construct a rewrite mutator that narrows properties to the cluster's
    /// shared set (the default).
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            template: DEFAULT_TEMPLATE.to_string(),
            preserve_properties: false,
        }
    }

    /// Construct a rewrite mutator that preserves the derivative's own
    /// `filterable_properties` instead of narrowing to the cluster's shared
    /// set.
    #[must_use]
    pub fn preserving_properties(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            template: DEFAULT_TEMPLATE.to_string(),
            preserve_properties: true,
        }
    }

    fn prompt(&self, derivative: &Derivative, cluster: &EpisodeCluster) -> String {
        let context = cluster
            .episodes
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.template
            .replace("{context}", &context)
            .replace("{content}", &derivative.content)
    }
}

#[async_trait]
impl DerivativeMutator for LanguageModelRewriteMutator {
    async fn mutate(
        &self,
        derivative: &Derivative,
        source_cluster: &EpisodeCluster,
    ) -> Result<Vec<Derivative>> {
        let prompt = self.prompt(derivative, source_cluster);
        let generation = self.model.generate(&prompt).await?;

        let mut rewritten = derivative.clone();
        rewritten.content = generation.text;
        if !self.preserve_properties {
            rewritten.filterable_properties = source_cluster.filterable_properties.clone();
        }
        Ok(vec![rewritten])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::Episode;
    use crate::llm::MockLanguageModel;
    use crate::types::{ContentType, FilterableProperties};

    fn cluster_with_shared_prop() -> EpisodeCluster {
        let mut props = FilterableProperties::new();
        props.insert("user_id".to_string(), "u1".into());
        EpisodeCluster::new(vec![Episode::new(
            "chat",
            ContentType::String,
            "hi",
            chrono::Utc::now(),
            "u1",
            props,
            serde_json::Value::Null,
        )])
    }

    #[tokio::test]
    async fn narrows_properties_to_cluster_shared_by_default() {
        let cluster = cluster_with_shared_prop();
        let mut per_derivative_props = FilterableProperties::new();
        per_derivative_props.insert("only_on_derivative".to_string(), "x".into());
        let derivative = Derivative::seed(
            "sentence",
            ContentType::String,
            "hi",
            chrono::Utc::now(),
            per_derivative_props,
            serde_json::Value::Null,
            cluster.id,
        );

        let model = Arc::new(MockLanguageModel::fixed("mock", "rewritten"));
        let mutator = LanguageModelRewriteMutator::new(model);
        let out = mutator.mutate(&derivative, &cluster).await.unwrap();

        assert_eq!(out[0].content, "rewritten");
        assert_eq!(out[0].filterable_properties, cluster.filterable_properties);
        assert!(!out[0].filterable_properties.contains_key("only_on_derivative"));
    }

    #[tokio::test]
    async fn preserves_properties_when_configured() {
        let cluster = cluster_with_shared_prop();
        let mut per_derivative_props = FilterableProperties::new();
        per_derivative_props.insert("only_on_derivative".to_string(), "x".into());
        let derivative = Derivative::seed(
            "sentence",
            ContentType::String,
            "hi",
            chrono::Utc::now(),
            per_derivative_props.clone(),
            serde_json::Value::Null,
            cluster.id,
        );

        let model = Arc::new(MockLanguageModel::fixed("mock", "rewritten"));
        let mutator = LanguageModelRewriteMutator::preserving_properties(model);
        let out = mutator.mutate(&derivative, &cluster).await.unwrap();

        assert_eq!(out[0].filterable_properties, per_derivative_props);
    }
}
