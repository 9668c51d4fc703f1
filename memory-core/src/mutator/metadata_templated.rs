//! Metadata-templated mutator: substitutes `$name` placeholders from a
//! template with values from the derivative's content/timestamp/properties.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::DerivativeMutator;
use crate::derivative::Derivative;
use crate::episode::EpisodeCluster;
use crate::error::Result;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("static regex"))
}

/// Substitutes `$name` placeholders in `template` with `content`,
/// `timestamp`, or any of the derivative's `filterable_properties` keys.
/// Placeholders with no matching value are left literal.
pub struct MetadataTemplatedMutator {
    template: String,
}

impl MetadataTemplatedMutator {
    /// Build a mutator from a template string containing `$name` placeholders.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    fn render(&self, derivative: &Derivative) -> String {
        placeholder_re()
            .replace_all(&self.template, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                match name {
                    "content" => derivative.content.clone(),
                    "timestamp" => derivative.timestamp.to_rfc3339(),
                    _ => derivative
                        .filterable_properties
                        .get(name)
                        .map(ToString::to_string)
                        .unwrap_or_else(|| caps[0].to_string()),
                }
            })
            .into_owned()
    }
}

#[async_trait]
impl DerivativeMutator for MetadataTemplatedMutator {
    async fn mutate(
        &self,
        derivative: &Derivative,
        _source_cluster: &EpisodeCluster,
    ) -> Result<Vec<Derivative>> {
        let mut mutated = derivative.clone();
        mutated.content = self.render(derivative);
        Ok(vec![mutated])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::Episode;
    use crate::types::{ContentType, FilterableProperties};

    fn cluster() -> EpisodeCluster {
        EpisodeCluster::new(vec![Episode::new(
            "chat",
            ContentType::String,
            "hi",
            chrono::Utc::now(),
            "u1",
            Default::default(),
            serde_json::Value::Null,
        )])
    }

    #[tokio::test]
    async fn substitutes_known_placeholders() {
        let mut props = FilterableProperties::new();
        props.insert("user_id".to_string(), "alice".into());
        let derivative = Derivative::seed(
            "sentence",
            ContentType::String,
            "hello world",
            chrono::Utc::now(),
            props,
            serde_json::Value::Null,
            uuid::Uuid::new_v4(),
        );
        let mutator = MetadataTemplatedMutator::new("$user_id said: $content");
        let out = mutator.mutate(&derivative, &cluster()).await.unwrap();
        assert_eq!(out[0].content, "alice said: hello world");
    }

    #[tokio::test]
    async fn missing_placeholder_left_literal() {
        let derivative = Derivative::seed(
            "sentence",
            ContentType::String,
            "hello",
            chrono::Utc::now(),
            Default::default(),
            serde_json::Value::Null,
            uuid::Uuid::new_v4(),
        );
        let mutator = MetadataTemplatedMutator::new("$missing: $content");
        let out = mutator.mutate(&derivative, &cluster()).await.unwrap();
        assert_eq!(out[0].content, "$missing: hello");
    }
}
