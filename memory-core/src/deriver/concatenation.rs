//! Concatenation deriver: one derivative whose content is the
//! newline-joined contents of the cluster, in order.

use async_trait::async_trait;

use super::DerivativeDeriver;
use crate::derivative::Derivative;
use crate::episode::EpisodeCluster;
use crate::error::Result;
use crate::types::ContentType;

/// One derivative whose content is the newline-joined contents of the
/// cluster in order; `filterable_properties` are the cluster's shared
/// properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcatenationDeriver;

#[async_trait]
impl DerivativeDeriver for ConcatenationDeriver {
    async fn derive(&self, cluster: &EpisodeCluster) -> Result<Vec<Derivative>> {
        let content = cluster
            .episodes
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let timestamp = cluster
            .episodes
            .last()
            .map(|e| e.timestamp)
            .unwrap_or_else(chrono::Utc::now);

        Ok(vec![Derivative::seed(
            "concatenation",
            ContentType::String,
            content,
            timestamp,
            cluster.filterable_properties.clone(),
            cluster.user_metadata.clone(),
            cluster.id,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::Episode;

    #[tokio::test]
    async fn joins_with_newlines_preserving_order() {
        let cluster = EpisodeCluster::new(vec![
            Episode::new(
                "chat",
                ContentType::String,
                "first",
                chrono::Utc::now(),
                "u1",
                Default::default(),
                serde_json::Value::Null,
            ),
            Episode::new(
                "chat",
                ContentType::String,
                "second",
                chrono::Utc::now(),
                "u1",
                Default::default(),
                serde_json::Value::Null,
            ),
        ]);
        let derivatives = ConcatenationDeriver.derive(&cluster).await.unwrap();
        assert_eq!(derivatives.len(), 1);
        assert_eq!(derivatives[0].content, "first\nsecond");
    }
}
