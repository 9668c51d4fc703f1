//! Identity deriver: one derivative per episode, content and properties
//! copied verbatim.

use async_trait::async_trait;

use super::DerivativeDeriver;
use crate::derivative::Derivative;
use crate::episode::EpisodeCluster;
use crate::error::Result;

/// One derivative per episode in the cluster, with content and
/// `filterable_properties` copied from the source episode.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityDeriver;

#[async_trait]
impl DerivativeDeriver for IdentityDeriver {
    async fn derive(&self, cluster: &EpisodeCluster) -> Result<Vec<Derivative>> {
        Ok(cluster
            .episodes
            .iter()
            .map(|episode| {
                Derivative::seed(
                    "identity",
                    episode.content_type,
                    episode.content.clone(),
                    episode.timestamp,
                    episode.filterable_properties.clone(),
                    episode.user_metadata.clone(),
                    cluster.id,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentType;

    #[tokio::test]
    async fn one_derivative_per_episode() {
        let cluster = EpisodeCluster::new(vec![
            crate::episode::Episode::new(
                "chat",
                ContentType::String,
                "hello",
                chrono::Utc::now(),
                "u1",
                Default::default(),
                serde_json::Value::Null,
            ),
            crate::episode::Episode::new(
                "chat",
                ContentType::String,
                "world",
                chrono::Utc::now(),
                "u1",
                Default::default(),
                serde_json::Value::Null,
            ),
        ]);
        let derivatives = IdentityDeriver.derive(&cluster).await.unwrap();
        assert_eq!(derivatives.len(), 2);
        assert_eq!(derivatives[0].content, "hello");
        assert_eq!(derivatives[1].content, "world");
    }
}
