//! Sentence-split deriver: tokenizes each episode's content into sentences,
//! each becoming its own derivative.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::DerivativeDeriver;
use crate::derivative::Derivative;
use crate::episode::EpisodeCluster;
use crate::error::Result;

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?]*[.!?]+|[^.!?]+").expect("static regex"))
}

/// Split `text` into sentences using a language-agnostic segmenter: runs of
/// non-terminator characters followed by one or more `.`/`!`/`?`, or a
/// trailing run with no terminator.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_re()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Tokenizes each episode's content into sentences; each sentence becomes a
/// derivative inheriting the source episode's `filterable_properties`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SentenceSplitDeriver;

#[async_trait]
impl DerivativeDeriver for SentenceSplitDeriver {
    async fn derive(&self, cluster: &EpisodeCluster) -> Result<Vec<Derivative>> {
        let mut derivatives = Vec::new();
        for episode in &cluster.episodes {
            for sentence in split_sentences(&episode.content) {
                derivatives.push(Derivative::seed(
                    "sentence",
                    episode.content_type,
                    sentence,
                    episode.timestamp,
                    episode.filterable_properties.clone(),
                    episode.user_metadata.clone(),
                    cluster.id,
                ));
            }
        }
        Ok(derivatives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::Episode;
    use crate::types::{ContentType, FilterableProperties};

    #[tokio::test]
    async fn sentence_fan_out_scenario_from_spec() {
        let mut props = FilterableProperties::new();
        props.insert("prop".to_string(), "shared".into());

        let episode_one = Episode::new(
            "chat",
            ContentType::String,
            "This is a sentence. Is this another sentence?\nHere is one more.",
            chrono::Utc::now(),
            "u1",
            props.clone(),
            serde_json::Value::Null,
        );
        let episode_two = Episode::new(
            "chat",
            ContentType::String,
            "Yet another sentence, but with a comma.",
            chrono::Utc::now(),
            "u1",
            props.clone(),
            serde_json::Value::Null,
        );

        let cluster = EpisodeCluster::new(vec![episode_one, episode_two]);
        let derivatives = SentenceSplitDeriver.derive(&cluster).await.unwrap();

        let contents: std::collections::HashSet<String> =
            derivatives.iter().map(|d| d.content.clone()).collect();
        let expected: std::collections::HashSet<String> = [
            "This is a sentence.",
            "Is this another sentence?",
            "Here is one more.",
            "Yet another sentence, but with a comma.",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        assert_eq!(derivatives.len(), 4);
        assert_eq!(contents, expected);
        for d in &derivatives {
            assert_eq!(d.filterable_properties.get("prop").unwrap().to_string(), "shared");
        }
    }
}
