//! Scalar types shared by episodes, clusters, and derivatives.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The medium an episode or derivative's `content` is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    /// Plain text.
    String,
    /// An image reference (content holds a URI or base64 payload).
    Image,
    /// An audio reference.
    Audio,
    /// A video reference.
    Video,
    /// Anything else the caller wants to tag.
    Other,
}

impl ContentType {
    /// Whether this content type carries embeddable text.
    ///
    /// Non-textual content is persisted with an empty embedding per
    /// spec.md §4.5 step 1.
    #[must_use]
    pub fn is_textual(self) -> bool {
        matches!(self, ContentType::String)
    }

    /// The tag this content type is flattened to at the storage boundary.
    #[must_use]
    pub fn storage_tag(self) -> &'static str {
        match self {
            ContentType::String => "STRING",
            ContentType::Image => "IMAGE",
            ContentType::Audio => "AUDIO",
            ContentType::Video => "VIDEO",
            ContentType::Other => "OTHER",
        }
    }

    /// Inverse of [`ContentType::storage_tag`]; unrecognized tags fall back
    /// to `String`.
    #[must_use]
    pub fn from_storage_tag(tag: &str) -> Self {
        match tag {
            "IMAGE" => ContentType::Image,
            "AUDIO" => ContentType::Audio,
            "VIDEO" => ContentType::Video,
            "OTHER" => ContentType::Other,
            _ => ContentType::String,
        }
    }
}

/// A scalar value usable as a filterable property.
///
/// Filterable properties are restricted to scalars so that the store
/// adapter can index them as equality predicates rather than probing JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// A string scalar.
    String(String),
    /// An integer scalar.
    Int(i64),
    /// A floating point scalar.
    Float(f64),
    /// A boolean scalar.
    Bool(bool),
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::String(s) => write!(f, "{s}"),
            ScalarValue::Int(i) => write!(f, "{i}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::String(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::String(value)
    }
}

/// Filterable properties: scalar key/value pairs used as equality predicates
/// at query/retrieval time. `BTreeMap` keeps iteration order deterministic,
/// which matters when properties are mangled into `filterable.<key>` store
/// columns.
pub type FilterableProperties = BTreeMap<String, ScalarValue>;

/// Opaque caller-supplied JSON attached to episodes and derivatives.
pub type UserMetadata = serde_json::Value;

/// The `(group_id, session_id, user_ids, agent_ids)` tuple used both as a
/// filter on stored nodes and as a primary key on session registry rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    /// The owning group.
    pub group_id: String,
    /// The owning session.
    pub session_id: String,
    /// Users participating in this scope.
    pub user_ids: Vec<String>,
    /// Agents participating in this scope.
    pub agent_ids: Vec<String>,
}

impl Scope {
    /// Build the filterable-property equality map used to scope store reads
    /// to this scope's group and session.
    #[must_use]
    pub fn as_required_properties(&self) -> FilterableProperties {
        let mut props = FilterableProperties::new();
        props.insert("group_id".to_string(), self.group_id.clone().into());
        props.insert("session_id".to_string(), self.session_id.clone().into());
        props
    }
}

/// Intersect two filterable-property maps, keeping only keys present in both
/// with identical values. Used to derive a cluster's shared properties from
/// its member episodes (spec.md §3, `EpisodeCluster` invariant).
#[must_use]
pub fn intersect_properties(
    a: &FilterableProperties,
    b: &FilterableProperties,
) -> FilterableProperties {
    a.iter()
        .filter_map(|(k, v)| {
            b.get(k)
                .filter(|bv| *bv == v)
                .map(|_| (k.clone(), v.clone()))
        })
        .collect()
}

/// Intersect filterable properties across a non-empty sequence of maps.
///
/// # Panics
///
/// Never panics; returns an empty map for an empty input.
#[must_use]
pub fn intersect_all<'a, I>(maps: I) -> FilterableProperties
where
    I: IntoIterator<Item = &'a FilterableProperties>,
{
    let mut iter = maps.into_iter();
    let Some(first) = iter.next() else {
        return FilterableProperties::new();
    };
    iter.fold(first.clone(), |acc, next| intersect_properties(&acc, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_keeps_only_matching_keys_and_values() {
        let mut a = FilterableProperties::new();
        a.insert("user_id".to_string(), "u1".into());
        a.insert("lang".to_string(), "en".into());

        let mut b = FilterableProperties::new();
        b.insert("user_id".to_string(), "u1".into());
        b.insert("lang".to_string(), "fr".into());

        let result = intersect_properties(&a, &b);
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("user_id"), Some(&ScalarValue::String("u1".into())));
    }

    #[test]
    fn intersect_all_empty_input_is_empty() {
        let empty: Vec<FilterableProperties> = vec![];
        assert!(intersect_all(&empty).is_empty());
    }
}
