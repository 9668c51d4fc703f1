//! Shared shapes: isolation keys, profile entries, history entries, and
//! the duck-typed "single value or list of values" profile read shape
//! (spec.md §9 REDESIGN FLAGS: never silently collapse multi-valued
//! features to a single value).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A small string->string map partitioning profile namespaces (e.g.
/// tenant). An empty map is the default namespace.
pub type Isolations = BTreeMap<String, String>;

/// One value recorded against a (user, tag, feature) in the profile
/// store, with the history entries that justified it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileValue {
    /// The recorded value text.
    pub value: String,
    /// History entry IDs supporting this value, if citations were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<String>>,
    /// Cosine similarity to a search query, present only on search results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl ProfileValue {
    /// A bare value with no citations or similarity score attached.
    #[must_use]
    pub fn bare(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            citations: None,
            similarity: None,
        }
    }
}

/// The profile store historically returns either one `{value}` object or a
/// list of them for a multi-valued (tag, feature). Preserve both shapes at
/// the read boundary instead of normalizing to a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SingleOrList<T> {
    /// Exactly one value was recorded.
    Single(T),
    /// More than one value was recorded.
    List(Vec<T>),
}

impl<T> SingleOrList<T> {
    /// Collapse a non-empty vector into this shape: one element stays
    /// `Single`, more than one becomes `List`. Panics on an empty vector —
    /// callers must never materialize an entry with no values.
    #[must_use]
    pub fn from_vec(mut values: Vec<T>) -> Self {
        match values.len() {
            0 => unreachable!("profile entries are never stored with zero values"),
            1 => SingleOrList::Single(values.remove(0)),
            _ => SingleOrList::List(values),
        }
    }

    /// Borrow every value regardless of shape.
    pub fn as_slice(&self) -> &[T] {
        match self {
            SingleOrList::Single(v) => std::slice::from_ref(v),
            SingleOrList::List(vs) => vs,
        }
    }
}

/// One entry in the append-only per-user history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique ID of this entry.
    pub id: Uuid,
    /// The user this entry belongs to.
    pub user_id: String,
    /// Stored content (with any speaker prefix already applied).
    pub content: String,
    /// Caller-supplied metadata, verbatim.
    pub metadata: serde_json::Value,
    /// Namespace partition.
    pub isolations: Isolations,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    /// Whether an extraction job has already consumed this entry.
    pub consumed: bool,
}

/// One entry in the per-user profile knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Unique ID of this entry.
    pub id: Uuid,
    /// The user this entry belongs to.
    pub user_id: String,
    /// Namespace partition.
    pub isolations: Isolations,
    /// Grouping key, e.g. `"writing_style_general"`.
    pub tag: String,
    /// The attribute name within the tag, e.g. `"tone"`.
    pub feature: String,
    /// The recorded value text.
    pub value: String,
    /// Dense embedding of `"<feature>: <value>"`.
    pub embedding: Vec<f32>,
    /// History entry IDs that justified this value.
    pub citations: Vec<Uuid>,
    /// Milliseconds since epoch.
    pub timestamp: i64,
}

/// One command emitted by the extraction LLM's JSON response. The object's
/// values are commands; unknown `command` strings fail to deserialize and
/// are rejected with `Error::InvalidArgument` by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ProfileCommand {
    /// Insert a new profile entry.
    Add {
        /// Feature name.
        feature: String,
        /// Value text.
        value: String,
        /// Grouping tag.
        tag: String,
        /// Optional author attribution, unused beyond round-tripping.
        #[serde(default)]
        author: Option<String>,
    },
    /// Replace an existing profile entry's value.
    Update {
        /// Feature name.
        feature: String,
        /// New value text.
        value: String,
        /// Grouping tag.
        tag: String,
        /// Optional author attribution, unused beyond round-tripping.
        #[serde(default)]
        author: Option<String>,
    },
    /// Remove a profile entry.
    Delete {
        /// Feature name.
        feature: String,
        /// Value text used to locate the entry.
        value: String,
        /// Grouping tag.
        tag: String,
        /// Optional author attribution, unused beyond round-tripping.
        #[serde(default)]
        author: Option<String>,
    },
}
