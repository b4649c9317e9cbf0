use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store-assigned point identifier. Qdrant allows numeric ids alongside
/// UUID-style strings within the same collection, so both shapes are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointKey {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointKey::Num(n) => write!(f, "{}", n),
            PointKey::Uuid(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for PointKey {
    fn from(n: u64) -> Self {
        PointKey::Num(n)
    }
}

impl From<&str> for PointKey {
    fn from(s: &str) -> Self {
        PointKey::Uuid(s.to_string())
    }
}

impl From<String> for PointKey {
    fn from(s: String) -> Self {
        PointKey::Uuid(s)
    }
}

/// One hit exactly as reported by the store, before normalization. A store
/// that omits the payload yields an empty map; a store that omits the score
/// yields `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: PointKey,
    pub score: Option<f32>,
    pub payload: Map<String, Value>,
}

/// Display-ready search result. Payload fields sit at the top level of the
/// serialized form so downstream consumers can read domain fields (e.g.
/// `text`) without knowing about the payload nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub id: PointKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ResultItem {
    /// Convenience accessor for the conventional `text` payload field.
    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").and_then(Value::as_str)
    }
}

/// Merges the store-assigned id and score with the flattened payload map
/// into one record.
///
/// A missing payload is treated as an empty mapping. A missing score stays
/// absent rather than defaulting to zero, since zero is a valid similarity
/// score and would be indistinguishable from a real low-similarity match.
/// The `deprecated` payload field is folded into the typed flag.
pub fn normalize(hit: RawHit) -> ResultItem {
    let mut fields = hit.payload;
    let deprecated = matches!(fields.remove("deprecated"), Some(Value::Bool(true)));
    ResultItem {
        id: hit.id,
        score: hit.score,
        deprecated,
        fields,
    }
}
