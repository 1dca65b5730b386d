use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document identifier. Non-negative, immutable after ingestion (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u32);

impl DocumentId {
    pub fn new(id: u32) -> Self {
        DocumentId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DocumentId {
    fn from(id: u32) -> Self {
        DocumentId(id)
    }
}

/// Sentinel for document-level positions/matches (§3 Position, §3 Match).
pub const DOCUMENT_LEVEL_SENTENCE: i32 = -1;

/// A zero-based sentence id within a document, or the document-level
/// sentinel. Kept as a raw `i32` newtype rather than an `Option<u32>` so it
/// round-trips through the binary codec (§6) without a discriminant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SentenceId(pub i32);

impl SentenceId {
    pub const DOCUMENT: SentenceId = SentenceId(DOCUMENT_LEVEL_SENTENCE);

    pub fn is_document_level(&self) -> bool {
        self.0 == DOCUMENT_LEVEL_SENTENCE
    }
}

pub type Timestamp = DateTime<Utc>;

/// A document record as exposed by the (out-of-scope) document store (§1,
/// §6). Only the fields the query/table-assembly layer needs are modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: DocumentId,
    pub title: String,
    pub text: String,
    pub timestamp: Timestamp,
}

/// A single token annotation as exposed by the (out-of-scope) annotation
/// store (§3 Token annotation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAnnotation {
    pub document_id: DocumentId,
    pub sentence_id: i32,
    pub begin_char: u32,
    pub end_char: u32,
    pub token: String,
    pub lemma: String,
    pub pos: String,
    pub ner: Option<String>,
    pub normalized_ner: Option<String>,
}

/// A dependency edge as exposed by the (out-of-scope) annotation store (§3
/// Dependency edge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub document_id: DocumentId,
    pub sentence_id: i32,
    pub head_token: u32,
    pub dependent_token: u32,
    pub relation: String,
    pub begin_char: u32,
    pub end_char: u32,
}

/// The inferred type of a query variable (§3 Variable binding, §4.8 rule 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Entity,
    Term,
    Date,
    Pos,
    Integer,
    String,
}

impl ValueType {
    /// Least-upper-bound merge of two producer-inferred types (§4.8 rule 2).
    /// `String` is the universal supertype: any mismatch widens to it rather
    /// than erroring, since the actual type-mismatch check happens against a
    /// *consumer's* declared requirement, not between producers.
    pub fn join(self, other: ValueType) -> ValueType {
        if self == other { self } else { ValueType::String }
    }
}

/// A typed value bound to a variable (§3 Variable binding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Entity(String),
    Term(String),
    Date(Timestamp),
    Pos(String),
    Integer(i64),
    String(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Entity(_) => ValueType::Entity,
            Value::Term(_) => ValueType::Term,
            Value::Date(_) => ValueType::Date,
            Value::Pos(_) => ValueType::Pos,
            Value::Integer(_) => ValueType::Integer,
            Value::String(_) => ValueType::String,
        }
    }

    /// Render as display text for table cells/snippets.
    pub fn render(&self) -> String {
        match self {
            Value::Entity(s) | Value::Term(s) | Value::Pos(s) | Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Date(d) => d.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentence_id_document_sentinel() {
        assert!(SentenceId::DOCUMENT.is_document_level());
        assert!(!SentenceId(0).is_document_level());
    }

    #[test]
    fn value_type_join_is_identity_on_match() {
        assert_eq!(ValueType::Term.join(ValueType::Term), ValueType::Term);
        assert_eq!(ValueType::Term.join(ValueType::Date), ValueType::String);
    }
}
