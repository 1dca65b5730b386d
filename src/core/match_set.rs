//! Match and variable-binding records (§3 Match, §9 "mixed document- and
//! sentence-level match types: one `DocSentenceMatch` with a sentinel
//! `sentence_id = -1`").

use crate::core::position::Position;
use crate::core::types::{DocumentId, SentenceId, Value, ValueType, DOCUMENT_LEVEL_SENTENCE};
use std::collections::BTreeMap;

/// Which granularity a match/condition was evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Document,
    Sentence,
}

/// Identity of a match: `(document_id, sentence_id)` with
/// `sentence_id == DOCUMENT_LEVEL_SENTENCE` for document-granularity matches
/// (§3 invariant on Match uniqueness).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchKey {
    pub document_id: DocumentId,
    pub sentence_id: SentenceId,
}

impl MatchKey {
    pub fn document(document_id: DocumentId) -> Self {
        MatchKey { document_id, sentence_id: SentenceId(DOCUMENT_LEVEL_SENTENCE) }
    }

    pub fn sentence(document_id: DocumentId, sentence_id: i32) -> Self {
        MatchKey { document_id, sentence_id: SentenceId(sentence_id) }
    }

    pub fn granularity(&self) -> Granularity {
        if self.sentence_id.is_document_level() { Granularity::Document } else { Granularity::Sentence }
    }
}

/// One result unit: a document or (document, sentence) together with the
/// positions every contributing condition produced for it, and the variable
/// values bound along the way (§3 Match / DocSentenceMatch).
#[derive(Debug, Clone)]
pub struct DocSentenceMatch {
    pub key: MatchKey,
    /// `source` names the condition (or join side) that produced this match;
    /// kept distinct so AND/OR can tell which sibling's positions are which.
    pub source: String,
    pub match_positions: BTreeMap<String, Vec<Position>>,
    pub variable_values: BTreeMap<String, Value>,
    /// The position that produced each variable's binding, when one exists
    /// (e.g. `DATE` bindings have none). Used by `SNIPPET(?v)` (§4.11.1) to
    /// locate the text span to excerpt.
    pub variable_positions: BTreeMap<String, Position>,
}

impl DocSentenceMatch {
    pub fn new(key: MatchKey, source: impl Into<String>) -> Self {
        DocSentenceMatch {
            key,
            source: source.into(),
            match_positions: BTreeMap::new(),
            variable_values: BTreeMap::new(),
            variable_positions: BTreeMap::new(),
        }
    }

    pub fn add_positions(&mut self, index_key: impl Into<String>, positions: impl IntoIterator<Item = Position>) {
        self.match_positions.entry(index_key.into()).or_default().extend(positions);
    }

    /// Binds `var` to `value`, first-producer-wins, recording `position` (if
    /// any) alongside it for snippet generation.
    pub fn bind_variable(&mut self, var: impl Into<String>, value: Value, position: Option<Position>) {
        let var = var.into();
        if self.variable_values.contains_key(&var) {
            return;
        }
        self.variable_values.insert(var.clone(), value);
        if let Some(position) = position {
            self.variable_positions.insert(var, position);
        }
    }

    /// Merge `other` into `self`, keyed by the same match identity. Used by
    /// AND (intersect) and OR (union) to combine bindings from both sides
    /// without losing either one's positions (§4.9).
    pub fn merge_from(&mut self, other: &DocSentenceMatch) {
        for (k, v) in &other.match_positions {
            self.match_positions.entry(k.clone()).or_default().extend(v.iter().copied());
        }
        for (var, value) in &other.variable_values {
            // Tie-break: first-produced value wins (§4.9 "Tie-breaks").
            if !self.variable_values.contains_key(var) {
                self.variable_values.insert(var.clone(), value.clone());
                if let Some(position) = other.variable_positions.get(var) {
                    self.variable_positions.insert(var.clone(), *position);
                }
            }
        }
    }
}

/// A single variable-binding occurrence (§3 MatchDetail). Join results
/// additionally carry `right_*` fields for the matching right-hand match.
#[derive(Debug, Clone)]
pub struct MatchDetail {
    pub variable_name: String,
    pub value: Value,
    pub position: Option<Position>,
    pub document_id: DocumentId,
    pub sentence_id: SentenceId,
    pub value_type: ValueType,
    pub source: String,
    pub right: Option<RightMatch>,
}

/// The right-hand side of a joined `MatchDetail` (§4.10).
#[derive(Debug, Clone)]
pub struct RightMatch {
    pub document_id: DocumentId,
    pub sentence_id: SentenceId,
    pub variable_name: String,
    pub value: Value,
    pub position: Option<Position>,
}

impl MatchDetail {
    pub fn new(
        variable_name: impl Into<String>,
        value: Value,
        position: Option<Position>,
        document_id: DocumentId,
        sentence_id: SentenceId,
        source: impl Into<String>,
    ) -> Self {
        let value_type = value.value_type();
        MatchDetail {
            variable_name: variable_name.into(),
            value,
            position,
            document_id,
            sentence_id,
            value_type,
            source: source.into(),
            right: None,
        }
    }

    pub fn with_right(mut self, right: RightMatch) -> Self {
        self.right = Some(right);
        self
    }
}
