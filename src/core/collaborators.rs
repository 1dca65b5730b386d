//! Trait boundaries for the external collaborators named in §1: the
//! document store, the annotation store, and the stopword set. Ingestion and
//! linguistic annotation themselves are out of scope; the CORE only depends
//! on these read interfaces.

use crate::core::error::Result;
use crate::core::types::{DependencyEdge, DocumentId, DocumentRecord, TokenAnnotation};
use std::collections::{BTreeMap, HashSet};

/// Document store keyed by integer document id (§1a).
pub trait DocumentStore: Send + Sync {
    fn get(&self, document_id: DocumentId) -> Result<Option<DocumentRecord>>;

    /// All document ids, in ascending order — used by generators to scan
    /// the whole corpus and by `NOT` to compute the containing universe.
    fn all_document_ids(&self) -> Result<Vec<DocumentId>>;

    /// Arbitrary metadata field lookup for `METADATA("field")` columns
    /// (§4.11). Absent field ⇒ `Ok(None)`, never an error.
    fn metadata_field(&self, document_id: DocumentId, field: &str) -> Result<Option<String>>;
}

/// Annotation store keyed by `(document_id, sentence_id)` (§1b).
pub trait AnnotationStore: Send + Sync {
    /// Tokens for one document, ordered by `sentence_id` then `begin_char`
    /// (§3 invariants).
    fn tokens(&self, document_id: DocumentId) -> Result<Vec<TokenAnnotation>>;

    fn dependencies(&self, document_id: DocumentId) -> Result<Vec<DependencyEdge>>;

    /// All sentence ids observed for a document — used to define the
    /// sentence-granularity universe for `NOT` (§9 Open Question).
    fn sentence_ids(&self, document_id: DocumentId) -> Result<Vec<i32>>;
}

pub trait StopwordSet: Send + Sync {
    fn is_stopword(&self, lowercased_token: &str) -> bool;
}

/// A simple in-memory `DocumentStore`/`AnnotationStore`/`StopwordSet` used by
/// generator and executor tests; not a substitute for the ingestion
/// pipeline, which is out of scope (§1).
#[derive(Debug, Default, Clone)]
pub struct InMemoryCorpus {
    pub documents: BTreeMap<u32, DocumentRecord>,
    pub metadata: BTreeMap<(u32, String), String>,
    pub tokens: BTreeMap<u32, Vec<TokenAnnotation>>,
    pub dependencies: BTreeMap<u32, Vec<DependencyEdge>>,
    pub stopwords: HashSet<String>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, record: DocumentRecord) -> &mut Self {
        self.documents.insert(record.document_id.0, record);
        self
    }

    pub fn add_tokens(&mut self, document_id: DocumentId, tokens: Vec<TokenAnnotation>) -> &mut Self {
        self.tokens.insert(document_id.0, tokens);
        self
    }

    pub fn add_dependencies(&mut self, document_id: DocumentId, edges: Vec<DependencyEdge>) -> &mut Self {
        self.dependencies.insert(document_id.0, edges);
        self
    }
}

impl DocumentStore for InMemoryCorpus {
    fn get(&self, document_id: DocumentId) -> Result<Option<DocumentRecord>> {
        Ok(self.documents.get(&document_id.0).cloned())
    }

    fn all_document_ids(&self) -> Result<Vec<DocumentId>> {
        Ok(self.documents.keys().copied().map(DocumentId).collect())
    }

    fn metadata_field(&self, document_id: DocumentId, field: &str) -> Result<Option<String>> {
        Ok(self.metadata.get(&(document_id.0, field.to_string())).cloned())
    }
}

impl AnnotationStore for InMemoryCorpus {
    fn tokens(&self, document_id: DocumentId) -> Result<Vec<TokenAnnotation>> {
        Ok(self.tokens.get(&document_id.0).cloned().unwrap_or_default())
    }

    fn dependencies(&self, document_id: DocumentId) -> Result<Vec<DependencyEdge>> {
        Ok(self.dependencies.get(&document_id.0).cloned().unwrap_or_default())
    }

    fn sentence_ids(&self, document_id: DocumentId) -> Result<Vec<i32>> {
        let mut ids: Vec<i32> = self
            .tokens
            .get(&document_id.0)
            .into_iter()
            .flatten()
            .map(|t| t.sentence_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

impl StopwordSet for InMemoryCorpus {
    fn is_stopword(&self, lowercased_token: &str) -> bool {
        self.stopwords.contains(lowercased_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn in_memory_corpus_round_trips_documents() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord {
            document_id: DocumentId(1),
            title: "T".into(),
            text: "The cat sat.".into(),
            timestamp: Utc::now(),
        });
        assert_eq!(corpus.get(DocumentId(1)).unwrap().unwrap().title, "T");
        assert_eq!(corpus.all_document_ids().unwrap(), vec![DocumentId(1)]);
        assert!(corpus.get(DocumentId(2)).unwrap().is_none());
    }
}
