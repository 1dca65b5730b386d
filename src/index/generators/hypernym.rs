//! Hypernym index generator (§4.3): mines dependency edges whose relation is
//! in a configured is-a-like set, keyed `category \0 instance` (head lemma is
//! the category, dependent lemma the instance — the same head/dependent
//! convention as the plain dependency generator).

use super::{lowercase_ascii, ngram_key};
use crate::core::collaborators::{AnnotationStore, DocumentStore};
use crate::core::error::Result;
use crate::core::position::{Position, PositionList};
use crate::core::types::SentenceId;
use std::collections::BTreeMap;

/// Relations treated as is-a patterns absent a corpus-specific manifest
/// (§4.3: "documented in the index-set manifest"). Callers building a
/// specific corpus may supply their own set.
pub const DEFAULT_IS_A_RELATIONS: &[&str] = &["appos", "is_a", "hypernym"];

pub fn generate(
    documents: &dyn DocumentStore,
    annotations: &dyn AnnotationStore,
    is_a_relations: &[&str],
) -> Result<BTreeMap<Vec<u8>, PositionList>> {
    let mut out: BTreeMap<Vec<u8>, PositionList> = BTreeMap::new();

    for document_id in documents.all_document_ids()? {
        let Some(record) = documents.get(document_id)? else { continue };
        let tokens = annotations.tokens(document_id)?;
        let edges = annotations.dependencies(document_id)?;

        let mut by_sentence: BTreeMap<i32, Vec<&crate::core::types::TokenAnnotation>> = BTreeMap::new();
        for token in &tokens {
            by_sentence.entry(token.sentence_id).or_default().push(token);
        }

        for edge in &edges {
            let relation = lowercase_ascii(&edge.relation);
            if !is_a_relations.iter().any(|r| r.eq_ignore_ascii_case(&relation)) {
                continue;
            }
            let Some(sentence_tokens) = by_sentence.get(&edge.sentence_id) else { continue };
            let (Some(category), Some(instance)) =
                (sentence_tokens.get(edge.head_token as usize), sentence_tokens.get(edge.dependent_token as usize))
            else {
                continue;
            };

            let key = ngram_key(&[&lowercase_ascii(&category.lemma), &lowercase_ascii(&instance.lemma)]);
            let position = Position::plain(document_id, SentenceId(edge.sentence_id), edge.begin_char, edge.end_char, record.timestamp);
            out.entry(key).or_default().add(position);
        }
    }

    Ok(out)
}
