//! Dependency index generator (§4.3): key is `head_lemma \0 relation \0
//! dependent_lemma`; the position's span covers both endpoints. `head_token`
//! and `dependent_token` are 0-based indices into the sentence's tokens
//! ordered by `begin_char`.

use super::{lowercase_ascii, ngram_key};
use crate::core::collaborators::{AnnotationStore, DocumentStore};
use crate::core::error::Result;
use crate::core::position::{Position, PositionList};
use crate::core::types::SentenceId;
use std::collections::BTreeMap;

pub fn generate(documents: &dyn DocumentStore, annotations: &dyn AnnotationStore) -> Result<BTreeMap<Vec<u8>, PositionList>> {
    let mut out: BTreeMap<Vec<u8>, PositionList> = BTreeMap::new();

    for document_id in documents.all_document_ids()? {
        let Some(record) = documents.get(document_id)? else { continue };
        let tokens = annotations.tokens(document_id)?;
        let edges = annotations.dependencies(document_id)?;

        // Group tokens by sentence, preserving begin_char order, so
        // head_token/dependent_token can be resolved as positional indices.
        let mut by_sentence: BTreeMap<i32, Vec<&crate::core::types::TokenAnnotation>> = BTreeMap::new();
        for token in &tokens {
            by_sentence.entry(token.sentence_id).or_default().push(token);
        }

        for edge in &edges {
            let Some(sentence_tokens) = by_sentence.get(&edge.sentence_id) else { continue };
            let (Some(head), Some(dependent)) =
                (sentence_tokens.get(edge.head_token as usize), sentence_tokens.get(edge.dependent_token as usize))
            else {
                continue;
            };

            let key = ngram_key(&[&lowercase_ascii(&head.lemma), &lowercase_ascii(&edge.relation), &lowercase_ascii(&dependent.lemma)]);
            let position = Position::plain(document_id, SentenceId(edge.sentence_id), edge.begin_char, edge.end_char, record.timestamp);
            out.entry(key).or_default().add(position);
        }
    }

    Ok(out)
}
