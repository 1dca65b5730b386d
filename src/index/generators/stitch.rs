//! Stitch index generator (§4.3): "co-locates a token with the `synonym_id`
//! of a coexisting annotation (date, ner, pos, dependency) for the same
//! sentence; each occurrence becomes a `StitchPosition`." Also responsible
//! for building the four synonym tables (C5), since interning happens at
//! generation time (§4.5 "ids are assigned in first-seen order").

use super::lowercase_ascii;
use super::ner_date::normalize_to_yyyymmdd;
use crate::core::collaborators::{AnnotationStore, DocumentStore};
use crate::core::error::Result;
use crate::core::position::{AnnotationType, Position, PositionList};
use crate::core::types::SentenceId;
use crate::storage::layout::SynonymKind;
use crate::synonym::SynonymTableBuilder;
use std::collections::BTreeMap;

pub struct StitchOutput {
    pub index: BTreeMap<Vec<u8>, PositionList>,
    pub synonym_builders: BTreeMap<SynonymKind, SynonymTableBuilder>,
}

pub fn generate(documents: &dyn DocumentStore, annotations: &dyn AnnotationStore) -> Result<StitchOutput> {
    let mut index: BTreeMap<Vec<u8>, PositionList> = BTreeMap::new();
    let mut builders: BTreeMap<SynonymKind, SynonymTableBuilder> = SynonymKind::ALL.into_iter().map(|k| (k, SynonymTableBuilder::new())).collect();

    for document_id in documents.all_document_ids()? {
        let Some(record) = documents.get(document_id)? else { continue };
        let tokens = annotations.tokens(document_id)?;
        let edges = annotations.dependencies(document_id)?;

        for token in &tokens {
            let key = lowercase_ascii(&token.token).into_bytes();

            if let Some(ner) = &token.ner {
                let synonym_id = builders.get_mut(&SynonymKind::Ner).unwrap().intern(ner);
                let position = Position::stitched(document_id, SentenceId(token.sentence_id), token.begin_char, token.end_char, record.timestamp, AnnotationType::Ner, synonym_id);
                index.entry(key.clone()).or_default().add(position);

                if ner == "DATE" {
                    if let Some(normalized) = token.normalized_ner.as_deref().and_then(normalize_to_yyyymmdd) {
                        let date_id = builders.get_mut(&SynonymKind::Date).unwrap().intern(&normalized);
                        let position = Position::stitched(document_id, SentenceId(token.sentence_id), token.begin_char, token.end_char, record.timestamp, AnnotationType::Date, date_id);
                        index.entry(key.clone()).or_default().add(position);
                    }
                }
            }

            let pos_id = builders.get_mut(&SynonymKind::Pos).unwrap().intern(&lowercase_ascii(&token.pos));
            let position = Position::stitched(document_id, SentenceId(token.sentence_id), token.begin_char, token.end_char, record.timestamp, AnnotationType::Pos, pos_id);
            index.entry(key.clone()).or_default().add(position);
        }

        let mut by_sentence: BTreeMap<i32, Vec<&crate::core::types::TokenAnnotation>> = BTreeMap::new();
        for token in &tokens {
            by_sentence.entry(token.sentence_id).or_default().push(token);
        }
        for edge in &edges {
            let Some(sentence_tokens) = by_sentence.get(&edge.sentence_id) else { continue };
            let dependency_id = builders.get_mut(&SynonymKind::Dependency).unwrap().intern(&lowercase_ascii(&edge.relation));
            for &token_index in &[edge.head_token, edge.dependent_token] {
                let Some(token) = sentence_tokens.get(token_index as usize) else { continue };
                let key = lowercase_ascii(&token.token).into_bytes();
                let position = Position::stitched(document_id, SentenceId(edge.sentence_id), edge.begin_char, edge.end_char, record.timestamp, AnnotationType::Dependency, dependency_id);
                index.entry(key).or_default().add(position);
            }
        }
    }

    Ok(StitchOutput { index, synonym_builders: builders })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::InMemoryCorpus;
    use crate::core::types::{DocumentId, DocumentRecord, TokenAnnotation};
    use chrono::Utc;

    #[test]
    fn ner_tokens_are_stitched_to_their_entity_type() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(1), title: "T".into(), text: "Obama spoke.".into(), timestamp: Utc::now() });
        corpus.add_tokens(
            DocumentId(1),
            vec![TokenAnnotation { document_id: DocumentId(1), sentence_id: 0, begin_char: 0, end_char: 5, token: "Obama".into(), lemma: "obama".into(), pos: "NNP".into(), ner: Some("PERSON".into()), normalized_ner: None }],
        );

        let output = generate(&corpus, &corpus).unwrap();
        let person_id = output.synonym_builders.get(&SynonymKind::Ner).unwrap().len();
        assert_eq!(person_id, 1);
        let list = output.index.get(&b"obama".to_vec()).unwrap();
        assert!(list.iter().any(|p| matches!(p.stitch, Some(s) if s.annotation_type as u8 == AnnotationType::Ner as u8)));

        // The same token also gets a POS-tagged StitchPosition at the same
        // span; it must survive alongside the NER entry rather than being
        // deduped against it (§3: the stitch payload is an identifying field).
        assert!(list.iter().any(|p| matches!(p.stitch, Some(s) if s.annotation_type as u8 == AnnotationType::Pos as u8)));
        assert_eq!(list.len(), 2);
    }
}
