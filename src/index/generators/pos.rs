//! POS index generator (§3 Index key shapes: `pos: pos_tag`).

use super::lowercase_ascii;
use crate::core::collaborators::{AnnotationStore, DocumentStore};
use crate::core::error::Result;
use crate::core::position::{Position, PositionList};
use crate::core::types::SentenceId;
use std::collections::BTreeMap;

pub fn generate(documents: &dyn DocumentStore, annotations: &dyn AnnotationStore) -> Result<BTreeMap<Vec<u8>, PositionList>> {
    let mut out: BTreeMap<Vec<u8>, PositionList> = BTreeMap::new();

    for document_id in documents.all_document_ids()? {
        let Some(record) = documents.get(document_id)? else { continue };
        for token in annotations.tokens(document_id)? {
            let key = lowercase_ascii(&token.pos).into_bytes();
            let position = Position::plain(document_id, SentenceId(token.sentence_id), token.begin_char, token.end_char, record.timestamp);
            out.entry(key).or_default().add(position);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::InMemoryCorpus;
    use crate::core::types::{DocumentId, DocumentRecord, TokenAnnotation};
    use chrono::Utc;

    #[test]
    fn groups_positions_by_lowercased_pos_tag() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(1), title: "T".into(), text: "Cats run.".into(), timestamp: Utc::now() });
        corpus.add_tokens(
            DocumentId(1),
            vec![
                TokenAnnotation { document_id: DocumentId(1), sentence_id: 0, begin_char: 0, end_char: 4, token: "Cats".into(), lemma: "cat".into(), pos: "NNS".into(), ner: None, normalized_ner: None },
                TokenAnnotation { document_id: DocumentId(1), sentence_id: 0, begin_char: 5, end_char: 8, token: "run".into(), lemma: "run".into(), pos: "VBP".into(), ner: None, normalized_ner: None },
            ],
        );

        let index = generate(&corpus, &corpus).unwrap();
        assert_eq!(index.get(&b"nns".to_vec()).unwrap().len(), 1);
        assert_eq!(index.get(&b"vbp".to_vec()).unwrap().len(), 1);
    }
}
