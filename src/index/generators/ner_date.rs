//! `ner_date` index generator (§4.3): only tokens tagged `ner = "DATE"`
//! contribute; the key is the entity's own normalized date in `YYYYMMDD`
//! (§9 Open Question: entity date, not document publication date). Tokens
//! whose normalized form doesn't parse are skipped rather than erroring.

use crate::core::collaborators::{AnnotationStore, DocumentStore};
use crate::core::error::Result;
use crate::core::position::{Position, PositionList};
use crate::core::types::SentenceId;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub fn generate(documents: &dyn DocumentStore, annotations: &dyn AnnotationStore) -> Result<BTreeMap<Vec<u8>, PositionList>> {
    let mut out: BTreeMap<Vec<u8>, PositionList> = BTreeMap::new();

    for document_id in documents.all_document_ids()? {
        let Some(record) = documents.get(document_id)? else { continue };
        for token in annotations.tokens(document_id)? {
            if token.ner.as_deref() != Some("DATE") {
                continue;
            }
            let Some(raw) = token.normalized_ner.as_deref() else { continue };
            let Some(key) = normalize_to_yyyymmdd(raw) else { continue };

            let position = Position::plain(document_id, SentenceId(token.sentence_id), token.begin_char, token.end_char, record.timestamp);
            out.entry(key.into_bytes()).or_default().add(position);
        }
    }

    Ok(out)
}

/// Accepts `YYYY-MM-DD` or already-bare `YYYYMMDD`; anything else fails
/// normalization.
pub(crate) fn normalize_to_yyyymmdd(raw: &str) -> Option<String> {
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return Some(raw.to_string());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(|d| d.format("%Y%m%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::InMemoryCorpus;
    use crate::core::types::{DocumentId, DocumentRecord, TokenAnnotation};
    use chrono::Utc;

    #[test]
    fn emits_only_date_tokens_keyed_by_yyyymmdd() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(1), title: "T".into(), text: "On 2023-06-01 it happened.".into(), timestamp: Utc::now() });
        corpus.add_tokens(
            DocumentId(1),
            vec![
                TokenAnnotation { document_id: DocumentId(1), sentence_id: 0, begin_char: 3, end_char: 13, token: "2023-06-01".into(), lemma: "2023-06-01".into(), pos: "CD".into(), ner: Some("DATE".into()), normalized_ner: Some("2023-06-01".into()) },
                TokenAnnotation { document_id: DocumentId(1), sentence_id: 0, begin_char: 17, end_char: 19, token: "it".into(), lemma: "it".into(), pos: "PRP".into(), ner: None, normalized_ner: None },
            ],
        );

        let index = generate(&corpus, &corpus).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains_key(&b"20230601".to_vec()));
    }

    #[test]
    fn unparseable_normalized_form_is_skipped() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(1), title: "T".into(), text: "Sometime.".into(), timestamp: Utc::now() });
        corpus.add_tokens(
            DocumentId(1),
            vec![TokenAnnotation { document_id: DocumentId(1), sentence_id: 0, begin_char: 0, end_char: 9, token: "Sometime".into(), lemma: "sometime".into(), pos: "NN".into(), ner: Some("DATE".into()), normalized_ner: Some("XXXX-XX-XX".into()) }],
        );

        let index = generate(&corpus, &corpus).unwrap();
        assert!(index.is_empty());
    }
}
