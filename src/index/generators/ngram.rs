//! Unigram/bigram/trigram generators (§4.3): "Bigram/trigram are drawn only
//! from tokens within the same sentence and contiguous in `begin_char`
//! order", with stopword filtering over any component.

use super::{lowercase_ascii, ngram_key};
use crate::core::collaborators::{AnnotationStore, DocumentStore, StopwordSet};
use crate::core::error::Result;
use crate::core::position::Position;
use crate::core::types::SentenceId;
use crate::core::position::PositionList;
use std::collections::BTreeMap;

/// Generates the n-gram index (`n` in `1..=3`) over every document in the
/// corpus.
pub fn generate(
    n: usize,
    documents: &dyn DocumentStore,
    annotations: &dyn AnnotationStore,
    stopwords: &dyn StopwordSet,
) -> Result<BTreeMap<Vec<u8>, PositionList>> {
    let mut out: BTreeMap<Vec<u8>, PositionList> = BTreeMap::new();

    for document_id in documents.all_document_ids()? {
        let Some(record) = documents.get(document_id)? else { continue };
        let tokens = annotations.tokens(document_id)?;

        // Tokens are ordered by sentence_id then begin_char (§3); a simple
        // windowed scan over the flat list already respects "same sentence,
        // contiguous in begin_char order" as long as we stop windows at
        // sentence boundaries.
        for window in tokens.windows(n) {
            if window.iter().map(|t| t.sentence_id).collect::<std::collections::HashSet<_>>().len() != 1 {
                continue;
            }
            let lowered: Vec<String> = window.iter().map(|t| lowercase_ascii(&t.token)).collect();
            if lowered.iter().any(|t| stopwords.is_stopword(t)) {
                continue;
            }
            let parts: Vec<&str> = lowered.iter().map(String::as_str).collect();
            let key = ngram_key(&parts);

            let begin_char = window.first().unwrap().begin_char;
            let end_char = window.last().unwrap().end_char;
            let position = Position::plain(
                document_id,
                SentenceId(window[0].sentence_id),
                begin_char,
                end_char,
                record.timestamp,
            );
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

    fn token(doc: u32, sentence: i32, begin: u32, end: u32, text: &str) -> TokenAnnotation {
        TokenAnnotation {
            document_id: DocumentId(doc),
            sentence_id: sentence,
            begin_char: begin,
            end_char: end,
            token: text.to_string(),
            lemma: text.to_lowercase(),
            pos: "NN".to_string(),
            ner: None,
            normalized_ner: None,
        }
    }

    #[test]
    fn unigram_lowercases_and_skips_stopwords() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(1), title: "T".into(), text: "The Cat sat.".into(), timestamp: Utc::now() });
        corpus.add_tokens(DocumentId(1), vec![token(1, 0, 0, 3, "The"), token(1, 0, 4, 7, "Cat"), token(1, 0, 8, 11, "sat")]);
        corpus.stopwords.insert("the".to_string());

        let index = generate(1, &corpus, &corpus, &corpus).unwrap();
        assert!(!index.contains_key(&b"the".to_vec()));
        assert!(index.contains_key(&b"cat".to_vec()));
        assert!(index.contains_key(&b"sat".to_vec()));
    }

    #[test]
    fn bigram_requires_same_sentence_contiguity() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(1), title: "T".into(), text: "Cats sit. Dogs run.".into(), timestamp: Utc::now() });
        corpus.add_tokens(
            DocumentId(1),
            vec![token(1, 0, 0, 4, "Cats"), token(1, 0, 5, 8, "sit"), token(1, 1, 10, 14, "Dogs"), token(1, 1, 15, 18, "run")],
        );

        let index = generate(2, &corpus, &corpus, &corpus).unwrap();
        assert!(index.contains_key(&ngram_key(&["cats", "sit"])));
        assert!(index.contains_key(&ngram_key(&["dogs", "run"])));
        assert!(!index.contains_key(&ngram_key(&["sit", "dogs"])));
    }
}
