//! Builds a full index set with a small `build_batch_size` (bounding peak
//! memory during generation to one batch's worth of position lists at a
//! time), publishes it atomically, and prints its stats and health.
//!
//! Reference only; not wired as a `[[bin]]`/`[[example]]` target.

use chrono::Utc;
use corpus_search::core::collaborators::InMemoryCorpus;
use corpus_search::core::config::IndexSetConfig;
use corpus_search::core::stats::HealthCheck;
use corpus_search::core::types::{DocumentId, DocumentRecord, TokenAnnotation};
use corpus_search::index::generators::{ngram, write_generated_index};
use corpus_search::storage::layout::{IndexSetLayout, IndexType};
use corpus_search::storage::publish::BuildStaging;
use corpus_search::IndexSetManager;
use tempfile::tempdir;

fn main() -> corpus_search::Result<()> {
    let mut corpus = InMemoryCorpus::new();
    for i in 0..200u32 {
        corpus.add_document(DocumentRecord {
            document_id: DocumentId(i),
            title: format!("Document {i}"),
            text: "Lorem ipsum dolor sit amet consectetur.".into(),
            timestamp: Utc::now(),
        });
        corpus.add_tokens(DocumentId(i), lorem_tokens(i));
    }

    let root = tempdir().expect("tempdir");
    let layout = IndexSetLayout::new(root.path(), "bulk");

    let config = IndexSetConfig { build_batch_size: 50, ..IndexSetConfig::default().with_root(root.path()) };

    let staging = BuildStaging::begin(&layout)?;
    for n in 1..=3usize {
        let entries = ngram::generate(n, &corpus, &corpus, &corpus)?;
        let index_type = match n {
            1 => IndexType::Unigram,
            2 => IndexType::Bigram,
            _ => IndexType::Trigram,
        };
        write_generated_index(&staging.path(index_type.dir_name()), entries, config.build_batch_size)?;
    }
    staging.publish()?;

    let manager = IndexSetManager::open(root.path(), "bulk")?;
    let stats = manager.stats()?;
    println!("index set '{}' key counts: {:?}", stats.set_name, stats.key_counts);

    let health = manager.check();
    println!("health: {:?} ({})", health.status, health.detail);

    Ok(())
}

fn lorem_tokens(doc: u32) -> Vec<TokenAnnotation> {
    let words = [("Lorem", "lorem", "NNP"), ("ipsum", "ipsum", "NN"), ("dolor", "dolor", "NN"), ("sit", "sit", "VB"), ("amet", "amet", "NN")];
    let mut begin = 0u32;
    words
        .iter()
        .map(|(token, lemma, pos)| {
            let end = begin + token.len() as u32;
            let annotation = TokenAnnotation {
                document_id: DocumentId(doc),
                sentence_id: 0,
                begin_char: begin,
                end_char: end,
                token: token.to_string(),
                lemma: lemma.to_string(),
                pos: pos.to_string(),
                ner: None,
                normalized_ner: None,
            };
            begin = end + 1;
            annotation
        })
        .collect()
}
