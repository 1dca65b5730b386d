//! Builds a tiny in-memory corpus, generates a unigram index for it, runs a
//! query end to end, and prints the assembled result table.
//!
//! This file is a reference for embedding the library; it is not wired as a
//! `[[bin]]`/`[[example]]` target (the library crate ships none) and is not
//! part of the published API.

use chrono::Utc;
use corpus_search::core::collaborators::InMemoryCorpus;
use corpus_search::core::types::{DocumentId, DocumentRecord, TokenAnnotation};
use corpus_search::index::generators::ngram;
use corpus_search::query::{self, ExecutedQuery, ExecutionContext};
use corpus_search::storage::layout::IndexType;
use corpus_search::{assemble, AssembleContext, IndexSetManager};
use tempfile::tempdir;

fn main() -> corpus_search::Result<()> {
    let mut corpus = InMemoryCorpus::new();
    corpus.add_document(DocumentRecord {
        document_id: DocumentId(1),
        title: "Cats at home".into(),
        text: "The cat sat on the mat.".into(),
        timestamp: Utc::now(),
    });
    corpus.add_tokens(
        DocumentId(1),
        vec![
            token(1, 0, 0, 3, "The", "the", "DT"),
            token(1, 0, 4, 7, "cat", "cat", "NN"),
            token(1, 0, 8, 11, "sat", "sit", "VBD"),
            token(1, 0, 12, 14, "on", "on", "IN"),
            token(1, 0, 15, 18, "the", "the", "DT"),
            token(1, 0, 19, 22, "mat", "mat", "NN"),
        ],
    );

    let root = tempdir().expect("tempdir");
    let manager = IndexSetManager::open(root.path(), "demo")?;

    let unigrams = ngram::generate(1, &corpus, &corpus, &corpus)?;
    let entries: Vec<(Vec<u8>, _)> = unigrams.into_iter().collect();
    manager.require(IndexType::Unigram)?.batch_put_position_lists(&entries)?;

    let parsed = query::parse(r#"FROM demo SELECT ?x, SNIPPET(?x, 3), TITLE WHERE CONTAINS("cat", ?x)"#)?;

    let ctx = ExecutionContext { index_set: &manager, documents: &corpus, annotations: &corpus };
    let executed = query::execute(&parsed, &ctx)?;

    let assemble_ctx = AssembleContext { documents: &corpus, main_alias: parsed.main_alias.as_deref(), right_alias: None };
    let table = assemble(&executed, &parsed.select_columns, &parsed.order_by, parsed.limit, &assemble_ctx);

    println!("columns: {:?}", table.columns);
    for row in &table.rows {
        println!("{row:?}");
    }

    let ExecutedQuery::Plain(result) = executed else { unreachable!("this demo issues no JOIN") };
    println!("matched {} result unit(s)", result.matches.len());

    Ok(())
}

fn token(doc: u32, sentence: i32, begin: u32, end: u32, token: &str, lemma: &str, pos: &str) -> TokenAnnotation {
    TokenAnnotation {
        document_id: DocumentId(doc),
        sentence_id: sentence,
        begin_char: begin,
        end_char: end,
        token: token.into(),
        lemma: lemma.into(),
        pos: pos.into(),
        ner: None,
        normalized_ner: None,
    }
}
