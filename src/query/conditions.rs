//! Condition executors (C9, §4.9). One function per `Condition` variant,
//! dispatched by `evaluate`; each maps the condition to a match-set
//! (`Vec<DocSentenceMatch>`) at the query's granularity, reading from the
//! index types and the Nash temporal index (C1–C6).

use crate::core::collaborators::{AnnotationStore, DocumentStore};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::match_set::{DocSentenceMatch, Granularity, MatchKey};
use crate::core::position::Position;
use crate::core::types::{DocumentId, Value};
use crate::index::IndexSetManager;
use crate::query::ast::{Condition, VarOrLiteral};
use crate::storage::layout::{IndexType, SynonymKind};
use crate::temporal::{NashIndex, TempPred};
use std::collections::BTreeMap;

pub struct QueryContext<'a> {
    pub index_set: &'a IndexSetManager,
    pub documents: &'a dyn DocumentStore,
    pub annotations: &'a dyn AnnotationStore,
    pub granularity: Granularity,
    /// Set only while evaluating a `NOT` branch nested directly under an
    /// `AND`; restricts the complement's universe to the documents the
    /// surrounding conjunction is already considering (§9 Open Question).
    pub universe_override: Option<Vec<DocumentId>>,
}

pub fn evaluate(condition: &Condition, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    match condition {
        Condition::Contains { terms, bind } => contains(terms, bind.as_deref(), ctx),
        Condition::Ner { entity_type, target } => ner(entity_type, target, ctx),
        Condition::Pos { tag, target } => pos(tag, target, ctx),
        Condition::Dep { head, relation, dependent } => dep(head, relation, dependent, ctx),
        Condition::Hypernym { category, instance } => hypernym(category, instance, ctx),
        Condition::Date { pred, range, bind } => date(*pred, *range, bind.as_deref(), ctx),
        Condition::Not(inner) => not(inner, ctx),
        Condition::And(branches) => and(branches, ctx),
        Condition::Or(branches) => or(branches, ctx),
    }
}

fn lowercase(s: &str) -> String {
    s.to_ascii_lowercase()
}

fn ngram_key(parts: &[&str]) -> Vec<u8> {
    parts.join("\0").into_bytes()
}

/// Groups a `PositionList`'s positions into matches at `ctx.granularity`,
/// binding `?var` to `value_for(position)` on every position (§4.9
/// granularity policy: doc-level matches merge all positions for a
/// document; sentence-level matches key on `(document_id, sentence_id)`).
fn positions_to_matches(
    positions: impl Iterator<Item = Position>,
    source: &str,
    index_key: &str,
    bind: Option<(&str, impl Fn(&Position) -> Result<Value>)>,
    granularity: Granularity,
) -> Result<Vec<DocSentenceMatch>> {
    let (bind_var, value_for) = match bind {
        Some((var, f)) => (Some(var), Some(f)),
        None => (None, None),
    };

    let mut consulted = 0usize;
    let mut by_key: BTreeMap<MatchKey, DocSentenceMatch> = BTreeMap::new();
    for position in positions {
        consulted += 1;
        let key = match granularity {
            Granularity::Document => MatchKey::document(position.document_id),
            Granularity::Sentence => MatchKey::sentence(position.document_id, position.sentence_id.0),
        };
        let entry = by_key.entry(key).or_insert_with(|| DocSentenceMatch::new(key, source.to_string()));
        entry.add_positions(index_key.to_string(), [position]);
        if let Some(var) = bind_var {
            if !entry.variable_values.contains_key(var) {
                let value = value_for.as_ref().unwrap()(&position)?;
                entry.bind_variable(var.to_string(), value, Some(position));
            }
        }
    }
    tracing::debug!(source, index_key, positions_consulted = consulted, matches = by_key.len(), "condition index lookup");
    Ok(by_key.into_values().collect())
}

fn slice_text(documents: &dyn DocumentStore, document_id: DocumentId, begin: u32, end: u32) -> Result<String> {
    let record = documents
        .get(document_id)?
        .ok_or_else(|| Error::new(ErrorKind::DocStore, format!("document {} not found", document_id.0)))?;
    let chars: Vec<char> = record.text.chars().collect();
    let (begin, end) = (begin as usize, end as usize);
    if begin > end || end > chars.len() {
        return Err(Error::new(ErrorKind::DocStore, "token span out of bounds"));
    }
    Ok(chars[begin..end].iter().collect())
}

fn contains(terms: &[String], bind: Option<&str>, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    let lowered: Vec<String> = terms.iter().map(|t| lowercase(t)).collect();
    let parts: Vec<&str> = lowered.iter().map(String::as_str).collect();
    let key = ngram_key(&parts);

    let index_type = match terms.len() {
        1 => IndexType::Unigram,
        2 => IndexType::Bigram,
        3 => IndexType::Trigram,
        n => return Err(Error::new(ErrorKind::Schema, format!("CONTAINS supports 1-3 terms, got {n}"))),
    };
    let list = ctx.index_set.require(index_type)?.get_position_list(&key)?;
    let literal = terms.first().cloned().unwrap_or_default();
    let bind_fn = bind.map(|name| (name, move |_p: &Position| Ok(Value::Term(literal.clone()))));
    positions_to_matches(list.iter().copied(), "contains", index_type.dir_name(), bind_fn, ctx.granularity)
}

fn ner(entity_type: &str, target: &VarOrLiteral, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    let synonyms = ctx.index_set.synonyms(SynonymKind::Ner);
    let Some(type_id) = synonyms.lookup_id(entity_type) else {
        return Ok(Vec::new());
    };
    let stitch = ctx.index_set.require(IndexType::Stitch)?;

    let mut matches: Vec<Position> = Vec::new();
    for (_key, list) in stitch.scan_prefix(b"")? {
        for position in list.iter() {
            let Some(stitch_pos) = position.stitch else { continue };
            if stitch_pos.annotation_type != crate::core::position::AnnotationType::Ner || stitch_pos.synonym_id != type_id {
                continue;
            }
            if let VarOrLiteral::Literal(expected) = target {
                let surface = slice_text(ctx.documents, position.document_id, position.begin_char, position.end_char)?;
                if !surface.eq_ignore_ascii_case(expected) {
                    continue;
                }
            }
            matches.push(*position);
        }
    }

    let bind_name = match target {
        VarOrLiteral::Var(name) => Some(name.as_str()),
        VarOrLiteral::Literal(_) => None,
    };
    let documents = ctx.documents;
    let bind_fn = bind_name.map(|name| {
        (name, move |p: &Position| slice_text(documents, p.document_id, p.begin_char, p.end_char).map(Value::Entity))
    });
    positions_to_matches(matches.into_iter(), "ner", "stitch", bind_fn, ctx.granularity)
}

fn pos(tag: &str, target: &VarOrLiteral, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    let key = lowercase(tag).into_bytes();
    let list = ctx.index_set.require(IndexType::Pos)?.get_position_list(&key)?;

    let positions: Vec<Position> = match target {
        VarOrLiteral::Var(_) => list.iter().copied().collect(),
        VarOrLiteral::Literal(expected) => {
            let mut kept = Vec::new();
            for p in list.iter() {
                let surface = slice_text(ctx.documents, p.document_id, p.begin_char, p.end_char)?;
                if surface.eq_ignore_ascii_case(expected) {
                    kept.push(*p);
                }
            }
            kept
        }
    };

    let bind_name = match target {
        VarOrLiteral::Var(name) => Some(name.as_str()),
        VarOrLiteral::Literal(_) => None,
    };
    let documents = ctx.documents;
    let bind_fn = bind_name.map(|name| {
        (name, move |p: &Position| slice_text(documents, p.document_id, p.begin_char, p.end_char).map(Value::Pos))
    });
    positions_to_matches(positions.into_iter(), "pos", "pos", bind_fn, ctx.granularity)
}

fn dep(head: &str, relation: &str, dependent: &str, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    wildcard_triple_lookup(IndexType::Dependency, "dep", head, relation, dependent, ctx)
}

fn hypernym(category: &str, instance: &str, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    wildcard_pair_lookup(IndexType::Hypernym, "hypernym", category, instance, ctx)
}

fn wildcard_triple_lookup(index_type: IndexType, source: &str, a: &str, b: &str, c: &str, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    let parts = [a, b, c];
    let access = ctx.index_set.require(index_type)?;

    if parts.iter().all(|p| *p != "*") {
        let lowered = [lowercase(a), lowercase(b), lowercase(c)];
        let key = ngram_key(&[lowered[0].as_str(), lowered[1].as_str(), lowered[2].as_str()]);
        let list = access.get_position_list(&key)?;
        return positions_to_matches(list.iter().copied(), source, index_type.dir_name(), None::<(&str, fn(&Position) -> Result<Value>)>, ctx.granularity);
    }

    let prefix_len = parts.iter().take_while(|p| **p != "*").count();
    let prefix_parts: Vec<String> = parts[..prefix_len].iter().map(|p| lowercase(p)).collect();
    let prefix: Vec<u8> = if prefix_parts.is_empty() {
        Vec::new()
    } else {
        let mut buf = prefix_parts.join("\0").into_bytes();
        buf.push(0);
        buf
    };

    let mut matches = Vec::new();
    for (key, list) in access.scan_prefix(&prefix)? {
        let key_str = String::from_utf8_lossy(&key).to_string();
        let fields: Vec<&str> = key_str.split('\0').collect();
        if fields.len() != 3 {
            continue;
        }
        let ok = (0..3).all(|i| parts[i] == "*" || fields[i] == lowercase(parts[i]));
        if ok {
            matches.extend(list.iter().copied());
        }
    }
    positions_to_matches(matches.into_iter(), source, index_type.dir_name(), None::<(&str, fn(&Position) -> Result<Value>)>, ctx.granularity)
}

fn wildcard_pair_lookup(index_type: IndexType, source: &str, a: &str, b: &str, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    let access = ctx.index_set.require(index_type)?;
    let lowered = [lowercase(a), lowercase(b)];
    let key = ngram_key(&[lowered[0].as_str(), lowered[1].as_str()]);
    let list = access.get_position_list(&key)?;
    positions_to_matches(list.iter().copied(), source, index_type.dir_name(), None::<(&str, fn(&Position) -> Result<Value>)>, ctx.granularity)
}

fn date(pred: TempPred, range: (chrono::NaiveDate, chrono::NaiveDate), bind: Option<&str>, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    let nash: &NashIndex = ctx.index_set.nash()?;
    let hits = nash.range_predicate(range, pred);

    let mut by_key: BTreeMap<MatchKey, DocSentenceMatch> = BTreeMap::new();
    for hit in hits {
        let key = match ctx.granularity {
            Granularity::Document => MatchKey::document(hit.document_id),
            Granularity::Sentence => MatchKey::sentence(hit.document_id, hit.sentence_id),
        };
        let entry = by_key.entry(key).or_insert_with(|| DocSentenceMatch::new(key, "date".to_string()));
        if let Some(var) = bind {
            let timestamp = hit.start.and_hms_opt(0, 0, 0).unwrap().and_utc();
            entry.bind_variable(var.to_string(), Value::Date(timestamp), None);
        }
    }
    Ok(by_key.into_values().collect())
}

fn not(inner: &Condition, ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    let inner_matches = evaluate(inner, ctx)?;
    let present: std::collections::BTreeSet<MatchKey> = inner_matches.iter().map(|m| m.key).collect();

    let universe = universe_keys(ctx)?;
    Ok(universe
        .into_iter()
        .filter(|key| !present.contains(key))
        .map(|key| DocSentenceMatch::new(key, "not".to_string()))
        .collect())
}

fn universe_keys(ctx: &QueryContext) -> Result<Vec<MatchKey>> {
    let document_ids = match &ctx.universe_override {
        Some(ids) => ids.clone(),
        None => ctx.documents.all_document_ids()?,
    };
    match ctx.granularity {
        Granularity::Document => Ok(document_ids.into_iter().map(MatchKey::document).collect()),
        Granularity::Sentence => {
            let mut keys = Vec::new();
            for document_id in document_ids {
                for sentence_id in ctx.annotations.sentence_ids(document_id)? {
                    keys.push(MatchKey::sentence(document_id, sentence_id));
                }
            }
            Ok(keys)
        }
    }
}

fn document_ids_of(matches: &[DocSentenceMatch]) -> Vec<DocumentId> {
    let mut ids: Vec<DocumentId> = matches.iter().map(|m| m.key.document_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

fn and(branches: &[Condition], ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    if branches.is_empty() {
        return Ok(Vec::new());
    }

    let (not_branches, other_branches): (Vec<&Condition>, Vec<&Condition>) =
        branches.iter().partition(|c| matches!(c, Condition::Not(_)));

    let mut other_results: Vec<Vec<DocSentenceMatch>> = Vec::new();
    for branch in &other_branches {
        other_results.push(evaluate(branch, ctx)?);
    }

    let restricted_universe = if other_results.is_empty() {
        None
    } else {
        let mut candidate = document_ids_of(&other_results[0]);
        for result in &other_results[1..] {
            let next = document_ids_of(result);
            candidate.retain(|d| next.contains(d));
        }
        Some(candidate)
    };

    let not_ctx = QueryContext { universe_override: restricted_universe, ..clone_ctx(ctx) };
    let mut not_results: Vec<Vec<DocSentenceMatch>> = Vec::new();
    for branch in &not_branches {
        not_results.push(evaluate(branch, &not_ctx)?);
    }

    let all_results: Vec<Vec<DocSentenceMatch>> = other_results.into_iter().chain(not_results).collect();
    Ok(intersect_all(all_results))
}

fn or(branches: &[Condition], ctx: &QueryContext) -> Result<Vec<DocSentenceMatch>> {
    let mut all: Vec<DocSentenceMatch> = Vec::new();
    for branch in branches {
        all.extend(evaluate(branch, ctx)?);
    }
    Ok(union_all(all))
}

fn clone_ctx<'a>(ctx: &QueryContext<'a>) -> QueryContext<'a> {
    QueryContext {
        index_set: ctx.index_set,
        documents: ctx.documents,
        annotations: ctx.annotations,
        granularity: ctx.granularity,
        universe_override: ctx.universe_override.clone(),
    }
}

fn intersect_all(mut results: Vec<Vec<DocSentenceMatch>>) -> Vec<DocSentenceMatch> {
    if results.is_empty() {
        return Vec::new();
    }
    let mut acc: BTreeMap<MatchKey, DocSentenceMatch> = results.remove(0).into_iter().map(|m| (m.key, m)).collect();
    for result in results {
        let keys: std::collections::BTreeSet<MatchKey> = result.iter().map(|m| m.key).collect();
        acc.retain(|key, _| keys.contains(key));
        for m in result {
            if let Some(existing) = acc.get_mut(&m.key) {
                existing.merge_from(&m);
            }
        }
    }
    acc.into_values().collect()
}

fn union_all(matches: Vec<DocSentenceMatch>) -> Vec<DocSentenceMatch> {
    let mut acc: BTreeMap<MatchKey, DocSentenceMatch> = BTreeMap::new();
    for m in matches {
        acc.entry(m.key).and_modify(|existing| existing.merge_from(&m)).or_insert(m);
    }
    acc.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::InMemoryCorpus;
    use crate::core::types::{DocumentRecord, TokenAnnotation};
    use crate::index::generators::{ngram, pos as pos_generator};
    use crate::index::generators::write_generated_index;
    use crate::storage::layout::IndexSetLayout;
    use chrono::Utc;
    use tempfile::tempdir;

    fn build_corpus() -> InMemoryCorpus {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(1), title: "T1".into(), text: "The cat sat.".into(), timestamp: Utc::now() });
        corpus.add_document(DocumentRecord { document_id: DocumentId(2), title: "T2".into(), text: "Cats sit.".into(), timestamp: Utc::now() });
        corpus.add_tokens(
            DocumentId(1),
            vec![
                TokenAnnotation { document_id: DocumentId(1), sentence_id: 0, begin_char: 0, end_char: 3, token: "The".into(), lemma: "the".into(), pos: "DT".into(), ner: None, normalized_ner: None },
                TokenAnnotation { document_id: DocumentId(1), sentence_id: 0, begin_char: 4, end_char: 7, token: "cat".into(), lemma: "cat".into(), pos: "NN".into(), ner: None, normalized_ner: None },
                TokenAnnotation { document_id: DocumentId(1), sentence_id: 0, begin_char: 8, end_char: 11, token: "sat".into(), lemma: "sit".into(), pos: "VBD".into(), ner: None, normalized_ner: None },
            ],
        );
        corpus.add_tokens(
            DocumentId(2),
            vec![TokenAnnotation { document_id: DocumentId(2), sentence_id: 0, begin_char: 0, end_char: 4, token: "Cats".into(), lemma: "cat".into(), pos: "NNS".into(), ner: None, normalized_ner: None }],
        );
        corpus
    }

    fn open_index_set(corpus: &InMemoryCorpus) -> (tempfile::TempDir, IndexSetManager) {
        let root = tempdir().unwrap();
        let layout = IndexSetLayout::new(root.path(), "c");
        let unigrams = ngram::generate(1, corpus, corpus, corpus).unwrap();
        write_generated_index(&layout.index_dir(IndexType::Unigram), unigrams, 1000).unwrap();
        let pos_index = pos_generator::generate(corpus, corpus).unwrap();
        write_generated_index(&layout.index_dir(IndexType::Pos), pos_index, 1000).unwrap();
        let manager = IndexSetManager::open(root.path(), "c").unwrap();
        (root, manager)
    }

    #[test]
    fn contains_binds_literal_term_at_sentence_granularity() {
        let corpus = build_corpus();
        let (_root, manager) = open_index_set(&corpus);
        let ctx = QueryContext { index_set: &manager, documents: &corpus, annotations: &corpus, granularity: Granularity::Sentence, universe_override: None };

        let matches = contains(&["cat".to_string()], Some("x"), &ctx).unwrap();
        assert_eq!(matches.len(), 2);
        for m in &matches {
            assert_eq!(m.variable_values.get("x"), Some(&Value::Term("cat".to_string())));
        }
    }

    #[test]
    fn not_complements_against_the_document_universe() {
        let corpus = build_corpus();
        let (_root, manager) = open_index_set(&corpus);
        let ctx = QueryContext { index_set: &manager, documents: &corpus, annotations: &corpus, granularity: Granularity::Document, universe_override: None };

        let positive = contains(&["cat".to_string()], None, &ctx).unwrap();
        assert_eq!(document_ids_of(&positive), vec![DocumentId(1), DocumentId(2)]);

        let negated = not(&Condition::Contains { terms: vec!["cat".to_string()], bind: None }, &ctx).unwrap();
        assert!(negated.is_empty());
    }

    #[test]
    fn and_restricts_not_branch_to_sibling_documents() {
        let corpus = build_corpus();
        let (_root, manager) = open_index_set(&corpus);
        let ctx = QueryContext { index_set: &manager, documents: &corpus, annotations: &corpus, granularity: Granularity::Document, universe_override: None };

        let branches = vec![
            Condition::Contains { terms: vec!["cat".to_string()], bind: None },
            Condition::Not(Box::new(Condition::Contains { terms: vec!["sat".to_string()], bind: None })),
        ];
        let matches = and(&branches, &ctx).unwrap();
        assert_eq!(document_ids_of(&matches), vec![DocumentId(2)]);
    }

    #[test]
    fn pos_binds_surface_text_sliced_from_the_document() {
        let corpus = build_corpus();
        let (_root, manager) = open_index_set(&corpus);
        let ctx = QueryContext { index_set: &manager, documents: &corpus, annotations: &corpus, granularity: Granularity::Sentence, universe_override: None };

        let matches = pos("NN", &VarOrLiteral::Var("w".to_string()), &ctx).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].variable_values.get("w"), Some(&Value::Pos("cat".to_string())));
    }
}
