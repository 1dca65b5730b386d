//! Query executor and join engine (C10, §4.10). Pipeline: validate → execute
//! subqueries into a registry keyed by alias → execute the main conditions →
//! evaluate the temporal join, if any.

use crate::core::collaborators::{AnnotationStore, DocumentStore};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::match_set::{DocSentenceMatch, Granularity};
use crate::core::types::Value;
use crate::index::IndexSetManager;
use crate::query::ast::{JoinCondition, JoinKind, Query};
use crate::query::conditions::{self, QueryContext};
use crate::query::registry::validate_query;
use crate::temporal::{nash, TempPred};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub struct ExecutionContext<'a> {
    pub index_set: &'a IndexSetManager,
    pub documents: &'a dyn DocumentStore,
    pub annotations: &'a dyn AnnotationStore,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub matches: Vec<DocSentenceMatch>,
    pub granularity: Granularity,
}

/// One row of a joined result. `left`/`right` are `None` for the unmatched
/// side of an outer (`LEFT`/`RIGHT`) join row (§4.10 "keeps unmatched ...
/// rows with empty ... fields").
#[derive(Debug, Clone)]
pub struct JoinedMatch {
    pub left: Option<DocSentenceMatch>,
    pub right: Option<DocSentenceMatch>,
}

pub enum ExecutedQuery {
    Plain(QueryResult),
    Joined { rows: Vec<JoinedMatch>, left_alias: String, right_alias: String, granularity: Granularity },
}

/// Runs `query` to completion: validation, subquery execution, condition
/// evaluation, and (if present) the join. Returns the error taxonomy of §7 —
/// validation failures collapse into one `ErrorKind::Validation`, a missing
/// index into `ErrorKind::Schema` (raised by `conditions::evaluate` itself).
#[tracing::instrument(skip(query, ctx))]
pub fn execute(query: &Query, ctx: &ExecutionContext) -> Result<ExecutedQuery> {
    validate_query(query).map_err(|diagnostics| {
        let message = diagnostics.into_iter().map(|d| d.message).collect::<Vec<_>>().join("; ");
        Error::new(ErrorKind::Validation, message)
    })?;

    let mut subquery_results: BTreeMap<String, QueryResult> = BTreeMap::new();
    for sub in &query.subqueries {
        tracing::debug!(alias = %sub.alias, "executing subquery");
        match execute(&sub.query, ctx)? {
            ExecutedQuery::Plain(result) => {
                subquery_results.insert(sub.alias.clone(), result);
            }
            ExecutedQuery::Joined { .. } => {
                return Err(Error::new(ErrorKind::UnsupportedQuery, "a subquery may not itself contain a JOIN"));
            }
        }
    }

    let main_result = execute_conditions(query, ctx)?;

    match &query.join_condition {
        None => Ok(ExecutedQuery::Plain(main_result)),
        Some(join) => {
            tracing::debug!(left = %join.left_alias, right = %join.right_alias, pred = ?join.pred, "evaluating temporal join");
            let left_result = resolve_side(&join.left_alias, query, &main_result, &subquery_results)?;
            let right_result = resolve_side(&join.right_alias, query, &main_result, &subquery_results)?;
            let rows = evaluate_join(join, left_result, right_result);
            let granularity = finer_granularity(left_result.granularity, right_result.granularity);
            Ok(ExecutedQuery::Joined { rows, left_alias: join.left_alias.clone(), right_alias: join.right_alias.clone(), granularity })
        }
    }
}

fn execute_conditions(query: &Query, ctx: &ExecutionContext) -> Result<QueryResult> {
    let matches = match &query.conditions {
        Some(condition) => {
            let query_ctx = QueryContext {
                index_set: ctx.index_set,
                documents: ctx.documents,
                annotations: ctx.annotations,
                granularity: query.granularity,
                universe_override: None,
            };
            conditions::evaluate(condition, &query_ctx)?
        }
        None => Vec::new(),
    };
    Ok(QueryResult { matches, granularity: query.granularity })
}

fn is_main_alias(alias: &str, query: &Query) -> bool {
    query.main_alias.as_deref() == Some(alias) || alias == query.source
}

fn resolve_side<'a>(
    alias: &str,
    query: &Query,
    main_result: &'a QueryResult,
    subquery_results: &'a BTreeMap<String, QueryResult>,
) -> Result<&'a QueryResult> {
    if is_main_alias(alias, query) {
        return Ok(main_result);
    }
    subquery_results
        .get(alias)
        .ok_or_else(|| Error::new(ErrorKind::Schema, format!("join references unknown alias '{alias}'")))
}

fn finer_granularity(a: Granularity, b: Granularity) -> Granularity {
    if a == Granularity::Sentence || b == Granularity::Sentence { Granularity::Sentence } else { Granularity::Document }
}

fn extract_date(m: &DocSentenceMatch, var: &str) -> Option<NaiveDate> {
    match m.variable_values.get(var) {
        Some(Value::Date(timestamp)) => Some(timestamp.date_naive()),
        _ => None,
    }
}

/// Evaluates the temporal join over two already-executed results (§4.10
/// steps 1-4). `WINDOW` overrides the predicate's own proximity window when
/// given explicitly in the `JOIN ... ON` clause.
fn evaluate_join(join: &JoinCondition, left_result: &QueryResult, right_result: &QueryResult) -> Vec<JoinedMatch> {
    let effective_pred = match (join.pred, join.window) {
        (TempPred::Proximity(_), Some(window)) => TempPred::Proximity(window),
        (pred, _) => pred,
    };

    let mut rows = Vec::new();
    let mut right_matched = vec![false; right_result.matches.len()];

    for left in &left_result.matches {
        let mut any_match = false;
        if let Some(left_date) = extract_date(left, &join.left_var) {
            for (idx, right) in right_result.matches.iter().enumerate() {
                let Some(right_date) = extract_date(right, &join.right_var) else { continue };
                if nash::evaluate(effective_pred, (left_date, left_date), (right_date, right_date)) {
                    rows.push(JoinedMatch { left: Some(left.clone()), right: Some(right.clone()) });
                    right_matched[idx] = true;
                    any_match = true;
                }
            }
        }
        if !any_match && join.kind == JoinKind::Left {
            rows.push(JoinedMatch { left: Some(left.clone()), right: None });
        }
    }

    if join.kind == JoinKind::Right {
        for (idx, right) in right_result.matches.iter().enumerate() {
            if !right_matched[idx] {
                rows.push(JoinedMatch { left: None, right: Some(right.clone()) });
            }
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::InMemoryCorpus;
    use crate::core::types::{DocumentId, DocumentRecord, SentenceId};
    use crate::index::generators::write_generated_index;
    use crate::query::ast::{Condition, JoinKind, Subquery};
    use crate::storage::layout::{IndexSetLayout, IndexType};
    use chrono::Utc;
    use tempfile::tempdir;

    fn date_match(doc: u32, var: &str, date_str: &str) -> DocSentenceMatch {
        let mut m = DocSentenceMatch::new(crate::core::match_set::MatchKey::document(DocumentId(doc)), "date");
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap();
        let ts = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        m.variable_values.insert(var.to_string(), Value::Date(ts));
        m
    }

    #[test]
    fn inner_join_keeps_only_matched_pairs() {
        let left_result = QueryResult { matches: vec![date_match(1, "a", "2023-06-01"), date_match(2, "a", "2023-01-01")], granularity: Granularity::Document };
        let right_result = QueryResult { matches: vec![date_match(10, "b", "2023-06-02")], granularity: Granularity::Document };

        let join = JoinCondition {
            left_alias: "main".into(),
            left_var: "a".into(),
            pred: TempPred::Proximity(3),
            right_alias: "q2".into(),
            right_var: "b".into(),
            window: None,
            kind: JoinKind::Inner,
        };

        let rows = evaluate_join(&join, &left_result, &right_result);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].left.is_some());
        assert!(rows[0].right.is_some());
    }

    #[test]
    fn left_join_keeps_unmatched_left_rows() {
        let left_result = QueryResult { matches: vec![date_match(1, "a", "2023-06-01"), date_match(2, "a", "2020-01-01")], granularity: Granularity::Document };
        let right_result = QueryResult { matches: vec![date_match(10, "b", "2023-06-02")], granularity: Granularity::Document };

        let join = JoinCondition {
            left_alias: "main".into(),
            left_var: "a".into(),
            pred: TempPred::Proximity(3),
            right_alias: "q2".into(),
            right_var: "b".into(),
            window: None,
            kind: JoinKind::Left,
        };

        let rows = evaluate_join(&join, &left_result, &right_result);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.right.is_none()));
    }

    fn build_manager_with_dates(entries: &[(u32, &str)]) -> (tempfile::TempDir, IndexSetManager) {
        let root = tempdir().unwrap();
        let layout = IndexSetLayout::new(root.path(), "c");
        let mut generated = std::collections::BTreeMap::new();
        for (doc, date) in entries {
            let list = generated.entry(date.replace('-', "").into_bytes()).or_insert_with(crate::core::position::PositionList::new);
            list.add(crate::core::position::Position::plain(DocumentId(*doc), SentenceId(0), 0, 1, Utc::now()));
        }
        write_generated_index(&layout.index_dir(IndexType::NerDate), generated, 1000).unwrap();
        let manager = IndexSetManager::open(root.path(), "c").unwrap();
        (root, manager)
    }

    #[test]
    fn plain_query_without_join_executes_conditions_directly() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(1), title: "T".into(), text: "cat".into(), timestamp: Utc::now() });
        let (_root, manager) = build_manager_with_dates(&[(1, "2023-06-01")]);

        let ctx = ExecutionContext { index_set: &manager, documents: &corpus, annotations: &corpus };
        let mut query = Query::new("c");
        query.conditions = Some(Condition::Date { pred: TempPred::Intersect, range: (NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()), bind: Some("d".into()) });

        let executed = execute(&query, &ctx).unwrap();
        match executed {
            ExecutedQuery::Plain(result) => assert_eq!(result.matches.len(), 1),
            ExecutedQuery::Joined { .. } => panic!("expected a plain result"),
        }
    }

    #[test]
    fn subquery_aliases_resolve_for_the_join() {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(1), title: "T".into(), text: "cat".into(), timestamp: Utc::now() });
        corpus.add_document(DocumentRecord { document_id: DocumentId(2), title: "T2".into(), text: "dog".into(), timestamp: Utc::now() });
        let (_root, manager) = build_manager_with_dates(&[(1, "2023-06-01"), (2, "2023-06-02")]);
        let ctx = ExecutionContext { index_set: &manager, documents: &corpus, annotations: &corpus };

        let mut sub_query = Query::new("c");
        sub_query.conditions = Some(Condition::Date {
            pred: TempPred::Intersect,
            range: (NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            bind: Some("d".into()),
        });

        let mut main_query = Query::new("c");
        main_query.conditions = Some(Condition::Date {
            pred: TempPred::Intersect,
            range: (NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            bind: Some("p".into()),
        });
        main_query.subqueries.push(Subquery { alias: "q2".into(), query: Box::new(sub_query), exported_columns: None });
        main_query.join_condition = Some(JoinCondition {
            left_alias: "c".into(),
            left_var: "p".into(),
            pred: TempPred::Proximity(5),
            right_alias: "q2".into(),
            right_var: "d".into(),
            window: None,
            kind: JoinKind::Inner,
        });

        let executed = execute(&main_query, &ctx).unwrap();
        match executed {
            ExecutedQuery::Joined { rows, .. } => assert!(!rows.is_empty()),
            ExecutedQuery::Plain(_) => panic!("expected a joined result"),
        }
    }
}
