//! Result table assembler (C11, §4.11). Turns an `ExecutedQuery` plus the
//! parsed `select_columns`/`order_by`/`limit` into a columnar table with
//! optional text snippets, pulling `TITLE`/`TIMESTAMP`/`METADATA`/`SNIPPET`
//! cells from the document store.

use crate::core::collaborators::DocumentStore;
use crate::core::error::Result;
use crate::core::match_set::DocSentenceMatch;
use crate::core::position::Position;
use crate::core::types::{DocumentId, DocumentRecord, Value};
use crate::query::ast::{CountKind, OrderColumn, SelectColumn};
use crate::query::executor::{ExecutedQuery, JoinedMatch};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Number of words SNIPPET expands by when the grammar's optional window
/// argument is omitted.
const DEFAULT_SNIPPET_WINDOW: u32 = 5;

/// Emitted by SNIPPET when no position is available to excerpt around (§4.11.1
/// "never raise").
const NO_SNIPPET_CONTEXT: &str = "<no context available>";

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// The read-only context the assembler needs beyond the executed query
/// itself: the document store for optional columns, and the aliases needed
/// to resolve qualified `alias.?v` references in a joined result.
pub struct AssembleContext<'a> {
    pub documents: &'a dyn DocumentStore,
    pub main_alias: Option<&'a str>,
    pub right_alias: Option<&'a str>,
}

/// One result unit: either a plain match or a joined (left, right) pair
/// (§4.11 step 1 "Group details by result unit" — grouping itself already
/// happened upstream in the condition executors and join engine; this just
/// gives column population a uniform view over either shape).
enum Unit<'a> {
    Plain(&'a DocSentenceMatch),
    Joined(&'a JoinedMatch),
}

impl<'a> Unit<'a> {
    fn id_columns(&self) -> Vec<(&'static str, CellValue)> {
        match self {
            Unit::Plain(m) => vec![
                ("document_id", CellValue::Integer(m.key.document_id.0 as i64)),
                ("sentence_id", CellValue::Integer(m.key.sentence_id.0 as i64)),
            ],
            Unit::Joined(j) => {
                let mut cols = Vec::with_capacity(4);
                match &j.left {
                    Some(m) => {
                        cols.push(("left_document_id", CellValue::Integer(m.key.document_id.0 as i64)));
                        cols.push(("left_sentence_id", CellValue::Integer(m.key.sentence_id.0 as i64)));
                    }
                    None => {
                        cols.push(("left_document_id", CellValue::Null));
                        cols.push(("left_sentence_id", CellValue::Null));
                    }
                }
                match &j.right {
                    Some(m) => {
                        cols.push(("right_document_id", CellValue::Integer(m.key.document_id.0 as i64)));
                        cols.push(("right_sentence_id", CellValue::Integer(m.key.sentence_id.0 as i64)));
                    }
                    None => {
                        cols.push(("right_document_id", CellValue::Null));
                        cols.push(("right_sentence_id", CellValue::Null));
                    }
                }
                cols
            }
        }
    }

    /// First value bound to an unqualified `?v`, searching the left side
    /// before the right on a joined row (§4.9 tie-break: first-produced
    /// wins).
    fn lookup_var(&self, var: &str) -> Option<(&Value, Option<&Position>)> {
        match self {
            Unit::Plain(m) => m.variable_values.get(var).map(|v| (v, m.variable_positions.get(var))),
            Unit::Joined(j) => j
                .left
                .as_ref()
                .and_then(|m| m.variable_values.get(var).map(|v| (v, m.variable_positions.get(var))))
                .or_else(|| j.right.as_ref().and_then(|m| m.variable_values.get(var).map(|v| (v, m.variable_positions.get(var))))),
        }
    }

    fn lookup_alias_var(&self, alias: &str, var: &str, main_alias: Option<&str>, right_alias: Option<&str>) -> Option<(&Value, Option<&Position>)> {
        match self {
            Unit::Plain(m) => {
                if Some(alias) == main_alias {
                    m.variable_values.get(var).map(|v| (v, m.variable_positions.get(var)))
                } else {
                    None
                }
            }
            Unit::Joined(j) => {
                if Some(alias) == main_alias {
                    j.left.as_ref().and_then(|m| m.variable_values.get(var).map(|v| (v, m.variable_positions.get(var))))
                } else if Some(alias) == right_alias {
                    j.right.as_ref().and_then(|m| m.variable_values.get(var).map(|v| (v, m.variable_positions.get(var))))
                } else {
                    None
                }
            }
        }
    }

    fn document_id(&self) -> Option<DocumentId> {
        match self {
            Unit::Plain(m) => Some(m.key.document_id),
            Unit::Joined(j) => j.left.as_ref().map(|m| m.key.document_id).or_else(|| j.right.as_ref().map(|m| m.key.document_id)),
        }
    }
}

fn units_of(executed: &ExecutedQuery) -> Vec<Unit<'_>> {
    match executed {
        ExecutedQuery::Plain(result) => result.matches.iter().map(Unit::Plain).collect(),
        ExecutedQuery::Joined { rows, .. } => rows.iter().map(Unit::Joined).collect(),
    }
}

fn default_id_columns(executed: &ExecutedQuery) -> Vec<String> {
    match executed {
        ExecutedQuery::Plain(_) => vec!["document_id".into(), "sentence_id".into()],
        ExecutedQuery::Joined { .. } => vec!["left_document_id".into(), "left_sentence_id".into(), "right_document_id".into(), "right_sentence_id".into()],
    }
}

/// The column header/identity string for a select column; matches the
/// names `registry::select_column_names` and the parser's `ORDER BY` column
/// both use for `?v`/`alias.?v`, so `ORDER BY` can resolve by name (§4.8
/// rule 4).
pub fn column_key(col: &SelectColumn) -> String {
    match col {
        SelectColumn::Var(name) => format!("?{name}"),
        SelectColumn::AliasVar { alias, var } => format!("{alias}.?{var}"),
        SelectColumn::Count(CountKind::Star) => "COUNT(*)".to_string(),
        SelectColumn::Count(CountKind::UniqueVar(var)) => format!("COUNT(UNIQUE ?{var})"),
        SelectColumn::Count(CountKind::Documents) => "COUNT(DOCUMENTS)".to_string(),
        SelectColumn::Snippet { var, window: Some(w) } => format!("SNIPPET(?{var}, {w})"),
        SelectColumn::Snippet { var, window: None } => format!("SNIPPET(?{var})"),
        SelectColumn::Title => "TITLE".to_string(),
        SelectColumn::Timestamp => "TIMESTAMP".to_string(),
        SelectColumn::Metadata(Some(field)) => format!("METADATA(\"{field}\")"),
        SelectColumn::Metadata(None) => "METADATA".to_string(),
    }
}

fn value_to_cell(value: &Value) -> CellValue {
    match value {
        Value::Integer(i) => CellValue::Integer(*i),
        other => CellValue::Text(other.render()),
    }
}

/// Produces the main entry point of C11: assembles `executed` into a table,
/// absorbing `DocStoreError`s from optional columns into empty cells (§7)
/// and applying `ORDER BY`/`LIMIT` last (§4.11 steps 4-5).
pub fn assemble(executed: &ExecutedQuery, select_columns: &[SelectColumn], order_by: &[OrderColumn], limit: Option<u64>, ctx: &AssembleContext) -> ResultTable {
    let units = units_of(executed);

    if select_columns.iter().any(|c| matches!(c, SelectColumn::Count(_))) {
        return assemble_counts(select_columns, &units);
    }

    let id_columns = default_id_columns(executed);
    let mut columns = id_columns;
    columns.extend(select_columns.iter().map(column_key));

    let mut rows: Vec<Vec<CellValue>> = units
        .iter()
        .map(|unit| {
            let mut row: Vec<CellValue> = unit.id_columns().into_iter().map(|(_, v)| v).collect();
            for col in select_columns {
                row.push(populate_cell(col, unit, ctx));
            }
            row
        })
        .collect();

    apply_order_and_limit(&mut rows, &columns, order_by, limit);
    ResultTable { columns, rows }
}

/// `COUNT(*)` / `COUNT(UNIQUE ?v)` / `COUNT(DOCUMENTS)` replace the grouped
/// rows with a single summary row (§4.11 step 3, §8 scenario 3). A select
/// list mixing `COUNT` with ordinary columns keeps only the `COUNT`
/// column(s): a one-row *summary* table is incompatible with per-match
/// columns existing in the same row.
fn assemble_counts(select_columns: &[SelectColumn], units: &[Unit]) -> ResultTable {
    let count_columns: Vec<&SelectColumn> = select_columns.iter().filter(|c| matches!(c, SelectColumn::Count(_))).collect();
    let row: Vec<CellValue> = count_columns
        .iter()
        .map(|col| {
            let SelectColumn::Count(kind) = col else { unreachable!() };
            CellValue::Integer(count_value(kind, units))
        })
        .collect();
    ResultTable { columns: count_columns.iter().map(|c| column_key(c)).collect(), rows: vec![row] }
}

fn count_value(kind: &CountKind, units: &[Unit]) -> i64 {
    match kind {
        CountKind::Star => units.len() as i64,
        CountKind::Documents => {
            let ids: BTreeSet<u32> = units.iter().filter_map(|u| u.document_id().map(|d| d.0)).collect();
            ids.len() as i64
        }
        CountKind::UniqueVar(var) => {
            let values: BTreeSet<String> = units.iter().filter_map(|u| u.lookup_var(var).map(|(v, _)| v.render())).collect();
            values.len() as i64
        }
    }
}

fn populate_cell(col: &SelectColumn, unit: &Unit, ctx: &AssembleContext) -> CellValue {
    match col {
        SelectColumn::Var(name) => unit.lookup_var(name).map(|(v, _)| value_to_cell(v)).unwrap_or(CellValue::Null),
        SelectColumn::AliasVar { alias, var } => unit
            .lookup_alias_var(alias, var, ctx.main_alias, ctx.right_alias)
            .map(|(v, _)| value_to_cell(v))
            .unwrap_or(CellValue::Null),
        SelectColumn::Title => doc_field(unit, ctx.documents, |r| r.title.clone()),
        SelectColumn::Timestamp => doc_field(unit, ctx.documents, |r| r.timestamp.to_rfc3339()),
        SelectColumn::Metadata(field) => metadata_field(unit, ctx.documents, field.as_deref()),
        SelectColumn::Snippet { var, window } => snippet_cell(unit, ctx.documents, var, window.unwrap_or(DEFAULT_SNIPPET_WINDOW)),
        SelectColumn::Count(_) => unreachable!("COUNT columns are routed through assemble_counts"),
    }
}

/// `TITLE`/`TIMESTAMP`/`METADATA` never fail the row (§4.11 step 3): any
/// `DocStoreError` or absent document is absorbed into `NULL` with a
/// one-time warning (§7 propagation policy).
fn doc_field(unit: &Unit, documents: &dyn DocumentStore, render: impl Fn(&DocumentRecord) -> String) -> CellValue {
    let Some(document_id) = unit.document_id() else { return CellValue::Null };
    match documents.get(document_id) {
        Ok(Some(record)) => CellValue::Text(render(&record)),
        Ok(None) => {
            tracing::warn!(document_id = document_id.0, "document missing for optional column, emitting empty cell");
            CellValue::Null
        }
        Err(err) => {
            tracing::warn!(document_id = document_id.0, %err, "document store lookup failed for optional column");
            CellValue::Null
        }
    }
}

fn metadata_field(unit: &Unit, documents: &dyn DocumentStore, field: Option<&str>) -> CellValue {
    let Some(field) = field else { return CellValue::Null };
    let Some(document_id) = unit.document_id() else { return CellValue::Null };
    match documents.metadata_field(document_id, field) {
        Ok(Some(value)) => CellValue::Text(value),
        Ok(None) => CellValue::Null,
        Err(err) => {
            tracing::warn!(document_id = document_id.0, field, %err, "metadata lookup failed for optional column");
            CellValue::Null
        }
    }
}

fn snippet_cell(unit: &Unit, documents: &dyn DocumentStore, var: &str, window: u32) -> CellValue {
    let Some((_, Some(position))) = unit.lookup_var(var) else { return CellValue::Text(NO_SNIPPET_CONTEXT.to_string()) };
    let Some(document_id) = unit.document_id() else { return CellValue::Text(NO_SNIPPET_CONTEXT.to_string()) };
    match build_snippet(documents, document_id, position, window) {
        Ok(text) => CellValue::Text(text),
        Err(err) => {
            tracing::warn!(document_id = document_id.0, %err, "snippet lookup failed, emitting placeholder");
            CellValue::Text(NO_SNIPPET_CONTEXT.to_string())
        }
    }
}

/// §4.11.1: locates word boundaries `window` words before `begin_char` and
/// after `end_char`, trims to those edges, and wraps in ellipses.
fn build_snippet(documents: &dyn DocumentStore, document_id: DocumentId, position: &Position, window: u32) -> Result<String> {
    let record = documents
        .get(document_id)?
        .ok_or_else(|| crate::core::error::Error::doc_store(format!("document {} not found", document_id.0)))?;
    let chars: Vec<char> = record.text.chars().collect();
    let begin = (position.begin_char as usize).min(chars.len());
    let end = (position.end_char as usize).min(chars.len()).max(begin);

    let start = word_boundary_back(&chars, begin, window);
    let stop = word_boundary_forward(&chars, end, window);

    let excerpt: String = chars[start..stop].iter().collect();
    let prefix = if start > 0 { "..." } else { "" };
    let suffix = if stop < chars.len() { "..." } else { "" };
    Ok(format!("{prefix}{excerpt}{suffix}"))
}

fn word_boundary_back(chars: &[char], mut idx: usize, words: u32) -> usize {
    for _ in 0..words {
        while idx > 0 && chars[idx - 1].is_whitespace() {
            idx -= 1;
        }
        while idx > 0 && !chars[idx - 1].is_whitespace() {
            idx -= 1;
        }
    }
    idx
}

fn word_boundary_forward(chars: &[char], mut idx: usize, words: u32) -> usize {
    let len = chars.len();
    for _ in 0..words {
        while idx < len && chars[idx].is_whitespace() {
            idx += 1;
        }
        while idx < len && !chars[idx].is_whitespace() {
            idx += 1;
        }
    }
    idx
}

fn apply_order_and_limit(rows: &mut Vec<Vec<CellValue>>, columns: &[String], order_by: &[OrderColumn], limit: Option<u64>) {
    if !order_by.is_empty() {
        let keys: Vec<(usize, bool)> = order_by.iter().filter_map(|o| columns.iter().position(|c| c == &o.name).map(|i| (i, o.descending))).collect();
        rows.sort_by(|a, b| {
            for &(idx, descending) in &keys {
                let ord = compare_cells(&a[idx], &b[idx], descending);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
    if let Some(limit) = limit {
        rows.truncate(limit as usize);
    }
}

/// NULLs sort last regardless of direction (§4.11 step 4); non-null values
/// compare normally and are reversed only for a descending column.
fn compare_cells(a: &CellValue, b: &CellValue, descending: bool) -> Ordering {
    match (a, b) {
        (CellValue::Null, CellValue::Null) => Ordering::Equal,
        (CellValue::Null, _) => Ordering::Greater,
        (_, CellValue::Null) => Ordering::Less,
        _ => {
            let ord = compare_non_null(a, b);
            if descending { ord.reverse() } else { ord }
        }
    }
}

fn compare_non_null(a: &CellValue, b: &CellValue) -> Ordering {
    match (a, b) {
        (CellValue::Integer(x), CellValue::Integer(y)) => x.cmp(y),
        (CellValue::Text(x), CellValue::Text(y)) => x.cmp(y),
        (CellValue::Integer(x), CellValue::Text(y)) => x.to_string().cmp(y),
        (CellValue::Text(x), CellValue::Integer(y)) => x.cmp(&y.to_string()),
        (CellValue::Null, _) | (_, CellValue::Null) => unreachable!("NULL handled by caller"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::InMemoryCorpus;
    use crate::core::match_set::{Granularity, MatchKey};
    use crate::core::types::{DocumentId, DocumentRecord, SentenceId};
    use crate::query::executor::QueryResult;
    use chrono::Utc;

    fn corpus_with(doc_id: u32, title: &str, text: &str) -> InMemoryCorpus {
        let mut corpus = InMemoryCorpus::new();
        corpus.add_document(DocumentRecord { document_id: DocumentId(doc_id), title: title.into(), text: text.into(), timestamp: Utc::now() });
        corpus
    }

    fn match_with_var(doc_id: u32, var: &str, value: Value, position: Option<Position>) -> DocSentenceMatch {
        let mut m = DocSentenceMatch::new(MatchKey::document(DocumentId(doc_id)), "contains");
        if let Some(position) = position {
            m.bind_variable(var, value, Some(position));
        } else {
            m.variable_values.insert(var.to_string(), value);
        }
        m
    }

    #[test]
    fn var_column_pulls_first_bound_value_and_title_is_absorbed_when_missing() {
        let corpus = corpus_with(1, "Cats", "The cat sat.");
        let m = match_with_var(1, "x", Value::Term("cat".into()), None);
        let executed = ExecutedQuery::Plain(QueryResult { matches: vec![m], granularity: Granularity::Document });

        let ctx = AssembleContext { documents: &corpus, main_alias: None, right_alias: None };
        let select = vec![SelectColumn::Var("x".into()), SelectColumn::Title, SelectColumn::Metadata(Some("missing_field".into()))];
        let table = assemble(&executed, &select, &[], None, &ctx);

        assert_eq!(table.columns, vec!["document_id", "sentence_id", "?x", "TITLE", "METADATA(\"missing_field\")"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][table.column_index("?x").unwrap()], CellValue::Text("cat".into()));
        assert_eq!(table.rows[0][table.column_index("TITLE").unwrap()], CellValue::Text("Cats".into()));
        assert_eq!(table.rows[0][table.column_index("METADATA(\"missing_field\")").unwrap()], CellValue::Null);
    }

    #[test]
    fn count_star_produces_one_summary_row() {
        let corpus = corpus_with(1, "T", "text");
        let matches = vec![
            DocSentenceMatch::new(MatchKey::document(DocumentId(1)), "contains"),
            DocSentenceMatch::new(MatchKey::document(DocumentId(2)), "contains"),
        ];
        let executed = ExecutedQuery::Plain(QueryResult { matches, granularity: Granularity::Document });
        let ctx = AssembleContext { documents: &corpus, main_alias: None, right_alias: None };

        let table = assemble(&executed, &[SelectColumn::Count(CountKind::Star)], &[], None, &ctx);
        assert_eq!(table.rows, vec![vec![CellValue::Integer(2)]]);
    }

    #[test]
    fn order_by_descending_sorts_nulls_last() {
        let corpus = corpus_with(1, "T", "text");
        let with_value = match_with_var(1, "x", Value::Integer(5), None);
        let without_value = DocSentenceMatch::new(MatchKey::document(DocumentId(2)), "contains");
        let executed = ExecutedQuery::Plain(QueryResult { matches: vec![without_value, with_value], granularity: Granularity::Document });
        let ctx = AssembleContext { documents: &corpus, main_alias: None, right_alias: None };

        let order = vec![OrderColumn { name: "?x".into(), descending: true }];
        let table = assemble(&executed, &[SelectColumn::Var("x".into())], &order, None, &ctx);
        let values: Vec<&CellValue> = table.rows.iter().map(|r| &r[2]).collect();
        assert_eq!(values, vec![&CellValue::Integer(5), &CellValue::Null]);
    }

    #[test]
    fn joined_rows_carry_left_and_right_id_columns() {
        let corpus = corpus_with(1, "T", "text");
        let left = DocSentenceMatch::new(MatchKey::document(DocumentId(1)), "date");
        let right = DocSentenceMatch::new(MatchKey::document(DocumentId(2)), "date");
        let executed = ExecutedQuery::Joined {
            rows: vec![JoinedMatch { left: Some(left), right: Some(right) }],
            left_alias: "main".into(),
            right_alias: "q2".into(),
            granularity: Granularity::Document,
        };
        let ctx = AssembleContext { documents: &corpus, main_alias: Some("main"), right_alias: Some("q2") };

        let table = assemble(&executed, &[], &[], None, &ctx);
        assert_eq!(table.columns, vec!["left_document_id", "left_sentence_id", "right_document_id", "right_sentence_id"]);
        assert_eq!(table.rows[0][0], CellValue::Integer(1));
        assert_eq!(table.rows[0][2], CellValue::Integer(2));
    }

    #[test]
    fn snippet_expands_by_word_boundaries_and_wraps_in_ellipses() {
        let corpus = corpus_with(1, "T", "The quick brown fox jumps over the lazy dog.");
        let position = Position::plain(DocumentId(1), SentenceId(0), 16, 19, Utc::now());
        let m = match_with_var(1, "a", Value::Entity("fox".into()), Some(position));
        let executed = ExecutedQuery::Plain(QueryResult { matches: vec![m], granularity: Granularity::Document });
        let ctx = AssembleContext { documents: &corpus, main_alias: None, right_alias: None };

        let table = assemble(&executed, &[SelectColumn::Snippet { var: "a".into(), window: Some(2) }], &[], None, &ctx);
        let CellValue::Text(snippet) = &table.rows[0][2] else { panic!("expected text cell") };
        assert!(snippet.contains("brown fox jumps over"), "got: {snippet}");
    }

    #[test]
    fn snippet_without_a_position_emits_the_absence_sentinel_and_never_raises() {
        let corpus = corpus_with(1, "T", "text");
        let m = match_with_var(1, "a", Value::Date(Utc::now()), None);
        let executed = ExecutedQuery::Plain(QueryResult { matches: vec![m], granularity: Granularity::Document });
        let ctx = AssembleContext { documents: &corpus, main_alias: None, right_alias: None };

        let table = assemble(&executed, &[SelectColumn::Snippet { var: "a".into(), window: None }], &[], None, &ctx);
        assert_eq!(table.rows[0][2], CellValue::Text(NO_SNIPPET_CONTEXT.to_string()));
    }

    #[test]
    fn limit_truncates_after_ordering() {
        let corpus = corpus_with(1, "T", "text");
        let matches: Vec<DocSentenceMatch> = (1..=5).map(|i| match_with_var(i, "x", Value::Integer(i as i64), None)).collect();
        let executed = ExecutedQuery::Plain(QueryResult { matches, granularity: Granularity::Document });
        let ctx = AssembleContext { documents: &corpus, main_alias: None, right_alias: None };

        let order = vec![OrderColumn { name: "?x".into(), descending: true }];
        let table = assemble(&executed, &[SelectColumn::Var("x".into())], &order, Some(2), &ctx);
        assert_eq!(table.rows.len(), 2);
        let values: Vec<&CellValue> = table.rows.iter().map(|r| &r[2]).collect();
        assert_eq!(values, vec![&CellValue::Integer(5), &CellValue::Integer(4)]);
    }
}
