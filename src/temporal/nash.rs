//! Temporal index — Nash (C6): interval/range predicates over the
//! `ner_date` index's entity dates, grouped by `(document_id, sentence_id)`,
//! covering the full predicate set in §4.6. Initialization is lazy and
//! one-shot per index-set handle (§5), driven by `once_cell` from
//! `IndexSetManager::nash`.

use crate::core::error::Result;
use crate::core::types::DocumentId;
use crate::index::IndexAccess;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A date range observed for one `(document_id, sentence_id)`: the min and
/// max entity dates mentioned there. A sentence mentioning a single date has
/// `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NashRange {
    pub document_id: DocumentId,
    pub sentence_id: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempPred {
    Contains,
    ContainedBy,
    Intersect,
    Proximity(i64),
    Before,
    After,
    Equal,
}

pub struct NashIndex {
    ranges: Vec<NashRange>,
}

impl NashIndex {
    /// Scans the whole `ner_date` index once, grouping positions by
    /// `(document_id, sentence_id)` and folding each key's embedded date
    /// (`YYYYMMDD`, parsed from the index key, not `Position::timestamp`)
    /// into a min/max range.
    pub fn build(ner_date_index: &IndexAccess) -> Result<Self> {
        let mut by_match: BTreeMap<(u32, i32), (NaiveDate, NaiveDate)> = BTreeMap::new();

        for (key, positions) in ner_date_index.scan_prefix(b"")? {
            let Some(date) = parse_key_date(&key) else { continue };
            for position in positions.iter() {
                let entry = by_match.entry((position.document_id.0, position.sentence_id.0)).or_insert((date, date));
                if date < entry.0 {
                    entry.0 = date;
                }
                if date > entry.1 {
                    entry.1 = date;
                }
            }
        }

        let mut ranges: Vec<NashRange> = by_match
            .into_iter()
            .map(|((document_id, sentence_id), (start, end))| NashRange { document_id: DocumentId(document_id), sentence_id, start, end })
            .collect();
        ranges.sort_by_key(|r| r.start);
        Ok(NashIndex { ranges })
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// All ranges satisfying `pred` against `query_range` (§4.6).
    pub fn range_predicate(&self, query_range: (NaiveDate, NaiveDate), pred: TempPred) -> Vec<NashRange> {
        self.ranges
            .iter()
            .copied()
            .filter(|entry| matches_predicate((entry.start, entry.end), query_range, pred))
            .collect()
    }
}

/// Evaluates `pred` directly against a pair of ranges without touching the
/// index, for callers that already have both sides' date ranges in hand
/// (the join engine, C10, comparing a left and a right query's bindings).
pub fn evaluate(pred: TempPred, entry: (NaiveDate, NaiveDate), query: (NaiveDate, NaiveDate)) -> bool {
    matches_predicate(entry, query, pred)
}

fn matches_predicate(entry: (NaiveDate, NaiveDate), query: (NaiveDate, NaiveDate), pred: TempPred) -> bool {
    match pred {
        TempPred::Contains => range_contains(entry, query),
        TempPred::ContainedBy => range_contains(query, entry),
        TempPred::Intersect => ranges_intersect(entry, query),
        TempPred::Proximity(window) => proximity_days(entry, query) <= window,
        TempPred::Before => entry.1 < query.0,
        TempPred::After => entry.0 > query.1,
        TempPred::Equal => entry == query,
    }
}

fn ranges_intersect(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

fn range_contains(outer: (NaiveDate, NaiveDate), inner: (NaiveDate, NaiveDate)) -> bool {
    outer.0 <= inner.0 && outer.1 >= inner.1
}

fn proximity_days(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> i64 {
    if ranges_intersect(a, b) {
        return 0;
    }
    let gap_a_before_b = (b.0 - a.1).num_days();
    let gap_b_before_a = (a.0 - b.1).num_days();
    gap_a_before_b.max(gap_b_before_a).abs()
}

fn parse_key_date(key: &[u8]) -> Option<NaiveDate> {
    if key.len() != 8 || !key.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let s = std::str::from_utf8(key).ok()?;
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv_store::IndexStore;
    use crate::core::position::Position;
    use crate::core::types::SentenceId;
    use chrono::Utc;
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn build_ner_date_index() -> IndexAccess {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();
        let access = IndexAccess::new(store);
        let mut list = crate::core::position::PositionList::new();
        list.add(Position::plain(DocumentId(1), SentenceId(0), 0, 10, Utc::now()));
        access.put_position_list(b"20230601", &list).unwrap();
        access
    }

    #[test]
    fn intersect_finds_the_range_overlapping_the_query() {
        let access = build_ner_date_index();
        let nash = NashIndex::build(&access).unwrap();
        assert_eq!(nash.len(), 1);

        let hits = nash.range_predicate((date("2023-05-01"), date("2023-12-31")), TempPred::Intersect);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, DocumentId(1));

        let misses = nash.range_predicate((date("2020-01-01"), date("2020-12-31")), TempPred::Intersect);
        assert!(misses.is_empty());
    }

    #[test]
    fn proximity_is_symmetric_and_respects_window() {
        let a = (date("2023-01-01"), date("2023-01-01"));
        let b = (date("2023-01-10"), date("2023-01-10"));
        assert_eq!(proximity_days(a, b), proximity_days(b, a));
        assert!(proximity_days(a, b) <= 30);
        assert!(proximity_days(a, b) > 5);
    }

    #[test]
    fn before_after_reduce_to_endpoint_comparison() {
        let entry = (date("2023-01-01"), date("2023-01-01"));
        assert!(matches_predicate(entry, (date("2023-02-01"), date("2023-03-01")), TempPred::Before));
        assert!(matches_predicate(entry, (date("2022-01-01"), date("2022-06-01")), TempPred::After));
    }
}
