//! Synonym tables (C5): bijection between string values and dense integer
//! ids, used to keep stitch `PositionList` payloads small. Grounded on the
//! teacher's `fst`-backed term dictionaries, generalized from "term only"
//! to any of the four synonym kinds (date/ner/pos/dependency).

use crate::core::error::{Error, ErrorKind, Result};
use fst::{Map, MapBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Ids are assigned in first-seen order during a build; this is not the
/// same order `fst::Map` stores its keys in (lexicographic), so the
/// forward direction (string -> id) is carried separately from the
/// reverse direction (id -> string).
pub struct SynonymTableBuilder {
    next_id: u32,
    ids: HashMap<String, u32>,
    order: Vec<String>,
}

impl SynonymTableBuilder {
    pub fn new() -> Self {
        SynonymTableBuilder { next_id: 0, ids: HashMap::new(), order: Vec::new() }
    }

    /// Interns `value`, returning its stable id. Repeated interning of the
    /// same value returns the same id (§4.5 "ids are assigned in
    /// first-seen order").
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.ids.get(value) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(value.to_string(), id);
        self.order.push(value.to_string());
        id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn build(self) -> Result<SynonymTable> {
        let mut sorted: Vec<(&str, u32)> = self.ids.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut builder = MapBuilder::memory();
        for (value, id) in sorted {
            builder.insert(value, id as u64).map_err(|e| {
                Error::new(ErrorKind::Internal, format!("synonym fst build failed: {e}"))
            })?;
        }
        let fst_bytes = builder
            .into_inner()
            .map_err(|e| Error::new(ErrorKind::Internal, format!("synonym fst finish failed: {e}")))?;

        Ok(SynonymTable { forward: Map::new(fst_bytes).map_err(Error::from)?, reverse: self.order })
    }
}

impl Default for SynonymTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sentinel returned by `lookup_value` when the requested id predates the
/// table or was never assigned (§4.5 "missing ids resolve to a sentinel
/// \"unknown\" and never crash a lookup").
pub const UNKNOWN_VALUE: &str = "<unknown>";

pub struct SynonymTable {
    forward: Map<Vec<u8>>,
    reverse: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct OnDiskTable {
    fst_bytes: Vec<u8>,
    reverse: Vec<String>,
}

impl SynonymTable {
    pub fn empty() -> Result<Self> {
        SynonymTableBuilder::new().build()
    }

    pub fn lookup_id(&self, value: &str) -> Option<u32> {
        self.forward.get(value).map(|id| id as u32)
    }

    pub fn lookup_value(&self, id: u32) -> &str {
        self.reverse.get(id as usize).map(|s| s.as_str()).unwrap_or(UNKNOWN_VALUE)
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let on_disk = OnDiskTable { fst_bytes: self.forward.as_fst().as_bytes().to_vec(), reverse: self.reverse.clone() };
        let bytes = bincode::serialize(&on_disk)?;
        fs::write(path, bytes).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let on_disk: OnDiskTable = bincode::deserialize(&bytes)?;
        let forward = Map::new(on_disk.fst_bytes).map_err(Error::from)?;
        Ok(SynonymTable { forward, reverse: on_disk.reverse })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn intern_is_stable_and_first_seen_ordered() {
        let mut builder = SynonymTableBuilder::new();
        let a = builder.intern("PERSON");
        let b = builder.intern("LOCATION");
        let a_again = builder.intern("PERSON");
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn build_round_trips_ids_and_values() {
        let mut builder = SynonymTableBuilder::new();
        let person = builder.intern("PERSON");
        let location = builder.intern("LOCATION");
        let table = builder.build().unwrap();

        assert_eq!(table.lookup_id("PERSON"), Some(person));
        assert_eq!(table.lookup_id("LOCATION"), Some(location));
        assert_eq!(table.lookup_value(person), "PERSON");
        assert_eq!(table.lookup_value(location), "LOCATION");
    }

    #[test]
    fn unknown_lookups_never_crash() {
        let table = SynonymTable::empty().unwrap();
        assert_eq!(table.lookup_id("missing"), None);
        assert_eq!(table.lookup_value(42), UNKNOWN_VALUE);
    }

    #[test]
    fn save_and_load_preserve_the_bijection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ner_synonyms.ser");

        let mut builder = SynonymTableBuilder::new();
        let person = builder.intern("PERSON");
        let date = builder.intern("DATE");
        let table = builder.build().unwrap();
        table.save(&path).unwrap();

        let loaded = SynonymTable::load(&path).unwrap();
        assert_eq!(loaded.lookup_id("PERSON"), Some(person));
        assert_eq!(loaded.lookup_value(date), "DATE");
    }
}
