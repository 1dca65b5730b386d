//! Index-set manager (C4): opens all index stores and synonym tables for a
//! named corpus under one root, and hands out a single shared handle per
//! store per process, open once and shared read-only for the life of the
//! handle.

use crate::core::config::IndexSetConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{HealthCheck, HealthCheckResult, HealthStatus, IndexSetStats};
use crate::index::IndexAccess;
use crate::storage::kv_store::IndexStore;
use crate::storage::layout::{IndexSetLayout, IndexType, SynonymKind};
use crate::synonym::{SynonymTable, SynonymTableBuilder};
use crate::temporal::NashIndex;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

pub struct IndexSetManager {
    layout: IndexSetLayout,
    indexes: HashMap<IndexType, IndexAccess>,
    synonyms: HashMap<SynonymKind, SynonymTable>,
    nash: OnceCell<NashIndex>,
    opened_at: Instant,
}

impl IndexSetManager {
    /// Opens (but does not build) every index directory and synonym file
    /// for `set_name` under `root`. Index directories that don't exist yet
    /// are created empty, mirroring `IndexStore::open`'s own behavior, so
    /// that a freshly staged build can open-then-populate.
    pub fn open(root: &Path, set_name: &str) -> Result<Self> {
        Self::open_with_config(root, set_name, &IndexSetConfig::default())
    }

    /// Like `open`, but honors `config.eager_nash_cache` (§4.6 lazy-by-default,
    /// opt-in eager init on open).
    pub fn open_with_config(root: &Path, set_name: &str, config: &IndexSetConfig) -> Result<Self> {
        let layout = IndexSetLayout::new(root, set_name);

        let mut indexes = HashMap::new();
        for index_type in IndexType::ALL {
            let store = IndexStore::open(&layout.index_dir(index_type))?;
            indexes.insert(index_type, IndexAccess::new(store));
        }

        let mut synonyms = HashMap::new();
        for kind in SynonymKind::ALL {
            let path = layout.synonym_file(kind);
            let table = if path.exists() { SynonymTable::load(&path)? } else { SynonymTableBuilder::new().build()? };
            synonyms.insert(kind, table);
        }

        let manager = IndexSetManager { layout, indexes, synonyms, nash: OnceCell::new(), opened_at: Instant::now() };
        if config.eager_nash_cache {
            manager.nash()?;
        }
        Ok(manager)
    }

    pub fn get(&self, index_type: IndexType) -> Option<&IndexAccess> {
        self.indexes.get(&index_type)
    }

    pub fn require(&self, index_type: IndexType) -> Result<&IndexAccess> {
        self.get(index_type)
            .ok_or_else(|| Error::new(ErrorKind::Schema, format!("index set has no '{}' index", index_type.dir_name())))
    }

    pub fn all(&self) -> &HashMap<IndexType, IndexAccess> {
        &self.indexes
    }

    pub fn synonyms(&self, kind: SynonymKind) -> &SynonymTable {
        &self.synonyms[&kind]
    }

    pub fn layout(&self) -> &IndexSetLayout {
        &self.layout
    }

    /// Builds the Nash temporal index on first use and caches it for the
    /// lifetime of this handle (§4.6, §5 "one-shot initializer").
    pub fn nash(&self) -> Result<&NashIndex> {
        self.nash.get_or_try_init(|| NashIndex::build(self.require(IndexType::NerDate)?))
    }

    /// Key counts per index, synonym table sizes, and whether the Nash
    /// index has been built yet (§F operational stats, grounded on the
    /// teacher's `Database::stats`).
    pub fn stats(&self) -> Result<IndexSetStats> {
        let mut key_counts = std::collections::BTreeMap::new();
        for (index_type, access) in &self.indexes {
            key_counts.insert(index_type.dir_name().to_string(), access.key_count()?);
        }
        let mut synonym_table_sizes = std::collections::BTreeMap::new();
        for (kind, table) in &self.synonyms {
            synonym_table_sizes.insert(kind.file_stem().to_string(), table.len() as u64);
        }
        Ok(IndexSetStats {
            set_name: self.layout.set_name.clone(),
            key_counts,
            synonym_table_sizes,
            nash_initialized: self.nash.get().is_some(),
            query_count: 0,
            uptime: self.opened_at.elapsed(),
        })
    }
}

impl HealthCheck for IndexSetManager {
    /// Confirms every index directory is reachable and the `ner_date` index
    /// (the one with an expensive, lazily-built dependent — Nash) still
    /// opens cleanly.
    fn check(&self) -> HealthCheckResult {
        for index_type in IndexType::ALL {
            if let Err(err) = self.require(index_type).and_then(|access| access.key_count()) {
                return HealthCheckResult { status: HealthStatus::Degraded, detail: format!("index '{}' unreachable: {err}", index_type.dir_name()) };
            }
        }
        HealthCheckResult { status: HealthStatus::Healthy, detail: "all indexes reachable".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_every_index_directory_and_empty_synonym_tables() {
        let root = tempdir().unwrap();
        let manager = IndexSetManager::open(root.path(), "enwiki").unwrap();

        for index_type in IndexType::ALL {
            assert!(manager.get(index_type).is_some());
            assert!(root.path().join("enwiki").join(index_type.dir_name()).exists());
        }
        for kind in SynonymKind::ALL {
            assert!(manager.synonyms(kind).is_empty());
        }
    }

    #[test]
    fn require_rejects_nothing_since_all_index_types_are_always_opened() {
        let root = tempdir().unwrap();
        let manager = IndexSetManager::open(root.path(), "enwiki").unwrap();
        assert!(manager.require(IndexType::Hypernym).is_ok());
    }

    #[test]
    fn stats_reports_zero_keys_and_unbuilt_nash_for_a_fresh_set() {
        let root = tempdir().unwrap();
        let manager = IndexSetManager::open(root.path(), "enwiki").unwrap();
        let stats = manager.stats().unwrap();

        assert_eq!(stats.set_name, "enwiki");
        assert!(!stats.nash_initialized);
        assert!(stats.key_counts.values().all(|&count| count == 0));
    }

    #[test]
    fn health_check_is_healthy_for_a_freshly_opened_set() {
        let root = tempdir().unwrap();
        let manager = IndexSetManager::open(root.path(), "enwiki").unwrap();
        assert_eq!(manager.check().status, HealthStatus::Healthy);
    }
}
