pub mod generators;
pub mod manager;

use crate::core::error::Result;
use crate::core::position::PositionList;
use crate::storage::kv_store::IndexStore;

pub use manager::IndexSetManager;

/// Read/write access to one index's underlying KV store, speaking
/// `PositionList` instead of raw bytes (C2 + C1 composed for callers).
pub struct IndexAccess {
    store: IndexStore,
}

impl IndexAccess {
    pub fn new(store: IndexStore) -> Self {
        IndexAccess { store }
    }

    pub fn get_position_list(&self, key: &[u8]) -> Result<PositionList> {
        match self.store.get(key)? {
            Some(bytes) => PositionList::deserialize(&bytes),
            None => Ok(PositionList::new()),
        }
    }

    pub fn put_position_list(&self, key: &[u8], list: &PositionList) -> Result<()> {
        self.store.put(key, &list.serialize())
    }

    pub fn batch_put_position_lists(&self, entries: &[(Vec<u8>, PositionList)]) -> Result<()> {
        let encoded: Vec<(Vec<u8>, Vec<u8>)> = entries.iter().map(|(k, v)| (k.clone(), v.serialize())).collect();
        self.store.batch_put(&encoded)
    }

    /// All `(key, PositionList)` pairs whose key starts with `prefix`, in
    /// key order (used by wildcard `DEP` lookups and by Nash's ner_date
    /// scan).
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, PositionList)>> {
        self.store
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(k, v)| PositionList::deserialize(&v).map(|list| (k, list)))
            .collect()
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Number of distinct keys currently stored (§F operational stats).
    pub fn key_count(&self) -> Result<u64> {
        self.store.len()
    }
}
