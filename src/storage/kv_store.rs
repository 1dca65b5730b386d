//! Index store (C2): a thin wrapper over an ordered byte-keyed KV engine.
//! Uses `heed` (LMDB) as the on-disk engine, the same choice `milli` makes
//! for exactly this shape of workload — ordered byte keys, read-mostly, one
//! environment per logical store (see DESIGN.md).

use crate::core::error::{Error, ErrorKind, Result};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use std::fs;
use std::path::Path;

/// One ordered KV store, backed by a single-database LMDB environment
/// rooted at a directory (§4.2).
pub struct IndexStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

/// Map size heed pre-reserves for the environment; LMDB only grows the file
/// to what's actually written, so this just needs to exceed any single
/// index's eventual on-disk size.
const MAP_SIZE: usize = 16 * 1024 * 1024 * 1024;

impl IndexStore {
    /// Opens (creating if absent) the store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let mut options = EnvOpenOptions::new();
        options.map_size(MAP_SIZE);
        options.max_dbs(1);
        let env = unsafe { options.open(dir) }.map_err(Error::from)?;
        let mut wtxn = env.write_txn().map_err(Error::from)?;
        let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, None).map_err(Error::from)?;
        wtxn.commit().map_err(Error::from)?;
        Ok(IndexStore { env, db })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(Error::from)?;
        Ok(self.db.get(&rtxn, key).map_err(Error::from)?.map(|v| v.to_vec()))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(Error::from)?;
        self.db.put(&mut wtxn, key, value).map_err(Error::from)?;
        wtxn.commit().map_err(Error::from)?;
        Ok(())
    }

    /// Writes many key/value pairs in one transaction (§4.2 batched
    /// commits, §5 "bounded batches (default 1000)").
    pub fn batch_put(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(Error::from)?;
        for (k, v) in entries {
            self.db.put(&mut wtxn, k, v).map_err(Error::from)?;
        }
        wtxn.commit().map_err(Error::from)?;
        Ok(())
    }

    /// All entries whose key starts with `prefix`, in lexicographic key
    /// order (§5 "Ordering guarantees").
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let rtxn = self.env.read_txn().map_err(Error::from)?;
        let mut out = Vec::new();
        for item in self.db.prefix_iter(&rtxn, prefix).map_err(Error::from)? {
            let (k, v) = item.map_err(Error::from)?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// All entries with key >= `key`, in lexicographic key order.
    pub fn seek(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let rtxn = self.env.read_txn().map_err(Error::from)?;
        let range = key.to_vec()..;
        let mut out = Vec::new();
        for item in self.db.range(&rtxn, &range).map_err(Error::from)? {
            let (k, v) = item.map_err(Error::from)?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// Number of entries currently stored, for operational stats (§F).
    pub fn len(&self) -> Result<u64> {
        let rtxn = self.env.read_txn().map_err(Error::from)?;
        self.db.len(&rtxn).map_err(Error::from)
    }

    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn require(cond: bool, msg: &str) -> Result<()> {
        if cond { Ok(()) } else { Err(Error::new(ErrorKind::Internal, msg)) }
    }

    #[test]
    fn put_get_and_scan_prefix() -> Result<()> {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path())?;
        store.put(b"cat", b"one")?;
        store.put(b"cat\0sat", b"two")?;
        store.put(b"dog", b"three")?;

        require(store.get(b"cat")?.as_deref() == Some(&b"one"[..]), "get cat")?;
        require(store.get(b"missing")?.is_none(), "missing key absent, not error")?;

        let prefix_hits = store.scan_prefix(b"cat")?;
        require(prefix_hits.len() == 2, "prefix scan finds both cat keys")?;
        require(prefix_hits[0].0 == b"cat", "lexicographic order")?;
        Ok(())
    }

    #[test]
    fn batch_put_is_atomic_within_one_transaction() -> Result<()> {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path())?;
        let entries: Vec<(Vec<u8>, Vec<u8>)> =
            (0..50u32).map(|i| (i.to_be_bytes().to_vec(), b"v".to_vec())).collect();
        store.batch_put(&entries)?;
        for (k, _) in &entries {
            require(store.get(k)?.is_some(), "batched key present")?;
        }
        Ok(())
    }
}
