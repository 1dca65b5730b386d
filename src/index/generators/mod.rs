//! Index generators (C3): one module per index type, each scanning the
//! annotation store and writing `PositionList`s keyed per §3's key shapes,
//! sharing one generation-then-publish shape across all eight index types.

pub mod dependency;
pub mod hypernym;
pub mod ner_date;
pub mod ngram;
pub mod pos;
pub mod stitch;

use crate::core::error::{Error, ErrorKind, Result};
use crate::index::IndexAccess;
use crate::storage::kv_store::IndexStore;
use std::collections::BTreeMap;
use std::path::Path;

/// True if `dir` exists and contains no data files yet. Generators honor
/// `preserve_existing` by refusing to run when this is false (§4.3).
pub fn index_dir_is_empty(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(true);
    }
    let mut entries = std::fs::read_dir(dir)?;
    Ok(entries.next().is_none())
}

pub fn guard_preserve_existing(dir: &Path, preserve_existing: bool) -> Result<()> {
    if preserve_existing && !index_dir_is_empty(dir)? {
        return Err(Error::new(
            ErrorKind::InvalidState,
            format!("refusing to overwrite non-empty index directory {} (preserve_existing=true)", dir.display()),
        ));
    }
    Ok(())
}

/// Opens the staging directory for `index_type` and writes `entries` in
/// batches of `batch_size`, grouped under one `IndexAccess` (§5 "bounded
/// batches").
pub fn write_generated_index(staging_dir: &Path, entries: BTreeMap<Vec<u8>, crate::core::position::PositionList>, batch_size: usize) -> Result<()> {
    let store = IndexStore::open(staging_dir)?;
    let access = IndexAccess::new(store);
    let batch: Vec<(Vec<u8>, crate::core::position::PositionList)> = entries.into_iter().collect();
    for chunk in batch.chunks(batch_size.max(1)) {
        access.batch_put_position_lists(chunk)?;
    }
    Ok(())
}

pub(crate) fn lowercase_ascii(s: &str) -> String {
    s.to_ascii_lowercase()
}

pub(crate) fn ngram_key(parts: &[&str]) -> Vec<u8> {
    parts.join("\0").into_bytes()
}
