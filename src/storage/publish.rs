//! Atomic build-then-publish for index sets (§5: "builders MUST fsync and
//! atomically publish finished directories (rename-into-place) to preserve
//! reader isolation. A reader opening mid-build sees either the old or new
//! state, never a torn one."). A whole-directory publish step rather than
//! per-write durability, since builds here are single-shot batch jobs, not
//! an online write path.

use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::layout::IndexSetLayout;
use std::fs;
use std::path::{Path, PathBuf};

/// A staging area a generator builds an index set into before publishing.
/// `staging_dir()` is the writable root; nothing under it is visible to
/// readers (who only ever see `layout.set_dir()`) until `publish()` renames
/// it into place.
pub struct BuildStaging {
    pub staging_dir: PathBuf,
    pub final_dir: PathBuf,
}

impl BuildStaging {
    pub fn begin(layout: &IndexSetLayout) -> Result<Self> {
        let staging_dir = layout.staging_dir();
        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir)?;
        }
        fs::create_dir_all(&staging_dir)?;
        Ok(BuildStaging { staging_dir, final_dir: layout.set_dir() })
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.staging_dir.join(relative)
    }

    /// fsyncs every regular file under the staging dir, then renames the
    /// staging directory over the final directory. `rename` is atomic on
    /// the same filesystem, so a concurrent reader's `open()` either sees
    /// the fully-old tree or the fully-new one.
    pub fn publish(self) -> Result<()> {
        fsync_tree(&self.staging_dir)?;

        if self.final_dir.exists() {
            let backup = self.final_dir.with_extension("previous");
            if backup.exists() {
                fs::remove_dir_all(&backup)?;
            }
            fs::rename(&self.final_dir, &backup)?;
            match fs::rename(&self.staging_dir, &self.final_dir) {
                Ok(()) => {
                    fs::remove_dir_all(&backup)?;
                    Ok(())
                }
                Err(err) => {
                    // best-effort rollback so a failed publish still leaves
                    // readers with a complete (old) tree
                    let _ = fs::rename(&backup, &self.final_dir);
                    Err(Error::from(err))
                }
            }
        } else {
            if let Some(parent) = self.final_dir.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&self.staging_dir, &self.final_dir).map_err(Error::from)
        }
    }

    pub fn abort(self) -> Result<()> {
        fs::remove_dir_all(&self.staging_dir).map_err(Error::from)
    }
}

fn fsync_tree(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            fsync_tree(&path)?;
        } else {
            let file = fs::File::open(&path)?;
            file.sync_all()?;
        }
    }
    let dir_handle = fs::File::open(dir)?;
    let _ = dir_handle.sync_all();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn publish_moves_staging_into_final_location() {
        let root = tempdir().unwrap();
        let layout = IndexSetLayout::new(root.path(), "corpus");
        let staging = BuildStaging::begin(&layout).unwrap();
        fs::write(staging.path("marker.txt"), b"hello").unwrap();
        staging.publish().unwrap();

        let published = layout.set_dir().join("marker.txt");
        assert_eq!(fs::read(published).unwrap(), b"hello");
    }

    #[test]
    fn republish_replaces_previous_contents_atomically() {
        let root = tempdir().unwrap();
        let layout = IndexSetLayout::new(root.path(), "corpus");

        let first = BuildStaging::begin(&layout).unwrap();
        fs::write(first.path("v.txt"), b"v1").unwrap();
        first.publish().unwrap();

        let second = BuildStaging::begin(&layout).unwrap();
        fs::write(second.path("v.txt"), b"v2").unwrap();
        second.publish().unwrap();

        let contents = fs::read(layout.set_dir().join("v.txt")).unwrap();
        assert_eq!(contents, b"v2");
        assert!(!layout.set_dir().with_extension("previous").exists());
    }
}
