//! Single-writer guarantee for index builds (§5: "Index builds are
//! single-writer"), via an advisory `flock` on an arbitrary lock path.

use crate::core::error::{Error, ErrorKind, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;

pub struct FileLock {
    _file: File,
    exclusive: bool,
}

impl FileLock {
    pub fn acquire(lock_path: &Path, exclusive: bool) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = if exclusive {
            OpenOptions::new().create(true).write(true).open(lock_path)?
        } else {
            OpenOptions::new().create(true).read(true).open(lock_path)?
        };

        #[cfg(unix)]
        {
            use libc::{flock, LOCK_EX, LOCK_NB, LOCK_SH};
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            let operation = (if exclusive { LOCK_EX } else { LOCK_SH }) | LOCK_NB;
            unsafe {
                if flock(fd, operation) != 0 {
                    return Err(Error::new(
                        ErrorKind::Io,
                        format!("failed to acquire {} lock on {}", if exclusive { "exclusive" } else { "shared" }, lock_path.display()),
                    ));
                }
            }
        }

        Ok(FileLock { _file: file, exclusive })
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use libc::{flock, LOCK_UN};
            use std::os::unix::io::AsRawFd;

            let fd = self._file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn exclusive_lock_blocks_a_second_exclusive_attempt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".lock");
        let _first = FileLock::acquire(&path, true).unwrap();
        let second = FileLock::acquire(&path, true);
        assert!(second.is_err());
    }

    #[test]
    fn shared_locks_do_not_conflict_with_each_other() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".lock");
        let _a = FileLock::acquire(&path, false).unwrap();
        let b = FileLock::acquire(&path, false);
        assert!(b.is_ok());
    }
}
