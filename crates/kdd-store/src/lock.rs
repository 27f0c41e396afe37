//! Advisory lock for the artifact root.
//!
//! At most one process mutates a `.kdd-index/` at a time. The lock is a
//! `create_new` file holding the owner's pid, removed on drop.

use crate::error::{Result, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct IndexLock {
    path: PathBuf,
}

impl IndexLock {
    /// Acquire the lock under `root`, failing if another process holds it.
    pub fn acquire(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| StoreError::write(root, e))?;
        let path = root.join(".lock");

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => {
                let _ = fs::write(&path, std::process::id().to_string());
                Ok(Self { path })
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::Locked(path))
            }
            Err(err) => Err(StoreError::write(&path, err)),
        }
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            log::warn!("failed to release lock {}: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let lock = IndexLock::acquire(dir.path()).unwrap();
        assert!(matches!(
            IndexLock::acquire(dir.path()),
            Err(StoreError::Locked(_))
        ));
        drop(lock);
        let relocked = IndexLock::acquire(dir.path());
        assert!(relocked.is_ok());
    }
}
