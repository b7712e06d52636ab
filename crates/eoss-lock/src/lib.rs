//! Per-object advisory locks, implemented as OS file locks on a sentinel
//! file under `OBJECT_LOCK_PATH/<object_name>.lock`.
//!
//! Acquisition is always non-blocking: contention surfaces immediately as
//! [`EossError::LockBusyRead`] or [`EossError::LockBusyWrite`] (depending on
//! the mode being requested) rather than queuing the caller. Sentinel files
//! are never garbage-collected — they're cheap, and external tooling may
//! want to find them.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use eoss_common::{EossError, Result};
use fs2::FileExt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Handle to a held lock. Dropping it releases the OS lock and closes the
/// sentinel file; [`ObjectLockManager::release`] does the same thing
/// explicitly, for call sites that want the release to be visible in their
/// own control flow rather than implicit in a scope exit.
pub struct LockHandle {
    file: File,
    mode: LockMode,
    object_name: String,
}

impl LockHandle {
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[derive(Debug, Clone)]
pub struct ObjectLockManager {
    lock_dir: PathBuf,
}

impl ObjectLockManager {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
        }
    }

    fn sentinel_path(&self, object_name: &str) -> PathBuf {
        self.lock_dir.join(format!("{object_name}.lock"))
    }

    /// Take a shared, non-blocking lock. Multiple shared holders may coexist;
    /// an exclusive holder elsewhere fails this immediately with
    /// `LockBusyRead`.
    pub fn acquire_shared(&self, object_name: &str) -> Result<LockHandle> {
        let path = self.sentinel_path(object_name);
        let file = open_sentinel(&path)?;
        match file.try_lock_shared() {
            Ok(()) => {
                debug!(object_name, "acquired shared object lock");
                Ok(LockHandle {
                    file,
                    mode: LockMode::Shared,
                    object_name: object_name.to_string(),
                })
            }
            Err(e) if is_contended(&e) => Err(EossError::LockBusyRead),
            Err(e) => Err(EossError::Internal(e.to_string())),
        }
    }

    /// Take an exclusive, non-blocking lock. Any other shared or exclusive
    /// holder fails this immediately with `LockBusyWrite`.
    pub fn acquire_exclusive(&self, object_name: &str) -> Result<LockHandle> {
        let path = self.sentinel_path(object_name);
        let file = open_sentinel(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(object_name, "acquired exclusive object lock");
                Ok(LockHandle {
                    file,
                    mode: LockMode::Exclusive,
                    object_name: object_name.to_string(),
                })
            }
            Err(e) if is_contended(&e) => Err(EossError::LockBusyWrite),
            Err(e) => Err(EossError::Internal(e.to_string())),
        }
    }

    /// Explicitly release a held lock. Equivalent to dropping the handle.
    pub fn release(&self, handle: LockHandle) {
        drop(handle);
    }
}

fn open_sentinel(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)
        .map_err(EossError::Io)
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn exclusive_conflicts_with_exclusive() {
        let dir = tempdir().unwrap();
        let mgr = ObjectLockManager::new(dir.path());

        let first = mgr.acquire_exclusive("obj").unwrap();
        let second = mgr.acquire_exclusive("obj");
        assert!(matches!(second, Err(EossError::LockBusyWrite)));

        drop(first);
        assert!(mgr.acquire_exclusive("obj").is_ok());
    }

    #[test]
    fn exclusive_conflicts_with_shared() {
        let dir = tempdir().unwrap();
        let mgr = ObjectLockManager::new(dir.path());

        let shared = mgr.acquire_shared("obj").unwrap();
        assert!(matches!(
            mgr.acquire_exclusive("obj"),
            Err(EossError::LockBusyWrite)
        ));
        drop(shared);
        assert!(mgr.acquire_exclusive("obj").is_ok());
    }

    #[test]
    fn shared_conflicts_with_exclusive_as_a_read_busy_error() {
        let dir = tempdir().unwrap();
        let mgr = ObjectLockManager::new(dir.path());

        let exclusive = mgr.acquire_exclusive("obj").unwrap();
        assert!(matches!(
            mgr.acquire_shared("obj"),
            Err(EossError::LockBusyRead)
        ));
        drop(exclusive);
        assert!(mgr.acquire_shared("obj").is_ok());
    }

    #[test]
    fn multiple_shared_locks_coexist() {
        let dir = tempdir().unwrap();
        let mgr = ObjectLockManager::new(dir.path());

        let a = mgr.acquire_shared("obj").unwrap();
        let b = mgr.acquire_shared("obj").unwrap();
        assert_eq!(a.mode(), LockMode::Shared);
        assert_eq!(b.mode(), LockMode::Shared);
    }

    #[test]
    fn locks_on_different_objects_are_independent() {
        let dir = tempdir().unwrap();
        let mgr = ObjectLockManager::new(dir.path());

        let _a = mgr.acquire_exclusive("one").unwrap();
        assert!(mgr.acquire_exclusive("two").is_ok());
    }

    #[test]
    fn release_drops_the_lock() {
        let dir = tempdir().unwrap();
        let mgr = ObjectLockManager::new(dir.path());

        let handle = mgr.acquire_exclusive("obj").unwrap();
        mgr.release(handle);
        assert!(mgr.acquire_exclusive("obj").is_ok());
    }
}
