//! core::lock
//!
//! Exclusive project lock for build runs.
//!
//! # Architecture
//!
//! A build run reads the image registry, invokes the builder and reads the
//! registry again. Two runs against the same project would race each other
//! into building the same image twice, so `build` holds this lock for its
//! whole duration.
//!
//! # Storage
//!
//! - `<project>/.amitree.lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock is held for the entire run
//! - Lock is released on drop
//! - Acquisition is non-blocking (fails fast if locked)
//!
//! # Example
//!
//! ```no_run
//! use amitree::core::lock::BuildLock;
//! use std::path::Path;
//!
//! let lock = BuildLock::acquire(Path::new("/path/to/project")).unwrap();
//! assert!(lock.is_held());
//! // ... run the build ...
//! drop(lock);
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

/// File name of the lock, relative to the project directory.
pub const LOCK_FILE: &str = ".amitree.lock";

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("project is locked by another amitree run ({0})")]
    AlreadyLocked(PathBuf),

    /// Failed to create the lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on a project directory.
///
/// Released when the guard is dropped, even if the run panics.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
    /// Open handle holding the lock; `None` once released.
    file: Option<File>,
}

impl BuildLock {
    /// Attempt to acquire the lock for `project_dir`.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(project_dir: &Path) -> Result<Self, LockError> {
        let path = Self::lock_path(project_dir);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(LockError::AlreadyLocked(path))
            }
            Err(e) => return Err(LockError::AcquireFailed(e.to_string())),
        }

        // Owner pid, for humans inspecting a stuck lock.
        file.set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .map_err(|e| LockError::AcquireFailed(e.to_string()))?;

        debug!(path = %path.display(), "build lock acquired");
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Try to acquire the lock, returning `None` if another run holds it.
    pub fn try_acquire(project_dir: &Path) -> Result<Option<Self>, LockError> {
        match Self::acquire(project_dir) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Path of the lock file for `project_dir`.
    pub fn lock_path(project_dir: &Path) -> PathBuf {
        project_dir.join(LOCK_FILE)
    }

    /// Whether this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
            debug!(path = %self.path.display(), "build lock released");
        }
        Ok(())
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_acquire_succeeds() {
        let temp = TempDir::new().unwrap();

        let lock = BuildLock::acquire(temp.path()).expect("acquire lock");
        assert!(lock.is_held());
        assert!(lock.path().exists());
        assert_eq!(lock.path(), temp.path().join(".amitree.lock"));
    }

    #[test]
    fn lock_records_pid() {
        let temp = TempDir::new().unwrap();

        let lock = BuildLock::acquire(temp.path()).expect("acquire lock");
        let contents = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn lock_prevents_second_acquire() {
        let temp = TempDir::new().unwrap();

        let _lock = BuildLock::acquire(temp.path()).expect("first acquire");
        let result = BuildLock::acquire(temp.path());
        assert!(matches!(result, Err(LockError::AlreadyLocked(_))));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().unwrap();

        {
            let lock = BuildLock::acquire(temp.path()).expect("first acquire");
            assert!(lock.is_held());
        }

        let lock = BuildLock::acquire(temp.path()).expect("second acquire");
        assert!(lock.is_held());
    }

    #[test]
    fn lock_released_explicitly() {
        let temp = TempDir::new().unwrap();

        let mut lock = BuildLock::acquire(temp.path()).expect("acquire");
        lock.release().expect("release");
        assert!(!lock.is_held());
        lock.release().expect("second release is a no-op");

        let again = BuildLock::acquire(temp.path()).expect("reacquire");
        assert!(again.is_held());
    }

    #[test]
    fn try_acquire_returns_none_when_locked() {
        let temp = TempDir::new().unwrap();

        let _lock = BuildLock::acquire(temp.path()).expect("first acquire");
        let result = BuildLock::try_acquire(temp.path()).expect("try_acquire");
        assert!(result.is_none());
    }

    #[test]
    fn missing_project_dir_fails_to_create() {
        let temp = TempDir::new().unwrap();
        let result = BuildLock::acquire(&temp.path().join("missing"));
        assert!(matches!(result, Err(LockError::CreateFailed(_))));
    }
}
