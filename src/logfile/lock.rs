//! Two-level locking for rotating logs
//!
//! Every operation first takes the process-local lock for the log's path,
//! then the advisory lock on `<name>.lock`. The process-local lock orders
//! threads (including separate writer instances for the same path); the
//! file lock orders processes.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use fs2::FileExt;
use parking_lot::{Mutex, ReentrantMutex};

/// Re-entrant mutex shared by every writer addressing one log path
pub type ProcessLock = Arc<ReentrantMutex<()>>;

/// Process-wide table from absolute lock-file path to its mutex.
///
/// Entries are created on first use and live as long as the registry.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<PathBuf, ProcessLock>>,
}

impl LockRegistry {
    /// Create an isolated registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every writer in this process
    pub fn global() -> Arc<LockRegistry> {
        static GLOBAL: OnceLock<Arc<LockRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(LockRegistry::new())))
    }

    /// Get the mutex for `key`, creating it if this is the first request
    pub fn lock_for(&self, key: &Path) -> ProcessLock {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(key.to_path_buf())
                .or_insert_with(|| Arc::new(ReentrantMutex::new(()))),
        )
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive advisory lock on a lock file.
///
/// The file handle is cached between acquisitions. If the file on disk is
/// deleted or replaced, the stale handle is dropped and the path reopened.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    file: Option<File>,
    held: bool,
}

impl LockFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            held: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a handle is currently cached
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Block until the exclusive lock is held
    pub fn lock(&mut self) -> io::Result<()> {
        if self.held {
            return Ok(());
        }

        loop {
            let file = self.take_valid_handle()?;

            if let Err(e) = FileExt::lock_exclusive(&file) {
                self.file = Some(file);
                return Err(e);
            }

            // The path may have been unlinked while we waited
            if refers_to(&file, &self.path) {
                self.file = Some(file);
                self.held = true;
                return Ok(());
            }

            tracing::debug!(path = %self.path.display(), "lock file replaced while waiting, retrying");
            if let Err(e) = FileExt::unlock(&file) {
                tracing::debug!(path = %self.path.display(), error = %e, "failed to unlock replaced lock file");
            }
        }
    }

    /// Release the lock, keeping the handle cached
    pub fn unlock(&mut self) -> io::Result<()> {
        if !self.held {
            return Ok(());
        }
        self.held = false;
        match &self.file {
            Some(file) => FileExt::unlock(file),
            None => Ok(()),
        }
    }

    /// Release the lock and drop the cached handle
    pub fn close(&mut self) -> io::Result<()> {
        let result = self.unlock();
        self.file = None;
        result
    }

    fn take_valid_handle(&mut self) -> io::Result<File> {
        if let Some(file) = self.file.take() {
            if refers_to(&file, &self.path) {
                return Ok(file);
            }
            tracing::debug!(path = %self.path.display(), "cached lock file handle is stale, reopening");
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock file");
        }
    }
}

/// Whether `path` still names the file behind `file`
#[cfg(unix)]
pub(crate) fn refers_to(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(open), Ok(on_disk)) => open.dev() == on_disk.dev() && open.ino() == on_disk.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub(crate) fn refers_to(file: &File, path: &Path) -> bool {
    file.metadata().is_ok() && path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_registry_shares_lock_per_key() {
        let registry = LockRegistry::new();
        let a = registry.lock_for(Path::new("/tmp/a.lock"));
        let b = registry.lock_for(Path::new("/tmp/a.lock"));
        let c = registry.lock_for(Path::new("/tmp/c.lock"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_lock_is_reentrant() {
        let registry = LockRegistry::new();
        let lock = registry.lock_for(Path::new("/tmp/r.lock"));
        let _outer = lock.lock();
        let _inner = lock.lock();
    }

    #[test]
    fn test_global_registry_is_singleton() {
        assert!(Arc::ptr_eq(&LockRegistry::global(), &LockRegistry::global()));
    }

    #[test]
    fn test_lock_creates_file_and_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("app.lock");
        let mut lock = LockFile::new(path.clone());

        lock.lock().unwrap();
        assert!(lock.is_held());
        assert!(path.exists());
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);

        lock.unlock().unwrap();
        assert!(!lock.is_held());
        assert!(lock.is_open());

        lock.close().unwrap();
        assert!(!lock.is_open());
    }

    #[test]
    fn test_lock_excludes_other_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.lock");
        let mut lock = LockFile::new(path.clone());
        lock.lock().unwrap();

        let other = File::open(&path).unwrap();
        assert!(FileExt::try_lock_exclusive(&other).is_err());

        lock.unlock().unwrap();
        FileExt::try_lock_exclusive(&other).unwrap();
        FileExt::unlock(&other).unwrap();
    }

    #[test]
    fn test_lock_reopens_deleted_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.lock");
        let mut lock = LockFile::new(path.clone());

        lock.lock().unwrap();
        lock.unlock().unwrap();

        fs::remove_file(&path).unwrap();
        assert!(!path.exists());

        lock.lock().unwrap();
        assert!(path.exists());

        // The recreated file is the one actually locked
        let other = File::open(&path).unwrap();
        assert!(FileExt::try_lock_exclusive(&other).is_err());
        lock.close().unwrap();
    }
}
