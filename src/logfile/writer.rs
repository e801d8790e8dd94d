//! Rotating Log Writer
//!
//! Appends to numbered segment files under two-level locking. The directory
//! listing is re-read on every call, so any number of writer instances and
//! processes can share one log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::archive::{ArchivedFile, SegmentListing};
use super::index::{scan, SegmentFile};
use super::lock::{refers_to, LockFile, LockRegistry, ProcessLock};
use super::{LogPaths, SegmentKind};
use crate::config::LogConfig;
use crate::error::{Error, ErrorCollector, Result};

/// The segment a writer currently appends to
struct OpenSegment {
    index: u64,
    path: PathBuf,
    file: File,
}

impl OpenSegment {
    fn open(path: PathBuf, index: u64) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { index, path, file })
    }

    /// Whether this handle is still the file at its path
    fn is_current(&self) -> bool {
        refers_to(&self.file, &self.path)
    }

    fn append(&mut self, content: &[u8], fsync: bool) -> io::Result<()> {
        self.file.write_all(content)?;
        self.file.flush()?;
        if fsync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        self.file.sync_all()
    }
}

/// Mutable state behind the instance mutex
struct WriterState {
    output: Option<OpenSegment>,
    lock_file: LockFile,
}

impl WriterState {
    /// Drop the cached segment handle; a close failure is only logged
    fn discard_output(&mut self) {
        if let Some(segment) = self.output.take() {
            let path = segment.path.clone();
            if let Err(e) = segment.close() {
                tracing::warn!(path = %path.display(), error = %e, "failed to close log segment");
            }
        }
    }
}

/// Rotating, archivable log file.
///
/// Every instance for the same directory and name shares one process-local
/// lock, and every process shares the advisory lock on `<name>.lock`.
/// Construction touches nothing on disk; files are created on first write.
pub struct RotatingLogWriter {
    paths: LogPaths,
    /// 0 = unbounded
    max_size: u64,
    max_count: u64,
    fsync: bool,
    process_lock: ProcessLock,
    state: Mutex<WriterState>,
}

impl RotatingLogWriter {
    /// Create a writer using the process-wide lock registry
    pub fn new(config: LogConfig) -> Result<Self> {
        Self::with_registry(config, LockRegistry::global())
    }

    /// Create a writer from its four basic parameters
    pub fn open(
        directory: impl Into<PathBuf>,
        name: impl Into<String>,
        max_size: u64,
        max_count: usize,
    ) -> Result<Self> {
        Self::new(
            LogConfig::new(directory, name)
                .with_max_size(max_size)
                .with_max_count(max_count),
        )
    }

    /// Create a writer whose process-local locks come from `registry`
    pub fn with_registry(config: LogConfig, registry: Arc<LockRegistry>) -> Result<Self> {
        config.validate()?;

        let directory = std::path::absolute(&config.directory)?;
        let paths = LogPaths::new(directory, config.name);
        let lock_path = paths.lock_path();
        let process_lock = registry.lock_for(&lock_path);

        Ok(Self {
            max_size: config.max_size,
            max_count: config.max_count as u64,
            fsync: config.fsync,
            process_lock,
            state: Mutex::new(WriterState {
                output: None,
                lock_file: LockFile::new(lock_path),
            }),
            paths,
        })
    }

    pub fn paths(&self) -> &LogPaths {
        &self.paths
    }

    pub fn directory(&self) -> &Path {
        self.paths.dir()
    }

    pub fn name(&self) -> &str {
        &self.paths.name
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn max_count(&self) -> usize {
        self.max_count as usize
    }

    /// Append `content` to the head segment, rotating as needed.
    ///
    /// A single call is never split across segments.
    pub fn write(&self, content: &[u8]) -> Result<()> {
        self.locked(|state| self.append_locked(state, content))
    }

    /// Move every active segment into the archived namespace.
    ///
    /// Returns all archived segments, oldest first, including ones archived
    /// earlier and not yet removed. Not atomic: if a rename fails, the
    /// segments before it stay archived and the call can be retried.
    pub fn archive(&self) -> Result<Vec<ArchivedFile>> {
        self.locked(|state| {
            state.discard_output();

            let scanned = scan(&self.paths)?;
            for segment in &scanned.logs {
                let target = self.paths.segment_path(SegmentKind::Archive, segment.index);
                move_segment(&segment.path, &target)?;
            }
            if !scanned.logs.is_empty() {
                tracing::debug!(
                    name = %self.paths.name,
                    segments = scanned.logs.len(),
                    "archived log segments"
                );
            }

            describe(scan(&self.paths)?.archives)
        })
    }

    /// Snapshot both namespaces without changing anything
    pub fn status(&self) -> Result<SegmentListing> {
        self.locked(|_| {
            let scanned = scan(&self.paths)?;
            Ok(SegmentListing {
                active: describe(scanned.logs)?,
                archived: describe(scanned.archives)?,
            })
        })
    }

    /// Release the cached segment and lock file handles.
    ///
    /// The writer stays usable; the next call reopens what it needs.
    pub fn close(&self) -> Result<()> {
        let _process = self.process_lock.lock();
        let mut state = self.state.lock();

        let mut errors = ErrorCollector::new();
        if let Some(segment) = state.output.take() {
            errors.record(segment.close().map_err(Error::Cleanup));
        }
        errors.record(state.lock_file.close().map_err(Error::Cleanup));
        errors.finish()
    }

    /// Run `op` holding the process-local lock and then the file lock.
    ///
    /// A failure to release the file lock is the result when `op` succeeded,
    /// and is attached as suppressed when `op` failed.
    fn locked<T>(&self, op: impl FnOnce(&mut WriterState) -> Result<T>) -> Result<T> {
        let _process = self.process_lock.lock();
        let mut state = self.state.lock();

        state.lock_file.lock()?;
        let result = op(&mut *state);
        let released = state.lock_file.unlock();

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(Error::Io(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release)) => Err(e.with_suppressed(Error::Cleanup(release))),
        }
    }

    fn append_locked(&self, state: &mut WriterState, content: &[u8]) -> Result<()> {
        let mut head = self.head_index()?;
        if self.segment_full(head)? {
            head = next_index(head)?;
        }

        if head > self.max_count {
            tracing::debug!(
                name = %self.paths.name,
                head,
                max_count = self.max_count,
                "segment limit reached, evicting oldest"
            );
            state.discard_output();
            self.rotate()?;
            head = self.max_count;
        }

        let segment = match state.output.take() {
            Some(segment) if segment.index == head && segment.is_current() => segment,
            previous => {
                if let Some(previous) = previous {
                    let path = previous.path.clone();
                    if let Err(e) = previous.close() {
                        tracing::warn!(path = %path.display(), error = %e, "failed to close log segment");
                    }
                }
                let path = self.paths.segment_path(SegmentKind::Log, head);
                tracing::debug!(index = head, path = %path.display(), "opening log segment");
                OpenSegment::open(path, head)?
            }
        };

        let segment = state.output.insert(segment);
        segment.append(content, self.fsync)?;
        Ok(())
    }

    /// First index that is at least 1, at least the newest log segment, and
    /// above every archived segment
    fn head_index(&self) -> Result<u64> {
        let scanned = scan(&self.paths)?;
        let newest_log = scanned.log_range().map_or(0, |r| r.max);
        let watermark = match scanned.archive_range() {
            Some(r) => next_index(r.max)?,
            None => 0,
        };
        Ok(1u64.max(newest_log).max(watermark))
    }

    fn segment_full(&self, index: u64) -> Result<bool> {
        if self.max_size == 0 {
            return Ok(false);
        }
        let path = self.paths.segment_path(SegmentKind::Log, index);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len() >= self.max_size),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Shift both namespaces down one slot, discarding index 1
    fn rotate(&self) -> Result<()> {
        for kind in [SegmentKind::Log, SegmentKind::Archive] {
            remove_if_exists(&self.paths.segment_path(kind, 1))?;

            for index in 2..=self.max_count {
                let current = self.paths.segment_path(kind, index);
                if !current.exists() {
                    continue;
                }
                let previous = self.paths.segment_path(kind, index - 1);
                move_segment(&current, &previous)?;
            }
        }
        Ok(())
    }
}

impl Drop for RotatingLogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(name = %self.paths.name, error = %e, "failed to close log writer");
        }
    }
}

impl std::fmt::Debug for RotatingLogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingLogWriter")
            .field("paths", &self.paths)
            .field("max_size", &self.max_size)
            .field("max_count", &self.max_count)
            .field("fsync", &self.fsync)
            .finish_non_exhaustive()
    }
}

/// Rename `from` over `to`, replacing whatever `to` held
fn move_segment(from: &Path, to: &Path) -> io::Result<()> {
    // rename() only replaces an existing target atomically on unix
    #[cfg(not(unix))]
    remove_if_exists(to)?;
    fs::rename(from, to)
}

fn next_index(index: u64) -> Result<u64> {
    index
        .checked_add(1)
        .ok_or_else(|| Error::Internal("segment index space exhausted".to_string()))
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Describe listed files, skipping any removed since the listing
fn describe(files: Vec<SegmentFile>) -> Result<Vec<ArchivedFile>> {
    let mut described = Vec::with_capacity(files.len());
    for file in files {
        match ArchivedFile::from_segment(file) {
            Ok(archived) => described.push(archived),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(described)
}
