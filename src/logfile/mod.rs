//! Rotating Log File Module
//!
//! Append-only log files that rotate across numbered segments, evict the
//! oldest segments past a retention count, and hand finished segments off
//! to an archived namespace. Safe across threads and processes sharing a
//! directory.
//!
//! Directory layout for a log named `app`:
//!
//! - `app.lock`: zero-byte coordination file
//! - `app.log<N>`: active segment N
//! - `app.bak<N>`: archived segment N

mod archive;
pub mod index;
mod lock;
mod writer;

pub use archive::{ArchivedFile, SegmentListing};
pub use index::{compare_index, DirectoryScan, IndexRange, SegmentFile};
pub use lock::{LockFile, LockRegistry, ProcessLock};
pub use writer::RotatingLogWriter;

use std::fmt;
use std::path::{Path, PathBuf};

/// The two namespaces segment files live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Active segments, `<name>.log<N>`
    Log,
    /// Archived segments, `<name>.bak<N>`
    Archive,
}

impl SegmentKind {
    pub fn extension(&self) -> &'static str {
        match self {
            SegmentKind::Log => "log",
            SegmentKind::Archive => "bak",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Log directory structure
#[derive(Debug, Clone)]
pub struct LogPaths {
    pub base_dir: PathBuf,
    pub name: String,
}

impl LogPaths {
    pub fn new(base_dir: PathBuf, name: String) -> Self {
        Self { base_dir, name }
    }

    /// File name prefix shared by every segment of `kind`, e.g. `app.log`
    pub fn prefix(&self, kind: SegmentKind) -> String {
        format!("{}.{}", self.name, kind.extension())
    }

    /// Get path for a specific segment file
    pub fn segment_path(&self, kind: SegmentKind, index: u64) -> PathBuf {
        self.base_dir.join(format!("{}{}", self.prefix(kind), index))
    }

    /// Get path for the lock file
    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(format!("{}.lock", self.name))
    }

    pub fn dir(&self) -> &Path {
        &self.base_dir
    }
}
