//! Archived segment descriptors

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;

use super::index::SegmentFile;

/// An archived segment handed back by `archive()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedFile {
    /// Logical position; lower is older
    pub index: u64,
    pub path: PathBuf,
    /// Size in bytes when listed
    pub size: u64,
}

impl ArchivedFile {
    pub(crate) fn from_segment(segment: SegmentFile) -> io::Result<Self> {
        let size = fs::metadata(&segment.path)?.len();
        Ok(Self {
            index: segment.index,
            path: segment.path,
            size,
        })
    }

    /// Read the whole archived segment
    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// Delete the archived segment once it has been consumed
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Snapshot of a log directory, both namespaces oldest first
#[derive(Debug, Clone, Default, Serialize)]
pub struct SegmentListing {
    pub active: Vec<ArchivedFile>,
    pub archived: Vec<ArchivedFile>,
}

impl SegmentListing {
    pub fn active_bytes(&self) -> u64 {
        self.active.iter().map(|f| f.size).sum()
    }

    pub fn archived_bytes(&self) -> u64 {
        self.archived.iter().map(|f| f.size).sum()
    }
}
