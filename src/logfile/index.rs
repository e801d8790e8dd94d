//! Segment file naming and directory scanning
//!
//! A segment file name is `<prefix><digits>` where the digits carry no
//! leading zero unless the index is a single digit. With that rule, ordering
//! index strings by length and then lexically is the same as ordering them
//! numerically, so listings can be sorted without parsing first.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::PathBuf;

use super::{LogPaths, SegmentKind};

/// Return the index digits of `file_name` if it is a valid segment name for `prefix`
pub fn index_suffix<'a>(file_name: &'a str, prefix: &str) -> Option<&'a str> {
    let suffix = file_name.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if suffix.len() > 1 && suffix.starts_with('0') {
        return None;
    }
    Some(suffix)
}

/// Check whether `file_name` is a valid segment name for `prefix`
pub fn is_valid_name(file_name: &str, prefix: &str) -> bool {
    index_suffix(file_name, prefix).is_some()
}

/// Compare two canonical index strings numerically.
///
/// Fewer digits means a smaller value; equal-length strings compare lexically.
pub fn compare_index(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// A segment file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub index: u64,
    pub path: PathBuf,
}

/// Lowest and highest index present in one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub min: u64,
    pub max: u64,
}

impl IndexRange {
    /// Range over an ascending listing; `None` when nothing matched
    pub fn of(files: &[SegmentFile]) -> Option<Self> {
        match (files.first(), files.last()) {
            (Some(first), Some(last)) => Some(Self {
                min: first.index,
                max: last.index,
            }),
            _ => None,
        }
    }
}

/// Both namespaces of a log directory, each oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryScan {
    pub logs: Vec<SegmentFile>,
    pub archives: Vec<SegmentFile>,
}

impl DirectoryScan {
    pub fn log_range(&self) -> Option<IndexRange> {
        IndexRange::of(&self.logs)
    }

    pub fn archive_range(&self) -> Option<IndexRange> {
        IndexRange::of(&self.archives)
    }
}

/// List the directory once and collect every valid segment file.
///
/// Invalid names are ignored. A missing directory lists as empty.
pub fn scan(paths: &LogPaths) -> io::Result<DirectoryScan> {
    let log_prefix = paths.prefix(SegmentKind::Log);
    let archive_prefix = paths.prefix(SegmentKind::Archive);
    let mut logs = Vec::new();
    let mut archives = Vec::new();

    let entries = match fs::read_dir(paths.dir()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DirectoryScan::default()),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };

        let (digits, bucket) = if let Some(digits) = index_suffix(file_name, &log_prefix) {
            (digits, &mut logs)
        } else if let Some(digits) = index_suffix(file_name, &archive_prefix) {
            (digits, &mut archives)
        } else {
            continue;
        };

        if !entry.file_type()?.is_file() {
            continue;
        }
        bucket.push((digits.to_string(), entry.path()));
    }

    Ok(DirectoryScan {
        logs: into_segments(logs),
        archives: into_segments(archives),
    })
}

/// List the segment files of one namespace, oldest first
pub fn list_segments(paths: &LogPaths, kind: SegmentKind) -> io::Result<Vec<SegmentFile>> {
    let scanned = scan(paths)?;
    Ok(match kind {
        SegmentKind::Log => scanned.logs,
        SegmentKind::Archive => scanned.archives,
    })
}

fn into_segments(mut found: Vec<(String, PathBuf)>) -> Vec<SegmentFile> {
    found.sort_by(|(a, _), (b, _)| compare_index(a, b));

    let mut segments = Vec::with_capacity(found.len());
    for (digits, path) in found {
        match digits.parse::<u64>() {
            Ok(index) => segments.push(SegmentFile { index, path }),
            Err(_) => tracing::debug!(path = %path.display(), "ignoring segment with oversized index"),
        }
    }
    segments
}
