//! Content-based format detection
//!
//! Only file bytes are consulted, never the extension. Anything unreadable,
//! including a path that does not exist, classifies as unknown.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, trace};

use super::constants::{MEMBER_MANIFEST, NCDB_FORMAT, SQLITE_MAGIC, ZIP_EMPTY_MAGIC, ZIP_LOCAL_MAGIC};
use super::container::NcdbArchive;
use super::manifest::manifest_format;
use crate::core::{FormatDetector, FormatKind};

/// Bytes inspected at the start of a file
const PREFIX_LEN: usize = 16;

fn read_prefix(path: &Path) -> Option<Vec<u8>> {
    let mut file = File::open(path).ok()?;
    let mut prefix = Vec::with_capacity(PREFIX_LEN);
    file.by_ref()
        .take(PREFIX_LEN as u64)
        .read_to_end(&mut prefix)
        .ok()?;
    Some(prefix)
}

fn is_zip(prefix: &[u8]) -> bool {
    prefix.starts_with(ZIP_LOCAL_MAGIC) || prefix.starts_with(ZIP_EMPTY_MAGIC)
}

/// Classify the file at `path` as an SQLite store, an NCDB container or unknown
pub fn detect_format(path: &Path) -> FormatKind {
    let Some(prefix) = read_prefix(path) else {
        trace!(path = %path.display(), "Unreadable file, format unknown");
        return FormatKind::Unknown;
    };
    if prefix.starts_with(SQLITE_MAGIC) {
        debug!(path = %path.display(), "Detected SQLite store via magic header");
        return FormatKind::Sqlite;
    }
    if is_zip(&prefix) {
        // Only the format tag decides; versions are checked when reading
        let format = NcdbArchive::open(path)
            .and_then(|mut archive| archive.member(MEMBER_MANIFEST))
            .ok()
            .flatten()
            .and_then(|bytes| manifest_format(&bytes));
        return match format.as_deref() {
            Some(NCDB_FORMAT) => {
                debug!(path = %path.display(), "Detected NCDB container");
                FormatKind::Ncdb
            }
            _ => {
                trace!(path = %path.display(), "ZIP archive without an NCDB manifest");
                FormatKind::Unknown
            }
        };
    }
    FormatKind::Unknown
}

/// Recognises NCDB containers by their manifest
#[derive(Debug, Clone, Copy, Default)]
pub struct NcdbDetector;

impl NcdbDetector {
    pub fn new() -> Self {
        Self
    }
}

impl FormatDetector for NcdbDetector {
    fn detect(&self, path: &Path) -> bool {
        detect_format(path) == FormatKind::Ncdb
    }

    fn kind(&self) -> FormatKind {
        FormatKind::Ncdb
    }
}

/// Recognises SQLite stores by their 16-byte header
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDetector;

impl SqliteDetector {
    pub fn new() -> Self {
        Self
    }
}

impl FormatDetector for SqliteDetector {
    fn detect(&self, path: &Path) -> bool {
        read_prefix(path).is_some_and(|prefix| prefix.starts_with(SQLITE_MAGIC))
    }

    fn kind(&self) -> FormatKind {
        FormatKind::Sqlite
    }
}
