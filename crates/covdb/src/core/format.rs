//! Format adapter interface
//!
//! Every persisted encoding of a coverage database is reached through a
//! [`FormatAdapter`]. The merge engine and conversion drivers only ever talk to
//! this trait, never to a concrete backend.

use std::fmt;
use std::path::Path;

use super::database::Database;
use super::error::Result;
use super::progress::ConversionContext;

/// What a format can represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatCapabilities {
    pub can_read: bool,
    pub can_write: bool,
    pub functional_coverage: bool,
    pub cross_coverage: bool,
    pub ignore_illegal_bins: bool,
    pub code_coverage: bool,
    pub toggle_coverage: bool,
    pub fsm_coverage: bool,
    pub assertions: bool,
    pub history_nodes: bool,
    pub design_hierarchy: bool,
    pub lossless: bool,
}

impl FormatCapabilities {
    /// Readable, writable and able to hold everything the model holds
    pub const fn full() -> Self {
        Self {
            can_read: true,
            can_write: true,
            functional_coverage: true,
            cross_coverage: true,
            ignore_illegal_bins: true,
            code_coverage: true,
            toggle_coverage: true,
            fsm_coverage: true,
            assertions: true,
            history_nodes: true,
            design_hierarchy: true,
            lossless: true,
        }
    }
}

/// Backend kind recognised from file content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Ncdb,
    Sqlite,
    Json,
    Unknown,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Ncdb => "ncdb",
            FormatKind::Sqlite => "sqlite",
            FormatKind::Json => "json",
            FormatKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-based format detector
///
/// Detectors must never fail: unreadable or missing files are simply not a match.
pub trait FormatDetector: Send + Sync {
    /// True if the file at `path` is in this detector's format
    fn detect(&self, path: &Path) -> bool;

    /// The kind reported on a match
    fn kind(&self) -> FormatKind;
}

/// A pluggable read/write backend
pub trait FormatAdapter: Send + Sync {
    /// Registry key, e.g. `"ncdb"`
    fn name(&self) -> &'static str;

    /// One-line description
    fn description(&self) -> &'static str;

    fn capabilities(&self) -> FormatCapabilities;

    /// Fresh empty database for this backend
    fn create(&self) -> Result<Database> {
        Ok(Database::new())
    }

    /// Load a database from `path`
    fn read(&self, path: &Path, ctx: &mut ConversionContext) -> Result<Database>;

    /// Persist `database` to `path`
    fn write(&self, database: &Database, path: &Path, ctx: &mut ConversionContext) -> Result<()>;

    /// Content detector for this backend, if it has one
    fn detector(&self) -> Option<Box<dyn FormatDetector>> {
        None
    }
}
