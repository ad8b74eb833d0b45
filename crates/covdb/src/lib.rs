//! covdb - Coverage databases with structural merge
//!
//! A library for building, reading, writing and merging functional and code
//! coverage databases. Databases are held in memory as a forest of scopes
//! carrying counted cover items, and persist as NCDB containers (a compact
//! ZIP of binary members) or as covdb-json documents.
//!
//! # Quick Start
//!
//! ```rust
//! use covdb::prelude::*;
//!
//! let dir = tempfile::tempdir()?;
//! let mut db = Database::new();
//! let top = db.create_instance(None, "top", None, 1, SourceLanguage::SystemVerilog, None, ScopeFlags::empty())?;
//! let cg = db.create_covergroup(Some(top), "cg", None, 1, SourceLanguage::SystemVerilog)?;
//! let cp = db.create_coverpoint(cg, "mode", None, 1, SourceLanguage::SystemVerilog)?;
//! db.create_next_cover(cp, "read", CoverData::new(CoverType::CvgBin, 3), None)?;
//!
//! let a = dir.path().join("a.cdb");
//! let b = dir.path().join("b.cdb");
//! let mut ctx = ConversionContext::lenient();
//! NcdbFormat::new().write(&db, &a, &mut ctx)?;
//! NcdbFormat::new().write(&db, &b, &mut ctx)?;
//!
//! let merged = dir.path().join("merged.cdb");
//! covdb::merge(&[&a, &b], &merged)?;
//! assert_eq!(covdb::open(&merged)?.total_hits(), 6);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Advanced Usage
//!
//! The merge engine works on any pair of in-memory databases, whatever
//! format they were loaded from:
//!
//! ```rust
//! use covdb::prelude::*;
//!
//! let mut run = Database::new();
//! let top = run.create_instance(None, "top", None, 1, SourceLanguage::Verilog, None, ScopeFlags::empty())?;
//! run.create_next_cover(top, "stmt_1", CoverData::new(CoverType::StmtBin, 2), None)?;
//!
//! let mut merged = Database::new();
//! let mut ctx = ConversionContext::strict();
//! let report = Merger::new(MergeOptions::default())
//!     .merge(&mut merged, &[MergeSource::new("run1", &run), MergeSource::new("run2", &run)], &mut ctx)?;
//!
//! assert_eq!(report.scopes_created, 1);
//! assert_eq!(merged.total_hits(), 4);
//! # Ok::<(), covdb::CovError>(())
//! ```

use std::path::Path;

pub mod core;
pub mod merge;
pub mod plugins;

pub use core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        ConversionContext, CovError, CoverData, CoverFlags, CoverId, CoverType, Database,
        FormatAdapter, FormatDetector, FormatKind, HistoryKind, ProgressObserver, ScopeFlags,
        ScopeId, ScopeKind, ScopeType, SourceInfo, SourceLanguage,
    };
    pub use crate::merge::{MergeOptions, MergeReport, MergeSource, Merger, MetadataPolicy};
    pub use crate::plugins::json::JsonFormat;
    pub use crate::plugins::ncdb::{NcdbFormat, NcdbMerger};
    pub use crate::plugins::registry::{default_registry, FormatRegistry};
}

/// Open a coverage database, detecting its format from content
///
/// # Example
/// ```rust
/// use covdb::prelude::*;
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("empty.json");
/// JsonFormat::new().write(&Database::new(), &path, &mut ConversionContext::lenient())?;
///
/// let db = covdb::open(&path)?;
/// assert_eq!(db.scope_count(), 0);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Database> {
    let path = path.as_ref();
    let adapter = plugins::default_registry().adapter_for(path)?;
    Ok(adapter.read(path, &mut ConversionContext::lenient())?)
}

/// Write `database` to `path` in the named format
pub fn save(database: &Database, path: impl AsRef<Path>, format: &str) -> anyhow::Result<()> {
    let adapter = plugins::default_registry().get(format)?;
    adapter.write(database, path.as_ref(), &mut ConversionContext::lenient())?;
    Ok(())
}

/// Convert a database to `output_format`, returning any conversion warnings
///
/// The input format is detected from content. Content the output format
/// cannot represent is reported as a warning rather than failing.
pub fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    output_format: &str,
) -> anyhow::Result<Vec<String>> {
    let mut ctx = ConversionContext::lenient();
    plugins::convert_file(
        plugins::default_registry(),
        input.as_ref(),
        None,
        output.as_ref(),
        output_format,
        &mut ctx,
    )?;
    Ok(ctx.warnings().to_vec())
}

/// Merge `inputs` into a single NCDB container at `output`
///
/// Inputs may be in any readable format. Use
/// [`plugins::merge_files`] for control over options and the output format.
pub fn merge<P: AsRef<Path>>(inputs: &[P], output: impl AsRef<Path>) -> anyhow::Result<merge::MergeReport> {
    let report = plugins::merge_files(
        plugins::default_registry(),
        inputs,
        output.as_ref(),
        FormatKind::Ncdb.as_str(),
        &merge::MergeOptions::default(),
        &mut ConversionContext::lenient(),
    )?;
    Ok(report)
}
