//! NCDB binary container plugin
//!
//! A ZIP archive holding the string table and scope tree
//! (`scope_tree.bin`), the hit counts (`counts.bin`), JSON side tables for
//! history, source files and attributes, and a `manifest.json` that binds the
//! container to its tree through a SHA-256 `schema_hash`.

use std::path::Path;

use crate::core::{
    ConversionContext, Database, FormatAdapter, FormatCapabilities, FormatDetector, Result,
};

mod constants;
mod container;
mod counts;
mod detector;
mod manifest;
mod merger;
mod scope_tree;
mod string_table;
pub mod varint;

pub use constants::*;
pub use container::*;
pub use counts::*;
pub use detector::*;
pub use manifest::*;
pub use merger::*;
pub use scope_tree::*;
pub use string_table::*;

/// NCDB format adapter
#[derive(Debug, Clone, Default)]
pub struct NcdbFormat {
    options: NcdbWriteOptions,
}

impl NcdbFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: NcdbWriteOptions) -> Self {
        Self { options }
    }
}

impl FormatAdapter for NcdbFormat {
    fn name(&self) -> &'static str {
        "ncdb"
    }

    fn description(&self) -> &'static str {
        "Compact binary coverage container (ZIP with manifest and schema hash)"
    }

    fn capabilities(&self) -> FormatCapabilities {
        FormatCapabilities::full()
    }

    fn read(&self, path: &Path, ctx: &mut ConversionContext) -> Result<Database> {
        read_container(path, ctx)
    }

    fn write(&self, database: &Database, path: &Path, ctx: &mut ConversionContext) -> Result<()> {
        write_container(database, path, &self.options, ctx).map(|_| ())
    }

    fn detector(&self) -> Option<Box<dyn FormatDetector>> {
        Some(Box::new(NcdbDetector::new()))
    }
}
