//! covdb-json plugin
//!
//! A nested JSON rendering of the scope forest: each scope carries its items
//! and children inline, next to the file table and history records.

use std::path::Path;

use crate::core::{
    ConversionContext, Database, FormatAdapter, FormatCapabilities, FormatDetector, Result,
};

mod detector;
mod document;
mod reader;
mod writer;

pub use detector::*;
pub use document::*;
pub use reader::*;
pub use writer::*;

/// covdb-json format adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl JsonFormat {
    pub fn new() -> Self {
        Self
    }
}

impl FormatAdapter for JsonFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn description(&self) -> &'static str {
        "Tree-structured JSON document of the scope hierarchy"
    }

    fn capabilities(&self) -> FormatCapabilities {
        FormatCapabilities::full()
    }

    fn read(&self, path: &Path, ctx: &mut ConversionContext) -> Result<Database> {
        read_json(path, ctx)
    }

    fn write(&self, database: &Database, path: &Path, ctx: &mut ConversionContext) -> Result<()> {
        write_json(database, path, ctx)
    }

    fn detector(&self) -> Option<Box<dyn FormatDetector>> {
        Some(Box::new(JsonDetector::new()))
    }
}
