//! Format backends and the drivers built on them
//!
//! Each backend is a self-contained module with a detector, a reader and a
//! writer behind a [`FormatAdapter`](crate::core::FormatAdapter). The
//! registry resolves backends by name or by file content.

pub mod driver;
pub mod json;
pub mod ncdb;
pub mod records;
pub mod registry;

pub use driver::*;
pub use json::JsonFormat;
pub use ncdb::{NcdbFormat, NcdbMerger};
pub use registry::*;
