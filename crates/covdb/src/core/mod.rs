//! Core abstractions for coverage databases
//!
//! This module defines the object model (scopes, cover items, history nodes,
//! source files), the typed property interface, the format adapter traits and
//! the progress/conversion context shared by every backend.

mod cover;
mod database;
mod error;
mod format;
mod history;
pub mod logging;
mod progress;
mod property;
mod scope;
mod source;
mod types;

pub use cover::*;
pub use database::*;
pub use error::*;
pub use format::*;
pub use history::*;
pub use logging::*;
pub use progress::*;
pub use property::*;
pub use scope::*;
pub use source::*;
pub use types::*;
