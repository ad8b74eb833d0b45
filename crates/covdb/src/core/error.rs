//! Core error types for coverage database processing
//!
//! This module defines the error taxonomy shared by the object model, the
//! merge engine and every format backend.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CovError>;

/// Core error types for coverage database processing
#[derive(Error, Debug)]
pub enum CovError {
    /// The addressed object does not understand the requested property
    #[error("Unsupported property: {property} on {object}")]
    UnsupportedProperty { property: String, object: String },

    /// The object was used after its database closed, or before it was ready
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// A caller-supplied value or index is out of range
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A decoder ran out of bytes
    #[error("Truncated data in {context} at offset {offset}")]
    TruncatedData { context: String, offset: usize },

    /// A container member is missing or internally inconsistent
    #[error("Corrupt container member '{member}': {message}")]
    CorruptContainer { member: String, message: String },

    /// Two scopes share a path but disagree on their type
    #[error("Structural conflict at '{path}': destination has {existing}, source has {incoming}")]
    StructuralConflict {
        path: String,
        existing: String,
        incoming: String,
    },

    /// A merge or conversion input could not be opened or parsed
    #[error("Failed to read source '{source_name}': {message}")]
    SourceReadError {
        source_name: String,
        message: String,
    },

    /// A strict-mode conversion warning
    #[error("Conversion error: {message}")]
    ConversionError { message: String },

    /// No adapter is registered for the requested format
    #[error("Unknown format: {format}")]
    UnknownFormat { format: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Archive error: {source}")]
    ZipError {
        #[from]
        source: zip::result::ZipError,
    },
}

impl CovError {
    /// Create a new unsupported-property error
    pub fn unsupported_property(property: impl std::fmt::Debug, object: impl Into<String>) -> Self {
        Self::UnsupportedProperty {
            property: format!("{:?}", property),
            object: object.into(),
        }
    }

    /// Create a new invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a new invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new truncated-data error
    pub fn truncated(context: impl Into<String>, offset: usize) -> Self {
        Self::TruncatedData {
            context: context.into(),
            offset,
        }
    }

    /// Create a new corrupt-container error
    pub fn corrupt(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptContainer {
            member: member.into(),
            message: message.into(),
        }
    }

    /// Create a new structural-conflict error
    pub fn structural_conflict(
        path: impl Into<String>,
        existing: impl Into<String>,
        incoming: impl Into<String>,
    ) -> Self {
        Self::StructuralConflict {
            path: path.into(),
            existing: existing.into(),
            incoming: incoming.into(),
        }
    }

    /// Create a new source-read error
    pub fn source_read(source_name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::SourceReadError {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Create a new conversion error
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::ConversionError {
            message: message.into(),
        }
    }

    /// Create a new unknown-format error
    pub fn unknown_format(format: impl Into<String>) -> Self {
        Self::UnknownFormat {
            format: format.into(),
        }
    }
}
