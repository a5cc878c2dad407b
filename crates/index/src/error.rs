//! Error types for the index crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Error type for index construction, querying, and persistence
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A value could not be read as a semantic version
    #[error("Invalid version '{value}': {message}")]
    #[diagnostic(
        code(artreg::index::invalid_version),
        help("Versions must follow semantic versioning, e.g. 1.2.3 or 2.0.0-beta.1")
    )]
    InvalidVersion {
        /// The rejected text
        value: String,
        /// Parser message
        message: String,
    },

    /// A version range expression could not be parsed
    #[error("Invalid version range '{value}': {message}")]
    #[diagnostic(
        code(artreg::index::invalid_range),
        help("Use ranges such as ^1.2.0, ~1.2, >=1.0.0 <2.0.0, 1.0.0 - 2.0.0 or 1.x || 2.x")
    )]
    InvalidRange {
        /// The rejected range expression
        value: String,
        /// Parser message
        message: String,
    },

    /// A regular expression passed to a pattern search is invalid
    #[error("Invalid search pattern '{pattern}': {message}")]
    #[diagnostic(code(artreg::index::invalid_pattern))]
    InvalidPattern {
        /// The rejected pattern
        pattern: String,
        /// Regex compiler message
        message: String,
    },

    /// A query referenced a key the schema does not declare
    #[error("Index schema '{schema}' has no key named '{key}'")]
    #[diagnostic(code(artreg::index::unknown_key))]
    UnknownKey {
        /// Schema name
        schema: String,
        /// Requested key
        key: String,
    },

    /// A predicate was applied to a key kind that does not support it
    #[error("Key '{key}' ({kind}) does not support '{operation}'")]
    #[diagnostic(code(artreg::index::unsupported_operation))]
    UnsupportedOperation {
        /// Key name
        key: String,
        /// Key kind
        kind: &'static str,
        /// Requested predicate
        operation: &'static str,
    },

    /// A persisted index lacks one of the schema's keys
    #[error("Failed to deserialize index key '{key}': not present in document")]
    #[diagnostic(
        code(artreg::index::missing_key),
        help("The index file was written by an incompatible schema; regenerate it")
    )]
    MissingKey {
        /// The missing key
        key: String,
    },

    /// A persisted index references an item that does not exist
    #[error("Key '{key}' references item {ordinal}, but the index holds {len} items")]
    #[diagnostic(
        code(artreg::index::ordinal_out_of_range),
        help("The index file is corrupt; regenerate it")
    )]
    OrdinalOutOfRange {
        /// Key holding the bad reference
        key: String,
        /// The offending ordinal
        ordinal: usize,
        /// Number of items in the index
        len: usize,
    },

    /// JSON encoding or decoding of an index document failed
    #[error("Index serialization error: {message}")]
    #[diagnostic(code(artreg::index::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },
}

impl Error {
    /// Create an invalid version error
    #[must_use]
    pub fn invalid_version(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidVersion {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an invalid range error
    #[must_use]
    pub fn invalid_range(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRange {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    #[must_use]
    pub fn unsupported(
        key: impl Into<String>,
        kind: &'static str,
        operation: &'static str,
    ) -> Self {
        Self::UnsupportedOperation {
            key: key.into(),
            kind,
            operation,
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }
}

/// Result type for index operations
pub type Result<T> = std::result::Result<T, Error>;
