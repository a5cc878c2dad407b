//! Error types for the registry crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for registry operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A persisted index file exists but cannot be read back
    #[error("Registry index {} is malformed: {message}", path.display())]
    #[diagnostic(
        code(artreg::registry::malformed_index),
        help("The index is rebuilt from the registry content on the next load")
    )]
    MalformedIndex {
        /// Index file path
        path: Box<Path>,
        /// Parser message
        message: String,
    },

    /// A metadata file under a registry's content tree failed to parse
    #[error("Artifact metadata {} is malformed: {message}", path.display())]
    #[diagnostic(
        code(artreg::registry::malformed_metadata),
        help("Fix the metadata file; it is skipped until then")
    )]
    MalformedMetadata {
        /// Metadata file path
        path: Box<Path>,
        /// Validation or parser message
        message: String,
    },

    /// A remote registry could not be downloaded
    #[error("Unable to download registry {location}: {message}")]
    #[diagnostic(
        code(artreg::registry::remote_unavailable),
        help("Check your network connection and try again")
    )]
    RemoteFileUnavailable {
        /// Remote location
        location: String,
        /// Transport message
        message: String,
    },

    /// A remote registry was downloaded but its content cannot be used
    #[error("Registry {location} could be malformed: {message}")]
    #[diagnostic(
        code(artreg::registry::malformed_remote),
        help("Contact the registry maintainer; retrying will not help")
    )]
    MalformedRemoteContent {
        /// Remote location
        location: String,
        /// Decoder message
        message: String,
    },

    /// A resolver lookup missed in every layer
    #[error("No registry found for '{name}'")]
    #[diagnostic(
        code(artreg::registry::not_found),
        help("Add the registry to your project or global configuration")
    )]
    RegistryNotFound {
        /// Name or location that was looked up
        name: String,
    },

    /// A registry name is already bound to another location in the same layer
    #[error("Registry name '{name}' is already bound to {existing}, cannot bind it to {requested}")]
    #[diagnostic(
        code(artreg::registry::name_collision),
        help("Choose a different name for one of the registries")
    )]
    NameCollision {
        /// Conflicting name
        name: String,
        /// Location currently bound
        existing: String,
        /// Location that was requested
        requested: String,
    },

    /// A location string cannot be interpreted as a registry location
    #[error("Unsupported registry location '{location}': {message}")]
    #[diagnostic(
        code(artreg::registry::unsupported_location),
        help("Use a local path, a file:// URL, or an http(s):// URL")
    )]
    UnsupportedLocation {
        /// The rejected location
        location: String,
        /// Why it was rejected
        message: String,
    },

    /// An operation was cancelled through the session token
    #[error("{operation} was cancelled")]
    #[diagnostic(code(artreg::registry::cancelled))]
    Cancelled {
        /// The cancelled operation
        operation: String,
    },

    /// I/O error during registry operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(artreg::registry::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "walk")
        operation: String,
    },

    /// Configuration or validation error
    #[error("Registry configuration error: {message}")]
    #[diagnostic(code(artreg::registry::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(artreg::registry::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },

    /// Error raised by the index engine
    #[error(transparent)]
    #[diagnostic(transparent)]
    Index(#[from] artreg_index::Error),
}

impl Error {
    /// Create a malformed index error
    #[must_use]
    pub fn malformed_index(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::MalformedIndex {
            path: path.as_ref().into(),
            message: message.into(),
        }
    }

    /// Create a malformed metadata error
    #[must_use]
    pub fn malformed_metadata(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::MalformedMetadata {
            path: path.as_ref().into(),
            message: message.into(),
        }
    }

    /// Create a remote-unavailable error
    #[must_use]
    pub fn remote_unavailable(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteFileUnavailable {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a malformed remote content error
    #[must_use]
    pub fn malformed_remote(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRemoteContent {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::RegistryNotFound { name: name.into() }
    }

    /// Create an unsupported location error
    #[must_use]
    pub fn unsupported_location(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedLocation {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error
    #[must_use]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Whether retrying the failed operation may succeed.
    ///
    /// Only network unavailability is transient; malformed content is an
    /// authoring defect and stays broken until the source is fixed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteFileUnavailable { .. })
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_errors_are_distinguishable() {
        let unreachable = Error::remote_unavailable("https://example.com/r.zip", "timed out");
        let malformed = Error::malformed_remote("https://example.com/r.zip", "invalid zip");

        assert!(unreachable.is_transient());
        assert!(!malformed.is_transient());
        assert!(unreachable.to_string().starts_with("Unable to download"));
        assert!(malformed.to_string().contains("could be malformed"));
    }

    #[test]
    fn test_io_error_display() {
        let err = Error::io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            "/tmp/reg/index.json",
            "read",
        );
        assert_eq!(err.to_string(), "I/O read failed: /tmp/reg/index.json");
    }

    #[test]
    fn test_index_errors_convert() {
        let err: Error = artreg_index::Error::invalid_range("^^", "bad").into();
        assert!(matches!(err, Error::Index(_)));
        assert!(!err.is_transient());
    }
}
