//! Resolved artifacts returned by searches.

use crate::metadata::MetadataFile;
use semver::Version;
use std::path::PathBuf;

/// One artifact version found in a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Canonical id
    pub id: String,
    /// Parsed version
    pub version: Version,
    /// Registry-qualified name, `<registry>:<id>`
    pub display_name: String,
    /// Canonical location of the registry it came from
    pub registry: String,
    /// Path of the metadata document
    pub metadata_path: PathBuf,
    /// Folder this version installs into
    pub install_folder: PathBuf,
    /// The metadata document
    pub metadata: MetadataFile,
}

impl Artifact {
    /// Short summary, if the metadata has one
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.metadata.summary.as_deref()
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.display_name, self.version)
    }
}
