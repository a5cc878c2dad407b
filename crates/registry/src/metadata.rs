//! Artifact metadata documents.
//!
//! Each artifact version in a registry is described by one YAML (or JSON)
//! document. Only the fields the registry indexes are typed; everything else is
//! carried through untouched so normalization never drops authored content.

use crate::{Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A parsed artifact metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataFile {
    /// Canonical artifact id, e.g. `compilers/microsoft/msvc`
    pub id: String,
    /// Semantic version of this artifact
    pub version: String,
    /// One-line description, searchable by keyword
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Longer description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Installed only as a dependency of another artifact
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dependency_only: bool,
    /// Ordering hint when several artifacts satisfy a request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// Every other authored field
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl MetadataFile {
    /// Parse and validate the document at `path`.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let file: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::malformed_metadata(path, e.to_string()))?;
        file.validate(path)?;
        Ok(file)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(Error::malformed_metadata(path, "'id' must not be empty"));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(Error::malformed_metadata(
                path,
                format!("'id' must not contain whitespace: '{id}'"),
            ));
        }
        if id.starts_with('/') || id.ends_with('/') || id.contains("//") {
            return Err(Error::malformed_metadata(
                path,
                format!("'id' has an empty path segment: '{id}'"),
            ));
        }
        artreg_index::parse_version(&self.version)
            .map_err(|e| Error::malformed_metadata(path, e.to_string()))?;
        Ok(())
    }

    /// The artifact's version. Valid for every parsed document.
    pub fn semver(&self) -> Result<Version> {
        Ok(artreg_index::parse_version(&self.version)?)
    }

    /// Rewrite fields into canonical form. Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        let before = self.clone();

        self.id = self.id.trim().to_string();
        if let Ok(version) = artreg_index::parse_version(&self.version) {
            self.version = version.to_string();
        }
        self.summary = trimmed(self.summary.take());
        self.description = trimmed(self.description.take());

        *self != before
    }

    /// Render the document as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::serialization(e.to_string()))
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
