//! The index schema for artifact metadata.

use crate::metadata::MetadataFile;
use artreg_index::{Index, KeySpec, Schema};

/// Artifact search facets: `id` (alias aware), `version` (semver), `summary` (keywords).
#[derive(Debug, Clone, Copy)]
pub struct ArtifactSchema;

/// Index over artifact metadata documents
pub type ArtifactIndex = Index<ArtifactSchema>;

impl ArtifactSchema {
    /// Identity key name
    pub const ID: &'static str = "id";
    /// Version key name
    pub const VERSION: &'static str = "version";
    /// Summary key name
    pub const SUMMARY: &'static str = "summary";
}

impl Schema for ArtifactSchema {
    type Record = MetadataFile;
    const NAME: &'static str = "artifacts";

    fn keys() -> Vec<KeySpec> {
        vec![
            KeySpec::identity(Self::ID),
            KeySpec::semver(Self::VERSION),
            KeySpec::string(Self::SUMMARY),
        ]
    }

    fn values(record: &MetadataFile, key: &str, _parent: Option<&str>) -> Vec<String> {
        match key {
            Self::ID => vec![record.id.trim().to_string()],
            Self::VERSION => vec![record.version.trim().to_string()],
            Self::SUMMARY => record.summary.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }
}
