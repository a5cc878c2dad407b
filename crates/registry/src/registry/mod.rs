//! Registries and the search surface they share.
//!
//! A registry owns one [`ArtifactIndex`](crate::ArtifactIndex) over a tree of
//! metadata documents. [`LocalRegistry`] indexes a folder on disk;
//! [`RemoteRegistry`] fetches an archive into a cache folder first. Both share
//! the lifecycle implemented by [`ArtifactRegistry`].

mod base;
mod local;
mod remote;

pub use base::ArtifactRegistry;
pub use local::LocalRegistry;
pub use remote::RemoteRegistry;

use crate::Result;
use crate::artifact::Artifact;
use crate::location::RegistryLocation;
use async_trait::async_trait;

/// Fields a search may constrain. Unset fields do not narrow the result;
/// set fields are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Canonical id or short-name alias
    pub id_or_short_name: Option<String>,
    /// Exact version (`1.2.3`) or version range (`^1.2`)
    pub version: Option<String>,
    /// Word that must appear in the summary
    pub keyword: Option<String>,
}

impl SearchCriteria {
    /// Criteria matching everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain the id or short name.
    #[must_use]
    pub fn id(mut self, id_or_short_name: impl Into<String>) -> Self {
        self.id_or_short_name = Some(id_or_short_name.into());
        self
    }

    /// Constrain the version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Constrain the summary keyword.
    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }
}

/// Search results: artifacts grouped under their display name, in the order
/// the groups were first found.
pub type SearchResults = Vec<(String, Vec<Artifact>)>;

/// Supplies the human readable name of a registry location.
pub trait RegistryDisplayContext: Send + Sync {
    /// Name to show for the registry at `location` (canonical form).
    fn registry_display_name(&self, location: &str) -> String;
}

/// Display context that knows no names: every registry shows as `[location]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationDisplay;

impl RegistryDisplayContext for LocationDisplay {
    fn registry_display_name(&self, location: &str) -> String {
        format!("[{location}]")
    }
}

/// Something artifacts can be searched in.
#[async_trait]
pub trait ArtifactSearchable: Send + Sync {
    /// Find artifacts matching `criteria`.
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResults>;
}

/// A registry's lifecycle and status.
#[async_trait]
pub trait Registry: ArtifactSearchable + std::fmt::Debug {
    /// Where the registry's content comes from
    fn location(&self) -> &RegistryLocation;

    /// Number of indexed artifact versions
    fn count(&self) -> usize;

    /// Whether an index has been loaded or built
    fn loaded(&self) -> bool;

    /// Populate the index from the index file, or rebuild it when the file is
    /// absent, unreadable, or `force` is set.
    async fn load(&self, force: bool) -> Result<()>;

    /// Persist the index to the index file.
    async fn save(&self) -> Result<()>;

    /// Refresh the source content and reload. On failure the previously loaded
    /// index stays in place.
    async fn update(&self, display_name: Option<&str>) -> Result<()>;

    /// Rebuild the index from the content tree, optionally rewriting each
    /// metadata document in canonical form.
    async fn regenerate(&self, normalize: bool) -> Result<()>;

    /// Search with registry names supplied by `context`.
    async fn search_in(
        &self,
        context: &dyn RegistryDisplayContext,
        criteria: &SearchCriteria,
    ) -> Result<SearchResults>;
}

/// The highest version of `id_or_short_name` satisfying `version` (any
/// version when `None`), with its display name.
pub async fn get_artifact(
    searchable: &dyn ArtifactSearchable,
    id_or_short_name: &str,
    version: Option<&str>,
) -> Result<Option<(String, Artifact)>> {
    let mut criteria = SearchCriteria::new().id(id_or_short_name);
    criteria.version = version.map(str::to_string);

    let results = searchable.search(&criteria).await?;
    Ok(results
        .into_iter()
        .flat_map(|(name, artifacts)| artifacts.into_iter().map(move |a| (name.clone(), a)))
        .max_by(|(_, a), (_, b)| a.version.cmp(&b.version)))
}
