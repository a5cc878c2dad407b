//! Registries whose content is a folder on disk.

use super::{
    ArtifactRegistry, ArtifactSearchable, LocationDisplay, Registry, RegistryDisplayContext,
    SearchCriteria, SearchResults,
};
use crate::location::RegistryLocation;
use crate::session::Session;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// A registry indexing a local folder in place.
///
/// The index file lives inside the folder and is rebuilt whenever anything in
/// the folder is newer than it.
#[derive(Debug)]
pub struct LocalRegistry {
    inner: ArtifactRegistry,
}

impl LocalRegistry {
    /// A registry for a local location. Fails for remote locations.
    pub fn new(session: Session, location: RegistryLocation) -> Result<Self> {
        let Some(root) = location.local_path().map(Path::to_path_buf) else {
            return Err(Error::unsupported_location(
                location.canonical(),
                "a local registry needs a local path",
            ));
        };
        Ok(Self {
            inner: ArtifactRegistry::new(session, location, root),
        })
    }

    /// Shared lifecycle state
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.inner
    }
}

#[async_trait]
impl ArtifactSearchable for LocalRegistry {
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResults> {
        self.inner.search_in(&LocationDisplay, criteria).await
    }
}

#[async_trait]
impl Registry for LocalRegistry {
    fn location(&self) -> &RegistryLocation {
        self.inner.location()
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn loaded(&self) -> bool {
        self.inner.loaded()
    }

    async fn load(&self, force: bool) -> Result<()> {
        self.inner.load(force, true).await
    }

    async fn save(&self) -> Result<()> {
        self.inner.save().await
    }

    /// There is no upstream to refresh from; this is a forced reload.
    async fn update(&self, display_name: Option<&str>) -> Result<()> {
        debug!(
            location = %self.inner.canonical_location(),
            name = display_name.unwrap_or_default(),
            "Reloading local registry"
        );
        self.inner.load(true, false).await
    }

    async fn regenerate(&self, normalize: bool) -> Result<()> {
        self.inner.regenerate(normalize).await
    }

    async fn search_in(
        &self,
        context: &dyn RegistryDisplayContext,
        criteria: &SearchCriteria,
    ) -> Result<SearchResults> {
        self.inner.search_in(context, criteria).await
    }
}
