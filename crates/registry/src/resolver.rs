//! Layered registry name resolution.
//!
//! A resolver binds names to registry locations. Resolvers stack: a project
//! resolver composed over a global one with [`RegistryResolver::with`] sees its
//! own bindings first and falls back to the global ones, and its search results
//! shadow the global results for the same artifact id.

use crate::database::RegistryDatabase;
use crate::location::RegistryLocation;
use crate::registry::{
    ArtifactSearchable, Registry, RegistryDisplayContext, SearchCriteria, SearchResults,
};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
enum Parent {
    Database(Arc<RegistryDatabase>),
    Resolver(Arc<RegistryResolver>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    name: String,
    location: String,
}

/// Name ↔ location bindings layered over a database or another resolver.
#[derive(Debug, Clone)]
pub struct RegistryResolver {
    parent: Parent,
    bindings: Vec<Binding>,
}

impl RegistryResolver {
    /// A root resolver over `database`.
    #[must_use]
    pub fn new(database: Arc<RegistryDatabase>) -> Self {
        Self {
            parent: Parent::Database(database),
            bindings: Vec::new(),
        }
    }

    /// An empty resolver layered over `parent`.
    #[must_use]
    pub fn child_of(parent: Arc<RegistryResolver>) -> Self {
        Self {
            parent: Parent::Resolver(parent),
            bindings: Vec::new(),
        }
    }

    /// Bind `name` to `location` in this layer.
    ///
    /// Rebinding a name to the location it already has is a no-op; binding it
    /// to a different location is a [`Error::NameCollision`].
    pub fn add(&mut self, location: &RegistryLocation, name: &str) -> Result<()> {
        let canonical = location.canonical();
        if let Some(existing) = self.bindings.iter().find(|b| b.name == name) {
            if existing.location == canonical {
                return Ok(());
            }
            return Err(Error::NameCollision {
                name: name.to_string(),
                existing: existing.location.clone(),
                requested: canonical,
            });
        }
        debug!(name, location = %canonical, "Bound registry name");
        self.bindings.push(Binding {
            name: name.to_string(),
            location: canonical,
        });
        Ok(())
    }

    /// The database at the root of the chain
    #[must_use]
    pub fn database(&self) -> &Arc<RegistryDatabase> {
        match &self.parent {
            Parent::Database(database) => database,
            Parent::Resolver(parent) => parent.database(),
        }
    }

    /// This resolver followed by its ancestors, most specific first.
    fn layers(&self) -> Vec<&RegistryResolver> {
        let mut layers = vec![self];
        let mut current = self;
        while let Parent::Resolver(parent) = &current.parent {
            current = parent.as_ref();
            layers.push(current);
        }
        layers
    }

    fn name_of(&self, canonical: &str) -> Option<&str> {
        self.layers().into_iter().find_map(|layer| {
            layer
                .bindings
                .iter()
                .find(|b| b.location == canonical)
                .map(|b| b.name.as_str())
        })
    }

    fn location_of(&self, name: &str) -> Option<&str> {
        self.layers().into_iter().find_map(|layer| {
            layer
                .bindings
                .iter()
                .find(|b| b.name == name)
                .map(|b| b.location.as_str())
        })
    }

    /// Name bound to `location` in the nearest layer that binds it.
    #[must_use]
    pub fn get_registry_name(&self, location: &RegistryLocation) -> Option<String> {
        self.name_of(&location.canonical()).map(str::to_string)
    }

    /// Location bound to `name` in the nearest layer that binds it.
    #[must_use]
    pub fn get_registry_location(&self, name: &str) -> Option<String> {
        self.location_of(name).map(str::to_string)
    }

    /// Bound name of `location`, or the location in brackets.
    #[must_use]
    pub fn get_registry_display_name(&self, location: &RegistryLocation) -> String {
        self.registry_display_name(&location.canonical())
    }

    /// The loaded registry bound to `name`.
    pub fn get_registry_by_name(&self, name: &str) -> Result<Arc<dyn Registry>> {
        let location = self.location_of(name).ok_or_else(|| Error::not_found(name))?;
        self.loaded(location).ok_or_else(|| Error::not_found(name))
    }

    /// The loaded registry at `location`.
    pub fn get_registry_by_uri(&self, location: &RegistryLocation) -> Result<Arc<dyn Registry>> {
        let canonical = location.canonical();
        self.loaded(&canonical)
            .ok_or_else(|| Error::not_found(canonical))
    }

    fn loaded(&self, canonical: &str) -> Option<Arc<dyn Registry>> {
        let location = RegistryLocation::parse(canonical, None).ok()?;
        self.database().get_registry_by_uri(&location)
    }

    /// A resolver whose own bindings are `child`'s and whose parent is `self`.
    ///
    /// Both sides are captured as they are now: bindings added to `self` or
    /// `child` afterwards are not seen through the result. Compose again to
    /// pick them up.
    #[must_use]
    pub fn with(&self, child: &RegistryResolver) -> RegistryResolver {
        Self {
            parent: Parent::Resolver(Arc::new(self.clone())),
            bindings: child.bindings.clone(),
        }
    }
}

impl RegistryDisplayContext for RegistryResolver {
    fn registry_display_name(&self, location: &str) -> String {
        self.name_of(location)
            .map_or_else(|| format!("[{location}]"), str::to_string)
    }
}

#[async_trait]
impl ArtifactSearchable for RegistryResolver {
    /// Search every registry bound in any layer, most specific layer first.
    /// An artifact id found in a more specific layer hides the same id from
    /// less specific layers.
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResults> {
        let mut results: SearchResults = Vec::new();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut searched: HashSet<&str> = HashSet::new();

        for layer in self.layers() {
            let mut found_here: HashSet<String> = HashSet::new();
            for binding in &layer.bindings {
                if !searched.insert(binding.location.as_str()) {
                    continue;
                }
                let Some(registry) = self.loaded(&binding.location) else {
                    debug!(
                        name = %binding.name,
                        location = %binding.location,
                        "Skipping registry that is not loaded"
                    );
                    continue;
                };

                for (display_name, artifacts) in registry.search_in(self, criteria).await? {
                    let visible: Vec<_> = artifacts
                        .into_iter()
                        .filter(|a| !claimed.contains(&a.id))
                        .collect();
                    if visible.is_empty() {
                        continue;
                    }
                    found_here.extend(visible.iter().map(|a| a.id.clone()));
                    match results.iter_mut().find(|(name, _)| *name == display_name) {
                        Some((_, group)) => group.extend(visible),
                        None => results.push((display_name, visible)),
                    }
                }
            }
            claimed.extend(found_here);
        }
        Ok(results)
    }
}
