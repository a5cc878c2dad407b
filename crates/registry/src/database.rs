//! Process-scoped store of loaded registries.

use crate::location::RegistryLocation;
use crate::registry::{LocalRegistry, Registry, RegistryDisplayContext, RemoteRegistry};
use crate::session::Session;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

type Slot = Arc<OnceCell<Arc<dyn Registry>>>;

/// Loaded registries keyed by canonical location.
///
/// [`RegistryDatabase::load_registry`] is the only way registries are created,
/// so there is at most one registry object per location no matter how many
/// callers ask for it concurrently.
#[derive(Debug, Default)]
pub struct RegistryDatabase {
    registries: Mutex<HashMap<String, Slot>>,
}

impl RegistryDatabase {
    /// An empty database
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded registry for `location`, if any.
    #[must_use]
    pub fn get_registry_by_uri(&self, location: &RegistryLocation) -> Option<Arc<dyn Registry>> {
        self.get(&location.canonical())
    }

    fn get(&self, canonical: &str) -> Option<Arc<dyn Registry>> {
        self.registries
            .lock()
            .get(canonical)
            .and_then(|slot| slot.get().cloned())
    }

    /// Whether a registry for `location` is loaded
    #[must_use]
    pub fn has(&self, location: &RegistryLocation) -> bool {
        self.get_registry_by_uri(location).is_some()
    }

    /// Register an already constructed registry under its own location.
    pub fn add(&self, registry: Arc<dyn Registry>) -> Result<()> {
        let canonical = registry.location().canonical();
        let mut registries = self.registries.lock();
        let slot = registries.entry(canonical.clone()).or_default();
        slot.set(registry).map_err(|_| {
            Error::configuration(format!("A registry for {canonical} is already loaded"))
        })?;
        debug!(location = %canonical, "Added registry");
        Ok(())
    }

    /// Return the registry for `location`, creating and loading it first if
    /// this is the first request. Concurrent first requests share one load.
    /// A failed load is not remembered; the next request tries again.
    pub async fn load_registry(
        &self,
        session: &Session,
        location: &RegistryLocation,
    ) -> Result<Arc<dyn Registry>> {
        let canonical = location.canonical();
        let slot = Arc::clone(self.registries.lock().entry(canonical.clone()).or_default());

        let registry = slot
            .get_or_try_init(|| async {
                let registry: Arc<dyn Registry> = if location.is_remote() {
                    Arc::new(RemoteRegistry::new(session.clone(), location.clone())?)
                } else {
                    Arc::new(LocalRegistry::new(session.clone(), location.clone())?)
                };
                registry.load(false).await?;
                info!(location = %canonical, count = registry.count(), "Loaded registry");
                Ok::<_, Error>(registry)
            })
            .await?;
        Ok(Arc::clone(registry))
    }

    /// Canonical locations of every loaded registry, sorted.
    #[must_use]
    pub fn get_all_uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self
            .registries
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(uri, _)| uri.clone())
            .collect();
        uris.sort();
        uris
    }

    /// Update every loaded registry. A failure is logged and reported in the
    /// outcome list; it never stops the other updates.
    pub async fn update_all(
        &self,
        context: &dyn RegistryDisplayContext,
    ) -> Vec<(String, Result<()>)> {
        let registries: Vec<(String, Arc<dyn Registry>)> = self
            .get_all_uris()
            .into_iter()
            .filter_map(|uri| self.get(&uri).map(|registry| (uri, registry)))
            .collect();

        let updates = registries.iter().map(|(uri, registry)| async move {
            let name = context.registry_display_name(uri);
            let outcome = registry.update(Some(name.as_str())).await;
            if let Err(e) = &outcome {
                warn!(
                    location = %uri,
                    error = %e,
                    transient = e.is_transient(),
                    "Registry update failed"
                );
            }
            (uri.clone(), outcome)
        });
        futures::future::join_all(updates).await
    }
}
