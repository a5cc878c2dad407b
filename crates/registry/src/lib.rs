//! Artifact registries for artreg
//!
//! This crate manages collections of artifact metadata documents and the
//! indexes that make them searchable:
//! - [`LocalRegistry`]: a folder on disk, reindexed when its content changes
//! - [`RemoteRegistry`]: a zip archive fetched over HTTP(S) into a local cache
//! - [`RegistryDatabase`]: one registry object per location, loaded once
//! - [`RegistryResolver`]: layered name bindings with shadowing search
//!
//! # Example
//!
//! ```no_run
//! use artreg_registry::{
//!     ArtifactSearchable, RegistryConfig, RegistryDatabase, RegistryLocation, RegistryResolver,
//!     SearchCriteria, Session, get_artifact,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> artreg_registry::Result<()> {
//! let session = Session::new(RegistryConfig::from_env()?)?;
//! let database = Arc::new(RegistryDatabase::new());
//!
//! let location = RegistryLocation::parse("https://example.com/registry.zip", None)?;
//! database.load_registry(&session, &location).await?;
//!
//! let mut resolver = RegistryResolver::new(Arc::clone(&database));
//! resolver.add(&location, "main")?;
//!
//! let found = get_artifact(&resolver, "cmake", Some("^3")).await?;
//! if let Some((name, artifact)) = found {
//!     assert!(name.starts_with("main:"));
//!     assert_eq!(artifact.version.major, 3);
//! }
//!
//! let everything = resolver.search(&SearchCriteria::new().keyword("build")).await?;
//! assert!(everything.iter().all(|(_, group)| !group.is_empty()));
//! # Ok(())
//! # }
//! ```

#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

pub mod artifact;
pub mod artifact_index;
pub mod config;
pub mod database;
mod error;
pub mod fs;
pub mod location;
pub mod metadata;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod tracing;

pub use artifact::Artifact;
pub use artifact_index::{ArtifactIndex, ArtifactSchema};
pub use config::RegistryConfig;
pub use database::RegistryDatabase;
pub use error::{Error, Result};
pub use fs::{FileEntry, LocalFileSystem, RegistryFileSystem};
pub use location::RegistryLocation;
pub use metadata::MetadataFile;
pub use registry::{
    ArtifactRegistry, ArtifactSearchable, LocalRegistry, LocationDisplay, Registry,
    RegistryDisplayContext, RemoteRegistry, SearchCriteria, SearchResults, get_artifact,
};
pub use resolver::RegistryResolver;
pub use session::Session;
