//! Lifecycle shared by every registry kind.

use super::{RegistryDisplayContext, SearchCriteria, SearchResults};
use crate::artifact::Artifact;
use crate::artifact_index::{ArtifactIndex, ArtifactSchema};
use crate::location::RegistryLocation;
use crate::metadata::MetadataFile;
use crate::session::Session;
use crate::{Error, Result};
use artreg_index::IndexDocument;
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

/// The index file: the index document plus every metadata path that was a
/// candidate when it was built, parsed or not.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    #[serde(flatten)]
    index: IndexDocument,
    #[serde(default)]
    sources: Vec<String>,
}

/// An index built over a content tree that has not been installed yet.
#[derive(Debug)]
pub(crate) struct Rebuilt {
    index: ArtifactIndex,
    sources: Vec<String>,
    skipped: usize,
}

impl Rebuilt {
    /// Metadata files found in the tree
    pub(crate) fn candidates(&self) -> usize {
        self.sources.len()
    }

    /// Metadata files that made it into the index
    pub(crate) fn indexed(&self) -> usize {
        self.index.len()
    }
}

/// An artifact index over a tree of metadata documents rooted at
/// `content_root`, persisted to `content_root/<index file name>`.
///
/// Index rebuilds happen off to the side and are swapped in only when
/// complete, so searches always see either the old or the new index. Every
/// mutating operation holds the writer lock; searches never wait for it.
pub struct ArtifactRegistry {
    session: Session,
    location: RegistryLocation,
    canonical: String,
    content_root: PathBuf,
    index_file: PathBuf,
    index: RwLock<ArtifactIndex>,
    sources: SyncMutex<Vec<String>>,
    loaded: AtomicBool,
    writer: Mutex<()>,
}

impl std::fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("location", &self.canonical)
            .field("content_root", &self.content_root)
            .field("count", &self.count())
            .field("loaded", &self.loaded())
            .finish_non_exhaustive()
    }
}

impl ArtifactRegistry {
    /// A registry for `location` whose content lives under `content_root`.
    #[must_use]
    pub fn new(session: Session, location: RegistryLocation, content_root: PathBuf) -> Self {
        let index_file = content_root.join(&session.config().index_file_name);
        Self {
            canonical: location.canonical(),
            session,
            location,
            content_root,
            index_file,
            index: RwLock::new(ArtifactIndex::new()),
            sources: SyncMutex::new(Vec::new()),
            loaded: AtomicBool::new(false),
            writer: Mutex::new(()),
        }
    }

    /// Session this registry operates in
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Source location
    #[must_use]
    pub fn location(&self) -> &RegistryLocation {
        &self.location
    }

    /// Canonical location string
    #[must_use]
    pub fn canonical_location(&self) -> &str {
        &self.canonical
    }

    /// Root of the metadata tree
    #[must_use]
    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// Persisted index path
    #[must_use]
    pub fn index_file(&self) -> &Path {
        &self.index_file
    }

    /// Folder artifacts from this registry install into
    #[must_use]
    pub fn installation_folder(&self) -> PathBuf {
        self.session.config().install_folder()
    }

    /// Number of indexed artifact versions
    #[must_use]
    pub fn count(&self) -> usize {
        self.index.read().len()
    }

    /// Whether an index has been loaded or built
    #[must_use]
    pub fn loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Snapshot of the current index document
    #[must_use]
    pub fn index_document(&self) -> artreg_index::IndexDocument {
        self.index.read().serialize()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Load the index file, rebuilding when it is absent, malformed, stale
    /// (with `check_stale`), or when `force` is set.
    pub async fn load(&self, force: bool, check_stale: bool) -> Result<()> {
        let _writer = self.lock().await;
        self.load_locked(force, check_stale).await
    }

    /// Rebuild the index from the content tree.
    pub async fn regenerate(&self, normalize: bool) -> Result<()> {
        let _writer = self.lock().await;
        self.rebuild_locked(normalize).await
    }

    /// Write the index file.
    pub async fn save(&self) -> Result<()> {
        let _writer = self.lock().await;
        self.save_locked().await
    }

    #[instrument(skip(self), fields(location = %self.canonical))]
    pub(crate) async fn load_locked(&self, force: bool, check_stale: bool) -> Result<()> {
        if !force && self.session.fs().exists(&self.index_file).await {
            match self.read_index_file().await {
                Ok((index, sources)) => {
                    if check_stale && self.is_stale(&sources).await? {
                        debug!("Index is out of date with the registry content");
                    } else {
                        let count = index.len();
                        *self.sources.lock() = sources;
                        *self.index.write() = index;
                        self.loaded.store(true, Ordering::Release);
                        debug!(count, "Loaded registry index");
                        return Ok(());
                    }
                }
                Err(e @ Error::MalformedIndex { .. }) => {
                    warn!(error = %e, "Rebuilding malformed registry index");
                }
                Err(e) => return Err(e),
            }
        }

        self.rebuild_locked(false).await?;
        self.save_locked().await
    }

    async fn read_index_file(&self) -> Result<(ArtifactIndex, Vec<String>)> {
        let json = self.session.fs().read_to_string(&self.index_file).await?;
        let persisted: PersistedIndex = serde_json::from_str(&json)
            .map_err(|e| Error::malformed_index(&self.index_file, e.to_string()))?;
        let mut index = ArtifactIndex::new();
        index
            .deserialize(persisted.index)
            .map_err(|e| Error::malformed_index(&self.index_file, e.to_string()))?;
        Ok((index, persisted.sources))
    }

    /// Whether the content tree changed after the index was written: an entry
    /// is newer than the index, or the set of metadata files differs from the
    /// one the index was built from (deletions and renames).
    async fn is_stale(&self, sources: &[String]) -> Result<bool> {
        let fs = self.session.fs();
        let Some(index_time) = fs.modified(&self.index_file).await? else {
            return Ok(true);
        };
        let config = self.session.config();

        let mut current = Vec::new();
        for entry in fs.walk(&self.content_root).await? {
            if entry.path == self.index_file || is_hidden(&self.content_root, &entry.path) {
                continue;
            }
            if entry.modified.is_some_and(|m| m > index_time) {
                return Ok(true);
            }
            if !entry.is_dir && config.is_metadata_file(&entry.path) {
                current.push(item_for(&self.content_root, &entry.path));
            }
        }

        let mut recorded = sources.to_vec();
        recorded.sort();
        current.sort();
        Ok(current != recorded)
    }

    #[instrument(skip(self), fields(location = %self.canonical))]
    pub(crate) async fn rebuild_locked(&self, normalize: bool) -> Result<()> {
        let rebuilt = self.build_index(&self.content_root, normalize).await?;
        self.install(rebuilt);
        Ok(())
    }

    /// Index every metadata file under `root` without touching the live
    /// index. Malformed files are skipped and counted.
    pub(crate) async fn build_index(&self, root: &Path, normalize: bool) -> Result<Rebuilt> {
        let config = self.session.config();
        let entries = self.session.fs().walk(root).await?;

        let mut index = ArtifactIndex::new();
        let mut sources = Vec::new();
        let mut skipped = 0usize;
        for entry in entries {
            if entry.is_dir
                || is_hidden(root, &entry.path)
                || !config.is_metadata_file(&entry.path)
            {
                continue;
            }
            self.session.check_cancelled("regenerate")?;

            let item = item_for(root, &entry.path);
            sources.push(item.clone());
            if let Err(e) = self
                .index_file_entry(&entry.path, item, normalize, &mut index)
                .await
            {
                skipped += 1;
                warn!(path = %entry.path.display(), error = %e, "Skipping artifact metadata");
            }
        }
        index.done_insertion();

        Ok(Rebuilt {
            index,
            sources,
            skipped,
        })
    }

    /// Swap a built index in as the live one.
    pub(crate) fn install(&self, rebuilt: Rebuilt) {
        let count = rebuilt.index.len();
        *self.sources.lock() = rebuilt.sources;
        *self.index.write() = rebuilt.index;
        self.loaded.store(true, Ordering::Release);
        info!(
            location = %self.canonical,
            count,
            skipped = rebuilt.skipped,
            "Regenerated registry index"
        );
    }

    async fn index_file_entry(
        &self,
        path: &Path,
        item: String,
        normalize: bool,
        index: &mut ArtifactIndex,
    ) -> Result<()> {
        let content = self.session.fs().read_to_string(path).await?;
        let mut metadata = MetadataFile::parse(path, &content)?;

        if normalize && metadata.normalize() {
            if let Err(e) = self.write_metadata(path, &metadata).await {
                warn!(path = %path.display(), error = %e, "Failed to normalize artifact metadata");
            } else {
                debug!(path = %path.display(), "Normalized artifact metadata");
            }
        }

        index.insert(&metadata, item)?;
        Ok(())
    }

    async fn write_metadata(&self, path: &Path, metadata: &MetadataFile) -> Result<()> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let rendered = if is_json {
            serde_json::to_string_pretty(metadata)
                .map_err(|e| Error::serialization(e.to_string()))?
        } else {
            metadata.to_yaml()?
        };
        self.session
            .fs()
            .write_atomic(path, rendered.as_bytes())
            .await
    }

    #[instrument(skip(self), fields(location = %self.canonical))]
    pub(crate) async fn save_locked(&self) -> Result<()> {
        let persisted = PersistedIndex {
            index: self.index.read().serialize(),
            sources: self.sources.lock().clone(),
        };
        let json = serde_json::to_string_pretty(&persisted)
            .map_err(|e| Error::serialization(e.to_string()))?;
        self.session
            .fs()
            .write_atomic(&self.index_file, json.as_bytes())
            .await?;
        debug!(path = %self.index_file.display(), "Saved registry index");
        Ok(())
    }

    /// Run `criteria` against the index and open the matching documents.
    pub async fn search_in(
        &self,
        context: &dyn RegistryDisplayContext,
        criteria: &SearchCriteria,
    ) -> Result<SearchResults> {
        let items = self.matching_items(criteria)?;
        let registry_name = context.registry_display_name(&self.canonical);

        let mut results: SearchResults = Vec::new();
        for item in items {
            let artifact = match self.open_artifact(&item, &registry_name).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    warn!(
                        location = %self.canonical,
                        %item,
                        error = %e,
                        "Indexed artifact could not be opened"
                    );
                    continue;
                }
            };
            match results
                .iter_mut()
                .find(|(name, _)| *name == artifact.display_name)
            {
                Some((_, group)) => group.push(artifact),
                None => results.push((artifact.display_name.clone(), vec![artifact])),
            }
        }
        Ok(results)
    }

    fn matching_items(&self, criteria: &SearchCriteria) -> Result<Vec<String>> {
        let index = self.index.read();
        let mut query = index.query();

        if let Some(id) = criteria.id_or_short_name.as_deref() {
            query
                .key(ArtifactSchema::ID)?
                .name_or_short_name_is(id.trim())?;
        }
        if let Some(version) = criteria.version.as_deref().map(str::trim) {
            let key = query.key(ArtifactSchema::VERSION)?;
            if artreg_index::parse_version(version).is_ok() {
                key.equals(version)?;
            } else {
                key.range_match(version)?;
            }
        }
        if let Some(keyword) = criteria.keyword.as_deref() {
            query.key(ArtifactSchema::SUMMARY)?.contains(keyword.trim());
        }

        Ok(query.items().into_iter().map(str::to_string).collect())
    }

    async fn open_artifact(&self, item: &str, registry_name: &str) -> Result<Artifact> {
        let path = self.content_root.join(item);
        let content = self.session.fs().read_to_string(&path).await?;
        let metadata = MetadataFile::parse(&path, &content)?;
        let version = metadata.semver()?;
        let id = metadata.id.trim().to_string();

        Ok(Artifact {
            display_name: format!("{registry_name}:{id}"),
            registry: self.canonical.clone(),
            install_folder: self
                .installation_folder()
                .join(&id)
                .join(version.to_string()),
            metadata_path: path,
            id,
            version,
            metadata,
        })
    }
}

/// Item string stored in the index: the document path relative to `root`,
/// `/`-separated.
fn item_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Dot-folders and dot-files (VCS metadata, temp files) are not content.
fn is_hidden(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root).unwrap_or(path).components().any(
        |c| matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.')),
    )
}
