//! Registries fetched from a remote archive.

use super::{
    ArtifactRegistry, ArtifactSearchable, LocationDisplay, Registry, RegistryDisplayContext,
    SearchCriteria, SearchResults,
};
use crate::location::RegistryLocation;
use crate::session::Session;
use crate::{Error, Result};
use async_trait::async_trait;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{info, instrument, warn};
use url::Url;

/// A registry whose content is a zip archive served over HTTP(S), unpacked
/// into `registries_folder/<safe name>` and indexed there.
#[derive(Debug)]
pub struct RemoteRegistry {
    inner: ArtifactRegistry,
    url: Url,
}

impl RemoteRegistry {
    /// A registry for a remote location. Fails for local locations.
    pub fn new(session: Session, location: RegistryLocation) -> Result<Self> {
        let RegistryLocation::Remote(url) = &location else {
            return Err(Error::unsupported_location(
                location.canonical(),
                "a remote registry needs an http(s) URL",
            ));
        };
        let url = url.clone();
        let cache_folder = session
            .config()
            .registries_folder()
            .join(location.safe_name());
        Ok(Self {
            inner: ArtifactRegistry::new(session, location, cache_folder),
            url,
        })
    }

    /// Shared lifecycle state
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.inner
    }

    /// Folder holding the unpacked remote content
    #[must_use]
    pub fn cache_folder(&self) -> &Path {
        self.inner.content_root()
    }

    /// Download the archive, index it in a staging folder, and swap both the
    /// content and the index in only when the new content is usable. The
    /// previous cache and index stay in place if anything fails.
    #[instrument(skip(self), fields(url = %self.url))]
    async fn refresh_locked(&self, display_name: Option<&str>) -> Result<()> {
        let session = self.inner.session();
        let data = session
            .fs()
            .fetch(&self.url, session.config().fetch_timeout())
            .await?;
        session.check_cancelled("update")?;

        let dest = self.cache_folder().to_path_buf();
        let staging = sibling(&dest, "tmp");
        let location = self.url.to_string();
        let bytes = data.len();

        let unpack_staging = staging.clone();
        let unpack_location = location.clone();
        blocking("unpack", move || {
            unpack_archive(&data, &unpack_staging, &unpack_location)
        })
        .await?;

        let rebuilt = match self.inner.build_index(&staging, false).await {
            Ok(rebuilt) if rebuilt.candidates() > 0 && rebuilt.indexed() == 0 => {
                Err(Error::malformed_remote(
                    &location,
                    format!(
                        "none of the {} metadata files could be parsed",
                        rebuilt.candidates()
                    ),
                ))
            }
            other => other,
        };
        let rebuilt = match rebuilt {
            Ok(rebuilt) => rebuilt,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "Failed to remove staging folder"
                    );
                }
                return Err(e);
            }
        };

        blocking("swap", move || swap_folder(&staging, &dest)).await?;
        self.inner.install(rebuilt);
        self.inner.save_locked().await?;

        info!(
            name = display_name.unwrap_or_default(),
            bytes,
            "Fetched remote registry"
        );
        Ok(())
    }
}

async fn blocking<F>(operation: &'static str, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::io_no_path(std::io::Error::other(e.to_string()), operation))?
}

/// `dest` with its name hidden and suffixed, e.g. `.cache.tmp`.
fn sibling(dest: &Path, suffix: &str) -> PathBuf {
    let name = dest
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("registry");
    dest.with_file_name(format!(".{name}.{suffix}"))
}

#[async_trait]
impl ArtifactSearchable for RemoteRegistry {
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResults> {
        self.inner.search_in(&LocationDisplay, criteria).await
    }
}

#[async_trait]
impl Registry for RemoteRegistry {
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
        let _writer = self.inner.lock().await;
        if !self.inner.session().fs().exists(self.cache_folder()).await {
            return self.refresh_locked(None).await;
        }
        self.inner.load_locked(force, false).await
    }

    async fn save(&self) -> Result<()> {
        self.inner.save().await
    }

    async fn update(&self, display_name: Option<&str>) -> Result<()> {
        let _writer = self.inner.lock().await;
        self.refresh_locked(display_name).await
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

/// Unpack a zip archive into a fresh `staging` folder, removed again on
/// failure.
///
/// When every entry sits under one top-level folder (as with archives of a
/// repository snapshot) that folder is stripped.
fn unpack_archive(data: &[u8], staging: &Path, location: &str) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::malformed_remote(location, format!("not a zip archive: {e}")))?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| Error::malformed_remote(location, e.to_string()))?;
        names.push(file.enclosed_name());
    }
    let strip = common_root(&names);

    if staging.exists() {
        std::fs::remove_dir_all(staging).map_err(|e| Error::io(e, staging, "remove"))?;
    }
    std::fs::create_dir_all(staging).map_err(|e| Error::io(e, staging, "create_dir_all"))?;

    let extract_result = (|| -> Result<()> {
        for (i, name) in names.iter().enumerate() {
            let Some(name) = name else { continue };
            let relative = match &strip {
                Some(root) => match name.strip_prefix(root) {
                    Ok(rest) if rest.as_os_str().is_empty() => continue,
                    Ok(rest) => rest.to_path_buf(),
                    Err(_) => continue,
                },
                None => name.clone(),
            };
            let outpath = staging.join(relative);

            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::malformed_remote(location, e.to_string()))?;
            if file.is_dir() {
                std::fs::create_dir_all(&outpath)
                    .map_err(|e| Error::io(e, &outpath, "create_dir_all"))?;
                continue;
            }
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::io(e, parent, "create_dir_all"))?;
            }
            let mut content = Vec::new();
            file.read_to_end(&mut content).map_err(|e| {
                Error::malformed_remote(location, format!("{}: {e}", name.display()))
            })?;
            std::fs::write(&outpath, &content).map_err(|e| Error::io(e, &outpath, "write"))?;
        }
        Ok(())
    })();

    if let Err(e) = extract_result {
        let _ = std::fs::remove_dir_all(staging);
        return Err(e);
    }
    Ok(())
}

/// Replace `dest` with `staging`.
///
/// The old folder is renamed aside first and only removed once `staging` is
/// in place; if the final rename fails the old folder is moved back.
fn swap_folder(staging: &Path, dest: &Path) -> Result<()> {
    let aside = sibling(dest, "old");
    if aside.exists() {
        std::fs::remove_dir_all(&aside).map_err(|e| Error::io(e, &aside, "remove"))?;
    }

    let had_previous = dest.exists();
    if had_previous {
        std::fs::rename(dest, &aside).map_err(|e| Error::io(e, dest, "rename"))?;
    }

    if let Err(e) = std::fs::rename(staging, dest) {
        if had_previous {
            if let Err(restore) = std::fs::rename(&aside, dest) {
                warn!(path = %dest.display(), error = %restore, "Failed to restore previous cache");
            }
        }
        return Err(Error::io(e, dest, "rename"));
    }

    if had_previous {
        if let Err(e) = std::fs::remove_dir_all(&aside) {
            warn!(path = %aside.display(), error = %e, "Failed to remove previous cache");
        }
    }
    Ok(())
}


/// The single top-level folder shared by every entry, if there is one.
fn common_root(names: &[Option<PathBuf>]) -> Option<PathBuf> {
    let mut root: Option<PathBuf> = None;
    let mut nested = false;
    for name in names.iter().flatten() {
        let mut components = name.components();
        let first = match components.next() {
            Some(Component::Normal(first)) => PathBuf::from(first),
            _ => return None,
        };
        nested |= components.next().is_some();
        match &root {
            Some(existing) if *existing != first => return None,
            Some(_) => {}
            None => root = Some(first),
        }
    }
    root.filter(|_| nested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn zip_of(files: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            for (name, content) in files {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_unpack_strips_single_root() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join(".cache.tmp");
        let data = zip_of(&[
            ("registry-main/tools/cmake.yaml", "id: tools/cmake"),
            ("registry-main/readme.md", "hi"),
        ]);

        unpack_archive(&data, &staging, "https://example.com/r.zip").unwrap();
        assert!(staging.join("tools/cmake.yaml").is_file());
        assert!(staging.join("readme.md").is_file());
    }

    #[test]
    fn test_unpack_clears_leftover_staging() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join(".cache.tmp");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("leftover.yaml"), "old").unwrap();

        let data = zip_of(&[("a.yaml", "new"), ("b/c.yaml", "new")]);
        unpack_archive(&data, &staging, "https://example.com/r.zip").unwrap();

        assert!(!staging.join("leftover.yaml").exists());
        assert!(staging.join("a.yaml").is_file());
        assert!(staging.join("b/c.yaml").is_file());
    }

    #[test]
    fn test_unpack_garbage_is_malformed_and_leaves_no_staging() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join(".cache.tmp");

        let err = unpack_archive(b"<html>not found</html>", &staging, "https://example.com/r.zip")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedRemoteContent { .. }));
        assert!(!err.is_transient());
        assert!(!staging.exists());
    }

    #[test]
    fn test_swap_replaces_previous_content() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("cache");
        let staging = sibling(&dest, "tmp");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.yaml"), "old").unwrap();
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("a.yaml"), "new").unwrap();

        swap_folder(&staging, &dest).unwrap();

        assert!(!dest.join("stale.yaml").exists());
        assert!(dest.join("a.yaml").is_file());
        assert!(!staging.exists());
        assert!(!sibling(&dest, "old").exists());
    }

    #[test]
    fn test_failed_swap_restores_previous_content() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("cache");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("kept.yaml"), "old").unwrap();

        let missing = sibling(&dest, "tmp");
        let err = swap_folder(&missing, &dest).unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(std::fs::read_to_string(dest.join("kept.yaml")).unwrap(), "old");
        assert!(!sibling(&dest, "old").exists());
    }

    #[test]
    fn test_swap_into_empty_destination() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("cache");
        let staging = sibling(&dest, "tmp");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("a.yaml"), "new").unwrap();

        swap_folder(&staging, &dest).unwrap();
        assert!(dest.join("a.yaml").is_file());
    }

    #[test]
    fn test_common_root() {
        let names = vec![
            Some(PathBuf::from("root/a.yaml")),
            Some(PathBuf::from("root/b/c.yaml")),
        ];
        assert_eq!(common_root(&names), Some(PathBuf::from("root")));

        let flat = vec![Some(PathBuf::from("a.yaml")), Some(PathBuf::from("b.yaml"))];
        assert_eq!(common_root(&flat), None);

        let single = vec![Some(PathBuf::from("only.yaml"))];
        assert_eq!(common_root(&single), None);
    }
}
