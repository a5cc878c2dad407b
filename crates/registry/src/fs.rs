//! Filesystem and network access used by registries.
//!
//! Registries never touch the disk or network directly; they go through a
//! [`RegistryFileSystem`] held by the session, so tests can script remote
//! responses without a server.

use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use url::Url;

/// One entry produced by [`RegistryFileSystem::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path
    pub path: PathBuf,
    /// Whether this entry is a folder
    pub is_dir: bool,
    /// Last modification time, when the platform reports one
    pub modified: Option<SystemTime>,
}

/// Disk and network operations needed by the registry lifecycle.
#[async_trait]
pub trait RegistryFileSystem: Send + Sync + std::fmt::Debug {
    /// Whether `path` exists.
    async fn exists(&self, path: &Path) -> bool;

    /// Read a UTF-8 file.
    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace `path` with `contents`, never leaving a partially written file.
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Modification time of `path`, or `None` if it does not exist.
    async fn modified(&self, path: &Path) -> Result<Option<SystemTime>>;

    /// Every file and folder below `root` (excluding `root`), in a stable
    /// order: entries sorted by file name within each folder, depth first.
    /// Fails only when `root` itself cannot be read; unreadable entries below
    /// it are skipped.
    async fn walk(&self, root: &Path) -> Result<Vec<FileEntry>>;

    /// Download `url`, giving up after `timeout`.
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Vec<u8>>;
}

/// [`RegistryFileSystem`] backed by the local disk and HTTP(S).
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    client: reqwest::Client,
}

impl LocalFileSystem {
    /// Create a filesystem with a fresh HTTP client.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("artreg/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Create a filesystem using an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RegistryFileSystem for LocalFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(e, path, "read"))
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }

        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("artreg");
        let temp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

        if let Err(e) = tokio::fs::write(&temp, contents).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::io(e, &temp, "write"));
        }
        tokio::fs::rename(&temp, path)
            .await
            .map_err(|e| Error::io(e, path, "rename"))?;
        debug!(path = %path.display(), bytes = contents.len(), "Wrote file atomically");
        Ok(())
    }

    async fn modified(&self, path: &Path) -> Result<Option<SystemTime>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.modified().ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(e, path, "stat")),
        }
    }

    async fn walk(&self, root: &Path) -> Result<Vec<FileEntry>> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || walk_sorted(&root))
            .await
            .map_err(|e| Error::io_no_path(std::io::Error::other(e.to_string()), "walk"))?
    }

    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Vec<u8>> {
        debug!(%url, timeout_secs = timeout.as_secs(), "Fetching remote registry");

        let request = async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| Error::remote_unavailable(url.as_str(), e.to_string()))?;
            if !response.status().is_success() {
                return Err(Error::remote_unavailable(
                    url.as_str(),
                    format!("HTTP {}", response.status()),
                ));
            }
            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| Error::remote_unavailable(url.as_str(), e.to_string()))
        };

        tokio::time::timeout(timeout, request).await.map_err(|_| {
            Error::remote_unavailable(
                url.as_str(),
                format!("timed out after {}s", timeout.as_secs()),
            )
        })?
    }
}

fn walk_sorted(root: &Path) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let path = e.path().unwrap_or(root).to_path_buf();
                return Err(Error::io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                    path,
                    "walk",
                ));
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        entries.push(FileEntry {
            path: entry.path().to_path_buf(),
            is_dir: entry.file_type().is_dir(),
            modified,
        });
    }
    Ok(entries)
}
