//! Shared fixtures for registry integration tests

#![allow(dead_code)]

use artreg_registry::{
    Error, FileEntry, LocalFileSystem, RegistryConfig, RegistryFileSystem, Result, Session,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use url::Url;
use zip::write::SimpleFileOptions;

/// What the next remote fetch returns
#[derive(Debug, Clone)]
pub enum Fetch {
    Archive(Vec<u8>),
    Unavailable,
    Garbage,
}

/// Local disk with scripted remote responses
#[derive(Debug)]
pub struct ScriptedFileSystem {
    disk: LocalFileSystem,
    next: Mutex<Fetch>,
    fetches: AtomicUsize,
}

impl ScriptedFileSystem {
    pub fn new(first: Fetch) -> Arc<Self> {
        Arc::new(Self {
            disk: LocalFileSystem::new().unwrap(),
            next: Mutex::new(first),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn respond_with(&self, fetch: Fetch) {
        *self.next.lock() = fetch;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryFileSystem for ScriptedFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        self.disk.exists(path).await
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        self.disk.read_to_string(path).await
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.disk.write_atomic(path, contents).await
    }

    async fn modified(&self, path: &Path) -> Result<Option<SystemTime>> {
        self.disk.modified(path).await
    }

    async fn walk(&self, root: &Path) -> Result<Vec<FileEntry>> {
        self.disk.walk(root).await
    }

    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.next.lock().clone();
        match next {
            Fetch::Archive(data) => Ok(data),
            Fetch::Unavailable => Err(Error::remote_unavailable(
                url.as_str(),
                "connection refused",
            )),
            Fetch::Garbage => Ok(b"<html><body>404 Not Found</body></html>".to_vec()),
        }
    }
}

/// A session rooted at `home` using `fs`
pub fn session(home: &TempDir, fs: Arc<ScriptedFileSystem>) -> Session {
    Session::with_file_system(RegistryConfig::with_home(home.path()), fs).unwrap()
}

/// Zip archive of `(path, content)` pairs
pub fn zip_of(files: &[(&str, &str)]) -> Vec<u8> {
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

/// Metadata document body
pub fn metadata(id: &str, version: &str, summary: &str) -> String {
    format!("id: {id}\nversion: {version}\nsummary: {summary}\n")
}

/// Write a metadata document below `root`
pub fn write_artifact(root: &Path, relative: &str, id: &str, version: &str, summary: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, metadata(id, version, summary)).unwrap();
}
