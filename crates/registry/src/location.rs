//! Registry locations.
//!
//! A location is either a local content root or a remote archive URL. Every
//! location has one canonical string form used as its identity in the
//! registry database and resolver:
//!
//! - local: an absolute `file://` URL without a trailing slash
//! - remote: the URL as normalized by the `url` crate

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Where a registry's content lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryLocation {
    /// Content root on local disk
    Local(PathBuf),
    /// Archive served over HTTP(S)
    Remote(Url),
}

impl RegistryLocation {
    /// Interpret `raw` as a location. Relative paths resolve against `base`,
    /// or the current directory when `base` is `None`.
    pub fn parse(raw: &str, base: Option<&Path>) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::unsupported_location(raw, "location is empty"));
        }

        if trimmed.contains("://") {
            let url = Url::parse(trimmed)
                .map_err(|e| Error::unsupported_location(raw, e.to_string()))?;
            return match url.scheme() {
                "http" | "https" => Ok(Self::Remote(url)),
                "file" => url
                    .to_file_path()
                    .map(|path| Self::Local(normalize_path(&path)))
                    .map_err(|()| Error::unsupported_location(raw, "not a valid file URL")),
                other => Err(Error::unsupported_location(
                    raw,
                    format!("unsupported scheme '{other}'"),
                )),
            };
        }

        let path = Path::new(trimmed);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let base = match base {
                Some(base) => base.to_path_buf(),
                None => std::env::current_dir().map_err(|e| Error::io_no_path(e, "current dir"))?,
            };
            base.join(path)
        };
        Ok(Self::Local(normalize_path(&absolute)))
    }

    /// A local location for an existing path.
    pub fn local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(Error::unsupported_location(
                path.display().to_string(),
                "local locations must be absolute",
            ));
        }
        Ok(Self::Local(normalize_path(path)))
    }

    /// Canonical string form; the identity of a registry.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Local(path) => match Url::from_file_path(path) {
                Ok(url) => url.as_str().trim_end_matches('/').to_string(),
                Err(()) => format!("file://{}", path.display()),
            },
            Self::Remote(url) => url.as_str().to_string(),
        }
    }

    /// Whether the content must be fetched
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Local content root, if any
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }

    /// Stable folder name for caching this location's content.
    ///
    /// Readable prefix from the host and path, suffixed with a hash of the
    /// canonical form so distinct locations never share a folder.
    #[must_use]
    pub fn safe_name(&self) -> String {
        let readable = match self {
            Self::Remote(url) => format!("{}{}", url.host_str().unwrap_or(""), url.path()),
            Self::Local(path) => path.to_string_lossy().into_owned(),
        };

        let mut prefix = String::with_capacity(readable.len());
        for c in readable.chars() {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                prefix.push(c.to_ascii_lowercase());
            } else if !prefix.ends_with('-') {
                prefix.push('-');
            }
        }
        let prefix = prefix.trim_matches(['-', '.']);
        let prefix: String = prefix.chars().take(48).collect();

        let digest = Sha256::digest(self.canonical().as_bytes());
        let hash = hex::encode(&digest[..8]);
        if prefix.is_empty() {
            hash
        } else {
            format!("{prefix}-{hash}")
        }
    }
}

impl fmt::Display for RegistryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl std::str::FromStr for RegistryLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, None)
    }
}

/// Remove `.` and resolve `..` lexically; the path need not exist.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
