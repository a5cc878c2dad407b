//! Registry configuration.
//!
//! Configuration is a small JSON document. Every field is optional:
//!
//! ```json
//! {
//!   "home": "/home/me/.cache/artreg",
//!   "registries_folder": "/mnt/shared/registries",
//!   "index_file_name": "index.json",
//!   "fetch_timeout_secs": 30,
//!   "extensions": ["yaml", "yml", "json"]
//! }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default index file name inside a registry folder
pub const DEFAULT_INDEX_FILE: &str = "index.json";

/// Default timeout for remote fetches, in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Folder and behavior settings shared by every registry in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Root folder for registry caches and installs
    pub home: PathBuf,
    /// Where remote registries are cached; `home/registries` when unset
    pub registries_folder: Option<PathBuf>,
    /// Where artifacts are installed; `home/artifacts` when unset
    pub install_folder: Option<PathBuf>,
    /// File name of the persisted index within a registry's content root
    pub index_file_name: String,
    /// Timeout applied to a remote registry fetch
    pub fetch_timeout_secs: u64,
    /// Metadata file extensions considered when walking a registry
    pub extensions: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::with_home(std::env::temp_dir().join("artreg"))
    }
}

impl RegistryConfig {
    /// A configuration rooted at `home` with default settings.
    #[must_use]
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            registries_folder: None,
            install_folder: None,
            index_file_name: DEFAULT_INDEX_FILE.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            extensions: vec!["yaml".to_string(), "yml".to_string(), "json".to_string()],
        }
    }

    /// Resolve the home folder from the environment.
    ///
    /// Resolution order (first writable wins):
    /// 1) `ARTREG_HOME`
    /// 2) `XDG_CACHE_HOME/artreg`
    /// 3) OS cache dir/artreg
    /// 4) `~/.artreg`
    /// 5) `TMPDIR/artreg`
    pub fn from_env() -> Result<Self> {
        let inputs = HomeInputs {
            artreg_home: env_path("ARTREG_HOME"),
            xdg_cache_home: env_path("XDG_CACHE_HOME"),
            os_cache_dir: dirs::cache_dir(),
            home_dir: dirs::home_dir(),
            temp_dir: std::env::temp_dir(),
        };
        Ok(Self::with_home(home_from_inputs(inputs)?))
    }

    /// Read a JSON configuration file. Relative folders resolve against the
    /// file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read config"))?;
        let mut config: Self = serde_json::from_str(&content).map_err(|e| {
            Error::configuration(format!("Invalid config {}: {e}", path.display()))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.home = absolutize(base, &config.home);
        config.registries_folder = config.registries_folder.map(|p| absolutize(base, &p));
        config.install_folder = config.install_folder.map(|p| absolutize(base, &p));
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no registry could work with.
    pub fn validate(&self) -> Result<()> {
        if self.index_file_name.trim().is_empty()
            || self.index_file_name.contains(['/', '\\'])
        {
            return Err(Error::configuration(format!(
                "index_file_name must be a plain file name, got '{}'",
                self.index_file_name
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::configuration("fetch_timeout_secs must be positive"));
        }
        if self.extensions.is_empty() {
            return Err(Error::configuration(
                "at least one metadata file extension is required",
            ));
        }
        Ok(())
    }

    /// Folder holding remote registry caches
    #[must_use]
    pub fn registries_folder(&self) -> PathBuf {
        self.registries_folder
            .clone()
            .unwrap_or_else(|| self.home.join("registries"))
    }

    /// Folder artifacts install into
    #[must_use]
    pub fn install_folder(&self) -> PathBuf {
        self.install_folder
            .clone()
            .unwrap_or_else(|| self.home.join("artifacts"))
    }

    /// Timeout applied to remote fetches
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Whether `path` names a metadata file (by extension) rather than the index.
    #[must_use]
    pub fn is_metadata_file(&self, path: &Path) -> bool {
        if path
            .file_name()
            .is_some_and(|name| name == self.index_file_name.as_str())
        {
            return false;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Inputs for determining the home folder
#[derive(Debug, Clone)]
struct HomeInputs {
    artreg_home: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

fn home_from_inputs(inputs: HomeInputs) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(dir) = inputs.artreg_home {
        candidates.push(dir);
    }
    if let Some(xdg) = inputs.xdg_cache_home {
        candidates.push(xdg.join("artreg"));
    }
    if let Some(os_cache) = inputs.os_cache_dir {
        candidates.push(os_cache.join("artreg"));
    }
    if let Some(home) = inputs.home_dir {
        candidates.push(home.join(".artreg"));
    }
    candidates.push(inputs.temp_dir.join("artreg"));

    for path in candidates {
        // Existing folders may be read-only (CI images, shared homes)
        if path.exists() {
            let marker = path.join(".write_check");
            match std::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&marker)
            {
                Ok(_) => {
                    let _ = std::fs::remove_file(&marker);
                    return Ok(path);
                }
                Err(_) => continue,
            }
        }
        if std::fs::create_dir_all(&path).is_ok() {
            return Ok(path);
        }
    }
    Err(Error::configuration(
        "Failed to determine a writable registry home directory",
    ))
}
