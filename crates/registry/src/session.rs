//! Per-process registry context.

use crate::config::RegistryConfig;
use crate::fs::{LocalFileSystem, RegistryFileSystem};
use crate::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context threaded through every registry operation: configuration, the
/// filesystem/network collaborator, and cancellation.
#[derive(Debug, Clone)]
pub struct Session {
    config: Arc<RegistryConfig>,
    fs: Arc<dyn RegistryFileSystem>,
    cancel: CancellationToken,
}

impl Session {
    /// A session backed by the local disk and HTTP(S).
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let fs = LocalFileSystem::new()?;
        Self::with_file_system(config, Arc::new(fs))
    }

    /// A session using a custom filesystem collaborator.
    pub fn with_file_system(
        config: RegistryConfig,
        fs: Arc<dyn RegistryFileSystem>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            fs,
            cancel: CancellationToken::new(),
        })
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Filesystem and network collaborator
    #[must_use]
    pub fn fs(&self) -> &dyn RegistryFileSystem {
        self.fs.as_ref()
    }

    /// Token observed by long-running operations
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cancellation of in-flight operations.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self, operation: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled(operation));
        }
        Ok(())
    }

    /// A session sharing configuration and filesystem whose token is a child
    /// of this one: cancelling the parent cancels the child, not vice versa.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            fs: Arc::clone(&self.fs),
            cancel: self.cancel.child_token(),
        }
    }
}
