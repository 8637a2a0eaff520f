/// Backend seams: where bytes come from and how they become handles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::handle::AudioHandle;
use crate::error::AudioError;

/// Fetches raw asset bytes for a locator.
///
/// Called from preload worker threads, hence `Send + Sync`.
pub trait AssetSource: Send + Sync + 'static {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, AudioError>;
}

/// Creates playable handles from locators
pub trait AudioBackend {
    /// Asset source used for lazy opens and cue preloading
    fn assets(&self) -> Arc<dyn AssetSource>;

    /// Turn fetched bytes into a paused handle
    fn decode(&self, locator: &str, data: Arc<Vec<u8>>) -> Result<Box<dyn AudioHandle>, AudioError>;

    /// Fetch and decode in one step
    fn open(&self, locator: &str) -> Result<Box<dyn AudioHandle>, AudioError> {
        let data = self.assets().fetch(locator)?;
        tracing::debug!("Fetched {} ({} bytes)", locator, data.len());
        self.decode(locator, Arc::new(data))
    }
}

/// Resolves site-style locators (`/sounds/click-01.wav`) under a root directory
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    root: PathBuf,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, locator: &str) -> PathBuf {
        self.root.join(locator.trim_start_matches('/'))
    }
}

impl AssetSource for FileAssetSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, AudioError> {
        let path = self.resolve(locator);
        std::fs::read(&path).map_err(|e| AudioError::LoadFailed {
            locator: locator.to_string(),
            source: Box::new(e),
        })
    }
}
