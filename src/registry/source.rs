//! Device list sources
//!
//! [`FileSource`] re-reads the devices file on every call. [`CachedSource`] is
//! the opt-in alternative: it keeps the last parsed list for a bounded TTL and
//! drops it as soon as the file's modification time changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use mini_moka::sync::Cache;

use super::{DuplicatePolicy, Registry};
use crate::Result;

/// Where the device list comes from
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// Load the current device list
    async fn load(&self) -> Result<Arc<Registry>>;

    /// Description for logs
    fn describe(&self) -> String;
}

/// Always-fresh JSON file source
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    policy: DuplicatePolicy,
}

impl FileSource {
    /// Create a source reading `path`
    pub fn new(path: impl Into<PathBuf>, policy: DuplicatePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    /// Path of the devices file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeviceSource for FileSource {
    async fn load(&self) -> Result<Arc<Registry>> {
        let path = self.path.display();
        let bytes = tokio::fs::read(&self.path).await.inspect_err(|e| {
            tracing::warn!(path = %path, error = %e, "failed to read devices file");
        })?;

        let registry = Registry::parse(&bytes, self.policy).inspect_err(|e| {
            tracing::warn!(path = %path, error = %e, "failed to load devices file");
        })?;

        tracing::debug!(path = %path, devices = registry.len(), "loaded devices");
        Ok(Arc::new(registry))
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[derive(Clone)]
struct CachedRegistry {
    modified: SystemTime,
    registry: Arc<Registry>,
}

/// File source with a TTL cache invalidated on modification time
pub struct CachedSource {
    inner: FileSource,
    ttl: Duration,
    cache: Cache<PathBuf, CachedRegistry>,
}

impl CachedSource {
    /// Wrap `inner`, caching each parse for at most `ttl`
    #[must_use]
    pub fn new(inner: FileSource, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { inner, ttl, cache }
    }
}

#[async_trait]
impl DeviceSource for CachedSource {
    async fn load(&self) -> Result<Arc<Registry>> {
        let path = self.inner.path().to_path_buf();

        // stat on every call so a rewritten file is never served stale
        let metadata = tokio::fs::metadata(&path).await;
        let modified = match metadata.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                self.cache.invalidate(&path);
                tracing::warn!(path = %path.display(), error = %e, "failed to stat devices file");
                return Err(e.into());
            }
        };

        if let Some(cached) = self.cache.get(&path) {
            if cached.modified == modified {
                return Ok(cached.registry);
            }
            tracing::debug!(path = %path.display(), "devices file changed, reloading");
        }

        let registry = self.inner.load().await?;
        self.cache.insert(
            path,
            CachedRegistry {
                modified,
                registry: Arc::clone(&registry),
            },
        );
        Ok(registry)
    }

    fn describe(&self) -> String {
        format!("{} (cached {}s)", self.inner.describe(), self.ttl.as_secs())
    }
}
