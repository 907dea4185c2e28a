use tracing::{info, warn};

use super::LocalStore;
use crate::config::Config;

/// Whether a persistent local cache is available on this host.
#[derive(Debug, Clone)]
pub enum CacheMode {
    WithCache(LocalStore),
    CacheLess,
}

impl CacheMode {
    /// Look for a usable cache directory. Any failure falls back to
    /// [`CacheMode::CacheLess`]; the cache is never required.
    pub fn detect(config: &Config) -> Self {
        if !config.cache_enabled {
            info!("Local cache disabled by configuration");
            return CacheMode::CacheLess;
        }

        let dir = match config.cache_dir() {
            Ok(dir) => dir.join("db"),
            Err(e) => {
                warn!(error = %e, "No cache directory available, running without local cache");
                return CacheMode::CacheLess;
            }
        };

        match LocalStore::open(&dir) {
            Ok(store) => CacheMode::WithCache(store),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to open local cache, running without it");
                CacheMode::CacheLess
            }
        }
    }

    pub fn store(&self) -> Option<&LocalStore> {
        match self {
            CacheMode::WithCache(store) => Some(store),
            CacheMode::CacheLess => None,
        }
    }
}
