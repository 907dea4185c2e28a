//! Application configuration management.
//!
//! Configuration holds the restaurant API address, the asset manifest
//! served by the asset worker, and where the local cache lives.
//!
//! Configuration is stored at `~/.config/tablecache/config.json`.
//! Environment variables (optionally from a `.env` file) override it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "tablecache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Development server the restaurant data is served from by default.
const DEFAULT_API_BASE_URL: &str = "http://localhost:1337";

/// Origin the site's static assets are served from by default.
const DEFAULT_ASSET_ORIGIN: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "TABLECACHE_API_URL";
pub const ENV_CACHE_DIR: &str = "TABLECACHE_CACHE_DIR";
pub const ENV_OFFLINE: &str = "TABLECACHE_OFFLINE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub asset_origin: String,
    /// Asset paths pre-cached at install time and served by the asset worker.
    pub assets: Vec<String>,
    pub cache_enabled: bool,
    pub cache_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub start_offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            asset_origin: DEFAULT_ASSET_ORIGIN.to_string(),
            assets: vec![
                "/index.html".to_string(),
                "/restaurant.html".to_string(),
                "/css/".to_string(),
                "/js/".to_string(),
                "/img/".to_string(),
            ],
            cache_enabled: true,
            cache_dir: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_dir: None,
            start_offline: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = lookup(ENV_OFFLINE) {
            self.start_offline = matches!(flag.trim(), "1" | "true" | "yes");
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_base_url": "http://api.test"}"#).unwrap();
        assert_eq!(config.api_base_url, "http://api.test");
        assert!(config.cache_enabled);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(!config.assets.is_empty());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "http://10.0.0.2:1337"),
            (ENV_CACHE_DIR, "/tmp/tc"),
            (ENV_OFFLINE, "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "http://10.0.0.2:1337");
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/tc"));
        assert!(config.start_offline);
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == ENV_API_URL).then(String::new));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }
}
