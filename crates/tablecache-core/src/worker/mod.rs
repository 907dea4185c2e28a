//! Offline asset worker.
//!
//! `AssetWorker` sits between the host and the network for static assets.
//! `install` pre-caches the manifest; `handle_fetch` answers manifest
//! requests from the cache when offline and refreshes the cache from the
//! network otherwise. Anything outside the manifest passes straight
//! through.

pub mod asset_cache;
pub mod manifest;

use std::future::Future;

use futures::future::try_join_all;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::config::Config;
use crate::network::NetworkStatus;
pub use asset_cache::{AssetCache, STATIC_CACHE_NAME};
pub use manifest::AssetManifest;

/// Raw network access for static assets.
pub trait AssetFetcher: Clone + Send + Sync + 'static {
    /// GET `url`. Any HTTP status is a response; only transport failures
    /// are errors.
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<AssetResponse, ApiError>> + Send;
}

/// A fetched or cached asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl AssetResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Network error: {0}")]
    Network(#[from] ApiError),

    #[error("Asset cache error: {0}")]
    Cache(String),
}

impl WorkerError {
    fn cache(err: anyhow::Error) -> Self {
        WorkerError::Cache(format!("{:#}", err))
    }
}

pub struct AssetWorker<F> {
    manifest: AssetManifest,
    cache: AssetCache,
    fetcher: F,
    network: NetworkStatus,
}

impl<F: AssetFetcher> AssetWorker<F> {
    pub fn new(manifest: AssetManifest, cache: AssetCache, fetcher: F, network: NetworkStatus) -> Self {
        Self {
            manifest,
            cache,
            fetcher,
            network,
        }
    }

    /// Build a worker from configuration, with its cache under
    /// `<cache_dir>/assets/mws-static`.
    pub fn from_config(config: &Config, fetcher: F, network: NetworkStatus) -> Result<Self, WorkerError> {
        let manifest = AssetManifest::new(&config.asset_origin, &config.assets)?;
        let root = config.cache_dir().map_err(WorkerError::cache)?.join("assets");
        let cache = AssetCache::open(&root, STATIC_CACHE_NAME).map_err(WorkerError::cache)?;
        Ok(Self::new(manifest, cache, fetcher, network))
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Fetch every manifest entry and store them all. Nothing is stored
    /// unless every fetch succeeds.
    pub async fn install(&self) -> Result<usize, WorkerError> {
        let urls = self.manifest.install_urls()?;
        let responses = try_join_all(urls.iter().map(|url| self.fetch_for_install(url))).await?;

        let entries: Vec<(Url, AssetResponse)> = urls.into_iter().zip(responses).collect();
        self.cache.put_all(&entries).await.map_err(WorkerError::cache)?;

        info!(count = entries.len(), cache = STATIC_CACHE_NAME, "Installed static assets");
        Ok(entries.len())
    }

    async fn fetch_for_install(&self, url: &Url) -> Result<AssetResponse, WorkerError> {
        let response = self.fetcher.fetch(url).await?;
        if !response.is_success() {
            let status = reqwest::StatusCode::from_u16(response.status)
                .unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            let body = String::from_utf8_lossy(&response.body);
            return Err(ApiError::from_status(status, &body).into());
        }
        Ok(response)
    }

    /// Answer a request for `url`.
    pub async fn handle_fetch(&self, url: &Url) -> Result<AssetResponse, WorkerError> {
        if !self.manifest.matches(url) {
            debug!(url = %url, "Not a static asset, passing through");
            return Ok(self.fetcher.fetch(url).await?);
        }

        let cached = match self.cache.match_url(url).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read asset cache");
                None
            }
        };

        if let Some(hit) = &cached {
            if !self.network.is_online() {
                debug!(url = %url, "Offline, serving cached asset");
                return Ok(hit.clone());
            }
        }

        match self.fetcher.fetch(url).await {
            Ok(response) => {
                if response.is_success() {
                    if let Err(e) = self.cache.put(url, &response).await {
                        warn!(url = %url, error = %e, "Failed to store asset");
                    }
                }
                Ok(response)
            }
            Err(e) => match cached {
                Some(hit) => {
                    warn!(url = %url, error = %e, "Network failed, serving cached asset");
                    Ok(hit)
                }
                None => Err(e.into()),
            },
        }
    }

    /// Resolve `target` against the asset origin and handle it.
    pub async fn handle_path(&self, target: &str) -> Result<AssetResponse, WorkerError> {
        let url = self.manifest.resolve(target)?;
        self.handle_fetch(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct FakeFetcher {
        bodies: Arc<Mutex<HashMap<String, (u16, String)>>>,
        failing: Arc<Mutex<bool>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeFetcher {
        fn serve(&self, url: &str, status: u16, body: &str) {
            self.bodies
                .lock()
                .unwrap()
                .insert(url.to_string(), (status, body.to_string()));
        }

        fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AssetFetcher for FakeFetcher {
        async fn fetch(&self, url: &Url) -> Result<AssetResponse, ApiError> {
            self.calls.lock().unwrap().push(url.to_string());
            if *self.failing.lock().unwrap() {
                return Err(ApiError::ServerError("connection refused".to_string()));
            }
            let (status, body) = self
                .bodies
                .lock()
                .unwrap()
                .get(url.as_str())
                .cloned()
                .unwrap_or((404, "missing".to_string()));
            Ok(AssetResponse {
                status,
                content_type: Some("text/plain".to_string()),
                body: body.into_bytes(),
            })
        }
    }

    const ORIGIN: &str = "http://localhost:8000";

    fn worker(fetcher: &FakeFetcher, network: &NetworkStatus) -> (AssetWorker<FakeFetcher>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let manifest =
            AssetManifest::new(ORIGIN, &["/index.html".to_string(), "/css/".to_string()]).unwrap();
        let cache = AssetCache::open(dir.path(), STATIC_CACHE_NAME).unwrap();
        (
            AssetWorker::new(manifest, cache, fetcher.clone(), network.clone()),
            dir,
        )
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn serve_site(fetcher: &FakeFetcher) {
        fetcher.serve("http://localhost:8000/index.html", 200, "<index>");
        fetcher.serve("http://localhost:8000/css/", 200, "/* listing */");
        fetcher.serve("http://localhost:8000/", 200, "<root>");
    }

    #[tokio::test]
    async fn test_install_caches_manifest_and_root() {
        let fetcher = FakeFetcher::default();
        serve_site(&fetcher);
        let (worker, _dir) = worker(&fetcher, &NetworkStatus::online());

        assert_eq!(worker.install().await.unwrap(), 3);
        assert_eq!(worker.cache().len().await, 3);
        let root = worker.cache().match_url(&url("http://localhost:8000/")).await.unwrap();
        assert_eq!(root.unwrap().body, b"<root>");
    }

    #[tokio::test]
    async fn test_install_fails_if_any_entry_fails() {
        let fetcher = FakeFetcher::default();
        fetcher.serve("http://localhost:8000/index.html", 200, "<index>");
        fetcher.serve("http://localhost:8000/", 200, "<root>");
        let (worker, _dir) = worker(&fetcher, &NetworkStatus::online());

        assert!(matches!(
            worker.install().await,
            Err(WorkerError::Network(ApiError::NotFound(_)))
        ));
        assert_eq!(worker.cache().len().await, 0);
    }

    #[tokio::test]
    async fn test_offline_hit_returns_cached_bytes_unchanged() {
        let fetcher = FakeFetcher::default();
        let network = NetworkStatus::online();
        let (worker, _dir) = worker(&fetcher, &network);
        let css = url("http://localhost:8000/css/styles.css");
        let stored = AssetResponse {
            status: 200,
            content_type: Some("text/css".to_string()),
            body: vec![0xde, 0xad, 0xbe, 0xef],
        };
        worker.cache().put(&css, &stored).await.unwrap();
        network.set_online(false);

        let served = worker.handle_fetch(&css).await.unwrap();
        assert_eq!(served, stored);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_online_refreshes_cache() {
        let fetcher = FakeFetcher::default();
        fetcher.serve("http://localhost:8000/css/styles.css", 200, "fresh");
        let (worker, _dir) = worker(&fetcher, &NetworkStatus::online());
        let css = url("http://localhost:8000/css/styles.css");
        worker
            .cache()
            .put(
                &css,
                &AssetResponse {
                    status: 200,
                    content_type: None,
                    body: b"stale".to_vec(),
                },
            )
            .await
            .unwrap();

        assert_eq!(worker.handle_fetch(&css).await.unwrap().body, b"fresh");
        let cached = worker.cache().match_url(&css).await.unwrap().unwrap();
        assert_eq!(cached.body, b"fresh");
    }

    #[tokio::test]
    async fn test_non_manifest_request_bypasses_cache() {
        let fetcher = FakeFetcher::default();
        fetcher.serve("http://localhost:8000/restaurant.html?id=1", 200, "<page>");
        let (worker, _dir) = worker(&fetcher, &NetworkStatus::online());

        let response = worker
            .handle_fetch(&url("http://localhost:8000/restaurant.html?id=1"))
            .await
            .unwrap();
        assert_eq!(response.body, b"<page>");
        assert_eq!(worker.cache().len().await, 0);
    }

    #[tokio::test]
    async fn test_non_manifest_request_ignores_cached_copy_offline() {
        let fetcher = FakeFetcher::default();
        let network = NetworkStatus::online();
        let page = url("http://localhost:8000/restaurant.html?id=1");
        fetcher.serve(page.as_str(), 200, "<live page>");
        let (worker, _dir) = worker(&fetcher, &network);
        worker
            .cache()
            .put(
                &page,
                &AssetResponse {
                    status: 200,
                    content_type: None,
                    body: b"<stale page>".to_vec(),
                },
            )
            .await
            .unwrap();
        network.set_online(false);

        let response = worker.handle_fetch(&page).await.unwrap();
        assert_eq!(response.body, b"<live page>");
        assert_eq!(fetcher.calls(), vec![page.to_string()]);

        fetcher.set_failing(true);
        assert!(matches!(
            worker.handle_fetch(&page).await,
            Err(WorkerError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_error_responses_are_not_cached() {
        let fetcher = FakeFetcher::default();
        let (worker, _dir) = worker(&fetcher, &NetworkStatus::online());
        let missing = url("http://localhost:8000/css/missing.css");

        assert_eq!(worker.handle_fetch(&missing).await.unwrap().status, 404);
        assert_eq!(worker.cache().len().await, 0);
    }

    #[tokio::test]
    async fn test_network_failure_falls_back_to_cache() {
        let fetcher = FakeFetcher::default();
        serve_site(&fetcher);
        let (worker, _dir) = worker(&fetcher, &NetworkStatus::online());
        worker.install().await.unwrap();
        fetcher.set_failing(true);

        let index = worker.handle_path("/index.html").await.unwrap();
        assert_eq!(index.body, b"<index>");

        assert!(matches!(
            worker.handle_path("/css/uncached.css").await,
            Err(WorkerError::Network(_))
        ));
    }
}
