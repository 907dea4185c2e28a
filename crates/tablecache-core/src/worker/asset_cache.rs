use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::AssetResponse;
use crate::cache::store::write_atomic;
use crate::cache::CachedData;

/// Cache name shared by every asset the worker stores.
pub const STATIC_CACHE_NAME: &str = "mws-static";

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    file: String,
    status: u16,
    content_type: Option<String>,
}

type Index = BTreeMap<String, CachedData<EntryMeta>>;

/// Durable URL -> response cache, stored as an index plus one body file
/// per entry.
#[derive(Debug)]
pub struct AssetCache {
    dir: PathBuf,
    index: RwLock<Index>,
}

impl AssetCache {
    /// Open the named cache under `root`, creating it if absent.
    pub fn open(root: &Path, name: &str) -> Result<Self> {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create asset cache {}", dir.display()))?;

        let index_path = dir.join(INDEX_FILE);
        let index: Index = if index_path.exists() {
            let contents = std::fs::read_to_string(&index_path)
                .context("Failed to read asset cache index")?;
            serde_json::from_str(&contents).context("Failed to parse asset cache index")?
        } else {
            BTreeMap::new()
        };
        debug!(cache = name, entries = index.len(), "Opened asset cache");

        Ok(Self {
            dir,
            index: RwLock::new(index),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The stored response for `url`, if any.
    pub async fn match_url(&self, url: &Url) -> Result<Option<AssetResponse>> {
        let index = self.index.read().await;
        let Some(entry) = index.get(url.as_str()) else {
            return Ok(None);
        };
        let body = std::fs::read(self.dir.join(&entry.data.file))
            .with_context(|| format!("Failed to read cached body for {}", url))?;

        Ok(Some(AssetResponse {
            status: entry.data.status,
            content_type: entry.data.content_type.clone(),
            body,
        }))
    }

    /// Store `response` for `url`, replacing any previous entry.
    pub async fn put(&self, url: &Url, response: &AssetResponse) -> Result<()> {
        let mut index = self.index.write().await;
        self.write_entry(&mut index, url, response)?;
        self.persist(&index)
    }

    /// Put several entries under one index write.
    pub async fn put_all(&self, entries: &[(Url, AssetResponse)]) -> Result<()> {
        let mut index = self.index.write().await;
        for (url, response) in entries {
            self.write_entry(&mut index, url, response)?;
        }
        self.persist(&index)
    }

    /// Cached URLs with how long ago each was stored.
    pub async fn entries(&self) -> Vec<(String, String)> {
        self.index
            .read()
            .await
            .iter()
            .map(|(url, entry)| (url.clone(), entry.age_display()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn clear(&self) -> Result<()> {
        let mut index = self.index.write().await;
        for entry in index.values() {
            let path = self.dir.join(&entry.data.file);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        index.clear();
        self.persist(&index)
    }

    fn write_entry(&self, index: &mut Index, url: &Url, response: &AssetResponse) -> Result<()> {
        let file = match index.get(url.as_str()) {
            Some(existing) => existing.data.file.clone(),
            None => next_file_name(index),
        };
        write_atomic(&self.dir.join(&file), &response.body)
            .with_context(|| format!("Failed to write cached body for {}", url))?;

        index.insert(
            url.to_string(),
            CachedData::new(EntryMeta {
                file,
                status: response.status,
                content_type: response.content_type.clone(),
            }),
        );
        Ok(())
    }

    fn persist(&self, index: &Index) -> Result<()> {
        write_atomic(&self.dir.join(INDEX_FILE), &serde_json::to_string_pretty(index)?)
    }
}

fn next_file_name(index: &Index) -> String {
    let next = index
        .values()
        .filter_map(|e| e.data.file.strip_suffix(".body")?.parse::<u64>().ok())
        .max()
        .map_or(0, |n| n + 1);
    format!("{}.body", next)
}
