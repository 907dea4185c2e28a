use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Marker file recording the schema version of a store directory.
const SCHEMA_FILE: &str = "schema.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Named object stores inside a [`LocalStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Restaurants,
    Reviews,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Restaurants, Partition::Reviews];

    pub fn name(&self) -> &'static str {
        match self {
            Partition::Restaurants => "restaurants",
            Partition::Reviews => "reviews",
        }
    }

    fn index(&self) -> usize {
        match self {
            Partition::Restaurants => 0,
            Partition::Reviews => 1,
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An entity stored in a partition, keyed by its integer id.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const PARTITION: Partition;

    fn id(&self) -> i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaMarker {
    version: u32,
    partitions: Vec<String>,
}

struct StoreInner {
    dir: PathBuf,
    locks: [RwLock<()>; 2],
}

/// File-backed key-value store with one JSON file per partition.
/// Clone is cheap - handles share the directory and partition locks.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("dir", &self.inner.dir)
            .finish()
    }
}

impl LocalStore {
    /// Open the store in `dir`, creating the directory and partitions if absent.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

        let marker_path = dir.join(SCHEMA_FILE);
        if marker_path.exists() {
            let contents = std::fs::read_to_string(&marker_path)
                .context("Failed to read cache schema marker")?;
            let marker: SchemaMarker = serde_json::from_str(&contents)
                .context("Failed to parse cache schema marker")?;
            if marker.version > SCHEMA_VERSION {
                bail!(
                    "Cache schema version {} is newer than supported version {}",
                    marker.version,
                    SCHEMA_VERSION
                );
            }
        } else {
            let marker = SchemaMarker {
                version: SCHEMA_VERSION,
                partitions: Partition::ALL.iter().map(|p| p.name().to_string()).collect(),
            };
            write_atomic(&marker_path, &serde_json::to_string_pretty(&marker)?)?;
        }

        for partition in Partition::ALL {
            let path = partition_path(&dir, partition);
            if !path.exists() {
                debug!(partition = %partition, "Creating cache partition");
                let empty: CachedData<BTreeMap<i64, serde_json::Value>> =
                    CachedData::new(BTreeMap::new());
                write_atomic(&path, &serde_json::to_string_pretty(&empty)?)?;
            }
        }

        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                locks: [RwLock::new(()), RwLock::new(())],
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Begin a transaction scoped to the partition of `T`.
    pub async fn transaction<T: Record>(&self, mode: TransactionMode) -> Result<Transaction<'_, T>> {
        let lock = &self.inner.locks[T::PARTITION.index()];
        let guard = match mode {
            TransactionMode::ReadOnly => TxGuard::Read(lock.read().await),
            TransactionMode::ReadWrite => TxGuard::Write(lock.write().await),
        };
        let path = partition_path(&self.inner.dir, T::PARTITION);
        let records = match (load_partition::<T>(&path), mode) {
            (Ok(records), _) => records,
            // Commit rewrites the whole file, so the writer rebuilds it from empty.
            (Err(e), TransactionMode::ReadWrite) => {
                warn!(partition = %T::PARTITION, error = %e, "Discarding unreadable cache partition");
                BTreeMap::new()
            }
            (Err(e), TransactionMode::ReadOnly) => return Err(e),
        };

        Ok(Transaction {
            _guard: guard,
            path,
            mode,
            records,
            dirty: false,
        })
    }

    /// All records in key order. An empty partition is an empty vec.
    pub async fn get_all<T: Record>(&self) -> Result<Vec<T>> {
        let tx = self.transaction::<T>(TransactionMode::ReadOnly).await?;
        Ok(tx.get_all())
    }

    pub async fn get<T: Record>(&self, id: i64) -> Result<Option<T>> {
        let tx = self.transaction::<T>(TransactionMode::ReadOnly).await?;
        Ok(tx.get(id).cloned())
    }

    /// Insert or replace a record.
    pub async fn put<T: Record>(&self, record: &T) -> Result<()> {
        let mut tx = self.transaction::<T>(TransactionMode::ReadWrite).await?;
        tx.put(record.clone())?;
        tx.commit()
    }

    /// Insert or replace several records in one transaction.
    pub async fn put_all<T: Record>(&self, records: &[T]) -> Result<()> {
        let mut tx = self.transaction::<T>(TransactionMode::ReadWrite).await?;
        for record in records {
            tx.put(record.clone())?;
        }
        tx.commit()
    }

    /// Remove a record. Returns whether it was present.
    pub async fn delete<T: Record>(&self, id: i64) -> Result<bool> {
        let mut tx = self.transaction::<T>(TransactionMode::ReadWrite).await?;
        let removed = tx.delete(id)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Human-readable age of the last write to a partition.
    pub fn cache_age(&self, partition: Partition) -> Result<String> {
        let path = partition_path(&self.inner.dir, partition);
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache partition: {}", partition))?;
        let cached: CachedData<serde_json::Value> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache partition: {}", partition))?;
        Ok(cached.age_display())
    }

    /// Empty every partition. The schema marker is kept.
    pub async fn clear(&self) -> Result<()> {
        for partition in Partition::ALL {
            let _guard = self.inner.locks[partition.index()].write().await;
            let empty: CachedData<BTreeMap<i64, serde_json::Value>> =
                CachedData::new(BTreeMap::new());
            write_atomic(
                &partition_path(&self.inner.dir, partition),
                &serde_json::to_string_pretty(&empty)?,
            )?;
        }
        Ok(())
    }
}

// Held only to keep the partition locked for the transaction's lifetime.
#[allow(dead_code)]
enum TxGuard<'a> {
    Read(RwLockReadGuard<'a, ()>),
    Write(RwLockWriteGuard<'a, ()>),
}

/// A view of one partition. Read-write transactions are written back on
/// [`commit`](Transaction::commit); dropping without committing discards changes.
pub struct Transaction<'a, T: Record> {
    _guard: TxGuard<'a>,
    path: PathBuf,
    mode: TransactionMode,
    records: BTreeMap<i64, T>,
    dirty: bool,
}

impl<T: Record> Transaction<'_, T> {
    pub fn get_all(&self) -> Vec<T> {
        self.records.values().cloned().collect()
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.records.get(&id)
    }

    pub fn max_id(&self) -> Option<i64> {
        self.records.keys().next_back().copied()
    }

    pub fn put(&mut self, record: T) -> Result<()> {
        self.ensure_writable()?;
        self.records.insert(record.id(), record);
        self.dirty = true;
        Ok(())
    }

    pub fn delete(&mut self, id: i64) -> Result<bool> {
        self.ensure_writable()?;
        let removed = self.records.remove(&id).is_some();
        self.dirty |= removed;
        Ok(removed)
    }

    pub fn commit(self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let cached = CachedData::new(&self.records);
        let contents = serde_json::to_string_pretty(&cached)?;
        write_atomic(&self.path, &contents)
            .with_context(|| format!("Failed to commit cache partition: {}", T::PARTITION))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.mode == TransactionMode::ReadOnly {
            bail!("Write attempted in read-only transaction on {}", T::PARTITION);
        }
        Ok(())
    }
}

fn partition_path(dir: &Path, partition: Partition) -> PathBuf {
    dir.join(format!("{}.json", partition.name()))
}

fn load_partition<T: Record>(path: &Path) -> Result<BTreeMap<i64, T>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache partition: {}", T::PARTITION))?;
    let cached: CachedData<BTreeMap<i64, T>> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse cache partition: {}", T::PARTITION))?;
    Ok(cached.data)
}

/// Write through a temp file and rename so readers never see a torn file.
pub(crate) fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
