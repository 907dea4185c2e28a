//! Local caching module for offline data access.
//!
//! `LocalStore` keeps restaurants and reviews in two partitions, one JSON
//! file each, keyed by record id. Every access runs in a read-only or
//! read-write transaction scoped to a single partition.
//!
//! The cache is advisory: `CacheMode::detect` returns `CacheLess` when no
//! store can be opened and callers fall back to the remote collection.

pub mod mode;
pub mod store;

pub use mode::CacheMode;
pub use store::{
    CachedData, LocalStore, Partition, Record, Transaction, TransactionMode, SCHEMA_VERSION,
};
