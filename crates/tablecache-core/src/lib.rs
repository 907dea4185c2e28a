//! tablecache core - offline-first data access for a restaurant directory.
//!
//! This crate holds everything except the command-line frontend:
//! the remote API client, the local cache store, the data access
//! coordinator that ties them together, and the asset worker that keeps
//! the site's static files available offline.

pub mod api;
pub mod cache;
pub mod config;
pub mod db_helper;
pub mod error;
pub mod models;
pub mod network;
pub mod worker;

pub use api::{ApiClient, ApiError, RemoteCollection};
pub use cache::{CacheMode, LocalStore};
pub use config::Config;
pub use db_helper::DbHelper;
pub use error::{DataError, DataResult};
pub use network::NetworkStatus;
pub use worker::{AssetFetcher, AssetResponse, AssetWorker, WorkerError};
