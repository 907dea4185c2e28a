//! REST API client module for the restaurant collection server.
//!
//! This module provides the `RemoteCollection` trait the coordinator
//! talks to, and `ApiClient`, its HTTP/JSON implementation.

pub mod client;
pub mod error;
pub mod remote;

pub use client::ApiClient;
pub use error::ApiError;
pub use remote::RemoteCollection;
