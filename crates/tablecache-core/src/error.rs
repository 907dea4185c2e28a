use std::sync::Arc;

use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by [`DbHelper`](crate::DbHelper) operations.
///
/// Cloneable so that every caller coalesced onto one in-flight fetch
/// receives the same failure.
#[derive(Error, Debug, Clone)]
pub enum DataError {
    #[error("Transport failure: {0}")]
    Transport(#[source] Arc<ApiError>),

    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("Invalid id: {0:?}")]
    InvalidId(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<ApiError> for DataError {
    fn from(err: ApiError) -> Self {
        DataError::Transport(Arc::new(err))
    }
}

impl DataError {
    /// Whether this error came from the remote side rather than the request itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, DataError::Transport(_))
    }
}

pub type DataResult<T> = std::result::Result<T, DataError>;
