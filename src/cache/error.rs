use thiserror::Error;

use super::key::KeyError;
use crate::storage::StoreError;

/// Errors surfaced by a cached operation
///
/// A save that finds the key already present is not an error.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("invalid cache key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("cache {operation} failed")]
    StoreUnavailable {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("cached operation failed")]
    ComputeFailed(#[source] anyhow::Error),
}

impl CacheError {
    pub(crate) fn restore(source: StoreError) -> Self {
        CacheError::StoreUnavailable {
            operation: "restore",
            source,
        }
    }

    pub(crate) fn save(source: StoreError) -> Self {
        CacheError::StoreUnavailable {
            operation: "save",
            source,
        }
    }
}
