//! Backend error types.

use thiserror::Error;

/// Errors reported by a [`BackendBinding`](super::BackendBinding).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend initialization failed: {0}")]
    InitializationFailed(String),
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    #[error("view creation failed: {0}")]
    ViewCreationFailed(String),
    #[error("mapping failed: {0}")]
    MapFailed(String),
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    #[error("internal backend error: {0}")]
    Internal(String),
}

pub type BackendResult<T> = Result<T, BackendError>;
