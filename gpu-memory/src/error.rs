//! Memory layer error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::types::{DescriptorSpaceKind, Residency, ResourceDimension, ViewDimension, ViewKind};

/// Errors returned by the memory manager and the descriptor manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The backend failed to create a resource, heap or view.
    #[error("failed to create '{label}': {source}")]
    BackendCreationFailed {
        label: String,
        #[source]
        source: BackendError,
    },

    /// A CPU access was attempted on memory the CPU cannot map.
    #[error("'{label}' has {residency:?} residency and cannot be mapped")]
    InvalidResidency { label: String, residency: Residency },

    /// A byte range exceeds the resource's declared size.
    #[error("{size} bytes at offset {offset} exceed the limit of {limit} bytes")]
    OutOfBounds { offset: u64, size: u64, limit: u64 },

    /// A descriptor space has no free slot left.
    #[error("descriptor space '{space}' exhausted (capacity {capacity})")]
    SlotSpaceExhausted {
        space: DescriptorSpaceKind,
        capacity: u32,
    },

    /// A view kind does not fit the resource's dimension or usage.
    #[error("{kind} view with {dimension:?} dimension is unsupported: {reason}")]
    UnsupportedViewKindForDimension {
        kind: ViewKind,
        dimension: ViewDimension,
        reason: String,
    },

    /// The backend could not map a resource.
    #[error("map failed: {0}")]
    MapFailed(#[source] BackendError),

    /// A description is malformed.
    #[error("invalid description: {0}")]
    InvalidDescription(String),

    /// The allocation was already released through the manager.
    #[error("'{label}' was already released")]
    AllocationReleased { label: String },
}

impl MemoryError {
    pub(crate) fn backend(label: &str, source: BackendError) -> Self {
        Self::BackendCreationFailed {
            label: label.to_string(),
            source,
        }
    }

    pub(crate) fn unsupported(
        kind: ViewKind,
        dimension: ViewDimension,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedViewKindForDimension {
            kind,
            dimension,
            reason: reason.into(),
        }
    }

    pub(crate) fn wrong_dimension(expected: &str, got: ResourceDimension) -> Self {
        Self::InvalidDescription(format!("expected a {expected} description, got {got:?}"))
    }
}

/// Result alias for memory layer operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
