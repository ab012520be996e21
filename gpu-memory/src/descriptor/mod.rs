//! Descriptors and the spaces they are carved from.
//!
//! A [`Descriptor`] is an immutable view of an [`Allocation`]: the view
//! description plus the slot the backend wrote it into. The
//! [`DescriptorManager`] owns one [`DescriptorSpace`] per space kind and a
//! [`DescriptorCache`] that deduplicates identical requests.

mod cache;
mod manager;
mod space;
mod validate;

use std::sync::Arc;

pub use cache::DescriptorCache;
pub use manager::DescriptorManager;
pub use space::{DescriptorSpace, SpaceState};
pub use validate::validate_view;

use crate::backend::{CpuHandle, DescriptorSlot, GpuHandle};
use crate::resources::Allocation;
use crate::types::{SamplerDescription, ViewDescription, ViewKind};

/// A typed view of an allocation.
///
/// Holds a reference to its allocation, so the resource stays alive for as
/// long as any descriptor views it.
#[derive(Clone)]
pub struct Descriptor {
    allocation: Arc<Allocation>,
    view: ViewDescription,
    slot: DescriptorSlot,
}

impl Descriptor {
    pub(crate) fn new(
        allocation: Arc<Allocation>,
        view: ViewDescription,
        slot: DescriptorSlot,
    ) -> Self {
        Self {
            allocation,
            view,
            slot,
        }
    }

    /// The viewed allocation.
    pub fn allocation(&self) -> &Arc<Allocation> {
        &self.allocation
    }

    pub fn view(&self) -> &ViewDescription {
        &self.view
    }

    pub fn kind(&self) -> ViewKind {
        self.view.kind
    }

    /// Slot identity. Equal for deduplicated requests.
    pub fn slot(&self) -> &DescriptorSlot {
        &self.slot
    }

    pub fn cpu_handle(&self) -> CpuHandle {
        self.slot.cpu
    }

    /// Shader-visible handle, absent for render target and depth-stencil views.
    pub fn gpu_handle(&self) -> Option<GpuHandle> {
        self.slot.gpu
    }
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("resource", &self.allocation.resource_id())
            .field("kind", &self.view.kind)
            .field("space", &self.slot.space)
            .field("index", &self.slot.index)
            .finish()
    }
}

/// A sampler written into the sampler space.
#[derive(Debug, Clone)]
pub struct SamplerDescriptor {
    description: SamplerDescription,
    slot: DescriptorSlot,
}

impl SamplerDescriptor {
    pub fn description(&self) -> &SamplerDescription {
        &self.description
    }

    pub fn slot(&self) -> &DescriptorSlot {
        &self.slot
    }

    pub fn cpu_handle(&self) -> CpuHandle {
        self.slot.cpu
    }

    pub fn gpu_handle(&self) -> Option<GpuHandle> {
        self.slot.gpu
    }
}

static_assertions::assert_impl_all!(Descriptor: Send, Sync);
