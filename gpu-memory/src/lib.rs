//! # RedLilium GPU Memory
//!
//! GPU resource and descriptor allocation for the RedLilium renderer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`MemoryManager`] - Façade that allocates buffers and textures, uploads
//!   and downloads CPU-visible memory, and releases allocations
//! - [`DescriptorManager`] - Typed views carved from four fixed-capacity
//!   descriptor spaces, deduplicated per resource
//! - [`TempBufferPool`] - Frame-cooldown recycling of staging buffers
//! - [`BackendBinding`] - Trait for native backends: Vulkan, wgpu, and Dummy
//!   (for testing)
//!
//! ## Example
//!
//! ```
//! use redlilium_gpu_memory::{
//!     BackendType, MemoryConfig, MemoryManager, ResourceDescription, ViewDescription,
//! };
//!
//! let config = MemoryConfig::default().with_backend(BackendType::Dummy);
//! let mut memory = MemoryManager::new(config)?;
//!
//! let staging = memory.allocate_buffer(&ResourceDescription::upload_buffer(256))?;
//! memory.upload(&staging, &[0u8; 100], 0)?;
//! let cbv = memory.create_descriptor(&staging, &ViewDescription::constant_buffer(0, 100))?;
//! assert!(cbv.gpu_handle().is_some());
//!
//! memory.tick_frame();
//! # Ok::<(), redlilium_gpu_memory::MemoryError>(())
//! ```

pub mod backend;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod manager;
pub mod resources;
pub mod temp_pool;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    BackendBinding, BackendError, CpuHandle, DescriptorSlot, GpuHandle, NativeResource,
    ResourceId, create_backend, dummy::DummyBackend,
};
pub use config::{BackendType, DescriptorCapacities, MemoryConfig};
pub use descriptor::{
    Descriptor, DescriptorCache, DescriptorManager, DescriptorSpace, SamplerDescriptor,
    SpaceState,
};
pub use error::{MemoryError, MemoryResult};
pub use manager::{MemoryManager, MemoryStats, SpaceStats};
pub use resources::{Allocation, CopyFootprint, ResourceTransition, SubresourceFootprint};
pub use temp_pool::TempBufferPool;
pub use types::{
    AddressMode, BufferViewRange, ClearValue, CompareFunction, DescriptorSpaceKind, Extent3d,
    FilterMode, Format, Residency, ResourceDescription, ResourceDimension, ResourceState,
    ResourceUsage, SamplerDescription, TextureViewRange, ViewDescription, ViewDimension, ViewKind,
    ViewRange,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version. Optional; nothing depends on it.
pub fn init() {
    log::info!("RedLilium GPU Memory v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
