//! Backend bindings: the native create / destroy / map / view calls the
//! memory layer delegates to.
//!
//! # Available Backends
//!
//! - `dummy` (always compiled): CPU-memory backend for tests and headless tools
//! - `wgpu-backend`: cross-platform backend using wgpu
//! - `vulkan-backend`: native Vulkan backend using ash and gpu-allocator
//!
//! # Architecture
//!
//! Each backend implements [`BackendBinding`]. Resources come back as a
//! [`NativeResource`]: a process-unique [`ResourceId`] plus a tagged
//! [`NativePayload`] carrying the backend's own handles, so no downcasting is
//! needed to reach them. Descriptor heaps are backend-owned slot tables; the
//! memory layer only sees their [`DescriptorHeap`] handle and writes views
//! into [`DescriptorSlot`]s.

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_impl;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub mod dummy;
mod error;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use error::{BackendError, BackendResult};

use crate::config::{BackendType, MemoryConfig};
use crate::error::{MemoryError, MemoryResult};
use crate::resources::CopyFootprint;
use crate::types::{
    DescriptorSpaceKind, ResourceDescription, ResourceState, SamplerDescription, ViewDescription,
};

/// Process-unique identity of a native resource.
///
/// Used as the descriptor cache key: two allocations wrapping the same
/// native resource share one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value, for logging.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Backend-specific handles of a native resource.
#[derive(Clone)]
pub enum NativePayload {
    /// Dummy backend (contents live in the backend, keyed by id)
    Dummy,
    /// wgpu backend buffer or texture
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu_impl::WgpuResource),
    /// Vulkan backend buffer or image with its allocation
    #[cfg(feature = "vulkan-backend")]
    Vulkan(Arc<vulkan::VulkanResource>),
}

impl std::fmt::Debug for NativePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "NativePayload::Dummy"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(resource) => f.debug_tuple("NativePayload::Wgpu").field(resource).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(resource) => f
                .debug_tuple("NativePayload::Vulkan")
                .field(resource)
                .finish(),
        }
    }
}

/// A native resource created (or imported) through a backend.
///
/// Cloning yields another handle to the same resource with the same identity.
#[derive(Debug, Clone)]
pub struct NativeResource {
    pub id: ResourceId,
    pub payload: NativePayload,
}

impl NativeResource {
    pub fn new(payload: NativePayload) -> Self {
        Self {
            id: ResourceId::next(),
            payload,
        }
    }
}

/// Identity of a backend descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(u64);

impl HeapId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// CPU-side handle of a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuHandle(pub u64);

/// Shader-visible handle of a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub u64);

/// A fixed-capacity native descriptor heap.
#[derive(Debug, Clone)]
pub struct DescriptorHeap {
    pub id: HeapId,
    pub kind: DescriptorSpaceKind,
    pub capacity: u32,
    pub shader_visible: bool,
    pub cpu_base: CpuHandle,
    pub gpu_base: Option<GpuHandle>,
    /// Distance in bytes between two consecutive slots.
    pub increment: u32,
}

impl DescriptorHeap {
    /// Describe a heap whose handles are synthetic addresses derived from the
    /// heap id. Backends that keep their views in slot tables use this.
    pub fn synthetic(
        kind: DescriptorSpaceKind,
        capacity: u32,
        shader_visible: bool,
        increment: u32,
    ) -> Self {
        let id = HeapId::next();
        let base = id.0 << 32;
        Self {
            id,
            kind,
            capacity,
            shader_visible,
            cpu_base: CpuHandle(base),
            gpu_base: shader_visible.then_some(GpuHandle(base | (1 << 63))),
            increment,
        }
    }

    /// Handles of slot `index`. Does not check the capacity.
    pub fn slot(&self, index: u32) -> DescriptorSlot {
        let offset = u64::from(index) * u64::from(self.increment);
        DescriptorSlot {
            heap: self.id,
            space: self.kind,
            index,
            cpu: CpuHandle(self.cpu_base.0 + offset),
            gpu: self.gpu_base.map(|base| GpuHandle(base.0 + offset)),
        }
    }
}

/// One slot of a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSlot {
    pub heap: HeapId,
    pub space: DescriptorSpaceKind,
    pub index: u32,
    pub cpu: CpuHandle,
    /// Present only for shader-visible spaces.
    pub gpu: Option<GpuHandle>,
}

/// Native graphics driver capability the memory layer is built on.
pub trait BackendBinding: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Create a native buffer or texture in `initial_state`.
    fn create_resource(
        &self,
        description: &ResourceDescription,
        initial_state: ResourceState,
    ) -> BackendResult<NativeResource>;

    /// Destroy a native resource created by this backend.
    fn destroy_resource(&self, resource: &NativeResource);

    /// Map `resource`, copy `data` in at `offset`, unmap.
    fn write_mapped(
        &self,
        resource: &NativeResource,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()>;

    /// Map `resource`, copy `out.len()` bytes from `offset` into `out`, unmap.
    ///
    /// The caller must have waited for GPU writes to the range to finish.
    fn read_mapped(
        &self,
        resource: &NativeResource,
        offset: u64,
        out: &mut [u8],
    ) -> BackendResult<()>;

    /// Create a descriptor heap with `capacity` slots.
    fn create_descriptor_heap(
        &self,
        kind: DescriptorSpaceKind,
        capacity: u32,
        shader_visible: bool,
    ) -> BackendResult<DescriptorHeap>;

    /// Destroy a heap and every view written into it.
    fn destroy_descriptor_heap(&self, heap: &DescriptorHeap);

    /// Write a view of `resource` into `slot`, replacing whatever it held.
    fn create_view(
        &self,
        resource: &NativeResource,
        description: &ResourceDescription,
        view: &ViewDescription,
        slot: &DescriptorSlot,
    ) -> BackendResult<()>;

    /// Write a sampler into `slot`.
    fn create_sampler(
        &self,
        description: &SamplerDescription,
        slot: &DescriptorSlot,
    ) -> BackendResult<()>;

    /// Linear upload layout of a texture on this backend.
    fn compute_copy_footprint(&self, description: &ResourceDescription) -> CopyFootprint;
}

/// Select and create a backend for `config`.
///
/// [`BackendType::Auto`] tries Vulkan, then wgpu, then falls back to the dummy
/// backend. An explicitly requested backend that is unavailable is an error.
pub fn create_backend(config: &MemoryConfig) -> MemoryResult<Arc<dyn BackendBinding>> {
    match config.backend {
        BackendType::Dummy => {
            log::info!("Using dummy backend");
            Ok(Arc::new(dummy::DummyBackend::new()))
        }
        BackendType::Vulkan => create_vulkan(config),
        BackendType::Wgpu => create_wgpu(config),
        BackendType::Auto => {
            match create_vulkan(config) {
                Ok(backend) => return Ok(backend),
                Err(e) => log::warn!("Failed to create Vulkan backend: {e}"),
            }
            match create_wgpu(config) {
                Ok(backend) => return Ok(backend),
                Err(e) => log::warn!("Failed to create wgpu backend: {e}"),
            }
            log::info!("Using dummy backend");
            Ok(Arc::new(dummy::DummyBackend::new()))
        }
    }
}

#[cfg(feature = "vulkan-backend")]
fn create_vulkan(config: &MemoryConfig) -> MemoryResult<Arc<dyn BackendBinding>> {
    let backend = vulkan::VulkanBackend::new(config.validation)
        .map_err(|e| MemoryError::backend("vulkan backend", e))?;
    log::info!("Using Vulkan backend (ash)");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "vulkan-backend"))]
fn create_vulkan(_config: &MemoryConfig) -> MemoryResult<Arc<dyn BackendBinding>> {
    Err(MemoryError::backend(
        "vulkan backend",
        BackendError::FeatureNotSupported("built without the vulkan-backend feature".into()),
    ))
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu(config: &MemoryConfig) -> MemoryResult<Arc<dyn BackendBinding>> {
    let backend = wgpu_impl::WgpuBackend::new(config.validation)
        .map_err(|e| MemoryError::backend("wgpu backend", e))?;
    log::info!("Using wgpu backend");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu(_config: &MemoryConfig) -> MemoryResult<Arc<dyn BackendBinding>> {
    Err(MemoryError::backend(
        "wgpu backend",
        BackendError::FeatureNotSupported("built without the wgpu-backend feature".into()),
    ))
}

/// Check if a real GPU backend was compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(any(feature = "vulkan-backend", feature = "wgpu-backend"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ids_are_unique() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_synthetic_heap_slots() {
        let heap = DescriptorHeap::synthetic(DescriptorSpaceKind::CbvSrvUav, 16, true, 32);
        let slot0 = heap.slot(0);
        let slot3 = heap.slot(3);
        assert_eq!(slot3.cpu.0 - slot0.cpu.0, 96);
        assert_eq!(slot3.gpu.unwrap().0 - slot0.gpu.unwrap().0, 96);
        assert_eq!(slot3.index, 3);

        let rtv = DescriptorHeap::synthetic(DescriptorSpaceKind::RenderTarget, 4, false, 32);
        assert!(rtv.slot(0).gpu.is_none());
        assert_ne!(rtv.slot(0).cpu, slot0.cpu);
    }

    #[test]
    fn test_create_dummy_backend() {
        let config = MemoryConfig::default().with_backend(BackendType::Dummy);
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
