//! The memory manager: the single entry point render code uses for GPU memory.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::backend::{self, BackendBinding, CpuHandle, GpuHandle, NativeResource};
use crate::config::MemoryConfig;
use crate::descriptor::{Descriptor, DescriptorManager, SamplerDescriptor};
use crate::error::{MemoryError, MemoryResult};
use crate::resources::Allocation;
use crate::temp_pool::TempBufferPool;
use crate::types::{
    DescriptorSpaceKind, Residency, ResourceDescription, SamplerDescription, ViewDescription,
};

/// A released allocation kept alive until in-flight GPU work is done with it.
#[derive(Debug)]
struct RetiredAllocation {
    /// Held only for its `Drop`.
    _allocation: Arc<Allocation>,
    frames_left: u32,
}

/// Fill level of one descriptor space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceStats {
    pub kind: DescriptorSpaceKind,
    pub cursor: u32,
    pub capacity: u32,
}

/// Snapshot of what a [`MemoryManager`] currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryStats {
    pub buffers: usize,
    pub textures: usize,
    pub default_bytes: u64,
    pub upload_bytes: u64,
    pub readback_bytes: u64,
    pub temp_pool_entries: usize,
    pub pending_releases: usize,
    pub cached_views: usize,
    pub spaces: Vec<SpaceStats>,
    pub frame_index: u64,
}

/// GPU memory and descriptor façade.
///
/// Owns the buffer and texture allocation lists, the descriptor manager and
/// the temp buffer pool. It is an explicit context object: create one at
/// startup and pass it to the code that renders.
///
/// All calls for a frame are expected from one thread. [`tick_frame`] must be
/// called exactly once per frame, after that frame's allocation work.
///
/// [`tick_frame`]: MemoryManager::tick_frame
pub struct MemoryManager {
    backend: Arc<dyn BackendBinding>,
    config: MemoryConfig,
    descriptors: DescriptorManager,
    buffers: Vec<Arc<Allocation>>,
    textures: Vec<Arc<Allocation>>,
    temp_pool: TempBufferPool,
    retired: VecDeque<RetiredAllocation>,
    frame_index: u64,
}

impl MemoryManager {
    /// Create a manager on the backend selected by `config.backend`.
    pub fn new(config: MemoryConfig) -> MemoryResult<Self> {
        let backend = backend::create_backend(&config)?;
        Self::with_backend(backend, config)
    }

    /// Create a manager on an explicit backend. `config.backend` is ignored.
    pub fn with_backend(
        backend: Arc<dyn BackendBinding>,
        config: MemoryConfig,
    ) -> MemoryResult<Self> {
        let descriptors = DescriptorManager::new(backend.clone(), &config.descriptor_capacities)?;
        log::info!(
            "Created memory manager on {} (temp buffer cooldown: {} frames)",
            backend.name(),
            config.temp_buffer_cooldown
        );
        Ok(Self {
            temp_pool: TempBufferPool::new(config.temp_buffer_cooldown),
            backend,
            config,
            descriptors,
            buffers: Vec::new(),
            textures: Vec::new(),
            retired: VecDeque::new(),
            frame_index: 0,
        })
    }

    /// Get the backend.
    pub fn backend(&self) -> &Arc<dyn BackendBinding> {
        &self.backend
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Get the descriptor manager.
    pub fn descriptors(&self) -> &DescriptorManager {
        &self.descriptors
    }

    /// Get the descriptor manager mutably, for resets and reservations.
    pub fn descriptors_mut(&mut self) -> &mut DescriptorManager {
        &mut self.descriptors
    }

    pub fn temp_pool(&self) -> &TempBufferPool {
        &self.temp_pool
    }

    /// Live buffer allocations, oldest first.
    pub fn buffers(&self) -> &[Arc<Allocation>] {
        &self.buffers
    }

    /// Live texture allocations, oldest first.
    pub fn textures(&self) -> &[Arc<Allocation>] {
        &self.textures
    }

    /// Number of [`tick_frame`](Self::tick_frame) calls so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Allocate a buffer.
    pub fn allocate_buffer(
        &mut self,
        description: &ResourceDescription,
    ) -> MemoryResult<Arc<Allocation>> {
        if !description.is_buffer() {
            return Err(MemoryError::wrong_dimension("buffer", description.dimension));
        }
        description
            .validate()
            .map_err(MemoryError::InvalidDescription)?;

        let native = self.create_native(description)?;
        let allocation = Arc::new(Allocation::new(
            description.clone(),
            native,
            None,
            self.backend.clone(),
            true,
        ));
        log::trace!(
            "Allocated buffer {} '{}' ({} bytes, {:?})",
            allocation.resource_id(),
            description.display_label(),
            description.width,
            description.residency
        );
        self.buffers.push(allocation.clone());
        Ok(allocation)
    }

    /// Allocate a texture and compute its upload footprint.
    ///
    /// Textures live in device-local memory only.
    pub fn allocate_texture(
        &mut self,
        description: &ResourceDescription,
    ) -> MemoryResult<Arc<Allocation>> {
        if !description.is_texture() {
            return Err(MemoryError::wrong_dimension("texture", description.dimension));
        }
        if description.residency != Residency::Default {
            return Err(MemoryError::InvalidResidency {
                label: description.display_label().to_string(),
                residency: description.residency,
            });
        }
        description
            .validate()
            .map_err(MemoryError::InvalidDescription)?;

        let native = self.create_native(description)?;
        let footprint = self.backend.compute_copy_footprint(description);
        let allocation = Arc::new(Allocation::new(
            description.clone(),
            native,
            Some(footprint),
            self.backend.clone(),
            true,
        ));
        log::trace!(
            "Allocated texture {} '{}' ({}x{}x{}, {} mips, {:?})",
            allocation.resource_id(),
            description.display_label(),
            description.width,
            description.height,
            description.depth_or_array_layers,
            description.mip_levels,
            description.format
        );
        self.textures.push(allocation.clone());
        Ok(allocation)
    }

    fn create_native(&self, description: &ResourceDescription) -> MemoryResult<NativeResource> {
        self.backend
            .create_resource(description, description.effective_initial_state())
            .map_err(|e| MemoryError::backend(description.display_label(), e))
    }

    /// Wrap an externally owned buffer. Releasing or dropping the returned
    /// allocation never destroys `native`.
    pub fn import_buffer(
        &mut self,
        native: NativeResource,
        description: &ResourceDescription,
    ) -> MemoryResult<Arc<Allocation>> {
        if !description.is_buffer() {
            return Err(MemoryError::wrong_dimension("buffer", description.dimension));
        }
        let allocation = self.import(native, description, None)?;
        self.buffers.push(allocation.clone());
        Ok(allocation)
    }

    /// Wrap an externally owned texture, such as a swap chain image.
    pub fn import_texture(
        &mut self,
        native: NativeResource,
        description: &ResourceDescription,
    ) -> MemoryResult<Arc<Allocation>> {
        if !description.is_texture() {
            return Err(MemoryError::wrong_dimension("texture", description.dimension));
        }
        let footprint = self.backend.compute_copy_footprint(description);
        let allocation = self.import(native, description, Some(footprint))?;
        self.textures.push(allocation.clone());
        Ok(allocation)
    }

    fn import(
        &self,
        native: NativeResource,
        description: &ResourceDescription,
        footprint: Option<crate::resources::CopyFootprint>,
    ) -> MemoryResult<Arc<Allocation>> {
        description
            .validate()
            .map_err(MemoryError::InvalidDescription)?;
        log::trace!("Imported {} '{}'", native.id, description.display_label());
        Ok(Arc::new(Allocation::new(
            description.clone(),
            native,
            footprint,
            self.backend.clone(),
            false,
        )))
    }

    fn check_cpu_access(
        &self,
        allocation: &Allocation,
        offset: u64,
        len: usize,
    ) -> MemoryResult<()> {
        let label = allocation.description().display_label();
        if allocation.is_released() {
            return Err(MemoryError::AllocationReleased {
                label: label.to_string(),
            });
        }
        if !allocation.residency().is_cpu_visible() {
            return Err(MemoryError::InvalidResidency {
                label: label.to_string(),
                residency: allocation.residency(),
            });
        }
        let size = len as u64;
        if offset.checked_add(size).is_none_or(|end| end > allocation.width()) {
            return Err(MemoryError::OutOfBounds {
                offset,
                size,
                limit: allocation.width(),
            });
        }
        Ok(())
    }

    /// Copy `data` into a CPU-visible buffer at `offset`.
    ///
    /// Nothing is written if the range does not fit the buffer.
    pub fn upload(&self, allocation: &Allocation, data: &[u8], offset: u64) -> MemoryResult<()> {
        self.check_cpu_access(allocation, offset, data.len())?;
        self.backend
            .write_mapped(allocation.native(), offset, data)
            .map_err(MemoryError::MapFailed)
    }

    /// Copy `out.len()` bytes at `offset` of a CPU-visible buffer into `out`.
    ///
    /// The caller must have waited for the GPU work writing the range.
    pub fn download(
        &self,
        allocation: &Allocation,
        offset: u64,
        out: &mut [u8],
    ) -> MemoryResult<()> {
        self.check_cpu_access(allocation, offset, out.len())?;
        self.backend
            .read_mapped(allocation.native(), offset, out)
            .map_err(MemoryError::MapFailed)
    }

    /// Release an allocation. Releasing twice is a no-op.
    ///
    /// The manager drops its owning reference; the native resource is
    /// destroyed once descriptors and other holders drop theirs. With a
    /// non-zero `release_latency_frames` the manager's reference is kept
    /// for that many more frames.
    pub fn release(&mut self, allocation: &Arc<Allocation>) {
        if !allocation.mark_released() {
            log::debug!(
                "Ignoring second release of '{}'",
                allocation.description().display_label()
            );
            return;
        }

        let list = if allocation.description().is_buffer() {
            &mut self.buffers
        } else {
            &mut self.textures
        };
        let owned = list
            .iter()
            .position(|a| Arc::ptr_eq(a, allocation))
            .map(|index| list.remove(index));
        self.descriptors.prune_resource(allocation.resource_id());
        log::trace!(
            "Released {} '{}'",
            allocation.resource_id(),
            allocation.description().display_label()
        );

        let latency = self.config.release_latency_frames;
        if let Some(owned) = owned
            && latency > 0
        {
            self.retired.push_back(RetiredAllocation {
                _allocation: owned,
                frames_left: latency,
            });
        }
    }

    /// Get a CPU-visible upload buffer, reusing a pooled one when its
    /// cooldown has passed.
    pub fn allocate_temp_upload(
        &mut self,
        description: &ResourceDescription,
    ) -> MemoryResult<Arc<Allocation>> {
        if description.residency != Residency::Upload {
            return Err(MemoryError::InvalidResidency {
                label: description.display_label().to_string(),
                residency: description.residency,
            });
        }
        if let Some(allocation) = self.temp_pool.try_get_buffer(description) {
            return Ok(allocation);
        }

        let allocation = self.allocate_buffer(description)?;
        self.temp_pool
            .add_buffer_to_pool(description.clone(), allocation.clone());
        log::debug!(
            "Added temp buffer '{}' to pool ({} entries)",
            description.display_label(),
            self.temp_pool.len()
        );
        Ok(allocation)
    }

    /// Advance to the next frame. Call exactly once per rendered frame.
    pub fn tick_frame(&mut self) {
        self.frame_index += 1;

        // Age the retired queue before eviction adds to it, so evicted
        // buffers wait the full latency.
        for retired in &mut self.retired {
            retired.frames_left -= 1;
        }
        let before = self.retired.len();
        self.retired.retain(|retired| retired.frames_left > 0);
        let freed = before - self.retired.len();

        self.temp_pool.tick_frame();
        if let Some(idle_frames) = self.config.temp_buffer_eviction {
            for allocation in self.temp_pool.evict_idle(idle_frames) {
                self.release(&allocation);
            }
        }

        log::debug!(
            "Frame {} ({} temp buffers, {} deferred releases freed)",
            self.frame_index,
            self.temp_pool.len(),
            freed
        );
    }

    /// Get a descriptor for `view` of `allocation`.
    pub fn create_descriptor(
        &mut self,
        allocation: &Arc<Allocation>,
        view: &ViewDescription,
    ) -> MemoryResult<Descriptor> {
        self.descriptors.create_descriptor(allocation, view)
    }

    /// Get a sampler descriptor.
    pub fn create_sampler(
        &mut self,
        description: &SamplerDescription,
    ) -> MemoryResult<SamplerDescriptor> {
        self.descriptors.create_sampler(description)
    }

    /// CPU handle of the next free slot of `kind`.
    pub fn available_cpu_handle(&self, kind: DescriptorSpaceKind) -> Option<CpuHandle> {
        self.descriptors.available_cpu_handle(kind)
    }

    /// GPU handle of the next free slot of `kind`.
    pub fn available_gpu_handle(&self, kind: DescriptorSpaceKind) -> Option<GpuHandle> {
        self.descriptors.available_gpu_handle(kind)
    }

    /// Snapshot of the manager's state.
    pub fn stats(&self) -> MemoryStats {
        let mut stats = MemoryStats {
            buffers: self.buffers.len(),
            textures: self.textures.len(),
            temp_pool_entries: self.temp_pool.len(),
            pending_releases: self.retired.len(),
            cached_views: self.descriptors.cache().len(),
            frame_index: self.frame_index,
            spaces: self
                .descriptors
                .spaces()
                .iter()
                .map(|space| SpaceStats {
                    kind: space.kind(),
                    cursor: space.cursor(),
                    capacity: space.capacity(),
                })
                .collect(),
            ..Default::default()
        };

        for allocation in self.buffers.iter().chain(&self.textures) {
            let bytes = allocation
                .footprint()
                .map_or(allocation.width(), |footprint| footprint.total_size);
            match allocation.residency() {
                Residency::Default => stats.default_bytes += bytes,
                Residency::Upload => stats.upload_bytes += bytes,
                Residency::Readback => stats.readback_bytes += bytes,
            }
        }
        stats
    }

    /// Release everything the manager owns.
    ///
    /// Clears the temp pool, flushes deferred releases and releases every
    /// outstanding allocation, textures then buffers, newest first. Also run
    /// on drop.
    pub fn shutdown(&mut self) {
        let outstanding = self.buffers.len() + self.textures.len();
        self.temp_pool.clear();
        self.retired.clear();

        for list in [&mut self.textures, &mut self.buffers] {
            while let Some(allocation) = list.pop() {
                allocation.mark_released();
                self.descriptors.prune_resource(allocation.resource_id());
            }
        }

        if outstanding > 0 {
            log::info!("Memory manager shut down, released {outstanding} allocations");
        }
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("backend", &self.backend.name())
            .field("buffers", &self.buffers.len())
            .field("textures", &self.textures.len())
            .field("temp_pool", &self.temp_pool.len())
            .field("frame_index", &self.frame_index)
            .finish()
    }
}

static_assertions::assert_impl_all!(MemoryManager: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::backend::dummy::DummyBackend;
    use crate::config::DescriptorCapacities;
    use crate::types::{Format, ResourceState, ResourceUsage, ViewDimension};

    fn manager_with(config: MemoryConfig) -> (Arc<DummyBackend>, MemoryManager) {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = Arc::new(DummyBackend::new());
        let manager = MemoryManager::with_backend(backend.clone(), config).unwrap();
        (backend, manager)
    }

    fn manager() -> (Arc<DummyBackend>, MemoryManager) {
        manager_with(MemoryConfig::default())
    }

    #[test]
    fn test_end_to_end_constant_buffer() {
        let (_backend, mut memory) = manager();
        let buffer = memory
            .allocate_buffer(&ResourceDescription::upload_buffer(256))
            .unwrap();
        memory.upload(&buffer, &[7u8; 100], 0).unwrap();

        let before = memory
            .descriptors()
            .space(DescriptorSpaceKind::CbvSrvUav)
            .cursor();
        let view = ViewDescription::constant_buffer(0, 100);
        let a = memory.create_descriptor(&buffer, &view).unwrap();
        assert_eq!(
            memory
                .descriptors()
                .space(DescriptorSpaceKind::CbvSrvUav)
                .cursor(),
            before + 1
        );
        assert_eq!(a.allocation().resource_id(), buffer.resource_id());

        let mut out = [0u8; 100];
        memory.download(&buffer, 0, &mut out).unwrap();
        assert_eq!(out, [7u8; 100]);
    }

    #[test]
    fn test_upload_out_of_bounds_writes_nothing() {
        let (_backend, mut memory) = manager();
        let buffer = memory
            .allocate_buffer(&ResourceDescription::upload_buffer(256))
            .unwrap();

        assert_eq!(
            memory.upload(&buffer, &[1u8; 100], 200),
            Err(MemoryError::OutOfBounds {
                offset: 200,
                size: 100,
                limit: 256
            })
        );
        let mut out = [0xffu8; 56];
        memory.download(&buffer, 200, &mut out).unwrap();
        assert_eq!(out, [0u8; 56]);
    }

    #[test]
    fn test_device_local_upload_rejected() {
        let (_backend, mut memory) = manager();
        let buffer = memory
            .allocate_buffer(&ResourceDescription::buffer(256))
            .unwrap();
        assert!(matches!(
            memory.upload(&buffer, &[0u8; 4], 0),
            Err(MemoryError::InvalidResidency {
                residency: Residency::Default,
                ..
            })
        ));
        let mut out = [0u8; 4];
        assert!(matches!(
            memory.download(&buffer, 0, &mut out),
            Err(MemoryError::InvalidResidency { .. })
        ));
    }

    #[test]
    fn test_release_is_idempotent() {
        let (backend, mut memory) = manager();
        let buffer = memory
            .allocate_buffer(&ResourceDescription::buffer(64))
            .unwrap();
        let id = buffer.resource_id();

        memory.release(&buffer);
        memory.release(&buffer);
        assert!(memory.buffers().is_empty());
        assert!(backend.is_alive(id));

        drop(buffer);
        assert!(!backend.is_alive(id));
        assert_eq!(backend.stats().resources_destroyed, 1);
    }

    #[test]
    fn test_descriptor_keeps_resource_alive() {
        let (backend, mut memory) = manager();
        let texture = memory
            .allocate_texture(&ResourceDescription::texture_2d(8, 8, Format::Rgba8Unorm))
            .unwrap();
        let id = texture.resource_id();
        let srv = memory
            .create_descriptor(
                &texture,
                &ViewDescription::texture_srv(Format::Rgba8Unorm, ViewDimension::Texture2D),
            )
            .unwrap();

        memory.release(&texture);
        drop(texture);
        assert!(backend.is_alive(id));
        drop(srv);
        assert!(!backend.is_alive(id));
    }

    #[test]
    fn test_released_allocation_cannot_be_mapped() {
        let (_backend, mut memory) = manager();
        let buffer = memory
            .allocate_buffer(&ResourceDescription::upload_buffer(64))
            .unwrap();
        memory.release(&buffer);
        assert!(matches!(
            memory.upload(&buffer, &[0u8; 4], 0),
            Err(MemoryError::AllocationReleased { .. })
        ));
    }

    #[test]
    fn test_texture_footprint_and_residency() {
        let (_backend, mut memory) = manager();
        let texture = memory
            .allocate_texture(
                &ResourceDescription::texture_2d(100, 4, Format::Rgba8Unorm).with_mip_levels(2),
            )
            .unwrap();
        let footprint = texture.footprint().unwrap();
        assert_eq!(footprint.row_sizes(), vec![400, 200]);
        assert_eq!(footprint.row_pitches(), vec![512, 256]);

        let mut upload_texture = ResourceDescription::texture_2d(4, 4, Format::Rgba8Unorm);
        upload_texture.residency = Residency::Upload;
        assert!(matches!(
            memory.allocate_texture(&upload_texture),
            Err(MemoryError::InvalidResidency { .. })
        ));
        assert!(matches!(
            memory.allocate_texture(&ResourceDescription::buffer(16)),
            Err(MemoryError::InvalidDescription(_))
        ));
    }

    #[test]
    fn test_backend_failure_reported() {
        let backend = Arc::new(DummyBackend::with_memory_budget(1024));
        let mut memory = MemoryManager::with_backend(backend, MemoryConfig::default()).unwrap();
        let err = memory
            .allocate_buffer(&ResourceDescription::buffer(4096).with_label("huge"))
            .unwrap_err();
        assert_eq!(
            err,
            MemoryError::BackendCreationFailed {
                label: "huge".into(),
                source: BackendError::OutOfMemory,
            }
        );
        assert!(memory.buffers().is_empty());
    }

    #[test]
    fn test_temp_upload_reuse_after_cooldown() {
        let (backend, mut memory) = manager();
        let desc = ResourceDescription::upload_buffer(1024).with_label("staging");

        let first = memory.allocate_temp_upload(&desc).unwrap();
        for _ in 0..3 {
            let fresh = memory.allocate_temp_upload(&desc).unwrap();
            assert!(!Arc::ptr_eq(&first, &fresh));
            memory.tick_frame();
        }
        let reused = memory.allocate_temp_upload(&desc).unwrap();
        assert!(Arc::ptr_eq(&first, &reused));
        assert_eq!(backend.stats().resources_created, 4);
        assert_eq!(memory.temp_pool().len(), 4);
    }

    #[test]
    fn test_temp_upload_needs_upload_residency() {
        let (_backend, mut memory) = manager();
        assert!(matches!(
            memory.allocate_temp_upload(&ResourceDescription::readback_buffer(64)),
            Err(MemoryError::InvalidResidency { .. })
        ));
    }

    #[test]
    fn test_temp_buffer_eviction() {
        let (backend, mut memory) =
            manager_with(MemoryConfig::default().with_temp_buffer_eviction(2));
        let desc = ResourceDescription::upload_buffer(64);
        let id = memory.allocate_temp_upload(&desc).unwrap().resource_id();

        // Cooldown 3, then idle for 2 more frames.
        for _ in 0..4 {
            memory.tick_frame();
            assert_eq!(memory.temp_pool().len(), 1);
        }
        memory.tick_frame();
        assert!(memory.temp_pool().is_empty());
        assert!(memory.buffers().is_empty());
        assert!(!backend.is_alive(id));
    }

    #[test]
    fn test_evicted_temp_buffer_waits_full_latency() {
        let (backend, mut memory) = manager_with(
            MemoryConfig::default()
                .with_temp_buffer_eviction(1)
                .with_release_latency(2),
        );
        let id = memory
            .allocate_temp_upload(&ResourceDescription::upload_buffer(64))
            .unwrap()
            .resource_id();

        // Cooldown 3, idle for 1 more frame, then evicted.
        for _ in 0..4 {
            memory.tick_frame();
        }
        assert!(memory.temp_pool().is_empty());
        assert_eq!(memory.stats().pending_releases, 1);

        memory.tick_frame();
        assert!(backend.is_alive(id));
        memory.tick_frame();
        assert!(!backend.is_alive(id));
        assert_eq!(memory.stats().pending_releases, 0);
    }

    #[test]
    fn test_deferred_release() {
        let (backend, mut memory) = manager_with(MemoryConfig::default().with_release_latency(2));
        let buffer = memory
            .allocate_buffer(&ResourceDescription::buffer(64))
            .unwrap();
        let id = buffer.resource_id();
        memory.release(&buffer);
        drop(buffer);

        assert!(backend.is_alive(id));
        assert_eq!(memory.stats().pending_releases, 1);
        memory.tick_frame();
        assert!(backend.is_alive(id));
        memory.tick_frame();
        assert!(!backend.is_alive(id));
        assert_eq!(memory.stats().pending_releases, 0);
    }

    #[test]
    fn test_import_dedupes_with_owner() {
        let (backend, mut memory) = manager();
        let desc = ResourceDescription::texture_2d(16, 16, Format::Rgba8Unorm)
            .with_usage(ResourceUsage::RENDER_TARGET);
        let owner = memory.allocate_texture(&desc).unwrap();
        let alias = memory
            .import_texture(owner.native().clone(), &desc)
            .unwrap();
        assert!(!alias.needs_release());

        let rtv = ViewDescription::render_target(Format::Rgba8Unorm, ViewDimension::Texture2D);
        let a = memory.create_descriptor(&owner, &rtv).unwrap();
        let b = memory.create_descriptor(&alias, &rtv).unwrap();
        assert_eq!(a.slot(), b.slot());
        assert_eq!(backend.stats().views_written, 1);

        memory.release(&alias);
        drop(alias);
        assert!(backend.is_alive(owner.resource_id()));
    }

    #[test]
    fn test_transition_through_manager_allocation() {
        let (_backend, mut memory) = manager();
        let texture = memory
            .allocate_texture(
                &ResourceDescription::texture_2d(8, 8, Format::Rgba8Unorm)
                    .with_initial_state(ResourceState::COPY_DEST),
            )
            .unwrap();
        let barrier = texture
            .transition(ResourceState::PIXEL_SHADER_RESOURCE)
            .unwrap();
        assert_eq!(barrier.before, ResourceState::COPY_DEST);
        assert_eq!(texture.current_state(), ResourceState::PIXEL_SHADER_RESOURCE);
    }

    #[test]
    fn test_stats() {
        let (_backend, mut memory) = manager_with(
            MemoryConfig::default().with_descriptor_capacities(DescriptorCapacities::uniform(16)),
        );
        memory
            .allocate_buffer(&ResourceDescription::upload_buffer(256))
            .unwrap();
        memory
            .allocate_buffer(&ResourceDescription::readback_buffer(128))
            .unwrap();
        memory
            .allocate_texture(&ResourceDescription::texture_2d(64, 4, Format::Rgba8Unorm))
            .unwrap();
        memory.tick_frame();

        let stats = memory.stats();
        assert_eq!(stats.buffers, 2);
        assert_eq!(stats.textures, 1);
        assert_eq!(stats.upload_bytes, 256);
        assert_eq!(stats.readback_bytes, 128);
        assert_eq!(stats.default_bytes, 256 * 4);
        assert_eq!(stats.frame_index, 1);
        assert_eq!(stats.spaces.len(), 4);
        assert!(stats.spaces.iter().all(|s| s.capacity == 16 && s.cursor == 0));
    }

    #[test]
    fn test_shutdown_releases_newest_first() {
        let (backend, mut memory) = manager();
        let b0 = memory
            .allocate_buffer(&ResourceDescription::buffer(16))
            .unwrap()
            .resource_id();
        let t0 = memory
            .allocate_texture(&ResourceDescription::texture_2d(4, 4, Format::R8Unorm))
            .unwrap()
            .resource_id();
        let b1 = memory
            .allocate_buffer(&ResourceDescription::buffer(16))
            .unwrap()
            .resource_id();
        let t1 = memory
            .allocate_texture(&ResourceDescription::texture_2d(4, 4, Format::R8Unorm))
            .unwrap()
            .resource_id();

        memory.shutdown();
        assert_eq!(backend.destroyed(), vec![t1, t0, b1, b0]);
        assert_eq!(memory.stats().buffers, 0);

        // Shutdown again (as drop does) is harmless.
        memory.shutdown();
        drop(memory);
        assert_eq!(backend.stats().resources_destroyed, 4);
    }
}
