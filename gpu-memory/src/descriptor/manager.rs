//! Descriptor creation with deduplication.

use std::sync::Arc;

use crate::backend::{BackendBinding, CpuHandle, DescriptorSlot, GpuHandle, ResourceId};
use crate::config::DescriptorCapacities;
use crate::error::{MemoryError, MemoryResult};
use crate::resources::Allocation;
use crate::types::{DescriptorSpaceKind, SamplerDescription, ViewDescription};

use super::{Descriptor, DescriptorCache, DescriptorSpace, SamplerDescriptor, validate_view};

/// Produces descriptors for (allocation, view) pairs.
///
/// Owns the four descriptor spaces and the cache. Constant buffer views are
/// never cached; every other kind is looked up by resource identity and
/// structural view equality before a slot is claimed.
pub struct DescriptorManager {
    backend: Arc<dyn BackendBinding>,
    /// Indexed by [`DescriptorSpaceKind::index`].
    spaces: Vec<DescriptorSpace>,
    cache: DescriptorCache,
    samplers: Vec<SamplerDescriptor>,
}

impl DescriptorManager {
    /// Create the four descriptor spaces with the given capacities.
    pub fn new(
        backend: Arc<dyn BackendBinding>,
        capacities: &DescriptorCapacities,
    ) -> MemoryResult<Self> {
        let mut spaces = Vec::with_capacity(DescriptorSpaceKind::ALL.len());
        for kind in DescriptorSpaceKind::ALL {
            let heap = backend
                .create_descriptor_heap(kind, capacities.get(kind), kind.is_shader_visible())
                .map_err(|e| MemoryError::backend(&format!("{kind} descriptor heap"), e));
            match heap {
                Ok(heap) => spaces.push(DescriptorSpace::new(heap)),
                Err(e) => {
                    for space in &spaces {
                        backend.destroy_descriptor_heap(space.heap());
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            backend,
            spaces,
            cache: DescriptorCache::new(),
            samplers: Vec::new(),
        })
    }

    /// Get a descriptor for `view` of `allocation`, reusing an identical one
    /// if it was created before.
    pub fn create_descriptor(
        &mut self,
        allocation: &Arc<Allocation>,
        view: &ViewDescription,
    ) -> MemoryResult<Descriptor> {
        let label = allocation.description().display_label();
        if allocation.is_released() {
            return Err(MemoryError::AllocationReleased {
                label: label.to_string(),
            });
        }
        validate_view(allocation.description(), view)?;

        let cacheable = view.kind.is_cacheable();
        if cacheable && let Some(slot) = self.cache.lookup(allocation, view) {
            log::debug!(
                "Descriptor cache hit: {} of '{}' in {} slot {}",
                view.kind,
                label,
                slot.space,
                slot.index
            );
            return Ok(Descriptor::new(allocation.clone(), *view, slot));
        }

        let slot = self.space_mut(view.kind.space()).allocate()?;
        self.backend
            .create_view(allocation.native(), allocation.description(), view, &slot)
            .map_err(|e| MemoryError::backend(label, e))?;
        log::trace!(
            "Created {} of '{}' in {} slot {}",
            view.kind,
            label,
            slot.space,
            slot.index
        );

        if cacheable {
            self.cache.insert(allocation, *view, slot);
        }
        Ok(Descriptor::new(allocation.clone(), *view, slot))
    }

    /// Get a sampler descriptor, reusing a structurally equal one.
    pub fn create_sampler(
        &mut self,
        description: &SamplerDescription,
    ) -> MemoryResult<SamplerDescriptor> {
        if let Some(existing) = self
            .samplers
            .iter()
            .find(|s| s.description == *description)
        {
            log::debug!("Sampler cache hit in slot {}", existing.slot.index);
            return Ok(existing.clone());
        }

        let slot = self.space_mut(DescriptorSpaceKind::Sampler).allocate()?;
        self.backend
            .create_sampler(description, &slot)
            .map_err(|e| MemoryError::backend("sampler", e))?;
        log::trace!("Created sampler in slot {}", slot.index);

        let sampler = SamplerDescriptor {
            description: description.clone(),
            slot,
        };
        self.samplers.push(sampler.clone());
        Ok(sampler)
    }

    /// Claim `count` consecutive slots of `kind` for the caller to fill.
    pub fn reserve(
        &mut self,
        kind: DescriptorSpaceKind,
        count: u32,
    ) -> MemoryResult<DescriptorSlot> {
        self.space_mut(kind).allocate_contiguous(count)
    }

    /// CPU handle of the next free slot of `kind`, without claiming it.
    pub fn available_cpu_handle(&self, kind: DescriptorSpaceKind) -> Option<CpuHandle> {
        self.space(kind).available_cpu_handle()
    }

    /// GPU handle of the next free slot of `kind`, without claiming it.
    pub fn available_gpu_handle(&self, kind: DescriptorSpaceKind) -> Option<GpuHandle> {
        self.space(kind).available_gpu_handle()
    }

    /// Rewind the space of `kind` and forget every descriptor cached in it.
    ///
    /// Descriptors handed out earlier keep their slot identity, but the slot
    /// will be overwritten by later requests.
    pub fn reset_space(&mut self, kind: DescriptorSpaceKind) {
        self.space_mut(kind).reset();
        let evicted = self.cache.evict_space(kind);
        if kind == DescriptorSpaceKind::Sampler {
            self.samplers.clear();
        }
        log::debug!("Reset {kind} descriptor space ({evicted} cached views dropped)");
    }

    pub fn space(&self, kind: DescriptorSpaceKind) -> &DescriptorSpace {
        &self.spaces[kind.index()]
    }

    fn space_mut(&mut self, kind: DescriptorSpaceKind) -> &mut DescriptorSpace {
        &mut self.spaces[kind.index()]
    }

    pub fn spaces(&self) -> &[DescriptorSpace] {
        &self.spaces
    }

    pub fn cache(&self) -> &DescriptorCache {
        &self.cache
    }

    /// Drop the cache bucket of a resource whose allocations are gone.
    pub(crate) fn prune_resource(&mut self, id: ResourceId) {
        if self.cache.prune_resource(id) {
            log::debug!("Pruned descriptor cache bucket for {id}");
        }
    }

    /// Drop every stale cache bucket.
    pub fn prune(&mut self) -> usize {
        self.cache.prune()
    }
}

impl Drop for DescriptorManager {
    fn drop(&mut self) {
        for space in &self.spaces {
            self.backend.destroy_descriptor_heap(space.heap());
        }
    }
}

impl std::fmt::Debug for DescriptorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorManager")
            .field("backend", &self.backend.name())
            .field("spaces", &self.spaces)
            .field("cached_views", &self.cache.len())
            .field("samplers", &self.samplers.len())
            .finish()
    }
}
