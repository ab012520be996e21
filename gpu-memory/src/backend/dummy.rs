//! Dummy backend for testing and headless development.
//!
//! Resources live in CPU memory, so uploads and downloads round trip.
//! Descriptor heaps are plain slot tables recording what was written where,
//! which lets tests observe view creation without GPU hardware.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::resources::CopyFootprint;
use crate::types::{
    DescriptorSpaceKind, ResourceDescription, ResourceState, SamplerDescription, ViewDescription,
};

use super::{
    BackendBinding, BackendError, BackendResult, DescriptorHeap, DescriptorSlot, HeapId,
    NativePayload, NativeResource, ResourceId,
};

/// Row pitch alignment of texture uploads, in bytes.
pub const ROW_PITCH_ALIGNMENT: u64 = 256;
/// Alignment of each subresource in an upload buffer, in bytes.
pub const PLACEMENT_ALIGNMENT: u64 = 512;
/// Synthetic distance between descriptor slots.
const DESCRIPTOR_INCREMENT: u32 = 32;

/// What a dummy descriptor slot currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummySlot {
    View {
        resource: ResourceId,
        view: ViewDescription,
    },
    Sampler,
}

/// Counters exposed for tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyStats {
    pub resources_created: u64,
    pub resources_destroyed: u64,
    pub views_written: u64,
    pub samplers_written: u64,
    pub heaps_created: u64,
    pub bytes_in_use: u64,
}

#[derive(Debug)]
struct DummyResource {
    size: u64,
    /// Present for CPU-visible buffers only.
    contents: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct DummyState {
    resources: HashMap<ResourceId, DummyResource>,
    heaps: HashMap<HeapId, Vec<Option<DummySlot>>>,
    destroyed: Vec<ResourceId>,
    stats: DummyStats,
}

/// Dummy backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    budget: Option<u64>,
    state: Mutex<DummyState>,
}

impl DummyBackend {
    /// Create a new dummy backend with unlimited memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dummy backend that fails allocations once `bytes` are in use.
    pub fn with_memory_budget(bytes: u64) -> Self {
        Self {
            budget: Some(bytes),
            state: Mutex::default(),
        }
    }

    /// Snapshot of the backend counters.
    pub fn stats(&self) -> DummyStats {
        self.state.lock().stats
    }

    /// Whether `id` names a resource that has not been destroyed.
    pub fn is_alive(&self, id: ResourceId) -> bool {
        self.state.lock().resources.contains_key(&id)
    }

    /// Identities of destroyed resources, in destruction order.
    pub fn destroyed(&self) -> Vec<ResourceId> {
        self.state.lock().destroyed.clone()
    }

    /// What `slot` currently holds.
    pub fn slot_contents(&self, slot: &DescriptorSlot) -> Option<DummySlot> {
        let state = self.state.lock();
        state
            .heaps
            .get(&slot.heap)
            .and_then(|slots| slots.get(slot.index as usize))
            .copied()
            .flatten()
    }

    fn write_slot(&self, slot: &DescriptorSlot, contents: DummySlot) -> BackendResult<()> {
        let mut state = self.state.lock();
        let slots = state
            .heaps
            .get_mut(&slot.heap)
            .ok_or_else(|| BackendError::InvalidHandle(format!("unknown heap {:?}", slot.heap)))?;
        let entry = slots.get_mut(slot.index as usize).ok_or_else(|| {
            BackendError::InvalidHandle(format!("slot {} out of heap range", slot.index))
        })?;
        *entry = Some(contents);
        match contents {
            DummySlot::View { .. } => state.stats.views_written += 1,
            DummySlot::Sampler => state.stats.samplers_written += 1,
        }
        Ok(())
    }
}

fn check_range(size: u64, offset: u64, len: usize) -> BackendResult<std::ops::Range<usize>> {
    let end = offset
        .checked_add(len as u64)
        .filter(|end| *end <= size)
        .ok_or_else(|| {
            BackendError::MapFailed(format!("{len} bytes at {offset} outside {size} bytes"))
        })?;
    Ok(offset as usize..end as usize)
}

impl BackendBinding for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn create_resource(
        &self,
        description: &ResourceDescription,
        _initial_state: ResourceState,
    ) -> BackendResult<NativeResource> {
        let size = if description.is_buffer() {
            description.width
        } else {
            self.compute_copy_footprint(description).total_size
        };

        let mut state = self.state.lock();
        if let Some(budget) = self.budget
            && state.stats.bytes_in_use + size > budget
        {
            return Err(BackendError::OutOfMemory);
        }

        let contents = if description.is_buffer() && description.is_cpu_visible() {
            let len = usize::try_from(size).map_err(|_| BackendError::OutOfMemory)?;
            Some(vec![0u8; len])
        } else {
            None
        };

        let resource = NativeResource::new(NativePayload::Dummy);
        log::trace!(
            "DummyBackend: creating {:?} {} '{}' ({} bytes)",
            description.dimension,
            resource.id,
            description.display_label(),
            size
        );
        state
            .resources
            .insert(resource.id, DummyResource { size, contents });
        state.stats.resources_created += 1;
        state.stats.bytes_in_use += size;
        Ok(resource)
    }

    fn destroy_resource(&self, resource: &NativeResource) {
        let mut state = self.state.lock();
        match state.resources.remove(&resource.id) {
            Some(removed) => {
                log::trace!("DummyBackend: destroying {}", resource.id);
                state.stats.resources_destroyed += 1;
                state.stats.bytes_in_use -= removed.size;
                state.destroyed.push(resource.id);
            }
            None => log::warn!("DummyBackend: destroy of unknown resource {}", resource.id),
        }
    }

    fn write_mapped(
        &self,
        resource: &NativeResource,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        let target = state
            .resources
            .get_mut(&resource.id)
            .ok_or_else(|| BackendError::InvalidHandle(format!("unknown resource {}", resource.id)))?;
        let range = check_range(target.size, offset, data.len())?;
        let contents = target
            .contents
            .as_mut()
            .ok_or_else(|| BackendError::MapFailed("resource is not CPU-visible".into()))?;
        contents[range].copy_from_slice(data);
        Ok(())
    }

    fn read_mapped(
        &self,
        resource: &NativeResource,
        offset: u64,
        out: &mut [u8],
    ) -> BackendResult<()> {
        let state = self.state.lock();
        let source = state
            .resources
            .get(&resource.id)
            .ok_or_else(|| BackendError::InvalidHandle(format!("unknown resource {}", resource.id)))?;
        let range = check_range(source.size, offset, out.len())?;
        let contents = source
            .contents
            .as_ref()
            .ok_or_else(|| BackendError::MapFailed("resource is not CPU-visible".into()))?;
        out.copy_from_slice(&contents[range]);
        Ok(())
    }

    fn create_descriptor_heap(
        &self,
        kind: DescriptorSpaceKind,
        capacity: u32,
        shader_visible: bool,
    ) -> BackendResult<DescriptorHeap> {
        let heap = DescriptorHeap::synthetic(kind, capacity, shader_visible, DESCRIPTOR_INCREMENT);
        log::trace!("DummyBackend: creating {kind} heap with {capacity} slots");
        let mut state = self.state.lock();
        state.heaps.insert(heap.id, vec![None; capacity as usize]);
        state.stats.heaps_created += 1;
        Ok(heap)
    }

    fn destroy_descriptor_heap(&self, heap: &DescriptorHeap) {
        self.state.lock().heaps.remove(&heap.id);
    }

    fn create_view(
        &self,
        resource: &NativeResource,
        _description: &ResourceDescription,
        view: &ViewDescription,
        slot: &DescriptorSlot,
    ) -> BackendResult<()> {
        if !self.is_alive(resource.id) {
            return Err(BackendError::InvalidHandle(format!(
                "view of destroyed resource {}",
                resource.id
            )));
        }
        self.write_slot(
            slot,
            DummySlot::View {
                resource: resource.id,
                view: *view,
            },
        )
    }

    fn create_sampler(
        &self,
        _description: &SamplerDescription,
        slot: &DescriptorSlot,
    ) -> BackendResult<()> {
        self.write_slot(slot, DummySlot::Sampler)
    }

    fn compute_copy_footprint(&self, description: &ResourceDescription) -> CopyFootprint {
        CopyFootprint::compute(description, ROW_PITCH_ALIGNMENT, PLACEMENT_ALIGNMENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Format;

    #[test]
    fn test_buffer_round_trip() {
        let backend = DummyBackend::new();
        let desc = ResourceDescription::upload_buffer(16);
        let resource = backend
            .create_resource(&desc, ResourceState::GENERIC_READ)
            .unwrap();

        backend.write_mapped(&resource, 4, &[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 6];
        backend.read_mapped(&resource, 3, &mut out).unwrap();
        assert_eq!(out, [0, 1, 2, 3, 4, 0]);

        assert!(backend.write_mapped(&resource, 14, &[0; 4]).is_err());
    }

    #[test]
    fn test_device_local_not_mappable() {
        let backend = DummyBackend::new();
        let resource = backend
            .create_resource(&ResourceDescription::buffer(64), ResourceState::COMMON)
            .unwrap();
        assert!(matches!(
            backend.write_mapped(&resource, 0, &[0]),
            Err(BackendError::MapFailed(_))
        ));
    }

    #[test]
    fn test_memory_budget() {
        let backend = DummyBackend::with_memory_budget(1024);
        let a = backend
            .create_resource(&ResourceDescription::buffer(1000), ResourceState::COMMON)
            .unwrap();
        assert_eq!(
            backend
                .create_resource(&ResourceDescription::buffer(100), ResourceState::COMMON)
                .unwrap_err(),
            BackendError::OutOfMemory
        );
        backend.destroy_resource(&a);
        assert!(
            backend
                .create_resource(&ResourceDescription::buffer(100), ResourceState::COMMON)
                .is_ok()
        );
        assert_eq!(backend.stats().bytes_in_use, 100);
    }

    #[test]
    fn test_texture_uses_footprint_size() {
        let backend = DummyBackend::new();
        let desc = ResourceDescription::texture_2d(100, 4, Format::Rgba8Unorm);
        backend.create_resource(&desc, ResourceState::COMMON).unwrap();
        assert_eq!(backend.stats().bytes_in_use, 512 * 4);
    }

    #[test]
    fn test_view_slots() {
        let backend = DummyBackend::new();
        let desc = ResourceDescription::upload_buffer(256);
        let resource = backend
            .create_resource(&desc, ResourceState::GENERIC_READ)
            .unwrap();
        let heap = backend
            .create_descriptor_heap(DescriptorSpaceKind::CbvSrvUav, 2, true)
            .unwrap();

        let view = ViewDescription::constant_buffer(0, 256);
        backend
            .create_view(&resource, &desc, &view, &heap.slot(1))
            .unwrap();
        assert_eq!(
            backend.slot_contents(&heap.slot(1)),
            Some(DummySlot::View {
                resource: resource.id,
                view
            })
        );
        assert_eq!(backend.slot_contents(&heap.slot(0)), None);
        assert!(
            backend
                .create_view(&resource, &desc, &view, &heap.slot(2))
                .is_err()
        );
    }
}
