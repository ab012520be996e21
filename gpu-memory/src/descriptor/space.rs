//! Descriptor spaces: bounded, monotonically growing slot pools.

use crate::backend::{CpuHandle, DescriptorHeap, DescriptorSlot, GpuHandle};
use crate::error::{MemoryError, MemoryResult};
use crate::types::DescriptorSpaceKind;

/// Fill state of a descriptor space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceState {
    /// No slot handed out yet.
    Empty,
    /// Some slots handed out, some free.
    Growing,
    /// Every slot handed out. Only a reset leaves this state.
    Full,
}

/// A descriptor space carving slots out of one native heap.
///
/// Slots are handed out strictly in order and never freed individually;
/// [`DescriptorSpace::reset`] rewinds the whole space.
#[derive(Debug)]
pub struct DescriptorSpace {
    heap: DescriptorHeap,
    cursor: u32,
}

impl DescriptorSpace {
    pub(crate) fn new(heap: DescriptorHeap) -> Self {
        Self { heap, cursor: 0 }
    }

    pub fn kind(&self) -> DescriptorSpaceKind {
        self.heap.kind
    }

    pub fn capacity(&self) -> u32 {
        self.heap.capacity
    }

    /// Index of the next free slot.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn remaining(&self) -> u32 {
        self.heap.capacity - self.cursor
    }

    pub fn is_shader_visible(&self) -> bool {
        self.heap.shader_visible
    }

    pub fn heap(&self) -> &DescriptorHeap {
        &self.heap
    }

    pub fn state(&self) -> SpaceState {
        if self.cursor == 0 && self.heap.capacity > 0 {
            SpaceState::Empty
        } else if self.cursor < self.heap.capacity {
            SpaceState::Growing
        } else {
            SpaceState::Full
        }
    }

    /// Claim the next free slot.
    pub fn allocate(&mut self) -> MemoryResult<DescriptorSlot> {
        self.allocate_contiguous(1)
    }

    /// Claim `count` consecutive slots and return the first one.
    ///
    /// Either every slot is claimed or none is.
    pub fn allocate_contiguous(&mut self, count: u32) -> MemoryResult<DescriptorSlot> {
        if count == 0 {
            return Err(MemoryError::InvalidDescription(
                "cannot reserve zero descriptor slots".into(),
            ));
        }
        if count > self.remaining() {
            log::error!(
                "Descriptor space '{}' exhausted: {} of {} slots used, {} requested",
                self.heap.kind,
                self.cursor,
                self.heap.capacity,
                count
            );
            return Err(MemoryError::SlotSpaceExhausted {
                space: self.heap.kind,
                capacity: self.heap.capacity,
            });
        }
        let slot = self.heap.slot(self.cursor);
        self.cursor += count;
        Ok(slot)
    }

    /// CPU handle the next allocation will return, if any slot is free.
    pub fn available_cpu_handle(&self) -> Option<CpuHandle> {
        (self.cursor < self.heap.capacity).then(|| self.heap.slot(self.cursor).cpu)
    }

    /// GPU handle the next allocation will return, for shader-visible spaces.
    pub fn available_gpu_handle(&self) -> Option<GpuHandle> {
        if self.cursor < self.heap.capacity {
            self.heap.slot(self.cursor).gpu
        } else {
            None
        }
    }

    /// Rewind the cursor. Previously handed out slots will be reused.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(capacity: u32, kind: DescriptorSpaceKind) -> DescriptorSpace {
        DescriptorSpace::new(DescriptorHeap::synthetic(
            kind,
            capacity,
            kind.is_shader_visible(),
            32,
        ))
    }

    #[test]
    fn test_state_machine() {
        let mut space = space(2, DescriptorSpaceKind::CbvSrvUav);
        assert_eq!(space.state(), SpaceState::Empty);
        space.allocate().unwrap();
        assert_eq!(space.state(), SpaceState::Growing);
        space.allocate().unwrap();
        assert_eq!(space.state(), SpaceState::Full);
        space.reset();
        assert_eq!(space.state(), SpaceState::Empty);
    }

    #[test]
    fn test_exhaustion_at_capacity_plus_one() {
        let mut space = space(3, DescriptorSpaceKind::RenderTarget);
        let indices: Vec<u32> = (0..3).map(|_| space.allocate().unwrap().index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let err = space.allocate().unwrap_err();
        assert_eq!(
            err,
            MemoryError::SlotSpaceExhausted {
                space: DescriptorSpaceKind::RenderTarget,
                capacity: 3
            }
        );
        assert_eq!(space.cursor(), 3);
    }

    #[test]
    fn test_available_handles_do_not_consume() {
        let mut space = space(2, DescriptorSpaceKind::CbvSrvUav);
        let cpu = space.available_cpu_handle().unwrap();
        let gpu = space.available_gpu_handle().unwrap();
        assert_eq!(space.cursor(), 0);

        let slot = space.allocate().unwrap();
        assert_eq!(slot.cpu, cpu);
        assert_eq!(slot.gpu, Some(gpu));

        space.allocate().unwrap();
        assert!(space.available_cpu_handle().is_none());
    }

    #[test]
    fn test_cpu_only_space_has_no_gpu_handle() {
        let space = space(2, DescriptorSpaceKind::DepthStencil);
        assert!(space.available_cpu_handle().is_some());
        assert!(space.available_gpu_handle().is_none());
    }

    #[test]
    fn test_contiguous_is_all_or_nothing() {
        let mut space = space(4, DescriptorSpaceKind::Sampler);
        let first = space.allocate_contiguous(3).unwrap();
        assert_eq!(first.index, 0);
        assert!(space.allocate_contiguous(2).is_err());
        assert_eq!(space.cursor(), 3);
        assert_eq!(space.allocate().unwrap().index, 3);
    }
}
