//! Frame-cooldown pool for transient upload buffers.
//!
//! A buffer handed out by the pool is unavailable for `cooldown` frames, long
//! enough for the GPU to finish reading what was staged in it. After that any
//! request with an equal [`ResourceDescription`] gets it back instead of a
//! fresh allocation.
//!
//! Entries are kept for the lifetime of the pool unless the owner evicts idle
//! ones with [`TempBufferPool::evict_idle`].

use std::sync::Arc;

use crate::resources::Allocation;
use crate::types::ResourceDescription;

/// One pooled buffer.
#[derive(Debug)]
pub struct TempBufferEntry {
    pub description: ResourceDescription,
    pub allocation: Arc<Allocation>,
    /// Frames left before reuse; eligible at zero or below. Keeps counting
    /// down while idle, so `-n` means idle for `n` frames.
    pub frames_until_reuse: i32,
}

/// Pool of temp upload buffers keyed by description.
#[derive(Debug)]
pub struct TempBufferPool {
    entries: Vec<TempBufferEntry>,
    cooldown: i32,
}

impl TempBufferPool {
    /// Create an empty pool with the given cooldown in frames.
    pub fn new(cooldown: i32) -> Self {
        Self {
            entries: Vec::new(),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> i32 {
        self.cooldown
    }

    /// Take an eligible buffer matching `description`, restarting its cooldown.
    ///
    /// Entries whose allocation was released elsewhere are dropped first.
    pub fn try_get_buffer(&mut self, description: &ResourceDescription) -> Option<Arc<Allocation>> {
        self.entries.retain(|entry| !entry.allocation.is_released());

        let entry = self.entries.iter_mut().find(|entry| {
            entry.frames_until_reuse <= 0 && entry.description == *description
        })?;
        entry.frames_until_reuse = self.cooldown;
        log::debug!(
            "Reusing temp buffer {} '{}'",
            entry.allocation.resource_id(),
            description.display_label()
        );
        Some(entry.allocation.clone())
    }

    /// Register a freshly allocated buffer, already cooling down.
    pub fn add_buffer_to_pool(
        &mut self,
        description: ResourceDescription,
        allocation: Arc<Allocation>,
    ) {
        self.entries.push(TempBufferEntry {
            description,
            allocation,
            frames_until_reuse: self.cooldown,
        });
    }

    /// Advance every cooldown by one frame.
    pub fn tick_frame(&mut self) {
        for entry in &mut self.entries {
            entry.frames_until_reuse = entry.frames_until_reuse.saturating_sub(1);
        }
    }

    /// Remove entries that have been eligible but unused for at least
    /// `idle_frames` frames and return their allocations.
    pub fn evict_idle(&mut self, idle_frames: u32) -> Vec<Arc<Allocation>> {
        let threshold = -i32::try_from(idle_frames).unwrap_or(i32::MAX);
        let mut evicted = Vec::new();
        self.entries.retain(|entry| {
            if entry.frames_until_reuse <= threshold {
                evicted.push(entry.allocation.clone());
                false
            } else {
                true
            }
        });
        if !evicted.is_empty() {
            log::debug!("Evicted {} idle temp buffers", evicted.len());
        }
        evicted
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TempBufferEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendBinding;
    use crate::backend::dummy::DummyBackend;

    fn buffer(backend: &Arc<DummyBackend>, size: u64) -> (ResourceDescription, Arc<Allocation>) {
        let desc = ResourceDescription::upload_buffer(size).with_label("staging");
        let native = backend
            .create_resource(&desc, desc.effective_initial_state())
            .unwrap();
        let alloc = Arc::new(Allocation::new(desc.clone(), native, None, backend.clone(), true));
        (desc, alloc)
    }

    #[test]
    fn test_cooldown_of_three_frames() {
        let backend = Arc::new(DummyBackend::new());
        let mut pool = TempBufferPool::new(3);
        let (desc, alloc) = buffer(&backend, 256);
        pool.add_buffer_to_pool(desc.clone(), alloc.clone());

        for _ in 0..2 {
            assert!(pool.try_get_buffer(&desc).is_none());
            pool.tick_frame();
        }
        assert!(pool.try_get_buffer(&desc).is_none());
        pool.tick_frame();

        let reused = pool.try_get_buffer(&desc).unwrap();
        assert!(Arc::ptr_eq(&reused, &alloc));
        // Handed out again: cooling down for another three frames.
        assert!(pool.try_get_buffer(&desc).is_none());
    }

    #[test]
    fn test_description_must_match() {
        let backend = Arc::new(DummyBackend::new());
        let mut pool = TempBufferPool::new(0);
        let (desc, alloc) = buffer(&backend, 256);
        pool.add_buffer_to_pool(desc.clone(), alloc);

        assert!(
            pool.try_get_buffer(&ResourceDescription::upload_buffer(512).with_label("staging"))
                .is_none()
        );
        assert!(pool.try_get_buffer(&desc.clone().with_label("other")).is_none());
        assert!(pool.try_get_buffer(&desc).is_some());
    }

    #[test]
    fn test_released_entries_skipped() {
        let backend = Arc::new(DummyBackend::new());
        let mut pool = TempBufferPool::new(0);
        let (desc, alloc) = buffer(&backend, 64);
        pool.add_buffer_to_pool(desc.clone(), alloc.clone());

        alloc.mark_released();
        assert!(pool.try_get_buffer(&desc).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_evict_idle() {
        let backend = Arc::new(DummyBackend::new());
        let mut pool = TempBufferPool::new(1);
        let (desc, alloc) = buffer(&backend, 64);
        pool.add_buffer_to_pool(desc, alloc);

        // 1 -> 0 -> -1 -> -2, then evicted at -3
        for _ in 0..3 {
            pool.tick_frame();
            assert!(pool.evict_idle(3).is_empty());
        }
        pool.tick_frame();
        assert_eq!(pool.evict_idle(3).len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_clear() {
        let backend = Arc::new(DummyBackend::new());
        let mut pool = TempBufferPool::new(3);
        let (desc, alloc) = buffer(&backend, 64);
        pool.add_buffer_to_pool(desc, alloc);
        pool.clear();
        assert_eq!(pool.len(), 0);
    }
}
