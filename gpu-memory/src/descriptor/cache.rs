//! Descriptor deduplication keyed by native resource identity.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::backend::{DescriptorSlot, ResourceId};
use crate::resources::Allocation;
use crate::types::{DescriptorSpaceKind, ViewDescription};

#[derive(Debug, Default)]
struct CacheBucket {
    /// Allocations that populated or queried this bucket.
    owners: Vec<Weak<Allocation>>,
    entries: Vec<(ViewDescription, DescriptorSlot)>,
}

impl CacheBucket {
    /// Drop owners that are gone or released. Returns true if any remain.
    fn retain_live_owners(&mut self) -> bool {
        self.owners
            .retain(|owner| owner.upgrade().is_some_and(|a| !a.is_released()));
        !self.owners.is_empty()
    }

    fn add_owner(&mut self, allocation: &Arc<Allocation>) {
        let known = self
            .owners
            .iter()
            .any(|owner| std::ptr::eq(owner.as_ptr(), Arc::as_ptr(allocation)));
        if !known {
            self.owners.push(Arc::downgrade(allocation));
        }
    }
}

/// Map from (resource identity, view description) to an existing slot.
///
/// Buckets remember the allocations behind them weakly. A bucket whose
/// allocations are all dropped or released is stale and is discarded the
/// next time it is looked up or pruned; its slots are not reclaimed.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    buckets: HashMap<ResourceId, CacheBucket>,
    hits: u64,
    misses: u64,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the slot of a view equal to `view` on `allocation`'s resource.
    pub fn lookup(
        &mut self,
        allocation: &Arc<Allocation>,
        view: &ViewDescription,
    ) -> Option<DescriptorSlot> {
        let id = allocation.resource_id();
        let Some(bucket) = self.buckets.get_mut(&id) else {
            self.misses += 1;
            return None;
        };

        if !bucket.retain_live_owners() {
            log::debug!("Dropping stale descriptor cache bucket for {id}");
            self.buckets.remove(&id);
            self.misses += 1;
            return None;
        }
        bucket.add_owner(allocation);

        let found = bucket
            .entries
            .iter()
            .find(|(cached, _)| cached == view)
            .map(|(_, slot)| *slot);
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    /// Record that `slot` holds `view` of `allocation`'s resource.
    pub fn insert(
        &mut self,
        allocation: &Arc<Allocation>,
        view: ViewDescription,
        slot: DescriptorSlot,
    ) {
        let bucket = self.buckets.entry(allocation.resource_id()).or_default();
        bucket.add_owner(allocation);
        bucket.entries.push((view, slot));
    }

    /// Forget every entry pointing into `space`. Returns how many were dropped.
    pub fn evict_space(&mut self, space: DescriptorSpaceKind) -> usize {
        let mut evicted = 0;
        self.buckets.retain(|_, bucket| {
            let before = bucket.entries.len();
            bucket.entries.retain(|(_, slot)| slot.space != space);
            evicted += before - bucket.entries.len();
            !bucket.entries.is_empty()
        });
        evicted
    }

    /// Drop the bucket of `id` if it has no live owner left.
    pub fn prune_resource(&mut self, id: ResourceId) -> bool {
        let stale = self
            .buckets
            .get_mut(&id)
            .is_some_and(|bucket| !bucket.retain_live_owners());
        if stale {
            self.buckets.remove(&id);
        }
        stale
    }

    /// Drop every stale bucket. Returns how many were dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.retain_live_owners());
        before - self.buckets.len()
    }

    /// Number of cached views.
    pub fn len(&self) -> usize {
        self.buckets.values().map(|b| b.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::backend::{BackendBinding, DescriptorHeap};
    use crate::types::{Format, ResourceDescription, ViewDimension};

    fn allocation(backend: &Arc<DummyBackend>) -> Arc<Allocation> {
        let desc = ResourceDescription::texture_2d(16, 16, Format::Rgba8Unorm);
        let native = backend
            .create_resource(&desc, desc.initial_state)
            .unwrap();
        Arc::new(Allocation::new(desc, native, None, backend.clone(), true))
    }

    fn slot(kind: DescriptorSpaceKind, index: u32) -> DescriptorSlot {
        DescriptorHeap::synthetic(kind, 16, kind.is_shader_visible(), 32).slot(index)
    }

    fn srv() -> ViewDescription {
        ViewDescription::texture_srv(Format::Rgba8Unorm, ViewDimension::Texture2D)
    }

    #[test]
    fn test_hit_after_insert() {
        let backend = Arc::new(DummyBackend::new());
        let alloc = allocation(&backend);
        let mut cache = DescriptorCache::new();

        assert!(cache.lookup(&alloc, &srv()).is_none());
        let slot = slot(DescriptorSpaceKind::CbvSrvUav, 0);
        cache.insert(&alloc, srv(), slot);

        assert_eq!(cache.lookup(&alloc, &srv()), Some(slot));
        assert!(cache.lookup(&alloc, &srv().with_mips(0, 1)).is_none());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_keyed_by_resource_identity() {
        let backend = Arc::new(DummyBackend::new());
        let alloc = allocation(&backend);
        let alias = Arc::new(Allocation::new(
            alloc.description().clone(),
            alloc.native().clone(),
            None,
            backend.clone(),
            false,
        ));
        let mut cache = DescriptorCache::new();
        let slot = slot(DescriptorSpaceKind::CbvSrvUav, 0);
        cache.insert(&alloc, srv(), slot);

        assert_eq!(cache.lookup(&alias, &srv()), Some(slot));
    }

    #[test]
    fn test_stale_bucket_dropped() {
        let backend = Arc::new(DummyBackend::new());
        let alloc = allocation(&backend);
        let mut cache = DescriptorCache::new();
        cache.insert(&alloc, srv(), slot(DescriptorSpaceKind::CbvSrvUav, 0));

        alloc.mark_released();
        assert!(cache.lookup(&alloc, &srv()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prune_dropped_allocations() {
        let backend = Arc::new(DummyBackend::new());
        let kept = allocation(&backend);
        let dropped = allocation(&backend);
        let mut cache = DescriptorCache::new();
        cache.insert(&kept, srv(), slot(DescriptorSpaceKind::CbvSrvUav, 0));
        cache.insert(&dropped, srv(), slot(DescriptorSpaceKind::CbvSrvUav, 1));

        let dropped_id = dropped.resource_id();
        drop(dropped);
        assert!(cache.prune_resource(dropped_id));
        assert!(!cache.prune_resource(kept.resource_id()));
        assert_eq!(cache.prune(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evict_space() {
        let backend = Arc::new(DummyBackend::new());
        let alloc = allocation(&backend);
        let mut cache = DescriptorCache::new();
        let rtv = ViewDescription::render_target(Format::Rgba8Unorm, ViewDimension::Texture2D);
        cache.insert(&alloc, srv(), slot(DescriptorSpaceKind::CbvSrvUav, 0));
        cache.insert(&alloc, rtv, slot(DescriptorSpaceKind::RenderTarget, 0));

        assert_eq!(cache.evict_space(DescriptorSpaceKind::RenderTarget), 1);
        assert!(cache.lookup(&alloc, &rtv).is_none());
        assert!(cache.lookup(&alloc, &srv()).is_some());
    }
}
