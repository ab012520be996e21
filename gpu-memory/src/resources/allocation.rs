//! Reference-counted allocations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::backend::{BackendBinding, NativeResource, ResourceId};
use crate::types::{Residency, ResourceDescription, ResourceState};

use super::CopyFootprint;

/// A state change the caller must record as a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTransition {
    pub before: ResourceState,
    pub after: ResourceState,
}

/// An owning handle to one native resource.
///
/// Allocations are created by [`MemoryManager`](crate::MemoryManager) and
/// shared as `Arc<Allocation>`. Every [`Descriptor`](crate::Descriptor) holds
/// one of those references, so the native resource outlives all of its views:
/// it is destroyed when the last reference drops.
///
/// The description is immutable. The current GPU-visibility state changes
/// only through [`Allocation::transition`].
pub struct Allocation {
    description: ResourceDescription,
    native: NativeResource,
    footprint: Option<CopyFootprint>,
    state: AtomicU32,
    needs_release: AtomicBool,
    released: AtomicBool,
    backend: Arc<dyn BackendBinding>,
}

impl Allocation {
    /// Wrap a native resource (called by MemoryManager).
    ///
    /// `owned` is false for imported resources, which are never destroyed
    /// through this allocation.
    pub(crate) fn new(
        description: ResourceDescription,
        native: NativeResource,
        footprint: Option<CopyFootprint>,
        backend: Arc<dyn BackendBinding>,
        owned: bool,
    ) -> Self {
        let state = description.effective_initial_state();
        Self {
            description,
            native,
            footprint,
            state: AtomicU32::new(state.bits()),
            needs_release: AtomicBool::new(owned),
            released: AtomicBool::new(false),
            backend,
        }
    }

    /// Get the creation description.
    pub fn description(&self) -> &ResourceDescription {
        &self.description
    }

    /// Get the label, if set.
    pub fn label(&self) -> Option<&str> {
        self.description.label.as_deref()
    }

    /// Identity of the native resource.
    pub fn resource_id(&self) -> ResourceId {
        self.native.id
    }

    /// Get the native resource.
    pub fn native(&self) -> &NativeResource {
        &self.native
    }

    /// Upload layout, for textures.
    pub fn footprint(&self) -> Option<&CopyFootprint> {
        self.footprint.as_ref()
    }

    pub fn residency(&self) -> Residency {
        self.description.residency
    }

    /// Declared width: bytes for buffers, texels for textures.
    pub fn width(&self) -> u64 {
        self.description.width
    }

    /// The state the last transition left the resource in.
    pub fn current_state(&self) -> ResourceState {
        ResourceState::from_bits_retain(self.state.load(Ordering::Acquire))
    }

    /// Move the resource to `new_state`.
    ///
    /// Returns the barrier to record, or `None` if the resource is already in
    /// that state.
    pub fn transition(&self, new_state: ResourceState) -> Option<ResourceTransition> {
        let before =
            ResourceState::from_bits_retain(self.state.swap(new_state.bits(), Ordering::AcqRel));
        (before != new_state).then_some(ResourceTransition {
            before,
            after: new_state,
        })
    }

    /// Whether dropping this allocation still destroys the native resource.
    pub fn needs_release(&self) -> bool {
        self.needs_release.load(Ordering::Acquire)
    }

    /// Whether the allocation was released through the manager.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Flag the allocation as released. Returns false if it already was.
    pub(crate) fn mark_released(&self) -> bool {
        !self.released.swap(true, Ordering::AcqRel)
    }

    fn destroy_native(&self) {
        if self.needs_release.swap(false, Ordering::AcqRel) {
            log::trace!(
                "Destroying {} '{}'",
                self.native.id,
                self.description.display_label()
            );
            self.backend.destroy_resource(&self.native);
        }
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.destroy_native();
    }
}

impl std::fmt::Debug for Allocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocation")
            .field("id", &self.native.id)
            .field("label", &self.description.label)
            .field("dimension", &self.description.dimension)
            .field("width", &self.description.width)
            .field("residency", &self.description.residency)
            .field("state", &self.current_state())
            .field("released", &self.is_released())
            .finish()
    }
}

static_assertions::assert_impl_all!(Allocation: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    fn allocate(backend: &Arc<DummyBackend>, desc: ResourceDescription, owned: bool) -> Allocation {
        let native = backend
            .create_resource(&desc, desc.effective_initial_state())
            .unwrap();
        Allocation::new(desc, native, None, backend.clone(), owned)
    }

    #[test]
    fn test_transition() {
        let backend = Arc::new(DummyBackend::new());
        let alloc = allocate(&backend, ResourceDescription::buffer(64), true);
        assert_eq!(alloc.current_state(), ResourceState::COMMON);

        let barrier = alloc.transition(ResourceState::COPY_DEST).unwrap();
        assert_eq!(barrier.before, ResourceState::COMMON);
        assert_eq!(barrier.after, ResourceState::COPY_DEST);
        assert_eq!(alloc.current_state(), ResourceState::COPY_DEST);

        assert!(alloc.transition(ResourceState::COPY_DEST).is_none());
    }

    #[test]
    fn test_upload_starts_generic_read() {
        let backend = Arc::new(DummyBackend::new());
        let alloc = allocate(&backend, ResourceDescription::upload_buffer(64), true);
        assert_eq!(alloc.current_state(), ResourceState::GENERIC_READ);
    }

    #[test]
    fn test_drop_destroys_owned_only() {
        let backend = Arc::new(DummyBackend::new());
        let owned = allocate(&backend, ResourceDescription::buffer(64), true);
        let id = owned.resource_id();

        let imported = Allocation::new(
            owned.description().clone(),
            owned.native().clone(),
            None,
            backend.clone(),
            false,
        );
        assert!(!imported.needs_release());
        drop(imported);
        assert!(backend.is_alive(id));

        drop(owned);
        assert!(!backend.is_alive(id));
        assert_eq!(backend.stats().resources_destroyed, 1);
    }

    #[test]
    fn test_mark_released_once() {
        let backend = Arc::new(DummyBackend::new());
        let alloc = allocate(&backend, ResourceDescription::buffer(64), true);
        assert!(alloc.mark_released());
        assert!(!alloc.mark_released());
        assert!(alloc.is_released());
    }
}
