//! Memory manager configuration.

use crate::types::DescriptorSpaceKind;

/// Backend selection for the memory manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Try Vulkan, then wgpu, then fall back to the dummy backend.
    #[default]
    Auto,
    /// CPU-memory backend, always available.
    Dummy,
    /// wgpu backend (requires the `wgpu-backend` feature).
    Wgpu,
    /// Vulkan backend via ash (requires the `vulkan-backend` feature).
    Vulkan,
}

/// Fixed slot capacity of each descriptor space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorCapacities {
    pub cbv_srv_uav: u32,
    pub sampler: u32,
    pub render_target: u32,
    pub depth_stencil: u32,
}

impl DescriptorCapacities {
    /// Capacity of the space of `kind`.
    pub fn get(&self, kind: DescriptorSpaceKind) -> u32 {
        match kind {
            DescriptorSpaceKind::CbvSrvUav => self.cbv_srv_uav,
            DescriptorSpaceKind::Sampler => self.sampler,
            DescriptorSpaceKind::RenderTarget => self.render_target,
            DescriptorSpaceKind::DepthStencil => self.depth_stencil,
        }
    }

    /// Same capacity for every space. Handy for tests.
    pub fn uniform(capacity: u32) -> Self {
        Self {
            cbv_srv_uav: capacity,
            sampler: capacity,
            render_target: capacity,
            depth_stencil: capacity,
        }
    }
}

impl Default for DescriptorCapacities {
    fn default() -> Self {
        Self {
            cbv_srv_uav: 8192,
            sampler: 256,
            render_target: 512,
            depth_stencil: 128,
        }
    }
}

/// Configuration for creating a [`MemoryManager`](crate::MemoryManager).
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Which backend to use.
    pub backend: BackendType,
    /// Request backend validation layers.
    pub validation: bool,
    /// Capacity of each descriptor space. Never grown at runtime.
    pub descriptor_capacities: DescriptorCapacities,
    /// Frames a temp buffer stays unavailable after being handed out.
    pub temp_buffer_cooldown: i32,
    /// Evict temp buffers idle for at least this many frames. `None` keeps
    /// every entry for the lifetime of the manager.
    pub temp_buffer_eviction: Option<u32>,
    /// Frames a released allocation is kept alive before its memory is freed.
    pub release_latency_frames: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            validation: false,
            descriptor_capacities: DescriptorCapacities::default(),
            temp_buffer_cooldown: 3,
            temp_buffer_eviction: None,
            release_latency_frames: 0,
        }
    }
}

impl MemoryConfig {
    /// Set the backend.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the descriptor space capacities.
    pub fn with_descriptor_capacities(mut self, capacities: DescriptorCapacities) -> Self {
        self.descriptor_capacities = capacities;
        self
    }

    /// Set the temp buffer cooldown in frames.
    pub fn with_temp_buffer_cooldown(mut self, frames: i32) -> Self {
        self.temp_buffer_cooldown = frames;
        self
    }

    /// Evict temp buffers idle for `frames` frames.
    pub fn with_temp_buffer_eviction(mut self, frames: u32) -> Self {
        self.temp_buffer_eviction = Some(frames);
        self
    }

    /// Keep released allocations alive for `frames` frames.
    pub fn with_release_latency(mut self, frames: u32) -> Self {
        self.release_latency_frames = frames;
        self
    }
}
