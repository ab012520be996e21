//! Common utilities for memory-layer integration tests.
//!
//! Tests run against every backend; backends that are not compiled in or
//! cannot find a device on this machine are skipped.

use std::sync::Arc;

use redlilium_gpu_memory::{
    Allocation, BackendType, DescriptorCapacities, Format, MemoryConfig, MemoryManager,
    ResourceDescription, ResourceUsage,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Backends under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend (CPU memory only).
    Dummy,
    /// Vulkan backend (native via ash).
    Vulkan,
    /// WebGPU backend (via wgpu).
    WebGpu,
}

impl Backend {
    /// Check if this backend was compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            Backend::Vulkan => cfg!(feature = "vulkan-backend"),
            Backend::WebGpu => cfg!(feature = "wgpu-backend"),
        }
    }

    fn backend_type(self) -> BackendType {
        match self {
            Backend::Dummy => BackendType::Dummy,
            Backend::Vulkan => BackendType::Vulkan,
            Backend::WebGpu => BackendType::Wgpu,
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Memory manager plus the backend it runs on.
pub struct TestContext {
    #[allow(dead_code)]
    pub backend: Backend,
    pub memory: MemoryManager,
}

impl TestContext {
    /// Create a context with default capacities.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_config(backend, MemoryConfig::default())
    }

    /// Create a context from `config`, overriding its backend type.
    pub fn with_config(backend: Backend, config: MemoryConfig) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        if !backend.is_available() {
            return None;
        }

        let config = config.with_backend(backend.backend_type());
        match MemoryManager::new(config) {
            Ok(memory) => Some(Self { backend, memory }),
            Err(e) => {
                eprintln!("Backend {backend:?} failed to initialize: {e}");
                None
            }
        }
    }

    /// Create a context with `capacity` slots in every descriptor space.
    #[allow(dead_code)]
    pub fn with_capacity(backend: Backend, capacity: u32) -> Option<Self> {
        Self::with_config(
            backend,
            MemoryConfig::default()
                .with_descriptor_capacities(DescriptorCapacities::uniform(capacity)),
        )
    }

    /// Allocate a CPU-writable buffer of `size` bytes.
    #[allow(dead_code)]
    pub fn upload_buffer(&mut self, size: u64, label: &str) -> Arc<Allocation> {
        self.memory
            .allocate_buffer(&ResourceDescription::upload_buffer(size).with_label(label))
            .expect("upload buffer allocation failed")
    }

    /// Allocate a 2D RGBA8 texture usable as a render target.
    #[allow(dead_code)]
    pub fn render_texture(&mut self, width: u32, height: u32) -> Arc<Allocation> {
        self.memory
            .allocate_texture(
                &ResourceDescription::texture_2d(width, height, Format::Rgba8Unorm)
                    .with_label("render texture")
                    .with_usage(ResourceUsage::RENDER_TARGET),
            )
            .expect("texture allocation failed")
    }
}

/// Generate a deterministic byte pattern.
#[allow(dead_code)]
pub fn generate_test_pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 7 + 3) as u8).collect()
}
