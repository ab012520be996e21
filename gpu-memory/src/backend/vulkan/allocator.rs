//! GPU memory allocation through gpu-allocator.

use ash::vk;
use gpu_allocator::AllocationError;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};

use crate::backend::BackendError;

/// Create a memory allocator for the Vulkan device.
pub fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
) -> Result<Allocator, BackendError> {
    Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device,
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: gpu_allocator::AllocationSizes::default(),
    })
    .map_err(|e| {
        BackendError::InitializationFailed(format!("Failed to create memory allocator: {e}"))
    })
}

/// Map an allocator failure onto a backend error.
pub fn allocation_error(error: AllocationError) -> BackendError {
    match error {
        AllocationError::OutOfMemory => BackendError::OutOfMemory,
        other => BackendError::ResourceCreationFailed(format!("Failed to allocate memory: {other}")),
    }
}

/// Map a Vulkan result code onto a backend error.
pub fn vk_error(context: &str, result: vk::Result) -> BackendError {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            BackendError::OutOfMemory
        }
        other => BackendError::ResourceCreationFailed(format!("{context}: {other:?}")),
    }
}
