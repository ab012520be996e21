//! Vulkan physical and logical device selection.

use std::ffi::CStr;

use ash::vk;

use crate::backend::BackendError;

/// A selected physical device and what the backend needs to know about it.
pub struct PhysicalDeviceInfo {
    pub physical_device: vk::PhysicalDevice,
    pub queue_family: u32,
    pub limits: vk::PhysicalDeviceLimits,
    pub sampler_anisotropy: bool,
}

/// Select the best physical device, preferring discrete GPUs.
pub fn select_physical_device(instance: &ash::Instance) -> Result<PhysicalDeviceInfo, BackendError> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        BackendError::InitializationFailed(format!("Failed to enumerate physical devices: {e:?}"))
    })?;

    let mut best: Option<(u32, PhysicalDeviceInfo)> = None;
    for device in devices {
        let Some(queue_family) = find_queue_family(instance, device) else {
            continue;
        };
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };

        let mut score = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            _ => 0,
        };
        score += properties.limits.max_image_dimension2_d / 1024;

        // SAFETY: device_name is a null-terminated string filled in by the driver
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!(
            "Found GPU: {:?} (type: {:?}, score: {})",
            name,
            properties.device_type,
            score
        );

        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((
                score,
                PhysicalDeviceInfo {
                    physical_device: device,
                    queue_family,
                    limits: properties.limits,
                    sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
                },
            ));
        }
    }

    best.map(|(_, info)| info)
        .ok_or_else(|| BackendError::InitializationFailed("No Vulkan-capable GPU found".into()))
}

/// First queue family with graphics or compute support.
fn find_queue_family(instance: &ash::Instance, device: vk::PhysicalDevice) -> Option<u32> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    families
        .iter()
        .position(|family| {
            family
                .queue_flags
                .intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
        })
        .map(|index| index as u32)
}

/// Create the logical device.
pub fn create_logical_device(
    instance: &ash::Instance,
    info: &PhysicalDeviceInfo,
) -> Result<ash::Device, BackendError> {
    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(info.queue_family)
        .queue_priorities(&queue_priorities)];

    let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(info.sampler_anisotropy);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&features);

    unsafe { instance.create_device(info.physical_device, &create_info, None) }.map_err(|e| {
        BackendError::InitializationFailed(format!("Failed to create logical device: {e:?}"))
    })
}
