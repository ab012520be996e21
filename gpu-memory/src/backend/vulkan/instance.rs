//! Headless Vulkan instance creation.
//!
//! The memory layer never presents, so no surface extensions are requested.
//! Validation output is routed into the `log` facade.

use std::ffi::{CStr, c_void};

use ash::vk;

use crate::backend::BackendError;

/// Buffer, image and descriptor work only needs core 1.2.
const REQUIRED_API_VERSION: u32 = vk::make_api_version(0, 1, 2, 0);

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance plus the optional validation messenger.
pub struct InstanceBundle {
    pub instance: ash::Instance,
    pub debug_utils: Option<ash::ext::debug_utils::Instance>,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl InstanceBundle {
    /// Destroy the messenger and the instance.
    ///
    /// # Safety
    ///
    /// Every object created from the instance must already be destroyed.
    pub unsafe fn destroy(&self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Create a Vulkan instance, with validation layers when requested and present.
pub fn create_instance(
    entry: &ash::Entry,
    validation_enabled: bool,
) -> Result<InstanceBundle, BackendError> {
    let validation_available = validation_enabled && has_validation_layer(entry);
    if validation_enabled && !validation_available {
        log::warn!("Validation layers requested but not available");
    }

    let app_info = vk::ApplicationInfo::default()
        .application_name(c"RedLilium")
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"RedLilium Memory")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(REQUIRED_API_VERSION);

    let mut extensions = Vec::new();
    if validation_available {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[allow(unused_mut)]
    let mut create_flags = vk::InstanceCreateFlags::empty();

    #[cfg(target_os = "macos")]
    {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
        create_flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let layer_names = if validation_available {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        Vec::new()
    };

    let create_info = vk::InstanceCreateInfo::default()
        .flags(create_flags)
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        BackendError::InitializationFailed(format!("Failed to create Vulkan instance: {e:?}"))
    })?;

    if !validation_available {
        return Ok(InstanceBundle {
            instance,
            debug_utils: None,
            debug_messenger: None,
        });
    }

    let debug_utils = ash::ext::debug_utils::Instance::new(entry, &instance);
    let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    match unsafe { debug_utils.create_debug_utils_messenger(&messenger_info, None) } {
        Ok(messenger) => Ok(InstanceBundle {
            instance,
            debug_utils: Some(debug_utils),
            debug_messenger: Some(messenger),
        }),
        Err(e) => {
            unsafe { instance.destroy_instance(None) };
            Err(BackendError::InitializationFailed(format!(
                "Failed to create debug messenger: {e:?}"
            )))
        }
    }
}

fn has_validation_layer(entry: &ash::Entry) -> bool {
    let Ok(layers) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
        return false;
    };
    layers.iter().any(|layer| {
        // SAFETY: layer names are null-terminated strings filled in by the loader
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER_NAME
    })
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the driver passes either null or valid callback data
    let message = unsafe { callback_data.as_ref() }
        .filter(|data| !data.p_message.is_null())
        .map(|data| unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy())
        .unwrap_or_default();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {message}");
    } else {
        log::warn!("[Vulkan] {message}");
    }

    vk::FALSE
}
