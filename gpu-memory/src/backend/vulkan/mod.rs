//! Native Vulkan backend binding using ash and gpu-allocator.
//!
//! Memory comes from gpu-allocator: device-local for default residency,
//! persistently mapped host-visible blocks for upload and readback. Vulkan
//! descriptor sets are built later by the renderer, so heaps here are slot
//! tables of image views, texel buffer views, buffer ranges and samplers.

mod allocator;
pub(crate) mod conversion;
mod device;
mod instance;

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use parking_lot::Mutex;

use crate::resources::CopyFootprint;
use crate::types::{
    DescriptorSpaceKind, ResourceDescription, ResourceDimension, ResourceState,
    SamplerDescription, ViewDescription, ViewKind, ViewRange,
};

use super::{
    BackendBinding, BackendError, BackendResult, DescriptorHeap, DescriptorSlot, HeapId,
    NativePayload, NativeResource,
};

use self::allocator::{allocation_error, vk_error};
use self::conversion::{
    convert_address_mode, convert_buffer_usage, convert_compare_function, convert_filter_mode,
    convert_format, convert_mipmap_filter_mode, convert_residency, convert_sample_count,
    convert_texture_usage, convert_view_dimension, format_aspects,
};
use self::device::PhysicalDeviceInfo;
use self::instance::InstanceBundle;

/// Minimum subresource placement alignment of texture uploads, in bytes.
const MIN_PLACEMENT_ALIGNMENT: u64 = 16;

/// Raw Vulkan handle of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VulkanHandle {
    Buffer(vk::Buffer),
    Image { image: vk::Image, format: vk::Format },
}

/// A Vulkan buffer or image with its memory.
pub struct VulkanResource {
    handle: VulkanHandle,
    size: u64,
    /// Taken when the resource is destroyed.
    allocation: Mutex<Option<Allocation>>,
}

impl VulkanResource {
    pub fn handle(&self) -> VulkanHandle {
        self.handle
    }

    /// Raw buffer handle, if this is a buffer.
    pub fn buffer(&self) -> Option<vk::Buffer> {
        match self.handle {
            VulkanHandle::Buffer(buffer) => Some(buffer),
            VulkanHandle::Image { .. } => None,
        }
    }

    /// Raw image handle, if this is an image.
    pub fn image(&self) -> Option<vk::Image> {
        match self.handle {
            VulkanHandle::Image { image, .. } => Some(image),
            VulkanHandle::Buffer(_) => None,
        }
    }

    /// Requested size of the resource in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl std::fmt::Debug for VulkanResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanResource")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("destroyed", &self.allocation.lock().is_none())
            .finish()
    }
}

/// Contents of a Vulkan descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VulkanSlot {
    Image(vk::ImageView),
    /// Typed buffer view.
    TexelBuffer(vk::BufferView),
    /// Constant, structured or raw buffer range.
    BufferRange {
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
    },
    Sampler(vk::Sampler),
}

/// Vulkan-based backend binding.
pub struct VulkanBackend {
    /// Keeps the Vulkan loader alive.
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: InstanceBundle,
    physical: PhysicalDeviceInfo,
    device: ash::Device,
    /// `None` once dropped, which must happen before the device goes away.
    allocator: Mutex<Option<Allocator>>,
    heaps: Mutex<HashMap<HeapId, Vec<Option<VulkanSlot>>>>,
    validation_enabled: bool,
}

impl std::fmt::Debug for VulkanBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBackend")
            .field("validation_enabled", &self.validation_enabled)
            .finish()
    }
}

impl VulkanBackend {
    /// Create a headless Vulkan backend.
    ///
    /// Loads the Vulkan library, creates an instance (with validation layers
    /// when requested), selects a physical device, creates a logical device
    /// and sets up the memory allocator.
    pub fn new(validation: bool) -> Result<Self, BackendError> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to load Vulkan: {e}"))
        })?;

        let instance = instance::create_instance(&entry, validation)?;

        let physical = match device::select_physical_device(&instance.instance) {
            Ok(physical) => physical,
            Err(e) => {
                unsafe { instance.destroy() };
                return Err(e);
            }
        };

        let device = match device::create_logical_device(&instance.instance, &physical) {
            Ok(device) => device,
            Err(e) => {
                unsafe { instance.destroy() };
                return Err(e);
            }
        };

        let allocator = match allocator::create_allocator(
            &instance.instance,
            physical.physical_device,
            device.clone(),
        ) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe {
                    device.destroy_device(None);
                    instance.destroy();
                }
                return Err(e);
            }
        };

        log::info!("Vulkan backend initialized (validation: {validation})");

        Ok(Self {
            entry,
            instance,
            physical,
            device,
            allocator: Mutex::new(Some(allocator)),
            heaps: Mutex::new(HashMap::new()),
            validation_enabled: validation,
        })
    }

    /// Get the Vulkan device.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the Vulkan instance.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance.instance
    }

    /// Get the physical device.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical.physical_device
    }

    /// What `slot` currently holds, for writing descriptor sets.
    pub fn slot_contents(&self, slot: &DescriptorSlot) -> Option<VulkanSlot> {
        self.heaps
            .lock()
            .get(&slot.heap)
            .and_then(|slots| slots.get(slot.index as usize))
            .copied()
            .flatten()
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: gpu_allocator::MemoryLocation,
        linear: bool,
    ) -> BackendResult<Allocation> {
        let mut guard = self.allocator.lock();
        let allocator = guard
            .as_mut()
            .ok_or_else(|| BackendError::Internal("allocator already destroyed".into()))?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(allocation_error)
    }

    fn free(&self, allocation: Allocation) {
        if let Some(allocator) = self.allocator.lock().as_mut()
            && let Err(e) = allocator.free(allocation)
        {
            log::error!("Failed to free GPU memory: {e}");
        }
    }

    fn create_buffer(&self, description: &ResourceDescription) -> BackendResult<VulkanResource> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(description.width)
            .usage(convert_buffer_usage(description.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }
            .map_err(|e| vk_error("Failed to create buffer", e))?;

        let mut requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        if let Some(alignment) = description.alignment {
            requirements.alignment = requirements.alignment.max(alignment);
        }

        let allocation = match self.allocate(
            description.display_label(),
            requirements,
            convert_residency(description.residency),
            true,
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            unsafe { self.device.destroy_buffer(buffer, None) };
            self.free(allocation);
            return Err(vk_error("Failed to bind buffer memory", e));
        }

        Ok(VulkanResource {
            handle: VulkanHandle::Buffer(buffer),
            size: description.width,
            allocation: Mutex::new(Some(allocation)),
        })
    }

    fn create_image(&self, description: &ResourceDescription) -> BackendResult<VulkanResource> {
        let format = convert_format(description.format);
        if format == vk::Format::UNDEFINED {
            return Err(BackendError::ResourceCreationFailed(
                "textures need a typed format".into(),
            ));
        }

        let width = u32::try_from(description.width).map_err(|_| {
            BackendError::ResourceCreationFailed(format!("width {} too large", description.width))
        })?;
        let layers = description.array_layers();
        let (image_type, extent) = match description.dimension {
            ResourceDimension::Texture1D => (
                vk::ImageType::TYPE_1D,
                vk::Extent3D {
                    width,
                    height: 1,
                    depth: 1,
                },
            ),
            ResourceDimension::Texture3D => (
                vk::ImageType::TYPE_3D,
                vk::Extent3D {
                    width,
                    height: description.height,
                    depth: description.depth(),
                },
            ),
            _ => (
                vk::ImageType::TYPE_2D,
                vk::Extent3D {
                    width,
                    height: description.height,
                    depth: 1,
                },
            ),
        };

        // Square 2D arrays with whole cubes may be viewed as cubes.
        let cube_compatible = image_type == vk::ImageType::TYPE_2D
            && description.sample_count <= 1
            && width == description.height
            && layers >= 6
            && layers % 6 == 0;
        let flags = if cube_compatible {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        let usage = convert_texture_usage(description);
        let samples = convert_sample_count(description.sample_count);

        let properties = unsafe {
            self.instance
                .instance
                .get_physical_device_image_format_properties(
                    self.physical.physical_device,
                    format,
                    image_type,
                    vk::ImageTiling::OPTIMAL,
                    usage,
                    flags,
                )
        }
        .map_err(|e| {
            BackendError::FeatureNotSupported(format!(
                "{:?} images with {usage:?}: {e:?}",
                description.format
            ))
        })?;
        if description.mip_levels > properties.max_mip_levels
            || layers > properties.max_array_layers
            || !properties.sample_counts.contains(samples)
        {
            return Err(BackendError::ResourceCreationFailed(format!(
                "{} mips, {layers} layers, {} samples exceed device support",
                description.mip_levels, description.sample_count
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(description.mip_levels)
            .array_layers(layers)
            .samples(samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { self.device.create_image(&image_info, None) }
            .map_err(|e| vk_error("Failed to create image", e))?;

        let mut requirements = unsafe { self.device.get_image_memory_requirements(image) };
        if let Some(alignment) = description.alignment {
            requirements.alignment = requirements.alignment.max(alignment);
        }

        let allocation = match self.allocate(
            description.display_label(),
            requirements,
            gpu_allocator::MemoryLocation::GpuOnly,
            false,
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        } {
            unsafe { self.device.destroy_image(image, None) };
            self.free(allocation);
            return Err(vk_error("Failed to bind image memory", e));
        }

        Ok(VulkanResource {
            handle: VulkanHandle::Image { image, format },
            size: requirements.size,
            allocation: Mutex::new(Some(allocation)),
        })
    }

    fn create_buffer_view(
        &self,
        buffer: vk::Buffer,
        view: &ViewDescription,
    ) -> BackendResult<VulkanSlot> {
        let ViewRange::Buffer(range) = &view.range else {
            return Err(BackendError::ViewCreationFailed(
                "buffer view without a buffer range".into(),
            ));
        };
        let limits = &self.physical.limits;
        let typed = view.kind != ViewKind::ConstantBuffer
            && range.stride.is_none()
            && !view.format.is_unknown();

        let (alignment, max_size) = if view.kind == ViewKind::ConstantBuffer {
            (
                limits.min_uniform_buffer_offset_alignment,
                u64::from(limits.max_uniform_buffer_range),
            )
        } else if typed {
            (limits.min_texel_buffer_offset_alignment, u64::MAX)
        } else {
            (
                limits.min_storage_buffer_offset_alignment,
                u64::from(limits.max_storage_buffer_range),
            )
        };
        if alignment > 0 && range.offset % alignment != 0 {
            return Err(BackendError::ViewCreationFailed(format!(
                "offset {} is not a multiple of {alignment}",
                range.offset
            )));
        }
        if range.size > max_size {
            return Err(BackendError::ViewCreationFailed(format!(
                "{} bytes exceed the binding limit of {max_size}",
                range.size
            )));
        }

        if !typed {
            return Ok(VulkanSlot::BufferRange {
                buffer,
                offset: range.offset,
                size: range.size,
            });
        }

        let view_info = vk::BufferViewCreateInfo::default()
            .buffer(buffer)
            .format(convert_format(view.format))
            .offset(range.offset)
            .range(range.size);
        let buffer_view = unsafe { self.device.create_buffer_view(&view_info, None) }.map_err(
            |e| BackendError::ViewCreationFailed(format!("Failed to create buffer view: {e:?}")),
        )?;
        Ok(VulkanSlot::TexelBuffer(buffer_view))
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        description: &ResourceDescription,
        view: &ViewDescription,
    ) -> BackendResult<VulkanSlot> {
        let ViewRange::Texture(range) = &view.range else {
            return Err(BackendError::ViewCreationFailed(
                "texture view without a texture range".into(),
            ));
        };
        let view_type = convert_view_dimension(view.dimension).ok_or_else(|| {
            BackendError::ViewCreationFailed(format!("{:?} is not an image view", view.dimension))
        })?;

        // Images are created without MUTABLE_FORMAT, so views keep the image format.
        if !view.format.is_unknown() && view.format != description.format {
            return Err(BackendError::ViewCreationFailed(format!(
                "view format {:?} differs from image format {:?}",
                view.format, description.format
            )));
        }

        let aspect_mask = match view.kind {
            ViewKind::ShaderResource | ViewKind::UnorderedAccess
                if description.format.is_depth_stencil() =>
            {
                vk::ImageAspectFlags::DEPTH
            }
            _ => format_aspects(description.format),
        };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: range.base_mip,
                level_count: range.resolved_mip_count(description.mip_levels),
                base_array_layer: range.base_layer,
                layer_count: range.resolved_layer_count(description.array_layers()),
            });

        let image_view = unsafe { self.device.create_image_view(&view_info, None) }.map_err(
            |e| BackendError::ViewCreationFailed(format!("Failed to create image view: {e:?}")),
        )?;
        Ok(VulkanSlot::Image(image_view))
    }

    fn write_slot(&self, slot: &DescriptorSlot, contents: VulkanSlot) -> BackendResult<()> {
        let mut heaps = self.heaps.lock();
        let Some(entry) = heaps
            .get_mut(&slot.heap)
            .and_then(|slots| slots.get_mut(slot.index as usize))
        else {
            drop(heaps);
            self.destroy_slot(contents);
            return Err(BackendError::InvalidHandle(format!(
                "slot {} of heap {:?} does not exist",
                slot.index, slot.heap
            )));
        };
        let previous = entry.replace(contents);
        drop(heaps);

        if let Some(previous) = previous {
            self.destroy_slot(previous);
        }
        Ok(())
    }

    fn destroy_slot(&self, slot: VulkanSlot) {
        unsafe {
            match slot {
                VulkanSlot::Image(view) => self.device.destroy_image_view(view, None),
                VulkanSlot::TexelBuffer(view) => self.device.destroy_buffer_view(view, None),
                VulkanSlot::Sampler(sampler) => self.device.destroy_sampler(sampler, None),
                VulkanSlot::BufferRange { .. } => {}
            }
        }
    }
}

fn vulkan_resource(resource: &NativeResource) -> BackendResult<&Arc<VulkanResource>> {
    match &resource.payload {
        NativePayload::Vulkan(vulkan) => Ok(vulkan),
        _ => Err(BackendError::InvalidHandle(format!(
            "{} is not a Vulkan resource",
            resource.id
        ))),
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

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
        }

        let heaps = std::mem::take(self.heaps.get_mut());
        for slot in heaps.into_values().flatten().flatten() {
            self.destroy_slot(slot);
        }

        // The allocator frees its memory blocks through the device.
        drop(self.allocator.get_mut().take());

        unsafe {
            self.device.destroy_device(None);
            self.instance.destroy();
        }
    }
}

impl BackendBinding for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan Backend (ash)"
    }

    fn create_resource(
        &self,
        description: &ResourceDescription,
        _initial_state: ResourceState,
    ) -> BackendResult<NativeResource> {
        // Images start in UNDEFINED layout; the first barrier moves them to
        // the requested state.
        let resource = if description.is_buffer() {
            self.create_buffer(description)?
        } else {
            self.create_image(description)?
        };
        let resource = NativeResource::new(NativePayload::Vulkan(Arc::new(resource)));
        log::trace!(
            "VulkanBackend: creating {:?} {} '{}'",
            description.dimension,
            resource.id,
            description.display_label()
        );
        Ok(resource)
    }

    fn destroy_resource(&self, resource: &NativeResource) {
        let Ok(vulkan) = vulkan_resource(resource) else {
            log::warn!("VulkanBackend: destroy of foreign resource {}", resource.id);
            return;
        };
        let Some(allocation) = vulkan.allocation.lock().take() else {
            log::warn!("VulkanBackend: {} destroyed twice", resource.id);
            return;
        };

        log::trace!("VulkanBackend: destroying {}", resource.id);
        unsafe {
            match vulkan.handle {
                VulkanHandle::Buffer(buffer) => self.device.destroy_buffer(buffer, None),
                VulkanHandle::Image { image, .. } => self.device.destroy_image(image, None),
            }
        }
        self.free(allocation);
    }

    fn write_mapped(
        &self,
        resource: &NativeResource,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()> {
        let vulkan = vulkan_resource(resource)?;
        let range = check_range(vulkan.size, offset, data.len())?;
        let mut guard = vulkan.allocation.lock();
        let allocation = guard
            .as_mut()
            .ok_or_else(|| BackendError::InvalidHandle(format!("{} was destroyed", resource.id)))?;
        let mapped = allocation
            .mapped_slice_mut()
            .ok_or_else(|| BackendError::MapFailed("resource is not host-visible".into()))?;
        mapped[range].copy_from_slice(data);
        Ok(())
    }

    fn read_mapped(
        &self,
        resource: &NativeResource,
        offset: u64,
        out: &mut [u8],
    ) -> BackendResult<()> {
        let vulkan = vulkan_resource(resource)?;
        let range = check_range(vulkan.size, offset, out.len())?;
        let guard = vulkan.allocation.lock();
        let allocation = guard
            .as_ref()
            .ok_or_else(|| BackendError::InvalidHandle(format!("{} was destroyed", resource.id)))?;
        let mapped = allocation
            .mapped_slice()
            .ok_or_else(|| BackendError::MapFailed("resource is not host-visible".into()))?;
        out.copy_from_slice(&mapped[range]);
        Ok(())
    }

    fn create_descriptor_heap(
        &self,
        kind: DescriptorSpaceKind,
        capacity: u32,
        shader_visible: bool,
    ) -> BackendResult<DescriptorHeap> {
        let heap = DescriptorHeap::synthetic(kind, capacity, shader_visible, 1);
        log::trace!("VulkanBackend: creating {kind} slot table with {capacity} slots");
        self.heaps
            .lock()
            .insert(heap.id, vec![None; capacity as usize]);
        Ok(heap)
    }

    fn destroy_descriptor_heap(&self, heap: &DescriptorHeap) {
        let slots = self.heaps.lock().remove(&heap.id);
        for slot in slots.into_iter().flatten().flatten() {
            self.destroy_slot(slot);
        }
    }

    fn create_view(
        &self,
        resource: &NativeResource,
        description: &ResourceDescription,
        view: &ViewDescription,
        slot: &DescriptorSlot,
    ) -> BackendResult<()> {
        let vulkan = vulkan_resource(resource)?;
        if vulkan.allocation.lock().is_none() {
            return Err(BackendError::InvalidHandle(format!(
                "view of destroyed resource {}",
                resource.id
            )));
        }
        let contents = match vulkan.handle {
            VulkanHandle::Buffer(buffer) => self.create_buffer_view(buffer, view)?,
            VulkanHandle::Image { image, format } => {
                self.create_image_view(image, format, description, view)?
            }
        };
        self.write_slot(slot, contents)
    }

    fn create_sampler(
        &self,
        description: &SamplerDescription,
        slot: &DescriptorSlot,
    ) -> BackendResult<()> {
        let anisotropy = self.physical.sampler_anisotropy && description.anisotropy_clamp > 1;
        let max_anisotropy = f32::from(description.anisotropy_clamp)
            .min(self.physical.limits.max_sampler_anisotropy);

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(convert_filter_mode(description.mag_filter))
            .min_filter(convert_filter_mode(description.min_filter))
            .mipmap_mode(convert_mipmap_filter_mode(description.mipmap_filter))
            .address_mode_u(convert_address_mode(description.address_mode_u))
            .address_mode_v(convert_address_mode(description.address_mode_v))
            .address_mode_w(convert_address_mode(description.address_mode_w))
            .mip_lod_bias(0.0)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(max_anisotropy)
            .compare_enable(description.compare.is_some())
            .compare_op(
                description
                    .compare
                    .map(convert_compare_function)
                    .unwrap_or(vk::CompareOp::ALWAYS),
            )
            .min_lod(description.lod_min_clamp)
            .max_lod(description.lod_max_clamp)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { self.device.create_sampler(&sampler_info, None) }.map_err(|e| {
            BackendError::ViewCreationFailed(format!("Failed to create sampler: {e:?}"))
        })?;
        self.write_slot(slot, VulkanSlot::Sampler(sampler))
    }

    fn compute_copy_footprint(&self, description: &ResourceDescription) -> CopyFootprint {
        let limits = &self.physical.limits;
        CopyFootprint::compute(
            description,
            limits.optimal_buffer_copy_row_pitch_alignment.max(1),
            limits
                .optimal_buffer_copy_offset_alignment
                .max(MIN_PLACEMENT_ALIGNMENT),
        )
    }
}
