//! wgpu backend binding.
//!
//! wgpu has no descriptor heaps, so heaps are slot tables holding the view
//! objects (or buffer ranges) that bind groups are later assembled from.
//! Buffers are written through the queue and read back either by mapping
//! directly (readback buffers) or through a staging copy.

pub mod conversion;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::resources::{CopyFootprint, align_up};
use crate::types::{
    AddressMode, DescriptorSpaceKind, FilterMode, ResourceDescription, ResourceDimension,
    ResourceState, SamplerDescription, ViewDescription, ViewKind, ViewRange,
};

use super::{
    BackendBinding, BackendError, BackendResult, DescriptorHeap, DescriptorSlot, HeapId,
    NativePayload, NativeResource,
};

use self::conversion::{
    convert_address_mode, convert_buffer_usage, convert_compare_function, convert_filter_mode,
    convert_format, convert_texture_dimension, convert_texture_usage, convert_view_dimension,
};

/// Alignment of each subresource in an upload buffer, in bytes.
const PLACEMENT_ALIGNMENT: u64 = 512;

/// Native wgpu resource.
#[derive(Clone)]
pub enum WgpuResource {
    Buffer(Arc<wgpu::Buffer>),
    Texture(Arc<wgpu::Texture>),
}

impl std::fmt::Debug for WgpuResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffer(buffer) => f
                .debug_struct("WgpuResource::Buffer")
                .field("size", &buffer.size())
                .finish(),
            Self::Texture(texture) => f
                .debug_struct("WgpuResource::Texture")
                .field("size", &texture.size())
                .field("format", &texture.format())
                .finish(),
        }
    }
}

/// Contents of a wgpu descriptor slot.
#[derive(Clone)]
pub enum WgpuView {
    /// Buffer range, bound as a uniform or storage buffer.
    Buffer {
        buffer: Arc<wgpu::Buffer>,
        offset: u64,
        size: u64,
    },
    Texture(Arc<wgpu::TextureView>),
    Sampler(Arc<wgpu::Sampler>),
}

impl std::fmt::Debug for WgpuView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffer { offset, size, .. } => f
                .debug_struct("WgpuView::Buffer")
                .field("offset", offset)
                .field("size", size)
                .finish(),
            Self::Texture(_) => write!(f, "WgpuView::Texture"),
            Self::Sampler(_) => write!(f, "WgpuView::Sampler"),
        }
    }
}

/// wgpu-based backend binding.
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    heaps: Mutex<HashMap<HeapId, Vec<Option<WgpuView>>>>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}

impl WgpuBackend {
    /// Create a headless wgpu backend on the best available adapter.
    pub fn new(validation: bool) -> Result<Self, BackendError> {
        let mut flags = wgpu::InstanceFlags::default();
        if validation {
            flags |= wgpu::InstanceFlags::VALIDATION;
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags,
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| BackendError::InitializationFailed(format!("No compatible GPU adapter: {e}")))?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        // Border addressing is optional in WebGPU; take it when offered.
        let required_features = adapter.features() & wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("RedLilium Memory Device"),
            required_features,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| BackendError::InitializationFailed(format!("Device creation failed: {e}")))?;

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            heaps: Mutex::new(HashMap::new()),
        })
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// What `slot` currently holds, for assembling bind groups.
    pub fn slot_view(&self, slot: &DescriptorSlot) -> Option<WgpuView> {
        self.heaps
            .lock()
            .get(&slot.heap)
            .and_then(|slots| slots.get(slot.index as usize))
            .cloned()
            .flatten()
    }

    fn write_slot(&self, slot: &DescriptorSlot, view: WgpuView) -> BackendResult<()> {
        let mut heaps = self.heaps.lock();
        let slots = heaps
            .get_mut(&slot.heap)
            .ok_or_else(|| BackendError::InvalidHandle(format!("unknown heap {:?}", slot.heap)))?;
        let entry = slots.get_mut(slot.index as usize).ok_or_else(|| {
            BackendError::InvalidHandle(format!("slot {} out of heap range", slot.index))
        })?;
        *entry = Some(view);
        Ok(())
    }

    fn create_buffer(&self, description: &ResourceDescription) -> BackendResult<WgpuResource> {
        let limits = self.device.limits();
        if description.width > limits.max_buffer_size {
            return Err(BackendError::ResourceCreationFailed(format!(
                "buffer of {} bytes exceeds the device limit of {}",
                description.width, limits.max_buffer_size
            )));
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: description.label.as_deref(),
            size: align_up(description.width, wgpu::COPY_BUFFER_ALIGNMENT),
            usage: convert_buffer_usage(description.usage, description.residency),
            mapped_at_creation: false,
        });
        Ok(WgpuResource::Buffer(Arc::new(buffer)))
    }

    fn create_texture(&self, description: &ResourceDescription) -> BackendResult<WgpuResource> {
        let dimension = convert_texture_dimension(description.dimension).ok_or_else(|| {
            BackendError::ResourceCreationFailed("not a texture description".into())
        })?;
        let format = convert_format(description.format).ok_or_else(|| {
            BackendError::ResourceCreationFailed("textures need a typed format".into())
        })?;

        let limits = self.device.limits();
        let width = u32::try_from(description.width).unwrap_or(u32::MAX);
        let max_dimension = match description.dimension {
            ResourceDimension::Texture1D => limits.max_texture_dimension_1d,
            ResourceDimension::Texture3D => limits.max_texture_dimension_3d,
            _ => limits.max_texture_dimension_2d,
        };
        if width > max_dimension || description.height > max_dimension {
            return Err(BackendError::ResourceCreationFailed(format!(
                "{}x{} exceeds the device limit of {max_dimension}",
                description.width, description.height
            )));
        }
        if description.dimension != ResourceDimension::Texture3D
            && description.array_layers() > limits.max_texture_array_layers
        {
            return Err(BackendError::ResourceCreationFailed(format!(
                "{} array layers exceed the device limit of {}",
                description.array_layers(),
                limits.max_texture_array_layers
            )));
        }

        let size = wgpu::Extent3d {
            width,
            height: description.height.max(1),
            depth_or_array_layers: description.depth_or_array_layers.max(1),
        };
        if description.mip_levels > size.max_mips(dimension) {
            return Err(BackendError::ResourceCreationFailed(format!(
                "{} mip levels requested, at most {} possible",
                description.mip_levels,
                size.max_mips(dimension)
            )));
        }

        let usage = convert_texture_usage(description);
        let allowed = self.adapter.get_texture_format_features(format).allowed_usages;
        if !allowed.contains(usage) {
            return Err(BackendError::FeatureNotSupported(format!(
                "{format:?} does not support {:?}",
                usage - allowed
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: description.label.as_deref(),
            size,
            mip_level_count: description.mip_levels,
            sample_count: description.sample_count,
            dimension,
            format,
            usage,
            view_formats: &[],
        });
        Ok(WgpuResource::Texture(Arc::new(texture)))
    }

    /// Map `start..end` of a `MAP_READ` buffer and copy it out.
    fn map_read(&self, buffer: &wgpu::Buffer, start: u64, end: u64) -> BackendResult<Vec<u8>> {
        let slice = buffer.slice(start..end);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| BackendError::MapFailed(format!("device poll failed: {e}")))?;

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BackendError::MapFailed(e.to_string())),
            Err(_) => return Err(BackendError::MapFailed("map callback dropped".into())),
        }

        let data = slice.get_mapped_range().to_vec();
        buffer.unmap();
        Ok(data)
    }

    /// Read exactly `start..end` of a buffer, mapping it directly when it
    /// allows `MAP_READ` and going through a staging copy otherwise.
    ///
    /// `end` must not exceed the buffer size. The range is widened to the
    /// map or copy alignment internally.
    fn read_span(&self, buffer: &wgpu::Buffer, start: u64, end: u64) -> BackendResult<Vec<u8>> {
        let usage = buffer.usage();
        let mappable = usage.contains(wgpu::BufferUsages::MAP_READ);
        if !mappable && !usage.contains(wgpu::BufferUsages::COPY_SRC) {
            return Err(BackendError::MapFailed(
                "buffer can neither be mapped nor copied".into(),
            ));
        }

        let alignment = if mappable {
            wgpu::MAP_ALIGNMENT
        } else {
            wgpu::COPY_BUFFER_ALIGNMENT
        };
        let aligned_start = start - start % alignment;
        let aligned_end = align_up(end, wgpu::COPY_BUFFER_ALIGNMENT).min(buffer.size());
        let mut data = if mappable {
            self.map_read(buffer, aligned_start, aligned_end)?
        } else {
            self.staged_read(buffer, aligned_start, aligned_end)?
        };

        let skip = (start - aligned_start) as usize;
        data.drain(..skip);
        data.truncate((end - start) as usize);
        Ok(data)
    }

    /// Copy `start..end` of a `COPY_SRC` buffer into a staging buffer and read it.
    fn staged_read(&self, buffer: &wgpu::Buffer, start: u64, end: u64) -> BackendResult<Vec<u8>> {
        let size = end - start;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Read Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Buffer Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, start, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        self.map_read(&staging, 0, size)
    }

    fn create_buffer_view(
        &self,
        buffer: &Arc<wgpu::Buffer>,
        view: &ViewDescription,
    ) -> BackendResult<WgpuView> {
        let ViewRange::Buffer(range) = &view.range else {
            return Err(BackendError::ViewCreationFailed(
                "buffer view without a buffer range".into(),
            ));
        };

        let limits = self.device.limits();
        let (alignment, max_size) = match view.kind {
            ViewKind::ConstantBuffer => (
                limits.min_uniform_buffer_offset_alignment,
                limits.max_uniform_buffer_binding_size,
            ),
            _ => (
                limits.min_storage_buffer_offset_alignment,
                limits.max_storage_buffer_binding_size,
            ),
        };
        if range.offset % u64::from(alignment) != 0 {
            return Err(BackendError::ViewCreationFailed(format!(
                "offset {} is not a multiple of {alignment}",
                range.offset
            )));
        }
        if range.size > u64::from(max_size) {
            return Err(BackendError::ViewCreationFailed(format!(
                "{} bytes exceed the binding limit of {max_size}",
                range.size
            )));
        }

        Ok(WgpuView::Buffer {
            buffer: Arc::clone(buffer),
            offset: range.offset,
            size: range.size,
        })
    }

    fn create_texture_view(
        &self,
        texture: &wgpu::Texture,
        description: &ResourceDescription,
        view: &ViewDescription,
    ) -> BackendResult<WgpuView> {
        let ViewRange::Texture(range) = &view.range else {
            return Err(BackendError::ViewCreationFailed(
                "texture view without a texture range".into(),
            ));
        };
        let dimension = convert_view_dimension(view.dimension).ok_or_else(|| {
            BackendError::FeatureNotSupported(format!("{:?} views", view.dimension))
        })?;

        // Views must keep the texture format since no view formats are declared.
        if !view.format.is_unknown() && view.format != description.format {
            return Err(BackendError::ViewCreationFailed(format!(
                "view format {:?} differs from texture format {:?}",
                view.format, description.format
            )));
        }

        let aspect = if view.kind == ViewKind::ShaderResource && description.format.has_stencil()
        {
            wgpu::TextureAspect::DepthOnly
        } else {
            wgpu::TextureAspect::All
        };

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: description.label.as_deref(),
            format: convert_format(view.format),
            dimension: Some(dimension),
            aspect,
            base_mip_level: range.base_mip,
            mip_level_count: Some(range.resolved_mip_count(description.mip_levels)),
            base_array_layer: range.base_layer,
            array_layer_count: Some(range.resolved_layer_count(description.array_layers())),
            ..Default::default()
        });
        Ok(WgpuView::Texture(Arc::new(texture_view)))
    }
}

fn buffer_of(resource: &NativeResource) -> BackendResult<&Arc<wgpu::Buffer>> {
    match &resource.payload {
        NativePayload::Wgpu(WgpuResource::Buffer(buffer)) => Ok(buffer),
        _ => Err(BackendError::InvalidHandle(format!(
            "{} is not a wgpu buffer",
            resource.id
        ))),
    }
}

fn check_range(buffer: &wgpu::Buffer, offset: u64, len: usize) -> BackendResult<u64> {
    offset
        .checked_add(len as u64)
        .filter(|end| *end <= buffer.size())
        .ok_or_else(|| {
            BackendError::MapFailed(format!(
                "{len} bytes at {offset} outside {} bytes",
                buffer.size()
            ))
        })
}

impl BackendBinding for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn create_resource(
        &self,
        description: &ResourceDescription,
        _initial_state: ResourceState,
    ) -> BackendResult<NativeResource> {
        let resource = if description.is_buffer() {
            self.create_buffer(description)?
        } else {
            self.create_texture(description)?
        };
        let resource = NativeResource::new(NativePayload::Wgpu(resource));
        log::trace!(
            "WgpuBackend: creating {:?} {} '{}'",
            description.dimension,
            resource.id,
            description.display_label()
        );
        Ok(resource)
    }

    fn destroy_resource(&self, resource: &NativeResource) {
        log::trace!("WgpuBackend: destroying {}", resource.id);
        match &resource.payload {
            NativePayload::Wgpu(WgpuResource::Buffer(buffer)) => buffer.destroy(),
            NativePayload::Wgpu(WgpuResource::Texture(texture)) => texture.destroy(),
            other => log::warn!("WgpuBackend: destroy of foreign resource {other:?}"),
        }
    }

    fn write_mapped(
        &self,
        resource: &NativeResource,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()> {
        let buffer = buffer_of(resource)?;
        check_range(buffer, offset, data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as u64;
        let start = offset - offset % wgpu::COPY_BUFFER_ALIGNMENT;
        let aligned_end = align_up(end, wgpu::COPY_BUFFER_ALIGNMENT);
        if start == offset && aligned_end == end {
            self.queue.write_buffer(buffer, offset, data);
        } else {
            // Buffer sizes are rounded up to the copy alignment, so the span fits.
            let mut span = self.read_span(buffer, start, aligned_end)?;
            let skip = (offset - start) as usize;
            span[skip..skip + data.len()].copy_from_slice(data);
            self.queue.write_buffer(buffer, start, &span);
        }
        self.queue.submit(std::iter::empty());
        Ok(())
    }

    fn read_mapped(
        &self,
        resource: &NativeResource,
        offset: u64,
        out: &mut [u8],
    ) -> BackendResult<()> {
        let buffer = buffer_of(resource)?;
        let end = check_range(buffer, offset, out.len())?;
        if out.is_empty() {
            return Ok(());
        }

        let data = self.read_span(buffer, offset, end)?;
        out.copy_from_slice(&data);
        Ok(())
    }

    fn create_descriptor_heap(
        &self,
        kind: DescriptorSpaceKind,
        capacity: u32,
        shader_visible: bool,
    ) -> BackendResult<DescriptorHeap> {
        let heap = DescriptorHeap::synthetic(kind, capacity, shader_visible, 1);
        log::trace!("WgpuBackend: creating {kind} slot table with {capacity} slots");
        self.heaps
            .lock()
            .insert(heap.id, vec![None; capacity as usize]);
        Ok(heap)
    }

    fn destroy_descriptor_heap(&self, heap: &DescriptorHeap) {
        self.heaps.lock().remove(&heap.id);
    }

    fn create_view(
        &self,
        resource: &NativeResource,
        description: &ResourceDescription,
        view: &ViewDescription,
        slot: &DescriptorSlot,
    ) -> BackendResult<()> {
        let contents = match &resource.payload {
            NativePayload::Wgpu(WgpuResource::Buffer(buffer)) => {
                self.create_buffer_view(buffer, view)?
            }
            NativePayload::Wgpu(WgpuResource::Texture(texture)) => {
                self.create_texture_view(texture, description, view)?
            }
            _ => {
                return Err(BackendError::InvalidHandle(format!(
                    "{} is not a wgpu resource",
                    resource.id
                )));
            }
        };
        self.write_slot(slot, contents)
    }

    fn create_sampler(
        &self,
        description: &SamplerDescription,
        slot: &DescriptorSlot,
    ) -> BackendResult<()> {
        let modes = [
            description.address_mode_u,
            description.address_mode_v,
            description.address_mode_w,
        ];
        if modes.contains(&AddressMode::ClampToBorder)
            && !self
                .device
                .features()
                .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER)
        {
            return Err(BackendError::FeatureNotSupported(
                "clamp-to-border addressing".into(),
            ));
        }
        let all_linear = [
            description.mag_filter,
            description.min_filter,
            description.mipmap_filter,
        ]
        .iter()
        .all(|filter| *filter == FilterMode::Linear);
        if description.anisotropy_clamp > 1 && !all_linear {
            return Err(BackendError::ViewCreationFailed(
                "anisotropic filtering requires linear filters".into(),
            ));
        }

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: None,
            address_mode_u: convert_address_mode(description.address_mode_u),
            address_mode_v: convert_address_mode(description.address_mode_v),
            address_mode_w: convert_address_mode(description.address_mode_w),
            mag_filter: convert_filter_mode(description.mag_filter),
            min_filter: convert_filter_mode(description.min_filter),
            mipmap_filter: convert_filter_mode(description.mipmap_filter),
            lod_min_clamp: description.lod_min_clamp,
            lod_max_clamp: description.lod_max_clamp,
            compare: description.compare.map(convert_compare_function),
            anisotropy_clamp: description.anisotropy_clamp.max(1),
            border_color: modes
                .contains(&AddressMode::ClampToBorder)
                .then_some(wgpu::SamplerBorderColor::TransparentBlack),
        });
        self.write_slot(slot, WgpuView::Sampler(Arc::new(sampler)))
    }

    fn compute_copy_footprint(&self, description: &ResourceDescription) -> CopyFootprint {
        CopyFootprint::compute(
            description,
            u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
            PLACEMENT_ALIGNMENT,
        )
    }
}
