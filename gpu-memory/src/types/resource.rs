//! Resource descriptions, usage flags and GPU-visibility states.

use bitflags::bitflags;

use super::{ClearValue, Extent3d, Format};

/// Logical kind of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceDimension {
    /// Linear buffer; `width` is its size in bytes.
    #[default]
    Buffer,
    /// 1D texture (optionally an array).
    Texture1D,
    /// 2D texture (optionally an array or a cube map).
    Texture2D,
    /// 3D volume texture.
    Texture3D,
}

impl ResourceDimension {
    /// Returns true for any texture dimension.
    pub fn is_texture(&self) -> bool {
        !matches!(self, Self::Buffer)
    }
}

/// Where a resource's memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Residency {
    /// Device-local memory, not CPU-visible.
    #[default]
    Default,
    /// CPU-visible memory written by the CPU and read by the GPU.
    Upload,
    /// CPU-visible memory written by the GPU and read back by the CPU.
    Readback,
}

impl Residency {
    /// Returns true if the CPU can map memory with this residency.
    pub fn is_cpu_visible(&self) -> bool {
        !matches!(self, Self::Default)
    }

    /// The state a resource with this residency is required to be created in,
    /// if the residency constrains it.
    pub fn required_initial_state(&self) -> Option<ResourceState> {
        match self {
            Self::Default => None,
            Self::Upload => Some(ResourceState::GENERIC_READ),
            Self::Readback => Some(ResourceState::COPY_DEST),
        }
    }
}

bitflags! {
    /// Usage flags of a resource.
    ///
    /// Shader-resource access is implied unless [`ResourceUsage::DENY_SHADER_RESOURCE`]
    /// is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceUsage: u32 {
        /// Resource can be bound as a render target.
        const RENDER_TARGET = 1 << 0;
        /// Resource can be bound as a depth-stencil target.
        const DEPTH_STENCIL = 1 << 1;
        /// Resource can be bound for unordered (read-write) access.
        const UNORDERED_ACCESS = 1 << 2;
        /// Resource can never be viewed as a shader resource.
        const DENY_SHADER_RESOURCE = 1 << 3;
        /// Buffer can hold indirect draw / dispatch arguments.
        const INDIRECT_ARGUMENT = 1 << 4;
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 5;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 6;
        /// Buffer can be bound as a constant buffer.
        const CONSTANT = 1 << 7;
        /// Resource can be the source of a copy.
        const COPY_SRC = 1 << 8;
        /// Resource can be the destination of a copy.
        const COPY_DST = 1 << 9;
    }
}

impl Default for ResourceUsage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// GPU-visibility state of a resource, i.e. the state the last barrier
    /// transitioned it into.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        /// Bound as vertex or constant buffer.
        const VERTEX_AND_CONSTANT_BUFFER = 1 << 0;
        /// Bound as index buffer.
        const INDEX_BUFFER = 1 << 1;
        /// Written as a render target.
        const RENDER_TARGET = 1 << 2;
        /// Read-write shader access.
        const UNORDERED_ACCESS = 1 << 3;
        /// Depth-stencil writes.
        const DEPTH_WRITE = 1 << 4;
        /// Depth-stencil reads.
        const DEPTH_READ = 1 << 5;
        /// Read by non-pixel shader stages.
        const NON_PIXEL_SHADER_RESOURCE = 1 << 6;
        /// Read by the pixel shader stage.
        const PIXEL_SHADER_RESOURCE = 1 << 7;
        /// Source of indirect arguments.
        const INDIRECT_ARGUMENT = 1 << 8;
        /// Destination of a copy.
        const COPY_DEST = 1 << 9;
        /// Source of a copy.
        const COPY_SOURCE = 1 << 10;
        /// Any read-only GPU state. Required for upload memory.
        const GENERIC_READ = Self::VERTEX_AND_CONSTANT_BUFFER.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::PIXEL_SHADER_RESOURCE.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
    }
}

impl ResourceState {
    /// The common state: no specific GPU access.
    pub const COMMON: Self = Self::empty();
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::COMMON
    }
}

/// Immutable description of a GPU resource.
///
/// Two descriptions are equal when every field matches. The temp buffer pool
/// uses this equality to find reusable buffers; descriptor caching never does.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescription {
    /// Debug label.
    pub label: Option<String>,
    /// Buffer or texture kind.
    pub dimension: ResourceDimension,
    /// Size in bytes for buffers, width in texels for textures.
    pub width: u64,
    /// Height in texels (1 for buffers and 1D textures).
    pub height: u32,
    /// Depth for 3D textures, array size otherwise.
    pub depth_or_array_layers: u32,
    /// Number of mip levels (1 for buffers).
    pub mip_levels: u32,
    /// MSAA sample count.
    pub sample_count: u32,
    /// Element / pixel format.
    pub format: Format,
    /// Usage flags.
    pub usage: ResourceUsage,
    /// Memory residency.
    pub residency: Residency,
    /// State the resource is created in.
    pub initial_state: ResourceState,
    /// Optimized clear value for render targets and depth buffers.
    pub clear_value: Option<ClearValue>,
    /// Placement alignment override in bytes.
    pub alignment: Option<u64>,
}

impl Default for ResourceDescription {
    fn default() -> Self {
        Self {
            label: None,
            dimension: ResourceDimension::Buffer,
            width: 0,
            height: 1,
            depth_or_array_layers: 1,
            mip_levels: 1,
            sample_count: 1,
            format: Format::Unknown,
            usage: ResourceUsage::empty(),
            residency: Residency::Default,
            initial_state: ResourceState::COMMON,
            clear_value: None,
            alignment: None,
        }
    }
}

impl ResourceDescription {
    /// Create a device-local buffer description.
    pub fn buffer(size: u64) -> Self {
        Self {
            width: size,
            ..Default::default()
        }
    }

    /// Create a CPU-writable upload buffer description.
    pub fn upload_buffer(size: u64) -> Self {
        Self::buffer(size).with_residency(Residency::Upload)
    }

    /// Create a CPU-readable readback buffer description.
    pub fn readback_buffer(size: u64) -> Self {
        Self::buffer(size).with_residency(Residency::Readback)
    }

    /// Create a 1D texture description.
    pub fn texture_1d(width: u32, format: Format) -> Self {
        Self {
            dimension: ResourceDimension::Texture1D,
            width: u64::from(width),
            format,
            ..Default::default()
        }
    }

    /// Create a 2D texture description.
    pub fn texture_2d(width: u32, height: u32, format: Format) -> Self {
        Self {
            dimension: ResourceDimension::Texture2D,
            width: u64::from(width),
            height,
            format,
            ..Default::default()
        }
    }

    /// Create a 3D texture description.
    pub fn texture_3d(width: u32, height: u32, depth: u32, format: Format) -> Self {
        Self {
            dimension: ResourceDimension::Texture3D,
            width: u64::from(width),
            height,
            depth_or_array_layers: depth,
            format,
            ..Default::default()
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the usage flags.
    pub fn with_usage(mut self, usage: ResourceUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set the memory residency.
    ///
    /// CPU-visible residencies also set the initial state they require.
    pub fn with_residency(mut self, residency: Residency) -> Self {
        self.residency = residency;
        if let Some(state) = residency.required_initial_state() {
            self.initial_state = state;
        }
        self
    }

    /// Set the initial GPU-visibility state.
    pub fn with_initial_state(mut self, state: ResourceState) -> Self {
        self.initial_state = state;
        self
    }

    /// Set the optimized clear value.
    pub fn with_clear_value(mut self, clear_value: ClearValue) -> Self {
        self.clear_value = Some(clear_value);
        self
    }

    /// Override the placement alignment.
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Set the number of mip levels.
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Set the array size of a 1D or 2D texture.
    pub fn with_array_layers(mut self, layers: u32) -> Self {
        self.depth_or_array_layers = layers;
        self
    }

    /// Set the MSAA sample count.
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Returns true for buffer descriptions.
    pub fn is_buffer(&self) -> bool {
        self.dimension == ResourceDimension::Buffer
    }

    /// Returns true for texture descriptions.
    pub fn is_texture(&self) -> bool {
        self.dimension.is_texture()
    }

    /// Returns true if the CPU can map this resource.
    pub fn is_cpu_visible(&self) -> bool {
        self.residency.is_cpu_visible()
    }

    /// Texel extent of mip 0. Meaningless for buffers.
    pub fn extent(&self) -> Extent3d {
        Extent3d {
            width: u32::try_from(self.width).unwrap_or(u32::MAX),
            height: self.height,
            depth: self.depth(),
        }
    }

    /// Depth in texels (1 unless this is a 3D texture).
    pub fn depth(&self) -> u32 {
        match self.dimension {
            ResourceDimension::Texture3D => self.depth_or_array_layers,
            _ => 1,
        }
    }

    /// Number of array layers (1 for buffers and 3D textures).
    pub fn array_layers(&self) -> u32 {
        match self.dimension {
            ResourceDimension::Texture1D | ResourceDimension::Texture2D => {
                self.depth_or_array_layers
            }
            _ => 1,
        }
    }

    /// Number of subresources (mips times array layers).
    pub fn subresource_count(&self) -> u32 {
        self.mip_levels * self.array_layers()
    }

    /// The label, or a placeholder for unlabelled resources.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed>")
    }

    /// The state the resource is actually created in: the residency's required
    /// state when it has one, the requested initial state otherwise.
    pub fn effective_initial_state(&self) -> ResourceState {
        self.residency
            .required_initial_state()
            .unwrap_or(self.initial_state)
    }

    /// Check the description for malformed fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 {
            return Err(format!("{}: width cannot be zero", self.display_label()));
        }
        if self.mip_levels == 0 || self.sample_count == 0 {
            return Err(format!(
                "{}: mip level and sample counts must be at least 1",
                self.display_label()
            ));
        }
        if let Some(alignment) = self.alignment
            && !alignment.is_power_of_two()
        {
            return Err(format!(
                "{}: alignment must be a power of 2, got {alignment}",
                self.display_label()
            ));
        }
        if self.is_buffer() {
            if self.mip_levels != 1 || self.height != 1 || self.depth_or_array_layers != 1 {
                return Err(format!(
                    "{}: buffers must have height, depth and mip count of 1",
                    self.display_label()
                ));
            }
            if self
                .usage
                .intersects(ResourceUsage::RENDER_TARGET | ResourceUsage::DEPTH_STENCIL)
            {
                return Err(format!(
                    "{}: buffers cannot be render or depth-stencil targets",
                    self.display_label()
                ));
            }
        } else {
            if self.format.is_unknown() {
                return Err(format!("{}: textures need a format", self.display_label()));
            }
            if self.width > u64::from(u32::MAX) || self.height == 0 || self.depth_or_array_layers == 0
            {
                return Err(format!(
                    "{}: texture extent {}x{}x{} is invalid",
                    self.display_label(),
                    self.width,
                    self.height,
                    self.depth_or_array_layers
                ));
            }
            if self.usage.contains(ResourceUsage::DEPTH_STENCIL) && !self.format.is_depth_stencil() {
                return Err(format!(
                    "{}: depth-stencil usage needs a depth format, got {:?}",
                    self.display_label(),
                    self.format
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_buffer_state() {
        let desc = ResourceDescription::upload_buffer(256);
        assert!(desc.is_cpu_visible());
        assert_eq!(desc.initial_state, ResourceState::GENERIC_READ);
        assert_eq!(desc.effective_initial_state(), ResourceState::GENERIC_READ);
    }

    #[test]
    fn test_residency_overrides_requested_state() {
        let mut desc = ResourceDescription::readback_buffer(64);
        desc.initial_state = ResourceState::UNORDERED_ACCESS;
        assert_eq!(desc.effective_initial_state(), ResourceState::COPY_DEST);
    }

    #[test]
    fn test_description_equality() {
        let a = ResourceDescription::upload_buffer(256).with_label("staging");
        let b = ResourceDescription::upload_buffer(256).with_label("staging");
        let c = ResourceDescription::upload_buffer(512).with_label("staging");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_texture_layers_and_depth() {
        let array = ResourceDescription::texture_2d(64, 64, Format::Rgba8Unorm).with_array_layers(6);
        assert_eq!(array.array_layers(), 6);
        assert_eq!(array.depth(), 1);

        let volume = ResourceDescription::texture_3d(32, 32, 8, Format::R8Unorm);
        assert_eq!(volume.array_layers(), 1);
        assert_eq!(volume.depth(), 8);
    }

    #[test]
    fn test_validate() {
        assert!(ResourceDescription::buffer(0).validate().is_err());
        assert!(ResourceDescription::buffer(16).validate().is_ok());
        assert!(
            ResourceDescription::buffer(16)
                .with_usage(ResourceUsage::RENDER_TARGET)
                .validate()
                .is_err()
        );
        assert!(
            ResourceDescription::texture_2d(4, 4, Format::Rgba8Unorm)
                .with_usage(ResourceUsage::DEPTH_STENCIL)
                .validate()
                .is_err()
        );
        assert!(
            ResourceDescription::texture_2d(4, 4, Format::Unknown)
                .validate()
                .is_err()
        );
        assert!(
            ResourceDescription::buffer(16)
                .with_alignment(48)
                .validate()
                .is_err()
        );
    }
}
