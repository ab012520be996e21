//! View descriptions: what a descriptor sees of a resource.

use super::Format;

/// Typed view kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Constant buffer view. Buffers only, never cached.
    ConstantBuffer,
    /// Read-only shader resource view.
    ShaderResource,
    /// Read-write unordered access view.
    UnorderedAccess,
    /// Render target view.
    RenderTarget,
    /// Depth-stencil view.
    DepthStencil,
}

impl ViewKind {
    /// The descriptor space views of this kind are carved from.
    pub fn space(&self) -> DescriptorSpaceKind {
        match self {
            Self::ConstantBuffer | Self::ShaderResource | Self::UnorderedAccess => {
                DescriptorSpaceKind::CbvSrvUav
            }
            Self::RenderTarget => DescriptorSpaceKind::RenderTarget,
            Self::DepthStencil => DescriptorSpaceKind::DepthStencil,
        }
    }

    /// Whether identical requests for this kind are deduplicated.
    ///
    /// Constant buffer views usually cover a fresh byte range each frame,
    /// so caching them only grows the cache.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::ConstantBuffer)
    }

    /// Short name used in logs and errors.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::ConstantBuffer => "CBV",
            Self::ShaderResource => "SRV",
            Self::UnorderedAccess => "UAV",
            Self::RenderTarget => "RTV",
            Self::DepthStencil => "DSV",
        }
    }
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

/// How a view interprets the resource it looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewDimension {
    Buffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMs,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

impl ViewDimension {
    /// Returns true for layered (array or cube) dimensions.
    pub fn is_layered(&self) -> bool {
        matches!(
            self,
            Self::Texture1DArray | Self::Texture2DArray | Self::TextureCube | Self::TextureCubeArray
        )
    }

    /// Returns true for cube dimensions.
    pub fn is_cube(&self) -> bool {
        matches!(self, Self::TextureCube | Self::TextureCubeArray)
    }
}

/// The four logical descriptor spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorSpaceKind {
    /// Shader-visible constant / shader resource / unordered access views.
    CbvSrvUav,
    /// Shader-visible samplers.
    Sampler,
    /// CPU-only render target views.
    RenderTarget,
    /// CPU-only depth-stencil views.
    DepthStencil,
}

impl DescriptorSpaceKind {
    /// All spaces, in the order the descriptor manager creates them.
    pub const ALL: [Self; 4] = [
        Self::CbvSrvUav,
        Self::Sampler,
        Self::RenderTarget,
        Self::DepthStencil,
    ];

    /// Whether shaders can bind descriptors from this space directly.
    pub fn is_shader_visible(&self) -> bool {
        matches!(self, Self::CbvSrvUav | Self::Sampler)
    }

    /// Position in [`DescriptorSpaceKind::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::CbvSrvUav => 0,
            Self::Sampler => 1,
            Self::RenderTarget => 2,
            Self::DepthStencil => 3,
        }
    }
}

impl std::fmt::Display for DescriptorSpaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CbvSrvUav => "cbv_srv_uav",
            Self::Sampler => "sampler",
            Self::RenderTarget => "render_target",
            Self::DepthStencil => "depth_stencil",
        };
        f.write_str(name)
    }
}

/// Byte range of a buffer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferViewRange {
    /// Offset in bytes from the start of the buffer.
    pub offset: u64,
    /// Size in bytes.
    pub size: u64,
    /// Structure stride for structured views.
    pub stride: Option<u32>,
    /// Element count for structured or typed views.
    pub element_count: Option<u64>,
    /// Offset of the paired UAV counter, in bytes.
    pub counter_offset: Option<u64>,
}

impl BufferViewRange {
    /// End of the range in bytes, saturating on overflow.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

/// Mip and array-layer range of a texture view.
///
/// `None` counts mean "all remaining".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureViewRange {
    pub base_mip: u32,
    pub mip_count: Option<u32>,
    pub base_layer: u32,
    pub layer_count: Option<u32>,
}

impl TextureViewRange {
    /// Resolve the mip count against a resource's mip levels.
    pub fn resolved_mip_count(&self, mip_levels: u32) -> u32 {
        self.mip_count
            .unwrap_or_else(|| mip_levels.saturating_sub(self.base_mip))
    }

    /// Resolve the layer count against a resource's array layers.
    pub fn resolved_layer_count(&self, array_layers: u32) -> u32 {
        self.layer_count
            .unwrap_or_else(|| array_layers.saturating_sub(self.base_layer))
    }
}

/// Kind-specific part of a view description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewRange {
    Buffer(BufferViewRange),
    Texture(TextureViewRange),
}

/// Complete description of a view.
///
/// Compared structurally for descriptor cache lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewDescription {
    pub kind: ViewKind,
    pub format: Format,
    pub dimension: ViewDimension,
    pub range: ViewRange,
}

impl ViewDescription {
    /// Constant buffer view over `size` bytes at `offset`.
    pub fn constant_buffer(offset: u64, size: u64) -> Self {
        Self::buffer_view(ViewKind::ConstantBuffer, Format::Unknown, offset, size)
    }

    /// Raw or typed buffer shader resource view.
    pub fn buffer_srv(format: Format, offset: u64, size: u64) -> Self {
        Self::buffer_view(ViewKind::ShaderResource, format, offset, size)
    }

    /// Raw or typed buffer unordered access view.
    pub fn buffer_uav(format: Format, offset: u64, size: u64) -> Self {
        Self::buffer_view(ViewKind::UnorderedAccess, format, offset, size)
    }

    /// Structured buffer view of `count` elements of `stride` bytes.
    pub fn structured(kind: ViewKind, offset: u64, stride: u32, count: u64) -> Self {
        Self {
            kind,
            format: Format::Unknown,
            dimension: ViewDimension::Buffer,
            range: ViewRange::Buffer(BufferViewRange {
                offset,
                size: u64::from(stride) * count,
                stride: Some(stride),
                element_count: Some(count),
                counter_offset: None,
            }),
        }
    }

    fn buffer_view(kind: ViewKind, format: Format, offset: u64, size: u64) -> Self {
        Self {
            kind,
            format,
            dimension: ViewDimension::Buffer,
            range: ViewRange::Buffer(BufferViewRange {
                offset,
                size,
                ..Default::default()
            }),
        }
    }

    /// Texture shader resource view over every mip and layer.
    pub fn texture_srv(format: Format, dimension: ViewDimension) -> Self {
        Self::texture_view(ViewKind::ShaderResource, format, dimension)
    }

    /// Texture unordered access view of mip 0.
    pub fn texture_uav(format: Format, dimension: ViewDimension) -> Self {
        Self::texture_view(ViewKind::UnorderedAccess, format, dimension).with_mips(0, 1)
    }

    /// Render target view of mip 0.
    pub fn render_target(format: Format, dimension: ViewDimension) -> Self {
        Self::texture_view(ViewKind::RenderTarget, format, dimension).with_mips(0, 1)
    }

    /// Depth-stencil view of mip 0.
    pub fn depth_stencil(format: Format, dimension: ViewDimension) -> Self {
        Self::texture_view(ViewKind::DepthStencil, format, dimension).with_mips(0, 1)
    }

    fn texture_view(kind: ViewKind, format: Format, dimension: ViewDimension) -> Self {
        Self {
            kind,
            format,
            dimension,
            range: ViewRange::Texture(TextureViewRange::default()),
        }
    }

    /// Attach a UAV counter at `offset` bytes. No-op on texture views.
    pub fn with_counter(mut self, offset: u64) -> Self {
        if let ViewRange::Buffer(range) = &mut self.range {
            range.counter_offset = Some(offset);
        }
        self
    }

    /// Restrict a texture view to `count` mips starting at `base`.
    pub fn with_mips(mut self, base: u32, count: u32) -> Self {
        if let ViewRange::Texture(range) = &mut self.range {
            range.base_mip = base;
            range.mip_count = Some(count);
        }
        self
    }

    /// Restrict a texture view to `count` layers starting at `base`.
    pub fn with_layers(mut self, base: u32, count: u32) -> Self {
        if let ViewRange::Texture(range) = &mut self.range {
            range.base_layer = base;
            range.layer_count = Some(count);
        }
        self
    }

    /// The buffer range, if this is a buffer view.
    pub fn buffer_range(&self) -> Option<&BufferViewRange> {
        match &self.range {
            ViewRange::Buffer(range) => Some(range),
            ViewRange::Texture(_) => None,
        }
    }

    /// The texture range, if this is a texture view.
    pub fn texture_range(&self) -> Option<&TextureViewRange> {
        match &self.range {
            ViewRange::Texture(range) => Some(range),
            ViewRange::Buffer(_) => None,
        }
    }
}
