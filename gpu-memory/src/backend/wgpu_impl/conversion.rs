//! Type conversions between memory-layer types and wgpu types.

use crate::types::{
    AddressMode, CompareFunction, FilterMode, Format, Residency, ResourceDescription,
    ResourceDimension, ResourceUsage, ViewDimension,
};

/// Convert a format to its wgpu equivalent. [`Format::Unknown`] has none.
pub fn convert_format(format: Format) -> Option<wgpu::TextureFormat> {
    Some(match format {
        Format::Unknown => return None,

        // 8-bit formats
        Format::R8Unorm => wgpu::TextureFormat::R8Unorm,
        Format::R8Snorm => wgpu::TextureFormat::R8Snorm,
        Format::R8Uint => wgpu::TextureFormat::R8Uint,
        Format::R8Sint => wgpu::TextureFormat::R8Sint,

        // 16-bit formats
        Format::R16Unorm => wgpu::TextureFormat::R16Unorm,
        Format::R16Float => wgpu::TextureFormat::R16Float,
        Format::Rg8Unorm => wgpu::TextureFormat::Rg8Unorm,

        // 32-bit formats
        Format::R32Float => wgpu::TextureFormat::R32Float,
        Format::R32Uint => wgpu::TextureFormat::R32Uint,
        Format::Rg16Float => wgpu::TextureFormat::Rg16Float,
        Format::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        Format::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        Format::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        Format::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,

        // 64-bit formats
        Format::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        Format::Rg32Float => wgpu::TextureFormat::Rg32Float,

        // 128-bit formats
        Format::Rgba32Float => wgpu::TextureFormat::Rgba32Float,

        // Depth/stencil formats
        Format::Depth16Unorm => wgpu::TextureFormat::Depth16Unorm,
        Format::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
        Format::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        Format::Depth32Float => wgpu::TextureFormat::Depth32Float,
        Format::Depth32FloatStencil8 => wgpu::TextureFormat::Depth32FloatStencil8,
    })
}

/// Buffer usages for a buffer with the given usage flags and residency.
///
/// Readback buffers may only combine `MAP_READ` with `COPY_DST`. Every other
/// buffer is written through the queue, so it carries both copy usages.
pub fn convert_buffer_usage(usage: ResourceUsage, residency: Residency) -> wgpu::BufferUsages {
    if residency == Residency::Readback {
        return wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;
    }

    let mut result =
        wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::UNIFORM;

    if !usage.contains(ResourceUsage::DENY_SHADER_RESOURCE)
        || usage.contains(ResourceUsage::UNORDERED_ACCESS)
    {
        result |= wgpu::BufferUsages::STORAGE;
    }
    if usage.contains(ResourceUsage::VERTEX) {
        result |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(ResourceUsage::INDEX) {
        result |= wgpu::BufferUsages::INDEX;
    }
    if usage.contains(ResourceUsage::INDIRECT_ARGUMENT) {
        result |= wgpu::BufferUsages::INDIRECT;
    }

    result
}

/// Texture usages for a texture description.
pub fn convert_texture_usage(description: &ResourceDescription) -> wgpu::TextureUsages {
    let usage = description.usage;
    let mut result = wgpu::TextureUsages::empty();

    // Multisampled textures cannot be copied.
    if description.sample_count <= 1 {
        result |= wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
    }
    if !usage.contains(ResourceUsage::DENY_SHADER_RESOURCE) {
        result |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.intersects(ResourceUsage::RENDER_TARGET | ResourceUsage::DEPTH_STENCIL) {
        result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(ResourceUsage::UNORDERED_ACCESS) {
        result |= wgpu::TextureUsages::STORAGE_BINDING;
    }

    result
}

/// Convert a texture resource dimension. Buffers have none.
pub fn convert_texture_dimension(dimension: ResourceDimension) -> Option<wgpu::TextureDimension> {
    match dimension {
        ResourceDimension::Buffer => None,
        ResourceDimension::Texture1D => Some(wgpu::TextureDimension::D1),
        ResourceDimension::Texture2D => Some(wgpu::TextureDimension::D2),
        ResourceDimension::Texture3D => Some(wgpu::TextureDimension::D3),
    }
}

/// Convert a view dimension. wgpu has no 1D array views.
pub fn convert_view_dimension(dimension: ViewDimension) -> Option<wgpu::TextureViewDimension> {
    match dimension {
        ViewDimension::Buffer | ViewDimension::Texture1DArray => None,
        ViewDimension::Texture1D => Some(wgpu::TextureViewDimension::D1),
        ViewDimension::Texture2D | ViewDimension::Texture2DMs => {
            Some(wgpu::TextureViewDimension::D2)
        }
        ViewDimension::Texture2DArray => Some(wgpu::TextureViewDimension::D2Array),
        ViewDimension::Texture3D => Some(wgpu::TextureViewDimension::D3),
        ViewDimension::TextureCube => Some(wgpu::TextureViewDimension::Cube),
        ViewDimension::TextureCubeArray => Some(wgpu::TextureViewDimension::CubeArray),
    }
}

/// Convert AddressMode to wgpu address mode.
pub fn convert_address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        AddressMode::ClampToBorder => wgpu::AddressMode::ClampToBorder,
    }
}

/// Convert FilterMode to wgpu filter mode.
pub fn convert_filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// Convert CompareFunction to wgpu compare function.
pub fn convert_compare_function(func: CompareFunction) -> wgpu::CompareFunction {
    match func {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readback_buffer_usage() {
        let usage = convert_buffer_usage(ResourceUsage::UNORDERED_ACCESS, Residency::Readback);
        assert_eq!(
            usage,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST
        );
    }

    #[test]
    fn test_default_buffer_usage() {
        let usage = convert_buffer_usage(ResourceUsage::VERTEX, Residency::Default);
        assert!(usage.contains(wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST));
        assert!(usage.contains(wgpu::BufferUsages::STORAGE));
        assert!(!usage.contains(wgpu::BufferUsages::MAP_READ));
    }

    #[test]
    fn test_texture_usage() {
        let desc = ResourceDescription::texture_2d(4, 4, Format::Depth32Float)
            .with_usage(ResourceUsage::DEPTH_STENCIL | ResourceUsage::DENY_SHADER_RESOURCE);
        let usage = convert_texture_usage(&desc);
        assert!(usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(!usage.contains(wgpu::TextureUsages::TEXTURE_BINDING));

        let msaa = ResourceDescription::texture_2d(4, 4, Format::Rgba8Unorm)
            .with_usage(ResourceUsage::RENDER_TARGET)
            .with_sample_count(4);
        assert!(!convert_texture_usage(&msaa).contains(wgpu::TextureUsages::COPY_SRC));
    }

    #[test]
    fn test_filter_modes() {
        assert_eq!(convert_filter_mode(FilterMode::Linear), wgpu::FilterMode::Linear);
        assert_eq!(convert_filter_mode(FilterMode::Nearest), wgpu::FilterMode::Nearest);
    }

    #[test]
    fn test_view_dimensions() {
        assert_eq!(convert_view_dimension(ViewDimension::Texture1DArray), None);
        assert_eq!(
            convert_view_dimension(ViewDimension::Texture2DMs),
            Some(wgpu::TextureViewDimension::D2)
        );
        assert_eq!(convert_format(Format::Unknown), None);
    }
}
