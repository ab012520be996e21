//! Type conversions between memory-layer types and Vulkan types.

use ash::vk;
use gpu_allocator::MemoryLocation;

use crate::types::{
    AddressMode, CompareFunction, FilterMode, Format, Residency, ResourceDescription,
    ResourceUsage, ViewDimension,
};

/// Convert a format to Vulkan. [`Format::Unknown`] maps to `UNDEFINED`.
pub fn convert_format(format: Format) -> vk::Format {
    match format {
        Format::Unknown => vk::Format::UNDEFINED,

        // 8-bit formats
        Format::R8Unorm => vk::Format::R8_UNORM,
        Format::R8Snorm => vk::Format::R8_SNORM,
        Format::R8Uint => vk::Format::R8_UINT,
        Format::R8Sint => vk::Format::R8_SINT,

        // 16-bit formats
        Format::R16Unorm => vk::Format::R16_UNORM,
        Format::R16Float => vk::Format::R16_SFLOAT,
        Format::Rg8Unorm => vk::Format::R8G8_UNORM,

        // 32-bit formats
        Format::R32Float => vk::Format::R32_SFLOAT,
        Format::R32Uint => vk::Format::R32_UINT,
        Format::Rg16Float => vk::Format::R16G16_SFLOAT,
        Format::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        Format::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        Format::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        Format::Bgra8UnormSrgb => vk::Format::B8G8R8A8_SRGB,

        // 64-bit formats
        Format::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        Format::Rg32Float => vk::Format::R32G32_SFLOAT,

        // 128-bit formats
        Format::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,

        // Depth/stencil formats
        Format::Depth16Unorm => vk::Format::D16_UNORM,
        Format::Depth24Plus => vk::Format::D32_SFLOAT, // no plain D24 in Vulkan
        Format::Depth24PlusStencil8 => vk::Format::D24_UNORM_S8_UINT,
        Format::Depth32Float => vk::Format::D32_SFLOAT,
        Format::Depth32FloatStencil8 => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Memory location for a residency.
pub fn convert_residency(residency: Residency) -> MemoryLocation {
    match residency {
        Residency::Default => MemoryLocation::GpuOnly,
        Residency::Upload => MemoryLocation::CpuToGpu,
        Residency::Readback => MemoryLocation::GpuToCpu,
    }
}

/// Buffer usage flags for a usage set.
///
/// Vulkan usage only gates binding, not memory placement, so every buffer
/// is bindable as a constant, storage or texel buffer and copyable.
pub fn convert_buffer_usage(usage: ResourceUsage) -> vk::BufferUsageFlags {
    let mut result = vk::BufferUsageFlags::TRANSFER_SRC
        | vk::BufferUsageFlags::TRANSFER_DST
        | vk::BufferUsageFlags::UNIFORM_BUFFER
        | vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER
        | vk::BufferUsageFlags::STORAGE_BUFFER;

    if usage.contains(ResourceUsage::UNORDERED_ACCESS) {
        result |= vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER;
    }
    if usage.contains(ResourceUsage::VERTEX) {
        result |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(ResourceUsage::INDEX) {
        result |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(ResourceUsage::INDIRECT_ARGUMENT) {
        result |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }

    result
}

/// Image usage flags for a texture description.
pub fn convert_texture_usage(description: &ResourceDescription) -> vk::ImageUsageFlags {
    let usage = description.usage;
    let mut result = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;

    if !usage.contains(ResourceUsage::DENY_SHADER_RESOURCE) {
        result |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(ResourceUsage::UNORDERED_ACCESS) {
        result |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(ResourceUsage::RENDER_TARGET) {
        result |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(ResourceUsage::DEPTH_STENCIL) {
        result |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }

    result
}

/// Convert a texture view dimension. Buffers have no image view type.
pub fn convert_view_dimension(dimension: ViewDimension) -> Option<vk::ImageViewType> {
    match dimension {
        ViewDimension::Buffer => None,
        ViewDimension::Texture1D => Some(vk::ImageViewType::TYPE_1D),
        ViewDimension::Texture1DArray => Some(vk::ImageViewType::TYPE_1D_ARRAY),
        ViewDimension::Texture2D | ViewDimension::Texture2DMs => Some(vk::ImageViewType::TYPE_2D),
        ViewDimension::Texture2DArray => Some(vk::ImageViewType::TYPE_2D_ARRAY),
        ViewDimension::Texture3D => Some(vk::ImageViewType::TYPE_3D),
        ViewDimension::TextureCube => Some(vk::ImageViewType::CUBE),
        ViewDimension::TextureCubeArray => Some(vk::ImageViewType::CUBE_ARRAY),
    }
}

/// Image aspects of a format.
pub fn format_aspects(format: Format) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth_stencil() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Sample count flag for a sample count.
pub fn convert_sample_count(count: u32) -> vk::SampleCountFlags {
    match count {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

/// Convert FilterMode to Vulkan filter.
pub fn convert_filter_mode(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

/// Convert FilterMode to Vulkan mipmap filter mode.
pub fn convert_mipmap_filter_mode(mode: FilterMode) -> vk::SamplerMipmapMode {
    match mode {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

/// Convert AddressMode to Vulkan sampler address mode.
pub fn convert_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

/// Convert CompareFunction to Vulkan compare op.
pub fn convert_compare_function(func: CompareFunction) -> vk::CompareOp {
    match func {
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Always => vk::CompareOp::ALWAYS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_residency_locations() {
        assert_eq!(convert_residency(Residency::Default), MemoryLocation::GpuOnly);
        assert_eq!(convert_residency(Residency::Upload), MemoryLocation::CpuToGpu);
        assert_eq!(convert_residency(Residency::Readback), MemoryLocation::GpuToCpu);
    }

    #[test]
    fn test_depth_aspects() {
        assert_eq!(
            format_aspects(Format::Depth24PlusStencil8),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(format_aspects(Format::Depth32Float), vk::ImageAspectFlags::DEPTH);
        assert_eq!(format_aspects(Format::Rgba8Unorm), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_texture_usage() {
        let desc = ResourceDescription::texture_2d(8, 8, Format::Rgba8Unorm)
            .with_usage(ResourceUsage::RENDER_TARGET | ResourceUsage::UNORDERED_ACCESS);
        let usage = convert_texture_usage(&desc);
        assert!(usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert!(usage.contains(vk::ImageUsageFlags::STORAGE));
        assert!(usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert!(!usage.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT));
    }
}
