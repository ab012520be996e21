//! Compatibility checks between a resource and a requested view.

use crate::error::{MemoryError, MemoryResult};
use crate::types::{
    BufferViewRange, ResourceDescription, ResourceDimension, ResourceUsage, TextureViewRange,
    ViewDescription, ViewDimension, ViewKind, ViewRange,
};

/// Check that `view` can be created on a resource described by `resource`.
pub fn validate_view(resource: &ResourceDescription, view: &ViewDescription) -> MemoryResult<()> {
    match (resource.dimension, &view.range) {
        (ResourceDimension::Buffer, ViewRange::Buffer(range)) => {
            validate_buffer_view(resource, view, range)
        }
        (ResourceDimension::Buffer, ViewRange::Texture(_)) => Err(MemoryError::unsupported(
            view.kind,
            view.dimension,
            "buffer resources need a buffer view range",
        )),
        (_, ViewRange::Texture(range)) => validate_texture_view(resource, view, range),
        (_, ViewRange::Buffer(_)) => Err(MemoryError::unsupported(
            view.kind,
            view.dimension,
            format!("{:?} resources need a texture view range", resource.dimension),
        )),
    }
}

fn check_shader_usage(resource: &ResourceDescription, view: &ViewDescription) -> MemoryResult<()> {
    match view.kind {
        ViewKind::ShaderResource if resource.usage.contains(ResourceUsage::DENY_SHADER_RESOURCE) => {
            Err(MemoryError::unsupported(
                view.kind,
                view.dimension,
                "resource denies shader resource access",
            ))
        }
        ViewKind::UnorderedAccess if !resource.usage.contains(ResourceUsage::UNORDERED_ACCESS) => {
            Err(MemoryError::unsupported(
                view.kind,
                view.dimension,
                "resource lacks unordered access usage",
            ))
        }
        _ => Ok(()),
    }
}

fn validate_buffer_view(
    resource: &ResourceDescription,
    view: &ViewDescription,
    range: &BufferViewRange,
) -> MemoryResult<()> {
    if view.dimension != ViewDimension::Buffer {
        return Err(MemoryError::unsupported(
            view.kind,
            view.dimension,
            "buffer views must use the buffer dimension",
        ));
    }
    if matches!(view.kind, ViewKind::RenderTarget | ViewKind::DepthStencil) {
        return Err(MemoryError::unsupported(
            view.kind,
            view.dimension,
            "buffers cannot be bound as attachments",
        ));
    }
    check_shader_usage(resource, view)?;

    if range.size == 0 {
        return Err(MemoryError::InvalidDescription(
            "buffer view size cannot be zero".into(),
        ));
    }
    if range.offset.checked_add(range.size).is_none_or(|end| end > resource.width) {
        return Err(MemoryError::OutOfBounds {
            offset: range.offset,
            size: range.size,
            limit: resource.width,
        });
    }
    if let (Some(stride), Some(count)) = (range.stride, range.element_count)
        && u64::from(stride).checked_mul(count) != Some(range.size)
    {
        return Err(MemoryError::InvalidDescription(format!(
            "{count} elements of {stride} bytes do not span {} bytes",
            range.size
        )));
    }
    if let Some(counter) = range.counter_offset {
        if view.kind != ViewKind::UnorderedAccess {
            return Err(MemoryError::InvalidDescription(
                "only unordered access views have counters".into(),
            ));
        }
        // Counters are one u32.
        if counter.checked_add(4).is_none_or(|end| end > resource.width) {
            return Err(MemoryError::OutOfBounds {
                offset: counter,
                size: 4,
                limit: resource.width,
            });
        }
    }
    Ok(())
}

fn dimension_fits(resource: ResourceDimension, view: ViewDimension) -> bool {
    use ViewDimension as V;
    match resource {
        ResourceDimension::Buffer => view == V::Buffer,
        ResourceDimension::Texture1D => matches!(view, V::Texture1D | V::Texture1DArray),
        ResourceDimension::Texture2D => matches!(
            view,
            V::Texture2D | V::Texture2DArray | V::Texture2DMs | V::TextureCube | V::TextureCubeArray
        ),
        ResourceDimension::Texture3D => view == V::Texture3D,
    }
}

fn validate_texture_view(
    resource: &ResourceDescription,
    view: &ViewDescription,
    range: &TextureViewRange,
) -> MemoryResult<()> {
    let unsupported = |reason: &str| MemoryError::unsupported(view.kind, view.dimension, reason);

    if view.kind == ViewKind::ConstantBuffer {
        return Err(unsupported("constant buffer views need a buffer resource"));
    }
    if !dimension_fits(resource.dimension, view.dimension) {
        return Err(MemoryError::unsupported(
            view.kind,
            view.dimension,
            format!("view does not fit a {:?} resource", resource.dimension),
        ));
    }
    let multisampled = resource.sample_count > 1;
    if multisampled != (view.dimension == ViewDimension::Texture2DMs) {
        return Err(unsupported(
            "multisampled views and multisampled resources must go together",
        ));
    }
    check_shader_usage(resource, view)?;

    // Mip range.
    let mip_count = range.resolved_mip_count(resource.mip_levels);
    if mip_count == 0 {
        return Err(MemoryError::InvalidDescription(
            "texture view covers no mip level".into(),
        ));
    }
    if range.base_mip.saturating_add(mip_count) > resource.mip_levels {
        return Err(MemoryError::OutOfBounds {
            offset: u64::from(range.base_mip),
            size: u64::from(mip_count),
            limit: u64::from(resource.mip_levels),
        });
    }
    if view.kind != ViewKind::ShaderResource && mip_count != 1 {
        return Err(unsupported("only shader resource views span several mips"));
    }

    // Layer range.
    let layers = resource.array_layers();
    let layer_count = range.resolved_layer_count(layers);
    if layer_count == 0 {
        return Err(MemoryError::InvalidDescription(
            "texture view covers no array layer".into(),
        ));
    }
    if range.base_layer.saturating_add(layer_count) > layers {
        return Err(MemoryError::OutOfBounds {
            offset: u64::from(range.base_layer),
            size: u64::from(layer_count),
            limit: u64::from(layers),
        });
    }
    if view.dimension.is_cube() {
        if view.kind != ViewKind::ShaderResource {
            return Err(unsupported("cube views are read-only"));
        }
        if layer_count % 6 != 0 || (view.dimension == ViewDimension::TextureCube && layer_count != 6)
        {
            return Err(unsupported("cube views need six layers per cube"));
        }
    } else if !view.dimension.is_layered() && layer_count != 1 {
        return Err(unsupported("non-array views cover exactly one layer"));
    }

    let format = if view.format.is_unknown() {
        resource.format
    } else {
        view.format
    };
    match view.kind {
        ViewKind::RenderTarget if !resource.usage.contains(ResourceUsage::RENDER_TARGET) => {
            Err(unsupported("resource lacks render target usage"))
        }
        ViewKind::DepthStencil if !resource.usage.contains(ResourceUsage::DEPTH_STENCIL) => {
            Err(unsupported("resource lacks depth-stencil usage"))
        }
        ViewKind::DepthStencil if !format.is_depth_stencil() => {
            Err(unsupported("depth-stencil views need a depth format"))
        }
        ViewKind::RenderTarget if format.is_depth_stencil() => {
            Err(unsupported("render target views need a color format"))
        }
        _ => Ok(()),
    }
}
