//! Element and pixel formats.

/// Element or pixel format of a resource or view.
///
/// [`Format::Unknown`] is used for buffers and for raw / structured buffer
/// views, whose element layout is given by a stride instead of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Format {
    /// No typed format (buffers, structured views).
    #[default]
    Unknown,

    // 8-bit formats
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit red channel, signed normalized.
    R8Snorm,
    /// 8-bit red channel, unsigned integer.
    R8Uint,
    /// 8-bit red channel, signed integer.
    R8Sint,

    // 16-bit formats
    /// 16-bit red channel, unsigned normalized.
    R16Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,

    // 32-bit formats
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,

    // 64-bit formats
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RG channels, float.
    Rg32Float,

    // 128-bit formats
    /// 32-bit RGBA channels, float.
    Rgba32Float,

    // Depth/stencil formats
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth.
    Depth24Plus,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
    /// 32-bit depth float with 8-bit stencil.
    Depth32FloatStencil8,
}

impl Format {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24Plus
                | Self::Depth24PlusStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    /// Returns true for [`Format::Unknown`].
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns the size in bytes per pixel, or 0 for [`Format::Unknown`].
    pub fn block_size(&self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::R8Unorm | Self::R8Snorm | Self::R8Uint | Self::R8Sint => 1,
            Self::R16Unorm | Self::R16Float | Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth24Plus
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Rg32Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}
