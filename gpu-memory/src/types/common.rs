//! Common types shared across resource descriptions.

/// 3D extent for textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels (1 for 1D and 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Extent of the given mip level, clamped to one texel per axis.
    pub fn mip_level(&self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
            depth: (self.depth >> level).max(1),
        }
    }
}

/// Optimized clear value baked into a render-target or depth-stencil resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear color attachment with RGBA values.
    Color { r: f32, g: f32, b: f32, a: f32 },
    /// Clear depth attachment.
    Depth(f32),
    /// Clear depth and stencil attachments.
    DepthStencil { depth: f32, stencil: u8 },
}

impl ClearValue {
    /// Create a color clear value.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color { r, g, b, a }
    }

    /// Create a depth clear value.
    pub fn depth(value: f32) -> Self {
        Self::Depth(value)
    }

    /// Returns true if this clear value targets a depth attachment.
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth(_) | Self::DepthStencil { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_extent_clamps_to_one() {
        let extent = Extent3d::new_2d(256, 64);
        assert_eq!(extent.mip_level(2), Extent3d::new_2d(64, 16));
        assert_eq!(extent.mip_level(8), Extent3d::new_2d(1, 1));
    }

    #[test]
    fn test_clear_value_kind() {
        assert!(ClearValue::depth(1.0).is_depth());
        assert!(!ClearValue::color(0.0, 0.0, 0.0, 1.0).is_depth());
    }
}
