//! Copy footprints: the linear layout a texture's subresources take in an
//! upload buffer.

use crate::types::ResourceDescription;

/// Placement of one subresource (mip level of one array layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceFootprint {
    pub mip_level: u32,
    pub array_layer: u32,
    /// Byte offset from the start of the upload buffer.
    pub offset: u64,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Bytes of texel data in one row.
    pub row_size: u64,
    /// Bytes between the starts of consecutive rows.
    pub row_pitch: u64,
    pub num_rows: u32,
}

impl SubresourceFootprint {
    /// Bytes the subresource occupies, padding included.
    pub fn size(&self) -> u64 {
        self.row_pitch * u64::from(self.num_rows) * u64::from(self.depth)
    }
}

/// Layout of every subresource of a texture in a linear buffer.
///
/// Subresources are ordered by array layer, then mip level, matching the
/// usual `mip + layer * mip_levels` subresource index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CopyFootprint {
    pub subresources: Vec<SubresourceFootprint>,
    pub total_size: u64,
}

impl CopyFootprint {
    /// Compute the footprint of `description` for a backend that pads rows to
    /// `row_pitch_alignment` and places subresources at multiples of
    /// `placement_alignment` bytes.
    ///
    /// Buffers have a single row spanning their width.
    pub fn compute(
        description: &ResourceDescription,
        row_pitch_alignment: u64,
        placement_alignment: u64,
    ) -> Self {
        if description.is_buffer() {
            let subresource = SubresourceFootprint {
                mip_level: 0,
                array_layer: 0,
                offset: 0,
                width: u32::try_from(description.width).unwrap_or(u32::MAX),
                height: 1,
                depth: 1,
                row_size: description.width,
                row_pitch: description.width,
                num_rows: 1,
            };
            return Self {
                subresources: vec![subresource],
                total_size: description.width,
            };
        }

        let block_size = u64::from(description.format.block_size().max(1));
        let extent = description.extent();
        let mut subresources = Vec::with_capacity(description.subresource_count() as usize);
        let mut cursor = 0u64;

        for array_layer in 0..description.array_layers() {
            for mip_level in 0..description.mip_levels {
                let mip = extent.mip_level(mip_level);
                let row_size = u64::from(mip.width) * block_size;
                let subresource = SubresourceFootprint {
                    mip_level,
                    array_layer,
                    offset: align_up(cursor, placement_alignment),
                    width: mip.width,
                    height: mip.height,
                    depth: mip.depth,
                    row_size,
                    row_pitch: align_up(row_size, row_pitch_alignment),
                    num_rows: mip.height,
                };
                cursor = subresource.offset + subresource.size();
                subresources.push(subresource);
            }
        }

        Self {
            subresources,
            total_size: cursor,
        }
    }

    /// Footprint of one subresource.
    pub fn subresource(&self, mip_level: u32, array_layer: u32) -> Option<&SubresourceFootprint> {
        self.subresources
            .iter()
            .find(|s| s.mip_level == mip_level && s.array_layer == array_layer)
    }

    /// Row sizes of array layer 0, one per mip.
    pub fn row_sizes(&self) -> Vec<u64> {
        self.layer_zero().map(|s| s.row_size).collect()
    }

    /// Row pitches of array layer 0, one per mip.
    pub fn row_pitches(&self) -> Vec<u64> {
        self.layer_zero().map(|s| s.row_pitch).collect()
    }

    fn layer_zero(&self) -> impl Iterator<Item = &SubresourceFootprint> {
        self.subresources.iter().filter(|s| s.array_layer == 0)
    }
}

pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Format;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(17, 1), 17);
        assert_eq!(align_up(17, 0), 17);
    }

    #[test]
    fn test_single_mip_footprint() {
        let desc = ResourceDescription::texture_2d(100, 4, Format::Rgba8Unorm);
        let footprint = CopyFootprint::compute(&desc, 256, 512);

        assert_eq!(footprint.subresources.len(), 1);
        let mip0 = footprint.subresources[0];
        assert_eq!(mip0.row_size, 400);
        assert_eq!(mip0.row_pitch, 512);
        assert_eq!(mip0.num_rows, 4);
        assert_eq!(footprint.total_size, 512 * 4);
    }

    #[test]
    fn test_mip_chain_placement() {
        let desc = ResourceDescription::texture_2d(64, 64, Format::R8Unorm).with_mip_levels(3);
        let footprint = CopyFootprint::compute(&desc, 256, 512);

        assert_eq!(footprint.row_sizes(), vec![64, 32, 16]);
        assert_eq!(footprint.row_pitches(), vec![256, 256, 256]);

        // 256 * 64 = 16384, then 256 * 32 = 8192 placed at 16384.
        let mip1 = footprint.subresource(1, 0).unwrap();
        assert_eq!(mip1.offset, 16384);
        let mip2 = footprint.subresource(2, 0).unwrap();
        assert_eq!(mip2.offset, 16384 + 8192);
        assert_eq!(footprint.total_size, 16384 + 8192 + 256 * 16);
    }

    #[test]
    fn test_array_layers_follow_mips() {
        let desc = ResourceDescription::texture_2d(4, 4, Format::Rgba8Unorm)
            .with_mip_levels(2)
            .with_array_layers(2);
        let footprint = CopyFootprint::compute(&desc, 1, 16);

        let order: Vec<_> = footprint
            .subresources
            .iter()
            .map(|s| (s.array_layer, s.mip_level))
            .collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        // 16 * 4 = 64, then 8 * 2 = 16 rounded to 16.
        assert_eq!(footprint.subresource(1, 0).unwrap().offset, 64);
        assert_eq!(footprint.subresource(0, 1).unwrap().offset, 80);
    }

    #[test]
    fn test_volume_depth_counts() {
        let desc = ResourceDescription::texture_3d(8, 8, 4, Format::R32Float);
        let footprint = CopyFootprint::compute(&desc, 1, 1);
        assert_eq!(footprint.total_size, 32 * 8 * 4);
    }
}
