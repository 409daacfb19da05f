//! Packed vertex format for voxel meshes.
//!
//! Every vertex fits in two 32-bit words:
//!
//! | word | bits  | field                                   |
//! |------|-------|-----------------------------------------|
//! | 0    | 0-17  | position `x \| y << 6 \| z << 12`       |
//! | 0    | 18-26 | light color (9 bits)                    |
//! | 0    | 27-31 | light level (5 bits)                    |
//! | 1    | 0-11  | texture index (12 bits)                 |
//! | 1    | 12-16 | skylight (5 bits)                       |
//! | 1    | 17-19 | face normal id (`BlockSide`, 3 bits)    |
//! | 1    | 20-21 | UV corner (2 bits)                      |
//! | 1    | 22-23 | ambient occlusion (2 bits)              |
//!
//! Positions are corner coordinates relative to the chunk origin and lie in
//! `[0, CHUNK_DIMENSION]`. A value that does not fit its field is a bug in the caller and
//! panics, in release builds too.

use crate::engine_state::voxels::block::block_side::BlockSide;

const POSITION_BITS: u32 = 6;
const LIGHT_COLOR_SHIFT: u32 = 18;
const LIGHT_COLOR_BITS: u32 = 9;
const LIGHT_LEVEL_SHIFT: u32 = 27;
const LIGHT_LEVEL_BITS: u32 = 5;

const TEXTURE_BITS: u32 = 12;
const SKYLIGHT_SHIFT: u32 = 12;
const SKYLIGHT_BITS: u32 = 5;
const NORMAL_SHIFT: u32 = 17;
const NORMAL_BITS: u32 = 3;
const UV_SHIFT: u32 = 20;
const UV_BITS: u32 = 2;
const AO_SHIFT: u32 = 22;
const AO_BITS: u32 = 2;

/// Light color used while lighting is not computed (all channels on).
pub const DEFAULT_LIGHT_COLOR: u32 = 0x1FF;
/// Block light level used while lighting is not computed.
pub const DEFAULT_LIGHT_LEVEL: u32 = 0;
/// Full skylight.
pub const FULL_SKYLIGHT: u32 = 31;

/// A vertex as uploaded to the GPU.
///
/// # Memory Layout
/// Two `u32` words, 8 bytes total. `bytemuck` can view a slice of these as bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedVertex {
    pub words: [u32; 2],
}

/// The unpacked fields of a vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexAttributes {
    /// Corner position relative to the chunk origin, each in `[0, 63]`.
    pub position: [u32; 3],
    pub light_color: u32,
    pub light_level: u32,
    pub texture_index: u32,
    pub skylight: u32,
    pub normal: BlockSide,
    /// Which corner of the texture this vertex maps to (ll, lr, ul, ur).
    pub uv_corner: u32,
    /// 0 is fully occluded, 3 is unoccluded.
    pub ao: u32,
}

impl VertexAttributes {
    /// A vertex with the constant lighting used until lighting is computed.
    pub fn unlit(
        position: [u32; 3],
        texture_index: u32,
        normal: BlockSide,
        uv_corner: u32,
        ao: u32,
    ) -> Self {
        VertexAttributes {
            position,
            light_color: DEFAULT_LIGHT_COLOR,
            light_level: DEFAULT_LIGHT_LEVEL,
            texture_index,
            skylight: FULL_SKYLIGHT,
            normal,
            uv_corner,
            ao,
        }
    }
}

#[inline]
fn mask(bits: u32) -> u32 {
    (1 << bits) - 1
}

#[inline]
fn field(name: &str, value: u32, bits: u32, shift: u32) -> u32 {
    assert!(
        value <= mask(bits),
        "vertex field {} = {} does not fit in {} bits",
        name,
        value,
        bits
    );
    value << shift
}

impl PackedVertex {
    /// Size of one vertex in bytes.
    pub const STRIDE: usize = std::mem::size_of::<PackedVertex>();

    /// Packs the attributes into two words.
    ///
    /// # Panics
    /// Panics if any field exceeds its bit width.
    #[inline]
    pub fn pack(attributes: &VertexAttributes) -> Self {
        let [x, y, z] = attributes.position;
        let word0 = field("position.x", x, POSITION_BITS, 0)
            | field("position.y", y, POSITION_BITS, POSITION_BITS)
            | field("position.z", z, POSITION_BITS, 2 * POSITION_BITS)
            | field(
                "light_color",
                attributes.light_color,
                LIGHT_COLOR_BITS,
                LIGHT_COLOR_SHIFT,
            )
            | field(
                "light_level",
                attributes.light_level,
                LIGHT_LEVEL_BITS,
                LIGHT_LEVEL_SHIFT,
            );

        let word1 = field("texture_index", attributes.texture_index, TEXTURE_BITS, 0)
            | field("skylight", attributes.skylight, SKYLIGHT_BITS, SKYLIGHT_SHIFT)
            | field("normal", attributes.normal as u32, NORMAL_BITS, NORMAL_SHIFT)
            | field("uv_corner", attributes.uv_corner, UV_BITS, UV_SHIFT)
            | field("ao", attributes.ao, AO_BITS, AO_SHIFT);

        PackedVertex {
            words: [word0, word1],
        }
    }

    /// Decodes the packed words.
    ///
    /// # Panics
    /// Panics if the normal id is not a valid `BlockSide`, which `pack` never produces.
    pub fn unpack(self) -> VertexAttributes {
        let [word0, word1] = self.words;
        let normal_id = (word1 >> NORMAL_SHIFT) & mask(NORMAL_BITS);
        let normal = BlockSide::from_normal_id(normal_id)
            .unwrap_or_else(|| panic!("invalid normal id {} in packed vertex", normal_id));

        VertexAttributes {
            position: [
                word0 & mask(POSITION_BITS),
                (word0 >> POSITION_BITS) & mask(POSITION_BITS),
                (word0 >> (2 * POSITION_BITS)) & mask(POSITION_BITS),
            ],
            light_color: (word0 >> LIGHT_COLOR_SHIFT) & mask(LIGHT_COLOR_BITS),
            light_level: (word0 >> LIGHT_LEVEL_SHIFT) & mask(LIGHT_LEVEL_BITS),
            texture_index: word1 & mask(TEXTURE_BITS),
            skylight: (word1 >> SKYLIGHT_SHIFT) & mask(SKYLIGHT_BITS),
            normal,
            uv_corner: (word1 >> UV_SHIFT) & mask(UV_BITS),
            ao: (word1 >> AO_SHIFT) & mask(AO_BITS),
        }
    }
}
