//! # Block Type Module
//!
//! The built-in block set registered by `BlockRegistry::default_blocks`.

use num_derive::FromPrimitive;

use super::{BlockState, BlockTypeSize, RenderCategory};

/// Enumerates the block types the engine ships with.
///
/// The discriminant is the block id stored in `BlockState`. The `FromPrimitive`
/// derive allows conversion back from stored ids.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// An air block, which is never rendered.
    AIR = 0,

    DIRT = 1,

    /// A grass block with different textures on top and sides.
    GRASS = 2,

    WOOD = 3,

    STONE = 4,

    /// See-through and routed to the transparent mesh stream.
    GLASS = 5,

    WATER = 6,
}

impl BlockType {
    /// Converts a stored block id back to a `BlockType`, if it is one of the built-ins.
    pub fn from_id(id: BlockTypeSize) -> Option<Self> {
        num::FromPrimitive::from_u16(id)
    }

    pub fn render_category(self) -> RenderCategory {
        match self {
            BlockType::AIR => RenderCategory::None,
            BlockType::GLASS | BlockType::WATER => RenderCategory::Transparent,
            _ => RenderCategory::Opaque,
        }
    }

    /// Texture indices for each face in the order
    /// [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT].
    pub fn texture_indices(self) -> [u16; 6] {
        match self {
            BlockType::AIR => [0; 6],
            BlockType::DIRT => [1, 1, 1, 1, 1, 1],
            BlockType::GRASS => [2, 2, 1, 3, 2, 2],
            BlockType::WOOD => [0, 0, 0, 0, 0, 0],
            BlockType::STONE => [4, 4, 4, 4, 4, 4],
            BlockType::GLASS => [5, 5, 5, 5, 5, 5],
            BlockType::WATER => [6, 6, 6, 6, 6, 6],
        }
    }

    /// The block state for this type with no metadata.
    pub fn state(self) -> BlockState {
        BlockState::new(self as BlockTypeSize, self.render_category())
    }

    pub fn all() -> [BlockType; 7] {
        [
            BlockType::AIR,
            BlockType::DIRT,
            BlockType::GRASS,
            BlockType::WOOD,
            BlockType::STONE,
            BlockType::GLASS,
            BlockType::WATER,
        ]
    }
}
