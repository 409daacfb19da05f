//! # Block Module
//!
//! This module provides the core block-related functionality: the immutable
//! `BlockState` value stored in chunks, render categories, block faces and the
//! `BlockRegistry` that maps block ids to textures.

use std::collections::HashMap;

use block_side::BlockSide;
use block_type::BlockType;

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block type ids.
pub type BlockTypeSize = u16;

/// Largest texture index that fits the 12-bit vertex field.
pub const MAX_TEXTURE_INDEX: u16 = 4095;

/// How a block takes part in meshing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderCategory {
    /// Not rendered at all (air).
    None,
    /// Hides every face behind it.
    Opaque,
    /// Rendered in the transparent stream, hides nothing opaque.
    Transparent,
}

/// A single voxel value.
///
/// Block states are small `Copy` values; chunks store them directly (flat storage) or
/// deduplicated in a palette.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockState {
    /// Block type id, resolved through a `BlockRegistry`.
    pub id: BlockTypeSize,
    pub category: RenderCategory,
    /// Per-instance metadata bits (orientation, growth stage, ...).
    pub metadata: u8,
}

impl BlockState {
    pub const AIR: BlockState = BlockState {
        id: 0,
        category: RenderCategory::None,
        metadata: 0,
    };

    pub const fn new(id: BlockTypeSize, category: RenderCategory) -> Self {
        BlockState {
            id,
            category,
            metadata: 0,
        }
    }

    pub const fn with_metadata(self, metadata: u8) -> Self {
        BlockState { metadata, ..self }
    }

    /// A block is rendered iff its category is not `None`.
    #[inline]
    pub fn is_rendered(&self) -> bool {
        self.category != RenderCategory::None
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.category == RenderCategory::Opaque
    }
}

impl Default for BlockState {
    fn default() -> Self {
        BlockState::AIR
    }
}

/// Static properties of a registered block type.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockDefinition {
    pub name: String,
    pub category: RenderCategory,
    /// Texture index per face, in `BlockSide` order.
    pub textures: [u16; 6],
}

/// Maps block ids to their definitions.
///
/// The registry is an ordinary owned value: build it once, wrap it in an `Arc` and hand
/// it to whatever needs texture lookups (the mesher, terrain generators).
#[derive(Clone, Debug, Default)]
pub struct BlockRegistry {
    definitions: HashMap<BlockTypeSize, BlockDefinition>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry containing every `BlockType`.
    pub fn default_blocks() -> Self {
        let mut registry = Self::new();
        for block_type in BlockType::all() {
            registry.register(
                block_type as BlockTypeSize,
                BlockDefinition {
                    name: format!("{:?}", block_type).to_lowercase(),
                    category: block_type.render_category(),
                    textures: block_type.texture_indices(),
                },
            );
        }
        registry
    }

    /// Registers (or replaces) a block definition.
    ///
    /// # Panics
    /// Panics if a texture index does not fit the 12-bit vertex field.
    pub fn register(&mut self, id: BlockTypeSize, definition: BlockDefinition) {
        assert!(
            definition.textures.iter().all(|&t| t <= MAX_TEXTURE_INDEX),
            "texture index of block {} exceeds {}",
            definition.name,
            MAX_TEXTURE_INDEX
        );
        self.definitions.insert(id, definition);
    }

    pub fn get(&self, id: BlockTypeSize) -> Option<&BlockDefinition> {
        self.definitions.get(&id)
    }

    /// The block state for a registered id with no metadata.
    pub fn state(&self, id: BlockTypeSize) -> Option<BlockState> {
        self.get(id)
            .map(|definition| BlockState::new(id, definition.category))
    }

    /// Texture index of `side` for block `id`. Unknown ids map to texture 0.
    #[inline]
    pub fn texture_index(&self, id: BlockTypeSize, side: BlockSide) -> u16 {
        self.definitions
            .get(&id)
            .map(|definition| definition.textures[side as usize])
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
