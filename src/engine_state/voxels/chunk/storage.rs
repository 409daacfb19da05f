//! # Block Storage Module
//!
//! Per-chunk voxel containers. Two layouts are available behind the closed
//! `BlockStorage` enum:
//!
//! - `Flat`: one `BlockState` per cell. Fastest access, 4 bytes per block.
//! - `Palette`: the distinct block states of the chunk are kept in a small palette and
//!   each cell stores a bit-packed index into it. A chunk of stone and air needs one
//!   bit per block.
//!
//! Both keep a running count of rendered (non-`None`) blocks so an empty chunk can be
//! recognised without scanning it.
//!
//! Cells are laid out `x + S * y + S² * z`, x varying fastest.

use bitvec::prelude::*;
use log::trace;

use crate::core::config::StorageKind;
use crate::engine_state::voxels::block::BlockState;

use super::{CHUNK_DIMENSION, CHUNK_PLANE_SIZE, CHUNK_SIZE};

/// Uniform access to block data, whatever the physical layout.
pub trait BlockContainer {
    /// Returns the block at the local coordinate.
    ///
    /// # Panics
    /// Panics if any coordinate is outside `[0, CHUNK_DIMENSION)`.
    fn get(&self, x: usize, y: usize, z: usize) -> BlockState;

    /// Replaces the block at the local coordinate and returns the previous one.
    ///
    /// # Panics
    /// Panics if any coordinate is outside `[0, CHUNK_DIMENSION)`.
    fn set(&mut self, x: usize, y: usize, z: usize, block: BlockState) -> BlockState;

    /// Number of blocks whose render category is not `None`.
    fn rendered_count(&self) -> u32;

    /// Sets every cell to `block`.
    fn fill(&mut self, block: BlockState);
}

/// Converts a local coordinate into a storage index.
///
/// # Panics
/// Out-of-range coordinates are a programming error and always panic.
#[inline]
pub fn block_index(x: usize, y: usize, z: usize) -> usize {
    assert!(
        x < CHUNK_DIMENSION && y < CHUNK_DIMENSION && z < CHUNK_DIMENSION,
        "local block coordinate ({}, {}, {}) outside the chunk",
        x,
        y,
        z
    );
    x + CHUNK_DIMENSION * y + CHUNK_PLANE_SIZE * z
}

fn rendered_delta(previous: BlockState, block: BlockState) -> i32 {
    match (previous.is_rendered(), block.is_rendered()) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

/// One `BlockState` per cell.
#[derive(Clone, Debug)]
pub struct FlatStorage {
    blocks: Vec<BlockState>,
    rendered: u32,
}

impl FlatStorage {
    pub fn new() -> Self {
        FlatStorage {
            blocks: vec![BlockState::AIR; CHUNK_SIZE],
            rendered: 0,
        }
    }
}

impl Default for FlatStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockContainer for FlatStorage {
    #[inline]
    fn get(&self, x: usize, y: usize, z: usize) -> BlockState {
        self.blocks[block_index(x, y, z)]
    }

    fn set(&mut self, x: usize, y: usize, z: usize, block: BlockState) -> BlockState {
        let index = block_index(x, y, z);
        let previous = std::mem::replace(&mut self.blocks[index], block);
        self.rendered = (self.rendered as i32 + rendered_delta(previous, block)) as u32;
        previous
    }

    fn rendered_count(&self) -> u32 {
        self.rendered
    }

    fn fill(&mut self, block: BlockState) {
        self.blocks.fill(block);
        self.rendered = if block.is_rendered() {
            CHUNK_SIZE as u32
        } else {
            0
        };
    }
}

/// Palette-compressed storage.
///
/// `indices` holds `CHUNK_SIZE` entries of `bits_per_entry` bits each. When the palette
/// outgrows the index width every entry is repacked one bit wider.
#[derive(Clone, Debug)]
pub struct PaletteStorage {
    palette: Vec<BlockState>,
    bits_per_entry: usize,
    indices: BitVec<usize, Lsb0>,
    rendered: u32,
}

impl PaletteStorage {
    pub fn new() -> Self {
        PaletteStorage {
            palette: vec![BlockState::AIR],
            bits_per_entry: 1,
            indices: BitVec::repeat(false, CHUNK_SIZE),
            rendered: 0,
        }
    }

    /// Number of distinct block states referenced by the palette.
    pub fn palette_len(&self) -> usize {
        self.palette.len()
    }

    pub fn bits_per_entry(&self) -> usize {
        self.bits_per_entry
    }

    #[inline]
    fn load_entry(&self, index: usize) -> usize {
        let start = index * self.bits_per_entry;
        self.indices[start..start + self.bits_per_entry].load_le::<usize>()
    }

    #[inline]
    fn store_entry(&mut self, index: usize, palette_index: usize) {
        let start = index * self.bits_per_entry;
        self.indices[start..start + self.bits_per_entry].store_le(palette_index);
    }

    fn palette_index_of(&mut self, block: BlockState) -> usize {
        if let Some(position) = self.palette.iter().position(|entry| *entry == block) {
            return position;
        }

        self.palette.push(block);
        if self.palette.len() > 1 << self.bits_per_entry {
            self.grow();
        }
        self.palette.len() - 1
    }

    fn grow(&mut self) {
        let new_bits = self.bits_per_entry + 1;
        let mut indices: BitVec<usize, Lsb0> = BitVec::repeat(false, CHUNK_SIZE * new_bits);
        for index in 0..CHUNK_SIZE {
            let value = self.load_entry(index);
            let start = index * new_bits;
            indices[start..start + new_bits].store_le(value);
        }
        trace!(
            "Palette grew to {} entries, repacked with {} bits per block",
            self.palette.len(),
            new_bits
        );
        self.indices = indices;
        self.bits_per_entry = new_bits;
    }
}

impl Default for PaletteStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockContainer for PaletteStorage {
    #[inline]
    fn get(&self, x: usize, y: usize, z: usize) -> BlockState {
        self.palette[self.load_entry(block_index(x, y, z))]
    }

    fn set(&mut self, x: usize, y: usize, z: usize, block: BlockState) -> BlockState {
        let index = block_index(x, y, z);
        let previous = self.palette[self.load_entry(index)];
        if previous == block {
            return previous;
        }

        let palette_index = self.palette_index_of(block);
        self.store_entry(index, palette_index);
        self.rendered = (self.rendered as i32 + rendered_delta(previous, block)) as u32;
        previous
    }

    fn rendered_count(&self) -> u32 {
        self.rendered
    }

    fn fill(&mut self, block: BlockState) {
        self.palette = vec![block];
        self.bits_per_entry = 1;
        self.indices = BitVec::repeat(false, CHUNK_SIZE);
        self.rendered = if block.is_rendered() {
            CHUNK_SIZE as u32
        } else {
            0
        };
    }
}

/// The block data of one chunk.
#[derive(Clone, Debug)]
pub enum BlockStorage {
    Flat(FlatStorage),
    Palette(PaletteStorage),
}

impl BlockStorage {
    /// Creates an all-air storage of the requested layout.
    pub fn new(kind: StorageKind) -> Self {
        match kind {
            StorageKind::Flat => BlockStorage::Flat(FlatStorage::new()),
            StorageKind::Palette => BlockStorage::Palette(PaletteStorage::new()),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            BlockStorage::Flat(_) => StorageKind::Flat,
            BlockStorage::Palette(_) => StorageKind::Palette,
        }
    }

    /// Resets every cell to air.
    pub fn clear(&mut self) {
        self.fill(BlockState::AIR);
    }
}

impl BlockContainer for BlockStorage {
    #[inline]
    fn get(&self, x: usize, y: usize, z: usize) -> BlockState {
        match self {
            BlockStorage::Flat(storage) => storage.get(x, y, z),
            BlockStorage::Palette(storage) => storage.get(x, y, z),
        }
    }

    #[inline]
    fn set(&mut self, x: usize, y: usize, z: usize, block: BlockState) -> BlockState {
        match self {
            BlockStorage::Flat(storage) => storage.set(x, y, z, block),
            BlockStorage::Palette(storage) => storage.set(x, y, z, block),
        }
    }

    fn rendered_count(&self) -> u32 {
        match self {
            BlockStorage::Flat(storage) => storage.rendered_count(),
            BlockStorage::Palette(storage) => storage.rendered_count(),
        }
    }

    fn fill(&mut self, block: BlockState) {
        match self {
            BlockStorage::Flat(storage) => storage.fill(block),
            BlockStorage::Palette(storage) => storage.fill(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;

    fn write_pattern(storage: &mut impl BlockContainer) {
        let blocks = BlockType::all();
        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    let block = blocks[(x * 7 + y * 3 + z) % blocks.len()].state();
                    storage.set(x, y, z, block);
                }
            }
        }
    }

    #[test]
    fn flat_and_palette_agree() {
        let mut flat = FlatStorage::new();
        let mut palette = PaletteStorage::new();
        write_pattern(&mut flat);
        write_pattern(&mut palette);

        assert_eq!(flat.rendered_count(), palette.rendered_count());
        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    assert_eq!(flat.get(x, y, z), palette.get(x, y, z));
                }
            }
        }
        // seven distinct states need three bits
        assert_eq!(palette.palette_len(), 7);
        assert_eq!(palette.bits_per_entry(), 3);
    }

    #[test]
    fn rendered_count_tracks_edits() {
        let mut storage = BlockStorage::new(StorageKind::Palette);
        assert_eq!(storage.rendered_count(), 0);

        storage.set(1, 2, 3, BlockType::STONE.state());
        storage.set(1, 2, 4, BlockType::WATER.state());
        assert_eq!(storage.rendered_count(), 2);

        // replacing a rendered block with another rendered block keeps the count
        storage.set(1, 2, 3, BlockType::DIRT.state());
        assert_eq!(storage.rendered_count(), 2);

        storage.set(1, 2, 4, BlockState::AIR);
        assert_eq!(storage.rendered_count(), 1);
        assert_eq!(storage.get(1, 2, 3), BlockType::DIRT.state());
    }

    #[test]
    fn fill_and_clear() {
        let mut storage = BlockStorage::new(StorageKind::Flat);
        storage.fill(BlockType::STONE.state());
        assert_eq!(storage.rendered_count(), CHUNK_SIZE as u32);
        storage.clear();
        assert_eq!(storage.rendered_count(), 0);
        assert_eq!(storage.get(31, 31, 31), BlockState::AIR);
    }

    #[test]
    fn metadata_distinguishes_palette_entries() {
        let mut storage = PaletteStorage::new();
        let wood = BlockType::WOOD.state();
        storage.set(0, 0, 0, wood);
        storage.set(1, 0, 0, wood.with_metadata(2));
        assert_eq!(storage.get(1, 0, 0).metadata, 2);
        assert_eq!(storage.palette_len(), 3);
    }

    #[test]
    #[should_panic(expected = "outside the chunk")]
    fn out_of_range_access_panics() {
        let storage = FlatStorage::new();
        storage.get(CHUNK_DIMENSION, 0, 0);
    }
}
