//! A padded copy of a chunk and the border cells of its neighbors.
//!
//! The mesher needs to look one block past every chunk face for culling and ambient
//! occlusion. Instead of holding 27 locks while it works, a meshing job copies the
//! target chunk plus a one-block shell from each neighbor into this cache and releases
//! the locks before meshing starts.

use cgmath::Vector3;

use crate::engine_state::voxels::block::BlockState;
use crate::engine_state::voxels::chunk::storage::{BlockContainer, BlockStorage};
use crate::engine_state::voxels::chunk::{
    CHUNK_DIMENSION, CHUNK_DIMENSION_WRAPPED, CHUNK_PLANE_SIZE_WRAPPED, CHUNK_SIZE_WRAPPED,
};

/// `(CHUNK_DIMENSION + 2)³` block states, laid out `x + W * y + W² * z` with the chunk's
/// own blocks at padded coordinates `1..=CHUNK_DIMENSION`.
///
/// Cells of missing neighbors read as air.
pub struct MeshingDataCache {
    blocks: Vec<BlockState>,
}

impl MeshingDataCache {
    pub fn new() -> Self {
        MeshingDataCache {
            blocks: vec![BlockState::AIR; CHUNK_SIZE_WRAPPED],
        }
    }

    /// Resets every cell to air.
    pub fn clear(&mut self) {
        self.blocks.fill(BlockState::AIR);
    }

    /// Clears the cache and copies the chunk and the given neighbors into it.
    ///
    /// # Arguments
    /// * `center` - The chunk being meshed
    /// * `neighbors` - Loaded neighbors with their offset from the center chunk
    pub fn fill<'a>(
        &mut self,
        center: &BlockStorage,
        neighbors: impl IntoIterator<Item = (Vector3<i32>, &'a BlockStorage)>,
    ) {
        self.clear();
        self.copy_center(center);
        for (offset, storage) in neighbors {
            self.copy_neighbor(offset, storage);
        }
    }

    #[inline]
    fn padded_index(x: usize, y: usize, z: usize) -> usize {
        x + CHUNK_DIMENSION_WRAPPED * y + CHUNK_PLANE_SIZE_WRAPPED * z
    }

    /// Copies every block of the chunk being meshed.
    pub fn copy_center(&mut self, storage: &BlockStorage) {
        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                let row = Self::padded_index(1, y + 1, z + 1);
                for x in 0..CHUNK_DIMENSION {
                    self.blocks[row + x] = storage.get(x, y, z);
                }
            }
        }
    }

    /// Copies the layer of `storage` that touches the center chunk.
    ///
    /// # Arguments
    /// * `offset` - Position of the neighbor relative to the center chunk, each component
    ///   in `-1..=1` and not all zero
    pub fn copy_neighbor(&mut self, offset: Vector3<i32>, storage: &BlockStorage) {
        let last = CHUNK_DIMENSION - 1;
        let source_range = |component: i32| match component {
            -1 => last..CHUNK_DIMENSION,
            0 => 0..CHUNK_DIMENSION,
            _ => 0..1,
        };
        // padded = offset * S + source + 1
        let to_padded = |component: i32, source: usize| -> usize {
            (component * CHUNK_DIMENSION as i32 + source as i32 + 1) as usize
        };

        for z in source_range(offset.z) {
            for y in source_range(offset.y) {
                for x in source_range(offset.x) {
                    let index = Self::padded_index(
                        to_padded(offset.x, x),
                        to_padded(offset.y, y),
                        to_padded(offset.z, z),
                    );
                    self.blocks[index] = storage.get(x, y, z);
                }
            }
        }
    }

    /// The block at a coordinate relative to the center chunk's origin.
    ///
    /// Each component must lie in `-1..=CHUNK_DIMENSION`.
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockState {
        self.blocks[Self::padded_index((x + 1) as usize, (y + 1) as usize, (z + 1) as usize)]
    }
}

impl Default for MeshingDataCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StorageKind;
    use crate::engine_state::voxels::block::block_type::BlockType;

    const S: i32 = CHUNK_DIMENSION as i32;

    #[test]
    fn neighbor_borders_land_in_the_padding() {
        let mut center = BlockStorage::new(StorageKind::Flat);
        center.set(0, 0, 0, BlockType::DIRT.state());

        let mut below = BlockStorage::new(StorageKind::Flat);
        below.fill(BlockType::STONE.state());

        let mut corner = BlockStorage::new(StorageKind::Palette);
        corner.set(0, 0, 0, BlockType::GLASS.state());

        let mut cache = MeshingDataCache::new();
        cache.fill(
            &center,
            [
                (Vector3::new(0, -1, 0), &below),
                (Vector3::new(1, 1, 1), &corner),
            ],
        );

        assert_eq!(cache.get(0, 0, 0), BlockType::DIRT.state());
        assert_eq!(cache.get(5, -1, 7), BlockType::STONE.state());
        assert_eq!(cache.get(S, S, S), BlockType::GLASS.state());
        // only the touching layer of a neighbor is copied
        assert_eq!(cache.get(-1, 0, 0), BlockState::AIR);
        assert_eq!(cache.get(S, 0, 0), BlockState::AIR);
    }

    #[test]
    fn refill_forgets_previous_neighbors() {
        let mut solid = BlockStorage::new(StorageKind::Flat);
        solid.fill(BlockType::STONE.state());
        let empty = BlockStorage::new(StorageKind::Flat);

        let mut cache = MeshingDataCache::new();
        cache.fill(&empty, [(Vector3::new(-1, 0, 0), &solid)]);
        assert_eq!(cache.get(-1, 3, 3), BlockType::STONE.state());

        cache.fill(&empty, std::iter::empty());
        assert_eq!(cache.get(-1, 3, 3), BlockState::AIR);
    }
}
