//! # Chunk Module
//!
//! This module provides the `Chunk` struct: a 32x32x32 block of voxel data together
//! with its place in the loading pipeline.
//!
//! ## Ownership
//!
//! The block data sits behind an `MtResource<BlockStorage>`. Worker jobs receive clones
//! of that handle when they are dispatched and lock it themselves; the main thread owns
//! everything else on the chunk (state, job id, pending dirty flags) and never blocks on
//! the storage lock.
//!
//! ## Coordinates
//!
//! Chunk coordinates are in chunk units. A world block position `p` lives in chunk
//! `floor(p / CHUNK_DIMENSION)` at local position `p mod CHUNK_DIMENSION`
//! (Euclidean), see `split_world_position`.

use cgmath::Point3;
use log::trace;

use crate::core::config::StorageKind;
use crate::core::error::EngineError;
use crate::core::MtResource;

use neighbors::NeighborFlags;
use state::{transition, ChunkAction, ChunkEvent, GenerationState};
use storage::BlockStorage;

pub mod neighbors;
pub mod state;
pub mod storage;

/// The dimension (width, height, depth) of a chunk in blocks.
pub const CHUNK_DIMENSION: usize = 32;
/// `CHUNK_DIMENSION` for signed world arithmetic.
pub const CHUNK_DIMENSION_I32: i32 = CHUNK_DIMENSION as i32;
/// The number of blocks in a single 2D plane of a chunk (CHUNK_DIMENSION²).
pub const CHUNK_PLANE_SIZE: usize = CHUNK_DIMENSION * CHUNK_DIMENSION;
/// The total number of blocks in a chunk (CHUNK_DIMENSION³).
pub const CHUNK_SIZE: usize = CHUNK_PLANE_SIZE * CHUNK_DIMENSION;
/// The dimension of a chunk including an extra layer of blocks on each side for neighbor lookups.
pub const CHUNK_DIMENSION_WRAPPED: usize = CHUNK_DIMENSION + 2;
/// The number of blocks in a wrapped 2D chunk plane.
pub const CHUNK_PLANE_SIZE_WRAPPED: usize = CHUNK_DIMENSION_WRAPPED * CHUNK_DIMENSION_WRAPPED;
/// The total number of blocks in a wrapped chunk.
pub const CHUNK_SIZE_WRAPPED: usize = CHUNK_PLANE_SIZE_WRAPPED * CHUNK_DIMENSION_WRAPPED;

/// Converts a world-space position to the coordinate of the chunk containing it.
pub fn world_to_chunk(position: Point3<f32>) -> Point3<i32> {
    let size = CHUNK_DIMENSION as f32;
    Point3::new(
        (position.x / size).floor() as i32,
        (position.y / size).floor() as i32,
        (position.z / size).floor() as i32,
    )
}

/// Splits a world block position into its chunk coordinate and local block coordinate.
pub fn split_world_position(block: Point3<i32>) -> (Point3<i32>, [usize; 3]) {
    let chunk = Point3::new(
        block.x.div_euclid(CHUNK_DIMENSION_I32),
        block.y.div_euclid(CHUNK_DIMENSION_I32),
        block.z.div_euclid(CHUNK_DIMENSION_I32),
    );
    let local = [
        block.x.rem_euclid(CHUNK_DIMENSION_I32) as usize,
        block.y.rem_euclid(CHUNK_DIMENSION_I32) as usize,
        block.z.rem_euclid(CHUNK_DIMENSION_I32) as usize,
    ];
    (chunk, local)
}

/// A loaded chunk.
pub struct Chunk {
    /// The position of this chunk in chunk coordinates (not block coordinates).
    pub coordinate: Point3<i32>,

    /// The block data, shared with worker jobs.
    pub storage: MtResource<BlockStorage>,

    state: GenerationState,

    /// Id of the job whose result this chunk is waiting for. A completion carrying any
    /// other id is stale.
    mesh_job_id: u64,

    /// Rendered block count reported by the last generation job or edit.
    rendered_block_count: u32,

    /// Neighbors to dirty on the next `flush_dirty` (delayed dirtying).
    pending_neighbors: NeighborFlags,
    pending_self: bool,
}

impl Chunk {
    /// Creates an uninitialized, all-air chunk.
    ///
    /// # Arguments
    /// * `coordinate` - The chunk coordinates of the new chunk
    /// * `kind` - Which storage layout to use
    pub fn new(coordinate: Point3<i32>, kind: StorageKind) -> Self {
        Chunk {
            coordinate,
            storage: MtResource::new(BlockStorage::new(kind)),
            state: GenerationState::Uninitialized,
            mesh_job_id: 0,
            rendered_block_count: 0,
            pending_neighbors: NeighborFlags::EMPTY,
            pending_self: false,
        }
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Applies `event` to the chunk's state machine.
    ///
    /// # Returns
    /// The action the caller has to perform. On an illegal transition the state is left
    /// unchanged.
    pub fn apply(&mut self, event: ChunkEvent) -> Result<ChunkAction, EngineError> {
        let (next, action) = transition(self.state, event)?;
        trace!(
            "Chunk {:?}: {:?} --{:?}--> {:?}",
            self.coordinate,
            self.state,
            event,
            next
        );
        self.state = next;
        Ok(action)
    }

    pub fn is_terrain_ready(&self) -> bool {
        self.state.is_terrain_ready()
    }

    pub fn mesh_job_id(&self) -> u64 {
        self.mesh_job_id
    }

    pub fn set_mesh_job_id(&mut self, id: u64) {
        self.mesh_job_id = id;
    }

    pub fn rendered_block_count(&self) -> u32 {
        self.rendered_block_count
    }

    pub fn set_rendered_block_count(&mut self, count: u32) {
        self.rendered_block_count = count;
    }

    pub fn is_empty(&self) -> bool {
        self.rendered_block_count == 0
    }

    /// Records neighbors (and optionally the chunk itself) for the next flush.
    pub fn mark_pending(&mut self, neighbors: NeighborFlags, include_self: bool) {
        self.pending_neighbors |= neighbors;
        self.pending_self |= include_self;
    }

    /// Takes the accumulated dirty flags, leaving none behind.
    pub fn take_pending(&mut self) -> (bool, NeighborFlags) {
        let pending = (self.pending_self, self.pending_neighbors);
        self.pending_self = false;
        self.pending_neighbors = NeighborFlags::EMPTY;
        pending
    }

    pub fn has_pending(&self) -> bool {
        self.pending_self || !self.pending_neighbors.is_empty()
    }

    /// A chunk can be unloaded unless a writer holds its storage.
    ///
    /// Its queued jobs are dropped on unload and the results of running ones are stale,
    /// so the state alone never pins a chunk.
    pub fn is_ready_to_unload(&self) -> bool {
        !self.storage.is_locked_exclusive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_world_position_uses_floor_division() {
        let (chunk, local) = split_world_position(Point3::new(-1, 32, 63));
        assert_eq!(chunk, Point3::new(-1, 1, 1));
        assert_eq!(local, [31, 0, 31]);
    }

    #[test]
    fn world_to_chunk_floors_negative_positions() {
        assert_eq!(
            world_to_chunk(Point3::new(-0.5, 31.9, 32.0)),
            Point3::new(-1, 0, 1)
        );
    }

    #[test]
    fn illegal_event_leaves_state_untouched() {
        let mut chunk = Chunk::new(Point3::new(0, 0, 0), StorageKind::Flat);
        assert!(chunk.apply(ChunkEvent::MeshingComplete).is_err());
        assert_eq!(chunk.state(), GenerationState::Uninitialized);
        assert_eq!(
            chunk.apply(ChunkEvent::Load).unwrap(),
            ChunkAction::DispatchGeneration
        );
        assert_eq!(chunk.state(), GenerationState::GeneratingTerrain);
    }

    #[test]
    fn write_locked_chunk_is_not_ready_to_unload() {
        let mut chunk = Chunk::new(Point3::new(0, 0, 0), StorageKind::Flat);
        assert!(chunk.is_ready_to_unload());
        chunk.apply(ChunkEvent::Load).unwrap();
        assert!(chunk.is_ready_to_unload());
        {
            let _writer = chunk.storage.get_mut();
            assert!(!chunk.is_ready_to_unload());
        }
        let _reader = chunk.storage.get();
        assert!(chunk.is_ready_to_unload());
    }

    #[test]
    fn pending_flags_accumulate_until_taken() {
        let mut chunk = Chunk::new(Point3::new(0, 0, 0), StorageKind::Palette);
        chunk.mark_pending(neighbors::affected_neighbors(0, 5, 5), false);
        chunk.mark_pending(neighbors::affected_neighbors(5, 0, 5), true);
        assert!(chunk.has_pending());
        let (own, flags) = chunk.take_pending();
        assert!(own);
        assert_eq!(flags.len(), 2);
        assert!(!chunk.has_pending());
    }
}
