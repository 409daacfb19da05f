//! # Chunk Index
//!
//! The `ChunkIndex` owns every loaded `Chunk`, keyed by chunk coordinate, and the set of
//! loaded columns. It lives on the main thread only: workers never see it, they receive
//! cloned storage handles when a job is dispatched.
//!
//! It also hands out job ids. The counter is index-wide and never reset, so an id can
//! not come back after a chunk is unloaded and loaded again.

use std::collections::{HashMap, HashSet};

use cgmath::{Point2, Point3, Vector3};

use crate::core::config::StorageKind;
use crate::core::MtResource;
use crate::engine_state::voxels::chunk::neighbors::NEIGHBOR_OFFSETS;
use crate::engine_state::voxels::chunk::state::GenerationState;
use crate::engine_state::voxels::chunk::storage::BlockStorage;
use crate::engine_state::voxels::chunk::Chunk;

/// A sparse map of loaded chunks.
pub struct ChunkIndex {
    chunks: HashMap<Point3<i32>, Chunk>,
    columns: HashSet<Point2<i32>>,
    storage_kind: StorageKind,
    last_job_id: u64,
}

impl ChunkIndex {
    /// Creates an empty index whose chunks use `storage_kind`.
    pub fn new(storage_kind: StorageKind) -> Self {
        ChunkIndex {
            chunks: HashMap::new(),
            columns: HashSet::new(),
            storage_kind,
            last_job_id: 0,
        }
    }

    /// Inserts a fresh, uninitialized chunk unless one is already present.
    ///
    /// # Returns
    /// The chunk at `coordinate`, new or existing.
    pub fn insert(&mut self, coordinate: Point3<i32>) -> &mut Chunk {
        let kind = self.storage_kind;
        self.chunks
            .entry(coordinate)
            .or_insert_with(|| Chunk::new(coordinate, kind))
    }

    pub fn remove(&mut self, coordinate: Point3<i32>) -> Option<Chunk> {
        self.chunks.remove(&coordinate)
    }

    pub fn get(&self, coordinate: Point3<i32>) -> Option<&Chunk> {
        self.chunks.get(&coordinate)
    }

    pub fn get_mut(&mut self, coordinate: Point3<i32>) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coordinate)
    }

    pub fn contains(&self, coordinate: Point3<i32>) -> bool {
        self.chunks.contains_key(&coordinate)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Coordinates of every chunk in `state`.
    pub fn coordinates_in_state(&self, state: GenerationState) -> Vec<Point3<i32>> {
        self.chunks
            .values()
            .filter(|chunk| chunk.state() == state)
            .map(|chunk| chunk.coordinate)
            .collect()
    }

    /// Number of chunks per state, indexed like `GenerationState::ALL`.
    pub fn state_counts(&self) -> [usize; 7] {
        let mut counts = [0; 7];
        for chunk in self.chunks.values() {
            counts[chunk.state() as usize] += 1;
        }
        counts
    }

    /// Issues a new job id for the chunk at `coordinate` and records it on the chunk.
    ///
    /// # Returns
    /// The new id, or `None` if the chunk is not loaded.
    pub fn issue_job_id(&mut self, coordinate: Point3<i32>) -> Option<u64> {
        let chunk = self.chunks.get_mut(&coordinate)?;
        self.last_job_id += 1;
        chunk.set_mesh_job_id(self.last_job_id);
        Some(self.last_job_id)
    }

    /// Storage handles of the loaded neighbors of `coordinate`, with their offsets.
    pub fn neighbor_storages(
        &self,
        coordinate: Point3<i32>,
    ) -> Vec<(Vector3<i32>, MtResource<BlockStorage>)> {
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(|&offset| {
                self.chunks
                    .get(&(coordinate + offset))
                    .map(|chunk| (offset, chunk.storage.clone()))
            })
            .collect()
    }

    /// Whether every neighbor required for meshing `coordinate` is terrain ready.
    ///
    /// # Arguments
    /// * `coordinate` - The chunk about to be meshed
    /// * `exclude_missing` - Treat neighbors that are not loaded as air instead of
    ///   waiting for them
    /// * `y_range` - Chunk layers that can ever be loaded; neighbors outside it are
    ///   never waited for
    pub fn neighbors_terrain_ready(
        &self,
        coordinate: Point3<i32>,
        exclude_missing: bool,
        y_range: (i32, i32),
    ) -> bool {
        NEIGHBOR_OFFSETS.iter().all(|&offset| {
            let neighbor = coordinate + offset;
            match self.chunks.get(&neighbor) {
                Some(chunk) => chunk.is_terrain_ready(),
                None => exclude_missing || neighbor.y < y_range.0 || neighbor.y > y_range.1,
            }
        })
    }

    pub fn mark_column_loaded(&mut self, column: Point2<i32>) {
        self.columns.insert(column);
    }

    pub fn mark_column_unloaded(&mut self, column: Point2<i32>) {
        self.columns.remove(&column);
    }

    pub fn is_column_loaded(&self, column: Point2<i32>) -> bool {
        self.columns.contains(&column)
    }

    pub fn loaded_columns(&self) -> impl Iterator<Item = Point2<i32>> + '_ {
        self.columns.iter().copied()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether every chunk of the column can be unloaded right now.
    pub fn column_ready_to_unload(&self, column: Point2<i32>, y_range: (i32, i32)) -> bool {
        (y_range.0..=y_range.1).all(|y| {
            self.chunks
                .get(&Point3::new(column.x, y, column.y))
                .map_or(true, Chunk::is_ready_to_unload)
        })
    }
}
