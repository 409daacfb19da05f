//! Task for generating mesh data for chunks in a background thread.
//!
//! This module contains the `ChunkMeshGenerationTask` which builds the mesh of one chunk
//! from a snapshot of the chunk and its loaded neighbors taken at dispatch time.
//!
//! # Locking
//! The task read-locks the target and every neighbor in ascending chunk coordinate
//! order, each with a bounded wait. If any lock cannot be taken in time, every lock
//! already held is released and the task reports `JobError::LockTimeout` so the chunk can
//! be retried on a later tick. Locks are only held while the neighborhood is copied into
//! the worker's `MeshingDataCache`; meshing itself runs lock-free.

use std::sync::Arc;
use std::time::Duration;

use cgmath::{Point3, Vector3};
use log::debug;

use crate::{
    core::{error::JobError, MtResource},
    engine_state::{
        task_management::task::{JobKind, JobOutput, JobTicket, Task, WorkerContext},
        voxels::{block::BlockRegistry, chunk::storage::BlockStorage},
    },
};

/// One storage the task has to read.
struct LockTarget {
    coordinate: Point3<i32>,
    /// Position relative to the chunk being meshed, zero for the chunk itself.
    offset: Vector3<i32>,
    storage: MtResource<BlockStorage>,
}

/// A task that generates mesh data for a chunk in a background thread.
pub struct ChunkMeshGenerationTask {
    ticket: JobTicket,
    /// Target and neighbors, sorted in lock order.
    locks: Vec<LockTarget>,
    /// Index of the target in `locks`.
    center_slot: usize,
    registry: Arc<BlockRegistry>,
    lock_timeout: Duration,
}

impl ChunkMeshGenerationTask {
    /// Creates a new chunk mesh generation task.
    ///
    /// # Arguments
    /// * `id` - The job id recorded on the chunk at dispatch
    /// * `target` - The chunk to mesh
    /// * `storage` - The chunk's block storage
    /// * `neighbors` - Offsets and storages of the loaded neighbors
    /// * `registry` - Texture lookup for block ids
    /// * `lock_timeout` - How long to wait for each read lock
    pub fn new(
        id: u64,
        target: Point3<i32>,
        storage: MtResource<BlockStorage>,
        neighbors: Vec<(Vector3<i32>, MtResource<BlockStorage>)>,
        registry: Arc<BlockRegistry>,
        lock_timeout: Duration,
    ) -> Self {
        let mut locks: Vec<LockTarget> = neighbors
            .into_iter()
            .map(|(offset, storage)| LockTarget {
                coordinate: target + offset,
                offset,
                storage,
            })
            .collect();
        locks.push(LockTarget {
            coordinate: target,
            offset: Vector3::new(0, 0, 0),
            storage,
        });
        locks.sort_by_key(|lock| (lock.coordinate.x, lock.coordinate.y, lock.coordinate.z));
        let center_slot = locks
            .iter()
            .position(|lock| lock.coordinate == target)
            .unwrap_or_default();

        ChunkMeshGenerationTask {
            ticket: JobTicket {
                id,
                target,
                kind: JobKind::Meshing,
            },
            locks,
            center_slot,
            registry,
            lock_timeout,
        }
    }

    /// Chunk coordinates in the order their locks are taken.
    pub fn lock_order(&self) -> Vec<Point3<i32>> {
        self.locks.iter().map(|lock| lock.coordinate).collect()
    }
}

impl Task for ChunkMeshGenerationTask {
    fn ticket(&self) -> JobTicket {
        self.ticket
    }

    fn process(&self, context: &mut WorkerContext) -> Result<JobOutput, JobError> {
        let mut guards = Vec::with_capacity(self.locks.len());
        for lock in &self.locks {
            match lock.storage.try_get_for(self.lock_timeout) {
                Some(guard) => guards.push(guard),
                None => {
                    debug!(
                        "Meshing of chunk {:?} timed out waiting for chunk {:?}",
                        self.ticket.target, lock.coordinate
                    );
                    return Err(JobError::LockTimeout {
                        coordinate: lock.coordinate,
                    });
                }
            }
        }

        let (data_cache, mesh_builder) = context.meshing_buffers();
        data_cache.fill(
            &guards[self.center_slot],
            self.locks
                .iter()
                .zip(guards.iter())
                .filter(|(lock, _)| lock.offset != Vector3::new(0, 0, 0))
                .map(|(lock, guard)| (lock.offset, &**guard)),
        );
        drop(guards);

        let mesh = mesh_builder.build(self.ticket.target, data_cache, &self.registry);
        Ok(JobOutput::Meshed(mesh))
    }
}
