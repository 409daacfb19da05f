//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask` which fills a newly loaded chunk with
//! terrain on a worker thread.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::{
    core::{error::JobError, MtResource},
    engine_state::{
        task_management::task::{JobKind, JobOutput, JobTicket, Task, WorkerContext},
        voxels::{
            chunk::storage::{BlockContainer, BlockStorage},
            terrain::{TerrainChunk, TerrainGenerator},
        },
    },
};

/// A task that generates chunk data asynchronously.
///
/// This task is responsible for:
/// 1. Taking the chunk's write lock (bounded by `lock_timeout`)
/// 2. Resetting the storage and running the terrain generator
/// 3. Reporting the rendered block count so empty chunks skip meshing
pub struct ChunkGenerationTask {
    ticket: JobTicket,
    storage: MtResource<BlockStorage>,
    generator: Arc<dyn TerrainGenerator>,
    lock_timeout: Duration,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `id` - The job id recorded on the chunk at dispatch
    /// * `target` - The chunk coordinates to generate
    /// * `storage` - The chunk's block storage
    /// * `generator` - The terrain generator to run
    /// * `lock_timeout` - How long to wait for the write lock
    pub fn new(
        id: u64,
        target: cgmath::Point3<i32>,
        storage: MtResource<BlockStorage>,
        generator: Arc<dyn TerrainGenerator>,
        lock_timeout: Duration,
    ) -> Self {
        ChunkGenerationTask {
            ticket: JobTicket {
                id,
                target,
                kind: JobKind::Generation,
            },
            storage,
            generator,
            lock_timeout,
        }
    }
}

impl Task for ChunkGenerationTask {
    fn ticket(&self) -> JobTicket {
        self.ticket
    }

    fn process(&self, _context: &mut WorkerContext) -> Result<JobOutput, JobError> {
        let coordinate = self.ticket.target;
        let Some(mut storage) = self.storage.try_get_mut_for(self.lock_timeout) else {
            debug!("Generation of chunk {:?} timed out on its write lock", coordinate);
            return Err(JobError::LockTimeout { coordinate });
        };

        storage.clear();
        self.generator
            .populate(&mut TerrainChunk::new(coordinate, &mut storage));

        Ok(JobOutput::Generated {
            rendered_block_count: storage.rendered_count(),
        })
    }
}
