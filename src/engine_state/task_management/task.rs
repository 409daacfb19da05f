//! # Task System Core Types
//!
//! This module defines the fundamental building blocks of the job system.
//!
//! ## Core Components
//! - `Task`: A unit of work executed on a worker thread
//! - `JobTicket`: Identifies a job (id, target chunk, kind) on its way out and back
//! - `JobCompletion`: The message a worker sends back to the main thread
//! - `WorkerContext`: Per-worker scratch state reused across jobs
//!
//! ## Task Lifecycle
//! 1. A `Task` is created on the main thread and published via `JobScheduler::publish_task()`
//! 2. The scheduler orders queued tasks by priority and hands them to idle workers
//! 3. The task's `process()` method runs on the worker with that worker's `WorkerContext`
//! 4. The worker wraps the outcome in a `JobCompletion` and sends it back
//! 5. The main thread drains completions once per tick and checks each ticket's id
//!    against the live id of the target chunk
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred to a worker
//! - `JobCompletion` owns its output so nothing is shared on the way back

use std::time::Duration;

use cgmath::Point3;

use crate::core::error::JobError;
use crate::engine_state::rendering::meshing::{
    mesh::Mesh, meshing_data_cache::MeshingDataCache, MeshBuilder,
};

/// What a job does.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
    Generation,
    Meshing,
}

impl JobKind {
    pub fn priority(self) -> JobPriority {
        match self {
            JobKind::Generation => JobPriority::Normal,
            JobKind::Meshing => JobPriority::High,
        }
    }
}

/// Dispatch priority. Higher priorities leave the queue first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    Normal,
    High,
}

/// Identifies one dispatched job.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobTicket {
    /// Matches the target chunk's `mesh_job_id` while the job is current.
    pub id: u64,
    pub target: Point3<i32>,
    pub kind: JobKind,
}

/// The successful result of a job.
#[derive(Debug)]
pub enum JobOutput {
    Generated { rendered_block_count: u32 },
    Meshed(Mesh),
}

/// Sent from a worker to the main thread when a job finishes, successfully or not.
#[derive(Debug)]
pub struct JobCompletion {
    pub ticket: JobTicket,
    /// Index of the worker that ran the job.
    pub worker: usize,
    pub elapsed: Duration,
    pub result: Result<JobOutput, JobError>,
}

/// Scratch state owned by one worker thread.
///
/// The meshing buffers are allocated on the first meshing job the worker runs and then
/// reused for every later one.
pub struct WorkerContext {
    pub index: usize,
    data_cache: Option<Box<MeshingDataCache>>,
    mesh_builder: Option<MeshBuilder>,
}

impl WorkerContext {
    pub fn new(index: usize) -> Self {
        WorkerContext {
            index,
            data_cache: None,
            mesh_builder: None,
        }
    }

    /// The worker's neighborhood cache and mesh builder, created on first use.
    pub fn meshing_buffers(&mut self) -> (&mut MeshingDataCache, &mut MeshBuilder) {
        let data_cache = self
            .data_cache
            .get_or_insert_with(|| Box::new(MeshingDataCache::new()));
        let mesh_builder = self.mesh_builder.get_or_insert_with(MeshBuilder::new);
        (data_cache, mesh_builder)
    }
}

/// A unit of work that can be executed on a worker thread.
///
/// Tasks own everything they need: cloned storage handles of the chunks they touch and
/// `Arc`s of shared read-only services. They never reach back into the main thread's
/// state.
pub trait Task: Send {
    /// The ticket the completion will carry.
    fn ticket(&self) -> JobTicket;

    /// Runs the job on the current worker.
    ///
    /// # Arguments
    /// * `context` - The worker's reusable scratch state
    ///
    /// # Returns
    /// The job's output, or the reason it could not finish. A lock timeout is an
    /// expected outcome and is retried by the caller.
    fn process(&self, context: &mut WorkerContext) -> Result<JobOutput, JobError>;
}
