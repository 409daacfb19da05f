//! Error types shared by the chunk pipeline.
//!
//! Errors are handled where they occur (chunk, scheduler) and are never allowed to
//! unwind into the main tick loop. Programming errors such as vertex field overflow
//! are assertions instead and do not appear here.

use cgmath::Point3;
use thiserror::Error;

use crate::engine_state::voxels::chunk::state::{ChunkEvent, GenerationState};

/// Errors surfaced by the engine, chunk index and configuration layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The transition table has no entry for this `(state, event)` pair.
    #[error("illegal chunk transition: {event:?} while {state:?}")]
    IllegalTransition {
        state: GenerationState,
        event: ChunkEvent,
    },

    #[error("chunk {0:?} is not loaded")]
    ChunkNotLoaded(Point3<i32>),

    /// The chunk exists but its terrain has not been generated yet.
    #[error("chunk {0:?} has no terrain yet")]
    ChunkNotReady(Point3<i32>),

    #[error("timed out waiting for the block storage lock of chunk {0:?}")]
    LockTimeout(Point3<i32>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration file")]
    ConfigRead(#[from] std::io::Error),

    #[error("failed to parse configuration")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to spawn chunk worker {index}")]
    WorkerSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a job can finish without a usable result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// A storage lock could not be acquired in time; the job is retried later.
    #[error("lock acquisition timed out for chunk {coordinate:?}")]
    LockTimeout { coordinate: Point3<i32> },

    /// The job panicked on the worker thread.
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}
