//! # Voxel Data
//!
//! Everything that describes the voxel world itself, independent of how it is drawn.
//!
//! ## Architecture
//!
//! * **Block**: Block states, render categories and the block registry
//! * **Chunk**: 32³ block storage plus the per-chunk lifecycle state machine
//! * **ChunkIndex**: The main thread's map of loaded chunks and columns
//! * **Streaming**: Decides which columns to load and unload around the reference point
//! * **Terrain**: The terrain generator interface and a few reference generators
//! * **Tasks**: The worker job that runs terrain generation
//!
//! ## Thread Safety
//!
//! Only block storage is shared with workers, behind `MtResource`. Chunk state, the
//! index and the streaming controller are owned by the main thread.

pub mod block;
pub mod chunk;
pub mod chunk_index;
pub mod streaming;
pub mod tasks;
pub mod terrain;
