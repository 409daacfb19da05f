//! # Core Module
//!
//! Fundamental building blocks shared by every part of the pipeline.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking and
//!   bounded (timed) acquisition
//! - `config`: Serde-backed engine configuration
//! - `error`: Engine and job error types
//!
//! ## Usage
//! ```rust
//! use voxel_streamer::core::MtResource;
//!
//! let counter = MtResource::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//! ```

pub mod config;
pub mod error;
pub mod mt_resource;

pub use mt_resource::MtResource;
