//! # Voxel Task System
//!
//! This module contains tasks related to voxel world generation. They run on the
//! `JobScheduler`'s workers so terrain generation never stalls the main thread.

pub mod chunk_generation_task;
