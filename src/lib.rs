#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Streamer
//!
//! A chunk streaming and meshing pipeline for voxel worlds.
//!
//! The crate keeps a voxel world loaded around a moving reference point and turns the
//! block data of every loaded chunk into bit-packed triangle meshes, doing the heavy
//! lifting on a pool of worker threads while the per-tick work on the main thread stays
//! bounded.
//!
//! ## Key Modules
//!
//! * `core` - Shared lock wrapper, configuration and error types
//! * `engine_state` - The pipeline: chunks and their state machine, streaming, the job
//!   scheduler, meshing and the renderer interface
//!
//! ## Architecture
//!
//! The pipeline keeps a clear split between:
//! * Main-thread state (chunk index, chunk state machines, streaming decisions)
//! * Worker jobs (terrain generation, meshing) that only ever see cloned storage handles
//! * Collaborators behind traits (`TerrainGenerator`, `Renderer`, `MetricsSink`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! fn main() {
//!     voxel_streamer::run();
//! }
//! ```
//!
//! ## Performance Considerations
//!
//! * Palette storage keeps uniform chunks small
//! * Meshing reuses per-worker scratch buffers sized for the worst case
//! * Vertices are packed into two 32-bit words
//! * Loads and unloads per tick are capped

use std::sync::Arc;

use cgmath::Point3;
use log::{error, info};

use crate::core::config::EngineConfig;
use crate::core::error::EngineError;
use crate::engine_state::metrics::LogMetricsSink;
use crate::engine_state::rendering::MeshRegistry;
use crate::engine_state::voxels::block::BlockRegistry;
use crate::engine_state::voxels::terrain::PerlinTerrain;
use crate::engine_state::EngineState;

pub mod core;
pub mod engine_state;

/// Environment variable holding the path of a JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "VOXEL_STREAMER_CONFIG";

const DEMO_TICKS: u32 = 600;
const DEMO_TICK: std::time::Duration = std::time::Duration::from_millis(16);

fn load_config() -> Result<EngineConfig, EngineError> {
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) => {
            info!("Reading configuration from {}", path);
            EngineConfig::from_json_file(path)
        }
        Err(_) => Ok(EngineConfig::default()),
    }
}

/// Runs the pipeline headless: the reference point circles the origin while chunks
/// stream in and out, and a summary is logged at the end.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            return;
        }
    };

    let engine = EngineState::new(
        config,
        Arc::new(PerlinTerrain::default()),
        Arc::new(BlockRegistry::default_blocks()),
        MeshRegistry::new(),
    );
    let mut engine = match engine {
        Ok(engine) => engine.with_metrics_sink(Box::new(LogMetricsSink::default())),
        Err(err) => {
            error!("Failed to start the engine: {}", err);
            return;
        }
    };

    let start = web_time::Instant::now();
    for tick in 0..DEMO_TICKS {
        let angle = tick as f32 / DEMO_TICKS as f32 * std::f32::consts::TAU;
        let radius = 96.0;
        engine.tick(Point3::new(radius * angle.cos(), 64.0, radius * angle.sin()));
        std::thread::sleep(DEMO_TICK);
    }

    let metrics = engine.metrics();
    info!(
        "{} ticks in {:?}: {} chunks loaded, {} meshes ({} bytes), {} meshes published, \
         {} retries, {} failed jobs",
        metrics.tick,
        start.elapsed(),
        metrics.loaded_chunks,
        engine.renderer().len(),
        engine.renderer().total_bytes(),
        metrics.meshes_published,
        metrics.generation_retries + metrics.meshing_retries,
        metrics.failed_jobs
    );
}
