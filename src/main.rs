//! # Voxel Streamer Entry Point
//!
//! Runs the headless streaming demo from the library's `run()` function.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=debug VOXEL_STREAMER_CONFIG=config.json cargo run --release
//! ```

fn main() {
    voxel_streamer::run();
}
