//! # Engine Configuration
//!
//! Tunables for streaming, scheduling and storage. Every field has a default so a
//! partial JSON document is enough to override a single value:
//!
//! ```
//! use voxel_streamer::core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "load_radius": 4, "unload_radius": 6 }"#).unwrap();
//! assert_eq!(config.load_radius, 4);
//! assert_eq!(config.max_loads_per_tick, EngineConfig::default().max_loads_per_tick);
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Which `BlockStorage` variant newly loaded chunks start with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// One `BlockState` per cell.
    Flat,
    /// Deduplicated palette plus bit-packed per-cell indices.
    Palette,
}

/// When block edits notify neighboring chunks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyMode {
    /// Every edit dirties the affected chunks right away.
    Immediate,
    /// Edits accumulate until `flush_dirty` is called.
    Delayed,
}

/// Configuration for the chunk streaming pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Columns within this radius of the reference column are loaded.
    pub load_radius: i32,
    /// Columns beyond this radius are unloaded. Must exceed `load_radius`.
    pub unload_radius: i32,
    /// Use a circular (squared euclidean) radius instead of a square one.
    pub circular: bool,
    pub max_loads_per_tick: usize,
    pub max_unloads_per_tick: usize,
    /// Lowest chunk layer of every column.
    pub min_chunk_y: i32,
    /// Highest chunk layer of every column (inclusive).
    pub max_chunk_y: i32,
    pub worker_count: usize,
    /// Cap on generation jobs running at once, so meshing keeps up.
    pub max_generation_jobs_in_flight: usize,
    /// Per-lock timeout used by jobs and edits.
    pub lock_timeout_ms: u64,
    /// Mesh chunks at the edge of the loaded area using only the neighbors that exist.
    pub exclude_missing_neighbors: bool,
    pub storage: StorageKind,
    pub dirty_mode: DirtyMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let worker_count = std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1).max(1))
            .unwrap_or(2);

        Self {
            load_radius: 8,
            unload_radius: 10,
            circular: true,
            max_loads_per_tick: 4,
            max_unloads_per_tick: 8,
            min_chunk_y: 0,
            max_chunk_y: 3,
            worker_count,
            max_generation_jobs_in_flight: worker_count.max(1),
            lock_timeout_ms: 5,
            exclude_missing_neighbors: true,
            storage: StorageKind::Palette,
            dirty_mode: DirtyMode::Immediate,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.load_radius < 0 {
            return Err(EngineError::InvalidConfig(format!(
                "load_radius must not be negative, got {}",
                self.load_radius
            )));
        }
        if self.unload_radius <= self.load_radius {
            return Err(EngineError::InvalidConfig(format!(
                "unload_radius ({}) must be greater than load_radius ({})",
                self.unload_radius, self.load_radius
            )));
        }
        if self.min_chunk_y > self.max_chunk_y {
            return Err(EngineError::InvalidConfig(format!(
                "empty vertical range {}..={}",
                self.min_chunk_y, self.max_chunk_y
            )));
        }
        if self.max_generation_jobs_in_flight == 0 {
            return Err(EngineError::InvalidConfig(
                "max_generation_jobs_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unload_radius_not_larger_than_load_radius() {
        let result = EngineConfig::from_json_str(r#"{ "load_radius": 5, "unload_radius": 5 }"#);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn parses_enums_in_snake_case() {
        let config = EngineConfig::from_json_str(
            r#"{ "storage": "flat", "dirty_mode": "delayed", "circular": false }"#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageKind::Flat);
        assert_eq!(config.dirty_mode, DirtyMode::Delayed);
        assert!(!config.circular);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let result = EngineConfig::from_json_str("{ load_radius: ");
        assert!(matches!(result, Err(EngineError::ConfigParse(_))));
    }
}
