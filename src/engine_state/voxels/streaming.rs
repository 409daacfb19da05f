//! # Chunk Streaming
//!
//! Decides which chunk columns to load and unload as the reference point moves.
//!
//! Columns are enumerated in an outward square spiral around the reference column so the
//! nearest missing columns load first. Loading and unloading use different radii
//! (`unload_radius > load_radius`) so a reference point wobbling on a border does not
//! load and unload the same column every tick. Both radii use the same metric:
//! squared euclidean distance for circular streaming, Chebyshev distance otherwise.
//!
//! Per-tick work is bounded by `max_loads_per_tick` and `max_unloads_per_tick`.

use std::collections::VecDeque;

use cgmath::{Point2, Vector2};
use log::debug;

use crate::core::config::EngineConfig;
use crate::engine_state::voxels::chunk_index::ChunkIndex;

/// Columns to unload and load this tick, in the order they should be applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamingPlan {
    pub unload: Vec<Point2<i32>>,
    pub load: Vec<Point2<i32>>,
}

impl StreamingPlan {
    pub fn is_empty(&self) -> bool {
        self.unload.is_empty() && self.load.is_empty()
    }
}

/// Offsets of the square rings around the origin, innermost first.
///
/// Ring `r` starts at `(r, -r)` and walks `+z`, `-x`, `-z`, `+x`, `2r` steps each.
pub fn spiral_offsets(radius: i32) -> Vec<Vector2<i32>> {
    let side = (2 * radius.max(0) + 1) as usize;
    let mut offsets = Vec::with_capacity(side * side);
    offsets.push(Vector2::new(0, 0));

    let directions = [
        Vector2::new(0, 1),
        Vector2::new(-1, 0),
        Vector2::new(0, -1),
        Vector2::new(1, 0),
    ];
    for ring in 1..=radius {
        let start = Vector2::new(ring, -ring);
        let mut current = start;
        offsets.push(current);
        for direction in directions {
            for _ in 0..2 * ring {
                current += direction;
                if current != start {
                    offsets.push(current);
                }
            }
        }
    }
    offsets
}

/// Squared length of a column offset, widened so far teleports cannot overflow.
fn distance_squared(offset: Vector2<i32>) -> i64 {
    let (x, z) = (i64::from(offset.x), i64::from(offset.y));
    x * x + z * z
}

/// Plans column loads and unloads around a moving reference column.
pub struct StreamingController {
    spiral: Vec<Vector2<i32>>,
    load_radius: i32,
    unload_radius: i32,
    circular: bool,
    max_loads_per_tick: usize,
    max_unloads_per_tick: usize,
    y_range: (i32, i32),
    load_queue: VecDeque<Point2<i32>>,
    unload_queue: VecDeque<Point2<i32>>,
}

impl StreamingController {
    /// Creates a controller and precomputes the spiral for the configured load radius.
    pub fn new(config: &EngineConfig) -> Self {
        let mut controller = StreamingController {
            spiral: Vec::new(),
            load_radius: config.load_radius,
            unload_radius: config.unload_radius,
            circular: config.circular,
            max_loads_per_tick: config.max_loads_per_tick,
            max_unloads_per_tick: config.max_unloads_per_tick,
            y_range: (config.min_chunk_y, config.max_chunk_y),
            load_queue: VecDeque::new(),
            unload_queue: VecDeque::new(),
        };
        controller.spiral = spiral_offsets(config.load_radius)
            .into_iter()
            .filter(|offset| controller.within(*offset, controller.load_radius))
            .collect();
        controller
    }

    /// Whether `offset` lies within `radius` under the configured metric.
    pub fn within(&self, offset: Vector2<i32>, radius: i32) -> bool {
        let radius = i64::from(radius);
        if self.circular {
            distance_squared(offset) <= radius * radius
        } else {
            let (x, z) = (i64::from(offset.x), i64::from(offset.y));
            x.abs().max(z.abs()) <= radius
        }
    }

    /// The load spiral, filtered to the load radius.
    pub fn spiral(&self) -> &[Vector2<i32>] {
        &self.spiral
    }

    /// Plans this tick's unloads and loads around `center`.
    ///
    /// # Arguments
    /// * `center` - The reference column
    /// * `index` - The currently loaded chunks and columns
    pub fn plan(&mut self, center: Point2<i32>, index: &ChunkIndex) -> StreamingPlan {
        self.queue_unloads(center, index);
        self.queue_loads(center, index);

        let plan = StreamingPlan {
            unload: self.unload_queue.drain(..).collect(),
            load: self.load_queue.drain(..).collect(),
        };
        if !plan.is_empty() {
            debug!(
                "Streaming around {:?}: {} unloads, {} loads",
                center,
                plan.unload.len(),
                plan.load.len()
            );
        }
        plan
    }

    fn queue_unloads(&mut self, center: Point2<i32>, index: &ChunkIndex) {
        let mut candidates: Vec<Point2<i32>> = index
            .loaded_columns()
            .filter(|column| !self.within(column - center, self.unload_radius))
            .collect();
        // farthest first
        candidates.sort_by_key(|column| {
            let offset = column - center;
            std::cmp::Reverse((distance_squared(offset), offset.x, offset.y))
        });

        for column in candidates {
            if self.unload_queue.len() >= self.max_unloads_per_tick {
                break;
            }
            if self.unload_queue.contains(&column)
                || !index.column_ready_to_unload(column, self.y_range)
            {
                continue;
            }
            self.unload_queue.push_back(column);
        }
    }

    fn queue_loads(&mut self, center: Point2<i32>, index: &ChunkIndex) {
        for offset in &self.spiral {
            if self.load_queue.len() >= self.max_loads_per_tick {
                break;
            }
            let column = center + offset;
            if index.is_column_loaded(column) || self.load_queue.contains(&column) {
                continue;
            }
            self.load_queue.push_back(column);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StorageKind;

    fn config(load_radius: i32, unload_radius: i32, circular: bool) -> EngineConfig {
        EngineConfig {
            load_radius,
            unload_radius,
            circular,
            max_loads_per_tick: 1000,
            max_unloads_per_tick: 1000,
            min_chunk_y: 0,
            max_chunk_y: 0,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn spiral_visits_every_offset_once_ring_by_ring() {
        let offsets = spiral_offsets(3);
        assert_eq!(offsets.len(), 49);
        assert_eq!(offsets[0], Vector2::new(0, 0));
        assert_eq!(offsets[1], Vector2::new(1, -1));
        assert_eq!(offsets[2], Vector2::new(1, 0));
        for (i, a) in offsets.iter().enumerate() {
            assert!(!offsets[i + 1..].contains(a), "{:?} repeated", a);
        }
        let rings: Vec<i32> = offsets.iter().map(|o| o.x.abs().max(o.y.abs())).collect();
        assert!(rings.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn circular_spiral_drops_corners() {
        let controller = StreamingController::new(&config(2, 3, true));
        assert_eq!(controller.spiral().len(), 13);
        let square = StreamingController::new(&config(2, 3, false));
        assert_eq!(square.spiral().len(), 25);
    }

    #[test]
    fn loads_nearest_columns_first_and_respects_cap() {
        let mut controller = StreamingController::new(&EngineConfig {
            max_loads_per_tick: 3,
            ..config(4, 6, true)
        });
        let index = ChunkIndex::new(StorageKind::Flat);
        let plan = controller.plan(Point2::new(10, 10), &index);
        assert_eq!(plan.load.len(), 3);
        assert_eq!(plan.load[0], Point2::new(10, 10));
        assert!(plan.unload.is_empty());
    }

    #[test]
    fn hysteresis_band_keeps_columns() {
        let mut controller = StreamingController::new(&config(5, 7, true));
        let mut index = ChunkIndex::new(StorageKind::Flat);
        // distance² 36: outside the load radius, inside the unload radius
        index.mark_column_loaded(Point2::new(6, 0));
        // distance² 50: beyond the unload radius
        index.mark_column_loaded(Point2::new(7, 1));

        let plan = controller.plan(Point2::new(0, 0), &index);
        assert_eq!(plan.unload, vec![Point2::new(7, 1)]);
        assert!(!plan.load.contains(&Point2::new(6, 0)));
        assert!(plan.load.iter().all(|column| column.x * column.x + column.y * column.y <= 25));
    }

    #[test]
    fn square_mode_unloads_by_chebyshev_distance() {
        let mut controller = StreamingController::new(&config(2, 3, false));
        let mut index = ChunkIndex::new(StorageKind::Flat);
        index.mark_column_loaded(Point2::new(3, 3));
        index.mark_column_loaded(Point2::new(4, 0));
        let plan = controller.plan(Point2::new(0, 0), &index);
        assert_eq!(plan.unload, vec![Point2::new(4, 0)]);
    }

    #[test]
    fn loaded_columns_are_not_requeued() {
        let mut controller = StreamingController::new(&config(1, 2, false));
        let mut index = ChunkIndex::new(StorageKind::Flat);
        let first = controller.plan(Point2::new(0, 0), &index);
        assert_eq!(first.load.len(), 9);
        for column in &first.load {
            index.mark_column_loaded(*column);
        }
        assert!(controller.plan(Point2::new(0, 0), &index).is_empty());
    }

    #[test]
    fn far_teleport_unloads_without_overflow() {
        for circular in [true, false] {
            let mut controller = StreamingController::new(&config(2, 3, circular));
            let mut index = ChunkIndex::new(StorageKind::Flat);
            index.mark_column_loaded(Point2::new(0, 0));
            index.mark_column_loaded(Point2::new(-60_000, 0));

            let plan = controller.plan(Point2::new(50_000, 0), &index);
            assert_eq!(
                plan.unload,
                vec![Point2::new(-60_000, 0), Point2::new(0, 0)]
            );
            assert_eq!(plan.load[0], Point2::new(50_000, 0));
        }
        let controller = StreamingController::new(&config(2, 3, true));
        assert!(!controller.within(Vector2::new(i32::MAX, i32::MIN + 1), 3));
    }
}
