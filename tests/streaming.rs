use cgmath::Point2;

use voxel_streamer::core::config::{EngineConfig, StorageKind};
use voxel_streamer::engine_state::voxels::chunk_index::ChunkIndex;
use voxel_streamer::engine_state::voxels::streaming::{StreamingController, StreamingPlan};

fn config() -> EngineConfig {
    EngineConfig {
        load_radius: 5,
        unload_radius: 7,
        circular: true,
        max_loads_per_tick: 1000,
        max_unloads_per_tick: 1000,
        ..EngineConfig::default()
    }
}

fn apply(index: &mut ChunkIndex, plan: &StreamingPlan) {
    for column in &plan.unload {
        index.mark_column_unloaded(*column);
    }
    for column in &plan.load {
        index.mark_column_loaded(*column);
    }
}

#[test]
fn oscillating_reference_does_not_churn() {
    let mut controller = StreamingController::new(&config());
    let mut index = ChunkIndex::new(StorageKind::Palette);

    let first = controller.plan(Point2::new(0, 0), &index);
    assert_eq!(first.load.len(), controller.spiral().len());
    assert!(first.unload.is_empty());
    apply(&mut index, &first);

    let step = controller.plan(Point2::new(1, 0), &index);
    assert!(!step.load.is_empty());
    // (-5, 0) is 6 columns away: distance² 36 stays loaded
    assert!(step.unload.is_empty());
    apply(&mut index, &step);

    for center in [Point2::new(0, 0), Point2::new(1, 0), Point2::new(0, 0)] {
        let plan = controller.plan(center, &index);
        assert!(plan.is_empty(), "churn at {:?}: {:?}", center, plan);
    }
}

#[test]
fn columns_beyond_the_unload_radius_are_dropped() {
    let mut controller = StreamingController::new(&config());
    let mut index = ChunkIndex::new(StorageKind::Palette);
    let plan = controller.plan(Point2::new(0, 0), &index);
    apply(&mut index, &plan);

    let plan = controller.plan(Point2::new(3, 0), &index);
    // distance² 64 from (3, 0)
    assert!(plan.unload.contains(&Point2::new(-5, 0)));
    // distance² exactly 49 is kept
    assert!(!plan.unload.contains(&Point2::new(-4, 0)));
    for column in &plan.unload {
        let (dx, dz) = (column.x - 3, column.y);
        assert!(dx * dx + dz * dz > 49);
    }
}
