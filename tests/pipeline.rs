use std::sync::Arc;
use std::time::{Duration, Instant};

use cgmath::{Point2, Point3};

use voxel_streamer::core::config::{EngineConfig, StorageKind};
use voxel_streamer::engine_state::rendering::MeshRegistry;
use voxel_streamer::engine_state::voxels::block::block_type::BlockType;
use voxel_streamer::engine_state::voxels::block::{BlockRegistry, BlockState};
use voxel_streamer::engine_state::voxels::chunk::state::GenerationState;
use voxel_streamer::engine_state::voxels::terrain::{FlatTerrain, TerrainGenerator};
use voxel_streamer::engine_state::EngineState;

const REFERENCE: Point3<f32> = Point3::new(16.0, 40.0, 16.0);

fn engine(generator: Arc<dyn TerrainGenerator>, storage: StorageKind) -> EngineState<MeshRegistry> {
    let config = EngineConfig {
        load_radius: 1,
        unload_radius: 2,
        min_chunk_y: 0,
        max_chunk_y: 1,
        max_loads_per_tick: 8,
        worker_count: 2,
        max_generation_jobs_in_flight: 2,
        storage,
        ..EngineConfig::default()
    };
    EngineState::new(
        config,
        generator,
        Arc::new(BlockRegistry::default_blocks()),
        MeshRegistry::new(),
    )
    .unwrap()
}

/// Ticks until every loaded chunk is ready and no job is left.
fn settle(engine: &mut EngineState<MeshRegistry>, reference: Point3<f32>) {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        engine.tick(reference);
        if engine.chunk_index().column_count() > 0 && engine.is_settled() {
            return;
        }
        assert!(Instant::now() < deadline, "pipeline did not settle: {:?}", engine.metrics());
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn every_loaded_chunk_gets_a_mesh() {
    for storage in [StorageKind::Flat, StorageKind::Palette] {
        let mut engine = engine(Arc::new(FlatTerrain { ground_height: 40 }), storage);
        settle(&mut engine, REFERENCE);

        // circular radius 1: center column plus its four face neighbors, two layers each
        assert_eq!(engine.chunk_index().column_count(), 5);
        assert_eq!(engine.chunk_index().len(), 10);
        for chunk in engine.chunk_index().iter() {
            assert_eq!(chunk.state(), GenerationState::Ready);
            let mesh = engine.renderer().get(chunk.coordinate).unwrap();
            assert!(!mesh.is_empty(), "chunk {:?} has no faces", chunk.coordinate);
        }
        assert_eq!(engine.metrics().failed_jobs, 0);
        assert_eq!(engine.metrics().illegal_transitions, 0);
    }
}

#[test]
fn edits_are_remeshed() {
    let mut engine = engine(
        Arc::new(FlatTerrain { ground_height: 40 }),
        StorageKind::Palette,
    );
    settle(&mut engine, REFERENCE);
    let top = Point3::new(0, 1, 0);
    let faces_before = engine.renderer().get(top).unwrap().face_count();
    let upserts_before = engine.renderer().upsert_count();

    // corner of chunk (0, 1, 0) on its -x and -z borders
    let position = Point3::new(0, 39, 0);
    let previous = engine.set_block(position, BlockState::AIR).unwrap();
    assert_eq!(previous, BlockType::GRASS.state());
    assert_eq!(
        engine.chunk_index().get(top).unwrap().state(),
        GenerationState::WaitingForNeighbors
    );
    assert_eq!(
        engine
            .chunk_index()
            .get(Point3::new(-1, 1, 0))
            .unwrap()
            .state(),
        GenerationState::WaitingForNeighbors
    );

    settle(&mut engine, REFERENCE);
    assert_eq!(engine.get_block(position), Some(BlockState::AIR));
    assert!(engine.renderer().upsert_count() >= upserts_before + 3);
    // the grass top face is gone; the +x and +z grass and the dirt below are exposed.
    // the -x and -z sides belong to the neighboring chunks' meshes
    assert_eq!(
        engine.renderer().get(top).unwrap().face_count(),
        faces_before + 2
    );
}

#[test]
fn moving_away_unloads_and_removes_meshes() {
    let mut engine = engine(
        Arc::new(FlatTerrain { ground_height: 40 }),
        StorageKind::Palette,
    );
    settle(&mut engine, REFERENCE);

    let far = Point3::new(32.0 * 20.0 + 16.0, 40.0, 16.0);
    settle(&mut engine, far);
    assert!(!engine.chunk_index().is_column_loaded(Point2::new(0, 0)));
    assert!(engine.chunk_index().is_column_loaded(Point2::new(20, 0)));
    assert!(!engine.renderer().contains(Point3::new(0, 0, 0)));
    assert_eq!(engine.renderer().len(), 10);
}
