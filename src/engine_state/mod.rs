//! # Engine State Module
//!
//! The `EngineState` ties the pipeline together and runs it one tick at a time.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns the chunk index, the streaming controller, the job scheduler
//!   and the renderer, and drives every chunk through its state machine
//! * `metrics` - Per-tick pipeline counters and the `MetricsSink` interface
//! * `rendering` - Meshing, the packed vertex format and the `Renderer` interface
//! * `task_management` - The worker pool and the `Task` abstraction
//! * `voxels` - Blocks, chunks, the chunk index, streaming and terrain
//!
//! ## Tick
//!
//! Everything except generation and meshing runs on the thread calling `tick`:
//!
//! 1. Finished jobs are drained from the scheduler and applied to their chunks. Results
//!    whose ticket id no longer matches the chunk's job id are dropped.
//! 2. The streaming plan for the reference point is applied: columns are unloaded, then
//!    loaded.
//! 3. Chunks waiting for their neighbors are re-checked and dispatched for meshing.
//! 4. Queued jobs are handed to idle workers and metrics are reported.
//!
//! The main thread never waits on a worker. It only try-locks chunk storage, and every
//! job failure is logged and counted instead of propagated.

use std::sync::Arc;

use cgmath::{Point2, Point3};
use log::{debug, error, info, trace, warn};

use crate::core::config::{DirtyMode, EngineConfig};
use crate::core::error::{EngineError, JobError};

use metrics::{MetricsSink, PipelineMetrics};
use rendering::tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask;
use rendering::{Mesh, Renderer};
use task_management::task::{JobCompletion, JobKind, JobOutput};
use task_management::JobScheduler;
use voxels::block::{BlockRegistry, BlockState};
use voxels::chunk::neighbors::{affected_neighbors, NeighborFlags};
use voxels::chunk::state::{ChunkAction, ChunkEvent, GenerationState};
use voxels::chunk::storage::BlockContainer;
use voxels::chunk::{split_world_position, world_to_chunk, Chunk};
use voxels::chunk_index::ChunkIndex;
use voxels::streaming::StreamingController;
use voxels::tasks::chunk_generation_task::ChunkGenerationTask;
use voxels::terrain::TerrainGenerator;

pub mod metrics;
pub mod rendering;
pub mod task_management;
pub mod voxels;

/// The main state container of the chunk pipeline.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use cgmath::Point3;
/// use voxel_streamer::core::config::EngineConfig;
/// use voxel_streamer::engine_state::EngineState;
/// use voxel_streamer::engine_state::rendering::MeshRegistry;
/// use voxel_streamer::engine_state::voxels::block::BlockRegistry;
/// use voxel_streamer::engine_state::voxels::terrain::PerlinTerrain;
///
/// let mut engine = EngineState::new(
///     EngineConfig::default(),
///     Arc::new(PerlinTerrain::new(42)),
///     Arc::new(BlockRegistry::default_blocks()),
///     MeshRegistry::new(),
/// )
/// .unwrap();
/// engine.tick(Point3::new(0.0, 40.0, 0.0));
/// ```
pub struct EngineState<R: Renderer> {
    config: EngineConfig,
    chunk_index: ChunkIndex,
    streaming: StreamingController,
    scheduler: JobScheduler,
    generator: Arc<dyn TerrainGenerator>,
    registry: Arc<BlockRegistry>,
    renderer: R,
    metrics_sink: Option<Box<dyn MetricsSink>>,
    metrics: PipelineMetrics,
}

impl<R: Renderer> EngineState<R> {
    /// Creates a new engine state and starts its workers.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated before anything is started
    /// * `generator` - Terrain generator shared with the workers
    /// * `registry` - Block definitions shared with the workers
    /// * `renderer` - Receives every published mesh
    ///
    /// # Returns
    ///
    /// The engine, or an error if the configuration is invalid or a worker could not be
    /// spawned.
    pub fn new(
        config: EngineConfig,
        generator: Arc<dyn TerrainGenerator>,
        registry: Arc<BlockRegistry>,
        renderer: R,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let scheduler =
            JobScheduler::new(config.worker_count, config.max_generation_jobs_in_flight)?;
        info!(
            "Engine started: load radius {}, unload radius {}, chunk layers {}..={}, {:?} storage",
            config.load_radius,
            config.unload_radius,
            config.min_chunk_y,
            config.max_chunk_y,
            config.storage
        );

        Ok(EngineState {
            chunk_index: ChunkIndex::new(config.storage),
            streaming: StreamingController::new(&config),
            scheduler,
            generator,
            registry,
            renderer,
            metrics_sink: None,
            metrics: PipelineMetrics::default(),
            config,
        })
    }

    /// Reports metrics to `sink` at the end of every tick.
    pub fn with_metrics_sink(mut self, sink: Box<dyn MetricsSink>) -> Self {
        self.metrics_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn chunk_index(&self) -> &ChunkIndex {
        &self.chunk_index
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Metrics as of the end of the last tick.
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Whether no job is pending and every loaded chunk is `Ready`.
    pub fn is_settled(&self) -> bool {
        self.scheduler.is_idle()
            && self
                .chunk_index
                .iter()
                .all(|chunk| chunk.state() == GenerationState::Ready)
    }

    fn y_range(&self) -> (i32, i32) {
        (self.config.min_chunk_y, self.config.max_chunk_y)
    }

    /// Advances the pipeline by one tick around `reference`.
    ///
    /// # Arguments
    ///
    /// * `reference` - World-space position the loaded area follows
    pub fn tick(&mut self, reference: Point3<f32>) {
        self.metrics.tick += 1;

        for completion in self.scheduler.drain_completions() {
            self.apply_completion(completion);
        }

        let center = world_to_chunk(reference);
        let plan = self
            .streaming
            .plan(Point2::new(center.x, center.z), &self.chunk_index);
        for column in plan.unload {
            self.unload_column(column);
        }
        for column in plan.load {
            self.load_column(column);
        }

        self.advance_waiting_chunks();
        self.scheduler.process_queued_tasks();
        self.report_metrics();
    }

    /// Applies one finished job to its chunk.
    pub(crate) fn apply_completion(&mut self, completion: JobCompletion) {
        let JobCompletion {
            ticket,
            elapsed,
            result,
            ..
        } = completion;
        if let Some(sink) = self.metrics_sink.as_mut() {
            sink.record_job(ticket.kind, elapsed);
        }

        let current = self.chunk_index.get(ticket.target).map(Chunk::mesh_job_id);
        if current != Some(ticket.id) {
            trace!(
                "Dropping stale {:?} result for chunk {:?} (job {}, current {:?})",
                ticket.kind,
                ticket.target,
                ticket.id,
                current
            );
            self.metrics.stale_completions += 1;
            return;
        }

        let coordinate = ticket.target;
        match result {
            Ok(JobOutput::Generated {
                rendered_block_count,
            }) => self.finish_generation(coordinate, rendered_block_count),
            Ok(JobOutput::Meshed(mesh)) => self.finish_meshing(coordinate, mesh),
            Err(JobError::LockTimeout { coordinate: blocker }) => {
                debug!(
                    "{:?} job for chunk {:?} timed out on chunk {:?}, retrying",
                    ticket.kind, coordinate, blocker
                );
                match ticket.kind {
                    JobKind::Generation => {
                        self.metrics.generation_retries += 1;
                        self.step(coordinate, ChunkEvent::GenerationFailed);
                    }
                    JobKind::Meshing => {
                        self.metrics.meshing_retries += 1;
                        self.step(coordinate, ChunkEvent::MeshingFailed);
                    }
                }
            }
            Err(JobError::WorkerPanicked(message)) => {
                // the chunk keeps its state and shows up in the per-state counts
                error!(
                    "{:?} job for chunk {:?} panicked: {}",
                    ticket.kind, coordinate, message
                );
                self.metrics.failed_jobs += 1;
            }
        }
    }

    fn finish_generation(&mut self, coordinate: Point3<i32>, rendered_block_count: u32) {
        if let Some(chunk) = self.chunk_index.get_mut(coordinate) {
            chunk.set_rendered_block_count(rendered_block_count);
        }
        for event in [
            ChunkEvent::TerrainGenerated,
            ChunkEvent::DecorationComplete,
            ChunkEvent::LightingComplete,
        ] {
            if !self.step(coordinate, event) {
                return;
            }
        }

        // an empty chunk looks exactly like the air a missing neighbor reads as
        if self.config.exclude_missing_neighbors
            && self.chunk_index.get(coordinate).is_some_and(Chunk::is_empty)
        {
            self.try_advance(coordinate);
            return;
        }

        // neighbors meshed while this chunk was missing have stale borders
        let arrived = NeighborFlags::ALL
            .offsets()
            .map(|offset| coordinate + offset)
            .filter(|neighbor| {
                self.chunk_index
                    .get(*neighbor)
                    .is_some_and(|chunk| !chunk.is_empty())
            })
            .collect::<Vec<_>>();
        for neighbor in arrived {
            self.dirty_chunk(neighbor);
        }

        self.try_advance(coordinate);
    }

    fn finish_meshing(&mut self, coordinate: Point3<i32>, mesh: Mesh) {
        if let Some(ChunkAction::PublishMesh) = self.fire(coordinate, ChunkEvent::MeshingComplete)
        {
            self.publish(mesh);
        }
    }

    /// Applies `event` to a loaded chunk.
    ///
    /// # Returns
    /// The action to perform, or `None` if the chunk is not loaded or the transition is
    /// illegal. Illegal transitions are logged and counted.
    fn fire(&mut self, coordinate: Point3<i32>, event: ChunkEvent) -> Option<ChunkAction> {
        let chunk = self.chunk_index.get_mut(coordinate)?;
        match chunk.apply(event) {
            Ok(action) => Some(action),
            Err(err) => {
                error!("Chunk {:?}: {}", coordinate, err);
                self.metrics.illegal_transitions += 1;
                None
            }
        }
    }

    /// Applies `event` and performs the resulting action.
    ///
    /// # Returns
    /// Whether the transition was legal.
    fn step(&mut self, coordinate: Point3<i32>, event: ChunkEvent) -> bool {
        let Some(action) = self.fire(coordinate, event) else {
            return false;
        };
        match action {
            ChunkAction::None => {}
            ChunkAction::DispatchGeneration => self.dispatch_generation(coordinate),
            ChunkAction::DispatchMeshing => self.dispatch_meshing(coordinate),
            ChunkAction::PublishEmptyMesh => self.publish(Mesh::empty(coordinate)),
            ChunkAction::RemoveMesh => self.renderer.remove(coordinate),
            ChunkAction::PublishMesh => {
                warn!("Chunk {:?} finished meshing without a mesh", coordinate)
            }
        }
        true
    }

    fn publish(&mut self, mesh: Mesh) {
        self.metrics.meshes_published += 1;
        self.renderer.upsert(mesh);
    }

    fn dispatch_generation(&mut self, coordinate: Point3<i32>) {
        let Some(id) = self.chunk_index.issue_job_id(coordinate) else {
            return;
        };
        let Some(chunk) = self.chunk_index.get(coordinate) else {
            return;
        };
        self.scheduler.publish_task(Box::new(ChunkGenerationTask::new(
            id,
            coordinate,
            chunk.storage.clone(),
            self.generator.clone(),
            self.config.lock_timeout(),
        )));
    }

    fn dispatch_meshing(&mut self, coordinate: Point3<i32>) {
        let Some(id) = self.chunk_index.issue_job_id(coordinate) else {
            return;
        };
        let Some(chunk) = self.chunk_index.get(coordinate) else {
            return;
        };
        self.scheduler.publish_task(Box::new(ChunkMeshGenerationTask::new(
            id,
            coordinate,
            chunk.storage.clone(),
            self.chunk_index.neighbor_storages(coordinate),
            self.registry.clone(),
            self.config.lock_timeout(),
        )));
    }

    /// Moves a `WaitingForNeighbors` chunk on if it can: empty chunks become `Ready`,
    /// others start meshing once every required neighbor is terrain ready.
    fn try_advance(&mut self, coordinate: Point3<i32>) {
        let Some(chunk) = self.chunk_index.get(coordinate) else {
            return;
        };
        if chunk.state() != GenerationState::WaitingForNeighbors {
            return;
        }

        let event = if chunk.is_empty() {
            ChunkEvent::FoundEmpty
        } else if self.chunk_index.neighbors_terrain_ready(
            coordinate,
            self.config.exclude_missing_neighbors,
            self.y_range(),
        ) {
            ChunkEvent::NeighborsReady
        } else {
            return;
        };
        self.step(coordinate, event);
    }

    fn advance_waiting_chunks(&mut self) {
        for coordinate in self
            .chunk_index
            .coordinates_in_state(GenerationState::WaitingForNeighbors)
        {
            self.try_advance(coordinate);
        }
    }

    /// Sends a `Meshing` or `Ready` chunk back to `WaitingForNeighbors`.
    ///
    /// # Returns
    /// Whether the chunk was dirtied. Chunks in other states have no mesh to invalidate.
    fn dirty_chunk(&mut self, coordinate: Point3<i32>) -> bool {
        match self.chunk_index.get(coordinate).map(Chunk::state) {
            Some(GenerationState::Meshing | GenerationState::Ready) => {
                // a meshing job still in flight is now stale
                self.chunk_index.issue_job_id(coordinate);
                self.step(coordinate, ChunkEvent::Dirtied)
            }
            _ => false,
        }
    }

    fn dirty_with_neighbors(
        &mut self,
        coordinate: Point3<i32>,
        neighbors: NeighborFlags,
        include_self: bool,
    ) -> usize {
        let targets = include_self
            .then_some(coordinate)
            .into_iter()
            .chain(neighbors.offsets().map(|offset| coordinate + offset))
            .collect::<Vec<_>>();
        targets
            .into_iter()
            .filter(|target| self.dirty_chunk(*target))
            .count()
    }

    /// Replaces one block.
    ///
    /// With `DirtyMode::Immediate` the edited chunk and every loaded neighbor sharing the
    /// edited border are sent back to `WaitingForNeighbors` right away; with
    /// `DirtyMode::Delayed` that waits for `flush_dirty`.
    ///
    /// # Arguments
    ///
    /// * `position` - World block position
    /// * `block` - The new block
    ///
    /// # Returns
    ///
    /// The previous block, or an error if the chunk is not loaded, has no terrain yet, or
    /// a worker holds its storage right now. The edit never waits for the lock.
    pub fn set_block(
        &mut self,
        position: Point3<i32>,
        block: BlockState,
    ) -> Result<BlockState, EngineError> {
        let (coordinate, [x, y, z]) = split_world_position(position);
        let chunk = self
            .chunk_index
            .get_mut(coordinate)
            .ok_or(EngineError::ChunkNotLoaded(coordinate))?;
        if !chunk.is_terrain_ready() {
            return Err(EngineError::ChunkNotReady(coordinate));
        }

        let (previous, rendered) = {
            let mut storage = chunk
                .storage
                .try_get_mut()
                .ok_or(EngineError::LockTimeout(coordinate))?;
            let previous = storage.set(x, y, z, block);
            (previous, storage.rendered_count())
        };
        if previous == block {
            return Ok(previous);
        }
        chunk.set_rendered_block_count(rendered);

        let neighbors = affected_neighbors(x, y, z);
        match self.config.dirty_mode {
            DirtyMode::Immediate => {
                let dirtied = self.dirty_with_neighbors(coordinate, neighbors, true);
                trace!("Edit at {:?} dirtied {} chunks", position, dirtied);
            }
            DirtyMode::Delayed => chunk.mark_pending(neighbors, true),
        }
        Ok(previous)
    }

    /// Reads one block, or `None` if its chunk has no terrain or is being written.
    pub fn get_block(&self, position: Point3<i32>) -> Option<BlockState> {
        let (coordinate, [x, y, z]) = split_world_position(position);
        let chunk = self.chunk_index.get(coordinate)?;
        if !chunk.is_terrain_ready() {
            return None;
        }
        let storage = chunk.storage.try_get()?;
        Some(storage.get(x, y, z))
    }

    /// Applies every edit accumulated in delayed dirtying mode.
    ///
    /// # Returns
    ///
    /// The number of chunks sent back to `WaitingForNeighbors`.
    pub fn flush_dirty(&mut self) -> usize {
        let pending = self
            .chunk_index
            .iter()
            .filter(|chunk| chunk.has_pending())
            .map(|chunk| chunk.coordinate)
            .collect::<Vec<_>>();

        let mut dirtied = 0;
        for coordinate in pending {
            let Some((include_self, neighbors)) = self
                .chunk_index
                .get_mut(coordinate)
                .map(Chunk::take_pending)
            else {
                continue;
            };
            dirtied += self.dirty_with_neighbors(coordinate, neighbors, include_self);
        }
        if dirtied > 0 {
            debug!("Flushed edits dirtied {} chunks", dirtied);
        }
        dirtied
    }

    /// Loads every chunk of `column` and dispatches their generation.
    pub fn load_column(&mut self, column: Point2<i32>) {
        if self.chunk_index.is_column_loaded(column) {
            return;
        }
        self.chunk_index.mark_column_loaded(column);

        let (min_y, max_y) = self.y_range();
        for y in min_y..=max_y {
            let coordinate = Point3::new(column.x, y, column.y);
            self.chunk_index.insert(coordinate);
            self.step(coordinate, ChunkEvent::Load);
        }
    }

    /// Unloads every chunk of `column`.
    ///
    /// Queued jobs of the column are dropped and results of running ones become stale.
    /// Storage a worker still holds stays alive until the worker lets go of it. When
    /// missing neighbors read as air, meshed neighbors left behind are dirtied so the
    /// faces they culled against the column come back.
    pub fn unload_column(&mut self, column: Point2<i32>) {
        let dropped = self
            .scheduler
            .retain_queued(|ticket| ticket.target.x != column.x || ticket.target.z != column.y);
        if dropped > 0 {
            trace!("Dropped {} queued jobs of column {:?}", dropped, column);
        }

        let (min_y, max_y) = self.y_range();
        let mut culled_against = Vec::new();
        for y in min_y..=max_y {
            let coordinate = Point3::new(column.x, y, column.y);
            let Some(chunk) = self.chunk_index.get(coordinate) else {
                continue;
            };
            let state = chunk.state();
            // without missing-as-air there is nothing to remesh against until it returns
            if self.config.exclude_missing_neighbors
                && chunk.is_terrain_ready()
                && !chunk.is_empty()
            {
                culled_against.push(coordinate);
            }
            self.chunk_index.issue_job_id(coordinate);
            if state != GenerationState::Uninitialized {
                self.step(coordinate, ChunkEvent::Unload);
            }
            if let Some(chunk) = self.chunk_index.remove(coordinate) {
                if let Some(mut storage) = chunk.storage.try_get_mut() {
                    storage.clear();
                }
            }
        }
        self.chunk_index.mark_column_unloaded(column);

        let mut neighbors = culled_against
            .into_iter()
            .flat_map(|coordinate| {
                NeighborFlags::ALL
                    .offsets()
                    .map(move |offset| coordinate + offset)
            })
            .filter(|neighbor| neighbor.x != column.x || neighbor.z != column.y)
            .collect::<Vec<_>>();
        neighbors.sort_by_key(|neighbor| (neighbor.x, neighbor.y, neighbor.z));
        neighbors.dedup();
        let dirtied = neighbors
            .into_iter()
            .filter(|neighbor| self.dirty_chunk(*neighbor))
            .count();
        if dirtied > 0 {
            trace!("Unloading column {:?} dirtied {} chunks", column, dirtied);
        }
    }

    fn report_metrics(&mut self) {
        self.metrics.loaded_chunks = self.chunk_index.len();
        self.metrics.loaded_columns = self.chunk_index.column_count();
        self.metrics.queued_jobs = self.scheduler.queued_len();
        self.metrics.in_flight_jobs = self.scheduler.in_flight();
        self.metrics.state_counts = self.chunk_index.state_counts();
        if let Some(sink) = self.metrics_sink.as_mut() {
            sink.record_tick(&self.metrics);
        }
    }
}
