//! Pipeline counters reported once per tick.
//!
//! `EngineState` fills a `PipelineMetrics` snapshot at the end of every tick and hands it
//! to the configured `MetricsSink`, if any. Per-state chunk counts together with the retry
//! and failure counters are enough to spot a chunk stuck in the pipeline.

use std::time::Duration;

use log::debug;

use crate::engine_state::task_management::task::JobKind;
use crate::engine_state::voxels::chunk::state::GenerationState;

/// A snapshot of the pipeline taken at the end of a tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineMetrics {
    pub tick: u64,
    pub loaded_chunks: usize,
    pub loaded_columns: usize,
    /// Jobs waiting in the scheduler's queue.
    pub queued_jobs: usize,
    /// Jobs sent to a worker and not yet drained.
    pub in_flight_jobs: usize,
    /// Loaded chunks per state, indexed like `GenerationState::ALL`.
    pub state_counts: [usize; 7],
    pub generation_retries: u64,
    pub meshing_retries: u64,
    /// Jobs that panicked on a worker.
    pub failed_jobs: u64,
    pub stale_completions: u64,
    pub illegal_transitions: u64,
    pub meshes_published: u64,
}

impl PipelineMetrics {
    /// Number of loaded chunks in `state`.
    pub fn in_state(&self, state: GenerationState) -> usize {
        self.state_counts[state as usize]
    }
}

/// Receives pipeline metrics.
pub trait MetricsSink {
    /// Called once at the end of every tick.
    fn record_tick(&mut self, metrics: &PipelineMetrics);

    /// Called for every completed job, stale or not.
    fn record_job(&mut self, kind: JobKind, elapsed: Duration);
}

/// Writes metrics to the `log` facade at debug level.
///
/// Tick summaries are written every `every_n_ticks` ticks.
pub struct LogMetricsSink {
    every_n_ticks: u64,
    jobs: [(u64, Duration); 2],
}

impl LogMetricsSink {
    pub fn new(every_n_ticks: u64) -> Self {
        LogMetricsSink {
            every_n_ticks: every_n_ticks.max(1),
            jobs: [(0, Duration::ZERO); 2],
        }
    }

    /// Average duration of the jobs of `kind` recorded so far.
    pub fn average_job_time(&self, kind: JobKind) -> Option<Duration> {
        let (count, total) = self.jobs[kind as usize];
        (count > 0)
            .then(|| total.as_nanos() / u128::from(count))
            .and_then(|nanos| u64::try_from(nanos).ok())
            .map(Duration::from_nanos)
    }
}

impl Default for LogMetricsSink {
    fn default() -> Self {
        Self::new(60)
    }
}

impl MetricsSink for LogMetricsSink {
    fn record_tick(&mut self, metrics: &PipelineMetrics) {
        if metrics.tick % self.every_n_ticks != 0 {
            return;
        }
        debug!(
            "tick {}: {} chunks in {} columns, {} queued, {} in flight, states {:?}, \
             retries {}/{}, failed {}, stale {}",
            metrics.tick,
            metrics.loaded_chunks,
            metrics.loaded_columns,
            metrics.queued_jobs,
            metrics.in_flight_jobs,
            metrics.state_counts,
            metrics.generation_retries,
            metrics.meshing_retries,
            metrics.failed_jobs,
            metrics.stale_completions,
        );
        for kind in [JobKind::Generation, JobKind::Meshing] {
            if let Some(average) = self.average_job_time(kind) {
                debug!("average {:?} job: {:?}", kind, average);
            }
        }
    }

    fn record_job(&mut self, kind: JobKind, elapsed: Duration) {
        let (count, total) = &mut self.jobs[kind as usize];
        *count += 1;
        *total += elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_job_time_per_kind() {
        let mut sink = LogMetricsSink::new(1);
        assert_eq!(sink.average_job_time(JobKind::Meshing), None);
        sink.record_job(JobKind::Meshing, Duration::from_millis(2));
        sink.record_job(JobKind::Meshing, Duration::from_millis(4));
        sink.record_job(JobKind::Generation, Duration::from_millis(10));
        assert_eq!(
            sink.average_job_time(JobKind::Meshing),
            Some(Duration::from_millis(3))
        );
        assert_eq!(
            sink.average_job_time(JobKind::Generation),
            Some(Duration::from_millis(10))
        );
        sink.record_tick(&PipelineMetrics::default());
    }

    #[test]
    fn average_survives_counts_beyond_u32() {
        let mut sink = LogMetricsSink::new(1);
        sink.jobs[JobKind::Generation as usize] = (1 << 32, Duration::from_secs(1 << 33));
        assert_eq!(
            sink.average_job_time(JobKind::Generation),
            Some(Duration::from_secs(2))
        );
        sink.record_job(JobKind::Generation, Duration::ZERO);
        assert!(sink.average_job_time(JobKind::Generation).is_some());
    }

    #[test]
    fn state_lookup_uses_declaration_order() {
        let mut metrics = PipelineMetrics::default();
        metrics.state_counts[GenerationState::Ready as usize] = 4;
        assert_eq!(metrics.in_state(GenerationState::Ready), 4);
        assert_eq!(metrics.in_state(GenerationState::Meshing), 0);
    }
}
