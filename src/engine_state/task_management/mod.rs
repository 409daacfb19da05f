//! # Task Management System
//!
//! This module provides the worker pool that runs chunk generation and meshing jobs off
//! the main thread.
//!
//! ## Architecture Overview
//!
//! - `JobScheduler`: Owns the workers, the priority queue and the completion channel
//! - `Task`: A unit of work executed on a worker (see `task`)
//! - `TaskChannel`: The main thread's handle on one worker
//!
//! Each worker has a dedicated task channel and at most `MAX_TASKS_IN_FLIGHT` tasks
//! sent to it at a time. Queued tasks stay on the main thread in a priority queue until a
//! worker is idle, so a meshing job published after a batch of generation jobs still
//! overtakes them. All workers report into one shared completion channel.
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `JobScheduler::publish_task()` and land in the queue
//! 2. `process_queued_tasks()` hands the highest-priority tasks to idle workers
//!    (round-robin), respecting the cap on generation jobs in flight
//! 3. Workers run the task, catching panics, and send a `JobCompletion`
//! 4. `drain_completions()` collects finished jobs on the main thread once per tick
//!
//! With zero workers tasks stay queued forever, which tests use to inspect the queue.
//!
//! ## Example Usage
//! ```rust,no_run
//! # use voxel_streamer::engine_state::task_management::JobScheduler;
//! let mut scheduler = JobScheduler::new(4, 4).unwrap();
//! // scheduler.publish_task(Box::new(task));
//! scheduler.process_queued_tasks();
//! for completion in scheduler.drain_completions() {
//!     // apply the completion to the chunk it targets
//! #   let _ = completion;
//! }
//! ```

pub mod task;

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use web_time::Instant;

use crate::core::error::{EngineError, JobError};
use task::{JobCompletion, JobKind, JobPriority, JobTicket, Task, WorkerContext};

/// Maximum number of tasks that can be in flight per worker channel.
///
/// This is set to 1 so a worker never holds a queued task that a higher-priority one
/// published later could have overtaken.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

/// A communication channel between the main thread and a worker thread.
struct TaskChannel {
    /// `None` once the scheduler is shutting down.
    task_sender: Option<Sender<Box<dyn Task>>>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// A task waiting for a worker.
struct QueuedTask {
    priority: JobPriority,
    sequence: u64,
    task: Box<dyn Task>,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    /// Higher priority first, then first in first out.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Manages a pool of worker threads and coordinates job execution.
///
/// The `JobScheduler` is only ever used from the main thread. Dropping it closes every
/// task channel and joins the workers; jobs already running finish first.
pub struct JobScheduler {
    channels: Vec<TaskChannel>,
    queued_tasks: BinaryHeap<QueuedTask>,
    current_channel: usize,
    next_sequence: u64,
    completion_receiver: Receiver<JobCompletion>,
    max_generation_jobs_in_flight: usize,
    generation_jobs_in_flight: usize,
}

impl JobScheduler {
    /// Creates a new `JobScheduler` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create
    /// * `max_generation_jobs_in_flight` - Cap on generation jobs running at once
    ///
    /// # Returns
    /// The scheduler, or `EngineError::WorkerSpawn` if the OS refused a thread.
    pub fn new(
        num_workers: usize,
        max_generation_jobs_in_flight: usize,
    ) -> Result<Self, EngineError> {
        let (completion_sender, completion_receiver) = unbounded::<JobCompletion>();
        let mut channels = Vec::with_capacity(num_workers);

        info!(
            "Starting {} chunk workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        for index in 0..num_workers {
            let (task_sender, task_receiver) = unbounded::<Box<dyn Task>>();
            let completion_sender = completion_sender.clone();

            let worker = thread::Builder::new()
                .name(format!("chunk-worker-{}", index))
                .spawn(move || worker_loop(index, task_receiver, completion_sender))
                .map_err(|source| EngineError::WorkerSpawn { index, source })?;

            channels.push(TaskChannel {
                task_sender: Some(task_sender),
                num_tasks_in_flight: 0,
                worker: Some(worker),
            });
        }

        Ok(JobScheduler {
            channels,
            queued_tasks: BinaryHeap::new(),
            current_channel: 0,
            next_sequence: 0,
            completion_receiver,
            max_generation_jobs_in_flight,
            generation_jobs_in_flight: 0,
        })
    }

    /// Queues a task. It is dispatched by the next `process_queued_tasks()` call.
    pub fn publish_task(&mut self, task: Box<dyn Task>) {
        let priority = task.ticket().kind.priority();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queued_tasks.push(QueuedTask {
            priority,
            sequence,
            task,
        });
    }

    /// Drops queued (not yet dispatched) tasks whose ticket fails `keep`.
    ///
    /// # Returns
    /// The number of tasks removed.
    pub fn retain_queued(&mut self, mut keep: impl FnMut(&JobTicket) -> bool) -> usize {
        let before = self.queued_tasks.len();
        self.queued_tasks.retain(|queued| keep(&queued.task.ticket()));
        before - self.queued_tasks.len()
    }

    /// Finds an available worker channel, round-robin from the last one used.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|offset| (self.current_channel + offset) % count)
            .find(|&index| {
                let channel = &self.channels[index];
                channel.task_sender.is_some() && channel.num_tasks_in_flight < MAX_TASKS_IN_FLIGHT
            })
    }

    fn generation_capped(&self) -> bool {
        self.generation_jobs_in_flight >= self.max_generation_jobs_in_flight
    }

    /// Hands queued tasks to idle workers in priority order.
    ///
    /// Stops when every worker is busy, the queue is empty, or the next task is a
    /// generation job and the generation cap is reached. Meshing jobs always sort ahead
    /// of generation jobs, so the cap never blocks one.
    pub fn process_queued_tasks(&mut self) {
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(next) = self.queued_tasks.peek() else {
                break;
            };
            let kind = next.task.ticket().kind;
            if kind == JobKind::Generation && self.generation_capped() {
                break;
            }

            let Some(QueuedTask {
                priority,
                sequence,
                task,
            }) = self.queued_tasks.pop()
            else {
                break;
            };
            let channel = &mut self.channels[channel_idx];
            let Some(sender) = channel.task_sender.as_ref() else {
                self.queued_tasks.push(QueuedTask {
                    priority,
                    sequence,
                    task,
                });
                break;
            };

            match sender.send(task) {
                Ok(()) => {
                    channel.num_tasks_in_flight += 1;
                    if kind == JobKind::Generation {
                        self.generation_jobs_in_flight += 1;
                    }
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                }
                Err(returned) => {
                    warn!("Chunk worker {} disconnected", channel_idx);
                    channel.task_sender = None;
                    self.queued_tasks.push(QueuedTask {
                        priority,
                        sequence,
                        task: returned.0,
                    });
                }
            }
        }
    }

    /// Collects every completion the workers have sent since the last call.
    pub fn drain_completions(&mut self) -> Vec<JobCompletion> {
        let mut completions = Vec::new();
        while let Ok(completion) = self.completion_receiver.try_recv() {
            if let Some(channel) = self.channels.get_mut(completion.worker) {
                channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
            }
            if completion.ticket.kind == JobKind::Generation {
                self.generation_jobs_in_flight = self.generation_jobs_in_flight.saturating_sub(1);
            }
            completions.push(completion);
        }
        completions
    }

    pub fn queued_len(&self) -> usize {
        self.queued_tasks.len()
    }

    pub fn in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight)
            .sum()
    }

    pub fn generation_jobs_in_flight(&self) -> usize {
        self.generation_jobs_in_flight
    }

    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Whether nothing is queued or running.
    pub fn is_idle(&self) -> bool {
        self.queued_tasks.is_empty() && self.in_flight() == 0
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        for channel in &mut self.channels {
            channel.task_sender = None;
        }
        for (index, channel) in self.channels.iter_mut().enumerate() {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    error!("Chunk worker {} terminated abnormally", index);
                }
            }
        }
        debug!("Job scheduler shut down");
    }
}

fn worker_loop(
    index: usize,
    task_receiver: Receiver<Box<dyn Task>>,
    completion_sender: Sender<JobCompletion>,
) {
    let mut context = WorkerContext::new(index);

    while let Ok(task) = task_receiver.recv() {
        let ticket = task.ticket();
        let start = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.process(&mut context)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    "Worker {} panicked running {:?} job for chunk {:?}: {}",
                    index, ticket.kind, ticket.target, message
                );
                // scratch buffers may be half-written
                context = WorkerContext::new(index);
                Err(JobError::WorkerPanicked(message))
            }
        };

        let completion = JobCompletion {
            ticket,
            worker: index,
            elapsed: start.elapsed(),
            result,
        };
        if completion_sender.send(completion).is_err() {
            break;
        }
    }

    debug!("Chunk worker {} exiting", index);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::time::Duration;

    use cgmath::Point3;

    use super::task::JobOutput;
    use super::*;

    struct FakeTask {
        ticket: JobTicket,
        runs: Arc<AtomicUsize>,
        panic: bool,
    }

    impl FakeTask {
        fn boxed(id: u64, kind: JobKind, runs: &Arc<AtomicUsize>) -> Box<dyn Task> {
            Box::new(FakeTask {
                ticket: JobTicket {
                    id,
                    target: Point3::new(id as i32, 0, 0),
                    kind,
                },
                runs: runs.clone(),
                panic: false,
            })
        }
    }

    impl Task for FakeTask {
        fn ticket(&self) -> JobTicket {
            self.ticket
        }

        fn process(&self, _context: &mut WorkerContext) -> Result<JobOutput, JobError> {
            self.runs.fetch_add(1, AtomicOrdering::SeqCst);
            if self.panic {
                panic!("boom");
            }
            Ok(JobOutput::Generated {
                rendered_block_count: self.ticket.id as u32,
            })
        }
    }

    fn wait_for(scheduler: &mut JobScheduler, count: usize) -> Vec<JobCompletion> {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut completions = Vec::new();
        while completions.len() < count && std::time::Instant::now() < deadline {
            completions.extend(scheduler.drain_completions());
            scheduler.process_queued_tasks();
            std::thread::sleep(Duration::from_millis(1));
        }
        completions
    }

    #[test]
    fn meshing_jobs_leave_the_queue_first() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new(0, 4).unwrap();
        scheduler.publish_task(FakeTask::boxed(1, JobKind::Generation, &runs));
        scheduler.publish_task(FakeTask::boxed(2, JobKind::Generation, &runs));
        scheduler.publish_task(FakeTask::boxed(3, JobKind::Meshing, &runs));
        scheduler.publish_task(FakeTask::boxed(4, JobKind::Meshing, &runs));

        scheduler.process_queued_tasks();
        assert_eq!(scheduler.queued_len(), 4);

        let order: Vec<u64> = std::iter::from_fn(|| scheduler.queued_tasks.pop())
            .map(|queued| queued.task.ticket().id)
            .collect();
        assert_eq!(order, vec![3, 4, 1, 2]);
    }

    #[test]
    fn retain_queued_drops_matching_tasks() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new(0, 1).unwrap();
        for id in 0..5 {
            scheduler.publish_task(FakeTask::boxed(id, JobKind::Generation, &runs));
        }
        let removed = scheduler.retain_queued(|ticket| ticket.id % 2 == 0);
        assert_eq!(removed, 2);
        assert_eq!(scheduler.queued_len(), 3);
    }

    #[test]
    fn workers_run_every_task() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new(2, 2).unwrap();
        for id in 0..6 {
            scheduler.publish_task(FakeTask::boxed(id, JobKind::Generation, &runs));
        }
        scheduler.process_queued_tasks();
        assert!(scheduler.in_flight() <= 2);

        let completions = wait_for(&mut scheduler, 6);
        assert_eq!(completions.len(), 6);
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 6);
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.generation_jobs_in_flight(), 0);
    }

    #[test]
    fn generation_cap_limits_dispatch() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new(3, 1).unwrap();
        for id in 0..3 {
            scheduler.publish_task(FakeTask::boxed(id, JobKind::Generation, &runs));
        }
        scheduler.process_queued_tasks();
        assert_eq!(scheduler.generation_jobs_in_flight(), 1);
        assert_eq!(scheduler.queued_len(), 2);

        let completions = wait_for(&mut scheduler, 3);
        assert_eq!(completions.len(), 3);
    }

    #[test]
    fn worker_panic_is_reported() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new(1, 1).unwrap();
        scheduler.publish_task(Box::new(FakeTask {
            ticket: JobTicket {
                id: 7,
                target: Point3::new(0, 0, 0),
                kind: JobKind::Meshing,
            },
            runs: runs.clone(),
            panic: true,
        }));
        scheduler.publish_task(FakeTask::boxed(8, JobKind::Generation, &runs));
        scheduler.process_queued_tasks();

        let completions = wait_for(&mut scheduler, 2);
        assert_eq!(completions.len(), 2);
        let panicked = completions
            .iter()
            .find(|completion| completion.ticket.id == 7)
            .unwrap();
        assert!(matches!(
            &panicked.result,
            Err(JobError::WorkerPanicked(message)) if message == "boom"
        ));
        // the worker survives the panic
        assert!(completions
            .iter()
            .any(|completion| completion.ticket.id == 8 && completion.result.is_ok()));
    }
}
