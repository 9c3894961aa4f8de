//! Concurrent task runner
//!
//! Dispatches a batch of independent jobs onto worker threads and records
//! the wall-clock duration of each one. Every job owns a dedicated result
//! slot, so workers never contend on writes. The runner returns only after
//! every slot has been written (or the join bound expires).

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use hdrhistogram::Histogram;
use tracing::{debug, warn};

use crate::sync::CompletionLatch;
use crate::utils::error::panic_message;
use crate::utils::{JobError, LabError, Result};

/// Zero-argument unit of work, consumed exactly once
pub type Job = Box<dyn FnOnce() -> std::result::Result<(), JobError> + Send + 'static>;

/// Box a closure as a `Job`
pub fn job<F>(f: F) -> Job
where
    F: FnOnce() -> std::result::Result<(), JobError> + Send + 'static,
{
    Box::new(f)
}

/// Terminal state of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Failed(JobError),
}

impl JobStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// What one worker wrote into its slot
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub elapsed: Duration,
    pub status: JobStatus,
}

/// One outcome per submitted job, index-aligned with the submission order
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    outcomes: Vec<JobOutcome>,
}

impl TaskResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&JobOutcome> {
        self.outcomes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter()
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.outcomes.iter().map(|o| o.elapsed).collect()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_failed()).count()
    }

    /// Sum of per-job durations (not the batch wall time)
    pub fn total_duration(&self) -> Duration {
        self.outcomes.iter().map(|o| o.elapsed).sum()
    }

    pub fn max_duration(&self) -> Duration {
        self.outcomes
            .iter()
            .map(|o| o.elapsed)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Job durations in microseconds
    pub fn histogram(&self) -> Histogram<u64> {
        let mut histogram =
            Histogram::new_with_bounds(1, 3_600_000_000, 3).expect("Failed to create histogram");
        for outcome in &self.outcomes {
            histogram.saturating_record(outcome.elapsed.as_micros() as u64);
        }
        histogram
    }

    pub fn to_json(&self) -> serde_json::Value {
        let histogram = self.histogram();
        serde_json::json!({
            "jobs": self.outcomes.iter().enumerate().map(|(index, o)| {
                serde_json::json!({
                    "index": index,
                    "elapsed_ms": o.elapsed.as_secs_f64() * 1000.0,
                    "status": if o.status.is_failed() { "failed" } else { "completed" },
                    "error": match &o.status {
                        JobStatus::Failed(e) => Some(e.to_string()),
                        JobStatus::Completed => None,
                    },
                })
            }).collect::<Vec<_>>(),
            "failures": self.failure_count(),
            "latency": {
                "p50_ms": histogram.value_at_percentile(50.0) as f64 / 1000.0,
                "p99_ms": histogram.value_at_percentile(99.0) as f64 / 1000.0,
                "max_ms": self.max_duration().as_secs_f64() * 1000.0,
            },
        })
    }
}

type Slots = Arc<Vec<OnceLock<JobOutcome>>>;

/// Runs batches of jobs concurrently
///
/// By default every job gets its own thread. `with_max_workers` switches to a
/// fixed pool pulling jobs from a shared queue.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    max_workers: Option<usize>,
    join_timeout: Option<Duration>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of worker threads
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Bound the wait for all slots to be written
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = Some(timeout);
        self
    }

    pub fn run(&self, jobs: Vec<Job>) -> Result<TaskResult> {
        if self.max_workers == Some(0) {
            return Err(LabError::Config(
                "max workers must be at least 1".to_string(),
            ));
        }

        let total = jobs.len();
        if total == 0 {
            return Ok(TaskResult::default());
        }

        let slots: Slots = Arc::new((0..total).map(|_| OnceLock::new()).collect());
        let latch = Arc::new(CompletionLatch::new(total));

        let handles = match self.max_workers {
            Some(pool_size) if pool_size < total => {
                Self::dispatch_pool(jobs, pool_size, &slots, &latch)?
            }
            _ => Self::dispatch_each(jobs, &slots, &latch),
        };

        if let Some(timeout) = self.join_timeout {
            if !latch.wait_timeout(timeout) {
                warn!(
                    "Task join timed out after {:?}: {}/{} jobs finished",
                    timeout,
                    latch.completed(),
                    total
                );
                // Remaining workers are detached and finish on their own
                return Err(LabError::SynchronizationTimeout {
                    completed: latch.completed(),
                    total,
                    waited: timeout,
                });
            }
        } else {
            latch.wait();
        }

        for handle in handles {
            // Job panics are caught inside the worker
            handle.join().ok();
        }

        let outcomes = slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.get().cloned().ok_or_else(|| {
                    LabError::Worker(format!("result slot {} was never written", index))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TaskResult { outcomes })
    }

    /// One thread per job
    fn dispatch_each(
        jobs: Vec<Job>,
        slots: &Slots,
        latch: &Arc<CompletionLatch>,
    ) -> Vec<thread::JoinHandle<()>> {
        let mut handles = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.into_iter().enumerate() {
            let worker_slots = Arc::clone(slots);
            let worker_latch = Arc::clone(latch);

            let spawned = thread::Builder::new()
                .name(format!("task-worker-{}", index))
                .spawn(move || execute(index, job, &worker_slots, &worker_latch));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!("Task {}: failed to spawn worker: {}", index, e);
                    record(
                        index,
                        JobOutcome {
                            elapsed: Duration::ZERO,
                            status: JobStatus::Failed(JobError::SpawnFailed(e.to_string())),
                        },
                        slots,
                        latch,
                    );
                }
            }
        }

        handles
    }

    /// Fixed pool of workers draining a shared job queue
    fn dispatch_pool(
        jobs: Vec<Job>,
        pool_size: usize,
        slots: &Slots,
        latch: &Arc<CompletionLatch>,
    ) -> Result<Vec<thread::JoinHandle<()>>> {
        let (tx, rx) = unbounded::<(usize, Job)>();
        for (index, job) in jobs.into_iter().enumerate() {
            tx.send((index, job))
                .map_err(|_| LabError::Worker("task queue closed before dispatch".to_string()))?;
        }
        // Workers stop once the queue is drained
        drop(tx);

        let mut handles = Vec::with_capacity(pool_size);
        for worker_id in 0..pool_size {
            let queue = rx.clone();
            let worker_slots = Arc::clone(slots);
            let worker_latch = Arc::clone(latch);

            let spawned = thread::Builder::new()
                .name(format!("task-pool-{}", worker_id))
                .spawn(move || {
                    for (index, job) in queue.iter() {
                        execute(index, job, &worker_slots, &worker_latch);
                    }
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("Task pool: failed to spawn worker {}: {}", worker_id, e),
            }
        }

        if handles.is_empty() {
            for (index, _job) in rx.try_iter() {
                record(
                    index,
                    JobOutcome {
                        elapsed: Duration::ZERO,
                        status: JobStatus::Failed(JobError::SpawnFailed(
                            "no pool worker could be started".to_string(),
                        )),
                    },
                    slots,
                    latch,
                );
            }
        }

        debug!("Task pool: {} workers for {} jobs", handles.len(), slots.len());
        Ok(handles)
    }
}

/// Run one job, timing it and capturing any fault into its slot
fn execute(index: usize, job: Job, slots: &Slots, latch: &CompletionLatch) {
    let start = Instant::now();
    let status = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => JobStatus::Completed,
        Ok(Err(e)) => JobStatus::Failed(e),
        Err(payload) => JobStatus::Failed(JobError::Panicked(panic_message(payload.as_ref()))),
    };
    let elapsed = start.elapsed();

    if let JobStatus::Failed(ref e) = status {
        debug!("Task {} failed after {:?}: {}", index, elapsed, e);
    }

    record(index, JobOutcome { elapsed, status }, slots, latch);
}

fn record(index: usize, outcome: JobOutcome, slots: &Slots, latch: &CompletionLatch) {
    if slots[index].set(outcome).is_ok() {
        latch.count_down();
    }
}

/// Run jobs with one thread each and wait for all of them
pub fn run_tasks(jobs: Vec<Job>) -> Result<TaskResult> {
    TaskRunner::new().run(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sleeping_job(ms: u64) -> Job {
        job(move || {
            thread::sleep(Duration::from_millis(ms));
            Ok(())
        })
    }

    #[test]
    fn test_empty_batch() {
        let result = run_tasks(Vec::new()).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
        assert_eq!(result.max_duration(), Duration::ZERO);
    }

    #[test]
    fn test_durations_are_index_aligned() {
        let jobs = vec![sleeping_job(60), sleeping_job(5), sleeping_job(30)];
        let result = run_tasks(jobs).unwrap();

        assert_eq!(result.len(), 3);
        assert!(result.get(0).unwrap().elapsed >= Duration::from_millis(60));
        assert!(result.get(1).unwrap().elapsed >= Duration::from_millis(5));
        assert!(result.get(2).unwrap().elapsed >= Duration::from_millis(30));
        assert_eq!(result.failure_count(), 0);
    }

    #[test]
    fn test_jobs_run_concurrently() {
        let jobs: Vec<Job> = (0..4).map(|_| sleeping_job(100)).collect();

        let start = Instant::now();
        let result = run_tasks(jobs).unwrap();
        let wall = start.elapsed();

        assert_eq!(result.len(), 4);
        assert!(result.total_duration() >= Duration::from_millis(400));
        assert!(wall < Duration::from_millis(400));
    }

    #[test]
    fn test_every_job_runs_once() {
        let ran = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<Job> = (0..25)
            .map(|_| {
                let ran = Arc::clone(&ran);
                job(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        let result = run_tasks(jobs).unwrap();
        assert_eq!(result.len(), 25);
        assert_eq!(ran.load(Ordering::SeqCst), 25);
    }

    #[test]
    fn test_failures_are_isolated() {
        let jobs = vec![
            sleeping_job(10),
            job(|| Err(JobError::failed("store unavailable"))),
            job(|| panic!("job exploded")),
            sleeping_job(10),
        ];

        let result = run_tasks(jobs).unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result.failure_count(), 2);
        assert_eq!(result.get(0).unwrap().status, JobStatus::Completed);
        assert_eq!(
            result.get(1).unwrap().status,
            JobStatus::Failed(JobError::failed("store unavailable"))
        );
        assert_eq!(
            result.get(2).unwrap().status,
            JobStatus::Failed(JobError::Panicked("job exploded".to_string()))
        );
        assert_eq!(result.get(3).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_bounded_pool() {
        let ran = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<Job> = (0..12)
            .map(|i| {
                let ran = Arc::clone(&ran);
                job(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                    if i == 5 {
                        return Err(JobError::failed("fifth"));
                    }
                    Ok(())
                })
            })
            .collect();

        let result = TaskRunner::new().with_max_workers(3).run(jobs).unwrap();

        assert_eq!(result.len(), 12);
        assert_eq!(ran.load(Ordering::SeqCst), 12);
        assert_eq!(result.failure_count(), 1);
        assert!(result.get(5).unwrap().status.is_failed());
    }

    #[test]
    fn test_zero_pool_rejected() {
        let result = TaskRunner::new().with_max_workers(0).run(vec![sleeping_job(1)]);
        assert!(matches!(result, Err(LabError::Config(_))));
    }

    #[test]
    fn test_join_timeout() {
        let jobs = vec![sleeping_job(1), sleeping_job(500)];
        let result = TaskRunner::new()
            .with_timeout(Duration::from_millis(50))
            .run(jobs);

        match result {
            Err(LabError::SynchronizationTimeout { total, completed, .. }) => {
                assert_eq!(total, 2);
                assert!(completed < 2);
            }
            other => panic!("expected timeout, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_generous_timeout_completes() {
        let result = TaskRunner::new()
            .with_timeout(Duration::from_secs(10))
            .run(vec![sleeping_job(5), sleeping_job(5)])
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_histogram_and_json() {
        let result = run_tasks(vec![sleeping_job(10), job(|| Err(JobError::failed("x")))]).unwrap();

        let histogram = result.histogram();
        assert_eq!(histogram.len(), 2);

        let json = result.to_json();
        assert_eq!(json["failures"], 1);
        assert_eq!(json["jobs"][1]["status"], "failed");
        assert_eq!(json["jobs"][1]["error"], "x");
        assert_eq!(json["jobs"][0]["status"], "completed");
    }
}
