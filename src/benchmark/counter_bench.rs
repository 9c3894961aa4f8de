//! Shared-counter contention benchmark
//!
//! Spawns W workers that each increment one shared counter K times under a
//! single discipline, joins them all, then reads the final value.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::counters::{SharedCounter, SyncMode};
use crate::sync::CompletionLatch;
use crate::utils::{LabError, Result};

/// Outcome of one counter benchmark run
#[derive(Debug, Clone)]
pub struct CounterReport {
    pub mode: SyncMode,
    pub workers: usize,
    pub increments_per_worker: u64,
    /// Counter value read after the join
    pub final_count: u64,
    /// `workers * increments_per_worker`
    pub expected: u64,
    pub elapsed: Duration,
    /// Increments per second
    pub throughput: f64,
}

impl CounterReport {
    pub fn is_exact(&self) -> bool {
        self.final_count == self.expected
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "mode": self.mode,
            "workers": self.workers,
            "increments_per_worker": self.increments_per_worker,
            "final_count": self.final_count,
            "expected": self.expected,
            "elapsed_secs": self.elapsed.as_secs_f64(),
            "throughput": self.throughput,
        })
    }
}

/// One counter benchmark run. Consumed by `run`.
pub struct CounterBenchmark {
    counter: Arc<SharedCounter>,
    workers: usize,
    increments_per_worker: u64,
    join_timeout: Option<Duration>,
}

impl CounterBenchmark {
    pub fn new(mode: SyncMode, workers: usize, increments_per_worker: u64) -> Self {
        Self {
            counter: Arc::new(SharedCounter::new(mode)),
            workers,
            increments_per_worker,
            join_timeout: None,
        }
    }

    /// Bound the wait for all workers to finish
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = Some(timeout);
        self
    }

    /// Handle for observing the counter while the run is in progress
    pub fn progress_counter(&self) -> Arc<SharedCounter> {
        Arc::clone(&self.counter)
    }

    pub fn expected(&self) -> Option<u64> {
        (self.workers as u64).checked_mul(self.increments_per_worker)
    }

    pub fn run(self) -> Result<CounterReport> {
        let mode = self.counter.mode();
        let expected = self.expected().ok_or_else(|| {
            LabError::Config(format!(
                "{} workers x {} increments overflows the counter",
                self.workers, self.increments_per_worker
            ))
        })?;

        if expected == 0 {
            debug!(
                "{} counter: nothing to do ({} workers x {} increments)",
                mode, self.workers, self.increments_per_worker
            );
            return Ok(CounterReport {
                mode,
                workers: self.workers,
                increments_per_worker: self.increments_per_worker,
                final_count: self.counter.value(),
                expected,
                elapsed: Duration::ZERO,
                throughput: 0.0,
            });
        }

        let latch = Arc::new(CompletionLatch::new(self.workers));
        let mut handles: Vec<thread::JoinHandle<()>> = Vec::with_capacity(self.workers);

        let start_time = Instant::now();

        for worker_id in 0..self.workers {
            let counter = Arc::clone(&self.counter);
            let latch = Arc::clone(&latch);
            let increments = self.increments_per_worker;

            let spawned = thread::Builder::new()
                .name(format!("counter-worker-{}", worker_id))
                .spawn(move || {
                    let _done = latch.guard();
                    for _ in 0..increments {
                        counter.increment();
                    }
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Already running workers finish on their own; reap them first
                    for handle in handles {
                        handle.join().ok();
                    }
                    return Err(LabError::Worker(format!(
                        "failed to spawn counter worker {}: {}",
                        worker_id, e
                    )));
                }
            }
        }

        if let Some(timeout) = self.join_timeout {
            if !latch.wait_timeout(timeout) {
                return Err(LabError::SynchronizationTimeout {
                    completed: latch.completed(),
                    total: latch.total(),
                    waited: timeout,
                });
            }
        } else {
            latch.wait();
        }

        let mut panicked = 0usize;
        for handle in handles {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        let elapsed = start_time.elapsed();

        if panicked > 0 {
            return Err(LabError::Worker(format!(
                "{} of {} counter workers panicked",
                panicked, self.workers
            )));
        }

        let final_count = self.counter.value();
        if final_count != expected {
            warn!(
                "{} counter lost updates: expected {}, got {}",
                mode, expected, final_count
            );
        }

        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 {
            final_count as f64 / secs
        } else {
            0.0
        };

        debug!(
            "{} counter: {} in {:.3}ms ({:.0} incr/s)",
            mode,
            final_count,
            secs * 1000.0,
            throughput
        );

        Ok(CounterReport {
            mode,
            workers: self.workers,
            increments_per_worker: self.increments_per_worker,
            final_count,
            expected,
            elapsed,
            throughput,
        })
    }
}

/// Run a counter benchmark and return the joined final count
pub fn run_counter_benchmark(
    mode: SyncMode,
    workers: usize,
    increments_per_worker: u64,
) -> Result<u64> {
    CounterBenchmark::new(mode, workers, increments_per_worker)
        .run()
        .map(|report| report.final_count)
}
