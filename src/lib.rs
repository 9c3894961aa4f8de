//! concurrency-lab library
//!
//! Concurrency experiments with assertable results: timed task fan-out,
//! shared-counter contention under a lock or an atomic, and ordered
//! producer/consumer handoff over a bounded channel.

pub mod benchmark;
pub mod config;
pub mod sync;
pub mod utils;

pub use benchmark::{
    job, run_counter_benchmark, run_pipeline, run_tasks, split_by_parity, Job, JobStatus,
    SyncMode, TaskResult,
};
pub use utils::{JobError, LabError, PipelineClosed, Result};
