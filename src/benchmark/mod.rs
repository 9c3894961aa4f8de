//! Concurrency experiments and their orchestration
//!
//! - TaskRunner: concurrent job fan-out with per-job timing
//! - CounterBenchmark: shared counter under LOCKED or ATOMIC discipline
//! - Pipeline: single-producer / single-consumer channel handoff
//! - split_by_parity: odd/even range split across two workers
//! - Orchestrator: runs configured experiments and exports results

pub mod counter_bench;
pub mod counters;
pub mod experiment;
pub mod orchestrator;
pub mod parity;
pub mod pipeline;
pub mod task_runner;

pub use counter_bench::{run_counter_benchmark, CounterBenchmark, CounterReport};
pub use counters::{SharedCounter, SyncMode};
pub use experiment::Experiment;
pub use orchestrator::{format_count, format_throughput, ExperimentResult, Orchestrator};
pub use parity::{split_by_parity, ParityReport};
pub use pipeline::{run_pipeline, Pipeline, PipelineReport};
pub use task_runner::{job, run_tasks, Job, JobOutcome, JobStatus, TaskResult, TaskRunner};
