//! Command-line argument parsing
//!
//! Arguments are grouped by experiment for clarity.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::benchmark::SyncMode;

/// Concurrency experiments: task fan-out, shared counters, channel pipelines
#[derive(Parser, Debug, Clone)]
#[command(name = "concurrency-lab")]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    // ===== Experiment Selection =====
    /// Experiments to run (tasks, counter, pipeline, parity)
    #[arg(short = 'e', long = "experiments", value_delimiter = ',')]
    pub experiments: Option<Vec<String>>,

    // ===== Task Runner =====
    /// Number of synthetic jobs
    #[arg(long = "jobs", default_value_t = 3)]
    pub jobs: usize,

    /// Base sleep per job in milliseconds
    #[arg(long = "job-delay-ms", default_value_t = 200)]
    pub job_delay_ms: u64,

    /// Maximum extra random sleep per job in milliseconds
    #[arg(long = "job-jitter-ms", default_value_t = 20)]
    pub job_jitter_ms: u64,

    /// Make every n-th job fail (0 = never)
    #[arg(long = "fail-every", default_value_t = 0)]
    pub fail_every: usize,

    /// Bound the task worker pool (default: one thread per job)
    #[arg(long = "max-workers")]
    pub max_workers: Option<usize>,

    // ===== Shared Counter =====
    /// Synchronization discipline for the shared counter
    #[arg(long = "mode", value_enum, default_value_t = SyncModeArg::Both)]
    pub mode: SyncModeArg,

    /// Number of concurrent counter workers
    #[arg(short = 'w', long = "workers", default_value_t = 10)]
    pub workers: usize,

    /// Increments performed by each counter worker
    #[arg(short = 'k', long = "increments", default_value_t = 1000)]
    pub increments: u64,

    // ===== Pipeline =====
    /// Channel capacity (0 = unbuffered rendezvous)
    #[arg(short = 'c', long = "capacity", default_value_t = 0)]
    pub capacity: usize,

    /// Number of messages the producer emits
    #[arg(short = 'm', long = "messages", default_value_t = 10)]
    pub messages: u64,

    // ===== Parity =====
    /// Upper bound of the range split between the odd and even workers
    #[arg(long = "parity-limit", default_value_t = 10)]
    pub parity_limit: u64,

    // ===== Control =====
    /// Join timeout in milliseconds for task and counter workers
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Random seed for job jitter
    #[arg(long = "seed", default_value_t = 12345)]
    pub seed: u64,

    // ===== Output =====
    /// Write results as JSON to this file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Write results as CSV to this file
    #[arg(long = "csv")]
    pub csv_output: Option<PathBuf>,

    /// Only print errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Counter discipline selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncModeArg {
    Locked,
    Atomic,
    #[default]
    Both,
}

impl SyncModeArg {
    /// Modes to run, in order
    pub fn modes(&self) -> Vec<SyncMode> {
        match self {
            SyncModeArg::Locked => vec![SyncMode::Locked],
            SyncModeArg::Atomic => vec![SyncMode::Atomic],
            SyncModeArg::Both => vec![SyncMode::Locked, SyncMode::Atomic],
        }
    }
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.quiet && self.verbose {
            return Err("--quiet and --verbose are mutually exclusive".to_string());
        }

        if self.max_workers == Some(0) {
            return Err("--max-workers must be at least 1".to_string());
        }

        if (self.workers as u64).checked_mul(self.increments).is_none() {
            return Err("--workers x --increments overflows the counter".to_string());
        }

        if self.timeout_ms == Some(0) {
            return Err("--timeout-ms must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = CliArgs::parse_from(["test"]);
        assert_eq!(args.jobs, 3);
        assert_eq!(args.workers, 10);
        assert_eq!(args.increments, 1000);
        assert_eq!(args.capacity, 0);
        assert_eq!(args.mode, SyncModeArg::Both);
        assert!(args.experiments.is_none());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_experiment_list() {
        let args = CliArgs::parse_from(["test", "-e", "counter,pipeline"]);
        assert_eq!(
            args.experiments,
            Some(vec!["counter".to_string(), "pipeline".to_string()])
        );
    }

    #[test]
    fn test_counter_args() {
        let args = CliArgs::parse_from(["test", "--mode", "atomic", "-w", "4", "-k", "50"]);
        assert_eq!(args.mode.modes(), vec![SyncMode::Atomic]);
        assert_eq!(args.workers, 4);
        assert_eq!(args.increments, 50);
    }

    #[test]
    fn test_validation_zero_pool() {
        let args = CliArgs::parse_from(["test", "--max-workers", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_quiet_verbose() {
        let args = CliArgs::parse_from(["test", "-q", "-v"]);
        assert!(args.validate().is_err());
    }
}
