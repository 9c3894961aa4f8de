//! Lab configuration derived from CLI arguments

use super::cli::CliArgs;
use crate::benchmark::{Experiment, SyncMode};
use std::path::PathBuf;
use std::time::Duration;

/// Synthetic job batch for the task experiment
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub jobs: usize,
    pub delay_ms: u64,
    pub jitter_ms: u64,
    pub fail_every: usize,
    pub max_workers: Option<usize>,
}

/// Complete lab configuration
#[derive(Debug, Clone)]
pub struct LabConfig {
    pub experiments: Vec<Experiment>,

    // Task runner
    pub tasks: TaskConfig,

    // Shared counter
    pub modes: Vec<SyncMode>,
    pub workers: usize,
    pub increments: u64,

    // Pipeline
    pub capacity: usize,
    pub messages: u64,

    // Parity
    pub parity_limit: u64,

    // Control
    pub join_timeout: Option<Duration>,
    pub seed: u64,

    // Output
    pub output_path: Option<PathBuf>,
    pub csv_output: Option<PathBuf>,
    pub quiet: bool,
    pub verbose: bool,
}

impl LabConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        args.validate()?;

        let names = args.experiments.clone().unwrap_or_else(|| {
            vec![
                "tasks".to_string(),
                "counter".to_string(),
                "pipeline".to_string(),
            ]
        });

        let mut experiments = Vec::with_capacity(names.len());
        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            let experiment =
                Experiment::parse(name).ok_or_else(|| format!("Unknown experiment: {}", name))?;
            if !experiments.contains(&experiment) {
                experiments.push(experiment);
            }
        }
        if experiments.is_empty() {
            return Err("No experiments selected".to_string());
        }

        Ok(Self {
            experiments,

            tasks: TaskConfig {
                jobs: args.jobs,
                delay_ms: args.job_delay_ms,
                jitter_ms: args.job_jitter_ms,
                fail_every: args.fail_every,
                max_workers: args.max_workers,
            },

            modes: args.mode.modes(),
            workers: args.workers,
            increments: args.increments,

            capacity: args.capacity,
            messages: args.messages,

            parity_limit: args.parity_limit,

            join_timeout: args.timeout_ms.map(Duration::from_millis),
            seed: args.seed,

            output_path: args.output.clone(),
            csv_output: args.csv_output.clone(),
            quiet: args.quiet,
            verbose: args.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_experiments() {
        let config = LabConfig::from_cli(&CliArgs::parse_from(["test"])).unwrap();
        assert_eq!(
            config.experiments,
            vec![Experiment::Tasks, Experiment::Counter, Experiment::Pipeline]
        );
        assert_eq!(config.modes, vec![SyncMode::Locked, SyncMode::Atomic]);
        assert!(config.join_timeout.is_none());
    }

    #[test]
    fn test_duplicate_experiments_collapsed() {
        let args = CliArgs::parse_from(["test", "-e", "parity,parity,tasks"]);
        let config = LabConfig::from_cli(&args).unwrap();
        assert_eq!(config.experiments, vec![Experiment::Parity, Experiment::Tasks]);
    }

    #[test]
    fn test_unknown_experiment() {
        let args = CliArgs::parse_from(["test", "-e", "tasks,blockchain"]);
        let err = LabConfig::from_cli(&args).unwrap_err();
        assert!(err.contains("blockchain"));
    }

    #[test]
    fn test_timeout_resolved() {
        let args = CliArgs::parse_from(["test", "--timeout-ms", "250"]);
        let config = LabConfig::from_cli(&args).unwrap();
        assert_eq!(config.join_timeout, Some(Duration::from_millis(250)));
    }
}
