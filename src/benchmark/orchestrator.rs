//! Experiment orchestrator
//!
//! Runs the configured experiments in order, collects their results, and
//! exports them.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::counter_bench::CounterBenchmark;
use super::counters::{SharedCounter, SyncMode};
use super::experiment::Experiment;
use super::parity::split_by_parity;
use super::pipeline::Pipeline;
use super::task_runner::{job, Job, TaskRunner};
use crate::config::{LabConfig, TaskConfig};
use crate::sync::ShutdownSignal;
use crate::utils::{JobError, LabError, Result};

/// Result summary for one experiment run
#[derive(Debug, Clone)]
pub struct ExperimentResult {
    /// Display name, e.g. `COUNTER/ATOMIC`
    pub name: String,
    /// Wall time of the run
    pub duration: Duration,
    /// Units of work per second (jobs, increments or messages)
    pub throughput: f64,
    /// Failed jobs or lost messages
    pub failures: u64,
    /// One-line human summary
    pub summary: String,
    /// Experiment-specific detail
    pub detail: serde_json::Value,
}

impl ExperimentResult {
    /// Print summary (compact format)
    pub fn print_summary(&self) {
        println!("\n=== {} ===", self.name);
        println!(
            "Throughput: {}/s | Duration: {:.3}s{}",
            format_throughput(self.throughput),
            self.duration.as_secs_f64(),
            if self.failures > 0 {
                format!(" | Failures: {}", self.failures)
            } else {
                String::new()
            }
        );
        println!("{}", self.summary);
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "duration_secs": self.duration.as_secs_f64(),
            "throughput": self.throughput,
            "failures": self.failures,
            "detail": self.detail,
        })
    }
}

/// Experiment orchestrator
pub struct Orchestrator {
    config: Arc<LabConfig>,
}

impl Orchestrator {
    pub fn new(config: LabConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Run all configured experiments
    pub fn run_all(&self) -> Result<Vec<ExperimentResult>> {
        let mut results = Vec::new();

        for &experiment in &self.config.experiments {
            if !self.config.quiet {
                println!("\nRunning experiment: {}", experiment);
            }
            for result in self.run_experiment(experiment)? {
                if !self.config.quiet {
                    result.print_summary();
                }
                results.push(result);
            }
        }

        Ok(results)
    }

    /// Run a single experiment; the counter yields one result per mode.
    ///
    /// A join that exceeds the timeout becomes a failed result so the
    /// remaining experiments still run; other errors abort.
    pub fn run_experiment(&self, experiment: Experiment) -> Result<Vec<ExperimentResult>> {
        match experiment {
            Experiment::Tasks => Ok(vec![timed_out_as_failure(
                Experiment::Tasks.as_str().to_string(),
                self.run_tasks(),
            )?]),
            Experiment::Counter => self
                .config
                .modes
                .iter()
                .map(|&mode| {
                    timed_out_as_failure(
                        format!("{}/{}", Experiment::Counter.as_str(), mode.as_str()),
                        self.run_counter(mode),
                    )
                })
                .collect(),
            Experiment::Pipeline => Ok(vec![self.run_pipeline()?]),
            Experiment::Parity => Ok(vec![self.run_parity()?]),
        }
    }

    fn run_tasks(&self) -> Result<ExperimentResult> {
        let tasks = &self.config.tasks;
        let jobs = build_jobs(tasks, self.config.seed);

        let mut runner = TaskRunner::new();
        if let Some(max_workers) = tasks.max_workers {
            runner = runner.with_max_workers(max_workers);
        }
        if let Some(timeout) = self.config.join_timeout {
            runner = runner.with_timeout(timeout);
        }

        info!(
            "Dispatching {} jobs ({})",
            tasks.jobs,
            tasks
                .max_workers
                .map(|n| format!("pool of {}", n))
                .unwrap_or_else(|| "one worker per job".to_string())
        );

        let start_time = Instant::now();
        let result = runner.run(jobs)?;
        let duration = start_time.elapsed();

        let histogram = result.histogram();
        let summary = format!(
            "Jobs: {} | Job latency (ms): p50={:.2} p99={:.2} max={:.2} | Sum of job time: {:.3}s",
            result.len(),
            histogram.value_at_percentile(50.0) as f64 / 1000.0,
            histogram.value_at_percentile(99.0) as f64 / 1000.0,
            result.max_duration().as_secs_f64() * 1000.0,
            result.total_duration().as_secs_f64()
        );

        Ok(ExperimentResult {
            name: Experiment::Tasks.as_str().to_string(),
            duration,
            throughput: per_second(result.len() as u64, duration),
            failures: result.failure_count() as u64,
            summary,
            detail: result.to_json(),
        })
    }

    fn run_counter(&self, mode: SyncMode) -> Result<ExperimentResult> {
        let mut bench = CounterBenchmark::new(mode, self.config.workers, self.config.increments);
        if let Some(timeout) = self.config.join_timeout {
            bench = bench.with_timeout(timeout);
        }

        info!(
            "{} counter: {} workers x {} increments",
            mode, self.config.workers, self.config.increments
        );

        // Progress reporting (if not quiet)
        let shutdown = ShutdownSignal::new();
        let reporter = if !self.config.quiet {
            let progress = bench.progress_counter();
            let total = bench.expected().unwrap_or(u64::MAX);
            let stop = shutdown.clone();
            thread::Builder::new()
                .name("counter-progress".to_string())
                .spawn(move || report_progress(&progress, total, &stop))
                .map_err(|e| warn!("Progress reporter unavailable: {}", e))
                .ok()
        } else {
            None
        };

        let outcome = bench.run();

        // Signal shutdown to progress reporter
        shutdown.signal();
        if let Some(handle) = reporter {
            handle.join().ok();
        }

        let report = outcome?;
        let summary = format!(
            "Final count: {} (expected {}) | {} workers x {} increments",
            format_count(report.final_count),
            format_count(report.expected),
            report.workers,
            report.increments_per_worker
        );

        Ok(ExperimentResult {
            name: format!("{}/{}", Experiment::Counter.as_str(), mode.as_str()),
            duration: report.elapsed,
            throughput: report.throughput,
            failures: report.expected - report.final_count.min(report.expected),
            summary,
            detail: report.to_json(),
        })
    }

    fn run_pipeline(&self) -> Result<ExperimentResult> {
        info!(
            "Pipeline: {} messages, capacity {}",
            self.config.messages, self.config.capacity
        );

        let report = Pipeline::new(self.config.capacity, self.config.messages).run()?;
        if !report.is_complete() {
            warn!(
                "Pipeline delivered {} of {} messages",
                report.consumed.len(),
                report.message_count
            );
        }

        let summary = format!(
            "Consumed: {} | In order: {} | Producer suspensions: {}",
            preview(&report.consumed),
            report.is_complete(),
            report.producer_suspensions
        );

        Ok(ExperimentResult {
            name: Experiment::Pipeline.as_str().to_string(),
            duration: report.elapsed,
            throughput: per_second(report.consumed.len() as u64, report.elapsed),
            failures: report
                .message_count
                .saturating_sub(report.consumed.len() as u64),
            summary,
            detail: report.to_json(),
        })
    }

    fn run_parity(&self) -> Result<ExperimentResult> {
        let start_time = Instant::now();
        let report = split_by_parity(self.config.parity_limit)?;
        let duration = start_time.elapsed();

        let summary = format!(
            "Odd worker: {} | Even worker: {}",
            preview(&report.odds),
            preview(&report.evens)
        );
        let detail = serde_json::to_value(&report)
            .map_err(|e| LabError::Worker(format!("Failed to encode parity report: {}", e)))?;

        Ok(ExperimentResult {
            name: Experiment::Parity.as_str().to_string(),
            duration,
            throughput: per_second(self.config.parity_limit, duration),
            failures: 0,
            summary,
            detail,
        })
    }

    /// Export results to JSON file
    pub fn export_json(&self, results: &[ExperimentResult], path: &Path) -> Result<()> {
        let json = serde_json::json!({
            "config": {
                "experiments": self.config.experiments.iter().map(|e| e.as_str()).collect::<Vec<_>>(),
                "workers": self.config.workers,
                "increments": self.config.increments,
                "capacity": self.config.capacity,
                "messages": self.config.messages,
                "jobs": self.config.tasks.jobs,
            },
            "results": results.iter().map(|r| r.to_json()).collect::<Vec<_>>(),
        });

        let text = serde_json::to_string_pretty(&json)
            .map_err(|e| LabError::Config(format!("Failed to write JSON: {}", e)))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Export results to CSV file
    pub fn export_csv(&self, results: &[ExperimentResult], path: &Path) -> Result<()> {
        use std::fs::File;
        use std::io::Write;

        let mut file = File::create(path)?;
        writeln!(file, "experiment,duration_secs,throughput,failures")?;
        for result in results {
            writeln!(
                file,
                "{},{:.6},{:.2},{}",
                result.name,
                result.duration.as_secs_f64(),
                result.throughput,
                result.failures
            )?;
        }

        Ok(())
    }
}

/// Record a join timeout as a result with the unfinished workers as failures
fn timed_out_as_failure(
    name: String,
    outcome: Result<ExperimentResult>,
) -> Result<ExperimentResult> {
    match outcome {
        Err(LabError::SynchronizationTimeout {
            completed,
            total,
            waited,
        }) => {
            warn!(
                "{}: {} of {} workers finished within {:?}",
                name, completed, total, waited
            );
            let error = LabError::SynchronizationTimeout {
                completed,
                total,
                waited,
            }
            .to_string();
            Ok(ExperimentResult {
                name,
                duration: waited,
                throughput: 0.0,
                failures: total.saturating_sub(completed) as u64,
                summary: format!("Timed out: {}", error),
                detail: serde_json::json!({
                    "error": error,
                    "completed": completed,
                    "total": total,
                    "waited_secs": waited.as_secs_f64(),
                }),
            })
        }
        other => other,
    }
}

/// Synthetic jobs: each sleeps `delay_ms` plus seeded jitter, every
/// `fail_every`-th one reports a failure
fn build_jobs(tasks: &TaskConfig, seed: u64) -> Vec<Job> {
    let mut rng = fastrand::Rng::with_seed(seed);

    (0..tasks.jobs)
        .map(|index| {
            let jitter = if tasks.jitter_ms > 0 {
                rng.u64(0..=tasks.jitter_ms)
            } else {
                0
            };
            let sleep = Duration::from_millis(tasks.delay_ms.saturating_add(jitter));
            let fail = tasks.fail_every > 0 && (index + 1) % tasks.fail_every == 0;

            job(move || {
                thread::sleep(sleep);
                if fail {
                    return Err(JobError::failed(format!("synthetic failure in job {}", index)));
                }
                Ok(())
            })
        })
        .collect()
}

/// Poll the counter and drive a progress bar until done or shut down
fn report_progress(progress: &SharedCounter, total: u64, shutdown: &ShutdownSignal) {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let start = Instant::now();
    let mut last_value = 0u64;
    let mut last_time = start;

    while !shutdown.is_signaled() {
        let value = progress.value();
        pb.set_position(value);

        let now = Instant::now();
        let interval = now.duration_since(last_time).as_secs_f64();
        if interval >= 0.5 {
            let rate = (value - last_value) as f64 / interval;
            pb.set_message(format!("{}/s", format_count(rate as u64)));
            last_value = value;
            last_time = now;
        }

        if value >= total {
            break;
        }

        thread::sleep(Duration::from_millis(50));
    }

    pb.set_position(progress.value());
    pb.finish_with_message("done");
}

fn per_second(units: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        units as f64 / secs
    } else {
        0.0
    }
}

/// First few values of a sequence, e.g. `[1, 2, 3, ... 10]`
fn preview(values: &[u64]) -> String {
    const SHOWN: usize = 8;
    if values.len() <= SHOWN {
        return format!("{:?}", values);
    }
    let head = values[..SHOWN - 1]
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}, ... {}] ({} values)", head, values[values.len() - 1], values.len())
}

/// Whole units per second, grouped by thousands (fraction dropped)
pub fn format_throughput(throughput: f64) -> String {
    let value = throughput as u64;
    format_count(value)
}

/// Decimal digits with a comma every three places, e.g. `10,000`
pub fn format_count(value: u64) -> String {
    let s = value.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}
