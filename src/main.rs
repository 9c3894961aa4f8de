//! concurrency-lab - concurrency experiments from the command line
//!
//! Runs timed task fan-out, shared-counter contention (lock vs atomic),
//! producer/consumer pipelines and the parity split, then prints and
//! optionally exports the results.

use anyhow::Result;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use concurrency_lab::benchmark::Orchestrator;
use concurrency_lab::config::{CliArgs, LabConfig};

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn print_banner(config: &LabConfig) {
    if config.quiet {
        return;
    }

    println!("concurrency-lab v{}", env!("CARGO_PKG_VERSION"));
    println!("====================================");
    println!(
        "Experiments: {}",
        config
            .experiments
            .iter()
            .map(|e| e.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "Tasks: {} jobs, {}ms (+{}ms jitter){}",
        config.tasks.jobs,
        config.tasks.delay_ms,
        config.tasks.jitter_ms,
        config
            .tasks
            .max_workers
            .map(|n| format!(", pool {}", n))
            .unwrap_or_default()
    );
    println!(
        "Counter: {} workers x {} increments, modes {:?}",
        config.workers, config.increments, config.modes
    );
    println!(
        "Pipeline: {} messages, capacity {}",
        config.messages, config.capacity
    );
    if let Some(timeout) = config.join_timeout {
        println!("Join timeout: {:?}", timeout);
    }
    println!("====================================");
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse_args();

    // Setup logging
    setup_logging(args.verbose, args.quiet);

    // Build configuration
    let config =
        LabConfig::from_cli(&args).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    print_banner(&config);

    let orchestrator = Orchestrator::new(config.clone());
    let results = orchestrator.run_all()?;

    // Export to JSON if requested
    if let Some(ref output_path) = config.output_path {
        info!("Writing results to: {:?}", output_path);
        orchestrator.export_json(&results, output_path)?;
    }

    // Export to CSV if requested
    if let Some(ref csv_path) = config.csv_output {
        info!("Writing CSV to: {:?}", csv_path);
        orchestrator.export_csv(&results, csv_path)?;
    }

    if !config.quiet {
        let failures: u64 = results.iter().map(|r| r.failures).sum();
        println!("\n====================================");
        println!("EXPERIMENTS COMPLETE");
        println!("====================================");
        println!("Runs: {}", results.len());
        println!("Failures: {}", failures);
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
