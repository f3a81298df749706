//! Batch CLI for organoid_scan
//!
//! Processes every brightfield image under the configured input root and
//! writes the aggregate CSV to the output root.

use clap::Parser;
use organoid_scan::{logging, BatchOrchestrator, PipelineConfig, RegionSelection, ThreadCount};
use std::{path::PathBuf, process};

#[derive(Parser)]
#[command(name = "organoid-batch")]
#[command(about = "Segment and measure organoids across a directory tree")]
struct Cli {
    /// YAML or JSON configuration file.
    #[arg(default_value = "config.yml")]
    config: PathBuf,

    /// Override the input root.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Override the output root.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Worker count or "auto".
    #[arg(long)]
    threads: Option<ThreadCount>,

    /// Skip marker-channel analysis.
    #[arg(long)]
    no_gfp: bool,

    /// Region selection policy (largest, union, first_label, closest_to_center).
    /// Use "union" to reproduce tables from the legacy batch script.
    #[arg(long)]
    selection: Option<RegionSelection>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write rotating log files into this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let _logger = match logging::setup_logging(&cli.log_level, cli.log_dir.as_deref()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error starting logger: {}", e);
            process::exit(1);
        }
    };

    if !cli.config.exists() {
        eprintln!("Error: Config file '{}' does not exist", cli.config.display());
        process::exit(1);
    }

    let mut config = match PipelineConfig::from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config file: {}", e);
            process::exit(1);
        }
    };

    if let Some(input) = cli.input {
        config.input_root = input;
    }
    if let Some(output) = cli.output {
        config.output_root = output;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if cli.no_gfp {
        config.use_gfp = false;
    }
    if let Some(selection) = cli.selection {
        config.segmentation.selection = selection;
    }

    eprintln!("Loaded configuration from {}", cli.config.display());
    eprintln!("Input root: {}", config.input_root.display());
    eprintln!("Output root: {}", config.output_root.display());
    eprintln!();

    let orchestrator = match BatchOrchestrator::new(config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            eprintln!("Suggestion: {}", e.user_message());
            process::exit(1);
        }
    };

    match orchestrator.run() {
        Ok(result) => {
            let no_organoid = result.failures.iter().filter(|f| f.no_organoid).count();
            eprintln!();
            eprintln!("Batch processing complete:");
            eprintln!("  Submitted: {}", result.submitted);
            eprintln!("  Measured: {}", result.records.len());
            eprintln!("  No organoid: {}", no_organoid);
            eprintln!("  Errors: {}", result.failures.len() - no_organoid);
            eprintln!(
                "  Results saved to: {}",
                orchestrator.config().results_path().display()
            );
        }
        Err(e) => {
            eprintln!("Batch failed: {}", e);
            process::exit(1);
        }
    }
}
