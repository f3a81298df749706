//! Command-line interface for organoid_scan
//!
//! Analyzes a single brightfield image (and optional marker image), writes
//! the mask and overlay, and prints the record as JSON.

use clap::Parser;
use organoid_scan::{analyze_pair, logging, AnalysisRecord, ImagePair, PipelineConfig};
use std::{path::PathBuf, process};

#[derive(Parser)]
#[command(name = "organoid-cli")]
#[command(about = "Measure the organoid in one brightfield image")]
struct Cli {
    /// Structural-channel image.
    brightfield: PathBuf,

    /// Marker-channel image of the same field.
    #[arg(long)]
    marker: Option<PathBuf>,

    /// Directory receiving masks/ and overlays/.
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Optional YAML or JSON file with processing parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    let _logger = match logging::setup_logging(&cli.log_level, None) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error starting logger: {}", e);
            process::exit(1);
        }
    };

    if !cli.brightfield.is_file() {
        eprintln!("Error: File '{}' does not exist", cli.brightfield.display());
        process::exit(1);
    }

    let input_root = cli
        .brightfield
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();

    let mut config = match &cli.config {
        Some(path) => match PipelineConfig::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error loading config file: {}", e);
                process::exit(1);
            }
        },
        None => PipelineConfig::new(&input_root, &cli.output),
    };
    config.input_root = input_root.clone();
    config.output_root = cli.output.clone();

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        process::exit(1);
    }

    let pair = ImagePair::new(cli.brightfield.clone(), cli.marker.clone(), &input_root);

    match analyze_pair(&pair, &config) {
        Ok(record) => print_record(&record),
        Err(error) => {
            eprintln!("Analysis failed: {}", error);
            if error.is_recoverable() {
                eprintln!("Suggestion: {}", error.user_message());
            }
            process::exit(1);
        }
    }
}

fn print_record(record: &AnalysisRecord) {
    match serde_json::to_string_pretty(record) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing record: {}", e);
            process::exit(1);
        }
    }

    eprintln!();
    eprintln!("Organoid Summary:");
    eprintln!("  Area: {:.0} px, diameter {:.1} px", record.area, record.diameter);
    eprintln!(
        "  Circularity: {:.3}, solidity {:.3}",
        record.circularity, record.solidity
    );
    if record.has_neutral_marker() {
        eprintln!("  Marker: none detected");
    } else {
        eprintln!(
            "  Marker: {} px ({:.1}% of area) in {} cluster(s)",
            record.gfp_positive_area,
            record.gfp_percent_area * 100.0,
            record.gfp_num_clusters
        );
    }
}
