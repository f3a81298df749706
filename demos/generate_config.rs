//! Generate a default configuration file
//!
//! Writes YAML unless the target path ends in `.json`.

use clap::Parser;
use organoid_scan::PipelineConfig;
use std::{path::PathBuf, process};

#[derive(Parser)]
#[command(name = "generate-config")]
#[command(about = "Write a configuration file with every default parameter")]
struct Cli {
    /// Target file (.yml, .yaml or .json).
    #[arg(default_value = "config.yml")]
    path: PathBuf,

    /// Input root to record in the file.
    #[arg(long, default_value = "data")]
    input: PathBuf,

    /// Output root to record in the file.
    #[arg(long, default_value = "results")]
    output: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    if let Some(parent) = cli.path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating directory: {}", e);
            process::exit(1);
        }
    }

    let config = PipelineConfig::new(&cli.input, &cli.output);
    let is_json = cli
        .path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let saved = if is_json {
        config.to_json_file(&cli.path)
    } else {
        config.to_yaml_file(&cli.path)
    };

    match saved {
        Ok(()) => {
            eprintln!("Configuration saved to {}", cli.path.display());
            eprintln!();
            eprintln!("Config summary:");
            eprintln!("  Input:  {}", config.input_root.display());
            eprintln!("  Output: {}", config.output_root.display());
            eprintln!("  Threads: {}", config.threads);
            eprintln!(
                "  Segmentation: blur {}, min area {} px, disk radius {}, selection {}",
                config.segmentation.blur_kernel_size,
                config.segmentation.min_object_area,
                config.segmentation.morph_radius,
                config.segmentation.selection
            );
            eprintln!(
                "  Marker: percentiles {:.0}-{:.0}, threshold {:.2}",
                config.fluorescence.percentile_low,
                config.fluorescence.percentile_high,
                config.fluorescence.positive_threshold
            );
        }
        Err(e) => {
            eprintln!("Error saving config: {}", e);
            process::exit(1);
        }
    }
}
