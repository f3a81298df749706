//! Logger bootstrap for binaries built on this library.
//!
//! The library itself only emits records through the `log` facade; callers
//! decide where they go. `RUST_LOG` overrides the level passed in.

use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};
use std::path::Path;

use crate::error::{AnalysisError, Result};

/// Start logging to stderr, and additionally to rotating files in `log_dir`.
///
/// The returned handle must be kept alive for file output to be flushed.
pub fn setup_logging(base_level: &str, log_dir: Option<&Path>) -> Result<LoggerHandle> {
    let logger = Logger::try_with_env_or_str(base_level)
        .map_err(|e| AnalysisError::config(format!("Invalid log level '{}'", base_level), e))?;

    let logger = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .duplicate_to_stderr(Duplicate::All)
            .rotate(
                Criterion::Size(1024 * 1024), //1MB
                Naming::Timestamps,
                Cleanup::KeepLogFiles(5),
            ),
        None => logger.log_to_stderr(),
    };

    logger
        .start()
        .map_err(|e| AnalysisError::config("Logger initialization failed", e))
}
