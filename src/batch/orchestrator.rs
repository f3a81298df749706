//! Bounded-concurrency batch execution
//!
//! Every image pair is an independent task on a fixed-size rayon pool. Tasks
//! report through a channel; the calling thread is the single collection
//! point and blocks only while outcomes are outstanding. A failed or
//! panicking task is logged and left out of the records, never aborting
//! its siblings.

use rayon::ThreadPoolBuilder;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use crate::batch::discovery::{collect_image_pairs, ImagePair};
use crate::batch::report::write_results_csv;
use crate::config::PipelineConfig;
use crate::error::{AnalysisError, Result};
use crate::pipeline::PairPipeline;
use crate::AnalysisRecord;

/// A pair that produced no record
#[derive(Debug, Clone, PartialEq)]
pub struct PairFailure {
    /// Brightfield path relative to the input root
    pub filename: PathBuf,
    pub reason: String,
    /// True for the expected "no organoid" outcome
    pub no_organoid: bool,
}

/// Outcome of a whole run
///
/// `records` are in completion order.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub records: Vec<AnalysisRecord>,
    pub failures: Vec<PairFailure>,
    pub submitted: usize,
}

impl BatchResult {
    /// Records sorted by filename, for order-independent comparison and output
    pub fn sorted_records(&self) -> Vec<AnalysisRecord> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| a.filename.cmp(&b.filename));
        records
    }
}

struct TaskOutcome {
    filename: PathBuf,
    result: std::result::Result<Result<AnalysisRecord>, String>,
}

/// Batch orchestrator
pub struct BatchOrchestrator {
    config: PipelineConfig,
    pipeline: Arc<PairPipeline>,
    threads: usize,
}

impl BatchOrchestrator {
    /// Validate the configuration and prepare the shared pipeline
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an invalid configuration.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let threads = config.threads.resolve();
        let pipeline = Arc::new(PairPipeline::from_config(&config));
        Ok(Self {
            config,
            pipeline,
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Discover pairs, process them and write the result table
    pub fn run(&self) -> Result<BatchResult> {
        let pairs = collect_image_pairs(
            &self.config.input_root,
            &self.config.naming,
            self.config.use_gfp,
        )?;
        let result = self.execute(pairs)?;
        write_results_csv(&self.config.results_path(), &result.sorted_records())?;
        Ok(result)
    }

    /// Process `pairs` on the worker pool and collect every outcome
    ///
    /// # Errors
    ///
    /// Only fails if the pool cannot be created; per-pair errors are
    /// reported in [`BatchResult::failures`].
    pub fn execute(&self, pairs: Vec<ImagePair>) -> Result<BatchResult> {
        let pipeline = Arc::clone(&self.pipeline);
        self.execute_with(pairs, move |pair| pipeline.process_pair(pair))
    }

    /// Run `unit` once per pair on the worker pool
    fn execute_with<F>(&self, pairs: Vec<ImagePair>, unit: F) -> Result<BatchResult>
    where
        F: Fn(&ImagePair) -> Result<AnalysisRecord> + Send + Sync + 'static,
    {
        let submitted = pairs.len();
        log::info!(
            "Processing {} pair(s) with {} worker thread(s)",
            submitted,
            self.threads
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("organoid-worker-{}", i))
            .build()
            .map_err(|e| AnalysisError::processing(format!("Failed to build worker pool: {}", e)))?;

        let unit = Arc::new(unit);
        let (tx, rx) = mpsc::channel::<TaskOutcome>();
        for pair in pairs {
            let tx = tx.clone();
            let unit = Arc::clone(&unit);
            pool.spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| unit(&pair)))
                    .map_err(|payload| panic_message(payload.as_ref()));
                // receiver outlives every task
                let _ = tx.send(TaskOutcome {
                    filename: pair.relative_path,
                    result,
                });
            });
        }
        drop(tx);

        let mut batch = BatchResult {
            submitted,
            ..BatchResult::default()
        };
        for (done, outcome) in rx.iter().enumerate() {
            log::info!("[{}/{}] {}", done + 1, submitted, outcome.filename.display());
            match outcome.result {
                Ok(Ok(record)) => batch.records.push(record),
                Ok(Err(err)) => {
                    log::warn!("Skipping {}: {}", outcome.filename.display(), err);
                    batch.failures.push(PairFailure {
                        filename: outcome.filename,
                        reason: err.to_string(),
                        no_organoid: err.is_no_organoid(),
                    });
                }
                Err(message) => {
                    log::error!("Worker panicked on {}: {}", outcome.filename.display(), message);
                    batch.failures.push(PairFailure {
                        filename: outcome.filename,
                        reason: format!("worker panicked: {}", message),
                        no_organoid: false,
                    });
                }
            }
        }

        log::info!(
            "Batch finished: {} record(s), {} skipped, {} submitted",
            batch.records.len(),
            batch.failures.len(),
            submitted
        );
        Ok(batch)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
