//! Batch processing module
//!
//! Discovers image pairs under the input root, fans them out over a bounded
//! worker pool and persists the aggregate table.

pub mod discovery;
pub mod orchestrator;
pub mod report;

pub use discovery::{collect_image_pairs, ImagePair};
pub use orchestrator::{BatchOrchestrator, BatchResult, PairFailure};
pub use report::write_results_csv;
