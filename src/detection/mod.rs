//! Organoid detection module
//!
//! Turns a normalized brightfield image into a binary organoid mask:
//! thresholding, debris removal, morphological cleanup, connected-component
//! labeling and region selection.

pub mod components;
pub mod mask;
pub mod morphology;
pub mod segmentation;
pub mod selection;

pub use components::{ComponentStats, LabeledComponents};
pub use mask::OrganoidMask;
pub use segmentation::{OrganoidSegmenter, SegmentationResult};
pub use selection::RegionSelection;
