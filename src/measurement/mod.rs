//! Organoid measurement module
//!
//! Shape descriptors of the organoid mask and marker-channel statistics
//! restricted to it.

pub mod fluorescence;
pub mod geometry;

pub use fluorescence::{FluorescenceQuantifier, MarkerAnalysis, MarkerMetrics};
pub use geometry::{BoundingBox, GeometryExtractor, RegionProperties};
