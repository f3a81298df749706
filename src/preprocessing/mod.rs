//! Channel preprocessing module
//!
//! Rescales raw microscopy frames of arbitrary bit depth into the 8-bit
//! working range used by segmentation and rendering.

pub mod normalize;

pub use normalize::{ChannelNormalizer, IntensityRange};
