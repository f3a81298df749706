//! Visual output module

pub mod overlay;

pub use overlay::{bgr_scalar, OverlayRenderer};
