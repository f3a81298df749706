//! Brightfield organoid segmentation
//!
//! Pipeline on the normalized 8-bit brightfield channel:
//! 1. Gaussian blur to suppress pixel noise
//! 2. Inverted Otsu threshold (dark organoid becomes foreground)
//! 3. Removal of debris components below an area floor (4-connectivity)
//! 4. Disk dilation followed by disk closing
//! 5. 8-connected labeling and region selection
//!
//! An image with no surviving component yields
//! [`AnalysisError::NoOrganoidDetected`], which callers treat as a skip.

use opencv::{
    core::{Mat, Size, CV_8UC1},
    imgproc,
    prelude::*,
};

use crate::config::SegmentationConfig;
use crate::constants::segmentation::{
    BLUR_KERNEL_SIZE, DEBRIS_CONNECTIVITY, MIN_OBJECT_AREA, MORPH_RADIUS, REGION_CONNECTIVITY,
};
use crate::detection::components::LabeledComponents;
use crate::detection::mask::OrganoidMask;
use crate::detection::morphology::{close_disk, dilate_disk, remove_small_objects};
use crate::detection::selection::RegionSelection;
use crate::error::{AnalysisError, Result};
use crate::preprocessing::IntensityRange;

/// Segmentation output
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    /// Mask of the selected region(s)
    pub mask: OrganoidMask,
    /// Threshold chosen by Otsu's method on the blurred image
    pub otsu_threshold: f64,
    /// Number of regions left after cleanup
    pub region_count: usize,
    /// Labels that make up `mask`
    pub selected_labels: Vec<i32>,
}

/// Segmentation engine for the structural channel
#[derive(Debug, Clone)]
pub struct OrganoidSegmenter {
    blur_kernel_size: i32,
    min_object_area: i32,
    morph_radius: i32,
    selection: RegionSelection,
}

impl Default for OrganoidSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl OrganoidSegmenter {
    /// Create a segmenter with default parameters
    pub fn new() -> Self {
        Self {
            blur_kernel_size: BLUR_KERNEL_SIZE,
            min_object_area: MIN_OBJECT_AREA,
            morph_radius: MORPH_RADIUS,
            selection: RegionSelection::default(),
        }
    }

    /// Create a segmenter with custom parameters
    pub fn with_params(
        blur_kernel_size: i32,
        min_object_area: i32,
        morph_radius: i32,
        selection: RegionSelection,
    ) -> Self {
        Self {
            blur_kernel_size,
            min_object_area,
            morph_radius,
            selection,
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::with_params(
            config.blur_kernel_size,
            config.min_object_area,
            config.morph_radius,
            config.selection,
        )
    }

    /// Segment a normalized 8-bit single-channel brightfield image
    ///
    /// # Errors
    ///
    /// - `NoOrganoidDetected` if the image has no contrast or nothing
    ///   survives cleanup
    /// - `ProcessingError` for a non 8-bit single-channel input
    /// - `OpenCvError` if an OpenCV call fails
    pub fn segment(&self, normalized: &Mat) -> Result<SegmentationResult> {
        if normalized.typ() != CV_8UC1 {
            return Err(AnalysisError::processing(format!(
                "Segmentation expects a normalized 8-bit single channel image, got type {}",
                normalized.typ()
            )));
        }

        // Otsu on a constant image would mark the whole frame as foreground
        if IntensityRange::of(normalized)?.is_flat() {
            return Err(AnalysisError::NoOrganoidDetected {
                reason: "brightfield image has no contrast".into(),
            });
        }

        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(
            normalized,
            &mut blurred,
            Size::new(self.blur_kernel_size, self.blur_kernel_size),
            0.0,
        )
        .map_err(|e| AnalysisError::opencv("gaussian blur", e))?;

        let mut binary = Mat::default();
        let otsu_threshold = imgproc::threshold(
            &blurred,
            &mut binary,
            0.0,
            255.0,
            imgproc::THRESH_BINARY_INV | imgproc::THRESH_OTSU,
        )
        .map_err(|e| AnalysisError::opencv("otsu threshold", e))?;
        log::debug!("Otsu threshold: {:.1}", otsu_threshold);

        let cleaned = remove_small_objects(&binary, self.min_object_area, DEBRIS_CONNECTIVITY)?;
        let dilated = dilate_disk(&cleaned, self.morph_radius)?;
        let closed = close_disk(&dilated, self.morph_radius)?;

        let labeled = LabeledComponents::label(&closed, REGION_CONNECTIVITY)?;
        log::debug!("{} region(s) after cleanup", labeled.len());
        if labeled.is_empty() {
            return Err(AnalysisError::NoOrganoidDetected {
                reason: format!(
                    "no region of at least {} px survived cleanup",
                    self.min_object_area
                ),
            });
        }

        let selected_labels = self
            .selection
            .select(labeled.components(), (normalized.cols(), normalized.rows()));
        if labeled.len() > 1 {
            log::debug!(
                "Selection '{}' kept label(s) {:?} of {}",
                self.selection,
                selected_labels,
                labeled.len()
            );
        }

        let mask = OrganoidMask::from_binary(&labeled.mask_of(&selected_labels)?)?;

        Ok(SegmentationResult {
            mask,
            otsu_threshold,
            region_count: labeled.len(),
            selected_labels,
        })
    }
}
