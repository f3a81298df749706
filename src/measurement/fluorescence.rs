//! Marker-channel quantification inside the organoid
//!
//! The marker image is rescaled to [0, 1] between the low and high
//! percentiles of the intensities found inside the organoid mask, so a few
//! hot pixels cannot stretch the range. Pixels above the positivity
//! threshold form the positive mask; its 8-connected components are the
//! marker clusters.
//!
//! When the two percentiles coincide (sparse signal on a uniform background)
//! the rescale degenerates to a step: pixels above the bound clip to 1, the
//! rest to 0. Every "nothing to measure" path (no marker image, no positive
//! pixel) yields zeroed metrics instead of NaN.

use opencv::{
    core::{Mat, Scalar, CV_64F, CV_8UC1},
    prelude::*,
};
use serde::Serialize;

use crate::config::FluorescenceConfig;
use crate::constants::fluorescence::{
    CLUSTER_CONNECTIVITY, PERCENTILE_HIGH, PERCENTILE_LOW, POSITIVE_THRESHOLD,
};
use crate::detection::mask::MASK_ON;
use crate::detection::{LabeledComponents, OrganoidMask};
use crate::error::{AnalysisError, Result};
use crate::image_loader::to_single_channel;

/// Marker statistics over the positive pixels of one organoid
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MarkerMetrics {
    /// Number of positive pixels
    pub positive_area: u64,
    /// Positive pixels as a fraction of the organoid area
    pub percent_area: f64,
    pub mean_intensity: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub total_intensity: f64,
    pub num_clusters: usize,
    /// Mean distance from cluster centroids to the organoid centroid
    pub mean_distance_to_centroid: f64,
}

/// Quantification output
#[derive(Debug, Clone, Default)]
pub struct MarkerAnalysis {
    pub metrics: MarkerMetrics,
    /// Positive pixels (0/255), absent when no marker image was supplied
    pub positive_mask: Option<Mat>,
    /// Raw intensities used as 0 and 1 of the normalized scale
    pub percentile_bounds: Option<(f64, f64)>,
}

/// Fluorescence quantifier
#[derive(Debug, Clone)]
pub struct FluorescenceQuantifier {
    percentile_low: f64,
    percentile_high: f64,
    positive_threshold: f64,
}

impl Default for FluorescenceQuantifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FluorescenceQuantifier {
    /// Create a quantifier with default parameters
    pub fn new() -> Self {
        Self {
            percentile_low: PERCENTILE_LOW,
            percentile_high: PERCENTILE_HIGH,
            positive_threshold: POSITIVE_THRESHOLD,
        }
    }

    /// Create a quantifier with custom parameters
    pub fn with_params(percentile_low: f64, percentile_high: f64, positive_threshold: f64) -> Self {
        Self {
            percentile_low,
            percentile_high,
            positive_threshold,
        }
    }

    pub fn from_config(config: &FluorescenceConfig) -> Self {
        Self::with_params(
            config.percentile_low,
            config.percentile_high,
            config.positive_threshold,
        )
    }

    /// Quantify the marker channel restricted to the organoid
    ///
    /// # Arguments
    ///
    /// * `marker` - Raw marker image, any bit depth, or `None` when the pair has none
    /// * `mask` - Organoid mask
    /// * `centroid` - Organoid centroid as (x, y)
    /// * `organoid_area` - Organoid pixel count
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::DimensionMismatch` if the marker image does not
    /// have the mask's dimensions.
    pub fn quantify(
        &self,
        marker: Option<&Mat>,
        mask: &OrganoidMask,
        centroid: (f64, f64),
        organoid_area: f64,
    ) -> Result<MarkerAnalysis> {
        let marker = match marker {
            Some(m) => m,
            None => return Ok(MarkerAnalysis::default()),
        };

        let (width, height) = (mask.width(), mask.height());
        if marker.cols() != width || marker.rows() != height {
            return Err(AnalysisError::DimensionMismatch {
                expected: (width, height),
                actual: (marker.cols(), marker.rows()),
            });
        }

        let gray = to_single_channel(marker)?;
        let mut samples = Mat::default();
        gray.convert_to(&mut samples, CV_64F, 1.0, 0.0)
            .map_err(|e| AnalysisError::opencv("marker to float", e))?;
        let samples = samples
            .data_typed::<f64>()
            .map_err(|e| AnalysisError::opencv("read marker samples", e))?;
        let inside = mask.pixels()?;

        let mut positive_mask =
            Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::all(0.0))
                .map_err(|e| AnalysisError::opencv("allocate positive mask", e))?;

        // Step 1: percentile bounds over organoid pixels
        let mut values: Vec<f64> = samples
            .iter()
            .zip(inside)
            .filter(|(_, &m)| m != 0)
            .map(|(&v, _)| v)
            .collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let low = percentile(&values, self.percentile_low);
        let high = percentile(&values, self.percentile_high);
        let range = high - low;
        log::debug!(
            "Marker percentiles p{}={:.2} p{}={:.2}",
            self.percentile_low,
            low,
            self.percentile_high,
            high
        );

        if values.is_empty() {
            return Ok(MarkerAnalysis {
                metrics: MarkerMetrics::default(),
                positive_mask: Some(positive_mask),
                percentile_bounds: Some((low, high)),
            });
        }
        let collapsed = range.is_nan() || range <= 0.0;
        if collapsed {
            log::debug!("Marker percentiles coincide; only pixels above {:.2} are positive", high);
        }

        // Step 2-3: clip-normalize and threshold inside the mask
        let mut positive_values = Vec::new();
        {
            let positive = positive_mask
                .data_typed_mut::<u8>()
                .map_err(|e| AnalysisError::opencv("write positive mask", e))?;
            for ((px, &raw), &m) in positive.iter_mut().zip(samples).zip(inside) {
                if m == 0 {
                    continue;
                }
                // a collapsed range clips everything above it to 1
                let norm = if collapsed {
                    if raw > high {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    ((raw - low) / range).clamp(0.0, 1.0)
                };
                if norm > self.positive_threshold {
                    *px = MASK_ON;
                    positive_values.push(norm);
                }
            }
        }

        if positive_values.is_empty() {
            return Ok(MarkerAnalysis {
                metrics: MarkerMetrics::default(),
                positive_mask: Some(positive_mask),
                percentile_bounds: Some((low, high)),
            });
        }

        // Step 4: intensity statistics over positive pixels
        let n = positive_values.len() as f64;
        let total_intensity: f64 = positive_values.iter().sum();
        let mean_intensity = total_intensity / n;
        let variance = positive_values
            .iter()
            .map(|v| (v - mean_intensity).powi(2))
            .sum::<f64>()
            / n;

        // Step 5: clusters and their spread around the organoid centroid
        let clusters = LabeledComponents::label(&positive_mask, CLUSTER_CONNECTIVITY)?;
        let mean_distance_to_centroid = if clusters.is_empty() {
            0.0
        } else {
            clusters
                .components()
                .iter()
                .map(|c| (c.centroid.0 - centroid.0).hypot(c.centroid.1 - centroid.1))
                .sum::<f64>()
                / clusters.len() as f64
        };

        let percent_area = if organoid_area > 0.0 {
            (n / organoid_area).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok(MarkerAnalysis {
            metrics: MarkerMetrics {
                positive_area: positive_values.len() as u64,
                percent_area,
                mean_intensity,
                std_dev: variance.sqrt(),
                total_intensity,
                num_clusters: clusters.len(),
                mean_distance_to_centroid,
            },
            positive_mask: Some(positive_mask),
            percentile_bounds: Some((low, high)),
        })
    }
}

/// Percentile `q` (0-100) of ascending `sorted` values, linearly interpolated
/// between closest ranks. Empty input yields 0.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}
