//! Min-max channel normalization
//!
//! Maps the darkest raw sample to 0 and the brightest to 255 with a single
//! linear rescale. A flat image (min == max) maps to all zeros.

use opencv::{
    core::{self, Mat, CV_8U},
    prelude::*,
};

use crate::error::{AnalysisError, Result};
use crate::image_loader::to_single_channel;

/// Raw intensity extremes of a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityRange {
    pub min: f64,
    pub max: f64,
}

impl IntensityRange {
    /// Measure the extremes of a single-channel image
    pub fn of(image: &Mat) -> Result<Self> {
        let mut min = 0.0;
        let mut max = 0.0;
        core::min_max_loc(image, Some(&mut min), Some(&mut max), None, None, &Mat::default())
            .map_err(|e| AnalysisError::opencv("intensity range", e))?;
        Ok(Self { min, max })
    }

    /// True when every sample has the same value
    pub fn is_flat(&self) -> bool {
        self.max - self.min <= f64::EPSILON
    }
}

/// Linear rescaler from arbitrary bit depth to 8-bit
#[derive(Debug, Clone)]
pub struct ChannelNormalizer {
    out_min: f64,
    out_max: f64,
}

impl Default for ChannelNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelNormalizer {
    /// Create a normalizer targeting the full 8-bit range
    pub fn new() -> Self {
        Self {
            out_min: 0.0,
            out_max: 255.0,
        }
    }

    /// Rescale a raw image to 8-bit, converting color input to grayscale first
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::ImageLoadError` for an empty image and
    /// `AnalysisError::OpenCvError` if the rescale fails.
    pub fn normalize(&self, image: &Mat) -> Result<Mat> {
        if image.empty() {
            return Err(AnalysisError::ImageLoadError {
                message: "Empty image cannot be normalized".into(),
                source: None,
            });
        }

        let gray = to_single_channel(image)?;

        let mut normalized = Mat::default();
        core::normalize(
            &gray,
            &mut normalized,
            self.out_min,
            self.out_max,
            core::NORM_MINMAX,
            CV_8U,
            &Mat::default(),
        )
        .map_err(|e| AnalysisError::opencv("min-max normalization", e))?;

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_16UC1, CV_8UC1};

    fn ramp_16bit() -> Mat {
        let mut image = Mat::new_rows_cols_with_default(1, 4, CV_16UC1, Scalar::all(0.0)).unwrap();
        for (col, value) in [1000u16, 2000, 3000, 4000].into_iter().enumerate() {
            *image.at_2d_mut::<u16>(0, col as i32).unwrap() = value;
        }
        image
    }

    #[test]
    fn test_sixteen_bit_extremes_map_to_full_range() {
        let normalized = ChannelNormalizer::new().normalize(&ramp_16bit()).unwrap();

        assert_eq!(normalized.typ(), CV_8UC1);
        assert_eq!(*normalized.at_2d::<u8>(0, 0).unwrap(), 0);
        assert_eq!(*normalized.at_2d::<u8>(0, 3).unwrap(), 255);
        assert_eq!(*normalized.at_2d::<u8>(0, 1).unwrap(), 85);
        assert_eq!(*normalized.at_2d::<u8>(0, 2).unwrap(), 170);
    }

    #[test]
    fn test_flat_image_maps_to_zero() {
        let flat = Mat::new_rows_cols_with_default(5, 5, CV_8UC1, Scalar::all(77.0)).unwrap();
        let normalized = ChannelNormalizer::new().normalize(&flat).unwrap();
        let range = IntensityRange::of(&normalized).unwrap();
        assert_eq!(range.max, 0.0);
        assert!(IntensityRange::of(&flat).unwrap().is_flat());
    }

    #[test]
    fn test_empty_image_rejected() {
        let err = ChannelNormalizer::new().normalize(&Mat::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::ImageLoadError { .. }));
    }

    #[test]
    fn test_intensity_range() {
        let range = IntensityRange::of(&ramp_16bit()).unwrap();
        assert_eq!(range.min, 1000.0);
        assert_eq!(range.max, 4000.0);
        assert!(!range.is_flat());
    }
}
