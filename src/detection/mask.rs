//! Binary organoid mask

use opencv::{
    core::{self, Mat, Scalar, CV_8UC1},
    prelude::*,
};

use crate::error::{AnalysisError, Result};

/// Foreground value stored in mask pixels
pub const MASK_ON: u8 = 255;

/// Single-channel 8-bit mask, `255` inside the organoid and `0` elsewhere.
///
/// Always continuous, so pixel data can be read as one slice in row-major
/// order.
#[derive(Debug, Clone)]
pub struct OrganoidMask {
    mat: Mat,
}

impl OrganoidMask {
    /// Build a mask from any 8-bit single-channel image (non-zero = foreground)
    pub fn from_binary(binary: &Mat) -> Result<Self> {
        if binary.typ() != CV_8UC1 {
            return Err(AnalysisError::processing(format!(
                "Mask source must be 8-bit single channel, got type {}",
                binary.typ()
            )));
        }
        let owned;
        let src = if binary.is_continuous() {
            binary
        } else {
            owned = binary
                .try_clone()
                .map_err(|e| AnalysisError::opencv("clone mask source", e))?;
            &owned
        };
        let data = src
            .data_bytes()
            .map_err(|e| AnalysisError::opencv("read mask source", e))?;
        Self::from_predicate(binary.cols(), binary.rows(), |idx| data[idx] != 0)
    }

    /// Build a mask by evaluating `is_on` for every row-major pixel index
    pub fn from_predicate<F>(width: i32, height: i32, is_on: F) -> Result<Self>
    where
        F: Fn(usize) -> bool,
    {
        let mut mat = Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::all(0.0))
            .map_err(|e| AnalysisError::opencv("allocate mask", e))?;
        {
            let data = mat
                .data_typed_mut::<u8>()
                .map_err(|e| AnalysisError::opencv("write mask", e))?;
            for (idx, px) in data.iter_mut().enumerate() {
                if is_on(idx) {
                    *px = MASK_ON;
                }
            }
        }
        Ok(Self { mat })
    }

    pub fn width(&self) -> i32 {
        self.mat.cols()
    }

    pub fn height(&self) -> i32 {
        self.mat.rows()
    }

    /// Number of foreground pixels
    pub fn area(&self) -> Result<usize> {
        core::count_non_zero(&self.mat)
            .map(|n| n as usize)
            .map_err(|e| AnalysisError::opencv("count mask pixels", e))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.area()? == 0)
    }

    /// Row-major pixel values (`0` or `255`)
    pub fn pixels(&self) -> Result<&[u8]> {
        self.mat
            .data_typed::<u8>()
            .map_err(|e| AnalysisError::opencv("read mask", e))
    }

    /// True when (x, y) lies inside the image and the mask
    pub fn contains(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width() || y >= self.height() {
            return false;
        }
        matches!(self.mat.at_2d::<u8>(y, x), Ok(v) if *v != 0)
    }

    /// Underlying OpenCV image, suitable for writing or contour tracing
    pub fn as_mat(&self) -> &Mat {
        &self.mat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_binary_normalizes_values() {
        let mut src = Mat::new_rows_cols_with_default(10, 10, CV_8UC1, Scalar::all(0.0)).unwrap();
        *src.at_2d_mut::<u8>(2, 3).unwrap() = 1;
        *src.at_2d_mut::<u8>(4, 5).unwrap() = 200;

        let mask = OrganoidMask::from_binary(&src).unwrap();
        assert_eq!(mask.area().unwrap(), 2);
        assert!(mask.contains(3, 2));
        assert!(mask.contains(5, 4));
        assert!(!mask.contains(0, 0));
        assert!(!mask.contains(-1, 4));
        assert!(!mask.contains(10, 4));
        assert_eq!(*mask.as_mat().at_2d::<u8>(2, 3).unwrap(), MASK_ON);
    }

    #[test]
    fn test_rejects_wrong_type() {
        let src = Mat::new_rows_cols_with_default(3, 3, opencv::core::CV_32FC1, Scalar::all(1.0)).unwrap();
        assert!(OrganoidMask::from_binary(&src).is_err());
    }

    #[test]
    fn test_from_predicate_row_major() {
        let mask = OrganoidMask::from_predicate(4, 3, |idx| idx == 5).unwrap();
        assert!(mask.contains(1, 1));
        assert_eq!(mask.pixels().unwrap().iter().filter(|&&p| p == MASK_ON).count(), 1);
        assert!(!mask.is_empty().unwrap());
    }
}
