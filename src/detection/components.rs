//! Connected-component labeling
//!
//! Thin wrapper over `connectedComponentsWithStats` that copies the per-label
//! statistics into plain Rust values. Label 0 (background) is never listed.

use opencv::{
    core::{Mat, Scalar, CV_32S, CV_8UC1},
    imgproc,
    prelude::*,
};

use crate::detection::mask::MASK_ON;
use crate::error::{AnalysisError, Result};

/// Statistics of one labeled component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentStats {
    /// Label id in the label image (1-based)
    pub label: i32,
    /// Pixel count
    pub area: i32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    /// Centroid as (x, y) in pixel coordinates
    pub centroid: (f64, f64),
}

/// Label image plus the statistics of every foreground component
#[derive(Debug)]
pub struct LabeledComponents {
    labels: Mat,
    components: Vec<ComponentStats>,
}

impl LabeledComponents {
    /// Label the non-zero pixels of an 8-bit single-channel image
    ///
    /// `connectivity` is 4 or 8. Components are listed in raster-scan order
    /// of their first pixel, which is deterministic for a given input.
    pub fn label(binary: &Mat, connectivity: i32) -> Result<Self> {
        if binary.typ() != CV_8UC1 {
            return Err(AnalysisError::processing(format!(
                "Labeling requires 8-bit single channel input, got type {}",
                binary.typ()
            )));
        }
        if connectivity != 4 && connectivity != 8 {
            return Err(AnalysisError::invalid_parameter("connectivity", connectivity));
        }

        let mut labels = Mat::default();
        let mut stats = Mat::default();
        let mut centroids = Mat::default();
        let count = imgproc::connected_components_with_stats(
            binary,
            &mut labels,
            &mut stats,
            &mut centroids,
            connectivity,
            CV_32S,
        )
        .map_err(|e| AnalysisError::opencv("connected components", e))?;

        let read_stat = |label: i32, field: i32| -> Result<i32> {
            stats
                .at_2d::<i32>(label, field)
                .copied()
                .map_err(|e| AnalysisError::opencv("read component stats", e))
        };
        let read_centroid = |label: i32, axis: i32| -> Result<f64> {
            centroids
                .at_2d::<f64>(label, axis)
                .copied()
                .map_err(|e| AnalysisError::opencv("read component centroid", e))
        };

        let mut components = Vec::with_capacity(count.max(1) as usize - 1);
        for label in 1..count {
            components.push(ComponentStats {
                label,
                area: read_stat(label, imgproc::CC_STAT_AREA)?,
                left: read_stat(label, imgproc::CC_STAT_LEFT)?,
                top: read_stat(label, imgproc::CC_STAT_TOP)?,
                width: read_stat(label, imgproc::CC_STAT_WIDTH)?,
                height: read_stat(label, imgproc::CC_STAT_HEIGHT)?,
                centroid: (read_centroid(label, 0)?, read_centroid(label, 1)?),
            });
        }

        Ok(Self { labels, components })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[ComponentStats] {
        &self.components
    }

    /// Binary image (0/255) of the pixels whose label is in `selected`
    pub fn mask_of(&self, selected: &[i32]) -> Result<Mat> {
        let mut keep = vec![false; self.components.len() + 1];
        for &label in selected {
            if label > 0 && (label as usize) < keep.len() {
                keep[label as usize] = true;
            }
        }
        self.mask_where(|label| keep[label as usize])
    }

    /// Binary image (0/255) of the foreground pixels whose label satisfies `keep`
    pub fn mask_where<F>(&self, keep: F) -> Result<Mat>
    where
        F: Fn(i32) -> bool,
    {
        let labels = self
            .labels
            .data_typed::<i32>()
            .map_err(|e| AnalysisError::opencv("read label image", e))?;

        let mut out = Mat::new_rows_cols_with_default(
            self.labels.rows(),
            self.labels.cols(),
            CV_8UC1,
            Scalar::all(0.0),
        )
        .map_err(|e| AnalysisError::opencv("allocate component mask", e))?;
        {
            let data = out
                .data_typed_mut::<u8>()
                .map_err(|e| AnalysisError::opencv("write component mask", e))?;
            for (px, &label) in data.iter_mut().zip(labels) {
                if label > 0 && keep(label) {
                    *px = MASK_ON;
                }
            }
        }
        Ok(out)
    }
}
