//! Binary morphology with disk structuring elements

use opencv::{
    core::{Mat, Point, Scalar, BORDER_CONSTANT, CV_8UC1},
    imgproc,
    prelude::*,
};

use crate::detection::components::LabeledComponents;
use crate::error::{AnalysisError, Result};

/// Discrete disk `x² + y² <= r²` as a `(2r+1) x (2r+1)` kernel
pub fn disk_kernel(radius: i32) -> Result<Mat> {
    if radius < 0 {
        return Err(AnalysisError::invalid_parameter("radius", radius));
    }
    let size = 2 * radius + 1;
    let mut kernel = Mat::new_rows_cols_with_default(size, size, CV_8UC1, Scalar::all(0.0))
        .map_err(|e| AnalysisError::opencv("allocate disk kernel", e))?;
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                *kernel
                    .at_2d_mut::<u8>(dy + radius, dx + radius)
                    .map_err(|e| AnalysisError::opencv("fill disk kernel", e))? = 1;
            }
        }
    }
    Ok(kernel)
}

/// Drop foreground components smaller than `min_area` pixels
///
/// Components with exactly `min_area` pixels survive.
pub fn remove_small_objects(binary: &Mat, min_area: i32, connectivity: i32) -> Result<Mat> {
    let labeled = LabeledComponents::label(binary, connectivity)?;
    let mut keep = vec![false; labeled.len() + 1];
    let mut removed = 0usize;
    for component in labeled.components() {
        if component.area >= min_area {
            keep[component.label as usize] = true;
        } else {
            removed += 1;
        }
    }
    log::trace!(
        "Removed {} of {} components below {} px",
        removed,
        labeled.len(),
        min_area
    );
    labeled.mask_where(|label| keep[label as usize])
}

/// Dilate with a disk of the given radius
pub fn dilate_disk(binary: &Mat, radius: i32) -> Result<Mat> {
    if radius == 0 {
        return binary
            .try_clone()
            .map_err(|e| AnalysisError::opencv("clone for dilation", e));
    }
    let kernel = disk_kernel(radius)?;
    let mut out = Mat::default();
    imgproc::dilate(
        binary,
        &mut out,
        &kernel,
        Point::new(-1, -1),
        1,
        BORDER_CONSTANT,
        border_value()?,
    )
    .map_err(|e| AnalysisError::opencv("dilate", e))?;
    Ok(out)
}

/// Morphological closing (dilate then erode) with a disk of the given radius
pub fn close_disk(binary: &Mat, radius: i32) -> Result<Mat> {
    if radius == 0 {
        return binary
            .try_clone()
            .map_err(|e| AnalysisError::opencv("clone for closing", e));
    }
    let kernel = disk_kernel(radius)?;
    let mut out = Mat::default();
    imgproc::morphology_ex(
        binary,
        &mut out,
        imgproc::MORPH_CLOSE,
        &kernel,
        Point::new(-1, -1),
        1,
        BORDER_CONSTANT,
        border_value()?,
    )
    .map_err(|e| AnalysisError::opencv("close", e))?;
    Ok(out)
}

// Neutral for both erosion and dilation, so the frame edge never eats into
// or grows the foreground.
fn border_value() -> Result<Scalar> {
    imgproc::morphology_default_border_value()
        .map_err(|e| AnalysisError::opencv("morphology border value", e))
}
