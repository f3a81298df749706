//! Inspection overlay rendering
//!
//! Composes the normalized brightfield image, marker-positive pixels, the
//! organoid outline and the source file name into one BGR image.

use opencv::{
    core::{Mat, Point, Scalar, Vec3b, Vector},
    imgproc,
    prelude::*,
};
use palette::Srgb;

use crate::config::OverlayConfig;
use crate::constants::overlay::LABEL_ORIGIN;
use crate::detection::OrganoidMask;
use crate::error::{AnalysisError, Result};

/// Convert an sRGB color to OpenCV's BGR channel order
pub fn bgr_scalar(color: Srgb<u8>) -> Scalar {
    Scalar::new(color.blue as f64, color.green as f64, color.red as f64, 0.0)
}

fn bgr_pixel(color: Srgb<u8>) -> Vec3b {
    Vec3b::from([color.blue, color.green, color.red])
}

/// Overlay renderer
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    config: OverlayConfig,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::from_config(&OverlayConfig::default())
    }
}

impl OverlayRenderer {
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Render the overlay
    ///
    /// # Arguments
    ///
    /// * `base` - Normalized 8-bit single-channel brightfield image
    /// * `mask` - Organoid mask, outlined with the contour color
    /// * `positive` - Marker-positive pixels (non-zero), painted with the marker color
    /// * `label` - Text burned into the top-left corner
    pub fn render(
        &self,
        base: &Mat,
        mask: &OrganoidMask,
        positive: Option<&Mat>,
        label: &str,
    ) -> Result<Mat> {
        let mut overlay = Mat::default();
        imgproc::cvt_color_def(base, &mut overlay, imgproc::COLOR_GRAY2BGR)
            .map_err(|e| AnalysisError::opencv("overlay base to BGR", e))?;

        if let Some(positive) = positive {
            self.paint_positive(&mut overlay, positive)?;
        }

        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            mask.as_mat(),
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )
        .map_err(|e| AnalysisError::opencv("find organoid contour", e))?;

        imgproc::draw_contours(
            &mut overlay,
            &contours,
            -1,
            bgr_scalar(self.config.contour_color),
            self.config.contour_thickness,
            imgproc::LINE_8,
            &Mat::default(),
            i32::MAX,
            Point::new(0, 0),
        )
        .map_err(|e| AnalysisError::opencv("draw organoid contour", e))?;

        imgproc::put_text(
            &mut overlay,
            label,
            Point::new(LABEL_ORIGIN.0, LABEL_ORIGIN.1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            self.config.font_scale,
            bgr_scalar(self.config.label_color),
            self.config.label_thickness,
            imgproc::LINE_AA,
            false,
        )
        .map_err(|e| AnalysisError::opencv("draw label", e))?;

        Ok(overlay)
    }

    fn paint_positive(&self, overlay: &mut Mat, positive: &Mat) -> Result<()> {
        if positive.rows() != overlay.rows() || positive.cols() != overlay.cols() {
            return Err(AnalysisError::DimensionMismatch {
                expected: (overlay.cols(), overlay.rows()),
                actual: (positive.cols(), positive.rows()),
            });
        }
        let color = bgr_pixel(self.config.marker_color);
        let flags = positive
            .data_typed::<u8>()
            .map_err(|e| AnalysisError::opencv("read positive mask", e))?;
        let pixels = overlay
            .data_typed_mut::<Vec3b>()
            .map_err(|e| AnalysisError::opencv("write overlay", e))?;
        for (px, &flag) in pixels.iter_mut().zip(flags) {
            if flag != 0 {
                *px = color;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{CV_8UC1, CV_8UC3};

    fn disk_mask() -> OrganoidMask {
        let mut image = Mat::new_rows_cols_with_default(200, 300, CV_8UC1, Scalar::all(0.0)).unwrap();
        imgproc::circle(
            &mut image,
            Point::new(150, 120),
            50,
            Scalar::all(255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        OrganoidMask::from_binary(&image).unwrap()
    }

    fn gray_base() -> Mat {
        Mat::new_rows_cols_with_default(200, 300, CV_8UC1, Scalar::all(128.0)).unwrap()
    }

    #[test]
    fn test_color_conversion_is_bgr() {
        let red = bgr_scalar(Srgb::new(255, 0, 0));
        assert_eq!((red[0], red[1], red[2]), (0.0, 0.0, 255.0));
        assert_eq!(bgr_pixel(Srgb::new(255, 255, 0)), Vec3b::from([0, 255, 255]));
    }

    #[test]
    fn test_overlay_layers() {
        let mask = disk_mask();
        let mut positive = Mat::new_rows_cols_with_default(200, 300, CV_8UC1, Scalar::all(0.0)).unwrap();
        *positive.at_2d_mut::<u8>(120, 150).unwrap() = 255;

        let overlay = OverlayRenderer::default()
            .render(&gray_base(), &mask, Some(&positive), "well_A1_BRIGHTFIELD.tif")
            .unwrap();

        assert_eq!(overlay.typ(), CV_8UC3);
        assert_eq!(*overlay.at_2d::<Vec3b>(120, 150).unwrap(), Vec3b::from([0, 0, 255]));
        // untouched interior pixel keeps the gray base
        assert_eq!(*overlay.at_2d::<Vec3b>(120, 140).unwrap(), Vec3b::from([128, 128, 128]));
        // leftmost mask pixel lies on the outline
        assert_eq!(*overlay.at_2d::<Vec3b>(120, 100).unwrap(), Vec3b::from([0, 255, 255]));

        let mut white = 0;
        for row in 10..45 {
            for col in 10..120 {
                if *overlay.at_2d::<Vec3b>(row, col).unwrap() == Vec3b::from([255, 255, 255]) {
                    white += 1;
                }
            }
        }
        assert!(white > 0, "label text not drawn");
    }

    #[test]
    fn test_without_marker_only_outline_is_colored() {
        let overlay = OverlayRenderer::default()
            .render(&gray_base(), &disk_mask(), None, "x")
            .unwrap();
        assert_eq!(*overlay.at_2d::<Vec3b>(120, 150).unwrap(), Vec3b::from([128, 128, 128]));
        assert_eq!(*overlay.at_2d::<Vec3b>(190, 290).unwrap(), Vec3b::from([128, 128, 128]));
    }

    #[test]
    fn test_positive_mask_size_checked() {
        let small = Mat::new_rows_cols_with_default(10, 10, CV_8UC1, Scalar::all(0.0)).unwrap();
        let err = OverlayRenderer::default()
            .render(&gray_base(), &disk_mask(), Some(&small), "x")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DimensionMismatch { .. }));
    }
}
