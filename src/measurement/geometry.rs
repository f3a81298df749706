//! Shape descriptors of the organoid region
//!
//! All values are pure functions of the mask, in pixel units:
//! - centroid, area, bounding box
//! - perimeter (4-connectivity weighted boundary estimate)
//! - circularity `4π·area / perimeter²`, clamped to [0, 1]
//! - solidity (area over filled convex hull area)
//! - eccentricity of the ellipse with the same second central moments
//! - extent, aspect ratio, equivalent diameter
//!
//! Degenerate shapes never divide by zero: a zero perimeter gives zero
//! circularity and the aspect ratio denominator carries a small epsilon.

use opencv::{
    core::{self, Mat, Point, Scalar, Vector, CV_8UC1},
    imgproc,
    prelude::*,
};
use serde::Serialize;
use std::f64::consts::{PI, SQRT_2};

use crate::constants::geometry::ASPECT_RATIO_EPSILON;
use crate::detection::OrganoidMask;
use crate::error::{AnalysisError, Result};

/// Axis-aligned bounding box, half-open (`max` is one past the last pixel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BoundingBox {
    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }
}

/// Read-only measurements of one organoid mask
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionProperties {
    pub centroid_x: f64,
    pub centroid_y: f64,
    /// Pixel count
    pub area: f64,
    pub perimeter: f64,
    pub circularity: f64,
    pub solidity: f64,
    pub eccentricity: f64,
    pub extent: f64,
    pub aspect_ratio: f64,
    /// Diameter of the circle with the same area
    pub equivalent_diameter: f64,
    pub bbox: BoundingBox,
}

/// Geometric feature extractor
#[derive(Debug, Clone, Default)]
pub struct GeometryExtractor;

impl GeometryExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Measure the foreground of `mask` as a single region
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::NoOrganoidDetected` for an empty mask.
    pub fn measure(&self, mask: &OrganoidMask) -> Result<RegionProperties> {
        let width = mask.width();
        let pixels = mask.pixels()?;

        // Step 1: raw moments and bounding box in a single pass
        let mut count = 0u64;
        let (mut sum_x, mut sum_y) = (0.0f64, 0.0f64);
        let (mut sum_xx, mut sum_yy, mut sum_xy) = (0.0f64, 0.0f64, 0.0f64);
        let mut bbox = BoundingBox {
            min_x: i32::MAX,
            min_y: i32::MAX,
            max_x: i32::MIN,
            max_y: i32::MIN,
        };
        for (idx, &px) in pixels.iter().enumerate() {
            if px == 0 {
                continue;
            }
            let x = (idx as i32) % width;
            let y = (idx as i32) / width;
            let (xf, yf) = (x as f64, y as f64);
            count += 1;
            sum_x += xf;
            sum_y += yf;
            sum_xx += xf * xf;
            sum_yy += yf * yf;
            sum_xy += xf * yf;
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x + 1);
            bbox.max_y = bbox.max_y.max(y + 1);
        }

        if count == 0 {
            return Err(AnalysisError::NoOrganoidDetected {
                reason: "empty mask has no geometry".into(),
            });
        }

        let area = count as f64;
        let centroid_x = sum_x / area;
        let centroid_y = sum_y / area;

        // Step 2: second central moments, normalized by area
        let mu20 = sum_xx / area - centroid_x * centroid_x;
        let mu02 = sum_yy / area - centroid_y * centroid_y;
        let mu11 = sum_xy / area - centroid_x * centroid_y;
        let eccentricity = ellipse_eccentricity(mu20, mu02, mu11);

        // Step 3: boundary and hull
        let perimeter = weighted_perimeter(pixels, width, mask.height(), &bbox);
        let circularity = if perimeter > 0.0 {
            (4.0 * PI * area / (perimeter * perimeter)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let hull_area = convex_hull_area(mask)?.max(count as usize) as f64;
        let solidity = area / hull_area;

        // Step 4: bounding-box ratios
        let bbox_w = bbox.width() as f64;
        let bbox_h = bbox.height() as f64;
        let extent = area / (bbox_w * bbox_h);
        let aspect_ratio = bbox_w / (bbox_h + ASPECT_RATIO_EPSILON);
        let equivalent_diameter = 2.0 * (area / PI).sqrt();

        Ok(RegionProperties {
            centroid_x,
            centroid_y,
            area,
            perimeter,
            circularity,
            solidity,
            eccentricity,
            extent,
            aspect_ratio,
            equivalent_diameter,
            bbox,
        })
    }
}

/// Eccentricity from the eigenvalues of the covariance matrix
fn ellipse_eccentricity(mu20: f64, mu02: f64, mu11: f64) -> f64 {
    let half_sum = (mu20 + mu02) / 2.0;
    let root = (((mu20 - mu02) / 2.0).powi(2) + mu11 * mu11).sqrt();
    let major = half_sum + root;
    let minor = (half_sum - root).max(0.0);
    if major <= 0.0 {
        return 0.0;
    }
    (1.0 - minor / major).max(0.0).sqrt()
}

/// Boundary length with the 4-connectivity weighted pixel estimator
///
/// Border pixels (foreground with a 4-neighbour outside the region or the
/// image) are coded by their 3x3 neighbourhood of border pixels with weights
/// `[[10, 2, 10], [2, 1, 2], [10, 2, 10]]`; each code maps to a length
/// contribution.
fn weighted_perimeter(pixels: &[u8], width: i32, height: i32, bbox: &BoundingBox) -> f64 {
    let on = |x: i32, y: i32| -> bool {
        x >= 0 && y >= 0 && x < width && y < height && pixels[(y * width + x) as usize] != 0
    };
    let is_border = |x: i32, y: i32| -> bool {
        on(x, y) && !(on(x - 1, y) && on(x + 1, y) && on(x, y - 1) && on(x, y + 1))
    };

    let mut total = 0.0;
    for y in bbox.min_y..bbox.max_y {
        for x in bbox.min_x..bbox.max_x {
            if !is_border(x, y) {
                continue;
            }
            let mut code = 1;
            for (dx, dy, weight) in [
                (-1, 0, 2),
                (1, 0, 2),
                (0, -1, 2),
                (0, 1, 2),
                (-1, -1, 10),
                (1, -1, 10),
                (-1, 1, 10),
                (1, 1, 10),
            ] {
                if is_border(x + dx, y + dy) {
                    code += weight;
                }
            }
            total += match code {
                5 | 7 | 15 | 17 | 25 | 27 => 1.0,
                21 | 33 => SQRT_2,
                13 | 23 => (1.0 + SQRT_2) / 2.0,
                _ => 0.0,
            };
        }
    }
    total
}

/// Pixel count of the filled convex hull of the mask foreground
fn convex_hull_area(mask: &OrganoidMask) -> Result<usize> {
    let mut contours = Vector::<Vector<Point>>::new();
    imgproc::find_contours(
        mask.as_mat(),
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_NONE,
        Point::new(0, 0),
    )
    .map_err(|e| AnalysisError::opencv("find contours for hull", e))?;

    let mut points = Vector::<Point>::new();
    for contour in contours.iter() {
        for point in contour.iter() {
            points.push(point);
        }
    }
    if points.is_empty() {
        return Ok(0);
    }

    let mut hull = Vector::<Point>::new();
    imgproc::convex_hull(&points, &mut hull, false, true)
        .map_err(|e| AnalysisError::opencv("convex hull", e))?;

    let mut canvas =
        Mat::new_rows_cols_with_default(mask.height(), mask.width(), CV_8UC1, Scalar::all(0.0))
            .map_err(|e| AnalysisError::opencv("allocate hull canvas", e))?;
    imgproc::fill_convex_poly(&mut canvas, &hull, Scalar::all(255.0), imgproc::LINE_8, 0)
        .map_err(|e| AnalysisError::opencv("fill convex hull", e))?;

    core::count_non_zero(&canvas)
        .map(|n| n as usize)
        .map_err(|e| AnalysisError::opencv("count hull pixels", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mask_from(image: &Mat) -> OrganoidMask {
        OrganoidMask::from_binary(image).unwrap()
    }

    fn blank(rows: i32, cols: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, CV_8UC1, Scalar::all(0.0)).unwrap()
    }

    fn disk(radius: i32) -> OrganoidMask {
        let size = 2 * radius + 40;
        let mut image = blank(size, size);
        imgproc::circle(
            &mut image,
            Point::new(size / 2, size / 2),
            radius,
            Scalar::all(255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        mask_from(&image)
    }

    fn rectangle(width: i32, height: i32) -> OrganoidMask {
        let mut image = blank(height + 10, width + 10);
        imgproc::rectangle_points(
            &mut image,
            Point::new(5, 5),
            Point::new(5 + width - 1, 5 + height - 1),
            Scalar::all(255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        mask_from(&image)
    }

    #[test]
    fn test_disk_descriptors() {
        let r = 40.0;
        let props = GeometryExtractor::new().measure(&disk(40)).unwrap();

        assert_relative_eq!(props.area, PI * r * r, max_relative = 0.02);
        assert_relative_eq!(props.equivalent_diameter, 2.0 * r, max_relative = 0.02);
        assert_relative_eq!(props.centroid_x, 60.0, epsilon = 0.5);
        assert_relative_eq!(props.centroid_y, 60.0, epsilon = 0.5);
        assert!(props.circularity > 0.85 && props.circularity <= 1.0, "{}", props.circularity);
        assert!(props.solidity > 0.95 && props.solidity <= 1.0);
        assert!(props.eccentricity < 0.15);
        assert_relative_eq!(props.extent, PI / 4.0, max_relative = 0.05);
        assert_relative_eq!(props.aspect_ratio, 1.0, max_relative = 0.01);
    }

    #[test]
    fn test_rectangle_descriptors() {
        let props = GeometryExtractor::new().measure(&rectangle(20, 10)).unwrap();

        assert_eq!(props.area, 200.0);
        assert_eq!(props.bbox.width(), 20);
        assert_eq!(props.bbox.height(), 10);
        // every border pixel of an axis-aligned rectangle contributes 1
        assert_relative_eq!(props.perimeter, 56.0, epsilon = 1e-9);
        assert_relative_eq!(props.extent, 1.0, epsilon = 1e-12);
        assert_relative_eq!(props.solidity, 1.0, epsilon = 1e-12);
        assert_relative_eq!(props.aspect_ratio, 2.0, max_relative = 1e-5);
        // variances (20²-1)/12 and (10²-1)/12
        let expected = (1.0f64 - 8.25 / 33.25).sqrt();
        assert_relative_eq!(props.eccentricity, expected, epsilon = 1e-9);
        assert_relative_eq!(props.centroid_x, 14.5, epsilon = 1e-9);
        assert_relative_eq!(props.centroid_y, 9.5, epsilon = 1e-9);
    }

    #[test]
    fn test_single_pixel_has_zero_perimeter_and_circularity() {
        let mut image = blank(5, 5);
        *image.at_2d_mut::<u8>(2, 2).unwrap() = 255;
        let props = GeometryExtractor::new().measure(&mask_from(&image)).unwrap();

        assert_eq!(props.area, 1.0);
        assert_eq!(props.perimeter, 0.0);
        assert_eq!(props.circularity, 0.0);
        assert_eq!(props.eccentricity, 0.0);
        assert!(props.solidity > 0.0 && props.solidity <= 1.0);
    }

    #[test]
    fn test_one_row_region_has_finite_aspect_ratio() {
        let props = GeometryExtractor::new().measure(&rectangle(30, 1)).unwrap();

        assert!(props.aspect_ratio.is_finite());
        assert_relative_eq!(props.aspect_ratio, 30.0, max_relative = 1e-4);
        assert!(props.circularity >= 0.0 && props.circularity <= 1.0);
        assert_relative_eq!(props.eccentricity, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_region_touching_image_edge() {
        let mut image = blank(10, 10);
        imgproc::rectangle_points(
            &mut image,
            Point::new(0, 0),
            Point::new(3, 3),
            Scalar::all(255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        let props = GeometryExtractor::new().measure(&mask_from(&image)).unwrap();
        assert_eq!(props.area, 16.0);
        assert_relative_eq!(props.perimeter, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_mask_rejected() {
        let err = GeometryExtractor::new().measure(&mask_from(&blank(4, 4))).unwrap_err();
        assert!(err.is_no_organoid());
    }
}
