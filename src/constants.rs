//! Default tunables and naming conventions for organoid analysis
//!
//! Every value here is only a default: components take their parameters
//! explicitly (see [`crate::config`]) so each stage can be tested in isolation.

/// Brightfield segmentation defaults
pub mod segmentation {
    /// Gaussian blur kernel edge length in pixels (must be odd)
    pub const BLUR_KERNEL_SIZE: i32 = 11;

    /// Components smaller than this many pixels are treated as debris
    pub const MIN_OBJECT_AREA: i32 = 2000;

    /// Radius of the disk structuring element used for dilation and closing
    pub const MORPH_RADIUS: i32 = 20;

    /// Connectivity used when discarding small objects
    pub const DEBRIS_CONNECTIVITY: i32 = 4;

    /// Connectivity used when labeling organoid regions
    pub const REGION_CONNECTIVITY: i32 = 8;
}

/// Marker channel quantification defaults
pub mod fluorescence {
    /// Lower percentile used as the normalization floor
    pub const PERCENTILE_LOW: f64 = 1.0;

    /// Upper percentile used as the normalization ceiling
    pub const PERCENTILE_HIGH: f64 = 99.0;

    /// Normalized intensity above which a pixel is marker-positive
    pub const POSITIVE_THRESHOLD: f64 = 0.85;

    /// Connectivity used when grouping positive pixels into clusters
    pub const CLUSTER_CONNECTIVITY: i32 = 8;
}

/// Shape descriptor guards
pub mod geometry {
    /// Added to the bounding-box height before dividing
    pub const ASPECT_RATIO_EPSILON: f64 = 1e-5;
}

/// Overlay rendering defaults, as 8-bit sRGB triples
pub mod overlay {
    /// Marker-positive highlight (red)
    pub const MARKER_COLOR: [u8; 3] = [255, 0, 0];

    /// Organoid contour (yellow)
    pub const CONTOUR_COLOR: [u8; 3] = [255, 255, 0];

    /// Filename label (white)
    pub const LABEL_COLOR: [u8; 3] = [255, 255, 255];

    pub const CONTOUR_THICKNESS: i32 = 2;
    pub const FONT_SCALE: f64 = 1.2;
    pub const LABEL_THICKNESS: i32 = 3;

    /// Baseline origin of the filename label
    pub const LABEL_ORIGIN: (i32, i32) = (10, 40);
}

/// Input pairing and output layout
pub mod naming {
    /// Token identifying the structural channel in a filename
    pub const BRIGHTFIELD_TOKEN: &str = "BRIGHTFIELD";

    /// Token identifying the fluorescence channel in a filename
    pub const MARKER_TOKEN: &str = "GFP";

    /// Recognized input extensions (compared case-insensitively)
    pub const EXTENSIONS: [&str; 4] = ["jpg", "png", "tif", "tiff"];

    pub const MASKS_DIR: &str = "masks";
    pub const OVERLAYS_DIR: &str = "overlays";
    pub const MASK_PREFIX: &str = "mask_";
    pub const OVERLAY_PREFIX: &str = "overlay_";

    /// Aggregate table written at the output root
    pub const RESULTS_FILENAME: &str = "organoid_gfp_analysis.csv";
}

/// Decimal places used when rounding record fields
pub mod precision {
    /// Centroid, area, diameter, perimeter, mean cluster distance
    pub const COARSE: i32 = 2;

    /// Shape ratios and marker intensities
    pub const FINE: i32 = 4;
}
