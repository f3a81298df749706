//! # Organoid Scan
//!
//! A Rust crate for measuring organoids in paired microscopy images.
//!
//! For every structural ("brightfield") image, with an optional fluorescence
//! ("marker") image of the same field, this library:
//! - Rescales the raw channel to 8 bits and segments the organoid
//! - Computes shape descriptors of the organoid mask
//! - Quantifies marker-positive pixels and clusters inside the organoid
//! - Renders an inspection overlay and writes the mask
//!
//! Batches run on a bounded worker pool; each pair succeeds or is skipped on
//! its own, and the records are aggregated into one CSV table.
//!
//! ## Example
//!
//! ```rust,no_run
//! use organoid_scan::{run_batch, PipelineConfig};
//! use std::path::Path;
//!
//! let config = PipelineConfig::from_file(Path::new("config.yml"))?;
//! let result = run_batch(config)?;
//! println!("{} organoids measured", result.records.len());
//! # Ok::<(), organoid_scan::AnalysisError>(())
//! ```

use serde::{Deserialize, Serialize};

pub mod batch;
pub mod config;
pub mod constants;
pub mod detection;
pub mod error;
pub mod image_loader;
pub mod logging;
pub mod measurement;
pub mod pipeline;
pub mod preprocessing;
pub mod render;

pub use batch::{BatchOrchestrator, BatchResult, ImagePair};
pub use config::{PipelineConfig, ThreadCount};
pub use detection::{OrganoidMask, OrganoidSegmenter, RegionSelection};
pub use error::{AnalysisError, Result};
pub use measurement::{MarkerMetrics, RegionProperties};
pub use pipeline::{PairAnalysis, PairPipeline};

use constants::precision::{COARSE, FINE};

/// One row of the aggregate table
///
/// Pixel-scale values keep 2 decimals, ratios and normalized intensities 4.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Brightfield path relative to the input root
    pub filename: String,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub area: f64,
    /// Equivalent circular diameter
    pub diameter: f64,
    pub perimeter: f64,
    pub circularity: f64,
    pub solidity: f64,
    pub eccentricity: f64,
    pub extent: f64,
    pub aspect_ratio: f64,
    pub gfp_positive_area: u64,
    pub gfp_mean_intensity: f64,
    pub gfp_std_dev: f64,
    pub gfp_total_intensity: f64,
    /// Fraction of the organoid area, in [0, 1]
    pub gfp_percent_area: f64,
    pub gfp_num_clusters: usize,
    pub gfp_mean_distance_to_centroid: f64,
}

impl AnalysisRecord {
    /// Column names in output order
    pub const COLUMNS: [&'static str; 18] = [
        "filename",
        "centroid_x",
        "centroid_y",
        "area",
        "diameter",
        "perimeter",
        "circularity",
        "solidity",
        "eccentricity",
        "extent",
        "aspect_ratio",
        "gfp_positive_area",
        "gfp_mean_intensity",
        "gfp_std_dev",
        "gfp_total_intensity",
        "gfp_percent_area",
        "gfp_num_clusters",
        "gfp_mean_distance_to_centroid",
    ];

    /// Build a rounded record from raw measurements
    pub fn from_measurements(
        filename: impl Into<String>,
        region: &RegionProperties,
        marker: &MarkerMetrics,
    ) -> Self {
        Self {
            filename: filename.into(),
            centroid_x: round_to(region.centroid_x, COARSE),
            centroid_y: round_to(region.centroid_y, COARSE),
            area: round_to(region.area, COARSE),
            diameter: round_to(region.equivalent_diameter, COARSE),
            perimeter: round_to(region.perimeter, COARSE),
            circularity: round_to(region.circularity, FINE),
            solidity: round_to(region.solidity, FINE),
            eccentricity: round_to(region.eccentricity, FINE),
            extent: round_to(region.extent, FINE),
            aspect_ratio: round_to(region.aspect_ratio, FINE),
            gfp_positive_area: marker.positive_area,
            gfp_mean_intensity: round_to(marker.mean_intensity, FINE),
            gfp_std_dev: round_to(marker.std_dev, FINE),
            gfp_total_intensity: round_to(marker.total_intensity, FINE),
            gfp_percent_area: round_to(marker.percent_area, FINE),
            gfp_num_clusters: marker.num_clusters,
            gfp_mean_distance_to_centroid: round_to(marker.mean_distance_to_centroid, COARSE),
        }
    }

    /// Field values as text, in [`Self::COLUMNS`] order
    ///
    /// Float columns always carry a decimal point (`1.0`, not `1`).
    pub fn values(&self) -> Vec<String> {
        vec![
            self.filename.clone(),
            format_float(self.centroid_x),
            format_float(self.centroid_y),
            format_float(self.area),
            format_float(self.diameter),
            format_float(self.perimeter),
            format_float(self.circularity),
            format_float(self.solidity),
            format_float(self.eccentricity),
            format_float(self.extent),
            format_float(self.aspect_ratio),
            self.gfp_positive_area.to_string(),
            format_float(self.gfp_mean_intensity),
            format_float(self.gfp_std_dev),
            format_float(self.gfp_total_intensity),
            format_float(self.gfp_percent_area),
            self.gfp_num_clusters.to_string(),
            format_float(self.gfp_mean_distance_to_centroid),
        ]
    }

    /// True when every marker field holds its neutral value
    pub fn has_neutral_marker(&self) -> bool {
        self.gfp_positive_area == 0
            && self.gfp_mean_intensity == 0.0
            && self.gfp_std_dev == 0.0
            && self.gfp_total_intensity == 0.0
            && self.gfp_percent_area == 0.0
            && self.gfp_num_clusters == 0
            && self.gfp_mean_distance_to_centroid == 0.0
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Analyze one image pair and write its mask and overlay
///
/// # Errors
///
/// Returns `AnalysisError::NoOrganoidDetected` when the brightfield image
/// holds no organoid, or a load/write error for unreadable inputs or
/// unwritable outputs.
pub fn analyze_pair(pair: &ImagePair, config: &PipelineConfig) -> Result<AnalysisRecord> {
    PairPipeline::from_config(config).process_pair(pair)
}

/// Run a complete batch: discovery, parallel analysis and CSV output
///
/// # Errors
///
/// Fails only for an invalid configuration, an unreadable input root or an
/// unwritable result table. Individual pairs never abort the run.
pub fn run_batch(config: PipelineConfig) -> Result<BatchResult> {
    BatchOrchestrator::new(config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::BoundingBox;

    fn region() -> RegionProperties {
        RegionProperties {
            centroid_x: 150.12345,
            centroid_y: 99.995,
            area: 31416.0,
            perimeter: 640.456789,
            circularity: 0.963_21,
            solidity: 0.99999,
            eccentricity: 0.012_345,
            extent: 0.785_398,
            aspect_ratio: 1.000_04,
            equivalent_diameter: 200.000_1,
            bbox: BoundingBox {
                min_x: 50,
                min_y: 0,
                max_x: 251,
                max_y: 201,
            },
        }
    }

    #[test]
    fn test_record_rounding() {
        let record = AnalysisRecord::from_measurements("a/b.tif", &region(), &MarkerMetrics::default());

        assert_eq!(record.centroid_x, 150.12);
        assert_eq!(record.area, 31416.0);
        assert_eq!(record.perimeter, 640.46);
        assert_eq!(record.diameter, 200.0);
        assert_eq!(record.circularity, 0.9632);
        assert_eq!(record.solidity, 1.0);
        assert_eq!(record.eccentricity, 0.0123);
        assert_eq!(record.extent, 0.7854);
        assert!(record.has_neutral_marker());
    }

    #[test]
    fn test_marker_fields_copied() {
        let marker = MarkerMetrics {
            positive_area: 200,
            percent_area: 0.039_81,
            mean_intensity: 0.987_66,
            std_dev: 0.011_11,
            total_intensity: 197.531,
            num_clusters: 2,
            mean_distance_to_centroid: 20.506_09,
        };
        let record = AnalysisRecord::from_measurements("x", &region(), &marker);
        assert_eq!(record.gfp_positive_area, 200);
        assert_eq!(record.gfp_percent_area, 0.0398);
        assert_eq!(record.gfp_mean_intensity, 0.9877);
        assert_eq!(record.gfp_num_clusters, 2);
        assert_eq!(record.gfp_mean_distance_to_centroid, 20.51);
        assert!(!record.has_neutral_marker());
    }

    #[test]
    fn test_values_match_columns() {
        let record = AnalysisRecord::from_measurements("x", &region(), &MarkerMetrics::default());
        assert_eq!(record.values().len(), AnalysisRecord::COLUMNS.len());
        assert_eq!(record.values()[0], "x");
    }

    #[test]
    fn test_values_follow_field_names() {
        // every field distinct, so a swapped column cannot go unnoticed
        let record = AnalysisRecord {
            filename: "p/w_BRIGHTFIELD.tif".into(),
            centroid_x: 1.5,
            centroid_y: 2.5,
            area: 3.0,
            diameter: 4.5,
            perimeter: 5.5,
            circularity: 0.6,
            solidity: 0.7,
            eccentricity: 0.8,
            extent: 0.9,
            aspect_ratio: 1.1,
            gfp_positive_area: 12,
            gfp_mean_intensity: 0.13,
            gfp_std_dev: 0.14,
            gfp_total_intensity: 15.5,
            gfp_percent_area: 0.16,
            gfp_num_clusters: 17,
            gfp_mean_distance_to_centroid: 18.5,
        };
        let json = serde_json::to_value(&record).unwrap();
        let values = record.values();

        assert_eq!(json.as_object().unwrap().len(), AnalysisRecord::COLUMNS.len());
        for (column, text) in AnalysisRecord::COLUMNS.iter().zip(&values) {
            let field = &json[*column];
            match field.as_str() {
                Some(s) => assert_eq!(s, text, "column {}", column),
                None => assert_eq!(
                    field.as_f64().unwrap(),
                    text.parse::<f64>().unwrap(),
                    "column {}",
                    column
                ),
            }
        }
    }

    #[test]
    fn test_float_columns_keep_decimal_point() {
        let record = AnalysisRecord {
            filename: "x".into(),
            area: 31400.0,
            aspect_ratio: 1.0,
            gfp_positive_area: 7,
            ..AnalysisRecord::default()
        };
        let values = record.values();
        assert_eq!(values[3], "31400.0");
        assert_eq!(values[10], "1.0");
        assert_eq!(values[11], "7");
        assert_eq!(values[12], "0.0");
        assert_eq!(values[16], "0");
        assert_eq!(format_float(0.9335), "0.9335");
    }

    #[test]
    fn test_record_json_field_names() {
        let record = AnalysisRecord::from_measurements("x", &region(), &MarkerMetrics::default());
        let json = serde_json::to_value(&record).unwrap();
        for column in AnalysisRecord::COLUMNS {
            assert!(json.get(column).is_some(), "missing {}", column);
        }
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(-1.005_1, 2), -1.01);
        assert_eq!(round_to(2.5, 0), 3.0);
    }
}
