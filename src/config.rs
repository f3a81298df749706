//! Configuration structures for the organoid analysis pipeline.
//!
//! The run-level options (input/output roots, worker count, marker analysis
//! switch) sit at the top of [`PipelineConfig`]; every processing stage owns
//! a sub-section holding only the tunables it consumes.
//!
//! # Configuration Loading
//!
//! Configuration can be loaded from YAML or JSON files, or constructed
//! programmatically. Every section except the two roots has defaults, so the
//! minimal four-key YAML file is a complete configuration:
//!
//! ```yaml
//! input_root: /data/plate_01
//! output_root: /data/plate_01_results
//! threads: auto
//! use_gfp: true
//! ```
//!
//! ```no_run
//! use organoid_scan::PipelineConfig;
//! use std::path::Path;
//!
//! let config = PipelineConfig::from_file(Path::new("config.yml"))?;
//! config.validate()?;
//! # Ok::<(), organoid_scan::AnalysisError>(())
//! ```
//!
//! # Configuration Sections
//!
//! - [`SegmentationConfig`]: blur, debris floor, morphology, region selection
//! - [`FluorescenceConfig`]: percentile clipping and positivity threshold
//! - [`OverlayConfig`]: colors and text layout of the inspection overlay
//! - [`NamingConfig`]: channel tokens, extensions, result table name

use palette::Srgb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::{fluorescence, naming, overlay, segmentation};
use crate::detection::RegionSelection;
use crate::error::{AnalysisError, Result};

/// Complete configuration for one batch run.
///
/// Loaded once, validated, then passed by reference to the orchestrator.
/// Components never read it directly; they are built from their section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory searched recursively for brightfield images
    pub input_root: PathBuf,

    /// Directory receiving masks, overlays and the result table
    pub output_root: PathBuf,

    /// Worker pool size
    #[serde(default)]
    pub threads: ThreadCount,

    /// Pair each brightfield image with its marker-channel image
    #[serde(default = "default_use_gfp")]
    pub use_gfp: bool,

    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub fluorescence: FluorescenceConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub naming: NamingConfig,
}

fn default_use_gfp() -> bool {
    true
}

/// Worker pool size: an explicit count or `auto` (one worker per core).
///
/// Configuration files may give the count as a number or as a string
/// (`threads: 4`, `threads: "4"`, `threads: auto`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ThreadCount {
    Fixed(usize),
    Keyword(ThreadKeyword),
}

/// Symbolic thread settings accepted in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKeyword {
    Auto,
}

impl Default for ThreadCount {
    fn default() -> Self {
        ThreadCount::Keyword(ThreadKeyword::Auto)
    }
}

impl ThreadCount {
    /// Resolve to a concrete worker count (`auto` becomes the core count)
    pub fn resolve(&self) -> usize {
        match self {
            ThreadCount::Fixed(n) => *n,
            ThreadCount::Keyword(ThreadKeyword::Auto) => num_cpus::get().max(1),
        }
    }
}

impl FromStr for ThreadCount {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(ThreadCount::Keyword(ThreadKeyword::Auto));
        }
        trimmed
            .parse::<usize>()
            .map(ThreadCount::Fixed)
            .map_err(|_| AnalysisError::invalid_parameter("threads", trimmed))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawThreadCount {
    Count(usize),
    Text(String),
}

impl<'de> Deserialize<'de> for ThreadCount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawThreadCount::deserialize(deserializer)? {
            RawThreadCount::Count(n) => Ok(ThreadCount::Fixed(n)),
            RawThreadCount::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl fmt::Display for ThreadCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadCount::Fixed(n) => write!(f, "{}", n),
            ThreadCount::Keyword(ThreadKeyword::Auto) => write!(f, "auto"),
        }
    }
}

/// Brightfield segmentation parameters.
///
/// Controls smoothing, automatic thresholding cleanup and which surviving
/// region is treated as the organoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Gaussian blur kernel size (must be odd)
    pub blur_kernel_size: i32,

    /// Minimum component area in pixels kept after thresholding
    pub min_object_area: i32,

    /// Disk radius for dilation and closing
    pub morph_radius: i32,

    /// Policy choosing the organoid among surviving regions
    pub selection: RegionSelection,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: segmentation::BLUR_KERNEL_SIZE,
            min_object_area: segmentation::MIN_OBJECT_AREA,
            morph_radius: segmentation::MORPH_RADIUS,
            selection: RegionSelection::default(),
        }
    }
}

/// Marker channel quantification parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluorescenceConfig {
    /// Lower clipping percentile (0.0-100.0)
    pub percentile_low: f64,

    /// Upper clipping percentile (0.0-100.0)
    pub percentile_high: f64,

    /// Normalized intensity above which a pixel is positive (0.0-1.0)
    pub positive_threshold: f64,
}

impl Default for FluorescenceConfig {
    fn default() -> Self {
        Self {
            percentile_low: fluorescence::PERCENTILE_LOW,
            percentile_high: fluorescence::PERCENTILE_HIGH,
            positive_threshold: fluorescence::POSITIVE_THRESHOLD,
        }
    }
}

/// Overlay appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub marker_color: Srgb<u8>,
    pub contour_color: Srgb<u8>,
    pub label_color: Srgb<u8>,
    pub contour_thickness: i32,
    pub font_scale: f64,
    pub label_thickness: i32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let [mr, mg, mb] = overlay::MARKER_COLOR;
        let [cr, cg, cb] = overlay::CONTOUR_COLOR;
        let [lr, lg, lb] = overlay::LABEL_COLOR;
        Self {
            marker_color: Srgb::new(mr, mg, mb),
            contour_color: Srgb::new(cr, cg, cb),
            label_color: Srgb::new(lr, lg, lb),
            contour_thickness: overlay::CONTOUR_THICKNESS,
            font_scale: overlay::FONT_SCALE,
            label_thickness: overlay::LABEL_THICKNESS,
        }
    }
}

/// Filename conventions for pairing and output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Substring marking a structural-channel image
    pub brightfield_token: String,

    /// Substring marking a marker-channel image
    pub marker_token: String,

    /// Accepted extensions, lowercase, without the dot
    pub extensions: Vec<String>,

    /// Name of the aggregate table written at the output root
    pub results_filename: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            brightfield_token: naming::BRIGHTFIELD_TOKEN.to_string(),
            marker_token: naming::MARKER_TOKEN.to_string(),
            extensions: naming::EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            results_filename: naming::RESULTS_FILENAME.to_string(),
        }
    }
}

impl NamingConfig {
    /// Check an extension against the accepted list, ignoring case
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

impl PipelineConfig {
    /// Create a configuration with default processing parameters
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            threads: ThreadCount::default(),
            use_gfp: default_use_gfp(),
            segmentation: SegmentationConfig::default(),
            fluorescence: FluorescenceConfig::default(),
            overlay: OverlayConfig::default(),
            naming: NamingConfig::default(),
        }
    }

    /// Location of the aggregate result table
    pub fn results_path(&self) -> PathBuf {
        self.output_root.join(&self.naming.results_filename)
    }

    /// Check parameter ranges before any image is touched
    pub fn validate(&self) -> Result<()> {
        let seg = &self.segmentation;
        if seg.blur_kernel_size <= 0 || seg.blur_kernel_size % 2 == 0 {
            return Err(AnalysisError::invalid_parameter(
                "segmentation.blur_kernel_size",
                seg.blur_kernel_size,
            ));
        }
        if seg.min_object_area < 0 {
            return Err(AnalysisError::invalid_parameter(
                "segmentation.min_object_area",
                seg.min_object_area,
            ));
        }
        if seg.morph_radius < 0 {
            return Err(AnalysisError::invalid_parameter(
                "segmentation.morph_radius",
                seg.morph_radius,
            ));
        }

        let fl = &self.fluorescence;
        for (name, value) in [
            ("fluorescence.percentile_low", fl.percentile_low),
            ("fluorescence.percentile_high", fl.percentile_high),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(AnalysisError::invalid_parameter(name, value));
            }
        }
        if fl.percentile_low >= fl.percentile_high {
            return Err(AnalysisError::invalid_parameter(
                "fluorescence.percentile_low",
                format!("{} (>= percentile_high {})", fl.percentile_low, fl.percentile_high),
            ));
        }
        if !(0.0..=1.0).contains(&fl.positive_threshold) {
            return Err(AnalysisError::invalid_parameter(
                "fluorescence.positive_threshold",
                fl.positive_threshold,
            ));
        }

        if self.overlay.contour_thickness <= 0 {
            return Err(AnalysisError::invalid_parameter(
                "overlay.contour_thickness",
                self.overlay.contour_thickness,
            ));
        }

        if self.threads.resolve() == 0 {
            return Err(AnalysisError::invalid_parameter("threads", self.threads));
        }

        let nm = &self.naming;
        if nm.brightfield_token.is_empty() || nm.marker_token.is_empty() {
            return Err(AnalysisError::invalid_parameter(
                "naming",
                "channel tokens must not be empty",
            ));
        }
        if nm.brightfield_token == nm.marker_token {
            return Err(AnalysisError::invalid_parameter(
                "naming.marker_token",
                &nm.marker_token,
            ));
        }

        Ok(())
    }

    /// Load configuration, choosing the format from the file extension
    ///
    /// `.json` files are read as JSON; everything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        }
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            AnalysisError::config(format!("Invalid JSON in {}", path.display()), e)
        })
    }

    /// Load configuration from YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        serde_yml::from_str(&content).map_err(|e| {
            AnalysisError::config(format!("Invalid YAML in {}", path.display()), e)
        })
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::config("Failed to serialize configuration", e))?;
        std::fs::write(path, json).map_err(|e| AnalysisError::io(path, e))
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yml::to_string(self)
            .map_err(|e| AnalysisError::config("Failed to serialize configuration", e))?;
        std::fs::write(path, yaml).map_err(|e| AnalysisError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = "input_root: /data/in\noutput_root: /data/out\nthreads: auto\nuse_gfp: false\n";
        let config: PipelineConfig = serde_yml::from_str(yaml).unwrap();

        assert_eq!(config.input_root, PathBuf::from("/data/in"));
        assert_eq!(config.threads, ThreadCount::Keyword(ThreadKeyword::Auto));
        assert!(!config.use_gfp);
        assert_eq!(config.segmentation, SegmentationConfig::default());
        assert_eq!(config.fluorescence.positive_threshold, 0.85);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_thread_count() {
        let yaml = "input_root: a\noutput_root: b\nthreads: 3\n";
        let config: PipelineConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.threads, ThreadCount::Fixed(3));
        assert_eq!(config.threads.resolve(), 3);
        assert!(config.use_gfp);
    }

    #[test]
    fn test_quoted_thread_count() {
        let yaml = "input_root: a\noutput_root: b\nthreads: \"4\"\n";
        let config: PipelineConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.threads, ThreadCount::Fixed(4));

        let json = r#"{"input_root": "a", "output_root": "b", "threads": "auto"}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.threads, ThreadCount::default());

        let bad = "input_root: a\noutput_root: b\nthreads: many\n";
        assert!(serde_yml::from_str::<PipelineConfig>(bad).is_err());
    }

    #[test]
    fn test_auto_threads_resolve_to_cores() {
        assert!(ThreadCount::default().resolve() >= 1);
    }

    #[test]
    fn test_thread_count_from_str() {
        assert_eq!("auto".parse::<ThreadCount>().unwrap(), ThreadCount::default());
        assert_eq!("AUTO".parse::<ThreadCount>().unwrap(), ThreadCount::default());
        assert_eq!("8".parse::<ThreadCount>().unwrap(), ThreadCount::Fixed(8));
        assert!("many".parse::<ThreadCount>().is_err());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let mut config = PipelineConfig::new("in", "out");
        config.threads = ThreadCount::Fixed(0);
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_even_blur_kernel_rejected() {
        let mut config = PipelineConfig::new("in", "out");
        config.segmentation.blur_kernel_size = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_percentile_order_rejected() {
        let mut config = PipelineConfig::new("in", "out");
        config.fluorescence.percentile_low = 99.0;
        config.fluorescence.percentile_high = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_range_rejected() {
        let mut config = PipelineConfig::new("in", "out");
        config.fluorescence.positive_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = PipelineConfig::new("/in", "/out");
        config.threads = ThreadCount::Fixed(2);
        config.segmentation.selection = RegionSelection::Union;
        config.to_json_file(&path).unwrap();

        let loaded = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_yaml_file_serializes_auto_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");

        PipelineConfig::new("/in", "/out").to_yaml_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("threads: auto"));

        let loaded = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.threads, ThreadCount::default());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineConfig::from_file(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }

    #[test]
    fn test_extension_matching_ignores_case() {
        let naming = NamingConfig::default();
        assert!(naming.accepts_extension("TIF"));
        assert!(naming.accepts_extension("png"));
        assert!(!naming.accepts_extension("bmp"));
    }

    #[test]
    fn test_results_path() {
        let config = PipelineConfig::new("/in", "/out");
        assert_eq!(
            config.results_path(),
            PathBuf::from("/out/organoid_gfp_analysis.csv")
        );
    }
}
