//! Per-pair analysis pipeline
//!
//! Runs normalize → segment → measure → quantify → render strictly in
//! sequence for one image pair and writes that pair's mask and overlay.
//! A pipeline holds only immutable stage parameters, so one instance is
//! shared by every worker of a batch.

use opencv::core::Mat;
use std::path::{Path, PathBuf};

use crate::batch::ImagePair;
use crate::config::PipelineConfig;
use crate::constants::naming::{MASKS_DIR, MASK_PREFIX, OVERLAYS_DIR, OVERLAY_PREFIX};
use crate::detection::{OrganoidMask, OrganoidSegmenter};
use crate::error::Result;
use crate::image_loader::{load_image, save_image};
use crate::measurement::{FluorescenceQuantifier, GeometryExtractor, MarkerAnalysis, RegionProperties};
use crate::preprocessing::ChannelNormalizer;
use crate::render::OverlayRenderer;
use crate::AnalysisRecord;

/// In-memory result of analyzing one pair
#[derive(Debug, Clone)]
pub struct PairAnalysis {
    pub properties: RegionProperties,
    pub marker: MarkerAnalysis,
    pub mask: OrganoidMask,
    /// BGR inspection image
    pub overlay: Mat,
    /// Number of regions left after cleanup, before selection
    pub region_count: usize,
}

/// Where a pair's image outputs are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub mask: PathBuf,
    pub overlay: PathBuf,
}

impl OutputPaths {
    /// `<output_root>/<relative_dir>/{masks,overlays}/{mask,overlay}_<stem>.png`
    pub fn for_pair(output_root: &Path, pair: &ImagePair) -> Self {
        let base = output_root.join(&pair.relative_dir);
        let stem = pair.stem();
        Self {
            mask: base.join(MASKS_DIR).join(format!("{}{}.png", MASK_PREFIX, stem)),
            overlay: base
                .join(OVERLAYS_DIR)
                .join(format!("{}{}.png", OVERLAY_PREFIX, stem)),
        }
    }
}

/// Sequential single-pair pipeline
#[derive(Debug, Clone)]
pub struct PairPipeline {
    normalizer: ChannelNormalizer,
    segmenter: OrganoidSegmenter,
    geometry: GeometryExtractor,
    quantifier: FluorescenceQuantifier,
    renderer: OverlayRenderer,
    output_root: PathBuf,
}

impl PairPipeline {
    /// Build every stage from its own configuration section
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            normalizer: ChannelNormalizer::new(),
            segmenter: OrganoidSegmenter::from_config(&config.segmentation),
            geometry: GeometryExtractor::new(),
            quantifier: FluorescenceQuantifier::from_config(&config.fluorescence),
            renderer: OverlayRenderer::from_config(&config.overlay),
            output_root: config.output_root.clone(),
        }
    }

    /// Analyze already-decoded images without touching the filesystem
    ///
    /// # Arguments
    ///
    /// * `brightfield` - Raw structural-channel image, any bit depth
    /// * `marker` - Raw marker-channel image, if the pair has one
    /// * `label` - Text written onto the overlay
    ///
    /// # Errors
    ///
    /// `NoOrganoidDetected` when segmentation finds nothing, `DimensionMismatch`
    /// when the marker does not match the brightfield, or an OpenCV failure.
    pub fn analyze(&self, brightfield: &Mat, marker: Option<&Mat>, label: &str) -> Result<PairAnalysis> {
        let normalized = self.normalizer.normalize(brightfield)?;
        let segmentation = self.segmenter.segment(&normalized)?;
        let properties = self.geometry.measure(&segmentation.mask)?;
        let marker = self.quantifier.quantify(
            marker,
            &segmentation.mask,
            (properties.centroid_x, properties.centroid_y),
            properties.area,
        )?;
        let overlay = self.renderer.render(
            &normalized,
            &segmentation.mask,
            marker.positive_mask.as_ref(),
            label,
        )?;

        Ok(PairAnalysis {
            properties,
            marker,
            mask: segmentation.mask,
            overlay,
            region_count: segmentation.region_count,
        })
    }

    /// Load, analyze and persist one pair
    ///
    /// Writes the mask and overlay images and returns the rounded record.
    pub fn process_pair(&self, pair: &ImagePair) -> Result<AnalysisRecord> {
        log::info!("Processing: {}", pair.relative_path.display());

        let brightfield = load_image(&pair.brightfield)?;
        let marker = pair.marker.as_deref().map(load_image).transpose()?;

        let analysis = self.analyze(&brightfield, marker.as_ref(), &pair.file_name())?;

        let outputs = self.output_paths(pair);
        save_image(&outputs.mask, analysis.mask.as_mat())?;
        save_image(&outputs.overlay, &analysis.overlay)?;

        Ok(AnalysisRecord::from_measurements(
            pair.relative_path.to_string_lossy(),
            &analysis.properties,
            &analysis.marker.metrics,
        ))
    }

    pub fn output_paths(&self, pair: &ImagePair) -> OutputPaths {
        OutputPaths::for_pair(&self.output_root, pair)
    }
}
