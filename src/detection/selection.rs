//! Region selection policies
//!
//! Cleanup can leave more than one disjoint region. The policy decides which
//! labels make up "the organoid". Every policy is deterministic: ties go to
//! the lowest label, and labels follow raster-scan order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::detection::components::ComponentStats;
use crate::error::AnalysisError;

/// Which surviving region(s) form the organoid mask
///
/// `Largest` is the default. `Union` measures every surviving region as one
/// mask, which is how the legacy batch script computed its table; select it
/// when comparing against CSVs produced by that tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSelection {
    /// Region with the largest pixel area
    #[default]
    Largest,
    /// Every surviving region, measured together (legacy behaviour)
    Union,
    /// Region whose first pixel comes first in raster order
    FirstLabel,
    /// Region whose centroid is nearest the image centre
    ClosestToCenter,
}

impl RegionSelection {
    /// Pick labels from `components`; empty input yields an empty selection
    ///
    /// `image_size` is (width, height) and is only used by `ClosestToCenter`.
    pub fn select(&self, components: &[ComponentStats], image_size: (i32, i32)) -> Vec<i32> {
        if components.is_empty() {
            return Vec::new();
        }

        match self {
            RegionSelection::Union => components.iter().map(|c| c.label).collect(),
            RegionSelection::FirstLabel => components
                .iter()
                .map(|c| c.label)
                .min()
                .into_iter()
                .collect(),
            RegionSelection::Largest => {
                let mut best = &components[0];
                for c in &components[1..] {
                    if c.area > best.area || (c.area == best.area && c.label < best.label) {
                        best = c;
                    }
                }
                vec![best.label]
            }
            RegionSelection::ClosestToCenter => {
                let cx = (image_size.0 as f64 - 1.0) / 2.0;
                let cy = (image_size.1 as f64 - 1.0) / 2.0;
                let dist = |c: &ComponentStats| (c.centroid.0 - cx).hypot(c.centroid.1 - cy);

                let mut best = &components[0];
                let mut best_dist = dist(best);
                for c in &components[1..] {
                    let d = dist(c);
                    if d < best_dist || (d == best_dist && c.label < best.label) {
                        best = c;
                        best_dist = d;
                    }
                }
                vec![best.label]
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionSelection::Largest => "largest",
            RegionSelection::Union => "union",
            RegionSelection::FirstLabel => "first_label",
            RegionSelection::ClosestToCenter => "closest_to_center",
        }
    }
}

impl fmt::Display for RegionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionSelection {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "largest" => Ok(RegionSelection::Largest),
            "union" => Ok(RegionSelection::Union),
            "first_label" | "first" => Ok(RegionSelection::FirstLabel),
            "closest_to_center" | "center" => Ok(RegionSelection::ClosestToCenter),
            _ => Err(AnalysisError::invalid_parameter("selection", s)),
        }
    }
}
