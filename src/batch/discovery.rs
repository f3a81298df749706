//! Input discovery and channel pairing
//!
//! Walks the input tree for structural-channel images (filename contains the
//! brightfield token but not the marker token, accepted extension) and pairs
//! each with the file whose name has the token swapped for the marker token.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::NamingConfig;
use crate::error::{AnalysisError, Result};

/// One unit of batch work
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImagePair {
    /// Structural-channel image
    pub brightfield: PathBuf,
    /// Marker-channel image, present only when enabled and found on disk
    pub marker: Option<PathBuf>,
    /// Directory of `brightfield` relative to the input root
    pub relative_dir: PathBuf,
    /// `brightfield` relative to the input root, used as the record filename
    pub relative_path: PathBuf,
}

impl ImagePair {
    /// Build a pair for a brightfield image under `input_root`
    ///
    /// Paths outside `input_root` fall back to the bare file name.
    pub fn new(brightfield: PathBuf, marker: Option<PathBuf>, input_root: &Path) -> Self {
        let relative_path = brightfield
            .strip_prefix(input_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| brightfield.file_name().map(PathBuf::from).unwrap_or_default());
        let relative_dir = relative_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            brightfield,
            marker,
            relative_dir,
            relative_path,
        }
    }

    /// Brightfield file stem, used to name mask and overlay outputs
    pub fn stem(&self) -> String {
        self.brightfield
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Brightfield file name, used as the overlay label
    pub fn file_name(&self) -> String {
        self.brightfield
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Expected marker-channel path for a brightfield image
pub fn marker_path_for(brightfield: &Path, naming: &NamingConfig) -> Option<PathBuf> {
    let name = brightfield.file_name()?.to_str()?;
    if !name.contains(&naming.brightfield_token) {
        return None;
    }
    Some(brightfield.with_file_name(name.replace(&naming.brightfield_token, &naming.marker_token)))
}

/// True if `path` names a structural-channel image
pub fn is_brightfield(path: &Path, naming: &NamingConfig) -> bool {
    let accepted = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| naming.accepts_extension(e))
        .unwrap_or(false);
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    accepted && name.contains(&naming.brightfield_token) && !name.contains(&naming.marker_token)
}

/// Collect all image pairs under `input_root`, sorted by brightfield path
///
/// # Errors
///
/// Returns `AnalysisError::Io` if `input_root` cannot be read. Unreadable
/// subdirectories are logged and skipped.
pub fn collect_image_pairs(
    input_root: &Path,
    naming: &NamingConfig,
    use_marker: bool,
) -> Result<Vec<ImagePair>> {
    if !input_root.is_dir() {
        return Err(AnalysisError::io(
            input_root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "input root is not a directory"),
        ));
    }

    let mut files = Vec::new();
    walk(input_root, true, &mut files)?;
    files.sort();

    let pairs: Vec<ImagePair> = files
        .into_iter()
        .filter(|path| is_brightfield(path, naming))
        .map(|path| {
            let marker = if use_marker {
                marker_path_for(&path, naming).filter(|m| m.is_file())
            } else {
                None
            };
            if use_marker && marker.is_none() {
                log::debug!("No marker image for {}", path.display());
            }
            ImagePair::new(path, marker, input_root)
        })
        .collect();

    log::info!(
        "Found {} brightfield image(s) under {}",
        pairs.len(),
        input_root.display()
    );
    Ok(pairs)
}

fn walk(dir: &Path, is_root: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if is_root => return Err(AnalysisError::io(dir, e)),
        Err(e) => {
            log::warn!("Skipping unreadable directory {}: {}", dir.display(), e);
            return Ok(());
        }
    };

    for entry in entries {
        let entry = entry.map_err(|e| AnalysisError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| AnalysisError::io(entry.path(), e))?;
        if file_type.is_dir() {
            walk(&entry.path(), false, files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_brightfield_filter() {
        let naming = NamingConfig::default();
        assert!(is_brightfield(Path::new("a/well_BRIGHTFIELD.tif"), &naming));
        assert!(is_brightfield(Path::new("a/well_BRIGHTFIELD.TIFF"), &naming));
        assert!(!is_brightfield(Path::new("a/well_GFP.tif"), &naming));
        assert!(!is_brightfield(Path::new("a/well_BRIGHTFIELD_GFP.tif"), &naming));
        assert!(!is_brightfield(Path::new("a/well_BRIGHTFIELD.bmp"), &naming));
        assert!(!is_brightfield(Path::new("a/well.png"), &naming));
    }

    #[test]
    fn test_marker_path_swaps_token() {
        let naming = NamingConfig::default();
        assert_eq!(
            marker_path_for(Path::new("/d/plate1_BRIGHTFIELD_t0.png"), &naming),
            Some(PathBuf::from("/d/plate1_GFP_t0.png"))
        );
    }

    #[test]
    fn test_collect_pairs_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b/well2_BRIGHTFIELD.png"));
        touch(&root.join("b/well2_GFP.png"));
        touch(&root.join("a/sub/well1_BRIGHTFIELD.tif"));
        touch(&root.join("a/sub/notes.txt"));
        touch(&root.join("well3_GFP.png"));

        let naming = NamingConfig::default();
        let pairs = collect_image_pairs(root, &naming, true).unwrap();
        assert_eq!(pairs.len(), 2);

        assert_eq!(pairs[0].relative_path, PathBuf::from("a/sub/well1_BRIGHTFIELD.tif"));
        assert_eq!(pairs[0].relative_dir, PathBuf::from("a/sub"));
        assert_eq!(pairs[0].marker, None);
        assert_eq!(pairs[0].stem(), "well1_BRIGHTFIELD");

        assert_eq!(pairs[1].marker, Some(root.join("b/well2_GFP.png")));

        let without = collect_image_pairs(root, &naming, false).unwrap();
        assert!(without.iter().all(|p| p.marker.is_none()));
    }

    #[test]
    fn test_missing_root_is_error() {
        let err = collect_image_pairs(Path::new("/no/such/root"), &NamingConfig::default(), true)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }

    #[test]
    fn test_pair_outside_root_uses_file_name() {
        let pair = ImagePair::new(PathBuf::from("/elsewhere/x_BRIGHTFIELD.png"), None, Path::new("/root"));
        assert_eq!(pair.relative_path, PathBuf::from("x_BRIGHTFIELD.png"));
        assert_eq!(pair.relative_dir, PathBuf::new());
    }
}
