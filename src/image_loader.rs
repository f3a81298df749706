//! Image decoding and encoding through OpenCV
//!
//! Inputs are read with `IMREAD_UNCHANGED` so 12/16-bit microscopy frames keep
//! their full dynamic range until the normalizer rescales them. Color files
//! are reduced to a single luminance channel; everything downstream works on
//! single-channel images.

use crate::error::{AnalysisError, Result};
use opencv::{
    core::{Mat, Vector},
    imgcodecs, imgproc,
    prelude::*,
};
use std::path::Path;

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        AnalysisError::processing(format!("Path is not valid UTF-8: {}", path.display()))
    })
}

/// Load an image from disk without altering bit depth or channel count
///
/// # Errors
///
/// Returns `AnalysisError::ImageLoadError` if the file is missing or cannot
/// be decoded (OpenCV returns an empty Mat in that case).
pub fn load_image(path: &Path) -> Result<Mat> {
    if !path.is_file() {
        return Err(AnalysisError::image_load(
            format!("File not found: {}", path.display()),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }

    let mat = imgcodecs::imread(path_str(path)?, imgcodecs::IMREAD_UNCHANGED)
        .map_err(|e| AnalysisError::image_load(format!("Failed to decode {}", path.display()), e))?;

    if mat.empty() {
        return Err(AnalysisError::ImageLoadError {
            message: format!("Unreadable image: {}", path.display()),
            source: None,
        });
    }

    Ok(mat)
}

/// Convert a 3- or 4-channel image to grayscale; single-channel input is copied
pub fn to_single_channel(image: &Mat) -> Result<Mat> {
    let code = match image.channels() {
        1 => {
            return image
                .try_clone()
                .map_err(|e| AnalysisError::opencv("clone single-channel image", e))
        }
        3 => imgproc::COLOR_BGR2GRAY,
        4 => imgproc::COLOR_BGRA2GRAY,
        n => {
            return Err(AnalysisError::processing(format!(
                "Unsupported channel count: {}",
                n
            )))
        }
    };

    let mut gray = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, code)
        .map_err(|e| AnalysisError::opencv("grayscale conversion", e))?;
    Ok(gray)
}

/// Encode an image to disk, creating parent directories as needed
pub fn save_image(path: &Path, image: &Mat) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AnalysisError::io(parent, e))?;
    }

    let written = imgcodecs::imwrite(path_str(path)?, image, &Vector::new())
        .map_err(|e| AnalysisError::image_write(format!("Failed to encode {}", path.display()), e))?;

    if !written {
        return Err(AnalysisError::ImageWriteError {
            message: format!("Encoder refused {}", path.display()),
            source: None,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, Vec3b, CV_16UC1, CV_8UC1, CV_8UC3};

    #[test]
    fn test_missing_file_is_load_error() {
        let err = load_image(Path::new("/no/such/image_BRIGHTFIELD.png")).unwrap_err();
        assert!(matches!(err, AnalysisError::ImageLoadError { .. }));
    }

    #[test]
    fn test_corrupt_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, AnalysisError::ImageLoadError { .. }));
    }

    #[test]
    fn test_sixteen_bit_png_keeps_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep.png");

        let image = Mat::new_rows_cols_with_default(8, 8, CV_16UC1, Scalar::all(40000.0)).unwrap();
        save_image(&path, &image).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.typ(), CV_16UC1);
        assert_eq!(*loaded.at_2d::<u16>(3, 3).unwrap(), 40000);
    }

    #[test]
    fn test_color_input_reduced_to_one_channel() {
        let mut image = Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::all(0.0)).unwrap();
        *image.at_2d_mut::<Vec3b>(1, 1).unwrap() = Vec3b::from([255, 255, 255]);

        let gray = to_single_channel(&image).unwrap();
        assert_eq!(gray.typ(), CV_8UC1);
        assert_eq!(*gray.at_2d::<u8>(1, 1).unwrap(), 255);
        assert_eq!(*gray.at_2d::<u8>(0, 0).unwrap(), 0);
    }
}
