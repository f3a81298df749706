//! Error types for the organoid_scan library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for organoid_scan operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Error taxonomy for segmentation, measurement and batch execution
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Image file could not be loaded or decoded
    #[error("Failed to load image: {message}")]
    ImageLoadError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Mask or overlay image could not be encoded or written
    #[error("Failed to write image: {message}")]
    ImageWriteError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No connected component survived thresholding and cleanup
    #[error("No organoid detected: {reason}")]
    NoOrganoidDetected { reason: String },

    /// Marker channel does not match the brightfield geometry
    #[error("Image dimensions differ: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (i32, i32),
        actual: (i32, i32),
    },

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// Generic processing error
    #[error("Processing error: {message}")]
    ProcessingError { message: String },

    /// OpenCV operation failed
    #[error("OpenCV error: {operation}")]
    OpenCvError {
        operation: String,
        #[source]
        source: Option<opencv::Error>,
    },

    /// Filesystem access failed
    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnalysisError {
    /// Create an image load error with context
    pub fn image_load<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageLoadError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an image write error with context
    pub fn image_write<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageWriteError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error with context
    pub fn config<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConfigError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an OpenCV error with context
    pub fn opencv(operation: impl Into<String>, source: opencv::Error) -> Self {
        Self::OpenCvError {
            operation: operation.into(),
            source: Some(source),
        }
    }

    /// Create an I/O error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a processing error from a message
    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Check if this error is confined to a single image pair
    ///
    /// Recoverable errors skip the pair and let the batch continue.
    /// Configuration and parameter errors abort before any work is scheduled.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AnalysisError::ConfigError { .. } | AnalysisError::InvalidParameter { .. }
        )
    }

    /// Check if this error is the expected "nothing to measure" outcome
    pub fn is_no_organoid(&self) -> bool {
        matches!(self, AnalysisError::NoOrganoidDetected { .. })
    }

    /// Get user-friendly error description for log and console output
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::ImageLoadError { .. } => {
                "Could not read the image. Check the file format and permissions.".to_string()
            }
            AnalysisError::NoOrganoidDetected { .. } => {
                "No organoid found after thresholding and cleanup.".to_string()
            }
            AnalysisError::DimensionMismatch { expected, actual } => format!(
                "Marker image is {}x{} but brightfield is {}x{}.",
                actual.0, actual.1, expected.0, expected.1
            ),
            AnalysisError::ConfigError { .. } | AnalysisError::InvalidParameter { .. } => {
                "The configuration is invalid. Fix it and re-run.".to_string()
            }
            AnalysisError::ImageWriteError { .. } | AnalysisError::Io { .. } => {
                "Could not write results to the output directory.".to_string()
            }
            _ => "Image analysis failed for this pair.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let skip = AnalysisError::NoOrganoidDetected {
            reason: "empty mask".into(),
        };
        assert!(skip.is_recoverable());
        assert!(skip.is_no_organoid());

        let mismatch = AnalysisError::DimensionMismatch {
            expected: (10, 10),
            actual: (12, 10),
        };
        assert!(mismatch.is_recoverable());
        assert!(!mismatch.is_no_organoid());

        let fatal = AnalysisError::invalid_parameter("threads", 0);
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn test_io_error_display() {
        let err = AnalysisError::io(
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/missing"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_user_message_mentions_dimensions() {
        let err = AnalysisError::DimensionMismatch {
            expected: (640, 480),
            actual: (320, 240),
        };
        let message = err.user_message();
        assert!(message.contains("320x240"));
        assert!(message.contains("640x480"));
    }
}
