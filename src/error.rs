//! Error types for mockup pipeline operations

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for mockup pipeline operations
pub type Result<T> = std::result::Result<T, MockupError>;

/// Error taxonomy shared by every pipeline stage
///
/// Only setup failures travel as `Err`. Per-item failures (a color missing from
/// the manifest, an unreadable placeholder) are recorded in reports instead.
#[derive(Error, Debug)]
pub enum MockupError {
    /// Input/output errors (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Malformed JSON in a profiles, manifest, colors or plan file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required file or directory does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Bounding box rejected by validation
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing or malformed command-line input
    #[error("Usage error: {0}")]
    Usage(String),

    /// Pixel or encoding pipeline errors
    #[error("Processing error: {0}")]
    Processing(String),
}

impl MockupError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid bounding box error
    pub fn invalid_bbox<S: Into<String>>(msg: S) -> Self {
        Self::InvalidBoundingBox(msg.into())
    }

    /// Create a new usage error
    pub fn usage<S: Into<String>>(msg: S) -> Self {
        Self::Usage(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a file-not-found error for `path`
    pub fn file_not_found<P: AsRef<Path>>(path: P) -> Self {
        Self::FileNotFound(path.as_ref().to_path_buf())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::NotFound {
            return Self::file_not_found(path);
        }
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }
}
