//! Core types shared by the pipeline stages

use crate::error::{MockupError, Result};
use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Calibrated placement of a drawing inside a placeholder photo
///
/// Coordinates are pixels in the placeholder's own coordinate space. The
/// offset may be negative (partially off-canvas); the size is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub w: u32,
    pub h: u32,
}

/// Unvalidated bounding box as it appears in calibration and profile files
#[derive(Debug, Clone, Copy, Deserialize)]
struct RawBoundingBox {
    x: f64,
    y: f64,
    #[serde(alias = "width")]
    w: f64,
    #[serde(alias = "height")]
    h: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = MockupError;

    fn try_from(raw: RawBoundingBox) -> Result<Self> {
        Self::from_f64(raw.x, raw.y, raw.w, raw.h)
    }
}

impl BoundingBox {
    /// Create a bounding box from integer pixel values
    pub fn new(x: i64, y: i64, w: u32, h: u32) -> Result<Self> {
        if w == 0 || h == 0 {
            return Err(MockupError::invalid_bbox(format!(
                "width and height must be > 0 (got w={w}, h={h})"
            )));
        }
        Ok(Self { x, y, w, h })
    }

    /// Create a bounding box from arbitrary numbers, rounding to whole pixels
    pub fn from_f64(x: f64, y: f64, w: f64, h: f64) -> Result<Self> {
        for (name, value) in [("x", x), ("y", y), ("w", w), ("h", h)] {
            if !value.is_finite() {
                return Err(MockupError::invalid_bbox(format!("{name} is not a finite number")));
            }
        }
        if w <= 0.0 || h <= 0.0 {
            return Err(MockupError::invalid_bbox(format!(
                "width and height must be > 0 (got w={w}, h={h})"
            )));
        }
        if w.round() > f64::from(u32::MAX) || h.round() > f64::from(u32::MAX) {
            return Err(MockupError::invalid_bbox("width or height out of range"));
        }
        Self::new(
            x.round() as i64,
            y.round() as i64,
            w.round() as u32,
            h.round() as u32,
        )
    }

    /// Parse a literal `"x,y,w,h"` string
    pub fn parse(literal: &str) -> Result<Self> {
        let parts: Vec<&str> = literal.split(',').map(str::trim).collect();
        let [x, y, w, h] = parts.as_slice() else {
            return Err(MockupError::invalid_bbox(format!(
                "expected \"x,y,w,h\", got \"{literal}\""
            )));
        };
        let number = |name: &str, value: &str| -> Result<f64> {
            value
                .parse::<f64>()
                .map_err(|_| MockupError::invalid_bbox(format!("{name} is not a number: \"{value}\"")))
        };
        Self::from_f64(number("x", x)?, number("y", y)?, number("w", w)?, number("h", h)?)
    }

    /// Parse a bounding box out of a JSON object
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value::<Self>(value.clone())
            .map_err(|e| MockupError::invalid_bbox(e.to_string()))
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.w, self.h)
    }
}

/// Binary background mask over a raster, one byte per pixel (`1` = background)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundMask {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl BackgroundMask {
    /// Empty (all-foreground) mask
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize],
            width,
            height,
        }
    }

    /// Build a mask from raw 0/1 bytes in row-major order
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if data.len() != width as usize * height as usize {
            return Err(MockupError::processing(format!(
                "mask data length {} does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        let data = data.into_iter().map(|v| u8::from(v != 0)).collect();
        Ok(Self { data, width, height })
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Whether the pixel at linear index `idx` is background
    #[must_use]
    pub fn is_background_index(&self, idx: usize) -> bool {
        self.data.get(idx).is_some_and(|&v| v != 0)
    }

    /// Whether the pixel at `(x, y)` is background; out-of-range reads as foreground
    #[must_use]
    pub fn is_background(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.is_background_index(y as usize * self.width as usize + x as usize)
    }

    pub(crate) fn mark_index(&mut self, idx: usize) {
        if let Some(slot) = self.data.get_mut(idx) {
            *slot = 1;
        }
    }

    /// Number of background pixels
    #[must_use]
    pub fn background_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Render as a grayscale image (background = 255)
    #[must_use]
    pub fn to_image(&self) -> GrayImage {
        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            Luma([if self.is_background(x, y) { 255 } else { 0 }])
        })
    }

    /// Resample to new dimensions (nearest neighbour, re-thresholded at 128)
    #[must_use]
    pub fn resize(&self, new_width: u32, new_height: u32) -> BackgroundMask {
        if (new_width, new_height) == (self.width, self.height) {
            return self.clone();
        }
        let resized = image::imageops::resize(
            &self.to_image(),
            new_width,
            new_height,
            image::imageops::FilterType::Nearest,
        );
        let data = resized.as_raw().iter().map(|&v| u8::from(v >= 128)).collect();
        BackgroundMask {
            data,
            width: new_width,
            height: new_height,
        }
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let background_pixels = self.background_count();
        let background_ratio = if total_pixels == 0 {
            0.0
        } else {
            background_pixels as f32 / total_pixels as f32
        };
        MaskStatistics {
            total_pixels,
            background_pixels,
            foreground_pixels: total_pixels - background_pixels,
            background_ratio,
        }
    }
}

/// Statistics about a background mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub background_pixels: usize,
    pub foreground_pixels: usize,
    pub background_ratio: f32,
}

/// One compositing unit of work: a drawing on one garment color
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositingJob {
    pub collection: String,
    pub design: String,
    pub ink: String,
    pub drawing_file: PathBuf,
    pub bbox: BoundingBox,
    pub color: String,
}

impl CompositingJob {
    /// `collection/design/ink/color.ext` below the output root
    #[must_use]
    pub fn relative_output(&self, extension: &str) -> PathBuf {
        PathBuf::from(&self.collection)
            .join(&self.design)
            .join(&self.ink)
            .join(format!("{}.{}", self.color, extension))
    }
}

/// Per-color compositing outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorOutcome {
    pub color: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ColorOutcome {
    #[must_use]
    pub fn written(color: &str, output: PathBuf) -> Self {
        Self {
            color: color.to_string(),
            ok: true,
            output: Some(output),
            error: None,
        }
    }

    #[must_use]
    pub fn failed<S: Into<String>>(color: &str, error: S) -> Self {
        Self {
            color: color.to_string(),
            ok: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// A design that was found on disk but has no placement profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingProfile {
    pub collection: String,
    pub design: String,
    pub inks: Vec<String>,
}

/// A drawing dropped because another file in the same ink folder produced the same slug
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateDrawing {
    pub collection: String,
    pub ink: String,
    pub design: String,
    pub kept: PathBuf,
    pub dropped: PathBuf,
}
