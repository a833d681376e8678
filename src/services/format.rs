//! Output format handling service
//!
//! PNG goes through the `image` crate encoder; lossy WebP with alpha goes
//! through libwebp since the pure-Rust encoder is lossless only.

use crate::{
    config::OutputFormat,
    error::{MockupError, Result},
};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

/// Service for encoding RGBA buffers into output formats
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an RGBA image into `format`
    ///
    /// `quality` (0-100) only applies to WebP.
    ///
    /// # Examples
    /// ```rust
    /// use mockup_pipeline::{config::OutputFormat, services::OutputFormatHandler};
    /// use image::RgbaImage;
    ///
    /// let bytes = OutputFormatHandler::encode(&RgbaImage::new(8, 8), OutputFormat::Png, 92)?;
    /// assert_eq!(&bytes[1..4], b"PNG");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode(image: &RgbaImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Png => Self::encode_png(image),
            OutputFormat::WebP => Self::encode_webp(image, quality),
        }
    }

    fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    fn encode_webp(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(MockupError::processing_stage_error(
                "webp encoding",
                "cannot encode an empty image",
                Some(&format!("{width}x{height}")),
            ));
        }
        let encoder = webp::Encoder::from_rgba(image.as_raw(), width, height);
        let memory = encoder.encode(f32::from(quality.min(100)));
        Ok(memory.to_vec())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(16, 8, |x, _| {
            if x < 8 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn test_png_preserves_alpha() {
        let bytes = OutputFormatHandler::encode(&sample(), OutputFormat::Png, 0).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0)[3], 255);
        assert_eq!(decoded.get_pixel(15, 0)[3], 0);
    }

    #[test]
    fn test_webp_container() {
        let bytes = OutputFormatHandler::encode(&sample(), OutputFormat::WebP, 92).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_webp_rejects_empty() {
        let err = OutputFormatHandler::encode(&RgbaImage::new(0, 0), OutputFormat::WebP, 92);
        assert!(err.is_err());
    }
}
