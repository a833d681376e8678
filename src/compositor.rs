//! Drawing-onto-garment compositing
//!
//! A drawing is fitted into the placement box ("contain": aspect preserved,
//! never cropped, transparent letterbox), alpha-blended onto each color's
//! placeholder photo at the box offset and encoded per color. A color that
//! cannot be produced is recorded as a failed outcome; siblings continue.

use crate::{
    config::CompositeConfig,
    error::{MockupError, Result},
    manifest::{is_valid_color_name, PlaceholderManifest},
    services::ImageIOService,
    tracing_config::events,
    types::{BoundingBox, ColorOutcome},
};
use image::{imageops, imageops::FilterType, RgbaImage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Outcome message for a color absent from the manifest
pub const MISSING_IN_MANIFEST: &str = "placeholder not found in manifest";

/// Outcome message for a color that cannot name an output file
pub const INVALID_COLOR_NAME: &str = "invalid color name";

/// Scaled size of a `width x height` image contained in `max_w x max_h`
#[must_use]
pub fn contain_size(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = (f64::from(max_w) / f64::from(width)).min(f64::from(max_h) / f64::from(height));
    let w = (f64::from(width) * scale).round() as u32;
    let h = (f64::from(height) * scale).round() as u32;
    (w.clamp(1, max_w.max(1)), h.clamp(1, max_h.max(1)))
}

/// Fit `drawing` into an exactly `target_w x target_h` transparent canvas
///
/// The drawing is scaled (up or down) to the largest size that fits, keeping
/// its aspect ratio, and centered; the rest of the canvas stays transparent.
#[must_use]
pub fn fit_contain(drawing: &RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(target_w, target_h);
    let (width, height) = drawing.dimensions();
    if width == 0 || height == 0 || target_w == 0 || target_h == 0 {
        return canvas;
    }

    let (fit_w, fit_h) = contain_size(width, height, target_w, target_h);
    let scaled = if (fit_w, fit_h) == (width, height) {
        drawing.clone()
    } else {
        imageops::resize(drawing, fit_w, fit_h, FilterType::Lanczos3)
    };

    let x_offset = (target_w - fit_w) / 2;
    let y_offset = (target_h - fit_h) / 2;
    imageops::replace(&mut canvas, &scaled, i64::from(x_offset), i64::from(y_offset));
    canvas
}

/// Alpha-blend `fitted` onto `placeholder` with its top-left at the box offset
///
/// Parts of the box outside the placeholder are clipped.
pub fn composite_onto(placeholder: &mut RgbaImage, fitted: &RgbaImage, bbox: &BoundingBox) {
    imageops::overlay(placeholder, fitted, bbox.x, bbox.y);
}

/// Per-drawing compositing report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeReport {
    pub drawing: PathBuf,
    pub bbox: BoundingBox,
    pub out_dir: PathBuf,
    pub written: usize,
    pub failed: usize,
    pub results: Vec<ColorOutcome>,
}

/// Compositor bound to an output format and quality
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    config: CompositeConfig,
}

impl Compositor {
    #[must_use]
    pub fn new(config: CompositeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    /// Output extension for the configured format
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.config.format.extension()
    }

    /// Decode `drawing` and fit it into `bbox`
    ///
    /// # Errors
    /// `FileNotFound` when the drawing is missing; decode errors.
    pub async fn prepare_drawing(&self, drawing: &Path, bbox: BoundingBox) -> Result<Arc<RgbaImage>> {
        let path = drawing.to_path_buf();
        let fitted = tokio::task::spawn_blocking(move || -> Result<RgbaImage> {
            let image = ImageIOService::load_rgba(&path)?;
            let fitted = fit_contain(&image, bbox.w, bbox.h);
            debug!(
                drawing = %path.display(),
                source = ?image.dimensions(),
                fitted = ?fitted.dimensions(),
                "Fitted drawing into placement box"
            );
            Ok(fitted)
        })
        .await
        .map_err(|e| MockupError::processing(format!("fit task failed: {e}")))??;
        Ok(Arc::new(fitted))
    }

    /// Composite an already fitted drawing onto one placeholder and write it
    ///
    /// Returns the number of bytes written.
    pub async fn render(
        &self,
        fitted: Arc<RgbaImage>,
        bbox: BoundingBox,
        placeholder: &Path,
        output: &Path,
    ) -> Result<u64> {
        let placeholder = placeholder.to_path_buf();
        let output = output.to_path_buf();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || -> Result<u64> {
            let mut base = ImageIOService::load_rgba(&placeholder)?;
            composite_onto(&mut base, &fitted, &bbox);
            ImageIOService::save_rgba(&base, &output, config.format, config.quality)
        })
        .await
        .map_err(|e| MockupError::processing(format!("render task failed: {e}")))?
    }

    /// Produce one color, turning every failure into a failed outcome
    pub async fn composite_color(
        &self,
        fitted: Arc<RgbaImage>,
        bbox: BoundingBox,
        placeholder_dir: &Path,
        manifest: &PlaceholderManifest,
        color: &str,
        output: &Path,
    ) -> ColorOutcome {
        if !is_valid_color_name(color) {
            events::soft_failure(color, INVALID_COLOR_NAME);
            return ColorOutcome::failed(color, INVALID_COLOR_NAME);
        }
        let Some(placeholder) = manifest.resolve(placeholder_dir, color) else {
            events::soft_failure(color, MISSING_IN_MANIFEST);
            return ColorOutcome::failed(color, MISSING_IN_MANIFEST);
        };

        match self.render(fitted, bbox, &placeholder, output).await {
            Ok(bytes) => {
                debug!(color, output = %output.display(), bytes, "Wrote mockup");
                ColorOutcome::written(color, output.to_path_buf())
            },
            Err(e) => {
                let message = e.to_string();
                events::soft_failure(color, &message);
                ColorOutcome::failed(color, message)
            },
        }
    }

    /// Composite `drawing` onto every color, writing `out_dir/{color}.{ext}`
    ///
    /// # Errors
    /// Only drawing-level failures (missing or undecodable drawing) abort;
    /// per-color problems are recorded in the report.
    pub async fn composite_colors(
        &self,
        drawing: &Path,
        bbox: BoundingBox,
        placeholder_dir: &Path,
        manifest: &PlaceholderManifest,
        colors: &[String],
        out_dir: &Path,
    ) -> Result<CompositeReport> {
        self.config.validate()?;
        let fitted = self.prepare_drawing(drawing, bbox).await?;

        let mut results = Vec::with_capacity(colors.len());
        for color in colors {
            let output = out_dir.join(format!("{}.{}", color, self.extension()));
            let outcome = self
                .composite_color(Arc::clone(&fitted), bbox, placeholder_dir, manifest, color, &output)
                .await;
            results.push(outcome);
        }

        let written = results.iter().filter(|r| r.ok).count();
        Ok(CompositeReport {
            drawing: drawing.to_path_buf(),
            bbox,
            out_dir: out_dir.to_path_buf(),
            written,
            failed: results.len() - written,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::manifest::ManifestItem;
    use image::Rgba;
    use tempfile::TempDir;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn test_contain_size() {
        assert_eq!(contain_size(400, 100, 200, 100), (200, 50));
        assert_eq!(contain_size(100, 400, 200, 100), (25, 100));
        assert_eq!(contain_size(50, 25, 200, 100), (200, 100));
        assert_eq!(contain_size(1, 1000, 10, 10), (1, 10));
    }

    #[test]
    fn test_fit_contain_letterboxes_transparently() {
        let drawing = RgbaImage::from_pixel(400, 100, RED);
        let fitted = fit_contain(&drawing, 200, 100);

        assert_eq!(fitted.dimensions(), (200, 100));
        // Padding above and below the 200x50 drawing
        assert_eq!(fitted.get_pixel(100, 0)[3], 0);
        assert_eq!(fitted.get_pixel(100, 99)[3], 0);
        let center = fitted.get_pixel(100, 50);
        assert!(center[0] > 250 && center[3] > 250);

        let opaque_rows = (0..100).filter(|&y| fitted.get_pixel(100, y)[3] > 0).count();
        assert_eq!(opaque_rows, 50);
    }

    #[test]
    fn test_composite_offset_and_blend() {
        let mut base = RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]));
        let bbox = BoundingBox::new(10, 20, 10, 10).unwrap();
        let fitted = fit_contain(&RgbaImage::from_pixel(10, 10, RED), 10, 10);
        composite_onto(&mut base, &fitted, &bbox);

        assert_eq!(*base.get_pixel(10, 20), RED);
        assert_eq!(*base.get_pixel(19, 29), RED);
        assert_eq!(*base.get_pixel(9, 20), Rgba([255, 255, 255, 255]));
        assert_eq!(*base.get_pixel(20, 30), Rgba([255, 255, 255, 255]));
    }

    fn placeholder_dir(dir: &Path) -> PlaceholderManifest {
        RgbaImage::from_pixel(60, 60, Rgba([250, 250, 250, 255]))
            .save(dir.join("white.png"))
            .unwrap();
        PlaceholderManifest {
            items: vec![ManifestItem {
                color: "white".into(),
                filename: "white.png".into(),
            }],
        }
    }

    #[tokio::test]
    async fn test_missing_manifest_entry_is_soft() {
        let dir = TempDir::new().unwrap();
        let manifest = placeholder_dir(dir.path());
        let drawing = dir.path().join("darth.png");
        RgbaImage::from_pixel(20, 30, RED).save(&drawing).unwrap();

        let compositor = Compositor::new(CompositeConfig::builder().format(OutputFormat::Png).build().unwrap());
        let colors = vec!["white".to_string(), "black".to_string()];
        let out = dir.path().join("out");
        let report = compositor
            .composite_colors(
                &drawing,
                BoundingBox::new(5, 5, 20, 30).unwrap(),
                dir.path(),
                &manifest,
                &colors,
                &out,
            )
            .await
            .unwrap();

        assert_eq!(report.written, 1);
        assert_eq!(report.failed, 1);
        assert!(out.join("white.png").exists());
        let black = &report.results[1];
        assert!(!black.ok);
        assert_eq!(black.error.as_deref(), Some(MISSING_IN_MANIFEST));
    }

    #[tokio::test]
    async fn test_color_with_path_segments_is_soft() {
        let dir = TempDir::new().unwrap();
        let mut manifest = placeholder_dir(dir.path());
        manifest.items.push(ManifestItem {
            color: "../escaped".into(),
            filename: "white.png".into(),
        });
        let drawing = dir.path().join("darth.png");
        RgbaImage::from_pixel(20, 30, RED).save(&drawing).unwrap();

        let compositor = Compositor::new(CompositeConfig::builder().format(OutputFormat::Png).build().unwrap());
        let out = dir.path().join("out").join("darth");
        let colors = vec!["../escaped".to_string(), "white".to_string()];
        let report = compositor
            .composite_colors(
                &drawing,
                BoundingBox::new(5, 5, 20, 30).unwrap(),
                dir.path(),
                &manifest,
                &colors,
                &out,
            )
            .await
            .unwrap();

        assert_eq!((report.written, report.failed), (1, 1));
        assert_eq!(report.results[0].error.as_deref(), Some(INVALID_COLOR_NAME));
        assert!(!dir.path().join("out").join("escaped.png").exists());
        assert!(out.join("white.png").exists());
    }

    #[tokio::test]
    async fn test_missing_placeholder_file_is_soft() {
        let dir = TempDir::new().unwrap();
        let manifest = PlaceholderManifest {
            items: vec![ManifestItem {
                color: "navy".into(),
                filename: "navy.png".into(),
            }],
        };
        let drawing = dir.path().join("d.png");
        RgbaImage::from_pixel(4, 4, RED).save(&drawing).unwrap();

        let report = Compositor::default()
            .composite_colors(
                &drawing,
                BoundingBox::new(0, 0, 4, 4).unwrap(),
                dir.path(),
                &manifest,
                &["navy".to_string()],
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
        assert!(report.results[0].error.as_deref().unwrap().contains("navy.png"));
    }

    #[tokio::test]
    async fn test_missing_drawing_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = Compositor::default()
            .composite_colors(
                &dir.path().join("none.png"),
                BoundingBox::new(0, 0, 4, 4).unwrap(),
                dir.path(),
                &PlaceholderManifest::default(),
                &[],
                dir.path(),
            )
            .await;
        assert!(matches!(result, Err(MockupError::FileNotFound(_))));
    }
}
