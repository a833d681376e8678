//! Border-seeded background segmentation
//!
//! Classifies near-white, low-chroma pixels and flood-fills from the image
//! border so only background *connected to the edge* is removed. Light regions
//! enclosed by the garment or the print survive even when their color matches.

use crate::{
    config::{BackgroundThreshold, OutputFormat, SegmentationConfig},
    error::{MockupError, Result},
    services::ImageIOService,
    tracing_config::spans,
    types::{BackgroundMask, MaskStatistics},
};
use image::RgbaImage;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Instrument};

/// Background predicate for a single pixel
///
/// True iff Rec. 709 luma is at least `luma_min`, chroma (max - min channel)
/// is at most `max_chroma`, and the darkest channel is at least `min_channel`.
///
/// ```rust
/// use mockup_pipeline::{config::BackgroundThreshold, segmentation::is_background_like};
///
/// let t = BackgroundThreshold::default();
/// assert!(is_background_like(255, 255, 255, &t));
/// assert!(!is_background_like(100, 100, 100, &t));
/// ```
#[must_use]
pub fn is_background_like(r: u8, g: u8, b: u8, threshold: &BackgroundThreshold) -> bool {
    let luma = 0.2126 * f32::from(r) + 0.7152 * f32::from(g) + 0.0722 * f32::from(b);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    luma >= f32::from(threshold.luma_min)
        && max - min <= threshold.max_chroma
        && min >= threshold.min_channel
}

/// Compute the border-connected background mask of `image`
///
/// Every border pixel that passes the predicate seeds a breadth-first search
/// over 4-connected neighbours; neighbours join the mask only if they pass the
/// predicate too. Alpha is ignored.
#[must_use]
pub fn compute_background_mask(image: &RgbaImage, threshold: &BackgroundThreshold) -> BackgroundMask {
    let (width, height) = image.dimensions();
    let mut mask = BackgroundMask::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    let w = width as usize;
    let h = height as usize;
    let qualifies = |idx: usize| -> bool {
        let px = image.get_pixel((idx % w) as u32, (idx / w) as u32);
        is_background_like(px[0], px[1], px[2], threshold)
    };

    let mut visited = vec![false; w * h];
    let mut queue = VecDeque::<usize>::new();

    let mut seed = |idx: usize, visited: &mut [bool], queue: &mut VecDeque<usize>| {
        if let Some(seen) = visited.get_mut(idx) {
            if !*seen {
                *seen = true;
                if qualifies(idx) {
                    mask.mark_index(idx);
                    queue.push_back(idx);
                }
            }
        }
    };

    for x in 0..w {
        seed(x, &mut visited, &mut queue);
        seed((h - 1) * w + x, &mut visited, &mut queue);
    }
    for y in 0..h {
        seed(y * w, &mut visited, &mut queue);
        seed(y * w + w - 1, &mut visited, &mut queue);
    }

    while let Some(idx) = queue.pop_front() {
        let x = idx % w;
        let y = idx / w;
        let mut neighbours = [None; 4];
        if x > 0 {
            neighbours[0] = Some(idx - 1);
        }
        if x + 1 < w {
            neighbours[1] = Some(idx + 1);
        }
        if y > 0 {
            neighbours[2] = Some(idx - w);
        }
        if y + 1 < h {
            neighbours[3] = Some(idx + w);
        }
        for next in neighbours.into_iter().flatten() {
            seed(next, &mut visited, &mut queue);
        }
    }

    mask
}

/// Whether any 4-neighbour of `(x, y)` is background
fn touches_background(mask: &BackgroundMask, x: u32, y: u32) -> bool {
    (x > 0 && mask.is_background(x - 1, y))
        || mask.is_background(x + 1, y)
        || (y > 0 && mask.is_background(x, y - 1))
        || mask.is_background(x, y + 1)
}

/// Copy of `image` with alpha derived from `mask`
///
/// Background pixels get alpha 0, everything else 255. With `feather_alpha`
/// set, foreground pixels that have a background 4-neighbour get that alpha
/// instead, giving a one pixel soft ring.
pub fn apply_mask(image: &RgbaImage, mask: &BackgroundMask, feather_alpha: Option<u8>) -> Result<RgbaImage> {
    if image.dimensions() != mask.dimensions() {
        return Err(MockupError::processing_stage_error(
            "alpha derivation",
            "mask dimensions do not match image",
            Some(&format!("image {:?}, mask {:?}", image.dimensions(), mask.dimensions())),
        ));
    }

    let mut output = image.clone();
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        pixel[3] = if mask.is_background(x, y) {
            0
        } else {
            match feather_alpha {
                Some(alpha) if touches_background(mask, x, y) => alpha,
                _ => 255,
            }
        };
    }
    Ok(output)
}

/// Segment `image` and derive its alpha in one step
pub fn remove_background(image: &RgbaImage, config: &SegmentationConfig) -> Result<(RgbaImage, BackgroundMask)> {
    config.validate()?;
    let mask = compute_background_mask(image, &config.threshold);
    let feather = config.feather.then_some(config.feather_alpha);
    let output = apply_mask(image, &mask, feather)?;
    Ok((output, mask))
}

/// Reapply a mask computed on a reference image to `target`
///
/// The reference mask is resampled to the target size when they differ.
pub fn reuse_mask(
    target: &RgbaImage,
    reference_mask: &BackgroundMask,
    config: &SegmentationConfig,
) -> Result<(RgbaImage, BackgroundMask)> {
    config.validate()?;
    let (width, height) = target.dimensions();
    let mask = reference_mask.resize(width, height);
    let feather = config.feather.then_some(config.feather_alpha);
    let output = apply_mask(target, &mask, feather)?;
    Ok((output, mask))
}

/// Report for one background removal run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Image the mask was computed from (the input itself unless reused)
    pub mask_source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub feathered: bool,
    pub statistics: MaskStatistics,
}

/// File-level background removal: decode, segment, write a PNG with alpha
#[derive(Debug, Clone, Default)]
pub struct BackgroundRemover {
    config: SegmentationConfig,
}

impl BackgroundRemover {
    #[must_use]
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Remove the background of `input` and write `output` as PNG
    ///
    /// With `mask_from`, the mask is computed on that image instead and
    /// resized onto `input`.
    ///
    /// # Errors
    /// `FileNotFound` for a missing input or reference, decode and write errors.
    pub async fn process_file(
        &self,
        input: &Path,
        output: &Path,
        mask_from: Option<&Path>,
    ) -> Result<RemovalReport> {
        let span = spans::segmentation(input);
        async move {
            self.config.validate()?;
            if !input.is_file() {
                return Err(MockupError::file_not_found(input));
            }
            if let Some(reference) = mask_from {
                if !reference.is_file() {
                    return Err(MockupError::file_not_found(reference));
                }
            }

            let config = self.config.clone();
            let input_path = input.to_path_buf();
            let output_path = output.to_path_buf();
            let reference_path = mask_from.map(Path::to_path_buf);

            let (mask, dimensions) = tokio::task::spawn_blocking(move || -> Result<_> {
                let image = ImageIOService::load_rgba(&input_path)?;
                let (result, mask) = match reference_path {
                    Some(reference) => {
                        let reference_image = ImageIOService::load_rgba(&reference)?;
                        let reference_mask = compute_background_mask(&reference_image, &config.threshold);
                        debug!(
                            reference = %reference.display(),
                            background = reference_mask.background_count(),
                            "Computed reference mask"
                        );
                        reuse_mask(&image, &reference_mask, &config)?
                    },
                    None => remove_background(&image, &config)?,
                };
                ImageIOService::save_rgba(&result, &output_path, OutputFormat::Png, 0)?;
                Ok((mask, result.dimensions()))
            })
            .await
            .map_err(|e| MockupError::processing(format!("segmentation task failed: {e}")))??;

            let statistics = mask.statistics();
            info!(
                output = %output.display(),
                background_pixels = statistics.background_pixels,
                ratio = statistics.background_ratio,
                "Background removed"
            );

            Ok(RemovalReport {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                mask_source: mask_from.unwrap_or(input).to_path_buf(),
                width: dimensions.0,
                height: dimensions.1,
                feathered: self.config.feather,
                statistics,
            })
        }
        .instrument(span)
        .await
    }
}
