//! Configuration types for compositing, segmentation and thumbnail operations

use crate::error::{MockupError, Result};
use serde::{Deserialize, Serialize};

/// Default WebP quality for composited mockups
pub const DEFAULT_WEBP_QUALITY: u8 = 92;

/// Default feather alpha for the one-pixel edge ring
pub const DEFAULT_FEATHER_ALPHA: u8 = 200;

/// Encoded output format for composited mockups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy WebP with alpha (quality applies)
    #[default]
    WebP,
    /// Lossless PNG with alpha
    Png,
}

impl OutputFormat {
    /// File extension without the dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Png => "png",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Display context a thumbnail is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailKind {
    /// Product grid cards
    #[default]
    Grid,
    /// Narrow color stripes
    Stripe,
}

impl ThumbnailKind {
    /// All kinds, used when stripping suffixes from file names
    pub const ALL: [ThumbnailKind; 2] = [ThumbnailKind::Grid, ThumbnailKind::Stripe];

    /// Filename suffix including the leading dash (`-grid`, `-stripe`)
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Grid => "-grid",
            Self::Stripe => "-stripe",
        }
    }

    /// Default maximum width in pixels
    #[must_use]
    pub fn default_max_width(self) -> u32 {
        match self {
            Self::Grid => 640,
            Self::Stripe => 360,
        }
    }

    /// Default WebP quality
    #[must_use]
    pub fn default_quality(self) -> u8 {
        match self {
            Self::Grid => 75,
            Self::Stripe => 70,
        }
    }
}

impl std::fmt::Display for ThumbnailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grid => write!(f, "grid"),
            Self::Stripe => write!(f, "stripe"),
        }
    }
}

/// Pixel classification thresholds for "background-like" pixels
///
/// A pixel qualifies when its Rec. 709 luma is at least `luma_min`, its chroma
/// (max channel minus min channel) is at most `max_chroma`, and its darkest
/// channel is at least `min_channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundThreshold {
    pub luma_min: u8,
    pub max_chroma: u8,
    pub min_channel: u8,
}

impl Default for BackgroundThreshold {
    fn default() -> Self {
        Self {
            luma_min: 245,
            max_chroma: 18,
            min_channel: 235,
        }
    }
}

/// Configuration for border-seeded background segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationConfig {
    /// Classification thresholds
    pub threshold: BackgroundThreshold,
    /// Soften the foreground edge ring that touches removed background
    pub feather: bool,
    /// Alpha written to edge-ring pixels when feathering
    pub feather_alpha: u8,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            threshold: BackgroundThreshold::default(),
            feather: false,
            feather_alpha: DEFAULT_FEATHER_ALPHA,
        }
    }
}

impl SegmentationConfig {
    #[must_use]
    pub fn builder() -> SegmentationConfigBuilder {
        SegmentationConfigBuilder::default()
    }

    /// Feather alpha must sit strictly between fully transparent and opaque
    pub fn validate(&self) -> Result<()> {
        if self.feather && (self.feather_alpha == 0 || self.feather_alpha == 255) {
            return Err(MockupError::config_value_error(
                "feather alpha",
                self.feather_alpha,
                "1-254",
                Some(DEFAULT_FEATHER_ALPHA),
            ));
        }
        Ok(())
    }
}

/// Builder for `SegmentationConfig`
#[derive(Debug, Default)]
pub struct SegmentationConfigBuilder {
    config: SegmentationConfig,
}

impl SegmentationConfigBuilder {
    #[must_use]
    pub fn luma_min(mut self, value: u8) -> Self {
        self.config.threshold.luma_min = value;
        self
    }

    #[must_use]
    pub fn max_chroma(mut self, value: u8) -> Self {
        self.config.threshold.max_chroma = value;
        self
    }

    #[must_use]
    pub fn min_channel(mut self, value: u8) -> Self {
        self.config.threshold.min_channel = value;
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: BackgroundThreshold) -> Self {
        self.config.threshold = threshold;
        self
    }

    #[must_use]
    pub fn feather(mut self, feather: bool) -> Self {
        self.config.feather = feather;
        self
    }

    #[must_use]
    pub fn feather_alpha(mut self, alpha: u8) -> Self {
        self.config.feather_alpha = alpha;
        self
    }

    pub fn build(self) -> Result<SegmentationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for mockup compositing and encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeConfig {
    /// Output format
    pub format: OutputFormat,
    /// WebP quality (0-100, ignored for PNG)
    pub quality: u8,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            quality: DEFAULT_WEBP_QUALITY,
        }
    }
}

impl CompositeConfig {
    #[must_use]
    pub fn builder() -> CompositeConfigBuilder {
        CompositeConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(MockupError::config_value_error(
                "WebP quality",
                self.quality,
                "0-100",
                Some(DEFAULT_WEBP_QUALITY),
            ));
        }
        Ok(())
    }
}

/// Builder for `CompositeConfig`
#[derive(Debug, Default)]
pub struct CompositeConfigBuilder {
    config: CompositeConfig,
}

impl CompositeConfigBuilder {
    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Set WebP quality (clamped to 100)
    #[must_use]
    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality.min(100);
        self
    }

    pub fn build(self) -> Result<CompositeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for thumbnail normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailConfig {
    /// Thumbnail kind, decides the filename suffix
    pub kind: ThumbnailKind,
    /// Images wider than this are downscaled; narrower ones are never upscaled
    pub max_width: u32,
    /// WebP quality (0-100)
    pub quality: u8,
    /// Report per-file byte deltas
    pub verbose: bool,
    /// Plan only, write nothing
    pub dry_run: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self::for_kind(ThumbnailKind::default())
    }
}

impl ThumbnailConfig {
    /// Defaults appropriate for `kind`
    #[must_use]
    pub fn for_kind(kind: ThumbnailKind) -> Self {
        Self {
            kind,
            max_width: kind.default_max_width(),
            quality: kind.default_quality(),
            verbose: false,
            dry_run: false,
        }
    }

    #[must_use]
    pub fn builder(kind: ThumbnailKind) -> ThumbnailConfigBuilder {
        ThumbnailConfigBuilder {
            config: Self::for_kind(kind),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_width == 0 {
            return Err(MockupError::config_value_error(
                "thumbnail width",
                self.max_width,
                "> 0",
                Some(self.kind.default_max_width()),
            ));
        }
        if self.quality > 100 {
            return Err(MockupError::config_value_error(
                "thumbnail quality",
                self.quality,
                "0-100",
                Some(self.kind.default_quality()),
            ));
        }
        Ok(())
    }
}

/// Builder for `ThumbnailConfig`
#[derive(Debug)]
pub struct ThumbnailConfigBuilder {
    config: ThumbnailConfig,
}

impl ThumbnailConfigBuilder {
    #[must_use]
    pub fn max_width(mut self, width: u32) -> Self {
        self.config.max_width = width;
        self
    }

    #[must_use]
    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality.min(100);
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn build(self) -> Result<ThumbnailConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
