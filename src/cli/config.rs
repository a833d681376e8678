//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{
    CliOutputFormat, CliThumbnailKind, CompositeArgs, EncodeArgs, PlaceholderArgs, RemoveBgArgs,
    ThumbsArgs,
};
use crate::{
    config::{CompositeConfig, OutputFormat, SegmentationConfig, ThumbnailConfig, ThumbnailKind},
    error::MockupError,
    manifest::{ColorSelection, PlaceholderManifest, COLORS_FILE, MANIFEST_FILE},
    thumbnails::NameFilter,
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

/// Manifest and color selection resolved from placeholder arguments
#[derive(Debug)]
pub(crate) struct LoadedPlaceholders {
    pub(crate) manifest: PlaceholderManifest,
    pub(crate) colors: ColorSelection,
}

/// Convert CLI arguments into library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    pub(crate) fn output_format(format: CliOutputFormat) -> OutputFormat {
        match format {
            CliOutputFormat::Webp => OutputFormat::WebP,
            CliOutputFormat::Png => OutputFormat::Png,
        }
    }

    pub(crate) fn thumbnail_kind(kind: CliThumbnailKind) -> ThumbnailKind {
        match kind {
            CliThumbnailKind::Grid => ThumbnailKind::Grid,
            CliThumbnailKind::Stripe => ThumbnailKind::Stripe,
        }
    }

    /// Build the compositing configuration, rejecting qualities above 100
    pub(crate) fn composite_config(args: &EncodeArgs) -> Result<CompositeConfig> {
        let config = CompositeConfig {
            format: Self::output_format(args.format),
            quality: args.quality,
        };
        config.validate().context("Invalid output settings")?;
        Ok(config)
    }

    pub(crate) fn segmentation_config(args: &RemoveBgArgs) -> Result<SegmentationConfig> {
        SegmentationConfig::builder()
            .luma_min(args.luma_min)
            .max_chroma(args.max_chroma)
            .min_channel(args.min_channel)
            .feather(args.feather)
            .feather_alpha(args.feather_alpha)
            .build()
            .context("Invalid segmentation settings")
    }

    /// Thumbnail configuration with kind defaults for unset width/quality
    pub(crate) fn thumbnail_config(args: &ThumbsArgs, verbose: bool) -> Result<ThumbnailConfig> {
        let kind = Self::thumbnail_kind(args.kind);
        let mut config = ThumbnailConfig::for_kind(kind);
        if let Some(width) = args.width {
            config.max_width = width;
        }
        if let Some(quality) = args.quality {
            config.quality = quality;
        }
        config.verbose = verbose;
        config.dry_run = args.dry_run;
        config.validate().context("Invalid thumbnail settings")?;
        Ok(config)
    }

    /// File-name filter from a `--pattern` glob
    pub(crate) fn name_filter(pattern: Option<&str>) -> Result<Option<NameFilter>> {
        let Some(pattern) = pattern else {
            return Ok(None);
        };
        let compiled = glob::Pattern::new(pattern)
            .map_err(|e| MockupError::usage(format!("invalid --pattern \"{pattern}\": {e}")))?;
        Ok(Some(Box::new(move |name: &str| compiled.matches(name))))
    }

    /// Manifest path, defaulting to `<placeholders>/manifest.json`
    pub(crate) fn manifest_path(args: &PlaceholderArgs) -> PathBuf {
        args.manifest
            .clone()
            .unwrap_or_else(|| args.placeholders.join(MANIFEST_FILE))
    }

    /// Colors path, defaulting to `<placeholders>/colors.json`
    pub(crate) fn colors_path(args: &PlaceholderArgs) -> PathBuf {
        args.colors
            .clone()
            .unwrap_or_else(|| args.placeholders.join(COLORS_FILE))
    }

    /// Load the manifest and the color selection (explicit `--color` wins)
    pub(crate) fn load_placeholders(args: &PlaceholderArgs) -> Result<LoadedPlaceholders> {
        if !args.placeholders.is_dir() {
            return Err(MockupError::file_not_found(&args.placeholders).into());
        }
        let manifest_path = Self::manifest_path(args);
        let manifest = PlaceholderManifest::load(&manifest_path)
            .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;

        let colors = if args.color.is_empty() {
            let colors_path = Self::colors_path(args);
            ColorSelection::load(&colors_path)
                .with_context(|| format!("Failed to load colors {}", colors_path.display()))?
        } else {
            ColorSelection::from_colors(args.color.iter().cloned())
        };

        debug!(
            manifest_items = manifest.items.len(),
            colors = colors.selected.len(),
            "Loaded placeholder configuration"
        );
        Ok(LoadedPlaceholders { manifest, colors })
    }

    /// Checks clap cannot express
    pub(crate) fn validate_composite(args: &CompositeArgs) -> Result<()> {
        if args.bbox.is_none() && (args.collection.is_none() || args.design.is_none()) {
            return Err(MockupError::usage("either --bbox or --collection/--design is required").into());
        }
        Ok(())
    }
}
