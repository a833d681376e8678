//! Thumbnail normalization
//!
//! Re-encodes generated images as fixed-width lossy WebP thumbnails named
//! `<base>-{kind}.webp`, where `<base>` has any previous `-grid`/`-stripe`
//! suffix stripped. Runs in place (thumbnail written next to its source) or
//! into a separate mirrored tree that is afterwards cleaned of anything that
//! is not a current-kind thumbnail.

use crate::{
    config::{OutputFormat, ThumbnailConfig, ThumbnailKind},
    error::{MockupError, Result},
    services::{
        io::write_atomic, ImageIOService, OutputFormatHandler, ProcessingStage, ProgressReporter,
        ProgressTracker,
    },
    tracing_config::{events, spans},
};
use image::{imageops::FilterType, RgbaImage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Instrument};
use walkdir::WalkDir;

/// Source extensions picked up by the walk (lowercase)
pub const THUMBNAIL_SOURCE_EXTENSIONS: [&str; 4] = ["webp", "png", "jpg", "jpeg"];

/// File-name filter applied on top of the extension check
pub type NameFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Thumbnail file name for `source`
///
/// ```rust
/// use mockup_pipeline::{config::ThumbnailKind, thumbnails::thumbnail_file_name};
/// use std::path::Path;
///
/// assert_eq!(thumbnail_file_name(Path::new("foo.png"), ThumbnailKind::Grid), "foo-grid.webp");
/// assert_eq!(thumbnail_file_name(Path::new("foo-grid.png"), ThumbnailKind::Grid), "foo-grid.webp");
/// assert_eq!(thumbnail_file_name(Path::new("foo-stripe.webp"), ThumbnailKind::Grid), "foo-grid.webp");
/// ```
#[must_use]
pub fn thumbnail_file_name(source: &Path, kind: ThumbnailKind) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = ThumbnailKind::ALL
        .iter()
        .find_map(|k| stem.strip_suffix(k.suffix()))
        .unwrap_or(&stem);
    format!("{}{}.webp", base, kind.suffix())
}

/// Whether `path` is already a thumbnail of `kind`
#[must_use]
pub fn is_thumbnail_of_kind(path: &Path, kind: ThumbnailKind) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.ends_with(&format!("{}.webp", kind.suffix())))
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| THUMBNAIL_SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Target size: widths above `max_width` scale down with aspect preserved
#[must_use]
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled_h = (f64::from(height) * f64::from(max_width) / f64::from(width)).round() as u32;
    (max_width, scaled_h.max(1))
}

/// Downscale (never upscale) and encode as WebP
pub fn encode_thumbnail(image: &RgbaImage, max_width: u32, quality: u8) -> Result<(Vec<u8>, (u32, u32), bool)> {
    let (width, height) = image.dimensions();
    let (target_w, target_h) = target_dimensions(width, height, max_width);
    let resized = (target_w, target_h) != (width, height);
    let bytes = if resized {
        let scaled = image::imageops::resize(image, target_w, target_h, FilterType::Lanczos3);
        OutputFormatHandler::encode(&scaled, OutputFormat::WebP, quality)?
    } else {
        OutputFormatHandler::encode(image, OutputFormat::WebP, quality)?
    };
    Ok((bytes, (target_w, target_h), resized))
}

/// Per-file result, listed when verbose
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailFileReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub bytes_before: u64,
    /// `None` for dry runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    pub resized: bool,
}

/// A source that was not processed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub source: PathBuf,
    pub reason: String,
}

/// Summary of one normalizer run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailReport {
    pub kind: ThumbnailKind,
    pub source_root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_root: Option<PathBuf>,
    pub in_place: bool,
    pub dry_run: bool,
    pub max_width: u32,
    pub quality: u8,
    pub processed: usize,
    pub resized: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub saved_bytes: i64,
    pub skipped: Vec<SkippedFile>,
    /// Files removed (or, for dry runs, that would be removed) by the cleanup pass
    pub removed: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ThumbnailFileReport>,
}

/// Walks a tree and writes normalized thumbnails
pub struct ThumbnailNormalizer {
    config: ThumbnailConfig,
    filter: Option<NameFilter>,
}

impl std::fmt::Debug for ThumbnailNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailNormalizer")
            .field("config", &self.config)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl ThumbnailNormalizer {
    #[must_use]
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config, filter: None }
    }

    /// Only consider files whose name passes `filter`
    #[must_use]
    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Candidate sources below `root`, sorted, excluding anything under `exclude`
    pub fn discover(&self, root: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(MockupError::file_not_found(root));
        }
        let mut sources = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !has_source_extension(path) {
                continue;
            }
            if exclude.is_some_and(|ex| path.starts_with(ex)) {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if self.filter.as_ref().is_some_and(|f| !f(&name)) {
                continue;
            }
            sources.push(path.to_path_buf());
        }
        Ok(sources)
    }

    /// Normalize every image below `source_root`
    ///
    /// Without `out_root` thumbnails land next to their sources (atomic
    /// temp-file-then-rename); a source already named `-{kind}.webp` is
    /// re-encoded onto itself. With `out_root` the relative layout is mirrored
    /// there and a cleanup pass removes every file that is not a `-{kind}.webp`.
    ///
    /// # Errors
    /// Missing source root, an `out_root` that is or contains `source_root`,
    /// decode/encode and write failures.
    pub async fn run(
        &self,
        source_root: &Path,
        out_root: Option<&Path>,
        reporter: Box<dyn ProgressReporter>,
    ) -> Result<ThumbnailReport> {
        self.config.validate()?;
        if let Some(out_root) = out_root {
            check_separate_roots(source_root, out_root)?;
        }
        let span = spans::thumbnails(self.config.kind, source_root);
        async move {
            let config = &self.config;
            let kind = config.kind;
            let mut sources = self.discover(source_root, out_root)?;
            // Originals claim a thumbnail name before an existing thumbnail of that name
            sources.sort_by_key(|path| is_thumbnail_of_kind(path, kind));

            let mut report = ThumbnailReport {
                kind,
                source_root: source_root.to_path_buf(),
                out_root: out_root.map(Path::to_path_buf),
                in_place: out_root.is_none(),
                dry_run: config.dry_run,
                max_width: config.max_width,
                quality: config.quality,
                processed: 0,
                resized: 0,
                bytes_before: 0,
                bytes_after: 0,
                saved_bytes: 0,
                skipped: Vec::new(),
                removed: Vec::new(),
                files: Vec::new(),
            };

            let mut tracker = ProgressTracker::new(reporter, ProcessingStage::Thumbnails, sources.len());
            let mut claimed: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

            for source in sources {
                let label = source.display().to_string();
                let output = self.output_for(&source, source_root, out_root);

                if let Some(first) = claimed.get(&output) {
                    warn!(source = %label, first = %first.display(), "Thumbnail name collision, skipping");
                    report.skipped.push(SkippedFile {
                        reason: format!("output {} already produced from {}", output.display(), first.display()),
                        source,
                    });
                    tracker.item_done(&label, true);
                    continue;
                }
                claimed.insert(output.clone(), source.clone());

                let file_report = self.process_file(&source, &output).await?;
                events::byte_delta(&source, file_report.bytes_before, file_report.bytes_after);

                report.processed += 1;
                report.bytes_before += file_report.bytes_before;
                report.bytes_after += file_report.bytes_after.unwrap_or(0);
                if file_report.resized {
                    report.resized += 1;
                }
                if config.verbose {
                    report.files.push(file_report);
                }
                tracker.item_done(&label, true);
            }
            tracker.finish();

            if !config.dry_run {
                report.saved_bytes = report.bytes_before as i64 - report.bytes_after as i64;
            }

            if let Some(out_root) = out_root {
                report.removed = cleanup_tree(out_root, kind, config.dry_run)?;
            }

            info!(
                processed = report.processed,
                skipped = report.skipped.len(),
                removed = report.removed.len(),
                bytes_before = report.bytes_before,
                bytes_after = report.bytes_after,
                "Thumbnails normalized"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Output path for one source; in place this is the source itself when it
    /// already carries the `-{kind}.webp` name
    fn output_for(&self, source: &Path, source_root: &Path, out_root: Option<&Path>) -> PathBuf {
        let name = thumbnail_file_name(source, self.config.kind);
        match out_root {
            None => source.with_file_name(name),
            Some(out_root) => {
                let relative_dir = source
                    .parent()
                    .and_then(|p| p.strip_prefix(source_root).ok())
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                out_root.join(relative_dir).join(name)
            },
        }
    }

    async fn process_file(&self, source: &Path, output: &Path) -> Result<ThumbnailFileReport> {
        let bytes_before = ImageIOService::file_size(source)?;

        if self.config.dry_run {
            return Ok(ThumbnailFileReport {
                source: source.to_path_buf(),
                output: output.to_path_buf(),
                bytes_before,
                bytes_after: None,
                delta: None,
                resized: false,
            });
        }

        let max_width = self.config.max_width;
        let quality = self.config.quality;
        let source_path = source.to_path_buf();
        let output_path = output.to_path_buf();
        let (bytes_after, resized) = tokio::task::spawn_blocking(move || -> Result<(u64, bool)> {
            let image = ImageIOService::load_rgba(&source_path)?;
            let (bytes, _, resized) = encode_thumbnail(&image, max_width, quality)?;
            write_atomic(&output_path, &bytes)?;
            Ok((bytes.len() as u64, resized))
        })
        .await
        .map_err(|e| MockupError::processing(format!("thumbnail task failed: {e}")))??;

        Ok(ThumbnailFileReport {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            bytes_before,
            bytes_after: Some(bytes_after),
            delta: Some(bytes_after as i64 - bytes_before as i64),
            resized,
        })
    }
}

/// Reject an output tree that is the source tree or one of its ancestors
///
/// The cleanup pass deletes everything in the output tree that is not a
/// thumbnail, so such a tree would lose its source images.
fn check_separate_roots(source_root: &Path, out_root: &Path) -> Result<()> {
    if !source_root.is_dir() {
        return Err(MockupError::file_not_found(source_root));
    }
    if !out_root.exists() {
        return Ok(());
    }
    let source = source_root
        .canonicalize()
        .map_err(|e| MockupError::file_io_error("resolve source root", source_root, &e))?;
    let out = out_root
        .canonicalize()
        .map_err(|e| MockupError::file_io_error("resolve output root", out_root, &e))?;
    if source.starts_with(&out) {
        return Err(MockupError::usage(format!(
            "output tree {} must not be or contain the source tree {}",
            out_root.display(),
            source_root.display()
        )));
    }
    Ok(())
}

/// Remove every file under `out_root` that is not a `-{kind}.webp` thumbnail
///
/// Returns the removed paths (the paths that would be removed for dry runs).
pub fn cleanup_tree(out_root: &Path, kind: ThumbnailKind, dry_run: bool) -> Result<Vec<PathBuf>> {
    if !out_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut stale = Vec::new();
    for entry in WalkDir::new(out_root).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(out_root, e))?;
        if entry.file_type().is_file() && !is_thumbnail_of_kind(entry.path(), kind) {
            stale.push(entry.path().to_path_buf());
        }
    }

    if !dry_run {
        for path in &stale {
            std::fs::remove_file(path).map_err(|e| MockupError::file_io_error("remove stale file", path, &e))?;
        }
    }
    if !stale.is_empty() {
        info!(count = stale.len(), dry_run, "Cleaned thumbnail tree");
    }
    Ok(stale)
}

fn walk_error(root: &Path, error: walkdir::Error) -> MockupError {
    let path = error.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
    let io = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed"));
    MockupError::file_io_error("walk directory", path, &io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::NoOpProgressReporter;
    use image::Rgba;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_suffix_normalization() {
        let grid = ThumbnailKind::Grid;
        assert_eq!(thumbnail_file_name(Path::new("a/foo.png"), grid), "foo-grid.webp");
        assert_eq!(thumbnail_file_name(Path::new("foo-grid.png"), grid), "foo-grid.webp");
        assert_eq!(
            thumbnail_file_name(Path::new("foo-grid.png"), ThumbnailKind::Stripe),
            "foo-stripe.webp"
        );
        assert_eq!(thumbnail_file_name(Path::new("my-gridiron.jpg"), grid), "my-gridiron-grid.webp");
        assert!(is_thumbnail_of_kind(Path::new("x/foo-grid.webp"), grid));
        assert!(!is_thumbnail_of_kind(Path::new("x/foo-grid.png"), grid));
    }

    #[test]
    fn test_target_dimensions_never_upscale() {
        assert_eq!(target_dimensions(1280, 960, 640), (640, 480));
        assert_eq!(target_dimensions(300, 200, 640), (300, 200));
        assert_eq!(target_dimensions(641, 1, 640), (640, 1));
    }

    #[tokio::test]
    async fn test_in_place_mode() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write_png(&root.join("cube/darth/blanc/white.png"), 1000, 500);
        write_png(&root.join("cube/darth/blanc/small.png"), 100, 50);

        let config = ThumbnailConfig::builder(ThumbnailKind::Grid).verbose(true).build().unwrap();
        let normalizer = ThumbnailNormalizer::new(config);
        let report = normalizer.run(root, None, Box::new(NoOpProgressReporter)).await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.resized, 1);
        let thumb = root.join("cube/darth/blanc/white-grid.webp");
        assert!(thumb.exists());
        assert!(root.join("cube/darth/blanc/white.png").exists());
        let decoded = image::open(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 320));

        // A second run rewrites from the originals; the existing thumbnails lose the name claim
        let again = normalizer.run(root, None, Box::new(NoOpProgressReporter)).await.unwrap();
        assert_eq!(again.processed, 2);
        assert_eq!(again.skipped.len(), 2);
        assert!(again.skipped.iter().all(|s| is_thumbnail_of_kind(&s.source, ThumbnailKind::Grid)));
    }

    #[tokio::test]
    async fn test_in_place_overwrites_oversized_thumbnail() {
        let dir = TempDir::new().unwrap();
        let wide = RgbaImage::from_pixel(1000, 500, Rgba([10, 120, 10, 255]));
        let (bytes, _, _) = encode_thumbnail(&wide, 2000, 90).unwrap();
        let thumb = dir.path().join("big-grid.webp");
        std::fs::write(&thumb, bytes).unwrap();

        let normalizer = ThumbnailNormalizer::new(ThumbnailConfig::for_kind(ThumbnailKind::Grid));
        let report = normalizer
            .run(dir.path(), None, Box::new(NoOpProgressReporter))
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.resized, 1);
        assert!(report.skipped.is_empty());
        let decoded = image::open(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 320));
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("big-grid.webp")]);
    }

    #[tokio::test]
    async fn test_out_root_equal_to_source_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("imgs");
        write_png(&src.join("a.png"), 20, 10);

        let normalizer = ThumbnailNormalizer::new(ThumbnailConfig::for_kind(ThumbnailKind::Grid));
        let result = normalizer.run(&src, Some(&src), Box::new(NoOpProgressReporter)).await;

        assert!(matches!(result, Err(MockupError::Usage(_))));
        assert!(src.join("a.png").exists());
    }

    #[tokio::test]
    async fn test_out_root_above_source_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("imgs");
        write_png(&src.join("a.png"), 20, 10);

        let normalizer = ThumbnailNormalizer::new(ThumbnailConfig::for_kind(ThumbnailKind::Grid));
        let result = normalizer
            .run(&src, Some(dir.path()), Box::new(NoOpProgressReporter))
            .await;

        assert!(matches!(result, Err(MockupError::Usage(_))));
        assert!(src.join("a.png").exists());
        assert!(!src.join("a-grid.webp").exists());
    }

    #[tokio::test]
    async fn test_separate_tree_mode_cleans_stale_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        write_png(&src.join("a/foo-grid.png"), 20, 10);
        write_png(&src.join("b/bar.png"), 20, 10);
        std::fs::create_dir_all(out.join("a")).unwrap();
        std::fs::write(out.join("a/old-stripe.webp"), b"stale").unwrap();
        std::fs::write(out.join("notes.txt"), b"stale").unwrap();

        let normalizer = ThumbnailNormalizer::new(ThumbnailConfig::for_kind(ThumbnailKind::Grid));
        let report = normalizer
            .run(&src, Some(&out), Box::new(NoOpProgressReporter))
            .await
            .unwrap();

        assert_eq!(report.processed, 2);
        assert!(out.join("a/foo-grid.webp").exists());
        assert!(!out.join("a/foo-grid-grid.webp").exists());
        assert!(out.join("b/bar-grid.webp").exists());
        assert!(!out.join("a/old-stripe.webp").exists());
        assert!(!out.join("notes.txt").exists());
        assert_eq!(report.removed.len(), 2);
        // Sources are untouched
        assert!(src.join("a/foo-grid.png").exists());
    }

    #[tokio::test]
    async fn test_dry_run_and_filter() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("keep.png"), 10, 10);
        write_png(&dir.path().join("drop.png"), 10, 10);

        let config = ThumbnailConfig::builder(ThumbnailKind::Stripe).dry_run(true).build().unwrap();
        let normalizer =
            ThumbnailNormalizer::new(config).with_filter(Box::new(|name: &str| name.starts_with("keep")));
        let report = normalizer
            .run(dir.path(), None, Box::new(NoOpProgressReporter))
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.bytes_after, 0);
        assert!(!dir.path().join("keep-stripe.webp").exists());
    }

    #[tokio::test]
    async fn test_name_collision_is_skipped() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("foo.png"), 10, 10);
        write_png(&dir.path().join("foo-stripe.png"), 10, 10);

        let normalizer = ThumbnailNormalizer::new(ThumbnailConfig::for_kind(ThumbnailKind::Grid));
        let report = normalizer
            .run(dir.path(), None, Box::new(NoOpProgressReporter))
            .await
            .unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped.len(), 1);
    }
}
