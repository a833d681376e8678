#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Mockup Pipeline
//!
//! Turns a tree of design drawings into product mockups: every drawing is
//! contain-fitted into a per-design bounding box and alpha-composited onto one
//! garment placeholder photo per selected color.
//!
//! ## Features
//!
//! - **Asset indexing**: `<collection>/<ink>/<design-file>` trees keyed by design slug
//! - **Placement profiles**: JSON-backed `collection/design` bounding boxes with atomic writes
//! - **Background segmentation**: border-seeded flood fill that keeps enclosed light regions
//! - **Compositing**: contain-fit, overlay and WebP/PNG encoding per color, with soft failures
//! - **Batch planning**: deterministic job lists, dry runs and JSON reports
//! - **Thumbnails**: fixed-width WebP normalization with `-grid`/`-stripe` naming
//! - **Reconciliation**: rename/delete plans and digest-checked legacy materialization
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mockup_pipeline::{
//!     index_drawings, plan_jobs, BatchRunner, ColorSelection, CompositeConfig, Compositor,
//!     JsonProfileStore, NoOpProgressReporter, PlaceholderManifest,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let index = index_drawings("drawings")?;
//! let profiles = JsonProfileStore::open_existing("placement-profiles.json")?;
//! let manifest = PlaceholderManifest::load("placeholders/manifest.json")?;
//! let colors = ColorSelection::load("placeholders/colors.json")?;
//!
//! let plan = plan_jobs(&index, &profiles, &colors, None)?;
//! let runner = BatchRunner::new(
//!     Compositor::new(CompositeConfig::default()),
//!     "placeholders",
//!     manifest,
//!     "mockups",
//! );
//! let report = runner.run(plan, Box::new(NoOpProgressReporter)).await?;
//! println!("{} written, {} failed", report.written, report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress bars and subscriber setup
//! - `webp-support` (default): WebP decoding of source images
//! - `tracing-json`: JSON log lines for the CLI
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the caller.

#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod indexer;
pub mod manifest;
pub mod planner;
pub mod profiles;
pub mod reconcile;
pub mod segmentation;
pub mod services;
pub mod thumbnails;
pub mod tracing_config;
pub mod types;

pub use compositor::{composite_onto, fit_contain, CompositeReport, Compositor};
pub use config::{
    BackgroundThreshold, CompositeConfig, OutputFormat, SegmentationConfig, ThumbnailConfig,
    ThumbnailKind,
};
pub use error::{MockupError, Result};
pub use indexer::{design_slug, index_drawings, DrawingIndex};
pub use manifest::{ColorSelection, PlaceholderManifest};
pub use planner::{plan_jobs, BatchPlan, BatchReport, BatchRunner, JobResult};
pub use profiles::{
    profile_key, JsonProfileStore, MemoryProfileStore, PlacementProfile, ProfileRepository,
};
pub use reconcile::{
    apply_normalization, materialize, MaterializeReport, NormalizationPlan, NormalizationReport,
};
pub use segmentation::{
    compute_background_mask, is_background_like, remove_background, reuse_mask, BackgroundRemover,
};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use thumbnails::{cleanup_tree, thumbnail_file_name, ThumbnailNormalizer, ThumbnailReport};
pub use types::{BackgroundMask, BoundingBox, ColorOutcome, CompositingJob};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
