//! Mockup pipeline CLI
//!
//! Every tool is a subcommand. Each invocation prints exactly one JSON report
//! on stdout; logs and progress bars go to stderr. Any error is printed to
//! stderr and exits with status 1.

use super::config::CliConfigBuilder;
use super::progress::create_cli_progress_reporter;
use crate::{
    compositor::Compositor,
    indexer::index_drawings,
    planner::{plan_jobs, BatchRunner},
    profiles::{load_calibration, profile_key, JsonProfileStore, ProfileRepository},
    reconcile::{apply_normalization, materialize, NormalizationPlan},
    segmentation::BackgroundRemover,
    thumbnails::ThumbnailNormalizer,
    tracing_config::{init_cli_tracing, spans, TracingFormat},
    types::BoundingBox,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, Instrument};

/// Garment mockup compositing, background removal and thumbnail tooling
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "mockup-pipeline")]
pub struct Cli {
    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE); `thumbs` also lists per-file deltas
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log filter directives, overriding -v (e.g. "mockup_pipeline=debug")
    #[arg(long, value_name = "DIRECTIVES", global = true)]
    pub log_filter: Option<String>,

    /// Log line format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console, global = true)]
    pub log_format: CliLogFormat,

    /// Show a progress bar on stderr for batch operations
    #[arg(long, global = true)]
    pub progress: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List discovered drawings grouped by collection, design and ink
    Index(IndexArgs),
    /// Inspect or edit placement profiles
    Profiles {
        #[command(subcommand)]
        action: ProfilesCommand,
    },
    /// Composite one drawing onto every selected color
    Composite(CompositeArgs),
    /// Plan and run mockups for every profiled design
    Generate(GenerateArgs),
    /// Remove the border-connected background of a garment photo
    RemoveBg(RemoveBgArgs),
    /// Normalize images into fixed-width WebP thumbnails
    Thumbs(ThumbsArgs),
    /// Apply a rename/deletion plan below a root directory
    Normalize(NormalizeArgs),
    /// Copy a canonical tree into a legacy location, skipping identical files
    Materialize(MaterializeArgs),
}

#[derive(Subcommand, Debug)]
pub enum ProfilesCommand {
    /// List all profile keys
    List(ProfileFileArgs),
    /// Show one profile
    Get {
        #[command(flatten)]
        file: ProfileFileArgs,
        /// Profile key ("collection/design")
        #[arg(long)]
        key: String,
    },
    /// Create or update a profile's bounding box
    Upsert(UpsertArgs),
    /// Delete a profile
    Delete {
        #[command(flatten)]
        file: ProfileFileArgs,
        /// Profile key ("collection/design")
        #[arg(long)]
        key: String,
        /// Report without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ProfileFileArgs {
    /// Placement profiles JSON file
    #[arg(long, value_name = "FILE", default_value = "placement-profiles.json")]
    pub profiles: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct UpsertArgs {
    #[command(flatten)]
    pub file: ProfileFileArgs,
    #[arg(long)]
    pub collection: String,
    #[arg(long)]
    pub design: String,
    /// Literal bounding box "x,y,w,h"
    #[arg(long, conflicts_with = "calibration", required_unless_present = "calibration")]
    pub bbox: Option<String>,
    /// Calibration JSON providing bboxPaddedScaled, bboxScaled or bbox
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,
    /// Report without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Drawings root (`<collection>/<ink>/<design-file>`)
    #[arg(long, value_name = "DIR")]
    pub drawings: PathBuf,
    /// Only this collection
    #[arg(long)]
    pub collection: Option<String>,
}

/// Placeholder directory, manifest and color selection
#[derive(Args, Debug, Clone)]
pub struct PlaceholderArgs {
    /// Directory with garment placeholder photos
    #[arg(long, value_name = "DIR")]
    pub placeholders: PathBuf,
    /// Placeholder manifest [default: <placeholders>/manifest.json]
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,
    /// Color selection file [default: <placeholders>/colors.json]
    #[arg(long, value_name = "FILE")]
    pub colors: Option<PathBuf>,
    /// Explicit color (repeatable); replaces the colors file
    #[arg(long = "color", value_name = "COLOR")]
    pub color: Vec<String>,
}

/// Encoded output settings
#[derive(Args, Debug, Clone)]
pub struct EncodeArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = CliOutputFormat::Webp)]
    pub format: CliOutputFormat,
    /// WebP quality (0-100)
    #[arg(long, default_value_t = crate::config::DEFAULT_WEBP_QUALITY)]
    pub quality: u8,
}

#[derive(Args, Debug, Clone)]
pub struct CompositeArgs {
    /// Drawing file
    #[arg(long, value_name = "FILE")]
    pub drawing: PathBuf,
    /// Literal bounding box "x,y,w,h"; otherwise looked up by --collection/--design
    #[arg(long)]
    pub bbox: Option<String>,
    #[arg(long, requires = "design")]
    pub collection: Option<String>,
    #[arg(long, requires = "collection")]
    pub design: Option<String>,
    #[command(flatten)]
    pub file: ProfileFileArgs,
    #[command(flatten)]
    pub placeholders: PlaceholderArgs,
    #[command(flatten)]
    pub encode: EncodeArgs,
    /// Output directory (`<out>/<color>.<format>`)
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Drawings root (`<collection>/<ink>/<design-file>`)
    #[arg(long, value_name = "DIR")]
    pub drawings: PathBuf,
    #[command(flatten)]
    pub file: ProfileFileArgs,
    #[command(flatten)]
    pub placeholders: PlaceholderArgs,
    #[command(flatten)]
    pub encode: EncodeArgs,
    /// Output root (`<out>/<collection>/<design>/<ink>/<color>.<format>`)
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,
    /// Only this collection
    #[arg(long)]
    pub collection: Option<String>,
    /// Run at most this many jobs
    #[arg(long)]
    pub limit: Option<usize>,
    /// Plan without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveBgArgs {
    /// Garment photo
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,
    /// Output PNG
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,
    /// Compute the mask on this image and reapply it to --input
    #[arg(long, value_name = "FILE")]
    pub mask_from: Option<PathBuf>,
    /// Soften the one-pixel edge ring
    #[arg(long)]
    pub feather: bool,
    /// Alpha for the feathered ring (1-254)
    #[arg(long, default_value_t = crate::config::DEFAULT_FEATHER_ALPHA)]
    pub feather_alpha: u8,
    /// Minimum Rec. 709 luma of a background pixel
    #[arg(long, default_value_t = 245)]
    pub luma_min: u8,
    /// Maximum chroma (max - min channel) of a background pixel
    #[arg(long, default_value_t = 18)]
    pub max_chroma: u8,
    /// Minimum darkest channel of a background pixel
    #[arg(long, default_value_t = 235)]
    pub min_channel: u8,
}

#[derive(Args, Debug, Clone)]
pub struct ThumbsArgs {
    /// Source tree (walked recursively)
    #[arg(long, value_name = "DIR")]
    pub src: PathBuf,
    /// Separate output tree; without it thumbnails are written next to their sources
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
    /// Thumbnail kind
    #[arg(long, value_enum, default_value_t = CliThumbnailKind::Grid)]
    pub kind: CliThumbnailKind,
    /// Maximum width [default: 640 for grid, 360 for stripe]
    #[arg(long)]
    pub width: Option<u32>,
    /// WebP quality [default: 75 for grid, 70 for stripe]
    #[arg(long)]
    pub quality: Option<u8>,
    /// Only files whose name matches this glob (e.g. "*.png")
    #[arg(long)]
    pub pattern: Option<String>,
    /// Plan without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Root the plan paths are relative to
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,
    /// Plan JSON (`{ renames: [{from, to}], deletions: [path] }`)
    #[arg(long, value_name = "FILE")]
    pub plan: PathBuf,
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MaterializeArgs {
    /// Canonical tree
    #[arg(long, value_name = "DIR")]
    pub src: PathBuf,
    /// Legacy location
    #[arg(long, value_name = "DIR")]
    pub dest: PathBuf,
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Webp,
    Png,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliThumbnailKind {
    Grid,
    Stripe,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Parse arguments, run, print the report and map the outcome to an exit code
pub async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not usage errors
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        },
    };

    match run(cli).await.and_then(|report| {
        serde_json::to_string_pretty(&report).context("Failed to serialize report")
    }) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Execute a parsed command and return its JSON report
pub async fn run(cli: Cli) -> Result<Value> {
    let format = match cli.log_format {
        CliLogFormat::Console => TracingFormat::Console,
        CliLogFormat::Compact => TracingFormat::Compact,
        #[cfg(feature = "tracing-json")]
        CliLogFormat::Json => TracingFormat::Json,
    };
    let session_id = init_cli_tracing(cli.verbose, cli.log_filter.as_deref(), format)
        .context("Failed to initialize tracing")?;

    let span = spans::session(&session_id, command_name(&cli.command));
    dispatch(&cli).instrument(span).await
}

async fn dispatch(cli: &Cli) -> Result<Value> {
    debug!(?cli, "Parsed arguments");

    match &cli.command {
        Command::Index(args) => run_index(args),
        Command::Profiles { action } => run_profiles(action),
        Command::Composite(args) => run_composite(args).await,
        Command::Generate(args) => run_generate(cli, args).await,
        Command::RemoveBg(args) => run_remove_bg(args).await,
        Command::Thumbs(args) => run_thumbs(cli, args).await,
        Command::Normalize(args) => run_normalize(args),
        Command::Materialize(args) => run_materialize(cli, args),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Index(_) => "index",
        Command::Profiles { .. } => "profiles",
        Command::Composite(_) => "composite",
        Command::Generate(_) => "generate",
        Command::RemoveBg(_) => "remove-bg",
        Command::Thumbs(_) => "thumbs",
        Command::Normalize(_) => "normalize",
        Command::Materialize(_) => "materialize",
    }
}

fn run_index(args: &IndexArgs) -> Result<Value> {
    let mut index = index_drawings(&args.drawings).context("Failed to index drawings")?;
    if let Some(collection) = &args.collection {
        index = index.only_collection(collection);
    }
    Ok(json!({
        "root": args.drawings,
        "designs": index.design_count(),
        "files": index.file_count(),
        "collections": index.collections,
        "duplicates": index.duplicates,
    }))
}

fn run_profiles(action: &ProfilesCommand) -> Result<Value> {
    match action {
        ProfilesCommand::List(file) => {
            let store = JsonProfileStore::open(&file.profiles)?;
            let keys = store.list();
            Ok(json!({ "count": keys.len(), "profiles": keys }))
        },
        ProfilesCommand::Get { file, key } => {
            let store = JsonProfileStore::open(&file.profiles)?;
            let profile = store.get(key)?;
            Ok(json!({ "key": key, "found": profile.is_some(), "profile": profile }))
        },
        ProfilesCommand::Upsert(args) => {
            let bbox = match (&args.bbox, &args.calibration) {
                (Some(literal), _) => BoundingBox::parse(literal)?,
                (None, Some(calibration)) => load_calibration(calibration)
                    .with_context(|| format!("Failed to read calibration {}", calibration.display()))?,
                (None, None) => {
                    return Err(crate::MockupError::usage("either --bbox or --calibration is required").into())
                },
            };
            let mut store = JsonProfileStore::open(&args.file.profiles)?.with_dry_run(args.dry_run);
            let outcome = store.upsert(&args.collection, &args.design, bbox)?;
            info!(key = %outcome.key, created = outcome.created, changed = outcome.changed, "Upserted profile");
            let mut report = serde_json::to_value(outcome)?;
            report["dryRun"] = json!(args.dry_run);
            report["path"] = json!(args.file.profiles);
            Ok(report)
        },
        ProfilesCommand::Delete { file, key, dry_run } => {
            let mut store = JsonProfileStore::open(&file.profiles)?.with_dry_run(*dry_run);
            let existed = store.delete(key)?;
            Ok(json!({ "key": key, "existed": existed, "dryRun": dry_run }))
        },
    }
}

async fn run_composite(args: &CompositeArgs) -> Result<Value> {
    CliConfigBuilder::validate_composite(args)?;
    let bbox = match (&args.bbox, &args.collection, &args.design) {
        (Some(literal), _, _) => BoundingBox::parse(literal)?,
        (None, Some(collection), Some(design)) => {
            let store = JsonProfileStore::open_existing(&args.file.profiles)?;
            let key = profile_key(collection, design)?;
            store
                .get(&key)?
                .map(|profile| profile.bbox)
                .ok_or_else(|| crate::MockupError::usage(format!("no placement profile for \"{key}\"")))?
        },
        _ => return Err(crate::MockupError::usage("either --bbox or --collection/--design is required").into()),
    };

    let placeholders = CliConfigBuilder::load_placeholders(&args.placeholders)?;
    let compositor = Compositor::new(CliConfigBuilder::composite_config(&args.encode)?);
    let report = compositor
        .composite_colors(
            &args.drawing,
            bbox,
            &args.placeholders.placeholders,
            &placeholders.manifest,
            &placeholders.colors.selected,
            &args.out,
        )
        .await
        .context("Compositing failed")?;
    Ok(serde_json::to_value(report)?)
}

async fn run_generate(cli: &Cli, args: &GenerateArgs) -> Result<Value> {
    let mut index = index_drawings(&args.drawings).context("Failed to index drawings")?;
    if let Some(collection) = &args.collection {
        index = index.only_collection(collection);
    }
    let store = JsonProfileStore::open_existing(&args.file.profiles).context("Failed to open placement profiles")?;
    let placeholders = CliConfigBuilder::load_placeholders(&args.placeholders)?;

    let plan = plan_jobs(&index, &store, &placeholders.colors, args.limit)?;
    let compositor = Compositor::new(CliConfigBuilder::composite_config(&args.encode)?);
    let runner = BatchRunner::new(
        compositor,
        &args.placeholders.placeholders,
        placeholders.manifest,
        &args.out,
    )
    .with_dry_run(args.dry_run);

    let reporter = create_cli_progress_reporter(cli.progress, cli.verbose > 0);
    let report = runner.run(plan, reporter).await?;
    Ok(serde_json::to_value(report)?)
}

async fn run_remove_bg(args: &RemoveBgArgs) -> Result<Value> {
    let config = CliConfigBuilder::segmentation_config(args)?;
    let remover = BackgroundRemover::new(config);
    let report = remover
        .process_file(&args.input, &args.output, args.mask_from.as_deref())
        .await
        .context("Background removal failed")?;
    Ok(serde_json::to_value(report)?)
}

async fn run_thumbs(cli: &Cli, args: &ThumbsArgs) -> Result<Value> {
    let config = CliConfigBuilder::thumbnail_config(args, cli.verbose > 0)?;
    let mut normalizer = ThumbnailNormalizer::new(config);
    if let Some(filter) = CliConfigBuilder::name_filter(args.pattern.as_deref())? {
        normalizer = normalizer.with_filter(filter);
    }
    let reporter = create_cli_progress_reporter(cli.progress, cli.verbose > 0);
    let report = normalizer
        .run(&args.src, args.out.as_deref(), reporter)
        .await
        .context("Thumbnail normalization failed")?;
    Ok(serde_json::to_value(report)?)
}

fn run_normalize(args: &NormalizeArgs) -> Result<Value> {
    let plan = NormalizationPlan::load(&args.plan).context("Failed to read normalization plan")?;
    let report = apply_normalization(&args.root, &plan, args.dry_run)?;
    Ok(serde_json::to_value(report)?)
}

fn run_materialize(cli: &Cli, args: &MaterializeArgs) -> Result<Value> {
    let reporter = create_cli_progress_reporter(cli.progress, cli.verbose > 0);
    let report = materialize(&args.src, &args.dest, args.dry_run, reporter)?;
    Ok(serde_json::to_value(report)?)
}
