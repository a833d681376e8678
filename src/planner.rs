//! Batch job planning and the sequential batch runner
//!
//! Planning joins the drawing index against the profile store: every design
//! with a profile yields one job per `(ink, color)`, every design without one
//! is reported under `missingProfiles`. Running walks the jobs strictly in
//! order, reusing the fitted drawing while consecutive jobs share it.

use crate::{
    compositor::Compositor,
    error::{MockupError, Result},
    indexer::DrawingIndex,
    manifest::{ColorSelection, PlaceholderManifest},
    profiles::{profile_key, ProfileRepository},
    services::{ProcessingStage, ProgressReporter, ProgressTracker},
    tracing_config::spans,
    types::{BoundingBox, ColorOutcome, CompositingJob, DuplicateDrawing, MissingProfile},
};
use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, Instrument};

/// Jobs and planning gaps for one batch
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPlan {
    /// Jobs to run, in collection / design / ink / color order
    pub jobs: Vec<CompositingJob>,
    /// Jobs before `limit` truncation
    pub total_jobs: usize,
    pub missing_profiles: Vec<MissingProfile>,
    pub duplicates: Vec<DuplicateDrawing>,
}

/// Build the job list for `index`
///
/// `limit` truncates the job list; `total_jobs` keeps the untruncated count.
///
/// # Errors
/// Propagates profile store errors (for example a malformed stored bbox).
pub fn plan_jobs(
    index: &DrawingIndex,
    profiles: &dyn ProfileRepository,
    colors: &ColorSelection,
    limit: Option<usize>,
) -> Result<BatchPlan> {
    let mut plan = BatchPlan {
        duplicates: index.duplicates.clone(),
        ..BatchPlan::default()
    };

    for (collection, design, inks) in index.designs() {
        let key = profile_key(collection, design)?;
        let Some(profile) = profiles.get(&key)? else {
            debug!(key = %key, "No placement profile");
            plan.missing_profiles.push(MissingProfile {
                collection: collection.to_string(),
                design: design.to_string(),
                inks: inks.keys().cloned().collect(),
            });
            continue;
        };

        for (ink, drawing_file) in inks {
            for color in &colors.selected {
                plan.jobs.push(CompositingJob {
                    collection: collection.to_string(),
                    design: design.to_string(),
                    ink: ink.clone(),
                    drawing_file: drawing_file.clone(),
                    bbox: profile.bbox,
                    color: color.clone(),
                });
            }
        }
    }

    plan.total_jobs = plan.jobs.len();
    if let Some(limit) = limit {
        plan.jobs.truncate(limit);
    }

    info!(
        jobs = plan.jobs.len(),
        total = plan.total_jobs,
        missing = plan.missing_profiles.len(),
        "Planned batch"
    );
    Ok(plan)
}

/// Result of one job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub collection: String,
    pub design: String,
    pub ink: String,
    #[serde(flatten)]
    pub outcome: ColorOutcome,
}

/// Batch report printed by `generate`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub jobs_planned: usize,
    pub jobs_run: usize,
    pub written: usize,
    pub failed: usize,
    pub missing_profiles: Vec<MissingProfile>,
    pub duplicates: Vec<DuplicateDrawing>,
    /// Jobs that would run; only filled for dry runs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<CompositingJob>,
    pub results: Vec<JobResult>,
}

/// Fitted drawing kept between consecutive jobs
struct FittedDrawing {
    path: PathBuf,
    bbox: BoundingBox,
    image: Arc<RgbaImage>,
}

/// Runs planned jobs one after another
#[derive(Debug, Clone)]
pub struct BatchRunner {
    compositor: Compositor,
    placeholder_dir: PathBuf,
    manifest: PlaceholderManifest,
    out_dir: PathBuf,
    dry_run: bool,
}

impl BatchRunner {
    #[must_use]
    pub fn new(
        compositor: Compositor,
        placeholder_dir: impl Into<PathBuf>,
        manifest: PlaceholderManifest,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            compositor,
            placeholder_dir: placeholder_dir.into(),
            manifest,
            out_dir: out_dir.into(),
            dry_run: false,
        }
    }

    /// Plan only, write nothing
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Output path of `job` below the output root
    #[must_use]
    pub fn output_path(&self, job: &CompositingJob) -> PathBuf {
        self.out_dir.join(job.relative_output(self.compositor.extension()))
    }

    /// Run every job in `plan`
    ///
    /// Per-job failures (missing manifest entry, unreadable placeholder or
    /// drawing) are recorded in the report and never abort the batch.
    pub async fn run(&self, plan: BatchPlan, reporter: Box<dyn ProgressReporter>) -> Result<BatchReport> {
        self.compositor.config().validate()?;
        let span = spans::batch(plan.jobs.len(), self.dry_run);
        async move {
            let mut report = BatchReport {
                generated_at: Utc::now(),
                dry_run: self.dry_run,
                jobs_planned: plan.jobs.len(),
                jobs_run: 0,
                written: 0,
                failed: 0,
                missing_profiles: plan.missing_profiles,
                duplicates: plan.duplicates,
                planned: Vec::new(),
                results: Vec::with_capacity(plan.jobs.len()),
            };

            if self.dry_run {
                report.planned = plan.jobs;
                return Ok(report);
            }

            let mut tracker = ProgressTracker::new(reporter, ProcessingStage::Compositing, plan.jobs.len());
            let mut current: Option<FittedDrawing> = None;

            for job in &plan.jobs {
                let outcome = self
                    .run_job(job, &mut current)
                    .instrument(spans::job(job))
                    .await;
                tracker.item_done(&format!("{}/{}/{}/{}", job.collection, job.design, job.ink, job.color), outcome.ok);

                report.jobs_run += 1;
                if outcome.ok {
                    report.written += 1;
                } else {
                    report.failed += 1;
                }
                report.results.push(JobResult {
                    collection: job.collection.clone(),
                    design: job.design.clone(),
                    ink: job.ink.clone(),
                    outcome,
                });
            }
            tracker.finish();

            info!(written = report.written, failed = report.failed, "Batch finished");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn run_job(&self, job: &CompositingJob, current: &mut Option<FittedDrawing>) -> ColorOutcome {
        let reusable = current
            .as_ref()
            .is_some_and(|fitted| fitted.path == job.drawing_file && fitted.bbox == job.bbox);

        if !reusable {
            *current = None;
            match self.compositor.prepare_drawing(&job.drawing_file, job.bbox).await {
                Ok(image) => {
                    *current = Some(FittedDrawing {
                        path: job.drawing_file.clone(),
                        bbox: job.bbox,
                        image,
                    });
                },
                Err(e) => return ColorOutcome::failed(&job.color, drawing_error(&job.drawing_file, &e)),
            }
        }

        let Some(fitted) = current.as_ref() else {
            return ColorOutcome::failed(&job.color, "drawing unavailable");
        };

        let output = self.output_path(job);
        self.compositor
            .composite_color(
                Arc::clone(&fitted.image),
                job.bbox,
                &self.placeholder_dir,
                &self.manifest,
                &job.color,
                &output,
            )
            .await
    }
}

fn drawing_error(path: &Path, error: &MockupError) -> String {
    match error {
        MockupError::FileNotFound(_) => format!("drawing not found: {}", path.display()),
        other => format!("drawing unreadable: {other}"),
    }
}
