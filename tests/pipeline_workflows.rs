//! End-to-end library workflows
//!
//! Index a drawings tree, plan against stored profiles and run the batch into
//! a temporary output root.

mod common;

use common::{files_below, Workspace, BLACK, WHITE};
use mockup_pipeline::{
    compositor::MISSING_IN_MANIFEST, index_drawings, plan_jobs, BatchRunner, ColorSelection,
    CompositeConfig, Compositor, JsonProfileStore, NoOpProgressReporter, OutputFormat,
    PlaceholderManifest, ProfileRepository,
};
use std::fs;
use tempfile::TempDir;

fn runner(ws: &Workspace, config: CompositeConfig) -> BatchRunner {
    let manifest = PlaceholderManifest::load(ws.placeholders().join("manifest.json")).unwrap();
    BatchRunner::new(Compositor::new(config), ws.placeholders(), manifest, ws.out())
}

#[tokio::test]
async fn test_generate_two_inks_two_colors() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path());
    ws.cube_darth();

    let index = index_drawings(ws.drawings()).unwrap();
    let store = JsonProfileStore::open_existing(ws.profiles()).unwrap();
    let colors = ColorSelection::load(ws.placeholders().join("colors.json")).unwrap();
    let plan = plan_jobs(&index, &store, &colors, None).unwrap();
    assert_eq!(plan.total_jobs, 4);
    let order: Vec<(&str, &str)> = plan
        .jobs
        .iter()
        .map(|job| (job.ink.as_str(), job.color.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![("blanc", "white"), ("blanc", "black"), ("negre", "white"), ("negre", "black")]
    );

    let report = runner(&ws, CompositeConfig::default())
        .run(plan, Box::new(NoOpProgressReporter))
        .await
        .unwrap();

    assert_eq!(report.jobs_run, 4);
    assert_eq!(report.written, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(
        files_below(&ws.out()),
        vec![
            "cube/darth/blanc/black.webp",
            "cube/darth/blanc/white.webp",
            "cube/darth/negre/black.webp",
            "cube/darth/negre/white.webp",
        ]
    );

    // White ink on the black garment lands inside the bbox, the rest stays black
    let composite = image::open(ws.out().join("cube/darth/blanc/black.webp"))
        .unwrap()
        .to_rgba8();
    assert_eq!(composite.dimensions(), (200, 240));
    assert!(composite.get_pixel(60, 95)[0] > 200);
    assert!(composite.get_pixel(150, 200)[0] < 40);
    // Letterbox rows inside the bbox stay transparent in the fitted drawing
    assert!(composite.get_pixel(60, 30)[0] < 40);
}

#[tokio::test]
async fn test_missing_manifest_color_is_soft() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path());
    ws.cube_darth();
    ws.select_colors(&["white", "red"]);

    let index = index_drawings(ws.drawings()).unwrap();
    let store = JsonProfileStore::open_existing(ws.profiles()).unwrap();
    let colors = ColorSelection::load(ws.placeholders().join("colors.json")).unwrap();
    let plan = plan_jobs(&index, &store, &colors, None).unwrap();

    let report = runner(&ws, CompositeConfig::default())
        .run(plan, Box::new(NoOpProgressReporter))
        .await
        .unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(report.failed, 2);
    let failures: Vec<_> = report.results.iter().filter(|r| !r.outcome.ok).collect();
    assert!(failures.iter().all(|r| r.outcome.color == "red"));
    assert!(failures
        .iter()
        .all(|r| r.outcome.error.as_deref() == Some(MISSING_IN_MANIFEST)));
    assert_eq!(
        files_below(&ws.out()),
        vec!["cube/darth/blanc/white.webp", "cube/darth/negre/white.webp"]
    );
}

#[tokio::test]
async fn test_designs_without_profile_are_reported() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path());
    ws.cube_darth();
    ws.add_drawing("cube", "blanc", "yoda.png", WHITE);

    let index = index_drawings(ws.drawings()).unwrap();
    let store = JsonProfileStore::open_existing(ws.profiles()).unwrap();
    let colors = ColorSelection::from_colors(["white"]);
    let plan = plan_jobs(&index, &store, &colors, None).unwrap();

    assert_eq!(plan.total_jobs, 2);
    assert_eq!(plan.missing_profiles.len(), 1);
    assert_eq!(plan.missing_profiles[0].design, "yoda");
    assert_eq!(plan.missing_profiles[0].inks, vec!["blanc".to_string()]);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path());
    ws.cube_darth();

    let index = index_drawings(ws.drawings()).unwrap();
    let store = JsonProfileStore::open_existing(ws.profiles()).unwrap();
    let colors = ColorSelection::from_colors(["white", "black"]);
    let plan = plan_jobs(&index, &store, &colors, Some(3)).unwrap();

    let report = runner(&ws, CompositeConfig::default())
        .with_dry_run(true)
        .run(plan, Box::new(NoOpProgressReporter))
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.planned.len(), 3);
    assert_eq!(report.jobs_run, 0);
    assert!(!ws.out().exists());
}

#[tokio::test]
async fn test_png_output_format() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path());
    ws.cube_darth();

    let index = index_drawings(ws.drawings()).unwrap();
    let store = JsonProfileStore::open_existing(ws.profiles()).unwrap();
    let colors = ColorSelection::from_colors(["black"]);
    let plan = plan_jobs(&index, &store, &colors, None).unwrap();
    let config = CompositeConfig::builder().format(OutputFormat::Png).build().unwrap();

    let report = runner(&ws, config)
        .run(plan, Box::new(NoOpProgressReporter))
        .await
        .unwrap();
    assert_eq!(report.written, 2);

    // Lossless output keeps the exact garment color outside the bbox
    let composite = image::open(ws.out().join("cube/darth/negre/black.png"))
        .unwrap()
        .to_rgba8();
    assert_eq!(*composite.get_pixel(0, 0), BLACK);
}

#[test]
fn test_profile_upsert_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path());
    ws.add_profile("cube/darth", 50, 60, 100, 120);
    // Unrelated fields must survive rewrites
    let mut document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(ws.profiles()).unwrap()).unwrap();
    document["profiles"]["cube/darth"]["note"] = serde_json::json!("calibrated by hand");
    fs::write(ws.profiles(), document.to_string()).unwrap();

    let bbox = mockup_pipeline::BoundingBox::new(10, 20, 30, 40).unwrap();
    let mut store = JsonProfileStore::open(ws.profiles()).unwrap();
    let first = store.upsert("cube", "darth", bbox).unwrap();
    assert!(first.changed);
    assert!(!first.created);
    let after_first = fs::read_to_string(ws.profiles()).unwrap();

    let mut store = JsonProfileStore::open(ws.profiles()).unwrap();
    let second = store.upsert("cube", "darth", bbox).unwrap();
    assert!(!second.changed);
    assert_eq!(fs::read_to_string(ws.profiles()).unwrap(), after_first);

    let profile = store.get("cube/darth").unwrap().unwrap();
    assert_eq!(profile.bbox, bbox);
    assert_eq!(profile.extra["note"], "calibrated by hand");
}
