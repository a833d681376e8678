//! Filesystem reconciliation
//!
//! Two bookkeeping passes around the asset trees: applying a planned set of
//! renames and deletions relative to a root, and materializing a canonical
//! tree into a legacy location while leaving identical files untouched.

use crate::{
    error::{MockupError, Result},
    services::{ProcessingStage, ProgressReporter, ProgressTracker},
    tracing_config::spans,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One planned rename, both paths relative to the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// `{ "renames": [{ "from", "to" }], "deletions": ["path", ...] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationPlan {
    #[serde(default)]
    pub renames: Vec<Rename>,
    #[serde(default)]
    pub deletions: Vec<PathBuf>,
}

impl NormalizationPlan {
    /// Load a plan file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MockupError::file_io_error("read normalization plan", path, &e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// What happened to one plan item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Performed
    Applied,
    /// Would be performed (dry run)
    Planned,
    /// Nothing to do
    Skipped,
    /// Refused or failed
    Failed,
}

/// Outcome of one rename or deletion
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<PathBuf>,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ItemResult {
    fn new(path: &Path, to: Option<&Path>, status: ItemStatus, reason: Option<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            to: to.map(Path::to_path_buf),
            status,
            reason,
        }
    }
}

/// Report for `normalize`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationReport {
    pub root: PathBuf,
    pub dry_run: bool,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub renames: Vec<ItemResult>,
    pub deletions: Vec<ItemResult>,
}

/// Reject absolute paths and `..` so plan items stay inside the root
fn confined(root: &Path, relative: &Path) -> std::result::Result<PathBuf, String> {
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return Err(format!("path must be relative to the root: {}", relative.display()));
    }
    Ok(root.join(relative))
}

fn apply_rename(root: &Path, rename: &Rename, dry_run: bool) -> ItemResult {
    let result = |status, reason: Option<String>| ItemResult::new(&rename.from, Some(&rename.to), status, reason);

    let (from, to) = match (confined(root, &rename.from), confined(root, &rename.to)) {
        (Ok(from), Ok(to)) => (from, to),
        (Err(reason), _) | (_, Err(reason)) => return result(ItemStatus::Failed, Some(reason)),
    };
    if !from.exists() {
        return result(ItemStatus::Skipped, Some("source missing".to_string()));
    }
    if to.exists() {
        return result(ItemStatus::Failed, Some("target exists".to_string()));
    }
    if dry_run {
        return result(ItemStatus::Planned, None);
    }

    let renamed = to
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| std::fs::rename(&from, &to));
    match renamed {
        Ok(()) => {
            debug!(from = %from.display(), to = %to.display(), "Renamed");
            result(ItemStatus::Applied, None)
        },
        Err(e) => result(ItemStatus::Failed, Some(e.to_string())),
    }
}

fn apply_deletion(root: &Path, relative: &Path, dry_run: bool) -> ItemResult {
    let result = |status, reason: Option<String>| ItemResult::new(relative, None, status, reason);

    let target = match confined(root, relative) {
        Ok(target) => target,
        Err(reason) => return result(ItemStatus::Failed, Some(reason)),
    };
    let Ok(metadata) = std::fs::symlink_metadata(&target) else {
        return result(ItemStatus::Skipped, Some("not found".to_string()));
    };
    if dry_run {
        return result(ItemStatus::Planned, None);
    }

    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(&target)
    } else {
        std::fs::remove_file(&target)
    };
    match removed {
        Ok(()) => {
            debug!(path = %target.display(), "Deleted");
            result(ItemStatus::Applied, None)
        },
        Err(e) => result(ItemStatus::Failed, Some(e.to_string())),
    }
}

/// Apply `plan` below `root`: renames first, then deletions
///
/// Renames never overwrite and missing deletion targets are skipped; every
/// item is reported individually and none aborts the run.
///
/// # Errors
/// `FileNotFound` when `root` is missing.
pub fn apply_normalization(root: &Path, plan: &NormalizationPlan, dry_run: bool) -> Result<NormalizationReport> {
    if !root.is_dir() {
        return Err(MockupError::file_not_found(root));
    }
    let _span = spans::reconcile("normalize", root).entered();

    let renames: Vec<ItemResult> = plan.renames.iter().map(|r| apply_rename(root, r, dry_run)).collect();
    let deletions: Vec<ItemResult> = plan
        .deletions
        .iter()
        .map(|d| apply_deletion(root, d, dry_run))
        .collect();

    let count = |status: ItemStatus| {
        renames
            .iter()
            .chain(deletions.iter())
            .filter(|item| item.status == status)
            .count()
    };
    let applied = count(if dry_run { ItemStatus::Planned } else { ItemStatus::Applied });
    let skipped = count(ItemStatus::Skipped);
    let failed = count(ItemStatus::Failed);

    for item in renames.iter().chain(deletions.iter()) {
        if item.status == ItemStatus::Failed {
            warn!(path = %item.path.display(), reason = ?item.reason, "Normalization item failed");
        }
    }
    info!(applied, skipped, failed, dry_run, "Normalization plan processed");

    Ok(NormalizationReport {
        root: root.to_path_buf(),
        dry_run,
        applied,
        skipped,
        failed,
        renames,
        deletions,
    })
}

/// Hex SHA-256 of a file
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| MockupError::file_io_error("open file for hashing", path, &e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| MockupError::file_io_error("hash file", path, &e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Per-file action of the materializer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyAction {
    /// Destination did not exist
    Created,
    /// Destination differed and was replaced
    Updated,
    /// Destination already identical
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterializedFile {
    pub path: PathBuf,
    pub action: CopyAction,
}

/// Report for `materialize`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializeReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub dry_run: bool,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub bytes_copied: u64,
    pub files: Vec<MaterializedFile>,
}

/// Copy the tree under `source` into `destination`
///
/// Files whose SHA-256 already matches at the destination are left alone.
/// Nothing is deleted at the destination.
///
/// # Errors
/// Missing source, unreadable files, failed copies.
pub fn materialize(
    source: &Path,
    destination: &Path,
    dry_run: bool,
    reporter: Box<dyn ProgressReporter>,
) -> Result<MaterializeReport> {
    if !source.is_dir() {
        return Err(MockupError::file_not_found(source));
    }
    let _span = spans::reconcile("materialize", destination).entered();

    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed"));
            MockupError::file_io_error("walk source tree", source, &io)
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let mut report = MaterializeReport {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        dry_run,
        created: 0,
        updated: 0,
        unchanged: 0,
        bytes_copied: 0,
        files: Vec::with_capacity(files.len()),
    };
    let mut tracker = ProgressTracker::new(reporter, ProcessingStage::Materializing, files.len());

    for file in files {
        let relative = file
            .strip_prefix(source)
            .map_err(|_| MockupError::processing(format!("{} is outside {}", file.display(), source.display())))?
            .to_path_buf();
        let target = destination.join(&relative);

        let action = if target.is_file() {
            if file_digest(&file)? == file_digest(&target)? {
                CopyAction::Unchanged
            } else {
                CopyAction::Updated
            }
        } else {
            CopyAction::Created
        };

        if action != CopyAction::Unchanged && !dry_run {
            crate::services::io::ensure_parent_dir(&target)?;
            let bytes = std::fs::copy(&file, &target).map_err(|e| MockupError::file_io_error("copy file", &target, &e))?;
            report.bytes_copied += bytes;
        }

        match action {
            CopyAction::Created => report.created += 1,
            CopyAction::Updated => report.updated += 1,
            CopyAction::Unchanged => report.unchanged += 1,
        }
        tracker.item_done(&relative.display().to_string(), true);
        report.files.push(MaterializedFile { path: relative, action });
    }
    tracker.finish();

    info!(
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        dry_run,
        "Materialized tree"
    );
    Ok(report)
}
