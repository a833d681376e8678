//! Drawing asset discovery
//!
//! Walks `drawings/<collection>/<ink>/<design-file>` and groups files by
//! `(collection, design slug, ink variant)`. A collection without ink folders
//! is treated as a single implicit `default` ink bucket. Listing is
//! name-sorted, so "first occurrence wins" is deterministic.

use crate::{
    error::{MockupError, Result},
    types::DuplicateDrawing,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Ink bucket used when a collection folder has no ink subfolders
pub const DEFAULT_INK: &str = "default";

/// Source drawing extensions (lowercase)
pub const DRAWING_EXTENSIONS: [&str; 4] = ["png", "webp", "jpg", "jpeg"];

/// `ink -> drawing file`
pub type InkFiles = BTreeMap<String, PathBuf>;

/// Result of indexing a drawings root
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingIndex {
    /// `collection -> design slug -> ink -> absolute file path`
    pub collections: BTreeMap<String, BTreeMap<String, InkFiles>>,
    /// Files dropped because an earlier file in the same ink folder had the same slug
    pub duplicates: Vec<DuplicateDrawing>,
}

impl DrawingIndex {
    /// Iterate `(collection, design, inks)` in sorted order
    pub fn designs(&self) -> impl Iterator<Item = (&str, &str, &InkFiles)> {
        self.collections.iter().flat_map(|(collection, designs)| {
            designs
                .iter()
                .map(move |(design, inks)| (collection.as_str(), design.as_str(), inks))
        })
    }

    #[must_use]
    pub fn design_count(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.designs().map(|(_, _, inks)| inks.len()).sum()
    }

    /// Keep only the named collection
    #[must_use]
    pub fn only_collection(mut self, collection: &str) -> Self {
        self.collections.retain(|name, _| name == collection);
        self.duplicates.retain(|d| d.collection == collection);
        self
    }

    fn insert(&mut self, collection: &str, ink: &str, design: String, path: PathBuf) {
        let designs = self.collections.entry(collection.to_string()).or_default();
        let inks = designs.entry(design.clone()).or_default();
        if let Some(kept) = inks.get(ink) {
            warn!(
                collection,
                ink,
                design = %design,
                kept = %kept.display(),
                dropped = %path.display(),
                "Duplicate design slug, keeping first file"
            );
            self.duplicates.push(DuplicateDrawing {
                collection: collection.to_string(),
                ink: ink.to_string(),
                design,
                kept: kept.clone(),
                dropped: path,
            });
        } else {
            inks.insert(ink.to_string(), path);
        }
    }
}

/// Check if file is a supported drawing based on extension
#[must_use]
pub fn is_drawing_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DRAWING_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Derive the design slug from a drawing file name
///
/// Strips the extension, a trailing `-w`/`-b` ink marker and a leading numeric
/// ordering prefix, then normalizes to lowercase kebab-case.
///
/// ```rust
/// use mockup_pipeline::indexer::design_slug;
///
/// assert_eq!(design_slug("03_Darth Vader-W.png"), "darth-vader");
/// assert_eq!(design_slug("Cube.webp"), "cube");
/// ```
#[must_use]
pub fn design_slug(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let lower = stem.to_lowercase();
    let without_ink = lower
        .strip_suffix("-w")
        .or_else(|| lower.strip_suffix("-b"))
        .unwrap_or(&lower);

    let without_prefix = strip_numeric_prefix(without_ink);
    kebab_case(without_prefix)
}

/// `"01-foo"`, `"01_foo"`, `"1. foo"` -> `"foo"`; names that are only digits are kept
fn strip_numeric_prefix(name: &str) -> &str {
    let digits_end = name
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(name.len(), |(i, _)| i);
    if digits_end == 0 {
        return name;
    }
    let rest = name.get(digits_end..).unwrap_or_default();
    let trimmed = rest.trim_start_matches(|c: char| matches!(c, '-' | '_' | '.' | ' '));
    if trimmed.len() == rest.len() || trimmed.is_empty() {
        // "2001odyssey" or "42": the digits are part of the name
        return name;
    }
    trimmed
}

fn kebab_case(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Sorted immediate entries of `dir`, skipping hidden names
fn sorted_entries(dir: &Path) -> Result<Vec<walkdir::DirEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed"));
            MockupError::file_io_error("list directory", dir, &io)
        })?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Index every collection below `root`
///
/// # Errors
/// `FileNotFound` when `root` is missing; I/O errors while listing.
pub fn index_drawings<P: AsRef<Path>>(root: P) -> Result<DrawingIndex> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(MockupError::file_not_found(root));
    }
    let root = std::fs::canonicalize(root)
        .map_err(|e| MockupError::file_io_error("resolve drawings root", root, &e))?;

    let mut index = DrawingIndex::default();

    for collection_entry in sorted_entries(&root)? {
        if !collection_entry.file_type().is_dir() {
            continue;
        }
        let collection = collection_entry.file_name().to_string_lossy().to_string();
        let entries = sorted_entries(collection_entry.path())?;

        let ink_dirs: Vec<&walkdir::DirEntry> =
            entries.iter().filter(|e| e.file_type().is_dir()).collect();

        if ink_dirs.is_empty() {
            index_ink_folder(&mut index, &collection, DEFAULT_INK, &entries);
        } else {
            // Root-level files next to ink folders are a different asset type
            for ink_dir in ink_dirs {
                let ink = ink_dir.file_name().to_string_lossy().to_string();
                let files = sorted_entries(ink_dir.path())?;
                index_ink_folder(&mut index, &collection, &ink, &files);
            }
        }
    }

    debug!(
        collections = index.collections.len(),
        designs = index.design_count(),
        files = index.file_count(),
        duplicates = index.duplicates.len(),
        "Indexed drawings"
    );
    Ok(index)
}

fn index_ink_folder(
    index: &mut DrawingIndex,
    collection: &str,
    ink: &str,
    entries: &[walkdir::DirEntry],
) {
    for entry in entries {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_drawing_file(path) {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let design = design_slug(&file_name);
        if design.is_empty() {
            warn!(file = %path.display(), "Skipping drawing with empty design slug");
            continue;
        }
        index.insert(collection, ink, design, path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_design_slug_rules() {
        assert_eq!(design_slug("darth.png"), "darth");
        assert_eq!(design_slug("Darth-W.png"), "darth");
        assert_eq!(design_slug("darth-b.webp"), "darth");
        assert_eq!(design_slug("01-darth.png"), "darth");
        assert_eq!(design_slug("12_Baby Yoda_B.png"), "baby-yoda-b");
        assert_eq!(design_slug("7. Star  Wars!!.jpeg"), "star-wars");
        assert_eq!(design_slug("2001odyssey.png"), "2001odyssey");
        assert_eq!(design_slug("42.png"), "42");
        assert_eq!(design_slug("--weird__name--.png"), "weird-name");
    }

    #[test]
    fn test_index_with_ink_folders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("cube/blanc/darth-w.png"));
        touch(&root.join("cube/negre/darth-b.png"));
        touch(&root.join("cube/negre/notes.txt"));
        touch(&root.join("cube/cover.png")); // ignored: collection has ink folders

        let index = index_drawings(root).unwrap();
        let inks = &index.collections["cube"]["darth"];
        assert_eq!(inks.keys().collect::<Vec<_>>(), vec!["blanc", "negre"]);
        assert!(inks["blanc"].is_absolute());
        assert!(!index.collections["cube"].contains_key("cover"));
        assert_eq!(index.file_count(), 2);
    }

    #[test]
    fn test_index_default_ink_bucket() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("minimal/01-sun.png"));
        touch(&dir.path().join("minimal/02-moon.jpg"));

        let index = index_drawings(dir.path()).unwrap();
        let designs = &index.collections["minimal"];
        assert_eq!(designs.len(), 2);
        assert!(designs["sun"].contains_key(DEFAULT_INK));
        assert!(designs["moon"].contains_key(DEFAULT_INK));
    }

    #[test]
    fn test_first_match_wins_and_duplicate_is_reported() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("cube/blanc/01-darth.png"));
        touch(&dir.path().join("cube/blanc/darth-w.png"));

        let index = index_drawings(dir.path()).unwrap();
        let kept = &index.collections["cube"]["darth"]["blanc"];
        assert!(kept.ends_with("01-darth.png"));
        assert_eq!(index.duplicates.len(), 1);
        assert!(index.duplicates[0].dropped.ends_with("darth-w.png"));
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let err = index_drawings("/definitely/not/here").unwrap_err();
        assert!(matches!(err, MockupError::FileNotFound(_)));
    }
}
