//! Placeholder manifest and color selection files
//!
//! `manifest.json` is `{ "items": [{ "color": "...", "filename": "..." }] }` and
//! `colors.json` is `{ "selected": ["white", "black"] }`. Both conventionally live
//! in the placeholder directory.

use crate::error::{MockupError, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default manifest file name inside the placeholder directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Default color selection file name inside the placeholder directory
pub const COLORS_FILE: &str = "colors.json";

/// One garment photo and the color it shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub color: String,
    pub filename: String,
}

/// Color to placeholder photo mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderManifest {
    #[serde(default)]
    pub items: Vec<ManifestItem>,
}

impl PlaceholderManifest {
    /// Load a manifest file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref(), "read placeholder manifest")
    }

    /// Placeholder filename for `color` (exact, case-sensitive match; first entry wins)
    #[must_use]
    pub fn lookup(&self, color: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.color == color)
            .map(|item| item.filename.as_str())
    }

    /// Absolute placeholder path for `color` below `placeholder_dir`
    #[must_use]
    pub fn resolve(&self, placeholder_dir: &Path, color: &str) -> Option<PathBuf> {
        self.lookup(color).map(|filename| placeholder_dir.join(filename))
    }
}

/// Selected garment colors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSelection {
    #[serde(default)]
    pub selected: Vec<String>,
}

impl ColorSelection {
    /// Load a colors file; repeated colors keep their first position
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let loaded: Self = read_json(path.as_ref(), "read color selection")?;
        Ok(Self::from_colors(loaded.selected))
    }

    /// Selection from an explicit list, dropping repeats but keeping order
    #[must_use]
    pub fn from_colors<I, S>(colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected: Vec<String> = Vec::new();
        for color in colors {
            let color = color.into();
            if !selected.contains(&color) {
                selected.push(color);
            }
        }
        Self { selected }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Whether `color` can name an output file: non-empty, no path separators, no `..`
#[must_use]
pub fn is_valid_color_name(color: &str) -> bool {
    !color.is_empty() && !color.contains(['/', '\\']) && !color.contains("..")
}

fn read_json<T: DeserializeOwned>(path: &Path, operation: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MockupError::file_io_error(operation, path, &e))?;
    Ok(serde_json::from_str(&content)?)
}
