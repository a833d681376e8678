//! Placement profile store
//!
//! Profiles map `"collection/design"` to a calibrated bounding box in
//! placeholder pixel space. The pipeline only depends on the
//! [`ProfileRepository`] trait; [`JsonProfileStore`] persists the flat JSON
//! document `{ "profiles": { "<key>": { "bbox": {x,y,w,h}, ... } } }` and
//! [`MemoryProfileStore`] backs tests and dry planning.

use crate::{
    error::{MockupError, Result},
    services::io::write_atomic,
    types::BoundingBox,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Calibration fields tried in order when importing a bounding box
pub const CALIBRATION_BBOX_FIELDS: [&str; 3] = ["bboxPaddedScaled", "bboxScaled", "bbox"];

/// Build the `"collection/design"` key, rejecting empty or slash-containing parts
pub fn profile_key(collection: &str, design: &str) -> Result<String> {
    for (name, part) in [("collection", collection), ("design", design)] {
        if part.is_empty() || part.contains('/') {
            return Err(MockupError::usage(format!(
                "{name} must be non-empty and contain no '/': \"{part}\""
            )));
        }
    }
    Ok(format!("{collection}/{design}"))
}

/// A stored profile: the bounding box plus any unrelated fields kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementProfile {
    pub bbox: BoundingBox,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlacementProfile {
    fn from_entry(key: &str, entry: &Map<String, Value>) -> Result<Self> {
        let bbox_value = entry
            .get("bbox")
            .ok_or_else(|| MockupError::invalid_bbox(format!("profile \"{key}\" has no bbox")))?;
        let bbox = BoundingBox::from_json(bbox_value)
            .map_err(|e| MockupError::invalid_bbox(format!("profile \"{key}\": {e}")))?;
        let mut extra = entry.clone();
        extra.remove("bbox");
        Ok(Self { bbox, extra })
    }
}

/// Outcome of an upsert, reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    pub key: String,
    pub created: bool,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<BoundingBox>,
    pub bbox: BoundingBox,
}

/// Key-value access to placement profiles
pub trait ProfileRepository {
    /// All keys, sorted
    fn list(&self) -> Vec<String>;

    /// Profile for `key`, if present
    ///
    /// # Errors
    /// `InvalidBoundingBox` when the stored entry is malformed.
    fn get(&self, key: &str) -> Result<Option<PlacementProfile>>;

    /// Insert or update the bounding box for `collection/design`, keeping other fields
    fn upsert(&mut self, collection: &str, design: &str, bbox: BoundingBox) -> Result<UpsertOutcome>;

    /// Remove `key`; returns whether it existed
    fn delete(&mut self, key: &str) -> Result<bool>;
}

/// On-disk document layout; unknown top-level fields survive a rewrite
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    profiles: BTreeMap<String, Map<String, Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn merge_bbox(
    profiles: &mut BTreeMap<String, Map<String, Value>>,
    key: String,
    bbox: BoundingBox,
) -> Result<UpsertOutcome> {
    let bbox_value = serde_json::to_value(bbox)?;
    let created = !profiles.contains_key(&key);
    let entry = profiles.entry(key.clone()).or_default();
    let previous = entry
        .get("bbox")
        .and_then(|v| BoundingBox::from_json(v).ok());
    let changed = entry.get("bbox") != Some(&bbox_value);
    entry.insert("bbox".to_string(), bbox_value);
    Ok(UpsertOutcome {
        key,
        created,
        changed,
        previous,
        bbox,
    })
}

/// Profile store persisted as a single JSON file, rewritten whole on every mutation
#[derive(Debug)]
pub struct JsonProfileStore {
    path: PathBuf,
    document: ProfileDocument,
    dry_run: bool,
}

impl JsonProfileStore {
    /// Open `path`, starting from an empty store if the file does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "Profile store does not exist yet, starting empty");
            return Ok(Self {
                path: path.to_path_buf(),
                document: ProfileDocument::default(),
                dry_run: false,
            });
        }
        Self::open_existing(path)
    }

    /// Open `path`, failing with `FileNotFound` if it is missing
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MockupError::file_io_error("read profile store", path, &e))?;
        let document: ProfileDocument = serde_json::from_str(&content)?;
        debug!(path = %path.display(), profiles = document.profiles.len(), "Loaded profile store");
        Ok(Self {
            path: path.to_path_buf(),
            document,
            dry_run: false,
        })
    }

    /// Skip all disk writes
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialized document as written to disk
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(&self.document)?;
        json.push('\n');
        Ok(json)
    }

    fn save(&self) -> Result<()> {
        if self.dry_run {
            debug!(path = %self.path.display(), "Dry run, profile store not written");
            return Ok(());
        }
        write_atomic(&self.path, self.to_json()?.as_bytes())?;
        info!(path = %self.path.display(), profiles = self.document.profiles.len(), "Profile store written");
        Ok(())
    }
}

impl ProfileRepository for JsonProfileStore {
    fn list(&self) -> Vec<String> {
        self.document.profiles.keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Result<Option<PlacementProfile>> {
        self.document
            .profiles
            .get(key)
            .map(|entry| PlacementProfile::from_entry(key, entry))
            .transpose()
    }

    fn upsert(&mut self, collection: &str, design: &str, bbox: BoundingBox) -> Result<UpsertOutcome> {
        let key = profile_key(collection, design)?;
        let outcome = merge_bbox(&mut self.document.profiles, key, bbox)?;
        self.save()?;
        Ok(outcome)
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        let existed = self.document.profiles.remove(key).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }
}

/// In-memory profile store
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profiles: BTreeMap<String, Map<String, Value>>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor from `(key, bbox)` pairs
    pub fn from_entries<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, BoundingBox)>,
        K: Into<String>,
    {
        let mut store = Self::new();
        for (key, bbox) in entries {
            merge_bbox(&mut store.profiles, key.into(), bbox)?;
        }
        Ok(store)
    }
}

impl ProfileRepository for MemoryProfileStore {
    fn list(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Result<Option<PlacementProfile>> {
        self.profiles
            .get(key)
            .map(|entry| PlacementProfile::from_entry(key, entry))
            .transpose()
    }

    fn upsert(&mut self, collection: &str, design: &str, bbox: BoundingBox) -> Result<UpsertOutcome> {
        let key = profile_key(collection, design)?;
        merge_bbox(&mut self.profiles, key, bbox)
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.profiles.remove(key).is_some())
    }
}

/// Pick the calibrated bounding box out of a calibration document
///
/// The first present field of [`CALIBRATION_BBOX_FIELDS`] wins.
pub fn bbox_from_calibration(calibration: &Value) -> Result<BoundingBox> {
    CALIBRATION_BBOX_FIELDS
        .iter()
        .find_map(|field| calibration.get(*field))
        .ok_or_else(|| {
            MockupError::invalid_bbox(format!(
                "calibration has none of {}",
                CALIBRATION_BBOX_FIELDS.join(", ")
            ))
        })
        .and_then(BoundingBox::from_json)
}

/// Read a calibration JSON file and extract its bounding box
pub fn load_calibration<P: AsRef<Path>>(path: P) -> Result<BoundingBox> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| MockupError::file_io_error("read calibration", path, &e))?;
    let value: Value = serde_json::from_str(&content)?;
    bbox_from_calibration(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn bbox(x: i64, y: i64, w: u32, h: u32) -> BoundingBox {
        BoundingBox::new(x, y, w, h).unwrap()
    }

    #[test]
    fn test_upsert_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");

        let mut store = JsonProfileStore::open(&path).unwrap();
        let first = store.upsert("cube", "darth", bbox(10, 20, 100, 150)).unwrap();
        assert!(first.created);
        let after_first = std::fs::read_to_string(&path).unwrap();

        let mut store = JsonProfileStore::open(&path).unwrap();
        let second = store.upsert("cube", "darth", bbox(10, 20, 100, 150)).unwrap();
        assert!(!second.created);
        assert!(!second.changed);
        let after_second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(after_first, after_second);
        assert_eq!(after_second.matches("cube/darth").count(), 1);
    }

    #[test]
    fn test_upsert_preserves_unrelated_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(
            &path,
            json!({
                "version": 3,
                "profiles": {
                    "cube/darth": {"bbox": {"x": 1, "y": 2, "w": 3, "h": 4}, "note": "calibrated on v2"}
                }
            })
            .to_string(),
        )
        .unwrap();

        let mut store = JsonProfileStore::open_existing(&path).unwrap();
        let outcome = store.upsert("cube", "darth", bbox(5, 6, 7, 8)).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.previous, Some(bbox(1, 2, 3, 4)));

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["version"], 3);
        assert_eq!(written["profiles"]["cube/darth"]["note"], "calibrated on v2");
        assert_eq!(written["profiles"]["cube/darth"]["bbox"], json!({"x": 5, "y": 6, "w": 7, "h": 8}));
    }

    #[test]
    fn test_list_get_delete() {
        let mut store = MemoryProfileStore::from_entries([
            ("tote/wave", bbox(0, 0, 10, 10)),
            ("cube/darth", bbox(10, 20, 100, 150)),
        ])
        .unwrap();

        assert_eq!(store.list(), vec!["cube/darth", "tote/wave"]);
        assert_eq!(store.get("cube/darth").unwrap().unwrap().bbox, bbox(10, 20, 100, 150));
        assert!(store.get("cube/nope").unwrap().is_none());

        assert!(store.delete("tote/wave").unwrap());
        assert!(!store.delete("tote/wave").unwrap());
        assert_eq!(store.list(), vec!["cube/darth"]);
    }

    #[test]
    fn test_dry_run_does_not_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");
        let mut store = JsonProfileStore::open(&path).unwrap().with_dry_run(true);
        store.upsert("cube", "darth", bbox(1, 1, 1, 1)).unwrap();
        assert!(!path.exists());
        assert_eq!(store.list(), vec!["cube/darth"]);
    }

    #[test]
    fn test_malformed_stored_bbox_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, r#"{"profiles":{"cube/bad":{"bbox":{"x":0,"y":0,"w":0,"h":5}}}}"#).unwrap();
        let store = JsonProfileStore::open_existing(&path).unwrap();
        assert!(matches!(store.get("cube/bad"), Err(MockupError::InvalidBoundingBox(_))));
    }

    #[test]
    fn test_open_existing_missing_file() {
        let err = JsonProfileStore::open_existing("/no/such/profiles.json").unwrap_err();
        assert!(matches!(err, MockupError::FileNotFound(_)));
    }

    #[test]
    fn test_calibration_field_priority() {
        let calibration = json!({
            "bbox": {"x": 0, "y": 0, "w": 10, "h": 10},
            "bboxScaled": {"x": 1, "y": 1, "w": 20, "h": 20},
            "bboxPaddedScaled": {"x": 2.4, "y": 2.6, "width": 30, "height": 30}
        });
        assert_eq!(bbox_from_calibration(&calibration).unwrap(), bbox(2, 3, 30, 30));

        let only_bbox = json!({"bbox": {"x": 0, "y": 0, "w": 10, "h": 10}});
        assert_eq!(bbox_from_calibration(&only_bbox).unwrap(), bbox(0, 0, 10, 10));

        assert!(bbox_from_calibration(&json!({"other": 1})).is_err());
    }

    #[test]
    fn test_profile_key_validation() {
        assert_eq!(profile_key("cube", "darth").unwrap(), "cube/darth");
        assert!(profile_key("", "darth").is_err());
        assert!(profile_key("cube", "a/b").is_err());
    }
}
