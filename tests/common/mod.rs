//! Shared fixtures for integration tests
#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const RED: Rgba<u8> = Rgba([220, 30, 30, 255]);

/// Write a solid-color PNG, creating parent directories
pub fn write_png(path: &Path, width: u32, height: u32, color: Rgba<u8>) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(width, height, color).save(path).unwrap();
}

/// A garment-workspace layout below one temp root
pub struct Workspace {
    pub root: PathBuf,
}

impl Workspace {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn drawings(&self) -> PathBuf {
        self.root.join("drawings")
    }

    pub fn placeholders(&self) -> PathBuf {
        self.root.join("placeholders")
    }

    pub fn profiles(&self) -> PathBuf {
        self.root.join("placement-profiles.json")
    }

    pub fn out(&self) -> PathBuf {
        self.root.join("mockups")
    }

    pub fn add_drawing(&self, collection: &str, ink: &str, file: &str, color: Rgba<u8>) -> PathBuf {
        let path = self.drawings().join(collection).join(ink).join(file);
        write_png(&path, 40, 20, color);
        path
    }

    /// Placeholder photos plus manifest entries for `(color, pixel)` pairs
    pub fn add_placeholders(&self, colors: &[(&str, Rgba<u8>)]) {
        let dir = self.placeholders();
        let mut items = Vec::new();
        for (color, pixel) in colors {
            let filename = format!("{color}.png");
            write_png(&dir.join(&filename), 200, 240, *pixel);
            items.push(json!({ "color": color, "filename": filename }));
        }
        fs::write(dir.join("manifest.json"), json!({ "items": items }).to_string()).unwrap();
    }

    pub fn select_colors(&self, colors: &[&str]) {
        fs::create_dir_all(self.placeholders()).unwrap();
        fs::write(
            self.placeholders().join("colors.json"),
            json!({ "selected": colors }).to_string(),
        )
        .unwrap();
    }

    pub fn add_profile(&self, key: &str, x: i64, y: i64, w: u32, h: u32) {
        let mut document = if self.profiles().exists() {
            serde_json::from_str::<serde_json::Value>(&fs::read_to_string(self.profiles()).unwrap()).unwrap()
        } else {
            json!({ "profiles": {} })
        };
        document["profiles"][key] = json!({ "bbox": { "x": x, "y": y, "w": w, "h": h } });
        fs::write(self.profiles(), document.to_string()).unwrap();
    }

    /// Two inks of `cube/darth` on white and black garments
    pub fn cube_darth(&self) {
        self.add_drawing("cube", "blanc", "darth.png", WHITE);
        self.add_drawing("cube", "negre", "darth.png", BLACK);
        self.add_placeholders(&[("white", WHITE), ("black", BLACK)]);
        self.select_colors(&["white", "black"]);
        self.add_profile("cube/darth", 10, 20, 100, 150);
    }
}

/// Sorted relative paths of every file below `root`
pub fn files_below(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}
