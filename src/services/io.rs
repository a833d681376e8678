//! Image I/O operations service
//!
//! Keeps file access (decode, encode-to-disk, atomic replace) out of the
//! pixel-level modules so they can be exercised on in-memory buffers.

use crate::{
    config::OutputFormat,
    error::{MockupError, Result},
    services::format::OutputFormatHandler,
};
use image::{DynamicImage, RgbaImage};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content sniffing when the extension lies about the format.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use mockup_pipeline::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("placeholders/white.png")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(MockupError::file_not_found(path_ref));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                debug!(
                    path = %path_ref.display(),
                    error = %e,
                    "Extension-based loading failed, attempting content-based detection"
                );

                let data = std::fs::read(path_ref)
                    .map_err(|io_err| MockupError::file_io_error("read image data", path_ref, &io_err))?;

                image::load_from_memory(&data).map_err(|content_err| {
                    MockupError::processing_stage_error(
                        "image loading",
                        &format!("extension error: {e}; content error: {content_err}"),
                        Some(&format!("path: {}, size: {} bytes", path_ref.display(), data.len())),
                    )
                })
            },
        }
    }

    /// Load an image and convert it to 8-bit RGBA
    pub fn load_rgba<P: AsRef<Path>>(path: P) -> Result<RgbaImage> {
        Ok(Self::load_image(path)?.to_rgba8())
    }

    /// Encode `image` and write it to `path`, creating parent directories
    ///
    /// Returns the number of bytes written.
    pub fn save_rgba<P: AsRef<Path>>(
        image: &RgbaImage,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<u64> {
        let path_ref = path.as_ref();
        let bytes = OutputFormatHandler::encode(image, format, quality)?;
        ensure_parent_dir(path_ref)?;
        std::fs::write(path_ref, &bytes)
            .map_err(|e| MockupError::file_io_error("write image", path_ref, &e))?;
        Ok(bytes.len() as u64)
    }

    /// Size of a file in bytes
    pub fn file_size<P: AsRef<Path>>(path: P) -> Result<u64> {
        let path_ref = path.as_ref();
        let metadata = std::fs::metadata(path_ref)
            .map_err(|e| MockupError::file_io_error("stat file", path_ref, &e))?;
        Ok(metadata.len())
    }
}

/// Create the parent directory of `path` if needed
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MockupError::file_io_error("create output directory", parent, &e))?;
        }
    }
    Ok(())
}

/// Replace `path` with `bytes` atomically
///
/// Writes into a temporary file in the same directory, flushes it and renames
/// it over the destination, so readers never observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| MockupError::file_io_error("create temporary file", dir, &e))?;
    tmp.write_all(bytes)
        .map_err(|e| MockupError::file_io_error("write temporary file", tmp.path(), &e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| MockupError::file_io_error("sync temporary file", tmp.path(), &e))?;
    tmp.persist(path)
        .map_err(|e| MockupError::file_io_error("replace file", path, &e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "Atomically replaced file");
    Ok(())
}
