//! Output file naming, PNG persistence, and data URLs.

use std::path::{Path, PathBuf};

use base64::Engine;

use crate::error::StudioError;
use crate::ports::GeneratedImage;

/// Path of the file a given seed is written to.
#[must_use]
pub fn seed_path(dir: &Path, seed: u32) -> PathBuf {
    dir.join(format!("{seed}.png"))
}

/// Write an image as `<dir>/<seed>.png`, creating `dir` if needed.
///
/// An existing file for the same seed is replaced.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written, or the image
/// needs conversion and cannot be decoded.
pub fn persist(image: &GeneratedImage, dir: &Path, seed: u32) -> Result<PathBuf, StudioError> {
    std::fs::create_dir_all(dir)?;
    let path = seed_path(dir, seed);
    if path.exists() {
        tracing::warn!(path = %path.display(), "overwriting earlier output with the same seed");
    }
    save_png(&image.data, &image.mime_type, &path)?;
    Ok(path)
}

/// Save raw image bytes as PNG, converting if the source is another format.
///
/// # Errors
///
/// Returns an error if the file cannot be written or conversion fails.
pub fn save_png(data: &[u8], source_mime: &str, output_path: &Path) -> Result<(), StudioError> {
    if source_mime == "image/png" {
        std::fs::write(output_path, data).map_err(StudioError::Io)
    } else {
        let img = image::load_from_memory(data)
            .map_err(|e| StudioError::ImageConversion(format!("Failed to decode image: {e}")))?;
        img.save_with_format(output_path, image::ImageFormat::Png)
            .map_err(|e| StudioError::ImageConversion(format!("Failed to save as png: {e}")))
    }
}

/// Encode an image as a `data:` URL for the web page.
#[must_use]
pub fn data_url(image: &GeneratedImage) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&image.data);
    format!("data:{};base64,{encoded}", image.mime_type)
}
