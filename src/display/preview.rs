//! Off-device sink: each frame becomes a PNG file.

use super::{DisplayError, DisplaySink};
use crate::canvas::{IndexedImage, Palette};
use std::path::PathBuf;

/// Writes frames as PNG using the softer on-screen palette
pub struct PreviewSink {
    path: PathBuf,
}

impl PreviewSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl DisplaySink for PreviewSink {
    fn name(&self) -> &'static str {
        "preview"
    }

    fn render(&mut self, frame: &IndexedImage) -> Result<(), DisplayError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write to a temp file first so a viewer never sees half a frame
        let temp_path = self.path.with_extension("png.tmp");
        frame
            .to_rgb(&Palette::PREVIEW)
            .save_with_format(&temp_path, image::ImageFormat::Png)?;
        std::fs::rename(&temp_path, &self.path)?;

        tracing::debug!("Preview written to {}", self.path.display());
        Ok(())
    }
}
