//! Display sinks for the finished 400x300 frame.
//!
//! [`InkyWhat`] drives the real panel; [`PreviewSink`] writes PNG files
//! when no panel is attached. [`DisplayController`] owns whichever sink is
//! active and runs the blocking refresh off the async runtime.

pub mod gpio;
pub mod inky_what;
pub mod preview;
pub mod spi;

pub use inky_what::InkyWhat;
pub use preview::PreviewSink;

use crate::canvas::IndexedImage;
use gpio::GpioError;
use serde::{Deserialize, Serialize};
use spi::SpiError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Display errors
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),

    #[error("SPI error: {0}")]
    Spi(#[from] SpiError),

    #[error("Frame is {width}x{height}, panel needs 400x300")]
    InvalidFrameSize { width: u32, height: u32 },

    #[error("Preview encode failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Preview write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Display task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Display lock poisoned")]
    Poisoned,
}

/// Colour of the panel border
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Border {
    #[default]
    White,
    Black,
    Red,
}

/// Anything that can show a finished frame. Calls block until done.
pub trait DisplaySink: Send {
    fn name(&self) -> &'static str;

    fn render(&mut self, frame: &IndexedImage) -> Result<(), DisplayError>;
}

/// Use the panel when its GPIO and SPI lines are available, else write previews
pub fn detect_sink(border: Border, preview_path: &Path) -> Box<dyn DisplaySink> {
    match InkyWhat::new(border) {
        Ok(panel) => {
            tracing::info!("Inky wHAT detected");
            Box::new(panel)
        }
        Err(e) => {
            tracing::warn!(
                "No panel available ({}), writing previews to {}",
                e,
                preview_path.display()
            );
            Box::new(PreviewSink::new(preview_path))
        }
    }
}

/// Shared handle to the active sink
#[derive(Clone)]
pub struct DisplayController {
    sink: Arc<Mutex<Box<dyn DisplaySink>>>,
    name: &'static str,
}

impl DisplayController {
    pub fn new(sink: Box<dyn DisplaySink>) -> Self {
        let name = sink.name();
        Self {
            sink: Arc::new(Mutex::new(sink)),
            name,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Push a frame; the refresh runs on the blocking pool
    pub async fn show(&self, frame: IndexedImage) -> Result<(), DisplayError> {
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || {
            let mut sink = sink.lock().map_err(|_| DisplayError::Poisoned)?;
            sink.render(&frame)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Color;
    use tempfile::tempdir;

    #[test]
    fn test_border_names() {
        assert_eq!(serde_json::to_string(&Border::Red).unwrap(), "\"red\"");
        assert_eq!(serde_json::from_str::<Border>("\"black\"").unwrap(), Border::Black);
    }

    #[tokio::test]
    async fn test_controller_forwards_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("panel.png");
        let controller = DisplayController::new(Box::new(PreviewSink::new(&path)));

        assert_eq!(controller.name(), "preview");
        controller.show(IndexedImage::panel(Color::Red)).await.unwrap();
        assert!(path.exists());
    }
}
