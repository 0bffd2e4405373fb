//! Background photo preparation.
//!
//! Pipeline: brightness classification -> brightness convergence ->
//! scale/crop to 400x300 -> reduction to the white/black/red palette.

pub mod brightness;
pub mod dither;
pub mod transform;

pub use brightness::{converge, perceptual_brightness, ConvergenceError, Direction};
pub use dither::{quantize, Quantization};
pub use transform::{scale_and_crop, CropTooSmallError};

use crate::canvas::IndexedImage;
use crate::solar::Theme;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Largest photo dimension accepted
pub const MAX_DIMENSION: u32 = 8192;

/// Image preparation errors
#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("Brightness convergence failed: {0}")]
    Convergence(#[from] ConvergenceError),

    #[error("Image does not fill the panel: {0}")]
    CropTooSmall(#[from] CropTooSmallError),

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image {width}x{height} exceeds {max}x{max}")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// How the brightness direction is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrightnessMode {
    /// Dark photos are brightened, bright photos darkened
    #[default]
    Normalize,
    /// Photos are pushed further the way they already lean
    Amplify,
}

impl BrightnessMode {
    pub fn direction(self, score: f64) -> Direction {
        let direction = brightness::classify(score);
        match self {
            BrightnessMode::Normalize => direction,
            BrightnessMode::Amplify => direction.opposite(),
        }
    }
}

/// Preparation settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    pub mode: BrightnessMode,
    pub quantization: Quantization,
}

/// A photo ready to go under the panel text
#[derive(Debug, Clone)]
pub struct PreparedBackground {
    pub image: IndexedImage,
    /// Theme matching the photo: bright photos get black ink
    pub theme: Theme,
    pub input_brightness: f64,
    pub achieved_brightness: f64,
}

/// Run the full preparation pipeline on a decoded photo
pub fn prepare_background(
    img: &DynamicImage,
    options: &PrepareOptions,
) -> Result<PreparedBackground, PrepareError> {
    let rgb = img.to_rgb8();

    let input_brightness = perceptual_brightness(&rgb);
    let direction = options.mode.direction(input_brightness);
    tracing::info!(
        "Input brightness {:.1}, going to {}",
        input_brightness,
        direction
    );

    let converged = converge(&rgb, direction)?;
    tracing::info!("Achieved brightness {:.1}", converged.score);

    let image = prepare_for_panel(&converged.image, options.quantization)?;

    let theme = match direction {
        Direction::Brighten => Theme::Bright,
        Direction::Darken => Theme::Dark,
    };

    Ok(PreparedBackground {
        image,
        theme,
        input_brightness,
        achieved_brightness: converged.score,
    })
}

/// Scale, crop and quantize to an exact 400x300 indexed frame
pub fn prepare_for_panel(
    rgb: &image::RgbImage,
    quantization: Quantization,
) -> Result<IndexedImage, CropTooSmallError> {
    let framed = scale_and_crop(rgb)?;
    Ok(quantize(&framed, quantization))
}

/// Decode a photo from memory, guessing its format from the content
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, PrepareError> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes)).with_guessed_format()?;
    let img = reader.decode()?;
    check_dimensions(&img)?;
    Ok(img)
}

/// Load a photo from disk
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage, PrepareError> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

fn check_dimensions(img: &DynamicImage) -> Result<(), PrepareError> {
    let (width, height) = (img.width(), img.height());
    tracing::debug!("Image decoded: {}x{}", width, height);

    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PrepareError::TooLarge {
            width,
            height,
            max: MAX_DIMENSION,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Palette, HEIGHT, WIDTH};
    use image::{Rgb, RgbImage};

    fn photo(width: u32, height: u32, base: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let v = base.saturating_add(((x + y) % 40) as u8);
            Rgb([v, v.saturating_sub(10), v / 2])
        }))
    }

    #[test]
    fn test_dark_photo_is_brightened() {
        let prepared = prepare_background(&photo(800, 600, 30), &PrepareOptions::default()).unwrap();
        assert_eq!(prepared.image.dimensions(), (WIDTH, HEIGHT));
        assert_eq!(prepared.theme, Theme::Bright);
        assert!(prepared.input_brightness <= brightness::CLASSIFY_THRESHOLD);
        assert!(prepared.achieved_brightness > brightness::TARGET_BRIGHTER);
        assert!(prepared.image.indices().iter().all(|&i| i <= 2));
    }

    #[test]
    fn test_bright_photo_is_darkened() {
        let prepared = prepare_background(&photo(640, 480, 180), &PrepareOptions::default()).unwrap();
        assert_eq!(prepared.theme, Theme::Dark);
        assert!(prepared.achieved_brightness < brightness::TARGET_DARKER);
    }

    #[test]
    fn test_amplify_pushes_the_other_way() {
        let options = PrepareOptions {
            mode: BrightnessMode::Amplify,
            ..Default::default()
        };
        let prepared = prepare_background(&photo(640, 480, 180), &options).unwrap();
        assert_eq!(prepared.theme, Theme::Bright);
    }

    #[test]
    fn test_black_photo_is_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(800, 600));
        let err = prepare_background(&img, &PrepareOptions::default()).unwrap_err();
        assert!(matches!(err, PrepareError::Convergence(_)));
    }

    #[test]
    fn test_narrow_photo_is_rejected() {
        let err = prepare_background(&photo(300, 600, 30), &PrepareOptions::default()).unwrap_err();
        assert!(matches!(err, PrepareError::CropTooSmall(_)));
    }

    #[test]
    fn test_grayscale_photo_is_accepted() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(800, 600, image::Luma([40])));
        let prepared = prepare_background(&img, &PrepareOptions::default()).unwrap();
        assert_eq!(prepared.theme, Theme::Bright);
    }

    #[test]
    fn test_requantizing_is_stable() {
        let first = prepare_for_panel(&photo(800, 600, 90).to_rgb8(), Quantization::Nearest).unwrap();
        let second = prepare_for_panel(&first.to_rgb(&Palette::PANEL), Quantization::Nearest).unwrap();

        let same = first
            .indices()
            .iter()
            .zip(second.indices())
            .filter(|(a, b)| a == b)
            .count();
        assert!(same as f64 / first.indices().len() as f64 > 0.99);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_image(b"not an image"), Err(PrepareError::Decode(_))));
    }

    #[test]
    fn test_decode_png_roundtrip() {
        let mut bytes = Vec::new();
        photo(40, 30, 100)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let img = decode_image(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (40, 30));
    }
}
