//! Scaling and cropping to the panel frame.

use crate::canvas::{HEIGHT, WIDTH};
use image::{imageops, imageops::FilterType, RgbImage};
use thiserror::Error;

/// The image is too narrow to fill the panel once scaled to its height
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("image scaled to {height}px high is only {scaled_width}px wide, {required}px needed")]
pub struct CropTooSmallError {
    pub scaled_width: u32,
    pub required: u32,
    pub height: u32,
}

/// Width an image gets when scaled to `target_height`, aspect ratio kept
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    if height == 0 {
        return 0;
    }
    (width as u64 * target_height as u64 / height as u64) as u32
}

/// Source columns that end up on the panel once the image is scaled to
/// `target_height`: the centred window of `ceil(target_width * h / target_height)`
pub fn source_window(width: u32, height: u32, target_width: u32, target_height: u32) -> (u32, u32) {
    let window = (target_width as u64 * height as u64).div_ceil(target_height as u64) as u32;
    let window = window.clamp(1, width.max(1));
    ((width - window.min(width)) / 2, window)
}

/// Cut the middle columns that cover the panel, then scale that window
/// to 400x300 with Lanczos resampling
///
/// Cropping first keeps very wide strips from blowing up into a huge
/// intermediate buffer.
pub fn scale_and_crop(img: &RgbImage) -> Result<RgbImage, CropTooSmallError> {
    let (src_width, src_height) = img.dimensions();
    let new_width = scaled_width(src_width, src_height, HEIGHT);

    if new_width < WIDTH {
        return Err(CropTooSmallError {
            scaled_width: new_width,
            required: WIDTH,
            height: HEIGHT,
        });
    }

    let (crop_x, window) = source_window(src_width, src_height, WIDTH, HEIGHT);
    tracing::debug!(
        "Cropping {}x{} to columns {}..{}, scaling to {}x{}",
        src_width,
        src_height,
        crop_x,
        crop_x + window,
        WIDTH,
        HEIGHT
    );

    let cropped = imageops::crop_imm(img, crop_x, 0, window, src_height).to_image();
    if cropped.dimensions() == (WIDTH, HEIGHT) {
        return Ok(cropped);
    }
    Ok(imageops::resize(&cropped, WIDTH, HEIGHT, FilterType::Lanczos3))
}
