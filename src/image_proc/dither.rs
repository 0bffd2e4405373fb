//! Reduction of RGB images to the white/black/red panel palette.
//!
//! Plain nearest-colour mapping is the default. Floyd-Steinberg error
//! diffusion is available for photos with smooth gradients; it keeps only
//! two rows of accumulated error in memory.

use crate::canvas::{Color, IndexedImage, Palette};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// How colours are reduced to the palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantization {
    /// Each pixel takes the closest palette colour
    #[default]
    Nearest,
    /// Closest colour plus Floyd-Steinberg error diffusion
    FloydSteinberg,
}

/// Reduce `img` to palette indices
pub fn quantize(img: &RgbImage, method: Quantization) -> IndexedImage {
    match method {
        Quantization::Nearest => quantize_nearest(img, &Palette::PANEL),
        Quantization::FloydSteinberg => dither_image(img, &Palette::PANEL),
    }
}

/// Map every pixel to the nearest palette colour in RGB space
pub fn quantize_nearest(img: &RgbImage, palette: &Palette) -> IndexedImage {
    let (width, height) = img.dimensions();
    let mut out = IndexedImage::filled(width, height, Color::White);

    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        out.put(x, y, palette.nearest(r as i16, g as i16, b as i16));
    }

    out
}

/// Floyd-Steinberg taps: (dx, row below?, weight out of 16)
const TAPS: [(isize, bool, i16); 4] = [(1, false, 7), (-1, true, 3), (0, true, 5), (1, true, 1)];

/// Apply Floyd-Steinberg dithering against `palette`
pub fn dither_image(img: &RgbImage, palette: &Palette) -> IndexedImage {
    let (width, height) = img.dimensions();
    tracing::debug!("Applying Floyd-Steinberg dithering ({}x{})", width, height);

    let mut out = IndexedImage::filled(width, height, Color::White);

    // Carried error for this row and the next; values stay well inside i16
    let mut errors = [vec![[0i16; 3]; width as usize], vec![[0i16; 3]; width as usize]];

    for (y, row) in img.rows().enumerate() {
        let [current, below] = &mut errors;

        for (x, pixel) in row.enumerate() {
            let wanted: [i16; 3] =
                std::array::from_fn(|c| (pixel[c] as i16 + current[x][c]).clamp(0, 255));
            let color = palette.nearest(wanted[0], wanted[1], wanted[2]);
            let got = palette.rgb(color.index());
            out.put(x as u32, y as u32, color);

            let error: [i16; 3] = std::array::from_fn(|c| wanted[c] - got[c] as i16);
            for (dx, next_row, weight) in TAPS {
                let Some(tx) = x.checked_add_signed(dx).filter(|&tx| tx < width as usize) else {
                    continue;
                };
                let target = if next_row { &mut below[tx] } else { &mut current[tx] };
                for c in 0..3 {
                    target[c] += error[c] * weight / 16;
                }
            }
        }

        errors.swap(0, 1);
        errors[1].fill([0; 3]);
    }

    out
}
