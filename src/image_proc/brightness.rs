//! Perceptual brightness and brightness convergence.
//!
//! A photo is pushed towards a very bright or very dark look before it is
//! reduced to three colours, so that text drawn over it stays readable.

use image::RgbImage;
use std::fmt;
use thiserror::Error;

/// Scores at or below this need brightening, above it darkening
pub const CLASSIFY_THRESHOLD: f64 = 74.0;

/// Brightening stops once the score exceeds this
pub const TARGET_BRIGHTER: f64 = 180.0;

/// Darkening stops once the score drops below this
pub const TARGET_DARKER: f64 = 15.5;

/// Multiplicative step applied to the enhancement factor
pub const FACTOR_STEP: f64 = 1.05;

/// Upper bound on convergence steps
pub const MAX_ITERATIONS: u32 = 500;

/// Channel weights of the perceived-brightness formula
const WEIGHTS: [f64; 3] = [0.241, 0.691, 0.068];

/// Which way a photo is pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Brighten,
    Darken,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Brighten => Direction::Darken,
            Direction::Darken => Direction::Brighten,
        }
    }

    /// Score the convergence has to cross
    pub fn target(self) -> f64 {
        match self {
            Direction::Brighten => TARGET_BRIGHTER,
            Direction::Darken => TARGET_DARKER,
        }
    }

    fn crossed(self, score: f64) -> bool {
        match self {
            Direction::Brighten => score > TARGET_BRIGHTER,
            Direction::Darken => score < TARGET_DARKER,
        }
    }

    fn step(self, factor: f64) -> f64 {
        match self {
            Direction::Brighten => factor * FACTOR_STEP,
            Direction::Darken => factor / FACTOR_STEP,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Brighten => write!(f, "brighten"),
            Direction::Darken => write!(f, "darken"),
        }
    }
}

/// The threshold was never crossed within [`MAX_ITERATIONS`] steps
#[derive(Error, Debug, Clone, PartialEq)]
#[error("could not {direction} image past {target} within {iterations} steps (stuck at {score:.1})")]
pub struct ConvergenceError {
    pub direction: Direction,
    pub target: f64,
    pub iterations: u32,
    pub score: f64,
}

/// Result of a successful convergence
#[derive(Debug, Clone)]
pub struct Converged {
    pub image: RgbImage,
    pub factor: f64,
    pub score: f64,
    pub iterations: u32,
}

/// `sqrt(0.241 R² + 0.691 G² + 0.068 B²)` over the channel means
pub fn perceptual_brightness(img: &RgbImage) -> f64 {
    ChannelHistogram::of(img).brightness_at(1.0)
}

/// Per-channel value counts; enough to score any enhancement factor
/// without touching the pixels again
struct ChannelHistogram {
    counts: [[u64; 256]; 3],
    pixels: u64,
}

impl ChannelHistogram {
    fn of(img: &RgbImage) -> Self {
        let mut counts = [[0u64; 256]; 3];
        for pixel in img.pixels() {
            for (channel, &value) in counts.iter_mut().zip(pixel.0.iter()) {
                channel[value as usize] += 1;
            }
        }
        Self {
            counts,
            pixels: img.width() as u64 * img.height() as u64,
        }
    }

    /// Brightness the image would have after [`enhance`] with `factor`
    fn brightness_at(&self, factor: f64) -> f64 {
        if self.pixels == 0 {
            return 0.0;
        }

        self.counts
            .iter()
            .zip(WEIGHTS)
            .map(|(channel, weight)| {
                let sum: u64 = channel
                    .iter()
                    .enumerate()
                    .map(|(value, &count)| scale_channel(value as u8, factor) as u64 * count)
                    .sum();
                let mean = sum as f64 / self.pixels as f64;
                weight * mean * mean
            })
            .sum::<f64>()
            .sqrt()
    }
}

/// Direction an image should be pushed in, judged by its current brightness
pub fn classify(score: f64) -> Direction {
    if score <= CLASSIFY_THRESHOLD {
        Direction::Brighten
    } else {
        Direction::Darken
    }
}

#[inline]
fn scale_channel(channel: u8, factor: f64) -> u8 {
    (channel as f64 * factor).clamp(0.0, 255.0) as u8
}

/// Multiply every channel by `factor`, saturating at white
pub fn enhance(img: &RgbImage, factor: f64) -> RgbImage {
    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = scale_channel(*channel, factor);
        }
    }
    out
}

/// Grow (or shrink) the enhancement factor by 5% per step, always applied to
/// the original image, until the brightness crosses the direction's target.
pub fn converge(img: &RgbImage, direction: Direction) -> Result<Converged, ConvergenceError> {
    let histogram = ChannelHistogram::of(img);
    let mut factor = 1.0;
    let mut applied = 1.0;
    let mut score = histogram.brightness_at(1.0);
    let mut iterations = 0;

    while !direction.crossed(score) {
        if iterations == MAX_ITERATIONS {
            return Err(ConvergenceError {
                direction,
                target: direction.target(),
                iterations,
                score,
            });
        }
        score = histogram.brightness_at(factor);
        applied = factor;
        factor = direction.step(factor);
        iterations += 1;
    }

    tracing::debug!(
        "Brightness converged to {:.1} after {} steps (factor {:.3})",
        score,
        iterations,
        applied
    );

    let image = if applied == 1.0 {
        img.clone()
    } else {
        enhance(img, applied)
    };

    Ok(Converged {
        image,
        factor: applied,
        score,
        iterations,
    })
}
