//! Font faces and text measurement.
//!
//! Faces are ISO-8859-2 bitmap fonts from `embedded-graphics`, which cover the
//! Polish alphabet and the degree sign. Sizes larger than the biggest bitmap
//! font are produced by integer pixel scaling.

use super::indexed::Scaled;
use embedded_graphics::{
    mono_font::{iso_8859_2::*, MonoFont, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{renderer::TextRenderer, Baseline, Text},
};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Stroke weight of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weight {
    Regular,
    Bold,
}

/// Cache key: nominal pixel size and weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontKey {
    pub size: u32,
    pub weight: Weight,
}

impl FontKey {
    pub const fn regular(size: u32) -> Self {
        Self {
            size,
            weight: Weight::Regular,
        }
    }

    pub const fn bold(size: u32) -> Self {
        Self {
            size,
            weight: Weight::Bold,
        }
    }
}

impl fmt::Display for FontKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.weight {
            Weight::Regular => write!(f, "{}px regular", self.size),
            Weight::Bold => write!(f, "{}px bold", self.size),
        }
    }
}

/// Lookup of a size that was never inserted into the cache
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("font {0} is not loaded")]
pub struct UnknownFont(pub FontKey);

/// Measures the pixel extent of rendered text
pub trait TextMeasurement {
    fn measure(&self, text: &str, font: FontKey) -> Result<Size, UnknownFont>;
}

/// A bitmap font plus its integer magnification
#[derive(Clone, Copy)]
pub struct FontFace {
    font: &'static MonoFont<'static>,
    scale: u32,
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFace")
            .field("glyph", &self.font.character_size)
            .field("scale", &self.scale)
            .finish()
    }
}

/// Regular faces ordered by glyph height
const REGULAR_FACES: [&MonoFont<'static>; 6] = [
    &FONT_6X10, &FONT_6X13, &FONT_7X14, &FONT_9X15, &FONT_9X18, &FONT_10X20,
];

/// Bold faces ordered by glyph height
const BOLD_FACES: [&MonoFont<'static>; 4] = [
    &FONT_6X13_BOLD,
    &FONT_7X14_BOLD,
    &FONT_9X15_BOLD,
    &FONT_9X18_BOLD,
];

impl FontFace {
    /// Faces picked by hand for the sizes the panel layout uses
    fn layout(key: FontKey) -> Option<Self> {
        let (font, scale): (&'static MonoFont<'static>, u32) = match (key.size, key.weight) {
            (15, Weight::Regular) => (&FONT_6X13, 1),
            (15, Weight::Bold) => (&FONT_6X13_BOLD, 1),
            (17, Weight::Regular) => (&FONT_7X13, 1),
            (17, Weight::Bold) => (&FONT_7X13_BOLD, 1),
            (18, Weight::Regular) => (&FONT_7X14, 1),
            (18, Weight::Bold) => (&FONT_7X14_BOLD, 1),
            (19, Weight::Regular) => (&FONT_8X13, 1),
            (19, Weight::Bold) => (&FONT_8X13_BOLD, 1),
            (20, Weight::Regular) => (&FONT_9X18, 1),
            (20, Weight::Bold) => (&FONT_9X18_BOLD, 1),
            (29, Weight::Regular) => (&FONT_9X15, 2),
            (29, Weight::Bold) => (&FONT_9X15_BOLD, 2),
            (60, Weight::Regular) => (&FONT_10X20, 3),
            (60, Weight::Bold) => (&FONT_9X18_BOLD, 3),
            _ => return None,
        };
        Some(Self { font, scale })
    }

    /// Closest face for an arbitrary size: pick the magnification first,
    /// then the tallest glyph that still fits the remaining height.
    fn nearest(key: FontKey) -> Self {
        let scale = ((key.size + 10) / 20).max(1);
        let target = key.size / scale;
        let faces: &[&'static MonoFont<'static>] = match key.weight {
            Weight::Regular => &REGULAR_FACES,
            Weight::Bold => &BOLD_FACES,
        };

        let font = faces
            .iter()
            .rev()
            .find(|f| f.character_size.height <= target)
            .or_else(|| faces.first())
            .copied()
            .unwrap_or(&FONT_6X10);

        Self { font, scale }
    }

    /// Face for `key`, hand-picked where the layout defines one
    pub fn for_key(key: FontKey) -> Self {
        Self::layout(key).unwrap_or_else(|| Self::nearest(key))
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn style(&self) -> MonoTextStyle<'static, BinaryColor> {
        MonoTextStyle::new(self.font, BinaryColor::On)
    }

    /// Size of the text's bounding box in pixels
    pub fn measure(&self, text: &str) -> Size {
        let metrics = self
            .style()
            .measure_string(text, Point::zero(), Baseline::Top);
        metrics.bounding_box.size * self.scale
    }

    /// Draw `text` with its bounding box starting at `top_left`
    pub fn draw<D>(&self, text: &str, top_left: Point, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let text = Text::with_baseline(text, top_left, self.style(), Baseline::Top);
        if self.scale == 1 {
            text.draw(target)?;
        } else {
            let mut scaled = Scaled::new(target, top_left, self.scale);
            text.draw(&mut scaled)?;
        }
        Ok(())
    }
}

/// Faces indexed by (size, weight)
///
/// Filled eagerly for the layout sizes. Other sizes must be added with
/// [`FontCache::insert`]; lookups never change the cache.
#[derive(Debug, Clone)]
pub struct FontCache {
    faces: HashMap<FontKey, FontFace>,
}

impl FontCache {
    /// Sizes used by the panel layout
    pub const LAYOUT_SIZES: [u32; 7] = [15, 17, 18, 19, 20, 29, 60];

    pub fn new() -> Self {
        let faces = Self::LAYOUT_SIZES
            .iter()
            .flat_map(|&size| [FontKey::regular(size), FontKey::bold(size)])
            .map(|key| (key, FontFace::for_key(key)))
            .collect();
        Self { faces }
    }

    /// Load a face for a size outside the layout set
    pub fn insert(&mut self, key: FontKey) -> FontFace {
        *self
            .faces
            .entry(key)
            .or_insert_with(|| FontFace::for_key(key))
    }

    pub fn face(&self, key: FontKey) -> Result<FontFace, UnknownFont> {
        self.faces.get(&key).copied().ok_or(UnknownFont(key))
    }

    pub fn contains(&self, key: FontKey) -> bool {
        self.faces.contains_key(&key)
    }
}

impl Default for FontCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasurement for FontCache {
    fn measure(&self, text: &str, font: FontKey) -> Result<Size, UnknownFont> {
        Ok(self.face(font)?.measure(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes_are_preloaded() {
        let cache = FontCache::new();
        for size in FontCache::LAYOUT_SIZES {
            assert!(cache.contains(FontKey::regular(size)));
            assert!(cache.contains(FontKey::bold(size)));
        }
    }

    #[test]
    fn test_unknown_size_requires_insert() {
        let mut cache = FontCache::new();
        let key = FontKey::regular(42);
        assert_eq!(cache.measure("12", key), Err(UnknownFont(key)));

        cache.insert(key);
        let size = cache.measure("12", key).unwrap();
        assert!(size.width > 0 && size.height > 0);
    }

    #[test]
    fn test_monospace_width_grows_with_text() {
        let cache = FontCache::new();
        let key = FontKey::bold(17);
        let short = cache.measure("ab", key).unwrap();
        let long = cache.measure("abcd", key).unwrap();
        assert!(long.width > short.width);
        assert_eq!(short.height, long.height);
    }

    #[test]
    fn test_clock_face_is_scaled() {
        let cache = FontCache::new();
        let clock = cache.measure("12:34", FontKey::bold(60)).unwrap();
        let small = cache.measure("12:34", FontKey::bold(20)).unwrap();
        assert_eq!(clock.height, small.height * 3);
        assert_eq!(clock.width, small.width * 3);
    }

    #[test]
    fn test_nearest_face_picks_fitting_glyphs() {
        let face = FontFace::nearest(FontKey::regular(16));
        assert_eq!(face.scale(), 1);
        assert_eq!(face.font.character_size.height, 15);

        let face = FontFace::nearest(FontKey::bold(44));
        assert_eq!(face.scale(), 2);
        assert_eq!(face.font.character_size.height, 18);

        // Smaller than every face falls back to the smallest one
        let face = FontFace::nearest(FontKey::bold(8));
        assert_eq!(face.font.character_size.height, 13);
    }

    #[test]
    fn test_polish_glyphs_render() {
        use crate::canvas::indexed::{Color, IndexedImage};

        let face = FontFace::for_key(FontKey::bold(17));
        let mut image = IndexedImage::filled(200, 30, Color::White);
        let mut ink = image.ink(Color::Black);
        face.draw("Słońce ęół °C", Point::new(0, 0), &mut ink).unwrap();
        assert!(image.count(Color::Black) > 0);
    }
}
