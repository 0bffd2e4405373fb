//! Indexed 3-colour images for the 400x300 panel.
//!
//! Pixels store palette indices (0 = white, 1 = black, 2 = red) instead of
//! colour values. Text is drawn through `embedded-graphics` draw targets that
//! write a single ink index for every lit pixel.

use embedded_graphics::{pixelcolor::BinaryColor, prelude::*, primitives::Rectangle};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::convert::Infallible;

/// Panel dimensions
pub const WIDTH: u32 = 400;
pub const HEIGHT: u32 = 300;

/// Palette indices understood by the panel
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White = 0,
    Black = 1,
    Red = 2,
}

impl Color {
    /// All meaningful colours, in palette order
    pub const ALL: [Color; 3] = [Color::White, Color::Black, Color::Red];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Color::White),
            1 => Some(Color::Black),
            2 => Some(Color::Red),
            _ => None,
        }
    }
}

/// A 256-entry RGB palette. Only the first three entries carry colours,
/// everything after them is black and unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette([[u8; 3]; 256]);

impl Palette {
    /// Colours the panel actually shows
    pub const PANEL: Palette = Palette::new([255, 255, 255], [0, 0, 0], [255, 0, 0]);

    /// Softened colours used for on-screen previews, closer to how the
    /// e-ink pigments look than pure RGB primaries
    pub const PREVIEW: Palette = Palette::new([190, 190, 190], [25, 25, 25], [150, 20, 60]);

    pub const fn new(white: [u8; 3], black: [u8; 3], red: [u8; 3]) -> Self {
        let mut entries = [[0u8; 3]; 256];
        entries[0] = white;
        entries[1] = black;
        entries[2] = red;
        Self(entries)
    }

    /// RGB value stored at `index`
    pub fn rgb(&self, index: u8) -> [u8; 3] {
        self.0[index as usize]
    }

    /// Nearest meaningful palette colour by squared Euclidean distance in RGB.
    /// Ties resolve to the lower index.
    pub fn nearest(&self, r: i16, g: i16, b: i16) -> Color {
        Color::ALL
            .iter()
            .copied()
            .min_by_key(|color| {
                let [pr, pg, pb] = self.rgb(color.index());
                let dr = (r - pr as i16) as i32;
                let dg = (g - pg as i16) as i32;
                let db = (b - pb as i16) as i32;
                dr * dr + dg * dg + db * db
            })
            .unwrap_or(Color::White)
    }
}

/// Image whose pixels are palette indices
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedImage {
    pixels: GrayImage,
}

impl IndexedImage {
    /// Create an image filled with a single colour
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            pixels: GrayImage::from_pixel(width, height, Luma([color.index()])),
        }
    }

    /// Create a panel-sized image filled with a single colour
    pub fn panel(color: Color) -> Self {
        Self::filled(WIDTH, HEIGHT, color)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Palette index at (x, y)
    pub fn index_at(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel(x, y)[0]
    }

    pub fn put(&mut self, x: u32, y: u32, color: Color) {
        self.pixels.put_pixel(x, y, Luma([color.index()]));
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels
            .pixels_mut()
            .for_each(|p| *p = Luma([color.index()]));
    }

    /// Raw indices in row-major order
    pub fn indices(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Number of pixels carrying `color`
    pub fn count(&self, color: Color) -> usize {
        self.indices().iter().filter(|&&i| i == color.index()).count()
    }

    /// Number of pixels of `color` inside the given rectangle (clipped to the image)
    pub fn count_in(&self, area: Rectangle, color: Color) -> usize {
        let Some(bottom_right) = area.bottom_right() else {
            return 0;
        };
        let x0 = area.top_left.x.max(0) as u32;
        let y0 = area.top_left.y.max(0) as u32;
        let x1 = (bottom_right.x.max(-1) + 1).min(self.width() as i32) as u32;
        let y1 = (bottom_right.y.max(-1) + 1).min(self.height() as i32) as u32;

        (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .filter(|&(x, y)| self.index_at(x, y) == color.index())
            .count()
    }

    /// Expand to RGB using the given palette
    pub fn to_rgb(&self, palette: &Palette) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            Rgb(palette.rgb(self.index_at(x, y)))
        })
    }

    /// Draw target that paints every lit pixel with `ink`
    pub fn ink(&mut self, ink: Color) -> InkTarget<'_> {
        InkTarget { image: self, ink }
    }
}

/// Binary draw target over an [`IndexedImage`]. Lit pixels become `ink`,
/// unlit pixels leave the image untouched.
pub struct InkTarget<'a> {
    image: &'a mut IndexedImage,
    ink: Color,
}

impl OriginDimensions for InkTarget<'_> {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for InkTarget<'_> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.image.dimensions();
        for Pixel(point, color) in pixels {
            if color.is_off() || point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < width && y < height {
                self.image.put(x, y, self.ink);
            }
        }
        Ok(())
    }
}

/// Draw target that magnifies everything drawn into it by an integer factor
/// around `origin`. Used to blow up bitmap fonts for the large clock.
pub struct Scaled<'a, D> {
    inner: &'a mut D,
    origin: Point,
    scale: u32,
}

impl<'a, D> Scaled<'a, D>
where
    D: DrawTarget<Color = BinaryColor>,
{
    pub fn new(inner: &'a mut D, origin: Point, scale: u32) -> Self {
        Self {
            inner,
            origin,
            scale: scale.max(1),
        }
    }
}

impl<D> OriginDimensions for Scaled<'_, D>
where
    D: DrawTarget<Color = BinaryColor>,
{
    fn size(&self) -> Size {
        self.inner.bounding_box().size
    }
}

impl<D> DrawTarget for Scaled<'_, D>
where
    D: DrawTarget<Color = BinaryColor>,
{
    type Color = BinaryColor;
    type Error = D::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let block = Size::new_equal(self.scale);
        for Pixel(point, color) in pixels {
            let top_left = self.origin + (point - self.origin) * self.scale as i32;
            self.inner
                .fill_solid(&Rectangle::new(top_left, block), color)?;
        }
        Ok(())
    }
}
