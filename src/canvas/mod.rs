//! The panel canvas.
//!
//! Owns the 400x300 indexed frame, an optional photo background and the
//! current theme, and lays out the text fields of one refresh cycle.

pub mod fields;
pub mod fonts;
pub mod indexed;

pub use fields::{Align, RenderField};
pub use fonts::{FontCache, FontKey, TextMeasurement, UnknownFont};
pub use indexed::{Color, IndexedImage, Palette, HEIGHT, WIDTH};

use crate::solar::Theme;
use embedded_graphics::prelude::Point;
use thiserror::Error;

/// Canvas centre
pub const CENTER: Point = Point::new(WIDTH as i32 / 2, HEIGHT as i32 / 2);

/// Field positions and faces
pub mod layout {
    use super::{FontKey, CENTER, WIDTH};
    use embedded_graphics::prelude::Point;

    pub const CLOCK_FONT: FontKey = FontKey::bold(60);
    pub const CLOCK_ANCHOR: Point = Point::new(CENTER.x, CENTER.y - 52);

    pub const SOLAR_FONT: FontKey = FontKey::bold(17);
    pub const SUNRISE_ANCHOR: Point = Point::new(15, 281);
    pub const SUNSET_ANCHOR: Point = Point::new(WIDTH as i32 - 15, 281);

    pub const STATUS_FONT: FontKey = FontKey::bold(18);
    pub const STATUS_ANCHOR: Point = CENTER;

    pub const TEMPERATURE_FONT: FontKey = FontKey::regular(29);
    pub const TEMPERATURE_ANCHOR: Point = Point::new(CENTER.x, 180);

    pub const HUMIDITY_FONT: FontKey = FontKey::regular(19);
    pub const HUMIDITY_ANCHOR: Point = Point::new(CENTER.x, CENTER.y + 65);

    pub const ERROR_FONT: FontKey = FontKey::bold(19);
    pub const ERROR_ANCHOR: Point = CENTER;
}

/// Canvas errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("{0}")]
    UnknownFont(#[from] UnknownFont),

    #[error("Background must be {expected_w}x{expected_h}, got {actual_w}x{actual_h}")]
    BackgroundSize {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },
}

/// Weather values ready to be laid out
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherFields<'a> {
    pub detailed_status: &'a str,
    pub temperature_celsius: f64,
    pub relative_humidity_pct: u8,
    pub sunrise_phrase: Option<&'a str>,
    pub sunset_phrase: Option<&'a str>,
}

/// Owner of the single mutable panel frame
pub struct CanvasRenderer {
    canvas: IndexedImage,
    background: Option<IndexedImage>,
    theme: Theme,
    fonts: FontCache,
    drawn: Vec<RenderField>,
}

impl CanvasRenderer {
    pub fn new() -> Self {
        Self::with_fonts(FontCache::new())
    }

    pub fn with_fonts(fonts: FontCache) -> Self {
        let theme = Theme::Bright;
        Self {
            canvas: IndexedImage::panel(theme.major()),
            background: None,
            theme,
            fonts,
            drawn: Vec::new(),
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Use a prepared photo instead of the solid fill. The photo's theme
    /// becomes the current one.
    pub fn set_background(&mut self, background: IndexedImage, theme: Theme) -> Result<(), RenderError> {
        let (w, h) = background.dimensions();
        if (w, h) != (WIDTH, HEIGHT) {
            return Err(RenderError::BackgroundSize {
                expected_w: WIDTH,
                expected_h: HEIGHT,
                actual_w: w,
                actual_h: h,
            });
        }
        self.background = Some(background);
        self.theme = theme;
        Ok(())
    }

    /// Go back to the solid fill
    pub fn clear_background(&mut self) {
        self.background = None;
    }

    pub fn has_background(&self) -> bool {
        self.background.is_some()
    }

    /// Current frame
    pub fn canvas(&self) -> &IndexedImage {
        &self.canvas
    }

    /// Fields drawn since the last reset, in drawing order
    pub fn drawn_fields(&self) -> &[RenderField] {
        &self.drawn
    }

    /// Restore the photo background, or fill with the theme's major colour
    pub fn reset(&mut self) {
        match &self.background {
            Some(background) => self.canvas.clone_from(background),
            None => self.canvas.fill(self.theme.major()),
        }
        self.drawn.clear();
    }

    /// Measure, align and paint one field in the theme's ink colour
    pub fn draw_field(&mut self, field: RenderField) -> Result<(), RenderError> {
        let size = TextMeasurement::measure(&self.fonts, &field.text, field.font)?;
        let face = self.fonts.face(field.font)?;
        let top_left = field.anchor + field.align.offset(size);

        let mut ink = self.canvas.ink(self.theme.minor());
        // drawing into an indexed image cannot fail
        let _ = face.draw(&field.text, top_left, &mut ink);

        tracing::debug!("Drew '{}' at {:?} ({}x{})", field.text, top_left, size.width, size.height);
        self.drawn.push(field);
        Ok(())
    }

    /// Full cycle: solar phrases, status, temperature, humidity and the clock
    pub fn render_weather(&mut self, clock: &str, weather: &WeatherFields<'_>) -> Result<(), RenderError> {
        self.reset();
        let body = self.draw_weather(weather);
        self.finish(clock, body)
    }

    /// Degraded cycle: a single centred message and the clock
    pub fn render_message(&mut self, clock: &str, message: &str) -> Result<(), RenderError> {
        self.reset();
        let body = self.draw_field(RenderField::new(
            message,
            layout::ERROR_FONT,
            Align::Center,
            layout::ERROR_ANCHOR,
        ));
        self.finish(clock, body)
    }

    /// The clock is drawn whatever happened to the body. A failed body
    /// leaves a cleared canvas with just the clock on it.
    fn finish(&mut self, clock: &str, body: Result<(), RenderError>) -> Result<(), RenderError> {
        if body.is_err() {
            self.reset();
        }
        let clock = self.draw_field(RenderField::new(
            clock,
            layout::CLOCK_FONT,
            Align::Center,
            layout::CLOCK_ANCHOR,
        ));
        body.and(clock)
    }

    fn draw_weather(&mut self, weather: &WeatherFields<'_>) -> Result<(), RenderError> {
        if let Some(phrase) = weather.sunrise_phrase {
            self.draw_field(RenderField::new(
                phrase,
                layout::SOLAR_FONT,
                Align::Left,
                layout::SUNRISE_ANCHOR,
            ))?;
        }
        if let Some(phrase) = weather.sunset_phrase {
            self.draw_field(RenderField::new(
                phrase,
                layout::SOLAR_FONT,
                Align::Right,
                layout::SUNSET_ANCHOR,
            ))?;
        }

        self.draw_field(RenderField::new(
            fields::status_phrase(weather.detailed_status),
            layout::STATUS_FONT,
            Align::Center,
            layout::STATUS_ANCHOR,
        ))?;
        self.draw_field(RenderField::new(
            fields::temperature_phrase(weather.temperature_celsius),
            layout::TEMPERATURE_FONT,
            Align::Center,
            layout::TEMPERATURE_ANCHOR,
        ))?;
        self.draw_field(RenderField::new(
            fields::humidity_phrase(weather.relative_humidity_pct),
            layout::HUMIDITY_FONT,
            Align::Center,
            layout::HUMIDITY_ANCHOR,
        ))?;

        Ok(())
    }
}

impl Default for CanvasRenderer {
    fn default() -> Self {
        Self::new()
    }
}
