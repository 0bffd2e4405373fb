//! Text fields and the phrasing of weather values.

use super::fonts::FontKey;
use embedded_graphics::prelude::{Point, Size};

/// How a field's text sits relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Anchor is the midpoint of the text
    Center,
    /// Anchor is the left edge, vertically centred
    Left,
    /// Anchor is the right edge, vertically centred
    Right,
}

impl Align {
    /// Offset from the anchor to the text's top-left corner
    pub fn offset(self, size: Size) -> Point {
        let (w, h) = (size.width as i32, size.height as i32);
        let dy = (-h).div_euclid(2);
        match self {
            Align::Center => Point::new((-w).div_euclid(2), dy),
            Align::Left => Point::new(0, dy),
            Align::Right => Point::new(-w, dy),
        }
    }
}

/// A piece of text placed on the canvas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderField {
    pub text: String,
    pub font: FontKey,
    pub align: Align,
    pub anchor: Point,
}

impl RenderField {
    pub fn new(text: impl Into<String>, font: FontKey, align: Align, anchor: Point) -> Self {
        Self {
            text: text.into(),
            font,
            align,
            anchor,
        }
    }
}

/// Relative humidity bands, upper bounds exclusive, with their phrases
const HUMIDITY_BANDS: [(u8, &str); 8] = [
    (20, "całkiem suche powietrze"),
    (30, "coś tam wilgoć"),
    (40, "nawet wilgoć"),
    (55, "idealnie wilgotno"),
    (65, "dosyć wilgotno"),
    (75, "bardziej wilgotno"),
    (85, "wilgotno wilgotno"),
    (92, "nie wilgotno, a mokro"),
];

const HUMIDITY_SATURATED: &str = "bardzo wilgotne powietrze";

/// 1-based band and phrase for a relative humidity percentage
pub fn humidity_band(humidity: u8) -> (usize, &'static str) {
    HUMIDITY_BANDS
        .iter()
        .position(|&(upper, _)| humidity < upper)
        .map(|i| (i + 1, HUMIDITY_BANDS[i].1))
        .unwrap_or((HUMIDITY_BANDS.len() + 1, HUMIDITY_SATURATED))
}

/// "idealnie wilgotno (47%)"
pub fn humidity_phrase(humidity: u8) -> String {
    let (_, description) = humidity_band(humidity);
    format!("{description} ({humidity}%)")
}

/// One decimal, comma separator, Celsius suffix: "-3,5°C"
pub fn temperature_phrase(celsius: f64) -> String {
    let rounded = (celsius * 10.0).round() / 10.0;
    // avoid "-0,0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.1}°C").replace('.', ",")
}

/// Move the leading word to the end, then soften two words.
/// "zachmurzenie duże" becomes "duże zachmurkowanie".
pub fn status_phrase(detailed_status: &str) -> String {
    let mut words: Vec<&str> = detailed_status.split(' ').collect();
    if words.len() > 1 {
        let first = words.remove(0);
        words.push(first);
    }
    words
        .join(" ")
        .replace("zachmurzenie", "zachmurkowanie")
        .replace("pochmurno", "pochmurko")
}
