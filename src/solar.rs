//! Day phase, rendering theme and the sunrise/sunset phrases.
//!
//! All times are local wall-clock times; the panel shows what a clock on the
//! wall would show.

use crate::canvas::Color;
use chrono::{NaiveDateTime, TimeDelta};

/// Where "now" sits relative to the day's sunrise and sunset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPhase {
    PreSunrise,
    Daytime,
    PostSunset,
}

/// Ink/background assignment for a refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Black ink on white
    #[default]
    Bright,
    /// White ink on black
    Dark,
}

impl Theme {
    /// Background colour
    pub fn major(self) -> Color {
        match self {
            Theme::Bright => Color::White,
            Theme::Dark => Color::Black,
        }
    }

    /// Ink colour
    pub fn minor(self) -> Color {
        match self {
            Theme::Bright => Color::Black,
            Theme::Dark => Color::White,
        }
    }
}

/// Sunrise and sunset of the current day at the current location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarWindow {
    pub sunrise: NaiveDateTime,
    pub sunset: NaiveDateTime,
}

impl SolarWindow {
    pub fn new(sunrise: NaiveDateTime, sunset: NaiveDateTime) -> Self {
        Self { sunrise, sunset }
    }

    pub fn phase(&self, now: NaiveDateTime) -> DayPhase {
        if now < self.sunrise {
            DayPhase::PreSunrise
        } else if now < self.sunset {
            DayPhase::Daytime
        } else {
            DayPhase::PostSunset
        }
    }
}

/// Outcome of [`classify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolarReading {
    pub phase: DayPhase,
    pub theme: Theme,
    pub sunrise_phrase: Option<String>,
    pub sunset_phrase: Option<String>,
}

/// Pick the phase, theme and phrases for `now`.
///
/// Daytime always switches to [`Theme::Bright`]. Before sunrise and after
/// sunset the theme goes dark, unless a photo background is set, in which
/// case `current` is kept as it is.
pub fn classify(
    now: NaiveDateTime,
    window: &SolarWindow,
    has_custom_background: bool,
    current: Theme,
) -> SolarReading {
    let night_theme = if has_custom_background {
        current
    } else {
        Theme::Dark
    };

    match window.phase(now) {
        DayPhase::PreSunrise => {
            let daylight = round_units(window.sunset - window.sunrise, 3600);
            SolarReading {
                phase: DayPhase::PreSunrise,
                theme: night_theme,
                sunrise_phrase: Some(format!(
                    "Słońce wzejdzie o {}",
                    window.sunrise.format("%-H:%M")
                )),
                sunset_phrase: Some(format!("dzień potrwa {}", counted(daylight, "godzin"))),
            }
        }
        DayPhase::Daytime => {
            let remaining = window.sunset - now;
            let phrase = if remaining > TimeDelta::hours(1) {
                counted(round_units(remaining, 3600), "godzin")
            } else {
                counted(round_units(remaining, 60), "minut")
            };
            SolarReading {
                phase: DayPhase::Daytime,
                theme: Theme::Bright,
                sunrise_phrase: None,
                sunset_phrase: Some(format!("Słońce zajdzie za {phrase}")),
            }
        }
        DayPhase::PostSunset => {
            let elapsed = now - window.sunset;
            let phrase = if elapsed > TimeDelta::hours(1) {
                counted(round_units(elapsed, 3600), "godzin")
            } else {
                counted(round_units(elapsed, 60), "minut")
            };
            SolarReading {
                phase: DayPhase::PostSunset,
                theme: night_theme,
                sunrise_phrase: None,
                sunset_phrase: Some(format!("Słońce zaszło {phrase} temu")),
            }
        }
    }
}

/// Noun ending that agrees with the numeral in front of it:
/// 1 -> "ę" (godzinę), 2-4 -> "y" (godziny), anything else -> "" (godzin).
/// 10 through 20 always take the bare form.
pub fn numeral_suffix(n: u64) -> &'static str {
    if (10..=20).contains(&n) {
        return "";
    }
    match n % 10 {
        1 => "ę",
        2..=4 => "y",
        _ => "",
    }
}

/// "5 godzin", "2 minuty", or just "godzinę" when the count is one (or less)
fn counted(n: u64, noun: &str) -> String {
    let suffix = numeral_suffix(n);
    if n > 1 {
        format!("{n} {noun}{suffix}")
    } else {
        format!("{noun}{suffix}")
    }
}

/// Whole units in `span`, rounded half away from zero. Negative spans count as zero.
fn round_units(span: TimeDelta, unit_secs: i64) -> u64 {
    let units = span.num_milliseconds() as f64 / (unit_secs * 1000) as f64;
    units.round().max(0.0) as u64
}
