//! One refresh cycle of the panel.
//!
//! [`Panel`] is the single owner of the canvas and the cached coordinates.
//! A cycle looks up the position (only while it is still unknown), fetches
//! the weather, picks the theme for the time of day and lays out the frame.
//! Lookup failures degrade to a banner; the clock is drawn either way.

use crate::canvas::{CanvasRenderer, IndexedImage, RenderError, WeatherFields};
use crate::display::{DisplayController, DisplayError};
use crate::image_proc::PreparedBackground;
use crate::solar::{self, DayPhase, SolarWindow};
use crate::weather::{
    Coordinates, DataUnavailable, GeolocationSource, WeatherDataSource, WeatherFacts,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fmt::Display;
use thiserror::Error;

/// Clock format, hour padded with a space
pub const CLOCK_FORMAT: &str = "%_H:%M";

/// Failures that end a cycle
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Display failed: {0}")]
    Display(#[from] DisplayError),
}

/// What a finished cycle showed
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Weather(DayPhase),
    Unavailable(DataUnavailable),
}

pub struct Panel {
    renderer: CanvasRenderer,
    coordinates: Option<Coordinates>,
    weather: Box<dyn WeatherDataSource>,
    location: Box<dyn GeolocationSource>,
    display: DisplayController,
}

impl Panel {
    pub fn new(
        weather: Box<dyn WeatherDataSource>,
        location: Box<dyn GeolocationSource>,
        display: DisplayController,
    ) -> Self {
        Self {
            renderer: CanvasRenderer::new(),
            coordinates: None,
            weather,
            location,
            display,
        }
    }

    /// Current frame
    pub fn frame(&self) -> &IndexedImage {
        self.renderer.canvas()
    }

    pub fn renderer(&self) -> &CanvasRenderer {
        &self.renderer
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    pub fn display_name(&self) -> &'static str {
        self.display.name()
    }

    /// Put a prepared photo under the text from the next cycle on
    pub fn set_background(&mut self, background: PreparedBackground) -> Result<(), RenderError> {
        tracing::info!(
            "Background set (brightness {:.1} -> {:.1}, theme {:?})",
            background.input_brightness,
            background.achieved_brightness,
            background.theme
        );
        self.renderer.set_background(background.image, background.theme)
    }

    pub fn clear_background(&mut self) {
        tracing::info!("Background cleared");
        self.renderer.clear_background();
    }

    /// Compose the frame for `now`
    pub async fn refresh<Tz>(&mut self, now: DateTime<Tz>) -> Result<CycleOutcome, CycleError>
    where
        Tz: TimeZone + Send,
        Tz::Offset: Display + Send,
    {
        let clock = now.format(CLOCK_FORMAT).to_string();
        let local_now = now.naive_local();

        match self.lookup().await {
            Ok(facts) => {
                let window = SolarWindow::new(
                    local_time(facts.sunrise, &now.timezone()),
                    local_time(facts.sunset, &now.timezone()),
                );
                let reading = solar::classify(
                    local_now,
                    &window,
                    self.renderer.has_background(),
                    self.renderer.theme(),
                );
                self.renderer.set_theme(reading.theme);

                tracing::debug!(
                    "{:?} at {}, {:.1}°C, {}%, '{}'",
                    reading.phase,
                    clock.trim(),
                    facts.temperature_celsius,
                    facts.relative_humidity_pct,
                    facts.detailed_status
                );

                self.renderer.render_weather(
                    &clock,
                    &WeatherFields {
                        detailed_status: &facts.detailed_status,
                        temperature_celsius: facts.temperature_celsius,
                        relative_humidity_pct: facts.relative_humidity_pct,
                        sunrise_phrase: reading.sunrise_phrase.as_deref(),
                        sunset_phrase: reading.sunset_phrase.as_deref(),
                    },
                )?;
                Ok(CycleOutcome::Weather(reading.phase))
            }
            Err(unavailable) => {
                tracing::warn!("No weather data this cycle: {}", unavailable);
                self.renderer.render_message(&clock, unavailable.message())?;
                Ok(CycleOutcome::Unavailable(unavailable))
            }
        }
    }

    /// Push the current frame to the display
    pub async fn show(&self) -> Result<(), CycleError> {
        self.display.show(self.renderer.canvas().clone()).await?;
        Ok(())
    }

    /// Look up the position unless it is already known
    pub async fn ensure_coordinates(&mut self) -> Result<Coordinates, DataUnavailable> {
        if let Some(coords) = self.coordinates {
            return Ok(coords);
        }
        let coords = self.location.current_location().await?;
        self.coordinates = Some(coords);
        Ok(coords)
    }

    async fn lookup(&mut self) -> Result<WeatherFacts, DataUnavailable> {
        let coords = self.ensure_coordinates().await?;
        self.weather.lookup(coords).await
    }
}

fn local_time<Tz: TimeZone>(at: DateTime<Utc>, tz: &Tz) -> NaiveDateTime {
    at.with_timezone(tz).naive_local()
}
