//! Weather and location collaborators.
//!
//! The panel only sees the two traits below. Every failure collapses into
//! [`DataUnavailable`], which carries the text shown on the panel banner.

pub mod geoloc;
pub mod http;
pub mod openweather;

pub use geoloc::{FixedLocation, GeolocationDb};
pub use openweather::OpenWeatherMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

/// Current conditions at one location
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherFacts {
    pub temperature_celsius: f64,
    pub relative_humidity_pct: u8,
    pub detailed_status: String,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

/// A weather or location lookup failed; the message is what the panel shows
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DataUnavailable {
    message: String,
}

impl DataUnavailable {
    pub const BANNER: &'static str = "dane pogodowe z internetu błąd";

    pub fn new() -> Self {
        Self::with_message(Self::BANNER)
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for DataUnavailable {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of current weather conditions
#[async_trait]
pub trait WeatherDataSource: Send + Sync {
    async fn lookup(&self, at: Coordinates) -> Result<WeatherFacts, DataUnavailable>;
}

/// Source of the device position
#[async_trait]
pub trait GeolocationSource: Send + Sync {
    async fn current_location(&self) -> Result<Coordinates, DataUnavailable>;
}
