//! OpenWeatherMap current-weather lookup.

use super::http::{self, RetryPolicy};
use super::{Coordinates, DataUnavailable, WeatherDataSource, WeatherFacts};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Current-weather client bound to one API key
pub struct OpenWeatherMap {
    api_key: String,
    language: String,
    retry: RetryPolicy,
}

impl OpenWeatherMap {
    pub fn new(api_key: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            language: language.into(),
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl WeatherDataSource for OpenWeatherMap {
    async fn lookup(&self, at: Coordinates) -> Result<WeatherFacts, DataUnavailable> {
        let query = [
            ("lat", at.latitude.to_string()),
            ("lon", at.longitude.to_string()),
            ("units", "metric".to_string()),
            ("lang", self.language.clone()),
            ("appid", self.api_key.clone()),
        ];

        let response: CurrentWeather = http::get_json(ENDPOINT, &query, &self.retry)
            .await
            .map_err(|e| {
                tracing::warn!("Weather lookup for {} failed: {}", at, e);
                DataUnavailable::new()
            })?;

        response.into_facts().ok_or_else(|| {
            tracing::warn!("Weather response for {} is incomplete", at);
            DataUnavailable::new()
        })
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    dt: i64,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
    sys: SunTimes,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct SunTimes {
    sunrise: i64,
    sunset: i64,
}

impl CurrentWeather {
    fn into_facts(self) -> Option<WeatherFacts> {
        let detailed_status = self.weather.into_iter().next()?.description;

        Some(WeatherFacts {
            temperature_celsius: self.main.temp,
            relative_humidity_pct: self.main.humidity.round().clamp(0.0, 100.0) as u8,
            detailed_status,
            sunrise: timestamp(self.sys.sunrise)?,
            sunset: timestamp(self.sys.sunset)?,
            observed_at: timestamp(self.dt)?,
        })
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "coord": {"lon": 21.01, "lat": 52.23},
        "weather": [{"id": 803, "main": "Clouds", "description": "zachmurzenie umiarkowane", "icon": "04d"}],
        "main": {"temp": -3.46, "feels_like": -7.1, "pressure": 1021, "humidity": 86},
        "dt": 1700049600,
        "sys": {"country": "PL", "sunrise": 1700028120, "sunset": 1700059380},
        "name": "Warszawa"
    }"#;

    #[test]
    fn test_parse_current_weather() {
        let response: CurrentWeather = serde_json::from_str(SAMPLE).unwrap();
        let facts = response.into_facts().unwrap();

        assert_eq!(facts.detailed_status, "zachmurzenie umiarkowane");
        assert_eq!(facts.temperature_celsius, -3.46);
        assert_eq!(facts.relative_humidity_pct, 86);
        assert_eq!(facts.sunrise.timestamp(), 1700028120);
        assert_eq!(facts.sunset.timestamp(), 1700059380);
        assert_eq!(facts.observed_at.timestamp(), 1700049600);
    }

    #[test]
    fn test_missing_condition_is_incomplete() {
        let json = r#"{"dt": 1, "main": {"temp": 1.0, "humidity": 50}, "weather": [], "sys": {"sunrise": 0, "sunset": 10}}"#;
        let response: CurrentWeather = serde_json::from_str(json).unwrap();
        assert!(response.into_facts().is_none());
    }

    #[test]
    fn test_error_body_does_not_parse() {
        let json = r#"{"cod": 401, "message": "Invalid API key"}"#;
        assert!(serde_json::from_str::<CurrentWeather>(json).is_err());
    }
}
