//! Device position lookup.

use super::http::{self, RetryPolicy};
use super::{Coordinates, DataUnavailable, GeolocationSource};
use async_trait::async_trait;
use serde_json::Value;

const ENDPOINT: &str = "https://geolocation-db.com/json/";

/// IP-based geolocation via geolocation-db.com
#[derive(Default)]
pub struct GeolocationDb {
    retry: RetryPolicy,
}

impl GeolocationDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GeolocationSource for GeolocationDb {
    async fn current_location(&self) -> Result<Coordinates, DataUnavailable> {
        let body: Value = http::get_json(ENDPOINT, &[], &self.retry)
            .await
            .map_err(|e| {
                tracing::warn!("Geolocation lookup failed: {}", e);
                DataUnavailable::new()
            })?;

        let coords = parse_location(&body).ok_or_else(|| {
            tracing::warn!("Geolocation response has no usable position: {}", body);
            DataUnavailable::new()
        })?;

        tracing::info!("Located at {}", coords);
        Ok(coords)
    }
}

/// The service answers "Not found" instead of a number for unknown addresses
fn parse_location(body: &Value) -> Option<Coordinates> {
    let latitude = body.get("latitude")?.as_f64()?;
    let longitude = body.get("longitude")?.as_f64()?;
    let coords = Coordinates::new(latitude, longitude);
    coords.is_valid().then_some(coords)
}

/// Coordinates fixed in the configuration
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl GeolocationSource for FixedLocation {
    async fn current_location(&self) -> Result<Coordinates, DataUnavailable> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_location() {
        let body = json!({"country_code": "PL", "latitude": 52.2297, "longitude": 21.0122, "IPv4": "192.0.2.1"});
        assert_eq!(parse_location(&body), Some(Coordinates::new(52.2297, 21.0122)));
    }

    #[test]
    fn test_not_found_is_rejected() {
        let body = json!({"country_code": "Not found", "latitude": "Not found", "longitude": "Not found"});
        assert_eq!(parse_location(&body), None);
    }

    #[tokio::test]
    async fn test_fixed_location() {
        let source = FixedLocation(Coordinates::new(50.06, 19.94));
        assert_eq!(source.current_location().await, Ok(Coordinates::new(50.06, 19.94)));
    }
}
