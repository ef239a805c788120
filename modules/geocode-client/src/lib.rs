pub mod error;

pub use error::{GeocodeError, Result};

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

/// A successfully resolved place: display address plus coordinates.
#[derive(Debug, Clone)]
pub struct GeocodedPlace {
    pub formatted_address: String,
    pub lat: f64,
    pub lng: f64,
}

pub struct GeocodeClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

/// Nominatim jsonv2 search result. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    display_name: Option<String>,
    error: Option<String>,
}

impl GeocodeClient {
    /// `user_agent` identifies the application — Nominatim's usage policy
    /// rejects anonymous clients.
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    /// Forward-geocode a free-text query via the /search endpoint.
    /// Returns `Ok(None)` when the API has no match — not an error.
    pub async fn search(&self, query: &str) -> Result<Option<GeocodedPlace>> {
        let endpoint = format!("{}/search", self.base_url);

        let resp = self
            .client
            .get(&endpoint)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let results: Vec<SearchResult> = resp
            .json()
            .await
            .map_err(|e| GeocodeError::Malformed(e.to_string()))?;

        let Some(first) = results.into_iter().next() else {
            debug!(query, "No forward geocoding match");
            return Ok(None);
        };

        Ok(Some(GeocodedPlace {
            lat: parse_coordinate(&first.lat)?,
            lng: parse_coordinate(&first.lon)?,
            formatted_address: first.display_name,
        }))
    }

    /// Reverse-geocode a coordinate to a display address via /reverse.
    /// Returns `Ok(None)` for unmapped locations (the API reports those
    /// as a 200 with an `error` field, not a failure status).
    pub async fn reverse(&self, lat: f64, lng: f64) -> Result<Option<String>> {
        let endpoint = format!("{}/reverse", self.base_url);

        let resp = self
            .client
            .get(&endpoint)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
                ("format", "jsonv2".to_string()),
            ])
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let result: ReverseResult = resp
            .json()
            .await
            .map_err(|e| GeocodeError::Malformed(e.to_string()))?;

        if let Some(reason) = result.error {
            debug!(lat, lng, reason, "No reverse geocoding match");
            return Ok(None);
        }

        Ok(result.display_name)
    }
}

fn parse_coordinate(raw: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| GeocodeError::Malformed(format!("unparseable coordinate: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_results_deserialize_string_coordinates() {
        let raw = r#"[{"lat": "52.5200066", "lon": "13.404954", "display_name": "Berlin, Deutschland"}]"#;
        let results: Vec<SearchResult> = serde_json::from_str(raw).unwrap();
        assert_eq!(results.len(), 1);
        assert!((parse_coordinate(&results[0].lat).unwrap() - 52.5200066).abs() < 1e-9);
    }

    #[test]
    fn unparseable_coordinate_is_malformed() {
        assert!(matches!(
            parse_coordinate("not-a-number"),
            Err(GeocodeError::Malformed(_))
        ));
    }

    #[test]
    fn reverse_error_body_means_no_match() {
        let raw = r#"{"error": "Unable to geocode"}"#;
        let result: ReverseResult = serde_json::from_str(raw).unwrap();
        assert!(result.error.is_some());
        assert!(result.display_name.is_none());
    }
}
