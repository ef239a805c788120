// Trait abstractions for pipeline collaborators.
//
// SourceFetcher hides the list-rendering mechanics (headless browser,
// DOM parsing). Geocoder hides the geocoding HTTP API.
//
// These enable deterministic testing with in-memory mocks: no network,
// no browser. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;

use geocode_client::{GeocodeClient, GeocodedPlace};
use midway_common::{Coordinate, MidwayError, SourceBatch, SourceDescriptor};

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch one list source and return its observed entries.
    /// A retry is a full idempotent re-fetch — implementations must not
    /// carry partial state between attempts.
    async fn fetch(&self, source: &SourceDescriptor) -> Result<SourceBatch>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Forward-geocode a place name, biased by a region hint.
    /// `Ok(None)` means the service had no match — not an error.
    async fn forward(&self, name: &str, region_hint: &str) -> Result<Option<GeocodedPlace>>;

    /// Reverse-geocode a coordinate to a display address.
    async fn reverse(&self, coordinate: &Coordinate) -> Result<Option<String>>;
}

#[async_trait]
impl Geocoder for GeocodeClient {
    async fn forward(&self, name: &str, region_hint: &str) -> Result<Option<GeocodedPlace>> {
        let query = if region_hint.is_empty() {
            name.to_string()
        } else {
            format!("{name}, {region_hint}")
        };
        self.search(&query)
            .await
            .map_err(|e| MidwayError::Geocode(e.to_string()).into())
    }

    async fn reverse(&self, coordinate: &Coordinate) -> Result<Option<String>> {
        GeocodeClient::reverse(self, coordinate.lat, coordinate.lng)
            .await
            .map_err(|e| MidwayError::Geocode(e.to_string()).into())
    }
}
