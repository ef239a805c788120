//! Geocoding enrichment — fill in missing coordinates and addresses.
//!
//! Lookups run concurrently under their own cap (independent of the fetch
//! cap); results are applied to the registry afterwards in a single pass,
//! so no lookup ever observes a half-updated registry. A place the
//! service cannot resolve is removed — the registry only ever holds fully
//! mappable entries.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use midway_common::{Coordinate, Registry};

use crate::traits::Geocoder;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub geocoded: usize,
    pub dropped: usize,
}

/// Forward-geocode every place missing a coordinate or address, at most
/// `concurrency` lookups in flight.
pub async fn enrich(
    registry: &mut Registry,
    geocoder: &dyn Geocoder,
    region_hint: &str,
    concurrency: usize,
) -> EnrichStats {
    let pending: Vec<String> = registry
        .iter()
        .filter(|(_, place)| place.needs_geocoding())
        .map(|(name, _)| name.clone())
        .collect();

    if pending.is_empty() {
        return EnrichStats::default();
    }
    info!(pending = pending.len(), "Geocoding places with missing data");

    let results: Vec<_> = stream::iter(pending.into_iter().map(|name| async move {
        let outcome = geocoder.forward(&name, region_hint).await;
        (name, outcome)
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut stats = EnrichStats::default();
    for (name, outcome) in results {
        match outcome {
            Ok(Some(resolved)) => {
                if let Some(place) = registry.get_mut(&name) {
                    place.address = Some(resolved.formatted_address);
                    place.coordinate = Some(Coordinate::new(resolved.lat, resolved.lng));
                    stats.geocoded += 1;
                }
            }
            Ok(None) => {
                warn!(name = name.as_str(), "No geocoding match, dropping place");
                registry.remove(&name);
                stats.dropped += 1;
            }
            Err(e) => {
                warn!(name = name.as_str(), error = %e, "Geocoding failed, dropping place");
                registry.remove(&name);
                stats.dropped += 1;
            }
        }
    }

    info!(
        geocoded = stats.geocoded,
        dropped = stats.dropped,
        "Enrichment complete"
    );
    stats
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use geocode_client::GeocodedPlace;
    use midway_common::Place;

    use super::*;

    /// Resolves names present in the table, reports no-match for names
    /// starting with "ghost", errors otherwise. Counts forward calls.
    struct TableGeocoder {
        table: HashMap<String, (f64, f64)>,
        forward_calls: AtomicUsize,
    }

    impl TableGeocoder {
        fn new(entries: &[(&str, f64, f64)]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(name, lat, lng)| (name.to_string(), (*lat, *lng)))
                    .collect(),
                forward_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Geocoder for TableGeocoder {
        async fn forward(&self, name: &str, _region_hint: &str) -> Result<Option<GeocodedPlace>> {
            self.forward_calls.fetch_add(1, Ordering::SeqCst);
            if let Some((lat, lng)) = self.table.get(name) {
                return Ok(Some(GeocodedPlace {
                    formatted_address: format!("{name} Street 1"),
                    lat: *lat,
                    lng: *lng,
                }));
            }
            if name.starts_with("ghost") {
                return Ok(None);
            }
            Err(anyhow!("transport error"))
        }

        async fn reverse(&self, _coordinate: &Coordinate) -> Result<Option<String>> {
            Ok(Some("Somewhere Central".to_string()))
        }
    }

    fn registry_with(names: &[&str]) -> Registry {
        let mut registry = Registry::new();
        for name in names {
            registry.insert(name.to_string(), Place::observed("S1", false));
        }
        registry
    }

    #[tokio::test]
    async fn resolved_places_gain_address_and_coordinate() {
        let mut registry = registry_with(&["Cafe X"]);
        let geocoder = TableGeocoder::new(&[("Cafe X", 52.52, 13.405)]);

        let stats = enrich(&mut registry, &geocoder, "Berlin", 4).await;

        assert_eq!(stats, EnrichStats { geocoded: 1, dropped: 0 });
        let place = registry.get("Cafe X").unwrap();
        assert_eq!(place.address.as_deref(), Some("Cafe X Street 1"));
        assert_eq!(place.coordinate, Some(Coordinate::new(52.52, 13.405)));
    }

    #[tokio::test]
    async fn unresolved_places_are_dropped_without_affecting_others() {
        let mut registry = registry_with(&["Cafe X", "ghost town bar", "Error Inn"]);
        let geocoder = TableGeocoder::new(&[("Cafe X", 52.52, 13.405)]);

        let stats = enrich(&mut registry, &geocoder, "", 4).await;

        assert_eq!(stats, EnrichStats { geocoded: 1, dropped: 2 });
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("Cafe X"));
    }

    #[tokio::test]
    async fn already_enriched_places_are_not_looked_up() {
        let mut registry = registry_with(&["Cafe X"]);
        {
            let place = registry.get_mut("Cafe X").unwrap();
            place.address = Some("Known Street 9".to_string());
            place.coordinate = Some(Coordinate::new(48.1, 11.6));
        }
        let geocoder = TableGeocoder::new(&[]);

        let stats = enrich(&mut registry, &geocoder, "", 4).await;

        assert_eq!(stats, EnrichStats::default());
        assert_eq!(geocoder.forward_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.get("Cafe X").unwrap().address.as_deref(), Some("Known Street 9"));
    }
}
