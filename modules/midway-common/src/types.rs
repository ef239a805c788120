use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Integer microdegree key — two coordinates within ~0.11 m collapse
    /// to the same key. Used for exact-equality deduplication.
    pub fn rounded_key(&self) -> (i64, i64) {
        (
            (self.lat * 1e6).round() as i64,
            (self.lng * 1e6).round() as i64,
        )
    }
}

/// Haversine great-circle distance between two coordinates in kilometers.
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_KM * c
}

// --- Place Registry ---

/// A point of interest observed on at least one list source. Keyed by its
/// name in the [`Registry`]; the name is the stable identity across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,

    /// List labels this place was observed under, insertion order,
    /// no duplicates.
    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub permanently_closed: bool,

    /// True iff the place was observed in the active run. Run-local
    /// bookkeeping — recomputed at the start of every run, never persisted.
    #[serde(skip)]
    pub current: bool,
}

impl Place {
    /// A freshly observed place: no address or coordinate yet, one
    /// category, marked current.
    pub fn observed(list_label: &str, permanently_closed: bool) -> Self {
        Self {
            address: None,
            coordinate: None,
            categories: vec![list_label.to_string()],
            permanently_closed,
            current: true,
        }
    }

    pub fn add_category(&mut self, label: &str) {
        if !self.categories.iter().any(|c| c == label) {
            self.categories.push(label.to_string());
        }
    }

    pub fn needs_geocoding(&self) -> bool {
        self.coordinate.is_none() || self.address.is_none()
    }
}

/// The persistent place registry: name → [`Place`]. BTreeMap keeps the
/// persisted JSON deterministic across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    places: BTreeMap<String, Place>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.places.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Place> {
        self.places.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Place> {
        self.places.get_mut(name)
    }

    pub fn insert(&mut self, name: String, place: Place) {
        self.places.insert(name, place);
    }

    pub fn remove(&mut self, name: &str) -> Option<Place> {
        self.places.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Place)> {
        self.places.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Place)> {
        self.places.iter_mut()
    }

    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&String, &mut Place) -> bool,
    {
        self.places.retain(f);
    }
}

// --- Harvest Types ---

/// One list source to harvest: a category label plus the URL of the
/// rendered list page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub label: String,
    pub url: String,
}

/// A single observation from a list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPlace {
    pub name: String,
    pub permanently_closed: bool,
}

/// The result of fetching one source: its label plus ordered observations.
/// A source that failed all fetch attempts degrades to an empty batch.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub list_label: String,
    pub entries: Vec<ObservedPlace>,
}

impl SourceBatch {
    pub fn empty(list_label: &str) -> Self {
        Self {
            list_label: list_label.to_string(),
            entries: Vec::new(),
        }
    }
}

// --- Output ---

/// The final artifact: the computed center and its display address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingPoint {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_category_keeps_insertion_order_without_duplicates() {
        let mut place = Place::observed("coffee", false);
        place.add_category("bars");
        place.add_category("coffee");
        place.add_category("bars");
        assert_eq!(place.categories, vec!["coffee", "bars"]);
    }

    #[test]
    fn rounded_key_collapses_sub_microdegree_differences() {
        let a = Coordinate::new(52.5200001, 13.4050001);
        let b = Coordinate::new(52.5200003, 13.4049998);
        let c = Coordinate::new(52.5200200, 13.4050001);
        assert_eq!(a.rounded_key(), b.rounded_key());
        assert_ne!(a.rounded_key(), c.rounded_key());
    }

    #[test]
    fn coordinate_validation_rejects_out_of_range() {
        assert!(Coordinate::new(52.52, 13.405).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Berlin -> Munich is roughly 504 km.
        let berlin = Coordinate::new(52.5200, 13.4050);
        let munich = Coordinate::new(48.1351, 11.5820);
        let km = haversine_km(&berlin, &munich);
        assert!((km - 504.0).abs() < 5.0, "got {km}");
    }

    #[test]
    fn current_flag_is_not_persisted() {
        let mut registry = Registry::new();
        let mut place = Place::observed("coffee", false);
        place.current = true;
        registry.insert("Cafe X".to_string(), place);

        let json = serde_json::to_string(&registry).unwrap();
        assert!(!json.contains("current"));

        let reloaded: Registry = serde_json::from_str(&json).unwrap();
        assert!(!reloaded.get("Cafe X").unwrap().current);
    }
}
