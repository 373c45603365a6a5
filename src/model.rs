// FILE: src/model.rs
//! Canonical value types shared by the cache, the adapters and the engine.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_meters(&self, other: &LatLng) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Visible map area. `west > east` means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self { south, west, north, east }
    }

    pub fn low(&self) -> LatLng {
        LatLng::new(self.south, self.west)
    }

    pub fn high(&self) -> LatLng {
        LatLng::new(self.north, self.east)
    }

    fn lng_span(&self) -> f64 {
        if self.west <= self.east {
            self.east - self.west
        } else {
            360.0 - (self.west - self.east)
        }
    }

    pub fn center(&self) -> LatLng {
        let mut lng = self.west + self.lng_span() / 2.0;
        if lng > 180.0 {
            lng -= 360.0;
        }
        LatLng::new((self.south + self.north) / 2.0, lng)
    }

    pub fn diagonal_meters(&self) -> f64 {
        self.low().distance_meters(&self.high())
    }

    pub fn contains(&self, point: &LatLng) -> bool {
        if point.lat < self.south || point.lat > self.north {
            return false;
        }
        if self.west <= self.east {
            point.lng >= self.west && point.lng <= self.east
        } else {
            point.lng >= self.west || point.lng <= self.east
        }
    }

    /// Web-mercator zoom level that would roughly fit this box in a 256px tile.
    pub fn estimated_zoom(&self) -> f64 {
        let span = self.lng_span();
        if span <= 0.0 {
            return 21.0;
        }
        (360.0 / span).log2().clamp(0.0, 21.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    NearbySearch,
    TextSearch,
    Autocomplete,
    Details,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NearbySearch => "nearby_search",
            Self::TextSearch => "text_search",
            Self::Autocomplete => "autocomplete",
            Self::Details => "details",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters coming from the map view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbySearchOptions {
    pub text: Option<String>,
    /// Route free text through the text-search path instead of nearby search.
    pub use_text_search: bool,
    pub viewport: Option<BoundingBox>,
    pub center_fallback: LatLng,
    pub category: Option<String>,
    pub open_now: bool,
    pub keyword: Option<String>,
    pub restrict_to_viewport: bool,
    pub max_results: usize,
    /// Fixed search radius; computed from the viewport when absent.
    pub radius_m: Option<f64>,
    /// Continuation token from a previous page (legacy provider only).
    pub page_token: Option<String>,
}

impl NearbySearchOptions {
    pub fn around(center: LatLng) -> Self {
        Self {
            text: None,
            use_text_search: false,
            viewport: None,
            center_fallback: center,
            category: None,
            open_now: false,
            keyword: None,
            restrict_to_viewport: false,
            max_results: 20,
            radius_m: None,
            page_token: None,
        }
    }

    pub fn search_center(&self) -> LatLng {
        self.viewport.map(|v| v.center()).unwrap_or(self.center_fallback)
    }

    /// Projects the nearby filters onto a text query. Every filter is carried over.
    pub fn to_text_options(&self) -> TextSearchOptions {
        TextSearchOptions {
            query: self.text.clone().unwrap_or_default(),
            viewport: self.viewport,
            location: Some(self.center_fallback),
            radius_m: self.radius_m,
            open_now: self.open_now,
            category: self.category.clone(),
            keyword: self.keyword.clone(),
            restrict_to_viewport: self.restrict_to_viewport,
            page_token: self.page_token.clone(),
            max_results: self.max_results,
            zoom: None,
            use_cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSearchOptions {
    pub query: String,
    pub viewport: Option<BoundingBox>,
    pub location: Option<LatLng>,
    pub radius_m: Option<f64>,
    pub open_now: bool,
    /// Place type filter.
    pub category: Option<String>,
    /// Post-fetch match against name, address and types.
    pub keyword: Option<String>,
    /// Drop results outside `viewport`.
    pub restrict_to_viewport: bool,
    pub page_token: Option<String>,
    pub max_results: usize,
    /// Map zoom at query time; estimated from the viewport when absent.
    pub zoom: Option<f64>,
    pub use_cache: bool,
}

impl TextSearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            viewport: None,
            location: None,
            radius_m: None,
            open_now: false,
            category: None,
            keyword: None,
            restrict_to_viewport: false,
            page_token: None,
            max_results: 20,
            zoom: None,
            use_cache: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteOptions {
    pub bias: Option<BoundingBox>,
    pub session_token: Option<String>,
    pub region: Option<String>,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutocompleteRequest {
    pub input: String,
    pub options: AutocompleteOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailsRequest {
    pub place_id: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub place_id: String,
    pub description: String,
    pub main_text: String,
    pub secondary_text: String,
    pub types: Vec<String>,
}

/// Opaque photo handle; only meaningful to the provider that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef(pub String);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub id: String,
    pub name: String,
    pub formatted_address: String,
    pub location: LatLng,
    pub rating: Option<f64>,
    pub rating_count: Option<u32>,
    pub price_level: Option<u8>,
    pub open_now: Option<bool>,
    pub types: Vec<String>,
    pub photos: Vec<PhotoRef>,
    pub business_status: Option<String>,
}

impl PlaceRecord {
    /// Case-insensitive match against name, address and types.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.formatted_address.to_lowercase().contains(&needle)
            || self.types.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "options", rename_all = "snake_case")]
pub enum SourceQuery {
    Nearby(NearbySearchOptions),
    Text(TextSearchOptions),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub items: Vec<PlaceRecord>,
    pub has_more: bool,
    pub next_page_token: Option<String>,
    pub request_id: String,
    pub elapsed_ms: u64,
    pub source_query: SourceQuery,
    /// Served from the result cache without touching the network.
    pub cache_hit: bool,
    /// On a cache hit, the id of the request that populated the entry.
    pub origin_request_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_center_and_contains() {
        let bbox = BoundingBox::new(40.0, -74.1, 40.2, -73.9);
        let center = bbox.center();
        assert!((center.lat - 40.1).abs() < 1e-9);
        assert!((center.lng + 74.0).abs() < 1e-9);
        assert!(bbox.contains(&center));
        assert!(!bbox.contains(&LatLng::new(41.0, -74.0)));
    }

    #[test]
    fn test_bbox_across_antimeridian() {
        let bbox = BoundingBox::new(-10.0, 170.0, 10.0, -170.0);
        assert!(bbox.contains(&LatLng::new(0.0, 179.5)));
        assert!(bbox.contains(&LatLng::new(0.0, -175.0)));
        assert!(!bbox.contains(&LatLng::new(0.0, 0.0)));
        assert!((bbox.center().lng.abs() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let d = LatLng::new(0.0, 0.0).distance_meters(&LatLng::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 100.0, "got {}", d);
    }

    #[test]
    fn test_estimated_zoom() {
        let world = BoundingBox::new(-85.0, -180.0, 85.0, 180.0);
        assert!(world.estimated_zoom() < 1.0);
        let city = BoundingBox::new(40.70, -74.02, 40.72, -74.00);
        let zoom = city.estimated_zoom();
        assert!(zoom > 14.0 && zoom < 15.0, "got {}", zoom);
    }

    #[test]
    fn test_keyword_match() {
        let place = PlaceRecord {
            name: "Blue Bottle Coffee".into(),
            formatted_address: "1 Ferry Building, San Francisco".into(),
            types: vec!["cafe".into()],
            ..Default::default()
        };
        assert!(place.matches_keyword("coffee"));
        assert!(place.matches_keyword("FERRY"));
        assert!(place.matches_keyword("caf"));
        assert!(place.matches_keyword("  "));
        assert!(!place.matches_keyword("pizza"));
    }

    #[test]
    fn test_text_projection_keeps_filters() {
        let nearby = NearbySearchOptions {
            text: Some("ramen".into()),
            use_text_search: true,
            viewport: Some(BoundingBox::new(35.65, 139.69, 35.67, 139.71)),
            category: Some("restaurant".into()),
            keyword: Some("tonkotsu".into()),
            restrict_to_viewport: true,
            open_now: true,
            max_results: 5,
            ..NearbySearchOptions::around(LatLng::new(35.66, 139.70))
        };
        let text = nearby.to_text_options();
        assert_eq!(text.query, "ramen");
        assert_eq!(text.category.as_deref(), Some("restaurant"));
        assert_eq!(text.keyword.as_deref(), Some("tonkotsu"));
        assert!(text.restrict_to_viewport);
        assert!(text.open_now);
        assert_eq!(text.max_results, 5);
        assert_eq!(text.viewport, nearby.viewport);
    }
}
