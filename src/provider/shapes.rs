// FILE: src/provider/shapes.rs
//! Upstream payload shapes and their normalization into canonical records.
//!
//! Both upstream generations describe the same things with different field
//! names. Everything downstream only ever sees `PlaceRecord` / `Prediction`:
//! missing strings become "", missing lists become empty, missing scalars None.

use serde::{Deserialize, Serialize};
use crate::error::PlacesError;
use crate::model::{LatLng, PhotoRef, PlaceRecord, Prediction};

// ========== LEGACY (callback API / maps/api/place/*/json) ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegacyStatus {
    Ok,
    ZeroResults,
    OverQueryLimit,
    RequestDenied,
    InvalidRequest,
    NotFound,
    UnknownError,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyLatLng {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyGeometry {
    #[serde(default)]
    pub location: LegacyLatLng,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyOpeningHours {
    pub open_now: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyPhoto {
    #[serde(default)]
    pub photo_reference: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyPlace {
    pub place_id: Option<String>,
    pub name: Option<String>,
    pub formatted_address: Option<String>,
    pub vicinity: Option<String>,
    pub geometry: Option<LegacyGeometry>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u32>,
    pub price_level: Option<u8>,
    pub opening_hours: Option<LegacyOpeningHours>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub photos: Vec<LegacyPhoto>,
    pub business_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyStructuredFormatting {
    #[serde(default)]
    pub main_text: String,
    #[serde(default)]
    pub secondary_text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyPrediction {
    #[serde(default)]
    pub place_id: String,
    #[serde(default)]
    pub description: String,
    pub structured_formatting: Option<LegacyStructuredFormatting>,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LegacySearchEnvelope {
    pub status: LegacyStatus,
    #[serde(default)]
    pub results: Vec<LegacyPlace>,
    pub error_message: Option<String>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyDetailsEnvelope {
    pub status: LegacyStatus,
    pub result: Option<LegacyPlace>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyAutocompleteEnvelope {
    pub status: LegacyStatus,
    #[serde(default)]
    pub predictions: Vec<LegacyPrediction>,
    pub error_message: Option<String>,
}

impl From<LegacyPlace> for PlaceRecord {
    fn from(p: LegacyPlace) -> Self {
        let location = p.geometry
            .map(|g| LatLng::new(g.location.lat, g.location.lng))
            .unwrap_or_default();

        PlaceRecord {
            id: p.place_id.unwrap_or_default(),
            name: p.name.unwrap_or_default(),
            formatted_address: p.formatted_address.or(p.vicinity).unwrap_or_default(),
            location,
            rating: p.rating,
            rating_count: p.user_ratings_total,
            price_level: p.price_level,
            open_now: p.opening_hours.and_then(|h| h.open_now),
            types: p.types,
            photos: p.photos.into_iter()
                .filter(|ph| !ph.photo_reference.is_empty())
                .map(|ph| PhotoRef(ph.photo_reference))
                .collect(),
            business_status: p.business_status,
        }
    }
}

impl From<LegacyPrediction> for Prediction {
    fn from(p: LegacyPrediction) -> Self {
        let formatting = p.structured_formatting.unwrap_or_default();
        Prediction {
            place_id: p.place_id,
            description: p.description,
            main_text: formatting.main_text,
            secondary_text: formatting.secondary_text,
            types: p.types,
        }
    }
}

// ========== CURRENT (unified search API, places.googleapis.com/v1) ==========

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentLatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

impl From<LatLng> for CurrentLatLng {
    fn from(p: LatLng) -> Self {
        Self { latitude: p.lat, longitude: p.lng }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentOpeningHours {
    pub open_now: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentPhoto {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPlace {
    pub id: Option<String>,
    pub display_name: Option<LocalizedText>,
    pub formatted_address: Option<String>,
    pub short_formatted_address: Option<String>,
    pub location: Option<CurrentLatLng>,
    pub rating: Option<f64>,
    pub user_rating_count: Option<u32>,
    pub price_level: Option<String>,
    pub current_opening_hours: Option<CurrentOpeningHours>,
    pub regular_opening_hours: Option<CurrentOpeningHours>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub photos: Vec<CurrentPhoto>,
    pub business_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentSearchResponse {
    #[serde(default)]
    pub places: Vec<CurrentPlace>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStructuredFormat {
    pub main_text: Option<LocalizedText>,
    pub secondary_text: Option<LocalizedText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPlacePrediction {
    #[serde(default)]
    pub place_id: String,
    pub text: Option<LocalizedText>,
    pub structured_format: Option<CurrentStructuredFormat>,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSuggestion {
    pub place_prediction: Option<CurrentPlacePrediction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentAutocompleteResponse {
    #[serde(default)]
    pub suggestions: Vec<CurrentSuggestion>,
}

/// `PRICE_LEVEL_*` enum names onto the legacy 0..=4 scale.
pub fn parse_price_level(level: &str) -> Option<u8> {
    match level {
        "PRICE_LEVEL_FREE" => Some(0),
        "PRICE_LEVEL_INEXPENSIVE" => Some(1),
        "PRICE_LEVEL_MODERATE" => Some(2),
        "PRICE_LEVEL_EXPENSIVE" => Some(3),
        "PRICE_LEVEL_VERY_EXPENSIVE" => Some(4),
        _ => None,
    }
}

impl From<CurrentPlace> for PlaceRecord {
    fn from(p: CurrentPlace) -> Self {
        let open_now = p.current_opening_hours.and_then(|h| h.open_now)
            .or_else(|| p.regular_opening_hours.and_then(|h| h.open_now));

        PlaceRecord {
            id: p.id.unwrap_or_default(),
            name: p.display_name.map(|n| n.text).unwrap_or_default(),
            formatted_address: p.formatted_address.or(p.short_formatted_address).unwrap_or_default(),
            location: p.location.map(|l| LatLng::new(l.latitude, l.longitude)).unwrap_or_default(),
            rating: p.rating,
            rating_count: p.user_rating_count,
            price_level: p.price_level.as_deref().and_then(parse_price_level),
            open_now,
            types: p.types,
            photos: p.photos.into_iter()
                .filter(|ph| !ph.name.is_empty())
                .map(|ph| PhotoRef(ph.name))
                .collect(),
            business_status: p.business_status,
        }
    }
}

impl From<CurrentPlacePrediction> for Prediction {
    fn from(p: CurrentPlacePrediction) -> Self {
        let format = p.structured_format.unwrap_or_default();
        Prediction {
            place_id: p.place_id,
            description: p.text.map(|t| t.text).unwrap_or_default(),
            main_text: format.main_text.map(|t| t.text).unwrap_or_default(),
            secondary_text: format.secondary_text.map(|t| t.text).unwrap_or_default(),
            types: p.types,
        }
    }
}

// ========== CURRENT API ERRORS ==========

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentErrorDetail {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub details: Vec<CurrentErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentErrorBody {
    #[serde(default)]
    pub error: CurrentError,
}

impl CurrentError {
    fn has_reason(&self, reason: &str) -> bool {
        self.details.iter().any(|d| d.reason.as_deref() == Some(reason))
    }

    /// The unified API is not enabled for this key's project.
    pub fn is_service_disabled(&self) -> bool {
        let message = self.message.to_lowercase();
        self.has_reason("SERVICE_DISABLED")
            || message.contains("has not been used in project")
            || message.contains("it is disabled")
    }

    pub fn into_error(self, http_status: u16) -> PlacesError {
        let message = self.message.to_lowercase();

        if self.has_reason("API_KEY_INVALID") || message.contains("api key not valid") {
            return PlacesError::InvalidCredentials(self.message);
        }
        if message.contains("billing") || self.has_reason("BILLING_DISABLED") {
            return PlacesError::BillingDisabled(self.message);
        }

        match (http_status, self.status.as_str()) {
            (_, "RESOURCE_EXHAUSTED") | (429, _) => PlacesError::QuotaExceeded(self.message),
            (_, "UNAUTHENTICATED") | (401, _) => PlacesError::InvalidCredentials(self.message),
            (_, "PERMISSION_DENIED") | (403, _) => PlacesError::RequestDenied(self.message),
            (_, "INVALID_ARGUMENT") | (_, "NOT_FOUND") | (400, _) | (404, _) => PlacesError::InvalidRequest(self.message),
            (_, "DEADLINE_EXCEEDED") | (504, _) => PlacesError::Timeout,
            (_, "UNAVAILABLE") | (503, _) => PlacesError::Network(self.message),
            _ => PlacesError::Unknown(anyhow::anyhow!("HTTP {} {}: {}", http_status, self.status, self.message)),
        }
    }
}
