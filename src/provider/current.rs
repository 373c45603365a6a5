// FILE: src/provider/current.rs
//! Current adapter: the unified search API.
//!
//! Not every filter is honored server-side for every field combination, so
//! `open_now` and `keyword` are applied again after the fetch. Pagination is
//! not wired up on this path: pages always report `has_more = false`.

use std::future::Future;
use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use crate::error::{PlacesError, Result};
use crate::model::{AutocompleteRequest, BoundingBox, DetailsRequest, LatLng, NearbySearchOptions, PlaceRecord, Prediction, TextSearchOptions};
use super::shapes::{CurrentAutocompleteResponse, CurrentLatLng, CurrentPlace, CurrentSearchResponse};
use super::{ensure_live, AreaPolicy, PlacesProvider, ProviderPage};

/// Upstream cap on `maxResultCount` / `pageSize`.
pub const MAX_RESULT_COUNT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Circle {
    pub center: CurrentLatLng,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rectangle {
    pub low: CurrentLatLng,
    pub high: CurrentLatLng,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationArea {
    Circle(Circle),
    Rectangle(Rectangle),
}

impl LocationArea {
    pub fn circle(center: LatLng, radius_m: f64) -> Self {
        Self::Circle(Circle { center: center.into(), radius: radius_m })
    }

    pub fn rectangle(bbox: &BoundingBox) -> Self {
        Self::Rectangle(Rectangle { low: bbox.low().into(), high: bbox.high().into() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyBody {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub included_types: Vec<String>,
    pub max_result_count: usize,
    pub location_restriction: LocationArea,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBody {
    pub text_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_bias: Option<LocationArea>,
    /// Rectangle only; takes the place of the bias when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_restriction: Option<LocationArea>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub open_now: bool,
    pub page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteBody {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_bias: Option<LocationArea>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub included_primary_types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub included_region_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[async_trait]
pub trait CurrentTransport: Send + Sync {
    /// Whether the unified API can be used right now.
    fn is_available(&self) -> bool {
        true
    }

    async fn search_nearby(&self, body: &NearbyBody) -> Result<CurrentSearchResponse>;

    async fn search_text(&self, body: &TextBody) -> Result<CurrentSearchResponse>;

    async fn autocomplete(&self, body: &AutocompleteBody) -> Result<CurrentAutocompleteResponse>;

    async fn place(&self, place_id: &str, fields: &[String]) -> Result<CurrentPlace>;
}

/// Runs `fut` unless `cancel` fires first; a late response is dropped.
async fn guarded<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ensure_live(cancel)?;
    let out = tokio::select! {
        _ = cancel.cancelled() => return Err(PlacesError::Cancelled),
        out = fut => out?,
    };
    ensure_live(cancel)?;
    Ok(out)
}

fn post_filter(places: Vec<CurrentPlace>, open_now: bool, keyword: Option<&str>, max_results: usize) -> Vec<PlaceRecord> {
    places.into_iter()
        .map(PlaceRecord::from)
        .filter(|p| !open_now || p.open_now == Some(true))
        .filter(|p| keyword.map_or(true, |k| p.matches_keyword(k)))
        .take(max_results)
        .collect()
}

pub struct CurrentAdapter<T> {
    transport: T,
    area: AreaPolicy,
    language: Option<String>,
}

impl<T: CurrentTransport> CurrentAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, area: AreaPolicy::default(), language: None }
    }

    pub fn with_area(mut self, area: AreaPolicy) -> Self {
        self.area = area;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Rectangle over the visible viewport when restricted to it, else a circle.
    pub fn nearby_area(&self, options: &NearbySearchOptions) -> LocationArea {
        match (options.restrict_to_viewport, &options.viewport) {
            (true, Some(viewport)) => LocationArea::rectangle(viewport),
            _ => LocationArea::circle(options.search_center(), self.area.radius_for(options)),
        }
    }

    fn text_bias(&self, options: &TextSearchOptions) -> Option<LocationArea> {
        match (&options.viewport, options.location) {
            (Some(viewport), _) => Some(LocationArea::rectangle(viewport)),
            (None, Some(center)) => {
                let radius = options.radius_m.unwrap_or(self.area.default_radius_m).min(self.area.max_radius_m);
                Some(LocationArea::circle(center, radius))
            }
            (None, None) => None,
        }
    }
}

#[async_trait]
impl<T: CurrentTransport> PlacesProvider for CurrentAdapter<T> {
    fn name(&self) -> &'static str {
        "current"
    }

    fn is_available(&self) -> bool {
        self.transport.is_available()
    }

    async fn search_nearby(&self, options: &NearbySearchOptions, cancel: &CancellationToken) -> Result<ProviderPage> {
        let body = NearbyBody {
            included_types: options.category.iter().cloned().collect(),
            max_result_count: MAX_RESULT_COUNT,
            location_restriction: self.nearby_area(options),
            language_code: self.language.clone(),
        };
        tracing::debug!("[Current] search_nearby {:?}", body.location_restriction);

        let response = guarded(cancel, self.transport.search_nearby(&body)).await?;
        let keyword = options.keyword.as_deref().filter(|k| !k.trim().is_empty());
        let places = post_filter(response.places, options.open_now, keyword, options.max_results);

        if options.page_token.is_some() {
            tracing::debug!("[Current] Continuation tokens are not supported on this path; ignoring");
        }
        Ok(ProviderPage { places, next_page_token: None })
    }

    async fn search_text(&self, options: &TextSearchOptions, cancel: &CancellationToken) -> Result<ProviderPage> {
        let restriction = options.viewport.as_ref()
            .filter(|_| options.restrict_to_viewport)
            .map(LocationArea::rectangle);
        let body = TextBody {
            text_query: options.query.clone(),
            included_type: options.category.clone(),
            location_bias: if restriction.is_some() { None } else { self.text_bias(options) },
            location_restriction: restriction,
            open_now: options.open_now,
            page_size: options.max_results.clamp(1, MAX_RESULT_COUNT),
            language_code: self.language.clone(),
        };
        tracing::debug!("[Current] search_text '{}'", body.text_query);

        let response = guarded(cancel, self.transport.search_text(&body)).await?;
        let keyword = options.keyword.as_deref().filter(|k| !k.trim().is_empty());
        let places = post_filter(response.places, options.open_now, keyword, options.max_results);
        Ok(ProviderPage { places, next_page_token: None })
    }

    async fn autocomplete(&self, request: &AutocompleteRequest, cancel: &CancellationToken) -> Result<Vec<Prediction>> {
        let body = AutocompleteBody {
            input: request.input.clone(),
            location_bias: request.options.bias.as_ref().map(LocationArea::rectangle),
            included_primary_types: request.options.types.clone(),
            included_region_codes: request.options.region.iter().cloned().collect(),
            session_token: request.options.session_token.clone(),
            language_code: self.language.clone(),
        };

        let response = guarded(cancel, self.transport.autocomplete(&body)).await?;
        Ok(response.suggestions.into_iter()
            .filter_map(|s| s.place_prediction)
            .map(Prediction::from)
            .collect())
    }

    async fn details(&self, request: &DetailsRequest, cancel: &CancellationToken) -> Result<PlaceRecord> {
        let place = guarded(cancel, self.transport.place(&request.place_id, &request.fields)).await?;
        Ok(PlaceRecord::from(place))
    }
}
