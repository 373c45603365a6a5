// FILE: src/provider/http.rs
//! reqwest-backed transports for both upstream APIs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use crate::config::PlacesConfig;
use crate::error::{PlacesError, Result};
use crate::model::LatLng;
use super::current::{AutocompleteBody, CurrentTransport, NearbyBody, TextBody};
use super::legacy::{
    LegacyAutocompleteParams, LegacyCallback, LegacyDetailsParams, LegacyNearbyParams,
    LegacyTextParams, LegacyTransport,
};
use super::shapes::{
    CurrentAutocompleteResponse, CurrentErrorBody, CurrentPlace, CurrentSearchResponse,
    LegacyAutocompleteEnvelope, LegacyDetailsEnvelope, LegacySearchEnvelope,
};

const PLACE_FIELDS: &[&str] = &[
    "id",
    "displayName",
    "formattedAddress",
    "shortFormattedAddress",
    "location",
    "rating",
    "userRatingCount",
    "priceLevel",
    "currentOpeningHours.openNow",
    "regularOpeningHours.openNow",
    "types",
    "photos.name",
    "businessStatus",
];

/// Field mask for search responses: every place field under `places.`.
pub fn search_field_mask() -> String {
    PLACE_FIELDS.iter().map(|f| format!("places.{}", f)).collect::<Vec<_>>().join(",")
}

/// Field mask for a details lookup; the full set when the caller asked for none.
pub fn details_field_mask(fields: &[String]) -> String {
    if fields.is_empty() {
        PLACE_FIELDS.join(",")
    } else {
        fields.join(",")
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PlacesError::Network(e.to_string()))
}

// ========== CURRENT ==========

pub struct HttpCurrentTransport {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    /// Cleared once the upstream says the API is not enabled for this key.
    enabled: AtomicBool,
}

impl HttpCurrentTransport {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            enabled: AtomicBool::new(true),
        })
    }

    pub fn from_config(config: &PlacesConfig) -> Result<Self> {
        Self::new(&config.current_base_url, config.api_key().map(str::to_string), config.request_timeout())
    }

    fn authorized(&self, request: RequestBuilder, field_mask: Option<String>) -> Result<RequestBuilder> {
        let key = self.api_key.as_deref().ok_or(PlacesError::MissingCredentials)?;
        let request = request.header("X-Goog-Api-Key", key);
        Ok(match field_mask {
            Some(mask) => request.header("X-Goog-FieldMask", mask),
            None => request,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let body: CurrentErrorBody = serde_json::from_str(&text).unwrap_or_default();
        if body.error.is_service_disabled() {
            tracing::warn!("[Current] Unified API disabled for this key, falling back to legacy");
            self.enabled.store(false, Ordering::SeqCst);
        }
        tracing::debug!("[Current] HTTP {}: {}", status.as_u16(), body.error.message);
        Err(body.error.into_error(status.as_u16()))
    }
}

#[async_trait]
impl CurrentTransport for HttpCurrentTransport {
    fn is_available(&self) -> bool {
        self.api_key.is_some() && self.enabled.load(Ordering::SeqCst)
    }

    async fn search_nearby(&self, body: &NearbyBody) -> Result<CurrentSearchResponse> {
        let url = format!("{}/places:searchNearby", self.base_url);
        let request = self.authorized(self.client.post(url).json(body), Some(search_field_mask()))?;
        self.send(request).await
    }

    async fn search_text(&self, body: &TextBody) -> Result<CurrentSearchResponse> {
        let url = format!("{}/places:searchText", self.base_url);
        let request = self.authorized(self.client.post(url).json(body), Some(search_field_mask()))?;
        self.send(request).await
    }

    async fn autocomplete(&self, body: &AutocompleteBody) -> Result<CurrentAutocompleteResponse> {
        let url = format!("{}/places:autocomplete", self.base_url);
        let request = self.authorized(self.client.post(url).json(body), None)?;
        self.send(request).await
    }

    async fn place(&self, place_id: &str, fields: &[String]) -> Result<CurrentPlace> {
        let url = format!("{}/places/{}", self.base_url, place_id);
        let request = self.authorized(self.client.get(url), Some(details_field_mask(fields)))?;
        self.send(request).await
    }
}

// ========== LEGACY ==========

/// Query pairs for the legacy JSON endpoints.
type Query = Vec<(&'static str, String)>;

fn push_opt(query: &mut Query, name: &'static str, value: Option<impl ToString>) {
    if let Some(v) = value {
        query.push((name, v.to_string()));
    }
}

fn location_param(p: LatLng) -> String {
    format!("{},{}", p.lat, p.lng)
}

pub fn nearby_query(params: &LegacyNearbyParams) -> Query {
    let mut q = vec![
        ("location", location_param(params.location)),
        ("radius", format!("{:.0}", params.radius_m)),
    ];
    push_opt(&mut q, "keyword", params.keyword.as_ref());
    push_opt(&mut q, "type", params.place_type.as_ref());
    if params.open_now {
        q.push(("opennow", "true".to_string()));
    }
    push_opt(&mut q, "pagetoken", params.page_token.as_ref());
    push_opt(&mut q, "language", params.language.as_ref());
    q
}

pub fn text_query(params: &LegacyTextParams) -> Query {
    let mut q = vec![("query", params.query.clone())];
    push_opt(&mut q, "location", params.location.map(location_param));
    push_opt(&mut q, "radius", params.radius_m.map(|r| format!("{:.0}", r)));
    push_opt(&mut q, "type", params.place_type.as_ref());
    if params.open_now {
        q.push(("opennow", "true".to_string()));
    }
    push_opt(&mut q, "pagetoken", params.page_token.as_ref());
    push_opt(&mut q, "language", params.language.as_ref());
    q
}

pub fn autocomplete_query(params: &LegacyAutocompleteParams) -> Query {
    let mut q = vec![("input", params.input.clone())];
    push_opt(&mut q, "location", params.location.map(location_param));
    push_opt(&mut q, "radius", params.radius_m.map(|r| format!("{:.0}", r)));
    push_opt(&mut q, "sessiontoken", params.session_token.as_ref());
    if !params.types.is_empty() {
        q.push(("types", params.types.join("|")));
    }
    push_opt(&mut q, "components", params.country.as_ref().map(|c| format!("country:{}", c.to_lowercase())));
    push_opt(&mut q, "language", params.language.as_ref());
    q
}

pub fn details_query(params: &LegacyDetailsParams) -> Query {
    let mut q = vec![("place_id", params.place_id.clone())];
    if !params.fields.is_empty() {
        q.push(("fields", params.fields.join(",")));
    }
    push_opt(&mut q, "language", params.language.as_ref());
    q
}

struct LegacyClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl LegacyClient {
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, mut query: Query) -> Result<T> {
        let key = self.api_key.clone().ok_or(PlacesError::MissingCredentials)?;
        query.push(("key", key));

        let url = format!("{}/{}/json", self.base_url, endpoint);
        let response = self.client.get(url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlacesError::Network(format!("{} returned HTTP {}", endpoint, status.as_u16())));
        }
        Ok(response.json::<T>().await?)
    }
}

/// Callback-style transport: each call spawns a task on the ambient runtime and
/// reports through the callback when the response is in.
pub struct HttpLegacyTransport {
    inner: Arc<LegacyClient>,
}

impl HttpLegacyTransport {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let inner = LegacyClient {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        };
        Ok(Self { inner: Arc::new(inner) })
    }

    pub fn from_config(config: &PlacesConfig) -> Result<Self> {
        Self::new(&config.legacy_base_url, config.api_key().map(str::to_string), config.request_timeout())
    }

    fn dispatch<T>(&self, endpoint: &'static str, query: Query, callback: LegacyCallback<T>)
    where
        T: DeserializeOwned + Send + 'static,
    {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                callback(Err(PlacesError::Network(format!("No async runtime for {}: {}", endpoint, e))));
                return;
            }
        };
        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            tracing::trace!("[Legacy] GET {}", endpoint);
            callback(inner.get::<T>(endpoint, query).await);
        });
    }
}

impl LegacyTransport for HttpLegacyTransport {
    fn is_available(&self) -> bool {
        self.inner.api_key.is_some()
    }

    fn nearby_search(&self, params: LegacyNearbyParams, callback: LegacyCallback<LegacySearchEnvelope>) {
        self.dispatch("nearbysearch", nearby_query(&params), callback);
    }

    fn text_search(&self, params: LegacyTextParams, callback: LegacyCallback<LegacySearchEnvelope>) {
        self.dispatch("textsearch", text_query(&params), callback);
    }

    fn autocomplete(&self, params: LegacyAutocompleteParams, callback: LegacyCallback<LegacyAutocompleteEnvelope>) {
        self.dispatch("autocomplete", autocomplete_query(&params), callback);
    }

    fn details(&self, params: LegacyDetailsParams, callback: LegacyCallback<LegacyDetailsEnvelope>) {
        self.dispatch("details", details_query(&params), callback);
    }
}
