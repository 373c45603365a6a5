// FILE: src/provider/legacy.rs
//! Legacy adapter: callback-style transport bridged into futures.
//!
//! The transport hands its reply to a callback; we park a `oneshot` sender in
//! that callback and await the receiver. Status codes are translated into the
//! canonical error taxonomy here and nowhere else.

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use crate::error::{PlacesError, Result};
use crate::model::{AutocompleteRequest, DetailsRequest, LatLng, NearbySearchOptions, PlaceRecord, Prediction, TextSearchOptions};
use super::shapes::{LegacyAutocompleteEnvelope, LegacyDetailsEnvelope, LegacySearchEnvelope, LegacyStatus};
use super::{ensure_live, AreaPolicy, PlacesProvider, ProviderPage};

/// Receives the transport's reply exactly once. Transport-level failures
/// (connection, timeout) arrive as `Err`; provider statuses live in the envelope.
pub type LegacyCallback<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyNearbyParams {
    pub location: LatLng,
    pub radius_m: f64,
    pub keyword: Option<String>,
    pub place_type: Option<String>,
    pub open_now: bool,
    pub page_token: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyTextParams {
    pub query: String,
    pub location: Option<LatLng>,
    pub radius_m: Option<f64>,
    pub place_type: Option<String>,
    pub open_now: bool,
    pub page_token: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyAutocompleteParams {
    pub input: String,
    pub location: Option<LatLng>,
    pub radius_m: Option<f64>,
    pub session_token: Option<String>,
    pub types: Vec<String>,
    pub country: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyDetailsParams {
    pub place_id: String,
    pub fields: Vec<String>,
    pub language: Option<String>,
}

pub trait LegacyTransport: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn nearby_search(&self, params: LegacyNearbyParams, callback: LegacyCallback<LegacySearchEnvelope>);

    fn text_search(&self, params: LegacyTextParams, callback: LegacyCallback<LegacySearchEnvelope>);

    fn autocomplete(&self, params: LegacyAutocompleteParams, callback: LegacyCallback<LegacyAutocompleteEnvelope>);

    fn details(&self, params: LegacyDetailsParams, callback: LegacyCallback<LegacyDetailsEnvelope>);
}

/// Maps a legacy status onto the canonical taxonomy. `None` means success.
pub fn status_error(status: LegacyStatus, message: Option<String>) -> Option<PlacesError> {
    let message = message.unwrap_or_default();
    let lower = message.to_lowercase();

    match status {
        LegacyStatus::Ok => None,
        LegacyStatus::ZeroResults => Some(PlacesError::ZeroResults),
        LegacyStatus::OverQueryLimit if lower.contains("billing") => Some(PlacesError::BillingDisabled(message)),
        LegacyStatus::OverQueryLimit => Some(PlacesError::QuotaExceeded(message)),
        LegacyStatus::RequestDenied => Some(if lower.contains("billing") {
            PlacesError::BillingDisabled(message)
        } else if lower.contains("must use an api key") || lower.contains("missing the api key") {
            PlacesError::MissingCredentials
        } else if lower.contains("invalid") && lower.contains("key") {
            PlacesError::InvalidCredentials(message)
        } else {
            PlacesError::RequestDenied(message)
        }),
        LegacyStatus::InvalidRequest => Some(PlacesError::InvalidRequest(message)),
        LegacyStatus::NotFound => Some(PlacesError::InvalidRequest(format!("Place not found {}", message).trim().to_string())),
        LegacyStatus::UnknownError => Some(PlacesError::Unknown(anyhow::anyhow!("Provider reported UNKNOWN_ERROR {}", message))),
        LegacyStatus::Unrecognized => Some(PlacesError::Unknown(anyhow::anyhow!("Unrecognized provider status {}", message))),
    }
}

/// Dispatches through `register` and waits for the callback, honoring `cancel`
/// before dispatch, while waiting, and after the reply arrives.
async fn invoke<T, F>(cancel: &CancellationToken, register: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(LegacyCallback<T>) + Send,
{
    ensure_live(cancel)?;

    let (tx, rx) = oneshot::channel();
    register(Box::new(move |reply| {
        let _ = tx.send(reply);
    }));

    let reply = tokio::select! {
        _ = cancel.cancelled() => return Err(PlacesError::Cancelled),
        reply = rx => reply.map_err(|_| PlacesError::Network("Legacy transport dropped the callback".into()))?,
    };

    ensure_live(cancel)?;
    reply
}

pub struct LegacyAdapter<T> {
    transport: T,
    area: AreaPolicy,
    language: Option<String>,
}

impl<T: LegacyTransport> LegacyAdapter<T> {
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

    fn into_page(envelope: LegacySearchEnvelope, max_results: usize) -> Result<ProviderPage> {
        if let Some(err) = status_error(envelope.status, envelope.error_message) {
            return Err(err);
        }
        let mut places: Vec<PlaceRecord> = envelope.results.into_iter().map(PlaceRecord::from).collect();
        places.truncate(max_results);
        Ok(ProviderPage { places, next_page_token: envelope.next_page_token })
    }
}

#[async_trait]
impl<T: LegacyTransport> PlacesProvider for LegacyAdapter<T> {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn is_available(&self) -> bool {
        self.transport.is_available()
    }

    async fn search_nearby(&self, options: &NearbySearchOptions, cancel: &CancellationToken) -> Result<ProviderPage> {
        let params = LegacyNearbyParams {
            location: options.search_center(),
            radius_m: self.area.radius_for(options),
            keyword: options.keyword.clone().filter(|k| !k.trim().is_empty()),
            place_type: options.category.clone(),
            open_now: options.open_now,
            page_token: options.page_token.clone(),
            language: self.language.clone(),
        };
        tracing::debug!("[Legacy] nearby_search at {:?} r={:.0}m", params.location, params.radius_m);

        let envelope = invoke(cancel, |cb| self.transport.nearby_search(params, cb)).await?;
        let mut page = Self::into_page(envelope, usize::MAX)?;

        // The circle covers the viewport's corners; trim back to the visible box.
        if let (true, Some(viewport)) = (options.restrict_to_viewport, options.viewport) {
            page.places.retain(|p| viewport.contains(&p.location));
        }
        page.places.truncate(options.max_results);
        Ok(page)
    }

    async fn search_text(&self, options: &TextSearchOptions, cancel: &CancellationToken) -> Result<ProviderPage> {
        let location = options.location.or_else(|| options.viewport.map(|v| v.center()));
        let radius_m = options.radius_m
            .or_else(|| options.viewport.map(|v| v.diagonal_meters() / 2.0))
            .map(|r| r.min(self.area.max_radius_m));

        let params = LegacyTextParams {
            query: options.query.clone(),
            location,
            radius_m,
            place_type: options.category.clone(),
            open_now: options.open_now,
            page_token: options.page_token.clone(),
            language: self.language.clone(),
        };
        tracing::debug!("[Legacy] text_search '{}'", params.query);

        let envelope = invoke(cancel, |cb| self.transport.text_search(params, cb)).await?;
        let mut page = Self::into_page(envelope, usize::MAX)?;

        // Text search has no keyword parameter upstream.
        if let Some(keyword) = options.keyword.as_deref() {
            page.places.retain(|p| p.matches_keyword(keyword));
        }
        if let (true, Some(viewport)) = (options.restrict_to_viewport, options.viewport) {
            page.places.retain(|p| viewport.contains(&p.location));
        }
        page.places.truncate(options.max_results);
        Ok(page)
    }

    async fn autocomplete(&self, request: &AutocompleteRequest, cancel: &CancellationToken) -> Result<Vec<Prediction>> {
        let bias = request.options.bias;
        let params = LegacyAutocompleteParams {
            input: request.input.clone(),
            location: bias.map(|b| b.center()),
            radius_m: bias.map(|b| (b.diagonal_meters() / 2.0).min(self.area.max_radius_m)),
            session_token: request.options.session_token.clone(),
            types: request.options.types.clone(),
            country: request.options.region.clone(),
            language: self.language.clone(),
        };

        let envelope = invoke(cancel, |cb| self.transport.autocomplete(params, cb)).await?;
        if let Some(err) = status_error(envelope.status, envelope.error_message) {
            return Err(err);
        }
        Ok(envelope.predictions.into_iter().map(Prediction::from).collect())
    }

    async fn details(&self, request: &DetailsRequest, cancel: &CancellationToken) -> Result<PlaceRecord> {
        let params = LegacyDetailsParams {
            place_id: request.place_id.clone(),
            fields: request.fields.clone(),
            language: self.language.clone(),
        };

        let envelope = invoke(cancel, |cb| self.transport.details(params, cb)).await?;
        if let Some(err) = status_error(envelope.status, envelope.error_message) {
            return Err(err);
        }
        envelope.result
            .map(PlaceRecord::from)
            .ok_or_else(|| PlacesError::InvalidRequest(format!("No details returned for {}", request.place_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use crate::model::{AutocompleteOptions, BoundingBox};

    #[derive(Clone, Copy, PartialEq)]
    enum Delivery {
        Inline,
        Spawned(Duration),
        Dropped,
    }

    /// Replies with canned JSON, either inline, from a spawned task, or never.
    struct CannedTransport {
        search_json: String,
        delivery: Delivery,
        calls: AtomicUsize,
        last_nearby: Mutex<Option<LegacyNearbyParams>>,
        last_text: Mutex<Option<LegacyTextParams>>,
    }

    impl CannedTransport {
        fn new(search_json: &str, delivery: Delivery) -> Self {
            Self {
                search_json: search_json.to_string(),
                delivery,
                calls: AtomicUsize::new(0),
                last_nearby: Mutex::new(None),
                last_text: Mutex::new(None),
            }
        }

        fn reply<E: serde::de::DeserializeOwned + Send + 'static>(&self, json: &str, callback: LegacyCallback<E>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let parsed = serde_json::from_str::<E>(json).map_err(PlacesError::from);
            match self.delivery {
                Delivery::Inline => callback(parsed),
                Delivery::Spawned(delay) => {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        callback(parsed);
                    });
                }
                Delivery::Dropped => drop(callback),
            }
        }
    }

    impl LegacyTransport for CannedTransport {
        fn nearby_search(&self, params: LegacyNearbyParams, callback: LegacyCallback<LegacySearchEnvelope>) {
            *self.last_nearby.lock().unwrap() = Some(params);
            self.reply(&self.search_json, callback);
        }

        fn text_search(&self, params: LegacyTextParams, callback: LegacyCallback<LegacySearchEnvelope>) {
            *self.last_text.lock().unwrap() = Some(params);
            self.reply(&self.search_json, callback);
        }

        fn autocomplete(&self, _params: LegacyAutocompleteParams, callback: LegacyCallback<LegacyAutocompleteEnvelope>) {
            self.reply(r#"{ "status": "OK", "predictions": [{ "place_id": "p1", "description": "Tokyo Tower" }] }"#, callback);
        }

        fn details(&self, _params: LegacyDetailsParams, callback: LegacyCallback<LegacyDetailsEnvelope>) {
            self.reply(r#"{ "status": "NOT_FOUND" }"#, callback);
        }
    }

    const TWO_PLACES: &str = r#"{
        "status": "OK",
        "next_page_token": "page-2",
        "results": [
            { "place_id": "in", "name": "Inside", "geometry": { "location": { "lat": 35.66, "lng": 139.70 } } },
            { "place_id": "out", "name": "Outside", "geometry": { "location": { "lat": 35.90, "lng": 139.70 } } }
        ]
    }"#;

    fn tokyo_options() -> NearbySearchOptions {
        NearbySearchOptions {
            viewport: Some(BoundingBox::new(35.60, 139.65, 35.70, 139.75)),
            category: Some("cafe".into()),
            keyword: Some("  ".into()),
            ..NearbySearchOptions::around(LatLng::new(35.65, 139.70))
        }
    }

    #[tokio::test]
    async fn test_nearby_keeps_continuation_token() {
        let adapter = LegacyAdapter::new(CannedTransport::new(TWO_PLACES, Delivery::Inline));
        let page = adapter.search_nearby(&tokyo_options(), &CancellationToken::new()).await.unwrap();
        assert_eq!(page.places.len(), 2);
        assert!(page.has_more());
        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));

        let params = adapter.transport().last_nearby.lock().unwrap().clone().unwrap();
        assert_eq!(params.place_type.as_deref(), Some("cafe"));
        assert_eq!(params.keyword, None);
        assert!((params.location.lat - 35.65).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nearby_restricted_to_viewport() {
        let adapter = LegacyAdapter::new(CannedTransport::new(TWO_PLACES, Delivery::Inline));
        let mut options = tokyo_options();
        options.restrict_to_viewport = true;
        let page = adapter.search_nearby(&options, &CancellationToken::new()).await.unwrap();
        assert_eq!(page.places.len(), 1);
        assert_eq!(page.places[0].id, "in");
    }

    #[tokio::test]
    async fn test_text_search_applies_filters() {
        let adapter = LegacyAdapter::new(CannedTransport::new(TWO_PLACES, Delivery::Inline));
        let options = TextSearchOptions {
            viewport: Some(BoundingBox::new(35.60, 139.65, 35.70, 139.75)),
            category: Some("cafe".into()),
            restrict_to_viewport: true,
            ..TextSearchOptions::new("coffee")
        };
        let page = adapter.search_text(&options, &CancellationToken::new()).await.unwrap();
        assert_eq!(page.places.len(), 1);
        assert_eq!(page.places[0].id, "in");

        let params = adapter.transport().last_text.lock().unwrap().clone().unwrap();
        assert_eq!(params.place_type.as_deref(), Some("cafe"));

        let options = TextSearchOptions { keyword: Some("outside".into()), ..TextSearchOptions::new("coffee") };
        let page = adapter.search_text(&options, &CancellationToken::new()).await.unwrap();
        assert_eq!(page.places.len(), 1);
        assert_eq!(page.places[0].id, "out");
    }

    #[tokio::test]
    async fn test_zero_results_status() {
        let adapter = LegacyAdapter::new(CannedTransport::new(r#"{ "status": "ZERO_RESULTS", "results": [] }"#, Delivery::Inline));
        let result = adapter.search_text(&TextSearchOptions::new("zzzzzznoresults"), &CancellationToken::new()).await;
        assert!(matches!(result, Err(PlacesError::ZeroResults)));
    }

    #[tokio::test]
    async fn test_quota_status() {
        let adapter = LegacyAdapter::new(CannedTransport::new(r#"{ "status": "OVER_QUERY_LIMIT", "error_message": "You have exceeded your rate-limit" }"#, Delivery::Inline));
        let result = adapter.search_text(&TextSearchOptions::new("coffee"), &CancellationToken::new()).await;
        assert!(matches!(result, Err(PlacesError::QuotaExceeded(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_callback_delivery() {
        let adapter = LegacyAdapter::new(CannedTransport::new(TWO_PLACES, Delivery::Spawned(Duration::from_millis(250))));
        let mut options = TextSearchOptions::new("coffee");
        options.max_results = 1;
        let page = adapter.search_text(&options, &CancellationToken::new()).await.unwrap();
        assert_eq!(page.places.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_callback_is_network_error() {
        let adapter = LegacyAdapter::new(CannedTransport::new(TWO_PLACES, Delivery::Dropped));
        let result = adapter.search_text(&TextSearchOptions::new("coffee"), &CancellationToken::new()).await;
        assert!(matches!(result, Err(PlacesError::Network(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let adapter = LegacyAdapter::new(CannedTransport::new(TWO_PLACES, Delivery::Inline));
        let token = CancellationToken::new();
        token.cancel();
        let result = adapter.search_nearby(&tokyo_options(), &token).await;
        assert!(matches!(result, Err(PlacesError::Cancelled)));
        assert_eq!(adapter.transport().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_cancellation_is_discarded() {
        let adapter = Arc::new(LegacyAdapter::new(CannedTransport::new(TWO_PLACES, Delivery::Spawned(Duration::from_secs(2)))));
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let result = adapter.search_nearby(&tokyo_options(), &token).await;
        assert!(matches!(result, Err(PlacesError::Cancelled)));
        assert_eq!(adapter.transport().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_autocomplete_and_details() {
        let adapter = LegacyAdapter::new(CannedTransport::new(TWO_PLACES, Delivery::Inline));
        let request = AutocompleteRequest { input: "tokyo to".into(), options: AutocompleteOptions::default() };
        let predictions = adapter.autocomplete(&request, &CancellationToken::new()).await.unwrap();
        assert_eq!(predictions[0].description, "Tokyo Tower");

        let details = DetailsRequest { place_id: "gone".into(), fields: vec![] };
        let result = adapter.details(&details, &CancellationToken::new()).await;
        assert!(matches!(result, Err(PlacesError::InvalidRequest(_))));
    }

    #[test]
    fn test_status_mapping() {
        let msg = |s: &str| Some(s.to_string());
        assert!(status_error(LegacyStatus::Ok, None).is_none());
        assert!(matches!(status_error(LegacyStatus::ZeroResults, None), Some(PlacesError::ZeroResults)));
        assert!(matches!(status_error(LegacyStatus::OverQueryLimit, None), Some(PlacesError::QuotaExceeded(_))));
        assert!(matches!(status_error(LegacyStatus::OverQueryLimit, msg("You must enable Billing on the Google Cloud Project")), Some(PlacesError::BillingDisabled(_))));
        assert!(matches!(status_error(LegacyStatus::RequestDenied, msg("The provided API key is invalid.")), Some(PlacesError::InvalidCredentials(_))));
        assert!(matches!(status_error(LegacyStatus::RequestDenied, msg("You must use an API key to authenticate each request")), Some(PlacesError::MissingCredentials)));
        assert!(matches!(status_error(LegacyStatus::RequestDenied, msg("This IP is not authorized")), Some(PlacesError::RequestDenied(_))));
        assert!(matches!(status_error(LegacyStatus::InvalidRequest, None), Some(PlacesError::InvalidRequest(_))));
        assert!(matches!(status_error(LegacyStatus::NotFound, None), Some(PlacesError::InvalidRequest(_))));
        assert!(matches!(status_error(LegacyStatus::UnknownError, None), Some(PlacesError::Unknown(_))));
        assert!(matches!(status_error(LegacyStatus::Unrecognized, None), Some(PlacesError::Unknown(_))));
    }
}
