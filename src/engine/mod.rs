// FILE: src/engine/mod.rs
//! The orchestrator: the only surface the UI layer talks to.
//!
//! Nearby search, autocomplete and details run through their own
//! [`Debouncer`], so a newer call of the same kind supersedes the older one.
//! Text search is not debounced but is cached by query fingerprint. Nearby
//! results are never cached; the viewport moves too fast for it to pay off.

pub mod debounce;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use crate::config::{PlacesConfig, ProviderMode};
use crate::core::bouncer::Bouncer;
use crate::core::cache::CacheStats;
use crate::core::cache_key::{details_key, text_search_key};
use crate::core::metrics::{Metrics, MetricsSnapshot};
use crate::error::{PlacesError, Result};
use crate::model::{
    AutocompleteOptions, AutocompleteRequest, DetailsRequest, NearbySearchOptions, OperationKind,
    PlaceRecord, Prediction, SearchResult, SourceQuery, TextSearchOptions,
};
use crate::provider::current::CurrentAdapter;
use crate::provider::http::{HttpCurrentTransport, HttpLegacyTransport};
use crate::provider::legacy::LegacyAdapter;
use crate::provider::{ensure_live, AreaPolicy, PlacesProvider, ProviderPage, ProviderSelector};
use crate::state::{ServiceState, SharedState};
use self::debounce::Debouncer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineCacheStats {
    pub search: CacheStats,
    pub details: CacheStats,
}

pub struct PlacesEngine {
    state: SharedState,
    providers: Arc<ProviderSelector>,
    bouncer: Bouncer,
    region: Option<String>,
    search_ttl: Duration,
    details_ttl: Duration,
    nearby: Debouncer<NearbySearchOptions, SearchResult>,
    autocomplete: Debouncer<AutocompleteRequest, Vec<Prediction>>,
    details: Debouncer<DetailsRequest, PlaceRecord>,
    /// Parent of every in-flight text search token; replaced on `cancel_all`.
    text_cancel: Mutex<CancellationToken>,
}

impl PlacesEngine {
    pub fn new(config: &PlacesConfig, providers: ProviderSelector) -> Self {
        let state: SharedState = Arc::new(ServiceState::with_metrics(config, Arc::clone(providers.metrics())));
        let providers = Arc::new(providers);
        let details_ttl = config.details_cache_ttl();

        let nearby = {
            let (state, providers) = (Arc::clone(&state), Arc::clone(&providers));
            Debouncer::new(OperationKind::NearbySearch, config.nearby_debounce(), move |options, cancel| {
                run_nearby(Arc::clone(&state), Arc::clone(&providers), options, cancel)
            })
        };

        let autocomplete = {
            let (state, providers) = (Arc::clone(&state), Arc::clone(&providers));
            Debouncer::new(OperationKind::Autocomplete, config.autocomplete_debounce(), move |request, cancel| {
                run_autocomplete(Arc::clone(&state), Arc::clone(&providers), request, cancel)
            })
        };

        // Zero delay: consecutive lookups only supersede each other.
        let details = {
            let (state, providers) = (Arc::clone(&state), Arc::clone(&providers));
            Debouncer::new(OperationKind::Details, Duration::ZERO, move |request, cancel| {
                run_details(Arc::clone(&state), Arc::clone(&providers), details_ttl, request, cancel)
            })
        };

        tracing::info!("[Engine] Ready (nearby debounce {:?}, autocomplete debounce {:?})",
            config.nearby_debounce(), config.autocomplete_debounce());

        Self {
            state,
            providers,
            bouncer: Bouncer::new(config.autocomplete_min_chars),
            region: config.region.clone(),
            search_ttl: config.search_cache_ttl(),
            details_ttl,
            nearby,
            autocomplete,
            details,
            text_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Wires the HTTP adapters allowed by `config.provider`.
    pub fn from_config(config: &PlacesConfig) -> Result<Self> {
        config.validate().map_err(|e| PlacesError::InvalidRequest(format!("Invalid configuration: {}", e)))?;
        let area = AreaPolicy { default_radius_m: config.default_radius_m, max_radius_m: config.max_radius_m };

        let current: Option<Arc<dyn PlacesProvider>> = match config.provider {
            ProviderMode::Auto | ProviderMode::Current => {
                let adapter = CurrentAdapter::new(HttpCurrentTransport::from_config(config)?)
                    .with_area(area)
                    .with_language(config.language.clone());
                Some(Arc::new(adapter))
            }
            ProviderMode::Legacy => None,
        };

        let legacy: Option<Arc<dyn PlacesProvider>> = match config.provider {
            ProviderMode::Auto | ProviderMode::Legacy => {
                let adapter = LegacyAdapter::new(HttpLegacyTransport::from_config(config)?)
                    .with_area(area)
                    .with_language(config.language.clone());
                Some(Arc::new(adapter))
            }
            ProviderMode::Current => None,
        };

        if config.api_key().is_none() {
            tracing::warn!("[Engine] No API key configured; every call will fail with MissingCredentials");
        }

        let metrics = Arc::new(Metrics::new(config.metrics_window));
        let selector = ProviderSelector::new(current, legacy, metrics)
            .with_quota_retry_delay(config.quota_retry_delay());
        Ok(Self::new(config, selector))
    }

    /// Free text with `use_text_search` goes through the (cached) text path;
    /// everything else is a debounced, uncached nearby search.
    pub async fn search_nearby(&self, options: NearbySearchOptions) -> Result<SearchResult> {
        let has_text = options.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if options.use_text_search && has_text {
            tracing::debug!("[Engine] Nearby request carries text, delegating to text search");
            return self.search_text(options.to_text_options()).await;
        }
        self.nearby.execute(options).await
    }

    pub async fn search_text(&self, options: TextSearchOptions) -> Result<SearchResult> {
        let started = Instant::now();
        if options.query.trim().is_empty() {
            return Err(PlacesError::InvalidRequest("Text search needs a query".into()));
        }

        // Continuation pages are one-shot; never serve or store them from the cache.
        let cacheable = options.use_cache && options.page_token.is_none();
        let key = text_search_key(&options);

        if cacheable {
            if let Some(cached) = self.state.search_cache.get(&key) {
                self.state.metrics.record_cache_hit(OperationKind::TextSearch);
                let origin = cached.request_id.clone();
                let request_id = self.state.next_request_id();
                tracing::debug!("[Engine] Text search '{}' served from cache ({} -> {})", options.query, origin, request_id);
                return Ok(SearchResult {
                    request_id,
                    elapsed_ms: elapsed_ms(started),
                    cache_hit: true,
                    origin_request_id: Some(origin),
                    ..cached
                });
            }
        }

        let cancel = self.text_token();
        let request_id = self.state.next_request_id();
        let outcome = settle(OperationKind::TextSearch, self.providers.search_text(&options, &cancel).await);
        ensure_live(&cancel)?;
        observe(&self.state.metrics, OperationKind::TextSearch, started, &outcome);
        let page = outcome?;

        let result = into_result(page, request_id, started, SourceQuery::Text(options));
        if cacheable {
            self.state.search_cache.set(key, result.clone(), self.search_ttl);
        }
        Ok(result)
    }

    /// Noise input (too short, punctuation only) resolves to no predictions
    /// without touching the network, and supersedes any pending lookup.
    pub async fn autocomplete(&self, input: &str, options: AutocompleteOptions) -> Result<Vec<Prediction>> {
        if self.bouncer.is_noise(input) {
            tracing::trace!("[Engine] Autocomplete input {:?} is noise", input);
            self.autocomplete.cancel();
            return Ok(Vec::new());
        }

        let mut options = options;
        if options.region.is_none() {
            options.region = self.region.clone();
        }
        let request = AutocompleteRequest { input: input.trim().to_string(), options };
        self.autocomplete.execute(request).await
    }

    pub async fn details(&self, place_id: &str, fields: &[String]) -> Result<PlaceRecord> {
        let place_id = place_id.trim();
        if place_id.is_empty() {
            return Err(PlacesError::InvalidRequest("Details needs a place id".into()));
        }

        let request = DetailsRequest { place_id: place_id.to_string(), fields: fields.to_vec() };
        if let Some(place) = self.state.details_cache.get(&details_key(&request)) {
            self.state.metrics.record_cache_hit(OperationKind::Details);
            return Ok(place);
        }
        self.details.execute(request).await
    }

    /// Rejects every pending or in-flight call with `Cancelled`.
    pub fn cancel_all(&self) {
        self.nearby.cancel();
        self.autocomplete.cancel();
        self.details.cancel();
        let previous = std::mem::replace(&mut *self.lock_text_cancel(), CancellationToken::new());
        previous.cancel();
        tracing::debug!("[Engine] Cancelled all in-flight requests");
    }

    pub fn clear_cache(&self) {
        self.state.search_cache.clear();
        self.state.details_cache.clear();
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.state.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.state.metrics.reset();
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            search: self.state.search_cache.stats(),
            details: self.state.details_cache.stats(),
        }
    }

    pub fn details_ttl(&self) -> Duration {
        self.details_ttl
    }

    fn lock_text_cancel(&self) -> MutexGuard<'_, CancellationToken> {
        self.text_cancel.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn text_token(&self) -> CancellationToken {
        self.lock_text_cancel().child_token()
    }
}

impl Drop for PlacesEngine {
    fn drop(&mut self) {
        self.lock_text_cancel().cancel();
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// `ZeroResults` is a successful empty page, not a failure.
fn settle(operation: OperationKind, outcome: Result<ProviderPage>) -> Result<ProviderPage> {
    match outcome {
        Err(PlacesError::ZeroResults) => {
            tracing::debug!("[Engine] {} returned zero results", operation);
            Ok(ProviderPage::default())
        }
        other => other,
    }
}

/// Feeds the accumulator. Cancelled calls are not samples.
fn observe<T>(metrics: &Metrics, operation: OperationKind, started: Instant, outcome: &Result<T>) {
    match outcome {
        Ok(_) => metrics.record(operation, started.elapsed(), true),
        Err(e) if e.is_cancelled() => {}
        Err(e) => {
            tracing::warn!("[Engine] {} failed ({:?}): {}", operation, e.kind(), e);
            metrics.record(operation, started.elapsed(), false);
        }
    }
}

fn into_result(page: ProviderPage, request_id: String, started: Instant, source_query: SourceQuery) -> SearchResult {
    SearchResult {
        has_more: page.has_more(),
        next_page_token: page.next_page_token,
        items: page.places,
        request_id,
        elapsed_ms: elapsed_ms(started),
        source_query,
        cache_hit: false,
        origin_request_id: None,
    }
}

async fn run_nearby(
    state: SharedState,
    providers: Arc<ProviderSelector>,
    options: NearbySearchOptions,
    cancel: CancellationToken,
) -> Result<SearchResult> {
    let started = Instant::now();
    let request_id = state.next_request_id();
    let outcome = settle(OperationKind::NearbySearch, providers.search_nearby(&options, &cancel).await);
    ensure_live(&cancel)?;
    observe(&state.metrics, OperationKind::NearbySearch, started, &outcome);
    Ok(into_result(outcome?, request_id, started, SourceQuery::Nearby(options)))
}

async fn run_autocomplete(
    state: SharedState,
    providers: Arc<ProviderSelector>,
    request: AutocompleteRequest,
    cancel: CancellationToken,
) -> Result<Vec<Prediction>> {
    let started = Instant::now();
    let outcome = match providers.autocomplete(&request, &cancel).await {
        Err(PlacesError::ZeroResults) => Ok(Vec::new()),
        other => other,
    };
    ensure_live(&cancel)?;
    observe(&state.metrics, OperationKind::Autocomplete, started, &outcome);
    outcome
}

async fn run_details(
    state: SharedState,
    providers: Arc<ProviderSelector>,
    ttl: Duration,
    request: DetailsRequest,
    cancel: CancellationToken,
) -> Result<PlaceRecord> {
    let started = Instant::now();
    // A single place has no empty representation.
    let outcome = match providers.details(&request, &cancel).await {
        Err(PlacesError::ZeroResults) => Err(PlacesError::InvalidRequest(format!("Place not found {}", request.place_id))),
        other => other,
    };
    ensure_live(&cancel)?;
    observe(&state.metrics, OperationKind::Details, started, &outcome);

    let place = outcome?;
    state.details_cache.set(details_key(&request), place.clone(), ttl);
    Ok(place)
}
