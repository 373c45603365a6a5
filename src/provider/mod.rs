// FILE: src/provider/mod.rs
//! Upstream place providers.
//!
//! Two interchangeable adapters sit behind [`PlacesProvider`]: the unified
//! search API ([`current::CurrentAdapter`]) and the callback-style legacy API
//! ([`legacy::LegacyAdapter`]). [`ProviderSelector`] picks one per call.

pub mod current;
pub mod http;
pub mod legacy;
pub mod shapes;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use crate::core::metrics::Metrics;
use crate::error::{PlacesError, Result};
use crate::model::{AutocompleteRequest, DetailsRequest, NearbySearchOptions, OperationKind, PlaceRecord, Prediction, TextSearchOptions};

/// One page of normalized places.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderPage {
    pub places: Vec<PlaceRecord>,
    pub next_page_token: Option<String>,
}

impl ProviderPage {
    pub fn has_more(&self) -> bool {
        self.next_page_token.is_some()
    }
}

/// Adapter contract. Implementations must check `cancel` before dispatching
/// and again once the response arrives, returning `Cancelled` if it fired.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runtime capability check, asked before every call.
    fn is_available(&self) -> bool {
        true
    }

    async fn search_nearby(&self, options: &NearbySearchOptions, cancel: &CancellationToken) -> Result<ProviderPage>;

    async fn search_text(&self, options: &TextSearchOptions, cancel: &CancellationToken) -> Result<ProviderPage>;

    async fn autocomplete(&self, request: &AutocompleteRequest, cancel: &CancellationToken) -> Result<Vec<Prediction>>;

    async fn details(&self, request: &DetailsRequest, cancel: &CancellationToken) -> Result<PlaceRecord>;
}

/// Shared search-area knobs for both adapters.
#[derive(Debug, Clone, Copy)]
pub struct AreaPolicy {
    pub default_radius_m: f64,
    pub max_radius_m: f64,
}

impl Default for AreaPolicy {
    fn default() -> Self {
        Self { default_radius_m: 5_000.0, max_radius_m: 50_000.0 }
    }
}

impl AreaPolicy {
    /// Fixed radius if given, else half the viewport diagonal, else the default; capped.
    pub fn radius_for(&self, options: &NearbySearchOptions) -> f64 {
        let radius = options.radius_m
            .or_else(|| options.viewport.map(|v| v.diagonal_meters() / 2.0))
            .unwrap_or(self.default_radius_m);
        radius.max(1.0).min(self.max_radius_m)
    }
}

/// Bails with `Cancelled` when the token has fired.
pub(crate) fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(PlacesError::Cancelled)
    } else {
        Ok(())
    }
}

/// Strategy over the two adapters. The current adapter wins whenever it reports
/// itself available at call time; otherwise the legacy adapter serves the call.
pub struct ProviderSelector {
    current: Option<Arc<dyn PlacesProvider>>,
    legacy: Option<Arc<dyn PlacesProvider>>,
    metrics: Arc<Metrics>,
    quota_retry_delay: Duration,
}

impl ProviderSelector {
    pub fn new(
        current: Option<Arc<dyn PlacesProvider>>,
        legacy: Option<Arc<dyn PlacesProvider>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let names: Vec<&str> = current.iter().chain(legacy.iter()).map(|p| p.name()).collect();
        tracing::info!("[Providers] Configured: {:?}", names);
        Self {
            current,
            legacy,
            metrics,
            quota_retry_delay: Duration::from_millis(1500),
        }
    }

    pub fn with_quota_retry_delay(mut self, delay: Duration) -> Self {
        self.quota_retry_delay = delay;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn select(&self) -> Result<&Arc<dyn PlacesProvider>> {
        if let Some(current) = self.current.as_ref().filter(|p| p.is_available()) {
            return Ok(current);
        }
        match self.legacy.as_ref().filter(|p| p.is_available()) {
            Some(legacy) => {
                if self.current.is_some() {
                    tracing::debug!("[Providers] Current API unavailable, using {}", legacy.name());
                }
                Ok(legacy)
            }
            None => Err(PlacesError::MissingCredentials),
        }
    }

    pub async fn search_nearby(&self, options: &NearbySearchOptions, cancel: &CancellationToken) -> Result<ProviderPage> {
        let provider = self.select()?;
        self.metrics.record_upstream_call(OperationKind::NearbySearch);
        provider.search_nearby(options, cancel).await
    }

    /// Text search retries exactly once, after a fixed delay, on `QuotaExceeded`.
    pub async fn search_text(&self, options: &TextSearchOptions, cancel: &CancellationToken) -> Result<ProviderPage> {
        let provider = self.select()?;
        self.metrics.record_upstream_call(OperationKind::TextSearch);

        match provider.search_text(options, cancel).await {
            Err(PlacesError::QuotaExceeded(message)) => {
                tracing::warn!("[Providers] Text search hit quota ({}), retrying once in {:?}", message, self.quota_retry_delay);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PlacesError::Cancelled),
                    _ = tokio::time::sleep(self.quota_retry_delay) => {}
                }
                let provider = self.select()?;
                self.metrics.record_upstream_call(OperationKind::TextSearch);
                provider.search_text(options, cancel).await
            }
            other => other,
        }
    }

    pub async fn autocomplete(&self, request: &AutocompleteRequest, cancel: &CancellationToken) -> Result<Vec<Prediction>> {
        let provider = self.select()?;
        self.metrics.record_upstream_call(OperationKind::Autocomplete);
        provider.autocomplete(request, cancel).await
    }

    pub async fn details(&self, request: &DetailsRequest, cancel: &CancellationToken) -> Result<PlaceRecord> {
        let provider = self.select()?;
        self.metrics.record_upstream_call(OperationKind::Details);
        provider.details(request, cancel).await
    }
}
