// FILE: src/state.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::config::PlacesConfig;
use crate::core::cache::ResultCache;
use crate::core::metrics::Metrics;
use crate::model::{PlaceRecord, SearchResult};

/// State shared by the engine, its debounced operations and the provider selector.
/// Constructed once per engine and handed out by `Arc`; there is no global instance.
pub struct ServiceState {
    /// Text-search results, keyed by query fingerprint
    pub search_cache: ResultCache<SearchResult>,

    /// Place details, keyed by place id + field mask
    pub details_cache: ResultCache<PlaceRecord>,

    pub metrics: Arc<Metrics>,

    request_seq: AtomicU64,
}

pub type SharedState = Arc<ServiceState>;

impl Default for ServiceState {
    fn default() -> Self {
        Self::new(&PlacesConfig::default())
    }
}

impl ServiceState {
    pub fn new(config: &PlacesConfig) -> Self {
        Self::with_metrics(config, Arc::new(Metrics::new(config.metrics_window)))
    }

    /// Shares an existing accumulator, e.g. the one the provider selector counts upstream calls in.
    pub fn with_metrics(config: &PlacesConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            search_cache: ResultCache::with_capacity("search", config.cache_capacity, config.cache_evict_batch),
            details_cache: ResultCache::with_capacity("details", config.cache_capacity, config.cache_evict_batch),
            metrics,
            request_seq: AtomicU64::new(0),
        }
    }

    /// Monotonic, process-unique request id.
    pub fn next_request_id(&self) -> String {
        let n = self.request_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("req-{:06}", n)
    }
}
