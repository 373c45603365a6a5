// FILE: src/provider/testing.rs
//! Scripted provider for engine and selector tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use crate::error::Result;
use crate::model::{AutocompleteRequest, DetailsRequest, LatLng, NearbySearchOptions, PlaceRecord, Prediction, TextSearchOptions};
use super::{ensure_live, PlacesProvider, ProviderPage};

/// Replays queued outcomes per operation; an empty queue yields an empty page.
pub struct ScriptedProvider {
    name: &'static str,
    available: AtomicBool,
    latency: Mutex<Duration>,
    nearby: Mutex<VecDeque<Result<ProviderPage>>>,
    text: Mutex<VecDeque<Result<ProviderPage>>>,
    autocomplete: Mutex<VecDeque<Result<Vec<Prediction>>>>,
    details: Mutex<VecDeque<Result<PlaceRecord>>>,
    nearby_calls: AtomicUsize,
    text_calls: AtomicUsize,
    autocomplete_calls: AtomicUsize,
    details_calls: AtomicUsize,
    last_nearby: Mutex<Option<NearbySearchOptions>>,
    last_input: Mutex<Option<String>>,
}

impl ScriptedProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            available: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
            nearby: Mutex::default(),
            text: Mutex::default(),
            autocomplete: Mutex::default(),
            details: Mutex::default(),
            nearby_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
            autocomplete_calls: AtomicUsize::new(0),
            details_calls: AtomicUsize::new(0),
            last_nearby: Mutex::default(),
            last_input: Mutex::default(),
        }
    }

    pub fn place(name: &str) -> PlaceRecord {
        PlaceRecord {
            id: format!("id-{}", name.to_lowercase().replace(' ', "-")),
            name: name.to_string(),
            location: LatLng::new(40.71, -74.0),
            ..Default::default()
        }
    }

    pub fn page(names: &[&str]) -> ProviderPage {
        ProviderPage {
            places: names.iter().map(|n| Self::place(n)).collect(),
            next_page_token: None,
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn push_nearby(&self, outcome: Result<ProviderPage>) {
        self.nearby.lock().unwrap().push_back(outcome);
    }

    pub fn push_text(&self, outcome: Result<ProviderPage>) {
        self.text.lock().unwrap().push_back(outcome);
    }

    pub fn push_autocomplete(&self, outcome: Result<Vec<Prediction>>) {
        self.autocomplete.lock().unwrap().push_back(outcome);
    }

    pub fn push_details(&self, outcome: Result<PlaceRecord>) {
        self.details.lock().unwrap().push_back(outcome);
    }

    pub fn nearby_calls(&self) -> usize {
        self.nearby_calls.load(Ordering::SeqCst)
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn autocomplete_calls(&self) -> usize {
        self.autocomplete_calls.load(Ordering::SeqCst)
    }

    pub fn details_calls(&self) -> usize {
        self.details_calls.load(Ordering::SeqCst)
    }

    pub fn last_nearby(&self) -> Option<NearbySearchOptions> {
        self.last_nearby.lock().unwrap().clone()
    }

    pub fn last_input(&self) -> Option<String> {
        self.last_input.lock().unwrap().clone()
    }

    async fn respond<T: Default>(&self, queue: &Mutex<VecDeque<Result<T>>>, cancel: &CancellationToken) -> Result<T> {
        ensure_live(cancel)?;
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        ensure_live(cancel)?;
        queue.lock().unwrap().pop_front().unwrap_or_else(|| Ok(T::default()))
    }
}

#[async_trait]
impl PlacesProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn search_nearby(&self, options: &NearbySearchOptions, cancel: &CancellationToken) -> Result<ProviderPage> {
        self.nearby_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_nearby.lock().unwrap() = Some(options.clone());
        self.respond(&self.nearby, cancel).await
    }

    async fn search_text(&self, _options: &TextSearchOptions, cancel: &CancellationToken) -> Result<ProviderPage> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(&self.text, cancel).await
    }

    async fn autocomplete(&self, request: &AutocompleteRequest, cancel: &CancellationToken) -> Result<Vec<Prediction>> {
        self.autocomplete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(request.input.clone());
        self.respond(&self.autocomplete, cancel).await
    }

    async fn details(&self, _request: &DetailsRequest, cancel: &CancellationToken) -> Result<PlaceRecord> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(&self.details, cancel).await
    }
}
