// FILE: src/core/metrics.rs
//! In-process telemetry: call counts, failures and a rolling latency window.
//!
//! Recording is a side channel. Nothing in here returns an error or panics on a
//! poisoned lock, so a metrics problem can never mask a search result.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use serde::Serialize;
use crate::model::OperationKind;

pub const DEFAULT_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OperationStats {
    pub count: u64,
    pub failures: u64,
    pub cache_hits: u64,
    /// Average over this operation's samples still inside the window.
    pub average_latency_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cache_hits: u64,
    /// Upstream calls issued per operation, retries included.
    pub quota_by_operation: BTreeMap<OperationKind, u64>,
    pub average_latency_ms: f64,
    pub window_samples: usize,
    pub per_operation: BTreeMap<OperationKind, OperationStats>,
}

#[derive(Default)]
struct Inner {
    total: u64,
    succeeded: u64,
    failed: u64,
    cache_hits: u64,
    quota_by_operation: BTreeMap<OperationKind, u64>,
    per_operation: BTreeMap<OperationKind, OperationStats>,
    window: VecDeque<(OperationKind, f64)>,
    average_latency_ms: f64,
}

impl Inner {
    fn recompute_averages(&mut self) {
        self.average_latency_ms = mean(self.window.iter().map(|(_, ms)| *ms));
        for (kind, stats) in self.per_operation.iter_mut() {
            stats.average_latency_ms = mean(self.window.iter().filter(|(k, _)| k == kind).map(|(_, ms)| *ms));
        }
    }
}

fn mean(samples: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = samples.fold((0.0, 0usize), |(sum, n), ms| (sum + ms, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

pub struct Metrics {
    window_size: usize,
    inner: Mutex<Inner>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Metrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records one completed logical operation.
    pub fn record(&self, operation: OperationKind, elapsed: Duration, success: bool) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let mut inner = self.lock();

        inner.total += 1;
        if success {
            inner.succeeded += 1;
        } else {
            inner.failed += 1;
        }

        let stats = inner.per_operation.entry(operation).or_default();
        stats.count += 1;
        if !success {
            stats.failures += 1;
        }

        inner.window.push_back((operation, ms));
        while inner.window.len() > self.window_size {
            inner.window.pop_front();
        }
        inner.recompute_averages();

        tracing::trace!("[Metrics] {} took {:.1}ms (success={})", operation, ms, success);
    }

    pub fn record_cache_hit(&self, operation: OperationKind) {
        let mut inner = self.lock();
        inner.cache_hits += 1;
        inner.per_operation.entry(operation).or_default().cache_hits += 1;
    }

    pub fn record_upstream_call(&self, operation: OperationKind) {
        *self.lock().quota_by_operation.entry(operation).or_default() += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();
        MetricsSnapshot {
            total: inner.total,
            succeeded: inner.succeeded,
            failed: inner.failed,
            cache_hits: inner.cache_hits,
            quota_by_operation: inner.quota_by_operation.clone(),
            average_latency_ms: inner.average_latency_ms,
            window_samples: inner.window.len(),
            per_operation: inner.per_operation.clone(),
        }
    }

    pub fn reset(&self) {
        *self.lock() = Inner::default();
        tracing::debug!("[Metrics] Reset");
    }
}
