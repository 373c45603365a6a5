// FILE: src/engine/debounce.rs
//! Debounced request controller.
//!
//! One instance per operation kind. Each `execute` supersedes whatever the
//! previous call left behind: its timer is cancelled, its token is cancelled
//! (so an in-flight fetch can bail at its next check), and its caller is
//! rejected with `Cancelled` right away. Only the latest call can resolve
//! with a real result.
//!
//! State per slot: Idle -> Scheduled(timer) -> Fired -> Settled, or Cancelled.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use crate::error::{PlacesError, Result};
use crate::model::OperationKind;

type BoxFuture<R> = Pin<Box<dyn Future<Output = Result<R>> + Send + 'static>>;
type Operation<A, R> = Arc<dyn Fn(A, CancellationToken) -> BoxFuture<R> + Send + Sync>;

struct Pending<R> {
    generation: u64,
    token: CancellationToken,
    respond_to: oneshot::Sender<Result<R>>,
}

impl<R> Pending<R> {
    fn reject(self) {
        self.token.cancel();
        // The caller may already have gone away; nothing to do then.
        let _ = self.respond_to.send(Err(PlacesError::Cancelled));
    }
}

type Slot<R> = Arc<Mutex<Option<Pending<R>>>>;

pub struct Debouncer<A, R> {
    kind: OperationKind,
    delay: Duration,
    operation: Operation<A, R>,
    slot: Slot<R>,
    generation: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Takes the slot only if it still belongs to `generation`.
fn take_current<R>(slot: &Mutex<Option<Pending<R>>>, generation: u64) -> Option<Pending<R>> {
    let mut guard = lock(slot);
    let still_current = guard.as_ref().is_some_and(|p| p.generation == generation);
    if still_current { guard.take() } else { None }
}

/// Held by the spawned task. Whatever way the task ends (result, early
/// return, panic), dropping this settles the caller if the slot is still ours.
struct Settle<R> {
    kind: OperationKind,
    slot: Slot<R>,
    generation: u64,
    outcome: Option<Result<R>>,
}

impl<R> Drop for Settle<R> {
    fn drop(&mut self) {
        let Some(pending) = take_current(&self.slot, self.generation) else {
            return;
        };
        let outcome = self.outcome.take().unwrap_or_else(|| {
            tracing::error!("[Debouncer:{}] Call #{} aborted before producing a result", self.kind, self.generation);
            Err(PlacesError::Unknown(anyhow::anyhow!("{} operation aborted", self.kind)))
        });
        let _ = pending.respond_to.send(outcome);
    }
}

/// Held by the caller. If the `execute` future is dropped before it settles,
/// the call is withdrawn: its token fires and the slot is released.
struct Withdraw<R> {
    slot: Slot<R>,
    generation: u64,
    token: CancellationToken,
}

impl<R> Drop for Withdraw<R> {
    fn drop(&mut self) {
        self.token.cancel();
        take_current(&self.slot, self.generation);
    }
}

impl<A, R> Debouncer<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// `operation` receives the call's arguments and its cancellation token.
    /// It must check the token at entry and after every await point.
    pub fn new<F, Fut>(kind: OperationKind, delay: Duration, operation: F) -> Self
    where
        F: Fn(A, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let operation: Operation<A, R> = Arc::new(move |args, token| Box::pin(operation(args, token)));
        Self {
            kind,
            delay,
            operation,
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `args` after the debounce window and waits for the outcome.
    /// Resolves with `Cancelled` if a newer call (or `cancel`) supersedes this one.
    pub async fn execute(&self, args: A) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut slot = lock(&self.slot);
            let pending = Pending { generation, token: token.clone(), respond_to: tx };
            if let Some(previous) = slot.replace(pending) {
                tracing::debug!("[Debouncer:{}] Call #{} superseded by #{}", self.kind, previous.generation, generation);
                previous.reject();
            }
        }

        let kind = self.kind;
        let delay = self.delay;
        let operation = Arc::clone(&self.operation);
        let slot = Arc::clone(&self.slot);

        let withdraw = Withdraw { slot: Arc::clone(&slot), generation, token: token.clone() };

        tokio::spawn(async move {
            let mut settle = Settle { kind, slot, generation, outcome: None };

            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            tracing::trace!("[Debouncer:{}] Firing call #{}", kind, generation);
            let outcome = operation(args, token.clone()).await;

            if token.is_cancelled() {
                tracing::debug!("[Debouncer:{}] Discarding late result of call #{}", kind, generation);
                return;
            }
            settle.outcome = Some(outcome);
        });

        let outcome = rx.await.unwrap_or(Err(PlacesError::Cancelled));
        drop(withdraw);
        outcome
    }

    /// Cancels the pending or in-flight call, if any.
    pub fn cancel(&self) {
        if let Some(pending) = lock(&self.slot).take() {
            tracing::debug!("[Debouncer:{}] Cancelled call #{}", self.kind, pending.generation);
            pending.reject();
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

impl<A, R> Drop for Debouncer<A, R> {
    fn drop(&mut self) {
        if let Some(pending) = lock(&self.slot).take() {
            pending.reject();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    type Calls = Arc<Mutex<Vec<(u32, Duration)>>>;

    fn recording(delay: Duration, calls: Calls, start: Instant) -> Debouncer<u32, u32> {
        Debouncer::new(OperationKind::NearbySearch, delay, move |n: u32, token: CancellationToken| {
            let calls = Arc::clone(&calls);
            async move {
                if token.is_cancelled() {
                    return Err(PlacesError::Cancelled);
                }
                calls.lock().unwrap().push((n, start.elapsed()));
                Ok(n * 10)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_last_call() {
        let start = Instant::now();
        let calls: Calls = Arc::default();
        let debouncer = Arc::new(recording(Duration::from_millis(300), Arc::clone(&calls), start));

        let d = Arc::clone(&debouncer);
        let first = tokio::spawn(async move { d.execute(1).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let d = Arc::clone(&debouncer);
        let second = tokio::spawn(async move { d.execute(2).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let d = Arc::clone(&debouncer);
        let third = tokio::spawn(async move { d.execute(3).await });

        assert!(matches!(first.await.unwrap(), Err(PlacesError::Cancelled)));
        assert!(matches!(second.await.unwrap(), Err(PlacesError::Cancelled)));
        assert_eq!(third.await.unwrap().unwrap(), 30);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 3);
        assert!(calls[0].1 >= Duration::from_millis(400) && calls[0].1 < Duration::from_millis(410), "fired at {:?}", calls[0].1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_in_flight_call_is_cancelled() {
        let fetches = Arc::new(AtomicU64::new(0));
        let f = Arc::clone(&fetches);
        let debouncer = Arc::new(Debouncer::new(OperationKind::Autocomplete, Duration::from_millis(150), move |n: u32, token: CancellationToken| {
            let f = Arc::clone(&f);
            async move {
                f.fetch_add(1, Ordering::SeqCst);
                // Slow upstream; bail out if superseded while waiting.
                tokio::select! {
                    _ = token.cancelled() => Err(PlacesError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_secs(1)) => Ok(n),
                }
            }
        }));

        let d = Arc::clone(&debouncer);
        let a = tokio::spawn(async move { d.execute(1).await });
        // Past the window: A is now in flight.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let d = Arc::clone(&debouncer);
        let b = tokio::spawn(async move { d.execute(2).await });

        assert!(matches!(a.await.unwrap(), Err(PlacesError::Cancelled)));
        assert_eq!(b.await.unwrap().unwrap(), 2);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_rejects_pending_call() {
        let calls: Calls = Arc::default();
        let debouncer = Arc::new(recording(Duration::from_millis(300), Arc::clone(&calls), Instant::now()));

        let d = Arc::clone(&debouncer);
        let pending = tokio::spawn(async move { d.execute(7).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(debouncer.is_pending());

        debouncer.cancel();
        assert!(matches!(pending.await.unwrap(), Err(PlacesError::Cancelled)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_pass_through() {
        let debouncer: Debouncer<(), ()> = Debouncer::new(OperationKind::Details, Duration::ZERO, |_, _| async {
            Err(PlacesError::RequestDenied("nope".into()))
        });
        assert!(matches!(debouncer.execute(()).await, Err(PlacesError::RequestDenied(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_calls_each_resolve() {
        let calls: Calls = Arc::default();
        let debouncer = recording(Duration::from_millis(300), Arc::clone(&calls), Instant::now());
        assert_eq!(debouncer.execute(1).await.unwrap(), 10);
        assert_eq!(debouncer.execute(2).await.unwrap(), 20);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_operation_settles_caller() {
        let debouncer: Debouncer<(), u32> = Debouncer::new(OperationKind::NearbySearch, Duration::from_millis(300), |_, _| async {
            let empty: Vec<u32> = Vec::new();
            Ok(empty[0])
        });

        let outcome = tokio::time::timeout(Duration::from_secs(60), debouncer.execute(())).await;
        match outcome {
            Ok(Err(PlacesError::Unknown(_))) => {}
            other => panic!("expected an Unknown error, got {:?}", other),
        }
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_withdraws_call() {
        let calls: Calls = Arc::default();
        let debouncer = recording(Duration::from_millis(300), Arc::clone(&calls), Instant::now());

        let gave_up = tokio::time::timeout(Duration::from_millis(100), debouncer.execute(5)).await;
        assert!(gave_up.is_err());
        assert!(!debouncer.is_pending());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(calls.lock().unwrap().is_empty());

        // A newer call is not disturbed by the abandoned one.
        assert_eq!(debouncer.execute(6).await.unwrap(), 60);
    }
}

