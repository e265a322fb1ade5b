//! Rate-limited call dispatcher.
//!
//! Wraps arbitrary asynchronous work and decides when it may start:
//!
//! - a bounded FIFO admission queue provides backpressure
//! - a [`TokenBucket`] paces how often work starts
//! - at most `concurrency_limit` starts are considered in flight; each slot
//!   is released by a timer `interval_ms` after its start, not by the work
//!   completing
//!
//! Because release is timer driven, the limit models a request rate per
//! wall-clock interval. Work that runs longer than the interval no longer
//! occupies a slot.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{Notify, oneshot};
use tokio::time;
use tollgate_core::config::{DispatcherConfig, Validatable};
use tollgate_core::error::{ConfigError, DispatchError};
use tracing::{debug, error, info, warn};

use super::token_bucket::TokenBucket;

/// Type-erased queued call. Invoking it starts the work.
type Job = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct DispatcherState {
    queue: VecDeque<Job>,
    in_flight: u32,
    pumping: bool,
    closed: bool,
}

struct Inner {
    config: DispatcherConfig,
    bucket: Arc<TokenBucket>,
    state: Mutex<DispatcherState>,
    /// Wakes a pump parked on the bucket when the dispatcher closes.
    closing: Notify,
}

impl Inner {
    /// Starts the pump unless one is running or nothing can start.
    fn advance(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.pumping
                || state.closed
                || state.queue.is_empty()
                || state.in_flight >= self.config.concurrency_limit
            {
                return;
            }
            state.pumping = true;
        }
        tokio::spawn(Arc::clone(self).pump());
    }

    /// Starts queued calls one token at a time while slots are free.
    async fn pump(self: Arc<Self>) {
        loop {
            {
                let mut state = self.state.lock();
                if state.closed
                    || state.queue.is_empty()
                    || state.in_flight >= self.config.concurrency_limit
                {
                    state.pumping = false;
                    return;
                }
            }

            // Abandoning the acquire leaves the bucket's tokens untouched.
            let acquired = tokio::select! {
                biased;
                () = self.closing.notified() => {
                    self.state.lock().pumping = false;
                    return;
                }
                acquired = self.bucket.acquire(1) => acquired,
            };
            let remaining = match acquired {
                Ok(remaining) => remaining,
                Err(e) => {
                    // The entry stays queued; the next release or submit retries.
                    warn!(error = %e, "Token acquisition failed, call stays queued");
                    self.state.lock().pumping = false;
                    return;
                }
            };

            let (job, in_flight, queued) = {
                let mut state = self.state.lock();
                let Some(job) = state.queue.pop_front() else {
                    state.pumping = false;
                    return;
                };
                state.in_flight += 1;
                (job, state.in_flight, state.queue.len())
            };

            debug!(
                remaining_tokens = remaining,
                in_flight, queued, "Starting rate-limited call"
            );
            job();
            self.schedule_release();
        }
    }

    fn schedule_release(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            time::sleep(inner.config.release_delay()).await;
            {
                let mut state = inner.state.lock();
                state.in_flight = state.in_flight.saturating_sub(1);
            }
            inner.advance();
        });
    }
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Calls waiting in the admission queue.
    pub queued: usize,
    /// Calls started within the last release interval.
    pub in_flight: u32,
    /// Configured concurrency limit.
    pub concurrency_limit: u32,
    /// Configured queue capacity.
    pub queue_capacity: usize,
    /// Whether the dispatcher has been closed.
    pub closed: bool,
}

/// Dispatcher that admits calls through a bounded FIFO queue and starts
/// them at the pace of a token bucket.
///
/// Cloning yields another handle to the same queue.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tollgate_core::config::{BucketConfig, DispatcherConfig};
/// use tollgate_gateway::rest::{RateLimitedDispatcher, TokenBucket};
///
/// let bucket = Arc::new(TokenBucket::new(BucketConfig::default())?);
/// let dispatcher = RateLimitedDispatcher::new(
///     DispatcherConfig::new(2, Duration::from_secs(1)),
///     bucket,
/// )?;
///
/// let admission = dispatcher.submit(|| async { fetch_orders().await })?;
/// let orders = admission.await?;
/// ```
#[derive(Clone)]
pub struct RateLimitedDispatcher {
    inner: Arc<Inner>,
}

impl RateLimitedDispatcher {
    /// Creates a dispatcher drawing permits from `bucket`.
    ///
    /// Pass the same bucket to several dispatchers to make them share one
    /// rate budget.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the limit, interval or queue capacity is zero.
    pub fn new(config: DispatcherConfig, bucket: Arc<TokenBucket>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                bucket,
                state: Mutex::new(DispatcherState::default()),
                closing: Notify::new(),
            }),
        })
    }

    /// Queues `work` and returns a future for its output.
    ///
    /// Admission is decided synchronously. The returned [`Admission`]
    /// resolves to exactly what the work's future produced; failures of the
    /// work travel inside that value untouched.
    ///
    /// Dropping the `Admission` does not cancel the call. Once started, a
    /// call holds its slot until the release interval elapses.
    ///
    /// # Errors
    ///
    /// - `DispatchError::QueueFull` if the queue is at capacity; the queue is
    ///   left unchanged
    /// - `DispatchError::Closed` after [`RateLimitedDispatcher::close`]
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn submit<F, Fut>(&self, work: F) -> Result<Admission<Fut::Output>, DispatchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || match catch_unwind(AssertUnwindSafe(work)) {
            Ok(future) => {
                tokio::spawn(async move {
                    let _ = tx.send(future.await);
                });
            }
            Err(_) => error!("Rate-limited call panicked while starting"),
        });

        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(DispatchError::Closed);
            }
            if state.queue.len() >= self.inner.config.queue_capacity {
                warn!(
                    queue_capacity = self.inner.config.queue_capacity,
                    "Admission queue full, rejecting call"
                );
                return Err(DispatchError::QueueFull {
                    capacity: self.inner.config.queue_capacity,
                });
            }
            state.queue.push_back(job);
        }

        self.inner.advance();
        Ok(Admission { rx })
    }

    /// Wraps `f` so every [`RateLimited::call`] goes through this dispatcher.
    #[must_use]
    pub fn wrap<F>(&self, f: F) -> RateLimited<F> {
        RateLimited {
            dispatcher: self.clone(),
            f: Arc::new(f),
        }
    }

    /// Rejects further submissions and drops every queued call.
    ///
    /// Callers of dropped calls observe `DispatchError::Abandoned`. Calls
    /// already started are unaffected. Returns the number of dropped calls.
    pub fn close(&self) -> usize {
        let dropped = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            std::mem::take(&mut state.queue)
        };
        // Stores a permit if no pump is parked yet; none will start afterwards.
        self.inner.closing.notify_one();
        info!(dropped = dropped.len(), "Dispatcher closed");
        dropped.len()
    }

    /// Returns the number of calls waiting for a slot.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Returns the number of occupied in-flight slots.
    #[must_use]
    pub fn in_flight(&self) -> u32 {
        self.inner.state.lock().in_flight
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Returns the bucket this dispatcher draws from.
    #[must_use]
    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.inner.bucket
    }

    /// Returns a consistent snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        let state = self.inner.state.lock();
        DispatcherStats {
            queued: state.queue.len(),
            in_flight: state.in_flight,
            concurrency_limit: self.inner.config.concurrency_limit,
            queue_capacity: self.inner.config.queue_capacity,
            closed: state.closed,
        }
    }
}

impl std::fmt::Debug for RateLimitedDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedDispatcher")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Pending result of an admitted call.
///
/// Resolves to the work's own output, or to `DispatchError::Abandoned` if the
/// call was dropped by [`RateLimitedDispatcher::close`] or panicked.
#[must_use = "an admitted call runs regardless; await the admission to observe its result"]
#[derive(Debug)]
pub struct Admission<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Admission<T> {
    type Output = Result<T, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| DispatchError::Abandoned))
    }
}

/// A function whose calls are admitted through a [`RateLimitedDispatcher`].
pub struct RateLimited<F> {
    dispatcher: RateLimitedDispatcher,
    f: Arc<F>,
}

impl<F> RateLimited<F> {
    /// Submits `f(args)` to the dispatcher.
    ///
    /// # Errors
    ///
    /// Same as [`RateLimitedDispatcher::submit`].
    pub fn call<A, Fut>(&self, args: A) -> Result<Admission<Fut::Output>, DispatchError>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        A: Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let f = Arc::clone(&self.f);
        self.dispatcher.submit(move || f(args))
    }

    /// Returns the underlying dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &RateLimitedDispatcher {
        &self.dispatcher
    }
}

impl<F> Clone for RateLimited<F> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            f: Arc::clone(&self.f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;
    use tollgate_core::config::BucketConfig;

    fn dispatcher(limit: u32, release_ms: u64, capacity: usize) -> RateLimitedDispatcher {
        let bucket = Arc::new(
            TokenBucket::new(BucketConfig::new(100, 100, Duration::from_millis(10))).unwrap(),
        );
        RateLimitedDispatcher::new(
            DispatcherConfig::new(limit, Duration::from_millis(release_ms))
                .with_queue_capacity(capacity),
            bucket,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_returns_work_output() {
        let dispatcher = dispatcher(2, 100, 10);
        let admission = dispatcher.submit(|| async { 41 + 1 }).unwrap();
        assert_eq!(admission.await, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_error_passed_through() {
        let dispatcher = dispatcher(1, 100, 10);
        let admission = dispatcher
            .submit(|| async { Err::<(), _>("upstream refused".to_string()) })
            .unwrap();
        assert_eq!(admission.await, Ok(Err("upstream refused".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_full_is_synchronous() {
        let dispatcher = dispatcher(1, 100, 2);
        let _a = dispatcher.submit(|| async {}).unwrap();
        let _b = dispatcher.submit(|| async {}).unwrap();
        assert_eq!(dispatcher.queue_len(), 2);

        let rejected = dispatcher.submit(|| async {});
        assert!(matches!(
            rejected,
            Err(DispatchError::QueueFull { capacity: 2 })
        ));
        assert_eq!(dispatcher.queue_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_released_by_timer() {
        let dispatcher = dispatcher(1, 200, 10);
        let start = Instant::now();

        dispatcher.submit(|| async {}).unwrap().await.unwrap();
        assert_eq!(dispatcher.in_flight(), 1);

        let second = dispatcher
            .submit(|| {
                let started = Instant::now();
                async move { started }
            })
            .unwrap()
            .await
            .unwrap();
        assert!(second - start >= Duration::from_millis(200));

        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_abandons_queued_calls() {
        let dispatcher = dispatcher(1, 1_000, 10);
        let first = dispatcher.submit(|| async { 1 }).unwrap();
        let second = dispatcher.submit(|| async { 2 }).unwrap();
        assert_eq!(first.await, Ok(1));

        assert_eq!(dispatcher.close(), 1);
        assert_eq!(second.await, Err(DispatchError::Abandoned));
        assert!(matches!(
            dispatcher.submit(|| async {}),
            Err(DispatchError::Closed)
        ));
        assert!(dispatcher.stats().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_work_is_abandoned() {
        let dispatcher = dispatcher(2, 10, 10);
        let panicked = dispatcher
            .submit(|| -> std::future::Ready<u8> { panic!("boom") })
            .unwrap();
        assert_eq!(panicked.await, Err(DispatchError::Abandoned));

        let next = dispatcher.submit(|| async { 7u8 }).unwrap();
        assert_eq!(next.await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_passes_arguments() {
        let dispatcher = dispatcher(2, 10, 10);
        let double = dispatcher.wrap(|n: u32| async move { n * 2 });

        let a = double.call(3).unwrap();
        let b = double.call(5).unwrap();
        assert_eq!(a.await, Ok(6));
        assert_eq!(b.await, Ok(10));
        assert_eq!(double.dispatcher().config().concurrency_limit, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_snapshot() {
        let dispatcher = dispatcher(3, 100, 5);
        let stats = dispatcher.stats();
        assert_eq!(
            stats,
            DispatcherStats {
                queued: 0,
                in_flight: 0,
                concurrency_limit: 3,
                queue_capacity: 5,
                closed: false,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config() {
        let bucket = Arc::new(TokenBucket::new(BucketConfig::default()).unwrap());
        let result = RateLimitedDispatcher::new(
            DispatcherConfig::new(0, Duration::from_millis(100)),
            bucket,
        );
        assert!(result.is_err());
    }
}
