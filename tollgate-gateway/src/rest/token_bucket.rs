//! Token bucket permit source.
//!
//! Tokens are added by a timer task at a fixed rate rather than computed from
//! elapsed time, so a refill is an observable event that can wake waiters.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tollgate_core::config::{BucketConfig, Validatable};
use tollgate_core::error::{BucketError, ConfigError};
use tracing::{debug, trace};

type Grant = Result<u32, BucketError>;

struct Waiter {
    count: u32,
    tx: oneshot::Sender<Grant>,
}

struct BucketState {
    available: u32,
    waiters: VecDeque<Waiter>,
    shut_down: bool,
}

impl BucketState {
    /// Grants waiters from the head while the head fits.
    ///
    /// A waiter that no longer listens is skipped and its tokens kept.
    fn grant_waiters(&mut self) {
        while let Some(head) = self.waiters.front() {
            if head.tx.is_closed() {
                self.waiters.pop_front();
                continue;
            }
            if head.count > self.available {
                break;
            }
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            self.available -= waiter.count;
            if waiter.tx.send(Ok(self.available)).is_err() {
                self.available += waiter.count;
            }
        }
    }
}

struct Shared {
    capacity: u32,
    refill_amount: u32,
    state: Mutex<BucketState>,
}

/// A queued request. If dropped after its grant was sent but before it was
/// received, the granted tokens go back to the bucket.
struct PendingGrant<'a> {
    rx: oneshot::Receiver<Grant>,
    count: u32,
    shared: &'a Shared,
    received: bool,
}

impl Drop for PendingGrant<'_> {
    fn drop(&mut self) {
        if self.received {
            return;
        }
        self.rx.close();
        if let Ok(Ok(_)) = self.rx.try_recv() {
            let mut state = self.shared.state.lock();
            if state.shut_down {
                return;
            }
            state.available = state
                .available
                .saturating_add(self.count)
                .min(self.shared.capacity);
            trace!(count = self.count, "Unclaimed grant returned");
            state.grant_waiters();
        }
    }
}

impl Shared {
    fn refill(&self) {
        let mut state = self.state.lock();
        if state.shut_down {
            return;
        }
        state.available = state
            .available
            .saturating_add(self.refill_amount)
            .min(self.capacity);
        trace!(available = state.available, waiting = state.waiters.len(), "Bucket refilled");
        state.grant_waiters();
    }
}

/// Token bucket granting permits asynchronously.
///
/// The bucket starts full. Every refill interval a background task adds
/// `refill_amount` tokens (never beyond `capacity`) and then serves waiting
/// requests strictly in arrival order. A request that does not fit blocks
/// every request behind it.
///
/// Share a bucket between dispatchers by cloning the `Arc` that holds it.
/// Dropping the bucket shuts it down.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use tollgate_core::config::BucketConfig;
/// use tollgate_gateway::rest::TokenBucket;
///
/// let bucket = TokenBucket::new(BucketConfig::new(2, 1, Duration::from_secs(1)))?;
/// let remaining = bucket.acquire(1).await?;
/// assert_eq!(remaining, 1);
/// ```
pub struct TokenBucket {
    shared: Arc<Shared>,
    refill_task: JoinHandle<()>,
}

impl TokenBucket {
    /// Creates a full bucket and starts its refill timer.
    ///
    /// The first refill happens one full interval after construction.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any setting is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(config: BucketConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            capacity: config.capacity,
            refill_amount: config.refill_amount,
            state: Mutex::new(BucketState {
                available: config.capacity,
                waiters: VecDeque::new(),
                shut_down: false,
            }),
        });

        let period = config.refill_interval();
        let refill_shared = Arc::clone(&shared);
        let refill_task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                refill_shared.refill();
            }
        });

        debug!(
            capacity = config.capacity,
            refill_amount = config.refill_amount,
            refill_interval_ms = config.refill_interval_ms,
            "Token bucket created"
        );

        Ok(Self {
            shared,
            refill_task,
        })
    }

    /// Waits for `count` tokens and returns how many remain afterwards.
    ///
    /// Requests are served in arrival order; a request never overtakes an
    /// earlier one, even if enough tokens are present for it. Dropping the
    /// returned future gives up the place in line; tokens already granted to
    /// it but not yet received are returned to the bucket.
    ///
    /// # Errors
    ///
    /// - `BucketError::ExceedsCapacity` if `count` is larger than the capacity
    /// - `BucketError::Unavailable` if the bucket is or gets shut down
    pub async fn acquire(&self, count: u32) -> Result<u32, BucketError> {
        let rx = {
            let mut state = self.shared.state.lock();
            if state.shut_down {
                return Err(BucketError::Unavailable);
            }
            if count > self.shared.capacity {
                return Err(BucketError::ExceedsCapacity {
                    requested: count,
                    capacity: self.shared.capacity,
                });
            }
            if count == 0 {
                return Ok(state.available);
            }
            if state.waiters.is_empty() && state.available >= count {
                state.available -= count;
                return Ok(state.available);
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(Waiter { count, tx });
            trace!(count, waiting = state.waiters.len(), "Waiting for tokens");
            rx
        };

        let mut pending = PendingGrant {
            rx,
            count,
            shared: &self.shared,
            received: false,
        };
        let grant = (&mut pending.rx).await;
        pending.received = true;
        grant.unwrap_or(Err(BucketError::Unavailable))
    }

    /// Takes `count` tokens only if that is possible right now without
    /// jumping the waiter queue.
    #[must_use]
    pub fn try_acquire(&self, count: u32) -> Option<u32> {
        let mut state = self.shared.state.lock();
        if state.shut_down || !state.waiters.is_empty() || state.available < count {
            return None;
        }
        state.available -= count;
        Some(state.available)
    }

    /// Stops refilling and fails every pending and future request with
    /// `BucketError::Unavailable`.
    pub fn shutdown(&self) {
        self.refill_task.abort();

        let waiters = {
            let mut state = self.shared.state.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            std::mem::take(&mut state.waiters)
        };

        debug!(failed_waiters = waiters.len(), "Token bucket shut down");
        for waiter in waiters {
            let _ = waiter.tx.send(Err(BucketError::Unavailable));
        }
    }

    /// Returns true once [`TokenBucket::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shut_down
    }

    /// Returns the tokens currently available.
    #[must_use]
    pub fn available(&self) -> u32 {
        self.shared.state.lock().available
    }

    /// Returns the bucket capacity.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.shared.capacity
    }

    /// Returns the number of requests waiting for tokens.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.shared.state.lock().waiters.len()
    }
}

impl Drop for TokenBucket {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TokenBucket")
            .field("capacity", &self.shared.capacity)
            .field("refill_amount", &self.shared.refill_amount)
            .field("available", &state.available)
            .field("waiting", &state.waiters.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::{Context, Waker};
    use std::time::Duration;

    fn bucket(capacity: u32, refill: u32, interval_ms: u64) -> TokenBucket {
        TokenBucket::new(BucketConfig::new(
            capacity,
            refill,
            Duration::from_millis(interval_ms),
        ))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_full() {
        let bucket = bucket(3, 1, 100);
        assert_eq!(bucket.available(), 3);
        assert_eq!(bucket.acquire(1).await, Ok(2));
        assert_eq!(bucket.acquire(2).await, Ok(0));
        assert_eq!(bucket.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_count_is_immediate() {
        let bucket = bucket(1, 1, 100);
        bucket.acquire(1).await.unwrap();
        assert_eq!(bucket.acquire(0).await, Ok(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_refill() {
        let bucket = bucket(1, 1, 100);
        bucket.acquire(1).await.unwrap();

        let start = Instant::now();
        assert_eq!(bucket.acquire(1).await, Ok(0));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_capped_at_capacity() {
        let bucket = bucket(4, 3, 50);
        bucket.acquire(4).await.unwrap();

        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(bucket.available(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exceeds_capacity() {
        let bucket = bucket(2, 1, 100);
        assert_eq!(
            bucket.acquire(3).await,
            Err(BucketError::ExceedsCapacity {
                requested: 3,
                capacity: 2
            })
        );
        assert_eq!(bucket.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_served_in_arrival_order() {
        let bucket = Arc::new(bucket(2, 1, 100));
        bucket.acquire(2).await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        // The first waiter needs both tokens; the second must not overtake it.
        for (name, count) in [("large", 2), ("small", 1)] {
            let bucket = Arc::clone(&bucket);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                bucket.acquire(count).await.unwrap();
                order.lock().push((name, Instant::now()));
            }));
            tokio::task::yield_now().await;
        }
        assert_eq!(bucket.waiting(), 2);

        let start = Instant::now();
        for handle in handles {
            handle.await.unwrap();
        }

        let order = order.lock();
        assert_eq!(order[0].0, "large");
        assert_eq!(order[1].0, "small");
        assert!(order[0].1 - start >= Duration::from_millis(200));
        assert!(order[1].1 - start >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_respects_queue() {
        let bucket = Arc::new(bucket(1, 1, 100));
        assert_eq!(bucket.try_acquire(1), Some(0));
        assert_eq!(bucket.try_acquire(1), None);

        let waiter = {
            let bucket = Arc::clone(&bucket);
            tokio::spawn(async move { bucket.acquire(1).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(bucket.waiting(), 1);

        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(waiter.await.unwrap(), Ok(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_keeps_tokens() {
        let bucket = bucket(1, 1, 100);
        bucket.acquire(1).await.unwrap();

        let timed_out = time::timeout(Duration::from_millis(10), bucket.acquire(1)).await;
        assert!(timed_out.is_err());

        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(bucket.available(), 1);
        assert_eq!(bucket.acquire(1).await, Ok(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreceived_grant_returned_on_drop() {
        let bucket = bucket(1, 1, 100);
        bucket.acquire(1).await.unwrap();

        let mut pending = Box::pin(bucket.acquire(1));
        let mut cx = Context::from_waker(Waker::noop());
        assert!(pending.as_mut().poll(&mut cx).is_pending());
        assert_eq!(bucket.waiting(), 1);

        // The refill hands the token to the queued request, which never
        // looks at it again.
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(bucket.waiting(), 0);
        assert_eq!(bucket.available(), 0);

        drop(pending);
        assert_eq!(bucket.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_fails_waiters() {
        let bucket = Arc::new(bucket(1, 1, 1_000));
        bucket.acquire(1).await.unwrap();

        let waiter = {
            let bucket = Arc::clone(&bucket);
            tokio::spawn(async move { bucket.acquire(1).await })
        };
        tokio::task::yield_now().await;

        bucket.shutdown();
        assert!(bucket.is_shut_down());
        assert_eq!(waiter.await.unwrap(), Err(BucketError::Unavailable));
        assert_eq!(bucket.acquire(1).await, Err(BucketError::Unavailable));
        assert_eq!(bucket.try_acquire(0), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config() {
        let result = TokenBucket::new(BucketConfig::new(0, 1, Duration::from_secs(1)));
        assert!(result.is_err());
    }
}
