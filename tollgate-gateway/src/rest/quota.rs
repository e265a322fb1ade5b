//! Call-quota tracking from response headers.

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tollgate_core::types::CallLimits;
use tracing::{debug, trace};

/// Response header carrying `"<used>/<max>"`.
pub const CALL_LIMIT_HEADER: &str = "x-shopify-shop-api-call-limit";

const EVENT_CAPACITY: usize = 16;

/// Parses a `"<used>/<max>"` usage value.
///
/// Surrounding whitespace is ignored. Anything other than exactly two
/// unsigned integers separated by one `/` yields `None`.
///
/// ```
/// use tollgate_gateway::rest::parse_call_limit;
///
/// let limits = parse_call_limit(" 2/40 ").unwrap();
/// assert_eq!(limits.remaining, Some(38));
/// assert!(parse_call_limit("bad/value").is_none());
/// assert!(parse_call_limit("1/2/3").is_none());
/// ```
#[must_use]
pub fn parse_call_limit(value: &str) -> Option<CallLimits> {
    let (used, max) = value.trim().split_once('/')?;
    let used = used.trim().parse::<u32>().ok()?;
    let max = max.trim().parse::<u32>().ok()?;
    Some(CallLimits::from_usage(used, max))
}

/// Keeps the most recent call quota reported by the server.
///
/// The tracker is informational only. It never delays or rejects calls.
#[derive(Debug)]
pub struct QuotaTracker {
    limits: RwLock<CallLimits>,
    events: broadcast::Sender<CallLimits>,
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaTracker {
    /// Creates a tracker with an unknown quota.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            limits: RwLock::new(CallLimits::default()),
            events,
        }
    }

    /// Records a usage header value.
    ///
    /// Missing, empty and malformed values are ignored. A valid value replaces
    /// all three fields at once and notifies subscribers.
    pub fn observe(&self, header: Option<&str>) {
        let Some(raw) = header else {
            return;
        };
        let Some(limits) = parse_call_limit(raw) else {
            trace!(value = raw, "Ignoring malformed call limit header");
            return;
        };

        *self.limits.write() = limits;
        debug!(
            current = limits.current,
            max = limits.max,
            remaining = limits.remaining,
            "Call limits updated"
        );
        // No subscribers is fine.
        let _ = self.events.send(limits);
    }

    /// Returns the last observed quota.
    #[must_use]
    pub fn limits(&self) -> CallLimits {
        *self.limits.read()
    }

    /// Subscribes to quota updates, one event per accepted header.
    ///
    /// Slow receivers lag and skip to the latest updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CallLimits> {
        self.events.subscribe()
    }
}
