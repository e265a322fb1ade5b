//! API call usage reported by the platform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of the call quota reported by the last response that carried it.
///
/// All three fields are `None` until the first usage header is observed, and
/// they are always replaced together.
///
/// # Examples
///
/// ```
/// use tollgate_core::types::CallLimits;
///
/// let limits = CallLimits::from_usage(2, 40);
/// assert_eq!(limits.remaining, Some(38));
/// assert_eq!(limits.current, Some(2));
/// assert_eq!(limits.max, Some(40));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallLimits {
    /// Calls left before the quota is exhausted.
    pub remaining: Option<u32>,
    /// Calls used so far.
    pub current: Option<u32>,
    /// Quota size.
    pub max: Option<u32>,
}

impl CallLimits {
    /// Builds the triple from a used/max pair.
    ///
    /// `remaining` saturates at zero when the server reports usage above the
    /// maximum.
    #[must_use]
    pub const fn from_usage(current: u32, max: u32) -> Self {
        Self {
            remaining: Some(max.saturating_sub(current)),
            current: Some(current),
            max: Some(max),
        }
    }

    /// Returns true once a usage header has been observed.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        self.max.is_some()
    }

    /// Fraction of the quota already used, if known.
    #[must_use]
    pub fn utilization(&self) -> Option<f64> {
        match (self.current, self.max) {
            (Some(current), Some(max)) if max > 0 => Some(f64::from(current) / f64::from(max)),
            _ => None,
        }
    }
}

impl fmt::Display for CallLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.current, self.max) {
            (Some(current), Some(max)) => write!(f, "{current}/{max}"),
            _ => write!(f, "unknown"),
        }
    }
}
