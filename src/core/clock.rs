//! Synthetic time source
//!
//! Scheduling components never read wall-clock time. They are handed a
//! [`Clock`] by the kitchen that owns it, so tests can drive time by hand.

use crate::core::types::Timestamp;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Monotonic simulated clock
pub trait Clock: Send + Sync {
    /// Current simulated instant
    fn now(&self) -> Timestamp;

    /// Move the clock forward and return the new instant
    ///
    /// Negative steps are ignored so the clock never runs backwards.
    fn advance(&self, by: Duration) -> Timestamp;
}

/// Clock advanced only by explicit calls
///
/// Stored with millisecond resolution.
#[derive(Debug)]
pub struct SyntheticClock {
    millis: AtomicI64,
}

impl SyntheticClock {
    /// Create a new clock starting at the given instant
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }
}

impl Clock for SyntheticClock {
    fn now(&self) -> Timestamp {
        DateTime::<Utc>::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }

    fn advance(&self, by: Duration) -> Timestamp {
        let step = by.num_milliseconds().max(0);
        let millis = self.millis.fetch_add(step, Ordering::SeqCst) + step;
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clock_starts_at_given_instant() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let clock = SyntheticClock::new(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_advance_moves_forward() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let clock = SyntheticClock::new(start);
        let next = clock.advance(Duration::seconds(60));
        assert_eq!(next, start + Duration::seconds(60));
        assert_eq!(clock.now(), next);
    }

    #[test]
    fn test_negative_step_is_ignored() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let clock = SyntheticClock::new(start);
        clock.advance(Duration::seconds(-30));
        assert_eq!(clock.now(), start);
    }
}
