//! Millisecond clock.
//!
//! Journal history is ordered by millisecond timestamps, so every component
//! that stamps a record reads time through [`Clock`]. Tests drive a
//! [`ManualClock`] forward explicitly.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

/// Source of "now" as milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    /// Move the clock forward by `millis`.
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Render a millisecond timestamp as RFC 3339 for display.
///
/// Out-of-range values render as the raw number.
#[must_use]
pub fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| millis.to_string(), |dt: DateTime<Utc>| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance(5);
        assert_eq!(clock.now_millis(), 1_005);
        clock.set(10);
        assert_eq!(clock.now_millis(), 10);
    }

    #[test]
    fn formats_epoch() {
        assert_eq!(format_millis(0), "1970-01-01T00:00:00+00:00");
    }
}
