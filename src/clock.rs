//! Time source abstraction
//!
//! Rotation and retention both depend on "today". Going through a `Clock` lets tests
//! jump across midnight without sleeping.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    /// Create a clock frozen at the given instant
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Create a clock frozen at the current wall-clock instant
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fake_clock_advance_is_shared() {
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 23, 59, 0).unwrap();
        let clock = FakeClock::at(start);
        let other = clock.clone();

        other.advance(Duration::minutes(2));

        assert_eq!(
            clock.now(),
            Utc.with_ymd_and_hms(2026, 10, 19, 0, 1, 0).unwrap()
        );
    }

    #[test]
    fn test_fake_clock_set() {
        let clock = FakeClock::new();
        let target = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
