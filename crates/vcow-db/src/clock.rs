//! Monotonic timestamp source.

use std::time::{SystemTime, UNIX_EPOCH};

use vcow_immutable::Timestamp;

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn wall_clock_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| Timestamp::try_from(d.as_millis()).unwrap_or(Timestamp::MAX))
}

/// Hands out strictly increasing timestamps close to wall-clock time.
///
/// Each timestamp is `max(now, previous + 1)`, so rapid writes and a wall
/// clock moving backwards still produce distinct, ordered timestamps.
#[derive(Debug, Clone)]
pub struct Clock {
    last: Timestamp,
    source: fn() -> Timestamp,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    #[must_use]
    pub fn new() -> Self {
        Self::with_source(wall_clock_millis)
    }

    /// A clock reading time from `source` instead of the system clock.
    #[must_use]
    pub fn with_source(source: fn() -> Timestamp) -> Self {
        Self {
            last: Timestamp::MIN,
            source,
        }
    }

    /// Never hand out a timestamp at or below `seen`.
    pub fn observe(&mut self, seen: Timestamp) {
        self.last = self.last.max(seen);
    }

    /// The most recent timestamp handed out or observed.
    #[must_use]
    pub const fn last(&self) -> Timestamp {
        self.last
    }

    pub fn next(&mut self) -> Timestamp {
        let next = (self.source)().max(self.last.saturating_add(1));
        self.last = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stuck_clock_still_advances() {
        let mut clock = Clock::with_source(|| 100);
        assert_eq!(clock.next(), 100);
        assert_eq!(clock.next(), 101);
        assert_eq!(clock.next(), 102);
    }

    #[test]
    fn test_observed_timestamp_is_exceeded() {
        let mut clock = Clock::with_source(|| 100);
        clock.observe(5_000);
        assert_eq!(clock.next(), 5_001);

        // Observing an older time changes nothing.
        clock.observe(10);
        assert_eq!(clock.last(), 5_001);
    }

    #[test]
    fn test_follows_wall_clock() {
        let mut clock = Clock::new();
        let before = wall_clock_millis();
        let t = clock.next();
        assert!(t >= before);
        assert!(clock.next() > t);
    }
}
