//! Redraw-notification coalescing
//!
//! Terminal output arrives in bursts far faster than a host can redraw.
//! The coalescer collapses a burst into one notification while bounding
//! latency: a short debounce delay restarts on every update request, and a
//! longer max-latency delay starts with the first request of a burst and is
//! never restarted. Whichever expires first fires the notification.
//!
//! Both deadlines are plain state advanced by a caller-driven clock, so the
//! host's event loop (or a test) decides when time passes.

use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(10);
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_millis(40);

/// Two-deadline debounce/max-latency coalescer.
pub struct UpdateCoalescer {
    debounce: Duration,
    max_latency: Duration,
    debounce_deadline: Option<Instant>,
    latency_deadline: Option<Instant>,
}

impl Default for UpdateCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, DEFAULT_MAX_LATENCY)
    }
}

impl UpdateCoalescer {
    pub fn new(debounce: Duration, max_latency: Duration) -> Self {
        Self {
            debounce,
            max_latency,
            debounce_deadline: None,
            latency_deadline: None,
        }
    }

    /// Register an update: restart the debounce deadline, and start the
    /// max-latency deadline only if none is pending.
    pub fn request_update(&mut self, now: Instant) {
        self.debounce_deadline = Some(now + self.debounce);
        if self.latency_deadline.is_none() {
            self.latency_deadline = Some(now + self.max_latency);
        }
    }

    /// True when either deadline has expired.
    pub fn due(&self, now: Instant) -> bool {
        let expired = |deadline: Option<Instant>| deadline.is_some_and(|at| at <= now);
        expired(self.debounce_deadline) || expired(self.latency_deadline)
    }

    /// Consume an expired deadline. Returns true exactly once per burst;
    /// both deadlines are cleared together so the caller can emit the
    /// notification and reset the redraw counters atomically with it.
    pub fn fire(&mut self, now: Instant) -> bool {
        if !self.due(now) {
            return false;
        }
        self.clear();
        true
    }

    /// Force an immediate notification regardless of pending deadlines.
    /// Returns true if anything (pending or not) should be redrawn now.
    pub fn flush(&mut self) -> bool {
        self.clear();
        true
    }

    pub fn is_pending(&self) -> bool {
        self.debounce_deadline.is_some() || self.latency_deadline.is_some()
    }

    fn clear(&mut self) {
        self.debounce_deadline = None;
        self.latency_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn burst_fires_once_at_debounce_expiry() {
        let base = Instant::now();
        let mut c = UpdateCoalescer::default();

        for ms in [0, 5, 9, 12] {
            assert!(!c.fire(at(base, ms)), "must not fire mid-burst at {ms}ms");
            c.request_update(at(base, ms));
        }

        // Debounce restarted at 12ms fires at 22ms; max-latency (from 0ms)
        // would fire at 40ms. The earlier one wins.
        assert!(!c.due(at(base, 21)));
        assert!(c.fire(at(base, 22)));
        // Exactly one notification per burst.
        assert!(!c.fire(at(base, 22)));
        assert!(!c.is_pending());
    }

    #[test]
    fn sustained_requests_hit_max_latency() {
        let base = Instant::now();
        let mut c = UpdateCoalescer::default();

        // Requests every 5ms forever keep restarting the debounce deadline,
        // but the max-latency deadline from t=0 still forces a fire by 40ms.
        let mut fired_at = None;
        for ms in (0..=100).step_by(5) {
            if c.fire(at(base, ms)) {
                fired_at = Some(ms);
                break;
            }
            c.request_update(at(base, ms));
        }
        assert_eq!(fired_at, Some(40));
    }

    #[test]
    fn single_request_fires_after_debounce() {
        let base = Instant::now();
        let mut c = UpdateCoalescer::default();
        c.request_update(base);

        assert!(!c.due(at(base, 9)));
        assert!(c.fire(at(base, 10)));
    }

    #[test]
    fn flush_clears_pending_deadlines() {
        let base = Instant::now();
        let mut c = UpdateCoalescer::default();
        c.request_update(base);
        assert!(c.flush());
        assert!(!c.is_pending());
        assert!(!c.fire(at(base, 100)));
    }
}
