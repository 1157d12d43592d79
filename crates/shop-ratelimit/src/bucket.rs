//! Token bucket.

use tokio::time::Instant;

use crate::config::RoutePolicy;

/// Capped token count replenished at a fixed rate.
///
/// Time is passed in by the caller so the limiter can evaluate a whole
/// decision against one clock reading.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate_per_sec: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket for `policy`.
    pub fn new(policy: RoutePolicy, now: Instant) -> Self {
        let capacity = f64::from(policy.burst);
        Self {
            rate_per_sec: policy.rate_per_sec,
            capacity,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Take one token if available.
    ///
    /// A rejected call leaves the bucket untouched, so refill is always
    /// measured from the last successful take.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let available = self.available(now);
        if available < 1.0 {
            return false;
        }
        self.tokens = available - 1.0;
        if now > self.last_refill {
            self.last_refill = now;
        }
        true
    }

    /// Tokens available at `now`, without consuming any.
    pub fn available(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * self.rate_per_sec).min(self.capacity)
    }
}
