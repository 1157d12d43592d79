//! Per-(client, route) rate limiter registry.
//!
//! Entries are created lazily on the first request for a key, each seeded
//! with its own bucket from the policy table. A single mutex guards the
//! map; every decision is O(1) arithmetic under the lock.
//!
//! Clients that disappear never announce it, so a background sweep reclaims
//! entries that have been idle longer than the configured TTL. A reclaimed
//! key that comes back starts over with a full bucket.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shop_telemetry::Metrics;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::bucket::TokenBucket;
use crate::config::{PolicyTable, RateLimitConfig};

/// Registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimiterKey {
    pub client: String,
    pub route: String,
}

impl LimiterKey {
    pub fn new(client: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            route: route.into(),
        }
    }
}

/// Bucket state plus last access time for one key.
#[derive(Debug, Clone)]
pub struct LimiterEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

impl LimiterEntry {
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// Token bucket rate limiter keyed by client and route.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    table: PolicyTable,
    idle_ttl: Duration,
    sweep_interval: Duration,
    trust_proxy_headers: bool,
    entries: Mutex<HashMap<LimiterKey, LimiterEntry>>,
}

impl RateLimiter {
    /// Build a limiter from validated configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            table: PolicyTable::new(config),
            idle_ttl: config.idle_ttl(),
            sweep_interval: config.sweep_interval(),
            trust_proxy_headers: config.trust_proxy_headers,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn trusts_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }

    /// Admit or reject one request from `client` to the normalized `route`.
    ///
    /// Always admits when the limiter is disabled.
    pub fn allow(&self, client: &str, route: &str) -> bool {
        self.allow_at(client, route, Instant::now())
    }

    pub fn allow_at(&self, client: &str, route: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let (label, policy) = self.table.policy_for(route);
        let allowed = {
            let mut entries = self.entries.lock();
            let entry = entries
                .entry(LimiterKey::new(client, route))
                .or_insert_with(|| LimiterEntry {
                    bucket: TokenBucket::new(policy, now),
                    last_seen: now,
                });
            if now > entry.last_seen {
                entry.last_seen = now;
            }
            entry.bucket.try_acquire(now)
        };

        Metrics::rate_limit_decision(label, allowed);
        if !allowed {
            debug!(client, route, policy = label, "Rate limit exceeded");
        }
        allowed
    }

    /// Remove entries idle longer than the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let (evicted, remaining) = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|_, entry| {
                now.saturating_duration_since(entry.last_seen) <= self.idle_ttl
            });
            (before - entries.len(), entries.len())
        };

        Metrics::rate_limit_swept(evicted, remaining);
        if evicted > 0 {
            debug!(evicted, remaining, "Reclaimed idle rate limiter entries");
        } else {
            trace!(remaining, "Rate limiter sweep found nothing idle");
        }
        evicted
    }

    /// Live entries.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn contains(&self, client: &str, route: &str) -> bool {
        self.entries
            .lock()
            .contains_key(&LimiterKey::new(client, route))
    }

    /// Run [`sweep`](Self::sweep) every sweep interval until `shutdown` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = self.sweep_interval;

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(interval_secs = period.as_secs(), "Rate limiter sweeper started");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        limiter.sweep();
                    }
                }
            }

            debug!("Rate limiter sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutePolicy;
    use std::collections::BTreeMap;

    fn limiter_with(route: &str, policy: RoutePolicy) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            routes: BTreeMap::from([(route.to_string(), policy)]),
            ..RateLimitConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_exactly_burst_then_rejects() {
        let limiter = limiter_with("/api/cart", RoutePolicy::new(1.0, 4));

        for _ in 0..4 {
            assert!(limiter.allow("10.0.0.1", "/api/cart"));
        }
        assert!(!limiter.allow("10.0.0.1", "/api/cart"));
        assert_eq!(limiter.entry_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_key_recovers_after_refill() {
        let limiter = limiter_with("/api/login", RoutePolicy::new(0.1, 3));
        for _ in 0..3 {
            assert!(limiter.allow("10.0.0.1", "/api/login"));
        }
        assert!(!limiter.allow("10.0.0.1", "/api/login"));

        time::advance(Duration::from_secs(9)).await;
        assert!(!limiter.allow("10.0.0.1", "/api/login"));

        time::advance(Duration::from_secs(2)).await;
        assert!(limiter.allow("10.0.0.1", "/api/login"));
        assert!(!limiter.allow("10.0.0.1", "/api/login"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_client_admitted_when_token_refills() {
        let limiter = limiter_with("/api/login", RoutePolicy::new(0.1, 3));
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.allow_at("10.0.0.1", "/api/login", start));
        }

        let admitted_at = (1..=11u64).find(|secs| {
            limiter.allow_at("10.0.0.1", "/api/login", start + Duration::from_secs(*secs))
        });
        assert_eq!(admitted_at, Some(10));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allow_on_one_key_admits_exactly_burst() {
        let limiter = Arc::new(limiter_with("/api/cart", RoutePolicy::new(0.001, 5)));

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.allow("10.0.0.1", "/api/cart") })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
        assert_eq!(limiter.entry_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allow_on_distinct_keys() {
        let limiter = Arc::new(limiter_with("/api/cart", RoutePolicy::new(0.001, 2)));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    let client = format!("10.0.0.{}", i % 8);
                    limiter.allow(&client, "/api/cart")
                })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        // 8 clients, 2 tokens each.
        assert_eq!(admitted, 16);
        assert_eq!(limiter.entry_count(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = limiter_with("/api/cart/bulk", RoutePolicy::new(0.5, 1));

        assert!(limiter.allow("10.0.0.1", "/api/cart/bulk"));
        assert!(!limiter.allow("10.0.0.1", "/api/cart/bulk"));

        // Same route, different client.
        assert!(limiter.allow("10.0.0.2", "/api/cart/bulk"));
        // Same client, different route (default policy).
        assert!(limiter.allow("10.0.0.1", "/api/products"));
        assert_eq!(limiter.entry_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_for_unlisted_route() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());
        for _ in 0..5 {
            assert!(limiter.allow("c", "/api/products"));
        }
        assert!(!limiter.allow("c", "/api/products"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        for _ in 0..100 {
            assert!(limiter.allow("c", "/api/login"));
        }
        assert_eq!(limiter.entry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_reclaims_only_idle_entries() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());
        let start = Instant::now();

        assert!(limiter.allow_at("idle", "/api/cart", start));
        assert!(limiter.allow_at("busy", "/api/cart", start));
        assert!(limiter.allow_at("busy", "/api/cart", start + Duration::from_secs(120)));

        assert_eq!(limiter.sweep_at(start + Duration::from_secs(180)), 0);
        assert_eq!(limiter.sweep_at(start + Duration::from_secs(181)), 1);
        assert!(!limiter.contains("idle", "/api/cart"));
        assert!(limiter.contains("busy", "/api/cart"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reclaimed_key_starts_with_full_burst() {
        let limiter = limiter_with("/api/cart", RoutePolicy::new(0.001, 2));
        let start = Instant::now();

        assert!(limiter.allow_at("c", "/api/cart", start));
        assert!(limiter.allow_at("c", "/api/cart", start));
        assert!(!limiter.allow_at("c", "/api/cart", start));

        let later = start + Duration::from_secs(200);
        assert_eq!(limiter.sweep_at(later), 1);

        assert!(limiter.allow_at("c", "/api/cart", later));
        assert!(limiter.allow_at("c", "/api/cart", later));
        assert!(!limiter.allow_at("c", "/api/cart", later));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_reclaims_and_stops() {
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig::default()));
        let shutdown = CancellationToken::new();
        let sweeper = limiter.spawn_sweeper(shutdown.clone());

        assert!(limiter.allow("c", "/api/cart"));

        // Sweeps at 60s, 120s and 180s find the entry still within its TTL.
        time::sleep(Duration::from_secs(181)).await;
        assert_eq!(limiter.entry_count(), 1);

        // The sweep at 240s reclaims it.
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(limiter.entry_count(), 0);

        shutdown.cancel();
        sweeper.await.unwrap();
    }
}
