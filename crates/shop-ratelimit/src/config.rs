//! Rate limit policies and configuration.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RateLimitError, RateLimitResult};
use crate::middleware::normalize_route;

/// Metric/log label for requests served by the default policy.
pub const DEFAULT_POLICY_LABEL: &str = "default";

/// Token bucket parameters for one route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePolicy {
    /// Tokens added per second.
    pub rate_per_sec: f64,
    /// Bucket capacity, and the tokens a fresh bucket starts with.
    pub burst: u32,
}

impl RoutePolicy {
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        Self {
            rate_per_sec,
            burst,
        }
    }

    fn validate(&self, route: &str) -> RateLimitResult<()> {
        if !self.rate_per_sec.is_finite() || self.rate_per_sec <= 0.0 {
            return Err(RateLimitError::InvalidPolicy {
                route: route.to_string(),
                reason: format!("rate_per_sec must be > 0, got {}", self.rate_per_sec),
            });
        }
        if self.burst == 0 {
            return Err(RateLimitError::InvalidPolicy {
                route: route.to_string(),
                reason: "burst must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(1.0, 5)
    }
}

/// Route table shipped with the service.
///
/// Login and registration are abuse-prone and get a slow, low-burst
/// bucket. Bulk cart updates are stricter than single cart updates.
pub fn default_routes() -> BTreeMap<String, RoutePolicy> {
    BTreeMap::from([
        ("/api/login".to_string(), RoutePolicy::new(0.1, 3)),
        ("/api/register".to_string(), RoutePolicy::new(0.1, 3)),
        ("/api/cart".to_string(), RoutePolicy::new(1.0, 2)),
        ("/api/cart/bulk".to_string(), RoutePolicy::new(0.5, 1)),
    ])
}

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// When false every request is admitted.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between idle-entry sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Entries untouched for longer than this are reclaimed.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
    /// Derive the client key from `X-Real-IP`/`X-Forwarded-For`.
    /// Only safe behind a proxy that overwrites these headers.
    #[serde(default = "default_trust_proxy_headers")]
    pub trust_proxy_headers: bool,
    /// Policy for routes not listed in `routes`.
    #[serde(default)]
    pub default_policy: RoutePolicy,
    #[serde(default = "default_routes")]
    pub routes: BTreeMap<String, RoutePolicy>,
}

fn default_enabled() -> bool {
    true
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_idle_ttl_secs() -> u64 {
    180
}

fn default_trust_proxy_headers() -> bool {
    true
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sweep_interval_secs: default_sweep_interval_secs(),
            idle_ttl_secs: default_idle_ttl_secs(),
            trust_proxy_headers: default_trust_proxy_headers(),
            default_policy: RoutePolicy::default(),
            routes: default_routes(),
        }
    }
}

impl RateLimitConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    /// Validate every policy and the sweep timing.
    pub fn validate(&self) -> RateLimitResult<()> {
        if self.sweep_interval_secs == 0 {
            return Err(RateLimitError::InvalidConfig(
                "sweep_interval_secs must be > 0".to_string(),
            ));
        }
        if self.idle_ttl_secs == 0 {
            return Err(RateLimitError::InvalidConfig(
                "idle_ttl_secs must be > 0".to_string(),
            ));
        }
        self.default_policy.validate(DEFAULT_POLICY_LABEL)?;
        for (route, policy) in &self.routes {
            policy.validate(route)?;
        }
        Ok(())
    }
}

/// Immutable route lookup built from [`RateLimitConfig`].
#[derive(Debug, Clone)]
pub struct PolicyTable {
    routes: HashMap<String, RoutePolicy>,
    default_policy: RoutePolicy,
}

impl PolicyTable {
    pub fn new(config: &RateLimitConfig) -> Self {
        let routes = config
            .routes
            .iter()
            .map(|(route, policy)| (normalize_route(route), *policy))
            .collect();
        Self {
            routes,
            default_policy: config.default_policy,
        }
    }

    /// Policy for a normalized route, with its label.
    ///
    /// The label is the configured route or [`DEFAULT_POLICY_LABEL`], which
    /// keeps metric cardinality bounded by the table size.
    pub fn policy_for<'a>(&'a self, route: &str) -> (&'a str, RoutePolicy) {
        match self.routes.get_key_value(route) {
            Some((label, policy)) => (label.as_str(), *policy),
            None => (DEFAULT_POLICY_LABEL, self.default_policy),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
