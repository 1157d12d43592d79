//! Per-client, per-route rate limiting.
//!
//! Every (client address, route) pair gets its own token bucket, seeded from
//! a static route policy table. Idle entries are reclaimed by a background
//! sweeper so that clients which vanish do not leak state.
//!
//! # Key Components
//!
//! - [`RateLimiter`]: Registry of buckets; `allow` decides admit/reject
//! - [`RateLimitConfig`] / [`RoutePolicy`]: Policy table and sweep timing
//! - [`rate_limit`]: axum middleware mapping rejections to `429`

pub mod bucket;
pub mod config;
pub mod error;
pub mod limiter;
pub mod middleware;

pub use bucket::TokenBucket;
pub use config::{default_routes, PolicyTable, RateLimitConfig, RoutePolicy, DEFAULT_POLICY_LABEL};
pub use error::{RateLimitError, RateLimitResult};
pub use limiter::{LimiterEntry, LimiterKey, RateLimiter};
pub use middleware::{client_key, normalize_route, rate_limit, TOO_MANY_REQUESTS_BODY};
