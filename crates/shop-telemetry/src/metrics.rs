//! Prometheus metrics for the shop realtime services.
//!
//! Covers:
//! - Live WebSocket sessions and their churn
//! - Event fan-out (broadcasts, deliveries, slow-consumer drops)
//! - Rate limiter decisions and entry reclamation
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. Registration only fails
//! on duplicate metric names, which is a programming error that must surface
//! at startup. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Currently registered WebSocket sessions.
pub static WS_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("shop_ws_sessions", "Currently registered WebSocket sessions").unwrap()
});

/// Total sessions registered since start.
pub static WS_SESSIONS_REGISTERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "shop_ws_sessions_registered_total",
        "Total WebSocket sessions registered"
    )
    .unwrap()
});

/// Sessions removed by the hub, by reason.
/// Labels: reason (disconnect/queue_full/queue_closed/shutdown)
pub static WS_SESSIONS_REMOVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "shop_ws_sessions_removed_total",
        "Total WebSocket sessions removed by the hub",
        &["reason"]
    )
    .unwrap()
});

/// Events broadcast, by event type.
pub static WS_BROADCAST_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "shop_ws_broadcast_total",
        "Total events broadcast through the hub",
        &["type"]
    )
    .unwrap()
});

/// Per-session enqueues, by event type.
pub static WS_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "shop_ws_deliveries_total",
        "Total event payloads enqueued to sessions",
        &["type"]
    )
    .unwrap()
});

/// Rate limiter decisions.
/// Labels: policy (configured route or "default"), outcome (allowed/rejected)
pub static RATE_LIMIT_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "shop_rate_limit_decisions_total",
        "Total rate limiter decisions",
        &["policy", "outcome"]
    )
    .unwrap()
});

/// Live limiter entries after the last sweep.
pub static RATE_LIMIT_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "shop_rate_limit_entries",
        "Rate limiter entries alive after the last sweep"
    )
    .unwrap()
});

/// Limiter entries reclaimed by the idle sweep.
pub static RATE_LIMIT_EVICTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "shop_rate_limit_evicted_total",
        "Total idle rate limiter entries reclaimed"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set the live session gauge.
    pub fn ws_sessions_set(count: usize) {
        WS_SESSIONS.set(count as i64);
    }

    /// Record a session registration.
    pub fn ws_session_registered() {
        WS_SESSIONS_REGISTERED_TOTAL.inc();
    }

    /// Record a session removal.
    pub fn ws_session_removed(reason: &str) {
        WS_SESSIONS_REMOVED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record one broadcast and how many sessions it reached.
    pub fn ws_broadcast(event_type: &str, delivered: usize) {
        WS_BROADCAST_TOTAL.with_label_values(&[event_type]).inc();
        WS_DELIVERIES_TOTAL
            .with_label_values(&[event_type])
            .inc_by(delivered as u64);
    }

    /// Record a rate limiter decision.
    pub fn rate_limit_decision(policy: &str, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "rejected" };
        RATE_LIMIT_DECISIONS_TOTAL
            .with_label_values(&[policy, outcome])
            .inc();
    }

    /// Record the outcome of an idle sweep.
    pub fn rate_limit_swept(evicted: usize, remaining: usize) {
        RATE_LIMIT_EVICTED_TOTAL.inc_by(evicted as u64);
        RATE_LIMIT_ENTRIES.set(remaining as i64);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_touched_metrics() {
        Metrics::ws_session_registered();
        Metrics::ws_broadcast("new_order", 3);
        Metrics::rate_limit_decision("/api/login", false);

        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("shop_ws_sessions_registered_total"));
        assert!(text.contains("shop_ws_deliveries_total{type=\"new_order\"}"));
        assert!(text.contains("outcome=\"rejected\""));
    }

    #[test]
    fn test_sweep_sets_entry_gauge() {
        Metrics::rate_limit_swept(2, 5);
        assert_eq!(RATE_LIMIT_ENTRIES.get(), 5);
    }
}
