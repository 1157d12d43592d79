//! Prometheus metrics and structured logging for the shop realtime services.
//!
//! - Structured logging with tracing (JSON, pretty or compact, chosen from the environment)
//! - Prometheus metrics for sessions, fan-out and rate limiting

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, LogFormat, DEFAULT_FILTER};
pub use metrics::Metrics;
