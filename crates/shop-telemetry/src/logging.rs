//! Structured logging initialization.
//!
//! The filter comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. The
//! output format is chosen by `SHOP_LOG_FORMAT` (`json`, `pretty` or
//! `compact`); when unset, `RUST_ENV=production` selects JSON and anything
//! else pretty output.

use std::fmt;
use std::str::FromStr;

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as fmt_layer, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str =
    "info,shop_hub=debug,shop_ratelimit=debug,shop_server=debug,tower_http=info";

const LOG_FORMAT_VAR: &str = "SHOP_LOG_FORMAT";
const RUST_ENV_VAR: &str = "RUST_ENV";

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with span context. For log shippers.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    Compact,
}

impl LogFormat {
    /// Pick the format from the `SHOP_LOG_FORMAT` and `RUST_ENV` values.
    ///
    /// An explicit format wins. An unrecognized one is ignored.
    pub fn resolve(log_format: Option<&str>, rust_env: Option<&str>) -> Self {
        if let Some(format) = log_format.and_then(|v| v.parse().ok()) {
            return format;
        }
        match rust_env {
            Some(env) if env.trim().eq_ignore_ascii_case("production") => Self::Json,
            _ => Self::Pretty,
        }
    }

    fn from_env() -> Self {
        let log_format = std::env::var(LOG_FORMAT_VAR).ok();
        let rust_env = std::env::var(RUST_ENV_VAR).ok();
        Self::resolve(log_format.as_deref(), rust_env.as_deref())
    }
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(TelemetryError::LoggingInit(format!(
                "unknown log format: {other}"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        })
    }
}

/// Initialize structured logging from the environment.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging() -> TelemetryResult<LogFormat> {
    let format = LogFormat::from_env();
    init_logging_with(format)?;
    Ok(format)
}

/// Initialize structured logging with an explicit format.
pub fn init_logging_with(format: LogFormat) -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt_layer::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt_layer::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt_layer::layer().compact().with_target(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
