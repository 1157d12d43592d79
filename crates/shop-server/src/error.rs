//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hub error: {0}")]
    Hub(#[from] shop_hub::HubError),

    #[error("Rate limit error: {0}")]
    RateLimit(#[from] shop_ratelimit::RateLimitError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] shop_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
