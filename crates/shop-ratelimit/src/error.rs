//! Rate limiter error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Invalid policy for route {route}: {reason}")]
    InvalidPolicy { route: String, reason: String },

    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(String),
}

pub type RateLimitResult<T> = Result<T, RateLimitError>;
