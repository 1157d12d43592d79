//! Hub error types.
//!
//! Hub operations themselves never fail towards callers; these errors cover
//! configuration and payload encoding.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Invalid hub configuration: {0}")]
    InvalidConfig(String),

    #[error("Event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type HubResult<T> = Result<T, HubError>;
