//! Shop realtime server.
//!
//! Wires the broadcast hub and the rate limiter into an axum HTTP server:
//! - WebSocket endpoints feeding the hub
//! - Rate-limited event ingress for producers
//! - Health and Prometheus endpoints

pub mod app;
pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use identity::{HeaderIdentityResolver, IdentityResolver};
