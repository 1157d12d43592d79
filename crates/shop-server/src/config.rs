//! Application configuration.
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults (every field is defaulted)
//! 2. TOML file (optional)
//! 3. `SHOP__<SECTION>__<FIELD>` environment variables

use std::net::SocketAddr;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use shop_hub::HubConfig;
use shop_ratelimit::RateLimitConfig;

use crate::error::{AppError, AppResult};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SHOP";

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    pub fn bind_addr(&self) -> AppResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid bind address: {e}")))
    }
}

/// Headers the upstream auth gateway sets after verifying a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
    #[serde(default = "default_role_header")]
    pub role_header: String,
}

fn default_user_id_header() -> String {
    "x-user-id".to_string()
}

fn default_role_header() -> String {
    "x-user-role".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id_header: default_user_id_header(),
            role_header: default_role_header(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl AppConfig {
    /// Load configuration from an optional file plus environment overrides.
    ///
    /// A missing file is not an error; defaults and the environment apply.
    pub fn load(path: &str) -> AppResult<Self> {
        if !Path::new(path).exists() {
            tracing::warn!(path = %path, "Config file not found, using defaults");
        }

        let config: Self = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| AppError::Config(format!("Failed to load config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string, without environment overrides.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> AppResult<()> {
        self.server.bind_addr()?;
        self.hub.validate()?;
        self.rate_limit.validate()?;
        if self.identity.user_id_header.trim().is_empty()
            || self.identity.role_header.trim().is_empty()
        {
            return Err(AppError::Config(
                "identity headers must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
