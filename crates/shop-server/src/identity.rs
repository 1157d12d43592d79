//! Identity resolution at the HTTP boundary.
//!
//! Token verification happens upstream. The gateway forwards the verified
//! user id and role as request headers, and this module turns them into an
//! [`Identity`]. Anything missing or malformed resolves to the anonymous
//! guest.

use axum::http::HeaderMap;
use shop_core::{parse_user_id, Identity, Role};
use tracing::debug;

use crate::config::IdentityConfig;

/// Maps request headers to the identity of the caller.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Identity;
}

/// Reads identity from gateway-set headers.
#[derive(Debug, Clone)]
pub struct HeaderIdentityResolver {
    user_id_header: String,
    role_header: String,
}

impl HeaderIdentityResolver {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            user_id_header: config.user_id_header.to_ascii_lowercase(),
            role_header: config.role_header.to_ascii_lowercase(),
        }
    }

    fn header<'a>(&self, headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl Default for HeaderIdentityResolver {
    fn default() -> Self {
        Self::new(&IdentityConfig::default())
    }
}

impl IdentityResolver for HeaderIdentityResolver {
    fn resolve(&self, headers: &HeaderMap) -> Identity {
        let Some(raw_id) = self.header(headers, &self.user_id_header) else {
            return Identity::anonymous();
        };

        let user_id = match parse_user_id(raw_id) {
            Ok(id) => id,
            Err(e) => {
                debug!(error = %e, "Ignoring unparseable user id header");
                return Identity::anonymous();
            }
        };

        let role = match self.header(headers, &self.role_header) {
            Some(raw) => raw.parse::<Role>().unwrap_or_else(|e| {
                debug!(error = %e, "Unknown role header, treating as guest");
                Role::Guest
            }),
            None => Role::User,
        };

        Identity::new(user_id, role)
    }
}
