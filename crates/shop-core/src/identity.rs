//! Connection identity.
//!
//! An identity is resolved by the auth layer before a session is created and
//! never changes for the lifetime of that session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// User id carried by anonymous connections.
pub const ANONYMOUS_USER_ID: u64 = 0;

/// Role tag attached to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    #[default]
    Guest,
}

impl Role {
    /// Wire/label representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "guest" => Ok(Self::Guest),
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }
}

/// Identity of the client behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Authenticated user id, or [`ANONYMOUS_USER_ID`].
    pub user_id: u64,
    /// Role granted by the auth layer.
    pub role: Role,
}

impl Identity {
    /// Create an identity.
    ///
    /// An anonymous user id always yields the guest role.
    pub fn new(user_id: u64, role: Role) -> Self {
        if user_id == ANONYMOUS_USER_ID {
            return Self::anonymous();
        }
        Self { user_id, role }
    }

    /// Identity of an unauthenticated client.
    pub const fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS_USER_ID,
            role: Role::Guest,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == ANONYMOUS_USER_ID
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Parse a decimal user id as forwarded by the auth layer.
pub fn parse_user_id(raw: &str) -> Result<u64, CoreError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| CoreError::InvalidUserId(raw.to_string()))
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, self.user_id)
    }
}
