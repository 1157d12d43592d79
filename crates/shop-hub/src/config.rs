//! Hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};

/// Broadcast hub configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Outbound queue capacity per session. A session whose queue is full at
    /// broadcast time is disconnected.
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,
    /// Capacity of the hub control inbox.
    #[serde(default = "default_control_queue_capacity")]
    pub control_queue_capacity: usize,
    /// Transport-level liveness probing.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

fn default_session_queue_capacity() -> usize {
    256
}

fn default_control_queue_capacity() -> usize {
    1024
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            session_queue_capacity: default_session_queue_capacity(),
            control_queue_capacity: default_control_queue_capacity(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl HubConfig {
    /// Validate capacities and heartbeat timing.
    pub fn validate(&self) -> HubResult<()> {
        if self.session_queue_capacity == 0 {
            return Err(HubError::InvalidConfig(
                "session_queue_capacity must be > 0".to_string(),
            ));
        }
        if self.control_queue_capacity == 0 {
            return Err(HubError::InvalidConfig(
                "control_queue_capacity must be > 0".to_string(),
            ));
        }
        self.heartbeat.validate()
    }
}

/// Ping/idle-timeout settings for WebSocket sessions.
///
/// Without a heartbeat a half-open connection is only detected when a write
/// to it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_enabled")]
    pub enabled: bool,
    /// Seconds between server pings.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Seconds without any inbound frame after which the peer is considered dead.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_heartbeat_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    75
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: default_heartbeat_enabled(),
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HeartbeatConfig {
    /// Heartbeat switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Ping period, if enabled.
    pub fn ping_interval(&self) -> Option<Duration> {
        self.enabled.then(|| Duration::from_secs(self.interval_secs))
    }

    /// Inbound idle timeout, if enabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.enabled.then(|| Duration::from_secs(self.timeout_secs))
    }

    fn validate(&self) -> HubResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.interval_secs == 0 {
            return Err(HubError::InvalidConfig(
                "heartbeat.interval_secs must be > 0".to_string(),
            ));
        }
        // The peer needs at least one ping interval to answer.
        if self.timeout_secs <= self.interval_secs {
            return Err(HubError::InvalidConfig(format!(
                "heartbeat.timeout_secs ({}) must exceed interval_secs ({})",
                self.timeout_secs, self.interval_secs
            )));
        }
        Ok(())
    }
}
