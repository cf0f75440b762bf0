// Configuration Types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// Backend location and HTTP timeouts
  pub server: ServerConfig,
  /// Live event stream tuning
  pub stream: StreamConfig,
  /// Run status polling
  pub status: StatusConfig,
}

impl Config {
  /// Rejects values that would stall or spin the clients.
  pub fn validate(&self) -> Result<()> {
    let non_zero = [
      ("server.request_timeout_ms", self.server.request_timeout_ms),
      ("server.connect_timeout_ms", self.server.connect_timeout_ms),
      ("stream.staleness_threshold_ms", self.stream.staleness_threshold_ms),
      ("stream.watchdog_interval_ms", self.stream.watchdog_interval_ms),
      ("stream.reconnect_delay_ms", self.stream.reconnect_delay_ms),
      ("status.poll_interval_ms", self.status.poll_interval_ms),
    ];
    for (key, value) in non_zero {
      if value == 0 {
        return Err(ConfigError::Invalid {
          key,
          reason: "must be greater than zero".to_string(),
        });
      }
    }
    if self.stream.log_capacity == 0 {
      return Err(ConfigError::Invalid {
        key: "stream.log_capacity",
        reason: "must be greater than zero".to_string(),
      });
    }
    if self.server.base_url.trim().is_empty() {
      return Err(ConfigError::Invalid {
        key: "server.base_url",
        reason: "must not be empty".to_string(),
      });
    }
    Ok(())
  }
}

// ============================================================================
// SERVER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
  /// Base URL the `api/...` paths are joined onto
  pub base_url: String,
  /// Whole-request timeout for control and status calls
  pub request_timeout_ms: u64,
  /// Connect timeout for control and status calls
  pub connect_timeout_ms: u64,
}

impl ServerConfig {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout_ms)
  }

  pub fn connect_timeout(&self) -> Duration {
    Duration::from_millis(self.connect_timeout_ms)
  }
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8080".to_string(),
      request_timeout_ms: 10_000,
      connect_timeout_ms: 5_000,
    }
  }
}

// ============================================================================
// STREAM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
  /// Maximum number of events kept in the log
  pub log_capacity: usize,
  /// Silence tolerated on a connected stream
  pub staleness_threshold_ms: u64,
  /// Cadence of the liveness check
  pub watchdog_interval_ms: u64,
  /// Pause before reopening a failed stream
  pub reconnect_delay_ms: u64,
}

impl Default for StreamConfig {
  fn default() -> Self {
    Self {
      log_capacity: 300,
      staleness_threshold_ms: 5_000,
      watchdog_interval_ms: 1_000,
      reconnect_delay_ms: 3_000,
    }
  }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusConfig {
  pub poll_interval_ms: u64,
}

impl Default for StatusConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: 5_000,
    }
  }
}
