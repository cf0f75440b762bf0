use serde::{Deserialize, Serialize};

use crate::scenario::ScenarioId;

/// Explicit engine parameters for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRunConfig {
  pub worker_threads: u32,
  pub queue_capacity: u32,
  pub processing_delay_ms: u64,
  pub message_count: u64,
}

/// Body of `POST /api/run/start`.
///
/// A preset run is sent as `{"scenario":"B"}` and the backend resolves the
/// parameters itself; a custom run sends the four fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunConfig {
  Scenario { scenario: ScenarioId },
  Custom(CustomRunConfig),
}

impl RunConfig {
  pub fn scenario(id: ScenarioId) -> Self {
    RunConfig::Scenario { scenario: id }
  }
}

impl From<CustomRunConfig> for RunConfig {
  fn from(config: CustomRunConfig) -> Self {
    RunConfig::Custom(config)
  }
}

/// Body of `POST /api/run/reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
  pub delete_disk_queue_file: bool,
}

/// Run lifecycle as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
  Idle,
  Running,
  Stopping,
  Stopped,
  /// Any state this client does not know about yet.
  #[serde(other)]
  Unknown,
}

impl RunState {
  pub fn as_str(&self) -> &'static str {
    match self {
      RunState::Idle => "IDLE",
      RunState::Running => "RUNNING",
      RunState::Stopping => "STOPPING",
      RunState::Stopped => "STOPPED",
      RunState::Unknown => "UNKNOWN",
    }
  }
}

/// Response of `GET /api/run/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusSnapshot {
  pub status: RunState,
  #[serde(default)]
  pub run_id: Option<String>,
  #[serde(default)]
  pub scenario_mode: Option<String>,
}
