//! Named scenario presets

use msgdeck_protocol::{CustomRunConfig, ScenarioId};

/// A scenario together with the engine parameters it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioPreset {
  pub id: ScenarioId,
  pub config: CustomRunConfig,
}

const fn preset(
  id: ScenarioId,
  worker_threads: u32,
  queue_capacity: u32,
  processing_delay_ms: u64,
  message_count: u64,
) -> ScenarioPreset {
  ScenarioPreset {
    id,
    config: CustomRunConfig {
      worker_threads,
      queue_capacity,
      processing_delay_ms,
      message_count,
    },
  }
}

/// Presets in display order.
pub const SCENARIO_PRESETS: [ScenarioPreset; 4] = [
  preset(ScenarioId::A, 4, 50, 50, 30),
  preset(ScenarioId::B, 2, 5, 50, 200),
  preset(ScenarioId::C, 2, 10, 3_000, 60),
  preset(ScenarioId::D, 1, 3, 2_000, 120),
];

impl ScenarioPreset {
  pub fn for_id(id: ScenarioId) -> ScenarioPreset {
    match id {
      ScenarioId::A => SCENARIO_PRESETS[0],
      ScenarioId::B => SCENARIO_PRESETS[1],
      ScenarioId::C => SCENARIO_PRESETS[2],
      ScenarioId::D => SCENARIO_PRESETS[3],
    }
  }
}

/// Looks up the parameters of a scenario by its symbolic id.
///
/// Returns `None` for anything that is not one of the known ids.
pub fn resolve_scenario(id: &str) -> Option<CustomRunConfig> {
  let id = id.parse::<ScenarioId>().ok()?;
  Some(ScenarioPreset::for_id(id).config)
}
