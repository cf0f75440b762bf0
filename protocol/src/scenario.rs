use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named scenario understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScenarioId {
  /// Small burst, no spill.
  A,
  /// Spike that spills to disk.
  B,
  /// Slow workers building a backlog.
  C,
  /// Hard saturation followed by recovery.
  D,
}

impl ScenarioId {
  pub const ALL: [ScenarioId; 4] = [ScenarioId::A, ScenarioId::B, ScenarioId::C, ScenarioId::D];

  pub fn as_str(&self) -> &'static str {
    match self {
      ScenarioId::A => "A",
      ScenarioId::B => "B",
      ScenarioId::C => "C",
      ScenarioId::D => "D",
    }
  }
}

impl fmt::Display for ScenarioId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scenario: {0:?}")]
pub struct ParseScenarioError(pub String);

impl FromStr for ScenarioId {
  type Err = ParseScenarioError;

  /// Accepts surrounding whitespace and either case, as the backend does.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "A" => Ok(ScenarioId::A),
      "B" => Ok(ScenarioId::B),
      "C" => Ok(ScenarioId::C),
      "D" => Ok(ScenarioId::D),
      _ => Err(ParseScenarioError(s.to_string())),
    }
  }
}
