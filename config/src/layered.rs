// Layered Configuration
// Deep merge of configuration layers with precedence

use std::fmt;
use std::path::PathBuf;

use toml::{Table, Value};

use crate::error::{ConfigError, Result};
use crate::types::Config;

/// Layered configuration, lowest precedence first
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
  layers: Vec<ConfigLayer>,
}

/// Configuration layer with source tracking
#[derive(Debug, Clone)]
pub struct ConfigLayer {
  pub source: ConfigLayerSource,
  pub values: Table,
}

/// Where a layer came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayerSource {
  /// Built-in defaults
  Default,
  /// Global user config
  GlobalConfig(PathBuf),
  /// Project-specific config
  ProjectConfig(PathBuf),
  /// `-c key=value`
  CliOverride(String),
}

impl fmt::Display for ConfigLayerSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigLayerSource::Default => f.write_str("built-in defaults"),
      ConfigLayerSource::GlobalConfig(path) | ConfigLayerSource::ProjectConfig(path) => {
        write!(f, "{}", path.display())
      }
      ConfigLayerSource::CliOverride(key) => write!(f, "override {key}"),
    }
  }
}

impl LayeredConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a layer on top of the existing ones.
  ///
  /// The layer is checked against the schema on its own so a bad key is
  /// reported against the file or override that introduced it.
  pub fn add_layer(&mut self, layer: ConfigLayer) -> Result<()> {
    Value::Table(layer.values.clone())
      .try_into::<Config>()
      .map_err(|source| ConfigError::Parse {
        source_layer: layer.source.clone(),
        source,
      })?;
    self.layers.push(layer);
    Ok(())
  }

  pub fn layers(&self) -> &[ConfigLayer] {
    &self.layers
  }

  /// Merged table; later layers win key by key, nested tables merge.
  pub fn merge(&self) -> Table {
    let mut merged = Table::new();
    for layer in &self.layers {
      merge_tables(&mut merged, &layer.values);
    }
    merged
  }

  /// Merges all layers and deserializes the result.
  pub fn resolve(&self) -> Result<Config> {
    let source_layer = self
      .layers
      .last()
      .map(|layer| layer.source.clone())
      .unwrap_or(ConfigLayerSource::Default);
    Value::Table(self.merge())
      .try_into::<Config>()
      .map_err(|source| ConfigError::Parse {
        source_layer,
        source,
      })
  }
}

fn merge_tables(base: &mut Table, overlay: &Table) {
  for (key, value) in overlay {
    match (base.get_mut(key), value) {
      (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
        merge_tables(base_table, overlay_table);
      }
      _ => {
        base.insert(key.clone(), value.clone());
      }
    }
  }
}
