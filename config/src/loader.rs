// Configuration Loader
// Layered configuration loading system

use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::layered::{ConfigLayer, ConfigLayerSource, LayeredConfig};
use crate::types::Config;

const CONFIG_DIR: &str = ".msgdeck";
const CONFIG_FILE: &str = "config.toml";

/// Configuration loader with layered support
pub struct ConfigLoader {
  /// Global config directory
  global_dir: PathBuf,
  /// Project config directory
  project_dir: Option<PathBuf>,
}

impl ConfigLoader {
  pub fn new() -> Self {
    let global_dir = dirs::home_dir()
      .unwrap_or_else(|| PathBuf::from("."))
      .join(CONFIG_DIR);

    Self {
      global_dir,
      project_dir: None,
    }
  }

  pub fn with_global_dir(mut self, dir: PathBuf) -> Self {
    self.global_dir = dir;
    self
  }

  pub fn with_project_dir(mut self, dir: PathBuf) -> Self {
    self.project_dir = Some(dir);
    self
  }

  /// Load configuration with CLI overrides
  pub fn load_with_cli_overrides(&self, cli_overrides: Vec<(String, String)>) -> Result<Config> {
    // Layers in order:
    // 1. Built-in defaults (serde defaults)
    // 2. Global config (~/.msgdeck/config.toml)
    // 3. Project config (.msgdeck/config.toml)
    // 4. CLI overrides
    let mut layered = LayeredConfig::new();

    let global_path = self.global_dir.join(CONFIG_FILE);
    let source = ConfigLayerSource::GlobalConfig(global_path.clone());
    if let Some(values) = read_table(&global_path, &source)? {
      layered.add_layer(ConfigLayer { source, values })?;
    }

    if let Some(project_dir) = &self.project_dir {
      let project_path = project_dir.join(CONFIG_DIR).join(CONFIG_FILE);
      let source = ConfigLayerSource::ProjectConfig(project_path.clone());
      if let Some(values) = read_table(&project_path, &source)? {
        layered.add_layer(ConfigLayer { source, values })?;
      }
    }

    for (key, value) in cli_overrides {
      layered.add_layer(ConfigLayer {
        values: override_table(&key, &value),
        source: ConfigLayerSource::CliOverride(key),
      })?;
    }

    let config = layered.resolve()?;
    config.validate()?;
    Ok(config)
  }
}

impl Default for ConfigLoader {
  fn default() -> Self {
    Self::new()
  }
}

/// Splits `key=value` as given to `-c`.
pub fn parse_override(raw: &str) -> Result<(String, String)> {
  match raw.split_once('=') {
    Some((key, value)) if !key.trim().is_empty() => {
      Ok((key.trim().to_string(), value.trim().to_string()))
    }
    _ => Err(ConfigError::MalformedOverride(raw.to_string())),
  }
}

fn read_table(path: &Path, source_layer: &ConfigLayerSource) -> Result<Option<Table>> {
  if !path.exists() {
    debug!(path = %path.display(), "config file not present");
    return Ok(None);
  }
  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let table = toml::from_str::<Table>(&content).map_err(|source| ConfigError::Parse {
    source_layer: source_layer.clone(),
    source,
  })?;
  debug!(path = %path.display(), "loaded config file");
  Ok(Some(table))
}

/// Builds `{a = {b = value}}` from `a.b=value`. The value is read as TOML
/// and falls back to a plain string, so `base_url=http://x` needs no quotes.
fn override_table(key: &str, raw: &str) -> Table {
  let value = toml::from_str::<Table>(&format!("value = {raw}"))
    .ok()
    .and_then(|mut table| table.remove("value"))
    .unwrap_or_else(|| Value::String(raw.to_string()));

  let mut segments = key.split('.').rev();
  let mut current = value;
  if let Some(leaf) = segments.next() {
    let mut table = Table::new();
    table.insert(leaf.to_string(), current);
    current = Value::Table(table);
  }
  for segment in segments {
    let mut table = Table::new();
    table.insert(segment.to_string(), current);
    current = Value::Table(table);
  }
  match current {
    Value::Table(table) => table,
    _ => Table::new(),
  }
}
