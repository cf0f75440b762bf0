// Configuration errors

use std::path::PathBuf;

use thiserror::Error;

use crate::layered::ConfigLayerSource;

#[derive(Error, Debug)]
pub enum ConfigError {
  /// Config file exists but could not be read
  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A layer is not valid TOML or does not match the schema
  #[error("invalid configuration in {source_layer}: {source}")]
  Parse {
    source_layer: ConfigLayerSource,
    #[source]
    source: toml::de::Error,
  },

  /// `-c` argument without `=`
  #[error("invalid override {0:?}, expected KEY=VALUE")]
  MalformedOverride(String),

  /// Value outside the accepted range
  #[error("invalid value for {key}: {reason}")]
  Invalid { key: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
