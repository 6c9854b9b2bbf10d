use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::error::Result;

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
  pub reader: ReaderConfig,
  pub packing: PackingConfig,
  /// Entries added to (or overriding) the built-in parameter table
  pub parameters: Vec<ParameterConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderConfig {
  /// Skip bytes between messages that do not start with `GRIB`
  pub skip_garbage: bool,
}

impl Default for ReaderConfig {
  fn default() -> Self {
    Self { skip_garbage: true }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackingConfig {
  /// Bits per value used when a constant field becomes variable
  pub default_bits_per_value: usize,
}

impl Default for PackingConfig {
  fn default() -> Self {
    Self { default_bits_per_value: 16 }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterConfig {
  pub discipline: u8,
  pub category: u8,
  pub number: u8,
  pub name: String,
  pub short_name: String,
  pub units: String,
}

impl Config {
  /// Loads the YAML file at `path`, creating it with defaults when missing.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let config = confy::load_path(path.as_ref())?;
    debug!("Loaded config from {}", path.as_ref().display());
    Ok(config)
  }

  pub fn from_yaml_str(yaml: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(yaml)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_fields_take_defaults() {
    let config = Config::from_yaml_str("reader:\n  skipGarbage: false\n").unwrap();
    assert!(!config.reader.skip_garbage);
    assert_eq!(config.packing.default_bits_per_value, 16);
    assert!(config.parameters.is_empty());
  }

  #[test]
  fn parses_parameters() {
    let yaml = "
parameters:
  - discipline: 0
    category: 1
    number: 200
    name: Local rain
    shortName: lrain
    units: mm
";
    let config = Config::from_yaml_str(yaml).unwrap();
    assert_eq!(config.parameters.len(), 1);
    assert_eq!(config.parameters[0].short_name, "lrain");
    assert!(config.reader.skip_garbage);
  }
}
