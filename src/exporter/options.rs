use std::path::Path;

use serde::{
  Deserialize, Serialize
};
use serde_json;

use crate::error::HalaExporterError;

fn default_as_true() -> bool {
  true
}

fn default_indentation() -> String {
  String::from("  ")
}

/// The export options.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HalaExportOptions {
  /// Write the material reference of every model.
  #[serde(default)]
  pub save_materials: bool,
  /// Write animation keys to .ani streams instead of inline.
  #[serde(default = "default_as_true")]
  pub binary_animations: bool,
  #[serde(default = "default_indentation")]
  pub indentation: String,
}

impl Default for HalaExportOptions {
  fn default() -> Self {
    Self {
      save_materials: false,
      binary_animations: true,
      indentation: default_indentation(),
    }
  }
}

/// The implementation of the export options.
impl HalaExportOptions {
  /// Load the options from a JSON file. Missing keys take their default values.
  /// param path: The path of the JSON file.
  /// return: The options.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HalaExporterError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
      .map_err(|err| HalaExporterError::new(&format!("Read options file \"{:?}\" failed.", path), Some(Box::new(err))))?;
    serde_json::from_str(&text)
      .map_err(|err| HalaExporterError::new(&format!("Parse options file \"{:?}\" failed.", path), Some(Box::new(err))))
  }
}
