//! Run configuration
//!
//! Every setting has a default; a TOML file can override them and CLI
//! flags override the file.
//!
//! ```toml
//! output_dir = "exports"
//! write_csv = true
//! write_geojson = true
//! skip_fields = ["deviceid"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::instance::FlattenRules;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "FIELDWORK_CONFIG";
/// Environment variable naming the output directory.
pub const OUTPUT_DIR_ENV: &str = "FIELDWORK_OUTPUT_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldworkConfig {
    /// Directory for derived output names; current directory when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default = "default_write_csv")]
    pub write_csv: bool,

    #[serde(default)]
    pub write_geojson: bool,

    /// Extra top-level fields dropped before flattening; `meta` and
    /// `warmup` are always dropped
    #[serde(default)]
    pub skip_fields: Vec<String>,
}

fn default_write_csv() -> bool {
    true
}

impl Default for FieldworkConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            write_csv: default_write_csv(),
            write_geojson: false,
            skip_fields: Vec::new(),
        }
    }
}

impl FieldworkConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &content)
    }

    fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from `path` when given, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn flatten_rules(&self) -> FlattenRules {
        FlattenRules {
            skip_fields: self.skip_fields.clone(),
        }
    }
}
