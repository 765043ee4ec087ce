//! Bridge configuration.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "AUDIO_BRIDGE_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Sample rate used when an `AudioContext` is created without one.
    pub default_sample_rate: f32,
    /// Upper bound accepted for `channelCount` and offline context channels.
    pub max_channel_count: u32,
    /// Longest accepted IIR coefficient array.
    pub max_iir_order: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_sample_rate: 44_100.0,
            max_channel_count: 32,
            max_iir_order: 20,
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Load from the file named by [`CONFIG_ENV_VAR`], or defaults when the
    /// variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(BridgeConfig)
    }
}
