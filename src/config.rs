use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::{AcquireConfig, CaptureConfig, RelayConfig, SessionConfig};
use crate::garden::AssistantConfig;
use crate::identify::IdentifyConfig;

/// Every tunable of the kit in one place.
///
/// Missing fields take their defaults, so a config file only needs the
/// values it changes:
///
/// ```json
/// { "acquire": { "ready_timeout_ms": 5000 }, "relay": { "bucket": "greenhouse" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitConfig {
    /// Camera stream acquisition.
    pub acquire: AcquireConfig,
    /// Still capture.
    pub capture: CaptureConfig,
    /// Image upload.
    pub relay: RelayConfig,
    /// Plant identification.
    pub identify: IdentifyConfig,
    /// Plant chat assistant.
    pub assistant: AssistantConfig,
}

/// Errors that can occur while loading a [`KitConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The contents are not a valid config.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl KitConfig {
    /// Parse a JSON config.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed JSON or mistyped values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid config.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// The part of the config a capture session needs.
    #[must_use]
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            acquire: self.acquire,
            capture: self.capture,
            relay: self.relay.clone(),
        }
    }
}
