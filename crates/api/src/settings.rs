//! Layered runtime settings
//!
//! Built-in defaults, then an optional TOML file, then `DROWSY__SECTION__KEY`
//! environment variables. Command-line flags are applied on top by the binary.

use std::collections::HashMap;
use std::path::Path;

use alerting::AlertSettings;
use config::{Config, Environment, File};
use dms::{DetectionConfig, FaceMeshConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// File looked up in the working directory when no path is given
pub const DEFAULT_FILE: &str = "drowsy";

pub const ENV_PREFIX: &str = "DROWSY";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Invalid detection settings: {0}")]
    Detection(#[from] dms::ConfigError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: String,
    /// Sessions with no frames and no alert listeners for this long are
    /// dropped; 0 keeps them until deleted
    pub session_idle_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            session_idle_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Mirror frames before detection
    pub mirror: bool,
    pub fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self { mirror: true, fps: 30 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub detection: DetectionConfig,
    pub alerts: AlertSettings,
    pub model: FaceMeshConfig,
    pub capture: CaptureSettings,
}

impl Settings {
    /// Load from `path` (or `drowsy.toml` if present) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, None)
    }

    /// Like [`Settings::load`], reading variables from `env` instead of the
    /// process environment when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.detection.validate()?;
        debug!("Settings loaded: {:?}", settings);
        Ok(settings)
    }

    /// Apply command-line overrides and re-validate
    pub fn with_overrides(
        mut self,
        threshold: Option<f32>,
        consecutive_frames: Option<u32>,
    ) -> Result<Self, SettingsError> {
        if let Some(threshold) = threshold {
            self.detection.threshold = threshold;
        }
        if let Some(frames) = consecutive_frames {
            self.detection.consecutive_frames = frames;
        }
        self.detection.validate()?;
        Ok(self)
    }
}
