//! Detection configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Valid threshold range
pub const THRESHOLD_RANGE: (f32, f32) = (0.10, 0.40);

/// Range offered by interactive controls for the required frame count
pub const CONTROL_FRAMES_RANGE: (u32, u32) = (3, 15);

/// Keyboard-style threshold step
pub const THRESHOLD_STEP: f32 = 0.01;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Value out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Value is NaN or infinite
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
}

/// Sensitivity settings, read fresh on every frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Openness score below which an eye counts as closed
    pub threshold: f32,
    /// Consecutive closed frames required before alerting
    pub consecutive_frames: u32,
    /// Minimum time between repeated alert events (seconds)
    pub alert_cooldown_seconds: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.22,
            consecutive_frames: 5,
            alert_cooldown_seconds: 2.0,
        }
    }
}

/// Partial update from a live control surface (sliders, HTTP)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlUpdate {
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub consecutive_frames: Option<u32>,
    /// Threshold steps of 0.01, applied after `threshold`
    #[serde(default)]
    pub nudge: Option<i32>,
}

impl DetectionConfig {
    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() {
            return Err(ConfigError::NotFinite("threshold"));
        }
        check_range(
            "threshold",
            self.threshold as f64,
            (THRESHOLD_RANGE.0 as f64, THRESHOLD_RANGE.1 as f64),
        )?;
        check_range(
            "consecutive_frames",
            self.consecutive_frames as f64,
            (1.0, u32::MAX as f64),
        )?;
        if !self.alert_cooldown_seconds.is_finite() {
            return Err(ConfigError::NotFinite("alert_cooldown_seconds"));
        }
        check_range(
            "alert_cooldown_seconds",
            self.alert_cooldown_seconds,
            (0.0, f64::MAX),
        )?;
        Ok(())
    }

    /// Apply a control update, clamping each value into its control range.
    /// Non-finite thresholds are ignored.
    pub fn apply_controls(&mut self, update: &ControlUpdate) {
        if let Some(threshold) = update.threshold.filter(|t| t.is_finite()) {
            self.threshold = threshold.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1);
        }
        if let Some(frames) = update.consecutive_frames {
            self.consecutive_frames = frames.clamp(CONTROL_FRAMES_RANGE.0, CONTROL_FRAMES_RANGE.1);
        }
        if let Some(steps) = update.nudge {
            self.nudge_threshold(steps);
        }
    }

    /// Step the threshold up or down, staying inside the valid range
    pub fn nudge_threshold(&mut self, steps: i32) -> f32 {
        let next = self.threshold + steps as f32 * THRESHOLD_STEP;
        // keep two decimals so repeated steps do not drift
        let rounded = (next * 100.0).round() / 100.0;
        self.threshold = rounded.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1);
        self.threshold
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), ConfigError> {
    if value < min || value > max {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DetectionConfig::default();
        assert_eq!(config.threshold, 0.22);
        assert_eq!(config.consecutive_frames, 5);
        assert_eq!(config.alert_cooldown_seconds, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_threshold() {
        let config = DetectionConfig {
            threshold: 0.05,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "threshold", .. })
        ));

        let config = DetectionConfig {
            threshold: f32::NAN,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NotFinite("threshold")));
    }

    #[test]
    fn test_zero_frames_rejected() {
        let config = DetectionConfig {
            consecutive_frames: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "consecutive_frames", .. })
        ));
    }

    #[test]
    fn test_negative_cooldown_rejected() {
        let config = DetectionConfig {
            alert_cooldown_seconds: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_controls_clamp() {
        let mut config = DetectionConfig::default();
        config.apply_controls(&ControlUpdate {
            threshold: Some(0.9),
            consecutive_frames: Some(1),
            ..Default::default()
        });
        assert_eq!(config.threshold, 0.40);
        assert_eq!(config.consecutive_frames, 3);

        config.apply_controls(&ControlUpdate {
            consecutive_frames: Some(40),
            ..Default::default()
        });
        assert_eq!(config.threshold, 0.40);
        assert_eq!(config.consecutive_frames, 15);
    }

    #[test]
    fn test_nudge_threshold() {
        let mut config = DetectionConfig::default();
        assert!((config.nudge_threshold(1) - 0.23).abs() < 1e-6);
        assert!((config.nudge_threshold(-3) - 0.20).abs() < 1e-6);
        assert_eq!(config.nudge_threshold(-50), 0.10);
        assert_eq!(config.nudge_threshold(100), 0.40);
    }

    #[test]
    fn test_nudge_control() {
        let mut config = DetectionConfig::default();
        let update: ControlUpdate = serde_json::from_str(r#"{"nudge":-2}"#).unwrap();
        config.apply_controls(&update);
        assert!((config.threshold - 0.20).abs() < 1e-6);

        // absolute value first, then the step
        config.apply_controls(&ControlUpdate {
            threshold: Some(0.30),
            nudge: Some(1),
            ..Default::default()
        });
        assert!((config.threshold - 0.31).abs() < 1e-6);
        assert_eq!(config.consecutive_frames, 5);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: DetectionConfig = serde_json::from_str(r#"{"threshold":0.3}"#).unwrap();
        assert_eq!(config.threshold, 0.3);
        assert_eq!(config.consecutive_frames, 5);
    }
}
