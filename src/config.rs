//! Monitor configuration
//!
//! Thresholds and cooldowns for the three monitors. Every field has a default,
//! so a partial JSON document only overrides what it names.

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Default speed limit (km/h)
pub const DEFAULT_SPEED_LIMIT_KMH: f64 = 50.0;
/// Default cooldown between speeding events (seconds)
pub const DEFAULT_SPEED_COOLDOWN_S: i64 = 10;
/// Default horizontal linear-acceleration threshold (m/s²)
pub const DEFAULT_ACCEL_THRESHOLD: f64 = 3.0;
/// Default vertical linear-acceleration threshold (m/s²)
pub const DEFAULT_BUMP_THRESHOLD: f64 = 3.0;
/// Default rotation-rate threshold (deg/s)
pub const DEFAULT_TURN_THRESHOLD: f64 = 30.0;
/// Default shared cooldown between motion events (milliseconds)
pub const DEFAULT_MOTION_COOLDOWN_MS: i64 = 2000;
/// Default low-pass coefficient for the gravity estimate
pub const DEFAULT_GRAVITY_ALPHA: f64 = 0.8;
/// Default sustained face-present frames before a distraction fires
pub const DEFAULT_DISTRACTION_THRESHOLD_FRAMES: u32 = 45;

/// Motion fusion classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Horizontal force threshold for harsh accel/brake (m/s²)
    pub accel_threshold: f64,
    /// Vertical shock threshold for bumps (m/s²)
    pub bump_threshold: f64,
    /// Max-axis rotation threshold for sharp turns (deg/s)
    pub turn_threshold: f64,
    /// Shared cooldown across bump, harsh and turn events (ms)
    pub motion_cooldown_ms: i64,
    /// Weight of the previous gravity estimate, in `[0, 1)`
    pub gravity_alpha: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            accel_threshold: DEFAULT_ACCEL_THRESHOLD,
            bump_threshold: DEFAULT_BUMP_THRESHOLD,
            turn_threshold: DEFAULT_TURN_THRESHOLD,
            motion_cooldown_ms: DEFAULT_MOTION_COOLDOWN_MS,
            gravity_alpha: DEFAULT_GRAVITY_ALPHA,
        }
    }
}

impl MotionConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        non_negative("motion.accel_threshold", self.accel_threshold)?;
        non_negative("motion.bump_threshold", self.bump_threshold)?;
        non_negative("motion.turn_threshold", self.turn_threshold)?;
        if self.motion_cooldown_ms < 0 {
            return Err(MonitorError::InvalidConfig(format!(
                "motion.motion_cooldown_ms must be >= 0, got {}",
                self.motion_cooldown_ms
            )));
        }
        if !(0.0..1.0).contains(&self.gravity_alpha) {
            return Err(MonitorError::InvalidConfig(format!(
                "motion.gravity_alpha must be in [0, 1), got {}",
                self.gravity_alpha
            )));
        }
        Ok(())
    }
}

/// Speed monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub speed_limit_kmh: f64,
    /// Whole seconds that must elapse between speeding events
    pub speed_cooldown_s: i64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            speed_limit_kmh: DEFAULT_SPEED_LIMIT_KMH,
            speed_cooldown_s: DEFAULT_SPEED_COOLDOWN_S,
        }
    }
}

impl SpeedConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        non_negative("speed.speed_limit_kmh", self.speed_limit_kmh)?;
        if self.speed_cooldown_s < 0 {
            return Err(MonitorError::InvalidConfig(format!(
                "speed.speed_cooldown_s must be >= 0, got {}",
                self.speed_cooldown_s
            )));
        }
        Ok(())
    }
}

/// Distraction monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistractionConfig {
    /// Consecutive face-present frames that make up one distraction episode
    pub distraction_threshold_frames: u32,
}

impl Default for DistractionConfig {
    fn default() -> Self {
        Self {
            distraction_threshold_frames: DEFAULT_DISTRACTION_THRESHOLD_FRAMES,
        }
    }
}

impl DistractionConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.distraction_threshold_frames == 0 {
            return Err(MonitorError::InvalidConfig(
                "distraction.distraction_threshold_frames must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full configuration for a monitoring session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub motion: MotionConfig,
    pub speed: SpeedConfig,
    pub distraction: DistractionConfig,
}

impl SessionConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.motion.validate()?;
        self.speed.validate()?;
        self.distraction.validate()
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), MonitorError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MonitorError::InvalidConfig(format!(
            "{name} must be a finite, non-negative number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = SessionConfig::default();
        assert_eq!(config.speed.speed_limit_kmh, 50.0);
        assert_eq!(config.speed.speed_cooldown_s, 10);
        assert_eq!(config.motion.accel_threshold, 3.0);
        assert_eq!(config.motion.bump_threshold, 3.0);
        assert_eq!(config.motion.turn_threshold, 30.0);
        assert_eq!(config.motion.motion_cooldown_ms, 2000);
        assert_eq!(config.motion.gravity_alpha, 0.8);
        assert_eq!(config.distraction.distraction_threshold_frames, 45);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config =
            SessionConfig::from_json(r#"{ "speed": { "speed_limit_kmh": 80.0 } }"#).unwrap();
        assert_eq!(config.speed.speed_limit_kmh, 80.0);
        assert_eq!(config.speed.speed_cooldown_s, 10);
        assert_eq!(config.motion, MotionConfig::default());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let result = SessionConfig::from_json(r#"{ "motion": { "bump_threshold": -1.0 } }"#);
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn test_gravity_alpha_range() {
        let mut config = SessionConfig::default();
        config.motion.gravity_alpha = 1.0;
        assert!(config.validate().is_err());
        config.motion.gravity_alpha = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_distraction_frames_rejected() {
        let mut config = SessionConfig::default();
        config.distraction.distraction_threshold_frames = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_and_negative_cooldown_rejected() {
        let mut config = SessionConfig::default();
        config.speed.speed_limit_kmh = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.motion.motion_cooldown_ms = -5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_json() {
        let result = SessionConfig::from_json("not json");
        assert!(matches!(result, Err(MonitorError::JsonError(_))));
    }
}
