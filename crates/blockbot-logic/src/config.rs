//! Execution configuration and its validation.
//!
//! Loaded from JSON by hosts (the harness reads an optional override file);
//! every field has a default so partial files are fine.

use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Rates and tolerances commands measure against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTuning {
    /// Steering speed in degrees per second.
    pub turn_rate: f32,
    /// Turret speed in degrees per second.
    pub weapon_rotate_rate: f32,
    /// Largest angle error that still counts as "on target".
    pub angle_tolerance: f32,
    /// Seconds between cannon shots.
    pub cannon_reload: f32,
}

impl Default for CommandTuning {
    fn default() -> Self {
        Self {
            turn_rate: DEFAULT_TURN_RATE,
            weapon_rotate_rate: DEFAULT_WEAPON_ROTATE_RATE,
            angle_tolerance: DEFAULT_ANGLE_TOLERANCE,
            cannon_reload: DEFAULT_CANNON_RELOAD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Simulated seconds per real second (1.0 = real time).
    pub time_scale: f32,
    /// Seed for `Chance` conditions.
    pub seed: u64,
    pub tuning: CommandTuning,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            seed: DEFAULT_SEED,
            tuning: CommandTuning::default(),
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Time scale negative, NaN or above `MAX_TIME_SCALE`.
    InvalidTimeScale(f32),
    /// A rate must be strictly positive.
    NonPositiveRate { field: &'static str, value: f32 },
    /// Tolerance must be finite and non-negative.
    InvalidTolerance(f32),
    /// Reload time must be finite and non-negative.
    InvalidReload(f32),
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &ExecutionConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if !(0.0..=MAX_TIME_SCALE).contains(&config.time_scale) {
        errors.push(ConfigError::InvalidTimeScale(config.time_scale));
    }

    let t = &config.tuning;
    for (field, value) in [
        ("turn_rate", t.turn_rate),
        ("weapon_rotate_rate", t.weapon_rotate_rate),
    ] {
        if !(value > 0.0 && value.is_finite()) {
            errors.push(ConfigError::NonPositiveRate { field, value });
        }
    }
    if !(t.angle_tolerance >= 0.0 && t.angle_tolerance.is_finite()) {
        errors.push(ConfigError::InvalidTolerance(t.angle_tolerance));
    }
    if !(t.cannon_reload >= 0.0 && t.cannon_reload.is_finite()) {
        errors.push(ConfigError::InvalidReload(t.cannon_reload));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ExecutionConfig::default()).is_empty());
    }

    #[test]
    fn collects_every_error() {
        let config = ExecutionConfig {
            time_scale: -1.0,
            seed: 0,
            tuning: CommandTuning {
                turn_rate: 0.0,
                weapon_rotate_rate: f32::NAN,
                angle_tolerance: -0.1,
                cannon_reload: 1.0,
            },
        };
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ConfigError::InvalidTimeScale(-1.0)));
        assert!(errors.contains(&ConfigError::InvalidTolerance(-0.1)));
    }

    #[test]
    fn zero_time_scale_is_allowed() {
        let config = ExecutionConfig {
            time_scale: 0.0,
            ..Default::default()
        };
        assert!(validate_config(&config).is_empty());
    }
}
