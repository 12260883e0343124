//! Default tuning values shared by the engine and the harness.
//!
//! Angles are in degrees, rates in degrees per simulated second, times in
//! simulated seconds.

/// Steering rate used by `Turn` commands.
pub const DEFAULT_TURN_RATE: f32 = 90.0;

/// Turret rate used by `RotateWeapon` commands.
pub const DEFAULT_WEAPON_ROTATE_RATE: f32 = 60.0;

/// A target angle counts as reached when the error is at most this.
pub const DEFAULT_ANGLE_TOLERANCE: f32 = 0.5;

/// Seconds a cannon needs between two shots.
pub const DEFAULT_CANNON_RELOAD: f32 = 1.0;

/// Maximum steering deflection either side of center.
pub const MAX_STEER_ANGLE: f32 = 45.0;

/// Default seed for `Chance` expressions.
pub const DEFAULT_SEED: u64 = 42;

/// Upper bound accepted for `time_scale` by config validation.
pub const MAX_TIME_SCALE: f32 = 16.0;
