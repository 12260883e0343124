//! Robot components: identity plus one component per capability.
//!
//! A robot is "movable" exactly when its entity carries a `Drivetrain`, and so
//! on. Chassis physics is out of scope; these components only track the
//! actuator state that commands drive and that observers render.

use blockbot_logic::chassis::{ChassisKind, RobotSpec};
use blockbot_logic::constants::MAX_STEER_ANGLE;
use serde::{Deserialize, Serialize};

use crate::capability::{Movable, RotatableWeapon, ShootableWeapon, Turnable};

/// Marks an entity as a robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    pub name: String,
    pub chassis: ChassisKind,
}

impl From<&RobotSpec> for Robot {
    fn from(spec: &RobotSpec) -> Self {
        Self {
            name: spec.name.clone(),
            chassis: spec.chassis,
        }
    }
}

/// Wheels and motor (Movable).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Drivetrain {
    /// Torque currently applied, 0 when coasting.
    pub torque: f32,
    /// Accumulated torque·seconds, a cheap odometer for observers.
    pub impulse: f32,
}

impl Movable for Drivetrain {
    fn apply_torque(&mut self, torque: f32, dt: f32) {
        self.torque = torque;
        self.impulse += torque * dt;
    }

    fn release(&mut self) {
        self.torque = 0.0;
    }
}

/// Front axle steering (Turnable). Angles in degrees, left negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Steering {
    pub angle: f32,
    pub max_angle: f32,
}

impl Default for Steering {
    fn default() -> Self {
        Self {
            angle: 0.0,
            max_angle: MAX_STEER_ANGLE,
        }
    }
}

impl Turnable for Steering {
    fn steer_angle(&self) -> f32 {
        self.angle
    }

    fn set_steer_angle(&mut self, angle: f32) {
        self.angle = angle.clamp(-self.max_angle, self.max_angle);
    }

    fn steer_limit(&self) -> f32 {
        self.max_angle
    }
}

/// Rotating gun mount (RotatableWeapon).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Turret {
    pub angle: f32,
}

impl RotatableWeapon for Turret {
    fn weapon_angle(&self) -> f32 {
        self.angle
    }

    fn set_weapon_angle(&mut self, angle: f32) {
        self.angle = angle;
    }
}

/// The gun itself (ShootableWeapon).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cannon {
    /// Seconds until the next shot is possible.
    pub cooldown: f32,
    pub shots_fired: u32,
}

impl ShootableWeapon for Cannon {
    fn is_loaded(&self) -> bool {
        self.cooldown <= 0.0
    }

    fn reload(&mut self, dt: f32) {
        self.cooldown = (self.cooldown - dt).max(0.0);
    }

    fn fire(&mut self, reload_time: f32) {
        self.shots_fired += 1;
        self.cooldown = reload_time;
    }
}
