//! Command values: the time-extended actions a block hands to a robot.
//!
//! A `Command` is a plain value with no identity: an `Action` block produces a
//! fresh one every time the walker reaches it. Execution lives in the engine
//! crate; this module only describes what a command is and which robot
//! capability it needs.

use serde::{Deserialize, Serialize};

/// Interfaces a robot may or may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Movable,
    Turnable,
    RotatableWeapon,
    ShootableWeapon,
}

impl Capability {
    pub fn all() -> &'static [Capability] {
        &[
            Capability::Movable,
            Capability::Turnable,
            Capability::RotatableWeapon,
            Capability::ShootableWeapon,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Capability::Movable => "movable",
            Capability::Turnable => "turnable",
            Capability::RotatableWeapon => "rotatable weapon",
            Capability::ShootableWeapon => "shootable weapon",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Steering side for `Turn`. Left is the negative direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    Left,
    Right,
}

impl TurnDirection {
    pub fn sign(&self) -> f32 {
        match self {
            TurnDirection::Left => -1.0,
            TurnDirection::Right => 1.0,
        }
    }
}

/// Variant tag of a command. Two commands of the same kind never run at the
/// same time on one robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Move,
    Turn,
    RotateWeapon,
    ShootWeapon,
    Wait,
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Move => "move",
            CommandKind::Turn => "turn",
            CommandKind::RotateWeapon => "rotate_weapon",
            CommandKind::ShootWeapon => "shoot_weapon",
            CommandKind::Wait => "wait",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A one-shot, time-extended robot action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Drive for `duration` seconds applying `torque` (N·m).
    Move { duration: f32, torque: f32 },
    /// Steer until the steering angle equals `angle` on the given side.
    Turn { direction: TurnDirection, angle: f32 },
    /// Rotate the turret to an absolute angle.
    RotateWeapon { angle: f32 },
    /// Fire the cannon once, waiting for it to reload if needed.
    ShootWeapon,
    /// Do nothing for `duration` seconds.
    Wait { duration: f32 },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Move { .. } => CommandKind::Move,
            Command::Turn { .. } => CommandKind::Turn,
            Command::RotateWeapon { .. } => CommandKind::RotateWeapon,
            Command::ShootWeapon => CommandKind::ShootWeapon,
            Command::Wait { .. } => CommandKind::Wait,
        }
    }

    /// Capability the robot must have for this command to run.
    pub fn required_capability(&self) -> Option<Capability> {
        match self {
            Command::Move { .. } => Some(Capability::Movable),
            Command::Turn { .. } => Some(Capability::Turnable),
            Command::RotateWeapon { .. } => Some(Capability::RotatableWeapon),
            Command::ShootWeapon => Some(Capability::ShootableWeapon),
            Command::Wait { .. } => None,
        }
    }

    /// Signed steering target of a `Turn` (left negative, right positive).
    pub fn signed_turn_angle(&self) -> Option<f32> {
        match self {
            Command::Turn { direction, angle } => Some(direction.sign() * angle.abs()),
            _ => None,
        }
    }
}
