//! Robot chassis descriptions: which capabilities a robot body offers.

use serde::{Deserialize, Serialize};

use crate::command::Capability;

/// Prebuilt robot bodies available in the lessons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChassisKind {
    /// Wheeled car: drives and steers.
    Rover,
    /// Drives, steers and carries a rotating cannon.
    Tank,
    /// Stationary gun emplacement.
    Turret,
    /// No actuators at all. Useful to demonstrate incompatible commands.
    Dummy,
}

impl ChassisKind {
    pub fn all() -> &'static [ChassisKind] {
        &[
            ChassisKind::Rover,
            ChassisKind::Tank,
            ChassisKind::Turret,
            ChassisKind::Dummy,
        ]
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            ChassisKind::Rover => &[Capability::Movable, Capability::Turnable],
            ChassisKind::Tank => Capability::all(),
            ChassisKind::Turret => &[Capability::RotatableWeapon, Capability::ShootableWeapon],
            ChassisKind::Dummy => &[],
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Everything needed to place a robot in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSpec {
    pub name: String,
    pub chassis: ChassisKind,
}

impl RobotSpec {
    pub fn new(name: impl Into<String>, chassis: ChassisKind) -> Self {
        Self {
            name: name.into(),
            chassis,
        }
    }
}

impl Default for RobotSpec {
    fn default() -> Self {
        Self::new("Robo", ChassisKind::Tank)
    }
}
