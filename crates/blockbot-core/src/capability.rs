//! Robot capabilities and the capability query.
//!
//! Each capability is a trait. A robot has a capability when its entity
//! carries the component implementing that trait; the `with_*` helpers are
//! the downcast: they hand the command a trait object or report
//! `IncompatibleCommand`.

use blockbot_logic::command::{Capability, CommandKind};
use hecs::{Component, Entity, World};

use crate::components::{Cannon, Drivetrain, Steering, Turret};
use crate::error::{ExecutionError, Result};

pub trait Movable {
    /// Push with `torque` for `dt` seconds.
    fn apply_torque(&mut self, torque: f32, dt: f32);
    fn release(&mut self);
}

pub trait Turnable {
    fn steer_angle(&self) -> f32;
    fn set_steer_angle(&mut self, angle: f32);
    /// Largest reachable deflection either side.
    fn steer_limit(&self) -> f32;
}

pub trait RotatableWeapon {
    fn weapon_angle(&self) -> f32;
    fn set_weapon_angle(&mut self, angle: f32);
}

pub trait ShootableWeapon {
    fn is_loaded(&self) -> bool;
    fn reload(&mut self, dt: f32);
    fn fire(&mut self, reload_time: f32);
}

fn with_component<C, R>(
    world: &World,
    robot: Entity,
    command: CommandKind,
    capability: Capability,
    f: impl FnOnce(&mut C) -> R,
) -> Result<R>
where
    C: Component,
{
    let mut component = world
        .get::<&mut C>(robot)
        .map_err(|_| ExecutionError::IncompatibleCommand {
            command,
            capability,
        })?;
    Ok(f(&mut *component))
}

pub fn with_movable<R>(
    world: &World,
    robot: Entity,
    command: CommandKind,
    f: impl FnOnce(&mut dyn Movable) -> R,
) -> Result<R> {
    with_component::<Drivetrain, R>(world, robot, command, Capability::Movable, |c| f(c))
}

pub fn with_turnable<R>(
    world: &World,
    robot: Entity,
    command: CommandKind,
    f: impl FnOnce(&mut dyn Turnable) -> R,
) -> Result<R> {
    with_component::<Steering, R>(world, robot, command, Capability::Turnable, |c| f(c))
}

pub fn with_rotatable_weapon<R>(
    world: &World,
    robot: Entity,
    command: CommandKind,
    f: impl FnOnce(&mut dyn RotatableWeapon) -> R,
) -> Result<R> {
    with_component::<Turret, R>(world, robot, command, Capability::RotatableWeapon, |c| f(c))
}

pub fn with_shootable_weapon<R>(
    world: &World,
    robot: Entity,
    command: CommandKind,
    f: impl FnOnce(&mut dyn ShootableWeapon) -> R,
) -> Result<R> {
    with_component::<Cannon, R>(world, robot, command, Capability::ShootableWeapon, |c| f(c))
}

/// Does the robot implement `capability`?
pub fn has_capability(world: &World, robot: Entity, capability: Capability) -> bool {
    let Ok(entity) = world.entity(robot) else {
        return false;
    };
    match capability {
        Capability::Movable => entity.has::<Drivetrain>(),
        Capability::Turnable => entity.has::<Steering>(),
        Capability::RotatableWeapon => entity.has::<Turret>(),
        Capability::ShootableWeapon => entity.has::<Cannon>(),
    }
}

pub fn capabilities_of(world: &World, robot: Entity) -> Vec<Capability> {
    Capability::all()
        .iter()
        .copied()
        .filter(|c| has_capability(world, robot, *c))
        .collect()
}
