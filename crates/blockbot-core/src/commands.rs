//! Command execution: drives a robot capability until the command's
//! stopping condition is met.
//!
//! `begin` performs the capability query up front so an incompatible command
//! never starts. `advance` is called once per tick with the clock delta
//! (0 while paused, which is how pausing halts every command).

use blockbot_logic::command::Command;
use blockbot_logic::config::CommandTuning;
use hecs::{Entity, World};

use crate::capability::{
    with_movable, with_rotatable_weapon, with_shootable_weapon, with_turnable,
};
use crate::error::Result;

/// Move `current` toward `target` by at most `max_step`, never overshooting.
pub fn step_toward(current: f32, target: f32, max_step: f32) -> f32 {
    let diff = target - current;
    if diff.abs() <= max_step {
        target
    } else {
        current + max_step * diff.signum()
    }
}

/// A command in flight on one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCommand {
    command: Command,
    /// Simulated seconds since the command started.
    elapsed: f32,
    /// Resolved target angle for Turn / RotateWeapon.
    target: f32,
}

impl ActiveCommand {
    /// Check the robot can run `command` and prepare it.
    pub fn begin(command: Command, world: &World, robot: Entity) -> Result<Self> {
        let kind = command.kind();
        let target = match command {
            Command::Move { .. } => with_movable(world, robot, kind, |_| 0.0)?,
            Command::Turn { .. } => {
                let signed = command.signed_turn_angle().unwrap_or(0.0);
                with_turnable(world, robot, kind, |s| {
                    signed.clamp(-s.steer_limit(), s.steer_limit())
                })?
            }
            Command::RotateWeapon { angle } => {
                with_rotatable_weapon(world, robot, kind, |_| angle)?
            }
            Command::ShootWeapon => with_shootable_weapon(world, robot, kind, |_| 0.0)?,
            Command::Wait { .. } => 0.0,
        };

        Ok(Self {
            command,
            elapsed: 0.0,
            target,
        })
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Progress by `dt` seconds. Returns `true` once finished.
    pub fn advance(
        &mut self,
        world: &World,
        robot: Entity,
        dt: f32,
        tuning: &CommandTuning,
    ) -> Result<bool> {
        let before = self.elapsed;
        self.elapsed += dt;
        let kind = self.command.kind();
        let target = self.target;

        match self.command {
            Command::Move { duration, torque } => {
                let done = self.elapsed >= duration;
                let active = (duration - before).clamp(0.0, dt);
                with_movable(world, robot, kind, |m| {
                    m.apply_torque(torque, active);
                    if done {
                        m.release();
                    }
                })?;
                Ok(done)
            }
            Command::Turn { .. } => with_turnable(world, robot, kind, |s| {
                let angle = step_toward(s.steer_angle(), target, tuning.turn_rate * dt);
                s.set_steer_angle(angle);
                (s.steer_angle() - target).abs() <= tuning.angle_tolerance
            }),
            Command::RotateWeapon { .. } => with_rotatable_weapon(world, robot, kind, |w| {
                let angle = step_toward(w.weapon_angle(), target, tuning.weapon_rotate_rate * dt);
                w.set_weapon_angle(angle);
                (w.weapon_angle() - target).abs() <= tuning.angle_tolerance
            }),
            Command::ShootWeapon => with_shootable_weapon(world, robot, kind, |c| {
                c.reload(dt);
                if c.is_loaded() {
                    c.fire(tuning.cannon_reload);
                    true
                } else {
                    false
                }
            }),
            Command::Wait { duration } => Ok(self.elapsed >= duration),
        }
    }

    /// Leave the capability at rest. Only `stop()` cancels a command.
    pub fn abort(&self, world: &World, robot: Entity) {
        if let Command::Move { .. } = self.command {
            // A despawned robot has nothing left to release.
            let _ = with_movable(world, robot, self.command.kind(), |m| m.release());
        }
    }
}
