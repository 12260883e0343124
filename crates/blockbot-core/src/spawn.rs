//! Robot spawning - builds a robot entity from its chassis description.

use blockbot_logic::chassis::RobotSpec;
use blockbot_logic::command::Capability;
use hecs::{Entity, World};
use log::debug;

use crate::components::{Cannon, Drivetrain, Robot, Steering, Turret};
use crate::execution::RobotThreads;

/// Spawn a robot with one component per chassis capability and an empty
/// slot table.
pub fn spawn_robot(world: &mut World, spec: &RobotSpec) -> Entity {
    let entity = world.spawn((Robot::from(spec), RobotThreads::new()));

    for capability in spec.chassis.capabilities() {
        let _ = match capability {
            Capability::Movable => world.insert_one(entity, Drivetrain::default()),
            Capability::Turnable => world.insert_one(entity, Steering::default()),
            Capability::RotatableWeapon => world.insert_one(entity, Turret::default()),
            Capability::ShootableWeapon => world.insert_one(entity, Cannon::default()),
        };
    }

    debug!("spawned {:?} robot '{}'", spec.chassis, spec.name);
    entity
}

/// Put every actuator back at rest (scene reset). Steering keeps its limit.
pub fn reset_robot(world: &World, robot: Entity) {
    if let Ok(mut drive) = world.get::<&mut Drivetrain>(robot) {
        *drive = Drivetrain::default();
    }
    if let Ok(mut steering) = world.get::<&mut Steering>(robot) {
        steering.angle = 0.0;
    }
    if let Ok(mut turret) = world.get::<&mut Turret>(robot) {
        *turret = Turret::default();
    }
    if let Ok(mut cannon) = world.get::<&mut Cannon>(robot) {
        *cannon = Cannon::default();
    }
}

/// All robot entities, in spawn order.
pub fn robots(world: &World) -> Vec<Entity> {
    let mut robots: Vec<Entity> = world
        .query::<&Robot>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();
    robots.sort_by_key(|e| e.id());
    robots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::capabilities_of;
    use blockbot_logic::chassis::ChassisKind;

    #[test]
    fn test_components_match_chassis() {
        let mut world = World::new();
        for chassis in ChassisKind::all() {
            let robot = spawn_robot(&mut world, &RobotSpec::new("bot", *chassis));
            assert_eq!(capabilities_of(&world, robot), chassis.capabilities());
            assert!(world.get::<&RobotThreads>(robot).is_ok());
        }
        assert_eq!(robots(&world).len(), ChassisKind::all().len());
    }

    #[test]
    fn test_reset_robot_zeroes_actuators() {
        let mut world = World::new();
        let robot = spawn_robot(&mut world, &RobotSpec::new("t", ChassisKind::Tank));
        world.get::<&mut Turret>(robot).unwrap().angle = 80.0;
        world.get::<&mut Cannon>(robot).unwrap().shots_fired = 3;
        world.get::<&mut Steering>(robot).unwrap().angle = 10.0;

        reset_robot(&world, robot);
        assert_eq!(world.get::<&Turret>(robot).unwrap().angle, 0.0);
        assert_eq!(world.get::<&Cannon>(robot).unwrap().shots_fired, 0);
        let steering = world.get::<&Steering>(robot).unwrap();
        assert_eq!(steering.angle, 0.0);
        assert_eq!(steering.max_angle, Steering::default().max_angle);
    }
}
