//! Save/Load functionality for persisting a scene
//!
//! Uses bincode for compact binary snapshots. Robots are serialized component
//! by component and respawned on load. Walkers and slots are runtime state
//! and are never saved: a loaded scene is always NotRunning.

use blockbot_logic::config::ExecutionConfig;
use blockbot_logic::graph::BlockGraph;
use hecs::{Entity, World};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

use crate::components::*;
use crate::execution::RobotThreads;
use crate::spawn::robots;

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of a scene
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    pub config: ExecutionConfig,
    pub program: BlockGraph,
    /// Position in `robots` of the robot the program drives
    pub target: Option<usize>,
    pub robots: Vec<SerializableRobot>,
}

/// All robot components, serialized as optionals
#[derive(Serialize, Deserialize, Default)]
pub struct SerializableRobot {
    pub robot: Option<Robot>,
    pub drivetrain: Option<Drivetrain>,
    pub steering: Option<Steering>,
    pub turret: Option<Turret>,
    pub cannon: Option<Cannon>,
}

fn serialize_robot(world: &World, entity: Entity) -> SerializableRobot {
    let mut sr = SerializableRobot::default();
    let Ok(entity_ref) = world.entity(entity) else {
        return sr;
    };

    if let Some(c) = entity_ref.get::<&Robot>() {
        sr.robot = Some((*c).clone());
    }
    if let Some(c) = entity_ref.get::<&Drivetrain>() {
        sr.drivetrain = Some(*c);
    }
    if let Some(c) = entity_ref.get::<&Steering>() {
        sr.steering = Some(*c);
    }
    if let Some(c) = entity_ref.get::<&Turret>() {
        sr.turret = Some(*c);
    }
    if let Some(c) = entity_ref.get::<&Cannon>() {
        sr.cannon = Some(*c);
    }
    sr
}

/// Respawn a robot with its components and a fresh slot table
fn spawn_robot_entity(world: &mut World, sr: SerializableRobot) -> Entity {
    let entity = world.spawn((RobotThreads::new(),));

    if let Some(c) = sr.robot {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sr.drivetrain {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sr.steering {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sr.turret {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sr.cannon {
        let _ = world.insert_one(entity, c);
    }
    entity
}

/// Save a scene to a writer
pub fn save_scene<W: Write>(
    writer: W,
    world: &World,
    config: &ExecutionConfig,
    program: &BlockGraph,
    target: Option<Entity>,
) -> Result<(), SaveError> {
    let entities = robots(world);
    let target = target.and_then(|t| entities.iter().position(|e| *e == t));

    let save_data = SaveData {
        version: SAVE_VERSION,
        config: *config,
        program: program.clone(),
        target,
        robots: entities
            .iter()
            .map(|e| serialize_robot(world, *e))
            .collect(),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a scene from a reader
pub fn load_scene<R: Read>(reader: R) -> Result<LoadedScene, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let mut world = World::new();
    let entities: Vec<Entity> = save_data
        .robots
        .into_iter()
        .map(|sr| spawn_robot_entity(&mut world, sr))
        .collect();

    let target = match save_data.target {
        Some(index) => Some(
            *entities
                .get(index)
                .ok_or(SaveError::UnknownRobot(index))?,
        ),
        None => None,
    };

    Ok(LoadedScene {
        world,
        config: save_data.config,
        program: save_data.program,
        target,
    })
}

/// Result of loading a scene
pub struct LoadedScene {
    pub world: World,
    pub config: ExecutionConfig,
    pub program: BlockGraph,
    pub target: Option<Entity>,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Target robot #{0} is missing from the save")]
    UnknownRobot(usize),
}
