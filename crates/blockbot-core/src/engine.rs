//! Simulation engine - main entry point for hosts (viewer, harness, tests)

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use blockbot_logic::chassis::RobotSpec;
use blockbot_logic::config::{validate_config, ExecutionConfig};
use blockbot_logic::graph::BlockGraph;
use hecs::{Entity, World};
use log::{info, warn};

use crate::components::Robot;
use crate::error::Result;
use crate::execution::{ExecutionEvent, ExecutionManager, ExecutionState};
use crate::persistence::{load_scene, save_scene, SaveError};
use crate::spawn::{reset_robot, robots, spawn_robot};

/// Main simulation engine
pub struct SimulationEngine {
    /// ECS world containing the robots
    pub world: World,
    /// Active program
    program: BlockGraph,
    manager: ExecutionManager,
    config: ExecutionConfig,
}

impl SimulationEngine {
    /// Create an empty scene. Invalid config values are logged; the clock
    /// replaces an unusable time scale with real time.
    pub fn new(mut config: ExecutionConfig) -> Self {
        for problem in validate_config(&config) {
            warn!("execution config: {problem:?}");
        }
        let manager = ExecutionManager::new(&config);
        config.time_scale = manager.clock().time_scale();
        Self {
            world: World::new(),
            program: BlockGraph::default(),
            manager,
            config,
        }
    }

    /// Add a robot. The first robot spawned becomes the program's target.
    pub fn spawn_robot(&mut self, spec: &RobotSpec) -> Entity {
        let entity = spawn_robot(&mut self.world, spec);
        if self.manager.robot().is_none() {
            self.manager.set_target(entity);
        }
        entity
    }

    /// Drive `robot` on the next run. Ignored while running.
    pub fn set_target(&mut self, robot: Entity) -> bool {
        self.manager.set_target(robot)
    }

    pub fn target(&self) -> Option<Entity> {
        self.manager.robot()
    }

    /// Replace the program, halting any run in progress.
    pub fn load_program(&mut self, program: BlockGraph) {
        self.manager.halt(&self.world);
        self.program = program;
        info!("loaded program with {} blocks", self.program.len());
    }

    /// Parse and load a program from its JSON block list.
    pub fn load_program_json(&mut self, json: &str) -> serde_json::Result<()> {
        let program: BlockGraph = serde_json::from_str(json)?;
        self.load_program(program);
        Ok(())
    }

    pub fn program(&self) -> &BlockGraph {
        &self.program
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn manager(&self) -> &ExecutionManager {
        &self.manager
    }

    pub fn state(&self) -> ExecutionState {
        self.manager.state()
    }

    pub fn is_running(&self) -> bool {
        self.manager.state() != ExecutionState::NotRunning
    }

    pub fn run(&mut self) -> Result<bool> {
        self.manager.run(&self.world, &self.program)
    }

    pub fn resume_or_run(&mut self) -> Result<bool> {
        self.manager.resume_or_run(&self.world, &self.program)
    }

    pub fn pause(&mut self) -> bool {
        self.manager.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.manager.resume()
    }

    pub fn next_step(&mut self) -> bool {
        self.manager.next_step()
    }

    pub fn stop(&mut self) -> bool {
        self.manager.stop()
    }

    /// Update the simulation by delta_seconds
    pub fn update(&mut self, delta_seconds: f32) -> Result<()> {
        self.manager
            .update(&self.world, &mut self.program, delta_seconds)
    }

    /// Take the events raised since the last drain.
    pub fn drain_events(&mut self) -> Vec<ExecutionEvent> {
        self.manager.drain_events()
    }

    /// Scene reload: halt the run, zero loop counters and put every robot
    /// back at rest.
    pub fn reset(&mut self) {
        self.manager.halt(&self.world);
        self.program.reset();
        self.manager.collect_graph_events(&mut self.program);
        for robot in robots(&self.world) {
            reset_robot(&self.world, robot);
        }
        info!("scene reset");
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.manager.set_time_scale(scale);
        self.config.time_scale = self.manager.clock().time_scale();
    }

    pub fn time_scale(&self) -> f32 {
        self.manager.clock().time_scale()
    }

    /// Simulated seconds elapsed while running.
    pub fn sim_time(&self) -> f64 {
        self.manager.clock().elapsed()
    }

    pub fn robot_count(&self) -> usize {
        self.world.query::<&Robot>().iter().count()
    }

    /// Save the scene to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> std::result::Result<(), SaveError> {
        save_scene(
            writer,
            &self.world,
            &self.config,
            &self.program,
            self.manager.robot(),
        )
    }

    /// Load a scene from a reader. Any run in progress is discarded.
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> std::result::Result<(), SaveError> {
        let loaded = load_scene(reader)?;

        self.manager.halt(&self.world);
        self.world = loaded.world;
        self.program = loaded.program;
        self.config = loaded.config;
        self.manager = ExecutionManager::new(&self.config);
        self.config.time_scale = self.manager.clock().time_scale();
        if let Some(target) = loaded.target {
            self.manager.set_target(target);
        }
        info!("loaded scene with {} robot(s)", self.robot_count());
        Ok(())
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> std::result::Result<(), SaveError> {
        let file = File::create(path)?;
        self.save(BufWriter::new(file))
    }

    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> std::result::Result<(), SaveError> {
        let file = File::open(path)?;
        self.load(BufReader::new(file))
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new(ExecutionConfig::default())
    }
}
