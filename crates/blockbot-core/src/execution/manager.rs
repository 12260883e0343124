//! Execution manager - global run/pause/resume/stop control over all walkers.
//!
//! # Tick order
//!
//! `update` runs once per host frame:
//! 1. tear down walkers that asked to finish (even while paused)
//! 2. end the run once no walkers are left
//! 3. advance the clock and the robot's slots
//! 4. route slot notifications (idle slots resume their walkers)
//! 5. step each ready walker once

use blockbot_logic::config::{CommandTuning, ExecutionConfig};
use blockbot_logic::graph::{BlockGraph, GraphEvent};
use hecs::{Entity, RefMut, World};
use log::{debug, error, info, warn};

use super::clock::SimClock;
use super::dice::Dice;
use super::events::{ExecutionEvent, SlotActivity};
use super::scheduler::{RobotThreads, SlotId, SlotNotification, SlotState};
use super::walker::{ProgramWalker, StepOutcome, WalkerPhase};
use crate::error::{ExecutionError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionState {
    #[default]
    NotRunning,
    Running,
    Paused,
}

pub struct ExecutionManager {
    /// Robot the program drives.
    robot: Option<Entity>,
    state: ExecutionState,
    walkers: Vec<ProgramWalker>,
    clock: SimClock,
    dice: Dice,
    tuning: CommandTuning,
    /// One-shot "pause after the next advance" flag armed by `next_step`.
    step_armed: bool,
    events: Vec<ExecutionEvent>,
}

fn threads_of(world: &World, robot: Entity) -> Result<RefMut<'_, RobotThreads>> {
    world
        .get::<&mut RobotThreads>(robot)
        .map_err(|_| ExecutionError::RobotNotFound(robot))
}

/// Cancel `slots`. Blocked slots go first so that releasing a running slot
/// cannot hand its resource to a walker that is also going away.
fn release_all(
    world: &World,
    robot: Entity,
    threads: &mut RobotThreads,
    slots: &[SlotId],
) -> Result<()> {
    for slot in slots {
        if threads.state(*slot)? == SlotState::Blocked {
            threads.release(world, robot, *slot)?;
        }
    }
    for slot in slots {
        threads.release(world, robot, *slot)?;
    }
    Ok(())
}

impl ExecutionManager {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            robot: None,
            state: ExecutionState::NotRunning,
            walkers: Vec::new(),
            clock: SimClock::new(config.time_scale),
            dice: Dice::new(config.seed),
            tuning: config.tuning,
            step_armed: false,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn robot(&self) -> Option<Entity> {
        self.robot
    }

    /// Choose the robot to drive. Ignored while a run is in progress.
    pub fn set_target(&mut self, robot: Entity) -> bool {
        if self.state != ExecutionState::NotRunning {
            return false;
        }
        self.robot = Some(robot);
        true
    }

    pub fn walkers(&self) -> &[ProgramWalker] {
        &self.walkers
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.clock.set_time_scale(scale);
    }

    pub fn is_step_armed(&self) -> bool {
        self.step_armed
    }

    /// Start one walker per `Start` block, in discovery order.
    ///
    /// Returns `false` (and stays NotRunning) when already running, when no
    /// robot is targeted, or when the program has no start blocks.
    pub fn run(&mut self, world: &World, graph: &BlockGraph) -> Result<bool> {
        if self.state != ExecutionState::NotRunning {
            return Ok(false);
        }
        let Some(robot) = self.robot else {
            warn!("run() without a target robot");
            return Ok(false);
        };
        let starts = graph.start_blocks();
        if starts.is_empty() {
            info!("program has no start blocks, nothing to run");
            return Ok(false);
        }

        let mut threads = threads_of(world, robot)?;
        for start in starts {
            let slot = threads.create_slot();
            self.walkers.push(ProgramWalker::new(slot, start));
            self.events.push(ExecutionEvent::WalkerCreated { slot, start });
        }
        self.state = ExecutionState::Running;
        self.step_armed = false;
        self.clock.resume();
        self.events.push(ExecutionEvent::ExecutionStarted);
        info!("execution started with {} walker(s)", self.walkers.len());
        Ok(true)
    }

    pub fn pause(&mut self) -> bool {
        if self.state != ExecutionState::Running {
            return false;
        }
        self.state = ExecutionState::Paused;
        self.clock.freeze();
        self.events.push(ExecutionEvent::ExecutionPaused);
        info!("execution paused");
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != ExecutionState::Paused {
            return false;
        }
        self.state = ExecutionState::Running;
        self.clock.resume();
        self.events.push(ExecutionEvent::ExecutionResumed);
        info!("execution resumed");
        true
    }

    pub fn resume_or_run(&mut self, world: &World, graph: &BlockGraph) -> Result<bool> {
        match self.state {
            ExecutionState::NotRunning => self.run(world, graph),
            ExecutionState::Paused => Ok(self.resume()),
            ExecutionState::Running => Ok(false),
        }
    }

    /// Resume until the next block advance of any walker, then pause again.
    pub fn next_step(&mut self) -> bool {
        if self.state != ExecutionState::Paused {
            return false;
        }
        self.step_armed = true;
        self.resume()
    }

    /// Finish every walker. The run ends once teardown has deleted them all.
    pub fn stop(&mut self) -> bool {
        if self.state == ExecutionState::NotRunning {
            return false;
        }
        for walker in &mut self.walkers {
            walker.finish();
        }
        self.step_armed = false;
        info!("execution stopping");
        true
    }

    /// Drop every walker and slot immediately, without emitting events.
    /// Used when the scene is reset or replaced. A slot that cannot be
    /// released is logged and does not keep the others alive.
    pub fn halt(&mut self, world: &World) {
        if let Some(robot) = self.robot {
            if let Ok(mut threads) = threads_of(world, robot) {
                let slots: Vec<SlotId> = self.walkers.iter().map(|w| w.slot()).collect();
                for slot in &slots {
                    if threads.state(*slot) == Ok(SlotState::Blocked) {
                        if let Err(e) = threads.release(world, robot, *slot) {
                            error!("halt: {e}");
                        }
                    }
                }
                for slot in slots {
                    let released = threads
                        .release(world, robot, slot)
                        .and_then(|()| threads.delete_slot(slot));
                    if let Err(e) = released {
                        error!("halt: {e}");
                    }
                }
                threads.drain_notifications();
            }
        }
        self.walkers.clear();
        self.state = ExecutionState::NotRunning;
        self.step_armed = false;
        self.clock.resume();
    }

    /// Advance the run by one host frame of `dt` seconds.
    pub fn update(&mut self, world: &World, graph: &mut BlockGraph, dt: f32) -> Result<()> {
        if self.state == ExecutionState::NotRunning {
            return Ok(());
        }
        let Some(robot) = self.robot else {
            return Ok(());
        };
        let mut threads = threads_of(world, robot)?;

        self.teardown(world, robot, &mut threads)?;
        if self.walkers.is_empty() {
            self.state = ExecutionState::NotRunning;
            self.step_armed = false;
            self.clock.resume();
            self.events.push(ExecutionEvent::ExecutionEnded);
            info!("execution ended");
            return Ok(());
        }
        if self.state != ExecutionState::Running {
            return Ok(());
        }

        let scaled = self.clock.advance(dt);
        threads.tick(world, robot, scaled, &self.tuning)?;
        self.route_notifications(&mut threads);

        for i in 0..self.walkers.len() {
            if self.state != ExecutionState::Running {
                break;
            }
            let outcome = self.walkers[i].step(graph, &mut threads, world, robot, &mut self.dice)?;
            self.collect_graph_events(graph);
            self.handle_outcome(i, &outcome);
            self.route_notifications(&mut threads);

            if self.step_armed && outcome.advanced_to().is_some() {
                self.step_armed = false;
                self.pause();
            }
        }
        Ok(())
    }

    /// Release and delete the slots of finishing walkers.
    fn teardown(&mut self, world: &World, robot: Entity, threads: &mut RobotThreads) -> Result<()> {
        let finishing: Vec<_> = self
            .walkers
            .iter()
            .filter(|w| w.is_finishing())
            .map(|w| w.slot())
            .collect();
        if finishing.is_empty() {
            return Ok(());
        }

        release_all(world, robot, threads, &finishing)?;
        self.route_notifications(threads);
        for slot in finishing {
            threads.delete_slot(slot)?;
            self.walkers.retain(|w| w.slot() != slot);
            self.events.push(ExecutionEvent::WalkerDeleted { slot });
            debug!("walker on {slot} deleted");
        }
        Ok(())
    }

    fn route_notifications(&mut self, threads: &mut RobotThreads) {
        for notification in threads.drain_notifications() {
            match notification {
                SlotNotification::StateChanged { slot, state } => {
                    let activity = match state {
                        SlotState::Executing => SlotActivity::Running,
                        SlotState::Idle | SlotState::Blocked => SlotActivity::Stopped,
                    };
                    self.events
                        .push(ExecutionEvent::SlotStateChanged { slot, activity });
                    if state == SlotState::Idle {
                        if let Some(walker) = self.walkers.iter_mut().find(|w| w.slot() == slot) {
                            walker.on_slot_idle();
                        }
                    }
                }
                SlotNotification::Rejected {
                    slot,
                    command,
                    error,
                } => {
                    let Some(walker) = self.walkers.iter_mut().find(|w| w.slot() == slot) else {
                        continue;
                    };
                    warn!("{slot}: {} rejected: {error}", command.kind());
                    self.events.push(ExecutionEvent::CommandRejected {
                        slot,
                        block: walker.current(),
                        reason: error.to_string(),
                    });
                    walker.finish();
                }
            }
        }
    }

    pub(crate) fn collect_graph_events(&mut self, graph: &mut BlockGraph) {
        for event in graph.drain_events() {
            let GraphEvent::IterationChanged { block, iteration } = event;
            self.events
                .push(ExecutionEvent::IterationChanged { block, iteration });
        }
    }

    fn handle_outcome(&mut self, index: usize, outcome: &StepOutcome) {
        let slot = self.walkers[index].slot();
        if let Some(block) = outcome.advanced_to() {
            self.events.push(ExecutionEvent::WalkerAdvanced { slot, block });
            debug!("walker on {slot} advanced to {block}");
        }

        match outcome {
            StepOutcome::ReachedEnd(block) => {
                info!("walker on {slot} reached end block {block}");
                self.stop();
            }
            StepOutcome::Rejected { block, error } => {
                warn!("{slot}: block {block} rejected: {error}");
                self.events.push(ExecutionEvent::CommandRejected {
                    slot,
                    block: *block,
                    reason: error.to_string(),
                });
                self.walkers[index].finish();
            }
            StepOutcome::DeadEnd(block) => {
                warn!("walker on {slot} stuck at {block}: no successor");
                self.walkers[index].finish();
            }
            StepOutcome::Advanced(_) | StepOutcome::Dispatched(_) | StepOutcome::Waiting => {}
        }
    }

    /// Take the events raised since the last drain.
    pub fn drain_events(&mut self) -> Vec<ExecutionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Phase of the walker driving `slot`, for observers.
    pub fn walker_phase(&self, slot: SlotId) -> Option<WalkerPhase> {
        self.walkers
            .iter()
            .find(|w| w.slot() == slot)
            .map(|w| w.phase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Drivetrain;
    use crate::spawn::spawn_robot;
    use blockbot_logic::chassis::{ChassisKind, RobotSpec};
    use blockbot_logic::command::Command;
    use blockbot_logic::graph::GraphBuilder;

    fn setup(chassis: ChassisKind) -> (World, ExecutionManager) {
        let mut world = World::new();
        let robot = spawn_robot(&mut world, &RobotSpec::new("bot", chassis));
        let mut manager = ExecutionManager::new(&ExecutionConfig::default());
        manager.set_target(robot);
        (world, manager)
    }

    fn names(events: &[ExecutionEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn test_run_without_start_blocks_stays_idle() {
        let (world, mut manager) = setup(ChassisKind::Tank);
        let mut b = GraphBuilder::new();
        b.end();
        let graph = b.build().unwrap();
        assert!(!manager.run(&world, &graph).unwrap());
        assert_eq!(manager.state(), ExecutionState::NotRunning);
        assert!(manager.drain_events().is_empty());
    }

    #[test]
    fn test_run_without_target_is_noop() {
        let world = World::new();
        let mut manager = ExecutionManager::new(&ExecutionConfig::default());
        let mut b = GraphBuilder::new();
        b.start();
        let graph = b.build().unwrap();
        assert!(!manager.run(&world, &graph).unwrap());
    }

    #[test]
    fn test_control_calls_in_wrong_state_are_noops() {
        let (world, mut manager) = setup(ChassisKind::Tank);
        assert!(!manager.pause());
        assert!(!manager.resume());
        assert!(!manager.next_step());
        assert!(!manager.stop());

        let mut b = GraphBuilder::new();
        let start = b.start();
        let end = b.end();
        b.link(start, end);
        let graph = b.build().unwrap();
        assert!(manager.run(&world, &graph).unwrap());
        assert!(!manager.run(&world, &graph).unwrap());
        assert!(!manager.resume());
        assert!(manager.pause());
        assert!(!manager.pause());
    }

    #[test]
    fn test_walkers_created_in_discovery_order() {
        let (world, mut manager) = setup(ChassisKind::Tank);
        let mut b = GraphBuilder::new();
        let s1 = b.start();
        let s2 = b.start();
        let end = b.end();
        b.link(s1, end);
        b.link(s2, end);
        let graph = b.build().unwrap();

        manager.run(&world, &graph).unwrap();
        let created: Vec<_> = manager
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ExecutionEvent::WalkerCreated { slot, start } => Some((slot.0, start)),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![(0, s1), (1, s2)]);
    }

    #[test]
    fn test_end_stops_every_walker() {
        let (world, mut manager) = setup(ChassisKind::Tank);
        let mut b = GraphBuilder::new();
        let quick = b.start();
        let slow = b.start();
        let wait = b.wait(100.0);
        let end = b.end();
        b.link(quick, end);
        b.chain(&[slow, wait, end]);
        let mut graph = b.build().unwrap();

        manager.run(&world, &graph).unwrap();
        manager.update(&world, &mut graph, 0.1).unwrap();
        manager.update(&world, &mut graph, 0.1).unwrap();
        assert_eq!(manager.state(), ExecutionState::NotRunning);

        let events = manager.drain_events();
        let deleted = events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::WalkerDeleted { .. }))
            .count();
        assert_eq!(deleted, 2);
        assert_eq!(names(&events).last(), Some(&"execution_ended"));

        let robot = manager.robot().unwrap();
        assert!(threads_of(&world, robot).unwrap().is_empty());
    }

    #[test]
    fn test_rejected_walker_halts_alone() {
        let (world, mut manager) = setup(ChassisKind::Rover);
        let mut b = GraphBuilder::new();
        let shooter = b.start();
        let shoot = b.action(Command::ShootWeapon);
        let driver = b.start();
        let drive = b.action(Command::Move {
            duration: 1.0,
            torque: 1.0,
        });
        let end = b.end();
        b.chain(&[shooter, shoot, end]);
        b.chain(&[driver, drive, end]);
        let mut graph = b.build().unwrap();

        manager.run(&world, &graph).unwrap();
        manager.update(&world, &mut graph, 0.5).unwrap();
        manager.update(&world, &mut graph, 0.5).unwrap();
        // The shooter was torn down; the driver still owns its Move.
        assert_eq!(manager.walkers().len(), 1);
        assert_eq!(manager.state(), ExecutionState::Running);

        let events = manager.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            ExecutionEvent::CommandRejected { block, .. } if *block == shoot
        )));
    }

    #[test]
    fn test_paused_run_makes_no_progress() {
        let (world, mut manager) = setup(ChassisKind::Tank);
        let mut b = GraphBuilder::new();
        let start = b.start();
        let wait = b.wait(1.0);
        let end = b.end();
        b.chain(&[start, wait, end]);
        let mut graph = b.build().unwrap();

        manager.run(&world, &graph).unwrap();
        manager.update(&world, &mut graph, 0.5).unwrap();
        manager.pause();
        for _ in 0..50 {
            manager.update(&world, &mut graph, 0.5).unwrap();
        }
        assert_eq!(manager.state(), ExecutionState::Paused);
        assert_eq!(manager.walkers()[0].current(), wait);
        assert!(manager.clock().is_frozen());
    }

    #[test]
    fn test_stop_while_paused_ends_run() {
        let (world, mut manager) = setup(ChassisKind::Tank);
        let mut b = GraphBuilder::new();
        let start = b.start();
        let wait = b.wait(10.0);
        let end = b.end();
        b.chain(&[start, wait, end]);
        let mut graph = b.build().unwrap();

        manager.run(&world, &graph).unwrap();
        manager.update(&world, &mut graph, 0.5).unwrap();
        manager.pause();
        assert!(manager.stop());
        manager.update(&world, &mut graph, 0.5).unwrap();
        assert_eq!(manager.state(), ExecutionState::NotRunning);
        assert!(!manager.clock().is_frozen());
    }

    #[test]
    fn test_halt_clears_remaining_slots_when_one_is_gone() {
        let (world, mut manager) = setup(ChassisKind::Tank);
        let mut b = GraphBuilder::new();
        let gunner = b.start();
        let aim = b.action(Command::RotateWeapon { angle: 90.0 });
        let driver = b.start();
        let drive = b.action(Command::Move {
            duration: 10.0,
            torque: 3.0,
        });
        let end = b.end();
        b.chain(&[gunner, aim, end]);
        b.chain(&[driver, drive, end]);
        let mut graph = b.build().unwrap();

        manager.run(&world, &graph).unwrap();
        manager.update(&world, &mut graph, 0.1).unwrap();
        manager.update(&world, &mut graph, 0.1).unwrap();
        let robot = manager.robot().unwrap();
        {
            let mut threads = threads_of(&world, robot).unwrap();
            threads.release(&world, robot, SlotId(0)).unwrap();
            threads.delete_slot(SlotId(0)).unwrap();
        }
        assert_eq!(world.get::<&Drivetrain>(robot).unwrap().torque, 3.0);

        manager.halt(&world);
        assert_eq!(manager.state(), ExecutionState::NotRunning);
        assert!(manager.walkers().is_empty());
        assert!(threads_of(&world, robot).unwrap().is_empty());
        assert_eq!(world.get::<&Drivetrain>(robot).unwrap().torque, 0.0);
    }
}
