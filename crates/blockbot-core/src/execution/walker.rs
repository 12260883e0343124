//! Program walker - one traversal of the graph from a `Start` block.
//!
//! A walker is a small state machine stepped by the execution manager: at
//! most one block per tick, suspended while its slot runs a command.

use blockbot_logic::expr::EvalContext;
use blockbot_logic::graph::{BlockGraph, BlockId};
use hecs::{Entity, World};

use super::scheduler::{RobotThreads, SlotId};
use crate::error::{ExecutionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerPhase {
    /// Will advance on the next step.
    Ready,
    /// Its slot is executing or blocked; resumed by `on_slot_idle`.
    AwaitingSlot,
    /// Reached `End`, hit a dead end or had a command rejected.
    Halted,
}

/// What a single step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Moved onto a control-flow block; continues next tick.
    Advanced(BlockId),
    /// Moved onto a command block and handed the command to the slot.
    Dispatched(BlockId),
    /// Moved onto `End`.
    ReachedEnd(BlockId),
    /// Moved onto a command block the robot cannot run.
    Rejected { block: BlockId, error: ExecutionError },
    /// `current` has no successor.
    DeadEnd(BlockId),
    /// Nothing to do (suspended, halted or finishing).
    Waiting,
}

impl StepOutcome {
    /// The block the walker moved onto, if it moved.
    pub fn advanced_to(&self) -> Option<BlockId> {
        match self {
            StepOutcome::Advanced(b)
            | StepOutcome::Dispatched(b)
            | StepOutcome::ReachedEnd(b)
            | StepOutcome::Rejected { block: b, .. } => Some(*b),
            StepOutcome::DeadEnd(_) | StepOutcome::Waiting => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramWalker {
    slot: SlotId,
    start: BlockId,
    current: BlockId,
    phase: WalkerPhase,
    finish_requested: bool,
}

impl ProgramWalker {
    pub fn new(slot: SlotId, start: BlockId) -> Self {
        Self {
            slot,
            start,
            current: start,
            phase: WalkerPhase::Ready,
            finish_requested: false,
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn start(&self) -> BlockId {
        self.start
    }

    pub fn current(&self) -> BlockId {
        self.current
    }

    pub fn phase(&self) -> WalkerPhase {
        self.phase
    }

    pub fn is_finishing(&self) -> bool {
        self.finish_requested
    }

    /// Ask for teardown at the next tick boundary.
    pub fn finish(&mut self) {
        self.finish_requested = true;
    }

    /// The slot went idle: the dispatched command is done.
    pub fn on_slot_idle(&mut self) {
        if self.phase == WalkerPhase::AwaitingSlot {
            self.phase = WalkerPhase::Ready;
        }
    }

    /// Advance one block.
    ///
    /// Only scheduler invariant violations are returned as errors; a rejected
    /// command is reported through [`StepOutcome::Rejected`].
    pub fn step(
        &mut self,
        graph: &mut BlockGraph,
        threads: &mut RobotThreads,
        world: &World,
        robot: Entity,
        ctx: &mut dyn EvalContext,
    ) -> Result<StepOutcome> {
        if self.finish_requested || self.phase != WalkerPhase::Ready {
            return Ok(StepOutcome::Waiting);
        }

        let Some(next) = graph.next_block(self.current, ctx) else {
            self.phase = WalkerPhase::Halted;
            return Ok(StepOutcome::DeadEnd(self.current));
        };
        let Some(block) = graph.get(next) else {
            self.phase = WalkerPhase::Halted;
            return Ok(StepOutcome::DeadEnd(self.current));
        };
        self.current = next;

        if block.is_end() {
            self.phase = WalkerPhase::Halted;
            return Ok(StepOutcome::ReachedEnd(next));
        }

        let Some(command) = block.command() else {
            return Ok(StepOutcome::Advanced(next));
        };
        match threads.execute(world, robot, self.slot, command) {
            Ok(_) => {
                self.phase = WalkerPhase::AwaitingSlot;
                Ok(StepOutcome::Dispatched(next))
            }
            Err(error @ ExecutionError::IncompatibleCommand { .. }) => {
                self.phase = WalkerPhase::Halted;
                Ok(StepOutcome::Rejected { block: next, error })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::spawn_robot;
    use blockbot_logic::chassis::{ChassisKind, RobotSpec};
    use blockbot_logic::command::Command;
    use blockbot_logic::config::CommandTuning;
    use blockbot_logic::expr::{Expr, FixedRoll};
    use blockbot_logic::graph::GraphBuilder;

    struct Rig {
        world: World,
        robot: Entity,
        threads: RobotThreads,
    }

    fn rig(chassis: ChassisKind) -> Rig {
        let mut world = World::new();
        let robot = spawn_robot(&mut world, &RobotSpec::new("bot", chassis));
        Rig {
            world,
            robot,
            threads: RobotThreads::new(),
        }
    }

    impl Rig {
        fn step(&mut self, walker: &mut ProgramWalker, graph: &mut BlockGraph) -> StepOutcome {
            walker
                .step(
                    graph,
                    &mut self.threads,
                    &self.world,
                    self.robot,
                    &mut FixedRoll(0.5),
                )
                .unwrap()
        }
    }

    #[test]
    fn test_control_blocks_take_one_step_each() {
        let mut b = GraphBuilder::new();
        let start = b.start();
        let cond = b.branch(Expr::constant(true), None);
        let end = b.end();
        b.chain(&[start, cond, end]);
        let mut graph = b.build().unwrap();

        let mut rig = rig(ChassisKind::Dummy);
        let mut walker = ProgramWalker::new(rig.threads.create_slot(), start);
        assert_eq!(rig.step(&mut walker, &mut graph), StepOutcome::Advanced(cond));
        assert_eq!(rig.step(&mut walker, &mut graph), StepOutcome::ReachedEnd(end));
        assert_eq!(walker.phase(), WalkerPhase::Halted);
        assert_eq!(rig.step(&mut walker, &mut graph), StepOutcome::Waiting);
    }

    #[test]
    fn test_command_suspends_until_slot_idle() {
        let mut b = GraphBuilder::new();
        let start = b.start();
        let wait = b.wait(1.0);
        let end = b.end();
        b.chain(&[start, wait, end]);
        let mut graph = b.build().unwrap();

        let mut rig = rig(ChassisKind::Dummy);
        let slot = rig.threads.create_slot();
        let mut walker = ProgramWalker::new(slot, start);

        assert_eq!(rig.step(&mut walker, &mut graph), StepOutcome::Dispatched(wait));
        assert_eq!(walker.phase(), WalkerPhase::AwaitingSlot);
        assert_eq!(rig.step(&mut walker, &mut graph), StepOutcome::Waiting);

        rig.threads
            .tick(&rig.world, rig.robot, 1.0, &CommandTuning::default())
            .unwrap();
        walker.on_slot_idle();
        assert_eq!(rig.step(&mut walker, &mut graph), StepOutcome::ReachedEnd(end));
    }

    #[test]
    fn test_incompatible_command_halts_walker() {
        let mut b = GraphBuilder::new();
        let start = b.start();
        let shoot = b.action(Command::ShootWeapon);
        let end = b.end();
        b.chain(&[start, shoot, end]);
        let mut graph = b.build().unwrap();

        let mut rig = rig(ChassisKind::Rover);
        let mut walker = ProgramWalker::new(rig.threads.create_slot(), start);
        let outcome = rig.step(&mut walker, &mut graph);
        assert!(matches!(
            outcome,
            StepOutcome::Rejected { block, error: ExecutionError::IncompatibleCommand { .. } }
                if block == shoot
        ));
        assert_eq!(walker.phase(), WalkerPhase::Halted);
        assert_eq!(walker.current(), shoot);
    }

    #[test]
    fn test_missing_successor_is_dead_end() {
        let mut b = GraphBuilder::new();
        let start = b.start();
        let mut graph = b.build().unwrap();

        let mut rig = rig(ChassisKind::Dummy);
        let mut walker = ProgramWalker::new(rig.threads.create_slot(), start);
        assert_eq!(rig.step(&mut walker, &mut graph), StepOutcome::DeadEnd(start));
        assert_eq!(walker.phase(), WalkerPhase::Halted);
    }

    #[test]
    fn test_finishing_walker_does_not_step() {
        let mut b = GraphBuilder::new();
        let start = b.start();
        let end = b.end();
        b.link(start, end);
        let mut graph = b.build().unwrap();

        let mut rig = rig(ChassisKind::Dummy);
        let mut walker = ProgramWalker::new(rig.threads.create_slot(), start);
        walker.finish();
        assert!(walker.is_finishing());
        assert_eq!(rig.step(&mut walker, &mut graph), StepOutcome::Waiting);
        assert_eq!(walker.current(), start);
    }
}
