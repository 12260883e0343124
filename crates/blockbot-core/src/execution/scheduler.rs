//! Robot thread scheduler - per-robot execution slots.
//!
//! Each slot runs at most one command. Commands of the same kind never run at the same time on one robot: a slot that asks for a busy kind
//! is parked on the running slot's wait-list and retried, in FIFO order,
//! when that slot goes idle. State changes are queued as notifications and
//! drained by the execution manager.

use std::collections::{BTreeMap, VecDeque};

use blockbot_logic::command::{Command, CommandKind};
use blockbot_logic::config::CommandTuning;
use hecs::{Entity, World};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::commands::ActiveCommand;
use crate::error::{ExecutionError, Result};

/// Small integer handle of a slot. Ids are reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub u32);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotState {
    #[default]
    Idle,
    Executing,
    Blocked,
}

/// Messages from the scheduler to whoever owns the slots.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotNotification {
    /// Public transition. Silent transitions (Blocked, and Blocked → Idle
    /// before a retry) are never reported.
    StateChanged { slot: SlotId, state: SlotState },
    /// A command that was accepted while blocked, or that was running, failed.
    Rejected {
        slot: SlotId,
        command: Command,
        error: ExecutionError,
    },
}

#[derive(Debug, Default)]
struct Slot {
    state: SlotState,
    active: Option<ActiveCommand>,
    /// Command parked while Blocked.
    pending: Option<Command>,
    /// Slots blocked on this one, oldest first.
    waiters: VecDeque<SlotId>,
}

/// The slot table of one robot. Lives on the robot entity as a component.
#[derive(Debug, Default)]
pub struct RobotThreads {
    slots: BTreeMap<SlotId, Slot>,
    notifications: Vec<SlotNotification>,
}

impl RobotThreads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the smallest unused id.
    pub fn create_slot(&mut self) -> SlotId {
        let mut id = SlotId(0);
        while self.slots.contains_key(&id) {
            id.0 += 1;
        }
        self.slots.insert(id, Slot::default());
        debug!("created {id}");
        id
    }

    /// Remove an idle slot.
    pub fn delete_slot(&mut self, id: SlotId) -> Result<()> {
        let state = self.state(id)?;
        if state != SlotState::Idle {
            return Err(ExecutionError::SlotUnavailable { slot: id, state });
        }
        self.slots.remove(&id);
        debug!("deleted {id}");
        Ok(())
    }

    pub fn state(&self, id: SlotId) -> Result<SlotState> {
        self.slots
            .get(&id)
            .map(|s| s.state)
            .ok_or(ExecutionError::SlotNotFound(id))
    }

    /// The command running on a slot, if any.
    pub fn current_command(&self, id: SlotId) -> Option<Command> {
        self.slots
            .get(&id)
            .and_then(|s| s.active.as_ref())
            .map(|a| a.command())
    }

    /// Slots waiting on `id`, oldest first.
    pub fn waiters(&self, id: SlotId) -> Vec<SlotId> {
        self.slots
            .get(&id)
            .map(|s| s.waiters.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.slots.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_mut(&mut self, id: SlotId) -> Result<&mut Slot> {
        self.slots.get_mut(&id).ok_or(ExecutionError::SlotNotFound(id))
    }

    fn notify(&mut self, slot: SlotId, state: SlotState) {
        self.notifications
            .push(SlotNotification::StateChanged { slot, state });
    }

    /// Another slot currently running a command of `kind`.
    fn holder_of(&self, kind: CommandKind, except: SlotId) -> Option<SlotId> {
        self.slots.iter().find_map(|(id, slot)| {
            let running = slot.active.as_ref().map(|a| a.command().kind());
            (*id != except && slot.state == SlotState::Executing && running == Some(kind))
                .then_some(*id)
        })
    }

    /// Start `command` on an idle slot.
    ///
    /// Returns the resulting state: `Executing`, or `Blocked` when another
    /// slot is running a command of the same kind. A capability mismatch leaves the
    /// slot idle and returns `IncompatibleCommand`.
    pub fn execute(
        &mut self,
        world: &World,
        robot: Entity,
        id: SlotId,
        command: Command,
    ) -> Result<SlotState> {
        let state = self.state(id)?;
        if state != SlotState::Idle {
            return Err(ExecutionError::SlotUnavailable { slot: id, state });
        }

        let kind = command.kind();
        if let Some(holder) = self.holder_of(kind, id) {
            let slot = self.slot_mut(id)?;
            slot.state = SlotState::Blocked;
            slot.pending = Some(command);
            self.slot_mut(holder)?.waiters.push_back(id);
            debug!("{id} blocked on {holder} for {kind}");
            return Ok(SlotState::Blocked);
        }

        let active = ActiveCommand::begin(command, world, robot)?;
        let slot = self.slot_mut(id)?;
        slot.active = Some(active);
        slot.state = SlotState::Executing;
        self.notify(id, SlotState::Executing);
        debug!("{id} executing {kind}");
        Ok(SlotState::Executing)
    }

    /// Advance every executing slot by `dt`, in id order.
    pub fn tick(
        &mut self,
        world: &World,
        robot: Entity,
        dt: f32,
        tuning: &CommandTuning,
    ) -> Result<()> {
        let executing: Vec<SlotId> = self
            .slots
            .iter()
            .filter(|(_, s)| s.state == SlotState::Executing)
            .map(|(id, _)| *id)
            .collect();

        for id in executing {
            let Some(active) = self.slot_mut(id)?.active.as_mut() else {
                continue;
            };
            let command = active.command();
            match active.advance(world, robot, dt, tuning) {
                Ok(false) => {}
                Ok(true) => self.complete(world, robot, id)?,
                Err(error) => {
                    self.notifications
                        .push(SlotNotification::Rejected { slot: id, command, error });
                    self.complete(world, robot, id)?;
                }
            }
        }
        Ok(())
    }

    /// Return an executing slot to Idle and hand its resource to the waiters.
    fn complete(&mut self, world: &World, robot: Entity, id: SlotId) -> Result<()> {
        let slot = self.slot_mut(id)?;
        slot.active = None;
        slot.state = SlotState::Idle;
        let waiters = std::mem::take(&mut slot.waiters);
        self.notify(id, SlotState::Idle);
        debug!("{id} idle, {} waiting", waiters.len());

        for waiter in waiters {
            self.retry(world, robot, waiter)?;
        }
        Ok(())
    }

    /// Silently unblock a waiter and re-attempt its parked command.
    fn retry(&mut self, world: &World, robot: Entity, id: SlotId) -> Result<()> {
        let slot = self.slot_mut(id)?;
        if slot.state != SlotState::Blocked {
            return Ok(());
        }
        slot.state = SlotState::Idle;
        let Some(command) = slot.pending.take() else {
            return Ok(());
        };

        match self.execute(world, robot, id, command) {
            Ok(_) => Ok(()),
            Err(error @ ExecutionError::IncompatibleCommand { .. }) => {
                self.notifications
                    .push(SlotNotification::Rejected { slot: id, command, error });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Cancel whatever the slot is doing and leave it Idle.
    ///
    /// An executing command is aborted and its waiters are retried; a blocked
    /// slot is withdrawn from the wait-list it sits on.
    pub fn release(&mut self, world: &World, robot: Entity, id: SlotId) -> Result<()> {
        match self.state(id)? {
            SlotState::Idle => Ok(()),
            SlotState::Executing => {
                if let Some(active) = self.slot_mut(id)?.active.as_ref() {
                    active.abort(world, robot);
                }
                self.complete(world, robot, id)
            }
            SlotState::Blocked => {
                let slot = self.slot_mut(id)?;
                slot.pending = None;
                slot.state = SlotState::Idle;
                for other in self.slots.values_mut() {
                    other.waiters.retain(|w| *w != id);
                }
                Ok(())
            }
        }
    }

    /// Take the notifications queued since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<SlotNotification> {
        std::mem::take(&mut self.notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::spawn_robot;
    use blockbot_logic::chassis::{ChassisKind, RobotSpec};
    use blockbot_logic::command::TurnDirection;

    fn setup(chassis: ChassisKind) -> (World, Entity, RobotThreads) {
        let mut world = World::new();
        let robot = spawn_robot(&mut world, &RobotSpec::new("bot", chassis));
        (world, robot, RobotThreads::new())
    }

    fn mv(duration: f32) -> Command {
        Command::Move {
            duration,
            torque: 1.0,
        }
    }

    fn state_changes(threads: &mut RobotThreads) -> Vec<(SlotId, SlotState)> {
        threads
            .drain_notifications()
            .into_iter()
            .filter_map(|n| match n {
                SlotNotification::StateChanged { slot, state } => Some((slot, state)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_create_slot_uses_smallest_free_id() {
        let mut threads = RobotThreads::new();
        assert_eq!(threads.create_slot(), SlotId(0));
        assert_eq!(threads.create_slot(), SlotId(1));
        assert_eq!(threads.create_slot(), SlotId(2));
        threads.delete_slot(SlotId(1)).unwrap();
        assert_eq!(threads.create_slot(), SlotId(1));
        assert_eq!(threads.create_slot(), SlotId(3));
    }

    #[test]
    fn test_same_kind_blocks_until_holder_is_idle() {
        let (world, robot, mut threads) = setup(ChassisKind::Tank);
        let tuning = CommandTuning::default();
        let s1 = threads.create_slot();
        let s2 = threads.create_slot();

        assert_eq!(threads.execute(&world, robot, s1, mv(1.0)).unwrap(), SlotState::Executing);
        assert_eq!(threads.execute(&world, robot, s2, mv(1.0)).unwrap(), SlotState::Blocked);
        assert_eq!(threads.waiters(s1), vec![s2]);
        // Blocking is silent.
        assert_eq!(state_changes(&mut threads), vec![(s1, SlotState::Executing)]);

        threads.tick(&world, robot, 0.5, &tuning).unwrap();
        assert_eq!(threads.state(s2).unwrap(), SlotState::Blocked);

        threads.tick(&world, robot, 0.5, &tuning).unwrap();
        assert_eq!(threads.state(s1).unwrap(), SlotState::Idle);
        assert_eq!(threads.state(s2).unwrap(), SlotState::Executing);
        // s2 never reports its silent Blocked → Idle hop.
        assert_eq!(
            state_changes(&mut threads),
            vec![(s1, SlotState::Idle), (s2, SlotState::Executing)]
        );
    }

    #[test]
    fn test_different_kinds_run_in_parallel() {
        let (world, robot, mut threads) = setup(ChassisKind::Tank);
        let s1 = threads.create_slot();
        let s2 = threads.create_slot();

        threads.execute(&world, robot, s1, mv(1.0)).unwrap();
        let turn = Command::Turn {
            direction: TurnDirection::Right,
            angle: 10.0,
        };
        assert_eq!(threads.execute(&world, robot, s2, turn).unwrap(), SlotState::Executing);
        assert_eq!(threads.state(s1).unwrap(), SlotState::Executing);
    }

    #[test]
    fn test_waiters_are_served_fifo() {
        let (world, robot, mut threads) = setup(ChassisKind::Tank);
        let tuning = CommandTuning::default();
        let s0 = threads.create_slot();
        let s1 = threads.create_slot();
        let s2 = threads.create_slot();

        threads.execute(&world, robot, s0, mv(1.0)).unwrap();
        threads.execute(&world, robot, s1, mv(1.0)).unwrap();
        threads.execute(&world, robot, s2, mv(1.0)).unwrap();
        assert_eq!(threads.waiters(s0), vec![s1, s2]);

        threads.tick(&world, robot, 1.0, &tuning).unwrap();
        // s1 got the drivetrain; s2 chained onto s1.
        assert_eq!(threads.state(s1).unwrap(), SlotState::Executing);
        assert_eq!(threads.state(s2).unwrap(), SlotState::Blocked);
        assert_eq!(threads.waiters(s1), vec![s2]);

        threads.tick(&world, robot, 1.0, &tuning).unwrap();
        assert_eq!(threads.state(s2).unwrap(), SlotState::Executing);
        threads.tick(&world, robot, 1.0, &tuning).unwrap();
        assert_eq!(threads.state(s2).unwrap(), SlotState::Idle);
    }

    #[test]
    fn test_delete_busy_slot_fails() {
        let (world, robot, mut threads) = setup(ChassisKind::Tank);
        let s1 = threads.create_slot();
        let s2 = threads.create_slot();
        threads.execute(&world, robot, s1, mv(1.0)).unwrap();
        threads.execute(&world, robot, s2, mv(1.0)).unwrap();

        assert_eq!(
            threads.delete_slot(s1),
            Err(ExecutionError::SlotUnavailable {
                slot: s1,
                state: SlotState::Executing
            })
        );
        assert_eq!(
            threads.delete_slot(s2),
            Err(ExecutionError::SlotUnavailable {
                slot: s2,
                state: SlotState::Blocked
            })
        );
        assert_eq!(
            threads.delete_slot(SlotId(9)),
            Err(ExecutionError::SlotNotFound(SlotId(9)))
        );
    }

    #[test]
    fn test_execute_on_busy_slot_fails() {
        let (world, robot, mut threads) = setup(ChassisKind::Tank);
        let s = threads.create_slot();
        threads.execute(&world, robot, s, mv(1.0)).unwrap();
        let err = threads
            .execute(&world, robot, s, Command::ShootWeapon)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::SlotUnavailable { .. }));
        assert_eq!(
            threads.execute(&world, robot, SlotId(7), mv(1.0)),
            Err(ExecutionError::SlotNotFound(SlotId(7)))
        );
    }

    #[test]
    fn test_incompatible_command_leaves_slot_idle() {
        let (world, robot, mut threads) = setup(ChassisKind::Dummy);
        let s = threads.create_slot();
        let err = threads.execute(&world, robot, s, mv(1.0)).unwrap_err();
        assert!(matches!(err, ExecutionError::IncompatibleCommand { .. }));
        assert_eq!(threads.state(s).unwrap(), SlotState::Idle);
        assert!(threads.drain_notifications().is_empty());
    }

    #[test]
    fn test_second_wait_blocks_until_first_finishes() {
        let (world, robot, mut threads) = setup(ChassisKind::Dummy);
        let tuning = CommandTuning::default();
        let s1 = threads.create_slot();
        let s2 = threads.create_slot();
        let wait = Command::Wait { duration: 1.0 };
        assert_eq!(threads.execute(&world, robot, s1, wait).unwrap(), SlotState::Executing);
        assert_eq!(threads.execute(&world, robot, s2, wait).unwrap(), SlotState::Blocked);
        assert_eq!(threads.waiters(s1), vec![s2]);
        threads.drain_notifications();

        threads.tick(&world, robot, 0.5, &tuning).unwrap();
        assert_eq!(threads.state(s2).unwrap(), SlotState::Blocked);

        threads.tick(&world, robot, 0.5, &tuning).unwrap();
        assert_eq!(threads.state(s1).unwrap(), SlotState::Idle);
        assert_eq!(threads.state(s2).unwrap(), SlotState::Executing);
        assert_eq!(
            state_changes(&mut threads),
            vec![(s1, SlotState::Idle), (s2, SlotState::Executing)]
        );
    }

    #[test]
    fn test_release_withdraws_blocked_slot() {
        let (world, robot, mut threads) = setup(ChassisKind::Tank);
        let tuning = CommandTuning::default();
        let s1 = threads.create_slot();
        let s2 = threads.create_slot();
        threads.execute(&world, robot, s1, mv(1.0)).unwrap();
        threads.execute(&world, robot, s2, mv(1.0)).unwrap();

        threads.release(&world, robot, s2).unwrap();
        assert_eq!(threads.state(s2).unwrap(), SlotState::Idle);
        assert!(threads.waiters(s1).is_empty());
        threads.delete_slot(s2).unwrap();

        // s1 finishing no longer touches the deleted slot.
        threads.tick(&world, robot, 1.0, &tuning).unwrap();
        assert_eq!(threads.state(s1).unwrap(), SlotState::Idle);
    }

    #[test]
    fn test_release_aborts_running_move() {
        let (world, robot, mut threads) = setup(ChassisKind::Tank);
        let tuning = CommandTuning::default();
        let s = threads.create_slot();
        threads.execute(&world, robot, s, mv(5.0)).unwrap();
        threads.tick(&world, robot, 0.5, &tuning).unwrap();
        assert_eq!(
            world.get::<&crate::components::Drivetrain>(robot).unwrap().torque,
            1.0
        );

        threads.release(&world, robot, s).unwrap();
        assert_eq!(threads.state(s).unwrap(), SlotState::Idle);
        assert_eq!(threads.current_command(s), None);
        assert_eq!(
            world.get::<&crate::components::Drivetrain>(robot).unwrap().torque,
            0.0
        );
    }
}
