//! Error types for the execution engine.

use blockbot_logic::command::{Capability, CommandKind};
use hecs::Entity;
use thiserror::Error;

use crate::execution::scheduler::{SlotId, SlotState};

/// Errors raised while scheduling and executing commands.
///
/// `IncompatibleCommand` is an authoring problem and is reported to the user;
/// the slot variants mean the walker/manager layer broke a scheduling
/// invariant and are propagated as hard errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// The robot lacks the capability the command drives.
    #[error("{command} command needs a {capability} robot")]
    IncompatibleCommand {
        command: CommandKind,
        capability: Capability,
    },

    /// The slot is busy or blocked.
    #[error("{slot} is {state:?}, expected Idle")]
    SlotUnavailable { slot: SlotId, state: SlotState },

    /// The slot was never created or has been deleted.
    #[error("{0} does not exist")]
    SlotNotFound(SlotId),

    /// The target entity is gone or has no thread table.
    #[error("robot {0:?} not found")]
    RobotNotFound(Entity),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ExecutionError>;
