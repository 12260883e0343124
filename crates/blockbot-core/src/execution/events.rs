//! Events exposed to observers (debug visualization, UI, the test harness).

use blockbot_logic::graph::BlockId;
use serde::{Deserialize, Serialize};

use super::scheduler::SlotId;

/// Public view of a slot: it is either driving the robot or it is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotActivity {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEvent {
    WalkerCreated { slot: SlotId, start: BlockId },
    WalkerDeleted { slot: SlotId },
    WalkerAdvanced { slot: SlotId, block: BlockId },
    SlotStateChanged { slot: SlotId, activity: SlotActivity },
    IterationChanged { block: BlockId, iteration: u32 },
    /// A command was refused by the robot; `reason` is the error text.
    CommandRejected {
        slot: SlotId,
        block: BlockId,
        reason: String,
    },
    ExecutionStarted,
    ExecutionPaused,
    ExecutionResumed,
    ExecutionEnded,
}

impl ExecutionEvent {
    /// Stable snake_case tag, used by the harness to match expectations.
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionEvent::WalkerCreated { .. } => "walker_created",
            ExecutionEvent::WalkerDeleted { .. } => "walker_deleted",
            ExecutionEvent::WalkerAdvanced { .. } => "walker_advanced",
            ExecutionEvent::SlotStateChanged { .. } => "slot_state_changed",
            ExecutionEvent::IterationChanged { .. } => "iteration_changed",
            ExecutionEvent::CommandRejected { .. } => "command_rejected",
            ExecutionEvent::ExecutionStarted => "execution_started",
            ExecutionEvent::ExecutionPaused => "execution_paused",
            ExecutionEvent::ExecutionResumed => "execution_resumed",
            ExecutionEvent::ExecutionEnded => "execution_ended",
        }
    }
}
