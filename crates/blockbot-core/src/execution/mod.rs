//! Program execution: slots, walkers and the manager that drives them.

pub mod clock;
pub mod dice;
pub mod events;
pub mod manager;
pub mod scheduler;
pub mod walker;

pub use clock::SimClock;
pub use dice::Dice;
pub use events::{ExecutionEvent, SlotActivity};
pub use manager::{ExecutionManager, ExecutionState};
pub use scheduler::{RobotThreads, SlotId, SlotNotification, SlotState};
pub use walker::{ProgramWalker, StepOutcome, WalkerPhase};
