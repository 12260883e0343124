//! BlockBot Core - program execution engine for block-built robot programs
//!
//! A program is a graph of blocks. Running it starts one walker per `Start`
//! block; walkers translate `Action` blocks into time-extended commands and
//! submit them to the robot's execution slots, which serialize commands that
//! compete for the same actuator.
//!
//! # Architecture
//!
//! Robots are `hecs` entities:
//! - **Components**: identity plus one component per capability
//!   (`Drivetrain`, `Steering`, `Turret`, `Cannon`) and the `RobotThreads`
//!   slot table
//! - **Capabilities**: traits the components implement; commands reach them
//!   through the capability query in [`capability`]
//! - **Execution**: scheduler, walkers and the manager, ticked by
//!   [`engine::SimulationEngine::update`]
//!
//! # Example
//!
//! ```rust,no_run
//! use blockbot_core::prelude::*;
//! use blockbot_logic::chassis::RobotSpec;
//! use blockbot_logic::command::Command;
//! use blockbot_logic::graph::GraphBuilder;
//!
//! let mut engine = SimulationEngine::default();
//! engine.spawn_robot(&RobotSpec::default());
//!
//! let mut b = GraphBuilder::new();
//! let start = b.start();
//! let drive = b.action(Command::Move { duration: 2.0, torque: 5.0 });
//! let end = b.end();
//! b.chain(&[start, drive, end]);
//! engine.load_program(b.build().unwrap());
//!
//! engine.run().unwrap();
//! while engine.is_running() {
//!     engine.update(1.0 / 60.0).unwrap(); // 60 FPS
//! }
//! ```

pub mod capability;
pub mod commands;
pub mod components;
pub mod engine;
pub mod error;
pub mod execution;
pub mod persistence;
pub mod spawn;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::SimulationEngine;
    pub use crate::error::{ExecutionError, Result};
    pub use crate::execution::{ExecutionEvent, ExecutionState, SlotActivity, SlotId};
}
