//! Pure program logic for BlockBot.
//!
//! This crate contains the data model of block programs and everything that
//! can be decided without a robot or a clock. Functions take plain data and
//! return results, making them unit-testable and usable from the engine, the
//! headless harness and any future host.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chassis`] | Robot bodies and the capabilities each one offers |
//! | [`command`] | Command values, command kinds, robot capabilities |
//! | [`config`] | Execution configuration and validation |
//! | [`constants`] | Default rates, tolerances and limits |
//! | [`expr`] | Boolean conditions for `If` / `While` blocks |
//! | [`graph`] | Block arena, successor resolution, loop counters |

pub mod chassis;
pub mod command;
pub mod config;
pub mod constants;
pub mod expr;
pub mod graph;
