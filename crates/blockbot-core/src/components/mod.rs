//! Component definitions for the ECS scene.
//!
//! Components are pure data structs attached to robot entities.
//! Capability behavior is expressed through the traits in `capability`.

mod robot;

pub use robot::*;
