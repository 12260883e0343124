//! Seeded randomness for `Chance` conditions.

use blockbot_logic::expr::EvalContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic per-run random source.
#[derive(Debug, Clone)]
pub struct Dice(StdRng);

impl Dice {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl EvalContext for Dice {
    fn roll(&mut self) -> f32 {
        self.0.gen::<f32>()
    }
}
