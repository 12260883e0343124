//! Boolean expressions used by `If` and `While` blocks.
//!
//! Deliberately tiny: constants, negation, conjunction/disjunction, numeric
//! comparison against loop counters, and a random `Chance`. Randomness comes
//! from the caller through [`EvalContext`] so this crate needs no RNG.

use serde::{Deserialize, Serialize};

use crate::graph::{BlockGraph, BlockId};

/// Source of randomness for `Chance` expressions.
pub trait EvalContext {
    /// Uniform sample in `[0, 1)`.
    fn roll(&mut self) -> f32;
}

/// Context that always rolls the same value. Handy for deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedRoll(pub f32);

impl EvalContext for FixedRoll {
    fn roll(&mut self) -> f32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn apply(&self, lhs: f32, rhs: f32) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Eq => (lhs - rhs).abs() < f32::EPSILON,
            CompareOp::Ne => (lhs - rhs).abs() >= f32::EPSILON,
        }
    }
}

/// Numeric input of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Number(f32),
    /// Current iteration counter of a `For` block (0 for any other block).
    Counter(BlockId),
}

impl Operand {
    fn value(&self, graph: &BlockGraph) -> f32 {
        match self {
            Operand::Number(n) => *n,
            Operand::Counter(id) => graph.counter(*id).unwrap_or(0) as f32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Const(bool),
    Not(Box<Expr>),
    /// True when every operand is true (true when empty).
    All(Vec<Expr>),
    /// True when any operand is true (false when empty).
    Any(Vec<Expr>),
    Compare {
        lhs: Operand,
        op: CompareOp,
        rhs: Operand,
    },
    /// True with the given probability.
    Chance { probability: f32 },
}

impl Expr {
    pub fn constant(value: bool) -> Self {
        Expr::Const(value)
    }

    pub fn negate(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    pub fn compare(lhs: Operand, op: CompareOp, rhs: Operand) -> Self {
        Expr::Compare { lhs, op, rhs }
    }

    pub fn evaluate(&self, graph: &BlockGraph, ctx: &mut dyn EvalContext) -> bool {
        match self {
            Expr::Const(value) => *value,
            Expr::Not(inner) => !inner.evaluate(graph, ctx),
            Expr::All(exprs) => exprs.iter().all(|e| e.evaluate(graph, ctx)),
            Expr::Any(exprs) => exprs.iter().any(|e| e.evaluate(graph, ctx)),
            Expr::Compare { lhs, op, rhs } => op.apply(lhs.value(graph), rhs.value(graph)),
            Expr::Chance { probability } => ctx.roll() < probability.clamp(0.0, 1.0),
        }
    }
}
