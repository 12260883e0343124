//! Block graph: the program a user assembles out of blocks.
//!
//! Blocks live in an arena indexed by [`BlockId`]; successors are handles, so
//! loops are plain data rather than reference cycles. The graph is read-only
//! during execution except for `For` iteration counters, which only the
//! owning `For` block changes (and [`BlockGraph::reset`] zeroes).
//!
//! Successor resolution:
//! - `Start`, `Action`, `Wait` → `next`
//! - `End` → none
//! - `If` → `next` when the condition holds, `else_next` otherwise
//! - `For` → `next` while `counter < bound` (incrementing), else the paired
//!   `LoopEnd`'s `next` (counter back to 0)
//! - `While` → `next` while the condition holds, else the paired `LoopEnd`'s `next`
//! - `LoopEnd` → its head, so the head is re-evaluated

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::expr::{EvalContext, Expr};

/// Stable handle of a block inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Start,
    End,
    Action {
        command: Command,
    },
    If {
        condition: Expr,
        #[serde(default)]
        else_next: Option<BlockId>,
    },
    For {
        bound: u32,
        #[serde(default)]
        counter: u32,
        end: BlockId,
    },
    While {
        condition: Expr,
        end: BlockId,
    },
    LoopEnd {
        head: BlockId,
    },
    Wait {
        seconds: f32,
    },
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Start => "start",
            BlockKind::End => "end",
            BlockKind::Action { .. } => "action",
            BlockKind::If { .. } => "if",
            BlockKind::For { .. } => "for",
            BlockKind::While { .. } => "while",
            BlockKind::LoopEnd { .. } => "loop_end",
            BlockKind::Wait { .. } => "wait",
        }
    }
}

/// One node of the program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(default)]
    pub next: Option<BlockId>,
    pub kind: BlockKind,
}

impl Block {
    pub fn new(id: u32, next: Option<u32>, kind: BlockKind) -> Self {
        Self {
            id: BlockId(id),
            next: next.map(BlockId),
            kind,
        }
    }

    /// Fresh command for blocks that drive the robot (`Action` and `Wait`).
    pub fn command(&self) -> Option<Command> {
        match &self.kind {
            BlockKind::Action { command } => Some(*command),
            BlockKind::Wait { seconds } => Some(Command::Wait { duration: *seconds }),
            _ => None,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self.kind, BlockKind::Start)
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, BlockKind::End)
    }

    /// Every handle this block refers to.
    fn references(&self) -> Vec<BlockId> {
        let mut refs: Vec<BlockId> = self.next.into_iter().collect();
        match &self.kind {
            BlockKind::If {
                else_next: Some(other),
                ..
            } => refs.push(*other),
            BlockKind::For { end, .. } | BlockKind::While { end, .. } => refs.push(*end),
            BlockKind::LoopEnd { head } => refs.push(*head),
            _ => {}
        }
        refs
    }
}

/// Notifications raised while resolving successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    /// A `For` counter changed (including the reset back to 0).
    IterationChanged { block: BlockId, iteration: u32 },
}

/// Arena integrity error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Block at arena position `index` claims a different id.
    IdMismatch { index: usize, id: BlockId },
    /// A block refers to a handle outside the arena.
    DanglingReference { from: BlockId, to: BlockId },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::IdMismatch { index, id } => {
                write!(f, "block at position {} has id {}", index, id)
            }
            GraphError::DanglingReference { from, to } => {
                write!(f, "block {} refers to missing block {}", from, to)
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// The program: an arena of blocks plus pending notifications.
///
/// Serialized as a plain list of blocks; deserialization re-checks arena
/// integrity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Block>", into = "Vec<Block>")]
pub struct BlockGraph {
    blocks: Vec<Block>,
    events: Vec<GraphEvent>,
}

impl TryFrom<Vec<Block>> for BlockGraph {
    type Error = GraphError;

    fn try_from(blocks: Vec<Block>) -> Result<Self, Self::Error> {
        BlockGraph::from_blocks(blocks)
    }
}

impl From<BlockGraph> for Vec<Block> {
    fn from(graph: BlockGraph) -> Self {
        graph.blocks
    }
}

impl BlockGraph {
    /// Build a graph, checking that ids match arena positions and every
    /// handle resolves. Program semantics (reachability, loop pairing) are
    /// the author's responsibility.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, GraphError> {
        for (index, block) in blocks.iter().enumerate() {
            if block.id.index() != index {
                return Err(GraphError::IdMismatch {
                    index,
                    id: block.id,
                });
            }
        }
        for block in &blocks {
            if let Some(to) = block.references().into_iter().find(|r| r.index() >= blocks.len()) {
                return Err(GraphError::DanglingReference { from: block.id, to });
            }
        }
        Ok(Self {
            blocks,
            events: Vec::new(),
        })
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// `Start` blocks in discovery (arena) order.
    pub fn start_blocks(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| b.is_start())
            .map(|b| b.id)
            .collect()
    }

    /// Current counter of a `For` block.
    pub fn counter(&self, id: BlockId) -> Option<u32> {
        match self.get(id)?.kind {
            BlockKind::For { counter, .. } => Some(counter),
            _ => None,
        }
    }

    /// Resolve the successor of `current`, evaluating conditions and
    /// stepping loop counters as a side effect.
    pub fn next_block(&mut self, current: BlockId, ctx: &mut dyn EvalContext) -> Option<BlockId> {
        let block = self.get(current)?;
        if matches!(block.kind, BlockKind::For { .. }) {
            return self.advance_for(current);
        }

        let next = block.next;
        match &block.kind {
            BlockKind::End => None,
            BlockKind::If {
                condition,
                else_next,
            } => {
                if condition.evaluate(self, ctx) {
                    next
                } else {
                    *else_next
                }
            }
            BlockKind::While { condition, end } => {
                if condition.evaluate(self, ctx) {
                    next
                } else {
                    self.after_loop(*end)
                }
            }
            BlockKind::LoopEnd { head } => Some(*head),
            _ => next,
        }
    }

    fn advance_for(&mut self, id: BlockId) -> Option<BlockId> {
        let block = self.blocks.get_mut(id.index())?;
        let next = block.next;
        let BlockKind::For { bound, counter, end } = &mut block.kind else {
            return next;
        };
        let end = *end;

        if *counter < *bound {
            *counter += 1;
            let iteration = *counter;
            self.events
                .push(GraphEvent::IterationChanged { block: id, iteration });
            next
        } else {
            *counter = 0;
            self.events
                .push(GraphEvent::IterationChanged { block: id, iteration: 0 });
            self.after_loop(end)
        }
    }

    /// Successor of a loop once it is done: the paired `LoopEnd`'s `next`.
    fn after_loop(&self, end: BlockId) -> Option<BlockId> {
        self.get(end).and_then(|b| b.next)
    }

    /// Zero every `For` counter, re-raising their notifications.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            if let BlockKind::For { counter, .. } = &mut block.kind {
                *counter = 0;
                self.events.push(GraphEvent::IterationChanged {
                    block: block.id,
                    iteration: 0,
                });
            }
        }
    }

    /// Take the notifications raised since the last drain.
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Incremental graph construction with automatically assigned ids.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    blocks: Vec<Block>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: BlockKind) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            next: None,
            kind,
        });
        id
    }

    pub fn start(&mut self) -> BlockId {
        self.add(BlockKind::Start)
    }

    pub fn end(&mut self) -> BlockId {
        self.add(BlockKind::End)
    }

    pub fn action(&mut self, command: Command) -> BlockId {
        self.add(BlockKind::Action { command })
    }

    pub fn wait(&mut self, seconds: f32) -> BlockId {
        self.add(BlockKind::Wait { seconds })
    }

    /// Add a `For` head and its `LoopEnd`, already paired.
    pub fn for_loop(&mut self, bound: u32) -> (BlockId, BlockId) {
        let head = BlockId(self.blocks.len() as u32);
        let end = BlockId(head.0 + 1);
        self.add(BlockKind::For {
            bound,
            counter: 0,
            end,
        });
        self.add(BlockKind::LoopEnd { head });
        (head, end)
    }

    /// Add a `While` head and its `LoopEnd`, already paired.
    pub fn while_loop(&mut self, condition: Expr) -> (BlockId, BlockId) {
        let head = BlockId(self.blocks.len() as u32);
        let end = BlockId(head.0 + 1);
        self.add(BlockKind::While { condition, end });
        self.add(BlockKind::LoopEnd { head });
        (head, end)
    }

    /// Add an `If` block; link its true branch with [`GraphBuilder::link`].
    pub fn branch(&mut self, condition: Expr, else_next: Option<BlockId>) -> BlockId {
        self.add(BlockKind::If {
            condition,
            else_next,
        })
    }

    pub fn set_else(&mut self, id: BlockId, target: BlockId) {
        if let Some(BlockKind::If { else_next, .. }) =
            self.blocks.get_mut(id.index()).map(|b| &mut b.kind)
        {
            *else_next = Some(target);
        }
    }

    pub fn link(&mut self, from: BlockId, to: BlockId) {
        if let Some(block) = self.blocks.get_mut(from.index()) {
            block.next = Some(to);
        }
    }

    /// Link each block to the following one.
    pub fn chain(&mut self, ids: &[BlockId]) {
        for pair in ids.windows(2) {
            self.link(pair[0], pair[1]);
        }
    }

    pub fn build(self) -> Result<BlockGraph, GraphError> {
        BlockGraph::from_blocks(self.blocks)
    }
}
