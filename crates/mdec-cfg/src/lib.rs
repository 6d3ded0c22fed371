//! Control flow reconstruction for one function at a time.
//!
//! [`ControlFlowGraph::build`] partitions a contiguous instruction range into
//! basic blocks, keeping each delay slot with its transfer instruction, and
//! expands computed jumps through a [`JumpTableResolver`].

mod dominators;
mod error;
mod graph;
mod jump_table;
mod memory;

pub use dominators::DominatorTree;
pub use error::{CfgError, Result};
pub use graph::{BasicBlock, BlockExit, BlockId, CallSite, ControlFlowGraph};
pub use jump_table::{JumpTableEntry, JumpTableResolver, NoJumpTables, TableJumpResolver};
pub use memory::{MemoryImage, MemoryReader};
