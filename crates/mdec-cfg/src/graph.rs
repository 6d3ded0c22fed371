//! Basic block partitioning and edge construction.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use mdec_isa::{Instruction, Mnemonic, OpClass, Register};
use mdec_types::{Function, FunctionResolver};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, debug_span, trace};

use crate::error::{CfgError, Result};
use crate::{DominatorTree, JumpTableEntry, JumpTableResolver};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// How control leaves a block.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum BlockExit {
    /// Runs into the next block without a transfer instruction.
    Fallthrough(BlockId),
    Jump(BlockId),
    /// For branch-likely, `taken` is the block holding the delay slot.
    Branch {
        taken: BlockId,
        not_taken: Option<BlockId>,
        likely: bool,
    },
    Call {
        target: Option<u32>,
        return_to: Option<BlockId>,
    },
    JumpTable {
        targets: Vec<BlockId>,
    },
    Return,
    TailCall {
        target: u32,
    },
    /// Falls off the end of the function range.
    End,
}

impl BlockExit {
    /// Successor blocks, deduplicated, in edge order.
    pub fn successors(&self) -> Vec<BlockId> {
        let mut succs: Vec<BlockId> = match self {
            Self::Fallthrough(next) | Self::Jump(next) => vec![*next],
            Self::Branch {
                taken, not_taken, ..
            } => std::iter::once(*taken).chain(*not_taken).collect(),
            Self::Call { return_to, .. } => return_to.iter().copied().collect(),
            Self::JumpTable { targets } => targets.clone(),
            Self::Return | Self::TailCall { .. } | Self::End => Vec::new(),
        };
        let mut seen = FxHashSet::default();
        succs.retain(|id| seen.insert(*id));
        succs
    }
}

/// A resolved direct call.
#[derive(Clone, Debug)]
pub struct CallSite {
    /// Address of the call instruction.
    pub address: u32,
    pub target: u32,
    pub function: Option<Arc<Function>>,
}

#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub id: BlockId,
    pub start: u32,
    /// Exclusive.
    pub end: u32,
    pub instructions: Vec<Instruction>,
    pub exit: BlockExit,
    pub successors: Vec<BlockId>,
    pub predecessors: Vec<BlockId>,
    pub jump_table: Option<Vec<JumpTableEntry>>,
    /// Filled by [`ControlFlowGraph::post_process`].
    pub call: Option<CallSite>,
    /// Index into `instructions` of the transfer instruction, if any.
    pub control: Option<usize>,
}

impl BasicBlock {
    pub fn control_instruction(&self) -> Option<&Instruction> {
        self.control.and_then(|index| self.instructions.get(index))
    }

    /// Delay slot executed with the control instruction inside this block.
    pub fn delay_slot(&self) -> Option<&Instruction> {
        self.control.and_then(|index| self.instructions.get(index + 1))
    }

    pub const fn is_exit(&self) -> bool {
        matches!(
            self.exit,
            BlockExit::Return | BlockExit::TailCall { .. } | BlockExit::End
        )
    }
}

/// Per-function control flow graph. Blocks are ordered by address and
/// partition the function's range.
#[derive(Clone, Debug)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    start: u32,
    end: u32,
}

/// Scan state shared by the build phases.
struct Scan<'a> {
    instrs: &'a [Instruction],
    start: u32,
    leaders: BTreeSet<usize>,
    controls: BTreeSet<usize>,
    /// Delay slots that stay inside their branch's block.
    attached_slots: FxHashSet<usize>,
    /// Branch-likely delay slot index -> branch target index.
    likely_slots: FxHashMap<usize, usize>,
    /// Branch-likely delay slot index -> out-of-range tail call target.
    likely_tail_slots: FxHashMap<usize, u32>,
    tables: FxHashMap<usize, (Vec<JumpTableEntry>, Vec<usize>)>,
}

impl Scan<'_> {
    fn index_of(&self, address: u32) -> Option<usize> {
        let offset = address.checked_sub(self.start)?;
        if offset % Instruction::SIZE != 0 {
            return None;
        }
        let index = usize::try_from(offset / Instruction::SIZE).ok()?;
        (index < self.instrs.len()).then_some(index)
    }
}

/// Unconditional encodings of conditional branches (`b` is `beq zero, zero`).
fn is_unconditional_branch(instr: &Instruction) -> bool {
    matches!(instr.mnemonic, Mnemonic::Beq | Mnemonic::Beql) && instr.reg(0) == instr.reg(1)
}

/// `bal` is `bgezal zero`. Every other linking branch calls conditionally.
fn is_unconditional_link(instr: &Instruction) -> bool {
    instr.mnemonic == Mnemonic::Bgezal && instr.reg(0).is_some_and(Register::is_zero)
}

impl ControlFlowGraph {
    /// Partition `instructions` (one function, contiguous) into basic blocks.
    pub fn build(instructions: &[Instruction], jump_tables: &dyn JumpTableResolver) -> Result<Self> {
        let first = instructions.first().ok_or(CfgError::EmptyFunction)?;
        let start = first.address;
        let _span = debug_span!("build_cfg", start = format_args!("{start:#x}")).entered();

        let mut expected = start;
        for instr in instructions {
            if instr.address != expected {
                return Err(CfgError::NonContiguous {
                    address: instr.address,
                });
            }
            expected = instr.next_address();
        }

        let mut scan = Scan {
            instrs: instructions,
            start,
            leaders: BTreeSet::from([0]),
            controls: BTreeSet::new(),
            attached_slots: FxHashSet::default(),
            likely_slots: FxHashMap::default(),
            likely_tail_slots: FxHashMap::default(),
            tables: FxHashMap::default(),
        };
        Self::find_leaders(&mut scan, jump_tables)?;

        for &slot in &scan.attached_slots {
            if scan.leaders.contains(&slot) {
                return Err(CfgError::BranchIntoDelaySlot {
                    address: instructions[slot - 1].address,
                    target: instructions[slot].address,
                });
            }
        }

        let mut graph = Self::partition(&scan);
        graph.link_predecessors();
        debug!(
            blocks = graph.blocks.len(),
            instructions = instructions.len(),
            "built cfg"
        );
        Ok(graph)
    }

    fn find_leaders(scan: &mut Scan<'_>, jump_tables: &dyn JumpTableResolver) -> Result<()> {
        let count = scan.instrs.len();
        let mut i = 0;
        while i < count {
            let instr = &scan.instrs[i];
            if !instr.has_delay_slot() {
                i += 1;
                continue;
            }
            scan.controls.insert(i);
            let after = i + 2;
            if after < count {
                scan.leaders.insert(after);
            }
            let slot = i + 1;
            if slot < count {
                if instr.is_likely() {
                    scan.leaders.insert(slot);
                } else {
                    scan.attached_slots.insert(slot);
                }
            }

            match instr.class() {
                OpClass::Branch | OpClass::BranchLikely | OpClass::Jump => {
                    let target = instr.target().unwrap_or(0);
                    match scan.index_of(target) {
                        Some(index) => {
                            scan.leaders.insert(index);
                            if instr.is_likely() && slot < count {
                                scan.likely_slots.insert(slot, index);
                            }
                        }
                        None if instr.class() == OpClass::Jump
                            || is_unconditional_branch(instr) =>
                        {
                            trace!(target = format_args!("{target:#x}"), "tail call");
                            if instr.is_likely() && slot < count {
                                scan.likely_tail_slots.insert(slot, target);
                            }
                        }
                        None => {
                            return Err(CfgError::BranchOutOfRange {
                                address: instr.address,
                                target,
                            });
                        }
                    }
                }
                OpClass::BranchLink if !is_unconditional_link(instr) => {
                    return Err(CfgError::ConditionalCall {
                        address: instr.address,
                    });
                }
                OpClass::JumpRegister if !instr.is_return() => {
                    let entries = jump_tables
                        .can_be_jump_table(instr.address)
                        .then(|| jump_tables.jump_table_entries(instr.address))
                        .flatten()
                        .ok_or(CfgError::UnresolvedJump {
                            address: instr.address,
                        })?;
                    let mut targets = Vec::with_capacity(entries.len());
                    for entry in &entries {
                        let index = scan.index_of(entry.target).ok_or(
                            CfgError::JumpTableOutOfRange {
                                address: instr.address,
                                target: entry.target,
                            },
                        )?;
                        scan.leaders.insert(index);
                        targets.push(index);
                    }
                    scan.tables.insert(i, (entries, targets));
                }
                _ => {}
            }
            i = after;
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn partition(scan: &Scan<'_>) -> Self {
        let count = scan.instrs.len();
        let leaders: Vec<usize> = scan.leaders.iter().copied().collect();
        let block_of = |index: usize| BlockId(leaders.partition_point(|&leader| leader < index));
        let next_block = |end: usize| (end < count).then(|| block_of(end));

        let mut blocks = Vec::with_capacity(leaders.len());
        for (id, &first) in leaders.iter().enumerate() {
            let end = leaders.get(id + 1).copied().unwrap_or(count);
            let control = scan.controls.range(first..end).next().copied();
            let mut jump_table = None;

            let exit = match control {
                None => match (
                    scan.likely_slots.get(&first),
                    scan.likely_tail_slots.get(&first),
                ) {
                    (Some(&target), _) => BlockExit::Jump(block_of(target)),
                    (None, Some(&target)) => BlockExit::TailCall { target },
                    (None, None) => {
                        next_block(end).map_or(BlockExit::End, BlockExit::Fallthrough)
                    }
                },
                Some(c) => {
                    let instr = &scan.instrs[c];
                    let target = instr.target();
                    let target_block = target.and_then(|t| scan.index_of(t)).map(block_of);
                    match instr.class() {
                        OpClass::Branch | OpClass::BranchLikely
                            if !is_unconditional_branch(instr) =>
                        {
                            match target_block {
                                Some(taken) if instr.is_likely() => BlockExit::Branch {
                                    taken: next_block(c + 1).unwrap_or(taken),
                                    not_taken: next_block(c + 2),
                                    likely: true,
                                },
                                Some(taken) => BlockExit::Branch {
                                    taken,
                                    not_taken: next_block(end),
                                    likely: false,
                                },
                                None => BlockExit::End,
                            }
                        }
                        OpClass::Branch | OpClass::BranchLikely | OpClass::Jump => {
                            match (target_block, target) {
                                // The likely delay slot block carries the jump or tail call.
                                (_, Some(_)) if instr.is_likely() && c + 1 < count => {
                                    BlockExit::Jump(block_of(c + 1))
                                }
                                (Some(block), _) => BlockExit::Jump(block),
                                (None, Some(target)) => BlockExit::TailCall { target },
                                (None, None) => BlockExit::End,
                            }
                        }
                        OpClass::JumpRegister if instr.is_return() => BlockExit::Return,
                        OpClass::JumpRegister => match scan.tables.get(&c) {
                            Some((entries, targets)) => {
                                jump_table = Some(entries.clone());
                                BlockExit::JumpTable {
                                    targets: targets.iter().map(|&t| block_of(t)).collect(),
                                }
                            }
                            None => BlockExit::End,
                        },
                        // Calls, including `bal`.
                        _ => BlockExit::Call {
                            target,
                            return_to: next_block(end),
                        },
                    }
                }
            };

            let instructions = scan.instrs[first..end].to_vec();
            let start = instructions.first().map_or(0, |instr| instr.address);
            let block_end = instructions
                .last()
                .map_or(start, Instruction::next_address);
            let successors = exit.successors();
            blocks.push(BasicBlock {
                id: BlockId(id),
                start,
                end: block_end,
                instructions,
                exit,
                successors,
                predecessors: Vec::new(),
                jump_table,
                call: None,
                control: control.map(|c| c - first),
            });
        }

        let end = scan.instrs.last().map_or(scan.start, Instruction::next_address);
        Self {
            blocks,
            start: scan.start,
            end,
        }
    }

    fn link_predecessors(&mut self) {
        let edges: Vec<(BlockId, BlockId)> = self
            .blocks
            .iter()
            .flat_map(|block| block.successors.iter().map(move |&succ| (block.id, succ)))
            .collect();
        for (from, to) in edges {
            let preds = &mut self.blocks[to.0].predecessors;
            if !preds.contains(&from) {
                preds.push(from);
            }
        }
    }

    /// Attach the callee of every direct call and tail call.
    pub fn post_process(&mut self, function: &Function, resolver: &dyn FunctionResolver) -> usize {
        let mut resolved = 0;
        for block in &mut self.blocks {
            let target = match block.exit {
                BlockExit::Call {
                    target: Some(target),
                    ..
                }
                | BlockExit::TailCall { target } => target,
                _ => continue,
            };
            // A tail call without a control instruction sits in a likely
            // delay slot; the branch is the instruction before it.
            let address = block.control_instruction().map_or_else(
                || block.start.wrapping_sub(Instruction::SIZE),
                |instr| instr.address,
            );
            let callee = resolver.find_function_by_address(target);
            if callee.is_some() {
                resolved += 1;
            } else {
                debug!(
                    caller = %function.name,
                    target = format_args!("{target:#x}"),
                    "unresolved call target"
                );
            }
            block.call = Some(CallSite {
                address,
                target,
                function: callee,
            });
        }
        resolved
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    pub const fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub const fn start(&self) -> u32 {
        self.start
    }

    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Block containing `address`.
    pub fn block_at(&self, address: u32) -> Option<BlockId> {
        let index = self.blocks.partition_point(|block| block.end <= address);
        self.blocks
            .get(index)
            .filter(|block| block.start <= address)
            .map(|block| block.id)
    }

    /// Successor lists indexed by block number.
    pub fn successor_lists(&self) -> Vec<Vec<usize>> {
        self.blocks
            .iter()
            .map(|block| block.successors.iter().map(|id| id.0).collect())
            .collect()
    }

    pub fn dominators(&self) -> DominatorTree {
        DominatorTree::compute(&self.successor_lists(), self.entry().0)
    }

    pub fn post_dominators(&self) -> DominatorTree {
        DominatorTree::post_dominators(&self.successor_lists())
    }

    /// Edges whose target dominates their source.
    pub fn back_edges(&self, dom: &DominatorTree) -> Vec<(BlockId, BlockId)> {
        self.blocks
            .iter()
            .filter(|block| dom.is_reachable(block.id.0))
            .flat_map(|block| {
                block
                    .successors
                    .iter()
                    .filter(|succ| dom.dominates(succ.0, block.id.0))
                    .map(move |&succ| (block.id, succ))
            })
            .collect()
    }

    /// Blocks of the natural loop of `header` with back edges from `latches`.
    pub fn natural_loop(&self, header: BlockId, latches: &[BlockId]) -> BTreeSet<BlockId> {
        let mut body = BTreeSet::from([header]);
        let mut work: Vec<BlockId> = latches.to_vec();
        while let Some(block) = work.pop() {
            if body.insert(block) {
                work.extend(self.block(block).predecessors.iter().copied());
            }
        }
        body
    }
}
