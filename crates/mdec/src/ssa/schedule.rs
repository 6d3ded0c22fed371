//! Block execution order, stack pointer tracking and per-step effects.
//!
//! A control instruction is split around its delay slot: its operand reads
//! happen before the slot, its call, return and tail call effects after it.

use mdec_cfg::{BasicBlock, BlockExit, ControlFlowGraph};
use mdec_ir::Location;
use mdec_isa::{Instruction, Mnemonic, OpClass, Register, SP, call_clobbers};
use mdec_types::{ArgLocation, CallConfig, Function};
use rustc_hash::FxHashMap;
use tracing::trace;

/// One step of a block in execution order. Indices are into the block's
/// instruction list.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Step {
    /// An ordinary instruction or a delay slot.
    Instruction(usize),
    /// Operand reads of the control instruction.
    Condition(usize),
    /// Call, return or tail call effects of the control instruction.
    Transfer(usize),
}

impl Step {
    pub const fn index(self) -> usize {
        match self {
            Self::Instruction(i) | Self::Condition(i) | Self::Transfer(i) => i,
        }
    }
}

/// Steps of `block` in execution order.
pub fn execution_order(block: &BasicBlock) -> Vec<Step> {
    let count = block.instructions.len();
    let Some(control) = block.control else {
        let mut steps: Vec<Step> = (0..count).map(Step::Instruction).collect();
        // A branch-likely delay slot that leaves through a tail call.
        if matches!(block.exit, BlockExit::TailCall { .. }) && count > 0 {
            steps.push(Step::Transfer(count - 1));
        }
        return steps;
    };
    let mut steps: Vec<Step> = (0..control).map(Step::Instruction).collect();
    steps.push(Step::Condition(control));
    if control + 1 < count {
        steps.push(Step::Instruction(control + 1));
    }
    steps.push(Step::Transfer(control));
    steps
}

/// `addiu sp, sp, imm` and its doubleword forms.
pub fn stack_adjustment(instr: &Instruction) -> Option<i32> {
    let adjusts = matches!(
        instr.mnemonic,
        Mnemonic::Addiu | Mnemonic::Addi | Mnemonic::Daddiu | Mnemonic::Daddi
    );
    if !adjusts || instr.reg(0) != Some(SP) || instr.reg(1) != Some(SP) {
        return None;
    }
    instr
        .operand(2)
        .and_then(mdec_isa::Operand::immediate)
        .and_then(|imm| i32::try_from(imm).ok())
}

/// Stack pointer offset from its entry value before every instruction.
#[derive(Clone, Debug, Default)]
pub struct StackFrame {
    sp_before: FxHashMap<u32, i32>,
    lowest: i32,
}

impl StackFrame {
    pub fn analyze(cfg: &ControlFlowGraph, rpo: &[usize]) -> Self {
        let mut block_entry: Vec<Option<i32>> = vec![None; cfg.len()];
        if let Some(entry) = block_entry.get_mut(cfg.entry().0) {
            *entry = Some(0);
        }
        let mut frame = Self::default();
        for &index in rpo {
            let block = &cfg.blocks()[index];
            let mut delta = block_entry[index].unwrap_or(0);
            for step in execution_order(block) {
                if matches!(step, Step::Transfer(_)) {
                    continue;
                }
                let instr = &block.instructions[step.index()];
                frame.sp_before.insert(instr.address, delta);
                if !instr.defs().contains(&SP) {
                    continue;
                }
                match stack_adjustment(instr) {
                    Some(adjust) => {
                        delta = delta.wrapping_add(adjust);
                        frame.lowest = frame.lowest.min(delta);
                    }
                    None => trace!(
                        address = format_args!("{:#x}", instr.address),
                        "untracked stack pointer write"
                    ),
                }
            }
            for succ in &block.successors {
                block_entry[succ.0].get_or_insert(delta);
            }
        }
        frame
    }

    /// Stack pointer offset before the instruction at `address`.
    pub fn sp_at(&self, address: u32) -> i32 {
        self.sp_before.get(&address).copied().unwrap_or(0)
    }

    /// Entry-relative stack slot of an `sp`-based memory operand.
    pub fn slot(&self, instr: &Instruction) -> Option<i32> {
        let (base, offset) = instr.memory()?;
        (base == SP).then(|| self.sp_at(instr.address).wrapping_add(offset))
    }

    /// Bytes allocated by the prologue.
    pub const fn size(&self) -> i32 {
        -self.lowest
    }
}

/// Locations read and written by one step.
#[derive(Clone, Debug)]
pub struct Effect {
    pub step: Step,
    pub address: u32,
    pub reads: Vec<Location>,
    pub writes: Vec<Location>,
}

/// `zero` is constant and `sp` is tracked by [`StackFrame`].
pub fn is_tracked(reg: Register) -> bool {
    !reg.is_zero() && reg != SP
}

fn registers(regs: Vec<Register>) -> Vec<Location> {
    regs.into_iter()
        .filter(|&reg| is_tracked(reg))
        .map(Location::Register)
        .collect()
}

/// Locations of the receiver and placed arguments of a call made with the
/// stack pointer at `sp`.
pub fn argument_locations(config: &CallConfig, sp: i32) -> Vec<Option<Location>> {
    config
        .receiver
        .iter()
        .map(|loc| Some(*loc))
        .chain(config.arguments.iter().copied())
        .map(|loc| {
            loc.map(|loc| match loc {
                ArgLocation::Register(reg) => Location::Register(reg),
                ArgLocation::Stack(offset) => Location::Stack(sp.wrapping_add(offset)),
            })
        })
        .collect()
}

/// Call configuration of the callee resolved for `block`, if any.
pub fn callee_config(block: &BasicBlock) -> Option<&CallConfig> {
    block
        .call
        .as_ref()
        .and_then(|site| site.function.as_deref())
        .map(|function| &function.call_config)
}

fn instruction_effects(instr: &Instruction, frame: &StackFrame) -> (Vec<Location>, Vec<Location>) {
    let mut reads = registers(instr.uses());
    let mut writes = registers(instr.defs());
    if let Some(slot) = frame.slot(instr) {
        let slot = Location::Stack(slot);
        match instr.class() {
            OpClass::Load | OpClass::LoadPartial => reads.push(slot),
            OpClass::Store => writes.push(slot),
            OpClass::StorePartial => {
                reads.push(slot);
                writes.push(slot);
            }
            _ => {}
        }
    }
    (reads, writes)
}

fn condition_reads(instr: &Instruction) -> Vec<Location> {
    match instr.class() {
        OpClass::Branch | OpClass::BranchLikely | OpClass::BranchLink | OpClass::CallRegister => {
            registers(instr.uses())
        }
        OpClass::JumpRegister if !instr.is_return() => registers(instr.uses()),
        _ => Vec::new(),
    }
}

fn transfer_effects(
    block: &BasicBlock,
    instr: &Instruction,
    frame: &StackFrame,
    function: &Function,
) -> Option<(Vec<Location>, Vec<Location>)> {
    let sp = frame.sp_at(instr.address);
    let arguments = || -> Vec<Location> {
        callee_config(block)
            .map(|config| argument_locations(config, sp).into_iter().flatten().collect())
            .unwrap_or_default()
    };
    match block.exit {
        BlockExit::Call { .. } => {
            let clobbers = registers(call_clobbers().collect());
            Some((arguments(), clobbers))
        }
        BlockExit::TailCall { .. } => Some((arguments(), Vec::new())),
        BlockExit::Return => {
            let reads = function
                .call_config
                .return_value
                .and_then(ArgLocation::register)
                .filter(|&reg| is_tracked(reg))
                .map(Location::Register)
                .into_iter()
                .collect();
            Some((reads, Vec::new()))
        }
        _ => None,
    }
}

/// Effects of `block` in execution order.
pub fn block_effects(block: &BasicBlock, frame: &StackFrame, function: &Function) -> Vec<Effect> {
    execution_order(block)
        .into_iter()
        .filter_map(|step| {
            let instr = &block.instructions[step.index()];
            let (reads, writes) = match step {
                Step::Instruction(_) => instruction_effects(instr, frame),
                Step::Condition(_) => (condition_reads(instr), Vec::new()),
                Step::Transfer(_) => transfer_effects(block, instr, frame, function)?,
            };
            Some(Effect {
                step,
                address: instr.address,
                reads,
                writes,
            })
        })
        .collect()
}
