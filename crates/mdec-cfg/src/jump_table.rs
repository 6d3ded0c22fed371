//! Computed jump expansion.
//!
//! The EE toolchain lowers dense switches to:
//!
//! ```text
//! sltiu   at, idx, N
//! beq     at, zero, default
//! sll     t, idx, 2
//! lui     at, %hi(table)
//! addu    at, at, t
//! lw      t, %lo(table)(at)
//! jr      t
//! ```
//!
//! [`TableJumpResolver`] replays the instructions leading to the `jr` with a
//! small symbolic register state and reads the table through a [`MemoryReader`].

use std::sync::Arc;

use mdec_isa::{Instruction, Mnemonic, OpClass, RA, Register, decode_or_nop};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::MemoryReader;

/// Instructions replayed before a `jr`.
const SCAN_WINDOW: u32 = 16;
/// Upper bound on table size.
const MAX_ENTRIES: u32 = 512;
/// Upper bound on instructions decoded per case body.
const MAX_CASE_INSTRUCTIONS: u32 = 256;

/// One case of an expanded jump table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct JumpTableEntry {
    pub target: u32,
    /// The case body, up to the next case or the first unconditional transfer.
    pub instructions: Vec<Instruction>,
    /// Whether control runs off the end of the body into the next case.
    pub falls_through: bool,
}

/// Oracle consulted by the CFG builder for computed jumps.
pub trait JumpTableResolver: Send + Sync {
    fn can_be_jump_table(&self, address: u32) -> bool;
    fn jump_table_entries(&self, address: u32) -> Option<Vec<JumpTableEntry>>;
}

/// Rejects every computed jump.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoJumpTables;

impl JumpTableResolver for NoJumpTables {
    fn can_be_jump_table(&self, _address: u32) -> bool {
        false
    }

    fn jump_table_entries(&self, _address: u32) -> Option<Vec<JumpTableEntry>> {
        None
    }
}

/// Symbolic register contents during the replay.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Symbolic {
    Const(u32),
    /// `index << 2`.
    Scaled { index: Register },
    /// `table + (index << 2)`.
    Slot { table: u32, index: Register },
    /// Word loaded from a table slot.
    Entry { table: u32, index: Register },
}

#[derive(Default)]
struct ReplayState {
    regs: FxHashMap<Register, Symbolic>,
    bounds: FxHashMap<Register, u32>,
}

impl ReplayState {
    fn get(&self, reg: Register) -> Option<Symbolic> {
        if reg.is_zero() {
            return Some(Symbolic::Const(0));
        }
        self.regs.get(&reg).copied()
    }

    fn set(&mut self, reg: Register, value: Option<Symbolic>) {
        match value {
            Some(value) => {
                self.regs.insert(reg, value);
            }
            None => {
                self.regs.remove(&reg);
            }
        }
    }

    fn imm(instr: &Instruction, index: usize) -> Option<i64> {
        instr.operand(index).and_then(mdec_isa::Operand::immediate)
    }

    // Immediates reinterpret as 32-bit register values.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn step(&mut self, instr: &Instruction) {
        let dest = instr.reg(0);
        let value = match instr.mnemonic {
            Mnemonic::Lui => Self::imm(instr, 1).map(|imm| Symbolic::Const((imm as u32) << 16)),
            Mnemonic::Addiu | Mnemonic::Daddiu | Mnemonic::Ori => {
                let imm = Self::imm(instr, 2).unwrap_or(0) as u32;
                match instr.reg(1).and_then(|reg| self.get(reg)) {
                    Some(Symbolic::Const(base)) if instr.mnemonic == Mnemonic::Ori => {
                        Some(Symbolic::Const(base | imm))
                    }
                    Some(Symbolic::Const(base)) => Some(Symbolic::Const(base.wrapping_add(imm))),
                    _ => None,
                }
            }
            Mnemonic::Sltiu => {
                if let (Some(src), Some(bound)) = (instr.reg(1), Self::imm(instr, 2)) {
                    self.bounds.insert(src, bound as u32);
                }
                None
            }
            Mnemonic::Sll if Self::imm(instr, 2) == Some(2) => {
                instr.reg(1).map(|index| Symbolic::Scaled { index })
            }
            Mnemonic::Addu | Mnemonic::Daddu => {
                let lhs = instr.reg(1).and_then(|reg| self.get(reg));
                let rhs = instr.reg(2).and_then(|reg| self.get(reg));
                match (lhs, rhs) {
                    (Some(Symbolic::Const(a)), Some(Symbolic::Const(b))) => {
                        Some(Symbolic::Const(a.wrapping_add(b)))
                    }
                    (Some(Symbolic::Const(table)), Some(Symbolic::Scaled { index }))
                    | (Some(Symbolic::Scaled { index }), Some(Symbolic::Const(table))) => {
                        Some(Symbolic::Slot { table, index })
                    }
                    _ => None,
                }
            }
            Mnemonic::Lw => match instr.memory() {
                Some((base, offset)) => match self.get(base) {
                    Some(Symbolic::Slot { table, index }) => Some(Symbolic::Entry {
                        table: table.wrapping_add(offset as u32),
                        index,
                    }),
                    _ => None,
                },
                None => None,
            },
            _ => None,
        };
        for reg in instr.defs() {
            self.set(reg, if Some(reg) == dest { value } else { None });
        }
    }
}

/// Recognizes the toolchain's table dispatch idiom.
pub struct TableJumpResolver {
    memory: Arc<dyn MemoryReader>,
}

impl TableJumpResolver {
    pub fn new(memory: Arc<dyn MemoryReader>) -> Self {
        Self { memory }
    }

    fn instruction(&self, address: u32) -> Instruction {
        decode_or_nop(self.memory.read32(address), address)
    }

    /// Table address and entry count for the `jr` at `address`.
    fn locate_table(&self, address: u32) -> Option<(u32, u32)> {
        let jr = self.instruction(address);
        let target_reg = jr.reg(0)?;
        let start = address.saturating_sub(SCAN_WINDOW * Instruction::SIZE);
        let mut state = ReplayState::default();
        for pc in (start..address).step_by(Instruction::SIZE as usize) {
            state.step(&self.instruction(pc));
        }
        let Some(Symbolic::Entry { table, index }) = state.get(target_reg) else {
            trace!(address = format_args!("{address:#x}"), "no table load feeds jr");
            return None;
        };
        let count = *state.bounds.get(&index)?;
        (1..=MAX_ENTRIES).contains(&count).then_some((table, count))
    }

    fn case_body(&self, target: u32, limit: u32) -> (Vec<Instruction>, bool) {
        let mut instructions = Vec::new();
        let mut address = target;
        while address < limit && instructions.len() < MAX_CASE_INSTRUCTIONS as usize {
            let instr = self.instruction(address);
            let unconditional = matches!(
                instr.class(),
                OpClass::Jump | OpClass::JumpRegister
            ) || (instr.mnemonic == Mnemonic::Beq && instr.reg(0) == instr.reg(1));
            instructions.push(instr);
            address = address.wrapping_add(Instruction::SIZE);
            if unconditional {
                // Delay slot.
                instructions.push(self.instruction(address));
                return (instructions, false);
            }
        }
        (instructions, true)
    }
}

impl JumpTableResolver for TableJumpResolver {
    fn can_be_jump_table(&self, address: u32) -> bool {
        let instr = self.instruction(address);
        instr.mnemonic == Mnemonic::Jr && instr.reg(0) != Some(RA)
    }

    fn jump_table_entries(&self, address: u32) -> Option<Vec<JumpTableEntry>> {
        let (table, count) = self.locate_table(address)?;
        let targets: Vec<u32> = (0..count)
            .map(|i| self.memory.read32(table.wrapping_add(i * 4)))
            .collect();
        if targets.iter().any(|&target| target == 0 || target % 4 != 0) {
            debug!(
                address = format_args!("{address:#x}"),
                table = format_args!("{table:#x}"),
                "jump table holds non-code entries"
            );
            return None;
        }

        let mut sorted = targets.clone();
        sorted.sort_unstable();
        sorted.dedup();
        let entries = targets
            .iter()
            .map(|&target| {
                let next = sorted
                    .iter()
                    .copied()
                    .find(|&other| other > target)
                    .unwrap_or(target.saturating_add(MAX_CASE_INSTRUCTIONS * Instruction::SIZE));
                let (instructions, falls_through) = self.case_body(target, next);
                JumpTableEntry {
                    target,
                    instructions,
                    falls_through,
                }
            })
            .collect();
        debug!(
            address = format_args!("{address:#x}"),
            table = format_args!("{table:#x}"),
            count,
            "expanded jump table"
        );
        Some(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryImage;
    use mdec_isa::{A0, AT, V0, ZERO, asm};

    /// Dispatch at 0x1000 over a 3-entry table at 0x2000.
    fn switch_image() -> Arc<dyn MemoryReader> {
        let mut words = vec![
            asm::sltiu(AT, A0, 3),      // 0x1000
            asm::beq(AT, ZERO, 8),      // 0x1004 -> 0x1028
            asm::sll(V0, A0, 2),        // 0x1008
            asm::lui(AT, 0),            // 0x100c
            asm::addu(AT, AT, V0),      // 0x1010
            asm::lw(V0, 0x2000, AT),    // 0x1014
            asm::jr(V0),                // 0x1018
            asm::nop(),                 // 0x101c
            asm::jr(RA),                // 0x1020 case 0
            asm::addiu(V0, ZERO, 1),    // 0x1024
            asm::jr(RA),                // 0x1028 case 1, default
            asm::addiu(V0, ZERO, 2),    // 0x102c
        ];
        words.resize(0x400, 0);
        words.extend([0x1020, 0x1028, 0x1028]);
        Arc::new(MemoryImage::from_words(0x1000, &words))
    }

    #[test]
    fn test_no_jump_tables() {
        assert!(!NoJumpTables.can_be_jump_table(0x1000));
        assert!(NoJumpTables.jump_table_entries(0x1000).is_none());
    }

    #[test]
    fn test_resolves_dispatch_idiom() {
        let resolver = TableJumpResolver::new(switch_image());
        assert!(resolver.can_be_jump_table(0x1018));
        assert!(!resolver.can_be_jump_table(0x1020));
        let entries = resolver.jump_table_entries(0x1018).unwrap();
        let targets: Vec<u32> = entries.iter().map(|entry| entry.target).collect();
        assert_eq!(targets, vec![0x1020, 0x1028, 0x1028]);
        assert_eq!(entries[0].instructions.len(), 2);
        assert!(!entries[0].falls_through);
    }

    #[test]
    fn test_rejects_unbounded_jump() {
        let image: Arc<dyn MemoryReader> = Arc::new(MemoryImage::from_words(
            0x1000,
            &[asm::lw(V0, 0, A0), asm::jr(V0), asm::nop()],
        ));
        let resolver = TableJumpResolver::new(image);
        assert!(resolver.can_be_jump_table(0x1004));
        assert!(resolver.jump_table_entries(0x1004).is_none());
    }
}
