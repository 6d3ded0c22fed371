//! Decoded instruction representation.

use std::fmt;

use crate::{Mnemonic, OpClass, RA, Register};

/// Instruction operand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Register(Register),
    /// Immediate value. Branch and jump targets are stored as absolute addresses.
    Immediate(i64),
    /// Register + offset memory reference.
    Memory { base: Register, offset: i32 },
}

impl Operand {
    pub const fn register(&self) -> Option<Register> {
        match self {
            Self::Register(reg) => Some(*reg),
            _ => None,
        }
    }

    pub const fn immediate(&self) -> Option<i64> {
        match self {
            Self::Immediate(imm) => Some(*imm),
            _ => None,
        }
    }
}

/// A decoded instruction. Always 4 bytes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Instruction {
    pub address: u32,
    pub word: u32,
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub const SIZE: u32 = 4;

    pub const fn new(address: u32, word: u32, mnemonic: Mnemonic, operands: Vec<Operand>) -> Self {
        Self {
            address,
            word,
            mnemonic,
            operands,
        }
    }

    /// Placeholder used in place of an undecodable word.
    pub const fn nop(address: u32, word: u32) -> Self {
        Self::new(address, word, Mnemonic::Nop, Vec::new())
    }

    pub const fn class(&self) -> OpClass {
        self.mnemonic.class()
    }

    /// Address of the following instruction.
    pub const fn next_address(&self) -> u32 {
        self.address.wrapping_add(Self::SIZE)
    }

    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.operands.get(index)
    }

    /// Register operand at `index`.
    pub fn reg(&self, index: usize) -> Option<Register> {
        self.operands.get(index).and_then(Operand::register)
    }

    /// Memory operand, if any.
    pub fn memory(&self) -> Option<(Register, i32)> {
        self.operands.iter().find_map(|op| match op {
            Operand::Memory { base, offset } => Some((*base, *offset)),
            _ => None,
        })
    }

    pub fn access_size(&self) -> Option<u8> {
        self.mnemonic.access_size()
    }

    /// Whether the next instruction executes in this one's delay slot.
    pub const fn has_delay_slot(&self) -> bool {
        matches!(
            self.class(),
            OpClass::Branch
                | OpClass::BranchLikely
                | OpClass::BranchLink
                | OpClass::Jump
                | OpClass::JumpRegister
                | OpClass::Call
                | OpClass::CallRegister
        )
    }

    /// Branch-likely: the delay slot only executes when the branch is taken.
    pub const fn is_likely(&self) -> bool {
        matches!(self.class(), OpClass::BranchLikely)
    }

    pub const fn is_conditional_branch(&self) -> bool {
        matches!(
            self.class(),
            OpClass::Branch | OpClass::BranchLikely | OpClass::BranchLink
        )
    }

    pub const fn is_call(&self) -> bool {
        matches!(self.class(), OpClass::Call | OpClass::CallRegister)
    }

    /// `jr ra`.
    pub fn is_return(&self) -> bool {
        self.mnemonic == Mnemonic::Jr && self.reg(0) == Some(RA)
    }

    /// Any instruction that ends a basic block.
    pub const fn is_control_flow(&self) -> bool {
        self.has_delay_slot()
    }

    /// Absolute target of a branch or direct jump.
    pub fn target(&self) -> Option<u32> {
        match self.class() {
            OpClass::Branch
            | OpClass::BranchLikely
            | OpClass::BranchLink
            | OpClass::Jump
            | OpClass::Call => self
                .operands
                .last()
                .and_then(Operand::immediate)
                .and_then(|imm| u32::try_from(imm).ok()),
            _ => None,
        }
    }

    /// Registers written by this instruction. Never contains `zero`.
    pub fn defs(&self) -> Vec<Register> {
        let mut defs = Vec::with_capacity(2);
        match self.class() {
            OpClass::Alu
            | OpClass::CondMove
            | OpClass::Load
            | OpClass::LoadPartial
            | OpClass::CallRegister => defs.extend(self.reg(0)),
            OpClass::MoveToCop => defs.extend(self.reg(1)),
            OpClass::MultDiv => {
                defs.push(Register::Hi);
                defs.push(Register::Lo);
                if self.operands.len() == 3 {
                    defs.extend(self.reg(0));
                }
            }
            OpClass::MoveFromHiLo => defs.extend(self.reg(0)),
            OpClass::MoveToHiLo => defs.push(if self.mnemonic == Mnemonic::Mthi {
                Register::Hi
            } else {
                Register::Lo
            }),
            OpClass::FpuCompare => defs.push(Register::Fcc),
            OpClass::BranchLink | OpClass::Call => defs.push(RA),
            OpClass::Nop
            | OpClass::Store
            | OpClass::StorePartial
            | OpClass::Branch
            | OpClass::BranchLikely
            | OpClass::Jump
            | OpClass::JumpRegister
            | OpClass::System => {}
        }
        defs.retain(|reg| !reg.is_zero());
        defs
    }

    /// Registers read by this instruction. Never contains `zero`.
    pub fn uses(&self) -> Vec<Register> {
        let mut uses = Vec::with_capacity(3);
        let base = self.memory().map(|(base, _)| base);
        match self.class() {
            OpClass::Alu => uses.extend(self.operands.iter().skip(1).filter_map(Operand::register)),
            OpClass::CondMove
            | OpClass::Branch
            | OpClass::BranchLikely
            | OpClass::BranchLink
            | OpClass::FpuCompare
            | OpClass::JumpRegister
            | OpClass::MoveToHiLo => {
                uses.extend(self.operands.iter().filter_map(Operand::register));
                if self.mnemonic.reads_fcc() {
                    uses.push(Register::Fcc);
                }
            }
            OpClass::Load | OpClass::System => uses.extend(base),
            OpClass::LoadPartial | OpClass::Store | OpClass::StorePartial => {
                uses.extend(self.reg(0));
                uses.extend(base);
            }
            OpClass::CallRegister => uses.extend(self.reg(1)),
            OpClass::MoveToCop => uses.extend(self.reg(0)),
            OpClass::MultDiv => {
                let regs: Vec<Register> =
                    self.operands.iter().filter_map(Operand::register).collect();
                let start = regs.len().saturating_sub(2);
                uses.extend(&regs[start..]);
            }
            OpClass::MoveFromHiLo => uses.push(if self.mnemonic == Mnemonic::Mfhi {
                Register::Hi
            } else {
                Register::Lo
            }),
            OpClass::Nop | OpClass::Jump | OpClass::Call => {}
        }
        uses.retain(|reg| !reg.is_zero());
        uses
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "{reg}"),
            Self::Immediate(imm) => format_imm(f, *imm),
            Self::Memory { base, offset } => {
                format_imm(f, i64::from(*offset))?;
                write!(f, "({base})")
            }
        }
    }
}

fn format_imm(f: &mut fmt::Formatter<'_>, imm: i64) -> fmt::Result {
    if (-9..=9).contains(&imm) {
        write!(f, "{imm}")
    } else if imm < 0 {
        write!(f, "-{:#x}", imm.unsigned_abs())
    } else {
        write!(f, "{imm:#x}")
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            return write!(f, "{}", self.mnemonic);
        }
        write!(f, "{:<8}", self.mnemonic.name())?;
        let target = self.target();
        for (i, op) in self.operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match (op, target) {
                (Operand::Immediate(_), Some(target)) if i + 1 == self.operands.len() => {
                    write!(f, "0x{target:08x}")?;
                }
                _ => write!(f, "{op}")?,
            }
        }
        Ok(())
    }
}
