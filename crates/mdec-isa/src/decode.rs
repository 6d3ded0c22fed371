//! Instruction decoder.

use thiserror::Error;
use tracing::debug;

use crate::bits::{
    branch_target, extract_bits, funct, jump_target, opcode, rd, rs, rt, sa, simm16, target26,
    uimm16,
};
use crate::{Instruction, Mnemonic, Operand, Register};

/// Unrecognized instruction encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized instruction word 0x{word:08x} at 0x{address:08x}")]
pub struct DecodeError {
    pub word: u32,
    pub address: u32,
}

type Result<T> = std::result::Result<T, DecodeError>;

const fn gpr(n: u8) -> Operand {
    Operand::Register(Register::Gpr(n))
}

const fn fpr(n: u8) -> Operand {
    Operand::Register(Register::Fpr(n))
}

const fn imm(value: i64) -> Operand {
    Operand::Immediate(value)
}

const fn mem(base: u8, offset: i32) -> Operand {
    Operand::Memory {
        base: Register::Gpr(base),
        offset,
    }
}

/// Decode one instruction word at `address`.
#[allow(clippy::too_many_lines)]
pub fn decode(word: u32, address: u32) -> Result<Instruction> {
    let err = DecodeError { word, address };
    if word == 0 {
        return Ok(Instruction::nop(address, word));
    }

    let (mnemonic, operands) = match opcode(word) {
        0x00 => decode_special(word).ok_or(err)?,
        0x01 => decode_regimm(word, address).ok_or(err)?,
        0x02 => (
            Mnemonic::J,
            vec![imm(i64::from(jump_target(target26(word), address)))],
        ),
        0x03 => (
            Mnemonic::Jal,
            vec![imm(i64::from(jump_target(target26(word), address)))],
        ),
        op @ (0x04 | 0x05 | 0x14 | 0x15) => {
            let mnemonic = match op {
                0x04 => Mnemonic::Beq,
                0x05 => Mnemonic::Bne,
                0x14 => Mnemonic::Beql,
                _ => Mnemonic::Bnel,
            };
            let target = branch_target(simm16(word), address);
            (
                mnemonic,
                vec![gpr(rs(word)), gpr(rt(word)), imm(i64::from(target))],
            )
        }
        op @ (0x06 | 0x07 | 0x16 | 0x17) => {
            if rt(word) != 0 {
                return Err(err);
            }
            let mnemonic = match op {
                0x06 => Mnemonic::Blez,
                0x07 => Mnemonic::Bgtz,
                0x16 => Mnemonic::Blezl,
                _ => Mnemonic::Bgtzl,
            };
            let target = branch_target(simm16(word), address);
            (mnemonic, vec![gpr(rs(word)), imm(i64::from(target))])
        }
        op @ (0x08..=0x0B | 0x18 | 0x19) => {
            let mnemonic = match op {
                0x08 => Mnemonic::Addi,
                0x09 => Mnemonic::Addiu,
                0x0A => Mnemonic::Slti,
                0x0B => Mnemonic::Sltiu,
                0x18 => Mnemonic::Daddi,
                _ => Mnemonic::Daddiu,
            };
            (
                mnemonic,
                vec![gpr(rt(word)), gpr(rs(word)), imm(i64::from(simm16(word)))],
            )
        }
        op @ 0x0C..=0x0E => {
            let mnemonic = match op {
                0x0C => Mnemonic::Andi,
                0x0D => Mnemonic::Ori,
                _ => Mnemonic::Xori,
            };
            (
                mnemonic,
                vec![gpr(rt(word)), gpr(rs(word)), imm(i64::from(uimm16(word)))],
            )
        }
        0x0F => (
            Mnemonic::Lui,
            vec![gpr(rt(word)), imm(i64::from(uimm16(word)))],
        ),
        0x10 => decode_cop0(word).ok_or(err)?,
        0x11 => decode_cop1(word, address).ok_or(err)?,
        op @ (0x1A | 0x1B | 0x1E | 0x1F | 0x20..=0x2E | 0x37 | 0x3F) => {
            let mnemonic = match op {
                0x1A => Mnemonic::Ldl,
                0x1B => Mnemonic::Ldr,
                0x1E => Mnemonic::Lq,
                0x1F => Mnemonic::Sq,
                0x20 => Mnemonic::Lb,
                0x21 => Mnemonic::Lh,
                0x22 => Mnemonic::Lwl,
                0x23 => Mnemonic::Lw,
                0x24 => Mnemonic::Lbu,
                0x25 => Mnemonic::Lhu,
                0x26 => Mnemonic::Lwr,
                0x27 => Mnemonic::Lwu,
                0x28 => Mnemonic::Sb,
                0x29 => Mnemonic::Sh,
                0x2A => Mnemonic::Swl,
                0x2B => Mnemonic::Sw,
                0x2C => Mnemonic::Sdl,
                0x2D => Mnemonic::Sdr,
                0x2E => Mnemonic::Swr,
                0x37 => Mnemonic::Ld,
                _ => Mnemonic::Sd,
            };
            (mnemonic, vec![gpr(rt(word)), mem(rs(word), simm16(word))])
        }
        0x31 => (
            Mnemonic::Lwc1,
            vec![fpr(rt(word)), mem(rs(word), simm16(word))],
        ),
        0x39 => (
            Mnemonic::Swc1,
            vec![fpr(rt(word)), mem(rs(word), simm16(word))],
        ),
        op @ (0x2F | 0x33) => {
            let mnemonic = if op == 0x2F {
                Mnemonic::Cache
            } else {
                Mnemonic::Pref
            };
            (
                mnemonic,
                vec![imm(i64::from(rt(word))), mem(rs(word), simm16(word))],
            )
        }
        _ => return Err(err),
    };

    Ok(Instruction::new(address, word, mnemonic, operands))
}

/// Decode, substituting a `nop` placeholder for unrecognized words.
pub fn decode_or_nop(word: u32, address: u32) -> Instruction {
    decode(word, address).unwrap_or_else(|err| {
        debug!(address, %err, "substituting nop");
        Instruction::nop(address, word)
    })
}

/// Decode a contiguous run of words starting at `base`.
pub fn decode_all(words: &[u32], base: u32) -> Vec<Instruction> {
    let mut address = base;
    words
        .iter()
        .map(|&word| {
            let instr = decode_or_nop(word, address);
            address = address.wrapping_add(Instruction::SIZE);
            instr
        })
        .collect()
}

fn decode_special(word: u32) -> Option<(Mnemonic, Vec<Operand>)> {
    let (rs, rt, rd, sa) = (rs(word), rt(word), rd(word), sa(word));
    let three = |m| Some((m, vec![gpr(rd), gpr(rs), gpr(rt)]));
    let shift = |m| Some((m, vec![gpr(rd), gpr(rt), imm(i64::from(sa))]));
    let shift_var = |m| Some((m, vec![gpr(rd), gpr(rt), gpr(rs)]));
    let mult = |m| {
        let ops = if rd == 0 {
            vec![gpr(rs), gpr(rt)]
        } else {
            vec![gpr(rd), gpr(rs), gpr(rt)]
        };
        Some((m, ops))
    };

    match funct(word) {
        0x00 => shift(Mnemonic::Sll),
        0x02 => shift(Mnemonic::Srl),
        0x03 => shift(Mnemonic::Sra),
        0x04 => shift_var(Mnemonic::Sllv),
        0x06 => shift_var(Mnemonic::Srlv),
        0x07 => shift_var(Mnemonic::Srav),
        0x08 => Some((Mnemonic::Jr, vec![gpr(rs)])),
        0x09 => Some((Mnemonic::Jalr, vec![gpr(rd), gpr(rs)])),
        0x0A => three(Mnemonic::Movz),
        0x0B => three(Mnemonic::Movn),
        0x0C => Some((Mnemonic::Syscall, Vec::new())),
        0x0D => Some((Mnemonic::Break, Vec::new())),
        0x0F => Some((Mnemonic::Sync, Vec::new())),
        0x10 => Some((Mnemonic::Mfhi, vec![gpr(rd)])),
        0x11 => Some((Mnemonic::Mthi, vec![gpr(rs)])),
        0x12 => Some((Mnemonic::Mflo, vec![gpr(rd)])),
        0x13 => Some((Mnemonic::Mtlo, vec![gpr(rs)])),
        0x14 => shift_var(Mnemonic::Dsllv),
        0x16 => shift_var(Mnemonic::Dsrlv),
        0x17 => shift_var(Mnemonic::Dsrav),
        0x18 => mult(Mnemonic::Mult),
        0x19 => mult(Mnemonic::Multu),
        0x1A => Some((Mnemonic::Div, vec![gpr(rs), gpr(rt)])),
        0x1B => Some((Mnemonic::Divu, vec![gpr(rs), gpr(rt)])),
        0x20 => three(Mnemonic::Add),
        0x21 => three(Mnemonic::Addu),
        0x22 => three(Mnemonic::Sub),
        0x23 => three(Mnemonic::Subu),
        0x24 => three(Mnemonic::And),
        0x25 => three(Mnemonic::Or),
        0x26 => three(Mnemonic::Xor),
        0x27 => three(Mnemonic::Nor),
        0x2A => three(Mnemonic::Slt),
        0x2B => three(Mnemonic::Sltu),
        0x2C => three(Mnemonic::Dadd),
        0x2D => three(Mnemonic::Daddu),
        0x2E => three(Mnemonic::Dsub),
        0x2F => three(Mnemonic::Dsubu),
        0x38 => shift(Mnemonic::Dsll),
        0x3A => shift(Mnemonic::Dsrl),
        0x3B => shift(Mnemonic::Dsra),
        0x3C => shift(Mnemonic::Dsll32),
        0x3E => shift(Mnemonic::Dsrl32),
        0x3F => shift(Mnemonic::Dsra32),
        _ => None,
    }
}

fn decode_regimm(word: u32, address: u32) -> Option<(Mnemonic, Vec<Operand>)> {
    let mnemonic = match rt(word) {
        0x00 => Mnemonic::Bltz,
        0x01 => Mnemonic::Bgez,
        0x02 => Mnemonic::Bltzl,
        0x03 => Mnemonic::Bgezl,
        0x10 => Mnemonic::Bltzal,
        0x11 => Mnemonic::Bgezal,
        _ => return None,
    };
    let target = branch_target(simm16(word), address);
    Some((mnemonic, vec![gpr(rs(word)), imm(i64::from(target))]))
}

fn decode_cop0(word: u32) -> Option<(Mnemonic, Vec<Operand>)> {
    let cop = Operand::Register(Register::Cop0(rd(word)));
    match rs(word) {
        0x00 => Some((Mnemonic::Mfc0, vec![gpr(rt(word)), cop])),
        0x04 => Some((Mnemonic::Mtc0, vec![gpr(rt(word)), cop])),
        0x10 if funct(word) == 0x18 => Some((Mnemonic::Eret, Vec::new())),
        _ => None,
    }
}

fn decode_cop1(word: u32, address: u32) -> Option<(Mnemonic, Vec<Operand>)> {
    let fs = rd(word);
    let ft = rt(word);
    let fd = sa(word);
    match rs(word) {
        0x00 => Some((Mnemonic::Mfc1, vec![gpr(rt(word)), fpr(fs)])),
        0x02 => Some((
            Mnemonic::Cfc1,
            vec![gpr(rt(word)), Operand::Register(Register::Fcr(fs))],
        )),
        0x04 => Some((Mnemonic::Mtc1, vec![gpr(rt(word)), fpr(fs)])),
        0x06 => Some((
            Mnemonic::Ctc1,
            vec![gpr(rt(word)), Operand::Register(Register::Fcr(fs))],
        )),
        0x08 => {
            let mnemonic = match extract_bits(word, 16, 2) {
                0 => Mnemonic::Bc1f,
                1 => Mnemonic::Bc1t,
                2 => Mnemonic::Bc1fl,
                _ => Mnemonic::Bc1tl,
            };
            let target = branch_target(simm16(word), address);
            Some((mnemonic, vec![imm(i64::from(target))]))
        }
        0x10 => {
            let binary = |m| Some((m, vec![fpr(fd), fpr(fs), fpr(ft)]));
            let unary = |m| Some((m, vec![fpr(fd), fpr(fs)]));
            let compare = |m| Some((m, vec![fpr(fs), fpr(ft)]));
            match funct(word) {
                0x00 => binary(Mnemonic::AddS),
                0x01 => binary(Mnemonic::SubS),
                0x02 => binary(Mnemonic::MulS),
                0x03 => binary(Mnemonic::DivS),
                0x04 => Some((Mnemonic::SqrtS, vec![fpr(fd), fpr(ft)])),
                0x05 => unary(Mnemonic::AbsS),
                0x06 => unary(Mnemonic::MovS),
                0x07 => unary(Mnemonic::NegS),
                0x24 => unary(Mnemonic::CvtWS),
                0x30 => compare(Mnemonic::CFS),
                0x32 => compare(Mnemonic::CEqS),
                0x34 => compare(Mnemonic::CLtS),
                0x36 => compare(Mnemonic::CLeS),
                _ => None,
            }
        }
        0x14 if funct(word) == 0x20 => Some((Mnemonic::CvtSW, vec![fpr(fd), fpr(fs)])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{A0, A1, OpClass, RA, S0, SP, V0, asm};

    #[test]
    fn test_decode_addiu_frame() {
        let instr = decode(0x27BD_FFD0, 0x0028_2848).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::Addiu);
        assert_eq!(
            instr.operands,
            vec![
                Operand::Register(SP),
                Operand::Register(SP),
                Operand::Immediate(-48)
            ]
        );
        assert_eq!(instr.to_string(), "addiu   sp, sp, -0x30");
        assert_eq!(instr.defs(), vec![SP]);
        assert_eq!(instr.uses(), vec![SP]);
    }

    #[test]
    fn test_decode_nop() {
        let instr = decode(0, 0x1000).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::Nop);
        assert_eq!(instr.to_string(), "nop");
        assert!(instr.defs().is_empty());
    }

    #[test]
    fn test_decode_jal_and_delay_slot() {
        let instr = decode(asm::jal(0x0031_B958), 0x0028_2890).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::Jal);
        assert_eq!(instr.target(), Some(0x0031_B958));
        assert!(instr.has_delay_slot());
        assert!(instr.is_call());
        assert_eq!(instr.defs(), vec![RA]);
        assert_eq!(instr.to_string(), "jal     0x0031b958");
    }

    #[test]
    fn test_decode_branches() {
        let beq = decode(asm::beq(A0, crate::ZERO, 3), 0x1000).unwrap();
        assert_eq!(beq.mnemonic, Mnemonic::Beq);
        assert_eq!(beq.target(), Some(0x1010));
        assert_eq!(beq.uses(), vec![A0]);

        let bnel = decode(asm::bnel(V0, A1, -2), 0x1000).unwrap();
        assert_eq!(bnel.class(), OpClass::BranchLikely);
        assert!(bnel.is_likely());
        assert_eq!(bnel.target(), Some(0x0FFC));

        let blez = decode(asm::blez(S0, 5), 0x2000).unwrap();
        assert_eq!(blez.mnemonic, Mnemonic::Blez);
        assert_eq!(blez.target(), Some(0x2018));
    }

    #[test]
    fn test_decode_linking_branches() {
        let bltzal = decode(asm::bltzal(A0, 100), 0x0010_0000).unwrap();
        assert_eq!(bltzal.mnemonic, Mnemonic::Bltzal);
        assert_eq!(bltzal.class(), OpClass::BranchLink);
        assert_eq!(bltzal.target(), Some(0x0010_0194));
        assert_eq!(bltzal.uses(), vec![A0]);
        assert_eq!(bltzal.defs(), vec![RA]);
        assert!(bltzal.has_delay_slot());
        assert!(!bltzal.is_likely());

        let bal = decode(asm::bal(-1), 0x2000).unwrap();
        assert_eq!(bal.mnemonic, Mnemonic::Bgezal);
        assert_eq!(bal.reg(0), Some(crate::ZERO));
        assert_eq!(bal.target(), Some(0x2000));
    }

    #[test]
    fn test_decode_memory() {
        let sd = decode(asm::sd(RA, 0x28, SP), 0).unwrap();
        assert_eq!(sd.mnemonic, Mnemonic::Sd);
        assert_eq!(sd.memory(), Some((SP, 0x28)));
        assert_eq!(sd.access_size(), Some(8));
        assert_eq!(sd.uses(), vec![RA, SP]);
        assert!(sd.defs().is_empty());

        let lhu = decode(asm::lhu(V0, -4, A0), 0).unwrap();
        assert_eq!(lhu.mnemonic, Mnemonic::Lhu);
        assert_eq!(lhu.defs(), vec![V0]);
        assert_eq!(lhu.to_string(), "lhu     v0, -4(a0)");
    }

    #[test]
    fn test_decode_return() {
        let instr = decode(asm::jr(RA), 0).unwrap();
        assert!(instr.is_return());
        assert!(instr.has_delay_slot());
    }

    #[test]
    fn test_decode_mult_hi_lo() {
        let mult = decode(asm::mult(A0, A1), 0).unwrap();
        assert_eq!(mult.defs(), vec![Register::Hi, Register::Lo]);
        assert_eq!(mult.uses(), vec![A0, A1]);
        let mflo = decode(asm::mflo(V0), 0).unwrap();
        assert_eq!(mflo.uses(), vec![Register::Lo]);
        assert_eq!(mflo.defs(), vec![V0]);
    }

    #[test]
    fn test_decode_fpu() {
        let add = decode(asm::add_s(0, 12, 13), 0).unwrap();
        assert_eq!(add.mnemonic, Mnemonic::AddS);
        assert_eq!(add.defs(), vec![Register::Fpr(0)]);
        let cmp = decode(asm::c_lt_s(12, 13), 0).unwrap();
        assert_eq!(cmp.defs(), vec![Register::Fcc]);
        let bc1t = decode(asm::bc1t(2), 0x100).unwrap();
        assert_eq!(bc1t.uses(), vec![Register::Fcc]);
        assert_eq!(bc1t.target(), Some(0x10C));
        let mtc1 = decode(asm::mtc1(A0, 12), 0).unwrap();
        assert_eq!(mtc1.defs(), vec![Register::Fpr(12)]);
        assert_eq!(mtc1.uses(), vec![A0]);
    }

    #[test]
    fn test_unrecognized_word_becomes_nop() {
        // Opcode 0x3b is unassigned.
        let word = 0xEC00_0000;
        assert_eq!(
            decode(word, 0x40),
            Err(DecodeError {
                word,
                address: 0x40
            })
        );
        let words = [asm::addiu(V0, crate::ZERO, 1), word, asm::jr(RA)];
        let instrs = decode_all(&words, 0x40);
        assert_eq!(instrs.len(), 3);
        assert_eq!(instrs[1].mnemonic, Mnemonic::Nop);
        assert_eq!(instrs[1].address, 0x44);
        assert_eq!(instrs[2].address, 0x48);
        assert!(instrs[2].is_return());
    }
}
