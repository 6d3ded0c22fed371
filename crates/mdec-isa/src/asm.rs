//! Minimal assembler producing instruction words.
//!
//! Branch offsets are in instructions relative to the delay slot, as encoded.

// Signed operands are packed into raw instruction fields.
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

use crate::Register;

const fn r_type(rs: Register, rt: Register, rd: Register, sa: u8, funct: u8) -> u32 {
    ((rs.index() as u32) << 21)
        | ((rt.index() as u32) << 16)
        | ((rd.index() as u32) << 11)
        | (((sa & 0x1F) as u32) << 6)
        | (funct as u32)
}

const fn i_type(op: u8, rs: Register, rt: Register, imm: u16) -> u32 {
    ((op as u32) << 26) | ((rs.index() as u32) << 21) | ((rt.index() as u32) << 16) | imm as u32
}

const fn regimm(rs: Register, code: u8, offset: i16) -> u32 {
    (1 << 26) | ((rs.index() as u32) << 21) | ((code as u32) << 16) | (offset as u16 as u32)
}

const fn cop1(fmt: u8, ft: u8, fs: u8, fd: u8, funct: u8) -> u32 {
    (0x11 << 26)
        | ((fmt as u32) << 21)
        | ((ft as u32) << 16)
        | ((fs as u32) << 11)
        | ((fd as u32) << 6)
        | (funct as u32)
}

/// Branch offset from the branch at `from` to `to`.
pub const fn branch_offset(from: u32, to: u32) -> i16 {
    ((to.wrapping_sub(from.wrapping_add(4)) as i32) >> 2) as i16
}

pub const fn nop() -> u32 {
    0
}

macro_rules! r3 {
    ($($name:ident => $funct:literal),* $(,)?) => {
        $(
            pub const fn $name(rd: Register, rs: Register, rt: Register) -> u32 {
                r_type(rs, rt, rd, 0, $funct)
            }
        )*
    };
}

macro_rules! shift {
    ($($name:ident => $funct:literal),* $(,)?) => {
        $(
            pub const fn $name(rd: Register, rt: Register, sa: u8) -> u32 {
                r_type(crate::ZERO, rt, rd, sa, $funct)
            }
        )*
    };
}

macro_rules! imm16 {
    ($($name:ident => $op:literal),* $(,)?) => {
        $(
            pub const fn $name(rt: Register, rs: Register, imm: i16) -> u32 {
                i_type($op, rs, rt, imm as u16)
            }
        )*
    };
}

macro_rules! logical_imm {
    ($($name:ident => $op:literal),* $(,)?) => {
        $(
            pub const fn $name(rt: Register, rs: Register, imm: u16) -> u32 {
                i_type($op, rs, rt, imm)
            }
        )*
    };
}

macro_rules! memory {
    ($($name:ident => $op:literal),* $(,)?) => {
        $(
            pub const fn $name(rt: Register, offset: i16, base: Register) -> u32 {
                i_type($op, base, rt, offset as u16)
            }
        )*
    };
}

r3! {
    addu => 0x21,
    subu => 0x23,
    and => 0x24,
    or => 0x25,
    xor => 0x26,
    nor => 0x27,
    slt => 0x2A,
    sltu => 0x2B,
    daddu => 0x2D,
    dsubu => 0x2F,
    movz => 0x0A,
    movn => 0x0B,
}

shift! {
    sll => 0x00,
    srl => 0x02,
    sra => 0x03,
    dsll => 0x38,
    dsll32 => 0x3C,
}

imm16! {
    addiu => 0x09,
    slti => 0x0A,
    sltiu => 0x0B,
    daddiu => 0x19,
}

logical_imm! {
    andi => 0x0C,
    ori => 0x0D,
    xori => 0x0E,
}

memory! {
    lb => 0x20,
    lh => 0x21,
    lw => 0x23,
    lbu => 0x24,
    lhu => 0x25,
    lwu => 0x27,
    sb => 0x28,
    sh => 0x29,
    sw => 0x2B,
    lq => 0x1E,
    sq => 0x1F,
    ld => 0x37,
    sd => 0x3F,
}

/// `move rd, rs` as emitted by the EE toolchain (`daddu rd, rs, zero`).
pub const fn mov(rd: Register, rs: Register) -> u32 {
    daddu(rd, rs, crate::ZERO)
}

pub const fn lui(rt: Register, imm: u16) -> u32 {
    i_type(0x0F, crate::ZERO, rt, imm)
}

pub const fn lwc1(ft: u8, offset: i16, base: Register) -> u32 {
    i_type(0x31, base, Register::Gpr(ft), offset as u16)
}

pub const fn swc1(ft: u8, offset: i16, base: Register) -> u32 {
    i_type(0x39, base, Register::Gpr(ft), offset as u16)
}

pub const fn beq(rs: Register, rt: Register, offset: i16) -> u32 {
    i_type(0x04, rs, rt, offset as u16)
}

pub const fn bne(rs: Register, rt: Register, offset: i16) -> u32 {
    i_type(0x05, rs, rt, offset as u16)
}

pub const fn beql(rs: Register, rt: Register, offset: i16) -> u32 {
    i_type(0x14, rs, rt, offset as u16)
}

pub const fn bnel(rs: Register, rt: Register, offset: i16) -> u32 {
    i_type(0x15, rs, rt, offset as u16)
}

pub const fn blez(rs: Register, offset: i16) -> u32 {
    i_type(0x06, rs, crate::ZERO, offset as u16)
}

pub const fn bgtz(rs: Register, offset: i16) -> u32 {
    i_type(0x07, rs, crate::ZERO, offset as u16)
}

pub const fn bltz(rs: Register, offset: i16) -> u32 {
    regimm(rs, 0x00, offset)
}

pub const fn bgez(rs: Register, offset: i16) -> u32 {
    regimm(rs, 0x01, offset)
}

pub const fn bltzal(rs: Register, offset: i16) -> u32 {
    regimm(rs, 0x10, offset)
}

pub const fn bgezal(rs: Register, offset: i16) -> u32 {
    regimm(rs, 0x11, offset)
}

/// PC-relative call (`bgezal zero`).
pub const fn bal(offset: i16) -> u32 {
    bgezal(crate::ZERO, offset)
}

/// Unconditional PC-relative branch (`beq zero, zero`).
pub const fn b(offset: i16) -> u32 {
    beq(crate::ZERO, crate::ZERO, offset)
}

pub const fn j(target: u32) -> u32 {
    (0x02 << 26) | ((target >> 2) & 0x03FF_FFFF)
}

pub const fn jal(target: u32) -> u32 {
    (0x03 << 26) | ((target >> 2) & 0x03FF_FFFF)
}

pub const fn jr(rs: Register) -> u32 {
    r_type(rs, crate::ZERO, crate::ZERO, 0, 0x08)
}

pub const fn jalr(rd: Register, rs: Register) -> u32 {
    r_type(rs, crate::ZERO, rd, 0, 0x09)
}

pub const fn mult(rs: Register, rt: Register) -> u32 {
    r_type(rs, rt, crate::ZERO, 0, 0x18)
}

pub const fn div(rs: Register, rt: Register) -> u32 {
    r_type(rs, rt, crate::ZERO, 0, 0x1A)
}

pub const fn mfhi(rd: Register) -> u32 {
    r_type(crate::ZERO, crate::ZERO, rd, 0, 0x10)
}

pub const fn mflo(rd: Register) -> u32 {
    r_type(crate::ZERO, crate::ZERO, rd, 0, 0x12)
}

pub const fn syscall() -> u32 {
    0x0C
}

pub const fn mfc1(rt: Register, fs: u8) -> u32 {
    cop1(0x00, rt.index(), fs, 0, 0)
}

pub const fn mtc1(rt: Register, fs: u8) -> u32 {
    cop1(0x04, rt.index(), fs, 0, 0)
}

pub const fn add_s(fd: u8, fs: u8, ft: u8) -> u32 {
    cop1(0x10, ft, fs, fd, 0x00)
}

pub const fn mul_s(fd: u8, fs: u8, ft: u8) -> u32 {
    cop1(0x10, ft, fs, fd, 0x02)
}

pub const fn c_lt_s(fs: u8, ft: u8) -> u32 {
    cop1(0x10, ft, fs, 0, 0x34)
}

pub const fn bc1t(offset: i16) -> u32 {
    cop1(0x08, 1, 0, 0, 0) | (offset as u16 as u32)
}
