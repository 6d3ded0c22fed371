//! Register file of the Emotion Engine core.

use std::fmt;

/// A machine register.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    /// General purpose register 0-31.
    Gpr(u8),
    /// COP1 floating-point register 0-31.
    Fpr(u8),
    /// Multiply/divide high result.
    Hi,
    /// Multiply/divide low result.
    Lo,
    /// COP1 condition flag.
    Fcc,
    /// COP0 system control register.
    Cop0(u8),
    /// COP1 control register.
    Fcr(u8),
}

pub const ZERO: Register = Register::Gpr(0);
pub const AT: Register = Register::Gpr(1);
pub const V0: Register = Register::Gpr(2);
pub const V1: Register = Register::Gpr(3);
pub const A0: Register = Register::Gpr(4);
pub const A1: Register = Register::Gpr(5);
pub const A2: Register = Register::Gpr(6);
pub const A3: Register = Register::Gpr(7);
pub const T0: Register = Register::Gpr(8);
pub const T1: Register = Register::Gpr(9);
pub const T2: Register = Register::Gpr(10);
pub const T3: Register = Register::Gpr(11);
pub const T4: Register = Register::Gpr(12);
pub const T5: Register = Register::Gpr(13);
pub const T6: Register = Register::Gpr(14);
pub const T7: Register = Register::Gpr(15);
pub const S0: Register = Register::Gpr(16);
pub const S1: Register = Register::Gpr(17);
pub const S2: Register = Register::Gpr(18);
pub const S3: Register = Register::Gpr(19);
pub const S4: Register = Register::Gpr(20);
pub const S5: Register = Register::Gpr(21);
pub const S6: Register = Register::Gpr(22);
pub const S7: Register = Register::Gpr(23);
pub const T8: Register = Register::Gpr(24);
pub const T9: Register = Register::Gpr(25);
pub const K0: Register = Register::Gpr(26);
pub const K1: Register = Register::Gpr(27);
pub const GP: Register = Register::Gpr(28);
pub const SP: Register = Register::Gpr(29);
pub const FP: Register = Register::Gpr(30);
pub const RA: Register = Register::Gpr(31);

pub const F0: Register = Register::Fpr(0);
pub const F12: Register = Register::Fpr(12);

/// ABI names of the general purpose registers.
pub const GPR_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp", "fp",
    "ra",
];

const FPR_NAMES: [&str; 32] = [
    "f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "f13", "f14",
    "f15", "f16", "f17", "f18", "f19", "f20", "f21", "f22", "f23", "f24", "f25", "f26", "f27",
    "f28", "f29", "f30", "f31",
];

const COP0_NAMES: [&str; 32] = [
    "Index", "Random", "EntryLo0", "EntryLo1", "Context", "PageMask", "Wired", "$7", "BadVAddr",
    "Count", "EntryHi", "Compare", "Status", "Cause", "EPC", "PRId", "Config", "$17", "$18", "$19",
    "$20", "$21", "$22", "BadPAddr", "Debug", "Perf", "$26", "$27", "TagLo", "TagHi", "ErrorEPC",
    "$31",
];

/// Caller-saved general purpose registers.
pub const CALLER_SAVED_GPRS: [Register; 18] = [
    AT, V0, V1, A0, A1, A2, A3, T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, RA,
];

/// Every register a call may overwrite.
pub fn call_clobbers() -> impl Iterator<Item = Register> {
    CALLER_SAVED_GPRS
        .into_iter()
        .chain((0..20).map(Register::Fpr))
        .chain([Register::Hi, Register::Lo, Register::Fcc])
}

impl Register {
    /// Get the ABI name of this register.
    pub fn name(self) -> &'static str {
        match self {
            Self::Gpr(n) => GPR_NAMES.get(usize::from(n)).copied().unwrap_or("?"),
            Self::Fpr(n) => FPR_NAMES.get(usize::from(n)).copied().unwrap_or("f?"),
            Self::Hi => "hi",
            Self::Lo => "lo",
            Self::Fcc => "fcc",
            Self::Cop0(n) => COP0_NAMES.get(usize::from(n)).copied().unwrap_or("$?"),
            Self::Fcr(31) => "fcsr",
            Self::Fcr(0) => "fir",
            Self::Fcr(_) => "fcr",
        }
    }

    /// Register number within its file (0 for the singleton registers).
    pub const fn index(self) -> u8 {
        match self {
            Self::Gpr(n) | Self::Fpr(n) | Self::Cop0(n) | Self::Fcr(n) => n,
            Self::Hi | Self::Lo | Self::Fcc => 0,
        }
    }

    /// Hardwired zero register.
    pub const fn is_zero(self) -> bool {
        matches!(self, Self::Gpr(0))
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Fpr(_))
    }

    /// Registers preserved across calls by the EABI (`s0-s7`, `gp`, `sp`, `fp`,
    /// `f20-f31`).
    pub const fn is_callee_saved(self) -> bool {
        match self {
            Self::Gpr(n) => matches!(n, 16..=23 | 28..=30),
            Self::Fpr(n) => n >= 20,
            _ => false,
        }
    }

    /// Whether a call overwrites this register.
    pub fn is_clobbered_by_call(self) -> bool {
        match self {
            Self::Fpr(n) => n < 20,
            Self::Hi | Self::Lo | Self::Fcc => true,
            other => CALLER_SAVED_GPRS.contains(&other),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
