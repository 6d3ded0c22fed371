//! Mnemonics and their operation classes.

use std::fmt;

/// Operation class, used to derive register effects and control flow.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OpClass {
    Nop,
    /// First operand written, remaining registers read.
    Alu,
    /// Conditional move: first operand written and read.
    CondMove,
    Load,
    /// Unaligned load merging into the destination.
    LoadPartial,
    Store,
    StorePartial,
    Branch,
    BranchLikely,
    /// Conditional branch that writes the link register.
    BranchLink,
    Jump,
    JumpRegister,
    Call,
    CallRegister,
    MultDiv,
    MoveFromHiLo,
    MoveToHiLo,
    /// GPR to coprocessor move: second operand written.
    MoveToCop,
    FpuCompare,
    System,
}

macro_rules! mnemonics {
    ($($variant:ident => ($name:literal, $class:ident)),* $(,)?) => {
        /// Instruction mnemonic.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum Mnemonic {
            $($variant),*
        }

        impl Mnemonic {
            /// Assembler name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),*
                }
            }

            pub const fn class(self) -> OpClass {
                match self {
                    $(Self::$variant => OpClass::$class),*
                }
            }
        }
    };
}

mnemonics! {
    Nop => ("nop", Nop),
    // Shifts
    Sll => ("sll", Alu),
    Srl => ("srl", Alu),
    Sra => ("sra", Alu),
    Sllv => ("sllv", Alu),
    Srlv => ("srlv", Alu),
    Srav => ("srav", Alu),
    Dsll => ("dsll", Alu),
    Dsrl => ("dsrl", Alu),
    Dsra => ("dsra", Alu),
    Dsll32 => ("dsll32", Alu),
    Dsrl32 => ("dsrl32", Alu),
    Dsra32 => ("dsra32", Alu),
    Dsllv => ("dsllv", Alu),
    Dsrlv => ("dsrlv", Alu),
    Dsrav => ("dsrav", Alu),
    // Register ALU
    Add => ("add", Alu),
    Addu => ("addu", Alu),
    Sub => ("sub", Alu),
    Subu => ("subu", Alu),
    And => ("and", Alu),
    Or => ("or", Alu),
    Xor => ("xor", Alu),
    Nor => ("nor", Alu),
    Slt => ("slt", Alu),
    Sltu => ("sltu", Alu),
    Dadd => ("dadd", Alu),
    Daddu => ("daddu", Alu),
    Dsub => ("dsub", Alu),
    Dsubu => ("dsubu", Alu),
    Movz => ("movz", CondMove),
    Movn => ("movn", CondMove),
    // Immediate ALU
    Addi => ("addi", Alu),
    Addiu => ("addiu", Alu),
    Slti => ("slti", Alu),
    Sltiu => ("sltiu", Alu),
    Andi => ("andi", Alu),
    Ori => ("ori", Alu),
    Xori => ("xori", Alu),
    Lui => ("lui", Alu),
    Daddi => ("daddi", Alu),
    Daddiu => ("daddiu", Alu),
    // Multiply/divide
    Mult => ("mult", MultDiv),
    Multu => ("multu", MultDiv),
    Div => ("div", MultDiv),
    Divu => ("divu", MultDiv),
    Mfhi => ("mfhi", MoveFromHiLo),
    Mflo => ("mflo", MoveFromHiLo),
    Mthi => ("mthi", MoveToHiLo),
    Mtlo => ("mtlo", MoveToHiLo),
    // Loads
    Lb => ("lb", Load),
    Lbu => ("lbu", Load),
    Lh => ("lh", Load),
    Lhu => ("lhu", Load),
    Lw => ("lw", Load),
    Lwu => ("lwu", Load),
    Ld => ("ld", Load),
    Lq => ("lq", Load),
    Lwc1 => ("lwc1", Load),
    Lwl => ("lwl", LoadPartial),
    Lwr => ("lwr", LoadPartial),
    Ldl => ("ldl", LoadPartial),
    Ldr => ("ldr", LoadPartial),
    // Stores
    Sb => ("sb", Store),
    Sh => ("sh", Store),
    Sw => ("sw", Store),
    Sd => ("sd", Store),
    Sq => ("sq", Store),
    Swc1 => ("swc1", Store),
    Swl => ("swl", StorePartial),
    Swr => ("swr", StorePartial),
    Sdl => ("sdl", StorePartial),
    Sdr => ("sdr", StorePartial),
    // Branches
    Beq => ("beq", Branch),
    Bne => ("bne", Branch),
    Blez => ("blez", Branch),
    Bgtz => ("bgtz", Branch),
    Bltz => ("bltz", Branch),
    Bgez => ("bgez", Branch),
    Bc1f => ("bc1f", Branch),
    Bc1t => ("bc1t", Branch),
    Beql => ("beql", BranchLikely),
    Bnel => ("bnel", BranchLikely),
    Blezl => ("blezl", BranchLikely),
    Bgtzl => ("bgtzl", BranchLikely),
    Bltzl => ("bltzl", BranchLikely),
    Bgezl => ("bgezl", BranchLikely),
    Bc1fl => ("bc1fl", BranchLikely),
    Bc1tl => ("bc1tl", BranchLikely),
    Bltzal => ("bltzal", BranchLink),
    Bgezal => ("bgezal", BranchLink),
    // Jumps
    J => ("j", Jump),
    Jr => ("jr", JumpRegister),
    Jal => ("jal", Call),
    Jalr => ("jalr", CallRegister),
    // Coprocessor moves
    Mfc0 => ("mfc0", Alu),
    Mtc0 => ("mtc0", MoveToCop),
    Mfc1 => ("mfc1", Alu),
    Mtc1 => ("mtc1", MoveToCop),
    Cfc1 => ("cfc1", Alu),
    Ctc1 => ("ctc1", MoveToCop),
    // Single precision FPU
    AddS => ("add.s", Alu),
    SubS => ("sub.s", Alu),
    MulS => ("mul.s", Alu),
    DivS => ("div.s", Alu),
    SqrtS => ("sqrt.s", Alu),
    AbsS => ("abs.s", Alu),
    MovS => ("mov.s", Alu),
    NegS => ("neg.s", Alu),
    CvtSW => ("cvt.s.w", Alu),
    CvtWS => ("cvt.w.s", Alu),
    CFS => ("c.f.s", FpuCompare),
    CEqS => ("c.eq.s", FpuCompare),
    CLtS => ("c.lt.s", FpuCompare),
    CLeS => ("c.le.s", FpuCompare),
    // System
    Syscall => ("syscall", System),
    Break => ("break", System),
    Sync => ("sync", System),
    Cache => ("cache", System),
    Pref => ("pref", System),
    Eret => ("eret", System),
}

impl Mnemonic {
    /// Memory access width in bytes for loads and stores.
    pub const fn access_size(self) -> Option<u8> {
        match self {
            Self::Lb | Self::Lbu | Self::Sb => Some(1),
            Self::Lh | Self::Lhu | Self::Sh => Some(2),
            Self::Lw
            | Self::Lwu
            | Self::Lwc1
            | Self::Lwl
            | Self::Lwr
            | Self::Sw
            | Self::Swc1
            | Self::Swl
            | Self::Swr => Some(4),
            Self::Ld | Self::Ldl | Self::Ldr | Self::Sd | Self::Sdl | Self::Sdr => Some(8),
            Self::Lq | Self::Sq => Some(16),
            _ => None,
        }
    }

    /// Whether a load sign-extends its result.
    pub const fn is_signed_load(self) -> bool {
        matches!(self, Self::Lb | Self::Lh | Self::Lw | Self::Ld)
    }

    /// Reads the COP1 condition flag.
    pub const fn reads_fcc(self) -> bool {
        matches!(self, Self::Bc1f | Self::Bc1t | Self::Bc1fl | Self::Bc1tl)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
