//! Argument and return value placement for the EE EABI.

use std::fmt;

use mdec_isa::{A0, A1, A2, A3, F0, Register, T0, T1, T2, T3, V0};

const INT_ARGS: [Register; 4] = [A0, A1, A2, A3];
const INT_OVERFLOW: [Register; 4] = [T0, T1, T2, T3];
const FLOAT_ARGS: [Register; 4] = [
    Register::Fpr(12),
    Register::Fpr(13),
    Register::Fpr(14),
    Register::Fpr(15),
];
const FLOAT_OVERFLOW: [Register; 4] = [
    Register::Fpr(16),
    Register::Fpr(17),
    Register::Fpr(18),
    Register::Fpr(19),
];
const STACK_SLOT: i32 = 8;

/// Where a value is passed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ArgLocation {
    Register(Register),
    /// Byte offset into the outgoing argument area.
    Stack(i32),
}

impl ArgLocation {
    pub const fn register(self) -> Option<Register> {
        match self {
            Self::Register(reg) => Some(reg),
            Self::Stack(_) => None,
        }
    }
}

impl fmt::Display for ArgLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "{reg}"),
            Self::Stack(offset) => write!(f, "stack[{offset:#x}]"),
        }
    }
}

/// Resolved placement of a function's receiver, arguments and return value.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct CallConfig {
    pub receiver: Option<ArgLocation>,
    /// `None` for arguments that cannot be placed (aggregates by value).
    pub arguments: Vec<Option<ArgLocation>>,
    pub return_value: Option<ArgLocation>,
}

impl CallConfig {
    /// Registers carrying the receiver and arguments, in declaration order.
    pub fn argument_registers(&self) -> impl Iterator<Item = Register> + '_ {
        self.receiver
            .iter()
            .chain(self.arguments.iter().flatten())
            .filter_map(|loc| loc.register())
    }
}

/// Calling conventions. The EE toolchain emits one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum CallingConvention {
    #[default]
    Eabi,
}

/// Register class of a value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArgClass {
    Integer,
    Float,
    /// Structures and arrays passed by value. Unsupported.
    Aggregate,
    Void,
}

/// Hands out registers of one class, then its overflow class.
struct ClassAllocator {
    primary: &'static [Register],
    overflow: &'static [Register],
    next: usize,
}

impl ClassAllocator {
    const fn new(primary: &'static [Register], overflow: &'static [Register]) -> Self {
        Self {
            primary,
            overflow,
            next: 0,
        }
    }

    fn next(&mut self) -> Option<Register> {
        let reg = self
            .primary
            .get(self.next)
            .or_else(|| self.overflow.get(self.next - self.primary.len()))
            .copied();
        if reg.is_some() {
            self.next += 1;
        }
        reg
    }
}

/// Compute the placement for already-classified values.
///
/// The receiver, when present, takes the first integer register. Integer
/// arguments use `a0-a3` then `t0-t3`; float arguments use `f12-f15` then
/// `f16-f19`; everything after that goes to the stack in 8-byte slots.
pub fn place_arguments(
    convention: CallingConvention,
    return_class: ArgClass,
    has_receiver: bool,
    arguments: &[ArgClass],
) -> CallConfig {
    let CallingConvention::Eabi = convention;
    let mut ints = ClassAllocator::new(&INT_ARGS, &INT_OVERFLOW);
    let mut floats = ClassAllocator::new(&FLOAT_ARGS, &FLOAT_OVERFLOW);
    let mut stack = 0;
    let mut spill = |reg: Option<Register>| {
        reg.map_or_else(
            || {
                let offset = stack;
                stack += STACK_SLOT;
                ArgLocation::Stack(offset)
            },
            ArgLocation::Register,
        )
    };

    let receiver = has_receiver.then(|| spill(ints.next()));
    let arguments = arguments
        .iter()
        .map(|class| match class {
            ArgClass::Integer => Some(spill(ints.next())),
            ArgClass::Float => Some(spill(floats.next())),
            ArgClass::Aggregate | ArgClass::Void => None,
        })
        .collect();
    let return_value = match return_class {
        ArgClass::Integer => Some(ArgLocation::Register(V0)),
        ArgClass::Float => Some(ArgLocation::Register(F0)),
        ArgClass::Aggregate | ArgClass::Void => None,
    };

    CallConfig {
        receiver,
        arguments,
        return_value,
    }
}
