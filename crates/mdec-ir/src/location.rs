//! Storage locations and SSA versions.

use std::fmt;

use mdec_isa::Register;

/// A storage location tracked by SSA.
///
/// Stack offsets are relative to the stack pointer at function entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Location {
    Register(Register),
    Stack(i32),
}

impl Location {
    pub const fn register(&self) -> Option<Register> {
        match self {
            Self::Register(reg) => Some(*reg),
            Self::Stack(_) => None,
        }
    }

    pub const fn is_stack(&self) -> bool {
        matches!(self, Self::Stack(_))
    }
}

impl From<Register> for Location {
    fn from(reg: Register) -> Self {
        Self::Register(reg)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "{reg}"),
            Self::Stack(offset) if *offset < 0 => write!(f, "stack_m{:x}", offset.unsigned_abs()),
            Self::Stack(offset) => write!(f, "stack_{offset:x}"),
        }
    }
}

/// One SSA definition of a location. Version 0 is the value on entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VersionedLocation {
    pub location: Location,
    pub version: u32,
}

impl VersionedLocation {
    pub const fn new(location: Location, version: u32) -> Self {
        Self { location, version }
    }

    /// The entry (parameter) version of `location`.
    pub const fn entry(location: Location) -> Self {
        Self::new(location, 0)
    }
}

impl fmt::Display for VersionedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.location, self.version)
    }
}

/// Identifier of a promoted variable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdec_isa::{A1, S0};

    #[test]
    fn test_location_display() {
        assert_eq!(Location::Register(A1).to_string(), "a1");
        assert_eq!(Location::Stack(-0x20).to_string(), "stack_m20");
        assert_eq!(Location::Stack(8).to_string(), "stack_8");
        assert_eq!(VersionedLocation::new(S0.into(), 3).to_string(), "s0_3");
    }

    #[test]
    fn test_location_ordering_is_total() {
        let mut locs = vec![
            Location::Stack(4),
            Location::Register(S0),
            Location::Stack(-8),
        ];
        locs.sort();
        assert_eq!(locs[0], Location::Register(S0));
        assert_eq!(locs[1], Location::Stack(-8));
    }
}
