use thiserror::Error;

/// Control flow reconstruction failures. Each aborts one function only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CfgError {
    #[error("Function has no instructions")]
    EmptyFunction,
    #[error("Instruction at 0x{address:08x} breaks the contiguous range")]
    NonContiguous { address: u32 },
    #[error("Unresolved computed jump at 0x{address:08x}")]
    UnresolvedJump { address: u32 },
    #[error("Branch at 0x{address:08x} targets 0x{target:08x} outside the function")]
    BranchOutOfRange { address: u32, target: u32 },
    #[error("Jump table at 0x{address:08x} targets 0x{target:08x} outside the function")]
    JumpTableOutOfRange { address: u32, target: u32 },
    #[error("Branch at 0x{address:08x} targets the delay slot at 0x{target:08x}")]
    BranchIntoDelaySlot { address: u32, target: u32 },
    #[error("Conditional call at 0x{address:08x} is not supported")]
    ConditionalCall { address: u32 },
}

pub type Result<T> = std::result::Result<T, CfgError>;
