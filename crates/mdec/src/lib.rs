//! mdec - Emotion Engine MIPS decompiler
//!
//! Lifts one function at a time from a raw memory image to a typed,
//! structured tree and renders it as C-like pseudo-code.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mdec::{MemoryImage, Session};
//!
//! let session = Session::new(Arc::new(MemoryImage::new(base, bytes)));
//! session.load_symbols("symbols.json".as_ref())?;
//! let id = session.registry().find_function_by_name("ragUnk0::Init").unwrap().id;
//! let outcome = session.decompile_function(id);
//! ```

// Re-export from sub-crates
pub use mdec_cfg::{
    CfgError, ControlFlowGraph, JumpTableEntry, JumpTableResolver, MemoryImage, MemoryReader,
    NoJumpTables, TableJumpResolver,
};
pub use mdec_ir::{AstNode, Expr, Location, LoopKind, VarId, VersionedLocation};
pub use mdec_isa::{DecodeError, Instruction, Mnemonic, decode, decode_all, decode_or_nop};
pub use mdec_types::{
    CallConfig, Function, FunctionId, FunctionRegistry, FunctionResolver, TypeError, TypeId,
    TypeSystem,
};

pub mod analysis;
mod config;
mod decompiler;
mod error;
pub mod lift;
pub mod propagate;
mod pseudocode;
mod serialize;
mod session;
pub mod ssa;
pub mod structure;
pub mod symbols;
pub mod vars;

#[cfg(test)]
mod test_support;

pub use analysis::{Analysis, AnalysisContext, AnalysisReport, Analyzer};
pub use config::{DEFAULT_MAX_ANALYSIS_ROUNDS, DecompilerConfig};
pub use decompiler::{Callee, Decompilation, DecompileStats, Decompiler, FunctionCache};
pub use error::{Error, Result};
pub use pseudocode::render;
pub use serialize::{
    SerializedCallee, SerializedCase, SerializedDecompilation, SerializedExpr, SerializedNode,
    SerializedStats, SerializedVariable, SerializedVariableKind,
};
pub use session::{DecompileOutcome, Session};
pub use symbols::{SymbolFile, SymbolSummary};
