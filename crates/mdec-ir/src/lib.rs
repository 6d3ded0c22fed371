//! Intermediate representation shared by the decompiler stages.
//!
//! - [`Location`] and [`VersionedLocation`]: storage and SSA identities.
//! - [`Expr`]: immutable expression trees with [`Expr::reduce`] simplification.
//! - [`AstNode`]: the structured statement tree handed to analyses and output.

mod ast;
pub mod expr;
mod location;

pub use ast::*;
pub use expr::{BinaryOp, Expr, IndexInfo, MemoryReference, UnaryOp, negate_condition};
pub use expr::{extract_memory_reference, get_index_info};
pub use location::*;
