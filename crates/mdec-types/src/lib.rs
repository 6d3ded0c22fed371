//! Type system, calling convention and function model.
//!
//! [`TypeSystem`] and [`FunctionRegistry`] are long-lived and shared by
//! every decompilation in a session; both are internally synchronized.

mod builder;
mod callconv;
mod error;
mod function;
mod system;
mod types;

pub use builder::StructureBuilder;
pub use callconv::{ArgClass, ArgLocation, CallConfig, CallingConvention, place_arguments};
pub use error::{Result, TypeError};
pub use function::{Function, FunctionId, FunctionKind, FunctionRegistry, FunctionResolver};
pub use system::TypeSystem;
pub use types::*;
