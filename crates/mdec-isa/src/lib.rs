//! Emotion Engine (MIPS R5900) instruction set: decoder and register file.
//!
//! Decoding is pure and stateless. Unrecognized words surface as
//! [`DecodeError`]; callers that need address alignment preserved use
//! [`decode_or_nop`].

pub mod asm;
mod bits;
mod decode;
mod instruction;
mod mnemonic;
mod registers;

pub use bits::*;
pub use decode::*;
pub use instruction::*;
pub use mnemonic::*;
pub use registers::*;
