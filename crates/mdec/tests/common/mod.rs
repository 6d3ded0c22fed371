//! Programs and symbols shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use mdec::{
    FunctionId, MemoryImage, SerializedDecompilation, SerializedExpr, SerializedNode, Session,
    SymbolFile,
};
use mdec_isa::{
    A0, A1, A2, RA, S0, S1, S2, S3, S4, SP, T0, T1, T2, T3, V0, V1, ZERO, asm,
};

pub const INIT: u32 = 0x0028_2848;
pub const INIT_LEN: u32 = 45;
pub const DESTROY: u32 = INIT + 4 * INIT_LEN;
pub const DESTROY_LEN: u32 = 18;

pub const ALLOC: u32 = 0x0031_B958;
pub const FREE: u32 = 0x0031_B988;
pub const RELEASE: u32 = 0x0031_B918;

/// `void ragUnk0::Init(int unk0, int count)`.
///
/// Stores both arguments, allocates `count` link indices through `ALLOC`,
/// fills them with `0..count` and normalizes `unk0` to its absolute value.
pub fn init() -> Vec<u32> {
    vec![
        asm::addiu(SP, SP, -48),
        asm::sw(S0, 16, SP),
        asm::sw(S1, 20, SP),
        asm::sw(S2, 24, SP),
        asm::sw(S3, 28, SP),
        asm::sw(S4, 32, SP),
        asm::sw(RA, 36, SP),
        asm::mov(S0, A0),
        asm::mov(S1, A1),
        asm::mov(S2, A2),
        // fields
        asm::sw(ZERO, 0, S0),
        asm::sw(S1, 4, S0),
        asm::mult(S1, S2),
        asm::mflo(V1),
        asm::sw(V1, 8, S0),
        asm::sw(S2, 16, S0),
        asm::sll(A0, S2, 2),
        asm::jal(ALLOC),
        asm::nop(),
        asm::sw(V0, 12, S0),
        // if (count > 0)
        asm::blez(S2, 9),
        asm::mov(S3, ZERO),
        // loop
        asm::lw(T0, 12, S0),
        asm::sll(T1, S3, 2),
        asm::addu(T2, T0, T1),
        asm::sw(S3, 0, T2),
        asm::addiu(S3, S3, 1),
        asm::slt(T3, S3, S2),
        asm::bne(T3, ZERO, -7),
        asm::nop(),
        // abs(unk0)
        asm::lw(V1, 4, S0),
        asm::bgez(V1, 3),
        asm::nop(),
        asm::subu(V1, ZERO, V1),
        asm::sw(V1, 4, S0),
        // links
        asm::lw(S4, 12, S0),
        asm::sw(S4, 0, S0),
        asm::lw(RA, 36, SP),
        asm::lw(S4, 32, SP),
        asm::lw(S3, 28, SP),
        asm::lw(S2, 24, SP),
        asm::lw(S1, 20, SP),
        asm::lw(S0, 16, SP),
        asm::jr(RA),
        asm::addiu(SP, SP, 48),
    ]
}

/// `void ragUnk0::Destroy()`: frees the link indices, clears the count and
/// releases the object.
pub fn destroy() -> Vec<u32> {
    vec![
        asm::addiu(SP, SP, -16),
        asm::sw(S0, 0, SP),
        asm::sw(RA, 4, SP),
        asm::mov(S0, A0),
        asm::lw(A0, 12, S0),
        asm::beq(A0, ZERO, 4),
        asm::nop(),
        asm::jal(FREE),
        asm::nop(),
        asm::sw(ZERO, 12, S0),
        asm::sw(ZERO, 16, S0),
        asm::mov(A0, S0),
        asm::jal(RELEASE),
        asm::nop(),
        asm::lw(RA, 4, SP),
        asm::lw(S0, 0, SP),
        asm::jr(RA),
        asm::addiu(SP, SP, 16),
    ]
}

pub const SYMBOLS: &str = r#"{
    "structures": [
        { "name": "ragUnk0", "fields": [
            { "name": "links", "offset": "0x0", "type": "ragUnk0*" },
            { "name": "unk0", "offset": "0x4", "type": "int" },
            { "name": "unk1", "offset": "0x8", "type": "int" },
            { "name": "boneLinkIndices", "offset": "0xc", "type": "int*" },
            { "name": "count", "offset": "0x10", "type": "int" }
        ] }
    ],
    "functions": [
        { "name": "Init", "owner": "ragUnk0", "address": "0x282848", "end": "0x2828fc",
          "arguments": ["int", "int"] },
        { "name": "Destroy", "owner": "ragUnk0", "address": "0x2828fc", "end": "0x282944" },
        { "name": "ragAlloc", "address": "0x31b958", "end": "0x31b988",
          "return_type": "int*", "arguments": ["int"] },
        { "name": "ragFree", "address": "0x31b988", "end": "0x31b9a0",
          "arguments": ["int*"] },
        { "name": "ragRelease", "address": "0x31b918", "end": "0x31b958",
          "arguments": ["ragUnk0*"] }
    ]
}"#;

/// Session over both methods with [`SYMBOLS`] declared.
pub fn session() -> Session {
    let mut words = init();
    words.extend(destroy());
    let session = Session::new(Arc::new(MemoryImage::from_words(INIT, &words)));
    SymbolFile::parse(SYMBOLS)
        .unwrap()
        .declare(session.types(), session.registry())
        .unwrap();
    session
}

pub fn function_id(session: &Session, name: &str) -> FunctionId {
    session.registry().find_function_by_name(name).unwrap().id
}

/// Every expression node in the body, in pre-order.
pub fn all_exprs(decompilation: &SerializedDecompilation) -> Vec<SerializedExpr> {
    let mut exprs = Vec::new();
    decompilation.walk(&mut |node| {
        for expr in node.expressions() {
            expr.walk(&mut |e| exprs.push(e.clone()));
        }
    });
    exprs
}

pub fn references(expr: &SerializedExpr, variable: &str) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if let SerializedExpr::Variable { name, .. } = e {
            found |= name == variable;
        }
    });
    found
}

pub fn loops(decompilation: &SerializedDecompilation) -> Vec<SerializedNode> {
    let mut loops = Vec::new();
    decompilation.walk(&mut |node| {
        if matches!(node, SerializedNode::Loop { .. }) {
            loops.push(node.clone());
        }
    });
    loops
}
