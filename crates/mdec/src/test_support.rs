//! Shared fixtures for unit tests.

use std::sync::Arc;

use mdec_cfg::{ControlFlowGraph, NoJumpTables};
use mdec_ir::AstNode;
use mdec_isa::{A0, A1, RA, T0, T1, T2, V0, V1, ZERO, asm, decode_all};
use mdec_types::{Function, FunctionRegistry, TypeId, TypeSystem};

use crate::config::DecompilerConfig;
use crate::lift::lift;
use crate::propagate::propagate;
use crate::ssa::SsaForm;
use crate::structure::structure;

pub const BASE: u32 = 0x0010_0000;

/// Type system and registry with helpers for declaring test functions.
pub struct Fixture {
    pub types: TypeSystem,
    pub registry: FunctionRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            types: TypeSystem::new(),
            registry: FunctionRegistry::new(),
        }
    }

    pub fn ty(&self, name: &str) -> TypeId {
        self.types.resolve(name).unwrap()
    }

    /// Free function `ret name(args...)` spanning `len` instructions at `address`.
    pub fn function(
        &self,
        name: &str,
        address: u32,
        len: usize,
        ret: &str,
        args: &[&str],
    ) -> Arc<Function> {
        let args: Vec<TypeId> = args.iter().map(|name| self.ty(name)).collect();
        let sig = self
            .types
            .get_signature_type(self.ty(ret), &args, None)
            .unwrap();
        let end = address + 4 * u32::try_from(len).unwrap();
        self.registry
            .register_function(&self.types, name, address, end, sig)
            .unwrap()
    }

    /// CFG of `words` at [`BASE`] with call sites resolved against the registry.
    pub fn cfg(&self, words: &[u32], function: &Function) -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::build(&decode_all(words, BASE), &NoJumpTables).unwrap();
        cfg.post_process(function, &self.registry);
        cfg
    }
}

/// SSA and structured tree of `words`, before analysis.
pub fn synthesize(fx: &Fixture, words: &[u32], function: &Function) -> (SsaForm, AstNode) {
    let cfg = fx.cfg(words, function);
    let ssa = SsaForm::build(&cfg, function);
    let mut blocks = lift(&cfg, &ssa, function);
    propagate(&mut blocks, &cfg, &ssa, &DecompilerConfig::new());
    let root = structure(&cfg, blocks);
    (ssa, root)
}

/// `int sum(int* a0, int a1)`: adds `a0[0..a1]` in a do-while loop.
pub fn array_sum() -> Vec<u32> {
    vec![
        asm::addu(V0, ZERO, ZERO),
        asm::addu(V1, ZERO, ZERO),
        asm::sll(T0, V1, 2),
        asm::addu(T0, A0, T0),
        asm::lw(T1, 0, T0),
        asm::addiu(V1, V1, 1),
        asm::addu(V0, V0, T1),
        asm::slt(T2, V1, A1),
        asm::bne(T2, ZERO, -7),
        asm::nop(),
        asm::jr(RA),
        asm::nop(),
    ]
}
