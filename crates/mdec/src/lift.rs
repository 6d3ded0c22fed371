//! Instruction lifting (CFG + SSA → statements).
//!
//! Each block becomes a statement list plus a [`Terminator`] carrying the
//! expression that decides where control goes next. Steps are lifted in
//! execution order, so a delay slot lands between the branch condition and
//! the call or return it precedes.

use mdec_cfg::{BasicBlock, BlockExit, BlockId, ControlFlowGraph};
use mdec_ir::{AstNode, BinaryOp, Expr, Location, UnaryOp, VersionedLocation};
use mdec_isa::{Instruction, Mnemonic, OpClass, Register, SP, V0, ZERO};
use mdec_types::{ArgLocation, Function};
use tracing::trace;

use crate::ssa::{Effect, SsaForm, Step, argument_locations, callee_config, stack_adjustment};

/// How a lifted block hands off control.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Terminator {
    /// Control follows the block's only CFG edge, if any.
    None,
    /// Condition for the taken edge.
    Branch { condition: Expr },
    /// Jump-table dispatch on `selector`.
    Switch { selector: Expr },
    Return { value: Option<Expr> },
}

impl Terminator {
    pub fn expression(&self) -> Option<&Expr> {
        match self {
            Self::Branch { condition } => Some(condition),
            Self::Switch { selector } => Some(selector),
            Self::Return { value } => value.as_ref(),
            Self::None => None,
        }
    }

    pub fn expression_mut(&mut self) -> Option<&mut Expr> {
        match self {
            Self::Branch { condition } => Some(condition),
            Self::Switch { selector } => Some(selector),
            Self::Return { value } => value.as_mut(),
            Self::None => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LiftedBlock {
    pub id: BlockId,
    pub reachable: bool,
    pub statements: Vec<AstNode>,
    pub terminator: Terminator,
}

/// Lift every block of `cfg`. Unreachable blocks come back empty.
pub fn lift(cfg: &ControlFlowGraph, ssa: &SsaForm, function: &Function) -> Vec<LiftedBlock> {
    let mut reachable = vec![false; cfg.len()];
    for &index in ssa.reverse_postorder() {
        reachable[index] = true;
    }
    let lifter = Lifter { ssa, function };
    cfg.blocks()
        .iter()
        .map(|block| {
            if reachable[block.id.0] {
                lifter.lift_block(block)
            } else {
                trace!(block = %block.id, "skipping unreachable block");
                LiftedBlock {
                    id: block.id,
                    reachable: false,
                    statements: Vec::new(),
                    terminator: Terminator::None,
                }
            }
        })
        .collect()
}

/// Fold a constant displacement into `base`, keeping stack addresses symbolic.
fn offset_expr(base: Expr, offset: i64) -> Expr {
    match base {
        Expr::StackAddress(delta) => i32::try_from(offset).map_or_else(
            |_| Expr::add(Expr::StackAddress(delta), Expr::imm(offset)),
            |offset| Expr::StackAddress(delta.wrapping_add(offset)),
        ),
        other => Expr::add(other, Expr::imm(offset)).reduce(),
    }
}

fn lui_value(imm: i64) -> i64 {
    i32::try_from(imm & 0xFFFF).map_or(0, |upper| i64::from(upper << 16))
}

struct Lifter<'a> {
    ssa: &'a SsaForm,
    function: &'a Function,
}

impl Lifter<'_> {
    fn lift_block(&self, block: &BasicBlock) -> LiftedBlock {
        let mut statements = Vec::new();
        let mut terminator = Terminator::None;
        for effect in self.ssa.effects(block.id) {
            let instr = &block.instructions[effect.step.index()];
            match effect.step {
                Step::Instruction(_) => self.lift_instruction(instr, effect, &mut statements),
                Step::Condition(_) => terminator = self.lift_condition(block, instr),
                Step::Transfer(_) => {
                    if let Some(returned) = self.lift_transfer(block, instr, &mut statements) {
                        terminator = returned;
                    }
                }
            }
        }
        LiftedBlock {
            id: block.id,
            reachable: true,
            statements,
            terminator,
        }
    }

    /// Value of `reg` as read by the instruction at `address`.
    fn operand(&self, address: u32, reg: Register) -> Expr {
        if reg.is_zero() {
            Expr::imm(0)
        } else if reg == SP {
            Expr::StackAddress(self.ssa.frame().sp_at(address))
        } else {
            Expr::value(self.ssa.read(address, Location::Register(reg)))
        }
    }

    fn read_location(&self, address: u32, location: Location) -> Expr {
        match location {
            Location::Register(reg) => self.operand(address, reg),
            Location::Stack(_) => Expr::value(self.ssa.read(address, location)),
        }
    }

    /// Value of `location` as read by the call or return effect at `address`,
    /// after the delay slot has run.
    fn transfer_location(&self, address: u32, location: Location) -> Expr {
        match location {
            Location::Register(reg) if reg.is_zero() => Expr::imm(0),
            Location::Register(reg) if reg == SP => {
                Expr::StackAddress(self.ssa.frame().sp_at(address))
            }
            _ => Expr::value(self.ssa.transfer_read(address, location)),
        }
    }

    fn assign(&self, out: &mut Vec<AstNode>, address: u32, location: Location, value: Expr) {
        let value = value.reduce();
        match self.ssa.write(address, location) {
            Some(dest) => out.push(AstNode::Assign {
                address,
                dest,
                value,
            }),
            // Writes to `zero` or an untracked `sp` only matter for their side effects.
            None if value.has_side_effects() => out.push(AstNode::Expression {
                address,
                expr: value,
            }),
            None => {}
        }
    }

    fn assign_reg(&self, out: &mut Vec<AstNode>, instr: &Instruction, index: usize, value: Expr) {
        let reg = instr.reg(index).unwrap_or(ZERO);
        self.assign(out, instr.address, Location::Register(reg), value);
    }

    #[allow(clippy::too_many_lines)]
    fn lift_instruction(&self, instr: &Instruction, effect: &Effect, out: &mut Vec<AstNode>) {
        let address = instr.address;
        let src = |index: usize| self.operand(address, instr.reg(index).unwrap_or(ZERO));
        let imm = instr
            .operands
            .last()
            .and_then(mdec_isa::Operand::immediate)
            .unwrap_or(0);
        let binary = |op, left, right| Expr::binary(op, left, right);

        let value = match instr.mnemonic {
            Mnemonic::Nop => return,
            Mnemonic::Addu | Mnemonic::Add | Mnemonic::Daddu | Mnemonic::Dadd => {
                Expr::add(src(1), src(2))
            }
            Mnemonic::Subu | Mnemonic::Sub | Mnemonic::Dsubu | Mnemonic::Dsub => {
                Expr::sub(src(1), src(2))
            }
            Mnemonic::And => binary(BinaryOp::And, src(1), src(2)),
            Mnemonic::Or => binary(BinaryOp::Or, src(1), src(2)),
            Mnemonic::Xor => binary(BinaryOp::Xor, src(1), src(2)),
            Mnemonic::Nor => Expr::unary(UnaryOp::Not, binary(BinaryOp::Or, src(1), src(2))),
            Mnemonic::Slt => Expr::lt(src(1), src(2)),
            Mnemonic::Sltu => binary(BinaryOp::LtU, src(1), src(2)),
            Mnemonic::Addiu | Mnemonic::Addi | Mnemonic::Daddiu | Mnemonic::Daddi => {
                if let Some(adjust) = stack_adjustment(instr) {
                    out.push(AstNode::Expression {
                        address,
                        expr: Expr::intrinsic("stack_adjust", vec![Expr::imm(i64::from(adjust))]),
                    });
                    return;
                }
                offset_expr(src(1), imm)
            }
            Mnemonic::Slti => Expr::lt(src(1), Expr::imm(imm)),
            Mnemonic::Sltiu => binary(BinaryOp::LtU, src(1), Expr::imm(imm)),
            Mnemonic::Andi => binary(BinaryOp::And, src(1), Expr::imm(imm)),
            Mnemonic::Ori => binary(BinaryOp::Or, src(1), Expr::imm(imm)),
            Mnemonic::Xori => binary(BinaryOp::Xor, src(1), Expr::imm(imm)),
            Mnemonic::Lui => Expr::imm(lui_value(imm)),
            Mnemonic::Sll | Mnemonic::Dsll => Expr::shl(src(1), Expr::imm(imm)),
            Mnemonic::Srl | Mnemonic::Dsrl => binary(BinaryOp::Shr, src(1), Expr::imm(imm)),
            Mnemonic::Sra | Mnemonic::Dsra => binary(BinaryOp::Sar, src(1), Expr::imm(imm)),
            Mnemonic::Dsll32 => Expr::shl(src(1), Expr::imm(imm + 32)),
            Mnemonic::Dsrl32 => binary(BinaryOp::Shr, src(1), Expr::imm(imm + 32)),
            Mnemonic::Dsra32 => binary(BinaryOp::Sar, src(1), Expr::imm(imm + 32)),
            Mnemonic::Sllv | Mnemonic::Dsllv => Expr::shl(src(1), src(2)),
            Mnemonic::Srlv | Mnemonic::Dsrlv => binary(BinaryOp::Shr, src(1), src(2)),
            Mnemonic::Srav | Mnemonic::Dsrav => binary(BinaryOp::Sar, src(1), src(2)),
            Mnemonic::Movz => Expr::select(Expr::eq(src(2), Expr::imm(0)), src(1), src(0)),
            Mnemonic::Movn => Expr::select(Expr::ne(src(2), Expr::imm(0)), src(1), src(0)),
            Mnemonic::Mult | Mnemonic::Multu | Mnemonic::Div | Mnemonic::Divu => {
                self.lift_mult_div(instr, out);
                return;
            }
            Mnemonic::Mfhi => self.operand(address, Register::Hi),
            Mnemonic::Mflo => self.operand(address, Register::Lo),
            Mnemonic::Mthi => {
                self.assign(out, address, Location::Register(Register::Hi), src(0));
                return;
            }
            Mnemonic::Mtlo => {
                self.assign(out, address, Location::Register(Register::Lo), src(0));
                return;
            }
            Mnemonic::Mfc0 | Mnemonic::Mfc1 | Mnemonic::Cfc1 | Mnemonic::MovS => src(1),
            Mnemonic::Mtc0 | Mnemonic::Mtc1 | Mnemonic::Ctc1 => {
                self.assign_reg(out, instr, 1, src(0));
                return;
            }
            Mnemonic::AddS => binary(BinaryOp::FAdd, src(1), src(2)),
            Mnemonic::SubS => binary(BinaryOp::FSub, src(1), src(2)),
            Mnemonic::MulS => binary(BinaryOp::FMul, src(1), src(2)),
            Mnemonic::DivS => binary(BinaryOp::FDiv, src(1), src(2)),
            Mnemonic::SqrtS => Expr::unary(UnaryOp::FSqrt, src(1)),
            Mnemonic::AbsS => Expr::unary(UnaryOp::FAbs, src(1)),
            Mnemonic::NegS => Expr::unary(UnaryOp::FNeg, src(1)),
            Mnemonic::CvtSW => Expr::unary(UnaryOp::IntToFloat, src(1)),
            Mnemonic::CvtWS => Expr::unary(UnaryOp::FloatToInt, src(1)),
            Mnemonic::CEqS | Mnemonic::CLtS | Mnemonic::CLeS | Mnemonic::CFS => {
                let value = match instr.mnemonic {
                    Mnemonic::CEqS => binary(BinaryOp::FEq, src(0), src(1)),
                    Mnemonic::CLtS => binary(BinaryOp::FLt, src(0), src(1)),
                    Mnemonic::CLeS => binary(BinaryOp::FLe, src(0), src(1)),
                    _ => Expr::imm(0),
                };
                self.assign(out, address, Location::Register(Register::Fcc), value);
                return;
            }
            _ => match instr.class() {
                OpClass::Load | OpClass::Store => {
                    self.lift_memory(instr, out);
                    return;
                }
                _ => {
                    self.lift_opaque(instr, effect, out);
                    return;
                }
            },
        };
        self.assign_reg(out, instr, 0, value);
    }

    fn lift_mult_div(&self, instr: &Instruction, out: &mut Vec<AstNode>) {
        let address = instr.address;
        let regs: Vec<Register> = instr
            .operands
            .iter()
            .filter_map(mdec_isa::Operand::register)
            .collect();
        let (Some(&rs), Some(&rt)) = (regs.iter().rev().nth(1), regs.last()) else {
            return;
        };
        let (left, right) = (self.operand(address, rs), self.operand(address, rt));
        let (lo_op, hi_op) = match instr.mnemonic {
            Mnemonic::Mult => (BinaryOp::Mul, BinaryOp::MulHigh),
            Mnemonic::Multu => (BinaryOp::Mul, BinaryOp::MulHighU),
            Mnemonic::Div => (BinaryOp::Div, BinaryOp::Rem),
            _ => (BinaryOp::DivU, BinaryOp::RemU),
        };
        let lo = Expr::binary(lo_op, left.clone(), right.clone());
        let hi = Expr::binary(hi_op, left, right);
        self.assign(out, address, Location::Register(Register::Lo), lo.clone());
        self.assign(out, address, Location::Register(Register::Hi), hi);
        if regs.len() == 3 {
            self.assign_reg(out, instr, 0, lo);
        }
    }

    fn lift_memory(&self, instr: &Instruction, out: &mut Vec<AstNode>) {
        let Some((base, offset)) = instr.memory() else {
            return;
        };
        let address = instr.address;
        let size = instr.access_size().unwrap_or(4);
        let slot = self.ssa.frame().slot(instr).map(Location::Stack);
        if instr.class() == OpClass::Load {
            let value = slot.map_or_else(
                || {
                    Expr::load(
                        offset_expr(self.operand(address, base), i64::from(offset)),
                        size,
                        instr.mnemonic.is_signed_load(),
                    )
                },
                |slot| self.read_location(address, slot),
            );
            self.assign_reg(out, instr, 0, value);
            return;
        }
        let value = self.operand(address, instr.reg(0).unwrap_or(ZERO));
        match slot {
            Some(slot) => self.assign(out, address, slot, value),
            None => out.push(AstNode::Expression {
                address,
                expr: Expr::store(
                    offset_expr(self.operand(address, base), i64::from(offset)),
                    value,
                    size,
                ),
            }),
        }
    }

    /// Instructions without modeled semantics: every written location gets
    /// an intrinsic over the values read.
    fn lift_opaque(&self, instr: &Instruction, effect: &Effect, out: &mut Vec<AstNode>) {
        let address = instr.address;
        let mut args: Vec<Expr> = effect
            .reads
            .iter()
            .map(|&loc| self.read_location(address, loc))
            .collect();
        if let Some((base, offset)) = instr.memory() {
            if self.ssa.frame().slot(instr).is_none() {
                args.push(offset_expr(self.operand(address, base), i64::from(offset)));
            }
        }
        let intrinsic = Expr::intrinsic(instr.mnemonic.name(), args);
        let dests: Vec<VersionedLocation> = effect
            .writes
            .iter()
            .filter_map(|&loc| self.ssa.write(address, loc))
            .collect();
        if dests.is_empty() {
            out.push(AstNode::Expression {
                address,
                expr: intrinsic,
            });
            return;
        }
        for dest in dests {
            out.push(AstNode::Assign {
                address,
                dest,
                value: intrinsic.clone(),
            });
        }
    }

    fn branch_condition(&self, instr: &Instruction) -> Option<Expr> {
        let address = instr.address;
        let src = |index: usize| self.operand(address, instr.reg(index).unwrap_or(ZERO));
        let zero = || Expr::imm(0);
        let fcc = || self.operand(address, Register::Fcc);
        let condition = match instr.mnemonic {
            Mnemonic::Beq | Mnemonic::Beql => Expr::eq(src(0), src(1)),
            Mnemonic::Bne | Mnemonic::Bnel => Expr::ne(src(0), src(1)),
            Mnemonic::Blez | Mnemonic::Blezl => Expr::binary(BinaryOp::Le, src(0), zero()),
            Mnemonic::Bgtz | Mnemonic::Bgtzl => Expr::binary(BinaryOp::Gt, src(0), zero()),
            Mnemonic::Bltz | Mnemonic::Bltzl => Expr::lt(src(0), zero()),
            Mnemonic::Bgez | Mnemonic::Bgezl => Expr::binary(BinaryOp::Ge, src(0), zero()),
            Mnemonic::Bc1t | Mnemonic::Bc1tl => fcc(),
            Mnemonic::Bc1f | Mnemonic::Bc1fl => Expr::not(fcc()),
            _ => return None,
        };
        Some(condition.reduce())
    }

    fn lift_condition(&self, block: &BasicBlock, instr: &Instruction) -> Terminator {
        match block.exit {
            BlockExit::Branch { .. } => self
                .branch_condition(instr)
                .map_or(Terminator::None, |condition| Terminator::Branch { condition }),
            BlockExit::JumpTable { .. } => Terminator::Switch {
                selector: self.operand(instr.address, instr.reg(0).unwrap_or(ZERO)),
            },
            _ => Terminator::None,
        }
    }

    fn call_expr(&self, block: &BasicBlock, instr: &Instruction) -> Expr {
        let address = instr.address;
        let target = match (instr.class(), &block.exit) {
            (OpClass::CallRegister, _) => self.operand(address, instr.reg(1).unwrap_or(ZERO)),
            (OpClass::JumpRegister, _) => self.operand(address, instr.reg(0).unwrap_or(ZERO)),
            (
                _,
                BlockExit::TailCall { target }
                | BlockExit::Call {
                    target: Some(target),
                    ..
                },
            ) => Expr::imm(i64::from(*target)),
            _ => Expr::imm(instr.target().map_or(0, i64::from)),
        };
        let sp = self.ssa.frame().sp_at(address);
        let args = callee_config(block)
            .map(|config| {
                argument_locations(config, sp)
                    .into_iter()
                    .map(|loc| {
                        loc.map_or_else(
                            || Expr::intrinsic("aggregate", Vec::new()),
                            |loc| self.transfer_location(address, loc),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        Expr::call(target, args)
    }

    fn lift_transfer(
        &self,
        block: &BasicBlock,
        instr: &Instruction,
        out: &mut Vec<AstNode>,
    ) -> Option<Terminator> {
        let address = instr.address;
        let callee = block.call.as_ref().and_then(|site| site.function.as_deref());
        match block.exit {
            BlockExit::Call { .. } => {
                let call = self.call_expr(block, instr);
                let result = match callee {
                    Some(function) => function.call_config.return_value.and_then(ArgLocation::register),
                    None => Some(V0),
                };
                match result.and_then(|reg| self.ssa.write(address, Location::Register(reg))) {
                    Some(dest) => out.push(AstNode::Assign {
                        address,
                        dest,
                        value: call,
                    }),
                    None => out.push(AstNode::Expression {
                        address,
                        expr: call,
                    }),
                }
                None
            }
            BlockExit::TailCall { .. } => {
                let call = self.call_expr(block, instr);
                if self.function.call_config.return_value.is_some() {
                    return Some(Terminator::Return { value: Some(call) });
                }
                out.push(AstNode::Expression {
                    address,
                    expr: call,
                });
                Some(Terminator::Return { value: None })
            }
            BlockExit::Return => {
                let value = self
                    .function
                    .call_config
                    .return_value
                    .and_then(ArgLocation::register)
                    .map(|reg| self.transfer_location(address, Location::Register(reg)));
                Some(Terminator::Return { value })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{BASE, Fixture};
    use mdec_isa::{A0, A1, RA, S0, V0, V1, asm};

    fn lift_words(fx: &Fixture, words: &[u32], ret: &str, args: &[&str]) -> Vec<LiftedBlock> {
        let function = fx.function("f", BASE, words.len(), ret, args);
        let cfg = fx.cfg(words, &function);
        let ssa = SsaForm::build(&cfg, &function);
        lift(&cfg, &ssa, &function)
    }

    fn value(reg: Register, version: u32) -> Expr {
        Expr::value(VersionedLocation::new(Location::Register(reg), version))
    }

    #[test]
    fn test_lift_arithmetic_and_return() {
        let fx = Fixture::new();
        let blocks = lift_words(
            &fx,
            &[asm::addiu(V0, A0, 4), asm::jr(RA), asm::sll(V0, V0, 2)],
            "int",
            &["int"],
        );
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.statements.len(), 2);
        assert!(matches!(
            &block.statements[1],
            AstNode::Assign { value, .. } if *value == Expr::mul(value_of(&block.statements[0]), Expr::imm(4))
        ));
        assert_eq!(
            block.terminator,
            Terminator::Return {
                value: Some(value(V0, 2))
            }
        );
    }

    fn value_of(node: &AstNode) -> Expr {
        let AstNode::Assign { dest, .. } = node else {
            panic!("not an assignment: {node:?}");
        };
        Expr::value(*dest)
    }

    #[test]
    fn test_lift_memory_and_stack_slots() {
        let fx = Fixture::new();
        let blocks = lift_words(
            &fx,
            &[
                asm::addiu(mdec_isa::SP, mdec_isa::SP, -16),
                asm::sw(S0, 8, mdec_isa::SP),
                asm::lw(V1, 4, A0),
                asm::sh(V1, 2, A1),
                asm::jr(RA),
                asm::addiu(mdec_isa::SP, mdec_isa::SP, 16),
            ],
            "void",
            &["int", "int"],
        );
        let stmts = &blocks[0].statements;
        assert!(matches!(
            &stmts[0],
            AstNode::Expression { expr: Expr::Intrinsic { name, .. }, .. } if name == "stack_adjust"
        ));
        assert_eq!(
            stmts[1],
            AstNode::Assign {
                address: BASE + 4,
                dest: VersionedLocation::new(Location::Stack(-8), 1),
                value: value(S0, 0),
            }
        );
        assert_eq!(
            stmts[2],
            AstNode::Assign {
                address: BASE + 8,
                dest: VersionedLocation::new(Location::Register(V1), 1),
                value: Expr::load(Expr::add(value(A0, 0), Expr::imm(4)), 4, true),
            }
        );
        assert_eq!(
            stmts[3],
            AstNode::Expression {
                address: BASE + 12,
                expr: Expr::store(Expr::add(value(A1, 0), Expr::imm(2)), value(V1, 1), 2),
            }
        );
        assert_eq!(blocks[0].terminator, Terminator::Return { value: None });
    }

    #[test]
    fn test_lift_call_with_arguments() {
        let fx = Fixture::new();
        fx.function("callee", 0x0020_0000, 2, "int", &["int"]);
        let blocks = lift_words(
            &fx,
            &[
                asm::jal(0x0020_0000),
                asm::addiu(A0, mdec_isa::ZERO, 7),
                asm::jr(RA),
                asm::nop(),
            ],
            "int",
            &[],
        );
        let stmts = &blocks[0].statements;
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[1],
            AstNode::Assign {
                address: BASE,
                dest: VersionedLocation::new(Location::Register(V0), 1),
                value: Expr::call(Expr::imm(0x0020_0000), vec![value(A0, 1)]),
            }
        );
        assert_eq!(
            blocks[1].terminator,
            Terminator::Return {
                value: Some(value(V0, 1))
            }
        );
    }

    #[test]
    fn test_lift_branch_condition() {
        let fx = Fixture::new();
        let blocks = lift_words(
            &fx,
            &[
                asm::blez(A1, 2),
                asm::nop(),
                asm::addiu(V0, mdec_isa::ZERO, 1),
                asm::jr(RA),
                asm::nop(),
            ],
            "void",
            &["int", "int"],
        );
        assert_eq!(
            blocks[0].terminator,
            Terminator::Branch {
                condition: Expr::binary(BinaryOp::Le, value(A1, 0), Expr::imm(0))
            }
        );
    }

    #[test]
    fn test_lift_mult_and_lui() {
        let fx = Fixture::new();
        let blocks = lift_words(
            &fx,
            &[
                asm::mult(A0, A1),
                asm::mflo(V0),
                asm::lui(V1, 0x8000),
                asm::jr(RA),
                asm::nop(),
            ],
            "int",
            &["int", "int"],
        );
        let stmts = &blocks[0].statements;
        assert!(matches!(
            &stmts[0],
            AstNode::Assign { dest, value: Expr::Binary { op: BinaryOp::Mul, .. }, .. }
                if dest.location == Location::Register(Register::Lo)
        ));
        assert!(matches!(&stmts[1], AstNode::Assign { dest, .. } if dest.location == Location::Register(Register::Hi)));
        assert!(matches!(&stmts[3], AstNode::Assign { value: Expr::Imm(v), .. } if *v == i64::from(i32::MIN)));
    }
}
