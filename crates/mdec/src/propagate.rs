//! Statement simplification on lifted blocks.
//!
//! Runs before structuring, while statements are still flat per block:
//! frame elision, copy propagation, single-use inlining and dead assignment
//! removal. Versions that belong to a phi web are never moved or removed;
//! they become variables once the web is promoted.

use mdec_cfg::{BlockId, ControlFlowGraph};
use mdec_ir::{AstNode, Expr, Location, VersionedLocation};
use mdec_isa::RA;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::config::DecompilerConfig;
use crate::lift::LiftedBlock;
use crate::ssa::SsaForm;

/// Statements removed by each stage.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct PropagationStats {
    pub elided: usize,
    pub copies: usize,
    pub inlined: usize,
    pub dead: usize,
}

/// Simplify `blocks` in place.
pub fn propagate(
    blocks: &mut [LiftedBlock],
    cfg: &ControlFlowGraph,
    ssa: &SsaForm,
    config: &DecompilerConfig,
) -> PropagationStats {
    let webs: FxHashSet<VersionedLocation> = ssa
        .congruence_classes()
        .iter()
        .flatten()
        .copied()
        .collect();
    let mut stats = PropagationStats::default();
    if config.elide_frame {
        stats.elided = elide_frame(blocks, &webs);
    }
    if config.propagate_expressions {
        loop {
            let copies = propagate_copies(blocks, &webs);
            let inlined = inline_single_uses(blocks, cfg, ssa, &webs);
            let dead = remove_dead(blocks, ssa, &webs);
            stats.copies += copies;
            stats.inlined += inlined;
            stats.dead += dead;
            if copies + inlined + dead == 0 {
                break;
            }
        }
    }
    debug!(
        elided = stats.elided,
        copies = stats.copies,
        inlined = stats.inlined,
        dead = stats.dead,
        "propagated"
    );
    stats
}

fn for_each_expr_mut(blocks: &mut [LiftedBlock], mut f: impl FnMut(&mut Expr)) {
    for block in blocks {
        for stmt in &mut block.statements {
            for expr in stmt.expressions_mut() {
                f(expr);
            }
        }
        if let Some(expr) = block.terminator.expression_mut() {
            f(expr);
        }
    }
}

fn substitute_everywhere(blocks: &mut [LiftedBlock], target: VersionedLocation, replacement: &Expr) {
    for_each_expr_mut(blocks, |expr| {
        if expr.values().contains(&target) {
            *expr = expr.substitute(target, replacement).reduce();
        }
    });
}

fn is_stack_adjust(stmt: &AstNode) -> bool {
    matches!(
        stmt,
        AstNode::Expression { expr: Expr::Intrinsic { name, .. }, .. } if name == "stack_adjust"
    )
}

/// Spill of a callee-saved register's entry value: `stack_s = reg_0`.
fn spill(stmt: &AstNode) -> Option<(VersionedLocation, VersionedLocation)> {
    let AstNode::Assign { dest, value, .. } = stmt else {
        return None;
    };
    let source = value.as_value()?;
    let reg = source.location.register()?;
    let saved = reg.is_callee_saved() || reg == RA;
    (dest.location.is_stack() && source.version == 0 && saved).then_some((*dest, source))
}

/// Remove stack pointer adjustment, callee-saved spills and their reloads.
fn elide_frame(blocks: &mut [LiftedBlock], webs: &FxHashSet<VersionedLocation>) -> usize {
    let before: usize = blocks.iter().map(|b| b.statements.len()).sum();
    let mut spills: FxHashMap<VersionedLocation, VersionedLocation> = FxHashMap::default();
    for block in blocks.iter_mut() {
        block.statements.retain(|stmt| {
            if is_stack_adjust(stmt) {
                return false;
            }
            match spill(stmt) {
                Some((slot, source)) if !webs.contains(&slot) => {
                    spills.insert(slot, source);
                    false
                }
                _ => true,
            }
        });
    }
    for (slot, source) in &spills {
        substitute_everywhere(blocks, *slot, &Expr::value(*source));
    }

    // Reloads now read the entry value straight back into the register.
    let mut reloads = Vec::new();
    for block in blocks.iter_mut() {
        block.statements.retain(|stmt| {
            let AstNode::Assign { dest, value, .. } = stmt else {
                return true;
            };
            let restores = value
                .as_value()
                .is_some_and(|source| source.version == 0 && source.location == dest.location);
            let was_spilled = spills.values().any(|source| source.location == dest.location);
            if restores && was_spilled && !webs.contains(dest) {
                reloads.push((*dest, value.clone()));
                return false;
            }
            true
        });
    }
    for (dest, value) in &reloads {
        substitute_everywhere(blocks, *dest, value);
    }
    let after: usize = blocks.iter().map(|b| b.statements.len()).sum();
    before - after
}

fn is_register(vloc: VersionedLocation) -> bool {
    matches!(vloc.location, Location::Register(_))
}

fn copy_source(stmt: &AstNode, webs: &FxHashSet<VersionedLocation>) -> bool {
    let AstNode::Assign { dest, value, .. } = stmt else {
        return false;
    };
    if !is_register(*dest) || webs.contains(dest) {
        return false;
    }
    match value {
        Expr::Imm(_) | Expr::StackAddress(_) => true,
        Expr::Value(source) => !webs.contains(source),
        _ => false,
    }
}

fn propagate_copies(blocks: &mut [LiftedBlock], webs: &FxHashSet<VersionedLocation>) -> usize {
    let mut removed = 0;
    loop {
        let found = blocks.iter().enumerate().find_map(|(b, block)| {
            block
                .statements
                .iter()
                .position(|stmt| copy_source(stmt, webs))
                .map(|i| (b, i))
        });
        let Some((b, i)) = found else {
            return removed;
        };
        if let AstNode::Assign { dest, value, .. } = blocks[b].statements.remove(i) {
            substitute_everywhere(blocks, dest, &value);
            removed += 1;
        }
    }
}

/// Read counts of every SSA value, including phi sources.
fn count_uses(blocks: &[LiftedBlock], ssa: &SsaForm) -> FxHashMap<VersionedLocation, usize> {
    let mut uses: FxHashMap<VersionedLocation, usize> = FxHashMap::default();
    let mut count = |expr: &Expr| {
        for vloc in expr.values() {
            *uses.entry(vloc).or_default() += 1;
        }
    };
    for block in blocks {
        for stmt in &block.statements {
            stmt.expressions().into_iter().for_each(&mut count);
        }
        if let Some(expr) = block.terminator.expression() {
            count(expr);
        }
    }
    for block in blocks.iter().filter(|block| block.reachable) {
        for phi in ssa.phis(block.id) {
            for &(_, version) in &phi.sources {
                *uses
                    .entry(VersionedLocation::new(phi.location, version))
                    .or_default() += 1;
            }
        }
    }
    uses
}

fn reads(stmt: &AstNode, vloc: VersionedLocation) -> bool {
    stmt.expressions()
        .into_iter()
        .any(|expr| expr.values().contains(&vloc))
}

/// Whether moving `value` past `stmt` could change what either computes.
fn blocks_motion(value: &Expr, stmt: &AstNode) -> bool {
    if let AstNode::Assign { dest, .. } = stmt {
        if value.values().iter().any(|vloc| vloc.location == dest.location) {
            return true;
        }
    }
    let exprs = stmt.expressions();
    let writes = exprs.iter().any(|expr| expr.has_side_effects());
    let loads = exprs.iter().any(|expr| expr.reads_memory());
    let value_writes = value.has_side_effects();
    (writes && (value_writes || value.reads_memory())) || (value_writes && loads)
}

/// Where an assignment's single use lives: a block and a statement index,
/// with `statements.len()` standing for the terminator.
#[derive(Clone, Copy, Debug)]
struct Site {
    block: usize,
    position: usize,
}

fn use_position(block: &LiftedBlock, from: usize, vloc: VersionedLocation) -> Option<usize> {
    block.statements[from..]
        .iter()
        .position(|stmt| reads(stmt, vloc))
        .map(|offset| from + offset)
        .or_else(|| {
            block
                .terminator
                .expression()
                .is_some_and(|expr| expr.values().contains(&vloc))
                .then_some(block.statements.len())
        })
}

fn motion_clear(value: &Expr, stmts: &[AstNode]) -> bool {
    !stmts.iter().any(|stmt| blocks_motion(value, stmt))
}

/// Use site of the assignment at `index` of block `b`, if it can be inlined
/// there. Pure values may also sink into a successor whose only predecessor
/// is `b`.
fn inline_site(
    blocks: &[LiftedBlock],
    cfg: &ControlFlowGraph,
    b: usize,
    index: usize,
    uses: &FxHashMap<VersionedLocation, usize>,
    webs: &FxHashSet<VersionedLocation>,
) -> Option<Site> {
    let block = &blocks[b];
    let AstNode::Assign { dest, value, .. } = &block.statements[index] else {
        return None;
    };
    if !is_register(*dest) || webs.contains(dest) || uses.get(dest) != Some(&1) {
        return None;
    }
    if let Some(position) = use_position(block, index + 1, *dest) {
        return motion_clear(value, &block.statements[index + 1..position])
            .then_some(Site { block: b, position });
    }
    if value.has_side_effects() || value.reads_memory() {
        return None;
    }
    if !motion_clear(value, &block.statements[index + 1..]) {
        return None;
    }
    cfg.block(BlockId(b))
        .successors
        .iter()
        .map(|succ| succ.0)
        .filter(|&succ| succ != b && cfg.block(BlockId(succ)).predecessors.len() == 1)
        .find_map(|succ| {
            let position = use_position(&blocks[succ], 0, *dest)?;
            motion_clear(value, &blocks[succ].statements[..position])
                .then_some(Site { block: succ, position })
        })
}

fn inline_single_uses(
    blocks: &mut [LiftedBlock],
    cfg: &ControlFlowGraph,
    ssa: &SsaForm,
    webs: &FxHashSet<VersionedLocation>,
) -> usize {
    let uses = count_uses(blocks, ssa);
    let mut inlined = 0;
    for b in 0..blocks.len() {
        let mut index = 0;
        while index < blocks[b].statements.len() {
            let Some(site) = inline_site(blocks, cfg, b, index, &uses, webs) else {
                index += 1;
                continue;
            };
            let AstNode::Assign { dest, value, .. } = blocks[b].statements.remove(index) else {
                continue;
            };
            let position = if site.block == b {
                site.position - 1
            } else {
                site.position
            };
            let replace = |expr: &mut Expr| *expr = expr.substitute(dest, &value).reduce();
            let target = &mut blocks[site.block];
            if position < target.statements.len() {
                target.statements[position]
                    .expressions_mut()
                    .into_iter()
                    .for_each(replace);
            } else if let Some(expr) = target.terminator.expression_mut() {
                replace(expr);
            }
            inlined += 1;
        }
    }
    inlined
}

fn remove_dead(blocks: &mut [LiftedBlock], ssa: &SsaForm, webs: &FxHashSet<VersionedLocation>) -> usize {
    let mut removed = 0;
    loop {
        let uses = count_uses(blocks, ssa);
        let mut changed = false;
        for block in blocks.iter_mut() {
            let statements = std::mem::take(&mut block.statements);
            for stmt in statements {
                match stmt {
                    AstNode::Assign {
                        address,
                        dest,
                        value,
                    } if is_register(dest) && !webs.contains(&dest) && !uses.contains_key(&dest) => {
                        changed = true;
                        removed += 1;
                        if value.has_side_effects() {
                            block.statements.push(AstNode::Expression {
                                address,
                                expr: value,
                            });
                        }
                    }
                    stmt => block.statements.push(stmt),
                }
            }
        }
        if !changed {
            return removed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lift::{Terminator, lift};
    use crate::test_support::{BASE, Fixture};
    use mdec_ir::BinaryOp;
    use mdec_isa::{A0, SP, V0, V1, ZERO, asm};

    fn run(fx: &Fixture, words: &[u32], ret: &str, args: &[&str], config: &DecompilerConfig) -> Vec<LiftedBlock> {
        let function = fx.function("f", BASE, words.len(), ret, args);
        let cfg = fx.cfg(words, &function);
        let ssa = SsaForm::build(&cfg, &function);
        let mut blocks = lift(&cfg, &ssa, &function);
        propagate(&mut blocks, &cfg, &ssa, config);
        blocks
    }

    fn a0() -> Expr {
        Expr::value(VersionedLocation::entry(Location::Register(A0)))
    }

    #[test]
    fn test_expression_folds_into_return() {
        let fx = Fixture::new();
        let blocks = run(
            &fx,
            &[asm::addiu(V0, A0, 4), asm::jr(RA), asm::sll(V0, V0, 2)],
            "int",
            &["int"],
            &DecompilerConfig::new(),
        );
        assert!(blocks[0].statements.is_empty());
        assert_eq!(
            blocks[0].terminator,
            Terminator::Return {
                value: Some(Expr::add(Expr::mul(a0(), Expr::imm(4)), Expr::imm(16)))
            }
        );
    }

    #[test]
    fn test_frame_is_elided() {
        let fx = Fixture::new();
        fx.function("helper", 0x0020_0000, 2, "void", &[]);
        let blocks = run(
            &fx,
            &[
                asm::addiu(SP, SP, -16),
                asm::sw(RA, 12, SP),
                asm::jal(0x0020_0000),
                asm::nop(),
                asm::lw(RA, 12, SP),
                asm::jr(RA),
                asm::addiu(SP, SP, 16),
            ],
            "void",
            &[],
            &DecompilerConfig::new(),
        );
        let statements: Vec<&AstNode> = blocks.iter().flat_map(|b| &b.statements).collect();
        assert_eq!(statements.len(), 1);
        assert!(matches!(
            statements[0],
            AstNode::Expression { expr: Expr::Call { .. }, .. }
        ));
    }

    #[test]
    fn test_frame_kept_when_disabled() {
        let fx = Fixture::new();
        let config = DecompilerConfig::new()
            .with_elide_frame(false)
            .with_propagate_expressions(false);
        let blocks = run(
            &fx,
            &[
                asm::addiu(SP, SP, -16),
                asm::sw(RA, 12, SP),
                asm::lw(RA, 12, SP),
                asm::jr(RA),
                asm::addiu(SP, SP, 16),
            ],
            "void",
            &[],
            &config,
        );
        assert_eq!(blocks[0].statements.len(), 4);
        assert!(is_stack_adjust(&blocks[0].statements[0]));
    }

    #[test]
    fn test_load_not_moved_past_store() {
        let fx = Fixture::new();
        let blocks = run(
            &fx,
            &[
                asm::lw(V1, 0, A0),
                asm::sw(ZERO, 0, A0),
                asm::jr(RA),
                asm::mov(V0, V1),
            ],
            "int",
            &["int"],
            &DecompilerConfig::new(),
        );
        let stmts = &blocks[0].statements;
        assert_eq!(stmts.len(), 2);
        let AstNode::Assign { dest, value, .. } = &stmts[0] else {
            panic!("expected the load to stay: {stmts:?}");
        };
        assert_eq!(*value, Expr::load(a0(), 4, true));
        assert!(matches!(&stmts[1], AstNode::Expression { expr: Expr::Store { .. }, .. }));
        assert_eq!(
            blocks[0].terminator,
            Terminator::Return {
                value: Some(Expr::value(*dest))
            }
        );
    }

    #[test]
    fn test_unused_call_result_becomes_expression() {
        let fx = Fixture::new();
        let blocks = run(
            &fx,
            &[asm::jal(0x0030_0000), asm::nop(), asm::jr(RA), asm::nop()],
            "void",
            &[],
            &DecompilerConfig::new(),
        );
        assert!(matches!(
            blocks[0].statements.as_slice(),
            [AstNode::Expression { expr: Expr::Call { .. }, .. }]
        ));
    }

    #[test]
    fn test_loop_web_is_preserved() {
        let fx = Fixture::new();
        let blocks = run(
            &fx,
            &[
                asm::addiu(V0, ZERO, 0),
                asm::addiu(V0, V0, 1),
                asm::bne(V0, A0, -2),
                asm::nop(),
                asm::jr(RA),
                asm::nop(),
            ],
            "int",
            &["int"],
            &DecompilerConfig::new(),
        );
        // Both the initialization and the increment survive.
        assert_eq!(blocks[0].statements.len(), 1);
        assert!(matches!(
            &blocks[1].statements[..],
            [AstNode::Assign { value: Expr::Binary { op: BinaryOp::Add, .. }, .. }]
        ));
    }
}
