//! Control flow structuring.
//!
//! Rebuilds an abstract syntax tree from the CFG and the lifted blocks.
//! Conditionals join at the immediate post-dominator, natural loops become
//! `Loop` nodes with `Break` and `Continue` edges, jump tables become
//! `Switch` nodes. Whatever is left over is reached through `Goto`.

use std::collections::{BTreeMap, BTreeSet};

use mdec_cfg::{BlockExit, BlockId, ControlFlowGraph, DominatorTree};
use mdec_ir::{AstNode, BinaryOp, Expr, LoopKind, SwitchCase, get_index_info, negate_condition};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, debug_span};

use crate::lift::{LiftedBlock, Terminator};

#[derive(Clone, Debug)]
struct LoopInfo {
    body: BTreeSet<usize>,
    exit: Option<usize>,
}

/// Innermost enclosing loop while structuring its body.
#[derive(Clone, Debug)]
struct LoopContext {
    header: usize,
    exit: Option<usize>,
    body: BTreeSet<usize>,
    /// `Break` would leave a switch instead of the loop.
    break_allowed: bool,
}

fn find_loops(cfg: &ControlFlowGraph) -> FxHashMap<usize, LoopInfo> {
    let dom = cfg.dominators();
    let mut latches: BTreeMap<usize, Vec<BlockId>> = BTreeMap::new();
    for (from, header) in cfg.back_edges(&dom) {
        latches.entry(header.0).or_default().push(from);
    }
    latches
        .into_iter()
        .map(|(header, latches)| {
            let body: BTreeSet<usize> = cfg
                .natural_loop(BlockId(header), &latches)
                .into_iter()
                .map(|id| id.0)
                .collect();
            let outside = |index: &usize| {
                cfg.blocks()[*index]
                    .successors
                    .iter()
                    .map(|succ| succ.0)
                    .filter(|succ| !body.contains(succ))
                    .collect::<Vec<_>>()
            };
            // Prefer the header's or a latch's way out.
            let exit = std::iter::once(header)
                .chain(latches.iter().map(|latch| latch.0))
                .flat_map(|index| outside(&index))
                .next()
                .or_else(|| body.iter().flat_map(outside).min());
            (header, LoopInfo { body, exit })
        })
        .collect()
}

fn ends_in_terminal(nodes: &[AstNode]) -> bool {
    matches!(
        nodes.last(),
        Some(AstNode::Return { .. } | AstNode::Break | AstNode::Continue | AstNode::Goto { .. })
    )
}

/// Jump-table slot index from the selector's table load.
fn table_index(selector: Expr) -> Expr {
    let Expr::Load { source, .. } = &selector else {
        return selector;
    };
    if let Some(info) = get_index_info(source) {
        if info.element_size == 4 {
            return info.index;
        }
    }
    // Tables at a constant address: `index * 4 + table`.
    if let Expr::Binary {
        op: BinaryOp::Add,
        left,
        right,
    } = source.as_ref()
    {
        if let (
            Expr::Binary {
                op: BinaryOp::Mul,
                left: index,
                right: scale,
            },
            Some(_),
        ) = (left.as_ref(), right.as_imm())
        {
            if scale.as_imm() == Some(4) {
                return index.as_ref().clone();
            }
        }
    }
    selector
}

fn conditional(condition: Expr, then_body: Vec<AstNode>, else_body: Vec<AstNode>) -> Option<AstNode> {
    match (then_body.is_empty(), else_body.is_empty()) {
        (true, true) => None,
        (true, false) => Some(AstNode::If {
            condition: negate_condition(&condition),
            then_body: else_body,
            else_body: Vec::new(),
        }),
        _ => Some(AstNode::If {
            condition,
            then_body,
            else_body,
        }),
    }
}

struct Structurer<'a> {
    cfg: &'a ControlFlowGraph,
    blocks: Vec<LiftedBlock>,
    post_dom: DominatorTree,
    loops: FxHashMap<usize, LoopInfo>,
    emitted: Vec<bool>,
}

impl Structurer<'_> {
    fn goto(&self, index: usize) -> AstNode {
        AstNode::Goto {
            target: self.cfg.blocks()[index].start,
        }
    }

    /// An exit block only reachable from one place can be emitted inline.
    fn is_inlinable_exit(&self, index: usize) -> bool {
        let block = &self.cfg.blocks()[index];
        !self.emitted[index] && block.is_exit() && block.predecessors.len() == 1
    }

    /// Edge into `index` from inside the loop of `ctx`.
    fn loop_edge(&self, index: usize, ctx: &LoopContext) -> Option<AstNode> {
        if index == ctx.header {
            return Some(AstNode::Continue);
        }
        if Some(index) == ctx.exit {
            return Some(if ctx.break_allowed {
                AstNode::Break
            } else {
                self.goto(index)
            });
        }
        if !ctx.body.contains(&index) && !self.is_inlinable_exit(index) {
            return Some(self.goto(index));
        }
        None
    }

    /// Immediate post-dominator of `index`, if it stays inside the loop.
    fn join(&self, index: usize, ctx: Option<&LoopContext>) -> Option<usize> {
        let join = self.post_dom.idom(index)?;
        match ctx {
            Some(ctx) if !ctx.body.contains(&join) => None,
            _ => Some(join),
        }
    }

    /// Structure the blocks from `start` until `stop`, a terminal, or an edge
    /// leaving the current region.
    fn seq(
        &mut self,
        start: Option<usize>,
        stop: Option<usize>,
        ctx: Option<&LoopContext>,
        allow_header: bool,
        out: &mut Vec<AstNode>,
    ) {
        let mut current = start;
        let mut entering_header = allow_header;
        while let Some(index) = current {
            if Some(index) == stop {
                return;
            }
            let header_of_ctx = std::mem::take(&mut entering_header);
            if !header_of_ctx {
                if let Some(edge) = ctx.and_then(|ctx| self.loop_edge(index, ctx)) {
                    out.push(edge);
                    return;
                }
            }
            if self.emitted[index] {
                out.push(self.goto(index));
                return;
            }
            current = if !header_of_ctx && self.loops.contains_key(&index) {
                self.structure_loop(index, out)
            } else {
                self.emit_block(index, ctx, out)
            };
        }
    }

    fn structure_loop(&mut self, header: usize, out: &mut Vec<AstNode>) -> Option<usize> {
        let info = self.loops.get(&header)?.clone();
        let ctx = LoopContext {
            header,
            exit: info.exit,
            body: info.body,
            break_allowed: true,
        };
        let mut body = Vec::new();
        self.seq(Some(header), None, Some(&ctx), true, &mut body);
        out.push(AstNode::Loop {
            kind: LoopKind::Infinite,
            condition: None,
            body,
        });
        info.exit
    }

    fn arm(&mut self, target: Option<usize>, join: Option<usize>, ctx: Option<&LoopContext>) -> Vec<AstNode> {
        let mut nodes = Vec::new();
        if target != join {
            self.seq(target, join, ctx, false, &mut nodes);
        }
        nodes
    }

    /// Emit block `index` and return where the enclosing sequence continues.
    fn emit_block(&mut self, index: usize, ctx: Option<&LoopContext>, out: &mut Vec<AstNode>) -> Option<usize> {
        let cfg = self.cfg;
        let block = &cfg.blocks()[index];
        self.emitted[index] = true;
        out.push(AstNode::Label {
            address: block.start,
        });
        out.append(&mut self.blocks[index].statements);
        let terminator = std::mem::replace(&mut self.blocks[index].terminator, Terminator::None);
        match (&block.exit, terminator) {
            (BlockExit::Branch {
                taken, not_taken, ..
            }, terminator) => {
                let condition = match terminator {
                    Terminator::Branch { condition } => condition,
                    _ => Expr::imm(1),
                };
                let join = self.join(index, ctx);
                let then_body = self.arm(Some(taken.0), join, ctx);
                let else_body = self.arm(not_taken.map(|id| id.0), join, ctx);
                out.extend(conditional(condition, then_body, else_body));
                join
            }
            (BlockExit::JumpTable { targets }, terminator) => {
                let selector = match terminator {
                    Terminator::Switch { selector } => selector,
                    _ => Expr::imm(0),
                };
                self.structure_switch(index, targets, selector, ctx, out)
            }
            (_, Terminator::Return { value }) => {
                out.push(AstNode::Return { value });
                None
            }
            (BlockExit::Return | BlockExit::TailCall { .. } | BlockExit::End, _) => None,
            _ => block.successors.first().map(|succ| succ.0),
        }
    }

    fn structure_switch(
        &mut self,
        index: usize,
        targets: &[BlockId],
        selector: Expr,
        ctx: Option<&LoopContext>,
        out: &mut Vec<AstNode>,
    ) -> Option<usize> {
        let join = self.join(index, ctx);
        let case_ctx = ctx.map(|ctx| LoopContext {
            break_allowed: false,
            ..ctx.clone()
        });
        let mut seen = FxHashSet::default();
        let mut cases = Vec::with_capacity(targets.len());
        for (slot, target) in targets.iter().enumerate() {
            let target = target.0;
            let mut body = Vec::new();
            if Some(target) == join {
                body.push(AstNode::Break);
            } else if !seen.insert(target) || self.emitted[target] {
                body.push(self.goto(target));
            } else {
                self.seq(Some(target), join, case_ctx.as_ref(), false, &mut body);
                if !ends_in_terminal(&body) {
                    body.push(AstNode::Break);
                }
            }
            cases.push(SwitchCase { index: slot, body });
        }
        out.push(AstNode::Switch {
            selector: table_index(selector),
            cases,
        });
        join
    }
}

fn prune_labels(root: &mut AstNode) {
    let mut targets = FxHashSet::default();
    root.walk(&mut |node| {
        if let AstNode::Goto { target } = node {
            targets.insert(*target);
        }
    });
    root.walk_mut(&mut |node| {
        for body in node.bodies_mut() {
            body.retain(|node| !matches!(node, AstNode::Label { address } if !targets.contains(address)));
        }
    });
}

fn is_break(nodes: &[AstNode]) -> bool {
    matches!(nodes, [AstNode::Break])
}

/// `if (c) { T } else { break; }` becomes `if (!c) { break; } T`.
fn hoist_break(node: AstNode, out: &mut Vec<AstNode>) {
    match node {
        AstNode::If {
            condition,
            then_body,
            else_body,
        } if is_break(&else_body) && !then_body.is_empty() => {
            out.push(AstNode::If {
                condition: negate_condition(&condition),
                then_body: else_body,
                else_body: Vec::new(),
            });
            out.extend(then_body);
        }
        AstNode::If {
            condition,
            then_body,
            else_body,
        } if is_break(&then_body) && !else_body.is_empty() => {
            out.push(AstNode::If {
                condition,
                then_body,
                else_body: Vec::new(),
            });
            out.extend(else_body);
        }
        other => out.push(other),
    }
}

/// Condition of an `if (c) { break; }` node.
fn break_condition(node: &AstNode) -> Option<&Expr> {
    match node {
        AstNode::If {
            condition,
            then_body,
            else_body,
        } if is_break(then_body) && else_body.is_empty() => Some(condition),
        _ => None,
    }
}

/// `Continue` statements that belong to this loop rather than a nested one.
fn has_own_continue(nodes: &[AstNode]) -> bool {
    nodes.iter().any(|node| match node {
        AstNode::Continue => true,
        AstNode::Loop { .. } => false,
        other => other.bodies().into_iter().any(|body| has_own_continue(body)),
    })
}

/// Pick the loop form from the shape of an infinite loop's body.
fn shape_loop(body: Vec<AstNode>) -> AstNode {
    let mut nodes = Vec::with_capacity(body.len());
    for node in body {
        hoist_break(node, &mut nodes);
    }
    if matches!(nodes.last(), Some(AstNode::Continue)) {
        nodes.pop();
    }
    if let Some(condition) = nodes.first().and_then(break_condition) {
        let condition = negate_condition(condition);
        nodes.remove(0);
        return AstNode::Loop {
            kind: LoopKind::While,
            condition: Some(condition),
            body: nodes,
        };
    }
    if let Some(condition) = nodes.last().and_then(break_condition) {
        let condition = negate_condition(condition);
        if !has_own_continue(&nodes) {
            nodes.pop();
            return AstNode::Loop {
                kind: LoopKind::DoWhile,
                condition: Some(condition),
                body: nodes,
            };
        }
    }
    AstNode::Loop {
        kind: LoopKind::Infinite,
        condition: None,
        body: nodes,
    }
}

fn normalize_loops(node: &mut AstNode) {
    for body in node.bodies_mut() {
        for child in body.iter_mut() {
            normalize_loops(child);
        }
    }
    if let AstNode::Loop {
        kind: LoopKind::Infinite,
        condition: None,
        body,
    } = node
    {
        *node = shape_loop(std::mem::take(body));
    }
}

/// Structure `blocks` into a single `Block` node.
pub fn structure(cfg: &ControlFlowGraph, blocks: Vec<LiftedBlock>) -> AstNode {
    let _span = debug_span!("structure", blocks = blocks.len()).entered();
    let loops = find_loops(cfg);
    let mut structurer = Structurer {
        cfg,
        emitted: vec![false; blocks.len()],
        blocks,
        post_dom: cfg.post_dominators(),
        loops,
    };
    let mut body = Vec::new();
    if !cfg.is_empty() {
        structurer.seq(Some(cfg.entry().0), None, None, false, &mut body);
    }
    // Goto targets nothing else reached.
    for index in 0..structurer.blocks.len() {
        if structurer.blocks[index].reachable && !structurer.emitted[index] {
            structurer.seq(Some(index), None, None, false, &mut body);
        }
    }
    let mut root = AstNode::Block { body };
    prune_labels(&mut root);
    normalize_loops(&mut root);
    if let AstNode::Block { body } = &mut root {
        if matches!(body.last(), Some(AstNode::Return { value: None })) {
            body.pop();
        }
    }
    debug!(
        loops = structurer.loops.len(),
        nodes = root.count(),
        "structured"
    );
    root
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::DecompilerConfig;
    use crate::lift::lift;
    use crate::propagate::propagate;
    use crate::ssa::SsaForm;
    use crate::test_support::{BASE, Fixture};
    use mdec_cfg::{MemoryImage, MemoryReader, TableJumpResolver};
    use mdec_ir::{Location, VersionedLocation};
    use mdec_isa::{A0, A1, AT, RA, V0, ZERO, asm, decode_all};

    fn structure_cfg(cfg: &ControlFlowGraph, function: &mdec_types::Function) -> AstNode {
        let ssa = SsaForm::build(cfg, function);
        let mut blocks = lift(cfg, &ssa, function);
        propagate(&mut blocks, cfg, &ssa, &DecompilerConfig::new());
        structure(cfg, blocks)
    }

    fn run(fx: &Fixture, words: &[u32], ret: &str, args: &[&str]) -> Vec<AstNode> {
        let function = fx.function("f", BASE, words.len(), ret, args);
        let cfg = fx.cfg(words, &function);
        let AstNode::Block { body } = structure_cfg(&cfg, &function) else {
            panic!("root is not a block");
        };
        body
    }

    fn value(reg: mdec_isa::Register, version: u32) -> Expr {
        Expr::value(VersionedLocation::new(Location::Register(reg), version))
    }

    #[test]
    fn test_if_then() {
        let fx = Fixture::new();
        let body = run(
            &fx,
            &[
                asm::beq(A0, ZERO, 2),
                asm::nop(),
                asm::sw(ZERO, 0, A1),
                asm::jr(RA),
                asm::nop(),
            ],
            "void",
            &["int", "int"],
        );
        assert_eq!(body.len(), 1, "{body:?}");
        let AstNode::If {
            condition,
            then_body,
            else_body,
        } = &body[0]
        else {
            panic!("expected if: {body:?}");
        };
        assert_eq!(*condition, Expr::ne(value(A0, 0), Expr::imm(0)));
        assert!(matches!(
            then_body.as_slice(),
            [AstNode::Expression { expr: Expr::Store { .. }, .. }]
        ));
        assert!(else_body.is_empty());
    }

    #[test]
    fn test_do_while_loop() {
        let fx = Fixture::new();
        let body = run(
            &fx,
            &[
                asm::addiu(V0, ZERO, 0),
                asm::addiu(V0, V0, 1),
                asm::bne(V0, A1, -2),
                asm::nop(),
                asm::jr(RA),
                asm::nop(),
            ],
            "int",
            &["int", "int"],
        );
        assert_eq!(body.len(), 3, "{body:?}");
        let AstNode::Loop {
            kind,
            condition,
            body: loop_body,
        } = &body[1]
        else {
            panic!("expected loop: {body:?}");
        };
        assert_eq!(*kind, LoopKind::DoWhile);
        assert_eq!(*condition, Some(Expr::ne(value(V0, 3), value(A1, 0))));
        assert_eq!(loop_body.len(), 1);
        assert_eq!(
            body[2],
            AstNode::Return {
                value: Some(value(V0, 3))
            }
        );
    }

    #[test]
    fn test_while_loop() {
        let fx = Fixture::new();
        let body = run(
            &fx,
            &[
                asm::beq(A0, ZERO, 4),
                asm::nop(),
                asm::addiu(A0, A0, -1),
                asm::b(-4),
                asm::nop(),
                asm::jr(RA),
                asm::nop(),
            ],
            "void",
            &["int"],
        );
        assert_eq!(body.len(), 1, "{body:?}");
        assert!(matches!(
            &body[0],
            AstNode::Loop {
                kind: LoopKind::While,
                condition: Some(Expr::Binary { op: BinaryOp::Ne, .. }),
                body,
            } if body.len() == 1
        ));
    }

    #[test]
    fn test_return_inside_loop_is_inlined() {
        let fx = Fixture::new();
        let body = run(
            &fx,
            &[
                asm::beq(A0, ZERO, 6), // 0 -> 7
                asm::nop(),
                asm::beq(A1, A0, 6), // 2 -> 9
                asm::nop(),
                asm::addiu(A0, A0, -1),
                asm::b(-6), // 5 -> 0
                asm::nop(),
                asm::jr(RA), // 7
                asm::addiu(V0, ZERO, 0),
                asm::jr(RA), // 9
                asm::addiu(V0, ZERO, 1),
            ],
            "int",
            &["int", "int"],
        );
        let mut gotos = 0;
        let mut returns = 0;
        for node in &body {
            node.walk(&mut |node| match node {
                AstNode::Goto { .. } => gotos += 1,
                AstNode::Return { .. } => returns += 1,
                _ => {}
            });
        }
        assert_eq!(gotos, 0, "{body:?}");
        assert_eq!(returns, 2);
        assert!(matches!(
            &body[0],
            AstNode::Loop {
                kind: LoopKind::While,
                ..
            }
        ));
    }

    /// Bounds-checked dispatch at 0x1000 over a 3-entry table at 0x2000.
    #[test]
    fn test_switch() {
        let fx = Fixture::new();
        let mut words = vec![
            asm::sltiu(AT, A0, 3),
            asm::beq(AT, ZERO, 8),
            asm::sll(V0, A0, 2),
            asm::lui(AT, 0),
            asm::addu(AT, AT, V0),
            asm::lw(V0, 0x2000, AT),
            asm::jr(V0),
            asm::nop(),
            asm::jr(RA),
            asm::addiu(V0, ZERO, 1),
            asm::jr(RA),
            asm::addiu(V0, ZERO, 2),
        ];
        let code = words.len();
        words.resize(0x400, 0);
        words.extend([0x1020, 0x1028, 0x1028]);
        let memory: Arc<dyn MemoryReader> = Arc::new(MemoryImage::from_words(0x1000, &words));
        let function = fx.function("dispatch", 0x1000, code, "int", &["int"]);
        let mut cfg = ControlFlowGraph::build(
            &decode_all(&words[..code], 0x1000),
            &TableJumpResolver::new(memory),
        )
        .unwrap();
        cfg.post_process(&function, &fx.registry);
        let root = structure_cfg(&cfg, &function);

        let mut switches = Vec::new();
        root.walk(&mut |node| {
            if let AstNode::Switch { selector, cases } = node {
                switches.push((selector.clone(), cases.clone()));
            }
        });
        assert_eq!(switches.len(), 1, "{root:?}");
        let (selector, cases) = &switches[0];
        assert_eq!(*selector, value(A0, 0));
        assert_eq!(cases.len(), 3);
        assert_eq!(
            cases[0].body,
            vec![AstNode::Return {
                value: Some(Expr::imm(1))
            }]
        );
        assert_eq!(cases[1].body, vec![AstNode::Goto { target: 0x1028 }]);
        assert_eq!(cases[2].body, cases[1].body);
    }
}
