//! Loop induction variables.

use mdec_ir::{AstNode, BinaryOp, Expr, VersionedLocation};

use super::{Analysis, AnalysisContext, default_to_int};
use crate::error::Result;

const INDUCTION_NAMES: [&str; 6] = ["i", "j", "k", "l", "m", "n"];

/// Promotes the web of every `x = x + c` update inside a loop body, names
/// it `i`, `j`, `k`, ... and types it `int`. Nested loops are handled when
/// their own node is visited.
pub struct LoopVariablePass;

impl Analysis for LoopVariablePass {
    fn name(&self) -> &'static str {
        "loop_variable"
    }

    fn analyze(&self, node: &mut AstNode, ctx: &mut AnalysisContext<'_>) -> Result<bool> {
        let AstNode::Loop { body, .. } = node else {
            return Ok(false);
        };
        let mut updates = Vec::new();
        collect_updates(body, ctx, &mut updates);

        let mut changed = false;
        for dest in updates {
            changed |= ctx.variables.variable_of(dest).is_none();
            let id = ctx.variables.promote_version_to_variable(dest);
            if ctx.variables.has_default_name(id) {
                let name = next_name(ctx);
                ctx.variables.set_name(id, &name);
                changed = true;
            }
            changed |= default_to_int(id, ctx)?;
        }
        Ok(changed)
    }
}

/// Destinations of induction updates in `body`, outside nested loops.
fn collect_updates(body: &[AstNode], ctx: &AnalysisContext<'_>, out: &mut Vec<VersionedLocation>) {
    for node in body {
        match node {
            AstNode::Loop { .. } => {}
            AstNode::Assign { dest, value, .. } => {
                if is_increment(*dest, value, ctx) && !out.contains(dest) {
                    out.push(*dest);
                }
            }
            other => {
                for nested in other.bodies() {
                    collect_updates(nested, ctx, out);
                }
            }
        }
    }
}

/// `value` is `dest' + c` where `dest'` shares a phi web with `dest`.
fn is_increment(dest: VersionedLocation, value: &Expr, ctx: &AnalysisContext<'_>) -> bool {
    let Expr::Binary {
        op: BinaryOp::Add,
        left,
        right,
    } = value
    else {
        return false;
    };
    if right.as_imm().is_none() {
        return false;
    }
    match left.as_ref() {
        Expr::Value(source) => {
            *source != dest && ctx.ssa.congruence_class(dest).contains(source)
        }
        Expr::Variable(id) => ctx.variables.variable_of(dest) == Some(*id),
        _ => false,
    }
}

fn next_name(ctx: &AnalysisContext<'_>) -> String {
    INDUCTION_NAMES
        .iter()
        .map(|name| (*name).to_string())
        .chain((1..).map(|n| format!("i{n}")))
        .find(|name| !ctx.variables.is_name_taken(name))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::SsaForm;
    use crate::test_support::{BASE, Fixture, array_sum, synthesize};
    use crate::vars::VariableDatabase;
    use mdec_ir::{Location, LoopKind};
    use mdec_isa::V1;

    fn first_loop(root: &mut AstNode) -> &mut AstNode {
        let AstNode::Block { body } = root else {
            panic!("root is not a block");
        };
        body.iter_mut()
            .find(|node| matches!(node, AstNode::Loop { .. }))
            .unwrap()
    }

    #[test]
    fn test_counter_is_named_and_typed() {
        let fx = Fixture::new();
        let words = array_sum();
        let function = fx.function("sum", BASE, words.len(), "int", &["int*", "int"]);
        let (ssa, mut root) = synthesize(&fx, &words, &function);
        let mut variables = VariableDatabase::with_parameters(&ssa, &function, &fx.types).unwrap();
        let mut ctx = AnalysisContext {
            types: &fx.types,
            ssa: &ssa,
            variables: &mut variables,
        };
        let node = first_loop(&mut root);
        assert!(matches!(node, AstNode::Loop { kind: LoopKind::DoWhile, .. }));
        assert!(LoopVariablePass.analyze(node, &mut ctx).unwrap());
        assert!(!LoopVariablePass.analyze(node, &mut ctx).unwrap());

        let counter = ssa.versions(Location::Register(V1));
        let var = variables
            .get_variable_with_version(Location::Register(V1), counter[0])
            .unwrap();
        assert_eq!(var.name, "i");
        assert_eq!(var.data_type, Some(fx.ty("int")));
        assert_eq!(var.versions.len(), counter.len());
    }

    #[test]
    fn test_accumulator_is_not_an_induction() {
        let fx = Fixture::new();
        let words = array_sum();
        let function = fx.function("sum", BASE, words.len(), "int", &["int*", "int"]);
        let (ssa, mut root) = synthesize(&fx, &words, &function);
        let mut variables = VariableDatabase::with_parameters(&ssa, &function, &fx.types).unwrap();
        let mut ctx = AnalysisContext {
            types: &fx.types,
            ssa: &ssa,
            variables: &mut variables,
        };
        LoopVariablePass.analyze(first_loop(&mut root), &mut ctx).unwrap();
        // Parameters plus the counter web.
        assert_eq!(variables.len(), 3);
    }

    #[test]
    fn test_non_loop_nodes_are_ignored() {
        let fx = Fixture::new();
        let words = array_sum();
        let function = fx.function("sum", BASE, words.len(), "int", &["int*", "int"]);
        let cfg = fx.cfg(&words, &function);
        let ssa = SsaForm::build(&cfg, &function);
        let mut variables = VariableDatabase::new(&ssa);
        let mut ctx = AnalysisContext {
            types: &fx.types,
            ssa: &ssa,
            variables: &mut variables,
        };
        let mut node = AstNode::Break;
        assert!(!LoopVariablePass.analyze(&mut node, &mut ctx).unwrap());
    }
}
