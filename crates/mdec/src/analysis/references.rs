//! Promoted values become variable references.

use mdec_ir::{AstNode, Expr};

use super::{Analysis, AnalysisContext};
use crate::error::Result;

/// Replaces every SSA value that belongs to a promoted variable with a
/// reference to that variable.
pub struct VariableReferencePass;

impl Analysis for VariableReferencePass {
    fn name(&self) -> &'static str {
        "variable_reference"
    }

    fn analyze(&self, node: &mut AstNode, ctx: &mut AnalysisContext<'_>) -> Result<bool> {
        let mut changed = false;
        for expr in node.expressions_mut() {
            let promoted = expr
                .values()
                .into_iter()
                .any(|vloc| ctx.variables.variable_of(vloc).is_some());
            if !promoted {
                continue;
            }
            *expr = expr.transform(&mut |sub| match sub {
                Expr::Value(vloc) => ctx.variables.variable_of(*vloc).map(Expr::Variable),
                _ => None,
            });
            changed = true;
        }
        Ok(changed)
    }
}
