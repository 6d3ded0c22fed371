//! Scaled-index memory accesses to array elements.

use mdec_ir::{AstNode, Expr, get_index_info};

use super::{Analysis, AnalysisContext, default_to_int};
use crate::error::{Error, Result};

/// Rewrites `load/store(base + index * size + c)` into an `Index` address
/// when `size` is the access width.
///
/// The index must be a variable or an SSA value. A value is promoted and,
/// when its type is unknown, typed as `int`. Any other index shape is left
/// alone.
pub struct ArrayAccessPass;

impl Analysis for ArrayAccessPass {
    fn name(&self) -> &'static str {
        "array_access"
    }

    fn analyze(&self, node: &mut AstNode, ctx: &mut AnalysisContext<'_>) -> Result<bool> {
        let mut changed = false;
        for expr in node.expressions_mut() {
            let mut failure = None;
            let rewritten = expr.transform(&mut |sub| match sub {
                Expr::Load {
                    source,
                    size,
                    signed,
                } => {
                    let address = classify(source, *size, ctx, &mut failure)?;
                    Some(Expr::load(address, *size, *signed))
                }
                Expr::Store { dest, source, size } => {
                    let address = classify(dest, *size, ctx, &mut failure)?;
                    Some(Expr::store(address, (**source).clone(), *size))
                }
                _ => None,
            });
            if let Some(err) = failure {
                return Err(err);
            }
            if rewritten != *expr {
                *expr = rewritten;
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// `Index` address for an access of `size` bytes at `address`.
fn classify(
    address: &Expr,
    size: u8,
    ctx: &mut AnalysisContext<'_>,
    failure: &mut Option<Error>,
) -> Option<Expr> {
    if matches!(address, Expr::Index { .. } | Expr::Field { .. }) {
        return None;
    }
    let info = get_index_info(address)?;
    if info.element_size != i64::from(size) {
        return None;
    }
    let index = match info.index {
        Expr::Variable(id) => Expr::Variable(id),
        Expr::Value(vloc) => {
            let id = ctx.variables.promote_version_to_variable(vloc);
            if let Err(err) = default_to_int(id, ctx) {
                *failure = Some(err);
                return None;
            }
            Expr::Variable(id)
        }
        _ => return None,
    };
    Some(Expr::Index {
        base: Box::new(info.base),
        index: Box::new(index),
        scale: size,
        offset: info.constant,
    })
}
