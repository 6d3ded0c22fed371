//! Structure member accesses through typed pointers.

use mdec_ir::{AstNode, Expr, VersionedLocation, extract_memory_reference};
use mdec_types::{StructField, TypeId};

use super::{Analysis, AnalysisContext};
use crate::error::Result;

/// Rewrites `load/store(p + c)` into a `Field` address when `p` is a
/// variable of pointer-to-structure type with a member starting at `c`.
///
/// A register assigned from a pointer member is promoted and given the
/// member's type, so accesses through it resolve as well.
pub struct FieldAccessPass;

impl Analysis for FieldAccessPass {
    fn name(&self) -> &'static str {
        "field_access"
    }

    fn analyze(&self, node: &mut AstNode, ctx: &mut AnalysisContext<'_>) -> Result<bool> {
        let mut changed = false;
        for expr in node.expressions_mut() {
            let rewritten = expr.transform(&mut |sub| match sub {
                Expr::Load {
                    source,
                    size,
                    signed,
                } => member_address(source, ctx).map(|address| Expr::load(address, *size, *signed)),
                Expr::Store { dest, source, size } => {
                    member_address(dest, ctx).map(|address| Expr::store(address, (**source).clone(), *size))
                }
                _ => None,
            });
            if rewritten != *expr {
                *expr = rewritten;
                changed = true;
            }
        }
        if let AstNode::Assign { dest, value, .. } = node {
            if let Some(ty) = loaded_pointer(value, ctx) {
                changed |= type_destination(*dest, ty, ctx);
            }
        }
        Ok(changed)
    }
}

/// Declared type of the variable behind `expr`.
fn variable_type(expr: &Expr, ctx: &AnalysisContext<'_>) -> Option<TypeId> {
    let id = match expr {
        Expr::Variable(id) => *id,
        Expr::Value(vloc) => ctx.variables.variable_of(*vloc)?,
        _ => return None,
    };
    ctx.variables.variable(id)?.data_type
}

fn member(base: &Expr, offset: i64, ctx: &AnalysisContext<'_>) -> Option<StructField> {
    let offset = u32::try_from(offset).ok()?;
    let structure = ctx.types.pointee_structure(variable_type(base, ctx)?)?;
    structure.structure()?.field_at(offset).cloned()
}

fn member_address(address: &Expr, ctx: &AnalysisContext<'_>) -> Option<Expr> {
    if matches!(address, Expr::Index { .. } | Expr::Field { .. }) {
        return None;
    }
    let reference = extract_memory_reference(address)?;
    let field = member(&reference.base, reference.offset, ctx)?;
    Some(Expr::Field {
        base: Box::new(reference.base),
        offset: reference.offset,
        name: field.name,
    })
}

/// Pointer type of the member read by `value`, when `value` is such a read.
fn loaded_pointer(value: &Expr, ctx: &AnalysisContext<'_>) -> Option<TypeId> {
    let Expr::Load { source, .. } = value else {
        return None;
    };
    let Expr::Field { base, offset, .. } = source.as_ref() else {
        return None;
    };
    let field = member(base, *offset, ctx)?;
    let ty = ctx.types.get_type(field.type_id).ok()?;
    ty.pointee().map(|_| field.type_id)
}

fn type_destination(dest: VersionedLocation, ty: TypeId, ctx: &mut AnalysisContext<'_>) -> bool {
    let fresh = ctx.variables.variable_of(dest).is_none();
    let id = ctx.variables.promote_version_to_variable(dest);
    let untyped = ctx.variables.variable(id).is_some_and(|var| var.data_type.is_none());
    if untyped {
        ctx.variables.set_type(id, ty);
    }
    fresh || untyped
}
