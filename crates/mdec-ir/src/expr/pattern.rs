//! Address shape matching.

use super::{BinaryOp, Expr};
use crate::VersionedLocation;

/// `base + offset` with a constant offset.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MemoryReference {
    pub base: Expr,
    pub offset: i64,
}

/// `base + index * element_size + constant`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IndexInfo {
    pub base: Expr,
    pub index: Expr,
    pub element_size: i64,
    pub constant: i64,
    /// Set when the index is a bare SSA value.
    pub index_location: Option<VersionedLocation>,
}

/// Flatten a tree of additions into its terms.
fn add_terms(expr: &Expr, terms: &mut Vec<Expr>) {
    match expr {
        Expr::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => {
            add_terms(left, terms);
            add_terms(right, terms);
        }
        other => terms.push(other.clone()),
    }
}

fn sum(terms: Vec<Expr>) -> Option<Expr> {
    terms.into_iter().reduce(Expr::add)
}

/// Split an address into a non-constant base and a constant displacement.
pub fn extract_memory_reference(address: &Expr) -> Option<MemoryReference> {
    let mut terms = Vec::new();
    add_terms(address, &mut terms);
    let offset = terms.iter().filter_map(Expr::as_imm).sum();
    terms.retain(|term| term.as_imm().is_none());
    let base = sum(terms)?;
    Some(MemoryReference { base, offset })
}

/// Recognize a scaled-index address. Exactly one scaled term must be present
/// alongside a non-constant base.
pub fn get_index_info(address: &Expr) -> Option<IndexInfo> {
    let mut terms = Vec::new();
    add_terms(address, &mut terms);

    let mut scaled = None;
    let mut base_terms = Vec::new();
    let mut constant = 0i64;
    for term in terms {
        match term {
            Expr::Imm(value) => constant = constant.wrapping_add(value),
            Expr::Binary {
                op: BinaryOp::Mul,
                left,
                right,
            } if matches!(right.as_imm(), Some(size) if size > 1) => {
                if scaled.is_some() {
                    return None;
                }
                scaled = Some((*left, right.as_imm().unwrap_or(1)));
            }
            other => base_terms.push(other),
        }
    }

    let (index, element_size) = scaled?;
    let base = sum(base_terms)?;
    let index_location = index.as_value();
    Some(IndexInfo {
        base,
        index,
        element_size,
        constant,
        index_location,
    })
}
