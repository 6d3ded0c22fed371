use super::*;
use crate::{Location, VersionedLocation};
use mdec_isa::{S0, S1, V0};

fn val(reg: mdec_isa::Register, version: u32) -> Expr {
    Expr::value(VersionedLocation::new(Location::Register(reg), version))
}

#[test]
fn test_fold_wraps_to_32_bits() {
    let expr = Expr::add(Expr::imm(0x7FFF_FFFF), Expr::imm(1));
    assert_eq!(expr.reduce(), Expr::imm(-0x8000_0000));
}

#[test]
fn test_fold_unsigned_compare() {
    let expr = Expr::binary(BinaryOp::LtU, Expr::imm(-1), Expr::imm(1));
    assert_eq!(expr.reduce(), Expr::imm(0));
}

#[test]
fn test_division_by_zero_not_folded() {
    let expr = Expr::binary(BinaryOp::Div, Expr::imm(4), Expr::imm(0));
    assert!(matches!(expr.reduce(), Expr::Binary { op: BinaryOp::Div, .. }));
}

#[test]
fn test_constant_moves_right() {
    let x = val(S0, 1);
    let expr = Expr::add(Expr::imm(3), x.clone());
    assert_eq!(expr.reduce(), Expr::add(x, Expr::imm(3)));
}

#[test]
fn test_comparison_mirrored_when_constant_left() {
    let x = val(S0, 1);
    let expr = Expr::lt(Expr::imm(0), x.clone());
    assert_eq!(
        expr.reduce(),
        Expr::binary(BinaryOp::Gt, x, Expr::imm(0))
    );
}

#[test]
fn test_identities() {
    let x = val(S0, 1);
    assert_eq!(Expr::add(x.clone(), Expr::imm(0)).reduce(), x);
    assert_eq!(Expr::mul(x.clone(), Expr::imm(1)).reduce(), x);
    assert_eq!(Expr::mul(x.clone(), Expr::imm(0)).reduce(), Expr::imm(0));
    assert_eq!(Expr::sub(x.clone(), x).reduce(), Expr::imm(0));
}

#[test]
fn test_sub_constant_becomes_add() {
    let x = val(S0, 1);
    let expr = Expr::sub(x.clone(), Expr::imm(4));
    assert_eq!(expr.reduce(), Expr::add(x, Expr::imm(-4)));
}

#[test]
fn test_shift_becomes_multiply() {
    let x = val(S0, 1);
    let expr = Expr::shl(x.clone(), Expr::imm(2));
    assert_eq!(expr.reduce(), Expr::mul(x, Expr::imm(4)));
}

#[test]
fn test_reassociate_constants() {
    let x = val(S0, 1);
    let expr = Expr::add(Expr::add(x.clone(), Expr::imm(4)), Expr::imm(8));
    assert_eq!(expr.reduce(), Expr::add(x, Expr::imm(12)));
}

#[test]
fn test_pull_constant_out_of_sum() {
    let x = val(S0, 1);
    let y = val(S1, 2);
    let expr = Expr::add(Expr::add(x.clone(), Expr::imm(4)), y.clone());
    assert_eq!(expr.reduce(), Expr::add(Expr::add(x, y), Expr::imm(4)));
}

#[test]
fn test_distribute_multiply_over_offset() {
    let x = val(S0, 1);
    let expr = Expr::mul(Expr::add(x.clone(), Expr::imm(1)), Expr::imm(4));
    assert_eq!(
        expr.reduce(),
        Expr::add(Expr::mul(x, Expr::imm(4)), Expr::imm(4))
    );
}

#[test]
fn test_compare_against_zero_collapses() {
    let cmp = Expr::lt(val(S0, 1), val(S1, 1));
    assert_eq!(Expr::ne(cmp.clone(), Expr::imm(0)).reduce(), cmp);
    assert_eq!(
        Expr::eq(cmp, Expr::imm(0)).reduce(),
        Expr::binary(BinaryOp::Ge, val(S0, 1), val(S1, 1))
    );
}

#[test]
fn test_unsigned_zero_less_than_is_nonzero() {
    // sltu v0, zero, s0
    let expr = Expr::binary(BinaryOp::LtU, Expr::imm(0), val(S0, 1));
    let reduced = expr.reduce();
    assert_eq!(reduced, Expr::ne(val(S0, 1), Expr::imm(0)));
    assert_eq!(reduced.reduce(), reduced);
    assert_eq!(
        Expr::binary(BinaryOp::GtU, val(S0, 1), Expr::imm(0)).reduce(),
        reduced
    );
}

#[test]
fn test_negate_condition() {
    let cmp = Expr::binary(BinaryOp::Gt, val(S1, 1), Expr::imm(0));
    assert_eq!(
        negate_condition(&cmp),
        Expr::binary(BinaryOp::Le, val(S1, 1), Expr::imm(0))
    );
    let opaque = val(V0, 3);
    assert_eq!(negate_condition(&opaque), Expr::not(opaque.clone()));
    assert_eq!(negate_condition(&negate_condition(&cmp)), cmp);
}

#[test]
fn test_select_with_constant_condition() {
    let expr = Expr::select(Expr::imm(1), val(S0, 1), val(S1, 1));
    assert_eq!(expr.reduce(), val(S0, 1));
    let expr = Expr::select(Expr::imm(0), val(S0, 1), val(S1, 1));
    assert_eq!(expr.reduce(), val(S1, 1));
}

#[test]
fn test_reduce_is_idempotent() {
    let x = val(S0, 1);
    let y = val(S1, 2);
    let samples = [
        Expr::add(Expr::shl(x.clone(), Expr::imm(2)), y.clone()),
        Expr::sub(Expr::add(Expr::imm(8), x.clone()), Expr::imm(3)),
        Expr::eq(Expr::lt(x.clone(), y.clone()), Expr::imm(0)),
        Expr::load(Expr::add(Expr::add(y.clone(), Expr::imm(4)), x.clone()), 4, true),
        Expr::mul(Expr::add(Expr::mul(x, Expr::imm(2)), Expr::imm(1)), Expr::imm(4)),
    ];
    for expr in samples {
        let once = expr.reduce();
        assert_eq!(once.reduce(), once, "not idempotent: {expr:?}");
    }
}

#[test]
fn test_substitute_and_values() {
    let x = VersionedLocation::new(Location::Register(S0), 1);
    let expr = Expr::add(Expr::value(x), Expr::load(Expr::value(x), 4, true));
    assert_eq!(expr.values(), vec![x, x]);
    let replaced = expr.substitute(x, &Expr::imm(7));
    assert!(replaced.values().is_empty());
    assert!(replaced.reads_memory());
    assert!(!replaced.has_side_effects());
}

#[test]
fn test_unclassified_accesses() {
    let base = val(S0, 1);
    let raw = Expr::load(Expr::add(base.clone(), Expr::imm(4)), 4, true);
    assert_eq!(raw.unclassified_accesses(), 1);
    let field = Expr::load(
        Expr::Field {
            base: Box::new(base),
            offset: 4,
            name: "unk0".to_string(),
        },
        4,
        true,
    );
    assert_eq!(field.unclassified_accesses(), 0);
}

#[test]
fn test_extract_memory_reference() {
    let base = val(S0, 1);
    let reference = extract_memory_reference(&Expr::add(base.clone(), Expr::imm(0x10))).unwrap();
    assert_eq!(reference.base, base);
    assert_eq!(reference.offset, 0x10);
    assert!(extract_memory_reference(&Expr::imm(0x10)).is_none());
}

#[test]
fn test_get_index_info() {
    let base = val(V0, 3);
    let index = VersionedLocation::new(Location::Register(S0), 2);
    let address = Expr::add(Expr::shl(Expr::value(index), Expr::imm(2)), base.clone()).reduce();
    let info = get_index_info(&address).unwrap();
    assert_eq!(info.base, base);
    assert_eq!(info.index, Expr::value(index));
    assert_eq!(info.element_size, 4);
    assert_eq!(info.constant, 0);
    assert_eq!(info.index_location, Some(index));
}

#[test]
fn test_get_index_info_rejects_plain_offset() {
    let address = Expr::add(val(V0, 3), Expr::imm(8));
    assert!(get_index_info(&address).is_none());
}
