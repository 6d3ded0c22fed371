//! Algebraic simplification.

use super::{BinaryOp, Expr, UnaryOp};

/// Wrap to the 32-bit register width used by the integer pipeline.
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
const fn wrap32(value: i64) -> i64 {
    value as i32 as i64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn as_u32(value: i64) -> u32 {
    value as u32
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
fn fold_binary(op: BinaryOp, l: i64, r: i64) -> Option<i64> {
    let shift = (r & 0x1F) as u32;
    let value = match op {
        BinaryOp::Add => wrap32(l.wrapping_add(r)),
        BinaryOp::Sub => wrap32(l.wrapping_sub(r)),
        BinaryOp::Mul => wrap32(l.wrapping_mul(r)),
        BinaryOp::MulHigh => wrap32((wrap32(l) * wrap32(r)) >> 32),
        BinaryOp::MulHighU => wrap32(((u64::from(as_u32(l)) * u64::from(as_u32(r))) >> 32) as i64),
        BinaryOp::Div if wrap32(r) != 0 => wrap32(wrap32(l).wrapping_div(wrap32(r))),
        BinaryOp::Rem if wrap32(r) != 0 => wrap32(wrap32(l).wrapping_rem(wrap32(r))),
        BinaryOp::DivU if as_u32(r) != 0 => wrap32(i64::from(as_u32(l) / as_u32(r))),
        BinaryOp::RemU if as_u32(r) != 0 => wrap32(i64::from(as_u32(l) % as_u32(r))),
        BinaryOp::And => wrap32(l & r),
        BinaryOp::Or => wrap32(l | r),
        BinaryOp::Xor => wrap32(l ^ r),
        BinaryOp::Shl => wrap32(i64::from(as_u32(l) << shift)),
        BinaryOp::Shr => wrap32(i64::from(as_u32(l) >> shift)),
        BinaryOp::Sar => i64::from((l as i32) >> shift),
        BinaryOp::Eq => i64::from(wrap32(l) == wrap32(r)),
        BinaryOp::Ne => i64::from(wrap32(l) != wrap32(r)),
        BinaryOp::Lt => i64::from(wrap32(l) < wrap32(r)),
        BinaryOp::Le => i64::from(wrap32(l) <= wrap32(r)),
        BinaryOp::Gt => i64::from(wrap32(l) > wrap32(r)),
        BinaryOp::Ge => i64::from(wrap32(l) >= wrap32(r)),
        BinaryOp::LtU => i64::from(as_u32(l) < as_u32(r)),
        BinaryOp::LeU => i64::from(as_u32(l) <= as_u32(r)),
        BinaryOp::GtU => i64::from(as_u32(l) > as_u32(r)),
        BinaryOp::GeU => i64::from(as_u32(l) >= as_u32(r)),
        _ => return None,
    };
    Some(value)
}

impl Expr {
    /// Simplify into canonical form. Never mutates `self`; idempotent.
    #[must_use]
    pub fn reduce(&self) -> Self {
        match self {
            Self::Imm(_) | Self::Value(_) | Self::Variable(_) | Self::StackAddress(_) => {
                self.clone()
            }
            Self::Load {
                source,
                size,
                signed,
            } => Self::load(source.reduce(), *size, *signed),
            Self::Store { dest, source, size } => {
                Self::store(dest.reduce(), source.reduce(), *size)
            }
            Self::Unary { op, expr } => reduce_unary(*op, expr.reduce()),
            Self::Binary { op, left, right } => reduce_binary(*op, left.reduce(), right.reduce()),
            Self::Select {
                condition,
                then,
                otherwise,
            } => {
                let condition = condition.reduce();
                match condition.as_imm() {
                    Some(0) => otherwise.reduce(),
                    Some(_) => then.reduce(),
                    None => Self::select(condition, then.reduce(), otherwise.reduce()),
                }
            }
            Self::Call { target, args } => {
                Self::call(target.reduce(), args.iter().map(Self::reduce).collect())
            }
            Self::Index {
                base,
                index,
                scale,
                offset,
            } => Self::Index {
                base: Box::new(base.reduce()),
                index: Box::new(index.reduce()),
                scale: *scale,
                offset: *offset,
            },
            Self::Field { base, offset, name } => Self::Field {
                base: Box::new(base.reduce()),
                offset: *offset,
                name: name.clone(),
            },
            Self::Intrinsic { name, args } => Self::Intrinsic {
                name: name.clone(),
                args: args.iter().map(Self::reduce).collect(),
            },
        }
    }
}

/// Logical negation of a condition, reduced.
pub fn negate_condition(condition: &Expr) -> Expr {
    reduce_unary(UnaryOp::LogicalNot, condition.reduce())
}

fn reduce_unary(op: UnaryOp, expr: Expr) -> Expr {
    match (op, expr) {
        (UnaryOp::Neg, Expr::Imm(v)) => Expr::Imm(wrap32(v.wrapping_neg())),
        (UnaryOp::Not, Expr::Imm(v)) => Expr::Imm(wrap32(!v)),
        (UnaryOp::LogicalNot, Expr::Imm(v)) => Expr::Imm(i64::from(v == 0)),
        (
            UnaryOp::Neg | UnaryOp::Not | UnaryOp::FNeg,
            Expr::Unary {
                op: inner,
                expr: operand,
            },
        ) if inner == op => *operand,
        (
            UnaryOp::LogicalNot,
            Expr::Unary {
                op: UnaryOp::LogicalNot,
                expr: operand,
            },
        ) if operand.is_comparison() => *operand,
        (UnaryOp::LogicalNot, Expr::Binary { op, left, right }) if op.inverse().is_some() => {
            let inverse = op.inverse().unwrap_or(op);
            reduce_binary(inverse, *left, *right)
        }
        (op, expr) => Expr::unary(op, expr),
    }
}

fn reduce_binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    if let (Some(l), Some(r)) = (left.as_imm(), right.as_imm()) {
        if let Some(value) = fold_binary(op, l, r) {
            return Expr::Imm(value);
        }
    }

    // Constants to the right.
    let (op, left, right) = if left.as_imm().is_some() && right.as_imm().is_none() {
        if op.is_commutative() {
            (op, right, left)
        } else if op.is_comparison() && !matches!(op, BinaryOp::FLt | BinaryOp::FLe) {
            (op.mirrored(), right, left)
        } else {
            (op, left, right)
        }
    } else {
        (op, left, right)
    };

    let Some(c) = right.as_imm() else {
        return reduce_non_constant(op, left, right);
    };

    match op {
        BinaryOp::Add => {
            if c == 0 {
                return left;
            }
            match left {
                // (x + c1) + c
                Expr::Binary {
                    op: BinaryOp::Add,
                    left: inner,
                    right: inner_c,
                } if inner_c.as_imm().is_some() => {
                    let sum = wrap32(inner_c.as_imm().unwrap_or(0).wrapping_add(c));
                    reduce_binary(BinaryOp::Add, *inner, Expr::Imm(sum))
                }
                left => Expr::add(left, Expr::Imm(c)),
            }
        }
        BinaryOp::Sub => reduce_binary(BinaryOp::Add, left, Expr::Imm(wrap32(c.wrapping_neg()))),
        BinaryOp::Mul => match c {
            0 if !left.has_side_effects() => Expr::Imm(0),
            1 => left,
            _ => match left {
                // (x * c1) * c
                Expr::Binary {
                    op: BinaryOp::Mul,
                    left: inner,
                    right: inner_c,
                } if inner_c.as_imm().is_some() => {
                    let product = wrap32(inner_c.as_imm().unwrap_or(1).wrapping_mul(c));
                    reduce_binary(BinaryOp::Mul, *inner, Expr::Imm(product))
                }
                // (x + c1) * c
                Expr::Binary {
                    op: BinaryOp::Add,
                    left: inner,
                    right: inner_c,
                } if inner_c.as_imm().is_some() => {
                    let scaled = wrap32(inner_c.as_imm().unwrap_or(0).wrapping_mul(c));
                    let product = reduce_binary(BinaryOp::Mul, *inner, Expr::Imm(c));
                    reduce_binary(BinaryOp::Add, product, Expr::Imm(scaled))
                }
                left => Expr::mul(left, Expr::Imm(c)),
            },
        },
        BinaryOp::Shl if (0..32).contains(&c) => {
            if c == 0 {
                left
            } else {
                reduce_binary(BinaryOp::Mul, left, Expr::Imm(1i64 << c))
            }
        }
        BinaryOp::Shr | BinaryOp::Sar | BinaryOp::Or | BinaryOp::Xor if c == 0 => left,
        BinaryOp::And if c == 0 && !left.has_side_effects() => Expr::Imm(0),
        BinaryOp::And if wrap32(c) == -1 => left,
        BinaryOp::Div | BinaryOp::DivU if c == 1 => left,
        // (cmp) != 0 and (cmp) == 0
        BinaryOp::Ne if c == 0 && left.is_comparison() => left,
        BinaryOp::Eq if c == 0 && left.is_comparison() => reduce_unary(UnaryOp::LogicalNot, left),
        // x <u 1 is x == 0
        BinaryOp::LtU if c == 1 => reduce_binary(BinaryOp::Eq, left, Expr::Imm(0)),
        // 0 <u x arrives mirrored as x >u 0, which is x != 0
        BinaryOp::GtU if c == 0 => reduce_binary(BinaryOp::Ne, left, Expr::Imm(0)),
        _ => Expr::binary(op, left, Expr::Imm(c)),
    }
}

fn reduce_non_constant(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    match op {
        // x + (y + c) => (x + y) + c
        BinaryOp::Add => match right {
            Expr::Binary {
                op: BinaryOp::Add,
                left: inner,
                right: inner_c,
            } if inner_c.as_imm().is_some() => {
                let sum = reduce_binary(BinaryOp::Add, left, *inner);
                reduce_binary(BinaryOp::Add, sum, *inner_c)
            }
            right => match left {
                // (x + c) + y => (x + y) + c
                Expr::Binary {
                    op: BinaryOp::Add,
                    left: inner,
                    right: inner_c,
                } if inner_c.as_imm().is_some() => {
                    let sum = reduce_binary(BinaryOp::Add, *inner, right);
                    reduce_binary(BinaryOp::Add, sum, *inner_c)
                }
                left => Expr::add(left, right),
            },
        },
        BinaryOp::Sub | BinaryOp::Xor if left == right && !left.has_side_effects() => {
            Expr::Imm(0)
        }
        _ => Expr::binary(op, left, right),
    }
}
