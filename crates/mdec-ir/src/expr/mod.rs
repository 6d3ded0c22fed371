//! Expression trees over SSA values.
//!
//! Expressions are immutable values: every rewrite builds a new tree.

mod pattern;
mod reduce;

#[cfg(test)]
mod tests;

pub use pattern::*;
pub use reduce::negate_condition;

use serde::{Deserialize, Serialize};

use crate::{VarId, VersionedLocation};

/// Unary operations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Bitwise complement.
    Not,
    /// Boolean negation.
    LogicalNot,
    Neg,
    FNeg,
    FAbs,
    FSqrt,
    IntToFloat,
    FloatToInt,
}

/// Binary operations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    MulHigh,
    MulHighU,
    Div,
    DivU,
    Rem,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Sar,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LtU,
    LeU,
    GtU,
    GeU,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FEq,
    FLt,
    FLe,
}

impl UnaryOp {
    /// C-like prefix: an operator or a call-style name.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Not => "~",
            Self::LogicalNot => "!",
            Self::Neg | Self::FNeg => "-",
            Self::FAbs => "fabsf",
            Self::FSqrt => "sqrtf",
            Self::IntToFloat => "(float)",
            Self::FloatToInt => "(int)",
        }
    }

    /// Whether the operator is written as a function call.
    pub const fn is_call_style(self) -> bool {
        matches!(self, Self::FAbs | Self::FSqrt)
    }
}

impl BinaryOp {
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::MulHighU | Self::DivU | Self::RemU | Self::Shr | Self::LtU | Self::LeU | Self::GtU | Self::GeU
        )
    }

    /// C-like operator symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add | Self::FAdd => "+",
            Self::Sub | Self::FSub => "-",
            Self::Mul | Self::FMul => "*",
            Self::MulHigh | Self::MulHighU => "*h",
            Self::Div | Self::DivU | Self::FDiv => "/",
            Self::Rem | Self::RemU => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Shl => "<<",
            Self::Shr | Self::Sar => ">>",
            Self::Eq | Self::FEq => "==",
            Self::Ne => "!=",
            Self::Lt | Self::LtU | Self::FLt => "<",
            Self::Le | Self::LeU | Self::FLe => "<=",
            Self::Gt | Self::GtU => ">",
            Self::Ge | Self::GeU => ">=",
        }
    }

    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Mul
                | Self::MulHigh
                | Self::MulHighU
                | Self::And
                | Self::Or
                | Self::Xor
                | Self::Eq
                | Self::Ne
                | Self::FAdd
                | Self::FMul
                | Self::FEq
        )
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::Ne
                | Self::Lt
                | Self::Le
                | Self::Gt
                | Self::Ge
                | Self::LtU
                | Self::LeU
                | Self::GtU
                | Self::GeU
                | Self::FEq
                | Self::FLt
                | Self::FLe
        )
    }

    /// Logical inverse of an integer comparison.
    pub const fn inverse(self) -> Option<Self> {
        Some(match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Ge => Self::Lt,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
            Self::LtU => Self::GeU,
            Self::GeU => Self::LtU,
            Self::LeU => Self::GtU,
            Self::GtU => Self::LeU,
            _ => return None,
        })
    }

    /// The comparison with operands exchanged (`a < b` == `b > a`).
    pub const fn mirrored(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Gt => Self::Lt,
            Self::Le => Self::Ge,
            Self::Ge => Self::Le,
            Self::LtU => Self::GtU,
            Self::GtU => Self::LtU,
            Self::LeU => Self::GeU,
            Self::GeU => Self::LeU,
            other => other,
        }
    }
}

/// Expression tree node.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Expr {
    Imm(i64),
    /// An SSA value that has not been folded into a variable reference.
    Value(VersionedLocation),
    Variable(VarId),
    /// Address of a stack slot, relative to the entry stack pointer.
    StackAddress(i32),
    Load {
        source: Box<Self>,
        size: u8,
        signed: bool,
    },
    Store {
        dest: Box<Self>,
        source: Box<Self>,
        size: u8,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Self>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    Select {
        condition: Box<Self>,
        then: Box<Self>,
        otherwise: Box<Self>,
    },
    Call {
        target: Box<Self>,
        args: Vec<Self>,
    },
    /// Address of `base[index]` for elements of `scale` bytes, plus a byte offset.
    Index {
        base: Box<Self>,
        index: Box<Self>,
        scale: u8,
        offset: i64,
    },
    /// Address of a named structure member of `base`.
    Field {
        base: Box<Self>,
        offset: i64,
        name: String,
    },
    /// Instruction without modeled semantics.
    Intrinsic {
        name: String,
        args: Vec<Self>,
    },
}

// These are factory methods, not trait implementations
#[allow(clippy::should_implement_trait)]
impl Expr {
    pub const fn imm(value: i64) -> Self {
        Self::Imm(value)
    }

    pub const fn value(vloc: VersionedLocation) -> Self {
        Self::Value(vloc)
    }

    pub const fn var(id: VarId) -> Self {
        Self::Variable(id)
    }

    pub fn load(source: Self, size: u8, signed: bool) -> Self {
        Self::Load {
            source: Box::new(source),
            size,
            signed,
        }
    }

    pub fn store(dest: Self, source: Self, size: u8) -> Self {
        Self::Store {
            dest: Box::new(dest),
            source: Box::new(source),
            size,
        }
    }

    pub fn unary(op: UnaryOp, expr: Self) -> Self {
        Self::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn add(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    pub fn sub(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Mul, left, right)
    }

    pub fn shl(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Shl, left, right)
    }

    pub fn eq(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    pub fn ne(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Ne, left, right)
    }

    pub fn lt(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Lt, left, right)
    }

    pub fn not(expr: Self) -> Self {
        Self::unary(UnaryOp::LogicalNot, expr)
    }

    pub fn select(condition: Self, then: Self, otherwise: Self) -> Self {
        Self::Select {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn call(target: Self, args: Vec<Self>) -> Self {
        Self::Call {
            target: Box::new(target),
            args,
        }
    }

    pub fn intrinsic(name: &str, args: Vec<Self>) -> Self {
        Self::Intrinsic {
            name: name.to_string(),
            args,
        }
    }

    pub const fn as_imm(&self) -> Option<i64> {
        match self {
            Self::Imm(value) => Some(*value),
            _ => None,
        }
    }

    pub const fn as_value(&self) -> Option<VersionedLocation> {
        match self {
            Self::Value(vloc) => Some(*vloc),
            _ => None,
        }
    }

    pub const fn is_comparison(&self) -> bool {
        matches!(self, Self::Binary { op, .. } if op.is_comparison())
    }

    /// Unclassified memory access: a load or store whose address is neither an
    /// array element nor a structure member.
    pub fn is_unclassified_access(&self) -> bool {
        match self {
            Self::Load { source: addr, .. } | Self::Store { dest: addr, .. } => {
                !matches!(addr.as_ref(), Self::Index { .. } | Self::Field { .. })
            }
            _ => false,
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Imm(_) | Self::Value(_) | Self::Variable(_) | Self::StackAddress(_) => {
                Vec::new()
            }
            Self::Load { source, .. } => vec![&**source],
            Self::Store { dest, source, .. } => vec![&**dest, &**source],
            Self::Unary { expr, .. } => vec![&**expr],
            Self::Binary { left, right, .. } => vec![&**left, &**right],
            Self::Select {
                condition,
                then,
                otherwise,
            } => vec![&**condition, &**then, &**otherwise],
            Self::Call { target, args } => {
                let mut children = vec![&**target];
                children.extend(args);
                children
            }
            Self::Index { base, index, .. } => vec![&**base, &**index],
            Self::Field { base, .. } => vec![&**base],
            Self::Intrinsic { args, .. } => args.iter().collect(),
        }
    }

    /// Visit every node in pre-order.
    pub fn visit(&self, f: &mut impl FnMut(&Self)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Rebuild the tree top-down. When `f` returns a replacement for a node, the
    /// replacement is used as-is and its children are not visited.
    #[must_use]
    pub fn transform(&self, f: &mut impl FnMut(&Self) -> Option<Self>) -> Self {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Self::Imm(_) | Self::Value(_) | Self::Variable(_) | Self::StackAddress(_) => {
                self.clone()
            }
            Self::Load {
                source,
                size,
                signed,
            } => Self::load(source.transform(f), *size, *signed),
            Self::Store { dest, source, size } => {
                Self::store(dest.transform(f), source.transform(f), *size)
            }
            Self::Unary { op, expr } => Self::unary(*op, expr.transform(f)),
            Self::Binary { op, left, right } => {
                Self::binary(*op, left.transform(f), right.transform(f))
            }
            Self::Select {
                condition,
                then,
                otherwise,
            } => Self::select(
                condition.transform(f),
                then.transform(f),
                otherwise.transform(f),
            ),
            Self::Call { target, args } => Self::call(
                target.transform(f),
                args.iter().map(|arg| arg.transform(f)).collect(),
            ),
            Self::Index {
                base,
                index,
                scale,
                offset,
            } => Self::Index {
                base: Box::new(base.transform(f)),
                index: Box::new(index.transform(f)),
                scale: *scale,
                offset: *offset,
            },
            Self::Field { base, offset, name } => Self::Field {
                base: Box::new(base.transform(f)),
                offset: *offset,
                name: name.clone(),
            },
            Self::Intrinsic { name, args } => Self::Intrinsic {
                name: name.clone(),
                args: args.iter().map(|arg| arg.transform(f)).collect(),
            },
        }
    }

    /// Replace every occurrence of the SSA value `target` with `replacement`.
    #[must_use]
    pub fn substitute(&self, target: VersionedLocation, replacement: &Self) -> Self {
        self.transform(&mut |node| match node {
            Self::Value(vloc) if *vloc == target => Some(replacement.clone()),
            _ => None,
        })
    }

    /// SSA values referenced anywhere in the tree, with repetition.
    pub fn values(&self) -> Vec<VersionedLocation> {
        let mut values = Vec::new();
        self.visit(&mut |node| {
            if let Self::Value(vloc) = node {
                values.push(*vloc);
            }
        });
        values
    }

    /// Promoted variables referenced anywhere in the tree, with repetition.
    pub fn references(&self) -> Vec<VarId> {
        let mut ids = Vec::new();
        self.visit(&mut |node| {
            if let Self::Variable(id) = node {
                ids.push(*id);
            }
        });
        ids
    }

    /// Whether evaluating the tree may write state.
    pub fn has_side_effects(&self) -> bool {
        let mut found = false;
        self.visit(&mut |node| {
            found |= matches!(
                node,
                Self::Store { .. } | Self::Call { .. } | Self::Intrinsic { .. }
            );
        });
        found
    }

    /// Whether evaluating the tree reads memory.
    pub fn reads_memory(&self) -> bool {
        let mut found = false;
        self.visit(&mut |node| {
            found |= matches!(node, Self::Load { .. } | Self::Call { .. });
        });
        found
    }

    /// Number of unclassified memory accesses in the tree.
    pub fn unclassified_accesses(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |node| {
            if node.is_unclassified_access() {
                count += 1;
            }
        });
        count
    }
}
