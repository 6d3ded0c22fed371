//! Structured statement tree produced by control-flow synthesis.

use serde::{Deserialize, Serialize};

use crate::{Expr, VersionedLocation};

/// Shape of a structured loop.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    /// Condition checked after each iteration.
    DoWhile,
    /// Condition checked before each iteration.
    While,
    /// No condition; exits only through `Break`, `Return` or `Goto`.
    Infinite,
}

/// One arm of a `Switch`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SwitchCase {
    /// Jump-table slot.
    pub index: usize,
    pub body: Vec<AstNode>,
}

/// Statement node.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AstNode {
    Block {
        body: Vec<Self>,
    },
    /// `dest = value`, originating from the instruction at `address`.
    Assign {
        address: u32,
        dest: VersionedLocation,
        value: Expr,
    },
    /// Expression evaluated for its effect (stores, calls, intrinsics).
    Expression {
        address: u32,
        expr: Expr,
    },
    If {
        condition: Expr,
        then_body: Vec<Self>,
        else_body: Vec<Self>,
    },
    Loop {
        kind: LoopKind,
        condition: Option<Expr>,
        body: Vec<Self>,
    },
    Switch {
        selector: Expr,
        cases: Vec<SwitchCase>,
    },
    Return {
        value: Option<Expr>,
    },
    Break,
    Continue,
    Goto {
        target: u32,
    },
    Label {
        address: u32,
    },
}

impl AstNode {
    /// The node's primary expression tree: the assigned value, the evaluated
    /// expression, the condition, the selector or the returned value.
    pub fn expression(&self) -> Option<&Expr> {
        self.expressions().into_iter().next()
    }

    /// The expression directly owned by this node, excluding nested bodies.
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            Self::Assign { value, .. } => vec![value],
            Self::Expression { expr, .. } => vec![expr],
            Self::If { condition, .. } => vec![condition],
            Self::Loop { condition, .. } => condition.iter().collect(),
            Self::Switch { selector, .. } => vec![selector],
            Self::Return { value } => value.iter().collect(),
            Self::Block { .. }
            | Self::Break
            | Self::Continue
            | Self::Goto { .. }
            | Self::Label { .. } => Vec::new(),
        }
    }

    pub fn expressions_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Self::Assign { value, .. } => vec![value],
            Self::Expression { expr, .. } => vec![expr],
            Self::If { condition, .. } => vec![condition],
            Self::Loop { condition, .. } => condition.iter_mut().collect(),
            Self::Switch { selector, .. } => vec![selector],
            Self::Return { value } => value.iter_mut().collect(),
            Self::Block { .. }
            | Self::Break
            | Self::Continue
            | Self::Goto { .. }
            | Self::Label { .. } => Vec::new(),
        }
    }

    /// Nested statement lists.
    pub fn bodies(&self) -> Vec<&Vec<Self>> {
        match self {
            Self::Block { body } | Self::Loop { body, .. } => vec![body],
            Self::If {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            Self::Switch { cases, .. } => cases.iter().map(|case| &case.body).collect(),
            _ => Vec::new(),
        }
    }

    pub fn bodies_mut(&mut self) -> Vec<&mut Vec<Self>> {
        match self {
            Self::Block { body } | Self::Loop { body, .. } => vec![body],
            Self::If {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            Self::Switch { cases, .. } => cases.iter_mut().map(|case| &mut case.body).collect(),
            _ => Vec::new(),
        }
    }

    /// Visit this node and every nested node in pre-order.
    pub fn walk(&self, f: &mut impl FnMut(&Self)) {
        f(self);
        for body in self.bodies() {
            for node in body {
                node.walk(f);
            }
        }
    }

    /// Mutable pre-order traversal.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Self)) {
        f(self);
        for body in self.bodies_mut() {
            for node in body.iter_mut() {
                node.walk_mut(f);
            }
        }
    }

    /// Number of nodes in the tree, including `self`.
    pub fn count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    /// Unclassified memory accesses across every expression in the tree.
    pub fn unclassified_accesses(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |node| {
            count += node
                .expressions()
                .into_iter()
                .map(Expr::unclassified_accesses)
                .sum::<usize>();
        });
        count
    }
}
