//! Externally consumed form of a [`Decompilation`].
//!
//! Every name is resolved here, so presentation layers need neither the
//! type system nor the variable database.

use mdec_ir::{AstNode, BinaryOp, Expr, LoopKind, UnaryOp, VarId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::decompiler::Decompilation;
use crate::vars::VariableKind;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializedVariableKind {
    Local,
    Receiver,
    Parameter,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SerializedVariable {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub kind: SerializedVariableKind,
    /// Declared argument position, for parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SerializedCallee {
    pub site: u32,
    pub target: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct SerializedStats {
    pub instructions: usize,
    pub blocks: usize,
    pub frame_size: i32,
    pub analysis_rounds: usize,
    /// Unclassified memory accesses before analysis and after each round.
    pub unclassified_accesses: Vec<usize>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializedExpr {
    Imm {
        value: i64,
    },
    /// SSA value that was never promoted.
    Value {
        name: String,
    },
    Variable {
        id: u32,
        name: String,
    },
    StackAddress {
        offset: i32,
    },
    Load {
        address: Box<Self>,
        size: u8,
        signed: bool,
    },
    Store {
        address: Box<Self>,
        value: Box<Self>,
        size: u8,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Self>,
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
        #[serde(default, skip_serializing_if = "Option::is_none")]
        callee: Option<String>,
        args: Vec<Self>,
    },
    Index {
        base: Box<Self>,
        index: Box<Self>,
        scale: u8,
        offset: i64,
    },
    Field {
        base: Box<Self>,
        offset: i64,
        name: String,
    },
    Intrinsic {
        name: String,
        args: Vec<Self>,
    },
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SerializedCase {
    pub index: usize,
    pub body: Vec<SerializedNode>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializedNode {
    Assign {
        address: u32,
        dest: String,
        value: SerializedExpr,
    },
    Expression {
        address: u32,
        expr: SerializedExpr,
    },
    If {
        condition: SerializedExpr,
        then_body: Vec<Self>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        else_body: Vec<Self>,
    },
    Loop {
        #[serde(rename = "loop")]
        loop_kind: LoopKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<SerializedExpr>,
        body: Vec<Self>,
    },
    Switch {
        selector: SerializedExpr,
        cases: Vec<SerializedCase>,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<SerializedExpr>,
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

/// Structured decompilation of one function with all names resolved.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SerializedDecompilation {
    pub function: String,
    pub address: u32,
    pub end_address: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub return_type: String,
    /// Receiver first, then arguments in declared order.
    pub parameters: Vec<SerializedVariable>,
    pub locals: Vec<SerializedVariable>,
    pub callees: Vec<SerializedCallee>,
    pub body: Vec<SerializedNode>,
    pub stats: SerializedStats,
}

impl SerializedDecompilation {
    /// Every node of the body in pre-order.
    pub fn walk(&self, f: &mut impl FnMut(&SerializedNode)) {
        walk_nodes(&self.body, f);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl SerializedNode {
    pub fn bodies(&self) -> Vec<&Vec<Self>> {
        match self {
            Self::If {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            Self::Loop { body, .. } => vec![body],
            Self::Switch { cases, .. } => cases.iter().map(|case| &case.body).collect(),
            _ => Vec::new(),
        }
    }

    /// Expressions held directly by this node.
    pub fn expressions(&self) -> Vec<&SerializedExpr> {
        match self {
            Self::Assign { value, .. } => vec![value],
            Self::Expression { expr, .. } => vec![expr],
            Self::If { condition, .. } | Self::Switch { selector: condition, .. } => vec![condition],
            Self::Loop { condition, .. } | Self::Return { value: condition } => {
                condition.iter().collect()
            }
            Self::Break | Self::Continue | Self::Goto { .. } | Self::Label { .. } => Vec::new(),
        }
    }
}

impl SerializedExpr {
    pub fn walk(&self, f: &mut impl FnMut(&Self)) {
        f(self);
        match self {
            Self::Imm { .. } | Self::Value { .. } | Self::Variable { .. } | Self::StackAddress { .. } => {}
            Self::Load { address, .. } => address.walk(f),
            Self::Store { address, value, .. } => {
                address.walk(f);
                value.walk(f);
            }
            Self::Unary { operand, .. } => operand.walk(f),
            Self::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Self::Select {
                condition,
                then,
                otherwise,
            } => {
                condition.walk(f);
                then.walk(f);
                otherwise.walk(f);
            }
            Self::Call { target, args, .. } => {
                target.walk(f);
                args.iter().for_each(|arg| arg.walk(f));
            }
            Self::Index { base, index, .. } => {
                base.walk(f);
                index.walk(f);
            }
            Self::Field { base, .. } => base.walk(f),
            Self::Intrinsic { args, .. } => args.iter().for_each(|arg| arg.walk(f)),
        }
    }
}

fn walk_nodes(nodes: &[SerializedNode], f: &mut impl FnMut(&SerializedNode)) {
    for node in nodes {
        f(node);
        for body in node.bodies() {
            walk_nodes(body, f);
        }
    }
}

struct Serializer<'a> {
    decompilation: &'a Decompilation,
    callee_names: FxHashMap<u32, String>,
}

impl Serializer<'_> {
    fn variable_name(&self, id: VarId) -> String {
        self.decompilation
            .variables
            .variable(id)
            .map_or_else(|| id.to_string(), |var| var.name.clone())
    }

    fn expr(&self, expr: &Expr) -> SerializedExpr {
        let boxed = |inner: &Expr| Box::new(self.expr(inner));
        match expr {
            Expr::Imm(value) => SerializedExpr::Imm { value: *value },
            Expr::Value(vloc) => SerializedExpr::Value {
                name: self.decompilation.variables.display_name(*vloc),
            },
            Expr::Variable(id) => SerializedExpr::Variable {
                id: id.0,
                name: self.variable_name(*id),
            },
            Expr::StackAddress(offset) => SerializedExpr::StackAddress { offset: *offset },
            Expr::Load {
                source,
                size,
                signed,
            } => SerializedExpr::Load {
                address: boxed(source),
                size: *size,
                signed: *signed,
            },
            Expr::Store { dest, source, size } => SerializedExpr::Store {
                address: boxed(dest),
                value: boxed(source),
                size: *size,
            },
            Expr::Unary { op, expr } => SerializedExpr::Unary {
                op: *op,
                operand: boxed(expr),
            },
            Expr::Binary { op, left, right } => SerializedExpr::Binary {
                op: *op,
                left: boxed(left),
                right: boxed(right),
            },
            Expr::Select {
                condition,
                then,
                otherwise,
            } => SerializedExpr::Select {
                condition: boxed(condition),
                then: boxed(then),
                otherwise: boxed(otherwise),
            },
            Expr::Call { target, args } => SerializedExpr::Call {
                callee: target
                    .as_imm()
                    .and_then(|address| u32::try_from(address).ok())
                    .and_then(|address| self.callee_names.get(&address).cloned()),
                target: boxed(target),
                args: args.iter().map(|arg| self.expr(arg)).collect(),
            },
            Expr::Index {
                base,
                index,
                scale,
                offset,
            } => SerializedExpr::Index {
                base: boxed(base),
                index: boxed(index),
                scale: *scale,
                offset: *offset,
            },
            Expr::Field { base, offset, name } => SerializedExpr::Field {
                base: boxed(base),
                offset: *offset,
                name: name.clone(),
            },
            Expr::Intrinsic { name, args } => SerializedExpr::Intrinsic {
                name: name.clone(),
                args: args.iter().map(|arg| self.expr(arg)).collect(),
            },
        }
    }

    fn nodes(&self, nodes: &[AstNode], out: &mut Vec<SerializedNode>) {
        for node in nodes {
            self.node(node, out);
        }
    }

    fn body(&self, nodes: &[AstNode]) -> Vec<SerializedNode> {
        let mut out = Vec::new();
        self.nodes(nodes, &mut out);
        out
    }

    /// Blocks are flattened into their parent list.
    fn node(&self, node: &AstNode, out: &mut Vec<SerializedNode>) {
        let serialized = match node {
            AstNode::Block { body } => {
                self.nodes(body, out);
                return;
            }
            AstNode::Assign {
                address,
                dest,
                value,
            } => SerializedNode::Assign {
                address: *address,
                dest: self.decompilation.variables.display_name(*dest),
                value: self.expr(value),
            },
            AstNode::Expression { address, expr } => SerializedNode::Expression {
                address: *address,
                expr: self.expr(expr),
            },
            AstNode::If {
                condition,
                then_body,
                else_body,
            } => SerializedNode::If {
                condition: self.expr(condition),
                then_body: self.body(then_body),
                else_body: self.body(else_body),
            },
            AstNode::Loop {
                kind,
                condition,
                body,
            } => SerializedNode::Loop {
                loop_kind: *kind,
                condition: condition.as_ref().map(|condition| self.expr(condition)),
                body: self.body(body),
            },
            AstNode::Switch { selector, cases } => SerializedNode::Switch {
                selector: self.expr(selector),
                cases: cases
                    .iter()
                    .map(|case| SerializedCase {
                        index: case.index,
                        body: self.body(&case.body),
                    })
                    .collect(),
            },
            AstNode::Return { value } => SerializedNode::Return {
                value: value.as_ref().map(|value| self.expr(value)),
            },
            AstNode::Break => SerializedNode::Break,
            AstNode::Continue => SerializedNode::Continue,
            AstNode::Goto { target } => SerializedNode::Goto { target: *target },
            AstNode::Label { address } => SerializedNode::Label { address: *address },
        };
        out.push(serialized);
    }
}

/// Resolve every name in `decompilation`.
pub fn serialize(decompilation: &Decompilation) -> SerializedDecompilation {
    let callee_names = decompilation
        .callees
        .iter()
        .filter_map(|callee| Some((callee.target, callee.function.as_ref()?.name.clone())))
        .collect();
    let serializer = Serializer {
        decompilation,
        callee_names,
    };

    let mut parameters = Vec::new();
    let mut locals = Vec::new();
    for var in decompilation.variables.variables() {
        let (kind, position) = match var.kind {
            VariableKind::Local => (SerializedVariableKind::Local, None),
            VariableKind::Receiver => (SerializedVariableKind::Receiver, None),
            VariableKind::Parameter(index) => (SerializedVariableKind::Parameter, Some(index)),
        };
        let serialized = SerializedVariable {
            id: var.id.0,
            name: var.name.clone(),
            type_name: decompilation.type_names.get(&var.id).cloned(),
            kind,
            position,
        };
        if serialized.kind == SerializedVariableKind::Local {
            locals.push(serialized);
        } else {
            parameters.push(serialized);
        }
    }
    parameters.sort_by_key(|var| var.position.map_or(0, |position| position + 1));

    let function = &decompilation.function;
    SerializedDecompilation {
        function: function.name.clone(),
        address: function.address,
        end_address: function.end_address,
        owner: decompilation.owner.clone(),
        return_type: decompilation.return_type.clone(),
        parameters,
        locals,
        callees: decompilation
            .callees
            .iter()
            .map(|callee| SerializedCallee {
                site: callee.site,
                target: callee.target,
                name: callee.function.as_ref().map(|function| function.name.clone()),
            })
            .collect(),
        body: serializer.body(std::slice::from_ref(&decompilation.root)),
        stats: SerializedStats {
            instructions: decompilation.stats.instructions,
            blocks: decompilation.stats.blocks,
            frame_size: decompilation.stats.frame_size,
            analysis_rounds: decompilation.report.rounds,
            unclassified_accesses: decompilation.report.unclassified.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::decompiler::{Decompiler, FunctionCache};
    use crate::test_support::{BASE, Fixture, array_sum};
    use mdec_cfg::NoJumpTables;
    use mdec_isa::decode_all;

    fn sum_decompilation(fx: &Fixture) -> SerializedDecompilation {
        let words = array_sum();
        let function = fx.function("sum", BASE, words.len(), "int", &["int*", "int"]);
        let mut cache = FunctionCache::new(Arc::clone(&function));
        Decompiler::new(&fx.types, &NoJumpTables)
            .decompile(&decode_all(&words, BASE), &mut cache, &fx.registry)
            .unwrap()
            .serialize()
    }

    #[test]
    fn test_names_are_resolved() {
        let fx = Fixture::new();
        let serialized = sum_decompilation(&fx);
        assert_eq!(serialized.function, "sum");
        assert_eq!(serialized.return_type, "int");
        let names: Vec<_> = serialized.parameters.iter().map(|var| var.name.as_str()).collect();
        assert_eq!(names, vec!["arg0", "arg1"]);
        assert_eq!(serialized.parameters[0].type_name.as_deref(), Some("int*"));
        assert!(serialized.locals.iter().any(|var| var.name == "i"));

        let mut loops = 0;
        serialized.walk(&mut |node| {
            if let SerializedNode::Loop { loop_kind, .. } = node {
                assert_eq!(*loop_kind, LoopKind::DoWhile);
                loops += 1;
            }
        });
        assert_eq!(loops, 1);
    }

    #[test]
    fn test_json_shape() {
        let fx = Fixture::new();
        let serialized = sum_decompilation(&fx);
        let json: serde_json::Value = serde_json::from_str(&serialized.to_json().unwrap()).unwrap();
        assert_eq!(json["function"], "sum");
        assert_eq!(json["parameters"][0]["type"], "int*");
        assert_eq!(json["parameters"][1]["kind"], "parameter");
        let last = json["body"].as_array().unwrap().last().unwrap();
        assert_eq!(last["kind"], "return");
        assert_eq!(last["value"]["kind"], "variable");
    }

    #[test]
    fn test_json_round_trip() {
        let fx = Fixture::new();
        let serialized = sum_decompilation(&fx);
        let parsed: SerializedDecompilation = serde_json::from_str(&serialized.to_json().unwrap()).unwrap();
        assert_eq!(parsed, serialized);
    }
}
