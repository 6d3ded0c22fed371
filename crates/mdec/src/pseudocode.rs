//! C-like rendering of a [`SerializedDecompilation`].

use mdec_ir::{BinaryOp, LoopKind};

use crate::serialize::{
    SerializedDecompilation, SerializedExpr, SerializedNode, SerializedVariable, SerializedVariableKind,
};

/// Render `decompilation` as C-like pseudo-code.
pub fn render(decompilation: &SerializedDecompilation) -> String {
    let mut renderer = Renderer::default();
    renderer.render_function(decompilation);
    renderer.take_output()
}

#[derive(Default)]
struct Renderer {
    out: String,
}

/// Integer type of a memory access.
fn access_type(size: u8, signed: bool) -> &'static str {
    match (size, signed) {
        (1, true) => "i8",
        (1, false) => "u8",
        (2, true) => "i16",
        (2, false) => "u16",
        (4, true) => "int",
        (4, false) => "u32",
        (8, true) => "i64",
        (8, false) => "u64",
        _ => "u128",
    }
}

fn fmt_imm(value: i64) -> String {
    if (-9..=9).contains(&value) {
        value.to_string()
    } else if value < 0 {
        format!("-0x{:x}", value.unsigned_abs())
    } else {
        format!("0x{value:x}")
    }
}

fn label(address: u32) -> String {
    format!("label_{address:x}")
}

/// Whether `expr` renders as a single token or postfix chain.
const fn is_atom(expr: &SerializedExpr) -> bool {
    matches!(
        expr,
        SerializedExpr::Imm { .. }
            | SerializedExpr::Value { .. }
            | SerializedExpr::Variable { .. }
            | SerializedExpr::Call { .. }
            | SerializedExpr::Intrinsic { .. }
            | SerializedExpr::Load { .. }
    )
}

fn declaration(var: &SerializedVariable) -> String {
    format!("{} {}", var.type_name.as_deref().unwrap_or("undefined"), var.name)
}

impl Renderer {
    fn take_output(self) -> String {
        self.out
    }

    /// Write indented line.
    fn writeln(&mut self, indent: usize, s: &str) {
        for _ in 0..indent {
            self.out.push_str("    ");
        }
        self.out.push_str(s);
        self.out.push('\n');
    }

    fn render_function(&mut self, decompilation: &SerializedDecompilation) {
        let arguments: Vec<String> = decompilation
            .parameters
            .iter()
            .filter(|var| var.kind == SerializedVariableKind::Parameter)
            .map(declaration)
            .collect();
        let name = match &decompilation.owner {
            Some(owner) if !decompilation.function.starts_with(&format!("{owner}::")) => {
                format!("{owner}::{}", decompilation.function)
            }
            _ => decompilation.function.clone(),
        };
        self.writeln(
            0,
            &format!("// {:#010x}..{:#010x}", decompilation.address, decompilation.end_address),
        );
        self.writeln(
            0,
            &format!("{} {}({}) {{", decompilation.return_type, name, arguments.join(", ")),
        );
        for var in &decompilation.locals {
            self.writeln(1, &format!("{};", declaration(var)));
        }
        if !decompilation.locals.is_empty() {
            self.out.push('\n');
        }
        self.render_body(&decompilation.body, 1);
        self.writeln(0, "}");
    }

    // ============= Expression rendering =============

    /// Render `expr` for use as an operand.
    fn render_operand(&self, expr: &SerializedExpr) -> String {
        let rendered = self.render_expr(expr);
        if is_atom(expr) {
            rendered
        } else {
            format!("({rendered})")
        }
    }

    /// Render the lvalue at `address` for an access of `size` bytes.
    fn render_place(&self, address: &SerializedExpr, size: u8, signed: bool) -> String {
        match address {
            SerializedExpr::Index {
                base,
                index,
                scale,
                offset,
            } => {
                let base = self.render_operand(base);
                let index = self.render_expr(index);
                let step = i64::from(*scale);
                if *offset == 0 {
                    format!("{base}[{index}]")
                } else if step != 0 && offset % step == 0 {
                    format!("{base}[{index} + {}]", fmt_imm(offset / step))
                } else {
                    format!(
                        "*({}*)((u8*)&{base}[{index}] + {})",
                        access_type(size, signed),
                        fmt_imm(*offset)
                    )
                }
            }
            SerializedExpr::Field { base, name, .. } => {
                format!("{}->{name}", self.render_operand(base))
            }
            SerializedExpr::StackAddress { offset } => format!("stack[{}]", fmt_imm(i64::from(*offset))),
            other => format!("*({}*){}", access_type(size, signed), self.render_operand(other)),
        }
    }

    fn render_binary(&self, op: BinaryOp, left: &SerializedExpr, right: &SerializedExpr) -> String {
        let l = self.render_operand(left);
        let r = self.render_operand(right);
        match op {
            BinaryOp::MulHigh => format!("mulhi({l}, {r})"),
            BinaryOp::MulHighU => format!("mulhiu({l}, {r})"),
            BinaryOp::Shr => format!("(u32){l} >> {r}"),
            op if op.is_unsigned() => format!("(u32){l} {} (u32){r}", op.symbol()),
            op => format!("{l} {} {r}", op.symbol()),
        }
    }

    fn render_args(&self, args: &[SerializedExpr]) -> String {
        args.iter()
            .map(|arg| self.render_expr(arg))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render expression to C-like code.
    fn render_expr(&self, expr: &SerializedExpr) -> String {
        match expr {
            SerializedExpr::Imm { value } => fmt_imm(*value),
            SerializedExpr::Value { name } | SerializedExpr::Variable { name, .. } => name.clone(),
            SerializedExpr::StackAddress { offset } => format!("&stack[{}]", fmt_imm(i64::from(*offset))),
            SerializedExpr::Load {
                address,
                size,
                signed,
            } => self.render_place(address, *size, *signed),
            SerializedExpr::Store {
                address,
                value,
                size,
            } => format!(
                "{} = {}",
                self.render_place(address, *size, true),
                self.render_expr(value)
            ),
            SerializedExpr::Unary { op, operand } => {
                if op.is_call_style() {
                    format!("{}({})", op.symbol(), self.render_expr(operand))
                } else {
                    format!("{}{}", op.symbol(), self.render_operand(operand))
                }
            }
            SerializedExpr::Binary { op, left, right } => self.render_binary(*op, left, right),
            SerializedExpr::Select {
                condition,
                then,
                otherwise,
            } => format!(
                "{} ? {} : {}",
                self.render_operand(condition),
                self.render_operand(then),
                self.render_operand(otherwise)
            ),
            SerializedExpr::Call {
                target,
                callee,
                args,
            } => {
                let function = match (callee, target.as_ref()) {
                    (Some(name), _) => name.clone(),
                    (None, SerializedExpr::Imm { value }) => format!("func_{value:x}"),
                    (None, other) => format!("(*{})", self.render_operand(other)),
                };
                format!("{function}({})", self.render_args(args))
            }
            SerializedExpr::Index { .. } | SerializedExpr::Field { .. } => {
                format!("&{}", self.render_place(expr, 4, true))
            }
            SerializedExpr::Intrinsic { name, args } => format!("__{name}({})", self.render_args(args)),
        }
    }

    // ============= Statement rendering =============

    fn render_body(&mut self, nodes: &[SerializedNode], indent: usize) {
        for node in nodes {
            self.render_stmt(node, indent);
        }
    }

    fn render_stmt(&mut self, node: &SerializedNode, indent: usize) {
        match node {
            SerializedNode::Assign { dest, value, .. } => {
                let line = format!("{dest} = {};", self.render_expr(value));
                self.writeln(indent, &line);
            }
            SerializedNode::Expression { expr, .. } => {
                let line = format!("{};", self.render_expr(expr));
                self.writeln(indent, &line);
            }
            SerializedNode::If {
                condition,
                then_body,
                else_body,
            } => {
                let line = format!("if ({}) {{", self.render_expr(condition));
                self.writeln(indent, &line);
                self.render_body(then_body, indent + 1);
                self.render_else(else_body, indent);
            }
            SerializedNode::Loop {
                loop_kind,
                condition,
                body,
            } => {
                let condition = condition
                    .as_ref()
                    .map_or_else(|| "true".to_string(), |c| self.render_expr(c));
                match loop_kind {
                    LoopKind::DoWhile => {
                        self.writeln(indent, "do {");
                        self.render_body(body, indent + 1);
                        self.writeln(indent, &format!("}} while ({condition});"));
                    }
                    LoopKind::While | LoopKind::Infinite => {
                        self.writeln(indent, &format!("while ({condition}) {{"));
                        self.render_body(body, indent + 1);
                        self.writeln(indent, "}");
                    }
                }
            }
            SerializedNode::Switch { selector, cases } => {
                let line = format!("switch ({}) {{", self.render_expr(selector));
                self.writeln(indent, &line);
                for case in cases {
                    self.writeln(indent + 1, &format!("case {}:", case.index));
                    self.render_body(&case.body, indent + 2);
                }
                self.writeln(indent, "}");
            }
            SerializedNode::Return { value } => match value {
                Some(value) => {
                    let line = format!("return {};", self.render_expr(value));
                    self.writeln(indent, &line);
                }
                None => self.writeln(indent, "return;"),
            },
            SerializedNode::Break => self.writeln(indent, "break;"),
            SerializedNode::Continue => self.writeln(indent, "continue;"),
            SerializedNode::Goto { target } => self.writeln(indent, &format!("goto {};", label(*target))),
            SerializedNode::Label { address } => {
                self.writeln(indent.saturating_sub(1), &format!("{}:", label(*address)));
            }
        }
    }

    /// Close an `if`, folding a lone nested `if` into `else if`.
    fn render_else(&mut self, else_body: &[SerializedNode], indent: usize) {
        match else_body {
            [] => self.writeln(indent, "}"),
            [
                SerializedNode::If {
                    condition,
                    then_body,
                    else_body,
                },
            ] => {
                let line = format!("}} else if ({}) {{", self.render_expr(condition));
                self.writeln(indent, &line);
                self.render_body(then_body, indent + 1);
                self.render_else(else_body, indent);
            }
            body => {
                self.writeln(indent, "} else {");
                self.render_body(body, indent + 1);
                self.writeln(indent, "}");
            }
        }
    }
}
