//! Canonical source printer. Output re-parses to a structurally identical
//! AST.

use super::*;
use crate::lexer::{Marker, escape};

const INDENT: &str = "    ";

pub fn format(ast: &Ast) -> String {
    let mut printer = Printer {
        ast,
        out: String::new(),
        depth: 0,
    };
    for (index, item) in ast.items.iter().enumerate() {
        let is_function = matches!(item, Item::Function(_));
        if is_function && index > 0 && !printer.out.ends_with("\n\n") {
            printer.out.push('\n');
        }
        printer.item(item);
        if is_function && index + 1 < ast.items.len() {
            printer.out.push('\n');
        }
    }
    printer.out
}

pub fn format_type(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Int => "Int".to_string(),
        TypeExpr::Float => "Float".to_string(),
        TypeExpr::Bool => "Bool".to_string(),
        TypeExpr::Text => "Text".to_string(),
        TypeExpr::Null => "Null".to_string(),
        TypeExpr::List(inner) => format!("List[{}]", format_type(inner)),
        TypeExpr::Map(k, v) => format!("Map[{}, {}]", format_type(k), format_type(v)),
        TypeExpr::Result(t, e) => format!("Result[{}, {}]", format_type(t), format_type(e)),
        TypeExpr::Optional(inner) => format!("{}?", format_type(inner)),
        TypeExpr::Record(fields) => {
            let fields = fields
                .iter()
                .map(|(name, ty)| format!("{name}: {}", format_type(ty)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Record{{{fields}}}")
        }
    }
}

/// Shortest text that lexes back to exactly `value`.
pub fn format_float(value: f64) -> String {
    let text = format!("{value:?}");
    match text.find('e') {
        Some(at) if !text[..at].contains('.') => format!("{}.0{}", &text[..at], &text[at..]),
        _ => text,
    }
}

struct Printer<'a> {
    ast: &'a Ast,
    out: String,
    depth: usize,
}

impl Printer<'_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn item(&mut self, item: &Item) {
        match item {
            Item::Capabilities(decl) => {
                let line = format!("{} {}", Marker::Capabilities.glyph(), cap_list(&decl.names));
                self.line(&line);
            }
            Item::Function(function) => self.function(function),
            Item::Stmt { id } => self.stmt(*id),
        }
    }

    fn function(&mut self, function: &Function) {
        let params = function
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, format_type(&p.ty)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut header = format!("{} {}({params})", Marker::Function.glyph(), function.name);
        if let Some(ret) = &function.ret {
            header.push_str(" -> ");
            header.push_str(&format_type(ret));
        }
        if !function.capabilities.is_empty() {
            header.push(' ');
            header.push_str(Marker::Capabilities.glyph());
            header.push(' ');
            header.push_str(&cap_list(&function.capabilities));
        }
        header.push(':');
        self.line(&header);
        self.block(&function.body);
    }

    fn block(&mut self, body: &[StmtId]) {
        self.depth += 1;
        for id in body {
            self.stmt(*id);
        }
        self.depth -= 1;
    }

    fn stmt(&mut self, id: StmtId) {
        match &self.ast.stmt(id).kind {
            StmtKind::Assign {
                name,
                declared,
                value,
            } => {
                let value = self.expr(*value, 0);
                let line = match declared {
                    Some(ty) => format!("{name}: {} = {value}", format_type(ty)),
                    None => format!("{name} = {value}"),
                };
                self.line(&line);
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let header = format!("if {}:", self.expr(*cond, 0));
                self.line(&header);
                self.block(then_body);
                if let Some(else_body) = else_body {
                    self.line("else:");
                    self.block(else_body);
                }
            }
            StmtKind::While { cond, body } => {
                let header = format!("while {}:", self.expr(*cond, 0));
                self.line(&header);
                self.block(body);
            }
            StmtKind::Return { value } => {
                let line = match value {
                    Some(value) => format!("return {}", self.expr(*value, 0)),
                    None => "return".to_string(),
                };
                self.line(&line);
            }
            StmtKind::Show { value } => {
                let line = format!("show {}", self.expr(*value, 0));
                self.line(&line);
            }
            StmtKind::Ask { name, ty, prompt } => {
                let mut line = format!("ask {name}");
                if let Some(ty) = ty {
                    line.push_str(": ");
                    line.push_str(&format_type(ty));
                }
                if let Some(prompt) = prompt {
                    line.push(' ');
                    line.push_str(&self.expr(*prompt, 0));
                }
                self.line(&line);
            }
            StmtKind::Verify { cond } => {
                let line = format!("{} {}", Marker::Verify.glyph(), self.expr(*cond, 0));
                self.line(&line);
            }
            StmtKind::Expr { expr } => {
                let line = self.expr(*expr, 0);
                self.line(&line);
            }
        }
    }

    /// Renders `id`, parenthesised when it binds looser than `min`.
    fn expr(&self, id: ExprId, min: u8) -> String {
        let (text, precedence) = self.render(id);
        if precedence < min {
            format!("({text})")
        } else {
            text
        }
    }

    fn render(&self, id: ExprId) -> (String, u8) {
        match &self.ast.expr(id).kind {
            ExprKind::Int { value } => (value.to_string(), PREC_ATOM),
            ExprKind::Float { value } => (format_float(*value), PREC_ATOM),
            ExprKind::Text { value } => (format!("\"{}\"", escape(value)), PREC_ATOM),
            ExprKind::Bool { value } => (value.to_string(), PREC_ATOM),
            ExprKind::Null => ("null".to_string(), PREC_ATOM),
            ExprKind::Var { name } => (name.clone(), PREC_ATOM),
            ExprKind::Unary { op, operand } => match op {
                UnOp::Neg => (format!("-{}", self.expr(*operand, PREC_NEG)), PREC_NEG),
                UnOp::Not => (format!("not {}", self.expr(*operand, PREC_NOT)), PREC_NOT),
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let precedence = op.precedence();
                let text = format!(
                    "{} {} {}",
                    self.expr(*lhs, precedence),
                    op.symbol(),
                    self.expr(*rhs, precedence + 1)
                );
                (text, precedence)
            }
            ExprKind::Call { callee, args } => {
                (format!("{callee}({})", self.list(args)), PREC_ATOM)
            }
            ExprKind::List { items } => (format!("[{}]", self.list(items)), PREC_ATOM),
            ExprKind::Map { entries } => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| {
                        // a bare name in key position would read as a record field
                        let key = match &self.ast.expr(*k).kind {
                            ExprKind::Var { name } => format!("({name})"),
                            _ => self.expr(*k, 0),
                        };
                        format!("{key}: {}", self.expr(*v, 0))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                (format!("{{{entries}}}"), PREC_ATOM)
            }
            ExprKind::Record { fields } => {
                let fields = fields
                    .iter()
                    .map(|(name, value)| format!("{name}: {}", self.expr(*value, 0)))
                    .collect::<Vec<_>>()
                    .join(", ");
                (format!("{{{fields}}}"), PREC_ATOM)
            }
            ExprKind::Field { base, field } => (
                format!("{}.{field}", self.expr(*base, PREC_POSTFIX)),
                PREC_POSTFIX,
            ),
            ExprKind::Index { base, index } => (
                format!("{}[{}]", self.expr(*base, PREC_POSTFIX), self.expr(*index, 0)),
                PREC_POSTFIX,
            ),
        }
    }

    fn list(&self, ids: &[ExprId]) -> String {
        ids.iter()
            .map(|id| self.expr(*id, 0))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn cap_list(names: &[CapabilityName]) -> String {
    names
        .iter()
        .map(|n| n.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
