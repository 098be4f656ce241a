//! Versioned intermediate representation. Bodies are trees of regions: `if`,
//! `loop` and short-circuit `logic` nest their sub-regions instead of
//! jumping, so every body is acyclic. Registers are SSA: each is defined
//! once and only used after its definition.

pub mod builder;
pub mod irvalidator;

#[cfg(test)]
pub mod test;

pub use builder::{IRBuilder, lower};
pub use irvalidator::IRValidator;

use crate::ast::format::format_float;
use crate::ast::{BinOp, UnOp};
use crate::capabilities::{Capability, CapabilitySet};
use crate::diagnostic::Diagnostic;
use crate::lexer::escape;
use crate::span::Origin;
use crate::stdlib::Builtin;
use crate::typechecker::{Scope, Type};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt::{self, Display, Formatter};

pub const IR_VERSION: &str = "0.1.0";

/// Internal consistency failure in lowered IR. Never a user error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unsupported IR version '{0}', expected {IR_VERSION}")]
    Version(String),
    #[error("lowering failed: {0}")]
    Lowering(String),
    #[error("in {owner}: {message}")]
    Invalid { owner: String, message: String },
}

impl SchemaError {
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::Version(_) => "HND-IR-0002",
            _ => "HND-IR-0001",
        }
    }

    pub fn to_diagnostic(&self, origin: Origin) -> Diagnostic {
        Diagnostic::fatal(self.code(), origin, self.to_string())
            .with_note("this is a bug in the toolchain, not in the program")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reg(pub u32);

impl Display for Reg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Null,
}

/// Where a named variable lives. `declare` creates it in the innermost
/// scope; otherwise the nearest existing binding is updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "opcode", rename_all = "snake_case")]
pub enum Op {
    Const {
        dest: Reg,
        ty: Type,
        value: Literal,
    },
    Load {
        dest: Reg,
        ty: Type,
        var: Slot,
    },
    Store {
        var: Slot,
        declare: bool,
        value: Reg,
    },
    Unary {
        dest: Reg,
        ty: Type,
        op: UnOp,
        operand: Reg,
    },
    Binary {
        dest: Reg,
        ty: Type,
        op: BinOp,
        lhs: Reg,
        rhs: Reg,
    },
    /// `and`/`or`: `rhs_body` only runs when `lhs` does not decide the
    /// result, and leaves its value in `rhs`.
    Logic {
        dest: Reg,
        op: BinOp,
        lhs: Reg,
        rhs_body: Vec<Node>,
        rhs: Reg,
    },
    List {
        dest: Reg,
        ty: Type,
        items: Vec<Reg>,
    },
    Map {
        dest: Reg,
        ty: Type,
        entries: Vec<(Reg, Reg)>,
    },
    Record {
        dest: Reg,
        ty: Type,
        fields: Vec<(String, Reg)>,
    },
    Field {
        dest: Reg,
        ty: Type,
        base: Reg,
        field: String,
    },
    Index {
        dest: Reg,
        ty: Type,
        base: Reg,
        index: Reg,
    },
    Call {
        dest: Reg,
        ty: Type,
        function: String,
        args: Vec<Reg>,
    },
    Builtin {
        dest: Reg,
        ty: Type,
        builtin: Builtin,
        args: Vec<Reg>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capability: Option<Capability>,
    },
    Show {
        value: Reg,
    },
    Ask {
        var: Slot,
        declare: bool,
        /// Type the input line is parsed as.
        ty: Type,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<Reg>,
    },
    Verify {
        cond: Reg,
    },
    If {
        cond: Reg,
        then_body: Vec<Node>,
        else_body: Vec<Node>,
    },
    /// Runs `cond_body`, stops when `cond` is false, otherwise runs `body`
    /// and repeats.
    Loop {
        cond_body: Vec<Node>,
        cond: Reg,
        body: Vec<Node>,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Reg>,
    },
}

impl Op {
    pub fn opcode(&self) -> &'static str {
        match self {
            Op::Const { .. } => "const",
            Op::Load { .. } => "load",
            Op::Store { .. } => "store",
            Op::Unary { .. } => "unary",
            Op::Binary { .. } => "binary",
            Op::Logic { .. } => "logic",
            Op::List { .. } => "list",
            Op::Map { .. } => "map",
            Op::Record { .. } => "record",
            Op::Field { .. } => "field",
            Op::Index { .. } => "index",
            Op::Call { .. } => "call",
            Op::Builtin { .. } => "builtin",
            Op::Show { .. } => "show",
            Op::Ask { .. } => "ask",
            Op::Verify { .. } => "verify",
            Op::If { .. } => "if",
            Op::Loop { .. } => "loop",
            Op::Return { .. } => "return",
        }
    }

    /// Register this op defines and its type.
    pub fn dest(&self) -> Option<(Reg, &Type)> {
        match self {
            Op::Const { dest, ty, .. }
            | Op::Load { dest, ty, .. }
            | Op::Unary { dest, ty, .. }
            | Op::Binary { dest, ty, .. }
            | Op::List { dest, ty, .. }
            | Op::Map { dest, ty, .. }
            | Op::Record { dest, ty, .. }
            | Op::Field { dest, ty, .. }
            | Op::Index { dest, ty, .. }
            | Op::Call { dest, ty, .. }
            | Op::Builtin { dest, ty, .. } => Some((*dest, ty)),
            Op::Logic { dest, .. } => Some((*dest, &Type::Bool)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub op: Op,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
    pub capabilities: CapabilitySet,
    pub body: Vec<Node>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub version: String,
    pub name: String,
    /// Declared by the module's top-level `🛡` lines.
    pub capabilities: CapabilitySet,
    pub functions: Vec<Function>,
    /// Top-level statements in program order.
    pub main: Vec<Node>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Module, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// Display implementations: the textual listing

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => f.write_str(&format_float(*x)),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Text(s) => write!(f, "\"{}\"", escape(s)),
            Literal::Null => f.write_str("null"),
        }
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Global => write!(f, "@{}", self.name),
            Scope::Local => write!(f, "${}", self.name),
        }
    }
}

fn regs(list: &[Reg]) -> String {
    list.iter()
        .map(Reg::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn caps(set: &CapabilitySet) -> String {
    set.iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_body(f: &mut Formatter<'_>, nodes: &[Node], depth: usize) -> fmt::Result {
    for node in nodes {
        write_node(f, node, depth)?;
    }
    Ok(())
}

fn write_node(f: &mut Formatter<'_>, node: &Node, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    write!(f, "{pad}")?;
    match &node.op {
        Op::Const { dest, ty, value } => write!(f, "{dest} = const {value} : {ty}")?,
        Op::Load { dest, ty, var } => write!(f, "{dest} = load {var} : {ty}")?,
        Op::Store {
            var,
            declare,
            value,
        } => {
            let verb = if *declare { "declare" } else { "store" };
            write!(f, "{verb} {var} = {value}")?
        }
        Op::Unary {
            dest,
            ty,
            op,
            operand,
        } => {
            let symbol = match op {
                UnOp::Neg => "neg",
                UnOp::Not => "not",
            };
            write!(f, "{dest} = {symbol} {operand} : {ty}")?
        }
        Op::Binary {
            dest,
            ty,
            op,
            lhs,
            rhs,
        } => write!(f, "{dest} = {lhs} {} {rhs} : {ty}", op.symbol())?,
        Op::Logic {
            dest,
            op,
            lhs,
            rhs_body,
            rhs,
        } => {
            writeln!(f, "{dest} = {} {lhs} {{", op.symbol())?;
            write_body(f, rhs_body, depth + 1)?;
            write!(f, "{pad}}} -> {rhs}")?
        }
        Op::List { dest, ty, items } => write!(f, "{dest} = list [{}] : {ty}", regs(items))?,
        Op::Map { dest, ty, entries } => {
            let entries: Vec<_> = entries.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            write!(f, "{dest} = map {{{}}} : {ty}", entries.join(", "))?
        }
        Op::Record { dest, ty, fields } => {
            let fields: Vec<_> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            write!(f, "{dest} = record {{{}}} : {ty}", fields.join(", "))?
        }
        Op::Field {
            dest,
            ty,
            base,
            field,
        } => write!(f, "{dest} = field {base}.{field} : {ty}")?,
        Op::Index {
            dest,
            ty,
            base,
            index,
        } => write!(f, "{dest} = index {base}[{index}] : {ty}")?,
        Op::Call {
            dest,
            ty,
            function,
            args,
        } => write!(f, "{dest} = call {function}({}) : {ty}", regs(args))?,
        Op::Builtin {
            dest,
            ty,
            builtin,
            args,
            capability,
        } => {
            write!(f, "{dest} = builtin {builtin}({}) : {ty}", regs(args))?;
            if let Some(capability) = capability {
                write!(f, " needs {capability}")?;
            }
        }
        Op::Show { value } => write!(f, "show {value}")?,
        Op::Ask {
            var,
            declare,
            ty,
            prompt,
        } => {
            let verb = if *declare { "declare" } else { "store" };
            write!(f, "ask {verb} {var} : {ty}")?;
            if let Some(prompt) = prompt {
                write!(f, " prompt {prompt}")?;
            }
        }
        Op::Verify { cond } => write!(f, "verify {cond}")?,
        Op::If {
            cond,
            then_body,
            else_body,
        } => {
            writeln!(f, "if {cond} {{")?;
            write_body(f, then_body, depth + 1)?;
            if !else_body.is_empty() {
                writeln!(f, "{pad}}} else {{")?;
                write_body(f, else_body, depth + 1)?;
            }
            write!(f, "{pad}}}")?
        }
        Op::Loop {
            cond_body,
            cond,
            body,
        } => {
            writeln!(f, "loop {{")?;
            write_body(f, cond_body, depth + 1)?;
            writeln!(f, "{pad}}} while {cond} {{")?;
            write_body(f, body, depth + 1)?;
            write!(f, "{pad}}}")?
        }
        Op::Return { value: Some(value) } => write!(f, "return {value}")?,
        Op::Return { value: None } => f.write_str("return")?,
    }
    writeln!(f, "    ; {}", node.origin)
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let params: Vec<_> = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        writeln!(
            f,
            "fn {}({}) -> {} [{}] {{",
            self.name,
            params.join(", "),
            self.ret,
            caps(&self.capabilities)
        )?;
        write_body(f, &self.body, 1)?;
        writeln!(f, "}}")
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "module {} version {} [{}]",
            self.name,
            self.version,
            caps(&self.capabilities)
        )?;
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        writeln!(f)?;
        writeln!(f, "main {{")?;
        write_body(f, &self.main, 1)?;
        writeln!(f, "}}")
    }
}
