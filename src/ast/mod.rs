pub mod format;

use crate::span::Origin;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExprId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StmtId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

pub const PREC_OR: u8 = 1;
pub const PREC_AND: u8 = 2;
pub const PREC_NOT: u8 = 3;
pub const PREC_EQUALITY: u8 = 4;
pub const PREC_COMPARISON: u8 = 5;
pub const PREC_ADDITIVE: u8 = 6;
pub const PREC_MULTIPLICATIVE: u8 = 7;
pub const PREC_NEG: u8 = 8;
pub const PREC_POSTFIX: u8 = 9;
pub const PREC_ATOM: u8 = 10;

impl BinOp {
    /// Binding strength; every binary operator is left associative.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => PREC_OR,
            BinOp::And => PREC_AND,
            BinOp::Eq | BinOp::NotEq => PREC_EQUALITY,
            BinOp::Less | BinOp::LessEq | BinOp::Greater | BinOp::GreaterEq => PREC_COMPARISON,
            BinOp::Add | BinOp::Sub => PREC_ADDITIVE,
            BinOp::Mul | BinOp::Div | BinOp::Rem => PREC_MULTIPLICATIVE,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Less => "<",
            BinOp::LessEq => "<=",
            BinOp::Greater => ">",
            BinOp::GreaterEq => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            BinOp::Less | BinOp::LessEq | BinOp::Greater | BinOp::GreaterEq
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::NotEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn precedence(self) -> u8 {
        match self {
            UnOp::Neg => PREC_NEG,
            UnOp::Not => PREC_NOT,
        }
    }
}

/// A type as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum TypeExpr {
    Int,
    Float,
    Bool,
    Text,
    Null,
    List(Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Result(Box<TypeExpr>, Box<TypeExpr>),
    Optional(Box<TypeExpr>),
    Record(Vec<(String, TypeExpr)>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ExprKind {
    Int { value: i64 },
    Float { value: f64 },
    Text { value: String },
    Bool { value: bool },
    Null,
    Var { name: String },
    Unary { op: UnOp, operand: ExprId },
    Binary { op: BinOp, lhs: ExprId, rhs: ExprId },
    Call { callee: String, args: Vec<ExprId> },
    List { items: Vec<ExprId> },
    Map { entries: Vec<(ExprId, ExprId)> },
    Record { fields: Vec<(String, ExprId)> },
    Field { base: ExprId, field: String },
    Index { base: ExprId, index: ExprId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    Assign {
        name: String,
        declared: Option<TypeExpr>,
        value: ExprId,
    },
    If {
        cond: ExprId,
        then_body: Vec<StmtId>,
        else_body: Option<Vec<StmtId>>,
    },
    While {
        cond: ExprId,
        body: Vec<StmtId>,
    },
    Return {
        value: Option<ExprId>,
    },
    Show {
        value: ExprId,
    },
    Ask {
        name: String,
        ty: Option<TypeExpr>,
        prompt: Option<ExprId>,
    },
    Verify {
        cond: ExprId,
    },
    Expr {
        expr: ExprId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityName {
    pub name: String,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDecl {
    pub names: Vec<CapabilityName>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub capabilities: Vec<CapabilityName>,
    pub body: Vec<StmtId>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum Item {
    Capabilities(CapabilityDecl),
    Function(Function),
    Stmt { id: StmtId },
}

/// Arena of expressions and statements. Children are referenced by id and a
/// node is only ever referenced by its single parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    pub items: Vec<Item>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_expr(&mut self, kind: ExprKind, origin: Origin) -> ExprId {
        self.exprs.push(Expr { kind, origin });
        ExprId(self.exprs.len() as u32 - 1)
    }

    pub fn add_stmt(&mut self, kind: StmtKind, origin: Origin) -> StmtId {
        self.stmts.push(Stmt { kind, origin });
        StmtId(self.stmts.len() as u32 - 1)
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(function) => Some(function),
            _ => None,
        })
    }

    pub fn capability_decls(&self) -> impl Iterator<Item = &CapabilityDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Capabilities(decl) => Some(decl),
            _ => None,
        })
    }

    /// Top-level statements in program order.
    pub fn top_level(&self) -> Vec<StmtId> {
        self.items
            .iter()
            .filter_map(|item| match item {
                Item::Stmt { id } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Equality that ignores origins. Two parses of the same structure
    /// allocate nodes in the same order, so ids line up.
    pub fn structurally_eq(&self, other: &Ast) -> bool {
        let exprs = self.exprs.len() == other.exprs.len()
            && self
                .exprs
                .iter()
                .zip(&other.exprs)
                .all(|(a, b)| a.kind == b.kind);
        let stmts = self.stmts.len() == other.stmts.len()
            && self
                .stmts
                .iter()
                .zip(&other.stmts)
                .all(|(a, b)| a.kind == b.kind);
        let items = self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| item_shape_eq(a, b));
        exprs && stmts && items
    }
}

fn names_eq(a: &[CapabilityName], b: &[CapabilityName]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.name == y.name)
}

fn item_shape_eq(a: &Item, b: &Item) -> bool {
    match (a, b) {
        (Item::Capabilities(a), Item::Capabilities(b)) => names_eq(&a.names, &b.names),
        (Item::Function(a), Item::Function(b)) => {
            a.name == b.name
                && a.ret == b.ret
                && a.body == b.body
                && names_eq(&a.capabilities, &b.capabilities)
                && a.params.len() == b.params.len()
                && a
                    .params
                    .iter()
                    .zip(&b.params)
                    .all(|(p, q)| p.name == q.name && p.ty == q.ty)
        }
        (Item::Stmt { id: a }, Item::Stmt { id: b }) => a == b,
        _ => false,
    }
}
