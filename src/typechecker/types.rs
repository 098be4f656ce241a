use crate::ast::TypeExpr;

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Structural type. Two types are the same type exactly when they are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum Type {
    Int,
    Float,
    Bool,
    Text,
    Null,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Record(BTreeMap<String, Type>),
    Result(Box<Type>, Box<Type>),
    Optional(Box<Type>),
    Function { params: Vec<Type>, ret: Box<Type> },
    /// Placeholder for an expression that already failed to check. Accepted
    /// everywhere so one mistake is reported once.
    Error,
}

impl Type {
    pub fn list(inner: Type) -> Type {
        Type::List(Box::new(inner))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn result(ok: Type, err: Type) -> Type {
        Type::Result(Box::new(ok), Box::new(err))
    }

    pub fn optional(inner: Type) -> Type {
        match inner {
            // T?? is T?
            Type::Optional(_) | Type::Null | Type::Error => inner,
            inner => Type::Optional(Box::new(inner)),
        }
    }

    pub fn from_expr(expr: &TypeExpr) -> Type {
        match expr {
            TypeExpr::Int => Type::Int,
            TypeExpr::Float => Type::Float,
            TypeExpr::Bool => Type::Bool,
            TypeExpr::Text => Type::Text,
            TypeExpr::Null => Type::Null,
            TypeExpr::List(inner) => Type::list(Type::from_expr(inner)),
            TypeExpr::Map(k, v) => Type::map(Type::from_expr(k), Type::from_expr(v)),
            TypeExpr::Result(t, e) => Type::result(Type::from_expr(t), Type::from_expr(e)),
            TypeExpr::Optional(inner) => Type::optional(Type::from_expr(inner)),
            TypeExpr::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), Type::from_expr(ty)))
                    .collect(),
            ),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Text)
    }

    /// Types usable as map keys.
    pub fn is_key(&self) -> bool {
        matches!(self, Type::Int | Type::Text | Type::Bool | Type::Error)
    }

    /// First map key type anywhere inside `self` that cannot be a key.
    pub fn invalid_key(&self) -> Option<&Type> {
        match self {
            Type::Map(k, _) if !k.is_key() => Some(k),
            Type::Map(a, b) | Type::Result(a, b) => a.invalid_key().or_else(|| b.invalid_key()),
            Type::List(inner) | Type::Optional(inner) => inner.invalid_key(),
            Type::Record(fields) => fields.values().find_map(Type::invalid_key),
            Type::Function { params, ret } => params
                .iter()
                .find_map(Type::invalid_key)
                .or_else(|| ret.invalid_key()),
            _ => None,
        }
    }

    /// Whether a value of type `value` may be bound where `self` is expected.
    pub fn accepts(&self, value: &Type) -> bool {
        match (self, value) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Optional(_), Type::Null) => true,
            (Type::Optional(a), Type::Optional(b)) => a.accepts(b),
            (Type::Optional(a), v) => a.accepts(v),
            (Type::List(a), Type::List(b)) => a.accepts(b),
            (Type::Map(k1, v1), Type::Map(k2, v2)) => k1 == k2 && v1.accepts(v2),
            (Type::Result(t1, e1), Type::Result(t2, e2)) => t1.accepts(t2) && e1.accepts(e2),
            (Type::Record(a), Type::Record(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(name, ty)| b.get(name).is_some_and(|other| ty.accepts(other)))
            }
            (a, b) => a == b,
        }
    }

    /// Types that `==` may compare with each other.
    pub fn comparable(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Optional(_), Type::Null) | (Type::Null, Type::Optional(_)) => true,
            (Type::Optional(inner), t) | (t, Type::Optional(inner)) => {
                inner.as_ref() == t || inner.accepts(t) || t.accepts(inner)
            }
            (Type::Function { .. }, _) | (_, Type::Function { .. }) => false,
            (a, b) => a.accepts(b) || b.accepts(a),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Bool => write!(f, "Bool"),
            Type::Text => write!(f, "Text"),
            Type::Null => write!(f, "Null"),
            Type::List(inner) => write!(f, "List[{inner}]"),
            Type::Map(k, v) => write!(f, "Map[{k}, {v}]"),
            Type::Result(t, e) => write!(f, "Result[{t}, {e}]"),
            Type::Optional(inner) => write!(f, "{inner}?"),
            Type::Record(fields) => {
                write!(f, "Record{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, "}}")
            }
            Type::Function { params, ret } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Error => write!(f, "<error>"),
        }
    }
}
