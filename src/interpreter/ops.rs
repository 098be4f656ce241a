//! Operator semantics shared by the tree walker and the IR evaluator.

use super::error::{RuntimeError, impossible};
use super::value::Value;
use crate::ast::{BinOp, UnOp};

use std::cmp::Ordering;

pub fn unary(op: UnOp, operand: Value) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (UnOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow("-")),
        (UnOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, value) => Err(impossible(format!(
            "unary {op:?} applied to {}",
            value.type_name()
        ))),
    }
}

/// Strict binary operators. `and`/`or` short-circuit and are handled by the
/// caller; passing them here is a bug.
pub fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    if op.is_equality() {
        let equal = lhs == rhs;
        return Ok(Value::Bool(if op == BinOp::Eq { equal } else { !equal }));
    }
    if op.is_ordering() {
        let ordering = compare(&lhs, &rhs)?;
        let result = match op {
            BinOp::Less => ordering == Ordering::Less,
            BinOp::LessEq => ordering != Ordering::Greater,
            BinOp::Greater => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        return Ok(Value::Bool(result));
    }
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, a, b).map(Value::Int),
        (Value::Float(a), Value::Float(b)) => float_arith(op, a, b).map(Value::Float),
        (Value::Text(a), Value::Text(b)) if op == BinOp::Add => Ok(Value::Text(a + &b)),
        (a, b) => Err(impossible(format!(
            "'{}' applied to {} and {}",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a
            .partial_cmp(b)
            .ok_or_else(|| impossible("comparison of non-finite floats")),
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        (a, b) => Err(impossible(format!(
            "ordering {} against {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Integer arithmetic. Division truncates toward zero; overflow and division
/// by zero halt.
fn int_arith(op: BinOp, a: i64, b: i64) -> Result<i64, RuntimeError> {
    if matches!(op, BinOp::Div | BinOp::Rem) && b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => a.checked_div(b),
        BinOp::Rem => a.checked_rem(b),
        _ => return Err(impossible(format!("'{}' on Int", op.symbol()))),
    };
    result.ok_or(RuntimeError::Overflow(op.symbol()))
}

fn float_arith(op: BinOp, a: f64, b: f64) -> Result<f64, RuntimeError> {
    if matches!(op, BinOp::Div | BinOp::Rem) && b == 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
        _ => return Err(impossible(format!("'{}' on Float", op.symbol()))),
    };
    if result.is_finite() {
        Ok(result)
    } else {
        Err(RuntimeError::NonFinite(op.symbol()))
    }
}

pub fn index(base: Value, index: Value) -> Result<Value, RuntimeError> {
    match (base, index) {
        (Value::List(mut items), Value::Int(i)) => {
            let len = items.len();
            usize::try_from(i)
                .ok()
                .filter(|&at| at < len)
                .map(|at| items.swap_remove(at))
                .ok_or(RuntimeError::IndexOutOfRange { index: i, len })
        }
        (Value::Text(text), Value::Int(i)) => {
            let len = text.chars().count();
            usize::try_from(i)
                .ok()
                .and_then(|at| text.chars().nth(at))
                .map(|c| Value::Text(c.to_string()))
                .ok_or(RuntimeError::IndexOutOfRange { index: i, len })
        }
        (Value::Map(mut entries), key) => {
            let key = key
                .as_key()
                .ok_or_else(|| impossible(format!("map key of type {}", key.type_name())))?;
            entries
                .remove(&key)
                .ok_or_else(|| RuntimeError::MissingKey(key.to_string()))
        }
        (base, index) => Err(impossible(format!(
            "indexing {} with {}",
            base.type_name(),
            index.type_name()
        ))),
    }
}

pub fn field(base: Value, name: &str) -> Result<Value, RuntimeError> {
    match base {
        Value::Record(mut fields) => fields
            .remove(name)
            .ok_or_else(|| impossible(format!("record has no field '{name}'"))),
        other => Err(impossible(format!(
            "field '{name}' on {}",
            other.type_name()
        ))),
    }
}
