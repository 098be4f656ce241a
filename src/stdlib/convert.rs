use super::{Builtin, CallError, take};
use crate::interpreter::{RuntimeError, Value};
use crate::typechecker::Type;

/// The only way to move between Int, Float and Text.
pub fn result_type(builtin: Builtin, args: &[Type]) -> Result<Type, CallError> {
    let [arg] = args else {
        return Err(CallError::arity(builtin, args.len()));
    };
    match (builtin, arg) {
        (Builtin::Str, Type::Function { .. }) => {
            Err(CallError::argument(0, "functions have no text form"))
        }
        (Builtin::Str, _) => Ok(Type::Text),
        (Builtin::Int, Type::Int | Type::Float | Type::Error) => Ok(Type::Int),
        (Builtin::Float, Type::Int | Type::Float | Type::Error) => Ok(Type::Float),
        (_, other) => Err(CallError::argument(
            0,
            format!("'{builtin}' expects Int or Float, found {other}"),
        )),
    }
}

pub fn call(builtin: Builtin, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let [value] = take::<1>(builtin, args)?;
    match (builtin, value) {
        (Builtin::Str, value) => Ok(Value::Text(value.render())),
        (Builtin::Int, Value::Int(i)) => Ok(Value::Int(i)),
        // truncates toward zero like integer division
        (Builtin::Int, Value::Float(f)) => {
            let truncated = f.trunc();
            if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                Ok(Value::Int(truncated as i64))
            } else {
                Err(RuntimeError::Overflow("int"))
            }
        }
        (Builtin::Float, Value::Float(f)) => Ok(Value::Float(f)),
        (Builtin::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (builtin, value) => Err(RuntimeError::TypeImpossible(format!(
            "'{builtin}' of {}",
            value.type_name()
        ))),
    }
}
