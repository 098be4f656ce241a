use super::{Builtin, CallError, take};
use crate::interpreter::{RuntimeError, Value};
use crate::typechecker::Type;

fn expected_result(expected: Option<&Type>) -> Option<(&Type, &Type)> {
    match expected? {
        Type::Result(ok, err) => Some((ok, err)),
        Type::Optional(inner) => expected_result(Some(inner)),
        _ => None,
    }
}

pub fn wrap_hint(builtin: Builtin, expected: Option<&Type>) -> Option<Type> {
    let (ok, err) = expected_result(expected)?;
    match builtin {
        Builtin::Ok => Some(ok.clone()),
        _ => Some(err.clone()),
    }
}

pub fn result_type(builtin: Builtin, args: &[Type], expected: Option<&Type>) -> Result<Type, CallError> {
    let [arg] = args else {
        return Err(CallError::arity(builtin, args.len()));
    };
    match builtin {
        // ok(T) and err(E) take the other half from the context
        Builtin::Ok | Builtin::Err => {
            let Some((ok, err)) = expected_result(expected) else {
                return Err(CallError::cannot_infer(format!(
                    "cannot infer the Result type of '{builtin}(...)'; annotate the binding"
                )));
            };
            let slot = if builtin == Builtin::Ok { ok } else { err };
            if !slot.accepts(arg) {
                return Err(CallError::argument(
                    0,
                    format!("'{builtin}' expects {slot}, found {arg}"),
                ));
            }
            Ok(Type::result(ok.clone(), err.clone()))
        }
        Builtin::IsOk => match arg {
            Type::Result(..) | Type::Error => Ok(Type::Bool),
            other => Err(CallError::argument(
                0,
                format!("'is_ok' expects a Result, found {other}"),
            )),
        },
        // unwrap(Result[T, E]) -> T, unwrap(T?) -> T
        _ => match arg {
            Type::Result(ok, _) => Ok(ok.as_ref().clone()),
            // a present Result[..]? is the bare ok/err value, so unwrap
            // would reach into the Result instead of the optional
            Type::Optional(inner) if matches!(inner.as_ref(), Type::Result(..)) => Err(CallError::argument(
                0,
                format!("'unwrap' cannot take {arg}; compare it with null first, then unwrap the Result"),
            )),
            Type::Optional(inner) => Ok(inner.as_ref().clone()),
            Type::Error => Ok(Type::Error),
            other => Err(CallError::argument(
                0,
                format!("'unwrap' expects a Result or an optional value, found {other}"),
            )),
        },
    }
}

pub fn call(builtin: Builtin, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let [value] = take::<1>(builtin, args)?;
    match (builtin, value) {
        (Builtin::Ok, value) => Ok(Value::Ok(Box::new(value))),
        (Builtin::Err, value) => Ok(Value::Err(Box::new(value))),
        (Builtin::IsOk, Value::Ok(_)) => Ok(Value::Bool(true)),
        (Builtin::IsOk, Value::Err(_)) => Ok(Value::Bool(false)),
        (Builtin::Unwrap, Value::Ok(inner)) => Ok(*inner),
        (Builtin::Unwrap, Value::Err(inner)) => {
            Err(RuntimeError::Unwrap(format!("err({})", inner.render_nested())))
        }
        (Builtin::Unwrap, Value::Null) => Err(RuntimeError::Unwrap("null".to_string())),
        (Builtin::Unwrap, value) => Ok(value),
        (builtin, value) => Err(RuntimeError::TypeImpossible(format!(
            "'{builtin}' of {}",
            value.type_name()
        ))),
    }
}
