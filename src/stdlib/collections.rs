use super::{Builtin, CallError, take};
use crate::interpreter::{RuntimeError, Value};
use crate::typechecker::Type;

// push(list: List[T], item: T) -> List[T]
pub fn push_hint(index: usize, previous: &[Type]) -> Option<Type> {
    match (index, previous.first()) {
        (1, Some(Type::List(inner))) => Some(inner.as_ref().clone()),
        _ => None,
    }
}

pub fn result_type(builtin: Builtin, args: &[Type]) -> Result<Type, CallError> {
    match (builtin, args) {
        // len(List[T] | Map[K, V] | Text) -> Int
        (Builtin::Len, [Type::List(_) | Type::Map(..) | Type::Text | Type::Error]) => Ok(Type::Int),
        (Builtin::Len, [other]) => Err(CallError::argument(
            0,
            format!("'len' expects a List, Map or Text, found {other}"),
        )),

        (Builtin::Push, [Type::List(inner), item]) => {
            if inner.accepts(item) {
                Ok(Type::List(inner.clone()))
            } else {
                Err(CallError::argument(
                    1,
                    format!("cannot push {item} onto List[{inner}]"),
                ))
            }
        }
        (Builtin::Push, [Type::Error, _]) => Ok(Type::Error),
        (Builtin::Push, [other, _]) => Err(CallError::argument(
            0,
            format!("'push' expects a List, found {other}"),
        )),

        // keys(Map[K, V]) -> List[K], in key order
        (Builtin::Keys, [Type::Map(key, _)]) => Ok(Type::List(key.clone())),
        (Builtin::Keys, [Type::Error]) => Ok(Type::Error),
        (Builtin::Keys, [other]) => Err(CallError::argument(
            0,
            format!("'keys' expects a Map, found {other}"),
        )),
        _ => Err(CallError::arity(builtin, args.len())),
    }
}

pub fn call(builtin: Builtin, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match builtin {
        Builtin::Len => {
            let [value] = take::<1>(builtin, args)?;
            let len = match &value {
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                Value::Text(text) => text.chars().count(),
                other => {
                    return Err(RuntimeError::TypeImpossible(format!(
                        "len of {}",
                        other.type_name()
                    )));
                }
            };
            i64::try_from(len)
                .map(Value::Int)
                .map_err(|_| RuntimeError::Overflow("len"))
        }
        Builtin::Push => match take::<2>(builtin, args)? {
            [Value::List(mut items), item] => {
                items.push(item);
                Ok(Value::List(items))
            }
            [other, _] => Err(RuntimeError::TypeImpossible(format!(
                "push onto {}",
                other.type_name()
            ))),
        },
        Builtin::Keys => match take::<1>(builtin, args)? {
            [Value::Map(entries)] => Ok(Value::List(
                entries.keys().map(|key| key.to_value()).collect(),
            )),
            [other] => Err(RuntimeError::TypeImpossible(format!(
                "keys of {}",
                other.type_name()
            ))),
        },
        _ => Err(RuntimeError::TypeImpossible(format!(
            "'{builtin}' is not a collection builtin"
        ))),
    }
}
