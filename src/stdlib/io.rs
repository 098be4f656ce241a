use super::{Builtin, CallError};
use crate::typechecker::Type;

// fetch(url: Text) -> Text            needs net
// read_file(path: Text) -> Text       needs fs
// write_file(path: Text, contents: Text) -> Null   needs fs
pub fn result_type(builtin: Builtin, args: &[Type]) -> Result<Type, CallError> {
    for (i, arg) in args.iter().enumerate() {
        if !Type::Text.accepts(arg) {
            return Err(CallError::argument(
                i,
                format!("'{builtin}' expects Text arguments, found {arg}"),
            ));
        }
    }
    match builtin {
        Builtin::WriteFile => Ok(Type::Null),
        _ => Ok(Type::Text),
    }
}
