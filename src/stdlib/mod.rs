//! Built-in functions. Typing lives next to evaluation so the two cannot
//! drift apart; the capability-gated ones are evaluated by the interpreter
//! through its host.

pub mod collections;
pub mod convert;
pub mod io;
pub mod result;

use crate::capabilities::Capability;
use crate::interpreter::{RuntimeError, Value};
use crate::typechecker::Type;

use serde::{Deserialize, Serialize};

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    Len,
    Str,
    Int,
    Float,
    Push,
    Keys,
    Ok,
    Err,
    IsOk,
    Unwrap,
    Fetch,
    ReadFile,
    WriteFile,
}

/// Why a builtin call does not typecheck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    pub code: &'static str,
    pub message: String,
    /// Offending argument, when there is one.
    pub arg: Option<usize>,
}

impl CallError {
    pub(crate) fn argument(arg: usize, message: impl Into<String>) -> Self {
        CallError {
            code: "HND-TC-0303",
            message: message.into(),
            arg: Some(arg),
        }
    }

    pub(crate) fn arity(builtin: Builtin, given: usize) -> Self {
        CallError {
            code: "HND-TC-0302",
            message: format!(
                "'{}' takes {} argument(s) but {given} were given",
                builtin.name(),
                builtin.arity()
            ),
            arg: None,
        }
    }

    pub(crate) fn cannot_infer(message: impl Into<String>) -> Self {
        CallError {
            code: "HND-TC-1103",
            message: message.into(),
            arg: None,
        }
    }
}

impl Builtin {
    pub const ALL: [Builtin; 13] = [
        Builtin::Len,
        Builtin::Str,
        Builtin::Int,
        Builtin::Float,
        Builtin::Push,
        Builtin::Keys,
        Builtin::Ok,
        Builtin::Err,
        Builtin::IsOk,
        Builtin::Unwrap,
        Builtin::Fetch,
        Builtin::ReadFile,
        Builtin::WriteFile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Push => "push",
            Builtin::Keys => "keys",
            Builtin::Ok => "ok",
            Builtin::Err => "err",
            Builtin::IsOk => "is_ok",
            Builtin::Unwrap => "unwrap",
            Builtin::Fetch => "fetch",
            Builtin::ReadFile => "read_file",
            Builtin::WriteFile => "write_file",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Push | Builtin::WriteFile => 2,
            _ => 1,
        }
    }

    /// Capability a call needs, if it touches the outside world.
    pub fn capability(self) -> Option<Capability> {
        match self {
            Builtin::Fetch => Some(Capability::Net),
            Builtin::ReadFile | Builtin::WriteFile => Some(Capability::Fs),
            _ => None,
        }
    }

    /// Expected type for argument `index`, given the arguments already
    /// checked and the type the call site wants back.
    pub fn hint(self, index: usize, previous: &[Type], expected: Option<&Type>) -> Option<Type> {
        match self {
            Builtin::Push => collections::push_hint(index, previous),
            Builtin::Ok | Builtin::Err => result::wrap_hint(self, expected),
            Builtin::Fetch | Builtin::ReadFile | Builtin::WriteFile => Some(Type::Text),
            _ => None,
        }
    }

    /// Result type of a call with the given argument types.
    pub fn result_type(self, args: &[Type], expected: Option<&Type>) -> Result<Type, CallError> {
        if args.len() != self.arity() {
            return Err(CallError::arity(self, args.len()));
        }
        match self {
            Builtin::Len | Builtin::Push | Builtin::Keys => collections::result_type(self, args),
            Builtin::Str | Builtin::Int | Builtin::Float => convert::result_type(self, args),
            Builtin::Ok | Builtin::Err | Builtin::IsOk | Builtin::Unwrap => {
                result::result_type(self, args, expected)
            }
            Builtin::Fetch | Builtin::ReadFile | Builtin::WriteFile => io::result_type(self, args),
        }
    }

    /// Evaluates a builtin that needs no capability.
    pub fn call_pure(self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self {
            Builtin::Len | Builtin::Push | Builtin::Keys => collections::call(self, args),
            Builtin::Str | Builtin::Int | Builtin::Float => convert::call(self, args),
            Builtin::Ok | Builtin::Err | Builtin::IsOk | Builtin::Unwrap => result::call(self, args),
            Builtin::Fetch | Builtin::ReadFile | Builtin::WriteFile => Err(RuntimeError::TypeImpossible(
                format!("'{}' needs a host", self.name()),
            )),
        }
    }
}

impl Display for Builtin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exactly `N` arguments, or a type-impossible error.
pub(crate) fn take<const N: usize>(builtin: Builtin, args: Vec<Value>) -> Result<[Value; N], RuntimeError> {
    let count = args.len();
    args.try_into().map_err(|_| {
        RuntimeError::TypeImpossible(format!("'{builtin}' called with {count} argument(s)"))
    })
}
