use crate::capabilities::Capability;
use crate::diagnostic::Diagnostic;
use crate::span::Origin;

use thiserror::Error;

/// Failure reported by a [`super::Host`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("no resource at '{0}'")]
    NotFound(String),
}

/// Everything that halts execution. Each variant has a stable code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("'ask' needs input but all {0} supplied inputs were consumed")]
    InputExhausted(usize),
    #[error("input {input:?} is not a valid {expected}")]
    BadInput { input: String, expected: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in '{0}'")]
    Overflow(&'static str),
    #[error("float operation '{0}' produced a non-finite result")]
    NonFinite(&'static str),
    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("map has no key {0}")]
    MissingKey(String),
    #[error("unwrap called on {0}")]
    Unwrap(String),
    #[error("verification failed")]
    VerifyFailed,
    #[error("{op} failed: {source}")]
    Host {
        op: &'static str,
        #[source]
        source: HostError,
    },
    #[error("capability '{0}' is not granted here")]
    CapabilityDenied(Capability),
    #[error("call depth limit of {0} exceeded")]
    CallDepth(usize),
    #[error("could not reserve a stack for the run: {0}")]
    Stack(String),
    #[error("impossible state: {0}")]
    TypeImpossible(String),
}

impl RuntimeError {
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::InputExhausted(_) => "HND-RT-0101",
            RuntimeError::BadInput { .. } => "HND-RT-0102",
            RuntimeError::DivisionByZero => "HND-RT-0201",
            RuntimeError::Overflow(_) => "HND-RT-0202",
            RuntimeError::NonFinite(_) => "HND-RT-0203",
            RuntimeError::IndexOutOfRange { .. } => "HND-RT-0301",
            RuntimeError::MissingKey(_) => "HND-RT-0302",
            RuntimeError::Unwrap(_) => "HND-RT-0303",
            RuntimeError::VerifyFailed => "HND-RT-0401",
            RuntimeError::Host { .. } => "HND-RT-0501",
            RuntimeError::CapabilityDenied(_) => "HND-RT-0601",
            RuntimeError::CallDepth(_) => "HND-RT-0701",
            RuntimeError::Stack(_) => "HND-RT-0702",
            RuntimeError::TypeImpossible(_) => "HND-RT-0002",
        }
    }

    pub fn to_diagnostic(&self, origin: Origin) -> Diagnostic {
        Diagnostic::fatal(self.code(), origin, self.to_string())
    }
}

pub(crate) fn impossible(what: impl Into<String>) -> RuntimeError {
    RuntimeError::TypeImpossible(what.into())
}
