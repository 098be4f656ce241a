//! Code generation backends. A backend either produces something the oracle
//! can run, or only a structural snapshot that is checked for determinism.

pub mod function;
pub mod instruction;


use crate::capabilities::CapabilitySet;
use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::interpreter::{Actor, Host, Payload, RunResult, RuntimeError, Trace, Value, stack};
use crate::ir::{Function, Module, Reg};
use crate::span::Origin;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use std::collections::HashMap;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend '{0}' produces snapshots only and cannot be executed")]
    NotExecutable(&'static str),
    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("module rejected: {0}")]
    Rejected(String),
}

/// How far the oracle can trust a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Equivalence {
    /// Running the artifact yields outputs and a store comparable with the
    /// interpreter's.
    Executable,
    /// Only the emitted text can be checked, and only for determinism.
    SnapshotOnly { reason: &'static str },
}

pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    fn equivalence(&self) -> Equivalence;

    /// The backend's artifact for `module`, as text.
    fn emit(&self, module: &Module) -> Result<String, BackendError>;

    fn execute(&self, module: &Module, config: &Config, host: &mut dyn Host) -> Result<RunResult, BackendError> {
        let _ = (module, config, host);
        Err(BackendError::NotExecutable(self.name()))
    }
}

/// Evaluates IR directly.
pub struct IrVm;

/// Pretty-printed IR listing.
pub struct IrListing;

impl Backend for IrVm {
    fn name(&self) -> &'static str {
        "ir-vm"
    }

    fn equivalence(&self) -> Equivalence {
        Equivalence::Executable
    }

    fn emit(&self, module: &Module) -> Result<String, BackendError> {
        Ok(module.to_json()?)
    }

    fn execute(&self, module: &Module, config: &Config, host: &mut dyn Host) -> Result<RunResult, BackendError> {
        crate::ir::IRValidator::validate_module(module).map_err(|errors| {
            let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
            BackendError::Rejected(messages.join("; "))
        })?;
        Ok(stack::on_run_stack(config.max_call_depth, || {
            IrMachine::new(module, config, host).run()
        }))
    }
}

impl Backend for IrListing {
    fn name(&self) -> &'static str {
        "ir-listing"
    }

    fn equivalence(&self) -> Equivalence {
        Equivalence::SnapshotOnly {
            reason: "textual listing is not executable; only its determinism is checked",
        }
    }

    fn emit(&self, module: &Module) -> Result<String, BackendError> {
        Ok(module.to_string())
    }
}

pub const BACKENDS: [&str; 2] = ["ir-vm", "ir-listing"];

pub fn backend(name: &str) -> Option<Box<dyn Backend>> {
    match name {
        "ir-vm" => Some(Box::new(IrVm)),
        "ir-listing" => Some(Box::new(IrListing)),
        _ => None,
    }
}

/// A runtime error together with where it happened.
#[derive(Debug)]
pub(crate) struct Halt {
    pub error: RuntimeError,
    pub origin: Origin,
}

pub(crate) trait At<T> {
    fn at(self, origin: Origin) -> Result<T, Halt>;
}

impl<T> At<T> for Result<T, RuntimeError> {
    fn at(self, origin: Origin) -> Result<T, Halt> {
        self.map_err(|error| Halt { error, origin })
    }
}

pub(crate) enum Flow {
    Next,
    Return(Value),
}

pub(crate) struct Frame<'m> {
    pub capabilities: &'m CapabilitySet,
    pub scopes: Vec<IndexMap<String, Value>>,
    pub registers: HashMap<Reg, Value>,
}

/// Register machine over structured IR. Observable behaviour (outputs,
/// store, trace events, halt codes) matches the reference interpreter.
pub struct IrMachine<'m, 'h> {
    module: &'m Module,
    functions: HashMap<&'m str, &'m Function>,
    host: &'h mut dyn Host,
    inputs: &'m [String],
    next_input: usize,
    max_call_depth: usize,
    frames: Vec<Frame<'m>>,
    outputs: Vec<String>,
    trace: Trace,
    diagnostics: Vec<Diagnostic>,
}

impl<'m, 'h> IrMachine<'m, 'h> {
    pub fn new(module: &'m Module, config: &'m Config, host: &'h mut dyn Host) -> Self {
        IrMachine {
            module,
            functions: module
                .functions
                .iter()
                .map(|f| (f.name.as_str(), f))
                .collect(),
            host,
            inputs: &config.inputs,
            next_input: 0,
            max_call_depth: config.max_call_depth,
            frames: vec![Frame {
                capabilities: &module.capabilities,
                scopes: vec![IndexMap::new()],
                registers: HashMap::new(),
            }],
            outputs: vec![],
            trace: Trace::default(),
            diagnostics: vec![],
        }
    }

    pub fn run(mut self) -> RunResult {
        let module = self.module;
        let completed = match self.exec_region(&module.main, false) {
            Ok(_) => true,
            Err(halt) => {
                self.report(halt);
                false
            }
        };
        let IrMachine {
            mut frames,
            outputs,
            trace,
            diagnostics,
            ..
        } = self;
        let store = frames
            .first_mut()
            .and_then(|frame| frame.scopes.first_mut())
            .map(std::mem::take)
            .unwrap_or_default();
        debug!(outputs = outputs.len(), globals = store.len(), completed, "ir-vm finished");
        RunResult {
            outputs,
            store,
            trace: trace.into_events(),
            diagnostics,
            completed,
        }
    }

    fn report(&mut self, halt: Halt) {
        let diagnostic = halt.error.to_diagnostic(halt.origin);
        self.trace.record(
            halt.origin,
            Actor::Automated,
            None,
            Payload::Diagnostic {
                code: diagnostic.code.clone(),
                message: diagnostic.message.clone(),
            },
        );
        self.diagnostics.push(diagnostic);
    }
}
