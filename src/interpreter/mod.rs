//! Reference tree-walking interpreter. Its outputs, final global store and
//! trace are the ground truth every backend is compared against.

pub mod error;
pub mod host;
pub mod ops;
pub mod stack;
pub mod trace;
pub mod value;

#[cfg(test)]
pub mod test;

pub use error::{HostError, RuntimeError};
pub use host::{Effect, Host, MockHost, perform};
pub use trace::{Actor, Payload, Trace, TraceEvent};
pub use value::{MapKey, Value};

use crate::ast::{BinOp, ExprId, ExprKind, Function, StmtId, StmtKind};
use crate::capabilities::{AnnotatedAst, Capability};
use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::span::Origin;
use crate::stdlib::Builtin;
use crate::typechecker::{Scope, Type};

use error::impossible;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use std::collections::{BTreeMap, HashMap};

/// The externally observable part of a run: what the equivalence oracle
/// compares.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub outputs: Vec<String>,
    pub store: IndexMap<String, Value>,
    /// Code of the runtime error that stopped the run, if any.
    pub halt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub outputs: Vec<String>,
    pub store: IndexMap<String, Value>,
    pub trace: Vec<TraceEvent>,
    pub diagnostics: Vec<Diagnostic>,
    pub completed: bool,
}

impl RunResult {
    pub fn observation(&self) -> Observation {
        Observation {
            outputs: self.outputs.clone(),
            store: self.store.clone(),
            halt: self.diagnostics.first().map(|d| d.code.clone()),
        }
    }
}

/// A runtime error together with where it happened.
#[derive(Debug)]
struct Halt {
    error: RuntimeError,
    origin: Origin,
}

trait At<T> {
    fn at(self, origin: Origin) -> Result<T, Halt>;
}

impl<T> At<T> for Result<T, RuntimeError> {
    fn at(self, origin: Origin) -> Result<T, Halt> {
        self.map_err(|error| Halt { error, origin })
    }
}

enum Flow {
    Next,
    Return(Value),
}

struct Frame<'p> {
    /// `None` for the top-level frame.
    function: Option<&'p str>,
    scopes: Vec<IndexMap<String, Value>>,
}

/// Runs a checked program to completion or to its first runtime error.
pub fn run(program: &AnnotatedAst, config: &Config, host: &mut dyn Host) -> RunResult {
    stack::on_run_stack(config.max_call_depth, || run_in_place(program, config, host))
}

fn run_in_place(program: &AnnotatedAst, config: &Config, host: &mut dyn Host) -> RunResult {
    let mut interpreter = Interpreter::new(program, config, host);
    let completed = match interpreter.run_top_level() {
        Ok(()) => true,
        Err(halt) => {
            interpreter.report(halt);
            false
        }
    };
    let Interpreter {
        mut frames,
        outputs,
        trace,
        diagnostics,
        ..
    } = interpreter;
    let store = frames
        .first_mut()
        .and_then(|frame| frame.scopes.first_mut())
        .map(std::mem::take)
        .unwrap_or_default();
    debug!(
        outputs = outputs.len(),
        globals = store.len(),
        completed,
        "run finished"
    );
    RunResult {
        outputs,
        store,
        trace: trace.into_events(),
        diagnostics,
        completed,
    }
}

struct Interpreter<'p, 'h> {
    program: &'p AnnotatedAst,
    functions: HashMap<&'p str, &'p Function>,
    host: &'h mut dyn Host,
    inputs: &'p [String],
    next_input: usize,
    max_call_depth: usize,
    frames: Vec<Frame<'p>>,
    outputs: Vec<String>,
    trace: Trace,
    diagnostics: Vec<Diagnostic>,
}

impl<'p, 'h> Interpreter<'p, 'h> {
    fn new(program: &'p AnnotatedAst, config: &'p Config, host: &'h mut dyn Host) -> Self {
        let functions = program
            .typed
            .ast
            .functions()
            .map(|f| (f.name.as_str(), f))
            .collect();
        Interpreter {
            program,
            functions,
            host,
            inputs: &config.inputs,
            next_input: 0,
            max_call_depth: config.max_call_depth,
            frames: vec![Frame {
                function: None,
                scopes: vec![IndexMap::new()],
            }],
            outputs: vec![],
            trace: Trace::default(),
            diagnostics: vec![],
        }
    }

    fn run_top_level(&mut self) -> Result<(), Halt> {
        for id in self.program.typed.ast.top_level() {
            // `return` never reaches top level in a checked program
            if let Flow::Return(_) = self.exec_stmt(id)? {
                return Ok(());
            }
        }
        Ok(())
    }

    fn report(&mut self, halt: Halt) {
        let diagnostic = halt.error.to_diagnostic(halt.origin);
        debug!(code = %diagnostic.code, origin = %halt.origin, "runtime error");
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

    fn frame(&self) -> &Frame<'p> {
        // the top-level frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame<'p> {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn globals(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.frames[0].scopes[0]
    }

    fn exec_block(&mut self, stmts: &[StmtId]) -> Result<Flow, Halt> {
        self.frame_mut().scopes.push(IndexMap::new());
        let mut flow = Flow::Next;
        for id in stmts {
            flow = self.exec_stmt(*id)?;
            if let Flow::Return(_) = flow {
                break;
            }
        }
        self.frame_mut().scopes.pop();
        Ok(flow)
    }

    fn exec_stmt(&mut self, id: StmtId) -> Result<Flow, Halt> {
        let program = self.program;
        let stmt = program.typed.ast.stmt(id);
        let origin = stmt.origin;
        match &stmt.kind {
            StmtKind::Assign { name, value, .. } => {
                let value = self.eval(*value)?;
                self.bind(id, name, value, origin)?;
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                if self.eval_bool(*cond)? {
                    return self.exec_block(then_body);
                } else if let Some(else_body) = else_body {
                    return self.exec_block(else_body);
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_bool(*cond)? {
                    if let Flow::Return(value) = self.exec_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            StmtKind::Return { value } => {
                let value = match value {
                    Some(value) => self.eval(*value)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Show { value } => {
                let value = self.eval(*value)?;
                self.gate(Capability::Io, origin)?;
                let text = value.render();
                tracing::trace!(%text, "show");
                self.trace.record(
                    origin,
                    Actor::Automated,
                    Some(Capability::Io),
                    Payload::Show { text: text.clone() },
                );
                self.outputs.push(text);
            }
            StmtKind::Ask { name, ty, prompt } => {
                let prompt = match prompt {
                    Some(prompt) => Some(self.eval(*prompt)?.render()),
                    None => None,
                };
                self.gate(Capability::Io, origin)?;
                let inputs = self.inputs;
                let Some(input) = inputs.get(self.next_input) else {
                    return Err(RuntimeError::InputExhausted(inputs.len())).at(origin);
                };
                self.next_input += 1;
                let ty = ty.as_ref().map_or(Type::Text, Type::from_expr);
                let value = Value::parse_input(input, &ty)
                    .ok_or_else(|| RuntimeError::BadInput {
                        input: input.clone(),
                        expected: ty.to_string(),
                    })
                    .at(origin)?;
                self.trace.record(
                    origin,
                    Actor::Human,
                    Some(Capability::Io),
                    Payload::Ask {
                        name: name.clone(),
                        prompt,
                        input: input.clone(),
                    },
                );
                self.bind(id, name, value, origin)?;
            }
            StmtKind::Verify { cond } => {
                if !self.eval_bool(*cond)? {
                    return Err(RuntimeError::VerifyFailed).at(origin);
                }
            }
            StmtKind::Expr { expr } => {
                self.eval(*expr)?;
            }
        }
        Ok(Flow::Next)
    }

    fn bind(&mut self, id: StmtId, name: &str, value: Value, origin: Origin) -> Result<(), Halt> {
        let program = self.program;
        let Some(binding) = program.typed.binding(id) else {
            return Err(impossible(format!("no binding recorded for '{name}'"))).at(origin);
        };
        if binding.declares {
            if let Some(scope) = self.frame_mut().scopes.last_mut() {
                scope.insert(name.to_string(), value);
            }
            return Ok(());
        }
        let slot = match binding.scope {
            Scope::Global => self.globals().get_mut(name),
            Scope::Local => self
                .frame_mut()
                .scopes
                .iter_mut()
                .rev()
                .find_map(|scope| scope.get_mut(name)),
        };
        match slot {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(impossible(format!("assignment to unbound '{name}'"))).at(origin),
        }
    }

    fn lookup(&self, id: ExprId, name: &str) -> Result<Value, RuntimeError> {
        let found = match self.program.typed.scope_of(id) {
            Some(Scope::Global) => self.frames[0].scopes[0].get(name),
            _ => self
                .frame()
                .scopes
                .iter()
                .rev()
                .find_map(|scope| scope.get(name)),
        };
        found
            .cloned()
            .ok_or_else(|| impossible(format!("'{name}' read before it was bound")))
    }

    /// Runtime half of capability checking: the current frame's owner must
    /// declare `capability`.
    fn gate(&self, capability: Capability, origin: Origin) -> Result<(), Halt> {
        let granted = self
            .program
            .capabilities
            .declared(self.frame().function)
            .is_some_and(|set| set.contains(&capability));
        if granted {
            Ok(())
        } else {
            Err(RuntimeError::CapabilityDenied(capability)).at(origin)
        }
    }

    fn eval_bool(&mut self, id: ExprId) -> Result<bool, Halt> {
        let origin = self.program.typed.ast.expr(id).origin;
        let value = self.eval(id)?;
        value
            .as_bool()
            .ok_or_else(|| impossible(format!("condition evaluated to {}", value.type_name())))
            .at(origin)
    }

    fn eval(&mut self, id: ExprId) -> Result<Value, Halt> {
        let program = self.program;
        let expr = program.typed.ast.expr(id);
        let origin = expr.origin;
        match &expr.kind {
            ExprKind::Int { value } => Ok(Value::Int(*value)),
            ExprKind::Float { value } => Ok(Value::Float(*value)),
            ExprKind::Text { value } => Ok(Value::Text(value.clone())),
            ExprKind::Bool { value } => Ok(Value::Bool(*value)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Var { name } => self.lookup(id, name).at(origin),
            ExprKind::Unary { op, operand } => {
                let operand = self.eval(*operand)?;
                ops::unary(*op, operand).at(origin)
            }
            ExprKind::Binary { op, lhs, rhs } if op.is_logical() => {
                let lhs = self.eval_bool(*lhs)?;
                // short-circuit
                let result = match op {
                    BinOp::And if !lhs => false,
                    BinOp::Or if lhs => true,
                    _ => self.eval_bool(*rhs)?,
                };
                Ok(Value::Bool(result))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(*lhs)?;
                let rhs = self.eval(*rhs)?;
                ops::binary(*op, lhs, rhs).at(origin)
            }
            ExprKind::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(*arg)?);
                }
                self.call(callee, values, origin)
            }
            ExprKind::List { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(*item)?);
                }
                Ok(Value::List(values))
            }
            ExprKind::Map { entries } => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key_origin = program.typed.ast.expr(*key).origin;
                    let key = self.eval(*key)?;
                    let key = key
                        .as_key()
                        .ok_or_else(|| impossible(format!("{} used as a map key", key.type_name())))
                        .at(key_origin)?;
                    let value = self.eval(*value)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            ExprKind::Record { fields } => {
                let mut record = BTreeMap::new();
                for (name, value) in fields {
                    record.insert(name.clone(), self.eval(*value)?);
                }
                Ok(Value::Record(record))
            }
            ExprKind::Field { base, field } => {
                let base = self.eval(*base)?;
                ops::field(base, field).at(origin)
            }
            ExprKind::Index { base, index } => {
                let base = self.eval(*base)?;
                let index = self.eval(*index)?;
                ops::index(base, index).at(origin)
            }
        }
    }

    fn call(&mut self, callee: &str, args: Vec<Value>, origin: Origin) -> Result<Value, Halt> {
        if let Some(function) = self.functions.get(callee).copied() {
            return self.call_function(function, args, origin);
        }
        let builtin = Builtin::from_name(callee)
            .ok_or_else(|| impossible(format!("call to unknown function '{callee}'")))
            .at(origin)?;
        match builtin.capability() {
            Some(capability) => self.call_host(builtin, capability, args, origin),
            None => builtin.call_pure(args).at(origin),
        }
    }

    fn call_function(&mut self, function: &'p Function, args: Vec<Value>, origin: Origin) -> Result<Value, Halt> {
        // the top-level frame does not count towards the depth
        if self.frames.len() > self.max_call_depth {
            return Err(RuntimeError::CallDepth(self.max_call_depth)).at(origin);
        }
        if args.len() != function.params.len() {
            return Err(impossible(format!(
                "'{}' called with {} argument(s)",
                function.name,
                args.len()
            )))
            .at(origin);
        }
        let params = function
            .params
            .iter()
            .map(|p| p.name.clone())
            .zip(args)
            .collect();
        self.frames.push(Frame {
            function: Some(function.name.as_str()),
            scopes: vec![params],
        });
        let flow = self.exec_block(&function.body)?;
        self.frames.pop();
        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Next => Value::Null,
        })
    }

    fn call_host(&mut self, builtin: Builtin, capability: Capability, args: Vec<Value>, origin: Origin) -> Result<Value, Halt> {
        self.gate(capability, origin)?;
        let effect = host::perform(&mut *self.host, builtin, args).at(origin)?;
        self.trace.record(
            origin,
            effect.actor,
            Some(capability),
            Payload::Host {
                builtin,
                target: effect.target,
            },
        );
        Ok(effect.value)
    }
}
