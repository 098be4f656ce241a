use crate::capabilities::Capability;
use crate::codegen::{At, Flow, Frame, Halt, IrMachine};
use crate::interpreter::{RuntimeError, Value};
use crate::ir::{Function, Reg, Slot};
use crate::span::Origin;
use crate::typechecker::Scope;

use indexmap::IndexMap;

use std::collections::HashMap;

fn impossible(what: String) -> RuntimeError {
    RuntimeError::TypeImpossible(what)
}

impl<'m> IrMachine<'m, '_> {
    pub(crate) fn frame(&self) -> &Frame<'m> {
        // the main frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame<'m> {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub(crate) fn reg(&self, reg: Reg) -> Result<Value, RuntimeError> {
        self.frame()
            .registers
            .get(&reg)
            .cloned()
            .ok_or_else(|| impossible(format!("{reg} read before it was defined")))
    }

    pub(crate) fn set_reg(&mut self, reg: Reg, value: Value) {
        self.frame_mut().registers.insert(reg, value);
    }

    pub(crate) fn load(&self, var: &Slot) -> Result<Value, RuntimeError> {
        let found = match var.scope {
            Scope::Global => self.frames[0].scopes[0].get(&var.name),
            Scope::Local => self
                .frame()
                .scopes
                .iter()
                .rev()
                .find_map(|scope| scope.get(&var.name)),
        };
        found
            .cloned()
            .ok_or_else(|| impossible(format!("'{}' read before it was bound", var.name)))
    }

    pub(crate) fn store(&mut self, var: &Slot, declare: bool, value: Value) -> Result<(), RuntimeError> {
        if declare {
            if let Some(scope) = self.frame_mut().scopes.last_mut() {
                scope.insert(var.name.clone(), value);
            }
            return Ok(());
        }
        let slot = match var.scope {
            Scope::Global => self.frames[0].scopes[0].get_mut(&var.name),
            Scope::Local => self
                .frame_mut()
                .scopes
                .iter_mut()
                .rev()
                .find_map(|scope| scope.get_mut(&var.name)),
        };
        match slot {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(impossible(format!("assignment to unbound '{}'", var.name))),
        }
    }

    pub(crate) fn gate(&self, capability: Capability, origin: Origin) -> Result<(), Halt> {
        if self.frame().capabilities.contains(&capability) {
            Ok(())
        } else {
            Err(RuntimeError::CapabilityDenied(capability)).at(origin)
        }
    }

    pub(crate) fn call_function(&mut self, name: &str, args: Vec<Value>, origin: Origin) -> Result<Value, Halt> {
        let function: &'m Function = self
            .functions
            .get(name)
            .copied()
            .ok_or_else(|| impossible(format!("call to unknown function '{name}'")))
            .at(origin)?;
        if self.frames.len() > self.max_call_depth {
            return Err(RuntimeError::CallDepth(self.max_call_depth)).at(origin);
        }
        if args.len() != function.params.len() {
            return Err(impossible(format!(
                "'{name}' called with {} argument(s)",
                args.len()
            )))
            .at(origin);
        }
        let params: IndexMap<String, Value> = function
            .params
            .iter()
            .map(|p| p.name.clone())
            .zip(args)
            .collect();
        self.frames.push(Frame {
            capabilities: &function.capabilities,
            scopes: vec![params],
            registers: HashMap::new(),
        });
        let flow = self.exec_region(&function.body, true)?;
        self.frames.pop();
        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Next => Value::Null,
        })
    }
}
