use crate::ast::BinOp;
use crate::capabilities::Capability;
use crate::codegen::{At, Flow, Halt, IrMachine};
use crate::interpreter::{Actor, Payload, RuntimeError, Value, ops, perform};
use crate::ir::{Literal, Node, Op, Reg};
use crate::span::Origin;

use indexmap::IndexMap;

use std::collections::BTreeMap;

fn impossible(what: String) -> RuntimeError {
    RuntimeError::TypeImpossible(what)
}

impl IrMachine<'_, '_> {
    /// Runs a region. `scoped` regions get their own variable scope, like a
    /// source block.
    pub(crate) fn exec_region(&mut self, nodes: &[Node], scoped: bool) -> Result<Flow, Halt> {
        if scoped {
            self.frame_mut().scopes.push(IndexMap::new());
        }
        let mut flow = Flow::Next;
        for node in nodes {
            flow = self.exec_instruction(node)?;
            if let Flow::Return(_) = flow {
                break;
            }
        }
        if scoped {
            self.frame_mut().scopes.pop();
        }
        Ok(flow)
    }

    fn bool_reg(&self, reg: Reg, origin: Origin) -> Result<bool, Halt> {
        let value = self.reg(reg).at(origin)?;
        value
            .as_bool()
            .ok_or_else(|| impossible(format!("condition {reg} holds {}", value.type_name())))
            .at(origin)
    }

    fn regs(&self, regs: &[Reg], origin: Origin) -> Result<Vec<Value>, Halt> {
        regs.iter().map(|reg| self.reg(*reg).at(origin)).collect()
    }

    pub(crate) fn exec_instruction(&mut self, node: &Node) -> Result<Flow, Halt> {
        let origin = node.origin;
        match &node.op {
            Op::Const { dest, value, .. } => {
                let value = match value {
                    Literal::Int(i) => Value::Int(*i),
                    Literal::Float(x) => Value::Float(*x),
                    Literal::Bool(b) => Value::Bool(*b),
                    Literal::Text(s) => Value::Text(s.clone()),
                    Literal::Null => Value::Null,
                };
                self.set_reg(*dest, value);
            }
            Op::Load { dest, var, .. } => {
                let value = self.load(var).at(origin)?;
                self.set_reg(*dest, value);
            }
            Op::Store {
                var,
                declare,
                value,
            } => {
                let value = self.reg(*value).at(origin)?;
                self.store(var, *declare, value).at(origin)?;
            }
            Op::Unary {
                dest, op, operand, ..
            } => {
                let operand = self.reg(*operand).at(origin)?;
                let value = ops::unary(*op, operand).at(origin)?;
                self.set_reg(*dest, value);
            }
            Op::Binary {
                dest, op, lhs, rhs, ..
            } => {
                let lhs = self.reg(*lhs).at(origin)?;
                let rhs = self.reg(*rhs).at(origin)?;
                let value = ops::binary(*op, lhs, rhs).at(origin)?;
                self.set_reg(*dest, value);
            }
            Op::Logic {
                dest,
                op,
                lhs,
                rhs_body,
                rhs,
            } => {
                let lhs = self.bool_reg(*lhs, origin)?;
                let result = match op {
                    BinOp::And if !lhs => false,
                    BinOp::Or if lhs => true,
                    _ => {
                        self.exec_region(rhs_body, false)?;
                        self.bool_reg(*rhs, origin)?
                    }
                };
                self.set_reg(*dest, Value::Bool(result));
            }
            Op::List { dest, items, .. } => {
                let items = self.regs(items, origin)?;
                self.set_reg(*dest, Value::List(items));
            }
            Op::Map { dest, entries, .. } => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = self.reg(*key).at(origin)?;
                    let key = key
                        .as_key()
                        .ok_or_else(|| impossible(format!("{} used as a map key", key.type_name())))
                        .at(origin)?;
                    map.insert(key, self.reg(*value).at(origin)?);
                }
                self.set_reg(*dest, Value::Map(map));
            }
            Op::Record { dest, fields, .. } => {
                let mut record = BTreeMap::new();
                for (name, value) in fields {
                    record.insert(name.clone(), self.reg(*value).at(origin)?);
                }
                self.set_reg(*dest, Value::Record(record));
            }
            Op::Field {
                dest, base, field, ..
            } => {
                let base = self.reg(*base).at(origin)?;
                let value = ops::field(base, field).at(origin)?;
                self.set_reg(*dest, value);
            }
            Op::Index {
                dest, base, index, ..
            } => {
                let base = self.reg(*base).at(origin)?;
                let index = self.reg(*index).at(origin)?;
                let value = ops::index(base, index).at(origin)?;
                self.set_reg(*dest, value);
            }
            Op::Call {
                dest,
                function,
                args,
                ..
            } => {
                let args = self.regs(args, origin)?;
                let value = self.call_function(function, args, origin)?;
                self.set_reg(*dest, value);
            }
            Op::Builtin {
                dest,
                builtin,
                args,
                capability,
                ..
            } => {
                let args = self.regs(args, origin)?;
                let value = match capability {
                    Some(capability) => {
                        self.gate(*capability, origin)?;
                        let effect = perform(&mut *self.host, *builtin, args).at(origin)?;
                        self.trace.record(
                            origin,
                            effect.actor,
                            Some(*capability),
                            Payload::Host {
                                builtin: *builtin,
                                target: effect.target,
                            },
                        );
                        effect.value
                    }
                    None => builtin.call_pure(args).at(origin)?,
                };
                self.set_reg(*dest, value);
            }
            Op::Show { value } => {
                let value = self.reg(*value).at(origin)?;
                self.gate(Capability::Io, origin)?;
                let text = value.render();
                self.trace.record(
                    origin,
                    Actor::Automated,
                    Some(Capability::Io),
                    Payload::Show { text: text.clone() },
                );
                self.outputs.push(text);
            }
            Op::Ask {
                var,
                declare,
                ty,
                prompt,
            } => {
                let prompt = match prompt {
                    Some(prompt) => Some(self.reg(*prompt).at(origin)?.render()),
                    None => None,
                };
                self.gate(Capability::Io, origin)?;
                let inputs = self.inputs;
                let Some(input) = inputs.get(self.next_input) else {
                    return Err(RuntimeError::InputExhausted(inputs.len())).at(origin);
                };
                self.next_input += 1;
                let value = Value::parse_input(input, ty)
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
                        name: var.name.clone(),
                        prompt,
                        input: input.clone(),
                    },
                );
                self.store(var, *declare, value).at(origin)?;
            }
            Op::Verify { cond } => {
                if !self.bool_reg(*cond, origin)? {
                    return Err(RuntimeError::VerifyFailed).at(origin);
                }
            }
            Op::If {
                cond,
                then_body,
                else_body,
            } => {
                return if self.bool_reg(*cond, origin)? {
                    self.exec_region(then_body, true)
                } else {
                    self.exec_region(else_body, true)
                };
            }
            Op::Loop {
                cond_body,
                cond,
                body,
            } => loop {
                self.exec_region(cond_body, false)?;
                if !self.bool_reg(*cond, origin)? {
                    break;
                }
                if let Flow::Return(value) = self.exec_region(body, true)? {
                    return Ok(Flow::Return(value));
                }
            },
            Op::Return { value } => {
                let value = match value {
                    Some(value) => self.reg(*value).at(origin)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }
}
