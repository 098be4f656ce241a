use super::*;
use crate::ast::{ExprId, ExprKind, StmtId, StmtKind};
use crate::capabilities::AnnotatedAst;
use crate::typechecker::TypedAst;

use tracing::debug;

#[derive(Debug, Clone)]
pub struct LowerResult {
    /// `None` when lowering or validation failed.
    pub module: Option<Module>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lowers a checked program and validates the result. A module that fails
/// validation is never handed to a backend.
pub fn lower(program: &AnnotatedAst, module_name: &str) -> LowerResult {
    let mut builder = IRBuilder::new(program, module_name);
    let module = match builder.generate_module() {
        Ok(module) => module,
        Err(error) => {
            return LowerResult {
                module: None,
                diagnostics: vec![error.to_diagnostic(Origin::default())],
            };
        }
    };
    match IRValidator::validate_module(&module) {
        Ok(()) => {
            debug!(
                functions = module.functions.len(),
                main = module.main.len(),
                "lowered module"
            );
            LowerResult {
                module: Some(module),
                diagnostics: vec![],
            }
        }
        Err(errors) => LowerResult {
            module: None,
            diagnostics: errors
                .iter()
                .map(|error| error.to_diagnostic(Origin::default()))
                .collect(),
        },
    }
}

pub struct IRBuilder<'a> {
    program: &'a AnnotatedAst,
    module_name: String,
    register_counter: u32,
    /// Innermost region last; nodes are appended to it.
    regions: Vec<Vec<Node>>,
}

impl<'a> IRBuilder<'a> {
    pub fn new(program: &'a AnnotatedAst, module_name: &str) -> Self {
        IRBuilder {
            program,
            module_name: module_name.to_string(),
            register_counter: 0,
            regions: vec![],
        }
    }

    pub fn generate_module(&mut self) -> Result<Module, SchemaError> {
        let program = self.program;
        let typed = &program.typed;
        let mut functions = Vec::new();
        for function in typed.ast.functions() {
            functions.push(self.generate_function(typed, function)?);
        }

        self.register_counter = 0;
        self.regions.push(vec![]);
        for id in typed.ast.top_level() {
            self.generate_stmt(id)?;
        }
        let main = self.pop_region();

        Ok(Module {
            version: IR_VERSION.to_string(),
            name: self.module_name.clone(),
            capabilities: program.capabilities.module.declared.clone(),
            functions,
            main,
        })
    }

    fn generate_function(&mut self, typed: &TypedAst, function: &crate::ast::Function) -> Result<Function, SchemaError> {
        let signature = typed.functions.get(&function.name).ok_or_else(|| {
            SchemaError::Lowering(format!("no signature for '{}'", function.name))
        })?;
        let capabilities = self
            .program
            .capabilities
            .declared(Some(function.name.as_str()))
            .cloned()
            .unwrap_or_default();
        let params = function
            .params
            .iter()
            .zip(&signature.params)
            .map(|(param, ty)| Param {
                name: param.name.clone(),
                ty: ty.clone(),
            })
            .collect();

        self.register_counter = 0;
        self.regions.push(vec![]);
        for id in &function.body {
            self.generate_stmt(*id)?;
        }
        let body = self.pop_region();

        Ok(Function {
            name: function.name.clone(),
            params,
            ret: signature.ret.clone(),
            capabilities,
            body,
            origin: function.origin,
        })
    }

    fn generate_block(&mut self, stmts: &[StmtId]) -> Result<Vec<Node>, SchemaError> {
        self.regions.push(vec![]);
        for id in stmts {
            self.generate_stmt(*id)?;
        }
        Ok(self.pop_region())
    }

    fn generate_stmt(&mut self, id: StmtId) -> Result<(), SchemaError> {
        let program = self.program;
        let typed = &program.typed;
        let stmt = typed.ast.stmt(id);
        let origin = stmt.origin;
        let op = match &stmt.kind {
            StmtKind::Assign { name, value, .. } => {
                let value = self.generate_expr(*value)?;
                let binding = self.binding(id, name)?;
                Op::Store {
                    var: Slot {
                        name: name.clone(),
                        scope: binding.scope,
                    },
                    declare: binding.declares,
                    value,
                }
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let cond = self.generate_expr(*cond)?;
                let then_body = self.generate_block(then_body)?;
                let else_body = match else_body {
                    Some(stmts) => self.generate_block(stmts)?,
                    None => vec![],
                };
                Op::If {
                    cond,
                    then_body,
                    else_body,
                }
            }
            StmtKind::While { cond, body } => {
                self.regions.push(vec![]);
                let cond = self.generate_expr(*cond)?;
                let cond_body = self.pop_region();
                let body = self.generate_block(body)?;
                Op::Loop {
                    cond_body,
                    cond,
                    body,
                }
            }
            StmtKind::Return { value } => {
                let value = match value {
                    Some(value) => Some(self.generate_expr(*value)?),
                    None => None,
                };
                Op::Return { value }
            }
            StmtKind::Show { value } => Op::Show {
                value: self.generate_expr(*value)?,
            },
            StmtKind::Ask { name, ty, prompt } => {
                let prompt = match prompt {
                    Some(prompt) => Some(self.generate_expr(*prompt)?),
                    None => None,
                };
                let binding = self.binding(id, name)?;
                Op::Ask {
                    var: Slot {
                        name: name.clone(),
                        scope: binding.scope,
                    },
                    declare: binding.declares,
                    ty: ty.as_ref().map_or(Type::Text, Type::from_expr),
                    prompt,
                }
            }
            StmtKind::Verify { cond } => Op::Verify {
                cond: self.generate_expr(*cond)?,
            },
            StmtKind::Expr { expr } => {
                self.generate_expr(*expr)?;
                return Ok(());
            }
        };
        self.add_node(op, origin);
        Ok(())
    }

    fn generate_expr(&mut self, id: ExprId) -> Result<Reg, SchemaError> {
        let program = self.program;
        let typed = &program.typed;
        let expr = typed.ast.expr(id);
        let origin = expr.origin;
        let ty = typed.type_of(id).clone();
        // operands are lowered before the result register is allocated
        let op = match &expr.kind {
            ExprKind::Int { value } => self.constant(ty, Literal::Int(*value)),
            ExprKind::Float { value } => self.constant(ty, Literal::Float(*value)),
            ExprKind::Text { value } => self.constant(ty, Literal::Text(value.clone())),
            ExprKind::Bool { value } => self.constant(ty, Literal::Bool(*value)),
            ExprKind::Null => self.constant(ty, Literal::Null),
            ExprKind::Var { name } => {
                let scope = typed.scope_of(id).ok_or_else(|| {
                    SchemaError::Lowering(format!("no scope recorded for '{name}' at {origin}"))
                })?;
                Op::Load {
                    dest: self.new_register(),
                    ty,
                    var: Slot {
                        name: name.clone(),
                        scope,
                    },
                }
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.generate_expr(*operand)?;
                Op::Unary {
                    dest: self.new_register(),
                    ty,
                    op: *op,
                    operand,
                }
            }
            ExprKind::Binary { op, lhs, rhs } if op.is_logical() => {
                let lhs = self.generate_expr(*lhs)?;
                self.regions.push(vec![]);
                let rhs = self.generate_expr(*rhs)?;
                let rhs_body = self.pop_region();
                Op::Logic {
                    dest: self.new_register(),
                    op: *op,
                    lhs,
                    rhs_body,
                    rhs,
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.generate_expr(*lhs)?;
                let rhs = self.generate_expr(*rhs)?;
                Op::Binary {
                    dest: self.new_register(),
                    ty,
                    op: *op,
                    lhs,
                    rhs,
                }
            }
            ExprKind::Call { callee, args } => {
                let args = self.generate_args(args)?;
                let dest = self.new_register();
                if typed.functions.contains_key(callee) {
                    Op::Call {
                        dest,
                        ty,
                        function: callee.clone(),
                        args,
                    }
                } else {
                    let builtin = Builtin::from_name(callee).ok_or_else(|| {
                        SchemaError::Lowering(format!("call to unknown function '{callee}'"))
                    })?;
                    Op::Builtin {
                        dest,
                        ty,
                        builtin,
                        args,
                        capability: builtin.capability(),
                    }
                }
            }
            ExprKind::List { items } => {
                let items = self.generate_args(items)?;
                Op::List {
                    dest: self.new_register(),
                    ty,
                    items,
                }
            }
            ExprKind::Map { entries } => {
                let mut regs = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.generate_expr(*key)?;
                    let value = self.generate_expr(*value)?;
                    regs.push((key, value));
                }
                Op::Map {
                    dest: self.new_register(),
                    ty,
                    entries: regs,
                }
            }
            ExprKind::Record { fields } => {
                let mut regs = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    regs.push((name.clone(), self.generate_expr(*value)?));
                }
                Op::Record {
                    dest: self.new_register(),
                    ty,
                    fields: regs,
                }
            }
            ExprKind::Field { base, field } => {
                let base = self.generate_expr(*base)?;
                Op::Field {
                    dest: self.new_register(),
                    ty,
                    base,
                    field: field.clone(),
                }
            }
            ExprKind::Index { base, index } => {
                let base = self.generate_expr(*base)?;
                let index = self.generate_expr(*index)?;
                Op::Index {
                    dest: self.new_register(),
                    ty,
                    base,
                    index,
                }
            }
        };
        let dest = op
            .dest()
            .map(|(dest, _)| dest)
            .ok_or_else(|| SchemaError::Lowering(format!("{} defines no register", op.opcode())))?;
        self.add_node(op, origin);
        Ok(dest)
    }

    fn constant(&mut self, ty: Type, value: Literal) -> Op {
        Op::Const {
            dest: self.new_register(),
            ty,
            value,
        }
    }

    fn generate_args(&mut self, args: &[ExprId]) -> Result<Vec<Reg>, SchemaError> {
        args.iter().map(|arg| self.generate_expr(*arg)).collect()
    }

    fn binding(&self, id: StmtId, name: &str) -> Result<&'a crate::typechecker::Binding, SchemaError> {
        let program = self.program;
        program
            .typed
            .binding(id)
            .ok_or_else(|| SchemaError::Lowering(format!("no binding recorded for '{name}'")))
    }

    /// Registers are numbered per function, in allocation order.
    fn new_register(&mut self) -> Reg {
        let reg = Reg(self.register_counter);
        self.register_counter += 1;
        reg
    }

    fn add_node(&mut self, op: Op, origin: Origin) {
        if let Some(region) = self.regions.last_mut() {
            region.push(Node { op, origin });
        }
    }

    fn pop_region(&mut self) -> Vec<Node> {
        self.regions.pop().unwrap_or_default()
    }
}
