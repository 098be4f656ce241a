use super::*;

use std::collections::{HashMap, HashSet};

/// Structural checks over a lowered module. Every failure is a toolchain bug,
/// never a problem with the source program.
pub struct IRValidator;

struct FunctionValidator<'m> {
    module: &'m Module,
    owner: String,
    capabilities: &'m CapabilitySet,
    /// `None` while validating the top-level body.
    ret: Option<&'m Type>,
    /// Every register defined anywhere in the body, for single definition.
    defined: HashSet<Reg>,
    /// Registers visible at the current point, innermost region last.
    visible: Vec<HashMap<Reg, Type>>,
    errors: Vec<SchemaError>,
}

impl IRValidator {
    pub fn validate_module(module: &Module) -> Result<(), Vec<SchemaError>> {
        if module.version != IR_VERSION {
            return Err(vec![SchemaError::Version(module.version.clone())]);
        }
        let mut errors = Vec::new();

        let mut names = HashSet::new();
        for function in &module.functions {
            if !names.insert(function.name.as_str()) {
                errors.push(SchemaError::Invalid {
                    owner: function.name.clone(),
                    message: "function defined twice".to_string(),
                });
            }
            if Builtin::from_name(&function.name).is_some() {
                errors.push(SchemaError::Invalid {
                    owner: function.name.clone(),
                    message: "function shadows a builtin".to_string(),
                });
            }
            errors.extend(Self::validate_function(module, function));
        }

        let mut main = FunctionValidator::new(module, "main".to_string(), &module.capabilities, None);
        main.region(&module.main, vec![]);
        errors.extend(main.errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_function(module: &Module, function: &Function) -> Vec<SchemaError> {
        let mut validator = FunctionValidator::new(
            module,
            function.name.clone(),
            &function.capabilities,
            Some(&function.ret),
        );
        validator.region(&function.body, vec![]);
        validator.errors
    }
}

impl<'m> FunctionValidator<'m> {
    fn new(module: &'m Module, owner: String, capabilities: &'m CapabilitySet, ret: Option<&'m Type>) -> Self {
        FunctionValidator {
            module,
            owner,
            capabilities,
            ret,
            defined: HashSet::new(),
            visible: vec![],
            errors: vec![],
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(SchemaError::Invalid {
            owner: self.owner.clone(),
            message: message.into(),
        });
    }

    /// Checks `nodes` in a fresh region, returning the type of `result` if
    /// it is defined by the end of the region.
    fn region(&mut self, nodes: &'m [Node], results: Vec<Reg>) -> Vec<Option<Type>> {
        self.visible.push(HashMap::new());
        for node in nodes {
            self.node(node);
        }
        let types = results.iter().map(|reg| self.lookup(*reg).cloned()).collect();
        self.visible.pop();
        types
    }

    fn lookup(&self, reg: Reg) -> Option<&Type> {
        self.visible.iter().rev().find_map(|region| region.get(&reg))
    }

    fn operand(&mut self, reg: Reg, opcode: &str) -> Option<Type> {
        match self.lookup(reg) {
            Some(ty) => Some(ty.clone()),
            None => {
                self.error(format!("{opcode} uses {reg} before it is defined"));
                None
            }
        }
    }

    fn define(&mut self, reg: Reg, ty: &Type) {
        if !self.defined.insert(reg) {
            self.error(format!("{reg} is defined more than once"));
        }
        if let Some(region) = self.visible.last_mut() {
            region.insert(reg, ty.clone());
        }
    }

    fn expect_bool(&mut self, reg: Reg, opcode: &str) {
        if let Some(ty) = self.operand(reg, opcode)
            && ty != Type::Bool
        {
            self.error(format!("{opcode} condition {reg} is {ty}, not Bool"));
        }
    }

    fn require(&mut self, capability: Capability, opcode: &str) {
        if !self.capabilities.contains(&capability) {
            self.error(format!("{opcode} needs '{capability}' which is not declared"));
        }
    }

    fn node(&mut self, node: &'m Node) {
        let opcode = node.op.opcode();
        match &node.op {
            Op::Const { ty, value, .. } => {
                let fits = match value {
                    Literal::Int(_) => *ty == Type::Int,
                    Literal::Float(_) => *ty == Type::Float,
                    Literal::Bool(_) => *ty == Type::Bool,
                    Literal::Text(_) => *ty == Type::Text,
                    Literal::Null => ty.accepts(&Type::Null),
                };
                if !fits {
                    self.error(format!("constant {value} typed as {ty}"));
                }
            }
            Op::Load { .. } => {}
            Op::Store { value, .. } => {
                self.operand(*value, opcode);
            }
            Op::Unary { ty, op, operand, .. } => {
                if let Some(operand) = self.operand(*operand, opcode) {
                    let ok = match op {
                        UnOp::Neg => operand.is_numeric() && operand == *ty,
                        UnOp::Not => operand == Type::Bool && *ty == Type::Bool,
                    };
                    if !ok {
                        self.error(format!("unary operand {operand} does not give {ty}"));
                    }
                }
            }
            Op::Binary {
                ty, op, lhs, rhs, ..
            } => {
                let lhs = self.operand(*lhs, opcode);
                let rhs = self.operand(*rhs, opcode);
                if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                    self.binary(*op, &lhs, &rhs, ty);
                }
            }
            Op::Logic {
                op,
                lhs,
                rhs_body,
                rhs,
                ..
            } => {
                if !op.is_logical() {
                    self.error(format!("logic node carries '{}'", op.symbol()));
                }
                self.expect_bool(*lhs, opcode);
                match self.region(rhs_body, vec![*rhs]).pop().flatten() {
                    Some(Type::Bool) => {}
                    Some(ty) => self.error(format!("logic operand {rhs} is {ty}, not Bool")),
                    None => self.error(format!("logic result {rhs} is not defined in its region")),
                }
            }
            Op::List { items, .. } => {
                for item in items {
                    self.operand(*item, opcode);
                }
            }
            Op::Map { ty, entries, .. } => {
                for (key, value) in entries {
                    if let Some(key) = self.operand(*key, opcode)
                        && !key.is_key()
                    {
                        self.error(format!("{key} used as a map key"));
                    }
                    self.operand(*value, opcode);
                }
                if !matches!(ty, Type::Map(..)) {
                    self.error(format!("map literal typed as {ty}"));
                }
            }
            Op::Record { fields, .. } => {
                for (_, value) in fields {
                    self.operand(*value, opcode);
                }
            }
            Op::Field { base, .. } | Op::Index { base, .. } => {
                self.operand(*base, opcode);
                if let Op::Index { index, .. } = &node.op {
                    self.operand(*index, opcode);
                }
            }
            Op::Call {
                ty, function, args, ..
            } => self.call(ty, function, args),
            Op::Builtin {
                builtin,
                args,
                capability,
                ..
            } => {
                for arg in args {
                    self.operand(*arg, opcode);
                }
                if args.len() != builtin.arity() {
                    self.error(format!(
                        "'{builtin}' takes {} argument(s), given {}",
                        builtin.arity(),
                        args.len()
                    ));
                }
                if *capability != builtin.capability() {
                    self.error(format!("'{builtin}' carries the wrong capability"));
                }
                if let Some(capability) = builtin.capability() {
                    self.require(capability, opcode);
                }
            }
            Op::Show { value } => {
                self.operand(*value, opcode);
                self.require(Capability::Io, opcode);
            }
            Op::Ask { prompt, .. } => {
                if let Some(prompt) = prompt {
                    self.operand(*prompt, opcode);
                }
                self.require(Capability::Io, opcode);
            }
            Op::Verify { cond } => self.expect_bool(*cond, opcode),
            Op::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expect_bool(*cond, opcode);
                self.region(then_body, vec![]);
                self.region(else_body, vec![]);
            }
            Op::Loop {
                cond_body,
                cond,
                body,
            } => {
                // cond_body's registers are visible to the condition only
                self.visible.push(HashMap::new());
                for node in cond_body {
                    self.node(node);
                }
                self.expect_bool(*cond, opcode);
                self.visible.pop();
                self.region(body, vec![]);
            }
            Op::Return { value } => match self.ret {
                None => self.error("return outside a function"),
                Some(ret) => {
                    let given = match value {
                        Some(value) => self.operand(*value, opcode),
                        None => Some(Type::Null),
                    };
                    if let Some(given) = given
                        && !ret.accepts(&given)
                    {
                        self.error(format!("returns {given} from a function declared {ret}"));
                    }
                }
            },
        }
        if let Some((dest, ty)) = node.op.dest() {
            self.define(dest, ty);
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Type, rhs: &Type, ty: &Type) {
        let symbol = op.symbol();
        let ok = if op.is_arithmetic() {
            let text_concat = op == BinOp::Add && *lhs == Type::Text;
            (lhs.is_numeric() || text_concat) && lhs == rhs && lhs == ty
        } else if op.is_ordering() {
            lhs.is_ordered() && lhs == rhs && *ty == Type::Bool
        } else if op.is_equality() {
            lhs.comparable(rhs) && *ty == Type::Bool
        } else {
            false
        };
        if !ok {
            self.error(format!("{lhs} {symbol} {rhs} does not give {ty}"));
        }
    }

    fn call(&mut self, ty: &Type, name: &str, args: &[Reg]) {
        let mut given = Vec::with_capacity(args.len());
        for arg in args {
            given.push(self.operand(*arg, "call"));
        }
        let Some(callee) = self.module.function(name) else {
            self.error(format!("call to undefined function '{name}'"));
            return;
        };
        if callee.params.len() != args.len() {
            self.error(format!(
                "'{name}' takes {} argument(s), given {}",
                callee.params.len(),
                args.len()
            ));
            return;
        }
        for (param, arg) in callee.params.iter().zip(given) {
            if let Some(arg) = arg
                && !param.ty.accepts(&arg)
            {
                self.error(format!("'{name}' parameter '{}' given {arg}", param.name));
            }
        }
        if callee.ret != *ty {
            self.error(format!("'{name}' returns {}, call typed {ty}", callee.ret));
        }
        let missing: Vec<_> = callee
            .capabilities
            .difference(self.capabilities)
            .map(|c| c.name())
            .collect();
        if !missing.is_empty() {
            self.error(format!("call to '{name}' needs [{}]", missing.join(", ")));
        }
    }
}
