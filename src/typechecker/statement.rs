use crate::ast::{BinOp, ExprId, ExprKind, StmtId, StmtKind, TypeExpr};
use crate::span::Origin;
use crate::typechecker::{Binding, Scope, Type, TypeEnv};

use std::collections::BTreeSet;

/// Types `ask` can read from an input line.
const ASKABLE: [Type; 4] = [Type::Int, Type::Float, Type::Bool, Type::Text];

impl TypeEnv<'_> {
    /// Checks statements in the current scope.
    pub(crate) fn check_block_in_place(&mut self, stmts: &[StmtId]) {
        for id in stmts {
            self.check_stmt(*id);
        }
    }

    pub(crate) fn check_block(&mut self, stmts: &[StmtId]) {
        self.push_scope();
        self.check_block_in_place(stmts);
        self.pop_scope();
    }

    fn check_stmt(&mut self, id: StmtId) {
        let ast = self.ast;
        let stmt = ast.stmt(id);
        let origin = stmt.origin;
        match &stmt.kind {
            StmtKind::Assign {
                name,
                declared,
                value,
            } => self.check_assign(id, name, declared.as_ref(), *value, origin),
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.check_condition(*cond, "HND-TC-1401", "if");
                let refinement = self.null_test(*cond);

                self.push_scope();
                if let Some((name, ty, false)) = &refinement {
                    self.narrow(name, ty.clone());
                }
                self.check_block_in_place(then_body);
                self.pop_scope();

                if let Some(else_body) = else_body {
                    self.push_scope();
                    if let Some((name, ty, true)) = &refinement {
                        self.narrow(name, ty.clone());
                    }
                    self.check_block_in_place(else_body);
                    self.pop_scope();
                }
            }
            StmtKind::While { cond, body } => {
                // a later iteration may see the value the body assigned
                let mut assigned = BTreeSet::new();
                self.assigned_in(body, &mut assigned);
                for name in &assigned {
                    if let Some(depth) = self.resolve(name).and_then(|found| found.depth) {
                        self.clear_narrowing(name, depth);
                    }
                }
                self.check_condition(*cond, "HND-TC-1501", "while");
                let refinement = self.null_test(*cond);
                self.push_scope();
                if let Some((name, ty, false)) = &refinement {
                    self.narrow(name, ty.clone());
                }
                self.check_block_in_place(body);
                self.pop_scope();
            }
            StmtKind::Return { value } => self.check_return(*value, origin),
            StmtKind::Show { value } => {
                self.infer(*value, None);
            }
            StmtKind::Ask { name, ty, prompt } => {
                if let Some(prompt) = prompt {
                    self.check_against(*prompt, &Type::Text, "HND-TC-1105");
                }
                let ty = ty.as_ref().map_or(Type::Text, Type::from_expr);
                if !ASKABLE.contains(&ty) {
                    self.error(
                        "HND-TC-1105",
                        origin,
                        format!("'ask' can only read Int, Float, Bool or Text, not {ty}"),
                    );
                }
                self.bind(id, name, None, Source::Input(&ty), origin);
            }
            StmtKind::Verify { cond } => {
                self.check_condition(*cond, "HND-TC-1601", "🔍");
                // after `🔍 x != null` the rest of the block may rely on it
                if let Some((name, ty, false)) = self.null_test(*cond) {
                    self.narrow(&name, ty);
                }
            }
            StmtKind::Expr { expr } => {
                self.infer(*expr, None);
                if !matches!(self.ast.expr(*expr).kind, ExprKind::Call { .. }) {
                    self.warning(
                        "HND-TC-0901",
                        origin,
                        "expression result is unused; only calls make useful statements",
                    );
                }
            }
        }
    }

    fn check_condition(&mut self, cond: ExprId, code: &str, what: &str) {
        let ty = self.infer(cond, Some(&Type::Bool));
        if ty != Type::Bool && !ty.is_error() {
            self.error(
                code,
                self.ast.expr(cond).origin,
                format!("{what} condition must be Bool, found {ty}"),
            );
        }
    }

    /// Names that `stmts` may update, including in nested blocks.
    fn assigned_in(&self, stmts: &[StmtId], names: &mut BTreeSet<String>) {
        for id in stmts {
            match &self.ast.stmt(*id).kind {
                StmtKind::Assign {
                    name,
                    declared: None,
                    ..
                }
                | StmtKind::Ask { name, .. } => {
                    names.insert(name.clone());
                }
                StmtKind::If {
                    then_body,
                    else_body,
                    ..
                } => {
                    self.assigned_in(then_body, names);
                    if let Some(else_body) = else_body {
                        self.assigned_in(else_body, names);
                    }
                }
                StmtKind::While { body, .. } => self.assigned_in(body, names),
                _ => {}
            }
        }
    }

    /// Recognises `x != null` / `x == null` on an optional variable. Returns
    /// the variable, its refined type, and whether the test was `==`.
    fn null_test(&self, cond: ExprId) -> Option<(String, Type, bool)> {
        let ExprKind::Binary { op, lhs, rhs } = &self.ast.expr(cond).kind else {
            return None;
        };
        if !op.is_equality() {
            return None;
        }
        let var = match (&self.ast.expr(*lhs).kind, &self.ast.expr(*rhs).kind) {
            (ExprKind::Var { name }, ExprKind::Null) | (ExprKind::Null, ExprKind::Var { name }) => name,
            _ => return None,
        };
        match self.resolve(var)?.ty {
            Type::Optional(inner) => Some((var.clone(), *inner, *op == BinOp::Eq)),
            _ => None,
        }
    }

    fn check_assign(
        &mut self,
        id: StmtId,
        name: &str,
        declared: Option<&TypeExpr>,
        value: ExprId,
        origin: Origin,
    ) {
        let declared = declared.map(|ty| self.written_type(ty, origin));
        self.bind(id, name, declared, Source::Expr(value), origin);
    }

    /// Shared by assignment and `ask`: decides between declaring and
    /// updating, checks the value and records the binding.
    fn bind(&mut self, id: StmtId, name: &str, declared: Option<Type>, source: Source<'_>, origin: Origin) {
        let innermost = self.scopes.len() - 1;
        let existing = self.resolve(name);

        if let Some(found) = &existing {
            if found.depth.is_none() {
                // a global seen from inside a function
                if let Source::Expr(value) = source {
                    self.infer(value, Some(&found.ty));
                }
                self.error(
                    "HND-TC-1104",
                    origin,
                    format!("cannot assign to global '{name}' inside a function"),
                );
                return;
            }
        }

        // `x: T = e` always declares; `x = e` and `ask x` update when `x` is
        // visible
        let update = match (&declared, &existing) {
            (Some(_), Some(found)) if found.depth == Some(innermost) => {
                self.error(
                    "HND-TC-1102",
                    origin,
                    format!("'{name}' is already declared in this scope"),
                );
                None
            }
            (None, Some(found)) => found.depth,
            _ => None,
        };

        if let Some(depth) = update {
            let target = self.declared_type(depth, name).unwrap_or(Type::Error);
            match source {
                Source::Expr(value) => {
                    self.check_against(value, &target, "HND-TC-1101");
                }
                Source::Input(read) if !target.accepts(read) => self.error(
                    "HND-TC-1101",
                    origin,
                    format!("'{name}' has type {target} but 'ask' reads {read}"),
                ),
                Source::Input(_) => {}
            }
            self.clear_narrowing(name, depth);
            let scope = if depth == 0 && !self.in_function() {
                Scope::Global
            } else {
                Scope::Local
            };
            self.bindings[id.0 as usize] = Some(Binding {
                scope,
                declares: false,
                ty: target,
            });
            return;
        }

        let ty = match (declared, source) {
            (Some(ty), Source::Expr(value)) => {
                self.check_against(value, &ty, "HND-TC-1101");
                ty
            }
            (Some(ty), Source::Input(_)) => ty,
            (None, Source::Input(ty)) => ty.clone(),
            (None, Source::Expr(value)) => {
                let ty = self.infer(value, None);
                if ty == Type::Null {
                    self.error(
                        "HND-TC-1103",
                        origin,
                        format!("cannot infer a type for '{name}' from null; add an annotation"),
                    );
                    Type::Error
                } else {
                    ty
                }
            }
        };
        self.declare(name, ty.clone());
        self.bindings[id.0 as usize] = Some(Binding {
            scope: self.current_scope(),
            declares: true,
            ty,
        });
    }

    fn check_return(&mut self, value: Option<ExprId>, origin: Origin) {
        let Some(expected) = self.return_type.clone() else {
            self.error(
                "HND-TC-1304",
                origin,
                "'return' outside of a function",
            );
            if let Some(value) = value {
                self.infer(value, None);
            }
            return;
        };
        match value {
            Some(value) => {
                self.check_against(value, &expected, "HND-TC-1301");
            }
            None if !expected.accepts(&Type::Null) => self.error(
                "HND-TC-1302",
                origin,
                format!("function must return a value of type {expected}"),
            ),
            None => {}
        }
    }
}

/// Where a bound value comes from.
#[derive(Clone, Copy)]
enum Source<'t> {
    Expr(ExprId),
    Input(&'t Type),
}

/// Whether every path through `stmts` ends in `return`.
pub(crate) fn always_returns(env: &TypeEnv<'_>, stmts: &[StmtId]) -> bool {
    stmts.iter().any(|id| match &env.ast.stmt(*id).kind {
        StmtKind::Return { .. } => true,
        StmtKind::If {
            then_body,
            else_body: Some(else_body),
            ..
        } => always_returns(env, then_body) && always_returns(env, else_body),
        _ => false,
    })
}
