pub mod expression;
pub mod function;
pub mod statement;
pub mod types;

#[cfg(test)]
pub mod test;

pub use types::Type;

use crate::ast::{Ast, ExprId, StmtId, TypeExpr};
use crate::diagnostic::Diagnostic;
use crate::span::Origin;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::collections::{BTreeSet, HashMap, HashSet};

/// Where a variable lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The top-level frame's outermost scope (the observable store).
    Global,
    /// Anything else: block scopes and function frames.
    Local,
}

/// What an assignment or `ask` does to its target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    pub scope: Scope,
    /// Creates a new variable in the innermost scope rather than updating
    /// an existing one.
    pub declares: bool,
    /// Declared type of the variable.
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Signature {
    pub fn as_type(&self) -> Type {
        Type::Function {
            params: self.params.clone(),
            ret: Box::new(self.ret.clone()),
        }
    }
}

/// The AST plus everything later stages need to know about it.
#[derive(Debug, Clone, Serialize)]
pub struct TypedAst {
    pub ast: Ast,
    /// Indexed by [`ExprId`].
    pub expr_types: Vec<Type>,
    /// Indexed by [`ExprId`]; set for variable reads.
    pub var_scopes: Vec<Option<Scope>>,
    /// Indexed by [`StmtId`]; set for assignments and `ask`.
    pub bindings: Vec<Option<Binding>>,
    pub functions: IndexMap<String, Signature>,
    pub globals: IndexMap<String, Type>,
}

impl TypedAst {
    pub fn type_of(&self, id: ExprId) -> &Type {
        &self.expr_types[id.0 as usize]
    }

    pub fn scope_of(&self, id: ExprId) -> Option<Scope> {
        self.var_scopes[id.0 as usize]
    }

    pub fn binding(&self, id: StmtId) -> Option<&Binding> {
        self.bindings[id.0 as usize].as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub typed: TypedAst,
    pub diagnostics: Vec<Diagnostic>,
}

/// Typechecks a whole program. Always completes the pass; failures are
/// reported as diagnostics and the offending expressions get
/// [`Type::Error`].
pub fn check(ast: Ast) -> CheckResult {
    let mut env = TypeEnv::new(&ast);
    env.check_program();
    let TypeEnv {
        expr_types,
        var_scopes,
        bindings,
        functions,
        globals,
        diagnostics,
        ..
    } = env;
    debug!(
        functions = functions.len(),
        globals = globals.len(),
        diagnostics = diagnostics.len(),
        "typechecked"
    );
    CheckResult {
        typed: TypedAst {
            ast,
            expr_types,
            var_scopes,
            bindings,
            functions,
            globals,
        },
        diagnostics,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Var {
    pub ty: Type,
}

/// Checker state. `scopes[0]` of the top-level frame is the global scope;
/// inside a function `scopes` holds only that function's scopes and the
/// globals are reachable read-only through `globals`.
pub struct TypeEnv<'a> {
    pub(crate) ast: &'a Ast,
    pub(crate) expr_types: Vec<Type>,
    pub(crate) var_scopes: Vec<Option<Scope>>,
    pub(crate) bindings: Vec<Option<Binding>>,
    pub(crate) functions: IndexMap<String, Signature>,
    pub(crate) globals: IndexMap<String, Type>,
    pub(crate) scopes: Vec<IndexMap<String, Var>>,
    /// Flow-refined types, parallel to `scopes`.
    pub(crate) narrowed: Vec<HashMap<String, Type>>,
    /// Return type of the function being checked, `None` at top level.
    pub(crate) return_type: Option<Type>,
    /// Name of the function being checked.
    pub(crate) current_function: Option<String>,
    /// Globals each function reads directly, with the first read.
    pub(crate) global_reads: HashMap<String, IndexMap<String, Origin>>,
    /// User functions each function calls directly.
    pub(crate) callees: HashMap<String, BTreeSet<String>>,
    pub(crate) top_level_calls: Vec<TopLevelCall>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

/// A call to a user function made from top-level code.
pub(crate) struct TopLevelCall {
    pub callee: String,
    pub origin: Origin,
    /// Number of globals bound when the call runs.
    pub bound: usize,
}

/// Result of looking a name up.
pub(crate) struct Resolved {
    pub ty: Type,
    pub scope: Scope,
    /// Index into `scopes`, `None` for a global seen from a function.
    pub depth: Option<usize>,
}

impl<'a> TypeEnv<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        TypeEnv {
            ast,
            expr_types: vec![Type::Error; ast.expr_count()],
            var_scopes: vec![None; ast.expr_count()],
            bindings: vec![None; ast.stmt_count()],
            functions: IndexMap::new(),
            globals: IndexMap::new(),
            scopes: vec![IndexMap::new()],
            narrowed: vec![HashMap::new()],
            return_type: None,
            current_function: None,
            global_reads: HashMap::new(),
            callees: HashMap::new(),
            top_level_calls: vec![],
            diagnostics: vec![],
        }
    }

    pub(crate) fn error(&mut self, code: &str, origin: Origin, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(code, origin, message));
    }

    /// Resolves a type written in the source, reporting map keys that
    /// cannot be keys.
    pub(crate) fn written_type(&mut self, expr: &TypeExpr, origin: Origin) -> Type {
        let ty = Type::from_expr(expr);
        if let Some(key) = ty.invalid_key() {
            self.error(
                "HND-TC-0213",
                origin,
                format!("map keys must be Int, Text or Bool, not {key}"),
            );
        }
        ty
    }

    pub(crate) fn warning(&mut self, code: &str, origin: Origin, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(code, origin, message));
    }

    fn check_program(&mut self) {
        let ast = self.ast;
        self.collect_signatures();

        let top_level = ast.top_level();
        self.check_block_in_place(&top_level);
        self.globals = self.scopes[0]
            .iter()
            .map(|(name, var)| (name.clone(), var.ty.clone()))
            .collect();

        for function in ast.functions() {
            self.check_function(function);
        }
        self.check_global_reads();
    }

    pub(crate) fn record_global_read(&mut self, name: &str, origin: Origin) {
        if let Some(function) = &self.current_function {
            self.global_reads
                .entry(function.clone())
                .or_default()
                .entry(name.to_string())
                .or_insert(origin);
        }
    }

    pub(crate) fn record_call(&mut self, callee: &str, origin: Origin) {
        match &self.current_function {
            Some(function) => {
                self.callees
                    .entry(function.clone())
                    .or_default()
                    .insert(callee.to_string());
            }
            None => self.top_level_calls.push(TopLevelCall {
                callee: callee.to_string(),
                origin,
                bound: self.scopes[0].len(),
            }),
        }
    }

    /// A top-level call may only reach globals that are already bound,
    /// including those read by the functions it calls in turn.
    fn check_global_reads(&mut self) {
        let calls = std::mem::take(&mut self.top_level_calls);
        for call in &calls {
            if let Some((global, read_at)) = self.first_unbound_read(&call.callee, call.bound) {
                self.diagnostics.push(
                    Diagnostic::error(
                        "HND-TC-1106",
                        call.origin,
                        format!(
                            "call to '{}' reads global '{global}' before it is bound",
                            call.callee
                        ),
                    )
                    .with_note(format!("'{global}' is read at {read_at}")),
                );
            }
        }
    }

    fn first_unbound_read(&self, callee: &str, bound: usize) -> Option<(String, Origin)> {
        let mut seen = HashSet::new();
        let mut pending = vec![callee.to_string()];
        while let Some(function) = pending.pop() {
            if !seen.insert(function.clone()) {
                continue;
            }
            for (name, origin) in self.global_reads.get(&function).into_iter().flatten() {
                // globals are bound in the order they appear in `globals`
                let unbound = self
                    .globals
                    .get_index_of(name)
                    .is_none_or(|index| index >= bound);
                if unbound {
                    return Some((name.clone(), *origin));
                }
            }
            if let Some(next) = self.callees.get(&function) {
                pending.extend(next.iter().rev().cloned());
            }
        }
        None
    }

    pub(crate) fn in_function(&self) -> bool {
        self.return_type.is_some()
    }

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
        self.narrowed.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scopes.pop();
        self.narrowed.pop();
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<Resolved> {
        for depth in (0..self.scopes.len()).rev() {
            if let Some(var) = self.scopes[depth].get(name) {
                let ty = self.narrowed[depth..]
                    .iter()
                    .rev()
                    .find_map(|n| n.get(name))
                    .unwrap_or(&var.ty)
                    .clone();
                let scope = if depth == 0 && !self.in_function() {
                    Scope::Global
                } else {
                    Scope::Local
                };
                return Some(Resolved {
                    ty,
                    scope,
                    depth: Some(depth),
                });
            }
        }
        if self.in_function() {
            if let Some(ty) = self.globals.get(name) {
                return Some(Resolved {
                    ty: ty.clone(),
                    scope: Scope::Global,
                    depth: None,
                });
            }
        }
        None
    }

    /// Declared (not refined) type of a variable at `depth`.
    pub(crate) fn declared_type(&self, depth: usize, name: &str) -> Option<Type> {
        self.scopes[depth].get(name).map(|v| v.ty.clone())
    }

    pub(crate) fn declare(&mut self, name: &str, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Var { ty });
        }
    }

    pub(crate) fn narrow(&mut self, name: &str, ty: Type) {
        if let Some(narrowed) = self.narrowed.last_mut() {
            narrowed.insert(name.to_string(), ty);
        }
    }

    /// Forgets refinements of `name` made at or inside `depth`.
    pub(crate) fn clear_narrowing(&mut self, name: &str, depth: usize) {
        for narrowed in &mut self.narrowed[depth..] {
            narrowed.remove(name);
        }
    }

    pub(crate) fn current_scope(&self) -> Scope {
        if self.scopes.len() == 1 && !self.in_function() {
            Scope::Global
        } else {
            Scope::Local
        }
    }
}
