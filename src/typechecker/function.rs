use crate::ast::Function;
use crate::stdlib::Builtin;
use crate::typechecker::statement::always_returns;
use crate::typechecker::{Signature, Type, TypeEnv, Var};

use indexmap::IndexMap;

impl TypeEnv<'_> {
    /// Registers every function header before any body is checked, so calls
    /// may come before definitions and functions may recurse.
    pub(crate) fn collect_signatures(&mut self) {
        let ast = self.ast;
        for function in ast.functions() {
            if Builtin::from_name(&function.name).is_some() {
                self.error(
                    "HND-TC-0305",
                    function.origin,
                    format!("'{}' is a builtin and cannot be redefined", function.name),
                );
                continue;
            }
            if self.functions.contains_key(&function.name) {
                self.error(
                    "HND-TC-0304",
                    function.origin,
                    format!("function '{}' is defined more than once", function.name),
                );
                continue;
            }
            let params = function
                .params
                .iter()
                .map(|p| self.written_type(&p.ty, p.origin))
                .collect();
            let ret = match &function.ret {
                Some(ret) => self.written_type(ret, function.origin),
                None => Type::Null,
            };
            let signature = Signature { params, ret };
            self.functions.insert(function.name.clone(), signature);
        }
    }

    pub(crate) fn check_function(&mut self, function: &Function) {
        let mut params = IndexMap::new();
        for param in &function.params {
            let ty = Type::from_expr(&param.ty);
            if params.insert(param.name.clone(), Var { ty }).is_some() {
                self.error(
                    "HND-TC-1102",
                    param.origin,
                    format!("parameter '{}' is declared twice", param.name),
                );
            }
        }
        let ret = function.ret.as_ref().map_or(Type::Null, Type::from_expr);

        // a function body sees only its own frame plus the globals
        let outer_scopes = std::mem::replace(&mut self.scopes, vec![params]);
        let outer_narrowed = std::mem::replace(&mut self.narrowed, vec![Default::default()]);
        let outer_return = self.return_type.replace(ret.clone());
        let outer_function = self.current_function.replace(function.name.clone());

        self.check_block(&function.body);

        self.current_function = outer_function;
        self.scopes = outer_scopes;
        self.narrowed = outer_narrowed;
        self.return_type = outer_return;

        if !ret.accepts(&Type::Null) && !always_returns(self, &function.body) {
            self.error(
                "HND-TC-1303",
                function.origin,
                format!(
                    "function '{}' must return {ret} on every path",
                    function.name
                ),
            );
        }
    }
}
