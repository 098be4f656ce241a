use crate::ast::{BinOp, ExprId, ExprKind, UnOp};
use crate::diagnostic::Diagnostic;
use crate::span::Origin;
use crate::stdlib::Builtin;
use crate::typechecker::{Type, TypeEnv};

use std::collections::BTreeMap;

/// Strips one optional layer off an expected type so literals inside
/// `T?` positions are checked against `T`.
fn hint(expected: Option<&Type>) -> Option<&Type> {
    match expected {
        Some(Type::Optional(inner)) => Some(inner.as_ref()),
        other => other,
    }
}

impl TypeEnv<'_> {
    /// Infers `id` against `expected` and reports `code` if the result does
    /// not fit.
    pub(crate) fn check_against(&mut self, id: ExprId, expected: &Type, code: &str) -> Type {
        let actual = self.infer(id, Some(expected));
        if !expected.accepts(&actual) {
            self.error(
                code,
                self.ast.expr(id).origin,
                format!("expected {expected}, found {actual}"),
            );
        }
        actual
    }

    /// Types an expression. `expected` only steers literals that cannot be
    /// typed on their own; it is never enforced here.
    pub(crate) fn infer(&mut self, id: ExprId, expected: Option<&Type>) -> Type {
        let ast = self.ast;
        let expr = ast.expr(id);
        let origin = expr.origin;

        let ty = match &expr.kind {
            ExprKind::Int { .. } => Type::Int,
            ExprKind::Float { .. } => Type::Float,
            ExprKind::Text { .. } => Type::Text,
            ExprKind::Bool { .. } => Type::Bool,
            ExprKind::Null => Type::Null,
            ExprKind::Var { name } => match self.resolve(name) {
                Some(found) => {
                    if found.depth.is_none() {
                        self.record_global_read(name, origin);
                    }
                    self.var_scopes[id.0 as usize] = Some(found.scope);
                    found.ty
                }
                None if self.functions.contains_key(name) || Builtin::from_name(name).is_some() => {
                    self.error(
                        "HND-TC-0102",
                        origin,
                        format!("'{name}' is a function; call it with '{name}(...)'"),
                    );
                    Type::Error
                }
                None => {
                    self.error(
                        "HND-TC-0101",
                        origin,
                        format!("undefined variable '{name}'"),
                    );
                    Type::Error
                }
            },
            ExprKind::Unary { op, operand } => self.infer_unary(*op, *operand, origin),
            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(*op, *lhs, *rhs, origin),
            ExprKind::Call { callee, args } => self.infer_call(callee, args, expected, origin),
            ExprKind::List { items } => self.infer_list(items, expected, origin),
            ExprKind::Map { entries } => self.infer_map(entries, expected, origin),
            ExprKind::Record { fields } => self.infer_record(fields, expected, origin),
            ExprKind::Field { base, field } => {
                match self.infer(*base, None) {
                    Type::Record(fields) => match fields.get(field) {
                        Some(ty) => ty.clone(),
                        None => {
                            let known: Vec<_> = fields.keys().map(String::as_str).collect();
                            self.error(
                                "HND-TC-0220",
                                origin,
                                format!(
                                    "record has no field '{field}' (fields: {})",
                                    known.join(", ")
                                ),
                            );
                            Type::Error
                        }
                    },
                    Type::Error => Type::Error,
                    Type::Optional(inner) => {
                        self.error(
                            "HND-TC-0222",
                            origin,
                            format!("value of type {inner}? may be null; test it with '!= null' first"),
                        );
                        Type::Error
                    }
                    other => {
                        self.error(
                            "HND-TC-0221",
                            origin,
                            format!("field access on {other}, which is not a record"),
                        );
                        Type::Error
                    }
                }
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.infer(*base, None);
                self.infer_index(base_ty, *index, origin)
            }
        };

        self.expr_types[id.0 as usize] = ty.clone();
        ty
    }

    fn infer_unary(&mut self, op: UnOp, operand: ExprId, origin: Origin) -> Type {
        let ty = self.infer(operand, None);
        match (op, &ty) {
            (_, Type::Error) => Type::Error,
            (UnOp::Neg, Type::Int | Type::Float) => ty.clone(),
            (UnOp::Not, Type::Bool) => Type::Bool,
            (UnOp::Neg, _) => {
                self.error(
                    "HND-TC-0201",
                    origin,
                    format!("cannot negate {ty}"),
                );
                Type::Error
            }
            (UnOp::Not, _) => {
                self.error(
                    "HND-TC-0201",
                    origin,
                    format!("'not' expects Bool, found {ty}"),
                );
                Type::Error
            }
        }
    }

    fn infer_binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId, origin: Origin) -> Type {
        if op.is_logical() {
            for side in [lhs, rhs] {
                let ty = self.infer(side, Some(&Type::Bool));
                if ty != Type::Bool && !ty.is_error() {
                    self.error(
                        "HND-TC-0205",
                        self.ast.expr(side).origin,
                        format!("'{}' expects Bool operands, found {ty}", op.symbol()),
                    );
                }
            }
            return Type::Bool;
        }

        let left = self.infer(lhs, None);
        let right = self.infer(rhs, Some(&left));

        if op.is_equality() {
            if !left.comparable(&right) {
                self.error(
                    "HND-TC-0204",
                    origin,
                    format!("cannot compare {left} with {right}"),
                );
            }
            return Type::Bool;
        }

        if left.is_error() || right.is_error() {
            return if op.is_ordering() {
                Type::Bool
            } else if left.is_error() {
                right
            } else {
                left
            };
        }

        if op.is_ordering() {
            if left != right || !left.is_ordered() {
                self.error(
                    "HND-TC-0203",
                    origin,
                    format!("cannot order {left} against {right}"),
                );
            }
            return Type::Bool;
        }

        match (&left, &right) {
            (Type::Int, Type::Int) | (Type::Float, Type::Float) => left.clone(),
            (Type::Text, Type::Text) if op == BinOp::Add => Type::Text,
            _ => {
                let mut diagnostic = Diagnostic::error(
                    "HND-TC-0202",
                    origin,
                    format!("'{}' cannot combine {left} and {right}", op.symbol()),
                );
                if left.is_numeric() && right.is_numeric() {
                    diagnostic = diagnostic.with_note("there is no implicit coercion; convert one side with int(...) or float(...)");
                } else if left == Type::Text || right == Type::Text {
                    diagnostic = diagnostic.with_note("there is no implicit coercion; convert with str(...)");
                }
                self.diagnostics.push(diagnostic);
                Type::Error
            }
        }
    }

    fn infer_call(&mut self, callee: &str, args: &[ExprId], expected: Option<&Type>, origin: Origin) -> Type {
        if let Some(signature) = self.functions.get(callee).cloned() {
            self.record_call(callee, origin);
            if args.len() != signature.params.len() {
                self.error(
                    "HND-TC-0302",
                    origin,
                    format!(
                        "'{callee}' takes {} argument(s) but {} were given",
                        signature.params.len(),
                        args.len()
                    ),
                );
                for arg in args {
                    self.infer(*arg, None);
                }
                return signature.ret;
            }
            for (arg, param) in args.iter().zip(&signature.params) {
                self.check_against(*arg, param, "HND-TC-0303");
            }
            return signature.ret;
        }

        let Some(builtin) = Builtin::from_name(callee) else {
            for arg in args {
                self.infer(*arg, None);
            }
            self.error(
                "HND-TC-0301",
                origin,
                format!("unknown function '{callee}'"),
            );
            return Type::Error;
        };

        let mut arg_types = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let hint = builtin.hint(i, &arg_types, expected);
            arg_types.push(self.infer(*arg, hint.as_ref()));
        }
        match builtin.result_type(&arg_types, expected) {
            Ok(ty) => ty,
            Err(error) => {
                let at = error
                    .arg
                    .and_then(|i| args.get(i))
                    .map_or(origin, |arg| self.ast.expr(*arg).origin);
                self.error(error.code, at, error.message);
                Type::Error
            }
        }
    }

    fn infer_list(&mut self, items: &[ExprId], expected: Option<&Type>, origin: Origin) -> Type {
        let element = match hint(expected) {
            Some(Type::List(inner)) => Some(inner.as_ref().clone()),
            _ => None,
        };
        let Some((first, rest)) = items.split_first() else {
            return match element {
                Some(element) => Type::list(element),
                None => {
                    self.error(
                        "HND-TC-1103",
                        origin,
                        "cannot infer the element type of an empty list; add an annotation",
                    );
                    Type::list(Type::Error)
                }
            };
        };

        let element = match element {
            Some(element) => {
                self.check_against(*first, &element, "HND-TC-0212");
                element
            }
            None => self.infer(*first, None),
        };
        for item in rest {
            self.check_against(*item, &element, "HND-TC-0212");
        }
        Type::list(element)
    }

    fn infer_map(&mut self, entries: &[(ExprId, ExprId)], expected: Option<&Type>, origin: Origin) -> Type {
        let (mut key, mut value) = match hint(expected) {
            Some(Type::Map(k, v)) => (Some(k.as_ref().clone()), Some(v.as_ref().clone())),
            _ => (None, None),
        };
        if entries.is_empty() && (key.is_none() || value.is_none()) {
            self.error(
                "HND-TC-1103",
                origin,
                "cannot infer the type of an empty map; add an annotation",
            );
            return Type::map(Type::Error, Type::Error);
        }

        for (k, v) in entries {
            match &key {
                Some(expected) => {
                    self.check_against(*k, expected, "HND-TC-0210");
                }
                None => {
                    let ty = self.infer(*k, None);
                    if !ty.is_key() {
                        self.error(
                            "HND-TC-0210",
                            self.ast.expr(*k).origin,
                            format!("map keys must be Int, Text or Bool, not {ty}"),
                        );
                    }
                    key = Some(ty);
                }
            }
            match &value {
                Some(expected) => {
                    self.check_against(*v, expected, "HND-TC-0212");
                }
                None => value = Some(self.infer(*v, None)),
            }
        }
        Type::map(key.unwrap_or(Type::Error), value.unwrap_or(Type::Error))
    }

    fn infer_record(&mut self, fields: &[(String, ExprId)], expected: Option<&Type>, origin: Origin) -> Type {
        let hints = match hint(expected) {
            Some(Type::Record(fields)) => fields.clone(),
            _ => BTreeMap::new(),
        };
        let mut types = BTreeMap::new();
        for (name, value) in fields {
            let ty = self.infer(*value, hints.get(name));
            if types.insert(name.clone(), ty).is_some() {
                self.error(
                    "HND-TC-0211",
                    origin,
                    format!("field '{name}' appears twice"),
                );
            }
        }
        Type::Record(types)
    }

    fn infer_index(&mut self, base: Type, index: ExprId, origin: Origin) -> Type {
        match base {
            Type::List(inner) => {
                self.check_against(index, &Type::Int, "HND-TC-0223");
                *inner
            }
            Type::Text => {
                self.check_against(index, &Type::Int, "HND-TC-0223");
                Type::Text
            }
            Type::Map(key, value) => {
                self.check_against(index, &key, "HND-TC-0223");
                *value
            }
            Type::Error => {
                self.infer(index, None);
                Type::Error
            }
            Type::Optional(inner) => {
                self.infer(index, None);
                self.error(
                    "HND-TC-0222",
                    origin,
                    format!("value of type {inner}? may be null; test it with '!= null' first"),
                );
                Type::Error
            }
            other => {
                self.infer(index, None);
                self.error(
                    "HND-TC-0223",
                    origin,
                    format!("{other} cannot be indexed"),
                );
                Type::Error
            }
        }
    }
}
