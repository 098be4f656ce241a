//! Static capability checking. Every gated operation must sit in code whose
//! owner (a function header or the module's top-level `🛡` lines) declares
//! the matching capability. A call to a user function requires everything
//! the callee declares, so declarations cover their transitive uses.

#[cfg(test)]
pub mod test;

use crate::ast::{CapabilityName, ExprId, ExprKind, StmtId, StmtKind};
use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::registry;
use crate::span::Origin;
use crate::stdlib::Builtin;
use crate::typechecker::TypedAst;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Io,
    Net,
    Fs,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Io, Capability::Net, Capability::Fs];

    pub fn name(self) -> &'static str {
        match self {
            Capability::Io => "io",
            Capability::Net => "net",
            Capability::Fs => "fs",
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type CapabilitySet = BTreeSet<Capability>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Grant {
    pub declared: CapabilitySet,
    /// What the owner's code actually uses, including callee declarations.
    pub required: CapabilitySet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapabilityTable {
    pub module: Grant,
    pub functions: IndexMap<String, Grant>,
}

impl CapabilityTable {
    /// Declared capabilities of `function`, or of the module for `None`.
    pub fn declared(&self, function: Option<&str>) -> Option<&CapabilitySet> {
        match function {
            None => Some(&self.module.declared),
            Some(name) => self.functions.get(name).map(|g| &g.declared),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedAst {
    pub typed: TypedAst,
    pub capabilities: CapabilityTable,
}

#[derive(Debug, Clone)]
pub struct CapabilityResult {
    /// `None` when any fatal diagnostic was reported.
    pub annotated: Option<AnnotatedAst>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn check(typed: TypedAst, config: &Config) -> CapabilityResult {
    let mut checker = CapabilityChecker {
        typed: &typed,
        table: CapabilityTable::default(),
        diagnostics: vec![],
    };
    checker.collect_declarations(config);
    checker.check_uses();
    checker.report_unused();

    let CapabilityChecker {
        table, diagnostics, ..
    } = checker;
    debug!(
        module = ?table.module.declared,
        functions = table.functions.len(),
        diagnostics = diagnostics.len(),
        "capabilities checked"
    );
    let annotated = if diagnostics.iter().any(Diagnostic::is_fatal) {
        None
    } else {
        Some(AnnotatedAst {
            typed,
            capabilities: table,
        })
    };
    CapabilityResult {
        annotated,
        diagnostics,
    }
}

struct CapabilityChecker<'a> {
    typed: &'a TypedAst,
    table: CapabilityTable,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CapabilityChecker<'a> {
    fn collect_declarations(&mut self, config: &Config) {
        let typed = self.typed;
        let ast = &typed.ast;
        for decl in ast.capability_decls() {
            let declared = self.resolve_names(&decl.names, config);
            self.table.module.declared.extend(declared);
        }
        for function in ast.functions() {
            let declared = self.resolve_names(&function.capabilities, config);
            self.table
                .functions
                .entry(function.name.clone())
                .or_default()
                .declared
                .extend(declared);
        }
    }

    fn resolve_names(&mut self, names: &[CapabilityName], config: &Config) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        for name in names {
            let Some(capability) = registry::capability(&name.name) else {
                let note = match registry::capability_synonym(&name.name) {
                    Some(canonical) => format!("did you mean '{canonical}'?"),
                    None => "known capabilities are io, net and fs".to_string(),
                };
                self.diagnostics.push(
                    Diagnostic::fatal(
                        "HND-CAP-0001",
                        name.origin,
                        format!("unknown capability '{}'", name.name),
                    )
                    .with_note(note),
                );
                continue;
            };
            let level = config.supervision;
            if level.needs_approval(capability) && !config.approvals.contains(&capability) {
                self.diagnostics.push(
                    Diagnostic::error(
                        "HND-CAP-0102",
                        name.origin,
                        format!("capability '{capability}' needs approval at supervision level {level}"),
                    )
                    .with_note(format!("approve it with '--approve {capability}'")),
                );
            }
            set.insert(capability);
        }
        set
    }

    fn check_uses(&mut self) {
        let typed = self.typed;
        for id in typed.ast.top_level() {
            self.visit_stmt(None, id);
        }
        for function in typed.ast.functions() {
            for id in &function.body {
                self.visit_stmt(Some(function.name.as_str()), *id);
            }
        }
    }

    fn visit_stmt(&mut self, owner: Option<&'a str>, id: StmtId) {
        let typed = self.typed;
        let stmt = typed.ast.stmt(id);
        match &stmt.kind {
            StmtKind::Assign { value, .. } => self.visit_expr(owner, *value),
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.visit_expr(owner, *cond);
                for id in then_body.iter().chain(else_body.iter().flatten()) {
                    self.visit_stmt(owner, *id);
                }
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(owner, *cond);
                for id in body {
                    self.visit_stmt(owner, *id);
                }
            }
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.visit_expr(owner, *value);
                }
            }
            StmtKind::Show { value } => {
                self.visit_expr(owner, *value);
                self.require(owner, Capability::Io, stmt.origin, "'show'");
            }
            StmtKind::Ask { prompt, .. } => {
                if let Some(prompt) = prompt {
                    self.visit_expr(owner, *prompt);
                }
                self.require(owner, Capability::Io, stmt.origin, "'ask'");
            }
            StmtKind::Verify { cond } => self.visit_expr(owner, *cond),
            StmtKind::Expr { expr } => self.visit_expr(owner, *expr),
        }
    }

    fn visit_expr(&mut self, owner: Option<&'a str>, id: ExprId) {
        let typed = self.typed;
        let expr = typed.ast.expr(id);
        match &expr.kind {
            ExprKind::Int { .. }
            | ExprKind::Float { .. }
            | ExprKind::Text { .. }
            | ExprKind::Bool { .. }
            | ExprKind::Null
            | ExprKind::Var { .. } => {}
            ExprKind::Unary { operand, .. } => self.visit_expr(owner, *operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.visit_expr(owner, *lhs);
                self.visit_expr(owner, *rhs);
            }
            ExprKind::Call { callee, args } => {
                for arg in args {
                    self.visit_expr(owner, *arg);
                }
                if let Some(grant) = self.table.functions.get(callee) {
                    let what = format!("call to '{callee}'");
                    for capability in grant.declared.clone() {
                        self.require(owner, capability, expr.origin, &what);
                    }
                } else if let Some(capability) = Builtin::from_name(callee).and_then(Builtin::capability) {
                    self.require(owner, capability, expr.origin, &format!("'{callee}'"));
                }
            }
            ExprKind::List { items } => {
                for item in items {
                    self.visit_expr(owner, *item);
                }
            }
            ExprKind::Map { entries } => {
                for (key, value) in entries {
                    self.visit_expr(owner, *key);
                    self.visit_expr(owner, *value);
                }
            }
            ExprKind::Record { fields } => {
                for (_, value) in fields {
                    self.visit_expr(owner, *value);
                }
            }
            ExprKind::Field { base, .. } => self.visit_expr(owner, *base),
            ExprKind::Index { base, index } => {
                self.visit_expr(owner, *base);
                self.visit_expr(owner, *index);
            }
        }
    }

    fn require(&mut self, owner: Option<&str>, capability: Capability, origin: Origin, what: &str) {
        let grant = match owner {
            None => &mut self.table.module,
            Some(name) => self.table.functions.entry(name.to_string()).or_default(),
        };
        grant.required.insert(capability);
        if grant.declared.contains(&capability) {
            return;
        }
        let diagnostic = match owner {
            None => Diagnostic::fatal(
                "HND-CAP-0201",
                origin,
                format!("{what} needs capability '{capability}', which the module does not declare"),
            )
            .with_note(format!("add a top-level '🛡 {capability}' line")),
            Some(name) => Diagnostic::fatal(
                "HND-CAP-0202",
                origin,
                format!("{what} needs capability '{capability}', which function '{name}' does not declare"),
            )
            .with_note(format!("add '🛡 {capability}' to the header of '{name}'")),
        };
        self.diagnostics.push(diagnostic);
    }

    fn report_unused(&mut self) {
        let typed = self.typed;
        let ast = &typed.ast;
        let mut reported = BTreeSet::new();
        for decl in ast.capability_decls() {
            for name in &decl.names {
                let Some(capability) = registry::capability(&name.name) else {
                    continue;
                };
                if !self.table.module.required.contains(&capability) && reported.insert((None, capability)) {
                    self.diagnostics.push(Diagnostic::warning(
                        "HND-CAP-0301",
                        name.origin,
                        format!("capability '{capability}' is declared but never used at top level"),
                    ));
                }
            }
        }
        for function in ast.functions() {
            let Some(grant) = self.table.functions.get(&function.name) else {
                continue;
            };
            for name in &function.capabilities {
                let Some(capability) = registry::capability(&name.name) else {
                    continue;
                };
                if !grant.required.contains(&capability)
                    && reported.insert((Some(function.name.as_str()), capability))
                {
                    self.diagnostics.push(Diagnostic::warning(
                        "HND-CAP-0301",
                        name.origin,
                        format!(
                            "capability '{capability}' is declared but never used by '{}'",
                            function.name
                        ),
                    ));
                }
            }
        }
    }
}
