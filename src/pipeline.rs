//! Strictly sequential per-unit driver: each stage sees the complete output of
//! the previous one, and the supervision level decides whether sub-fatal
//! diagnostics stop the unit.

use crate::capabilities::{self, AnnotatedAst};
use crate::config::Config;
use crate::diagnostic::{Diagnostic, Severity, count_at_least};
use crate::interpreter::{self, Host, RunResult};
use crate::ir::{self, Module};
use crate::lexer::lex;
use crate::parser::parse;
use crate::span::FileId;
use crate::typechecker;

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lex,
    Parse,
    Typecheck,
    Capabilities,
    Lower,
}

#[derive(Debug, Clone, Serialize)]
pub struct Compilation {
    /// Every diagnostic from every stage that ran, in stage order.
    pub diagnostics: Vec<Diagnostic>,
    /// Stage that stopped the unit, if any.
    pub halted_at: Option<Stage>,
    #[serde(skip)]
    pub program: Option<AnnotatedAst>,
    pub module: Option<Module>,
}

impl Compilation {
    pub fn succeeded(&self) -> bool {
        self.halted_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub compilation: Compilation,
    /// `None` when compilation halted.
    pub run: Option<RunResult>,
}

impl Execution {
    /// True when compilation and the run both finished without a halt.
    pub fn completed(&self) -> bool {
        self.run.as_ref().is_some_and(|run| run.completed)
    }
}

/// Lex, parse and typecheck errors are terminal for the unit
/// regardless of level; warnings only halt under strict supervision.
fn stops(config: &Config, diagnostics: &[Diagnostic]) -> bool {
    count_at_least(diagnostics, Severity::Error) > 0 || config.supervision.halts(diagnostics)
}

pub fn compile(file: FileId, bytes: &[u8], config: &Config) -> Compilation {
    let mut compilation = Compilation {
        diagnostics: vec![],
        halted_at: None,
        program: None,
        module: None,
    };

    let lexed = lex(file, bytes);
    let halt = stops(config, &lexed.diagnostics);
    compilation.diagnostics.extend(lexed.diagnostics);
    if halt {
        return compilation.halt(Stage::Lex);
    }

    let parsed = parse(&lexed.tokens);
    let halt = stops(config, &parsed.diagnostics);
    compilation.diagnostics.extend(parsed.diagnostics);
    if halt {
        return compilation.halt(Stage::Parse);
    }

    let checked = typechecker::check(parsed.ast);
    let halt = stops(config, &checked.diagnostics);
    compilation.diagnostics.extend(checked.diagnostics);
    if halt {
        return compilation.halt(Stage::Typecheck);
    }

    let annotated = capabilities::check(checked.typed, config);
    // the level decides whether approval errors stop the unit
    let halt = annotated.annotated.is_none() || config.supervision.halts(&annotated.diagnostics);
    compilation.diagnostics.extend(annotated.diagnostics);
    let Some(program) = annotated.annotated.filter(|_| !halt) else {
        return compilation.halt(Stage::Capabilities);
    };

    let lowered = ir::lower(&program, &config.module_name);
    compilation.diagnostics.extend(lowered.diagnostics);
    compilation.program = Some(program);
    match lowered.module {
        Some(module) => {
            info!(
                module = %module.name,
                diagnostics = compilation.diagnostics.len(),
                "compiled"
            );
            compilation.module = Some(module);
            compilation
        }
        None => compilation.halt(Stage::Lower),
    }
}

impl Compilation {
    fn halt(mut self, stage: Stage) -> Self {
        info!(
            ?stage,
            diagnostics = self.diagnostics.len(),
            "compilation halted"
        );
        self.halted_at = Some(stage);
        self
    }
}

/// Compiles and, when nothing halted, runs the program on the reference
/// interpreter.
pub fn execute(file: FileId, bytes: &[u8], config: &Config, host: &mut dyn Host) -> Execution {
    let compilation = compile(file, bytes, config);
    let run = match (&compilation.program, compilation.succeeded()) {
        (Some(program), true) => Some(interpreter::run(program, config, host)),
        _ => None,
    };
    if let Some(run) = &run {
        info!(
            outputs = run.outputs.len(),
            completed = run.completed,
            "executed"
        );
    }
    Execution { compilation, run }
}
