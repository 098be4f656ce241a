//! Cross-backend equivalence. The reference interpreter's outputs, store and
//! halt code are ground truth; executable backends must reproduce them,
//! snapshot-only backends are checked for deterministic output and reported
//! as degraded.


use crate::codegen::{self, Backend, Equivalence};
use crate::config::Config;
use crate::interpreter::{self, MockHost, Observation, Value};
use crate::ir::{Module, Op};
use crate::pipeline::{self, Stage};
use crate::span::FileId;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use std::collections::BTreeSet;

/// Where an executable backend first disagreed with the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum Divergence {
    Output {
        index: usize,
        expected: String,
        actual: String,
    },
    OutputLength {
        expected: usize,
        actual: usize,
    },
    StoreKey {
        key: String,
        expected: Option<Value>,
        actual: Option<Value>,
    },
    Halt {
        expected: Option<String>,
        actual: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Pass,
    Mismatch {
        divergence: Divergence,
    },
    /// Snapshot-only: the artifact was stable across runs but its meaning
    /// was not checked.
    Degraded {
        reason: String,
        sha256: String,
        bytes: usize,
    },
    Nondeterministic {
        first: String,
        second: String,
    },
    BackendError {
        message: String,
    },
    UnknownTarget,
    CompileFailed {
        stage: Option<Stage>,
    },
}

impl Status {
    /// Statuses a corpus run counts as failures. Degraded is not one.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Status::Pass | Status::Degraded { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Mismatch { .. } => "mismatch",
            Status::Degraded { .. } => "degraded",
            Status::Nondeterministic { .. } => "nondeterministic",
            Status::BackendError { .. } => "backend_error",
            Status::UnknownTarget => "unknown_target",
            Status::CompileFailed { .. } => "compile_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    pub target: String,
    #[serde(flatten)]
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub program: String,
    /// Opcodes and capabilities the program exercises.
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Observation>,
    pub diagnostics: Vec<String>,
    pub targets: Vec<TargetReport>,
}

impl Report {
    pub fn failures(&self) -> usize {
        self.targets.iter().filter(|t| t.status.is_failure()).count()
    }
}

/// One program of a corpus.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusReport {
    pub targets: Vec<String>,
    pub reports: Vec<Report>,
    /// feature -> target -> summary over the programs using the feature.
    pub matrix: IndexMap<String, IndexMap<String, String>>,
    pub failures: usize,
}

fn digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Compares two observations, reporting the first point of divergence:
/// outputs by index, then output length, then store keys in the
/// reference's order followed by extra keys, then the halt code.
pub fn compare(expected: &Observation, actual: &Observation) -> Option<Divergence> {
    let paired = expected.outputs.iter().zip(&actual.outputs).enumerate();
    for (index, (e, a)) in paired {
        if e != a {
            return Some(Divergence::Output {
                index,
                expected: e.clone(),
                actual: a.clone(),
            });
        }
    }
    if expected.outputs.len() != actual.outputs.len() {
        return Some(Divergence::OutputLength {
            expected: expected.outputs.len(),
            actual: actual.outputs.len(),
        });
    }
    let extra = actual
        .store
        .keys()
        .filter(|key| !expected.store.contains_key(*key));
    for key in expected.store.keys().chain(extra) {
        let e = expected.store.get(key);
        let a = actual.store.get(key);
        if e != a {
            return Some(Divergence::StoreKey {
                key: key.clone(),
                expected: e.cloned(),
                actual: a.cloned(),
            });
        }
    }
    if expected.halt != actual.halt {
        return Some(Divergence::Halt {
            expected: expected.halt.clone(),
            actual: actual.halt.clone(),
        });
    }
    None
}

fn features(module: &Module) -> Vec<String> {
    fn walk(nodes: &[crate::ir::Node], into: &mut BTreeSet<String>) {
        for node in nodes {
            into.insert(node.op.opcode().to_string());
            match &node.op {
                Op::Logic { rhs_body, .. } => walk(rhs_body, into),
                Op::If {
                    then_body,
                    else_body,
                    ..
                } => {
                    walk(then_body, into);
                    walk(else_body, into);
                }
                Op::Loop {
                    cond_body, body, ..
                } => {
                    walk(cond_body, into);
                    walk(body, into);
                }
                Op::Builtin { builtin, .. } => {
                    into.insert(format!("builtin:{builtin}"));
                }
                _ => {}
            }
        }
    }
    let mut found = BTreeSet::new();
    walk(&module.main, &mut found);
    for function in &module.functions {
        found.insert("function".to_string());
        walk(&function.body, &mut found);
    }
    for capability in &module.capabilities {
        found.insert(format!("capability:{capability}"));
    }
    found.into_iter().collect()
}

fn check_target(
    backend: &dyn Backend,
    module: &Module,
    reference: &Observation,
    config: &Config,
    host: &MockHost,
) -> Status {
    match backend.equivalence() {
        Equivalence::Executable => {
            let run = match backend.execute(module, config, &mut host.clone()) {
                Ok(run) => run,
                Err(error) => {
                    return Status::BackendError {
                        message: error.to_string(),
                    };
                }
            };
            match compare(reference, &run.observation()) {
                None => Status::Pass,
                Some(divergence) => Status::Mismatch { divergence },
            }
        }
        Equivalence::SnapshotOnly { reason } => {
            let emitted = backend.emit(module).and_then(|first| {
                let second = backend.emit(module)?;
                Ok((first, second))
            });
            match emitted {
                Err(error) => Status::BackendError {
                    message: error.to_string(),
                },
                Ok((first, second)) if first != second => Status::Nondeterministic {
                    first: digest(&first),
                    second: digest(&second),
                },
                Ok((first, _)) => Status::Degraded {
                    reason: reason.to_string(),
                    sha256: digest(&first),
                    bytes: first.len(),
                },
            }
        }
    }
}

/// Checks one program against every requested target. The interpreter
/// and each backend start from their own clone of `host`.
pub fn check_equivalence(program: &Program, targets: &[String], config: &Config, host: &MockHost) -> Report {
    let compilation = pipeline::compile(FileId(0), program.source.as_bytes(), config);
    let diagnostics = compilation
        .diagnostics
        .iter()
        .map(ToString::to_string)
        .collect();
    let (Some(annotated), Some(module)) = (&compilation.program, &compilation.module) else {
        debug!(program = %program.name, "compile failed");
        let stage = compilation.halted_at;
        return Report {
            program: program.name.clone(),
            features: vec![],
            reference: None,
            diagnostics,
            targets: targets
                .iter()
                .map(|target| TargetReport {
                    target: target.clone(),
                    status: Status::CompileFailed { stage },
                })
                .collect(),
        };
    };

    let reference = interpreter::run(annotated, config, &mut host.clone()).observation();
    let targets = targets
        .iter()
        .map(|target| {
            let status = match codegen::backend(target) {
                Some(backend) => check_target(backend.as_ref(), module, &reference, config, host),
                None => Status::UnknownTarget,
            };
            debug!(program = %program.name, %target, status = status.name(), "checked");
            TargetReport {
                target: target.clone(),
                status,
            }
        })
        .collect();
    Report {
        program: program.name.clone(),
        features: features(module),
        reference: Some(reference),
        diagnostics,
        targets,
    }
}

fn summarize(statuses: &[&str]) -> String {
    let summary = if statuses.is_empty() {
        "n/a"
    } else if statuses.iter().all(|s| *s == "pass") {
        "pass"
    } else if statuses.iter().all(|s| *s == "degraded") {
        "degraded"
    } else if statuses.iter().any(|s| *s == "mismatch") {
        "mixed/mismatch"
    } else {
        "mixed"
    };
    summary.to_string()
}

/// Checks every program in parallel; units share nothing mutable.
pub fn check_corpus(programs: &[Program], targets: &[String], config: &Config, host: &MockHost) -> CorpusReport {
    let reports: Vec<Report> = programs
        .par_iter()
        .map(|program| check_equivalence(program, targets, config, host))
        .collect();

    let features: BTreeSet<&str> = reports
        .iter()
        .flat_map(|r| r.features.iter().map(String::as_str))
        .collect();
    let mut matrix = IndexMap::new();
    for feature in features {
        let mut row = IndexMap::new();
        for target in targets {
            let statuses: Vec<&str> = reports
                .iter()
                .filter(|r| r.features.iter().any(|f| f == feature))
                .flat_map(|r| r.targets.iter())
                .filter(|t| t.target == *target)
                .map(|t| t.status.name())
                .collect();
            row.insert(target.clone(), summarize(&statuses));
        }
        matrix.insert(feature.to_string(), row);
    }

    let failures = reports.iter().map(Report::failures).sum();
    info!(programs = reports.len(), failures, "corpus checked");
    CorpusReport {
        targets: targets.to_vec(),
        reports,
        matrix,
        failures,
    }
}
