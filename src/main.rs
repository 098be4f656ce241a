use handc::ast::Ast;
use handc::ast::format::format;
use handc::config::{Config, SupervisionLevel};
use handc::diagnostic::{self, Diagnostic, Severity, count_at_least};
use handc::interpreter::MockHost;
use handc::lexer::lex;
use handc::oracle::{self, Program};
use handc::parser::parse;
use handc::pipeline;
use handc::registry;
use handc::span::FileId;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "handc", version)]
#[command(about = "Compile, check and run HAND programs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Supervision level, 1 (strict) to 4 (trusted)
    #[arg(long, global = true)]
    level: Option<u8>,

    /// Approve capabilities, e.g. `--approve net,fs`
    #[arg(long, global = true, value_delimiter = ',')]
    approve: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the token stream
    Lex { file: PathBuf },
    /// Print the syntax tree
    Parse { file: PathBuf },
    /// Print the program in canonical form
    Fmt {
        file: PathBuf,
        /// Fail instead of printing when the file is not canonical
        #[arg(long)]
        check: bool,
    },
    /// Run every static stage and report diagnostics
    Check { file: PathBuf },
    /// Run the program on the reference interpreter
    Run {
        file: PathBuf,
        /// Line consumed by `ask`; repeat for each prompt
        #[arg(long = "input")]
        inputs: Vec<String>,
    },
    /// Print the lowered IR
    Ir { file: PathBuf },
    /// Check backends against the reference interpreter
    Equiv {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long = "target", default_values = ["ir-vm", "ir-listing"])]
        targets: Vec<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// File settings first, then flags on top.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(level) = cli.level {
        config.supervision = SupervisionLevel::try_from(level)?;
    }
    for name in &cli.approve {
        let capability =
            registry::capability(name).ok_or_else(|| anyhow!("unknown capability '{name}'"))?;
        config.approvals.insert(capability);
    }
    debug!(?config, "configured");
    Ok(config)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(path: &Path, bytes: &[u8], diagnostics: &[Diagnostic]) {
    let source = String::from_utf8_lossy(bytes);
    let color = std::io::stderr().is_terminal();
    eprint!(
        "{}",
        diagnostic::render(&path.display().to_string(), &source, diagnostics, color)
    );
}

/// Lexes and parses one file, reporting diagnostics. The tree is `None`
/// when either stage found an error.
fn parse_file(path: &Path) -> Result<(Vec<u8>, Option<Ast>)> {
    let bytes = read(path)?;
    let lexed = lex(FileId(0), &bytes);
    let parsed = parse(&lexed.tokens);
    let mut diagnostics = lexed.diagnostics;
    diagnostics.extend(parsed.diagnostics);
    report(path, &bytes, &diagnostics);
    let ok = count_at_least(&diagnostics, Severity::Error) == 0;
    Ok((bytes, ok.then_some(parsed.ast)))
}

fn exit(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    let file = FileId(0);

    match cli.command {
        Command::Lex { file: path } => {
            let bytes = read(&path)?;
            let lexed = lex(file, &bytes);
            if cli.json {
                print_json(&lexed.tokens)?;
            } else {
                for token in &lexed.tokens {
                    println!("{} {:?} {:?}", token.origin, token.kind, token.lexeme);
                }
            }
            report(&path, &bytes, &lexed.diagnostics);
            Ok(exit(count_at_least(&lexed.diagnostics, Severity::Error) == 0))
        }
        Command::Parse { file: path } => {
            let Some(ast) = parse_file(&path)?.1 else {
                return Ok(ExitCode::FAILURE);
            };
            if cli.json {
                print_json(&ast)?;
            } else {
                println!("{ast:#?}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Fmt { file: path, check } => {
            let (bytes, ast) = parse_file(&path)?;
            let Some(ast) = ast else {
                return Ok(ExitCode::FAILURE);
            };
            let canonical = format(&ast);
            if !check {
                print!("{canonical}");
                return Ok(ExitCode::SUCCESS);
            }
            let same = canonical.as_bytes() == bytes.as_slice();
            if !same {
                eprintln!("{} is not canonically formatted", path.display());
            }
            Ok(exit(same))
        }
        Command::Check { file: path } => {
            let bytes = read(&path)?;
            let compilation = pipeline::compile(file, &bytes, &config);
            if cli.json {
                print_json(&compilation)?;
            } else {
                report(&path, &bytes, &compilation.diagnostics);
                if compilation.succeeded() {
                    println!("{}: ok", path.display());
                }
            }
            Ok(exit(compilation.succeeded()))
        }
        Command::Run {
            file: path,
            inputs,
        } => {
            let bytes = read(&path)?;
            let config = Config {
                inputs: if inputs.is_empty() {
                    config.inputs
                } else {
                    inputs
                },
                ..config
            };
            let execution = pipeline::execute(file, &bytes, &config, &mut MockHost::new());
            if cli.json {
                print_json(&execution)?;
            } else {
                report(&path, &bytes, &execution.compilation.diagnostics);
                if let Some(run) = &execution.run {
                    for line in &run.outputs {
                        println!("{line}");
                    }
                    report(&path, &bytes, &run.diagnostics);
                }
            }
            Ok(exit(execution.completed()))
        }
        Command::Ir { file: path } => {
            let bytes = read(&path)?;
            let compilation = pipeline::compile(file, &bytes, &config);
            report(&path, &bytes, &compilation.diagnostics);
            let Some(module) = &compilation.module else {
                return Ok(ExitCode::FAILURE);
            };
            if cli.json {
                println!("{}", module.to_json()?);
            } else {
                print!("{module}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Equiv { files, targets } => {
            let programs = files
                .iter()
                .map(|path| {
                    let bytes = read(path)?;
                    let source = String::from_utf8(bytes)
                        .with_context(|| format!("{} is not UTF-8", path.display()))?;
                    Ok(Program {
                        name: path.display().to_string(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let corpus = oracle::check_corpus(&programs, &targets, &config, &MockHost::new());
            if cli.json {
                print_json(&corpus)?;
            } else {
                for report in &corpus.reports {
                    for target in &report.targets {
                        println!("{} {} {}", report.program, target.target, target.status.name());
                    }
                }
                println!("{} failure(s)", corpus.failures);
            }
            Ok(exit(corpus.failures == 0))
        }
    }
}

fn main() -> Result<ExitCode> {
    init_logging();
    run(Cli::parse())
}
