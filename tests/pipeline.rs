use handc::capabilities::Capability;
use handc::config::{Config, SupervisionLevel};
use handc::diagnostic::Severity;
use handc::interpreter::{Actor, MockHost, Value};
use handc::pipeline::{Stage, compile, execute};
use handc::span::FileId;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;

fn approved() -> Config {
    Config::default().approve(Capability::ALL)
}

#[test]
fn declared_int_is_shown_and_stored() {
    let execution = execute(FileId(0), b"x: Int = 1\nshow x\n", &approved(), &mut MockHost::new());
    // `show` without `🛡 io` never gets past the checker
    assert_eq!(execution.compilation.halted_at, Some(Stage::Capabilities));

    let execution = execute(
        FileId(0),
        "🛡 io\nx: Int = 1\nshow x\n".as_bytes(),
        &approved(),
        &mut MockHost::new(),
    );
    let run = execution.run.unwrap();
    assert_eq!(run.outputs, vec!["1"]);
    assert_eq!(
        run.store,
        IndexMap::from([("x".to_string(), Value::Int(1))])
    );
}

#[test]
fn function_call_result_is_shown() {
    let source = "🛡 io\n🔧 add(a: Int, b: Int) -> Int:\n    return a + b\nx = add(2, 3)\nshow x\n";
    let execution = execute(FileId(0), source.as_bytes(), &approved(), &mut MockHost::new());
    assert!(execution.completed());
    let run = execution.run.unwrap();
    assert_eq!(run.outputs, vec!["5"]);
    assert_eq!(run.store.get("x"), Some(&Value::Int(5)));
}

#[test]
fn undeclared_network_call_is_fatal_at_every_level() {
    let source = "🛡 io\n🔧 page(u: Text) 🛡 io:\n    show fetch(u)\npage(\"https://example.com\")\n";
    for supervision in SupervisionLevel::ALL {
        let config = Config {
            supervision,
            ..approved()
        };
        let execution = execute(FileId(0), source.as_bytes(), &config, &mut MockHost::new());
        assert!(execution.run.is_none(), "ran at {supervision}");
        let fatal: Vec<_> = execution
            .compilation
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Fatal)
            .collect();
        assert_eq!(fatal.len(), 1);
        // the `fetch(u)` call on line 3
        assert_eq!((fatal[0].origin.line, fatal[0].origin.col), (3, 10));
    }
}

#[test]
fn malformed_indentation_stops_at_the_lexer() {
    let source = "🛡 io\nif true:\n   show 1\nshow 2\n";
    let compilation = compile(FileId(0), source.as_bytes(), &approved());
    assert_eq!(compilation.halted_at, Some(Stage::Lex));
    assert_eq!(compilation.diagnostics.len(), 1);
    assert_eq!(compilation.diagnostics[0].code, "HND-INDENT-0001");
    assert!(compilation.module.is_none());
}

#[test]
fn mixing_base_types_is_reported_at_the_expression() {
    let values = ["1", "2.0", "\"a\"", "true"];
    for (i, lhs) in values.iter().enumerate() {
        for (j, rhs) in values.iter().enumerate() {
            if i == j {
                continue;
            }
            for op in ["+", "<", "=="] {
                let source = format!("x = {lhs} {op} {rhs}\n");
                let compilation = compile(FileId(0), source.as_bytes(), &approved());
                assert_eq!(compilation.halted_at, Some(Stage::Typecheck), "{source}");
                let error = &compilation.diagnostics[0];
                assert!(error.code.starts_with("HND-TC-"), "{source}");
                assert_eq!((error.origin.line, error.origin.col), (1, 5), "{source}");
            }
        }
    }
}

#[test]
fn bad_map_key_type_stops_at_the_checker() {
    let compilation = compile(FileId(0), b"m: Map[Float, Int] = {1.5: 2}\n", &approved());
    assert_eq!(compilation.halted_at, Some(Stage::Typecheck));
    let codes: Vec<_> = compilation.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["HND-TC-0213"]);
    assert!(compilation.module.is_none());
}

#[test]
fn runtime_halt_keeps_partial_observations() {
    let source = "🛡 io\nx = 1\nshow x\ny = x / 0\nshow y\n";
    let execution = execute(FileId(0), source.as_bytes(), &approved(), &mut MockHost::new());
    assert!(execution.compilation.succeeded());
    assert!(!execution.completed());
    let run = execution.run.unwrap();
    assert_eq!(run.outputs, vec!["1"]);
    assert_eq!(run.store.get("x"), Some(&Value::Int(1)));
    assert_eq!(run.diagnostics[0].code, "HND-RT-0201");
    // show, then the runtime diagnostic
    assert_eq!(run.trace.len(), 2);
}

#[test]
fn runaway_recursion_halts_at_the_default_depth() {
    let source = "🛡 io\n🔧 f(n: Int) -> Int:\n    return f(n + 1)\nshow f(0)\n";
    let execution = execute(FileId(0), source.as_bytes(), &approved(), &mut MockHost::new());
    assert!(execution.compilation.succeeded());
    let run = execution.run.unwrap();
    assert!(!run.completed);
    assert!(run.outputs.is_empty());
    assert_eq!(run.diagnostics[0].code, "HND-RT-0701");
}

#[test]
fn trace_tags_actors() {
    let source = "🛡 io, net\nask who\npage = fetch(\"https://example.com\")\nshow page + who\n";
    let config = Config {
        inputs: vec!["!".to_string()],
        ..approved()
    };
    let mut host = MockHost::new().with_url("https://example.com", "hi");
    let run = execute(FileId(0), source.as_bytes(), &config, &mut host)
        .run
        .unwrap();
    assert_eq!(run.outputs, vec!["hi!"]);
    let actors: Vec<_> = run.trace.iter().map(|e| e.actor).collect();
    assert_eq!(
        actors,
        vec![Actor::Human, Actor::TrustedSource, Actor::Automated]
    );
    let indices: Vec<_> = run.trace.iter().map(|e| e.seq).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn supervision_never_changes_meaning() {
    let source = "🛡 io\ni = 0\nwhile i < 3:\n    show i * i\n    i = i + 1\n";
    let outputs: Vec<_> = SupervisionLevel::ALL
        .into_iter()
        .map(|supervision| {
            let config = Config {
                supervision,
                ..approved()
            };
            execute(FileId(0), source.as_bytes(), &config, &mut MockHost::new())
                .run
                .map(|run| run.outputs)
        })
        .collect();
    for output in &outputs {
        assert_eq!(output.as_deref(), Some(["0", "1", "4"].map(String::from).as_slice()));
    }
}
