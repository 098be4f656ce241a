use super::*;
use crate::capabilities::{self, CapabilitySet};
use crate::lexer::lex;
use crate::parser::parse;
use crate::span::FileId;
use crate::typechecker;

use pretty_assertions::assert_eq;

fn annotate(source: &str) -> AnnotatedAst {
    let lexed = lex(FileId(0), source.as_bytes());
    assert!(lexed.diagnostics.is_empty(), "{:?}", lexed.diagnostics);
    let parsed = parse(&lexed.tokens);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let checked = typechecker::check(parsed.ast);
    assert!(checked.diagnostics.is_empty(), "{:?}", checked.diagnostics);
    let config = Config::default().approve(Capability::ALL);
    let result = capabilities::check(checked.typed, &config);
    result
        .annotated
        .unwrap_or_else(|| panic!("capability errors: {:?}", result.diagnostics))
}

fn run_with(source: &str, inputs: &[&str], host: &mut dyn Host) -> RunResult {
    let config = Config {
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        ..Config::default()
    };
    run(&annotate(source), &config, host)
}

fn run_str(source: &str) -> RunResult {
    run_with(source, &[], &mut MockHost::new())
}

fn halt_code(result: &RunResult) -> Option<&str> {
    assert_eq!(result.completed, result.diagnostics.is_empty());
    result.diagnostics.first().map(|d| d.code.as_str())
}

#[test]
fn test_show_declared_int() {
    let result = run_str("🛡 io\nx: Int = 1\nshow x\n");
    assert!(result.completed);
    assert_eq!(result.outputs, vec!["1"]);
    assert_eq!(
        result.store,
        IndexMap::from([("x".to_string(), Value::Int(1))])
    );
}

#[test]
fn test_function_call_result() {
    let result = run_str("🛡 io\n🔧 add(a: Int, b: Int) -> Int:\n    return a + b\nx = add(2, 3)\nshow x\n");
    assert_eq!(result.outputs, vec!["5"]);
    assert_eq!(result.store.get("x"), Some(&Value::Int(5)));
    // parameters never leak into the global store
    assert!(!result.store.contains_key("a"));
}

#[test]
fn test_integer_division_truncates() {
    let result = run_str("🛡 io\nshow 7 / 2\nshow -7 / 2\nshow -7 % 2\nshow 7.0 / 2.0\n");
    assert_eq!(result.outputs, vec!["3", "-3", "-1", "3.5"]);
}

#[test]
fn test_division_by_zero_keeps_partial_state() {
    let result = run_str("🛡 io\nx = 1\nshow x\ny = x / 0\nshow y\n");
    assert_eq!(halt_code(&result), Some("HND-RT-0201"));
    assert_eq!(result.outputs, vec!["1"]);
    assert_eq!(result.store.get("x"), Some(&Value::Int(1)));
    assert!(!result.store.contains_key("y"));
    let last = result.trace.last().unwrap();
    assert!(matches!(&last.payload, Payload::Diagnostic { code, .. } if code == "HND-RT-0201"));
}

#[test]
fn test_overflow_is_fatal() {
    let result = run_str("x = 9223372036854775807\ny = x + 1\n");
    assert_eq!(halt_code(&result), Some("HND-RT-0202"));
    let result = run_str("x = 1.0e300 * 1.0e300\n");
    assert_eq!(halt_code(&result), Some("HND-RT-0203"));
}

#[test]
fn test_rendering() {
    let source = "🛡 io\nshow [1, 2]\nshow {\"b\": 1, \"a\": 2}\nshow {name: \"n\", age: 3}\nshow 2.0\nshow [\"q\"]\nr: Result[Int, Text] = ok(1)\nshow r\nshow true\nshow \"raw\"\n";
    let result = run_str(source);
    assert_eq!(
        result.outputs,
        vec![
            "[1, 2]",
            "{\"a\": 2, \"b\": 1}",
            "{age: 3, name: \"n\"}",
            "2.0",
            "[\"q\"]",
            "ok(1)",
            "true",
            "raw"
        ]
    );
}

#[test]
fn test_ask_consumes_inputs() {
    let source = "🛡 io\nask n: Int \"number?\"\nask name\nshow n + 1\nshow name\n";
    let result = run_with(source, &["41", "Ada"], &mut MockHost::new());
    assert!(result.completed);
    assert_eq!(result.outputs, vec!["42", "Ada"]);
    let asks: Vec<_> = result
        .trace
        .iter()
        .filter(|e| e.actor == Actor::Human)
        .collect();
    assert_eq!(asks.len(), 2);
    assert!(matches!(
        &asks[0].payload,
        Payload::Ask { prompt: Some(prompt), input, .. } if prompt == "number?" && input == "41"
    ));
}

#[test]
fn test_ask_failures() {
    let exhausted = run_with("🛡 io\nask a\nask b\n", &["only"], &mut MockHost::new());
    assert_eq!(halt_code(&exhausted), Some("HND-RT-0101"));
    assert_eq!(exhausted.store.get("a"), Some(&Value::Text("only".to_string())));

    let bad = run_with("🛡 io\nask n: Int\n", &["forty"], &mut MockHost::new());
    assert_eq!(halt_code(&bad), Some("HND-RT-0102"));
}

#[test]
fn test_verify() {
    assert!(run_str("x = 3\n🔍 x > 2\n").completed);
    assert_eq!(
        halt_code(&run_str("x = 3\n🔍 x > 5\n")),
        Some("HND-RT-0401")
    );
}

#[test]
fn test_host_effects_are_traced() {
    let mut host = MockHost::new().with_url("https://example.com", "hello");
    let source = "🛡 io, net, fs\nbody = fetch(\"https://example.com\")\nwrite_file(\"copy.txt\", body)\nshow read_file(\"copy.txt\")\n";
    let result = run_with(source, &[], &mut host);
    assert!(result.completed, "{:?}", result.diagnostics);
    assert_eq!(result.outputs, vec!["hello"]);
    assert_eq!(host.files.get("copy.txt").map(String::as_str), Some("hello"));

    let actors: Vec<_> = result.trace.iter().map(|e| (e.actor, e.capability)).collect();
    assert_eq!(
        actors,
        vec![
            (Actor::TrustedSource, Some(Capability::Net)),
            (Actor::Automated, Some(Capability::Fs)),
            (Actor::TrustedSource, Some(Capability::Fs)),
            (Actor::Automated, Some(Capability::Io)),
        ]
    );
    let seqs: Vec<_> = result.trace.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
}

#[test]
fn test_host_failure() {
    let result = run_str("🛡 net\nx = fetch(\"https://missing\")\n");
    assert_eq!(halt_code(&result), Some("HND-RT-0501"));
}

#[test]
fn test_block_scopes_and_globals() {
    let source = "🛡 io\ntotal = 0\ni = 0\nwhile i < 4:\n    step = i * 2\n    total = total + step\n    i = i + 1\nshow total\n🔧 scaled(n: Int) -> Int:\n    return n * total\nshow scaled(2)\n";
    let result = run_str(source);
    assert_eq!(result.outputs, vec!["12", "24"]);
    assert!(!result.store.contains_key("step"));
    let keys: Vec<_> = result.store.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["total", "i"]);
}

#[test]
fn test_recursion_and_depth_limit() {
    let source = "🛡 io\n🔧 fact(n: Int) -> Int:\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\nshow fact(10)\n";
    assert_eq!(run_str(source).outputs, vec!["3628800"]);

    let runaway = annotate("🔧 down(n: Int) -> Int:\n    return down(n + 1)\nx = down(0)\n");
    let config = Config {
        max_call_depth: 16,
        ..Config::default()
    };
    let result = run(&runaway, &config, &mut MockHost::new());
    assert_eq!(halt_code(&result), Some("HND-RT-0701"));
}

#[test]
fn test_default_depth_limit_halts_cleanly() {
    assert_eq!(Config::default().max_call_depth, 128);
    for body in ["return down(n + 1)", "return 1 + down(n + 1) * 2"] {
        let source = format!("🔧 down(n: Int) -> Int:\n    {body}\nx = down(0)\n");
        let result = run_str(&source);
        assert_eq!(halt_code(&result), Some("HND-RT-0701"), "{body}");
        assert!(result.store.is_empty());
    }
}

#[test]
fn test_logic_short_circuits() {
    let result = run_str("🛡 io\nshow false and 1 / 0 == 1\nshow true or 1 / 0 == 1\n");
    assert_eq!(result.outputs, vec!["false", "true"]);
}

#[test]
fn test_container_errors() {
    assert_eq!(
        halt_code(&run_str("xs = [1, 2]\nx = xs[2]\n")),
        Some("HND-RT-0301")
    );
    assert_eq!(
        halt_code(&run_str("m = {\"a\": 1}\nx = m[\"b\"]\n")),
        Some("HND-RT-0302")
    );
    assert_eq!(
        halt_code(&run_str("r: Result[Int, Text] = err(\"no\")\nx = unwrap(r)\n")),
        Some("HND-RT-0303")
    );
}

#[test]
fn test_runtime_capability_gate() {
    let mut program = annotate("🛡 io\nshow 1\n");
    program.capabilities.module.declared = CapabilitySet::new();
    let result = run(&program, &Config::default(), &mut MockHost::new());
    assert_eq!(halt_code(&result), Some("HND-RT-0601"));
    assert!(result.outputs.is_empty());
}

#[test]
fn test_runs_are_deterministic() {
    let source = "🛡 io\nxs: List[Int] = []\ni = 0\nwhile i < 3:\n    xs = push(xs, i * i)\n    i = i + 1\nshow xs\nshow len(xs)\n";
    let first = run_str(source);
    let second = run_str(source);
    assert_eq!(first.observation(), second.observation());
    assert_eq!(first.trace, second.trace);
    assert_eq!(first.outputs, vec!["[0, 1, 4]", "3"]);
}
