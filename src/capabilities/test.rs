use super::*;
use crate::config::SupervisionLevel;
use crate::diagnostic::Severity;
use crate::lexer::lex;
use crate::parser::parse;
use crate::span::FileId;
use crate::typechecker;

fn check_with(source: &str, config: &Config) -> CapabilityResult {
    let lexed = lex(FileId(0), source.as_bytes());
    assert!(lexed.diagnostics.is_empty(), "{:?}", lexed.diagnostics);
    let parsed = parse(&lexed.tokens);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let checked = typechecker::check(parsed.ast);
    assert!(
        checked.diagnostics.is_empty(),
        "{:?}",
        checked.diagnostics
    );
    check(checked.typed, config)
}

fn check_str(source: &str) -> CapabilityResult {
    check_with(source, &Config::default().approve(Capability::ALL))
}

fn codes(result: &CapabilityResult) -> Vec<&str> {
    result.diagnostics.iter().map(|d| d.code.as_str()).collect()
}

#[test]
fn test_declared_io_passes() {
    let result = check_str("🛡 io\nx: Int = 1\nshow x\n");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let annotated = result.annotated.unwrap();
    assert_eq!(
        annotated.capabilities.module.required,
        CapabilitySet::from([Capability::Io])
    );
}

#[test]
fn test_show_without_io_is_fatal() {
    let result = check_str("x = 1\nshow x\n");
    assert_eq!(codes(&result), vec!["HND-CAP-0201"]);
    assert_eq!(result.diagnostics[0].severity, Severity::Fatal);
    assert!(result.annotated.is_none());
}

#[test]
fn test_network_call_in_function_without_net() {
    let source = "🛡 io\n🔧 load(url: Text) 🛡 io:\n    show fetch(url)\nload(\"https://example.com\")\n";
    let result = check_str(source);
    assert_eq!(codes(&result), vec!["HND-CAP-0202"]);
    // points at the fetch call, not the show statement
    let diagnostic = &result.diagnostics[0];
    assert_eq!((diagnostic.origin.line, diagnostic.origin.col), (3, 10));
    assert!(result.annotated.is_none());
}

#[test]
fn test_callers_inherit_callee_capabilities() {
    let source = "🔧 save(path: Text) 🛡 fs:\n    write_file(path, \"data\")\n🔧 run() 🛡 io:\n    save(\"out.txt\")\n    show \"saved\"\nrun()\n";
    let result = check_str(source);
    assert_eq!(codes(&result), vec!["HND-CAP-0201", "HND-CAP-0202"]);
    assert!(result.diagnostics[0].message.contains("'run'"));
    assert!(result.diagnostics[1].message.contains("'save'"));
}

#[test]
fn test_transitive_chain_passes_when_declared() {
    let source = "🛡 io, net\n🔧 get(u: Text) -> Text 🛡 net:\n    return fetch(u)\n🔧 show_page(u: Text) 🛡 io, net:\n    show get(u)\nshow_page(\"u\")\n";
    let result = check_str(source);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let table = result.annotated.unwrap().capabilities;
    assert_eq!(
        table.functions["show_page"].required,
        CapabilitySet::from([Capability::Io, Capability::Net])
    );
    assert_eq!(table.declared(Some("get")), Some(&CapabilitySet::from([Capability::Net])));
}

#[test]
fn test_recursion_is_fine() {
    let source = "🛡 io\n🔧 count(n: Int) 🛡 io:\n    if n > 0:\n        show n\n        count(n - 1)\ncount(3)\n";
    let result = check_str(source);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
}

#[test]
fn test_unknown_capability_suggests_canonical() {
    let result = check_str("🛡 network\nx = 1\n");
    assert_eq!(codes(&result), vec!["HND-CAP-0001"]);
    assert_eq!(
        result.diagnostics[0].note.as_deref(),
        Some("did you mean 'net'?")
    );
    assert!(result.annotated.is_none());
}

#[test]
fn test_unused_capability_warns() {
    let result = check_str("🛡 io, fs\nshow 1\n");
    assert_eq!(codes(&result), vec!["HND-CAP-0301"]);
    assert_eq!(result.diagnostics[0].severity, Severity::Warning);
    assert!(result.annotated.is_some());
}

#[test]
fn test_approvals_follow_supervision_level() {
    let source = "🛡 io, net\nshow fetch(\"u\")\n";

    let standard = check_with(source, &Config::default());
    assert_eq!(codes(&standard), vec!["HND-CAP-0102"]);
    assert!(standard.diagnostics[0].message.contains("'net'"));

    let approved = check_with(source, &Config::default().approve([Capability::Net]));
    assert!(approved.diagnostics.is_empty());

    let strict = Config {
        supervision: SupervisionLevel::Strict,
        ..Config::default()
    };
    assert_eq!(
        codes(&check_with(source, &strict)),
        vec!["HND-CAP-0102", "HND-CAP-0102"]
    );

    let trusted = Config {
        supervision: SupervisionLevel::Trusted,
        ..Config::default()
    };
    assert!(check_with(source, &trusted).diagnostics.is_empty());
}

#[test]
fn test_missing_capability_is_fatal_at_every_level() {
    for supervision in SupervisionLevel::ALL {
        let config = Config {
            supervision,
            ..Config::default()
        }
        .approve(Capability::ALL);
        let result = check_with("x = read_file(\"a\")\n", &config);
        assert_eq!(codes(&result), vec!["HND-CAP-0201"]);
        assert!(result.diagnostics[0].is_fatal());
    }
}
