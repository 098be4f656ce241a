use super::*;
use crate::capabilities::{self, AnnotatedAst};
use crate::config::Config;
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
    capabilities::check(checked.typed, &config)
        .annotated
        .unwrap()
}

fn lower_str(source: &str) -> Module {
    let result = lower(&annotate(source), "main");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    result.module.unwrap()
}

fn node(op: Op) -> Node {
    Node {
        op,
        origin: Origin::default(),
    }
}

fn int(dest: u32, value: i64) -> Node {
    node(Op::Const {
        dest: Reg(dest),
        ty: Type::Int,
        value: Literal::Int(value),
    })
}

fn module(main: Vec<Node>) -> Module {
    Module {
        version: IR_VERSION.to_string(),
        name: "main".to_string(),
        capabilities: CapabilitySet::from([Capability::Io]),
        functions: vec![],
        main,
    }
}

fn messages(module: &Module) -> Vec<String> {
    match IRValidator::validate_module(module) {
        Ok(()) => vec![],
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    }
}

#[test]
fn test_lowers_assignment_and_show() {
    let module = lower_str("🛡 io\nx: Int = 1 + 2\nshow x\n");
    assert_eq!(module.version, IR_VERSION);
    let ops: Vec<_> = module.main.iter().map(|n| n.op.opcode()).collect();
    assert_eq!(ops, vec!["const", "const", "binary", "store", "load", "show"]);
    assert!(matches!(
        &module.main[2].op,
        Op::Binary { dest: Reg(2), lhs: Reg(0), rhs: Reg(1), .. }
    ));
    assert!(matches!(
        &module.main[3].op,
        Op::Store { var, declare: true, value: Reg(2) } if var.scope == Scope::Global
    ));
}

#[test]
fn test_lowers_functions_with_signatures() {
    let module = lower_str("🛡 net\n🔧 fetch_twice(u: Text) -> Text 🛡 net:\n    a = fetch(u)\n    return a + fetch(u)\nx = fetch_twice(\"u\")\n");
    let function = module.function("fetch_twice").unwrap();
    assert_eq!(function.ret, Type::Text);
    assert_eq!(function.params[0].ty, Type::Text);
    assert_eq!(function.capabilities, CapabilitySet::from([Capability::Net]));
    // registers restart per function
    assert!(matches!(&function.body[0].op, Op::Load { dest: Reg(0), .. }));
    assert!(function.body.iter().any(|n| matches!(
        &n.op,
        Op::Builtin { builtin: Builtin::Fetch, capability: Some(Capability::Net), .. }
    )));
    assert!(matches!(&module.main[1].op, Op::Call { function, .. } if function == "fetch_twice"));
}

#[test]
fn test_control_flow_nests_regions() {
    let module = lower_str("🛡 io\ni = 0\nwhile i < 3 and true:\n    if i == 1:\n        show i\n    else:\n        show 0\n    i = i + 1\n");
    let Some(Op::Loop { cond_body, body, .. }) = module.main.iter().map(|n| &n.op).find(|op| op.opcode() == "loop") else {
        panic!("no loop in {module}");
    };
    assert!(cond_body.iter().any(|n| matches!(n.op, Op::Logic { .. })));
    let Some(Op::If { then_body, else_body, .. }) = body.iter().map(|n| &n.op).find(|op| op.opcode() == "if") else {
        panic!("no if in loop body");
    };
    assert_eq!(then_body.len(), 2);
    assert_eq!(else_body.len(), 2);
}

#[test]
fn test_lowered_module_survives_json() {
    let module = lower_str("🛡 io\nm = {\"a\": [1.5]}\nr = {name: \"x\"}\nshow m[\"a\"][0]\nshow r.name\nask n: Int \"n?\"\n");
    let json = module.to_json().unwrap();
    assert!(json.contains("\"opcode\": \"ask\""));
    assert_eq!(Module::from_json(&json).unwrap(), module);
}

#[test]
fn test_listing() {
    let module = lower_str("🛡 io\n🔧 inc(n: Int) -> Int:\n    return n + 1\nshow inc(1)\n");
    let listing = module.to_string();
    assert!(listing.starts_with("module main version 0.1.0 [io]\n"));
    assert!(listing.contains("fn inc(n: Int) -> Int [] {"));
    assert!(listing.contains("%1 = const 1 : Int"));
    assert!(listing.contains("%2 = %0 + %1 : Int"));
    assert!(listing.contains("return %2"));
    assert!(listing.contains("%1 = call inc(%0) : Int"));
    assert!(listing.contains("show %1"));
}

#[test]
fn test_validator_accepts_minimal_module() {
    let module = module(vec![int(0, 1), node(Op::Show { value: Reg(0) })]);
    assert_eq!(messages(&module), Vec::<String>::new());
}

#[test]
fn test_validator_rejects_bad_version() {
    let mut bad = module(vec![]);
    bad.version = "9.9.9".to_string();
    let errors = IRValidator::validate_module(&bad).unwrap_err();
    assert_eq!(errors[0].code(), "HND-IR-0002");
    assert_eq!(errors[0].to_diagnostic(Origin::default()).severity, crate::diagnostic::Severity::Fatal);
}

#[test]
fn test_validator_rejects_use_before_def_and_redefinition() {
    let module = module(vec![
        node(Op::Show { value: Reg(3) }),
        int(0, 1),
        int(0, 2),
    ]);
    let messages = messages(&module);
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("%3 before it is defined"));
    assert!(messages[1].contains("%0 is defined more than once"));
}

#[test]
fn test_validator_scopes_nested_regions() {
    // %1 lives in the then-region and is not visible afterwards
    let module = module(vec![
        node(Op::Const {
            dest: Reg(0),
            ty: Type::Bool,
            value: Literal::Bool(true),
        }),
        node(Op::If {
            cond: Reg(0),
            then_body: vec![int(1, 1)],
            else_body: vec![],
        }),
        node(Op::Show { value: Reg(1) }),
    ]);
    assert_eq!(messages(&module).len(), 1);
}

#[test]
fn test_validator_checks_types_and_placement() {
    let module = module(vec![
        int(0, 1),
        node(Op::Verify { cond: Reg(0) }),
        node(Op::Binary {
            dest: Reg(1),
            ty: Type::Bool,
            op: BinOp::Add,
            lhs: Reg(0),
            rhs: Reg(0),
        }),
        node(Op::Return { value: None }),
    ]);
    let messages = messages(&module);
    assert_eq!(messages.len(), 3, "{messages:?}");
    assert!(messages[0].contains("not Bool"));
    assert!(messages[1].contains("Int + Int does not give Bool"));
    assert!(messages[2].contains("return outside a function"));
}

#[test]
fn test_validator_checks_calls_and_capabilities() {
    let mut module = module(vec![
        int(0, 1),
        node(Op::Call {
            dest: Reg(1),
            ty: Type::Null,
            function: "save".to_string(),
            args: vec![],
        }),
        node(Op::Builtin {
            dest: Reg(2),
            ty: Type::Text,
            builtin: Builtin::ReadFile,
            args: vec![Reg(0)],
            capability: Some(Capability::Fs),
        }),
    ]);
    module.functions.push(Function {
        name: "save".to_string(),
        params: vec![Param {
            name: "path".to_string(),
            ty: Type::Text,
        }],
        ret: Type::Null,
        capabilities: CapabilitySet::from([Capability::Fs]),
        body: vec![],
        origin: Origin::default(),
    });
    let messages = messages(&module);
    assert_eq!(messages.len(), 2, "{messages:?}");
    assert!(messages[0].contains("'save' takes 1 argument(s), given 0"));
    assert!(messages[1].contains("needs 'fs'"));
}

#[test]
fn test_lower_reports_schema_failures_as_fatal() {
    let mut program = annotate("🛡 io\nshow 1\n");
    // a capability table that no longer matches the body
    program.capabilities.module.declared.clear();
    let result = lower(&program, "main");
    assert!(result.module.is_none());
    assert_eq!(result.diagnostics[0].code, "HND-IR-0001");
    assert!(result.diagnostics[0].is_fatal());
}
