use super::*;
use crate::ast::StmtKind;
use crate::diagnostic::Severity;
use crate::lexer::lex;
use crate::parser::parse;
use crate::span::FileId;

fn check_str(source: &str) -> CheckResult {
    let lexed = lex(FileId(0), source.as_bytes());
    assert!(lexed.diagnostics.is_empty(), "{:?}", lexed.diagnostics);
    let parsed = parse(&lexed.tokens);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    check(parsed.ast)
}

fn codes(source: &str) -> Vec<String> {
    check_str(source)
        .diagnostics
        .into_iter()
        .map(|d| d.code)
        .collect()
}

fn assert_clean(source: &str) -> TypedAst {
    let result = check_str(source);
    assert!(
        result.diagnostics.is_empty(),
        "unexpected diagnostics: {:#?}",
        result.diagnostics
    );
    result.typed
}

#[test]
fn test_simple_declaration() {
    let typed = assert_clean("x: Int = 1\nshow x\n");
    assert_eq!(typed.globals.get("x"), Some(&Type::Int));
    let binding = typed.binding(typed.ast.top_level()[0]).unwrap();
    assert_eq!(binding.scope, Scope::Global);
    assert!(binding.declares);
}

#[test]
fn test_simple_addition() {
    let typed = assert_clean("x = 5 + 3\n");
    let StmtKind::Assign { value, .. } = &typed.ast.stmt(typed.ast.top_level()[0]).kind else {
        panic!("expected assignment");
    };
    assert_eq!(typed.type_of(*value), &Type::Int);
}

#[test]
fn test_no_implicit_coercion() {
    let result = check_str("x = 1 + 2.0\ny = \"a\" + 1\n");
    let codes: Vec<_> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["HND-TC-0202", "HND-TC-0202"]);
    // the error points at the mixing expression, not the statement
    assert_eq!(result.diagnostics[0].origin.col, 5);
    assert!(result.diagnostics[0].note.is_some());
}

#[test]
fn test_declared_type_mismatch() {
    assert_eq!(codes("x: Float = 1\n"), vec!["HND-TC-1101"]);
    assert_eq!(codes("x = 1\nx = \"one\"\n"), vec!["HND-TC-1101"]);
}

#[test]
fn test_errors_do_not_cascade() {
    // `y` still gets a type, so its uses are not reported again
    assert_eq!(
        codes("y = missing + 1\nz = y * 2\nshow z\n"),
        vec!["HND-TC-0101"]
    );
}

#[test]
fn test_independent_errors_all_reported() {
    assert_eq!(
        codes("a = 1 + true\nb = not 3\nc = 1 < \"x\"\n"),
        vec!["HND-TC-0202", "HND-TC-0201", "HND-TC-0203"]
    );
}

#[test]
fn test_function_call() {
    let typed = assert_clean("🔧 add(a: Int, b: Int) -> Int:\n    return a + b\nx = add(2, 3)\nshow x\n");
    assert_eq!(typed.globals.get("x"), Some(&Type::Int));
    assert_eq!(
        typed.functions.get("add").map(Signature::as_type),
        Some(Type::Function {
            params: vec![Type::Int, Type::Int],
            ret: Box::new(Type::Int)
        })
    );
}

#[test]
fn test_call_errors() {
    let source = "🔧 f(a: Int) -> Int:\n    return a\nx = f(1, 2)\ny = f(\"no\")\nz = g(1)\n";
    assert_eq!(
        codes(source),
        vec!["HND-TC-0302", "HND-TC-0303", "HND-TC-0301"]
    );
}

#[test]
fn test_functions_are_hoisted_and_recursive() {
    assert_clean(
        "show fact(5)\n🔧 fact(n: Int) -> Int:\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n",
    );
}

#[test]
fn test_missing_return_path() {
    let source = "🔧 f(n: Int) -> Int:\n    if n > 0:\n        return 1\n";
    assert_eq!(codes(source), vec!["HND-TC-1303"]);
    assert_clean("🔧 g(n: Int) -> Int:\n    if n > 0:\n        return 1\n    else:\n        return 2\n");
    assert_clean("🔧 h(n: Int):\n    show n\n");
}

#[test]
fn test_return_checks() {
    assert_eq!(codes("return 1\n"), vec!["HND-TC-1304"]);
    assert_eq!(
        codes("🔧 f() -> Int:\n    return \"x\"\n"),
        vec!["HND-TC-1301"]
    );
    assert_eq!(codes("🔧 f() -> Int:\n    return\n"), vec!["HND-TC-1302"]);
}

#[test]
fn test_function_reads_but_cannot_assign_globals() {
    assert_clean("limit = 3\n🔧 f(n: Int) -> Bool:\n    return n < limit\nshow f(1)\n");
    assert_eq!(
        codes("limit = 3\n🔧 f():\n    limit = 4\n"),
        vec!["HND-TC-1104"]
    );
}

#[test]
fn test_block_scopes() {
    assert_eq!(
        codes("if true:\n    inner = 1\nshow inner\n"),
        vec!["HND-TC-0101"]
    );
    let typed = assert_clean("x = 1\nif true:\n    x = 2\n");
    let StmtKind::If { then_body, .. } = &typed.ast.stmt(typed.ast.top_level()[1]).kind else {
        panic!("expected if");
    };
    let binding = typed.binding(then_body[0]).unwrap();
    assert_eq!(binding.scope, Scope::Global);
    assert!(!binding.declares);
    assert!(!typed.globals.contains_key("inner"));
}

#[test]
fn test_redeclaration_in_same_scope() {
    assert_eq!(codes("x: Int = 1\nx: Int = 2\n"), vec!["HND-TC-1102"]);
}

#[test]
fn test_conditions_must_be_bool() {
    assert_eq!(
        codes("if 1:\n    show 1\nwhile \"x\":\n    show 2\n🔍 3\n"),
        vec!["HND-TC-1401", "HND-TC-1501", "HND-TC-1601"]
    );
}

#[test]
fn test_containers() {
    let typed = assert_clean(
        "xs = [1, 2, 3]\nm = {\"a\": 1.5}\nr = {name: \"n\", age: 3}\nfirst = xs[0]\nv = m[\"a\"]\nn = r.name\nempty: List[Text] = []\n",
    );
    assert_eq!(typed.globals.get("first"), Some(&Type::Int));
    assert_eq!(typed.globals.get("v"), Some(&Type::Float));
    assert_eq!(typed.globals.get("n"), Some(&Type::Text));
    assert_eq!(typed.globals.get("empty"), Some(&Type::list(Type::Text)));
}

#[test]
fn test_container_errors() {
    assert_eq!(
        codes("xs = [1, \"two\"]\nm = {[1]: 2}\nr = {a: 1}\nshow r.b\nshow 5[0]\ne = []\n"),
        vec![
            "HND-TC-0212",
            "HND-TC-0210",
            "HND-TC-0220",
            "HND-TC-0223",
            "HND-TC-1103"
        ]
    );
}

#[test]
fn test_optionals_and_narrowing() {
    assert_clean("x: Int? = null\nx = 4\nif x != null:\n    show x + 1\n");
    assert_eq!(
        codes("x: Int? = null\nshow x + 1\n"),
        vec!["HND-TC-0202"]
    );
    assert_clean("x: Int? = 2\n🔍 x != null\ny: Int = x\n");
    assert_eq!(codes("x = null\n"), vec!["HND-TC-1103"]);
}

#[test]
fn test_narrowing_cleared_by_assignment() {
    let source = "x: Int? = 1\nif x != null:\n    x = null\n    show x + 1\n";
    assert_eq!(codes(source), vec!["HND-TC-0202"]);
}

#[test]
fn test_results_need_context() {
    assert_clean("r: Result[Int, Text] = ok(1)\nshow unwrap(r)\nshow is_ok(r)\n");
    assert_eq!(codes("r = ok(1)\n"), vec!["HND-TC-1103"]);
    assert_eq!(
        codes("r: Result[Int, Text] = err(5)\n"),
        vec!["HND-TC-0303"]
    );
}

#[test]
fn test_builtins() {
    let typed = assert_clean(
        "xs: List[Int] = []\nxs = push(xs, 4)\nn = len(xs)\ns = str(n) + \"!\"\nf = float(n) / 2.0\ni = int(f)\nks = keys({\"a\": 1})\n",
    );
    assert_eq!(typed.globals.get("s"), Some(&Type::Text));
    assert_eq!(typed.globals.get("i"), Some(&Type::Int));
    assert_eq!(typed.globals.get("ks"), Some(&Type::list(Type::Text)));
    assert_eq!(codes("n = len(3)\n"), vec!["HND-TC-0303"]);
    assert_eq!(codes("🔧 len(x: Int) -> Int:\n    return x\n"), vec!["HND-TC-0305"]);
}

#[test]
fn test_ask_types() {
    let typed = assert_clean("ask name \"who?\"\nask n: Int\n");
    assert_eq!(typed.globals.get("name"), Some(&Type::Text));
    assert_eq!(typed.globals.get("n"), Some(&Type::Int));
    assert_eq!(codes("ask xs: List[Int]\n"), vec!["HND-TC-1105"]);
}

#[test]
fn test_unused_expression_warns() {
    let result = check_str("x = 1\nx + 1\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, "HND-TC-0901");
    assert_eq!(result.diagnostics[0].severity, Severity::Warning);
}

#[test]
fn test_check_is_deterministic() {
    let source = "🔧 f(a: Int) -> Int:\n    return a * 2\nxs = [f(1), f(2)]\nshow xs\n";
    let first = check_str(source);
    let second = check_str(source);
    assert_eq!(first.typed.expr_types, second.typed.expr_types);
    assert_eq!(first.typed.bindings, second.typed.bindings);
}

#[test]
fn test_unwrap_of_optional_result_is_rejected() {
    assert_eq!(
        codes("r: Result[Int, Text]? = ok(1)\ny = unwrap(r)\n"),
        vec!["HND-TC-0303"]
    );
    assert_clean("r: Result[Int, Text]? = ok(1)\nif r != null:\n    y: Int = unwrap(r)\n");
}

#[test]
fn test_call_before_global_is_bound() {
    let source = "🔧 f() -> Int:\n    return g\nx = f()\ng = 1\n";
    let result = check_str(source);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, "HND-TC-1106");
    // reported at the call on line 3
    assert_eq!(result.diagnostics[0].origin.line, 3);

    assert_clean("🔧 f() -> Int:\n    return g\ng = 1\nx = f()\n");
    // reached through another function
    assert_eq!(
        codes("🔧 f() -> Int:\n    return h()\n🔧 h() -> Int:\n    return g\nx = f()\ng = 1\n"),
        vec!["HND-TC-1106"]
    );
    // recursion terminates
    assert_clean("🔧 f(n: Int) -> Int:\n    if n < 1:\n        return g\n    return f(n - 1)\ng = 1\nx = f(3)\n");
}

#[test]
fn test_map_key_types_are_checked_where_written() {
    assert_eq!(codes("m: Map[Float, Int] = {1.5: 2}\n"), vec!["HND-TC-0213"]);
    assert_eq!(
        codes("xs: List[Map[List[Int], Int]] = []\n"),
        vec!["HND-TC-0213"]
    );
    assert_eq!(
        codes("🔧 f(m: Map[Float, Int]) -> Int:\n    return 1\n"),
        vec!["HND-TC-0213"]
    );
    assert_eq!(
        codes("🔧 f() -> Record{seen: Map[Float, Bool]}:\n    return {seen: {}}\n"),
        vec!["HND-TC-0213"]
    );
    assert_clean("m: Map[Bool, List[Int]] = {true: [1]}\n");
}

#[test]
fn test_loop_assignment_clears_outer_narrowing() {
    let source = "x: Int? = 1\ni = 0\nif x != null:\n    while i < 2:\n        show x + 1\n        x = null\n        i = i + 1\n";
    assert_eq!(codes(source), vec!["HND-TC-0202"]);

    // assignments in nested blocks count too
    let nested = "x: Int? = 1\ni = 0\nif x != null:\n    while i < 2:\n        show x + 1\n        if i == 1:\n            x = null\n        i = i + 1\n";
    assert_eq!(codes(nested), vec!["HND-TC-0202"]);

    // the loop's own test still refines its body
    assert_clean("x: Int? = 1\nwhile x != null:\n    show x + 1\n    x = null\n");
    // loops that leave the variable alone keep the refinement
    assert_clean("x: Int? = 1\ni = 0\nif x != null:\n    while i < 2:\n        show x + i\n        i = i + 1\n");
}
