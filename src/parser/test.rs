use super::*;
use crate::ast::format::format;
use crate::ast::{BinOp, ExprKind, StmtKind, TypeExpr, UnOp};
use crate::diagnostic::Severity;
use crate::lexer::lex;
use crate::span::FileId;

// Helper that lexes and parses, failing the test on lexer errors
fn parse_str(input: &str) -> ParseResult {
    let lexed = lex(FileId(0), input.as_bytes());
    assert!(
        lexed.diagnostics.is_empty(),
        "lexer errors: {:?}",
        lexed.diagnostics
    );
    parse(&lexed.tokens)
}

fn parse_ok(input: &str) -> Ast {
    let result = parse_str(input);
    assert!(
        result.diagnostics.is_empty(),
        "parse errors: {:?}",
        result.diagnostics
    );
    result.ast
}

fn codes(input: &str) -> Vec<String> {
    parse_str(input)
        .diagnostics
        .into_iter()
        .map(|d| d.code)
        .collect()
}

fn first_stmt(ast: &Ast) -> &StmtKind {
    &ast.stmt(ast.top_level()[0]).kind
}

fn show_value(ast: &Ast) -> &ExprKind {
    match first_stmt(ast) {
        StmtKind::Show { value } => &ast.expr(*value).kind,
        other => panic!("expected show, got {other:?}"),
    }
}

#[test]
fn test_parse_declaration() {
    let ast = parse_ok("x: Int = 1\nshow x\n");
    assert_eq!(ast.items.len(), 2);
    match first_stmt(&ast) {
        StmtKind::Assign {
            name,
            declared,
            value,
        } => {
            assert_eq!(name, "x");
            assert_eq!(declared, &Some(TypeExpr::Int));
            assert_eq!(ast.expr(*value).kind, ExprKind::Int { value: 1 });
        }
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn test_multiplication_binds_tighter() {
    let ast = parse_ok("show 1 + 2 * 3\n");
    let ExprKind::Binary { op, rhs, .. } = show_value(&ast) else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinOp::Add);
    assert!(matches!(
        ast.expr(*rhs).kind,
        ExprKind::Binary { op: BinOp::Mul, .. }
    ));
}

#[test]
fn test_subtraction_is_left_associative() {
    let ast = parse_ok("show 10 - 4 - 3\n");
    let ExprKind::Binary { op, lhs, rhs } = show_value(&ast) else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinOp::Sub);
    assert!(matches!(
        ast.expr(*lhs).kind,
        ExprKind::Binary { op: BinOp::Sub, .. }
    ));
    assert_eq!(ast.expr(*rhs).kind, ExprKind::Int { value: 3 });
}

#[test]
fn test_not_binds_looser_than_equality() {
    let ast = parse_ok("show not a == b and c\n");
    let ExprKind::Binary { op, lhs, .. } = show_value(&ast) else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinOp::And);
    let ExprKind::Unary { op, operand } = &ast.expr(*lhs).kind else {
        panic!("expected not");
    };
    assert_eq!(*op, UnOp::Not);
    assert!(matches!(
        ast.expr(*operand).kind,
        ExprKind::Binary { op: BinOp::Eq, .. }
    ));
}

#[test]
fn test_negation_and_postfix() {
    let ast = parse_ok("show -xs[0].name\n");
    let ExprKind::Unary { op, operand } = show_value(&ast) else {
        panic!("expected unary");
    };
    assert_eq!(*op, UnOp::Neg);
    let ExprKind::Field { base, field } = &ast.expr(*operand).kind else {
        panic!("expected field access");
    };
    assert_eq!(field, "name");
    assert!(matches!(ast.expr(*base).kind, ExprKind::Index { .. }));
}

#[test]
fn test_record_map_and_empty_braces() {
    let ast = parse_ok("a = {name: \"x\", age: 3}\nb = {\"k\": 1}\nc = {(k): 1}\nd = {}\n");
    let values: Vec<_> = ast
        .top_level()
        .into_iter()
        .map(|id| match &ast.stmt(id).kind {
            StmtKind::Assign { value, .. } => ast.expr(*value).kind.clone(),
            other => panic!("expected assignment, got {other:?}"),
        })
        .collect();
    assert!(matches!(&values[0], ExprKind::Record { fields } if fields.len() == 2));
    assert!(matches!(&values[1], ExprKind::Map { entries } if entries.len() == 1));
    assert!(matches!(&values[2], ExprKind::Map { entries } if entries.len() == 1));
    assert!(matches!(&values[3], ExprKind::Map { entries } if entries.is_empty()));
}

#[test]
fn test_parse_types() {
    let ast = parse_ok(
        "a: List[Map[Text, Int?]] = []\nb: Result[Int, Text] = ok(1)\nc: Record{x: Int, y: Float} = {x: 1, y: 2.0}\nd: Optional[Bool] = null\n",
    );
    let types: Vec<_> = ast
        .top_level()
        .into_iter()
        .map(|id| match &ast.stmt(id).kind {
            StmtKind::Assign { declared, .. } => declared.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(
        types[0],
        Some(TypeExpr::List(Box::new(TypeExpr::Map(
            Box::new(TypeExpr::Text),
            Box::new(TypeExpr::Optional(Box::new(TypeExpr::Int)))
        ))))
    );
    assert_eq!(
        types[1],
        Some(TypeExpr::Result(
            Box::new(TypeExpr::Int),
            Box::new(TypeExpr::Text)
        ))
    );
    assert_eq!(
        types[2],
        Some(TypeExpr::Record(vec![
            ("x".to_string(), TypeExpr::Int),
            ("y".to_string(), TypeExpr::Float)
        ]))
    );
    assert_eq!(
        types[3],
        Some(TypeExpr::Optional(Box::new(TypeExpr::Bool)))
    );
}

#[test]
fn test_parse_function() {
    let ast = parse_ok("🔧 add(a: Int, b: Int) -> Int:\n    return a + b\nx = add(2, 3)\nshow x\n");
    let functions: Vec<_> = ast.functions().collect();
    assert_eq!(functions.len(), 1);
    let add = functions[0];
    assert_eq!(add.name, "add");
    assert_eq!(add.params.len(), 2);
    assert_eq!(add.ret, Some(TypeExpr::Int));
    assert!(add.capabilities.is_empty());
    assert_eq!(add.body.len(), 1);
    assert_eq!(ast.top_level().len(), 2);
}

#[test]
fn test_function_capabilities() {
    let ast = parse_ok("🛡 io\n🔧 load(url: Text) -> Text 🛡 net, io:\n    return fetch(url)\n");
    assert_eq!(ast.capability_decls().count(), 1);
    let load = ast.functions().next().unwrap();
    let names: Vec<_> = load.capabilities.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["net", "io"]);
}

#[test]
fn test_if_else_and_while() {
    let ast = parse_ok("i = 0\nwhile i < 3:\n    if i == 1:\n        show i\n    else:\n        show 0\n    i = i + 1\n");
    let StmtKind::While { body, .. } = &ast.stmt(ast.top_level()[1]).kind else {
        panic!("expected while");
    };
    assert_eq!(body.len(), 2);
    let StmtKind::If { else_body, .. } = &ast.stmt(body[0]).kind else {
        panic!("expected if");
    };
    assert_eq!(else_body.as_ref().map(Vec::len), Some(1));
}

#[test]
fn test_ask_and_verify() {
    let ast = parse_ok("ask n: Int \"how many?\"\n🔍 n > 0\n");
    match first_stmt(&ast) {
        StmtKind::Ask { name, ty, prompt } => {
            assert_eq!(name, "n");
            assert_eq!(ty, &Some(TypeExpr::Int));
            assert!(prompt.is_some());
        }
        other => panic!("expected ask, got {other:?}"),
    }
    assert!(matches!(
        ast.stmt(ast.top_level()[1]).kind,
        StmtKind::Verify { .. }
    ));
}

#[test]
fn test_recovers_and_reports_later_errors() {
    let result = parse_str("x = (1 +\nshow 1\ny = ]\nshow 2\n");
    assert_eq!(result.diagnostics.len(), 2);
    assert!(result.diagnostics.iter().all(|d| d.code == "HND-PARSE-0001"));
    // both show statements survive
    assert_eq!(result.ast.top_level().len(), 2);
}

#[test]
fn test_recovery_skips_broken_block() {
    let result = parse_str("if 1 +:\n    show 1\nshow 2\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.ast.top_level().len(), 1);
}

#[test]
fn test_unterminated_block_is_fatal() {
    let result = parse_str("if x:\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, "HND-PARSE-0002");
    assert_eq!(result.diagnostics[0].severity, Severity::Fatal);
}

#[test]
fn test_missing_block() {
    assert_eq!(codes("if x:\nshow 1\n"), vec!["HND-PARSE-0003"]);
}

#[test]
fn test_nested_function_rejected() {
    let result = parse_str("if true:\n    🔧 f():\n        return\n    show 1\n");
    let codes: Vec<_> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["HND-PARSE-0010"]);
    let StmtKind::If { then_body, .. } = first_stmt(&result.ast) else {
        panic!("expected if");
    };
    assert_eq!(then_body.len(), 1);
}

#[test]
fn test_else_without_if() {
    assert_eq!(codes("else:\n    show 1\nshow 2\n"), vec!["HND-PARSE-0001"]);
}

#[test]
fn test_untyped_parameter_rejected() {
    assert_eq!(codes("🔧 f(a):\n    return\n"), vec!["HND-PARSE-0001"]);
}

#[test]
fn test_origins_point_at_source() {
    let ast = parse_ok("x = 1\nshow x + 2\n");
    let StmtKind::Show { value } = &ast.stmt(ast.top_level()[1]).kind else {
        panic!("expected show");
    };
    let origin = ast.expr(*value).origin;
    assert_eq!(origin.line, 2);
    assert_eq!(origin.col, 6);
    assert_eq!(origin.range(), 11..16);
}

const ROUND_TRIP: &[&str] = &[
    "x: Int = 1\nshow x\n",
    "show (1 + 2) * 3\nshow 1 - (2 - 3)\nshow -(a + b)\nshow not (a or b) and c\n",
    "show a == (not b)\nshow (not a) == b\nshow --x\n",
    "m = {(k): 1, \"a\" + \"b\": 2}\nr = {name: \"x\\n\\\"q\\\"\", tags: [1.5, 1.0e300, 2.0e-7]}\n",
    "🛡 io, net\n🔧 f(a: Int, b: List[Int?]) -> Result[Int, Text] 🛡 net:\n    if a > 0:\n        return ok(a)\n    else:\n        return err(\"neg\")\n🔧 g():\n    return\nshow f(1, [])\n",
    "ask n: Int \"n?\"\nwhile n > 0:\n    🔍 n != null\n    n = n - 1\nxs[0].field\n",
];

#[test]
fn test_format_round_trip() {
    for source in ROUND_TRIP {
        let first = parse_ok(source);
        let formatted = format(&first);
        let second = parse_ok(&formatted);
        assert!(
            first.structurally_eq(&second),
            "round trip changed structure:\n{source}\n---\n{formatted}"
        );
        // formatting is a fixed point after one pass
        assert_eq!(format(&second), formatted);
    }
}

#[test]
fn test_format_minimal_parens() {
    let ast = parse_ok("show ((1 + 2)) * (3)\nshow (a - b) - c\n");
    assert_eq!(format(&ast), "show (1 + 2) * 3\nshow a - b - c\n");
}

#[test]
fn test_parse_is_deterministic() {
    let source = ROUND_TRIP[4];
    assert_eq!(parse_ok(source), parse_ok(source));
}
