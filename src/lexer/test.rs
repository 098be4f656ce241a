use super::*;
use crate::diagnostic::Severity;

fn kinds(source: &str) -> Vec<TokenKind> {
    let result = lex(FileId(0), source.as_bytes());
    assert!(
        result.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );
    result.tokens.into_iter().map(|t| t.kind).collect()
}

fn codes(source: &str) -> Vec<String> {
    lex(FileId(0), source.as_bytes())
        .diagnostics
        .into_iter()
        .map(|d| d.code)
        .collect()
}

#[test]
fn test_declaration_and_show() {
    assert_eq!(
        kinds("x: Int = 1\nshow x\n"),
        vec![
            TokenKind::Ident,
            TokenKind::Colon,
            TokenKind::Type(TypeKeyword::Int),
            TokenKind::Assign,
            TokenKind::Int(1),
            TokenKind::Newline,
            TokenKind::Keyword(Keyword::Show),
            TokenKind::Ident,
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_crlf_matches_lf() {
    let lf = lex(FileId(0), b"if true:\n    show 1\n");
    let crlf = lex(FileId(0), b"if true:\r\n    show 1\r\n");
    let lf_kinds: Vec<_> = lf.tokens.iter().map(|t| t.kind.clone()).collect();
    let crlf_kinds: Vec<_> = crlf.tokens.iter().map(|t| t.kind.clone()).collect();
    assert_eq!(lf_kinds, crlf_kinds);

    // columns are unaffected, byte offsets point into the original bytes
    let show = &crlf.tokens[5];
    assert_eq!(show.kind, TokenKind::Keyword(Keyword::Show));
    assert_eq!((show.origin.line, show.origin.col), (2, 5));
    assert_eq!(show.origin.start, 14);
}

#[test]
fn test_indent_and_dedent() {
    let source = "while x:\n    if y:\n        show 1\nshow 2\n";
    let kinds = kinds(source);
    let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
    let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
    assert_eq!(indents, 2);
    assert_eq!(dedents, 2);
    assert_eq!(kinds.last(), Some(&TokenKind::Eof));
}

#[test]
fn test_blocks_closed_at_end_of_file() {
    let kinds = kinds("if x:\n    show 1");
    assert_eq!(
        &kinds[kinds.len() - 3..],
        &[TokenKind::Newline, TokenKind::Dedent, TokenKind::Eof]
    );
}

#[test]
fn test_three_space_indent_is_fatal() {
    let result = lex(FileId(0), b"if x:\n   show 1\nshow 2\n");
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, "HND-INDENT-0001");
    assert_eq!(result.diagnostics[0].severity, Severity::Fatal);
    // nothing from the failing line onwards
    assert!(result.tokens.iter().all(|t| t.origin.line < 2 || t.kind == TokenKind::Eof));
    assert_eq!(result.tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
}

#[test]
fn test_double_indent_is_fatal() {
    assert_eq!(codes("if x:\n        show 1\n"), vec!["HND-INDENT-0002"]);
}

#[test]
fn test_partial_dedent_is_fatal() {
    let source = "if x:\n    if y:\n        show 1\n  show 2\n";
    assert_eq!(codes(source), vec!["HND-INDENT-0001"]);
}

#[test]
fn test_tab_is_fatal() {
    assert_eq!(codes("x = 1\nif x:\n\tshow x\n"), vec!["HND-LEX-0002"]);
    assert_eq!(codes("x = \"a\tb\"\n"), vec!["HND-LEX-0002"]);
}

#[test]
fn test_markers_are_single_tokens() {
    let kinds = kinds("🔧 f() 🛡\u{FE0F} io:\n    🔍 true\n");
    assert_eq!(kinds[0], TokenKind::Marker(Marker::Function));
    assert!(kinds.contains(&TokenKind::Marker(Marker::Capabilities)));
    assert!(kinds.contains(&TokenKind::Marker(Marker::Verify)));
    let glyphs = kinds
        .iter()
        .filter(|k| matches!(k, TokenKind::Marker(_)))
        .count();
    assert_eq!(glyphs, 3);
}

#[test]
fn test_other_emoji_rejected() {
    assert_eq!(codes("show 1 🎉\n"), vec!["HND-LEX-0004"]);
}

#[test]
fn test_non_ascii_allowed_in_text() {
    let kinds = kinds("show \"héllo 🎉\"\n");
    assert_eq!(kinds[1], TokenKind::Text("héllo 🎉".to_string()));
}

#[test]
fn test_synonyms_are_diagnosed() {
    let result = lex(FileId(0), b"print(1)\nx = None\n");
    let codes: Vec<_> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["HND-LEX-0005", "HND-LEX-0005"]);
    assert!(result.diagnostics[0].message.contains("'show'"));
    assert!(result.diagnostics[1].message.contains("'null'"));
}

#[test]
fn test_literals() {
    let kinds = kinds("x = 42 + 2.5e3 - 0.5\n");
    assert_eq!(kinds[2], TokenKind::Int(42));
    assert_eq!(kinds[4], TokenKind::Float(2500.0));
    assert_eq!(kinds[6], TokenKind::Float(0.5));
}

#[test]
fn test_integer_overflow_literal() {
    assert_eq!(codes("x = 99999999999999999999\n"), vec!["HND-LEX-0006"]);
}

#[test]
fn test_string_escapes() {
    let kinds = kinds(r#"show "a\nb\t\"c\" \\ \q""#);
    assert_eq!(kinds[1], TokenKind::Text("a\nb\t\"c\" \\ \\q".to_string()));
}

#[test]
fn test_unterminated_string() {
    assert_eq!(codes("show \"abc\n"), vec!["HND-LEX-0007"]);
}

#[test]
fn test_unexpected_character_keeps_scanning() {
    assert_eq!(codes("x = 1 @ 2 $\n"), vec!["HND-LEX-0001", "HND-LEX-0001"]);
}

#[test]
fn test_comments_and_blank_lines() {
    let kinds = kinds("# header\n\nx = 1 # trailing\n\n    # indented comment\nshow x\n");
    assert_eq!(
        kinds,
        vec![
            TokenKind::Ident,
            TokenKind::Assign,
            TokenKind::Int(1),
            TokenKind::Newline,
            TokenKind::Keyword(Keyword::Show),
            TokenKind::Ident,
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_invalid_utf8() {
    let result = lex(FileId(0), b"x = 1\n\xff\n");
    assert_eq!(result.diagnostics[0].code, "HND-LEX-0003");
    assert_eq!(result.diagnostics[0].origin.line, 2);
}

#[test]
fn test_escape_roundtrip() {
    for text in ["plain", "quote \" here", "back\\slash", "line\nbreak", "\\q"] {
        assert_eq!(unescape(&escape(text)), text);
    }
}

#[test]
fn test_lexing_is_deterministic() {
    let source = "🔧 f(a: Int) -> Int:\n    return a * 2\nshow f(21)\n";
    let first = lex(FileId(3), source.as_bytes());
    let second = lex(FileId(3), source.as_bytes());
    assert_eq!(first.tokens, second.tokens);
}
