pub mod token;

#[cfg(test)]
pub mod test;

pub use token::{Keyword, Marker, Token, TokenKind, TypeKeyword};

use crate::diagnostic::Diagnostic;
use crate::registry;
use crate::span::{FileId, Origin};

use logos::Logos;
use tracing::{debug, trace};

pub const INDENT_UNIT: usize = 4;

/// Raw lexemes of a single line. Layout (indentation, line ends) is handled
/// by [`Lexer`], so whitespace here is only ever spaces.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r" +")]
#[logos(skip r"#[^\n]*")]
enum Raw {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,

    #[regex(r"[0-9]+")]
    Int,

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    Float,

    #[regex(r#""([^"\\]*(\\.[^"\\]*)*)""#)]
    Text,

    // Markers absorb a trailing variation selector so they stay one token.
    #[regex("🔧\u{FE0F}?")]
    FunctionMarker,

    #[regex("🛡\u{FE0F}?")]
    CapabilityMarker,

    #[regex("🔍\u{FE0F}?")]
    VerifyMarker,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<")]
    Less,

    #[token("<=")]
    LessEq,

    #[token(">")]
    Greater,

    #[token(">=")]
    GreaterEq,

    #[token("=")]
    Assign,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("->")]
    Arrow,

    #[token("?")]
    Question,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,
}

#[derive(Debug, Clone, Default)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lexes one compilation unit. Pure: identical bytes give an identical
/// result.
pub fn lex(file: FileId, bytes: &[u8]) -> LexResult {
    Lexer::new(file).run(bytes)
}

struct Lexer {
    file: FileId,
    indents: Vec<usize>,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

struct Line<'s> {
    text: &'s str,
    start: usize,
    number: usize,
}

impl Line<'_> {
    fn col(&self, byte: usize) -> usize {
        self.text[..byte].chars().count() + 1
    }
}

impl Lexer {
    fn new(file: FileId) -> Self {
        Lexer {
            file,
            indents: vec![0],
            tokens: vec![],
            diagnostics: vec![],
        }
    }

    fn origin(&self, line: &Line, from: usize, to: usize) -> Origin {
        Origin::new(
            self.file,
            line.start + from..line.start + to,
            line.number,
            line.col(from),
        )
    }

    fn run(mut self, bytes: &[u8]) -> LexResult {
        let source = match std::str::from_utf8(bytes) {
            Ok(source) => source,
            Err(e) => {
                let at = e.valid_up_to();
                let prefix = String::from_utf8_lossy(&bytes[..at]);
                let number = prefix.matches('\n').count() + 1;
                let col = prefix.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
                let origin = Origin::new(self.file, at..at + 1, number, col);
                self.diagnostics.push(Diagnostic::fatal(
                    "HND-LEX-0003",
                    origin,
                    format!("invalid UTF-8 byte sequence at byte {at}"),
                ));
                self.tokens.push(Token::new(TokenKind::Eof, "", origin));
                return self.finish();
            }
        };

        let mut start = 0;
        let mut completed = true;
        for (index, raw) in source.split('\n').enumerate() {
            let line = Line {
                text: raw.strip_suffix('\r').unwrap_or(raw),
                start,
                number: index + 1,
            };
            start += raw.len() + 1;

            if !self.lex_line(&line) {
                completed = false;
                break;
            }
        }

        let end = source.len();
        let number = source.matches('\n').count() + 1;
        let col = source.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        let eof = Origin::new(self.file, end..end, number, col);

        // After a layout failure nothing past the failing line is trusted,
        // so open blocks are left unclosed.
        if completed {
            while self.indents.len() > 1 {
                self.indents.pop();
                self.tokens.push(Token::new(TokenKind::Dedent, "", eof));
            }
        }
        self.tokens.push(Token::new(TokenKind::Eof, "", eof));
        self.finish()
    }

    fn finish(self) -> LexResult {
        debug!(
            tokens = self.tokens.len(),
            diagnostics = self.diagnostics.len(),
            "lexed"
        );
        LexResult {
            tokens: self.tokens,
            diagnostics: self.diagnostics,
        }
    }

    /// Returns false on a layout failure, which stops lexing.
    fn lex_line(&mut self, line: &Line) -> bool {
        if let Some(at) = line.text.find('\t') {
            let origin = self.origin(line, at, at + 1);
            self.diagnostics.push(
                Diagnostic::fatal("HND-LEX-0002", origin, "tab character in source")
                    .with_note("indent with 4 spaces; tabs are not allowed anywhere"),
            );
            return false;
        }

        let width = line.text.len() - line.text.trim_start_matches(' ').len();
        let content = &line.text[width..];
        if content.is_empty() || content.starts_with('#') {
            return true;
        }

        if !self.layout(line, width) {
            return false;
        }

        self.scan(line, width);

        let end = line.text.len();
        let origin = self.origin(line, end, end);
        self.tokens.push(Token::new(TokenKind::Newline, "\n", origin));
        true
    }

    fn layout(&mut self, line: &Line, width: usize) -> bool {
        let origin = self.origin(line, 0, width);
        let current = self.indents.last().copied().unwrap_or(0);

        if width % INDENT_UNIT != 0 {
            self.diagnostics.push(
                Diagnostic::fatal(
                    "HND-INDENT-0001",
                    origin,
                    format!("indentation of {width} spaces is not a multiple of {INDENT_UNIT}"),
                )
                .with_note("blocks are indented in units of exactly 4 spaces"),
            );
            return false;
        }

        if width > current {
            if width != current + INDENT_UNIT {
                self.diagnostics.push(Diagnostic::fatal(
                    "HND-INDENT-0002",
                    origin,
                    format!(
                        "indentation jumps from {current} to {width} spaces; a block must indent by exactly {INDENT_UNIT}"
                    ),
                ));
                return false;
            }
            self.indents.push(width);
            self.tokens.push(Token::new(TokenKind::Indent, "", origin));
            return true;
        }

        while self.indents.last().is_some_and(|&level| level > width) {
            self.indents.pop();
            self.tokens.push(Token::new(TokenKind::Dedent, "", origin));
        }
        if self.indents.last() != Some(&width) {
            self.diagnostics.push(Diagnostic::fatal(
                "HND-INDENT-0003",
                origin,
                format!("dedent to {width} spaces does not match any enclosing block"),
            ));
            return false;
        }
        true
    }

    fn scan(&mut self, line: &Line, width: usize) {
        let content = &line.text[width..];
        let mut skip_until = 0;

        for (raw, span) in Raw::lexer(content).spanned() {
            let (from, to) = (width + span.start, width + span.end);

            let raw = match raw {
                Ok(raw) => raw,
                Err(()) => {
                    // an error span may end inside a multi-byte character
                    if span.start < skip_until || !content.is_char_boundary(span.start) {
                        continue;
                    }
                    let Some(ch) = content[span.start..].chars().next() else {
                        continue;
                    };
                    skip_until = span.start + ch.len_utf8();
                    let origin = self.origin(line, from, from + ch.len_utf8());
                    if ch == '"' {
                        self.diagnostics.push(Diagnostic::fatal(
                            "HND-LEX-0007",
                            origin,
                            "unterminated text literal",
                        ));
                        return;
                    }
                    self.diagnostics.push(unexpected_char(ch, origin));
                    continue;
                }
            };
            let origin = self.origin(line, from, to);
            let lexeme = &line.text[from..to];

            let kind = match raw {
                Raw::Word => self.word(lexeme, origin),
                Raw::Int => match lexeme.parse::<i64>() {
                    Ok(value) => TokenKind::Int(value),
                    Err(_) => {
                        self.diagnostics.push(Diagnostic::fatal(
                            "HND-LEX-0006",
                            origin,
                            format!("integer literal {lexeme} does not fit in 64 bits"),
                        ));
                        TokenKind::Int(0)
                    }
                },
                Raw::Float => match lexeme.parse::<f64>() {
                    Ok(value) if value.is_finite() => TokenKind::Float(value),
                    _ => {
                        self.diagnostics.push(Diagnostic::fatal(
                            "HND-LEX-0006",
                            origin,
                            format!("float literal {lexeme} is out of range"),
                        ));
                        TokenKind::Float(0.0)
                    }
                },
                Raw::Text => TokenKind::Text(unescape(&lexeme[1..lexeme.len() - 1])),
                Raw::FunctionMarker => TokenKind::Marker(Marker::Function),
                Raw::CapabilityMarker => TokenKind::Marker(Marker::Capabilities),
                Raw::VerifyMarker => TokenKind::Marker(Marker::Verify),
                Raw::Plus => TokenKind::Plus,
                Raw::Minus => TokenKind::Minus,
                Raw::Star => TokenKind::Star,
                Raw::Slash => TokenKind::Slash,
                Raw::Percent => TokenKind::Percent,
                Raw::EqEq => TokenKind::EqEq,
                Raw::NotEq => TokenKind::NotEq,
                Raw::Less => TokenKind::Less,
                Raw::LessEq => TokenKind::LessEq,
                Raw::Greater => TokenKind::Greater,
                Raw::GreaterEq => TokenKind::GreaterEq,
                Raw::Assign => TokenKind::Assign,
                Raw::Colon => TokenKind::Colon,
                Raw::Comma => TokenKind::Comma,
                Raw::Dot => TokenKind::Dot,
                Raw::Arrow => TokenKind::Arrow,
                Raw::Question => TokenKind::Question,
                Raw::LParen => TokenKind::LParen,
                Raw::RParen => TokenKind::RParen,
                Raw::LBracket => TokenKind::LBracket,
                Raw::RBracket => TokenKind::RBracket,
                Raw::LBrace => TokenKind::LBrace,
                Raw::RBrace => TokenKind::RBrace,
            };
            trace!(?kind, %origin, "token");
            self.tokens.push(Token::new(kind, lexeme, origin));
        }
    }

    fn word(&mut self, word: &str, origin: Origin) -> TokenKind {
        if let Some(keyword) = registry::keyword(word) {
            return TokenKind::Keyword(keyword);
        }
        if let Some(ty) = registry::type_keyword(word) {
            return TokenKind::Type(ty);
        }
        if let Some(canonical) = registry::synonym(word) {
            self.diagnostics.push(
                Diagnostic::fatal(
                    "HND-LEX-0005",
                    origin,
                    format!("'{word}' is not part of the language; write '{canonical}' instead"),
                )
                .with_note("reserved words have exactly one spelling"),
            );
        }
        TokenKind::Ident
    }
}

fn unexpected_char(ch: char, origin: Origin) -> Diagnostic {
    if ch.is_ascii() {
        Diagnostic::fatal(
            "HND-LEX-0001",
            origin,
            format!("unexpected character {ch:?}"),
        )
    } else {
        Diagnostic::fatal(
            "HND-LEX-0004",
            origin,
            format!(
                "character '{ch}' (U+{:04X}) is only allowed inside text literals",
                ch as u32
            ),
        )
    }
}

/// Decodes the escapes of a text literal body. Unknown escapes are kept as
/// written.
pub fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Inverse of [`unescape`]; the result re-lexes to the same text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
