pub mod expression;
pub mod function;
pub mod statement;
pub mod types;

#[cfg(test)]
pub mod test;

use crate::ast::{Ast, Item};
use crate::diagnostic::Diagnostic;
use crate::lexer::{Marker, Token, TokenKind};
use crate::span::Origin;

use tracing::debug;

/// Why a production gave up. `Resync` skips to the next statement boundary,
/// `Abort` ends the parse (the block structure can no longer be trusted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Resync,
    Abort,
}

pub type PResult<T> = Result<T, Recovery>;

#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub ast: Ast,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses a token stream produced by [`crate::lexer::lex`]. Always returns
/// an AST; when diagnostics are present it only holds what parsed cleanly.
pub fn parse(tokens: &[Token]) -> ParseResult {
    let mut parser = Parser::new(tokens);
    parser.parse_program();
    debug!(
        items = parser.ast.items.len(),
        diagnostics = parser.diagnostics.len(),
        "parsed"
    );
    ParseResult {
        ast: parser.ast,
        diagnostics: parser.diagnostics,
    }
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    last: Origin,
    pub(crate) ast: Ast,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            pos: 0,
            last: tokens.first().map_or(Origin::default(), |t| t.origin),
            ast: Ast::new(),
            diagnostics: vec![],
        }
    }

    pub fn parse_program(&mut self) {
        loop {
            let result = match &self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Newline | TokenKind::Dedent => {
                    self.advance();
                    continue;
                }
                TokenKind::Indent => {
                    let origin = self.peek().origin;
                    self.error(origin, "unexpected indentation at top level");
                    self.skip_block();
                    continue;
                }
                TokenKind::Marker(Marker::Capabilities) => {
                    self.parse_capability_decl().map(Item::Capabilities)
                }
                TokenKind::Marker(Marker::Function) => self.parse_function().map(Item::Function),
                _ => self.parse_statement().map(|id| Item::Stmt { id }),
            };
            match result {
                Ok(item) => self.ast.items.push(item),
                Err(Recovery::Resync) => self.synchronize(),
                Err(Recovery::Abort) => break,
            }
        }
    }

    pub(crate) fn peek(&self) -> &'a Token {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .unwrap_or(&EMPTY_EOF)
    }

    pub(crate) fn peek_kind(&self) -> &'a TokenKind {
        &self.peek().kind
    }

    pub(crate) fn peek_nth(&self, n: usize) -> &'a TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(&EMPTY_EOF.kind, |t| &t.kind)
    }

    pub(crate) fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        if !token.kind.is_layout() {
            self.last = token.origin;
        }
        token
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<&'a Token> {
        if self.at(kind) {
            return Ok(self.advance());
        }
        let found = self.peek();
        self.error(found.origin, format!("expected {what}, found {found}"));
        Err(Recovery::Resync)
    }

    pub(crate) fn expect_ident(&mut self, what: &str) -> PResult<&'a Token> {
        self.expect(&TokenKind::Ident, what)
    }

    /// Origin running from `start` to the last consumed token.
    pub(crate) fn span_from(&self, start: Origin) -> Origin {
        start.to(self.last)
    }

    pub(crate) fn error(&mut self, origin: Origin, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error("HND-PARSE-0001", origin, message));
    }

    pub(crate) fn end_of_statement(&mut self) -> PResult<()> {
        match self.peek_kind() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof | TokenKind::Dedent => Ok(()),
            _ => {
                let found = self.peek();
                self.error(
                    found.origin,
                    format!("expected end of line after statement, found {found}"),
                );
                Err(Recovery::Resync)
            }
        }
    }

    /// Skips to the start of the next statement at the current depth. If the
    /// broken line opened a block, the whole block goes with it.
    pub(crate) fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::Dedent => return,
                TokenKind::Newline => {
                    self.advance();
                    break;
                }
                TokenKind::Indent => {
                    self.skip_block();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
        if self.at(&TokenKind::Indent) {
            self.skip_block();
        }
    }

    /// Consumes an INDENT and everything up to its matching DEDENT.
    pub(crate) fn skip_block(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }
}

// Stands in when the caller hands over an empty slice.
static EMPTY_EOF: Token = Token {
    kind: TokenKind::Eof,
    lexeme: String::new(),
    origin: Origin {
        file: crate::span::FileId(0),
        start: 0,
        end: 0,
        line: 0,
        col: 0,
    },
};
