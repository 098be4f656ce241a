use crate::ast::{StmtId, StmtKind};
use crate::diagnostic::Diagnostic;
use crate::lexer::{Keyword, Marker, TokenKind};
use crate::parser::{PResult, Parser, Recovery};

impl Parser<'_> {
    pub fn parse_statement(&mut self) -> PResult<StmtId> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Show) => self.parse_show(),
            TokenKind::Keyword(Keyword::Ask) => self.parse_ask(),
            TokenKind::Marker(Marker::Verify) => self.parse_verify(),
            TokenKind::Keyword(Keyword::Else) => {
                self.error(token.origin, "'else' without a matching 'if'");
                Err(Recovery::Resync)
            }
            TokenKind::Marker(marker @ (Marker::Function | Marker::Capabilities)) => {
                self.diagnostics.push(Diagnostic::error(
                    "HND-PARSE-0010",
                    token.origin,
                    format!("'{}' is only allowed at the top level", marker.glyph()),
                ));
                Err(Recovery::Resync)
            }
            TokenKind::Ident
                if matches!(self.peek_nth(1), TokenKind::Colon | TokenKind::Assign) =>
            {
                self.parse_assignment()
            }
            _ => {
                let start = token.origin;
                let expr = self.parse_expression()?;
                self.end_of_statement()?;
                let origin = self.span_from(start);
                Ok(self.ast.add_stmt(StmtKind::Expr { expr }, origin))
            }
        }
    }

    /// `NEWLINE INDENT stmt+ DEDENT`. Running out of input before the block
    /// closes is unrecoverable.
    pub fn parse_block(&mut self) -> PResult<Vec<StmtId>> {
        self.expect(&TokenKind::Newline, "end of line after ':'")?;
        match self.peek_kind() {
            TokenKind::Indent => {
                self.advance();
            }
            TokenKind::Eof => return Err(self.unterminated_block()),
            _ => {
                let origin = self.peek().origin;
                self.diagnostics.push(Diagnostic::error(
                    "HND-PARSE-0003",
                    origin,
                    "expected an indented block",
                ));
                return Ok(vec![]);
            }
        }

        let mut body = vec![];
        loop {
            match self.peek_kind() {
                TokenKind::Dedent => {
                    self.advance();
                    return Ok(body);
                }
                TokenKind::Eof => return Err(self.unterminated_block()),
                TokenKind::Newline => {
                    self.advance();
                }
                _ => match self.parse_statement() {
                    Ok(id) => body.push(id),
                    Err(Recovery::Resync) => self.synchronize(),
                    Err(Recovery::Abort) => return Err(Recovery::Abort),
                },
            }
        }
    }

    fn unterminated_block(&mut self) -> Recovery {
        let origin = self.peek().origin;
        self.diagnostics.push(Diagnostic::fatal(
            "HND-PARSE-0002",
            origin,
            "unterminated block: input ended inside an indented block",
        ));
        Recovery::Abort
    }

    fn parse_if(&mut self) -> PResult<StmtId> {
        let start = self.advance().origin;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::Colon, "':' after the if condition")?;
        let then_body = self.parse_block()?;

        let else_body = if self.eat(&TokenKind::Keyword(Keyword::Else)) {
            self.expect(&TokenKind::Colon, "':' after 'else'")?;
            Some(self.parse_block()?)
        } else {
            None
        };
        let origin = self.span_from(start);
        Ok(self.ast.add_stmt(
            StmtKind::If {
                cond,
                then_body,
                else_body,
            },
            origin,
        ))
    }

    fn parse_while(&mut self) -> PResult<StmtId> {
        let start = self.advance().origin;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::Colon, "':' after the while condition")?;
        let body = self.parse_block()?;
        let origin = self.span_from(start);
        Ok(self.ast.add_stmt(StmtKind::While { cond, body }, origin))
    }

    fn parse_return(&mut self) -> PResult<StmtId> {
        let start = self.advance().origin;
        let value = match self.peek_kind() {
            TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof => None,
            _ => Some(self.parse_expression()?),
        };
        self.end_of_statement()?;
        let origin = self.span_from(start);
        Ok(self.ast.add_stmt(StmtKind::Return { value }, origin))
    }

    fn parse_show(&mut self) -> PResult<StmtId> {
        let start = self.advance().origin;
        let value = self.parse_expression()?;
        self.end_of_statement()?;
        let origin = self.span_from(start);
        Ok(self.ast.add_stmt(StmtKind::Show { value }, origin))
    }

    fn parse_ask(&mut self) -> PResult<StmtId> {
        let start = self.advance().origin;
        let name = self.expect_ident("a variable name after 'ask'")?.lexeme.clone();
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let prompt = match self.peek_kind() {
            TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof => None,
            _ => Some(self.parse_expression()?),
        };
        self.end_of_statement()?;
        let origin = self.span_from(start);
        Ok(self.ast.add_stmt(StmtKind::Ask { name, ty, prompt }, origin))
    }

    fn parse_verify(&mut self) -> PResult<StmtId> {
        let start = self.advance().origin;
        let cond = self.parse_expression()?;
        self.end_of_statement()?;
        let origin = self.span_from(start);
        Ok(self.ast.add_stmt(StmtKind::Verify { cond }, origin))
    }

    fn parse_assignment(&mut self) -> PResult<StmtId> {
        let token = self.advance();
        let declared = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(&TokenKind::Assign, "'=' in assignment")?;
        let value = self.parse_expression()?;
        self.end_of_statement()?;
        let origin = self.span_from(token.origin);
        Ok(self.ast.add_stmt(
            StmtKind::Assign {
                name: token.lexeme.clone(),
                declared,
                value,
            },
            origin,
        ))
    }
}
