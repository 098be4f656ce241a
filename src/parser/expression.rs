use crate::ast::{BinOp, ExprId, ExprKind, PREC_NEG, PREC_NOT, PREC_OR, UnOp};
use crate::lexer::{Keyword, TokenKind};
use crate::parser::{PResult, Parser, Recovery};

fn binary_op(kind: &TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Percent => BinOp::Rem,
        TokenKind::EqEq => BinOp::Eq,
        TokenKind::NotEq => BinOp::NotEq,
        TokenKind::Less => BinOp::Less,
        TokenKind::LessEq => BinOp::LessEq,
        TokenKind::Greater => BinOp::Greater,
        TokenKind::GreaterEq => BinOp::GreaterEq,
        TokenKind::Keyword(Keyword::And) => BinOp::And,
        TokenKind::Keyword(Keyword::Or) => BinOp::Or,
        _ => return None,
    })
}

impl Parser<'_> {
    pub fn parse_expression(&mut self) -> PResult<ExprId> {
        self.parse_binary(PREC_OR)
    }

    /// Precedence climbing over [`BinOp::precedence`].
    fn parse_binary(&mut self, min: u8) -> PResult<ExprId> {
        let mut lhs = self.parse_prefix()?;
        while let Some(op) = binary_op(self.peek_kind()) {
            let precedence = op.precedence();
            if precedence < min {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(precedence + 1)?;
            let origin = self.ast.expr(lhs).origin.to(self.ast.expr(rhs).origin);
            lhs = self.ast.add_expr(ExprKind::Binary { op, lhs, rhs }, origin);
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> PResult<ExprId> {
        if self.at(&TokenKind::Keyword(Keyword::Not)) {
            let start = self.advance().origin;
            let operand = self.parse_binary(PREC_NOT)?;
            let origin = self.span_from(start);
            return Ok(self.ast.add_expr(
                ExprKind::Unary {
                    op: UnOp::Not,
                    operand,
                },
                origin,
            ));
        }
        self.parse_unary()
    }

    fn parse_unary(&mut self) -> PResult<ExprId> {
        if self.at(&TokenKind::Minus) {
            let start = self.advance().origin;
            let operand = self.parse_unary()?;
            let origin = self.span_from(start);
            return Ok(self.ast.add_expr(
                ExprKind::Unary {
                    op: UnOp::Neg,
                    operand,
                },
                origin,
            ));
        }
        debug_assert!(PREC_NEG > PREC_NOT);
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<ExprId> {
        let mut base = self.parse_primary()?;
        let start = self.ast.expr(base).origin;
        loop {
            match self.peek_kind() {
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket, "']' to close the index")?;
                    let origin = self.span_from(start);
                    base = self.ast.add_expr(ExprKind::Index { base, index }, origin);
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_ident("a field name after '.'")?.lexeme.clone();
                    let origin = self.span_from(start);
                    base = self.ast.add_expr(ExprKind::Field { base, field }, origin);
                }
                _ => return Ok(base),
            }
        }
    }

    fn parse_primary(&mut self) -> PResult<ExprId> {
        let token = self.peek();
        let origin = token.origin;
        let kind = match &token.kind {
            TokenKind::Int(value) => ExprKind::Int { value: *value },
            TokenKind::Float(value) => ExprKind::Float { value: *value },
            TokenKind::Text(value) => ExprKind::Text {
                value: value.clone(),
            },
            TokenKind::Keyword(Keyword::True) => ExprKind::Bool { value: true },
            TokenKind::Keyword(Keyword::False) => ExprKind::Bool { value: false },
            TokenKind::Keyword(Keyword::Null) => ExprKind::Null,
            TokenKind::Ident => {
                self.advance();
                if self.at(&TokenKind::LParen) {
                    return self.parse_call(token.lexeme.clone(), origin);
                }
                return Ok(self.ast.add_expr(
                    ExprKind::Var {
                        name: token.lexeme.clone(),
                    },
                    origin,
                ));
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "')' to close the parenthesis")?;
                return Ok(inner);
            }
            TokenKind::LBracket => return self.parse_list(),
            TokenKind::LBrace => return self.parse_braces(),
            _ => {
                self.error(origin, format!("expected an expression, found {token}"));
                return Err(Recovery::Resync);
            }
        };
        self.advance();
        Ok(self.ast.add_expr(kind, origin))
    }

    fn parse_call(&mut self, callee: String, start: crate::span::Origin) -> PResult<ExprId> {
        self.advance();
        let args = self.parse_comma_list(&TokenKind::RParen, "')' to close the argument list")?;
        let origin = self.span_from(start);
        Ok(self.ast.add_expr(ExprKind::Call { callee, args }, origin))
    }

    fn parse_list(&mut self) -> PResult<ExprId> {
        let start = self.advance().origin;
        let items = self.parse_comma_list(&TokenKind::RBracket, "']' to close the list")?;
        let origin = self.span_from(start);
        Ok(self.ast.add_expr(ExprKind::List { items }, origin))
    }

    fn parse_comma_list(&mut self, close: &TokenKind, what: &str) -> PResult<Vec<ExprId>> {
        let mut items = vec![];
        while !self.at(close) {
            items.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, what)?;
        Ok(items)
    }

    /// `{name: e, ...}` is a record, `{key: e, ...}` with any other key is a
    /// map, and `{}` is the empty map.
    fn parse_braces(&mut self) -> PResult<ExprId> {
        let start = self.advance().origin;
        let is_record = *self.peek_kind() == TokenKind::Ident && *self.peek_nth(1) == TokenKind::Colon;

        let kind = if is_record {
            let mut fields = vec![];
            while !self.at(&TokenKind::RBrace) {
                let name = self.expect_ident("a field name")?.lexeme.clone();
                self.expect(&TokenKind::Colon, "':' after the field name")?;
                fields.push((name, self.parse_expression()?));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            ExprKind::Record { fields }
        } else {
            let mut entries = vec![];
            while !self.at(&TokenKind::RBrace) {
                let key = self.parse_expression()?;
                self.expect(&TokenKind::Colon, "':' after the map key")?;
                entries.push((key, self.parse_expression()?));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            ExprKind::Map { entries }
        };
        self.expect(&TokenKind::RBrace, "'}' to close the literal")?;
        let origin = self.span_from(start);
        Ok(self.ast.add_expr(kind, origin))
    }
}
