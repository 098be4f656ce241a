use crate::ast::{CapabilityDecl, CapabilityName, Function, Param};
use crate::lexer::{Marker, TokenKind};
use crate::parser::{PResult, Parser};

impl Parser<'_> {
    /// `🔧 name(a: T, ...) -> R 🛡 caps:` followed by an indented body.
    pub fn parse_function(&mut self) -> PResult<Function> {
        let start = self.advance().origin;
        let name = self.expect_ident("a function name after '🔧'")?.lexeme.clone();

        self.expect(&TokenKind::LParen, "'(' after the function name")?;
        let mut params = vec![];
        while !self.at(&TokenKind::RParen) {
            params.push(self.parse_param()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')' to close the parameter list")?;

        let ret = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let capabilities = if self.eat(&TokenKind::Marker(Marker::Capabilities)) {
            self.parse_capability_names()?
        } else {
            vec![]
        };

        self.expect(&TokenKind::Colon, "':' after the function header")?;
        let origin = self.span_from(start);
        let body = self.parse_block()?;

        Ok(Function {
            name,
            params,
            ret,
            capabilities,
            body,
            origin,
        })
    }

    fn parse_param(&mut self) -> PResult<Param> {
        let token = self.expect_ident("a parameter name")?;
        self.expect(&TokenKind::Colon, "':' and a type after the parameter name")?;
        let ty = self.parse_type()?;
        Ok(Param {
            name: token.lexeme.clone(),
            ty,
            origin: self.span_from(token.origin),
        })
    }

    /// A module-level `🛡 io, net` line.
    pub fn parse_capability_decl(&mut self) -> PResult<CapabilityDecl> {
        let start = self.advance().origin;
        let names = self.parse_capability_names()?;
        let origin = self.span_from(start);
        self.end_of_statement()?;
        Ok(CapabilityDecl { names, origin })
    }

    fn parse_capability_names(&mut self) -> PResult<Vec<CapabilityName>> {
        let mut names = vec![];
        loop {
            let token = self.expect_ident("a capability name")?;
            names.push(CapabilityName {
                name: token.lexeme.clone(),
                origin: token.origin,
            });
            if !self.eat(&TokenKind::Comma) {
                return Ok(names);
            }
        }
    }
}
