use crate::ast::TypeExpr;
use crate::lexer::{TokenKind, TypeKeyword};
use crate::parser::{PResult, Parser, Recovery};

impl Parser<'_> {
    pub fn parse_type(&mut self) -> PResult<TypeExpr> {
        let token = self.peek();
        let TokenKind::Type(keyword) = token.kind else {
            self.error(token.origin, format!("expected a type, found {token}"));
            return Err(Recovery::Resync);
        };
        self.advance();

        let mut ty = match keyword {
            TypeKeyword::Int => TypeExpr::Int,
            TypeKeyword::Float => TypeExpr::Float,
            TypeKeyword::Bool => TypeExpr::Bool,
            TypeKeyword::Text => TypeExpr::Text,
            TypeKeyword::Null => TypeExpr::Null,
            TypeKeyword::List => {
                let [inner] = self.type_args::<1>("List")?;
                TypeExpr::List(Box::new(inner))
            }
            TypeKeyword::Optional => {
                let [inner] = self.type_args::<1>("Optional")?;
                TypeExpr::Optional(Box::new(inner))
            }
            TypeKeyword::Map => {
                let [key, value] = self.type_args::<2>("Map")?;
                TypeExpr::Map(Box::new(key), Box::new(value))
            }
            TypeKeyword::Result => {
                let [ok, err] = self.type_args::<2>("Result")?;
                TypeExpr::Result(Box::new(ok), Box::new(err))
            }
            TypeKeyword::Record => TypeExpr::Record(self.record_fields()?),
        };

        while self.eat(&TokenKind::Question) {
            ty = TypeExpr::Optional(Box::new(ty));
        }
        Ok(ty)
    }

    /// `[T]` or `[K, V]` after a generic type name.
    fn type_args<const N: usize>(&mut self, name: &str) -> PResult<[TypeExpr; N]> {
        self.expect(&TokenKind::LBracket, &format!("'[' after {name}"))?;
        let mut args = Vec::with_capacity(N);
        for i in 0..N {
            if i > 0 {
                self.expect(&TokenKind::Comma, &format!("',' between {name} arguments"))?;
            }
            args.push(self.parse_type()?);
        }
        self.expect(
            &TokenKind::RBracket,
            &format!("']' after {N} {name} argument(s)"),
        )?;
        args.try_into().map_err(|_| Recovery::Resync)
    }

    fn record_fields(&mut self) -> PResult<Vec<(String, TypeExpr)>> {
        self.expect(&TokenKind::LBrace, "'{' after Record")?;
        let mut fields = vec![];
        while !self.at(&TokenKind::RBrace) {
            let name = self.expect_ident("a field name")?.lexeme.clone();
            self.expect(&TokenKind::Colon, "':' after field name")?;
            fields.push((name, self.parse_type()?));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "'}' to close the record type")?;
        Ok(fields)
    }
}
