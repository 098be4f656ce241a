use crate::span::Origin;

use serde::{Deserialize, Serialize};

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyword {
    If,
    Else,
    While,
    Return,
    Show,
    Ask,
    And,
    Or,
    Not,
    True,
    False,
    Null,
}

impl Keyword {
    pub const ALL: [Keyword; 12] = [
        Keyword::If,
        Keyword::Else,
        Keyword::While,
        Keyword::Return,
        Keyword::Show,
        Keyword::Ask,
        Keyword::And,
        Keyword::Or,
        Keyword::Not,
        Keyword::True,
        Keyword::False,
        Keyword::Null,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::Return => "return",
            Keyword::Show => "show",
            Keyword::Ask => "ask",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
        }
    }
}

/// Type names are reserved words of their own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKeyword {
    Int,
    Float,
    Bool,
    Text,
    Null,
    List,
    Map,
    Record,
    Result,
    Optional,
}

impl TypeKeyword {
    pub const ALL: [TypeKeyword; 10] = [
        TypeKeyword::Int,
        TypeKeyword::Float,
        TypeKeyword::Bool,
        TypeKeyword::Text,
        TypeKeyword::Null,
        TypeKeyword::List,
        TypeKeyword::Map,
        TypeKeyword::Record,
        TypeKeyword::Result,
        TypeKeyword::Optional,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TypeKeyword::Int => "Int",
            TypeKeyword::Float => "Float",
            TypeKeyword::Bool => "Bool",
            TypeKeyword::Text => "Text",
            TypeKeyword::Null => "Null",
            TypeKeyword::List => "List",
            TypeKeyword::Map => "Map",
            TypeKeyword::Record => "Record",
            TypeKeyword::Result => "Result",
            TypeKeyword::Optional => "Optional",
        }
    }
}

/// Reserved single-glyph markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Function,
    Capabilities,
    Verify,
}

impl Marker {
    pub fn glyph(self) -> &'static str {
        match self {
            Marker::Function => "🔧",
            Marker::Capabilities => "🛡",
            Marker::Verify => "🔍",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TokenKind {
    Ident,
    Int(i64),
    Float(f64),
    Text(String),
    Keyword(Keyword),
    Type(TypeKeyword),
    Marker(Marker),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Assign,
    Colon,
    Comma,
    Dot,
    Arrow,
    Question,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    pub fn is_layout(&self) -> bool {
        matches!(
            self,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub origin: Origin,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, origin: Origin) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            origin,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Ident => write!(f, "identifier '{}'", self.lexeme),
            TokenKind::Int(_) | TokenKind::Float(_) => write!(f, "number '{}'", self.lexeme),
            TokenKind::Text(_) => write!(f, "text literal {}", self.lexeme),
            TokenKind::Keyword(k) => write!(f, "keyword '{}'", k.as_str()),
            TokenKind::Type(t) => write!(f, "type '{}'", t.as_str()),
            TokenKind::Marker(m) => write!(f, "marker '{}'", m.glyph()),
            TokenKind::Newline => f.write_str("end of line"),
            TokenKind::Indent => f.write_str("indentation"),
            TokenKind::Dedent => f.write_str("end of block"),
            TokenKind::Eof => f.write_str("end of file"),
            _ => write!(f, "'{}'", self.lexeme),
        }
    }
}
