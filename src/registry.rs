//! Process-wide lookup tables. Built once on first use and only ever read
//! afterwards, so parallel workers share them by reference.

use crate::capabilities::Capability;
use crate::lexer::token::{Keyword, TypeKeyword};

use std::collections::HashMap;
use std::sync::LazyLock;

pub static KEYWORDS: LazyLock<HashMap<&'static str, Keyword>> =
    LazyLock::new(|| Keyword::ALL.iter().map(|k| (k.as_str(), *k)).collect());

pub static TYPE_KEYWORDS: LazyLock<HashMap<&'static str, TypeKeyword>> =
    LazyLock::new(|| TypeKeyword::ALL.iter().map(|t| (t.as_str(), *t)).collect());

/// Words that look like they mean a reserved word. Each maps to the one
/// spelling the language accepts.
pub static SYNONYMS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("print", "show"),
        ("echo", "show"),
        ("puts", "show"),
        ("input", "ask"),
        ("read", "ask"),
        ("def", "🔧"),
        ("fn", "🔧"),
        ("func", "🔧"),
        ("function", "🔧"),
        ("elif", "else"),
        ("elseif", "else"),
        ("for", "while"),
        ("loop", "while"),
        ("until", "while"),
        ("let", "plain assignment"),
        ("var", "plain assignment"),
        ("const", "plain assignment"),
        ("True", "true"),
        ("False", "false"),
        ("None", "null"),
        ("nil", "null"),
        ("AND", "and"),
        ("OR", "or"),
        ("NOT", "not"),
        ("String", "Text"),
        ("Str", "Text"),
        ("Integer", "Int"),
        ("Boolean", "Bool"),
        ("Double", "Float"),
        ("assert", "🔍"),
        ("verify", "🔍"),
    ])
});

pub static CAPABILITIES: LazyLock<HashMap<&'static str, Capability>> =
    LazyLock::new(|| Capability::ALL.iter().map(|c| (c.name(), *c)).collect());

/// Rejected spellings of capability names.
pub static CAPABILITY_SYNONYMS: LazyLock<HashMap<&'static str, Capability>> =
    LazyLock::new(|| {
        HashMap::from([
            ("console", Capability::Io),
            ("stdio", Capability::Io),
            ("output", Capability::Io),
            ("network", Capability::Net),
            ("http", Capability::Net),
            ("internet", Capability::Net),
            ("file", Capability::Fs),
            ("files", Capability::Fs),
            ("filesystem", Capability::Fs),
            ("disk", Capability::Fs),
        ])
    });

pub fn keyword(word: &str) -> Option<Keyword> {
    KEYWORDS.get(word).copied()
}

pub fn type_keyword(word: &str) -> Option<TypeKeyword> {
    TYPE_KEYWORDS.get(word).copied()
}

pub fn synonym(word: &str) -> Option<&'static str> {
    SYNONYMS.get(word).copied()
}

pub fn capability(name: &str) -> Option<Capability> {
    CAPABILITIES.get(name).copied()
}

pub fn capability_synonym(name: &str) -> Option<Capability> {
    CAPABILITY_SYNONYMS.get(name).copied()
}
