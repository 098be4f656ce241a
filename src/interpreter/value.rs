use crate::ast::format::format_float;
use crate::lexer::escape;
use crate::typechecker::Type;

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Values usable as map keys. Ordered so maps iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum MapKey {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl MapKey {
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Int(i) => Value::Int(*i),
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl Display for MapKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value().render_nested())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Null,
    List(Vec<Value>),
    #[serde(serialize_with = "entries")]
    Map(BTreeMap<MapKey, Value>),
    Record(BTreeMap<String, Value>),
    Ok(Box<Value>),
    Err(Box<Value>),
}

fn entries<S: Serializer>(map: &BTreeMap<MapKey, Value>, s: S) -> Result<S::Ok, S::Error> {
    let mut seq = s.serialize_seq(Some(map.len()))?;
    for entry in map {
        seq.serialize_element(&entry)?;
    }
    seq.end()
}

impl Value {
    pub fn as_key(&self) -> Option<MapKey> {
        match self {
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Text(s) => Some(MapKey::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Text(_) => "Text",
            Value::Null => "Null",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Record(_) => "Record",
            Value::Ok(_) | Value::Err(_) => "Result",
        }
    }

    /// Parses one line of `ask` input as a value of `ty`.
    pub fn parse_input(input: &str, ty: &Type) -> Option<Value> {
        let trimmed = input.trim();
        match ty {
            Type::Text => Some(Value::Text(input.to_string())),
            Type::Int => trimmed.parse().ok().map(Value::Int),
            Type::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
            Type::Bool => match trimmed {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Text of an output entry: top-level text is printed as is.
    pub fn render(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.render_nested(),
        }
    }

    /// Text inside a container is quoted so `["a"]` and `[a]` differ.
    pub fn render_nested(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => format!("\"{}\"", escape(s)),
            Value::Null => "null".to_string(),
            Value::List(items) => {
                let items: Vec<_> = items.iter().map(Value::render_nested).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Map(entries) => {
                let entries: Vec<_> = entries
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.render_nested()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            Value::Record(fields) => {
                let fields: Vec<_> = fields
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.render_nested()))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
            Value::Ok(inner) => format!("ok({})", inner.render_nested()),
            Value::Err(inner) => format!("err({})", inner.render_nested()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
