use super::error::{HostError, RuntimeError, impossible};
use super::trace::Actor;
use super::value::Value;
use crate::stdlib::Builtin;

use std::collections::BTreeMap;

/// The outside world as seen by gated builtins. Implementations must be
/// deterministic for a run to be replayable.
pub trait Host: Send {
    fn fetch(&mut self, url: &str) -> Result<String, HostError>;
    fn read_file(&mut self, path: &str) -> Result<String, HostError>;
    fn write_file(&mut self, path: &str, contents: &str) -> Result<(), HostError>;
}

/// In-memory host. Writes are visible to later reads in the same run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockHost {
    pub urls: BTreeMap<String, String>,
    pub files: BTreeMap<String, String>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.urls.insert(url.into(), body.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }
}

impl Host for MockHost {
    fn fetch(&mut self, url: &str) -> Result<String, HostError> {
        self.urls
            .get(url)
            .cloned()
            .ok_or_else(|| HostError::NotFound(url.to_string()))
    }

    fn read_file(&mut self, path: &str) -> Result<String, HostError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::NotFound(path.to_string()))
    }

    fn write_file(&mut self, path: &str, contents: &str) -> Result<(), HostError> {
        self.files.insert(path.to_string(), contents.to_string());
        Ok(())
    }
}

/// What a gated builtin call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub value: Value,
    pub actor: Actor,
    /// URL or path the call touched.
    pub target: String,
}

/// Performs a capability-gated builtin against `host`. The caller is
/// responsible for checking the capability first.
pub fn perform(host: &mut dyn Host, builtin: Builtin, args: Vec<Value>) -> Result<Effect, RuntimeError> {
    let texts = args
        .into_iter()
        .map(|arg| match arg {
            Value::Text(text) => Ok(text),
            other => Err(impossible(format!("'{builtin}' given {}", other.type_name()))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let host_error = |source| RuntimeError::Host {
        op: builtin.name(),
        source,
    };
    let (value, actor) = match (builtin, texts.as_slice()) {
        (Builtin::Fetch, [url]) => (
            Value::Text(host.fetch(url).map_err(host_error)?),
            Actor::TrustedSource,
        ),
        (Builtin::ReadFile, [path]) => (
            Value::Text(host.read_file(path).map_err(host_error)?),
            Actor::TrustedSource,
        ),
        (Builtin::WriteFile, [path, contents]) => {
            host.write_file(path, contents).map_err(host_error)?;
            (Value::Null, Actor::Automated)
        }
        _ => {
            return Err(impossible(format!(
                "'{builtin}' called with {} argument(s)",
                texts.len()
            )));
        }
    };
    let target = texts.into_iter().next().unwrap_or_default();
    Ok(Effect {
        value,
        actor,
        target,
    })
}
