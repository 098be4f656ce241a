//! The audit trail of a run: one event per gated action and one per runtime
//! diagnostic, in execution order.

use crate::capabilities::Capability;
use crate::span::Origin;
use crate::stdlib::Builtin;

use serde::{Deserialize, Serialize};

/// Who an event's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Human,
    Automated,
    TrustedSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Show {
        text: String,
    },
    Ask {
        name: String,
        prompt: Option<String>,
        input: String,
    },
    Host {
        builtin: Builtin,
        target: String,
    },
    Diagnostic {
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    pub seq: usize,
    pub origin: Origin,
    pub actor: Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
    pub payload: Payload,
}

/// Append-only event log. Sequence numbers are assigned here.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub fn record(
        &mut self,
        origin: Origin,
        actor: Actor,
        capability: Option<Capability>,
        payload: Payload,
    ) {
        self.events.push(TraceEvent {
            seq: self.events.len(),
            origin,
            actor,
            capability,
            payload,
        });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

/// One JSON object per line.
pub fn to_ndjson(events: &[TraceEvent]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}
