//! Run configuration: how strictly a run is supervised and which
//! capabilities the operator approved. None of it changes what a program
//! means, only whether the pipeline stops early.

use crate::capabilities::Capability;
use crate::diagnostic::{Diagnostic, Severity};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("supervision level must be between 1 and 4, got {0}")]
    Level(u8),
}

/// Levels 1 to 4, serialized as the bare number.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum SupervisionLevel {
    Strict = 1,
    Guarded = 2,
    #[default]
    Standard = 3,
    Trusted = 4,
}

impl SupervisionLevel {
    pub const ALL: [SupervisionLevel; 4] = [
        SupervisionLevel::Strict,
        SupervisionLevel::Guarded,
        SupervisionLevel::Standard,
        SupervisionLevel::Trusted,
    ];

    /// Lowest severity that stops the pipeline.
    pub fn halts_on(self) -> Severity {
        match self {
            SupervisionLevel::Strict => Severity::Warning,
            SupervisionLevel::Guarded | SupervisionLevel::Standard => Severity::Error,
            SupervisionLevel::Trusted => Severity::Fatal,
        }
    }

    pub fn needs_approval(self, capability: Capability) -> bool {
        match self {
            SupervisionLevel::Strict => true,
            SupervisionLevel::Guarded => capability != Capability::Io,
            SupervisionLevel::Standard => capability == Capability::Net,
            SupervisionLevel::Trusted => false,
        }
    }

    /// Fatal diagnostics halt at every level.
    pub fn halts(self, diagnostics: &[Diagnostic]) -> bool {
        let threshold = self.halts_on();
        diagnostics
            .iter()
            .any(|d| d.is_fatal() || d.severity >= threshold)
    }
}

impl TryFrom<u8> for SupervisionLevel {
    type Error = ConfigError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(SupervisionLevel::Strict),
            2 => Ok(SupervisionLevel::Guarded),
            3 => Ok(SupervisionLevel::Standard),
            4 => Ok(SupervisionLevel::Trusted),
            other => Err(ConfigError::Level(other)),
        }
    }
}

impl From<SupervisionLevel> for u8 {
    fn from(level: SupervisionLevel) -> u8 {
        level as u8
    }
}

impl Display for SupervisionLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub supervision: SupervisionLevel,
    pub approvals: BTreeSet<Capability>,
    /// Name given to the lowered IR module.
    pub module_name: String,
    pub max_call_depth: usize,
    /// Lines consumed by `ask`, in order.
    pub inputs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            supervision: SupervisionLevel::default(),
            approvals: BTreeSet::new(),
            module_name: "main".to_string(),
            max_call_depth: 128,
            inputs: vec![],
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn approve(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.approvals.extend(capabilities);
        self
    }
}
