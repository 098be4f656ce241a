use serde::{Deserialize, Serialize};

use std::fmt::{self, Display, Formatter};
use std::ops::Range;

/// Identifies one compilation unit. Assigned by the caller, never interpreted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FileId(pub u32);

/// A source location: byte range into the original bytes plus the 1-based
/// line and column (in characters) of its first byte.
///
/// Copied by value through tokens, AST, IR and trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub col: u32,
}

impl Origin {
    pub fn new(file: FileId, range: Range<usize>, line: usize, col: usize) -> Self {
        Origin {
            file,
            start: range.start as u32,
            end: range.end as u32,
            line: line as u32,
            col: col as u32,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Covers `self` through the end of `other`.
    pub fn to(self, other: Origin) -> Origin {
        Origin {
            end: other.end.max(self.end),
            ..self
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
