use serde::{Deserialize, Serialize};

/// A named sub-interval of an encounter, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub start: i64,
    pub end: i64,
}

impl Phase {
    pub fn new(name: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            name: name.into(),
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// The whole encounter as one phase.
    pub fn full(start: i64, end: i64) -> Self {
        Self::new("Full Fight", start, end)
    }

    pub fn duration(&self) -> i64 {
        self.end - self.start
    }
}
