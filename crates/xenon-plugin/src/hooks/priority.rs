//! Hook priorities.

use serde::{Deserialize, Serialize};

/// Dispatch priority of a hook. Higher priorities run earlier.
///
/// Hooks sharing a priority run in the order they were registered.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Runs after everything else.
    Low = 0,
    /// Default priority for ordinary hooks.
    #[default]
    Normal = 1,
    /// Runs before normal hooks.
    High = 2,
    /// Runs first.
    Top = 3,
}

impl Priority {
    /// Returns the ordinal used as the sort key.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Returns the string name of this priority.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Top => "top",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
