//! Action names — opaque tokens that select which middleware a dispatch runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque identifier naming a category of state change.
///
/// Registrations and dispatches are keyed by these tokens. The
/// [`Default`](ActionName::Default) variant is the distinguished name used
/// whenever no explicit name is given — it is a separate variant rather
/// than a reserved string, so it can never collide with a user-chosen name.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    /// The distinguished default action name.
    Default,
    /// A user-chosen action name.
    Named(String),
}

impl ActionName {
    /// Returns `true` if this is the distinguished default name.
    pub fn is_default(&self) -> bool {
        matches!(self, ActionName::Default)
    }

    /// The name as a string slice, if it is a named action.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ActionName::Default => None,
            ActionName::Named(s) => Some(s),
        }
    }
}

impl From<&str> for ActionName {
    fn from(s: &str) -> Self {
        ActionName::Named(s.to_string())
    }
}

impl From<String> for ActionName {
    fn from(s: String) -> Self {
        ActionName::Named(s)
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionName::Default => write!(f, "(default)"),
            ActionName::Named(s) => write!(f, "{s}"),
        }
    }
}
