use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Logical state of the proxied stream.
///
/// Lives in memory only; the process always starts out `Disabled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Enabled,
    #[default]
    Disabled,
}

impl StreamState {
    /// Path segment used by the proxy manager (`.../streams/{id}/{action}`).
    #[must_use]
    pub fn action(self) -> &'static str {
        match self {
            Self::Enabled => "enable",
            Self::Disabled => "disable",
        }
    }

    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("enabled"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

impl FromStr for StreamState {
    type Err = Error;

    /// Accepts both the action verbs (`enable`) and the state names (`enabled`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enable" | "enabled" => Ok(Self::Enabled),
            "disable" | "disabled" => Ok(Self::Disabled),
            other => Err(Error::UnknownState(other.to_string())),
        }
    }
}

/// Fields of an inbound WeCom message that must be mirrored in its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub to_user_name: String,
    pub from_user_name: String,
    pub create_time: String,
}

/// Where the outcome of a transition is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    /// Rendered into the HTTP response of the inbound request.
    InlineXml(Correlation),
    /// Pushed out of band to a chat.
    DirectPush(String),
}
