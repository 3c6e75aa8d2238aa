//! Topic keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use sluice_core::{AgentId, ComponentId};

/// A hierarchical string key identifying a logical pub/sub channel.
///
/// Hierarchy (`state/reservoir_1`, `command/ctrl_1`) is convention only;
/// the bus matches topics by string equality and supports no wildcards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(pub String);

impl Topic {
    /// Construct from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The topic key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Conventional topic for a component's published state snapshots.
    pub fn state(id: &ComponentId) -> Self {
        Self(format!("state/{id}"))
    }

    /// Conventional topic for a component's control inputs.
    pub fn action(id: &ComponentId) -> Self {
        Self(format!("action/{id}"))
    }

    /// Conventional topic for exogenous inflow into a component.
    pub fn inflow(id: &ComponentId) -> Self {
        Self(format!("inflow/{id}"))
    }

    /// Conventional topic for commands addressed to one agent.
    ///
    /// The engine subscribes every agent here and intercepts `shutdown`
    /// payloads itself; other payloads reach the agent's handler.
    pub fn command(id: &AgentId) -> Self {
        Self(format!("command/{id}"))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(s)
    }
}
