use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of an event, scoped to one workflow definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EventId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What caused a persisted step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Trigger {
    /// Implicit entry into the initial composite state at construction
    Initial,
    /// An external event sent by a caller
    Event(EventId),
    /// Automatic collapse of parallel regions
    Join,
}

impl Trigger {
    /// Get a string representation of the trigger for logging
    pub fn trigger_type(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Event(_) => "event",
            Self::Join => "join",
        }
    }

    pub fn event(&self) -> Option<&EventId> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn is_initial(&self) -> bool {
        matches!(self, Self::Initial)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(event) => write!(f, "event:{event}"),
            other => f.write_str(other.trigger_type()),
        }
    }
}
