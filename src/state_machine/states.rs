use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a state, unique within one workflow definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for StateId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StateId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StateId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Parallel branch a state belongs to.
///
/// `Main` is the outer region every workflow has; `Sub` regions only exist
/// between a fork and its join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Main,
    Sub(String),
}

impl Region {
    pub fn sub(name: impl Into<String>) -> Self {
        Self::Sub(name.into())
    }

    pub fn is_main(&self) -> bool {
        matches!(self, Self::Main)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Sub(name) => write!(f, "{name}"),
        }
    }
}

/// Static description of one state in a workflow graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDefinition {
    pub id: StateId,
    pub region: Region,
    pub initial: bool,
    pub terminal: bool,
}

impl StateDefinition {
    pub fn new(id: impl Into<StateId>, region: Region) -> Self {
        Self {
            id: id.into(),
            region,
            initial: false,
            terminal: false,
        }
    }

    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}
