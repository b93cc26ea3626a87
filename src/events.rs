use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role in conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual conversation entry. Never changed after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Where the conversation loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Waiting for user input
    Idle,
    /// Web search in progress
    AwaitingContext,
    /// Completion stream in progress
    AwaitingCompletion,
}

impl TurnState {
    pub fn status_text(&self) -> Option<&'static str> {
        match self {
            TurnState::Idle => None,
            TurnState::AwaitingContext => Some("🔍 Searching the web..."),
            TurnState::AwaitingCompletion => Some("✍️ Writing..."),
        }
    }
}

/// Progress notifications emitted while a turn runs
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A state transition
    State(TurnState),
    /// Web context is ready
    ContextReady { snippets: usize, fallback: bool },
    /// In-progress rendering: accumulated text followed by the cursor marker
    Partial(String),
    /// Final rendering without the cursor marker
    Final(String),
    /// The turn was refused or the stream failed
    Error(String),
}
